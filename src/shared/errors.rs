use serde::Serialize;
use std::{convert::Infallible, fmt};
use utoipa::ToSchema;
use warp::{http::StatusCode, reject::Reject, Rejection, Reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Malformed client input, nothing was side-effected.
    Validation,
    Forbidden,
    /// Queue, cache or durable store unavailable.
    Upstream,
    /// Corrupt cached or queued payload.
    Deserialize,
    /// Asset loading or image encoding failure.
    Render,
    Internal,
}

#[derive(Debug)]
pub struct AppError {
    pub err_type: ErrorType,
    pub message: String,
}

impl AppError {
    pub fn new(message: &str, err_type: ErrorType) -> AppError {
        AppError {
            message: message.to_string(),
            err_type,
        }
    }

    pub fn validation(message: impl Into<String>) -> AppError {
        AppError {
            err_type: ErrorType::Validation,
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> AppError {
        AppError {
            err_type: ErrorType::Upstream,
            message: message.into(),
        }
    }

    pub fn deserialize(message: impl Into<String>) -> AppError {
        AppError {
            err_type: ErrorType::Deserialize,
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> AppError {
        AppError {
            err_type: ErrorType::Render,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.err_type {
            ErrorType::Validation => StatusCode::BAD_REQUEST,
            ErrorType::Forbidden => StatusCode::FORBIDDEN,
            ErrorType::Upstream
            | ErrorType::Deserialize
            | ErrorType::Render
            | ErrorType::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl Reject for AppError {}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorMessage {
    pub code: u16,
    pub message: String,
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(app_err) = err.find::<AppError>() {
        (app_err.status_code(), app_err.message.clone())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::PayloadTooLarge>() {
        (StatusCode::PAYLOAD_TOO_LARGE, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed".to_string(),
        )
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    log::error!("Error response: {} ({})", message, code.as_u16());

    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message,
    });

    Ok(warp::reply::with_status(json, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            AppError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::new("nope", ErrorType::Forbidden).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::upstream("queue down").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::render("font").to_string(), "font");
    }
}
