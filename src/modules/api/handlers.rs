use crate::{
    modules::house::{
        consume::drain,
        image_cache::{cached, render_fresh, store, HouseImage},
        input::{enqueue_readings, should_consume, InputBatch},
        HouseState,
    },
    shared::errors::{AppError, ErrorMessage, ErrorType},
};
use std::time::Duration;
use utoipa::ToSchema;
use warp::{
    http::{self, header, StatusCode},
    hyper::Body,
    reply::Response,
};

#[allow(unused)]
#[derive(ToSchema)]
struct InputForm {
    /// Sensor serial numbers.
    sn: Vec<String>,
    /// RFC 3339 timestamps.
    ts: Vec<String>,
    /// Temperatures.
    r: Vec<String>,
}

#[utoipa::path(
        post,
        path = "/house/input/",
        request_body(content = InputForm, content_type = "application/x-www-form-urlencoded"),
        responses(
            (status = 202, description = "Readings queued"),
            (status = 400, description = "Mismatched or unparseable arrays", body = ErrorMessage),
            (status = 403, description = "Address not allowed", body = ErrorMessage),
            (status = 500, description = "Queue unavailable", body = ErrorMessage),
        )
    )
]
pub async fn input_handler(
    form: Vec<(String, String)>,
    state: HouseState,
) -> Result<impl warp::Reply, warp::Rejection> {
    let readings = InputBatch::from_form(form)
        .prepare_readings()
        .map_err(warp::reject::custom)?;

    enqueue_readings(
        state.queue.as_ref(),
        &readings,
        state.configs.ingest.chunk_size,
    )
    .await
    .map_err(warp::reject::custom)?;
    log::info!("Queued {} readings", readings.len());

    if should_consume(state.configs.ingest.consume_probability, readings.len()) {
        tokio::spawn(async move {
            if let Err(e) = drain(&state).await {
                log::warn!("Opportunistic drain failed: {}", e);
            }
        });
    }

    Ok(StatusCode::ACCEPTED)
}

fn image_response(image: HouseImage, ttl: Duration) -> Result<Response, AppError> {
    http::Response::builder()
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, format!("max-age={}", ttl.as_secs()))
        .header(header::EXPIRES, image.expires)
        .header(header::CONTENT_LENGTH, image.data.len())
        .body(Body::from(image.data))
        .map_err(|e| AppError {
            err_type: ErrorType::Internal,
            message: format!("Error building response: {}", e),
        })
}

#[utoipa::path(
        get,
        path = "/house/",
        responses(
            (status = 200, description = "Floor plan colored by temperature", content_type = "image/png", body = Vec<u8>),
            (status = 500, description = "Rendering or upstream failure", body = ErrorMessage),
        )
    )
]
pub async fn house_image_handler(state: HouseState) -> Result<impl warp::Reply, warp::Rejection> {
    let (image, pending_write) = match cached(&state).await {
        Some(image) => {
            log::debug!("Serving house image from cache");
            (image, None)
        }
        None => {
            let image = render_fresh(&state).await.map_err(warp::reject::custom)?;
            let write = store(&state, &image);
            (image, Some(write))
        }
    };

    let response = image_response(image, state.configs.render.image_ttl());

    if let Some(write) = pending_write {
        if let Err(e) = write.await {
            log::warn!("Image cache write task failed: {}", e);
        }
    }

    response.map_err(warp::reject::custom)
}

#[utoipa::path(
        post,
        path = "/cron/house/consume/",
        responses(
            (status = 204, description = "Queue drained"),
            (status = 500, description = "Drain failed", body = ErrorMessage),
        )
    )
]
pub async fn consume_handler(state: HouseState) -> Result<impl warp::Reply, warp::Rejection> {
    let total = drain(&state).await.map_err(|e| {
        log::error!("Error processing: {}", e);
        warp::reject::custom(AppError {
            err_type: ErrorType::Internal,
            message: format!("Error processing: {}", e),
        })
    })?;
    log::info!("Drained {} items", total);

    Ok(StatusCode::NO_CONTENT)
}
