use crate::{
    config::IngestConfig,
    modules::house::HouseState,
    shared::errors::{AppError, ErrorType},
};
use std::{convert::Infallible, net::SocketAddr};
use warp::Filter;

/// Form bodies larger than this are refused before parsing.
pub const MAX_FORM_BYTES: u64 = 1024 * 256;

pub fn with_state(
    state: HouseState,
) -> impl Filter<Extract = (HouseState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Rejects with 403 unless the peer is on the ingest allow-list.
pub fn with_allowed_addr(
    ingest: IngestConfig,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::filters::addr::remote()
        .and_then(move |addr: Option<SocketAddr>| {
            let allowed = ingest.is_allowed(addr.map(|a| a.ip()));
            async move {
                if allowed {
                    Ok(())
                } else {
                    log::warn!("Refusing readings from {:?}", addr);
                    Err(warp::reject::custom(AppError::new(
                        "Invalid address",
                        ErrorType::Forbidden,
                    )))
                }
            }
        })
        .untuple_one()
}

pub fn with_form() -> impl Filter<Extract = (Vec<(String, String)>,), Error = warp::Rejection> + Clone
{
    warp::body::content_length_limit(MAX_FORM_BYTES).and(warp::body::form())
}
