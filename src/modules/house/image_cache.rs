//! Caches the rendered PNG together with its `Expires` header value so a
//! cache hit never touches the queue or the renderer.

use super::{
    consume::drain,
    render::{encode_png, load_readings, render_house},
    HouseState,
};
use crate::shared::{cache::CacheItem, errors::AppError, http_date};
use bytes::Bytes;
use chrono::Utc;
use tokio::task::JoinHandle;

pub const IMAGE_KEY: &str = "houseimg";
pub const EXPIRES_KEY: &str = "houseexp";

#[derive(Debug, Clone)]
pub struct HouseImage {
    pub data: Bytes,
    pub expires: String,
}

/// Both halves must be present (and the expiry readable) to count as a hit.
pub async fn cached(state: &HouseState) -> Option<HouseImage> {
    let mut found = match state
        .cache
        .get_multi(vec![IMAGE_KEY.to_string(), EXPIRES_KEY.to_string()])
        .await
    {
        Ok(found) => found,
        Err(e) => {
            log::warn!("Image cache lookup failed: {}", e);
            return None;
        }
    };

    let data = found.remove(IMAGE_KEY)?;
    let expires = String::from_utf8(found.remove(EXPIRES_KEY)?.to_vec()).ok()?;
    Some(HouseImage { data, expires })
}

/// Drains pending readings, then renders from the cached series.
pub async fn render_fresh(state: &HouseState) -> Result<HouseImage, AppError> {
    drain(state).await?;

    let start = std::time::Instant::now();
    let readings = load_readings(state.cache.as_ref()).await;

    let assets = state.assets.clone();
    let data = tokio::task::spawn_blocking(move || encode_png(&render_house(&assets, &readings)))
        .await
        .map_err(|e| AppError::render(format!("Render task failed: {}", e)))??;
    log::debug!("Rendered house in {:?}", start.elapsed());

    let ttl = state.configs.render.image_ttl();
    let expires_at = Utc::now()
        + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());

    Ok(HouseImage {
        data,
        expires: http_date(expires_at),
    })
}

/// Writes the image in the background. The caller awaits the handle before
/// finishing its request.
pub fn store(state: &HouseState, image: &HouseImage) -> JoinHandle<()> {
    let cache = state.cache.clone();
    let ttl = state.configs.render.image_ttl();
    let items = vec![
        CacheItem {
            key: IMAGE_KEY.to_string(),
            value: image.data.clone(),
            ttl,
        },
        CacheItem {
            key: EXPIRES_KEY.to_string(),
            value: Bytes::from(image.expires.clone()),
            ttl,
        },
    ];

    tokio::spawn(async move {
        if let Err(e) = cache.set_multi(items).await {
            log::warn!("Error caching house image: {}", e);
        }
    })
}
