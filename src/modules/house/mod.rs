pub mod assets;
mod canvas;
pub mod consume;
pub mod image_cache;
pub mod input;
pub mod layout;
pub mod reading;
pub mod render;
pub mod store;

use crate::{
    config::Configs,
    shared::{cache::CacheStore, queue::WorkQueue},
};
use assets::HouseAssets;
use std::sync::Arc;
use store::ReadingStore;
use tokio::sync::Mutex;

/// Handles shared by the HTTP handlers and the background drain task.
#[derive(Clone)]
pub struct HouseState {
    pub queue: Arc<dyn WorkQueue>,
    pub cache: Arc<dyn CacheStore>,
    pub store: Option<Arc<dyn ReadingStore>>,
    pub assets: Arc<HouseAssets>,
    pub configs: Arc<Configs>,
    drain_lock: Arc<Mutex<()>>,
}

impl HouseState {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        cache: Arc<dyn CacheStore>,
        store: Option<Arc<dyn ReadingStore>>,
        assets: HouseAssets,
        configs: Configs,
    ) -> Self {
        HouseState {
            queue,
            cache,
            store,
            assets: Arc::new(assets),
            configs: Arc::new(configs),
            drain_lock: Arc::new(Mutex::new(())),
        }
    }
}
