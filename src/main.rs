mod config;
mod logger;
mod modules;
mod shared;

use config::{ConfigSource, Configs};
use modules::{
    api::start_api,
    house::{assets::HouseAssets, consume::drain, store::ReadingStore, HouseState},
};
use shared::{cache::MemoryCache, queue::MemoryQueue};
use std::sync::Arc;

async fn reading_store(configs: &Configs) -> Option<Arc<dyn ReadingStore>> {
    if !configs.persistence.enabled {
        return None;
    }

    #[cfg(feature = "mongo")]
    let store: Arc<dyn ReadingStore> =
        match modules::house::store::MongoStore::connect(&configs.persistence).await {
            Ok(store) => {
                log::info!("Persisting readings to MongoDB");
                Arc::new(store)
            }
            Err(e) => {
                log::error!("Failed to connect to MongoDB: {}", e);
                std::process::exit(1);
            }
        };

    #[cfg(not(feature = "mongo"))]
    let store: Arc<dyn ReadingStore> = {
        log::warn!("Persistence enabled without the mongo feature, keeping readings in memory");
        Arc::new(modules::house::store::MemoryStore::new())
    };

    Some(store)
}

fn start_drain_task(state: HouseState) {
    let Some(period) = state.configs.aggregator.drain_interval() else {
        return;
    };

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = drain(&state).await {
                log::warn!("Periodic drain failed: {}", e);
            }
        }
    });
}

#[tokio::main]
async fn main() {
    let (configs, source) = match Configs::load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configurations: {}", e);
            std::process::exit(1);
        }
    };

    logger::start_log(&configs.logging.level);
    match source {
        ConfigSource::File(path) => log::info!("Configurations loaded from {}", path.display()),
        ConfigSource::Defaults(path) => {
            log::warn!("No config file at {}, using defaults", path.display())
        }
    }

    let assets = match HouseAssets::load(&configs.render) {
        Ok(a) => a,
        Err(e) => {
            log::error!("Failed to load render assets: {}", e);
            std::process::exit(1);
        }
    };

    let store = reading_store(&configs).await;
    let state = HouseState::new(
        Arc::new(MemoryQueue::new()),
        Arc::new(MemoryCache::new()),
        store,
        assets,
        configs,
    );

    start_drain_task(state.clone());

    if let Err(e) = start_api(state).await {
        log::error!("API task stopped: {}", e);
    }
}
