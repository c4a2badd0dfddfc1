//! Optional durable copy of raw readings, keyed by `Reading::key` so that
//! redelivered readings overwrite instead of duplicating.

use super::reading::Reading;
use crate::shared::errors::AppError;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub trait ReadingStore: Send + Sync {
    fn put_multi(&self, readings: Vec<Reading>) -> BoxFuture<'_, Result<(), AppError>>;
}

/// Writes `readings` in chunks, stopping at the first failed chunk.
pub async fn persist_chunked(
    store: &dyn ReadingStore,
    readings: Vec<Reading>,
    chunk_size: usize,
) -> Result<(), AppError> {
    for chunk in readings.chunks(chunk_size.max(1)) {
        store.put_multi(chunk.to_vec()).await?;
    }
    Ok(())
}

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Reading>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

impl ReadingStore for MemoryStore {
    fn put_multi(&self, readings: Vec<Reading>) -> BoxFuture<'_, Result<(), AppError>> {
        async move {
            let mut records = self.records.write().await;
            for reading in readings {
                records.insert(reading.key(), reading);
            }
            Ok(())
        }
        .boxed()
    }
}

#[cfg(feature = "mongo")]
pub use mongo::MongoStore;

#[cfg(feature = "mongo")]
mod mongo {
    use super::ReadingStore;
    use crate::{
        config::PersistenceConfig,
        modules::house::reading::Reading,
        shared::errors::AppError,
    };
    use bson::{doc, Document};
    use futures::future::{BoxFuture, FutureExt};
    use mongodb::{options::ReplaceOptions, Client, Collection};

    pub struct MongoStore {
        collection: Collection<Document>,
    }

    impl MongoStore {
        pub async fn connect(config: &PersistenceConfig) -> Result<Self, AppError> {
            let client = Client::with_uri_str(&config.mongodb_uri)
                .await
                .map_err(|e| AppError::upstream(format!("Mongo connection error: {}", e)))?;

            Ok(MongoStore {
                collection: client
                    .database(&config.database)
                    .collection(&config.collection),
            })
        }
    }

    impl ReadingStore for MongoStore {
        fn put_multi(&self, readings: Vec<Reading>) -> BoxFuture<'_, Result<(), AppError>> {
            async move {
                for reading in readings {
                    let key = reading.key();
                    let record = doc! {
                        "_id": &key,
                        "serial": &reading.serial,
                        "value": reading.value,
                        "timestamp": bson::DateTime::from_chrono(reading.timestamp),
                    };
                    let options = ReplaceOptions::builder().upsert(true).build();

                    self.collection
                        .replace_one(doc! { "_id": &key }, record, options)
                        .await
                        .map_err(|e| {
                            AppError::upstream(format!("Mongo Error storing {}: {}", key, e))
                        })?;
                }
                Ok(())
            }
            .boxed()
        }
    }
}
