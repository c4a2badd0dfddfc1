//! Batch aggregator: folds leased queue entries into the cached per-sensor
//! histories and the current snapshot.
//!
//! Queue entries are only deleted once the cache write (and the durable
//! write, when enabled) succeeded. Anything else leaves them leased, and
//! the lease timeout hands them out again. Reprocessing is safe because
//! merging a reading that is already in a series is a no-op.

use super::{
    reading::{series_key, CurrentSnapshot, Reading, ReadingSeries, CURRENT_KEY},
    store::persist_chunked,
    HouseState,
};
use crate::shared::{
    cache::CacheItem,
    errors::{AppError, ErrorType},
    queue::LeasedTask,
};
use bytes::Bytes;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

fn decode<T: DeserializeOwned>(raw: &[u8], what: &str) -> Result<T, AppError> {
    serde_json::from_slice(raw).map_err(|e| AppError::deserialize(format!("{}: {}", what, e)))
}

fn group_by_serial(tasks: &[LeasedTask]) -> HashMap<String, Vec<Reading>> {
    let mut grouped: HashMap<String, Vec<Reading>> = HashMap::new();
    for task in tasks {
        match decode::<Reading>(&task.payload, "queue entry") {
            Ok(reading) => grouped
                .entry(reading.serial.clone())
                .or_default()
                .push(reading),
            Err(e) => warn!("Dropping unreadable entry {}: {}", task.id, e),
        }
    }
    grouped
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Bytes, AppError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| AppError {
            err_type: ErrorType::Internal,
            message: format!("Error encoding cache entry: {}", e),
        })
}

async fn persist(state: &HouseState, readings: Vec<Reading>) -> Result<(), AppError> {
    match &state.store {
        Some(store) if !readings.is_empty() => {
            let chunk_size = state.configs.persistence.chunk_size;
            persist_chunked(store.as_ref(), readings, chunk_size)
                .await
                .map_err(|e| {
                    warn!("Error persisting readings: {}", e);
                    e
                })
        }
        _ => Ok(()),
    }
}

/// Leases one batch and folds it into the cache. Returns how many queue
/// entries were leased (and, on success, deleted).
pub async fn process_batch(state: &HouseState) -> Result<usize, AppError> {
    let settings = &state.configs.aggregator;

    let tasks = state
        .queue
        .lease(settings.max_lease, settings.lease_timeout())
        .await?;
    if tasks.is_empty() {
        return Ok(0);
    }

    let incoming = group_by_serial(&tasks);
    let fresh: Vec<Reading> = incoming.values().flatten().cloned().collect();

    let mut keys = vec![CURRENT_KEY.to_string()];
    keys.extend(incoming.keys().map(|sn| series_key(sn)));

    let mut cached = match state.cache.get_multi(keys).await {
        Ok(cached) => cached,
        Err(e) => {
            warn!("Cache multiget failure: {}", e);
            HashMap::new()
        }
    };

    let mut current: CurrentSnapshot = match cached.remove(CURRENT_KEY) {
        Some(raw) => decode(&raw, "current snapshot").unwrap_or_else(|e| {
            warn!("Discarding {}", e);
            CurrentSnapshot::new()
        }),
        None => CurrentSnapshot::new(),
    };

    let mut items = Vec::with_capacity(incoming.len() + 1);
    for (serial, readings) in incoming {
        let key = series_key(&serial);
        let existing = match cached.remove(&key) {
            Some(raw) => decode(&raw, &key).unwrap_or_else(|e| {
                warn!("Discarding {}", e);
                ReadingSeries::default()
            }),
            None => ReadingSeries::default(),
        };

        let series = ReadingSeries::merge(readings, existing, settings.max_items);
        if let Some(latest) = series.latest() {
            current.insert(serial.clone(), latest.value);
        }
        log::debug!(
            "{} now holds {} readings",
            state.assets.layout.name_of(&serial),
            series.len()
        );

        items.push(CacheItem {
            key,
            value: encode(&series)?,
            ttl: settings.history_ttl(),
        });
    }
    items.push(CacheItem {
        key: CURRENT_KEY.to_string(),
        value: encode(&current)?,
        ttl: settings.current_ttl(),
    });

    let (cached_result, persisted_result) =
        tokio::join!(state.cache.set_multi(items), persist(state, fresh));
    if let Err(e) = &cached_result {
        warn!("Cache write failure, leaving {} entries leased: {}", tasks.len(), e);
    }
    cached_result?;
    persisted_result?;

    state
        .queue
        .delete(tasks.iter().map(|t| t.id).collect())
        .await?;

    Ok(tasks.len())
}

/// Processes batches until a lease comes back short or empty, i.e. the
/// queue is empty for now. Drains within this process never overlap.
pub async fn drain(state: &HouseState) -> Result<usize, AppError> {
    let _guard = state.drain_lock.lock().await;
    let max_lease = state.configs.aggregator.max_lease;

    let mut total = 0;
    loop {
        let n = process_batch(state).await?;
        info!("Processed {} items", n);
        total += n;
        if n == 0 || n < max_lease {
            return Ok(total);
        }
    }
}
