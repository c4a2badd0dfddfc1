//! Keyed cache of opaque blobs with per-item expiry.

use super::errors::AppError;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use std::{collections::HashMap, time::Duration};
use tokio::{sync::RwLock, time::Instant};

#[derive(Debug, Clone)]
pub struct CacheItem {
    pub key: String,
    pub value: Bytes,
    pub ttl: Duration,
}

pub trait CacheStore: Send + Sync {
    /// Returns only the keys that are present; missing keys are simply absent.
    fn get_multi(&self, keys: Vec<String>)
        -> BoxFuture<'_, Result<HashMap<String, Bytes>, AppError>>;

    fn set_multi(&self, items: Vec<CacheItem>) -> BoxFuture<'_, Result<(), AppError>>;
}

struct CachedValue {
    value: Bytes,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CachedValue>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get_multi(
        &self,
        keys: Vec<String>,
    ) -> BoxFuture<'_, Result<HashMap<String, Bytes>, AppError>> {
        async move {
            let entries = self.entries.read().await;
            let now = Instant::now();

            let found = keys
                .into_iter()
                .filter_map(|key| match entries.get(&key) {
                    Some(cached) if cached.expires_at > now => {
                        Some((key, cached.value.clone()))
                    }
                    _ => None,
                })
                .collect();

            Ok(found)
        }
        .boxed()
    }

    fn set_multi(&self, items: Vec<CacheItem>) -> BoxFuture<'_, Result<(), AppError>> {
        async move {
            let mut entries = self.entries.write().await;
            let now = Instant::now();

            entries.retain(|_, cached| cached.expires_at > now);
            for item in items {
                entries.insert(
                    item.key,
                    CachedValue {
                        value: item.value,
                        expires_at: now + item.ttl,
                    },
                );
            }
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, value: &str, ttl_secs: u64) -> CacheItem {
        CacheItem {
            key: key.to_string(),
            value: Bytes::from(value.to_string()),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    #[tokio::test]
    async fn get_multi_returns_only_present_keys() {
        let cache = MemoryCache::new();
        cache
            .set_multi(vec![item("a", "1", 60), item("b", "2", 60)])
            .await
            .unwrap();

        let found = cache
            .get_multi(vec!["a".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["a"], Bytes::from("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn items_expire_after_their_ttl() {
        let cache = MemoryCache::new();
        cache
            .set_multi(vec![item("short", "x", 5), item("long", "y", 500)])
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        let found = cache
            .get_multi(vec!["short".into(), "long".into()])
            .await
            .unwrap();
        assert!(!found.contains_key("short"));
        assert_eq!(found["long"], Bytes::from("y"));
    }
}
