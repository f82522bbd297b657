//! Read-through cache of list snapshots.
//!
//! Services read lists through [`DataCache::get_or_load`] and call
//! [`DataCache::invalidate`] for every dataset a committed write touched.
//! [`DataCache::refresh`] drops everything.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Groups of cached snapshots that are invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Dataset {
    Clients,
    Products,
    Orders,
    StockMovements,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() > expires_at,
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataCache {
    store: Arc<RwLock<HashMap<(Dataset, String), CacheEntry>>>,
    ttl: Option<Duration>,
}

impl DataCache {
    /// `ttl` of `None` keeps snapshots until invalidated.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, dataset: Dataset, key: &str) -> Option<T> {
        let store = self.store.read().await;
        let entry = store.get(&(dataset, key.to_string()))?;
        if entry.is_expired() {
            return None;
        }
        match serde_json::from_str(&entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%dataset, key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    pub async fn put<T: Serialize>(
        &self,
        dataset: Dataset,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        let mut store = self.store.write().await;
        store.insert((dataset, key.to_string()), CacheEntry::new(raw, self.ttl));
        Ok(())
    }

    /// Serves a fresh snapshot or runs `load` and stores its result.
    ///
    /// Empty results are not stored, so a degraded read never sticks.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        dataset: Dataset,
        key: &str,
        load: F,
    ) -> Result<Vec<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        if let Some(hit) = self.get::<Vec<T>>(dataset, key).await {
            debug!(%dataset, key, "cache hit");
            metrics::counter!("club_cache.hit", 1);
            return Ok(hit);
        }

        metrics::counter!("club_cache.miss", 1);
        let loaded = load().await?;
        if !loaded.is_empty() {
            if let Err(e) = self.put(dataset, key, &loaded).await {
                warn!(%dataset, key, error = %e, "Failed to store snapshot");
            }
        }
        Ok(loaded)
    }

    /// Drops every snapshot of the given datasets.
    pub async fn invalidate(&self, datasets: &[Dataset]) {
        let mut store = self.store.write().await;
        store.retain(|(dataset, _), _| !datasets.contains(dataset));
        debug!(?datasets, "cache invalidated");
    }

    /// Drops every snapshot.
    pub async fn refresh(&self) -> usize {
        let mut store = self.store.write().await;
        let dropped = store.len();
        store.clear();
        debug!(dropped, "cache cleared");
        dropped
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = DataCache::default();
        let loads = AtomicUsize::new(0);

        for _ in 0..2 {
            let rows: Vec<String> = cache
                .get_or_load(Dataset::Clients, "all", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(vec!["Ana".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(rows, vec!["Ana"]);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_only_drops_named_datasets() {
        let cache = DataCache::default();
        cache.put(Dataset::Clients, "all", &vec![1]).await.unwrap();
        cache.put(Dataset::Orders, "all", &vec![2]).await.unwrap();
        cache.put(Dataset::Orders, "client=1", &vec![3]).await.unwrap();

        cache.invalidate(&[Dataset::Orders]).await;

        assert_eq!(cache.get::<Vec<i32>>(Dataset::Clients, "all").await, Some(vec![1]));
        assert_eq!(cache.get::<Vec<i32>>(Dataset::Orders, "all").await, None);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn expired_snapshots_are_reloaded() {
        let cache = DataCache::new(Some(Duration::from_millis(5)));
        cache.put(Dataset::Products, "all", &vec![1]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get::<Vec<i32>>(Dataset::Products, "all").await, None);
    }

    #[tokio::test]
    async fn empty_results_are_not_cached() {
        let cache = DataCache::default();
        let rows: Vec<i32> = cache
            .get_or_load(Dataset::Products, "all", || async { Ok::<_, CacheError>(vec![]) })
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn refresh_clears_everything() {
        let cache = DataCache::default();
        cache.put(Dataset::Clients, "all", &vec![1]).await.unwrap();
        cache.put(Dataset::StockMovements, "all", &vec![1]).await.unwrap();
        assert_eq!(cache.refresh().await, 2);
        assert!(cache.is_empty().await);
    }
}
