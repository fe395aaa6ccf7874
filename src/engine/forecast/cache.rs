//! Memoized model fits keyed on series content
//!
//! The key is an MD5 digest over the provider name and every
//! `(timestamp, value)` pair, plus the horizon. Breach dates are not
//! cached since they depend on the thresholds and invocation date.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use super::ModelForecast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: [u8; 16],
    horizon_days: u32,
}

impl CacheKey {
    pub fn new(provider: &str, history: &[(NaiveDateTime, f64)], horizon_days: u32) -> Self {
        let mut ctx = md5::Context::new();
        ctx.consume(provider.as_bytes());
        for (ts, v) in history {
            ctx.consume(ts.and_utc().timestamp_millis().to_le_bytes());
            ctx.consume(v.to_bits().to_le_bytes());
        }
        Self {
            digest: ctx.compute().0,
            horizon_days,
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, ModelForecast>,
    order: VecDeque<CacheKey>,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded FIFO cache of model fits, shared across requests
#[derive(Debug)]
pub struct ForecastCache {
    capacity: usize,
    inner: RwLock<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ForecastCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<ModelForecast> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let found = inner.entries.get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, key: CacheKey, value: ModelForecast) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.entries.insert(key, value).is_some() {
            return;
        }
        inner.order.push_back(key);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                debug!(capacity = self.capacity, "Forecast cache evicted oldest entry");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn history(offset: f64) -> Vec<(NaiveDateTime, f64)> {
        (1..=5)
            .map(|d| {
                let ts = NaiveDate::from_ymd_opt(2025, 1, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap();
                (ts, f64::from(d) + offset)
            })
            .collect()
    }

    fn empty_forecast() -> ModelForecast {
        ModelForecast {
            fitted: Vec::new(),
            predicted: Vec::new(),
        }
    }

    #[test]
    fn test_key_depends_on_content_provider_and_horizon() {
        let base = CacheKey::new("m", &history(0.0), 30);
        assert_eq!(base, CacheKey::new("m", &history(0.0), 30));
        assert_ne!(base, CacheKey::new("m", &history(0.5), 30));
        assert_ne!(base, CacheKey::new("other", &history(0.0), 30));
        assert_ne!(base, CacheKey::new("m", &history(0.0), 31));
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = ForecastCache::new(2);
        let keys: Vec<CacheKey> = (0..3)
            .map(|i| CacheKey::new("m", &history(f64::from(i)), 30))
            .collect();
        for k in &keys {
            cache.insert(*k, empty_forecast());
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&keys[0]).is_none());
        assert!(cache.get(&keys[2]).is_some());
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = ForecastCache::new(0);
        let key = CacheKey::new("m", &history(0.0), 30);
        cache.insert(key, empty_forecast());
        assert!(cache.is_empty());
    }
}
