// Anonymous page cache. Pages differ per CDN bucket, so the bucket's cache key
// segment is part of every key; the path alone would serve one bucket's
// URLs to every other bucket.
use crate::config::CacheConfig;
use crate::metrics_defs::{PAGE_CACHE_HIT, PAGE_CACHE_MISS};
use hyper::body::Bytes;
use moka::sync::Cache;
use shared::counter;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct CachedPage {
    pub body: Bytes,
    pub content_security_policy: String,
}

pub struct PageCache {
    cache: Cache<String, CachedPage>,
}

impl PageCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();

        PageCache { cache }
    }

    pub fn key(path: &str, experiment_segment: Option<&str>) -> String {
        format!("{path}|{}", experiment_segment.unwrap_or("-"))
    }

    pub fn get(&self, key: &str) -> Option<CachedPage> {
        let page = self.cache.get(key);
        let metric_def = match page {
            Some(_) => PAGE_CACHE_HIT,
            None => PAGE_CACHE_MISS,
        };
        counter!(metric_def).increment(1);
        page
    }

    pub fn insert(&self, key: String, page: CachedPage) {
        self.cache.insert(key, page);
    }
}
