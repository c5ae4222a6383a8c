//! In-memory caching using moka
//!
//! Caches the farm listing and the active package lists, which change rarely
//! and are read on every catalog page. Entries live for the configured TTL
//! and a background warmer refreshes them on the same period.

use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::booking::providers::{CatalogProvider, ProviderResult};
use crate::models::{FarmSummary, Package, UsageType};

const FARMS_KEY: &str = "farms";

/// Application cache holding catalog listings
#[derive(Clone)]
pub struct AppCache {
    /// Farm listing (singleton)
    pub farm_listing: Cache<String, Arc<Vec<FarmSummary>>>,
    /// Active packages per usage type
    pub packages: Cache<UsageType, Arc<Vec<Package>>>,
    ttl: Duration,
}

impl AppCache {
    /// Create a new cache instance with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            farm_listing: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            packages: Cache::builder().max_capacity(2).time_to_live(ttl).build(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Farm listing, fetched on a miss
    pub async fn farms(
        &self,
        provider: &dyn CatalogProvider,
    ) -> ProviderResult<Arc<Vec<FarmSummary>>> {
        if let Some(cached) = self.farm_listing.get(FARMS_KEY).await {
            debug!("Cache HIT for farm listing");
            return Ok(cached);
        }
        debug!("Cache MISS for farm listing");
        let farms = Arc::new(provider.list_farms().await?);
        self.farm_listing
            .insert(FARMS_KEY.to_string(), farms.clone())
            .await;
        Ok(farms)
    }

    /// Active packages for a usage type, fetched on a miss
    pub async fn packages(
        &self,
        provider: &dyn CatalogProvider,
        usage: UsageType,
    ) -> ProviderResult<Arc<Vec<Package>>> {
        if let Some(cached) = self.packages.get(&usage).await {
            debug!("Cache HIT for {} packages", usage.as_str());
            return Ok(cached);
        }
        debug!("Cache MISS for {} packages", usage.as_str());
        let packages = Arc::new(provider.list_active_packages(usage).await?);
        self.packages.insert(usage, packages.clone()).await;
        Ok(packages)
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            farms_cached: self.farm_listing.entry_count() > 0,
            package_lists: self.packages.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }

    /// Invalidate all caches
    pub fn invalidate_all(&self) {
        self.farm_listing.invalidate_all();
        self.packages.invalidate_all();
        info!("All caches invalidated");
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub farms_cached: bool,
    pub package_lists: u64,
    pub ttl_secs: u64,
}

/// Start background cache warmer
///
/// Warms the cache on startup and refreshes it once per TTL. Failures are
/// logged and the previous entries stay in place until they expire.
pub async fn start_cache_warmer(cache: AppCache, provider: Arc<dyn CatalogProvider>) {
    let mut interval = interval(cache.ttl());
    loop {
        interval.tick().await;
        warm_cache(&cache, provider.as_ref()).await;
    }
}

/// Refresh the cached listings
async fn warm_cache(cache: &AppCache, provider: &dyn CatalogProvider) {
    debug!("Refreshing catalog cache...");

    match provider.list_farms().await {
        Ok(farms) => {
            cache
                .farm_listing
                .insert(FARMS_KEY.to_string(), Arc::new(farms))
                .await;
        }
        Err(e) => warn!("Failed to refresh farm listing cache: {}", e),
    }

    for usage in [UsageType::Personal, UsageType::Investment] {
        match provider.list_active_packages(usage).await {
            Ok(packages) => cache.packages.insert(usage, Arc::new(packages)).await,
            Err(e) => warn!("Failed to refresh {} package cache: {}", usage.as_str(), e),
        }
    }

    debug!("Catalog cache refreshed. Stats: {:?}", cache.stats());
}
