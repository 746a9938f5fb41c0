//! Tiered, TTL-aware, tag-invalidated cache used by the access resolver.
//!
//! The local tier is a `moka` cache whose `try_get_with` gives per-key
//! single-flight: concurrent misses on one key run the factory once and every
//! waiter observes the same value. Failed factories are handed to all waiters
//! and never stored. A caller that is dropped mid-computation leaves no entry
//! behind.
//!
//! An optional [`DistributedCacheTier`] sits behind the local tier. Local miss
//! → remote lookup → factory → write-through. Remote failures degrade to a
//! miss and are logged; they never fail a request.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use moka::Expiry;
use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::error::DomainError;

/// Shortest lifetime any entry gets.
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Tag sets larger than this are pruned of keys the local tier no longer holds.
const TAG_INDEX_PRUNE_THRESHOLD: usize = 1024;

/// Per-entry cache options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryOptions {
    /// Lifetime used unless the factory overrides it.
    pub ttl: Duration,
    /// Labels for bulk invalidation.
    pub tags: Vec<String>,
}

/// Output of a cache factory.
#[derive(Debug, Clone)]
pub struct Computed<V> {
    pub value: V,
    /// Replaces [`CacheEntryOptions::ttl`] for this entry when set.
    pub ttl: Option<Duration>,
}

impl<V> Computed<V> {
    #[must_use]
    pub fn new(value: V) -> Self {
        Self { value, ttl: None }
    }

    #[must_use]
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        Self {
            value,
            ttl: Some(ttl),
        }
    }
}

/// Future producing a value on cache miss.
pub type CacheFactory<'a, V> = BoxFuture<'a, Result<Computed<V>, DomainError>>;

/// Get-or-create cache with tag invalidation.
#[async_trait]
pub trait AccessCache<V>: Send + Sync
where
    V: Send + 'static,
{
    /// Return the cached value for `key`, or run `factory` and cache its
    /// successful result.
    ///
    /// # Errors
    ///
    /// Returns the factory's error. Errors are never cached.
    async fn get_or_create<'a>(
        &'a self,
        key: &'a str,
        options: CacheEntryOptions,
        factory: CacheFactory<'a, V>,
    ) -> Result<V, DomainError>;

    /// Evict every entry carrying `tag`.
    async fn invalidate_by_tag(&self, tag: &str);
}

/// Serialized entry stored in a distributed tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub payload: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

/// Second cache tier shared between processes.
#[async_trait]
pub trait DistributedCacheTier: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the tier is unreachable.
    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>, DomainError>;

    /// # Errors
    ///
    /// Returns an error if the tier is unreachable.
    async fn set(&self, key: &str, entry: RemoteEntry, tags: &[String]) -> Result<(), DomainError>;

    /// # Errors
    ///
    /// Returns an error if the tier is unreachable.
    async fn remove(&self, key: &str) -> Result<(), DomainError>;

    /// # Errors
    ///
    /// Returns an error if the tier is unreachable.
    async fn invalidate_by_tag(&self, tag: &str) -> Result<(), DomainError>;
}

#[derive(Clone)]
struct Slot<V> {
    value: V,
    ttl: Duration,
}

struct SlotExpiry;

impl<V> Expiry<String, Slot<V>> for SlotExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Slot<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Local `moka` tier plus optional distributed tier, with a tag index.
pub struct TieredCache<V> {
    name: &'static str,
    local: Cache<String, Slot<V>>,
    remote: Option<Arc<dyn DistributedCacheTier>>,
    tags: DashMap<String, HashSet<String>>,
    invalidations: AtomicU64,
}

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(name: &'static str, max_capacity: u64) -> Self {
        Self {
            name,
            local: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(SlotExpiry)
                .build(),
            remote: None,
            tags: DashMap::new(),
            invalidations: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn DistributedCacheTier>) -> Self {
        self.remote = Some(remote);
        self
    }

    fn index(&self, key: &str, tags: &[String]) {
        for tag in tags {
            let mut keys = self.tags.entry(tag.clone()).or_default();
            keys.insert(key.to_owned());
            if keys.len() > TAG_INDEX_PRUNE_THRESHOLD {
                keys.retain(|k| k == key || self.local.contains_key(k));
            }
        }
    }
}

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    async fn remote_get(&self, remote: &dyn DistributedCacheTier, key: &str) -> Option<Slot<V>> {
        let entry = match remote.get(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(cache = self.name, error = %e, "remote cache tier read failed");
                return None;
            }
        };
        let ttl = Duration::try_from(entry.expires_at - OffsetDateTime::now_utc())
            .ok()
            .filter(|ttl| *ttl >= MIN_TTL)?;
        match serde_json::from_slice(&entry.payload) {
            Ok(value) => Some(Slot { value, ttl }),
            Err(e) => {
                warn!(cache = self.name, error = %e, "remote cache entry is not decodable");
                None
            }
        }
    }

    async fn remote_set(
        &self,
        remote: &dyn DistributedCacheTier,
        key: &str,
        slot: &Slot<V>,
        tags: &[String],
    ) {
        let payload = match serde_json::to_vec(&slot.value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(cache = self.name, error = %e, "cache value is not encodable");
                return;
            }
        };
        let entry = RemoteEntry {
            payload,
            expires_at: OffsetDateTime::now_utc() + slot.ttl,
        };
        if let Err(e) = remote.set(key, entry, tags).await {
            warn!(cache = self.name, error = %e, "remote cache tier write failed");
        }
    }
}

#[async_trait]
impl<V> AccessCache<V> for TieredCache<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    async fn get_or_create<'a>(
        &'a self,
        key: &'a str,
        options: CacheEntryOptions,
        factory: CacheFactory<'a, V>,
    ) -> Result<V, DomainError> {
        // Read before indexing so an invalidation landing between the two
        // still forces the computed value out.
        let epoch = self.invalidations.load(Ordering::Acquire);
        self.index(key, &options.tags);

        let computed_here = AtomicBool::new(false);
        let remote = self.remote.as_deref();
        let tags = &options.tags;

        let init = async {
            if let Some(remote) = remote {
                if let Some(slot) = self.remote_get(remote, key).await {
                    debug!(cache = self.name, "served from remote tier");
                    return Ok(slot);
                }
            }

            debug!(cache = self.name, "cache miss, computing");
            let computed = factory.await?;
            computed_here.store(true, Ordering::Release);
            let slot = Slot {
                value: computed.value,
                ttl: computed.ttl.unwrap_or(options.ttl).max(MIN_TTL),
            };
            if let Some(remote) = remote {
                self.remote_set(remote, key, &slot, tags).await;
            }
            Ok::<_, DomainError>(slot)
        };

        let slot = self
            .local
            .try_get_with(key.to_owned(), init)
            .await
            .map_err(|e| (*e).clone())?;

        // An invalidation that raced with the computation must not leave the
        // pre-invalidation value behind.
        if computed_here.load(Ordering::Acquire)
            && self.invalidations.load(Ordering::Acquire) != epoch
        {
            debug!(cache = self.name, "invalidated during computation, not retaining");
            self.local.invalidate(key).await;
            if let Some(remote) = remote {
                if let Err(e) = remote.remove(key).await {
                    warn!(cache = self.name, error = %e, "remote cache tier remove failed");
                }
            }
        }

        Ok(slot.value)
    }

    async fn invalidate_by_tag(&self, tag: &str) {
        self.invalidations.fetch_add(1, Ordering::AcqRel);
        let keys = self
            .tags
            .remove(tag)
            .map(|(_, keys)| keys)
            .unwrap_or_default();
        for key in &keys {
            self.local.invalidate(key).await;
        }
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.invalidate_by_tag(tag).await {
                warn!(cache = self.name, tag, error = %e, "remote cache tier invalidation failed");
            }
        }
        debug!(cache = self.name, tag, evicted = keys.len(), "invalidated by tag");
    }
}

/// In-process [`DistributedCacheTier`] backed by `dashmap`.
///
/// Shares entries between several [`TieredCache`] instances in one process
/// (e.g. replicas in tests or single-node deployments).
#[derive(Default)]
pub struct InProcessTier {
    entries: DashMap<String, RemoteEntry>,
    tags: DashMap<String, HashSet<String>>,
}

impl InProcessTier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored (possibly expired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DistributedCacheTier for InProcessTier {
    async fn get(&self, key: &str) -> Result<Option<RemoteEntry>, DomainError> {
        let entry = self.entries.get(key).map(|e| e.value().clone());
        match entry {
            Some(entry) if entry.expires_at > OffsetDateTime::now_utc() => Ok(Some(entry)),
            Some(_) => {
                self.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, entry: RemoteEntry, tags: &[String]) -> Result<(), DomainError> {
        self.entries.insert(key.to_owned(), entry);
        for tag in tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(key.to_owned());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn invalidate_by_tag(&self, tag: &str) -> Result<(), DomainError> {
        if let Some((_, keys)) = self.tags.remove(tag) {
            for key in keys {
                self.entries.remove(&key);
            }
        }
        Ok(())
    }
}

/// Cache that never stores anything; every call runs the factory.
pub struct NoCache<V>(PhantomData<fn() -> V>);

impl<V> Default for NoCache<V> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

#[async_trait]
impl<V> AccessCache<V> for NoCache<V>
where
    V: Send + 'static,
{
    async fn get_or_create<'a>(
        &'a self,
        _key: &'a str,
        _options: CacheEntryOptions,
        factory: CacheFactory<'a, V>,
    ) -> Result<V, DomainError> {
        factory.await.map(|computed| computed.value)
    }

    async fn invalidate_by_tag(&self, _tag: &str) {}
}
