// =============================================================================
// Entity Cache — per-kind TTL store fronting the match-history provider
// =============================================================================
//
// Three independent stores (profiles, match records, match-ID lists), each
// with its own TTL:
//   - Profiles:       1 hour   (refresh to pick up new games)
//   - Match records:  24 hours (immutable once a game ends)
//   - Match-ID lists: 15 min   (grows while the player is active)
//
// Expiry is enforced on two paths that share `CacheEntry::is_expired`:
//   - Lazily, when a read finds a stale entry (the entry is evicted).
//   - Eagerly, by a background sweep task started with `start_sweep`.
//
// Locks are only ever held for the map operation itself, never across an
// await or a remote call.
//
// Time is read through `tokio::time::Instant` so tests can pause the clock.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::profile::PlayerProfile;
use crate::types::MatchRecord;

pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MATCH_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MATCH_IDS_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

// =============================================================================
// Kinds & TTLs
// =============================================================================

/// The three independent partitions of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Profile,
    Match,
    MatchIds,
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Profile => write!(f, "profile"),
            Self::Match => write!(f, "match"),
            Self::MatchIds => write!(f, "match_ids"),
        }
    }
}

/// Per-kind time-to-live settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub profile: Duration,
    pub matches: Duration,
    pub match_ids: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE_TTL,
            matches: DEFAULT_MATCH_TTL,
            match_ids: DEFAULT_MATCH_IDS_TTL,
        }
    }
}

impl CacheTtls {
    pub fn for_kind(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Profile => self.profile,
            CacheKind::Match => self.matches,
            CacheKind::MatchIds => self.match_ids,
        }
    }

    /// Replace every zero field with the value from `fallback`.
    fn or(self, fallback: CacheTtls) -> Self {
        let pick = |value: Duration, other: Duration| if value.is_zero() { other } else { value };
        Self {
            profile: pick(self.profile, fallback.profile),
            matches: pick(self.matches, fallback.matches),
            match_ids: pick(self.match_ids, fallback.match_ids),
        }
    }
}

/// Live entry counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub profiles: usize,
    pub matches: usize,
    pub match_ids: usize,
}

// =============================================================================
// TtlStore — one generic partition
// =============================================================================

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// The one expiry rule shared by lazy eviction and the sweep.
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

struct TtlStore<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlStore<V> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str, now: Instant) -> Option<V> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }
        self.evict_if_expired(key, now);
        None
    }

    fn insert(&self, key: &str, value: V, expires_at: Instant) {
        self.entries
            .write()
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Remove `key` if it is still expired under the write lock. A writer may
    /// have refreshed it between our read and this call.
    fn evict_if_expired(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.write();
        let expired = entries.get(key).is_some_and(|e| e.is_expired(now));
        if expired {
            entries.remove(key);
        }
        expired
    }

    fn purge_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

// =============================================================================
// Sweep handle
// =============================================================================

struct SweepSignal {
    stopped: AtomicBool,
    notify: Notify,
}

/// Stops the background sweep started by [`EntityCache::start_sweep`].
/// Cloneable; `stop` is idempotent.
#[derive(Clone)]
pub struct SweepHandle {
    signal: Arc<SweepSignal>,
}

impl SweepHandle {
    fn new() -> Self {
        Self {
            signal: Arc::new(SweepSignal {
                stopped: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn stop(&self) {
        if !self.signal.stopped.swap(true, Ordering::SeqCst) {
            // notify_one stores a permit if the task is not parked yet.
            self.signal.notify.notify_one();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.signal.stopped.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SweepHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// =============================================================================
// EntityCache
// =============================================================================

/// Thread-safe in-memory cache for profiles, match records and match-ID
/// lists. Constructed explicitly and shared via `Arc`; there is no global
/// instance.
pub struct EntityCache {
    profiles: TtlStore<Arc<PlayerProfile>>,
    matches: TtlStore<Arc<MatchRecord>>,
    match_ids: TtlStore<Vec<String>>,
    ttls: RwLock<CacheTtls>,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl EntityCache {
    /// Create a cache. Zero TTLs fall back to the defaults.
    pub fn new(ttls: CacheTtls) -> Self {
        Self {
            profiles: TtlStore::new(),
            matches: TtlStore::new(),
            match_ids: TtlStore::new(),
            ttls: RwLock::new(ttls.or(CacheTtls::default())),
            sweeper: Mutex::new(None),
        }
    }

    pub fn ttls(&self) -> CacheTtls {
        *self.ttls.read()
    }

    /// Update TTLs for future writes. Zero fields keep the current value.
    /// Entries already stored keep their original expiry.
    pub fn set_ttls(&self, ttls: CacheTtls) {
        let mut current = self.ttls.write();
        *current = ttls.or(*current);
        debug!(
            profile_secs = current.profile.as_secs(),
            match_secs = current.matches.as_secs(),
            match_ids_secs = current.match_ids.as_secs(),
            "cache TTLs updated"
        );
    }

    fn expiry_for(&self, kind: CacheKind) -> Instant {
        Instant::now() + self.ttls.read().for_kind(kind)
    }

    // ── Profiles ────────────────────────────────────────────────────────

    pub fn get_profile(&self, puuid: &str) -> Option<Arc<PlayerProfile>> {
        if puuid.is_empty() {
            return None;
        }
        self.profiles.get(puuid, Instant::now())
    }

    pub fn set_profile(&self, puuid: &str, profile: Arc<PlayerProfile>) {
        if puuid.is_empty() {
            return;
        }
        let expires_at = self.expiry_for(CacheKind::Profile);
        self.profiles.insert(puuid, profile, expires_at);
    }

    // ── Match records ───────────────────────────────────────────────────

    pub fn get_match(&self, match_id: &str) -> Option<Arc<MatchRecord>> {
        if match_id.is_empty() {
            return None;
        }
        self.matches.get(match_id, Instant::now())
    }

    pub fn set_match(&self, match_id: &str, record: Arc<MatchRecord>) {
        if match_id.is_empty() {
            return;
        }
        let expires_at = self.expiry_for(CacheKind::Match);
        self.matches.insert(match_id, record, expires_at);
    }

    // ── Match-ID lists ──────────────────────────────────────────────────

    /// Returns an owned copy; mutating it never touches the cached list.
    pub fn get_match_ids(&self, puuid: &str) -> Option<Vec<String>> {
        if puuid.is_empty() {
            return None;
        }
        self.match_ids.get(puuid, Instant::now())
    }

    /// Stores a copy of `ids`.
    pub fn set_match_ids(&self, puuid: &str, ids: &[String]) {
        if puuid.is_empty() {
            return;
        }
        let expires_at = self.expiry_for(CacheKind::MatchIds);
        self.match_ids.insert(puuid, ids.to_vec(), expires_at);
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Remove every expired entry from all three stores. Returns the number
    /// of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let removed = self.profiles.purge_expired(now)
            + self.matches.purge_expired(now)
            + self.match_ids.purge_expired(now);
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        removed
    }

    /// Raw stored count for `kind`, including entries that have expired but
    /// not yet been evicted.
    pub fn len(&self, kind: CacheKind) -> usize {
        match kind {
            CacheKind::Profile => self.profiles.len(),
            CacheKind::Match => self.matches.len(),
            CacheKind::MatchIds => self.match_ids.len(),
        }
    }

    /// Live entry counts (purges first).
    pub fn stats(&self) -> CacheStats {
        self.purge_expired();
        CacheStats {
            profiles: self.len(CacheKind::Profile),
            matches: self.len(CacheKind::Match),
            match_ids: self.len(CacheKind::MatchIds),
        }
    }

    /// Start a background task that calls [`purge_expired`](Self::purge_expired)
    /// every `interval` (zero means the 5-minute default). Any sweep already
    /// running is stopped first. Must be called inside a Tokio runtime.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped.
    pub fn start_sweep(self: &Arc<Self>, interval: Duration) -> SweepHandle {
        let interval = if interval.is_zero() {
            DEFAULT_SWEEP_INTERVAL
        } else {
            interval
        };

        let handle = SweepHandle::new();
        if let Some(previous) = self.sweeper.lock().replace(handle.clone()) {
            previous.stop();
        }

        let cache: Weak<Self> = Arc::downgrade(self);
        let signal = handle.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = signal.signal.notify.notified() => break,
                    _ = ticker.tick() => {
                        if signal.is_stopped() {
                            break;
                        }
                        let Some(cache) = cache.upgrade() else { break };
                        cache.purge_expired();
                    }
                }
            }
            debug!("cache sweep task exited");
        });

        info!(interval_secs = interval.as_secs(), "cache sweep started");
        handle
    }

    /// Stop the active sweep, if any.
    pub fn stop_sweep(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.stop();
            info!("cache sweep stopped");
        }
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new(CacheTtls::default())
    }
}

impl Drop for EntityCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.stop();
        }
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("ttls", &self.ttls())
            .field("profiles", &self.profiles.len())
            .field("matches", &self.matches.len())
            .field("match_ids", &self.match_ids.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LobbyParticipant;

    fn profile(puuid: &str) -> Arc<PlayerProfile> {
        Arc::new(PlayerProfile::placeholder(&LobbyParticipant::new(puuid)))
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn short_ttls() -> CacheTtls {
        CacheTtls {
            profile: secs(10),
            matches: secs(10),
            match_ids: secs(10),
        }
    }

    #[test]
    fn zero_ttls_use_defaults() {
        let cache = EntityCache::new(CacheTtls {
            profile: Duration::ZERO,
            matches: secs(5),
            match_ids: Duration::ZERO,
        });
        let ttls = cache.ttls();
        assert_eq!(ttls.profile, DEFAULT_PROFILE_TTL);
        assert_eq!(ttls.matches, secs(5));
        assert_eq!(ttls.match_ids, DEFAULT_MATCH_IDS_TTL);
    }

    #[tokio::test(start_paused = true)]
    async fn every_kind_hits_then_expires() {
        let cache = EntityCache::new(short_ttls());
        cache.set_profile("p", profile("p"));
        cache.set_match("m", Arc::new(MatchRecord::default()));
        cache.set_match_ids("p", &ids(&["m"]));

        assert_eq!(cache.get_profile("p").map(|p| p.puuid.clone()), Some("p".into()));
        assert!(cache.get_match("m").is_some());
        assert_eq!(cache.get_match_ids("p"), Some(ids(&["m"])));

        tokio::time::advance(secs(11)).await;

        assert!(cache.get_profile("p").is_none());
        assert!(cache.get_match("m").is_none());
        assert!(cache.get_match_ids("p").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_live_exactly_at_expiry_instant() {
        let cache = EntityCache::new(short_ttls());
        cache.set_match("m", Arc::new(MatchRecord::default()));
        tokio::time::advance(secs(10)).await;
        assert!(cache.get_match("m").is_some());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get_match("m").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_read_evicts_entry() {
        let cache = EntityCache::new(short_ttls());
        cache.set_profile("p", profile("p"));
        tokio::time::advance(secs(11)).await;

        assert_eq!(cache.len(CacheKind::Profile), 1);
        assert!(cache.get_profile("p").is_none());
        assert_eq!(cache.len(CacheKind::Profile), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired_entries() {
        let cache = EntityCache::new(short_ttls());

        cache.set_profile("a", profile("a"));
        cache.set_ttls(CacheTtls { profile: secs(20), ..CacheTtls::default() });
        cache.set_profile("b", profile("b"));
        cache.set_ttls(CacheTtls { profile: secs(60), ..CacheTtls::default() });
        cache.set_profile("c", profile("c"));

        tokio::time::advance(secs(30)).await;

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(CacheKind::Profile), 1);
        assert!(cache.get_profile("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn set_ttls_leaves_stored_expiry_untouched() {
        let cache = EntityCache::new(short_ttls());
        cache.set_match("m", Arc::new(MatchRecord::default()));
        cache.set_ttls(CacheTtls { matches: secs(3600), ..short_ttls() });

        tokio::time::advance(secs(11)).await;
        assert!(cache.get_match("m").is_none());

        // New writes pick up the new TTL.
        cache.set_match("m", Arc::new(MatchRecord::default()));
        tokio::time::advance(secs(11)).await;
        assert!(cache.get_match("m").is_some());
    }

    #[test]
    fn set_ttls_zero_keeps_current() {
        let cache = EntityCache::new(short_ttls());
        cache.set_ttls(CacheTtls {
            profile: secs(99),
            matches: Duration::ZERO,
            match_ids: Duration::ZERO,
        });
        let ttls = cache.ttls();
        assert_eq!(ttls.profile, secs(99));
        assert_eq!(ttls.matches, secs(10));
        assert_eq!(ttls.match_ids, secs(10));
    }

    #[test]
    fn match_ids_are_copied_on_read_and_write() {
        let cache = EntityCache::default();
        let mut input = ids(&["a", "b"]);
        cache.set_match_ids("p", &input);
        input.push("mutated".into());

        let mut first = cache.get_match_ids("p").unwrap();
        first.clear();

        assert_eq!(cache.get_match_ids("p"), Some(ids(&["a", "b"])));
    }

    #[test]
    fn set_overwrites_previous_entry() {
        let cache = EntityCache::default();
        cache.set_match_ids("p", &ids(&["old"]));
        cache.set_match_ids("p", &ids(&["new"]));
        assert_eq!(cache.get_match_ids("p"), Some(ids(&["new"])));
        assert_eq!(cache.len(CacheKind::MatchIds), 1);
    }

    #[test]
    fn empty_keys_are_ignored() {
        let cache = EntityCache::default();
        cache.set_profile("", profile(""));
        cache.set_match_ids("", &ids(&["x"]));
        assert!(cache.get_profile("").is_none());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn stats_count_live_entries() {
        let cache = EntityCache::new(short_ttls());
        cache.set_profile("p", profile("p"));
        cache.set_ttls(CacheTtls { matches: secs(3600), ..short_ttls() });
        cache.set_match("m1", Arc::new(MatchRecord::default()));
        cache.set_match("m2", Arc::new(MatchRecord::default()));

        tokio::time::advance(secs(11)).await;
        assert_eq!(
            cache.stats(),
            CacheStats { profiles: 0, matches: 2, match_ids: 0 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_purges_in_background() {
        let cache = Arc::new(EntityCache::new(CacheTtls {
            profile: secs(2),
            ..CacheTtls::default()
        }));
        let handle = cache.start_sweep(secs(1));
        cache.set_profile("p", profile("p"));

        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(cache.len(CacheKind::Profile), 0);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_sweep_no_longer_purges() {
        let cache = Arc::new(EntityCache::new(CacheTtls {
            profile: secs(2),
            ..CacheTtls::default()
        }));
        let handle = cache.start_sweep(secs(1));
        handle.stop();
        cache.set_profile("p", profile("p"));

        tokio::time::sleep(secs(5)).await;

        assert_eq!(cache.len(CacheKind::Profile), 1);
    }

    #[tokio::test]
    async fn restarting_sweep_stops_previous() {
        let cache = Arc::new(EntityCache::default());
        let first = cache.start_sweep(secs(60));
        let second = cache.start_sweep(secs(60));

        assert!(first.is_stopped());
        assert!(!second.is_stopped());

        second.stop();
        second.stop();
        assert!(second.is_stopped());
    }

    #[tokio::test]
    async fn stop_sweep_stops_active_handle() {
        let cache = Arc::new(EntityCache::default());
        let handle = cache.start_sweep(Duration::ZERO);
        cache.stop_sweep();
        assert!(handle.is_stopped());
        // No active sweep left; this is a no-op.
        cache.stop_sweep();
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache = Arc::new(EntityCache::default());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("p{}", i % 10);
                        if (i + t) % 2 == 0 {
                            cache.set_match_ids(&key, &[format!("m{i}")]);
                        } else {
                            let _ = cache.get_match_ids(&key);
                        }
                        if i % 50 == 0 {
                            cache.purge_expired();
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(cache.len(CacheKind::MatchIds), 10);
    }
}
