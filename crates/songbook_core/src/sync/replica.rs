//! Replica manager: the sync state machine owning the published snapshot.
//!
//! # Responsibility
//! - Publish cached data fast on startup, then reconcile with the remote
//!   provider when reachable.
//! - Run the periodic background refresh without overlapping an in-flight
//!   sync.
//!
//! # Invariants
//! - `is_syncing` is reset on every exit path, including failures.
//! - A failed initial/forced refresh falls back to the cached records; a
//!   failed periodic refresh leaves the last good snapshot untouched.
//! - At most one periodic timer is alive at a time.

use crate::model::song::{SongKey, SongRecord};
use crate::remote::{self, RemoteSource};
use crate::repo::song_repo::SongRepository;
use crate::search::index::{build_search_index, SearchableSong};
use crate::sync::change::has_changed;
use crate::sync::connectivity::ConnectivityProbe;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;

/// Default cadence of the background refresh.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Published replica state: the snapshot, its derived search projection and
/// the sync status flags. Replaced as a whole on every publish; readers get
/// cheap `Arc` clones and never mutate.
#[derive(Debug, Clone, Default)]
pub struct ReplicaState {
    pub snapshot: Arc<Vec<SongRecord>>,
    pub search: Arc<Vec<SearchableSong>>,
    pub is_syncing: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Sync orchestrator and single writer of [`ReplicaState`].
pub struct ReplicaManager {
    repo: Arc<dyn SongRepository>,
    remote: Option<Arc<dyn RemoteSource>>,
    connectivity: Arc<dyn ConnectivityProbe>,
    state: RwLock<ReplicaState>,
    /// Single-flight gate for the periodic sync critical section. A real
    /// mutex, not an advisory boolean: `try_lock` closes the check-then-act
    /// race between the timer and an explicit load.
    sync_gate: tokio::sync::Mutex<()>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ReplicaManager {
    pub fn new(
        repo: Arc<dyn SongRepository>,
        remote: Option<Arc<dyn RemoteSource>>,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        Self {
            repo,
            remote,
            connectivity,
            state: RwLock::new(ReplicaState::default()),
            sync_gate: tokio::sync::Mutex::new(()),
            timer: Mutex::new(None),
        }
    }

    /// Returns a point-in-time copy of the published state.
    pub fn state(&self) -> ReplicaState {
        self.state.read().clone()
    }

    /// Current published snapshot.
    pub fn snapshot(&self) -> Arc<Vec<SongRecord>> {
        Arc::clone(&self.state.read().snapshot)
    }

    /// Memoized search projection derived from the published snapshot.
    pub fn searchable(&self) -> Arc<Vec<SearchableSong>> {
        Arc::clone(&self.state.read().search)
    }

    pub fn is_syncing(&self) -> bool {
        self.state.read().is_syncing
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_synced_at
    }

    /// Loads the replica: cached records first, then a remote refresh when
    /// the device is online and a remote source is configured.
    ///
    /// Never returns an error; every failure is logged and degraded so the
    /// consuming UI only ever observes `is_syncing` and the snapshot.
    pub async fn load_initial(&self, force: bool) {
        let _syncing = self.begin_syncing();
        info!("event=replica_load module=sync status=start force={force}");

        let cached = match self.repo.read_all() {
            Ok(records) => records,
            Err(err) => {
                warn!("event=replica_load module=sync status=degraded error={err}");
                Vec::new()
            }
        };

        if !cached.is_empty() && !force {
            // Fast path: the UI gets data before any network round trip.
            self.publish(cached.clone());
        }

        let online = self.connectivity.is_online();
        let remote = self.remote.as_ref().filter(|_| online);

        let Some(remote) = remote else {
            if cached.is_empty() {
                self.publish(Vec::new());
            } else {
                if force {
                    self.publish(cached);
                }
                self.set_last_synced_at(self.stored_last_synced_at());
            }
            info!("event=replica_load module=sync status=ok source=cache online={online}");
            return;
        };

        match remote::fetch_all(remote.as_ref()).await {
            Ok(records) => {
                let synced_at = Utc::now();
                self.publish(records.clone());
                if let Err(err) = self.repo.replace_all(&records, synced_at) {
                    warn!("event=replica_load module=sync status=degraded error={err}");
                }
                self.set_last_synced_at(Some(synced_at));
                info!(
                    "event=replica_load module=sync status=ok source=remote records={}",
                    records.len()
                );
            }
            Err(err) => {
                // Keep the working offline experience: fall back to the
                // cache (or empty when there is none) instead of clearing a
                // snapshot the user was just shown.
                error!("event=replica_load module=sync status=error error={err}");
                self.set_last_synced_at(self.stored_last_synced_at());
                self.publish(cached);
            }
        }
    }

    /// Timer callback: a no-op, non-overlapping variant of the sync path.
    ///
    /// Skips when offline, when no remote source is configured, when a sync
    /// is already published as in flight, or when the single-flight gate is
    /// held. A fetch failure leaves the snapshot untouched.
    pub async fn perform_periodic_sync(&self) {
        let Some(remote) = self.remote.as_ref() else {
            debug!("event=periodic_sync module=sync status=skip reason=no_remote");
            return;
        };
        if !self.connectivity.is_online() {
            debug!("event=periodic_sync module=sync status=skip reason=offline");
            return;
        }
        if self.is_syncing() {
            debug!("event=periodic_sync module=sync status=skip reason=sync_in_progress");
            return;
        }
        let Ok(_flight) = self.sync_gate.try_lock() else {
            debug!("event=periodic_sync module=sync status=skip reason=in_flight");
            return;
        };

        let _syncing = self.begin_syncing();
        match remote::fetch_all(remote.as_ref()).await {
            Ok(records) => {
                let synced_at = Utc::now();
                let current = self.snapshot();
                if has_changed(&current, &records) {
                    self.publish(records.clone());
                    if let Err(err) = self.repo.replace_all(&records, synced_at) {
                        warn!("event=periodic_sync module=sync status=degraded error={err}");
                    }
                    info!(
                        "event=periodic_sync module=sync status=ok changed=true records={}",
                        records.len()
                    );
                } else {
                    // Nothing new; stamp metadata only and skip the rewrite.
                    if let Err(err) = self.repo.write_last_synced_at(synced_at) {
                        warn!("event=periodic_sync module=sync status=degraded error={err}");
                    }
                    info!("event=periodic_sync module=sync status=ok changed=false");
                }
                self.set_last_synced_at(Some(synced_at));
            }
            Err(err) => {
                error!("event=periodic_sync module=sync status=error error={err}");
            }
        }
    }

    /// Starts the recurring background refresh, cancelling any previous
    /// timer first. Returns a cancellation handle for the new timer.
    pub fn start_periodic_sync(self: &Arc<Self>, interval: Duration) -> AbortHandle {
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of `interval` completes immediately; consume it
            // so the first refresh happens one full period from now.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.perform_periodic_sync().await;
            }
        });
        let handle = task.abort_handle();

        let mut timer = self.timer.lock();
        if let Some(previous) = timer.replace(task) {
            previous.abort();
        }
        info!(
            "event=periodic_sync module=sync status=scheduled interval_s={}",
            interval.as_secs()
        );
        handle
    }

    /// Cancels the periodic timer. Safe to call with no active timer.
    pub fn stop_periodic_sync(&self) {
        if let Some(task) = self.timer.lock().take() {
            task.abort();
            info!("event=periodic_sync module=sync status=stopped");
        }
    }

    /// Resolves one record: published snapshot, then the local store, then a
    /// single remote lookup. First hit wins; `None` when all three miss.
    pub async fn get_by_key(&self, key: SongKey) -> Option<SongRecord> {
        if let Some(song) = self.snapshot().iter().find(|song| song.key() == key) {
            return Some(song.clone());
        }

        match self.repo.read_all() {
            Ok(cached) => {
                if let Some(song) = cached.into_iter().find(|song| song.key() == key) {
                    return Some(song);
                }
            }
            Err(err) => warn!("event=get_by_key module=sync status=degraded error={err}"),
        }

        let remote = self.remote.as_ref()?;
        if !self.connectivity.is_online() {
            return None;
        }
        match remote::fetch_by_key(remote.as_ref(), key).await {
            Ok(song) => song,
            Err(err) => {
                warn!("event=get_by_key module=sync status=error key={key} error={err}");
                None
            }
        }
    }

    /// Durable favourites set backing the query view's favourites filter.
    /// Storage failures degrade to an empty set.
    pub fn favourites(&self) -> BTreeSet<SongKey> {
        match self.repo.read_favourites() {
            Ok(favourites) => favourites,
            Err(err) => {
                warn!("event=favourites module=sync status=degraded error={err}");
                BTreeSet::new()
            }
        }
    }

    /// Adds or removes one key from the favourites set and persists it.
    /// Returns the updated set.
    pub fn toggle_favourite(&self, key: SongKey) -> BTreeSet<SongKey> {
        let mut favourites = self.favourites();
        if !favourites.remove(&key) {
            favourites.insert(key);
        }
        if let Err(err) = self.repo.write_favourites(&favourites) {
            warn!("event=favourites module=sync status=degraded error={err}");
        }
        favourites
    }

    /// Replaces the published snapshot and rebuilds the search projection in
    /// the same write. Never a partial update.
    fn publish(&self, records: Vec<SongRecord>) {
        let search = build_search_index(&records);
        let mut state = self.state.write();
        state.snapshot = Arc::new(records);
        state.search = Arc::new(search);
    }

    fn set_last_synced_at(&self, at: Option<DateTime<Utc>>) {
        self.state.write().last_synced_at = at;
    }

    fn stored_last_synced_at(&self) -> Option<DateTime<Utc>> {
        match self.repo.read_last_synced_at() {
            Ok(at) => at,
            Err(err) => {
                warn!("event=replica_load module=sync status=degraded error={err}");
                None
            }
        }
    }

    fn begin_syncing(&self) -> SyncingFlag<'_> {
        self.state.write().is_syncing = true;
        SyncingFlag { manager: self }
    }
}

impl Drop for ReplicaManager {
    fn drop(&mut self) {
        // The timer must not keep waking up after the owning context is
        // gone.
        if let Some(task) = self.timer.lock().take() {
            task.abort();
        }
    }
}

/// Scoped reset of the published `is_syncing` flag.
struct SyncingFlag<'a> {
    manager: &'a ReplicaManager,
}

impl Drop for SyncingFlag<'_> {
    fn drop(&mut self) {
        self.manager.state.write().is_syncing = false;
    }
}
