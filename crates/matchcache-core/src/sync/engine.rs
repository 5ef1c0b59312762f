//! Sync engine: fetch, merge, cache and replay.
//!
//! `SyncEngine` is owned by a single task. Network fetches, avatar downloads
//! and status deliveries run on spawned Tokio tasks and report back through
//! an MPSC channel; the owner applies those results in
//! `check_background_tasks` (or `settle`), so every mutation of the cursor,
//! the published record list and the store happens on the owner's turn.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::api::{FetchError, PageFetcher, StatusSync};
use crate::cache::{ActionQueue, AssetCache, AssetError, ProfileStore, UpsertOutcome};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::models::{
    CachedProfile, Decision, DecisionStatus, PendingAction, ProfileId, RemoteRecord,
};

use super::SyncCursor;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the worker result channel.
/// One page of avatar downloads plus a few deliveries fits without blocking.
const CHANNEL_BUFFER_SIZE: usize = 64;

/// Maximum concurrent status deliveries during a queue replay.
const MAX_CONCURRENT_DELIVERIES: usize = 4;

// ============================================================================
// Notices
// ============================================================================

/// The single advisory message shown while serving degraded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// A fetch failed; the list shows what is cached locally.
    ShowingCached,
    /// Offline (or a fetch failed) and nothing is cached.
    NoCachedData,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ShowingCached => write!(f, "Unable to load data. Showing cached results."),
            Notice::NoCachedData => write!(f, "Offline mode: No cached data available."),
        }
    }
}

// ============================================================================
// Worker Results
// ============================================================================

/// Results sent from worker tasks back to the owning engine.
///
/// Every spawned unit of work sends exactly one of these, which is how the
/// engine knows when nothing is outstanding.
enum SyncEvent {
    /// A page fetch finished
    PageLoaded {
        page: u32,
        result: Result<Vec<RemoteRecord>, FetchError>,
    },
    /// An avatar download finished
    AssetCached {
        id: ProfileId,
        result: Result<PathBuf, AssetError>,
    },
    /// A decision delivery was attempted
    StatusDelivered {
        action: PendingAction,
        result: Result<(), FetchError>,
    },
}

// ============================================================================
// Engine
// ============================================================================

pub struct SyncEngine {
    store: Arc<ProfileStore>,
    queue: Arc<ActionQueue>,
    assets: Arc<AssetCache>,
    fetcher: Arc<dyn PageFetcher>,
    status_sync: Arc<dyn StatusSync>,

    page_size: u32,
    cursor: SyncCursor,
    online: bool,
    connectivity: Option<watch::Receiver<bool>>,
    /// Decisions persisted by an earlier session still await their first
    /// replay. Cleared by the first replay, whichever triggers it.
    replay_pending: bool,

    /// Everything known locally, as last published.
    records: Vec<CachedProfile>,
    notice: Option<Notice>,
    /// Cached avatar paths not yet written to the store.
    asset_paths: Vec<(ProfileId, PathBuf)>,

    events_tx: mpsc::Sender<SyncEvent>,
    events_rx: mpsc::Receiver<SyncEvent>,
    /// Worker results still to be received.
    outstanding: usize,
}

impl SyncEngine {
    pub fn new(
        store: Arc<ProfileStore>,
        queue: Arc<ActionQueue>,
        assets: Arc<AssetCache>,
        fetcher: Arc<dyn PageFetcher>,
        status_sync: Arc<dyn StatusSync>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Self {
            store,
            queue,
            assets,
            fetcher,
            status_sync,
            page_size: DEFAULT_PAGE_SIZE,
            cursor: SyncCursor::default(),
            online: true,
            connectivity: None,
            replay_pending: true,
            records: Vec::new(),
            notice: None,
            asset_paths: Vec::new(),
            events_tx,
            events_rx,
            outstanding: 0,
        }
    }

    /// Profiles requested per page. Zero is ignored.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    /// Initial connectivity state, before any signal arrives.
    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The published record list: every profile known locally.
    pub fn records(&self) -> &[CachedProfile] {
        &self.records
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn cursor(&self) -> &SyncCursor {
        &self.cursor
    }

    pub fn is_loading(&self) -> bool {
        self.cursor.is_fetching()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn pending_actions(&self) -> Vec<PendingAction> {
        self.queue.snapshot()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Publish the local snapshot without touching the network.
    pub fn load_from_cache(&mut self) {
        self.records = self.store.get_all();
        debug!(count = self.records.len(), "Loaded profiles from cache");
    }

    /// Serve the local snapshot in degraded mode.
    fn fall_back_to_cache(&mut self) {
        let snapshot = self.store.get_all();
        if snapshot.is_empty() {
            self.notice = Some(Notice::NoCachedData);
        } else {
            self.records = snapshot;
        }
    }

    /// Request the next page.
    ///
    /// Dropped while a fetch is outstanding or after the last page. When
    /// offline, serves the local snapshot instead. Failures never reach the
    /// caller; they degrade to cached data and a notice.
    pub fn load_more(&mut self) {
        if !self.cursor.can_fetch() {
            debug!(
                fetching = self.cursor.is_fetching(),
                has_more = self.cursor.has_more(),
                "load_more ignored"
            );
            return;
        }

        self.replay_previous_session();

        if !self.online {
            info!("Offline, serving cached profiles");
            self.fall_back_to_cache();
            return;
        }

        self.cursor.begin_fetch();
        let page = self.cursor.page();
        let page_size = self.page_size;
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.events_tx.clone();
        self.outstanding += 1;

        debug!(page, page_size, "Fetching page");
        tokio::spawn(async move {
            let result = fetcher.fetch(page, page_size).await;
            Self::send_event(&tx, SyncEvent::PageLoaded { page, result }).await;
        });
    }

    /// `load_more`, then wait for the fetch and everything it triggered.
    pub async fn load_more_and_settle(&mut self) {
        self.load_more();
        self.settle().await;
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Merge one fetched page into the store and republish the full snapshot.
    fn merge_page(&mut self, page: u32, records: Vec<RemoteRecord>) {
        self.flush_asset_paths();
        let local: HashMap<ProfileId, CachedProfile> = self
            .store
            .get_all()
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut scheduled = HashSet::new();
        let mut downloads = Vec::new();
        for record in &records {
            let needs_asset = local.get(&record.id).map_or(true, |p| p.needs_asset());
            if needs_asset && scheduled.insert(record.id) {
                downloads.push((record.id, record.fields.avatar_url.clone()));
            }
        }

        let outcomes = self.store.upsert_batch(&records);
        let inserted = outcomes
            .iter()
            .filter(|o| **o == UpsertOutcome::Inserted)
            .count();
        info!(
            page,
            fetched = records.len(),
            inserted,
            updated = outcomes.len() - inserted,
            "Page merged"
        );

        for (id, url) in downloads {
            self.schedule_asset(id, url);
        }

        self.records = self.store.get_all();
    }

    /// Write every avatar path gathered since the last flush in one store
    /// update.
    fn flush_asset_paths(&mut self) {
        if self.asset_paths.is_empty() {
            return;
        }
        let paths = std::mem::take(&mut self.asset_paths);
        let changed = self.store.set_local_asset_paths(&paths);
        debug!(received = paths.len(), changed, "Avatar paths recorded");
    }

    fn schedule_asset(&mut self, id: ProfileId, url: String) {
        let assets = Arc::clone(&self.assets);
        let tx = self.events_tx.clone();
        self.outstanding += 1;

        tokio::spawn(async move {
            let result = assets.fetch(id, &url).await;
            Self::send_event(&tx, SyncEvent::AssetCached { id, result }).await;
        });
    }

    // =========================================================================
    // Decisions
    // =========================================================================

    /// Record a decision locally, then deliver it now (online) or queue it
    /// for replay (offline). The local status is never reverted. A direct
    /// delivery supersedes any decision still queued for the same profile.
    pub fn decide(&mut self, id: ProfileId, decision: Decision) {
        let status = DecisionStatus::from(decision);
        if !self.store.set_status(id, status) {
            debug!(%id, "Decision for a profile that is not cached");
        }
        if let Some(profile) = self.records.iter_mut().find(|p| p.id == id) {
            profile.status = status;
        }

        if self.online {
            if let Some(stale) = self.queue.remove(id) {
                debug!(%id, %stale, "Queued decision superseded");
            }
            self.replay_previous_session();
            self.deliver(vec![PendingAction { id, decision }]);
        } else {
            self.queue.enqueue(id, decision);
        }
    }

    pub fn accept(&mut self, id: ProfileId) {
        self.decide(id, Decision::Accepted);
    }

    pub fn decline(&mut self, id: ProfileId) {
        self.decide(id, Decision::Declined);
    }

    /// Attempt delivery of each action once, in the background.
    fn deliver(&mut self, actions: Vec<PendingAction>) {
        if actions.is_empty() {
            return;
        }
        self.outstanding += actions.len();
        let status_sync = Arc::clone(&self.status_sync);
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            stream::iter(actions)
                .map(|action| {
                    let status_sync = Arc::clone(&status_sync);
                    async move {
                        let result = status_sync.notify(action.id, action.decision).await;
                        (action, result)
                    }
                })
                .buffer_unordered(MAX_CONCURRENT_DELIVERIES)
                .for_each(|(action, result)| {
                    let tx = tx.clone();
                    async move {
                        Self::send_event(&tx, SyncEvent::StatusDelivered { action, result })
                            .await;
                    }
                })
                .await;
        });
    }

    // =========================================================================
    // Connectivity
    // =========================================================================

    /// Replay every queued decision once. Drained actions are not requeued,
    /// whatever the delivery outcome.
    pub fn on_connectivity_restored(&mut self) {
        self.replay_pending = false;
        let actions = self.queue.drain_all();
        if actions.is_empty() {
            return;
        }
        info!(count = actions.len(), "Replaying pending decisions");
        self.deliver(actions);
    }

    /// Apply a connectivity sample. A false→true edge replays the queue.
    pub fn set_connectivity(&mut self, connected: bool) {
        let was_online = self.online;
        self.online = connected;

        match (was_online, connected) {
            (false, true) => {
                info!("Connectivity restored");
                self.on_connectivity_restored();
            }
            (true, false) => info!("Connectivity lost"),
            _ => {}
        }
    }

    /// Follow a connectivity signal. The current value applies immediately;
    /// later changes are picked up by `check_background_tasks`.
    pub fn watch_connectivity(&mut self, mut rx: watch::Receiver<bool>) {
        let connected = *rx.borrow_and_update();
        self.connectivity = Some(rx);
        self.set_connectivity(connected);
        self.replay_previous_session();
    }

    /// Starting online never produces a false→true edge, so decisions
    /// persisted by an earlier session are replayed on the first chance.
    fn replay_previous_session(&mut self) {
        if !self.online || !self.replay_pending {
            return;
        }
        debug!(queued = self.queue.len(), "First replay of persisted decisions");
        self.on_connectivity_restored();
    }

    fn poll_connectivity(&mut self) {
        let Some(rx) = self.connectivity.as_mut() else {
            return;
        };
        match rx.has_changed() {
            Ok(true) => {
                let connected = *rx.borrow_and_update();
                self.set_connectivity(connected);
            }
            Ok(false) => {}
            Err(_) => {
                debug!("Connectivity signal closed");
                self.connectivity = None;
            }
        }
    }

    // =========================================================================
    // Worker Results
    // =========================================================================

    /// Helper to send worker results, logging any channel errors
    async fn send_event(tx: &mpsc::Sender<SyncEvent>, event: SyncEvent) {
        if tx.send(event).await.is_err() {
            error!("Failed to send sync result - engine dropped");
        }
    }

    /// Apply connectivity changes and every worker result received so far.
    /// Never blocks.
    pub fn check_background_tasks(&mut self) {
        self.poll_connectivity();
        self.replay_previous_session();
        while let Ok(event) = self.events_rx.try_recv() {
            self.process_event(event);
        }
        self.flush_asset_paths();
    }

    /// Wait until every spawned fetch, download and delivery has reported.
    pub async fn settle(&mut self) {
        self.check_background_tasks();
        while self.outstanding > 0 {
            match self.events_rx.recv().await {
                Some(event) => self.process_event(event),
                None => break,
            }
        }
        self.flush_asset_paths();
    }

    fn process_event(&mut self, event: SyncEvent) {
        self.outstanding = self.outstanding.saturating_sub(1);

        match event {
            SyncEvent::PageLoaded { page, result } => match result {
                Ok(records) if records.is_empty() => {
                    info!(page, "Empty page, no more profiles");
                    self.cursor.exhaust();
                }
                Ok(records) => {
                    self.notice = None;
                    self.merge_page(page, records);
                    self.cursor.advance();
                }
                Err(e) => {
                    warn!(page, error = %e, "Page fetch failed, showing cached profiles");
                    self.cursor.abort();
                    self.notice = Some(Notice::ShowingCached);
                    self.fall_back_to_cache();
                }
            },
            SyncEvent::AssetCached { id, result } => match result {
                Ok(path) => {
                    if let Some(profile) = self.records.iter_mut().find(|p| p.id == id) {
                        profile.local_asset_path = Some(path.clone());
                    }
                    self.asset_paths.push((id, path));
                }
                Err(AssetError::InFlight(_)) => {
                    debug!(%id, "Avatar download already in progress");
                }
                Err(e) => {
                    debug!(%id, error = %e, "Avatar download failed, using remote URL");
                }
            },
            SyncEvent::StatusDelivered { action, result } => match result {
                Ok(()) => {
                    debug!(id = %action.id, decision = %action.decision, "Decision delivered");
                }
                Err(e) => {
                    warn!(
                        id = %action.id,
                        decision = %action.decision,
                        error = %e,
                        "Failed to deliver decision"
                    );
                }
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
