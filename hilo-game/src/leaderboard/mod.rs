//! Live projection of the shared top-N leaderboard, plus validated submission.
//!
//! The backend owns the ranked collection. [`Leaderboard`] keeps a read-only,
//! locally ordered copy fed by a push subscription and answers rank and
//! "worth submitting" questions against that copy. Subscription failures are
//! logged and leave the last projection in place.
use async_trait::async_trait;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use crate::constants::{MAX_ENTRIES, MAX_NAME_LENGTH};

pub mod memory;
pub mod sanitize;
pub use memory::MemoryLeaderboard;
pub use sanitize::{sanitize_player_name, validate_score};

/// Inline storage for a projection of the default size.
pub type EntryList = SmallVec<[LeaderboardEntry; MAX_ENTRIES]>;

/// Callback receiving a full ordered snapshot.
pub type ChangeListener = Box<dyn FnMut(Vec<LeaderboardEntry>)>;

/// Callback receiving a subscription failure.
pub type ErrorListener = Box<dyn FnMut(BackendError)>;

/// A ranked entry as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Backend-assigned document id.
    pub id: String,
    pub player_name: String,
    pub score: u32,
    /// Server-assigned, monotonic milliseconds.
    pub timestamp: u64,
}

/// Document written by a client; the backend adds the id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub player_name: String,
    pub score: u32,
}

/// Capped ranked query: score descending, then timestamp ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedQuery {
    pub limit: usize,
}

impl Default for RankedQuery {
    fn default() -> Self {
        Self { limit: MAX_ENTRIES }
    }
}

/// Leaderboard ordering. Ids break exact ties so the order is total.
#[must_use]
pub fn rank_order(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.timestamp.cmp(&b.timestamp))
        .then_with(|| a.id.cmp(&b.id))
}

/// Failures reported by the shared backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("leaderboard backend unavailable: {0}")]
    Unavailable(String),
    #[error("leaderboard write rejected: {0}")]
    WriteRejected(String),
    #[error("leaderboard subscription failed: {0}")]
    Subscription(String),
}

/// Why a submission was not written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("score {score} outside 0..={max}")]
    ScoreOutOfRange { score: i64, max: u32 },
    #[error("player name is empty after sanitizing")]
    EmptyName,
    #[error("another submission is still in flight")]
    InFlight,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Cancels a live subscription when called or dropped.
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl SubscriptionHandle {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving updates.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Shared ranked collection with push updates and append-only writes.
#[async_trait(?Send)]
pub trait LeaderboardBackend {
    /// Start pushing ordered snapshots for `query` to `on_change`, and failures to `on_error`.
    fn subscribe(
        &self,
        query: RankedQuery,
        on_change: ChangeListener,
        on_error: ErrorListener,
    ) -> SubscriptionHandle;

    /// Append a document, letting the backend assign id and timestamp.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` when the write does not land.
    async fn append(&self, draft: EntryDraft) -> Result<LeaderboardEntry, BackendError>;
}

/// Leaderboard tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardCfg {
    #[serde(default = "LeaderboardCfg::default_capacity")]
    pub capacity: usize,
    #[serde(default = "LeaderboardCfg::default_max_name_len")]
    pub max_name_len: usize,
}

impl LeaderboardCfg {
    #[must_use]
    pub const fn default_capacity() -> usize {
        MAX_ENTRIES
    }

    #[must_use]
    pub const fn default_max_name_len() -> usize {
        MAX_NAME_LENGTH
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `LeaderboardConfigError` when a limit is zero.
    pub fn validate(&self) -> Result<(), LeaderboardConfigError> {
        if self.capacity == 0 {
            return Err(LeaderboardConfigError::MinViolation {
                field: "capacity",
                min: 1,
                value: self.capacity,
            });
        }
        if self.max_name_len == 0 {
            return Err(LeaderboardConfigError::MinViolation {
                field: "max_name_len",
                min: 1,
                value: self.max_name_len,
            });
        }
        Ok(())
    }
}

impl Default for LeaderboardCfg {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            max_name_len: Self::default_max_name_len(),
        }
    }
}

/// Errors raised when leaderboard configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeaderboardConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: usize,
        value: usize,
    },
}

#[derive(Debug)]
struct Projection {
    entries: EntryList,
    is_loading: bool,
    last_error: Option<BackendError>,
}

impl Projection {
    fn new() -> Self {
        Self {
            entries: EntryList::new(),
            is_loading: true,
            last_error: None,
        }
    }

    fn apply(&mut self, mut snapshot: Vec<LeaderboardEntry>, capacity: usize) {
        snapshot.sort_by(rank_order);
        snapshot.truncate(capacity);
        self.entries = snapshot.into_iter().collect();
        self.is_loading = false;
        self.last_error = None;
    }

    fn fail(&mut self, err: BackendError) {
        self.is_loading = false;
        self.last_error = Some(err);
    }
}

struct InFlightGuard<'a>(&'a Cell<bool>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Client-side view of the shared leaderboard.
pub struct Leaderboard<B> {
    // Declared first so the subscription is cancelled before the backend drops.
    subscription: RefCell<Option<SubscriptionHandle>>,
    backend: B,
    cfg: LeaderboardCfg,
    max_score: u32,
    view: Rc<RefCell<Projection>>,
    last_added: RefCell<Option<LeaderboardEntry>>,
    in_flight: Cell<bool>,
}

impl<B: LeaderboardBackend> Leaderboard<B> {
    /// Validate `cfg` and open the push subscription.
    ///
    /// `max_score` bounds accepted scores; pass the catalog size.
    ///
    /// # Errors
    ///
    /// Returns `LeaderboardConfigError` for invalid configuration.
    pub fn connect(
        backend: B,
        cfg: LeaderboardCfg,
        max_score: u32,
    ) -> Result<Self, LeaderboardConfigError> {
        cfg.validate()?;
        let board = Self {
            subscription: RefCell::new(None),
            backend,
            cfg,
            max_score,
            view: Rc::new(RefCell::new(Projection::new())),
            last_added: RefCell::new(None),
            in_flight: Cell::new(false),
        };
        board.open_subscription();
        Ok(board)
    }

    fn open_subscription(&self) {
        let capacity = self.cfg.capacity;
        let on_change = {
            let view = Rc::downgrade(&self.view);
            Box::new(move |snapshot: Vec<LeaderboardEntry>| {
                if let Some(view) = view.upgrade() {
                    view.borrow_mut().apply(snapshot, capacity);
                }
            })
        };
        let on_error = {
            let view = Rc::downgrade(&self.view);
            Box::new(move |err: BackendError| {
                error!("leaderboard subscription error, keeping last snapshot: {err}");
                if let Some(view) = view.upgrade() {
                    view.borrow_mut().fail(err);
                }
            })
        };
        let handle = self
            .backend
            .subscribe(RankedQuery { limit: capacity }, on_change, on_error);
        *self.subscription.borrow_mut() = Some(handle);
    }

    /// Cancel the subscription. The last projection stays readable.
    pub fn disconnect(&self) {
        if let Some(handle) = self.subscription.borrow_mut().take() {
            handle.cancel();
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    /// Validate, sanitize and append a new entry.
    ///
    /// Nothing is retried; a failed write is logged and returned.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError` for an out-of-range score, an empty sanitized name,
    /// an overlapping submission, or a backend failure.
    pub async fn submit(
        &self,
        player_name: &str,
        score: i64,
    ) -> Result<LeaderboardEntry, SubmitError> {
        let Some(score) = validate_score(score, self.max_score) else {
            warn!("rejecting leaderboard score {score} (max {})", self.max_score);
            return Err(SubmitError::ScoreOutOfRange {
                score,
                max: self.max_score,
            });
        };
        let player_name = sanitize_player_name(player_name, self.cfg.max_name_len);
        if player_name.is_empty() {
            return Err(SubmitError::EmptyName);
        }
        if self.in_flight.replace(true) {
            return Err(SubmitError::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match self.backend.append(EntryDraft { player_name, score }).await {
            Ok(entry) => {
                *self.last_added.borrow_mut() = Some(entry.clone());
                Ok(entry)
            }
            Err(err) => {
                error!("leaderboard write failed: {err}");
                Err(err.into())
            }
        }
    }

    /// 1-based position of `entry_id` in the local projection.
    #[must_use]
    pub fn rank(&self, entry_id: &str) -> Option<usize> {
        self.view
            .borrow()
            .entries
            .iter()
            .position(|entry| entry.id == entry_id)
            .map(|index| index + 1)
    }

    /// Whether `score` looks good enough to prompt for a name.
    ///
    /// Only a hint: the backend's capped ordering decides what is really shown.
    #[must_use]
    pub fn is_worthy(&self, score: u32) -> bool {
        if score == 0 {
            return false;
        }
        let view = self.view.borrow();
        if view.entries.len() < self.cfg.capacity {
            return true;
        }
        view.entries
            .last()
            .is_none_or(|lowest| score > lowest.score)
    }

    /// Copy of the ordered projection.
    ///
    /// Owned so callers can hold it while the backend pushes new snapshots.
    #[must_use]
    pub fn entries(&self) -> Vec<LeaderboardEntry> {
        self.view.borrow().entries.to_vec()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.view.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True until the first snapshot or subscription error arrives.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.view.borrow().is_loading
    }

    /// Most recent subscription failure, cleared by the next snapshot.
    #[must_use]
    pub fn last_error(&self) -> Option<BackendError> {
        self.view.borrow().last_error.clone()
    }

    /// The last entry this client wrote successfully.
    #[must_use]
    pub fn last_added_entry(&self) -> Option<LeaderboardEntry> {
        self.last_added.borrow().clone()
    }

    #[must_use]
    pub const fn max_score(&self) -> u32 {
        self.max_score
    }

    #[must_use]
    pub const fn config(&self) -> &LeaderboardCfg {
        &self.cfg
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B> fmt::Debug for Leaderboard<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.view.borrow();
        f.debug_struct("Leaderboard")
            .field("entries", &view.entries.len())
            .field("is_loading", &view.is_loading)
            .field("max_score", &self.max_score)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, score: u32, timestamp: u64) -> LeaderboardEntry {
        LeaderboardEntry {
            id: id.to_string(),
            player_name: id.to_uppercase(),
            score,
            timestamp,
        }
    }

    fn connect(backend: &MemoryLeaderboard) -> Leaderboard<MemoryLeaderboard> {
        Leaderboard::connect(backend.clone(), LeaderboardCfg::default(), 16).unwrap()
    }

    #[test]
    fn ordering_is_score_desc_then_oldest_first() {
        let mut entries = vec![
            entry("late", 5, 20),
            entry("top", 9, 30),
            entry("early", 5, 10),
        ];
        entries.sort_by(rank_order);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["top", "early", "late"]);
    }

    #[test]
    fn config_defaults_and_validation() {
        let cfg: LeaderboardCfg = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, LeaderboardCfg::default());
        assert_eq!(cfg.capacity, 10);
        assert_eq!(cfg.max_name_len, 20);

        let bad = LeaderboardCfg {
            capacity: 0,
            ..LeaderboardCfg::default()
        };
        assert_eq!(
            bad.validate(),
            Err(LeaderboardConfigError::MinViolation {
                field: "capacity",
                min: 1,
                value: 0
            })
        );
        assert!(Leaderboard::connect(MemoryLeaderboard::new(), bad, 16).is_err());
    }

    #[tokio::test]
    async fn submit_writes_sanitized_entry_and_remembers_it() {
        let backend = MemoryLeaderboard::new();
        let board = connect(&backend);
        let written = board.submit("  <Ada>  ", 7).await.unwrap();
        assert_eq!(written.player_name, "Ada");
        assert_eq!(written.score, 7);
        assert_eq!(board.last_added_entry(), Some(written.clone()));
        assert_eq!(board.rank(&written.id), Some(1));
        assert_eq!(backend.document_count(), 1);
    }

    #[tokio::test]
    async fn invalid_submissions_never_touch_the_backend() {
        let backend = MemoryLeaderboard::new();
        let board = connect(&backend);
        assert_eq!(
            board.submit("ada", -1).await,
            Err(SubmitError::ScoreOutOfRange { score: -1, max: 16 })
        );
        assert_eq!(
            board.submit("ada", 17).await,
            Err(SubmitError::ScoreOutOfRange { score: 17, max: 16 })
        );
        assert_eq!(board.submit("   ", 3).await, Err(SubmitError::EmptyName));
        assert_eq!(board.submit("<>", 3).await, Err(SubmitError::EmptyName));
        assert_eq!(backend.document_count(), 0);
        assert_eq!(board.last_added_entry(), None);
    }

    #[tokio::test]
    async fn failed_write_is_returned_not_retried() {
        let backend = MemoryLeaderboard::new();
        let board = connect(&backend);
        let offline = BackendError::Unavailable("offline".into());
        backend.fail_next_append(offline.clone());
        assert_eq!(board.submit("ada", 3).await, Err(offline.into()));
        assert_eq!(backend.document_count(), 0);
        assert_eq!(board.last_added_entry(), None);
        assert!(board.submit("ada", 3).await.is_ok());
    }

    #[tokio::test]
    async fn worthiness_tracks_the_lowest_full_board_score() {
        let backend = MemoryLeaderboard::new();
        let board = connect(&backend);
        assert!(!board.is_worthy(0));
        assert!(board.is_worthy(1));
        for score in 3..13 {
            backend.insert_now("seed", score);
        }
        assert_eq!(board.len(), 10);
        assert!(!board.is_worthy(0));
        assert!(!board.is_worthy(3));
        assert!(board.is_worthy(4));
    }

    #[test]
    fn disconnect_keeps_projection_and_stops_updates() {
        let backend = MemoryLeaderboard::new();
        let board = connect(&backend);
        backend.insert_now("first", 2);
        assert_eq!(board.len(), 1);
        board.disconnect();
        assert!(!board.is_connected());
        assert_eq!(backend.subscriber_count(), 0);
        backend.insert_now("second", 4);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn dropping_the_board_cancels_its_subscription() {
        let backend = MemoryLeaderboard::new();
        {
            let _board = connect(&backend);
            assert_eq!(backend.subscriber_count(), 1);
        }
        assert_eq!(backend.subscriber_count(), 0);
    }
}
