//! Meme Higher or Lower game engine
//!
//! Platform-agnostic core logic: the session state machine, pool sampling,
//! best-streak persistence and the shared leaderboard synchronizer. Rendering
//! and platform storage are supplied by the host through the traits below.

pub mod catalog;
pub mod constants;
pub mod format;
pub mod high_score;
pub mod leaderboard;
pub mod numbers;
pub mod result;
pub mod sampler;
pub mod session;

use anyhow::Context;
use std::sync::Arc;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogData, CatalogError, EmbeddedCatalog, Item, JsonFileCatalog};
pub use constants::{HIGH_SCORE_KEY, MAX_ENTRIES, MAX_NAME_LENGTH, TIE_POLICY};
pub use format::{format_compact, format_with_commas};
pub use high_score::{HighScoreStore, JsonFileStore, KeyValueStore, MemoryKeyValue, StoreError};
pub use leaderboard::{
    BackendError, EntryDraft, Leaderboard, LeaderboardBackend, LeaderboardCfg,
    LeaderboardConfigError, LeaderboardEntry, MemoryLeaderboard, RankedQuery, SubmitError,
    SubscriptionHandle,
};
pub use result::{RoundSummary, StreakTier};
pub use sampler::{CountingRng, Draw, SamplerRng, pick_next, pick_pair, shuffle, shuffled};
pub use session::{
    Action, GuessDirection, Phase, RevealResult, Session, SessionState, TiePolicy,
    TransitionError,
};

/// Trait for abstracting catalog loading
/// Platform-specific implementations should provide this
pub trait CatalogLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the raw catalog document
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or parsed.
    fn load_catalog(&self) -> Result<CatalogData, Self::Error>;
}

/// Main game engine owning the catalog and the best-streak store
pub struct GameEngine<S>
where
    S: KeyValueStore,
{
    catalog: Arc<Catalog>,
    high_score: HighScoreStore<S>,
}

impl<S> GameEngine<S>
where
    S: KeyValueStore,
{
    /// Load and validate the catalog, then open the high-score store
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or is invalid. Both are
    /// startup failures; store problems only degrade persistence.
    pub fn new<L: CatalogLoader>(loader: &L, store: S) -> anyhow::Result<Self> {
        let data = loader.load_catalog().context("loading catalog")?;
        let catalog = Catalog::from_data(data).context("validating catalog")?;
        Ok(Self::from_catalog(catalog, store))
    }

    /// Build an engine around an already validated catalog
    pub fn from_catalog(catalog: Catalog, store: S) -> Self {
        Self {
            catalog: Arc::new(catalog),
            high_score: HighScoreStore::open(store),
        }
    }

    #[must_use]
    pub const fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Create a session in `Start`, sampling with the stream for `seed`
    #[must_use]
    pub fn new_session(&self, seed: u64) -> Session {
        Session::seeded(Arc::clone(&self.catalog), seed)
    }

    /// Best streak recorded so far
    #[must_use]
    pub const fn high_score(&self) -> u32 {
        self.high_score.read()
    }

    /// Offer a finished round's streak to the high-score store
    ///
    /// Returns `None` unless the session is in `GameOver`.
    pub fn record_round<R>(&mut self, session: &Session<R>) -> Option<RoundSummary> {
        if session.phase() != Phase::GameOver {
            return None;
        }
        let previous = self.high_score.read();
        let streak = session.current_streak();
        let is_new = self.high_score.offer(streak);
        Some(RoundSummary::new(streak, previous, is_new))
    }

    /// Clear the best streak
    pub fn reset_high_score(&mut self) {
        self.high_score.reset();
    }

    /// Open a leaderboard view whose score bound is this catalog's size
    ///
    /// # Errors
    ///
    /// Returns an error if `cfg` is invalid.
    pub fn connect_leaderboard<B: LeaderboardBackend>(
        &self,
        backend: B,
        cfg: LeaderboardCfg,
    ) -> Result<Leaderboard<B>, LeaderboardConfigError> {
        Leaderboard::connect(backend, cfg, self.catalog.max_score())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl CatalogLoader for FixtureLoader {
        type Error = Infallible;

        fn load_catalog(&self) -> Result<CatalogData, Self::Error> {
            Ok(CatalogData {
                memes: vec![
                    Item::new("a", "A", 100),
                    Item::new("b", "B", 50),
                    Item::new("c", "C", 10),
                ],
            })
        }
    }

    struct EmptyLoader;

    impl CatalogLoader for EmptyLoader {
        type Error = Infallible;

        fn load_catalog(&self) -> Result<CatalogData, Self::Error> {
            Ok(CatalogData::default())
        }
    }

    fn lose_immediately(session: &mut Session) {
        session.start_game().unwrap();
        let reference = session.current_item().unwrap().metric;
        let comparison = session.comparison_item().unwrap().metric;
        let wrong = if comparison >= reference {
            GuessDirection::Lower
        } else {
            GuessDirection::Higher
        };
        session.guess(wrong).unwrap();
        session.advance().unwrap();
    }

    #[test]
    fn engine_loads_catalog_and_creates_sessions() {
        let engine = GameEngine::new(&FixtureLoader, MemoryKeyValue::new()).unwrap();
        assert_eq!(engine.catalog().len(), 3);
        let session = engine.new_session(0xABCD);
        assert_eq!(session.phase(), Phase::Start);
    }

    #[test]
    fn undersized_catalog_is_fatal() {
        let err = GameEngine::new(&EmptyLoader, MemoryKeyValue::new())
            .err()
            .expect("empty catalog must fail");
        assert!(format!("{err:#}").contains("at least 2 items"));
    }

    #[test]
    fn record_round_only_after_game_over() {
        let kv = MemoryKeyValue::new();
        let mut engine = GameEngine::new(&FixtureLoader, kv.clone()).unwrap();
        let mut session = engine.new_session(1);
        assert!(engine.record_round(&session).is_none());

        lose_immediately(&mut session);
        let summary = engine.record_round(&session).unwrap();
        assert_eq!(summary.final_score, 0);
        assert!(!summary.is_new_high_score);
        assert_eq!(summary.tier, StreakTier::Blank);
        assert_eq!(kv.peek(HIGH_SCORE_KEY), None);
    }

    #[test]
    fn high_score_survives_engine_restart() {
        let kv = MemoryKeyValue::new();
        let mut engine = GameEngine::new(&FixtureLoader, kv.clone()).unwrap();
        let mut session = engine.new_session(2);
        session.start_game().unwrap();
        let reference = session.current_item().unwrap().metric;
        let comparison = session.comparison_item().unwrap().metric;
        let right = if comparison >= reference {
            GuessDirection::Higher
        } else {
            GuessDirection::Lower
        };
        session.guess(right).unwrap();
        session.advance().unwrap();
        let reference = session.current_item().unwrap().metric;
        let comparison = session.comparison_item().unwrap().metric;
        let wrong = if comparison >= reference {
            GuessDirection::Lower
        } else {
            GuessDirection::Higher
        };
        session.guess(wrong).unwrap();
        session.advance().unwrap();

        let summary = engine.record_round(&session).unwrap();
        assert!(summary.is_new_high_score);
        assert_eq!(summary.high_score, 1);
        assert!(!engine.record_round(&session).unwrap().is_new_high_score);

        let reopened = GameEngine::new(&FixtureLoader, kv).unwrap();
        assert_eq!(reopened.high_score(), 1);
    }

    #[test]
    fn leaderboard_bound_is_catalog_size() {
        let engine = GameEngine::new(&FixtureLoader, MemoryKeyValue::new()).unwrap();
        let board = engine
            .connect_leaderboard(MemoryLeaderboard::new(), LeaderboardCfg::default())
            .unwrap();
        assert_eq!(board.max_score(), 3);
        assert!(!board.is_loading());
    }
}
