//! Round lifecycle: phase transitions, guess evaluation and streak accounting.
use log::debug;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::{Catalog, Item};
use crate::constants::TIE_POLICY;
use crate::sampler::{self, SamplerRng, UsedIds};

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Start,
    Playing,
    Revealing,
    GameOver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => write!(f, "start"),
            Phase::Playing => write!(f, "playing"),
            Phase::Revealing => write!(f, "revealing"),
            Phase::GameOver => write!(f, "game_over"),
        }
    }
}

/// The player's claim about the comparison item relative to the reference item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuessDirection {
    Higher,
    Lower,
}

/// Rule for judging a guess when both metrics are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// Equal metrics satisfy both `Higher` and `Lower`.
    CountsAsCorrect,
    /// Equal metrics satisfy neither direction.
    CountsAsIncorrect,
}

impl TiePolicy {
    /// Whether `direction` correctly describes `comparison` against `reference`.
    #[must_use]
    pub const fn judge(self, reference: u64, comparison: u64, direction: GuessDirection) -> bool {
        if reference == comparison {
            return matches!(self, Self::CountsAsCorrect);
        }
        match direction {
            GuessDirection::Higher => comparison > reference,
            GuessDirection::Lower => comparison < reference,
        }
    }
}

/// Outcome shown while a guess is being revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealResult {
    Correct,
    Incorrect,
}

/// Player-facing action, used to report rejected transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartGame,
    Guess,
    Advance,
    PlayAgain,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::StartGame => write!(f, "start a game"),
            Action::Guess => write!(f, "guess"),
            Action::Advance => write!(f, "advance"),
            Action::PlayAgain => write!(f, "play again"),
        }
    }
}

/// An action issued outside its valid source phase. State is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} while the session is in phase `{phase}`")]
pub struct TransitionError {
    pub action: Action,
    pub phase: Phase,
}

/// Observable session data.
///
/// Both items are present exactly while `Playing` or `Revealing`, and
/// `last_guess_correct` only while `Revealing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionState {
    pub phase: Phase,
    pub current_item: Option<Item>,
    pub comparison_item: Option<Item>,
    pub current_streak: u32,
    pub last_guess_correct: Option<bool>,
    pub used_ids: UsedIds,
    /// Times the unused pool ran dry this round.
    #[serde(default)]
    pub pool_resets: u32,
}

/// Game session bound to a catalog and a random source.
#[derive(Debug, Clone)]
pub struct Session<R = SamplerRng> {
    catalog: Arc<Catalog>,
    rng: R,
    state: SessionState,
}

impl Session<SamplerRng> {
    /// Session driven by the deterministic sampler stream for `seed`.
    #[must_use]
    pub fn seeded(catalog: Arc<Catalog>, seed: u64) -> Self {
        Self::new(catalog, sampler::sampler_rng(seed))
    }

    /// Random draws consumed so far.
    #[must_use]
    pub const fn rng_draws(&self) -> u64 {
        self.rng.draws()
    }
}

impl<R: RngCore> Session<R> {
    /// A session waiting in `Start`.
    pub fn new(catalog: Arc<Catalog>, rng: R) -> Self {
        Self {
            catalog,
            rng,
            state: SessionState::default(),
        }
    }

    /// Begin a round. Valid from `Start` or `GameOver`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` from any other phase.
    pub fn start_game(&mut self) -> Result<(), TransitionError> {
        self.require(Action::StartGame, &[Phase::Start, Phase::GameOver])?;
        self.begin_round();
        Ok(())
    }

    /// Restart after a loss. Valid only from `GameOver`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` from any other phase.
    pub fn play_again(&mut self) -> Result<(), TransitionError> {
        self.require(Action::PlayAgain, &[Phase::GameOver])?;
        self.begin_round();
        Ok(())
    }

    /// Judge a guess and move to `Revealing`, returning whether it was correct.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless the session is `Playing`.
    pub fn guess(&mut self, direction: GuessDirection) -> Result<bool, TransitionError> {
        self.require(Action::Guess, &[Phase::Playing])?;
        let (Some(reference), Some(comparison)) =
            (&self.state.current_item, &self.state.comparison_item)
        else {
            return Err(self.rejection(Action::Guess));
        };
        let correct = TIE_POLICY.judge(reference.metric, comparison.metric, direction);
        debug!(
            "guess {direction:?}: {} ({}) vs {} ({}) -> {correct}",
            comparison.id, comparison.metric, reference.id, reference.metric
        );
        self.state.last_guess_correct = Some(correct);
        self.state.phase = Phase::Revealing;
        Ok(correct)
    }

    /// Shorthand for `guess(GuessDirection::Higher)`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless the session is `Playing`.
    pub fn guess_higher(&mut self) -> Result<bool, TransitionError> {
        self.guess(GuessDirection::Higher)
    }

    /// Shorthand for `guess(GuessDirection::Lower)`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless the session is `Playing`.
    pub fn guess_lower(&mut self) -> Result<bool, TransitionError> {
        self.guess(GuessDirection::Lower)
    }

    /// Finish the reveal: continue to `Playing` after a correct guess or end in `GameOver`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless the session is `Revealing`.
    pub fn advance(&mut self) -> Result<Phase, TransitionError> {
        self.require(Action::Advance, &[Phase::Revealing])?;
        match self.state.last_guess_correct {
            Some(true) => self.continue_streak(),
            Some(false) => self.end_round(),
            None => return Err(self.rejection(Action::Advance)),
        }
        Ok(self.state.phase)
    }

    fn begin_round(&mut self) {
        self.state.current_streak = 0;
        self.state.last_guess_correct = None;
        self.state.used_ids.clear();
        self.state.pool_resets = 0;
        let draw = sampler::pick_pair(&self.catalog, &self.state.used_ids, &mut self.rng);
        if draw.pool_reset {
            self.state.pool_resets = self.state.pool_resets.saturating_add(1);
        }
        let (reference, comparison) = draw.value;
        self.state.used_ids.insert(reference.id.clone());
        self.state.used_ids.insert(comparison.id.clone());
        self.state.current_item = Some(reference.clone());
        self.state.comparison_item = Some(comparison.clone());
        self.state.phase = Phase::Playing;
        debug!("round started: {} vs {}", reference.id, comparison.id);
    }

    fn continue_streak(&mut self) {
        let Some(reference) = self.state.comparison_item.take() else {
            self.end_round();
            return;
        };
        let draw = sampler::pick_next(
            &self.catalog,
            &self.state.used_ids,
            &reference.id,
            &mut self.rng,
        );
        if draw.pool_reset {
            self.state.pool_resets = self.state.pool_resets.saturating_add(1);
            self.state.used_ids.clear();
            self.state.used_ids.insert(reference.id.clone());
            debug!("pool exhausted; recycling catalog around {}", reference.id);
        }
        let comparison = draw.value.clone();
        self.state.used_ids.insert(comparison.id.clone());
        self.state.current_streak = self.state.current_streak.saturating_add(1);
        self.state.current_item = Some(reference);
        self.state.comparison_item = Some(comparison);
        self.state.last_guess_correct = None;
        self.state.phase = Phase::Playing;
    }

    fn end_round(&mut self) {
        self.state.current_item = None;
        self.state.comparison_item = None;
        self.state.last_guess_correct = None;
        self.state.phase = Phase::GameOver;
        debug!("game over with streak {}", self.state.current_streak);
    }

    fn require(&self, action: Action, valid: &[Phase]) -> Result<(), TransitionError> {
        if valid.contains(&self.state.phase) {
            Ok(())
        } else {
            Err(self.rejection(action))
        }
    }

    const fn rejection(&self, action: Action) -> TransitionError {
        TransitionError {
            action,
            phase: self.state.phase,
        }
    }
}

impl<R> Session<R> {
    /// Borrow the observable state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    #[must_use]
    pub const fn current_streak(&self) -> u32 {
        self.state.current_streak
    }

    #[must_use]
    pub const fn current_item(&self) -> Option<&Item> {
        self.state.current_item.as_ref()
    }

    #[must_use]
    pub const fn comparison_item(&self) -> Option<&Item> {
        self.state.comparison_item.as_ref()
    }

    #[must_use]
    pub const fn last_guess_correct(&self) -> Option<bool> {
        self.state.last_guess_correct
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Reveal outcome to display, if a guess is pending.
    #[must_use]
    pub const fn reveal_result(&self) -> Option<RevealResult> {
        match self.state.last_guess_correct {
            Some(true) => Some(RevealResult::Correct),
            Some(false) => Some(RevealResult::Incorrect),
            None => None,
        }
    }

    /// Whether the comparison item's metric may be shown.
    #[must_use]
    pub const fn shows_comparison_metric(&self) -> bool {
        matches!(self.state.phase, Phase::Revealing) || self.state.last_guess_correct.is_some()
    }

    /// Borrow the random source.
    #[must_use]
    pub const fn rng(&self) -> &R {
        &self.rng
    }
}
