use std::collections::BTreeSet;

use hilo_game::{
    GameEngine, GuessDirection, Item, KeyValueStore, Phase, RevealResult, Session, StreakTier,
    TIE_POLICY, format_compact,
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::logic::policy::{GuessPolicy, PolicyKind};

/// Configuration for one simulated round.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub seed: u64,
    pub policy: PolicyKind,
    pub max_guesses: u32,
}

impl SimulationConfig {
    #[must_use]
    pub fn new(policy: PolicyKind, seed: u64) -> Self {
        Self {
            seed,
            policy,
            max_guesses: 100,
        }
    }

    #[must_use]
    pub fn with_max_guesses(mut self, max_guesses: u32) -> Self {
        self.max_guesses = max_guesses;
        self
    }
}

/// Outcome of a simulated round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    pub policy: String,
    pub streak: u32,
    pub guesses: u32,
    /// False when the guess cap stopped the round before a miss.
    pub finished: bool,
    pub pool_resets: u32,
    pub rng_draws: u64,
    pub tier: Option<StreakTier>,
    pub new_high_score: bool,
    pub leaderboard_rank: Option<usize>,
    pub violations: Vec<String>,
}

/// A played session plus what was observed while playing it.
pub struct Simulation {
    pub session: Session,
    pub summary: RunSummary,
}

/// Drives a seeded session with a policy, checking state-machine invariants on every step.
pub struct SimulationSession {
    session: Session,
    policy: Box<dyn GuessPolicy>,
    config: SimulationConfig,
    summary: RunSummary,
    seen: BTreeSet<String>,
    seen_resets: u32,
}

impl SimulationSession {
    pub fn new<S: KeyValueStore>(engine: &GameEngine<S>, config: SimulationConfig) -> Self {
        Self {
            session: engine.new_session(config.seed),
            policy: config.policy.create_policy(config.seed),
            summary: RunSummary {
                seed: config.seed,
                policy: config.policy.label().to_string(),
                ..RunSummary::default()
            },
            config,
            seen: BTreeSet::new(),
            seen_resets: 0,
        }
    }

    /// Play until the round is lost or the guess cap is hit.
    #[must_use]
    pub fn run(mut self) -> Simulation {
        if let Err(err) = self.session.start_game() {
            self.violation(format!("start rejected: {err}"));
            return self.finish();
        }
        self.track_pair();

        while self.session.phase() == Phase::Playing
            && self.summary.guesses < self.config.max_guesses
        {
            if !self.step() {
                break;
            }
        }
        self.finish()
    }

    fn step(&mut self) -> bool {
        let (Some(reference), Some(comparison)) = (
            self.session.current_item().cloned(),
            self.session.comparison_item().cloned(),
        ) else {
            self.violation("playing without both items".to_string());
            return false;
        };
        let direction = self.policy.pick(&reference, &comparison);
        log_pair(&reference, &comparison, direction);
        let expected = TIE_POLICY.judge(reference.metric, comparison.metric, direction);
        let streak_before = self.session.current_streak();

        let correct = match self.session.guess(direction) {
            Ok(correct) => correct,
            Err(err) => {
                self.violation(format!("guess rejected while playing: {err}"));
                return false;
            }
        };
        self.summary.guesses += 1;
        self.check_reveal(correct, expected);
        if self.config.policy.never_loses() && !correct {
            self.violation(format!(
                "{} missed on {} vs {}",
                self.policy.name(),
                comparison.id,
                reference.id
            ));
        }

        match self.session.advance() {
            Ok(Phase::Playing) => {
                if self.session.current_streak() != streak_before + 1 {
                    self.violation(format!(
                        "streak {} after correct guess from {streak_before}",
                        self.session.current_streak()
                    ));
                }
                if self.session.current_item().map(|item| item.id.as_str())
                    != Some(comparison.id.as_str())
                {
                    self.violation("comparison item did not become the reference".to_string());
                }
                self.track_pair();
                true
            }
            Ok(Phase::GameOver) => {
                if correct {
                    self.violation("correct guess ended the round".to_string());
                }
                if self.session.current_streak() != streak_before {
                    self.violation("streak changed on a miss".to_string());
                }
                if self.session.current_item().is_some()
                    || self.session.comparison_item().is_some()
                {
                    self.violation("items still present after game over".to_string());
                }
                false
            }
            Ok(phase) => {
                self.violation(format!("advance landed in phase `{phase}`"));
                false
            }
            Err(err) => {
                self.violation(format!("advance rejected while revealing: {err}"));
                false
            }
        }
    }

    fn check_reveal(&mut self, correct: bool, expected: bool) {
        if correct != expected {
            self.violation(format!("judged {correct}, expected {expected}"));
        }
        let expected_result = if correct {
            RevealResult::Correct
        } else {
            RevealResult::Incorrect
        };
        if self.session.reveal_result() != Some(expected_result) {
            self.violation("reveal result does not match the guess".to_string());
        }
        if !self.session.shows_comparison_metric() {
            self.violation("comparison metric hidden while revealing".to_string());
        }
        let before = self.session.state().clone();
        if self.session.guess(GuessDirection::Higher).is_ok()
            || self.session.start_game().is_ok()
        {
            self.violation("transition accepted while revealing".to_string());
        }
        if self.session.state() != &before {
            self.violation("rejected transition mutated state".to_string());
        }
    }

    fn track_pair(&mut self) {
        let state = self.session.state();
        let (Some(reference), Some(comparison)) = (&state.current_item, &state.comparison_item)
        else {
            return;
        };
        if reference.id == comparison.id {
            let id = reference.id.clone();
            self.violation(format!("{id} compared against itself"));
            return;
        }
        let resets = state.pool_resets;
        let reference_id = reference.id.clone();
        let comparison_id = comparison.id.clone();
        if resets != self.seen_resets {
            self.seen_resets = resets;
            self.seen.clear();
        } else if self.seen.contains(&comparison_id) {
            self.violation(format!("{comparison_id} repeated before the pool ran out"));
        }
        self.seen.insert(reference_id);
        self.seen.insert(comparison_id);
    }

    fn violation(&mut self, message: String) {
        debug!("seed {}: {message}", self.config.seed);
        self.summary.violations.push(message);
    }

    fn finish(mut self) -> Simulation {
        self.summary.streak = self.session.current_streak();
        self.summary.finished = self.session.phase() == Phase::GameOver;
        self.summary.pool_resets = self.session.state().pool_resets;
        self.summary.rng_draws = self.session.rng_draws();
        Simulation {
            session: self.session,
            summary: self.summary,
        }
    }
}

fn log_pair(reference: &Item, comparison: &Item, direction: GuessDirection) {
    debug!(
        "{} ({}) vs {} ({}): {direction:?}",
        reference.name,
        format_compact(reference.metric),
        comparison.name,
        format_compact(comparison.metric)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use hilo_game::{Catalog, MemoryKeyValue};

    fn engine(metrics: &[u64]) -> GameEngine<MemoryKeyValue> {
        let items = metrics
            .iter()
            .enumerate()
            .map(|(i, &metric)| Item::new(&format!("m{i}"), &format!("Meme {i}"), metric))
            .collect();
        GameEngine::from_catalog(Catalog::new(items).unwrap(), MemoryKeyValue::new())
    }

    #[test]
    fn oracle_runs_to_the_cap_without_violations() {
        let engine = engine(&[5, 40, 12, 900, 77, 3]);
        let config = SimulationConfig::new(PolicyKind::Oracle, 11).with_max_guesses(25);
        let summary = SimulationSession::new(&engine, config).run().summary;
        assert!(summary.violations.is_empty(), "{:?}", summary.violations);
        assert_eq!(summary.guesses, 25);
        assert_eq!(summary.streak, 25);
        assert!(!summary.finished);
        assert!(summary.pool_resets > 0);
        assert!(summary.rng_draws > 0);
    }

    #[test]
    fn fixed_policies_eventually_lose_cleanly() {
        let engine = engine(&[1, 2, 3, 4, 5, 6, 7, 8]);
        for policy in [PolicyKind::AlwaysHigher, PolicyKind::AlwaysLower, PolicyKind::Random] {
            for seed in 0..16 {
                let config = SimulationConfig::new(policy, seed).with_max_guesses(500);
                let Simulation { session, summary } = SimulationSession::new(&engine, config).run();
                assert!(summary.violations.is_empty(), "{policy} {seed}: {:?}", summary.violations);
                assert!(summary.finished, "{policy} {seed} never lost");
                assert_eq!(session.phase(), Phase::GameOver);
                assert_eq!(summary.streak + 1, summary.guesses);
            }
        }
    }

    #[test]
    fn same_seed_same_summary() {
        let engine = engine(&[10, 20, 30, 40, 50]);
        let config = SimulationConfig::new(PolicyKind::Random, 3);
        let first = SimulationSession::new(&engine, config).run().summary;
        let second = SimulationSession::new(&engine, config).run().summary;
        assert_eq!(first, second);
    }
}
