use colored::Colorize;
use hilo_game::{
    GameEngine, JsonFileStore, KeyValueStore, Leaderboard, LeaderboardEntry, MemoryKeyValue,
    MemoryLeaderboard, StoreError,
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::logic::policy::PolicyKind;
use crate::logic::simulation::{RunSummary, Simulation, SimulationConfig, SimulationSession};

/// Aggregated runs for one policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub policy: String,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    pub best_streak: u32,
    pub average_streak: f64,
    pub total_guesses: u64,
    pub capped_runs: usize,
    pub pool_resets: u64,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    pub runs: Vec<RunSummary>,
}

/// High-score backing chosen on the command line.
#[derive(Debug, Clone)]
pub enum TesterStore {
    Memory(MemoryKeyValue),
    File(JsonFileStore),
}

impl TesterStore {
    #[must_use]
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or_else(
            || Self::Memory(MemoryKeyValue::new()),
            |path| Self::File(JsonFileStore::new(path)),
        )
    }
}

impl KeyValueStore for TesterStore {
    type Error = StoreError;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        match self {
            Self::Memory(store) => store.get(key),
            Self::File(store) => store.get(key),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        match self {
            Self::Memory(store) => store.set(key, value),
            Self::File(store) => store.set(key, value),
        }
    }

    fn delete(&self, key: &str) -> Result<(), Self::Error> {
        match self {
            Self::Memory(store) => store.delete(key),
            Self::File(store) => store.delete(key),
        }
    }
}

/// Runs policies over seeds against one engine and one shared leaderboard.
pub struct LogicTester<S: KeyValueStore> {
    engine: GameEngine<S>,
    leaderboard: Leaderboard<MemoryLeaderboard>,
    max_guesses: u32,
    verbose: bool,
}

impl<S: KeyValueStore> LogicTester<S> {
    pub fn new(engine: GameEngine<S>, max_guesses: u32, verbose: bool) -> anyhow::Result<Self> {
        let leaderboard = engine.connect_leaderboard(
            MemoryLeaderboard::new(),
            hilo_game::LeaderboardCfg::default(),
        )?;
        Ok(Self {
            engine,
            leaderboard,
            max_guesses,
            verbose,
        })
    }

    #[must_use]
    pub const fn engine(&self) -> &GameEngine<S> {
        &self.engine
    }

    /// Final leaderboard projection.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.leaderboard.entries()
    }

    pub async fn run_policy(
        &mut self,
        policy: PolicyKind,
        seeds: &[u64],
        iterations: usize,
    ) -> ScenarioResult {
        if self.verbose {
            println!("🧪 Testing policy: {}", policy.label().bright_white());
        }

        let mut runs = Vec::new();
        let mut failures = Vec::new();
        let mut durations = Vec::new();

        for &seed in seeds {
            for i in 0..iterations {
                let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
                let start_time = Instant::now();
                let summary = self.run_once(policy, iteration_seed).await;
                durations.push(start_time.elapsed());

                if summary.violations.is_empty() {
                    if self.verbose {
                        println!(
                            "  ✅ seed {iteration_seed}: streak {} in {} guesses{}",
                            summary.streak,
                            summary.guesses,
                            if summary.finished { "" } else { " (capped)" }
                        );
                    }
                } else {
                    let message = format!(
                        "seed {iteration_seed} (policy {policy}, streak {}, guesses {}): {}",
                        summary.streak,
                        summary.guesses,
                        summary.violations.join(" | ")
                    );
                    if self.verbose {
                        println!("  ❌ {}", message.clone().red());
                    }
                    failures.push(message);
                }
                runs.push(summary);
            }
        }

        aggregate(policy, runs, failures, &durations)
    }

    async fn run_once(&mut self, policy: PolicyKind, seed: u64) -> RunSummary {
        let config = SimulationConfig::new(policy, seed).with_max_guesses(self.max_guesses);
        let Simulation { session, mut summary } =
            SimulationSession::new(&self.engine, config).run();

        let Some(round) = self.engine.record_round(&session) else {
            return summary;
        };
        summary.tier = Some(round.tier);
        summary.new_high_score = round.is_new_high_score;
        if round.final_score > round.high_score {
            summary
                .violations
                .push("high score below the final streak".to_string());
        }

        if self.leaderboard.is_worthy(round.final_score) {
            let name = format!("{policy}-{seed}");
            match self
                .leaderboard
                .submit(&name, i64::from(round.final_score))
                .await
            {
                Ok(entry) => summary.leaderboard_rank = self.leaderboard.rank(&entry.id),
                Err(err) => {
                    warn!("leaderboard submission for {name} failed: {err}");
                    summary.violations.push(format!("submission failed: {err}"));
                }
            }
        }
        summary
    }
}

fn aggregate(
    policy: PolicyKind,
    runs: Vec<RunSummary>,
    failures: Vec<String>,
    durations: &[Duration],
) -> ScenarioResult {
    let average_duration = if durations.is_empty() {
        Duration::ZERO
    } else {
        durations.iter().sum::<Duration>() / u32::try_from(durations.len()).unwrap_or(u32::MAX)
    };
    let total_streak: u64 = runs.iter().map(|run| u64::from(run.streak)).sum();
    #[allow(clippy::cast_precision_loss)]
    let average_streak = if runs.is_empty() {
        0.0
    } else {
        total_streak as f64 / runs.len() as f64
    };

    ScenarioResult {
        policy: policy.label().to_string(),
        passed: failures.is_empty(),
        iterations_run: runs.len(),
        successful_iterations: runs.len() - failures.len(),
        failures,
        best_streak: runs.iter().map(|run| run.streak).max().unwrap_or(0),
        average_streak,
        total_guesses: runs.iter().map(|run| u64::from(run.guesses)).sum(),
        capped_runs: runs.iter().filter(|run| !run.finished).count(),
        pool_resets: runs.iter().map(|run| u64::from(run.pool_resets)).sum(),
        average_duration,
        runs,
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_micros().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = u128::deserialize(deserializer)?;
        Ok(Duration::from_micros(u64::try_from(micros).unwrap_or(0)))
    }
}
