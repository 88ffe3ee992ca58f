use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use hilo_game::{GuessDirection, Item, TIE_POLICY};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Policy interface for automated guessing.
pub trait GuessPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Pick a direction for the comparison item relative to the reference.
    fn pick(&mut self, reference: &Item, comparison: &Item) -> GuessDirection;
}

/// Built-in guessing strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Reads both metrics and always answers correctly
    Oracle,
    AlwaysHigher,
    AlwaysLower,
    /// Coin flip from a seeded stream
    Random,
}

impl PolicyKind {
    pub const ALL: [Self; 4] = [
        Self::Oracle,
        Self::AlwaysHigher,
        Self::AlwaysLower,
        Self::Random,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PolicyKind::Oracle => "oracle",
            PolicyKind::AlwaysHigher => "always-higher",
            PolicyKind::AlwaysLower => "always-lower",
            PolicyKind::Random => "random",
        }
    }

    /// Whether every guess this policy makes is correct.
    #[must_use]
    pub const fn never_loses(self) -> bool {
        matches!(self, PolicyKind::Oracle)
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn GuessPolicy> {
        match self {
            PolicyKind::Oracle => Box::new(OraclePolicy),
            PolicyKind::AlwaysHigher => Box::new(FixedPolicy(GuessDirection::Higher)),
            PolicyKind::AlwaysLower => Box::new(FixedPolicy(GuessDirection::Lower)),
            PolicyKind::Random => Box::new(RandomPolicy::new(seed)),
        }
    }

    /// Expand a `--policy` list, where `all` selects every policy.
    pub fn resolve(tokens: &[String]) -> Result<Vec<Self>> {
        let mut kinds = Vec::new();
        for token in tokens {
            if token.eq_ignore_ascii_case("all") {
                return Ok(Self::ALL.to_vec());
            }
            let kind = token.parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            bail!("no policies given");
        }
        Ok(kinds)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PolicyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown policy '{s}'"))
    }
}

struct OraclePolicy;
struct FixedPolicy(GuessDirection);

struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl GuessPolicy for OraclePolicy {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn pick(&mut self, reference: &Item, comparison: &Item) -> GuessDirection {
        if TIE_POLICY.judge(reference.metric, comparison.metric, GuessDirection::Higher) {
            GuessDirection::Higher
        } else {
            GuessDirection::Lower
        }
    }
}

impl GuessPolicy for FixedPolicy {
    fn name(&self) -> &'static str {
        match self.0 {
            GuessDirection::Higher => "always-higher",
            GuessDirection::Lower => "always-lower",
        }
    }

    fn pick(&mut self, _reference: &Item, _comparison: &Item) -> GuessDirection {
        self.0
    }
}

impl GuessPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn pick(&mut self, _reference: &Item, _comparison: &Item) -> GuessDirection {
        if self.rng.gen_bool(0.5) {
            GuessDirection::Higher
        } else {
            GuessDirection::Lower
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn oracle_picks_the_true_direction() {
        let low = Item::new("low", "Low", 10);
        let high = Item::new("high", "High", 90);
        let mut oracle = PolicyKind::Oracle.create_policy(0);
        assert_eq!(oracle.pick(&low, &high), GuessDirection::Higher);
        assert_eq!(oracle.pick(&high, &low), GuessDirection::Lower);
        assert!(TIE_POLICY.judge(10, 10, oracle.pick(&low, &low)));
    }

    #[test]
    fn random_policy_is_reproducible_per_seed() {
        let a = Item::new("a", "A", 1);
        let b = Item::new("b", "B", 2);
        let mut first = PolicyKind::Random.create_policy(9);
        let mut second = PolicyKind::Random.create_policy(9);
        let left: Vec<_> = (0..32).map(|_| first.pick(&a, &b)).collect();
        let right: Vec<_> = (0..32).map(|_| second.pick(&a, &b)).collect();
        assert_eq!(left, right);
        assert!(left.contains(&GuessDirection::Higher));
        assert!(left.contains(&GuessDirection::Lower));
    }

    #[test]
    fn resolve_handles_all_duplicates_and_unknowns() {
        assert_eq!(
            PolicyKind::resolve(&strings(&["all"])).unwrap(),
            PolicyKind::ALL.to_vec()
        );
        assert_eq!(
            PolicyKind::resolve(&strings(&["Oracle", "oracle", "always-lower"])).unwrap(),
            vec![PolicyKind::Oracle, PolicyKind::AlwaysLower]
        );
        assert!(PolicyKind::resolve(&strings(&["psychic"])).is_err());
        assert!(PolicyKind::resolve(&[]).is_err());
    }

    #[test]
    fn names_match_labels() {
        for kind in PolicyKind::ALL {
            assert_eq!(kind.create_policy(1).name(), kind.label());
            assert_eq!(kind.to_string(), kind.label());
        }
    }
}
