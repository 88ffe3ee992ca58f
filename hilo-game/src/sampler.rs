//! Pool sampling: unbiased shuffling and non-repeating pair selection.
use hmac::{Hmac, Mac};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use std::collections::BTreeSet;

use crate::catalog::{Catalog, Item};
use crate::constants::SAMPLER_STREAM_TAG;

/// Default RNG used by sessions: a seeded, draw-counting `ChaCha20` stream.
pub type SamplerRng = CountingRng<ChaCha20Rng>;

/// Ids already shown in the current session.
pub type UsedIds = BTreeSet<String>;

/// Result of a draw, flagging when the unused pool ran dry and the full catalog was used instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw<T> {
    pub value: T,
    pub pool_reset: bool,
}

/// In-place Fisher-Yates shuffle.
///
/// Walks from the last index down, swapping each slot with a uniformly chosen
/// index in `[0, i]`, so every permutation is equally likely.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Shuffled copy of `items`, leaving the input untouched.
#[must_use]
pub fn shuffled<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut copy = items.to_vec();
    shuffle(&mut copy, rng);
    copy
}

/// Draw two distinct items that are not in `used`.
///
/// With fewer than two unused items left the pool counts as exhausted and the
/// pair comes from the whole catalog, accepting immediate repeats. Recording
/// the chosen ids is left to the caller.
///
/// # Panics
///
/// Never for a validated [`Catalog`], which always holds two distinct items.
pub fn pick_pair<'a, R: Rng + ?Sized>(
    catalog: &'a Catalog,
    used: &UsedIds,
    rng: &mut R,
) -> Draw<(&'a Item, &'a Item)> {
    let mut candidates: Vec<&Item> = catalog
        .items()
        .iter()
        .filter(|item| !used.contains(&item.id))
        .collect();
    let pool_reset = candidates.len() < 2;
    if pool_reset {
        candidates = catalog.items().iter().collect();
    }
    shuffle(&mut candidates, rng);
    let [first, second, ..] = candidates.as_slice() else {
        panic!("validated catalog holds at least two items");
    };
    Draw {
        value: (*first, *second),
        pool_reset,
    }
}

/// Draw one unused item other than `exclude_id`.
///
/// When nothing unused remains the draw falls back to every catalog item except
/// `exclude_id`, so the new item is always distinct from the reference.
///
/// # Panics
///
/// Never for a validated [`Catalog`], which always holds two distinct items.
pub fn pick_next<'a, R: Rng + ?Sized>(
    catalog: &'a Catalog,
    used: &UsedIds,
    exclude_id: &str,
    rng: &mut R,
) -> Draw<&'a Item> {
    let available = |item: &&Item| item.id != exclude_id;
    let mut candidates: Vec<&Item> = catalog
        .items()
        .iter()
        .filter(available)
        .filter(|item| !used.contains(&item.id))
        .collect();
    let pool_reset = candidates.is_empty();
    if pool_reset {
        candidates = catalog.items().iter().filter(available).collect();
    }
    let value = candidates
        .choose(rng)
        .copied()
        .expect("validated catalog holds an item besides the reference");
    Draw { value, pool_reset }
}

/// Build the sampler stream for a user-visible seed.
#[must_use]
pub fn sampler_rng(seed: u64) -> SamplerRng {
    CountingRng::new(ChaCha20Rng::seed_from_u64(derive_stream_seed(
        seed,
        SAMPLER_STREAM_TAG,
    )))
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl<R: RngCore> CountingRng<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng, draws: 0 }
    }

    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}
