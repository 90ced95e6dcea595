//! Probability rolls for effect rules.
//!
//! Any `rand` generator works as a roll source. [`SeededRolls`] replays the
//! same sequence from a seed, which keeps a recorded punch session
//! reproducible, and [`ScriptedRolls`] feeds fixed values.

/// Source of uniform samples in `[0.0, 1.0)`.
pub trait Roll {
    fn roll(&mut self) -> f32;
}

impl<R: rand::Rng + ?Sized> Roll for R {
    fn roll(&mut self) -> f32 {
        self.random::<f32>()
    }
}

/// Deterministic roll from a session seed and a hit sequence number.
/// Returns a value in [0.0, 1.0).
pub fn deterministic_roll(seed: u64, seq: u32) -> f32 {
    let mut hash: u64 = seed ^ 0xcbf2_9ce4_8422_2325;
    hash = hash.wrapping_mul(0x100000001b3);
    hash ^= seq as u64;
    hash = hash.wrapping_mul(0x100000001b3);
    hash ^= hash >> 29;
    (hash & 0x00FF_FFFF) as f32 / 0x0100_0000 as f32
}

/// Replayable roll sequence.
#[derive(Debug, Clone)]
pub struct SeededRolls {
    seed: u64,
    seq: u32,
}

impl SeededRolls {
    pub fn new(seed: u64) -> Self {
        Self { seed, seq: 0 }
    }
}

impl Roll for SeededRolls {
    fn roll(&mut self) -> f32 {
        let value = deterministic_roll(self.seed, self.seq);
        self.seq = self.seq.wrapping_add(1);
        value
    }
}

/// Cycles through a fixed list of rolls.
#[derive(Debug, Clone)]
pub struct ScriptedRolls {
    values: Vec<f32>,
    next: usize,
}

impl ScriptedRolls {
    pub fn new(values: impl Into<Vec<f32>>) -> Self {
        Self {
            values: values.into(),
            next: 0,
        }
    }

    /// Always rolls the same value.
    pub fn constant(value: f32) -> Self {
        Self::new(vec![value])
    }

    /// How many rolls were drawn so far.
    pub fn drawn(&self) -> usize {
        self.next
    }
}

impl Roll for ScriptedRolls {
    fn roll(&mut self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}
