//! Deterministic seeded random stream.
//!
//! xorshift32, so the predicting client and the authority draw identical
//! numbers. Streams are seeded from replicated values (the simulation clock
//! and the sub-step index), never from a global generator.

/// Deterministic random stream using xorshift32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    /// Seed of 0 is treated as 1 to avoid the degenerate all-zero sequence.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Stream for one physics sub-step.
    pub fn for_substep(simulation_clock: f32, iteration: u32) -> Self {
        let mixed = simulation_clock.to_bits() ^ iteration.wrapping_mul(0x9E37_79B9);
        let mut rng = Self::new(mixed);
        // Nearby clock values share most bits; discard the first draw.
        rng.next_u32();
        rng
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Returns a float in `[0, 1)`.
    pub fn next_unit(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Current generator state. Equal to the seed until the first draw.
    pub fn state(&self) -> u32 {
        self.state
    }
}
