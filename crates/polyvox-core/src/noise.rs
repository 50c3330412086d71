//! White noise.

/// Xorshift32 white noise in -1..1.
///
/// Deterministic for a given seed, so voices can be decorrelated by seeding
/// each one differently.
#[derive(Debug, Clone)]
pub struct WhiteNoise {
    state: u32,
}

impl Default for WhiteNoise {
    fn default() -> Self {
        Self::new(0x1234_5678)
    }
}

impl WhiteNoise {
    /// Create from a seed. A zero seed is replaced, since xorshift would
    /// stay at zero forever.
    pub fn new(seed: u32) -> Self {
        Self { state: if seed == 0 { 0x9E37_79B9 } else { seed } }
    }

    /// Next sample.
    #[inline]
    pub fn tick(&mut self) -> f32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}
