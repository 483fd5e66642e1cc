//! Shared white-noise table
//!
//! The table is filled once, outside the audio callback, and shared through
//! an `Arc`. Each consumer reads it through its own [`NoiseTap`], starting
//! at a different offset so two noise voices never play the same samples in
//! lockstep.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Seconds of noise held in the table
pub const NOISE_SECONDS: f32 = 2.0;

#[derive(Debug)]
pub struct NoiseBuffer {
    samples: Box<[f32]>,
}

impl NoiseBuffer {
    /// Generate `NOISE_SECONDS` of uniform white noise in [-1, 1]
    pub fn new(sample_rate: u32, seed: u64) -> Self {
        let len = ((sample_rate as f32 * NOISE_SECONDS) as usize).max(1);
        let mut rng = SmallRng::seed_from_u64(seed);
        let samples = (0..len).map(|_| rng.gen_range(-1.0f32..=1.0)).collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    fn get(&self, index: usize) -> f32 {
        self.samples[index % self.samples.len()]
    }
}

/// Looping read cursor into a shared [`NoiseBuffer`]
#[derive(Debug, Clone)]
pub struct NoiseTap {
    buffer: Arc<NoiseBuffer>,
    position: usize,
}

impl NoiseTap {
    /// Start reading at `offset` (fraction 0.0-1.0 of the table)
    pub fn new(buffer: Arc<NoiseBuffer>, offset: f32) -> Self {
        let position = (offset.clamp(0.0, 1.0) * buffer.len() as f32) as usize % buffer.len();
        Self { buffer, position }
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let sample = self.buffer.get(self.position);
        self.position += 1;
        if self.position >= self.buffer.len() {
            self.position = 0;
        }
        sample
    }
}
