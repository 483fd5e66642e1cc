//! Signal building blocks

pub mod filter;
pub mod noise;
pub mod oscillator;

pub use filter::LowPass;
pub use noise::{NoiseBuffer, NoiseTap, NOISE_SECONDS};
pub use oscillator::{Oscillator, Waveform};
