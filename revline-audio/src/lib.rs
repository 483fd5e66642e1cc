//! Procedural engine audio for Revline
//!
//! This crate turns vehicle snapshots into sound:
//! - Graph: lifecycle-mirrored voice bank, built on start, faded on stop
//! - Voices: starter, rumble, growl, exhaust, turbo whistle, blow-off
//! - DSP: PolyBLEP oscillators, shared noise table, biquad low-pass
//! - Mixer: master volume, mute, soft clipping
//! - Engine: audio-thread state plus the command/event handle

mod config;
pub mod dsp;
mod engine;
mod error;
mod graph;
mod mixer;
mod voice;

pub use config::{AudioConfig, BlowOffConfig, SmoothingRates};
pub use engine::{AudioCommand, AudioEngine, AudioEvent, EngineState};
pub use error::AudioError;
pub use graph::{AudioSynthesisGraph, GraphEvents, GraphPhase, GraphSnapshot};
pub use mixer::{soft_clip, MasterBus};
pub use voice::{Voice, VoiceKind, VoiceSnapshot, VoiceTargets, VOICE_COUNT};
