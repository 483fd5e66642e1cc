//! Engine sound voices
//!
//! A voice is one sound source (oscillator, noise, or both) with its own
//! smoothed frequency, gain and optional low-pass cutoff. Targets change at
//! control rate; frequency and gain are smoothed per sample, cutoff per
//! control block.

use std::sync::Arc;

use revline_sim::ParameterSmoother;

use crate::config::SmoothingRates;
use crate::dsp::{LowPass, NoiseBuffer, NoiseTap, Oscillator, Waveform};

pub const VOICE_COUNT: usize = 6;

/// Growl filter resonance, a bump at the cutoff for some bark
const GROWL_Q: f32 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceKind {
    /// Starter motor chug while cranking
    Starter,
    /// Fundamental firing frequency
    Rumble,
    /// Octave-up square for the harsh upper harmonics
    Growl,
    /// Filtered exhaust noise
    Exhaust,
    /// Turbo whistle
    Turbo,
    /// Dump valve burst
    BlowOff,
}

impl VoiceKind {
    pub const ALL: [VoiceKind; VOICE_COUNT] = [
        VoiceKind::Starter,
        VoiceKind::Rumble,
        VoiceKind::Growl,
        VoiceKind::Exhaust,
        VoiceKind::Turbo,
        VoiceKind::BlowOff,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VoiceKind::Starter => "starter",
            VoiceKind::Rumble => "rumble",
            VoiceKind::Growl => "growl",
            VoiceKind::Exhaust => "exhaust",
            VoiceKind::Turbo => "turbo",
            VoiceKind::BlowOff => "blow_off",
        }
    }
}

/// Where a voice wants to be
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoiceTargets {
    pub frequency: f32,
    pub gain: f32,
    pub cutoff: f32,
}

/// Observable state of one voice
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoiceSnapshot {
    pub target_frequency: f32,
    pub target_gain: f32,
    pub current_frequency: f32,
    pub current_gain: f32,
    /// `None` for unfiltered voices
    pub filter_cutoff: Option<f32>,
}

enum Source {
    Tone(Oscillator),
    Noise(NoiseTap),
    /// Square-gated noise plus a little of the square itself
    Chug(Oscillator, NoiseTap),
}

impl Source {
    #[inline]
    fn next(&mut self, frequency: f32) -> f32 {
        match self {
            Source::Tone(osc) => osc.next(frequency),
            Source::Noise(tap) => tap.next(),
            Source::Chug(osc, tap) => {
                let gate = osc.next(frequency);
                tap.next() * (0.5 + 0.5 * gate) * 0.7 + gate * 0.3
            }
        }
    }
}

/// Exponentially decaying one-shot envelope
#[derive(Debug, Clone, Copy)]
struct Burst {
    level: f32,
    decay_secs: f32,
}

pub struct Voice {
    kind: VoiceKind,
    source: Source,
    filter: Option<LowPass>,
    frequency: ParameterSmoother,
    gain: ParameterSmoother,
    cutoff: ParameterSmoother,
    burst: Option<Burst>,
}

impl Voice {
    /// Build a silent voice; `burst_decay_secs` only matters for [`VoiceKind::BlowOff`]
    pub fn new(
        kind: VoiceKind,
        sample_rate: f32,
        noise: &Arc<NoiseBuffer>,
        rates: &SmoothingRates,
        burst_decay_secs: f32,
    ) -> Self {
        let (source, cutoff) = match kind {
            VoiceKind::Starter => (
                Source::Chug(
                    Oscillator::new(Waveform::Square, sample_rate),
                    NoiseTap::new(noise.clone(), 0.1),
                ),
                Some(900.0),
            ),
            VoiceKind::Rumble => (
                Source::Tone(Oscillator::new(Waveform::Saw, sample_rate)),
                Some(400.0),
            ),
            VoiceKind::Growl => (
                Source::Tone(Oscillator::new(Waveform::Square, sample_rate).with_phase(0.37)),
                Some(600.0),
            ),
            VoiceKind::Exhaust => (Source::Noise(NoiseTap::new(noise.clone(), 0.4)), Some(800.0)),
            VoiceKind::Turbo => (Source::Tone(Oscillator::new(Waveform::Sine, sample_rate)), None),
            VoiceKind::BlowOff => (Source::Noise(NoiseTap::new(noise.clone(), 0.75)), Some(2500.0)),
        };

        let burst = (kind == VoiceKind::BlowOff).then_some(Burst {
            level: 0.0,
            decay_secs: burst_decay_secs.max(1e-3),
        });

        Self {
            kind,
            source,
            filter: cutoff.map(|c| {
                let filter = LowPass::new(sample_rate, c);
                if kind == VoiceKind::Growl {
                    filter.with_q(GROWL_Q)
                } else {
                    filter
                }
            }),
            frequency: ParameterSmoother::new(0.0, rates.frequency),
            gain: ParameterSmoother::new(0.0, rates.gain),
            cutoff: ParameterSmoother::new(cutoff.unwrap_or(0.0), rates.cutoff),
            burst,
        }
    }

    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    pub fn set_targets(&mut self, targets: VoiceTargets) {
        self.frequency.set_target(targets.frequency.max(0.0));
        self.gain.set_target(targets.gain.max(0.0));
        if self.filter.is_some() {
            self.cutoff.set_target(targets.cutoff);
        }
    }

    /// Jump straight to the target pitch (used when the voice is first built)
    pub fn snap_frequency(&mut self, frequency: f32) {
        self.frequency.snap(frequency.max(0.0));
    }

    /// Fire the one-shot envelope; no effect on voices without one
    pub fn trigger(&mut self) {
        if let Some(burst) = self.burst.as_mut() {
            burst.level = 1.0;
        }
    }

    /// Control-rate update: smooth the cutoff and refresh filter coefficients
    pub fn control(&mut self, block_dt: f32) {
        if let Some(filter) = self.filter.as_mut() {
            filter.set_cutoff(self.cutoff.step(block_dt));
        }
    }

    #[inline]
    pub fn next(&mut self, dt: f32) -> f32 {
        let frequency = self.frequency.step(dt);
        let mut gain = self.gain.step(dt);
        if let Some(burst) = self.burst.as_mut() {
            gain *= burst.level;
            burst.level *= (-dt / burst.decay_secs).exp();
        }

        let raw = self.source.next(frequency);
        let shaped = match self.filter.as_mut() {
            Some(filter) => filter.process(raw),
            None => raw,
        };
        shaped * gain
    }

    /// Gain currently applied, including any burst envelope
    pub fn level(&self) -> f32 {
        let burst = self.burst.map_or(1.0, |b| b.level);
        self.gain.value() * burst
    }

    pub fn is_audible(&self) -> bool {
        self.level() > 1e-4
    }

    pub fn snapshot(&self) -> VoiceSnapshot {
        VoiceSnapshot {
            target_frequency: self.frequency.target(),
            target_gain: self.gain.target(),
            current_frequency: self.frequency.value(),
            current_gain: self.gain.value(),
            filter_cutoff: self.filter.as_ref().map(LowPass::cutoff),
        }
    }
}
