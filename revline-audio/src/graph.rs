//! Procedural engine sound graph
//!
//! Mirrors the vehicle lifecycle: no voices exist while the engine is off,
//! the bank is built when the engine starts turning, and stopping the engine
//! fades everything out over `fade_out_secs` before the bank is dropped and
//! the output is exact digital silence.
//!
//! Building and dropping the bank never allocates: voices live inline in an
//! `Option` and share one pre-generated noise table.

use std::sync::Arc;

use revline_sim::{Lifecycle, VehicleState};

use crate::config::AudioConfig;
use crate::dsp::NoiseBuffer;
use crate::voice::{Voice, VoiceKind, VoiceSnapshot, VoiceTargets, VOICE_COUNT};

/// Headroom so all voices at full tilt stay near unity before the master bus
const MIX_GAIN: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphPhase {
    /// No voices allocated
    Silent,
    Live,
    /// Engine stopped, bank still sounding
    FadingOut { remaining: f32 },
}

/// What changed during an update or render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphEvents {
    pub built: bool,
    pub released: bool,
    pub blow_off: bool,
}

impl GraphEvents {
    fn merge(&mut self, other: GraphEvents) {
        self.built |= other.built;
        self.released |= other.released;
        self.blow_off |= other.blow_off;
    }
}

/// Observable graph state for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphSnapshot {
    pub phase: GraphPhase,
    pub voices: [(VoiceKind, VoiceSnapshot); VOICE_COUNT],
}

struct VoiceBank {
    voices: [Voice; VOICE_COUNT],
}

impl VoiceBank {
    fn voice_mut(&mut self, kind: VoiceKind) -> &mut Voice {
        let index = VoiceKind::ALL.iter().position(|k| *k == kind).unwrap_or(0);
        &mut self.voices[index]
    }
}

pub struct AudioSynthesisGraph {
    sample_rate: f32,
    config: AudioConfig,
    max_rpm: f32,
    noise: Arc<NoiseBuffer>,
    bank: Option<VoiceBank>,
    phase: GraphPhase,
    last_lifecycle: Lifecycle,
    last_turbo: f32,
    /// Highest recent turbo pressure, the reference for a blow-off
    boost_peak: f32,
    /// Audio time left before `boost_peak` falls back to the current pressure
    boost_hold: f32,
}

impl AudioSynthesisGraph {
    /// Create a silent graph; `max_rpm` scales rpm-dependent timbre
    pub fn new(sample_rate: u32, config: &AudioConfig, max_rpm: f32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            config: config.clone(),
            max_rpm: max_rpm.max(1.0),
            noise: Arc::new(NoiseBuffer::new(sample_rate, config.noise_seed)),
            bank: None,
            phase: GraphPhase::Silent,
            last_lifecycle: Lifecycle::Off,
            last_turbo: 0.0,
            boost_peak: 0.0,
            boost_hold: 0.0,
        }
    }

    pub fn phase(&self) -> GraphPhase {
        self.phase
    }

    /// True while voices exist (live or fading)
    pub fn is_active(&self) -> bool {
        self.bank.is_some()
    }

    /// Number of voices currently making sound
    pub fn audible_voices(&self) -> usize {
        self.bank
            .as_ref()
            .map_or(0, |bank| bank.voices.iter().filter(|v| v.is_audible()).count())
    }

    pub fn snapshot(&self) -> Option<GraphSnapshot> {
        let bank = self.bank.as_ref()?;
        Some(GraphSnapshot {
            phase: self.phase,
            voices: std::array::from_fn(|i| (bank.voices[i].kind(), bank.voices[i].snapshot())),
        })
    }

    /// Apply a vehicle snapshot: lifecycle mirroring, triggers, voice targets
    pub fn update(&mut self, state: &VehicleState) -> GraphEvents {
        let mut events = GraphEvents::default();
        let active = state.lifecycle.is_active();

        match self.phase {
            GraphPhase::Silent if active => {
                self.build(state);
                self.phase = GraphPhase::Live;
                events.built = true;
            }
            GraphPhase::Live if !active => {
                self.phase = GraphPhase::FadingOut {
                    remaining: self.config.fade_out_secs,
                };
            }
            GraphPhase::FadingOut { .. } if active => {
                self.phase = GraphPhase::Live;
            }
            _ => {}
        }

        let turbo = finite_or(state.turbo_pressure, 0.0).clamp(0.0, 1.0);
        let dumped = self.track_boost(turbo);
        let bang = state.lifecycle == Lifecycle::Broken && self.last_lifecycle != Lifecycle::Broken;

        let targets = self.targets(state);
        if let Some(bank) = self.bank.as_mut() {
            for (voice, target) in bank.voices.iter_mut().zip(targets) {
                voice.set_targets(target);
            }
            if dumped || bang {
                bank.voice_mut(VoiceKind::BlowOff).trigger();
                events.blow_off = true;
            }
        }

        self.last_turbo = turbo;
        self.last_lifecycle = state.lifecycle;
        events
    }

    /// Render interleaved frames; every channel gets the same mono signal
    pub fn render(&mut self, output: &mut [f32], channels: usize) -> GraphEvents {
        let mut events = GraphEvents::default();
        let channels = channels.max(1);

        let dt = 1.0 / self.sample_rate;
        let frames = output.len() / channels;
        let block_dt = frames as f32 * dt;
        self.age_boost_peak(block_dt);

        let Some(bank) = self.bank.as_mut() else {
            output.fill(0.0);
            return events;
        };
        for voice in bank.voices.iter_mut() {
            voice.control(block_dt);
        }

        let mut released_at = None;
        for (i, frame) in output.chunks_mut(channels).enumerate() {
            let mut sample: f32 = bank.voices.iter_mut().map(|v| v.next(dt)).sum();
            sample *= MIX_GAIN;

            if let GraphPhase::FadingOut { remaining } = &mut self.phase {
                sample *= (*remaining / self.config.fade_out_secs).clamp(0.0, 1.0);
                *remaining -= dt;
                if *remaining <= 0.0 {
                    frame.fill(0.0);
                    released_at = Some(i + 1);
                    break;
                }
            }

            frame.fill(finite_or(sample, 0.0));
        }

        if let Some(frame) = released_at {
            let start = (frame * channels).min(output.len());
            output[start..].fill(0.0);
            self.bank = None;
            self.phase = GraphPhase::Silent;
            events.released = true;
        }
        events
    }

    /// Apply a snapshot then render one block
    pub fn process_block(&mut self, state: &VehicleState, output: &mut [f32], channels: usize) -> GraphEvents {
        let mut events = self.update(state);
        events.merge(self.render(output, channels));
        events
    }

    /// Follow turbo pressure against its recent peak; true on a dump
    ///
    /// An upshift empties the turbo between two snapshots, a throttle lift
    /// bleeds it over a few hundred milliseconds. Comparing against a held
    /// peak catches both.
    fn track_boost(&mut self, turbo: f32) -> bool {
        let blow = &self.config.blow_off;
        if turbo >= self.boost_peak {
            self.boost_peak = turbo;
            self.boost_hold = blow.hold_secs;
            return false;
        }
        let dumped = self.boost_peak > blow.armed && self.boost_peak - turbo > blow.drop;
        if dumped {
            // One burst per dump
            self.boost_peak = turbo;
            self.boost_hold = blow.hold_secs;
        }
        dumped
    }

    fn age_boost_peak(&mut self, dt: f32) {
        if self.boost_hold > 0.0 {
            self.boost_hold -= dt;
        }
        if self.boost_hold <= 0.0 {
            self.boost_peak = self.last_turbo;
        }
    }

    fn build(&mut self, state: &VehicleState) {
        let rates = &self.config.rates;
        let decay = self.config.blow_off.decay_secs;
        let voices = std::array::from_fn(|i| {
            Voice::new(VoiceKind::ALL[i], self.sample_rate, &self.noise, rates, decay)
        });
        let mut bank = VoiceBank { voices };

        // Start on pitch, from silence
        for (voice, target) in bank.voices.iter_mut().zip(self.targets(state)) {
            voice.snap_frequency(target.frequency);
        }
        self.bank = Some(bank);
    }

    /// Voice targets for a vehicle state, in `VoiceKind::ALL` order
    fn targets(&self, state: &VehicleState) -> [VoiceTargets; VOICE_COUNT] {
        let rpm = finite_or(state.rpm, 0.0).max(0.0);
        let rpm_frac = (rpm / self.max_rpm).clamp(0.0, 1.0);
        let turbo = finite_or(state.turbo_pressure, 0.0).clamp(0.0, 1.0);
        let firing = rpm / 60.0 * 1.5;

        let cranking = state.lifecycle == Lifecycle::Cranking;
        let turning = matches!(state.lifecycle, Lifecycle::Running | Lifecycle::Stalled);
        // Snapshot carries no pedal position; rpm and boost stand in for load
        let load = (0.4 * rpm_frac + 0.6 * turbo).clamp(0.0, 1.0);

        let starter = VoiceTargets {
            frequency: 10.0 + 5.0 * ((rpm - 160.0) / 120.0).clamp(0.0, 1.0),
            gain: if cranking { 0.5 } else { 0.0 },
            cutoff: 900.0,
        };
        let rumble = VoiceTargets {
            frequency: firing,
            gain: if turning {
                0.35 + 0.15 * rpm_frac
            } else if cranking {
                0.1
            } else {
                0.0
            },
            cutoff: 200.0 + rpm * 0.15,
        };
        let growl = VoiceTargets {
            frequency: firing * 2.0,
            gain: if turning { 0.08 + 0.17 * rpm_frac } else { 0.0 },
            cutoff: 300.0 + rpm * 0.25,
        };
        let exhaust = VoiceTargets {
            frequency: 0.0,
            gain: if turning {
                0.04 + 0.2 * load + if state.nitro_active { 0.08 } else { 0.0 }
            } else {
                0.0
            },
            cutoff: 500.0 + rpm * 0.3 + 1500.0 * turbo,
        };
        let whistle = VoiceTargets {
            frequency: 2000.0 + 5000.0 * turbo,
            gain: if turning { 0.2 * turbo } else { 0.0 },
            cutoff: 0.0,
        };
        let blow_off = VoiceTargets {
            frequency: 0.0,
            gain: self.config.blow_off.gain,
            cutoff: 2500.0,
        };

        [starter, rumble, growl, exhaust, whistle, blow_off]
    }
}

#[inline]
fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 48_000;
    const BLOCK: usize = 64;

    fn graph() -> AudioSynthesisGraph {
        AudioSynthesisGraph::new(SR, &AudioConfig::default(), 8000.0)
    }

    fn state(lifecycle: Lifecycle, rpm: f32, turbo: f32) -> VehicleState {
        VehicleState {
            rpm,
            turbo_pressure: turbo,
            lifecycle,
            temperature: 90.0,
            ..Default::default()
        }
    }

    /// Run `seconds` of stereo audio and return the peak absolute sample
    fn run(g: &mut AudioSynthesisGraph, s: &VehicleState, seconds: f32) -> f32 {
        let blocks = (seconds * SR as f32 / BLOCK as f32).ceil() as usize;
        let mut buf = [0.0f32; BLOCK * 2];
        let mut peak: f32 = 0.0;
        for _ in 0..blocks {
            g.process_block(s, &mut buf, 2);
            peak = buf.iter().fold(peak, |p, x| p.max(x.abs()));
        }
        peak
    }

    #[test]
    fn test_off_renders_silence() {
        let mut g = graph();
        let peak = run(&mut g, &state(Lifecycle::Off, 0.0, 0.0), 0.5);
        assert_eq!(peak, 0.0);
        assert!(!g.is_active());
        assert!(g.snapshot().is_none());
    }

    #[test]
    fn test_cranking_builds_bank() {
        let mut g = graph();
        let events = g.update(&state(Lifecycle::Cranking, 220.0, 0.0));
        assert!(events.built);
        assert_eq!(g.phase(), GraphPhase::Live);

        let peak = run(&mut g, &state(Lifecycle::Cranking, 220.0, 0.0), 0.3);
        assert!(peak > 0.01);

        let snap = g.snapshot().unwrap();
        let (kind, starter) = snap.voices[0];
        assert_eq!(kind, VoiceKind::Starter);
        assert_eq!(starter.target_gain, 0.5);
        assert!((10.0..=15.0).contains(&starter.current_frequency));
    }

    #[test]
    fn test_rumble_tracks_rpm() {
        let mut g = graph();
        run(&mut g, &state(Lifecycle::Running, 900.0, 0.0), 0.1);
        let idle = g.snapshot().unwrap().voices[1].1;
        assert!((idle.target_frequency - 22.5).abs() < 1e-3);

        run(&mut g, &state(Lifecycle::Running, 6000.0, 0.0), 1.0);
        let revved = g.snapshot().unwrap().voices[1].1;
        assert_eq!(revved.target_frequency, 150.0);
        assert!(revved.current_frequency > 140.0);
        assert!(revved.filter_cutoff.unwrap() > idle.filter_cutoff.unwrap());
    }

    #[test]
    fn test_turbo_whistle_follows_pressure() {
        let mut g = graph();
        run(&mut g, &state(Lifecycle::Running, 5000.0, 1.0), 0.1);
        let turbo = g.snapshot().unwrap().voices[4].1;
        assert_eq!(turbo.target_frequency, 7000.0);
        assert!((turbo.target_gain - 0.2).abs() < 1e-6);
        assert!(turbo.filter_cutoff.is_none());
    }

    #[test]
    fn test_blow_off_on_pressure_drop() {
        let mut g = graph();
        g.update(&state(Lifecycle::Running, 7000.0, 0.9));
        let events = g.update(&state(Lifecycle::Running, 4500.0, 0.0));
        assert!(events.blow_off);
        assert!(g.snapshot().unwrap().voices[5].1.target_gain > 0.0);
    }

    #[test]
    fn test_blow_off_on_throttle_lift() {
        use revline_sim::{Simulation, VehicleConfig};

        const SIM_DT: f32 = 1.0 / 60.0;
        let frames_per_tick = (SR as f32 * SIM_DT) as usize;

        let mut sim = Simulation::new(VehicleConfig::default());
        let mut g = graph();
        let mut buf = [0.0f32; BLOCK * 2];

        // Render one simulation tick of audio against the current snapshot
        let mut tick = |sim: &mut Simulation, g: &mut AudioSynthesisGraph| -> (VehicleState, bool) {
            let s = sim.tick(SIM_DT);
            let mut fired = false;
            for _ in 0..frames_per_tick / BLOCK {
                fired |= g.process_block(&s, &mut buf, 2).blow_off;
            }
            (s, fired)
        };

        sim.request_ignition_toggle().unwrap();
        for _ in 0..90 {
            tick(&mut sim, &mut g);
        }

        // Hold a burnout until the turbo is well spooled
        sim.set_gas(1.0);
        sim.set_brake(1.0);
        let mut boost = 0.0;
        for _ in 0..(60 * 10) {
            let (s, fired) = tick(&mut sim, &mut g);
            assert!(!fired);
            boost = s.turbo_pressure;
            if boost > 0.8 {
                break;
            }
        }
        assert!(boost > 0.8);
        assert_eq!(sim.state().lifecycle, Lifecycle::Running);

        // Lift off: the turbo only bleeds, no single tick drops much
        sim.set_gas(0.0);
        sim.set_brake(0.0);
        let mut fired = false;
        let mut largest_step: f32 = 0.0;
        let mut prev = boost;
        for _ in 0..60 {
            let (s, f) = tick(&mut sim, &mut g);
            largest_step = largest_step.max(prev - s.turbo_pressure);
            prev = s.turbo_pressure;
            fired |= f;
        }
        assert!(largest_step < 0.1);
        assert!(fired);
    }

    #[test]
    fn test_slow_boost_decay_is_quiet() {
        let mut g = graph();
        let mut buf = [0.0f32; BLOCK * 2];
        let mut turbo = 0.9;
        // 0.05 per half second never falls 0.3 inside the hold window
        for _ in 0..12 {
            let s = state(Lifecycle::Running, 4000.0, turbo);
            for _ in 0..(SR as usize / 2 / BLOCK) {
                assert!(!g.process_block(&s, &mut buf, 2).blow_off);
            }
            turbo -= 0.05;
        }
    }

    #[test]
    fn test_no_blow_off_from_low_boost() {
        let mut g = graph();
        g.update(&state(Lifecycle::Running, 4000.0, 0.5));
        assert!(!g.update(&state(Lifecycle::Running, 3000.0, 0.0)).blow_off);
    }

    #[test]
    fn test_bang_on_break() {
        let mut g = graph();
        g.update(&state(Lifecycle::Running, 8000.0, 0.0));
        let events = g.update(&state(Lifecycle::Broken, 7800.0, 0.0));
        assert!(events.blow_off);
        assert!(matches!(g.phase(), GraphPhase::FadingOut { .. }));
    }

    #[test]
    fn test_stop_fades_then_silence() {
        let mut g = graph();
        assert!(run(&mut g, &state(Lifecycle::Running, 3000.0, 0.0), 0.5) > 0.01);

        let off = state(Lifecycle::Off, 0.0, 0.0);
        g.update(&off);
        assert!(matches!(g.phase(), GraphPhase::FadingOut { .. }));

        // Just past the fade window everything is gone
        let mut released = false;
        let mut buf = [0.0f32; BLOCK * 2];
        let blocks = (0.26 * SR as f32 / BLOCK as f32).ceil() as usize;
        for _ in 0..blocks {
            released |= g.process_block(&off, &mut buf, 2).released;
        }
        assert!(released);
        assert!(!g.is_active());
        assert_eq!(g.phase(), GraphPhase::Silent);

        for _ in 0..100 {
            g.process_block(&off, &mut buf, 2);
            assert!(buf.iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_restart_during_fade_keeps_bank() {
        let mut g = graph();
        run(&mut g, &state(Lifecycle::Running, 3000.0, 0.0), 0.1);
        g.update(&state(Lifecycle::Off, 0.0, 0.0));
        let events = g.update(&state(Lifecycle::Cranking, 220.0, 0.0));
        assert!(!events.built);
        assert_eq!(g.phase(), GraphPhase::Live);
    }

    #[test]
    fn test_nan_state_is_harmless() {
        let mut g = graph();
        let bad = VehicleState {
            rpm: f32::NAN,
            turbo_pressure: f32::INFINITY,
            lifecycle: Lifecycle::Running,
            ..Default::default()
        };
        let mut buf = [0.0f32; BLOCK];
        for _ in 0..50 {
            g.process_block(&bad, &mut buf, 1);
            assert!(buf.iter().all(|x| x.is_finite()));
        }
    }

    #[test]
    fn test_mono_and_stereo_match() {
        let mut mono = graph();
        let mut stereo = graph();
        let s = state(Lifecycle::Running, 2500.0, 0.3);
        let mut m = [0.0f32; BLOCK];
        let mut st = [0.0f32; BLOCK * 2];
        for _ in 0..10 {
            mono.process_block(&s, &mut m, 1);
            stereo.process_block(&s, &mut st, 2);
        }
        for (i, x) in m.iter().enumerate() {
            assert_eq!(*x, st[i * 2]);
            assert_eq!(*x, st[i * 2 + 1]);
        }
    }
}
