//! The simulation facade
//!
//! A single owner for the vehicle: driver intents go in through the setters,
//! `tick` advances physics by one frame, and every reader gets a copy of the
//! resulting [`VehicleState`]. There is no shared mutable store; publishing
//! a snapshot to other threads is [`crate::publish`]'s job.

use std::collections::VecDeque;
use std::fmt;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tracing::{info, warn};

use crate::config::VehicleConfig;
use crate::controls::ControlInputs;
use crate::dynamics::{DynamicsIntegrator, StepReport};
use crate::error::SimError;
use crate::lifecycle::Transition;
use crate::state::{Lifecycle, VehicleState};

/// Pending notices beyond this are dropped oldest-first
const MAX_NOTICES: usize = 32;

/// Overheating re-arms once temperature falls this far below the warning
const OVERHEAT_HYSTERESIS: f32 = 5.0;

/// Short system messages for the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Cranking,
    Started,
    Stalled,
    Overheating,
    EngineBroken,
    IgnitionRejected,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Notice::Cranking => "CRANKING...",
            Notice::Started => "ENGINE STARTED",
            Notice::Stalled => "STALLED",
            Notice::Overheating => "OVERHEATING!",
            Notice::EngineBroken => "ENGINE BLOWN",
            Notice::IgnitionRejected => "ENGINE BROKEN - RESET TO CONTINUE",
        };
        f.write_str(text)
    }
}

/// Owns one vehicle and advances it frame by frame
///
/// Generic over the jitter source so tests can inject their own; the
/// default is a `SmallRng` seeded from [`VehicleConfig::seed`], which makes
/// identical input sequences produce identical trajectories.
pub struct Simulation<R = SmallRng> {
    config: VehicleConfig,
    integrator: DynamicsIntegrator,
    state: VehicleState,
    controls: ControlInputs,
    rng: R,
    notices: VecDeque<Notice>,
    overheat_armed: bool,
}

impl Simulation<SmallRng> {
    pub fn new(config: VehicleConfig) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed);
        Self::with_rng(config, rng)
    }
}

impl<R: RngCore> Simulation<R> {
    pub fn with_rng(config: VehicleConfig, rng: R) -> Self {
        Self {
            integrator: DynamicsIntegrator::new(&config),
            state: VehicleState::at_rest(config.thermal.ambient),
            controls: ControlInputs::default(),
            rng,
            notices: VecDeque::with_capacity(MAX_NOTICES),
            overheat_armed: true,
            config,
        }
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    /// Latest snapshot
    pub fn state(&self) -> VehicleState {
        self.state
    }

    /// Current driver inputs
    pub fn controls(&self) -> ControlInputs {
        self.controls
    }

    pub fn set_gas(&mut self, value: f32) {
        self.controls.set_gas(value);
    }

    pub fn set_brake(&mut self, value: f32) {
        self.controls.set_brake(value);
    }

    pub fn set_nitro(&mut self, active: bool) {
        self.controls.nitro = active;
    }

    pub fn set_lights(&mut self, on: bool) {
        self.controls.lights_on = on;
    }

    /// Flip the ignition switch
    ///
    /// The state machine acts on the switch at the next tick. A broken
    /// engine refuses the request and nothing changes.
    pub fn request_ignition_toggle(&mut self) -> Result<(), SimError> {
        if self.state.lifecycle == Lifecycle::Broken {
            self.push_notice(Notice::IgnitionRejected);
            return Err(SimError::EngineBroken);
        }
        self.controls.ignition_requested = !self.controls.ignition_requested;
        info!(on = self.controls.ignition_requested, "ignition toggled");
        Ok(())
    }

    /// Advance the vehicle by `dt` seconds and return the new snapshot
    pub fn tick(&mut self, dt: f32) -> VehicleState {
        let (next, report) = self
            .integrator
            .step(&self.state, &self.controls, dt, &mut self.rng);
        self.state = next;
        self.react(&report);
        self.state
    }

    /// Back to a cold, stationary, switched-off vehicle
    ///
    /// Clears a Broken engine. The jitter source keeps its position; build a
    /// new `Simulation` to replay a run from the seed.
    pub fn reset(&mut self) {
        self.integrator = DynamicsIntegrator::new(&self.config);
        self.state = VehicleState::at_rest(self.config.thermal.ambient);
        self.controls = ControlInputs::default();
        self.notices.clear();
        self.overheat_armed = true;
        info!("vehicle reset");
    }

    /// Take all notices raised since the last call, oldest first
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn react(&mut self, report: &StepReport) {
        if let Some(Transition { from, to }) = report.transition {
            match to {
                Lifecycle::Cranking => self.push_notice(Notice::Cranking),
                Lifecycle::Running if from == Lifecycle::Cranking => {
                    info!("engine started");
                    self.push_notice(Notice::Started);
                }
                Lifecycle::Stalled => self.push_notice(Notice::Stalled),
                Lifecycle::Off if from == Lifecycle::Stalled => {
                    // A stalled engine that dies needs a fresh key turn
                    self.controls.ignition_requested = false;
                    self.integrator.release_ignition();
                    info!("engine died after stall");
                }
                _ => {}
            }
        }

        if report.failure.is_some() {
            warn!(temperature = self.state.temperature, "engine overheated and broke");
            self.controls.ignition_requested = false;
            self.integrator.release_ignition();
            self.push_notice(Notice::EngineBroken);
        }

        let warning = self.integrator.thermal().warning();
        if self.overheat_armed && self.state.temperature >= warning {
            self.overheat_armed = false;
            warn!(temperature = self.state.temperature, "engine overheating");
            self.push_notice(Notice::Overheating);
        } else if self.state.temperature < warning - OVERHEAT_HYSTERESIS {
            self.overheat_armed = true;
        }
    }

    fn push_notice(&mut self, notice: Notice) {
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn running() -> Simulation {
        let mut sim = Simulation::new(VehicleConfig::default());
        sim.request_ignition_toggle().unwrap();
        for _ in 0..90 {
            sim.tick(DT);
        }
        assert_eq!(sim.state().lifecycle, Lifecycle::Running);
        sim
    }

    #[test]
    fn test_new_vehicle_is_off_and_cold() {
        let sim = Simulation::new(VehicleConfig::default());
        let s = sim.state();
        assert_eq!(s.lifecycle, Lifecycle::Off);
        assert_eq!(s.rpm, 0.0);
        assert_eq!(s.gear, 0);
        assert_eq!(s.temperature, 20.0);
    }

    #[test]
    fn test_start_sequence_notices() {
        let mut sim = running();
        assert_eq!(sim.drain_notices(), vec![Notice::Cranking, Notice::Started]);
        assert!(sim.drain_notices().is_empty());
    }

    #[test]
    fn test_toggle_twice_switches_off() {
        let mut sim = running();
        sim.request_ignition_toggle().unwrap();
        sim.tick(DT);
        assert_eq!(sim.state().lifecycle, Lifecycle::Off);
    }

    #[test]
    fn test_lights_and_nitro_mirrored() {
        let mut sim = Simulation::new(VehicleConfig::default());
        sim.set_lights(true);
        sim.set_nitro(true);
        let s = sim.tick(DT);
        assert!(s.lights_on);
        assert!(s.nitro_active);
    }

    #[test]
    fn test_stall_releases_ignition() {
        let mut sim = running();
        sim.set_gas(0.6);
        sim.tick(DT);
        sim.set_gas(0.0);
        sim.set_brake(1.0);
        for _ in 0..(60 * 10) {
            sim.tick(DT);
        }
        assert_eq!(sim.state().lifecycle, Lifecycle::Off);
        assert!(!sim.controls().ignition_requested);
        assert!(sim.drain_notices().contains(&Notice::Stalled));

        // One toggle restarts
        sim.set_brake(0.0);
        sim.request_ignition_toggle().unwrap();
        sim.tick(DT);
        assert_eq!(sim.state().lifecycle, Lifecycle::Cranking);
    }

    #[test]
    fn test_restart_right_after_stall_death() {
        let mut sim = running();
        sim.set_gas(0.6);
        sim.tick(DT);
        sim.set_gas(0.0);
        sim.set_brake(1.0);
        for _ in 0..(60 * 10) {
            sim.tick(DT);
            if sim.state().lifecycle == Lifecycle::Off {
                break;
            }
        }
        assert_eq!(sim.state().lifecycle, Lifecycle::Off);

        // Key turned again before any further tick
        sim.set_brake(0.0);
        sim.request_ignition_toggle().unwrap();
        assert!(sim.controls().ignition_requested);
        sim.tick(DT);
        assert_eq!(sim.state().lifecycle, Lifecycle::Cranking);
        for _ in 0..90 {
            sim.tick(DT);
        }
        assert_eq!(sim.state().lifecycle, Lifecycle::Running);
    }

    #[test]
    fn test_broken_rejects_ignition_and_reset_clears() {
        let mut sim = running();
        sim.set_gas(1.0);
        sim.set_brake(1.0);
        for _ in 0..(60 * 60) {
            sim.tick(DT);
            if sim.state().lifecycle == Lifecycle::Broken {
                break;
            }
        }
        assert_eq!(sim.state().lifecycle, Lifecycle::Broken);
        let notices = sim.drain_notices();
        assert!(notices.contains(&Notice::Overheating));
        assert!(notices.contains(&Notice::EngineBroken));

        let before = (sim.state(), sim.controls());
        assert_eq!(sim.request_ignition_toggle(), Err(SimError::EngineBroken));
        assert_eq!((sim.state(), sim.controls()), before);

        sim.reset();
        assert_eq!(sim.state().lifecycle, Lifecycle::Off);
        assert!(sim.request_ignition_toggle().is_ok());
    }

    #[test]
    fn test_notice_queue_is_bounded() {
        let mut sim = Simulation::new(VehicleConfig::default());
        for _ in 0..100 {
            sim.push_notice(Notice::Cranking);
        }
        assert_eq!(sim.drain_notices().len(), MAX_NOTICES);
    }
}
