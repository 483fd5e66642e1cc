//! Engine lifecycle state machine
//!
//! ```text
//!  Off ──ignition↑──► Cranking ──crank time──► Running ◄──rpm recovers── Stalled
//!   ▲                    │                      │  └──rpm < stall, load──►  │
//!   └──────ignition↓─────┴──────────────────────┘                           │
//!   └──────────────────────────── rpm reaches zero ◄────────────────────────┘
//!  any ──temperature > failure──► Broken (terminal)
//! ```
//!
//! Timing comes only from the `dt` passed to [`EngineStateMachine::update`],
//! so pausing or single-stepping the simulation pauses the start sequence.

use tracing::debug;

use crate::config::LifecycleConfig;
use crate::state::Lifecycle;

/// Inputs the state machine reads each tick
#[derive(Debug, Clone, Copy)]
pub struct LifecycleInput {
    pub ignition: bool,
    pub rpm: f32,
    pub temperature: f32,
    /// Stationary, brake held, gas released, in gear
    pub stall_load: bool,
}

/// A state change produced by one update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Lifecycle,
    pub to: Lifecycle,
}

#[derive(Debug, Clone)]
pub struct EngineStateMachine {
    config: LifecycleConfig,
    state: Lifecycle,
    /// Time spent in the current state
    elapsed: f32,
    crank_duration: f32,
    last_ignition: bool,
}

impl EngineStateMachine {
    pub fn new(config: &LifecycleConfig) -> Self {
        Self {
            config: config.clone(),
            state: Lifecycle::Off,
            elapsed: 0.0,
            crank_duration: config.warm_crank_secs,
            last_ignition: false,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Crank time for an engine at `temperature`
    pub fn crank_duration_for(&self, temperature: f32) -> f32 {
        if temperature < self.config.cold_start_temperature {
            self.config.cold_crank_secs
        } else {
            self.config.warm_crank_secs
        }
    }

    /// Advance by `dt` and apply at most one transition
    pub fn update(&mut self, input: &LifecycleInput, dt: f32) -> Option<Transition> {
        let rising = input.ignition && !self.last_ignition;
        self.last_ignition = input.ignition;
        self.elapsed += dt;

        let next = match self.state {
            Lifecycle::Broken => None,
            Lifecycle::Off => {
                if rising {
                    self.crank_duration = self.crank_duration_for(input.temperature);
                    Some(Lifecycle::Cranking)
                } else {
                    None
                }
            }
            _ if !input.ignition => Some(Lifecycle::Off),
            Lifecycle::Cranking => {
                (self.elapsed >= self.crank_duration).then_some(Lifecycle::Running)
            }
            Lifecycle::Running => {
                (input.stall_load && input.rpm < self.config.stall_rpm).then_some(Lifecycle::Stalled)
            }
            Lifecycle::Stalled => {
                if input.rpm <= self.config.stopped_rpm {
                    Some(Lifecycle::Off)
                } else if input.rpm >= self.config.stall_rpm {
                    Some(Lifecycle::Running)
                } else {
                    None
                }
            }
        };

        next.map(|to| self.enter(to))
    }

    /// Forget the switch position seen last tick
    ///
    /// Call when the owner clears the ignition request itself, so the next
    /// request is a fresh edge even if no tick ran in between.
    pub fn release_ignition(&mut self) {
        self.last_ignition = false;
    }

    /// Thermal failure: enter Broken unless already there
    pub fn force_broken(&mut self) -> Option<Transition> {
        (self.state != Lifecycle::Broken).then(|| self.enter(Lifecycle::Broken))
    }

    fn enter(&mut self, to: Lifecycle) -> Transition {
        let from = self.state;
        self.state = to;
        self.elapsed = 0.0;
        debug!(?from, ?to, "lifecycle transition");
        Transition { from, to }
    }
}
