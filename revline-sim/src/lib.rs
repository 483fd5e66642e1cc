//! Vehicle simulation core for Revline
//!
//! This crate owns everything that decides what the car is doing:
//! - Lifecycle: Off / Cranking / Running / Stalled / Broken state machine
//! - Transmission: automatic gearbox with hysteresis
//! - Dynamics: per-tick rpm, speed, turbo, smoke and shake integration
//! - Thermal: temperature and overheat failure
//! - Publish: lock-free snapshot hand-off to the audio thread
//!
//! Nothing here touches audio devices, terminals or clocks; time only
//! advances through the `dt` passed to [`Simulation::tick`].

mod config;
mod controls;
mod dynamics;
mod error;
mod gears;
mod lifecycle;
mod publish;
mod simulation;
pub mod smoother;
mod state;
mod thermal;
mod transmission;

pub use config::{
    DynamicsConfig, EffectsConfig, EngineConfig, GearboxConfig, LifecycleConfig, ThermalConfig,
    VehicleConfig,
};
pub use controls::ControlInputs;
pub use dynamics::{DynamicsIntegrator, StepReport};
pub use error::{ConfigError, SimError};
pub use gears::GearTable;
pub use lifecycle::{EngineStateMachine, LifecycleInput, Transition};
pub use publish::{SnapshotPublisher, SnapshotReader};
pub use simulation::{Notice, Simulation};
pub use smoother::ParameterSmoother;
pub use state::{Lifecycle, VehicleState};
pub use thermal::{ThermalLoad, ThermalModel, ThermalStep};
pub use transmission::{Shift, ShiftInput, ShiftOutcome, TransmissionController};
