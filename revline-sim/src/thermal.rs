//! Engine temperature model
//!
//! Temperature chases a target built from heat sources (rpm, burnout,
//! nitro) minus airflow cooling, through a slow exponential approach that
//! stands in for the engine's thermal mass. Failure is a plain threshold
//! crossing, so the same input trajectory always breaks at the same tick.

use crate::config::{DynamicsConfig, EngineConfig, ThermalConfig};
use crate::smoother::approach;

/// What the thermal model needs to know about the current tick
#[derive(Debug, Clone, Copy)]
pub struct ThermalLoad {
    pub rpm: f32,
    pub speed: f32,
    pub burnout: bool,
    pub nitro: bool,
    /// False with the engine off: target is ambient
    pub combusting: bool,
}

/// Outcome of one thermal step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalStep {
    pub temperature: f32,
    pub failed: bool,
}

#[derive(Debug, Clone)]
pub struct ThermalModel {
    config: ThermalConfig,
    max_rpm: f32,
    v_max: f32,
}

impl ThermalModel {
    pub fn new(config: &ThermalConfig, engine: &EngineConfig, dynamics: &DynamicsConfig) -> Self {
        Self {
            config: config.clone(),
            max_rpm: engine.max_rpm,
            v_max: dynamics.v_max,
        }
    }

    pub fn ambient(&self) -> f32 {
        self.config.ambient
    }

    pub fn warning(&self) -> f32 {
        self.config.warning
    }

    pub fn failure_threshold(&self) -> f32 {
        self.config.failure
    }

    /// Equilibrium temperature for a given load
    pub fn target(&self, load: &ThermalLoad) -> f32 {
        let c = &self.config;
        if !load.combusting {
            return c.ambient;
        }

        let rpm_frac = (load.rpm / self.max_rpm).clamp(0.0, 1.0);
        let airflow = (load.speed / self.v_max).clamp(0.0, 1.0);

        let mut target = c.baseline + c.heat_from_rpm * rpm_frac * rpm_frac;
        if load.burnout {
            target += c.burnout_penalty;
        }
        if load.nitro {
            target += c.nitro_penalty;
        }
        target -= c.airflow_cooling * airflow;

        target.max(c.ambient)
    }

    /// Advance temperature by `dt` and report a failure crossing
    pub fn step(&self, temperature: f32, load: &ThermalLoad, dt: f32) -> ThermalStep {
        let target = self.target(load);
        let rate = if target > temperature {
            self.config.heat_rate
        } else {
            self.config.cool_rate
        };
        let temperature = approach(temperature, target, rate, dt).max(self.config.ambient);

        ThermalStep {
            temperature,
            failed: self.failed(temperature),
        }
    }

    #[inline]
    pub fn failed(&self, temperature: f32) -> bool {
        temperature > self.config.failure
    }
}
