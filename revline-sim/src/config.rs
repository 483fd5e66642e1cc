//! Vehicle parameters
//!
//! Every constant the simulation uses lives here so a different car is a
//! different config, not different code. All sections deserialize with
//! `#[serde(default)]`, so a config file only needs the values it changes.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Complete parameter set for one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub engine: EngineConfig,
    pub gearbox: GearboxConfig,
    pub dynamics: DynamicsConfig,
    pub thermal: ThermalConfig,
    pub lifecycle: LifecycleConfig,
    pub effects: EffectsConfig,
    /// Seed for the jitter source (rev limiter bounce, starter noise)
    pub seed: u64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            gearbox: GearboxConfig::default(),
            dynamics: DynamicsConfig::default(),
            thermal: ThermalConfig::default(),
            lifecycle: LifecycleConfig::default(),
            effects: EffectsConfig::default(),
            seed: 0x5EED_CAFE,
        }
    }
}

/// Engine speed behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub idle_rpm: f32,
    pub max_rpm: f32,
    /// Approach rate toward a higher target (1/s)
    pub rpm_rise_rate: f32,
    /// Approach rate toward a lower target (1/s), slower: flywheel inertia
    pub rpm_fall_rate: f32,
    /// Rev limiter bounce depth below max_rpm
    pub limiter_bounce_rpm: f32,
    /// Free-revving target multiplier while nitro is active
    pub nitro_rpm_multiplier: f32,
    /// Starter motor speed while cranking
    pub cranking_rpm: f32,
    pub cranking_jitter_rpm: f32,
    /// Linear spin-down rate with the engine off (rpm/s)
    pub off_rpm_decay: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_rpm: 900.0,
            max_rpm: 8000.0,
            rpm_rise_rate: 3.0,
            rpm_fall_rate: 1.2,
            limiter_bounce_rpm: 100.0,
            nitro_rpm_multiplier: 1.15,
            cranking_rpm: 220.0,
            cranking_jitter_rpm: 60.0,
            off_rpm_decay: 2000.0,
        }
    }
}

/// Gear ratios and automatic shift points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GearboxConfig {
    /// Index 0 is neutral and must be 0.0
    pub ratios: Vec<f32>,
    /// Upshift above this fraction of max_rpm
    pub shift_up_fraction: f32,
    /// Downshift below this fraction of max_rpm
    pub shift_down_fraction: f32,
    pub upshift_rpm_drop: f32,
    pub downshift_rpm_rise: f32,
    /// No downshift at or below this speed (km/h)
    pub downshift_min_speed: f32,
    /// RPM must leave the trigger zone by this much before it can fire again
    pub rearm_band_rpm: f32,
    /// Minimum time between two shifts
    pub shift_dwell_secs: f32,
    /// Gas needed to drop out of neutral into first
    pub engage_gas_threshold: f32,
    /// Fraction of turbo pressure kept across an upshift (0 = full blow-off)
    pub upshift_turbo_retain: f32,
}

impl Default for GearboxConfig {
    fn default() -> Self {
        Self {
            ratios: vec![0.0, 3.2, 2.1, 1.6, 1.2, 0.9, 0.7],
            shift_up_fraction: 0.9,
            shift_down_fraction: 0.275,
            upshift_rpm_drop: 2500.0,
            downshift_rpm_rise: 1500.0,
            downshift_min_speed: 15.0,
            rearm_band_rpm: 500.0,
            shift_dwell_secs: 0.25,
            engage_gas_threshold: 0.05,
            upshift_turbo_retain: 0.0,
        }
    }
}

/// Longitudinal forces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Ceiling on a single tick's dt (frame hitch protection)
    pub max_dt: f32,
    /// Top speed (km/h)
    pub v_max: f32,
    pub power: f32,
    pub nitro_multiplier: f32,
    /// Extra drive force at full turbo pressure (0.5 = +50%)
    pub turbo_boost: f32,
    /// Quadratic aerodynamic drag coefficient
    pub drag: f32,
    pub rolling_friction: f32,
    pub brake_force: f32,
    /// Net force to km/h per second
    pub force_to_accel: f32,
    /// Engine rpm per (km/h · gear ratio) with the clutch locked
    pub wheel_rpm_factor: f32,
    /// Speed at which the clutch reaches full lock
    pub clutch_lock_speed: f32,
    /// Blend weight of wheel rpm at full lock
    pub clutch_max_lock: f32,
    /// Coast-down with the engine off (km/h per second)
    pub coast_decel: f32,
    /// Burnout: brake and gas both above these
    pub burnout_brake: f32,
    pub burnout_gas: f32,
    /// km per (km/h · s)
    pub odometer_scale: f32,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            max_dt: 0.1,
            v_max: 300.0,
            power: 400.0,
            nitro_multiplier: 2.5,
            turbo_boost: 0.5,
            drag: 0.006,
            rolling_friction: 10.0,
            brake_force: 1200.0,
            force_to_accel: 0.1,
            wheel_rpm_factor: 37.5,
            clutch_lock_speed: 20.0,
            clutch_max_lock: 0.9,
            coast_decel: 10.0,
            burnout_brake: 0.1,
            burnout_gas: 0.1,
            odometer_scale: 1.0 / 3600.0,
        }
    }
}

/// Engine temperature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    pub ambient: f32,
    /// Running temperature at idle, before load terms
    pub baseline: f32,
    /// Added at max_rpm, scaled by (rpm / max_rpm)²
    pub heat_from_rpm: f32,
    pub burnout_penalty: f32,
    pub nitro_penalty: f32,
    /// Removed at v_max, scaled linearly by speed
    pub airflow_cooling: f32,
    /// Approach rate while heating (1/s)
    pub heat_rate: f32,
    /// Approach rate while cooling (1/s)
    pub cool_rate: f32,
    pub warning: f32,
    pub failure: f32,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            ambient: 20.0,
            baseline: 90.0,
            heat_from_rpm: 45.0,
            burnout_penalty: 25.0,
            nitro_penalty: 15.0,
            airflow_cooling: 20.0,
            heat_rate: 0.1,
            cool_rate: 0.05,
            warning: 115.0,
            failure: 130.0,
        }
    }
}

/// Ignition and stall timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub warm_crank_secs: f32,
    pub cold_crank_secs: f32,
    /// Below this temperature a start takes cold_crank_secs
    pub cold_start_temperature: f32,
    pub stall_rpm: f32,
    pub stall_brake_threshold: f32,
    pub stall_gas_threshold: f32,
    /// "Stationary" means below this speed (km/h)
    pub stall_speed: f32,
    /// RPM at or below this counts as stopped
    pub stopped_rpm: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            warm_crank_secs: 0.8,
            cold_crank_secs: 1.8,
            cold_start_temperature: 10.0,
            stall_rpm: 600.0,
            stall_brake_threshold: 0.5,
            stall_gas_threshold: 0.1,
            stall_speed: 1.0,
            stopped_rpm: 50.0,
        }
    }
}

/// Turbo, smoke and shake derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub turbo_gas_threshold: f32,
    pub turbo_rpm_threshold: f32,
    pub turbo_spool_rate: f32,
    pub turbo_bleed_rate: f32,
    /// Smoke starts building above this temperature
    pub smoke_temperature: f32,
    pub burnout_smoke: f32,
    pub smoke_rate: f32,
    /// Shake per km/h
    pub shake_per_speed: f32,
    pub nitro_shake: f32,
    pub redline_shake_rpm: f32,
    pub redline_shake: f32,
    pub burnout_shake: f32,
    pub stall_shake: f32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            turbo_gas_threshold: 0.4,
            turbo_rpm_threshold: 3000.0,
            turbo_spool_rate: 0.5,
            turbo_bleed_rate: 2.0,
            smoke_temperature: 110.0,
            burnout_smoke: 0.8,
            smoke_rate: 2.0,
            shake_per_speed: 1.0 / 400.0,
            nitro_shake: 0.15,
            redline_shake_rpm: 6000.0,
            redline_shake: 0.01,
            burnout_shake: 0.05,
            stall_shake: 0.08,
        }
    }
}

impl VehicleConfig {
    /// Check the parameter set for values the integrator cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.engine;
        if !(e.idle_rpm > 0.0 && e.max_rpm > e.idle_rpm) {
            return Err(ConfigError::Invalid(format!(
                "idle_rpm ({}) must be positive and below max_rpm ({})",
                e.idle_rpm, e.max_rpm
            )));
        }

        let g = &self.gearbox;
        if g.ratios.len() < 2 {
            return Err(ConfigError::Invalid(
                "gearbox needs neutral plus at least one gear".into(),
            ));
        }
        if g.ratios.len() > usize::from(u8::MAX) {
            return Err(ConfigError::Invalid("too many gears".into()));
        }
        if g.ratios[0] != 0.0 {
            return Err(ConfigError::Invalid("ratio 0 (neutral) must be 0.0".into()));
        }
        for pair in g.ratios[1..].windows(2) {
            if !(pair[0] > pair[1] && pair[1] > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "gear ratios must be positive and strictly decreasing, got {:?}",
                    g.ratios
                )));
            }
        }
        if !(0.0 < g.shift_down_fraction && g.shift_down_fraction < g.shift_up_fraction && g.shift_up_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "shift thresholds must satisfy 0 < down ({}) < up ({}) < 1",
                g.shift_down_fraction, g.shift_up_fraction
            )));
        }

        let d = &self.dynamics;
        if !(d.max_dt > 0.0 && d.v_max > 0.0 && d.force_to_accel > 0.0) {
            return Err(ConfigError::Invalid(
                "max_dt, v_max and force_to_accel must be positive".into(),
            ));
        }

        let t = &self.thermal;
        if !(t.ambient < t.warning && t.warning < t.failure) {
            return Err(ConfigError::Invalid(format!(
                "temperatures must satisfy ambient ({}) < warning ({}) < failure ({})",
                t.ambient, t.warning, t.failure
            )));
        }

        let l = &self.lifecycle;
        if !(l.stopped_rpm < l.stall_rpm && l.stall_rpm < e.idle_rpm) {
            return Err(ConfigError::Invalid(format!(
                "rpm levels must satisfy stopped ({}) < stall ({}) < idle ({})",
                l.stopped_rpm, l.stall_rpm, e.idle_rpm
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(VehicleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: VehicleConfig = toml::from_str(
            r#"
            seed = 7

            [engine]
            max_rpm = 9000.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.engine.max_rpm, 9000.0);
        assert_eq!(cfg.engine.idle_rpm, 900.0);
        assert_eq!(cfg.gearbox.ratios.len(), 7);
    }

    #[test]
    fn test_rejects_non_decreasing_ratios() {
        let mut cfg = VehicleConfig::default();
        cfg.gearbox.ratios = vec![0.0, 2.0, 2.5];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_nonzero_neutral() {
        let mut cfg = VehicleConfig::default();
        cfg.gearbox.ratios[0] = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_shift_points() {
        let mut cfg = VehicleConfig::default();
        cfg.gearbox.shift_down_fraction = 0.95;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_failure_below_warning() {
        let mut cfg = VehicleConfig::default();
        cfg.thermal.failure = 100.0;
        assert!(cfg.validate().is_err());
    }
}
