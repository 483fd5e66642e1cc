//! Per-tick vehicle dynamics
//!
//! One call to [`DynamicsIntegrator::step`] turns the previous state and the
//! current inputs into the next state:
//!
//! 1. Off / Broken: spin down and coast, nothing else
//! 2. Cranking: starter-motor rpm, no drive
//! 3. Target rpm from gas (and nitro), blended with wheel rpm by clutch lock
//! 4. Asymmetric rpm integration and rev limiter
//! 5. Gearbox
//! 6. Drive force minus drag, rolling friction and brake
//! 7. Temperature and failure
//! 8. Turbo, smoke, shake
//! 9. Odometer
//!
//! Every output is clamped into its domain afterwards; nothing here errors.

use rand::Rng;

use crate::config::VehicleConfig;
use crate::controls::ControlInputs;
use crate::gears::GearTable;
use crate::lifecycle::{EngineStateMachine, LifecycleInput, Transition};
use crate::smoother::approach;
use crate::state::{Lifecycle, VehicleState};
use crate::thermal::{ThermalLoad, ThermalModel};
use crate::transmission::{Shift, ShiftInput, TransmissionController};

/// Discrete events produced by one step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    /// Lifecycle change from the state machine's own rules
    pub transition: Option<Transition>,
    /// Thermal failure forced this tick
    pub failure: Option<Transition>,
    pub shift: Option<Shift>,
    /// The dt actually integrated after clamping
    pub dt: f32,
}

/// Conditions derived from the inputs, shared by several stages
#[derive(Debug, Clone, Copy)]
struct Conditions {
    burnout: bool,
    stall_load: bool,
}

pub struct DynamicsIntegrator {
    config: VehicleConfig,
    machine: EngineStateMachine,
    transmission: TransmissionController,
    thermal: ThermalModel,
}

impl DynamicsIntegrator {
    pub fn new(config: &VehicleConfig) -> Self {
        let table = GearTable::new(&config.gearbox, &config.engine);
        Self {
            config: config.clone(),
            machine: EngineStateMachine::new(&config.lifecycle),
            transmission: TransmissionController::new(table, &config.gearbox),
            thermal: ThermalModel::new(&config.thermal, &config.engine, &config.dynamics),
        }
    }

    pub fn thermal(&self) -> &ThermalModel {
        &self.thermal
    }

    /// The ignition request was cleared outside the integrator
    pub fn release_ignition(&mut self) {
        self.machine.release_ignition();
    }

    /// Clamp a frame time into `[0, max_dt]`; non-finite becomes 0
    pub fn clamp_dt(&self, dt: f32) -> f32 {
        if dt.is_finite() {
            dt.clamp(0.0, self.config.dynamics.max_dt)
        } else {
            0.0
        }
    }

    /// Advance one tick
    pub fn step<R: Rng>(
        &mut self,
        prev: &VehicleState,
        controls: &ControlInputs,
        dt: f32,
        rng: &mut R,
    ) -> (VehicleState, StepReport) {
        let dt = self.clamp_dt(dt);
        let c = controls.sanitized();
        let d = &self.config.dynamics;
        let l = &self.config.lifecycle;

        let cond = Conditions {
            burnout: c.brake > d.burnout_brake && c.gas > d.burnout_gas,
            stall_load: prev.speed < l.stall_speed
                && c.brake > l.stall_brake_threshold
                && c.gas < l.stall_gas_threshold
                && prev.gear >= 1,
        };

        let mut report = StepReport {
            dt,
            ..StepReport::default()
        };
        report.transition = self.machine.update(
            &LifecycleInput {
                ignition: c.ignition_requested,
                rpm: prev.rpm,
                temperature: prev.temperature,
                stall_load: cond.stall_load,
            },
            dt,
        );

        let mut s = *prev;
        s.lifecycle = self.machine.state();
        s.lights_on = c.lights_on;
        s.nitro_active = c.nitro;

        let overheated = match s.lifecycle {
            Lifecycle::Off | Lifecycle::Broken => self.rest(&mut s, &c, dt),
            Lifecycle::Cranking => {
                self.crank(&mut s, dt, rng);
                false
            }
            Lifecycle::Running | Lifecycle::Stalled => {
                let started = report.transition
                    == Some(Transition {
                        from: Lifecycle::Cranking,
                        to: Lifecycle::Running,
                    });
                if started {
                    s.rpm = self.config.engine.idle_rpm;
                }
                let (shift, overheated) = self.drive(&mut s, &c, cond, dt, rng);
                report.shift = shift;
                overheated
            }
        };

        if matches!(report.transition, Some(Transition { to: Lifecycle::Off, .. })) {
            // Killing the engine dumps boost immediately
            s.turbo_pressure = 0.0;
        }

        if overheated && s.lifecycle != Lifecycle::Broken {
            report.failure = self.machine.force_broken();
            s.lifecycle = self.machine.state();
        }

        self.clamp(&mut s);
        (s, report)
    }

    /// Engine off or broken: spin down, coast, cool. Returns the thermal failure flag
    fn rest(&self, s: &mut VehicleState, c: &ControlInputs, dt: f32) -> bool {
        let e = &self.config.engine;
        let d = &self.config.dynamics;
        let fx = &self.config.effects;

        s.rpm = (s.rpm - e.off_rpm_decay * dt).max(0.0);

        let decel = d.coast_decel + c.brake * d.brake_force * d.force_to_accel;
        s.speed = (s.speed - decel * dt).max(0.0);

        let load = ThermalLoad {
            rpm: 0.0,
            speed: s.speed,
            burnout: false,
            nitro: false,
            combusting: false,
        };
        let heat = self.thermal.step(s.temperature, &load, dt);
        s.temperature = heat.temperature;

        s.turbo_pressure = approach(s.turbo_pressure, 0.0, fx.turbo_bleed_rate, dt);
        s.smoke_intensity = approach(s.smoke_intensity, self.smoke_target(s.temperature, false), fx.smoke_rate, dt);
        s.shake = s.speed * fx.shake_per_speed;
        s.odometer += f64::from(s.speed * dt * d.odometer_scale);
        heat.failed
    }

    /// Starter motor turning the engine over
    fn crank<R: Rng>(&self, s: &mut VehicleState, dt: f32, rng: &mut R) {
        let e = &self.config.engine;
        let d = &self.config.dynamics;
        let fx = &self.config.effects;

        let noise: f32 = rng.gen::<f32>() * 2.0 - 1.0;
        s.rpm = e.cranking_rpm + noise * e.cranking_jitter_rpm;
        s.turbo_pressure = approach(s.turbo_pressure, 0.0, fx.turbo_bleed_rate, dt);
        s.shake = s.speed * fx.shake_per_speed;
        s.odometer += f64::from(s.speed * dt * d.odometer_scale);
    }

    /// Running or stalling: the full model
    fn drive<R: Rng>(
        &mut self,
        s: &mut VehicleState,
        c: &ControlInputs,
        cond: Conditions,
        dt: f32,
        rng: &mut R,
    ) -> (Option<Shift>, bool) {
        let running = s.lifecycle == Lifecycle::Running;

        // 3. target rpm
        let target = self.target_rpm(s, c, cond);

        // 4. flywheel inertia, then the limiter
        let e = &self.config.engine;
        let rate = if target > s.rpm {
            e.rpm_rise_rate
        } else {
            e.rpm_fall_rate
        };
        s.rpm = approach(s.rpm, target, rate, dt);
        s.rpm = self.rev_limit(s.rpm, rng);

        // 5. gearbox
        let outcome = self.transmission.update(
            s.gear,
            &ShiftInput {
                rpm: s.rpm,
                speed: s.speed,
                gas: c.gas,
                burnout: cond.burnout,
                driving: running,
            },
            dt,
        );
        s.gear = outcome.gear;
        s.rpm = (s.rpm + outcome.rpm_offset).clamp(0.0, self.config.engine.max_rpm);
        s.turbo_pressure *= outcome.turbo_scale;

        // 6. longitudinal forces
        let d = &self.config.dynamics;
        let ratio = self.transmission.table().ratio(s.gear);
        let drive_force = if running && ratio > 0.0 {
            let falloff = (1.0 - s.speed / d.v_max).max(0.0);
            let nitro = if c.nitro { d.nitro_multiplier } else { 1.0 };
            c.gas * d.power / ratio * (1.0 + s.turbo_pressure * d.turbo_boost) * nitro * falloff
        } else {
            0.0
        };
        let net = if cond.burnout {
            0.0
        } else {
            drive_force - d.drag * s.speed * s.speed - d.rolling_friction - c.brake * d.brake_force
        };
        s.speed = (s.speed + net * d.force_to_accel * dt).clamp(0.0, d.v_max);

        // 7. temperature
        let load = ThermalLoad {
            rpm: s.rpm,
            speed: s.speed,
            burnout: cond.burnout,
            nitro: c.nitro,
            combusting: true,
        };
        let heat = self.thermal.step(s.temperature, &load, dt);
        s.temperature = heat.temperature;

        // 8. turbo, smoke, shake
        let fx = &self.config.effects;
        let spooling = running && c.gas > fx.turbo_gas_threshold && s.rpm > fx.turbo_rpm_threshold;
        let turbo_target = if spooling { 1.0 } else { 0.0 };
        let turbo_rate = if turbo_target > s.turbo_pressure {
            fx.turbo_spool_rate
        } else {
            fx.turbo_bleed_rate
        };
        s.turbo_pressure = approach(s.turbo_pressure, turbo_target, turbo_rate, dt);

        let smoke_target = self.smoke_target(s.temperature, cond.burnout);
        s.smoke_intensity = approach(s.smoke_intensity, smoke_target, fx.smoke_rate, dt);

        let mut shake = s.speed * fx.shake_per_speed;
        if c.nitro && running {
            shake += fx.nitro_shake;
        }
        if s.rpm > fx.redline_shake_rpm {
            shake += fx.redline_shake;
        }
        if cond.burnout {
            shake += fx.burnout_shake;
        }
        if s.lifecycle == Lifecycle::Stalled {
            shake += fx.stall_shake;
        }
        s.shake = shake;

        // 9. odometer
        s.odometer += f64::from(s.speed * dt * d.odometer_scale);

        (outcome.shift, heat.failed)
    }

    fn target_rpm(&self, s: &VehicleState, c: &ControlInputs, cond: Conditions) -> f32 {
        if cond.stall_load {
            return 0.0;
        }

        let e = &self.config.engine;
        let d = &self.config.dynamics;

        let nitro = if c.nitro { e.nitro_rpm_multiplier } else { 1.0 };
        // Free-revving target sits past the limiter so full gas bounces off it
        let free = e.idle_rpm + c.gas * nitro * (e.max_rpm + e.limiter_bounce_rpm - e.idle_rpm);

        let ratio = self.transmission.table().ratio(s.gear);
        if cond.burnout || ratio <= 0.0 {
            return free;
        }

        let lock = (s.speed / d.clutch_lock_speed).clamp(0.0, 1.0) * d.clutch_max_lock;
        let wheel = (s.speed * ratio * d.wheel_rpm_factor).max(e.idle_rpm);
        free + (wheel - free) * lock
    }

    fn rev_limit<R: Rng>(&self, rpm: f32, rng: &mut R) -> f32 {
        let e = &self.config.engine;
        if rpm >= e.max_rpm {
            e.max_rpm - rng.gen::<f32>() * e.limiter_bounce_rpm
        } else {
            rpm
        }
    }

    fn smoke_target(&self, temperature: f32, burnout: bool) -> f32 {
        let fx = &self.config.effects;
        let span = (self.thermal.failure_threshold() - fx.smoke_temperature).max(f32::EPSILON);
        let mut target = ((temperature - fx.smoke_temperature) / span).clamp(0.0, 1.0);
        if burnout {
            target += fx.burnout_smoke;
        }
        target.clamp(0.0, 1.0)
    }

    fn clamp(&self, s: &mut VehicleState) {
        let e = &self.config.engine;
        let d = &self.config.dynamics;

        s.rpm = sane(s.rpm, 0.0, e.max_rpm);
        s.speed = sane(s.speed, 0.0, d.v_max);
        s.turbo_pressure = sane(s.turbo_pressure, 0.0, 1.0);
        s.smoke_intensity = sane(s.smoke_intensity, 0.0, 1.0);
        s.shake = sane(s.shake, 0.0, f32::MAX);
        s.temperature = if s.temperature.is_finite() {
            s.temperature.max(self.thermal.ambient())
        } else {
            self.thermal.ambient()
        };
        if !s.odometer.is_finite() {
            s.odometer = 0.0;
        }
    }
}

/// Clamp, mapping NaN/inf to the lower bound
#[inline]
fn sane(value: f32, lo: f32, hi: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 60.0;

    struct Rig {
        integrator: DynamicsIntegrator,
        state: VehicleState,
        controls: ControlInputs,
        rng: SmallRng,
    }

    impl Rig {
        fn new() -> Self {
            let config = VehicleConfig::default();
            Self {
                integrator: DynamicsIntegrator::new(&config),
                state: VehicleState::at_rest(config.thermal.ambient),
                controls: ControlInputs::default(),
                rng: SmallRng::seed_from_u64(1),
            }
        }

        fn tick(&mut self, dt: f32) -> StepReport {
            let (next, report) = self.integrator.step(&self.state, &self.controls, dt, &mut self.rng);
            self.state = next;
            report
        }

        fn start(&mut self) {
            self.controls.ignition_requested = true;
            for _ in 0..120 {
                self.tick(DT);
            }
            assert_eq!(self.state.lifecycle, Lifecycle::Running);
        }
    }

    #[test]
    fn test_off_stays_at_rest() {
        let mut rig = Rig::new();
        rig.controls.set_gas(1.0);
        for _ in 0..60 {
            rig.tick(DT);
        }
        assert_eq!(rig.state.rpm, 0.0);
        assert_eq!(rig.state.speed, 0.0);
        assert_eq!(rig.state.lifecycle, Lifecycle::Off);
    }

    #[test]
    fn test_cranking_rpm_is_noisy_and_low() {
        let mut rig = Rig::new();
        rig.controls.ignition_requested = true;
        let mut seen = Vec::new();
        for _ in 0..20 {
            rig.tick(DT);
            assert_eq!(rig.state.lifecycle, Lifecycle::Cranking);
            seen.push(rig.state.rpm);
        }
        assert!(seen.iter().all(|&r| (160.0..=280.0).contains(&r)));
        assert!(seen.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_start_lands_on_idle() {
        let mut rig = Rig::new();
        rig.controls.ignition_requested = true;
        loop {
            let report = rig.tick(DT);
            if rig.state.lifecycle == Lifecycle::Running {
                assert!(report.transition.is_some());
                break;
            }
        }
        assert!((rig.state.rpm - 900.0).abs() < 1e-3);
    }

    #[test]
    fn test_dt_is_clamped() {
        let rig = Rig::new();
        assert_eq!(rig.integrator.clamp_dt(5.0), 0.1);
        assert_eq!(rig.integrator.clamp_dt(-1.0), 0.0);
        assert_eq!(rig.integrator.clamp_dt(f32::NAN), 0.0);
    }

    #[test]
    fn test_burnout_holds_speed() {
        let mut rig = Rig::new();
        rig.start();
        rig.controls.set_gas(1.0);
        for _ in 0..180 {
            rig.tick(DT);
        }
        let speed = rig.state.speed;
        assert!(speed > 0.0);

        rig.controls.set_brake(1.0);
        for _ in 0..120 {
            rig.tick(DT);
            assert_eq!(rig.state.speed, speed);
        }
        assert!(rig.state.rpm > 7000.0);
        assert!(rig.state.smoke_intensity > 0.5);
    }

    #[test]
    fn test_rev_limiter_bounces_below_max() {
        let mut rig = Rig::new();
        rig.start();
        rig.controls.set_gas(1.0);
        rig.controls.set_brake(1.0);
        let mut peak: f32 = 0.0;
        let mut bounced = false;
        let mut last = 0.0;
        for _ in 0..600 {
            rig.tick(DT);
            peak = peak.max(rig.state.rpm);
            if rig.state.rpm < last - 1.0 {
                bounced = true;
            }
            last = rig.state.rpm;
        }
        assert!(peak <= 8000.0);
        assert!(bounced);
    }

    #[test]
    fn test_stall_from_braking_to_a_stop() {
        let mut rig = Rig::new();
        rig.start();
        rig.controls.set_gas(0.6);
        for _ in 0..120 {
            rig.tick(DT);
        }
        rig.controls.set_gas(0.0);
        rig.controls.set_brake(1.0);

        let mut stalled = false;
        for _ in 0..(60 * 20) {
            rig.tick(DT);
            if rig.state.lifecycle == Lifecycle::Stalled {
                stalled = true;
            }
            if rig.state.lifecycle == Lifecycle::Off {
                break;
            }
        }
        assert!(stalled);
        assert_eq!(rig.state.lifecycle, Lifecycle::Off);
    }

    #[test]
    fn test_stall_recovers_when_brake_released() {
        let mut rig = Rig::new();
        rig.start();
        rig.controls.set_gas(0.6);
        rig.tick(DT); // engage first
        rig.controls.set_gas(0.0);
        rig.controls.set_brake(1.0);
        while rig.state.lifecycle != Lifecycle::Stalled {
            rig.tick(DT);
        }
        rig.controls.set_brake(0.0);
        for _ in 0..60 {
            rig.tick(DT);
        }
        assert_eq!(rig.state.lifecycle, Lifecycle::Running);
    }

    #[test]
    fn test_overheat_breaks_in_same_tick() {
        let mut rig = Rig::new();
        rig.start();
        rig.controls.set_gas(1.0);
        rig.controls.set_brake(1.0);
        rig.state.temperature = rig.integrator.thermal().failure_threshold() + 5.0;

        let report = rig.tick(DT);
        assert_eq!(
            report.failure,
            Some(Transition {
                from: Lifecycle::Running,
                to: Lifecycle::Broken
            })
        );
        assert_eq!(rig.state.lifecycle, Lifecycle::Broken);

        // Already broken: no second failure
        assert_eq!(rig.tick(DT).failure, None);
    }

    #[test]
    fn test_ignition_off_dumps_turbo() {
        let mut rig = Rig::new();
        rig.start();
        rig.controls.set_gas(1.0);
        rig.controls.set_brake(1.0);
        for _ in 0..300 {
            rig.tick(DT);
        }
        assert!(rig.state.turbo_pressure > 0.5);

        rig.controls.ignition_requested = false;
        rig.tick(DT);
        assert_eq!(rig.state.lifecycle, Lifecycle::Off);
        assert_eq!(rig.state.turbo_pressure, 0.0);
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let run = || {
            let mut rig = Rig::new();
            rig.start();
            rig.controls.set_gas(1.0);
            rig.controls.set_brake(1.0);
            (0..300).map(|_| {
                rig.tick(DT);
                rig.state.rpm
            }).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
