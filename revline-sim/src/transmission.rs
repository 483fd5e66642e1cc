//! Automatic sequential gearbox with hysteresis
//!
//! Shifts one gear at a time. Each trigger (up and down) disarms after it
//! fires and only re-arms once rpm has left the trigger zone by
//! `rearm_band_rpm`, so rpm hovering around a threshold produces a single
//! shift. A minimum dwell between shifts backs this up.

use tracing::debug;

use crate::config::GearboxConfig;
use crate::gears::GearTable;

/// What the gearbox reads each tick
#[derive(Debug, Clone, Copy)]
pub struct ShiftInput {
    pub rpm: f32,
    pub speed: f32,
    pub gas: f32,
    pub burnout: bool,
    /// Engine running (shifts are suppressed otherwise)
    pub driving: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// Neutral into first
    Engage,
    Up,
    Down,
}

/// Result of one gearbox update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftOutcome {
    pub gear: u8,
    /// Instant rpm change caused by the shift
    pub rpm_offset: f32,
    /// Multiplier on turbo pressure (below 1.0 on an upshift blow-off)
    pub turbo_scale: f32,
    pub shift: Option<Shift>,
}

impl ShiftOutcome {
    fn hold(gear: u8) -> Self {
        Self {
            gear,
            rpm_offset: 0.0,
            turbo_scale: 1.0,
            shift: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransmissionController {
    table: GearTable,
    config: GearboxConfig,
    up_armed: bool,
    down_armed: bool,
    since_shift: f32,
}

impl TransmissionController {
    pub fn new(table: GearTable, config: &GearboxConfig) -> Self {
        Self {
            table,
            config: config.clone(),
            up_armed: true,
            down_armed: true,
            since_shift: config.shift_dwell_secs,
        }
    }

    pub fn table(&self) -> &GearTable {
        &self.table
    }

    /// Decide the gear for this tick
    pub fn update(&mut self, gear: u8, input: &ShiftInput, dt: f32) -> ShiftOutcome {
        self.since_shift += dt;

        let up_rpm = self.table.shift_up_rpm();
        let down_rpm = self.table.shift_down_rpm();
        if input.rpm < up_rpm - self.config.rearm_band_rpm {
            self.up_armed = true;
        }
        if input.rpm > down_rpm + self.config.rearm_band_rpm {
            self.down_armed = true;
        }

        if !input.driving {
            return ShiftOutcome::hold(gear);
        }

        if gear == 0 {
            if input.gas > self.config.engage_gas_threshold && !input.burnout {
                return self.shift_to(1, Shift::Engage, 0.0, 1.0);
            }
            return ShiftOutcome::hold(gear);
        }

        if self.since_shift < self.config.shift_dwell_secs {
            return ShiftOutcome::hold(gear);
        }

        if self.up_armed && input.rpm > up_rpm && gear < self.table.top_gear() && !input.burnout {
            self.up_armed = false;
            return self.shift_to(
                gear + 1,
                Shift::Up,
                -self.config.upshift_rpm_drop,
                self.config.upshift_turbo_retain.clamp(0.0, 1.0),
            );
        }

        if self.down_armed
            && input.rpm < down_rpm
            && gear > 1
            && input.speed > self.config.downshift_min_speed
        {
            self.down_armed = false;
            return self.shift_to(gear - 1, Shift::Down, self.config.downshift_rpm_rise, 1.0);
        }

        ShiftOutcome::hold(gear)
    }

    fn shift_to(&mut self, gear: u8, shift: Shift, rpm_offset: f32, turbo_scale: f32) -> ShiftOutcome {
        self.since_shift = 0.0;
        debug!(gear, ?shift, "gear change");
        ShiftOutcome {
            gear,
            rpm_offset,
            turbo_scale,
            shift: Some(shift),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    const DT: f32 = 1.0 / 60.0;

    fn controller() -> TransmissionController {
        let gearbox = GearboxConfig::default();
        let table = GearTable::new(&gearbox, &EngineConfig::default());
        TransmissionController::new(table, &gearbox)
    }

    fn input(rpm: f32, speed: f32) -> ShiftInput {
        ShiftInput {
            rpm,
            speed,
            gas: 0.8,
            burnout: false,
            driving: true,
        }
    }

    #[test]
    fn test_engage_first_from_neutral() {
        let mut t = controller();
        let out = t.update(0, &input(900.0, 0.0), DT);
        assert_eq!(out.gear, 1);
        assert_eq!(out.shift, Some(Shift::Engage));
    }

    #[test]
    fn test_stays_in_neutral_without_gas() {
        let mut t = controller();
        let out = t.update(0, &ShiftInput { gas: 0.0, ..input(900.0, 0.0) }, DT);
        assert_eq!(out.gear, 0);
    }

    #[test]
    fn test_upshift_drops_rpm_and_bleeds_turbo() {
        let mut t = controller();
        let out = t.update(2, &input(7300.0, 80.0), DT);
        assert_eq!(out.gear, 3);
        assert_eq!(out.rpm_offset, -2500.0);
        assert_eq!(out.turbo_scale, 0.0);
    }

    #[test]
    fn test_no_upshift_in_top_gear() {
        let mut t = controller();
        let out = t.update(6, &input(7900.0, 200.0), DT);
        assert_eq!(out.gear, 6);
    }

    #[test]
    fn test_no_upshift_during_burnout() {
        let mut t = controller();
        let out = t.update(1, &ShiftInput { burnout: true, ..input(7900.0, 0.0) }, DT);
        assert_eq!(out.gear, 1);
    }

    #[test]
    fn test_downshift_needs_speed() {
        let mut t = controller();
        assert_eq!(t.update(3, &input(1500.0, 5.0), DT).gear, 3);
        let out = t.update(3, &input(1500.0, 40.0), DT);
        assert_eq!(out.gear, 2);
        assert_eq!(out.rpm_offset, 1500.0);
    }

    #[test]
    fn test_never_downshifts_below_first() {
        let mut t = controller();
        assert_eq!(t.update(1, &input(1000.0, 40.0), DT).gear, 1);
    }

    #[test]
    fn test_no_chatter_around_upshift_threshold() {
        let mut t = controller();
        let mut gear = 2;
        let mut shifts = 0;
        for i in 0..600 {
            // Hover just either side of 7200 for ten seconds
            let rpm = if i % 2 == 0 { 7190.0 } else { 7210.0 };
            let out = t.update(gear, &input(rpm, 90.0), DT);
            if out.shift.is_some() {
                shifts += 1;
            }
            gear = out.gear;
        }
        assert_eq!(shifts, 1);
        assert_eq!(gear, 3);
    }

    #[test]
    fn test_rearms_after_leaving_zone() {
        let mut t = controller();
        assert_eq!(t.update(2, &input(7300.0, 90.0), DT).gear, 3);
        // Drop well below the re-arm band and wait out the dwell
        for _ in 0..30 {
            t.update(3, &input(5000.0, 100.0), DT);
        }
        assert_eq!(t.update(3, &input(7300.0, 120.0), DT).gear, 4);
    }

    #[test]
    fn test_single_step_per_tick() {
        let mut t = controller();
        for gear in 1..6u8 {
            let out = t.update(gear, &input(7900.0, 100.0), 1.0);
            assert!(out.gear <= gear + 1);
            t.update(out.gear, &input(3000.0, 100.0), 1.0);
        }
    }
}
