//! Spring-loaded pedals
//!
//! A keyboard key is either down or up, but a pedal has travel. Holding the
//! key pushes the pedal toward the floor at `press_rate`; letting go lets
//! the spring bring it back, damping the position by `damping` every
//! 1/60 s until it drops below `rest_threshold` and snaps to zero.
//!
//! Most terminals only report key presses and auto-repeats. A key counts as
//! released once no press or repeat has arrived for `hold_timeout`.

use crate::commands::{Command, Held};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringConfig {
    /// Travel per second while held (1.0 = floor in one second)
    pub press_rate: f32,
    /// Fraction kept per 1/60 s after release
    pub damping: f32,
    pub rest_threshold: f32,
    pub hold_timeout: f32,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            press_rate: 4.0,
            damping: 0.85,
            rest_threshold: 0.01,
            hold_timeout: 0.6,
        }
    }
}

/// Tracks whether a key is still held, with a release timeout
#[derive(Debug, Clone, Copy, Default)]
struct HoldTimer {
    held: bool,
    left: f32,
}

impl HoldTimer {
    fn press(&mut self, timeout: f32) {
        self.held = true;
        self.left = timeout;
    }

    fn release(&mut self) {
        self.held = false;
        self.left = 0.0;
    }

    fn update(&mut self, dt: f32) -> bool {
        if self.held {
            self.left -= dt;
            if self.left <= 0.0 {
                self.release();
            }
        }
        self.held
    }
}

/// One pedal with spring return
#[derive(Debug, Clone)]
pub struct PedalSpring {
    config: SpringConfig,
    value: f32,
    hold: HoldTimer,
}

impl PedalSpring {
    pub fn new(config: SpringConfig) -> Self {
        Self {
            config,
            value: 0.0,
            hold: HoldTimer::default(),
        }
    }

    /// Key down or auto-repeat
    pub fn press(&mut self) {
        self.hold.press(self.config.hold_timeout);
    }

    /// Explicit key release
    pub fn release(&mut self) {
        self.hold.release();
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Advance by `dt` seconds and return the pedal position (0.0-1.0)
    pub fn update(&mut self, dt: f32) -> f32 {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        if self.hold.update(dt) {
            self.value = (self.value + self.config.press_rate * dt).min(1.0);
        } else if self.value > 0.0 {
            self.value *= self.config.damping.powf(dt * 60.0);
            if self.value < self.config.rest_threshold {
                self.value = 0.0;
            }
        }
        self.value
    }
}

/// Gas, brake and nitro as the simulation should see them this frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PedalState {
    pub gas: f32,
    pub brake: f32,
    pub nitro: bool,
}

/// All held controls together
#[derive(Debug, Clone)]
pub struct DriverControls {
    config: SpringConfig,
    gas: PedalSpring,
    brake: PedalSpring,
    nitro: HoldTimer,
}

impl DriverControls {
    pub fn new(config: SpringConfig) -> Self {
        Self {
            config,
            gas: PedalSpring::new(config),
            brake: PedalSpring::new(config),
            nitro: HoldTimer::default(),
        }
    }

    /// Apply a command; returns false for commands that aren't about held controls
    pub fn handle(&mut self, command: &Command) -> bool {
        match command {
            Command::Press(Held::Gas) => self.gas.press(),
            Command::Press(Held::Brake) => self.brake.press(),
            Command::Press(Held::Nitro) => self.nitro.press(self.config.hold_timeout),
            Command::Release(Held::Gas) => self.gas.release(),
            Command::Release(Held::Brake) => self.brake.release(),
            Command::Release(Held::Nitro) => self.nitro.release(),
            _ => return false,
        }
        true
    }

    pub fn update(&mut self, dt: f32) -> PedalState {
        PedalState {
            gas: self.gas.update(dt),
            brake: self.brake.update(dt),
            nitro: self.nitro.update(dt),
        }
    }

    /// Drop everything (vehicle reset)
    pub fn clear(&mut self) {
        *self = Self::new(self.config);
    }
}

impl Default for DriverControls {
    fn default() -> Self {
        Self::new(SpringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_holding_pushes_to_floor() {
        let mut p = PedalSpring::new(SpringConfig::default());
        for _ in 0..30 {
            p.press();
            p.update(DT);
        }
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn test_release_damps_per_frame() {
        let mut p = PedalSpring::new(SpringConfig::default());
        for _ in 0..30 {
            p.press();
            p.update(DT);
        }
        p.release();
        let v = p.update(DT);
        assert!((v - 0.85).abs() < 1e-4);
    }

    #[test]
    fn test_spring_returns_to_exact_zero() {
        let mut p = PedalSpring::new(SpringConfig::default());
        for _ in 0..30 {
            p.press();
            p.update(DT);
        }
        p.release();
        for _ in 0..60 {
            p.update(DT);
        }
        assert_eq!(p.value(), 0.0);
    }

    #[test]
    fn test_hold_times_out_without_repeats() {
        let mut p = PedalSpring::new(SpringConfig::default());
        p.press();
        for _ in 0..60 {
            p.update(DT);
        }
        // Floored after 0.25 s, let go at 0.6 s, then 0.4 s of spring return
        assert!(p.value() < 0.05);
    }

    #[test]
    fn test_damping_is_frame_rate_independent() {
        let mut fast = PedalSpring::new(SpringConfig::default());
        let mut slow = PedalSpring::new(SpringConfig::default());
        fast.value = 1.0;
        slow.value = 1.0;
        for _ in 0..4 {
            fast.update(DT / 2.0);
        }
        slow.update(DT * 2.0);
        assert!((fast.value() - slow.value()).abs() < 1e-4);
    }

    #[test]
    fn test_driver_controls() {
        let mut c = DriverControls::default();
        assert!(c.handle(&Command::Press(Held::Gas)));
        assert!(c.handle(&Command::Press(Held::Nitro)));
        assert!(!c.handle(&Command::ToggleLights));

        let s = c.update(DT);
        assert!(s.gas > 0.0);
        assert_eq!(s.brake, 0.0);
        assert!(s.nitro);

        c.handle(&Command::Release(Held::Nitro));
        assert!(!c.update(DT).nitro);

        c.clear();
        assert_eq!(c.update(DT), PedalState::default());
    }
}
