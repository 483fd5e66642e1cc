//! Exponential-approach parameter smoothing
//!
//! The same primitive drives physics state (rpm, turbo, temperature) and
//! every audio parameter, so a value never jumps between updates:
//!
//! `value ← lerp(value, target, rate · dt)`
//!
//! The blend factor is clamped to 1.0 so a large `rate · dt` lands exactly
//! on the target instead of overshooting it.

/// Move `value` toward `target` by `rate · dt` of the remaining distance.
#[inline]
pub fn approach(value: f32, target: f32, rate: f32, dt: f32) -> f32 {
    if !target.is_finite() {
        return value;
    }
    let t = (rate * dt).clamp(0.0, 1.0);
    value + (target - value) * t
}

/// A smoothed scalar with separate rise and fall rates (per second)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSmoother {
    value: f32,
    target: f32,
    rise_rate: f32,
    fall_rate: f32,
}

impl ParameterSmoother {
    /// Create a smoother with the same rate in both directions
    pub fn new(initial: f32, rate: f32) -> Self {
        Self::asymmetric(initial, rate, rate)
    }

    /// Create a smoother that rises and falls at different rates
    pub fn asymmetric(initial: f32, rise_rate: f32, fall_rate: f32) -> Self {
        Self {
            value: initial,
            target: initial,
            rise_rate: rise_rate.max(0.0),
            fall_rate: fall_rate.max(0.0),
        }
    }

    /// Set a new target; non-finite targets are ignored
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if target.is_finite() {
            self.target = target;
        }
    }

    /// Jump to a value immediately (value and target)
    pub fn snap(&mut self, value: f32) {
        if value.is_finite() {
            self.value = value;
            self.target = value;
        }
    }

    /// Current smoothed value
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Current target
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Advance by `dt` seconds and return the new value
    #[inline]
    pub fn step(&mut self, dt: f32) -> f32 {
        let rate = if self.target > self.value {
            self.rise_rate
        } else {
            self.fall_rate
        };
        self.value = approach(self.value, self.target, rate, dt);
        self.value
    }

    /// True once the value is within `epsilon` of its target
    pub fn is_settled(&self, epsilon: f32) -> bool {
        (self.value - self.target).abs() <= epsilon
    }
}
