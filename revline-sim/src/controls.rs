//! Driver inputs copied into the simulation each tick

/// Pedals and switches as the driver last set them
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlInputs {
    pub gas: f32,
    pub brake: f32,
    pub nitro: bool,
    pub ignition_requested: bool,
    pub lights_on: bool,
}

impl ControlInputs {
    /// Set gas pedal (clamped to 0.0-1.0, non-finite reads as released)
    pub fn set_gas(&mut self, value: f32) {
        self.gas = clamp_pedal(value);
    }

    /// Set brake pedal (clamped to 0.0-1.0, non-finite reads as released)
    pub fn set_brake(&mut self, value: f32) {
        self.brake = clamp_pedal(value);
    }

    /// Copy with both pedals forced into range
    pub fn sanitized(&self) -> Self {
        Self {
            gas: clamp_pedal(self.gas),
            brake: clamp_pedal(self.brake),
            ..*self
        }
    }
}

#[inline]
fn clamp_pedal(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
