//! Gear ratio and shift threshold lookup

use crate::config::{EngineConfig, GearboxConfig};

/// Static gear data derived from the gearbox config
#[derive(Debug, Clone, PartialEq)]
pub struct GearTable {
    ratios: Vec<f32>,
    shift_up_rpm: f32,
    shift_down_rpm: f32,
}

impl GearTable {
    pub fn new(gearbox: &GearboxConfig, engine: &EngineConfig) -> Self {
        Self {
            ratios: gearbox.ratios.clone(),
            shift_up_rpm: gearbox.shift_up_fraction * engine.max_rpm,
            shift_down_rpm: gearbox.shift_down_fraction * engine.max_rpm,
        }
    }

    /// Ratio for a gear; 0.0 for neutral or a gear that doesn't exist
    #[inline]
    pub fn ratio(&self, gear: u8) -> f32 {
        if gear == 0 {
            return 0.0;
        }
        self.ratios.get(usize::from(gear)).copied().unwrap_or(0.0)
    }

    /// Highest forward gear
    pub fn top_gear(&self) -> u8 {
        // validate() caps the table below u8::MAX entries
        u8::try_from(self.ratios.len().saturating_sub(1)).unwrap_or(u8::MAX)
    }

    pub fn shift_up_rpm(&self) -> f32 {
        self.shift_up_rpm
    }

    pub fn shift_down_rpm(&self) -> f32 {
        self.shift_down_rpm
    }
}
