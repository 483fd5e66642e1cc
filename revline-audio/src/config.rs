//! Audio settings

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Output and synthesis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Preferred device sample rate; `None` takes the device default
    pub sample_rate: Option<u32>,
    pub master_volume: f32,
    pub muted: bool,
    /// Fade applied when the engine stops before voices are released
    pub fade_out_secs: f32,
    /// Frames between snapshot reads and filter coefficient updates
    pub control_block: usize,
    /// Seconds between `Levels` events
    pub levels_interval_secs: f32,
    /// Seed for the shared noise table
    pub noise_seed: u64,
    pub rates: SmoothingRates,
    pub blow_off: BlowOffConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            master_volume: 0.8,
            muted: false,
            fade_out_secs: 0.25,
            control_block: 64,
            levels_interval_secs: 0.5,
            noise_seed: 0xB10F_F00D,
            rates: SmoothingRates::default(),
            blow_off: BlowOffConfig::default(),
        }
    }
}

/// Per-parameter smoothing speeds (1/s)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingRates {
    pub gain: f32,
    pub frequency: f32,
    pub cutoff: f32,
    pub master: f32,
}

impl Default for SmoothingRates {
    fn default() -> Self {
        Self {
            gain: 30.0,
            frequency: 12.0,
            cutoff: 10.0,
            master: 25.0,
        }
    }
}

/// Turbo dump valve burst
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlowOffConfig {
    /// Turbo pressure the drop has to start above
    pub armed: f32,
    /// Minimum fall below the recent peak
    pub drop: f32,
    /// How long a boost peak is remembered once pressure stops rising
    pub hold_secs: f32,
    /// Envelope time constant
    pub decay_secs: f32,
    pub gain: f32,
}

impl Default for BlowOffConfig {
    fn default() -> Self {
        Self {
            armed: 0.6,
            drop: 0.3,
            hold_secs: 0.35,
            decay_secs: 0.35,
            gain: 0.35,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<(), AudioError> {
        if !(0.0..=2.0).contains(&self.master_volume) {
            return Err(AudioError::InvalidConfig(format!(
                "master_volume must be within 0.0-2.0, got {}",
                self.master_volume
            )));
        }
        if !(self.fade_out_secs > 0.0 && self.fade_out_secs <= 5.0) {
            return Err(AudioError::InvalidConfig(format!(
                "fade_out_secs must be within (0, 5], got {}",
                self.fade_out_secs
            )));
        }
        if !(1..=4096).contains(&self.control_block) {
            return Err(AudioError::InvalidConfig(format!(
                "control_block must be 1-4096 frames, got {}",
                self.control_block
            )));
        }
        if let Some(rate) = self.sample_rate {
            if !(8_000..=384_000).contains(&rate) {
                return Err(AudioError::InvalidConfig(format!(
                    "unsupported sample rate {rate}"
                )));
            }
        }
        let r = &self.rates;
        if [r.gain, r.frequency, r.cutoff, r.master].iter().any(|v| !(*v > 0.0)) {
            return Err(AudioError::InvalidConfig("smoothing rates must be positive".into()));
        }
        if !(self.blow_off.decay_secs > 0.0) {
            return Err(AudioError::InvalidConfig("blow_off.decay_secs must be positive".into()));
        }
        if !(self.blow_off.hold_secs >= 0.0) {
            return Err(AudioError::InvalidConfig("blow_off.hold_secs must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(AudioConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_fade() {
        let config = AudioConfig {
            fade_out_secs: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_block() {
        let config = AudioConfig {
            control_block: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AudioError::InvalidConfig(_))));
    }
}
