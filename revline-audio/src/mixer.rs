//! Master bus - volume, mute and soft clipping

use revline_sim::ParameterSmoother;

/// Final gain stage before the device
pub struct MasterBus {
    volume: f32,
    muted: bool,
    /// Smoothed gain actually applied (volume, or 0 when muted)
    gain: ParameterSmoother,
}

impl MasterBus {
    pub fn new(volume: f32, muted: bool, rate: f32) -> Self {
        let volume = volume.clamp(0.0, 2.0);
        let initial = if muted { 0.0 } else { volume };
        Self {
            volume,
            muted,
            gain: ParameterSmoother::new(initial, rate),
        }
    }

    /// Set master volume (0.0-2.0)
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 2.0);
            self.retarget();
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.retarget();
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn retarget(&mut self) {
        self.gain
            .set_target(if self.muted { 0.0 } else { self.volume });
    }

    /// Apply gain and soft clipping to interleaved frames in place
    pub fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: f32) {
        // Fully faded mute is exact silence
        if self.muted && self.gain.is_settled(1e-6) {
            buffer.fill(0.0);
            return;
        }

        let dt = 1.0 / sample_rate;
        for frame in buffer.chunks_mut(channels.max(1)) {
            let gain = self.gain.step(dt);
            for sample in frame.iter_mut() {
                *sample = soft_clip(*sample * gain);
            }
        }
    }
}

/// Soft clip threshold
const SOFT_CLIP_THRESHOLD: f32 = 0.75;
/// Soft clip ceiling
const SOFT_CLIP_CEILING: f32 = 0.95;

/// Transparent below the threshold, asymptotic to the ceiling above it
#[inline(always)]
pub fn soft_clip(x: f32) -> f32 {
    let abs_x = x.abs();
    if abs_x <= SOFT_CLIP_THRESHOLD {
        return x;
    }

    let knee_width = SOFT_CLIP_CEILING - SOFT_CLIP_THRESHOLD;
    let over = (abs_x - SOFT_CLIP_THRESHOLD) / knee_width;
    let compressed = SOFT_CLIP_THRESHOLD + knee_width * (1.0 - (-over * 3.0).exp());
    x.signum() * compressed.min(SOFT_CLIP_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_clip_transparent_below_threshold() {
        assert_eq!(soft_clip(0.5), 0.5);
        assert_eq!(soft_clip(-0.7), -0.7);
        assert_eq!(soft_clip(0.0), 0.0);
    }

    #[test]
    fn test_soft_clip_bounded() {
        for x in [0.9, 1.5, 10.0, 1e6] {
            let y = soft_clip(x);
            assert!(y <= SOFT_CLIP_CEILING && y > SOFT_CLIP_THRESHOLD);
            assert_eq!(soft_clip(-x), -y);
        }
    }

    #[test]
    fn test_mute_ramps_to_zero() {
        let mut bus = MasterBus::new(1.0, false, 25.0);
        bus.set_muted(true);
        let mut buf = vec![0.5f32; 2 * 48_000];
        bus.process(&mut buf, 2, 48_000.0);
        // First frame barely moved, last frame inaudible
        assert!(buf[0] > 0.49);
        assert!(buf[buf.len() - 1].abs() < 1e-4);

        // Once the fade has settled the bus writes exact zeros
        let mut next = vec![0.5f32; 256];
        bus.process(&mut next, 2, 48_000.0);
        assert!(next.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_volume_clamped() {
        let mut bus = MasterBus::new(5.0, false, 25.0);
        assert_eq!(bus.volume(), 2.0);
        bus.set_volume(f32::NAN);
        assert_eq!(bus.volume(), 2.0);
        bus.set_volume(-1.0);
        assert_eq!(bus.volume(), 0.0);
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut bus = MasterBus::new(1.0, false, 25.0);
        let mut buf = vec![0.0f32; 256];
        bus.process(&mut buf, 2, 48_000.0);
        assert!(buf.iter().all(|&x| x == 0.0));
    }
}
