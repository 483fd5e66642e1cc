//! Mono biquad low-pass
//!
//! Coefficients are recomputed only when the cutoff moves, which the graph
//! does once per control block.

use std::f32::consts::PI;

/// Butterworth Q
const DEFAULT_Q: f32 = 0.707;

#[derive(Debug, Clone)]
pub struct LowPass {
    sample_rate: f32,
    cutoff: f32,
    q: f32,

    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl LowPass {
    pub fn new(sample_rate: f32, cutoff: f32) -> Self {
        let mut filter = Self {
            sample_rate,
            cutoff: 0.0,
            q: DEFAULT_Q,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        };
        filter.set_cutoff(cutoff);
        filter
    }

    pub fn with_q(mut self, q: f32) -> Self {
        self.q = q.clamp(0.1, 20.0);
        self.update_coefficients();
        self
    }

    /// Set cutoff in Hz (20 Hz to just under Nyquist)
    pub fn set_cutoff(&mut self, cutoff: f32) {
        if !cutoff.is_finite() {
            return;
        }
        let nyquist = self.sample_rate * 0.49;
        let cutoff = cutoff.clamp(20.0, nyquist.max(20.0));
        if (cutoff - self.cutoff).abs() < 1e-3 {
            return;
        }
        self.cutoff = cutoff;
        self.update_coefficients();
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    fn update_coefficients(&mut self) {
        let omega = 2.0 * PI * self.cutoff / self.sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * self.q);
        let a0 = 1.0 + alpha;

        self.b0 = (1.0 - cos_omega) / 2.0 / a0;
        self.b1 = (1.0 - cos_omega) / a0;
        self.b2 = self.b0;
        self.a1 = -2.0 * cos_omega / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}
