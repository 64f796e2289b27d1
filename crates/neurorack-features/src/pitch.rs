//! Frame-wise fundamental frequency estimation using YIN.
//!
//! Steps (de Cheveigné & Kawahara, 2002):
//!
//! 1. Difference function d(τ) = Σ(x[j] - x[j+τ])² over half the frame
//! 2. Cumulative mean normalized difference d'(τ)
//! 3. First trough of d'(τ) below the threshold, else the global minimum
//! 4. Parabolic interpolation for sub-sample accuracy
//!
//! Every frame yields a frequency; unvoiced frames land on the global minimum.

const YIN_THRESHOLD: f32 = 0.1;

pub struct YinTracker {
    sample_rate: f32,
    window: usize,
    min_period: usize,
    max_period: usize,
    threshold: f32,

    // Pre-allocated, indexed by lag
    difference: Vec<f32>,
    cumulative_mean: Vec<f32>,
}

impl YinTracker {
    /// `frame_length` is the number of samples passed to [`estimate`](Self::estimate).
    pub fn new(sample_rate: u32, frame_length: usize, min_hz: f32, max_hz: f32) -> Self {
        let sample_rate = sample_rate as f32;
        let window = frame_length / 2;
        let min_period = ((sample_rate / max_hz).floor() as usize).max(1);
        let max_period = ((sample_rate / min_hz).ceil() as usize)
            .min(frame_length.saturating_sub(window + 1))
            .max(min_period + 1);

        Self {
            sample_rate,
            window,
            min_period,
            max_period,
            threshold: YIN_THRESHOLD,
            difference: vec![0.0; max_period + 2],
            cumulative_mean: vec![0.0; max_period + 2],
        }
    }

    /// Estimated fundamental in Hz for one frame.
    ///
    /// Returns `NaN` if the frame is too short to cover the lag range.
    pub fn estimate(&mut self, frame: &[f32]) -> f32 {
        if frame.len() < self.window + self.max_period + 1 {
            return f32::NAN;
        }

        self.compute_difference(frame);
        self.compute_cumulative_mean();

        let period = self.best_period();
        let refined = self.parabolic_interpolation(period);
        self.sample_rate / refined
    }

    fn compute_difference(&mut self, frame: &[f32]) {
        let window = self.window;
        for tau in 0..=self.max_period + 1 {
            let mut sum = 0.0f32;
            for j in 0..window {
                let delta = frame[j] - frame[j + tau];
                sum += delta * delta;
            }
            self.difference[tau] = sum;
        }
    }

    fn compute_cumulative_mean(&mut self) {
        self.cumulative_mean[0] = 1.0;
        let mut running = 0.0f32;
        for tau in 1..self.difference.len() {
            running += self.difference[tau];
            self.cumulative_mean[tau] = if running > f32::EPSILON {
                self.difference[tau] * tau as f32 / running
            } else {
                1.0
            };
        }
    }

    fn best_period(&self) -> usize {
        let cmnd = &self.cumulative_mean;

        let mut tau = self.min_period;
        while tau <= self.max_period {
            if cmnd[tau] < self.threshold {
                while tau < self.max_period && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                return tau;
            }
            tau += 1;
        }

        let mut best = self.min_period;
        for tau in self.min_period..=self.max_period {
            if cmnd[tau] < cmnd[best] {
                best = tau;
            }
        }
        best
    }

    fn parabolic_interpolation(&self, tau: usize) -> f32 {
        if tau == 0 || tau + 1 >= self.cumulative_mean.len() {
            return tau as f32;
        }
        let a = self.cumulative_mean[tau - 1];
        let b = self.cumulative_mean[tau];
        let c = self.cumulative_mean[tau + 1];
        let denom = a - 2.0 * b + c;
        if denom.abs() < 1e-9 {
            return tau as f32;
        }
        let shift = (0.5 * (a - c) / denom).clamp(-1.0, 1.0);
        tau as f32 + shift
    }
}
