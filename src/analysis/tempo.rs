//! Single-tempo BPM estimation by autocorrelation of a coarse energy series.
//!
//! The estimator squares and sums raw samples over short windows, then
//! searches for the lag (within a tempo range) that maximizes
//! `sum(e[i] * e[i + lag])`. It assumes one dominant tempo per track.

pub const DEFAULT_BPM: f32 = 120.0;

/// Only the opening of a track is analyzed.
const MAX_ANALYSIS_SECONDS: f32 = 30.0;
/// Shorter input falls back to [`DEFAULT_BPM`].
const MIN_ANALYSIS_SECONDS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimator {
    pub min_bpm: f32,
    pub max_bpm: f32,
    /// Length of one coarse energy window in seconds.
    pub window_seconds: f32,
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self {
            min_bpm: 80.0,
            max_bpm: 200.0,
            window_seconds: 0.1,
        }
    }
}

impl TempoEstimator {
    /// Estimated BPM of a mono buffer, or [`DEFAULT_BPM`] when the audio is
    /// too short or the autocorrelation finds nothing.
    pub fn estimate(&self, samples: &[f32], sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return DEFAULT_BPM;
        }

        let available = samples.len() as f32 / sample_rate as f32;
        let analysis_seconds = available.min(MAX_ANALYSIS_SECONDS);
        let analysis_samples = (analysis_seconds * sample_rate as f32).floor() as usize;

        if analysis_samples < sample_rate as usize * MIN_ANALYSIS_SECONDS as usize {
            log::debug!(
                "Only {:.1}s of audio, using default tempo {:.0} BPM",
                available,
                DEFAULT_BPM
            );
            return DEFAULT_BPM;
        }

        let window_size = ((sample_rate as f32 * self.window_seconds) as usize).max(1);
        let series = coarse_energy(&samples[..analysis_samples], window_size);
        let window_seconds = window_size as f32 / sample_rate as f32;

        self.estimate_from_series(&series, window_seconds)
    }

    /// Autocorrelation over an already computed energy series whose entries
    /// are `window_seconds` apart.
    pub fn estimate_from_series(&self, series: &[f32], window_seconds: f32) -> f32 {
        let Some((min_lag, max_lag)) = self.lag_range(window_seconds) else {
            log::warn!("Degenerate tempo lag range, using default {:.0} BPM", DEFAULT_BPM);
            return DEFAULT_BPM;
        };

        let mut best: Option<(usize, f32)> = None;
        for lag in min_lag..=max_lag {
            let correlation = autocorrelation(series, lag);
            if best.map_or(true, |(_, c)| correlation > c) {
                best = Some((lag, correlation));
            }
        }

        match best {
            Some((lag, correlation)) if correlation > 0.0 => {
                let bpm = 60.0 / (lag as f32 * window_seconds);
                log::debug!(
                    "Tempo lag {} ({:.3}s) correlation {:.4} -> {:.2} BPM",
                    lag,
                    lag as f32 * window_seconds,
                    correlation,
                    bpm
                );
                bpm
            }
            _ => {
                log::warn!("No positive tempo correlation, using default {:.0} BPM", DEFAULT_BPM);
                DEFAULT_BPM
            }
        }
    }

    /// Inclusive lag bounds for the BPM range, `None` when empty.
    pub fn lag_range(&self, window_seconds: f32) -> Option<(usize, usize)> {
        if window_seconds <= 0.0 || self.min_bpm <= 0.0 || self.max_bpm <= 0.0 {
            return None;
        }
        let min_lag = (60.0 / self.max_bpm / window_seconds).round() as usize;
        let max_lag = (60.0 / self.min_bpm / window_seconds).round() as usize;
        if max_lag <= min_lag || min_lag == 0 {
            return None;
        }
        Some((min_lag, max_lag))
    }
}

/// Sum of squared amplitudes over consecutive non-overlapping windows.
/// The trailing window is dropped so every entry covers a full window.
pub fn coarse_energy(samples: &[f32], window_size: usize) -> Vec<f32> {
    if window_size == 0 || samples.len() <= window_size {
        return Vec::new();
    }
    let usable = samples.len() - window_size;
    samples
        .chunks_exact(window_size)
        .take(usable.div_ceil(window_size))
        .map(|chunk| chunk.iter().map(|s| s * s).sum())
        .collect()
}

fn autocorrelation(series: &[f32], lag: usize) -> f32 {
    if lag >= series.len() {
        return 0.0;
    }
    series
        .iter()
        .zip(series[lag..].iter())
        .map(|(a, b)| a * b)
        .sum()
}
