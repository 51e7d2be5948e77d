//! Windowed magnitude spectrum of a single sample block.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{MapError, Result};

/// Taper applied to a block before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowFunction {
    #[default]
    Hann,
    Rectangular,
}

impl WindowFunction {
    pub fn coefficients(self, size: usize) -> Vec<f32> {
        match self {
            WindowFunction::Hann => hann_window(size),
            WindowFunction::Rectangular => vec![1.0; size],
        }
    }
}

/// Forward FFT of a fixed power-of-two size, returning the N/2 magnitudes
/// below Nyquist. The plan and window are built once and reused for every
/// block, so one transform can be shared by rayon workers.
#[derive(Clone)]
pub struct SpectrumTransform {
    size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumTransform {
    pub fn new(size: usize, window: WindowFunction) -> Result<Self> {
        if size < 2 || !size.is_power_of_two() {
            return Err(MapError::InvalidWindowSize(size));
        }
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        Ok(Self {
            size,
            window: window.coefficients(size),
            fft,
        })
    }

    pub fn hann(size: usize) -> Result<Self> {
        Self::new(size, WindowFunction::Hann)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of magnitudes produced per block.
    pub fn bins(&self) -> usize {
        self.size / 2
    }

    /// Magnitude spectrum of `block`, which must hold exactly `size` samples.
    pub fn magnitudes(&self, block: &[f32]) -> Result<Vec<f32>> {
        if block.len() != self.size {
            return Err(MapError::InvalidWindowSize(block.len()));
        }

        let mut buffer: Vec<Complex<f32>> = block
            .iter()
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        Ok(buffer[..self.size / 2].iter().map(|c| c.norm()).collect())
    }
}

impl std::fmt::Debug for SpectrumTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumTransform")
            .field("size", &self.size)
            .finish()
    }
}

/// Magnitude spectrum of a power-of-two block with a Hann window.
pub fn magnitude_spectrum(block: &[f32]) -> Result<Vec<f32>> {
    SpectrumTransform::hann(block.len())?.magnitudes(block)
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert!(matches!(
            SpectrumTransform::hann(1000),
            Err(MapError::InvalidWindowSize(1000))
        ));
        assert!(magnitude_spectrum(&[0.0; 6]).is_err());
    }

    #[test]
    fn output_is_half_the_window() {
        let spectrum = magnitude_spectrum(&vec![0.0; 512]).unwrap();
        assert_eq!(spectrum.len(), 256);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        // 1024-point FFT at 1024 Hz puts 64 Hz exactly in bin 64
        let spectrum = magnitude_spectrum(&sine(64.0, 1024.0, 1024)).unwrap();
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 64);
        assert!(spectrum.iter().all(|&m| m >= 0.0));
    }

    #[test]
    fn hann_window_tapers_to_zero() {
        let w = hann_window(8);
        assert!(w[0].abs() < 1e-6);
        assert!(w[7].abs() < 1e-6);
        assert!(w[3] > 0.9 && w[4] > 0.9);
    }

    #[test]
    fn rectangular_window_keeps_dc() {
        let transform = SpectrumTransform::new(8, WindowFunction::Rectangular).unwrap();
        let spectrum = transform.magnitudes(&[1.0; 8]).unwrap();
        assert!((spectrum[0] - 8.0).abs() < 1e-4);
        assert!(spectrum[1..].iter().all(|&m| m < 1e-4));
    }

    #[test]
    fn deterministic_for_same_input() {
        let block = sine(440.0, 44100.0, 2048);
        let transform = SpectrumTransform::hann(2048).unwrap();
        assert_eq!(
            transform.magnitudes(&block).unwrap(),
            transform.magnitudes(&block).unwrap()
        );
    }
}
