//! Per-block energy envelope built from overlapping FFT windows.

use rayon::prelude::*;

use super::spectrum::SpectrumTransform;
use crate::error::Result;

/// Energy of one analysis block.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeBlock {
    pub index: usize,
    /// Start of the block in seconds.
    pub time: f32,
    /// Sum of spectrum magnitudes.
    pub energy: f32,
    /// Magnitude sums over contiguous, evenly sized spectrum slices.
    pub bands: Option<Vec<f32>>,
}

/// Splits a sample buffer into overlapping blocks and reduces each one to
/// its total spectral energy, plus optional per-band energies.
#[derive(Debug, Clone)]
pub struct EnergyEnvelope {
    transform: SpectrumTransform,
    hop: usize,
    sample_rate: u32,
    bands: Option<usize>,
}

impl EnergyEnvelope {
    /// 50% overlap: hop is half the window.
    pub fn new(window_size: usize, sample_rate: u32) -> Result<Self> {
        let transform = SpectrumTransform::hann(window_size)?;
        Ok(Self {
            hop: window_size / 2,
            transform,
            sample_rate,
            bands: None,
        })
    }

    pub fn with_hop(mut self, hop: usize) -> Self {
        self.hop = hop.max(1);
        self
    }

    /// Also compute `count` frequency bands for every block.
    pub fn with_bands(mut self, count: usize) -> Self {
        self.bands = (count > 0).then_some(count);
        self
    }

    pub fn window_size(&self) -> usize {
        self.transform.size()
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of windows analysed in `len` samples. A window must end
    /// strictly before the last sample, so one ending exactly at `len` is
    /// not counted.
    pub fn block_count(&self, len: usize) -> usize {
        let size = self.transform.size();
        if len <= size {
            0
        } else {
            (len - size - 1) / self.hop + 1
        }
    }

    pub fn block_at(&self, samples: &[f32], index: usize) -> Result<EnvelopeBlock> {
        let start = index * self.hop;
        let block = &samples[start..start + self.transform.size()];
        let spectrum = self.transform.magnitudes(block)?;

        let energy: f32 = spectrum.iter().sum();
        let bands = self.bands.map(|count| band_energies(&spectrum, count));

        Ok(EnvelopeBlock {
            index,
            time: start as f32 / self.sample_rate as f32,
            energy,
            bands,
        })
    }

    /// Blocks `range` computed in parallel and returned in index order.
    pub fn blocks_in(
        &self,
        samples: &[f32],
        range: std::ops::Range<usize>,
    ) -> Result<Vec<EnvelopeBlock>> {
        let end = range.end.min(self.block_count(samples.len()));
        (range.start..end)
            .into_par_iter()
            .map(|index| self.block_at(samples, index))
            .collect()
    }

    /// Lazy, sequential pass over every block of `samples`.
    pub fn blocks<'a>(&'a self, samples: &'a [f32]) -> EnvelopeBlocks<'a> {
        EnvelopeBlocks {
            envelope: self,
            samples,
            next: 0,
            count: self.block_count(samples.len()),
        }
    }
}

/// Iterator returned by [`EnergyEnvelope::blocks`].
pub struct EnvelopeBlocks<'a> {
    envelope: &'a EnergyEnvelope,
    samples: &'a [f32],
    next: usize,
    count: usize,
}

impl Iterator for EnvelopeBlocks<'_> {
    type Item = EnvelopeBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let block = self.envelope.block_at(self.samples, self.next).ok()?;
        self.next += 1;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

/// Sums `spectrum` over `count` contiguous slices of near-equal width.
pub fn band_energies(spectrum: &[f32], count: usize) -> Vec<f32> {
    let len = spectrum.len();
    (0..count)
        .map(|b| {
            let lo = b * len / count;
            let hi = (b + 1) * len / count;
            spectrum[lo..hi].iter().sum()
        })
        .collect()
}

/// Exponentially smoothed running energy used as the onset floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    value: f32,
    smoothing: f32,
}

impl Baseline {
    pub fn new(smoothing: f32) -> Self {
        Self {
            value: 0.0,
            smoothing: smoothing.clamp(0.0, 1.0),
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// `value <- lerp(value, energy, smoothing)`
    pub fn update(&mut self, energy: f32) {
        self.value += (energy - self.value) * self.smoothing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_count_uses_half_overlap() {
        let envelope = EnergyEnvelope::new(8, 100).unwrap();
        assert_eq!(envelope.hop(), 4);
        assert_eq!(envelope.block_count(7), 0);
        assert_eq!(envelope.block_count(8), 0);
        assert_eq!(envelope.block_count(9), 1);
        assert_eq!(envelope.block_count(16), 2);
        assert_eq!(envelope.block_count(17), 3);
        assert_eq!(envelope.blocks(&[0.0; 16]).count(), 2);
    }

    #[test]
    fn parallel_blocks_match_sequential() {
        let samples: Vec<f32> = (0..4096).map(|i| ((i * 7919) % 113) as f32 / 113.0 - 0.5).collect();
        let envelope = EnergyEnvelope::new(256, 8000).unwrap().with_bands(4);

        let sequential: Vec<EnvelopeBlock> = envelope.blocks(&samples).collect();
        let parallel = envelope.blocks_in(&samples, 0..usize::MAX).unwrap();

        assert_eq!(sequential, parallel);
        assert!(parallel.windows(2).all(|w| w[0].index + 1 == w[1].index));
    }

    #[test]
    fn block_time_follows_hop() {
        let envelope = EnergyEnvelope::new(8, 4).unwrap();
        let blocks: Vec<EnvelopeBlock> = envelope.blocks(&[0.0; 17]).collect();
        assert_eq!(blocks[1].time, 1.0);
        assert_eq!(blocks[2].time, 2.0);
    }

    #[test]
    fn bands_partition_the_whole_spectrum() {
        let spectrum: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let bands = band_energies(&spectrum, 3);
        assert_eq!(bands.len(), 3);
        assert_eq!(bands.iter().sum::<f32>(), spectrum.iter().sum::<f32>());
        assert_eq!(bands[0], 0.0 + 1.0 + 2.0);
    }

    #[test]
    fn baseline_lerps_toward_energy() {
        let mut baseline = Baseline::new(0.5);
        baseline.update(10.0);
        assert_eq!(baseline.value(), 5.0);
        baseline.update(10.0);
        assert_eq!(baseline.value(), 7.5);
    }
}
