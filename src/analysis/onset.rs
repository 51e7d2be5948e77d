//! Adaptive-threshold peak picking over the energy envelope.

use super::envelope::{Baseline, EnergyEnvelope, EnvelopeBlock};
use crate::error::Result;

/// A block whose energy stood out from the running baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub time: f32,
    pub energy: f32,
    pub frequency_bands: Option<Vec<f32>>,
}

/// Emits a hit whenever a block's energy clears both the absolute floor and
/// `baseline * peak_sensitivity`. The decision uses the baseline from before
/// the current block; the baseline absorbs the block afterwards.
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    minimum_energy: f32,
    peak_sensitivity: f32,
    baseline: Baseline,
}

impl OnsetDetector {
    pub fn new(minimum_energy: f32, peak_sensitivity: f32, smoothing: f32) -> Self {
        Self {
            minimum_energy,
            peak_sensitivity,
            baseline: Baseline::new(smoothing),
        }
    }

    pub fn baseline(&self) -> f32 {
        self.baseline.value()
    }

    pub fn observe(&mut self, block: EnvelopeBlock) -> Option<RawHit> {
        let is_peak = block.energy > self.minimum_energy
            && block.energy > self.baseline.value() * self.peak_sensitivity;
        self.baseline.update(block.energy);

        is_peak.then(|| RawHit {
            time: block.time,
            energy: block.energy,
            frequency_bands: block.bands,
        })
    }

    /// Runs the detector over a complete block sequence.
    pub fn detect<I>(&mut self, blocks: I) -> Vec<RawHit>
    where
        I: IntoIterator<Item = EnvelopeBlock>,
    {
        blocks.into_iter().filter_map(|b| self.observe(b)).collect()
    }
}

/// Progress of an [`OnsetScan`] after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// More blocks remain; call [`OnsetScan::advance`] again.
    Suspended { processed: usize, total: usize },
    Finished { total: usize },
}

/// Onset detection split into bounded chunks so a host can regain control
/// between them. Detector baseline and accumulated hits carry across steps.
#[derive(Debug, Clone)]
pub struct OnsetScan {
    detector: OnsetDetector,
    next_block: usize,
    total: usize,
    hits: Vec<RawHit>,
}

impl OnsetScan {
    pub fn new(detector: OnsetDetector, envelope: &EnergyEnvelope, samples: &[f32]) -> Self {
        Self {
            detector,
            next_block: 0,
            total: envelope.block_count(samples.len()),
            hits: Vec::new(),
        }
    }

    pub fn total_blocks(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.next_block
    }

    pub fn hits(&self) -> &[RawHit] {
        &self.hits
    }

    pub fn into_hits(self) -> Vec<RawHit> {
        self.hits
    }

    pub fn is_finished(&self) -> bool {
        self.next_block >= self.total
    }

    /// Processes up to `max_blocks` blocks. Spectra of the chunk are
    /// computed in parallel; peak decisions run in block order.
    pub fn advance(
        &mut self,
        envelope: &EnergyEnvelope,
        samples: &[f32],
        max_blocks: usize,
    ) -> Result<ScanStatus> {
        let end = self
            .next_block
            .saturating_add(max_blocks.max(1))
            .min(self.total);
        let chunk = envelope.blocks_in(samples, self.next_block..end)?;

        for block in chunk {
            if let Some(hit) = self.detector.observe(block) {
                self.hits.push(hit);
            }
        }
        self.next_block = end;

        if self.is_finished() {
            Ok(ScanStatus::Finished { total: self.total })
        } else {
            Ok(ScanStatus::Suspended {
                processed: self.next_block,
                total: self.total,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(index: usize, energy: f32) -> EnvelopeBlock {
        EnvelopeBlock {
            index,
            time: index as f32 * 0.1,
            energy,
            bands: None,
        }
    }

    #[test]
    fn decision_uses_the_previous_baseline() {
        let mut detector = OnsetDetector::new(0.1, 1.5, 0.5);
        // baseline 0 -> hit, then baseline 5
        assert!(detector.observe(block(0, 10.0)).is_some());
        assert_eq!(detector.baseline(), 5.0);
        // 7 < 5 * 1.5
        assert!(detector.observe(block(1, 7.0)).is_none());
        assert_eq!(detector.baseline(), 6.0);
        // 9.5 > 6 * 1.5
        assert!(detector.observe(block(2, 9.5)).is_some());
    }

    #[test]
    fn energy_below_floor_never_hits() {
        let mut detector = OnsetDetector::new(1.0, 1.5, 0.3);
        let hits = detector.detect((0..10).map(|i| block(i, 0.5)));
        assert!(hits.is_empty());
    }

    #[test]
    fn hits_carry_time_energy_and_bands() {
        let mut detector = OnsetDetector::new(0.1, 1.5, 0.3);
        let mut b = block(3, 2.0);
        b.bands = Some(vec![1.0, 1.0]);
        let hit = detector.observe(b).unwrap();
        assert_eq!(hit.energy, 2.0);
        assert!((hit.time - 0.3).abs() < 1e-6);
        assert_eq!(hit.frequency_bands, Some(vec![1.0, 1.0]));
    }

    #[test]
    fn chunked_scan_matches_one_pass() {
        let samples: Vec<f32> = (0..16384)
            .map(|i| if (i / 1024) % 3 == 0 { ((i % 17) as f32 / 17.0) - 0.5 } else { 0.0 })
            .collect();
        let envelope = EnergyEnvelope::new(512, 8000).unwrap();

        let one_pass = OnsetDetector::new(0.1, 1.5, 0.3).detect(envelope.blocks(&samples));

        let mut scan = OnsetScan::new(OnsetDetector::new(0.1, 1.5, 0.3), &envelope, &samples);
        let mut suspensions = 0;
        loop {
            match scan.advance(&envelope, &samples, 7).unwrap() {
                ScanStatus::Suspended { processed, total } => {
                    assert!(processed < total);
                    suspensions += 1;
                }
                ScanStatus::Finished { total } => {
                    assert_eq!(total, envelope.block_count(samples.len()));
                    break;
                }
            }
        }

        assert!(suspensions > 0);
        assert!(!one_pass.is_empty());
        assert_eq!(scan.into_hits(), one_pass);
    }

    #[test]
    fn unbounded_chunk_after_a_partial_step_finishes() {
        let samples: Vec<f32> = (0..4096).map(|i| ((i % 31) as f32 / 31.0) - 0.5).collect();
        let envelope = EnergyEnvelope::new(256, 8000).unwrap();
        let mut scan = OnsetScan::new(OnsetDetector::new(0.1, 1.5, 0.3), &envelope, &samples);

        assert!(matches!(
            scan.advance(&envelope, &samples, 3).unwrap(),
            ScanStatus::Suspended { processed: 3, .. }
        ));
        let total = scan.total_blocks();
        assert_eq!(
            scan.advance(&envelope, &samples, usize::MAX).unwrap(),
            ScanStatus::Finished { total }
        );
    }

    #[test]
    fn empty_input_finishes_immediately() {
        let envelope = EnergyEnvelope::new(512, 8000).unwrap();
        let samples = vec![0.0; 100];
        let mut scan = OnsetScan::new(OnsetDetector::new(0.1, 1.5, 0.3), &envelope, &samples);
        assert_eq!(
            scan.advance(&envelope, &samples, 50).unwrap(),
            ScanStatus::Finished { total: 0 }
        );
    }
}
