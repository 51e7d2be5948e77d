//! Snapping raw onsets onto a fixed-subdivision beat grid.

use std::collections::btree_map::{BTreeMap, Entry};

use super::onset::RawHit;
use crate::error::{MapError, Result};

/// Hits further than this fraction of a subdivision from every grid line
/// are discarded.
pub const SNAP_TOLERANCE: f32 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedHit {
    pub grid_time: f32,
    pub subdivision_index: i64,
    pub energy: f32,
    pub frequency_bands: Option<Vec<f32>>,
}

/// `grid_time(i) = i * subdivision_interval + beat_offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatGrid {
    bpm: f32,
    subdivisions_per_beat: u32,
    beat_offset: f32,
}

impl BeatGrid {
    pub fn new(bpm: f32, subdivisions_per_beat: u32, beat_offset: f32) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(MapError::InvalidConfig(format!("bpm must be positive, got {}", bpm)));
        }
        if subdivisions_per_beat == 0 {
            return Err(MapError::InvalidConfig(
                "subdivisions_per_beat must be at least 1".into(),
            ));
        }
        Ok(Self {
            bpm,
            subdivisions_per_beat,
            beat_offset,
        })
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn subdivisions_per_beat(&self) -> u32 {
        self.subdivisions_per_beat
    }

    pub fn beat_offset(&self) -> f32 {
        self.beat_offset
    }

    pub fn seconds_per_beat(&self) -> f32 {
        60.0 / self.bpm
    }

    pub fn subdivision_interval(&self) -> f32 {
        self.seconds_per_beat() / self.subdivisions_per_beat as f32
    }

    pub fn grid_time(&self, subdivision_index: i64) -> f32 {
        subdivision_index as f32 * self.subdivision_interval() + self.beat_offset
    }

    /// Nearest grid index to `time`.
    pub fn nearest_index(&self, time: f32) -> i64 {
        ((time - self.beat_offset) / self.subdivision_interval()).round() as i64
    }

    /// Position of `subdivision_index` inside its beat, in `0..subdivisions_per_beat`.
    pub fn step_in_beat(&self, subdivision_index: i64) -> u32 {
        subdivision_index.rem_euclid(self.subdivisions_per_beat as i64) as u32
    }

    pub fn is_downbeat(&self, subdivision_index: i64) -> bool {
        self.step_in_beat(subdivision_index) == 0
    }

    /// Snaps `hits` to the grid, keeping the strongest hit per grid index
    /// (the earlier one on equal energy). Output is ordered by index.
    pub fn quantize(&self, hits: &[RawHit]) -> Vec<QuantizedHit> {
        let interval = self.subdivision_interval();
        let tolerance = interval * SNAP_TOLERANCE;
        let mut cells: BTreeMap<i64, &RawHit> = BTreeMap::new();
        let mut discarded = 0usize;

        for hit in hits {
            let index = self.nearest_index(hit.time);
            if (self.grid_time(index) - hit.time).abs() > tolerance {
                discarded += 1;
                continue;
            }
            match cells.entry(index) {
                Entry::Vacant(slot) => {
                    slot.insert(hit);
                }
                Entry::Occupied(mut slot) => {
                    if hit.energy > slot.get().energy {
                        slot.insert(hit);
                    }
                }
            }
        }

        log::debug!(
            "Quantized {} raw hits to {} grid cells ({} off-grid)",
            hits.len(),
            cells.len(),
            discarded
        );

        cells
            .into_iter()
            .map(|(index, hit)| QuantizedHit {
                grid_time: self.grid_time(index),
                subdivision_index: index,
                energy: hit.energy,
                frequency_bands: hit.frequency_bands.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(time: f32, energy: f32) -> RawHit {
        RawHit {
            time,
            energy,
            frequency_bands: None,
        }
    }

    #[test]
    fn same_cell_keeps_the_strongest_hit() {
        // 120 BPM, one subdivision: 0.5s grid
        let grid = BeatGrid::new(120.0, 1, 0.0).unwrap();
        let quantized = grid.quantize(&[hit(1.00, 0.4), hit(1.01, 0.9)]);

        assert_eq!(quantized.len(), 1);
        assert_eq!(quantized[0].subdivision_index, 2);
        assert_eq!(quantized[0].energy, 0.9);
        assert!((quantized[0].grid_time - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equal_energy_keeps_the_first_hit() {
        let grid = BeatGrid::new(120.0, 1, 0.0).unwrap();
        let mut first = hit(0.98, 0.5);
        first.frequency_bands = Some(vec![1.0]);
        let quantized = grid.quantize(&[first, hit(1.02, 0.5)]);
        assert_eq!(quantized[0].frequency_bands, Some(vec![1.0]));
    }

    #[test]
    fn off_grid_hits_are_discarded() {
        let grid = BeatGrid::new(120.0, 1, 0.0).unwrap();
        // 0.21s from 0.0 and 0.29s from 0.5, tolerance is 0.2s
        assert!(grid.quantize(&[hit(0.21, 1.0)]).is_empty());
        assert_eq!(grid.quantize(&[hit(0.19, 1.0)]).len(), 1);
    }

    #[test]
    fn grid_invariant_and_tolerance_hold() {
        let grid = BeatGrid::new(97.0, 4, 0.137).unwrap();
        let interval = grid.subdivision_interval();
        let hits: Vec<RawHit> = (0..400).map(|i| hit(i as f32 * 0.0231, 1.0)).collect();
        let quantized = grid.quantize(&hits);

        assert!(!quantized.is_empty());
        for q in &quantized {
            let expected = q.subdivision_index as f32 * interval + grid.beat_offset();
            assert!((q.grid_time - expected).abs() < 1e-5);
        }
        assert!(quantized
            .windows(2)
            .all(|w| w[0].subdivision_index < w[1].subdivision_index));
        // equal energies: the surviving hit is the first one snapped to the cell
        for q in &quantized {
            let source = hits
                .iter()
                .find(|h| {
                    grid.nearest_index(h.time) == q.subdivision_index
                        && (grid.grid_time(q.subdivision_index) - h.time).abs()
                            <= interval * SNAP_TOLERANCE
                })
                .unwrap();
            assert!((q.grid_time - source.time).abs() <= interval * SNAP_TOLERANCE + 1e-6);
        }
    }

    #[test]
    fn offset_shifts_the_grid() {
        let grid = BeatGrid::new(60.0, 2, 0.25).unwrap();
        let quantized = grid.quantize(&[hit(1.26, 1.0)]);
        assert_eq!(quantized[0].subdivision_index, 2);
        assert!((quantized[0].grid_time - 1.25).abs() < 1e-6);
    }

    #[test]
    fn step_in_beat_wraps_negative_indices() {
        let grid = BeatGrid::new(120.0, 4, 0.0).unwrap();
        assert_eq!(grid.step_in_beat(5), 1);
        assert_eq!(grid.step_in_beat(-1), 3);
        assert!(grid.is_downbeat(8));
    }

    #[test]
    fn rejects_non_positive_bpm() {
        assert!(BeatGrid::new(0.0, 4, 0.0).is_err());
        assert!(BeatGrid::new(120.0, 0, 0.0).is_err());
    }
}
