//! Lane and note-type assignment for quantized hits.
//!
//! Three interchangeable strategies pick the lane; note type is decided
//! independently by [`NoteTypeClassifier`] and handed to the strategy, which
//! may use it (random walk pins heavy downbeats to the root lane).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::model::{Note, NoteType};
use crate::analysis::{BeatGrid, QuantizedHit};
use crate::config::{GeneratorConfig, LaneStrategyKind};

pub const ROOT_LANE: usize = 0;

/// What a strategy knows about the hit besides its energy and bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitContext {
    /// Position inside the beat, `0` on the downbeat.
    pub step_in_beat: u32,
    pub note_type: NoteType,
}

impl HitContext {
    pub fn is_downbeat(&self) -> bool {
        self.step_in_beat == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub lane: usize,
    pub note_type: NoteType,
}

pub trait LaneAssigner {
    fn assign(&mut self, hit: &QuantizedHit, ctx: &HitContext) -> Assignment;
}

/// Downbeat on the root lane, then lanes `lanes-1, lanes-2, ...` down to 1
/// for the following subdivisions. Independent of audio content.
///
/// When a beat has more subdivisions than non-root lanes, the trailing
/// steps all collapse onto lane 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescendingPattern {
    lanes: usize,
}

impl DescendingPattern {
    pub fn new(lanes: usize) -> Self {
        Self { lanes }
    }

    pub fn lane_for_step(&self, step_in_beat: u32) -> usize {
        if step_in_beat == 0 {
            return ROOT_LANE;
        }
        let top = self.lanes as i64 - 1;
        let descending = self.lanes as i64 - step_in_beat as i64 - 1;
        descending.max(1).min(top).max(0) as usize
    }
}

impl LaneAssigner for DescendingPattern {
    fn assign(&mut self, _hit: &QuantizedHit, ctx: &HitContext) -> Assignment {
        Assignment {
            lane: self.lane_for_step(ctx.step_in_beat),
            note_type: ctx.note_type,
        }
    }
}

/// Lane of the loudest frequency band. Hits without band data fall back to
/// the descending pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyMapping {
    lanes: usize,
    exclude_root_band: bool,
}

impl FrequencyMapping {
    pub fn new(lanes: usize, exclude_root_band: bool) -> Self {
        Self {
            lanes,
            exclude_root_band,
        }
    }
}

impl LaneAssigner for FrequencyMapping {
    fn assign(&mut self, hit: &QuantizedHit, ctx: &HitContext) -> Assignment {
        let lane = match hit.frequency_bands.as_deref() {
            Some(bands) if !bands.is_empty() => {
                let skip_root = self.exclude_root_band && !ctx.is_downbeat() && bands.len() > 1;
                strongest_band(bands, skip_root)
            }
            _ => DescendingPattern::new(self.lanes).lane_for_step(ctx.step_in_beat),
        };
        Assignment {
            lane: lane.min(self.lanes.saturating_sub(1)),
            note_type: ctx.note_type,
        }
    }
}

/// Index of the largest band; the lowest index wins ties.
fn strongest_band(bands: &[f32], skip_root: bool) -> usize {
    let mut best = if skip_root { 1 } else { 0 };
    for (i, &energy) in bands.iter().enumerate().skip(best + 1) {
        if energy > bands[best] {
            best = i;
        }
    }
    best
}

/// Drifts one lane left or right with probability `change_chance` per hit,
/// starting from the middle lane. Heavy downbeats go to the root lane
/// without moving the walker.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    lanes: usize,
    current: usize,
    change_chance: f32,
    rng: StdRng,
}

impl RandomWalk {
    pub fn new(lanes: usize, change_chance: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            lanes,
            current: lanes / 2,
            change_chance,
            rng,
        }
    }

    pub fn current_lane(&self) -> usize {
        self.current
    }

    fn step(&mut self) -> usize {
        if self.rng.gen::<f32>() < self.change_chance {
            let top = self.lanes.saturating_sub(1);
            self.current = if self.rng.gen_bool(0.5) {
                (self.current + 1).min(top)
            } else {
                self.current.saturating_sub(1)
            };
        }
        self.current
    }
}

impl LaneAssigner for RandomWalk {
    fn assign(&mut self, _hit: &QuantizedHit, ctx: &HitContext) -> Assignment {
        let lane = if ctx.is_downbeat() && ctx.note_type == NoteType::Heavy {
            ROOT_LANE
        } else {
            self.step()
        };
        Assignment {
            lane,
            note_type: ctx.note_type,
        }
    }
}

/// The strategy selected for a run.
#[derive(Debug, Clone)]
pub enum LaneStrategy {
    Descending(DescendingPattern),
    FrequencyMapping(FrequencyMapping),
    RandomWalk(RandomWalk),
}

impl LaneStrategy {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        match config.lane_strategy {
            LaneStrategyKind::Descending => {
                LaneStrategy::Descending(DescendingPattern::new(config.lanes))
            }
            LaneStrategyKind::Frequency => LaneStrategy::FrequencyMapping(FrequencyMapping::new(
                config.lanes,
                config.exclude_root_band,
            )),
            LaneStrategyKind::RandomWalk => LaneStrategy::RandomWalk(RandomWalk::new(
                config.lanes,
                config.lane_change_chance,
                config.seed,
            )),
        }
    }

    /// Whether hits need per-band energies from the envelope.
    pub fn needs_bands(&self) -> bool {
        matches!(self, LaneStrategy::FrequencyMapping(_))
    }
}

impl LaneAssigner for LaneStrategy {
    fn assign(&mut self, hit: &QuantizedHit, ctx: &HitContext) -> Assignment {
        match self {
            LaneStrategy::Descending(s) => s.assign(hit, ctx),
            LaneStrategy::FrequencyMapping(s) => s.assign(hit, ctx),
            LaneStrategy::RandomWalk(s) => s.assign(hit, ctx),
        }
    }
}

/// Counts downbeats and marks every `interval`-th one as heavy. The count
/// is read before it is incremented, so the first downbeat (count 0) is
/// never heavy. Off-beat hits are always standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteTypeClassifier {
    heavy_interval: u32,
    beat_counter: u32,
}

impl NoteTypeClassifier {
    pub fn new(heavy_interval: u32) -> Self {
        Self {
            heavy_interval,
            beat_counter: 0,
        }
    }

    pub fn beat_counter(&self) -> u32 {
        self.beat_counter
    }

    pub fn classify(&mut self, is_downbeat: bool) -> NoteType {
        if !is_downbeat {
            return NoteType::Standard;
        }
        let heavy = self.heavy_interval > 0
            && self.beat_counter > 0
            && self.beat_counter % self.heavy_interval == 0;
        self.beat_counter += 1;
        if heavy {
            NoteType::Heavy
        } else {
            NoteType::Standard
        }
    }
}

/// Turns grid-ordered hits into notes. Lanes are bounded to `0..lanes` and
/// power is the hit energy clamped to `[0, 1]`.
pub fn assign_notes(
    hits: &[QuantizedHit],
    grid: &BeatGrid,
    lanes: usize,
    heavy_interval: u32,
    assigner: &mut dyn LaneAssigner,
) -> Vec<Note> {
    let mut classifier = NoteTypeClassifier::new(heavy_interval);
    let top = lanes.saturating_sub(1);

    hits.iter()
        .map(|hit| {
            let step_in_beat = grid.step_in_beat(hit.subdivision_index);
            let note_type = classifier.classify(step_in_beat == 0);
            let ctx = HitContext {
                step_in_beat,
                note_type,
            };
            let assignment = assigner.assign(hit, &ctx);
            Note {
                time: hit.grid_time,
                lane: assignment.lane.min(top),
                power: clamp_power(hit.energy),
                note_type: assignment.note_type,
            }
        })
        .collect()
}

pub fn clamp_power(energy: f32) -> f32 {
    if energy.is_nan() {
        0.0
    } else {
        energy.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantized(index: i64, energy: f32, bands: Option<Vec<f32>>) -> QuantizedHit {
        QuantizedHit {
            grid_time: index as f32 * 0.125,
            subdivision_index: index,
            energy,
            frequency_bands: bands,
        }
    }

    fn ctx(step_in_beat: u32, note_type: NoteType) -> HitContext {
        HitContext {
            step_in_beat,
            note_type,
        }
    }

    #[test]
    fn descending_pattern_for_five_lanes() {
        let pattern = DescendingPattern::new(5);
        let lanes: Vec<usize> = (0..4).map(|s| pattern.lane_for_step(s)).collect();
        assert_eq!(lanes, vec![0, 3, 2, 1]);
    }

    #[test]
    fn descending_pattern_collapses_onto_lane_one() {
        let pattern = DescendingPattern::new(3);
        let lanes: Vec<usize> = (0..6).map(|s| pattern.lane_for_step(s)).collect();
        assert_eq!(lanes, vec![0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn descending_pattern_with_one_lane_stays_in_bounds() {
        let pattern = DescendingPattern::new(1);
        assert_eq!(pattern.lane_for_step(0), 0);
        assert_eq!(pattern.lane_for_step(3), 0);
    }

    #[test]
    fn frequency_mapping_picks_loudest_band() {
        let mut mapping = FrequencyMapping::new(4, true);
        let hit = quantized(0, 1.0, Some(vec![0.2, 0.1, 0.9, 0.3]));
        assert_eq!(mapping.assign(&hit, &ctx(0, NoteType::Standard)).lane, 2);
    }

    #[test]
    fn frequency_mapping_keeps_offbeats_off_the_root() {
        let mut mapping = FrequencyMapping::new(3, true);
        let hit = quantized(1, 1.0, Some(vec![5.0, 1.0, 2.0]));
        assert_eq!(mapping.assign(&hit, &ctx(1, NoteType::Standard)).lane, 2);
        assert_eq!(mapping.assign(&hit, &ctx(0, NoteType::Standard)).lane, 0);

        let mut inclusive = FrequencyMapping::new(3, false);
        assert_eq!(inclusive.assign(&hit, &ctx(1, NoteType::Standard)).lane, 0);
    }

    #[test]
    fn frequency_mapping_without_bands_uses_pattern() {
        let mut mapping = FrequencyMapping::new(5, true);
        let hit = quantized(1, 1.0, None);
        assert_eq!(mapping.assign(&hit, &ctx(1, NoteType::Standard)).lane, 3);
    }

    #[test]
    fn random_walk_is_reproducible_for_a_seed() {
        let hits: Vec<QuantizedHit> = (0..64).map(|i| quantized(i, 1.0, None)).collect();
        let run = |seed| {
            let mut walk = RandomWalk::new(5, 0.5, Some(seed));
            hits.iter()
                .map(|h| walk.assign(h, &ctx(1, NoteType::Standard)).lane)
                .collect::<Vec<_>>()
        };

        let first = run(42);
        assert_eq!(first, run(42));
        assert!(first.iter().all(|&lane| lane < 5));
        assert!(first.windows(2).all(|w| w[0].abs_diff(w[1]) <= 1));
    }

    #[test]
    fn random_walk_starts_in_the_middle_and_holds_without_chance() {
        let mut walk = RandomWalk::new(5, 0.0, Some(1));
        assert_eq!(walk.current_lane(), 2);
        for i in 0..20 {
            assert_eq!(walk.assign(&quantized(i, 1.0, None), &ctx(1, NoteType::Standard)).lane, 2);
        }
    }

    #[test]
    fn random_walk_pins_heavy_downbeats_to_root() {
        let mut walk = RandomWalk::new(5, 1.0, Some(9));
        let before = walk.current_lane();
        let assignment = walk.assign(&quantized(0, 1.0, None), &ctx(0, NoteType::Heavy));
        assert_eq!(assignment.lane, ROOT_LANE);
        assert_eq!(assignment.note_type, NoteType::Heavy);
        assert_eq!(walk.current_lane(), before);
    }

    #[test]
    fn every_fourth_counted_downbeat_is_heavy() {
        let mut classifier = NoteTypeClassifier::new(4);
        let types: Vec<NoteType> = (0..9).map(|_| classifier.classify(true)).collect();

        // counter values 0..=8 at classification time
        for (counter, note_type) in types.iter().enumerate() {
            let expected = if counter == 4 || counter == 8 {
                NoteType::Heavy
            } else {
                NoteType::Standard
            };
            assert_eq!(*note_type, expected, "counter {}", counter);
        }
    }

    #[test]
    fn offbeats_do_not_advance_the_counter() {
        let mut classifier = NoteTypeClassifier::new(1);
        assert_eq!(classifier.classify(true), NoteType::Standard);
        assert_eq!(classifier.classify(false), NoteType::Standard);
        assert_eq!(classifier.beat_counter(), 1);
        assert_eq!(classifier.classify(true), NoteType::Heavy);
    }

    #[test]
    fn zero_interval_disables_heavy_notes() {
        let mut classifier = NoteTypeClassifier::new(0);
        assert!((0..16).all(|_| classifier.classify(true) == NoteType::Standard));
    }

    #[test]
    fn assign_notes_bounds_lanes_and_power() {
        let grid = BeatGrid::new(120.0, 4, 0.0).unwrap();
        let hits: Vec<QuantizedHit> = (0..16)
            .map(|i| quantized(i, i as f32 * 0.2 - 0.5, Some(vec![0.0, 0.0, 0.0, 0.0, 0.0, 9.0])))
            .collect();
        let mut strategy = FrequencyMapping::new(4, true);
        let notes = assign_notes(&hits, &grid, 4, 2, &mut strategy);

        assert_eq!(notes.len(), 16);
        assert!(notes.iter().all(|n| n.lane < 4));
        assert!(notes.iter().all(|n| (0.0..=1.0).contains(&n.power)));
        assert_eq!(notes[0].power, 0.0);
        assert_eq!(notes[15].power, 1.0);
        // downbeats at 0, 4, 8, 12 -> counters 0..3, heavy at 2
        assert_eq!(notes[8].note_type, NoteType::Heavy);
        assert_eq!(notes.iter().filter(|n| n.note_type == NoteType::Heavy).count(), 1);
    }

    #[test]
    fn power_clamp_is_idempotent() {
        for energy in [-3.0, 0.0, 0.25, 1.0, 42.0] {
            let once = clamp_power(energy);
            assert_eq!(clamp_power(once), once);
        }
        assert_eq!(clamp_power(f32::NAN), 0.0);
    }
}
