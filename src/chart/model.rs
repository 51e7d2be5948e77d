use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

/// Gameplay meaning of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NoteType {
    /// Shoot.
    #[default]
    Standard,
    /// Dodge.
    Heavy,
    /// Collect. Reserved; the generator never emits it.
    Special,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Seconds from the start of the clip.
    pub time: f32,
    pub lane: usize,
    /// Hit strength in `[0, 1]`.
    pub power: f32,
    #[serde(rename = "type")]
    pub note_type: NoteType,
}

/// The persisted output of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMap {
    pub clip_name: String,
    pub notes: Vec<Note>,
}

impl NoteMap {
    pub fn new(clip_name: impl Into<String>) -> Self {
        Self {
            clip_name: clip_name.into(),
            notes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.notes.windows(2).all(|w| w[0].time <= w[1].time)
    }

    /// Checks that every lane is below `lanes`, every power is in `[0, 1]`
    /// and notes are ordered by time.
    pub fn validate(&self, lanes: usize) -> Result<()> {
        let inconsistent = |reason: String| MapError::InconsistentMap {
            clip: self.clip_name.clone(),
            reason,
        };

        if let Some(note) = self.notes.iter().find(|n| n.lane >= lanes) {
            return Err(inconsistent(format!(
                "lane {} at {:.3}s is outside 0..{}",
                note.lane, note.time, lanes
            )));
        }
        if let Some(note) = self.notes.iter().find(|n| !(0.0..=1.0).contains(&n.power)) {
            return Err(inconsistent(format!(
                "power {} at {:.3}s is outside [0, 1]",
                note.power, note.time
            )));
        }
        if !self.is_sorted() {
            return Err(inconsistent("notes are not ordered by time".into()));
        }
        Ok(())
    }

    /// Stable sort by time; already-ordered maps are untouched.
    pub fn sort_by_time(&mut self) {
        self.notes.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    pub fn summary(&self, lanes: usize) -> MapSummary {
        let lanes = lanes.max(self.notes.iter().map(|n| n.lane + 1).max().unwrap_or(0));
        let mut summary = MapSummary {
            lane_counts: vec![0; lanes],
            ..Default::default()
        };
        for note in &self.notes {
            summary.lane_counts[note.lane] += 1;
            match note.note_type {
                NoteType::Standard => summary.standard += 1,
                NoteType::Heavy => summary.heavy += 1,
                NoteType::Special => summary.special += 1,
            }
        }
        summary
    }
}

/// Note distribution of a map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSummary {
    pub lane_counts: Vec<usize>,
    pub standard: usize,
    pub heavy: usize,
    pub special: usize,
}

impl MapSummary {
    pub fn total(&self) -> usize {
        self.standard + self.heavy + self.special
    }

    pub fn log(&self) {
        for (lane, count) in self.lane_counts.iter().enumerate() {
            log::info!("  Lane {}: {} notes", lane, count);
        }
        log::info!(
            "  Heavy: {}, Standard: {}, Special: {}",
            self.heavy,
            self.standard,
            self.special
        );
    }
}

/// Walks a map in time order for a consumer that polls the playback
/// position, handing out every note due within the lookahead window.
#[derive(Debug, Clone)]
pub struct NoteCursor {
    next: usize,
    sample_rate: u32,
    anticipation: f32,
}

impl NoteCursor {
    /// `anticipation` is how many seconds ahead of playback notes are released.
    pub fn new(sample_rate: u32, anticipation: f32) -> Self {
        Self {
            next: 0,
            sample_rate: sample_rate.max(1),
            anticipation,
        }
    }

    /// Notes with `time <= position / sample_rate + anticipation` that have
    /// not been returned yet.
    pub fn advance<'a>(&mut self, map: &'a NoteMap, position_samples: u64) -> &'a [Note] {
        let horizon = position_samples as f64 / self.sample_rate as f64 + self.anticipation as f64;
        let start = self.next.min(map.notes.len());
        let due = map.notes[start..]
            .iter()
            .take_while(|n| n.time as f64 <= horizon)
            .count();
        self.next = start + due;
        &map.notes[start..self.next]
    }

    pub fn is_done(&self, map: &NoteMap) -> bool {
        self.next >= map.notes.len()
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}
