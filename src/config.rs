use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MapError, Result};

/// Top-level configuration file (`beatmap.toml`).
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    /// Directory holding persisted beat maps. Platform data dir when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Which lane assignment strategy a generation run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LaneStrategyKind {
    /// Fixed root-then-descending pattern within each beat.
    #[default]
    Descending,
    /// Lane follows the loudest frequency band.
    Frequency,
    /// Seeded random walk across adjacent lanes.
    RandomWalk,
}

/// Knobs for one generation run. Every field has a default so partial
/// TOML tables are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// FFT window size in samples; must be a power of two.
    pub window_size: usize,
    /// 4 = sixteenth notes, 2 = eighth notes, 1 = quarter notes.
    pub subdivisions_per_beat: u32,
    /// Seconds before the first beat of the grid.
    pub beat_offset: f32,
    pub lanes: usize,
    /// Absolute energy floor for a hit.
    pub minimum_energy: f32,
    /// How much a block must exceed the running baseline to count as a hit.
    pub peak_sensitivity: f32,
    /// Lerp factor of the running baseline.
    pub baseline_smoothing: f32,
    /// Heavy note every N downbeats; 0 disables heavy notes.
    pub heavy_note_interval: u32,
    /// Per-hit probability of moving one lane in the random-walk strategy.
    pub lane_change_chance: f32,
    pub lane_strategy: LaneStrategyKind,
    /// Frequency strategy: never put off-beat hits on the root lane's band.
    pub exclude_root_band: bool,
    /// Random-walk seed; drawn from entropy when unset.
    pub seed: Option<u64>,
    /// Explicit tempo; skips tempo estimation when set.
    pub bpm: Option<f32>,
    /// Analysis windows processed between cooperative yield points.
    pub yield_every: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            subdivisions_per_beat: 4,
            beat_offset: 0.0,
            lanes: 5,
            minimum_energy: 0.1,
            peak_sensitivity: 1.5,
            baseline_smoothing: 0.3,
            heavy_note_interval: 8,
            lane_change_chance: 0.3,
            lane_strategy: LaneStrategyKind::Descending,
            exclude_root_band: true,
            seed: None,
            bpm: None,
            yield_every: 50,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size < 2 || !self.window_size.is_power_of_two() {
            return Err(MapError::InvalidWindowSize(self.window_size));
        }
        if self.lanes == 0 {
            return Err(MapError::InvalidConfig("lanes must be at least 1".into()));
        }
        if self.subdivisions_per_beat == 0 {
            return Err(MapError::InvalidConfig(
                "subdivisions_per_beat must be at least 1".into(),
            ));
        }
        if let Some(bpm) = self.bpm {
            if !bpm.is_finite() || bpm <= 0.0 {
                return Err(MapError::InvalidConfig(format!(
                    "bpm override must be positive, got {}",
                    bpm
                )));
            }
        }
        if !self.beat_offset.is_finite() {
            return Err(MapError::InvalidConfig("beat_offset must be finite".into()));
        }
        if self.peak_sensitivity < 0.0 {
            return Err(MapError::InvalidConfig(
                "peak_sensitivity must not be negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.baseline_smoothing) {
            return Err(MapError::InvalidConfig(format!(
                "baseline_smoothing must be within [0, 1], got {}",
                self.baseline_smoothing
            )));
        }
        if !(0.0..=1.0).contains(&self.lane_change_chance) {
            return Err(MapError::InvalidConfig(format!(
                "lane_change_chance must be within [0, 1], got {}",
                self.lane_change_chance
            )));
        }
        if self.yield_every == 0 {
            return Err(MapError::InvalidConfig("yield_every must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MapError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
    })?;
    toml::from_str(&content)
        .map_err(|e| MapError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e)))
}
