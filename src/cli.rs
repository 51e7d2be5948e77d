use clap::Parser;
use std::path::PathBuf;

use beatmap::{GeneratorConfig, LaneStrategyKind};

#[derive(Parser, Debug)]
#[command(name = "beatmap", about = "Generate rhythm game note maps from audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Config file (TOML). Defaults to ./beatmap.toml or the user config dir.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for persisted beat maps
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Regenerate even if a saved map exists
    #[arg(short, long)]
    pub force: bool,

    /// Print the resulting map as JSON to stdout
    #[arg(long)]
    pub print: bool,

    /// Explicit tempo; skips tempo detection
    #[arg(long)]
    pub bpm: Option<f32>,

    /// Number of lanes
    #[arg(long)]
    pub lanes: Option<usize>,

    /// Grid subdivisions per beat (4 = sixteenths)
    #[arg(long)]
    pub subdivisions: Option<u32>,

    /// Seconds before the first beat
    #[arg(long)]
    pub beat_offset: Option<f32>,

    /// Minimum block energy for a hit
    #[arg(long)]
    pub min_energy: Option<f32>,

    /// Required ratio over the running baseline
    #[arg(long)]
    pub peak_sensitivity: Option<f32>,

    /// Heavy note every N downbeats (0 disables)
    #[arg(long)]
    pub heavy_interval: Option<u32>,

    /// Lane assignment strategy
    #[arg(long, value_enum)]
    pub strategy: Option<LaneStrategyKind>,

    /// Shorthand for --strategy frequency
    #[arg(long, conflicts_with = "strategy")]
    pub use_frequency_mapping: bool,

    /// Random-walk lane change probability (0.0-1.0)
    #[arg(long)]
    pub lane_change_chance: Option<f32>,

    /// Random-walk seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// FFT window size (power of two)
    #[arg(long)]
    pub window_size: Option<usize>,
}

impl Cli {
    /// Applies flags given on the command line over `config`.
    pub fn apply(&self, config: &mut GeneratorConfig) {
        if let Some(bpm) = self.bpm {
            config.bpm = Some(bpm);
        }
        if let Some(lanes) = self.lanes {
            config.lanes = lanes;
        }
        if let Some(subdivisions) = self.subdivisions {
            config.subdivisions_per_beat = subdivisions;
        }
        if let Some(offset) = self.beat_offset {
            config.beat_offset = offset;
        }
        if let Some(min_energy) = self.min_energy {
            config.minimum_energy = min_energy;
        }
        if let Some(sensitivity) = self.peak_sensitivity {
            config.peak_sensitivity = sensitivity;
        }
        if let Some(interval) = self.heavy_interval {
            config.heavy_note_interval = interval;
        }
        if let Some(strategy) = self.strategy {
            config.lane_strategy = strategy;
        }
        if self.use_frequency_mapping {
            config.lane_strategy = LaneStrategyKind::Frequency;
        }
        if let Some(chance) = self.lane_change_chance {
            config.lane_change_chance = chance;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(size) = self.window_size {
            config.window_size = size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::parse_from([
            "beatmap",
            "song.wav",
            "--lanes",
            "3",
            "--use-frequency-mapping",
            "--bpm",
            "128",
        ]);
        let mut config = GeneratorConfig {
            lanes: 7,
            subdivisions_per_beat: 2,
            ..Default::default()
        };
        cli.apply(&mut config);

        assert_eq!(config.lanes, 3);
        assert_eq!(config.bpm, Some(128.0));
        assert_eq!(config.lane_strategy, LaneStrategyKind::Frequency);
        assert_eq!(config.subdivisions_per_beat, 2);
    }

    #[test]
    fn strategy_flag_parses_kebab_case() {
        let cli = Cli::parse_from(["beatmap", "song.wav", "--strategy", "random-walk"]);
        assert_eq!(cli.strategy, Some(LaneStrategyKind::RandomWalk));
    }
}
