//! # beatmap
//!
//! Turns decoded audio into a timed sequence of lane-based rhythm game notes.
//!
//! The pipeline runs once per clip, offline:
//!
//! ```text
//! samples -> FFT energy envelope -> onsets ----\
//!        \-> autocorrelation tempo -> beat grid -> quantized hits -> lanes/types -> NoteMap
//! ```
//!
//! [`MapGenerator`] drives it as a cooperatively polled task and persists
//! results through [`MapStore`].
//!
//! ```no_run
//! use beatmap::{AudioClip, GeneratorConfig, MapGenerator};
//!
//! let clip = AudioClip::mono("click", vec![0.0; 44100 * 10], 44100);
//! let mut generator = MapGenerator::new(GeneratorConfig::default())?;
//! if let Some(map) = generator.run(&clip, |_, _| {})? {
//!     println!("{} notes", map.notes.len());
//! }
//! # Ok::<(), beatmap::MapError>(())
//! ```

pub mod analysis;
pub mod audio;
pub mod chart;
pub mod config;
pub mod error;
pub mod generator;

pub use audio::{AudioClip, AudioFile, LoadMode, SampleSource};
pub use chart::{MapStore, Note, NoteMap, NoteType};
pub use config::{GeneratorConfig, LaneStrategyKind};
pub use error::MapError;
pub use generator::{GenerationPoll, GenerationState, GeneratorEvent, LoadOutcome, MapGenerator};
