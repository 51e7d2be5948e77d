//! Signal analysis stages, leaf first: spectrum, envelope, tempo, onsets, grid.

pub mod envelope;
pub mod onset;
pub mod quantize;
pub mod spectrum;
pub mod tempo;

pub use envelope::{band_energies, Baseline, EnergyEnvelope, EnvelopeBlock};
pub use onset::{OnsetDetector, OnsetScan, RawHit, ScanStatus};
pub use quantize::{BeatGrid, QuantizedHit, SNAP_TOLERANCE};
pub use spectrum::{magnitude_spectrum, SpectrumTransform, WindowFunction};
pub use tempo::{TempoEstimator, DEFAULT_BPM};
