use crate::error::{MapError, Result};

/// How the engine holds a clip's audio data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// All samples are decoded and addressable.
    Decoded,
    /// Only streamed playback is possible; samples cannot be read up front.
    Streaming,
}

/// The audio surface the generator reads from.
pub trait SampleSource {
    /// Identifier used for logging and as the persistence key.
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> usize;

    fn load_mode(&self) -> LoadMode {
        LoadMode::Decoded
    }

    /// Every sample of the clip, channel-interleaved.
    fn read_interleaved(&self) -> Result<Vec<f32>>;
}

/// Decoded audio held in memory.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub name: String,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
    pub load_mode: LoadMode,
}

impl AudioClip {
    pub fn mono(name: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            name: name.into(),
            samples,
            sample_rate,
            channels: 1,
            load_mode: LoadMode::Decoded,
        }
    }

    pub fn interleaved(
        name: impl Into<String>,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: usize,
    ) -> Self {
        Self {
            name: name.into(),
            samples,
            sample_rate,
            channels,
            load_mode: LoadMode::Decoded,
        }
    }

    pub fn duration(&self) -> f32 {
        let frames = self.samples.len() / self.channels.max(1);
        frames as f32 / self.sample_rate.max(1) as f32
    }
}

impl SampleSource for AudioClip {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn load_mode(&self) -> LoadMode {
        self.load_mode
    }

    fn read_interleaved(&self) -> Result<Vec<f32>> {
        Ok(self.samples.clone())
    }
}

/// Reads a source and reduces it to mono by keeping the first channel of
/// every frame. Streaming-only sources are rejected before any read.
pub fn read_mono(source: &dyn SampleSource) -> Result<Vec<f32>> {
    if source.load_mode() == LoadMode::Streaming {
        return Err(MapError::UnsupportedInput(source.name().to_string()));
    }
    if source.sample_rate() == 0 {
        return Err(MapError::read_failure(source.name(), "sample rate is zero"));
    }

    let channels = source.channels();
    if channels == 0 {
        return Err(MapError::read_failure(source.name(), "clip has no channels"));
    }

    let interleaved = source.read_interleaved()?;
    if channels == 1 {
        return Ok(interleaved);
    }

    Ok(interleaved.chunks_exact(channels).map(|frame| frame[0]).collect())
}
