use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::source::SampleSource;
use crate::error::MapError;

/// An audio file on disk. Probed on open, fully decoded when samples are read.
#[derive(Debug, Clone)]
pub struct AudioFile {
    path: PathBuf,
    name: String,
    sample_rate: u32,
    channels: usize,
}

impl AudioFile {
    pub fn open(path: &Path) -> Result<Self> {
        let format = probe(path)?;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .context("No audio tracks found")?;

        let channels = match track.codec_params.channels {
            Some(layout) => layout.count(),
            None => {
                log::warn!(
                    "{} does not report a channel count, assuming mono",
                    path.display()
                );
                1
            }
        };
        let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("clip")
            .to_string();

        log::info!(
            "Opened {}: {}Hz, {} channel(s)",
            path.display(),
            sample_rate,
            channels
        );

        Ok(Self {
            path: path.to_path_buf(),
            name,
            sample_rate,
            channels,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleSource for AudioFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn read_interleaved(&self) -> crate::error::Result<Vec<f32>> {
        let (samples, decoded_channels) = decode_interleaved(&self.path)
            .map_err(|e| MapError::read_failure(&self.name, format!("{:#}", e)))?;
        check_channel_count(&self.name, self.channels, decoded_channels)?;
        Ok(samples)
    }
}

/// The decoder's frame layout must match what the container reported, or
/// mono extraction would read interleaved frames as consecutive samples.
/// `decoded == 0` means nothing was decoded.
fn check_channel_count(clip: &str, reported: usize, decoded: usize) -> crate::error::Result<()> {
    if decoded != 0 && decoded != reported {
        return Err(MapError::read_failure(
            clip,
            format!(
                "container reports {} channel(s) but the decoder produced {}",
                reported, decoded
            ),
        ));
    }
    Ok(())
}

fn probe(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    Ok(probed.format)
}

/// Interleaved samples and the channel count of the decoded frames.
fn decode_interleaved(path: &Path) -> Result<(Vec<f32>, usize)> {
    let mut format = probe(path)?;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();
    let mut channels: Option<usize> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let count = spec.channels.count();
        match channels {
            None => channels = Some(count),
            Some(previous) if previous != count => {
                anyhow::bail!(
                    "channel count changed mid-stream ({} -> {})",
                    previous,
                    count
                );
            }
            Some(_) => {}
        }

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        all_samples.extend_from_slice(sample_buf.samples());
    }

    log::info!(
        "Decoded {}: {} interleaved samples",
        path.display(),
        all_samples.len()
    );

    Ok((all_samples, channels.unwrap_or(0)))
}
