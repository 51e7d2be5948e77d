pub mod decode;
pub mod source;

pub use decode::AudioFile;
pub use source::{read_mono, AudioClip, LoadMode, SampleSource};
