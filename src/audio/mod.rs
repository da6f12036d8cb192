//! Audio bite detection via system-output loopback capture

pub mod base;
pub mod error;
pub mod sound_detector;

pub use base::{rms, AmplitudeHistory, AudioBlock, CalibrationReport};
pub use error::AudioError;
pub use sound_detector::SoundDetector;
