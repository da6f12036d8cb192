//! Audio capture errors

use thiserror::Error;

/// Failures while setting up system-output capture. All of these are
/// fatal at startup; detection itself never errors for "no sound".
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no default audio output device found")]
    NoOutputDevice,

    #[error("failed to query the output stream configuration: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build the loopback capture stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start the capture stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("unsupported sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("audio capture thread did not report readiness in time")]
    StartTimeout,

    #[error("no audio data collected")]
    NoData,
}
