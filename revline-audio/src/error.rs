//! Audio error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoOutputDevice,

    #[error("Failed to get audio config: {0}")]
    DeviceConfig(String),

    #[error("Failed to create audio stream: {0}")]
    BuildStream(String),

    #[error("Failed to start audio: {0}")]
    PlayStream(String),

    #[error("Invalid audio config: {0}")]
    InvalidConfig(String),
}
