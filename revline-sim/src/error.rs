//! Error types for the simulation core

use thiserror::Error;

/// A driver intent the simulation refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    #[error("Engine is broken (overheated) - reset the vehicle to continue")]
    EngineBroken,
}

/// A vehicle parameter set that cannot be simulated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid vehicle config: {0}")]
    Invalid(String),
}
