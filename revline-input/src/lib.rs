//! Keyboard input handling for Revline
//!
//! Key events become [`Command`]s; held controls (gas, brake, nitro) go
//! through [`DriverControls`] so pedals have travel and spring back.

mod commands;
mod handler;
mod spring;

pub use commands::{Command, Held};
pub use handler::InputHandler;
pub use spring::{DriverControls, PedalSpring, PedalState, SpringConfig};
