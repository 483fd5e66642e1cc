//! Command definitions for Revline

/// Controls that are held down rather than toggled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Held {
    Gas,
    Brake,
    Nitro,
}

impl Held {
    pub fn display_name(&self) -> &'static str {
        match self {
            Held::Gas => "GAS",
            Held::Brake => "BRAKE",
            Held::Nitro => "NITRO",
        }
    }
}

/// Commands that can be dispatched from input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    // Pedals and nitro
    Press(Held),
    Release(Held),

    // Switches
    ToggleIgnition,
    ToggleLights,

    // Audio
    ToggleMute,
    AdjustVolume(f32),

    // Vehicle
    Reset,

    // Application
    Quit,
}
