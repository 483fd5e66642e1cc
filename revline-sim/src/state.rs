//! Vehicle state snapshot shared with audio and UI

/// Discrete engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Off,
    Cranking,
    Running,
    Stalled,
    Broken,
}

impl Lifecycle {
    /// Engine is turning under its own power or the starter's
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Cranking | Lifecycle::Running | Lifecycle::Stalled)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Lifecycle::Off => "OFF",
            Lifecycle::Cranking => "CRANK",
            Lifecycle::Running => "RUN",
            Lifecycle::Stalled => "STALL",
            Lifecycle::Broken => "BROKEN",
        }
    }
}

/// Snapshot of everything the core produces in one tick
///
/// Owned by the simulation, handed out by value. Readers never see a
/// partially updated state because they only ever hold a copy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleState {
    pub rpm: f32,
    /// km/h
    pub speed: f32,
    /// 0 = neutral
    pub gear: u8,
    /// °C
    pub temperature: f32,
    pub turbo_pressure: f32,
    pub smoke_intensity: f32,
    pub shake: f32,
    /// km
    pub odometer: f64,
    pub lifecycle: Lifecycle,
    pub lights_on: bool,
    pub nitro_active: bool,
}

impl VehicleState {
    /// Engine off, everything at rest, engine at ambient temperature
    pub fn at_rest(ambient: f32) -> Self {
        Self {
            temperature: ambient,
            ..Self::default()
        }
    }
}
