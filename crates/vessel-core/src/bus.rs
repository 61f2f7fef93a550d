//! Bus descriptions.
//!
//! The numeric values of [`MediaType`], [`BusDirection`] and [`BusType`] are
//! the host's constants; `vessel-vst3` asserts them at compile time.

// =============================================================================
// Enumerations
// =============================================================================

/// Kind of data a bus carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MediaType {
    Audio = 0,
    Event = 1,
}

impl MediaType {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Audio),
            1 => Some(Self::Event),
            _ => None,
        }
    }
}

/// Bus direction seen from the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BusDirection {
    Input = 0,
    Output = 1,
}

impl BusDirection {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Input),
            1 => Some(Self::Output),
            _ => None,
        }
    }
}

/// Audio bus type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum BusType {
    /// Main audio bus (e.g., primary stereo input/output).
    #[default]
    Main = 0,
    /// Auxiliary bus (e.g., sidechain input).
    Aux = 1,
}

// =============================================================================
// Speaker Arrangement
// =============================================================================

/// Bitmask of speakers on a bus, one bit per speaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SpeakerArrangement(pub u64);

impl SpeakerArrangement {
    pub const EMPTY: Self = Self(0);
    /// Single center speaker (`kSpeakerM`).
    pub const MONO: Self = Self(1 << 19);
    /// Left and right.
    pub const STEREO: Self = Self(0b11);

    /// Default arrangement for a channel count.
    ///
    /// Counts other than 1 and 2 use the lowest `n` speaker positions.
    pub const fn for_channels(channel_count: u32) -> Self {
        match channel_count {
            0 => Self::EMPTY,
            1 => Self::MONO,
            2 => Self::STEREO,
            n if n >= 64 => Self(u64::MAX),
            n => Self((1u64 << n) - 1),
        }
    }

    /// Number of speakers in the arrangement.
    pub const fn channel_count(self) -> u32 {
        self.0.count_ones()
    }
}

// =============================================================================
// Bus Info
// =============================================================================

/// Information about a bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusInfo {
    /// Display name for the bus (e.g., "Input", "Sidechain").
    pub name: &'static str,
    pub bus_type: BusType,
    /// Channel count for audio buses; event buses report 16 channels.
    pub channel_count: u32,
    pub is_default_active: bool,
    pub arrangement: SpeakerArrangement,
}

impl Default for BusInfo {
    fn default() -> Self {
        Self::stereo("Main")
    }
}

impl BusInfo {
    /// Create a stereo main bus.
    pub const fn stereo(name: &'static str) -> Self {
        Self {
            name,
            bus_type: BusType::Main,
            channel_count: 2,
            is_default_active: true,
            arrangement: SpeakerArrangement::STEREO,
        }
    }

    /// Create a mono main bus.
    pub const fn mono(name: &'static str) -> Self {
        Self {
            name,
            bus_type: BusType::Main,
            channel_count: 1,
            is_default_active: true,
            arrangement: SpeakerArrangement::MONO,
        }
    }

    /// Create an auxiliary bus (e.g., sidechain), inactive by default.
    pub const fn aux(name: &'static str, channel_count: u32) -> Self {
        Self {
            name,
            bus_type: BusType::Aux,
            channel_count,
            is_default_active: false,
            arrangement: SpeakerArrangement::for_channels(channel_count),
        }
    }

    /// Create a main event bus with 16 MIDI channels.
    pub const fn events(name: &'static str) -> Self {
        Self {
            name,
            bus_type: BusType::Main,
            channel_count: 16,
            is_default_active: true,
            arrangement: SpeakerArrangement::EMPTY,
        }
    }
}
