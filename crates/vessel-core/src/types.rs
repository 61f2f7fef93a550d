//! Common types used throughout the Vessel crates.

/// Maximum number of audio channels per bus.
///
/// Enough for 22.2 surround. Buses declaring more channels are rejected when
/// the host negotiates arrangements.
pub const MAX_CHANNELS: usize = 32;

/// Maximum number of audio buses per direction (main + auxiliary).
pub const MAX_BUSES: usize = 16;

/// Parameter identifier.
pub type ParamId = u32;

/// Parameter value (normalized 0.0 to 1.0).
pub type ParamValue = f64;

/// Unit (parameter group) identifier.
pub type UnitId = i32;

/// Program list identifier.
pub type ProgramListId = i32;

/// The root unit every plugin has.
pub const ROOT_UNIT_ID: UnitId = 0;

/// Parent id of the root unit.
pub const NO_PARENT_UNIT_ID: UnitId = -1;

/// Marks a unit without a program list.
pub const NO_PROGRAM_LIST_ID: ProgramListId = -1;

/// Parameter id derived from a string key.
///
/// The top bit is cleared: ids at or above `0x8000_0000` are reserved for
/// the host.
pub const fn param_id(key: &str) -> ParamId {
    vessel_utils::fnv1a_32(key) & 0x7FFF_FFFF
}
