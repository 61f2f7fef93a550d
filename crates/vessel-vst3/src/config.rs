//! VST3-specific plugin configuration.
//!
//! Complements the format-agnostic [`vessel_core::PluginConfig`] with the
//! class id and the bounds of the bridge's reusable buffers.

use vst3::Steinberg::TUID;

/// Default number of identifier strings a host session keeps interned.
pub const DEFAULT_STRING_CACHE_CAPACITY: usize = 256;

/// Default length, in UTF-16 units, of the scratch buffer used to read
/// attribute-list strings back from the host.
pub const DEFAULT_SCRATCH_LEN: usize = 1024;

/// VST3-specific plugin configuration.
///
/// # Example
///
/// ```ignore
/// use vessel_vst3::{vst3, Vst3Config};
///
/// const COMPONENT_UID: vst3::Steinberg::TUID =
///     vst3::uid(0x6E2B1A40, 0x3C8F4D19, 0xA1D2E3F4, 0x05162738);
///
/// pub static VST3_CONFIG: Vst3Config = Vst3Config::new(COMPONENT_UID)
///     .with_string_cache_capacity(64);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Vst3Config {
    /// Class id of the combined component.
    pub component_uid: TUID,

    /// Upper bound on interned identifier strings per host session.
    /// Past the bound, interning a new key fails and resolved strings are
    /// copied instead of cached.
    pub string_cache_capacity: usize,

    /// Scratch buffer length for strings read from attribute lists.
    /// Longer strings are truncated.
    pub scratch_len: usize,
}

impl Vst3Config {
    pub const fn new(component_uid: TUID) -> Self {
        Self {
            component_uid,
            string_cache_capacity: DEFAULT_STRING_CACHE_CAPACITY,
            scratch_len: DEFAULT_SCRATCH_LEN,
        }
    }

    pub const fn with_string_cache_capacity(mut self, capacity: usize) -> Self {
        self.string_cache_capacity = capacity;
        self
    }

    /// Set the scratch length. Values below 2 are raised to 2 so a buffer
    /// always holds one character plus the terminator.
    pub const fn with_scratch_len(mut self, len: usize) -> Self {
        self.scratch_len = if len < 2 { 2 } else { len };
        self
    }

    /// The component class id as raw bytes.
    pub const fn component_iid(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        let mut i = 0;
        while i < 16 {
            bytes[i] = self.component_uid[i] as u8;
            i += 1;
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UID: TUID = vst3::uid(0x11223344, 0x55667788, 0x99AABBCC, 0xDDEEFF00);

    #[test]
    fn test_defaults() {
        let config = Vst3Config::new(UID);
        assert_eq!(config.string_cache_capacity, 256);
        assert_eq!(config.scratch_len, 1024);
    }

    #[test]
    fn test_builder() {
        const CONFIG: Vst3Config = Vst3Config::new(UID)
            .with_string_cache_capacity(8)
            .with_scratch_len(0);
        assert_eq!(CONFIG.string_cache_capacity, 8);
        assert_eq!(CONFIG.scratch_len, 2);
    }

    #[test]
    fn test_component_iid_bytes() {
        let bytes = Vst3Config::new(UID).component_iid();
        assert_eq!(bytes[0], 0x11);
        assert_eq!(bytes[15], 0x00);
    }
}
