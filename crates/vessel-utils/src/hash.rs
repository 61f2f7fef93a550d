//! Hash functions for stable ids and content keys.
//!
//! Both functions are FNV-1a: fast, allocation-free, and stable across
//! platforms and compiler versions.

/// Compute the FNV-1a 32-bit hash of a string.
///
/// Used to derive VST3 parameter ids (`uint32`) from human-readable string
/// keys such as `"gain"` or `"bypass"`.
///
/// # Examples
///
/// ```
/// use vessel_utils::fnv1a_32;
///
/// // Runtime usage
/// let id = fnv1a_32("gain");
///
/// // Compile-time usage
/// const GAIN_ID: u32 = fnv1a_32("gain");
/// assert_eq!(id, GAIN_ID);
/// ```
#[inline]
pub const fn fnv1a_32(s: &str) -> u32 {
    const FNV_OFFSET: u32 = 2166136261;
    const FNV_PRIME: u32 = 16777619;

    let bytes = s.as_bytes();
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Compute the FNV-1a 64-bit hash of a byte slice.
///
/// The string bridge keys its caches by content with this hash; equal
/// content always lands in the same bucket, and the bucket is then checked
/// for byte equality, so collisions never alias two different strings.
///
/// ```
/// use vessel_utils::fnv1a_64;
///
/// assert_ne!(fnv1a_64(b"Gain"), fnv1a_64(b"gain"));
/// ```
#[inline]
pub const fn fnv1a_64(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_32_empty() {
        // FNV-1a of empty string is the offset basis
        assert_eq!(fnv1a_32(""), 2166136261);
    }

    #[test]
    fn test_fnv1a_32_single_char() {
        assert_eq!(fnv1a_32("a"), 0xe40c292c);
    }

    #[test]
    fn test_fnv1a_32_const() {
        const HASH: u32 = fnv1a_32("bypass");
        assert_eq!(HASH, fnv1a_32("bypass"));
    }

    #[test]
    fn test_fnv1a_32_different_strings() {
        assert_ne!(fnv1a_32("gain"), fnv1a_32("frequency"));
    }

    #[test]
    fn test_fnv1a_64_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_fnv1a_64_depends_on_content() {
        // A hash that ignored its input would make every lookup collide.
        let a = fnv1a_64(b"plugin.state");
        let b = fnv1a_64(b"plugin.stats");
        assert_ne!(a, b);
        assert_eq!(a, fnv1a_64(b"plugin.state"));
    }
}
