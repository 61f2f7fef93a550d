//! String conversion for fixed-capacity protocol buffers.
//!
//! The protocol exchanges 8-bit and UTF-16 strings in zero-terminated
//! buffers (usually 128 elements). Writers here always terminate within
//! capacity; readers stop at the terminator or the capacity, whichever comes
//! first.

use std::ffi::c_char;

use vst3::Steinberg::Vst::TChar;

/// Copy a string into an 8-bit buffer, truncating and terminating.
///
/// Truncation never splits a UTF-8 sequence; interior NULs end the copy.
pub fn copy_cstring(src: &str, dst: &mut [c_char]) {
    if dst.is_empty() {
        return;
    }

    let mut len = src.find('\0').unwrap_or(src.len()).min(dst.len() - 1);
    while !src.is_char_boundary(len) {
        len -= 1;
    }

    for (dst, src) in dst.iter_mut().zip(&src.as_bytes()[..len]) {
        *dst = *src as c_char;
    }
    dst[len] = 0;
}

/// Copy a string into a UTF-16 buffer, truncating and terminating.
///
/// Truncation never leaves half of a surrogate pair behind.
pub fn copy_wstring(src: &str, dst: &mut [TChar]) {
    if dst.is_empty() {
        return;
    }

    let capacity = dst.len() - 1;
    let mut len = 0;
    for ch in src.chars() {
        if ch == '\0' {
            break;
        }
        let mut units = [0u16; 2];
        let encoded = ch.encode_utf16(&mut units);
        if len + encoded.len() > capacity {
            break;
        }
        for unit in encoded.iter() {
            dst[len] = *unit as TChar;
            len += 1;
        }
    }
    dst[len] = 0;
}

/// Read a UTF-16 buffer up to its terminator or its end.
pub fn read_wstring(src: &[TChar]) -> String {
    let len = src.iter().position(|c| *c == 0).unwrap_or(src.len());
    char::decode_utf16(src[..len].iter().map(|c| *c as u16))
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Read an 8-bit buffer up to its terminator or its end.
pub fn read_cstring(src: &[c_char]) -> String {
    let len = src.iter().position(|c| *c == 0).unwrap_or(src.len());
    let bytes: Vec<u8> = src[..len].iter().map(|c| *c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Length of a zero-terminated UTF-16 string, scanning at most `max` units.
///
/// # Safety
/// `string` must be null or readable up to its terminator or `max` units.
pub unsafe fn len_wstring(string: *const TChar, max: usize) -> usize {
    if string.is_null() {
        return 0;
    }

    let mut len = 0;
    while len < max && *string.add(len) != 0 {
        len += 1;
    }
    len
}

/// Convert a zero-terminated UTF-16 string, scanning at most `max` units.
///
/// Returns `None` for null pointers and invalid UTF-16.
///
/// # Safety
/// See [`len_wstring`].
pub unsafe fn wstring_to_string(string: *const TChar, max: usize) -> Option<String> {
    if string.is_null() {
        return None;
    }

    let len = len_wstring(string, max);
    let slice = std::slice::from_raw_parts(string, len);
    String::from_utf16(&slice.iter().map(|c| *c as u16).collect::<Vec<_>>()).ok()
}
