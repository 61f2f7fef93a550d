//! Interned identifier strings.
//!
//! The protocol names message ids, attribute keys and view types with
//! zero-terminated 8-bit strings (`FIDString`). An [`Interner`] maps each
//! distinct string to one native buffer, keyed by an FNV-1a hash of the
//! content and checked for byte equality, so the same identifier resolves
//! to the same pointer on every call without allocating again.
//!
//! Buffers are never removed while the interner lives. Dropping the
//! interner frees each of them once.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::{c_char, CStr, CString};

use parking_lot::Mutex;
use vessel_utils::fnv1a_64;

use crate::error::HostError;

#[derive(Default)]
struct Buckets {
    map: HashMap<u64, Vec<Box<CStr>>>,
    len: usize,
}

impl Buckets {
    fn find(&self, key: u64, bytes: &[u8]) -> Option<&CStr> {
        self.map
            .get(&key)?
            .iter()
            .find(|entry| entry.to_bytes() == bytes)
            .map(|entry| &**entry)
    }

    fn insert(&mut self, key: u64, entry: Box<CStr>) -> *const CStr {
        let ptr = &*entry as *const CStr;
        self.map.entry(key).or_default().push(entry);
        self.len += 1;
        ptr
    }
}

/// A bounded, content-keyed string cache shared by one host session.
pub struct Interner {
    capacity: usize,
    buckets: Mutex<Buckets>,
}

impl Interner {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buckets: Mutex::new(Buckets::default()),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable native pointer for `text`.
    ///
    /// Fails with [`HostError::InvalidText`] on interior NULs and with
    /// [`HostError::Exhausted`] when `text` is new and the cache is full.
    pub fn intern(&self, text: &str) -> Result<*const c_char, HostError> {
        self.intern_keyed(fnv1a_64(text.as_bytes()), text)
    }

    fn intern_keyed(&self, key: u64, text: &str) -> Result<*const c_char, HostError> {
        let mut buckets = self.buckets.lock();
        if let Some(entry) = buckets.find(key, text.as_bytes()) {
            return Ok(entry.as_ptr());
        }
        if buckets.len >= self.capacity {
            log::debug!("string cache full ({} entries), cannot intern {text:?}", self.capacity);
            return Err(HostError::Exhausted("string cache"));
        }

        let entry = CString::new(text)
            .map_err(|_| HostError::InvalidText)?
            .into_boxed_c_str();
        let ptr = buckets.insert(key, entry);
        // SAFETY: the box was just stored and lives as long as `self`.
        Ok(unsafe { (*ptr).as_ptr() })
    }

    /// Read a native identifier.
    ///
    /// Known identifiers, and new ones while capacity remains, come back
    /// borrowed from the cache. Past the capacity the string is copied
    /// and not cached. Returns `None` for null pointers.
    ///
    /// # Safety
    /// `id` must be null or point at a zero-terminated string.
    pub unsafe fn resolve(&self, id: *const c_char) -> Option<Cow<'_, str>> {
        if id.is_null() {
            return None;
        }
        let bytes = CStr::from_ptr(id).to_bytes();
        let Ok(text) = std::str::from_utf8(bytes) else {
            return Some(String::from_utf8_lossy(bytes).into_owned().into());
        };
        self.resolve_keyed(fnv1a_64(bytes), text)
    }

    fn resolve_keyed(&self, key: u64, text: &str) -> Option<Cow<'_, str>> {
        let mut buckets = self.buckets.lock();
        let found = buckets.find(key, text.as_bytes()).map(|entry| entry as *const CStr);
        let ptr = match found {
            Some(entry) => entry,
            None if buckets.len < self.capacity => match CString::new(text) {
                Ok(entry) => buckets.insert(key, entry.into_boxed_c_str()),
                Err(_) => return Some(Cow::Owned(text.to_owned())),
            },
            None => return Some(Cow::Owned(text.to_owned())),
        };
        drop(buckets);

        // SAFETY: cached boxes are never removed or mutated while `self`
        // lives, and only valid UTF-8 is ever cached through this path or
        // `intern`.
        let entry = unsafe { &*ptr };
        Some(Cow::Borrowed(unsafe { std::str::from_utf8_unchecked(entry.to_bytes()) }))
    }
}

impl std::fmt::Debug for Interner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interner")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_text_same_pointer() {
        let interner = Interner::new(8);
        let a = interner.intern("gain").unwrap();
        let b = interner.intern("gain").unwrap();
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
        assert_eq!(unsafe { CStr::from_ptr(a) }.to_str().unwrap(), "gain");
    }

    #[test]
    fn test_distinct_texts_distinct_buffers() {
        let interner = Interner::new(8);
        let a = interner.intern("gain").unwrap();
        let b = interner.intern("Gain").unwrap();
        assert_ne!(a, b);
        assert_eq!(unsafe { CStr::from_ptr(b) }.to_str().unwrap(), "Gain");
    }

    #[test]
    fn test_colliding_keys_do_not_alias() {
        let interner = Interner::new(8);
        let a = interner.intern_keyed(7, "left").unwrap();
        let b = interner.intern_keyed(7, "right").unwrap();
        assert_ne!(a, b);
        assert_eq!(interner.intern_keyed(7, "left").unwrap(), a);
        assert_eq!(interner.resolve_keyed(7, "right").unwrap(), "right");
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_capacity_bound() {
        let interner = Interner::new(2);
        interner.intern("a").unwrap();
        interner.intern("b").unwrap();
        assert_eq!(interner.intern("c"), Err(HostError::Exhausted("string cache")));
        // known strings still resolve
        assert!(interner.intern("a").is_ok());
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_interior_nul() {
        let interner = Interner::new(2);
        assert_eq!(interner.intern("a\0b"), Err(HostError::InvalidText));
        assert!(interner.is_empty());
    }

    #[test]
    fn test_resolve() {
        let interner = Interner::new(1);
        let native = CString::new("editor").unwrap();

        let first = unsafe { interner.resolve(native.as_ptr()) }.unwrap();
        assert!(matches!(first, Cow::Borrowed("editor")));
        // resolving caches, so interning finds the same buffer
        let ptr = interner.intern("editor").unwrap();
        assert_eq!(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap(), "editor");

        let other = CString::new("other").unwrap();
        let uncached = unsafe { interner.resolve(other.as_ptr()) }.unwrap();
        assert!(matches!(uncached, Cow::Owned(ref s) if s == "other"));
        assert_eq!(interner.len(), 1);

        assert!(unsafe { interner.resolve(std::ptr::null()) }.is_none());
    }
}
