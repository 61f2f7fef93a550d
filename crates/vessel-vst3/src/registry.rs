//! Interface tables and the classes that declare them.
//!
//! A class lists its interfaces once, as an associated constant. Each entry
//! pairs a 16-byte interface id with the vtable answering it. The list is
//! immutable and shared by every instance of the class; objects copy the
//! vtable pointers into their header at construction.

use std::ffi::c_void;

use vst3::Interface;

/// A 16-byte interface identifier.
pub type Guid = [u8; 16];

/// One interface a class answers to.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceEntry {
    pub iid: Guid,
    pub vtbl: *const c_void,
}

// Safety: entries only point at immutable vtables of `extern "system"`
// function pointers.
unsafe impl Send for InterfaceEntry {}
unsafe impl Sync for InterfaceEntry {}

impl InterfaceEntry {
    /// Entry answering `I` with `vtbl`.
    pub const fn new<I: Interface>(vtbl: &'static I::Vtbl) -> Self {
        Self {
            iid: I::IID,
            vtbl: vtbl as *const I::Vtbl as *const c_void,
        }
    }

    /// Entry answering `I` with a vtable laid out for a derived interface.
    ///
    /// Used for base interfaces: a derived vtable begins with its base's
    /// entries, so the same table answers both ids.
    pub const fn base<I: Interface, V>(vtbl: &'static V) -> Self {
        Self {
            iid: I::IID,
            vtbl: vtbl as *const V as *const c_void,
        }
    }
}

/// Maximum number of interfaces one class may declare.
pub const MAX_INTERFACES: usize = 16;

/// A type exposed to the host as a native object.
///
/// `FUnknown` is answered by the first entry and must not be listed.
pub trait Class: Send + Sync + 'static {
    /// The interfaces of this class, in slot order.
    const INTERFACES: &'static [InterfaceEntry];
}

/// Slot answering `iid`, if the class declares it.
#[inline]
pub fn find(entries: &[InterfaceEntry], iid: &Guid) -> Option<usize> {
    entries.iter().position(|entry| entry.iid == *iid)
}

/// Copy a native interface id.
///
/// # Safety
/// `iid` must be null or point at 16 readable bytes.
#[inline]
pub unsafe fn read_iid(iid: *const vst3::Steinberg::TUID) -> Option<Guid> {
    if iid.is_null() {
        return None;
    }
    let mut guid = [0u8; 16];
    for (dst, src) in guid.iter_mut().zip((*iid).iter()) {
        *dst = *src as u8;
    }
    Some(guid)
}
