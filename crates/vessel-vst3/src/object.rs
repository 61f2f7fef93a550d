//! The native object header and reference counting.
//!
//! # Layout
//!
//! ```text
//! ComObject<C>
//! ├── slots[0]  { vtbl, object } ← pointer handed out for FUnknown and entry 0
//! ├── slots[1]  { vtbl, object } ← pointer handed out for entry 1
//! ├── ...
//! ├── refcount  Mutex<u32>
//! └── value     C
//! ```
//!
//! Every interface pointer the host sees points at a slot, whose first
//! field is that interface's vtable pointer. The second field leads back to
//! the object, so a thunk can reach the header from any interface pointer.
//!
//! The refcount is the sole owner of the allocation. The lock is held only
//! for the increment or decrement and the zero check; the value is dropped
//! after the lock is released.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use parking_lot::Mutex;
use vst3::Interface;
use vst3::Steinberg::{kNoInterface, kResultOk, tresult, FUnknown, FUnknownVtbl, TUID};

use crate::registry::{self, Class, Guid, MAX_INTERFACES};
use crate::trace::{self, Direction};

#[repr(C)]
struct Slot {
    vtbl: *const c_void,
    object: *mut c_void,
}

/// A heap-allocated native object wrapping a `C`.
#[repr(C)]
pub struct ComObject<C: Class> {
    slots: [Slot; MAX_INTERFACES],
    refcount: Mutex<u32>,
    value: C,
}

// SAFETY: the slots only hold pointers to immutable vtables and to the
// object itself; `C` is `Send + Sync`.
unsafe impl<C: Class> Send for ComObject<C> {}
unsafe impl<C: Class> Sync for ComObject<C> {}

impl<C: Class> ComObject<C> {
    const INTERFACE_COUNT: usize = {
        assert!(!C::INTERFACES.is_empty(), "a class needs at least one interface");
        assert!(C::INTERFACES.len() <= MAX_INTERFACES, "too many interfaces");
        C::INTERFACES.len()
    };

    /// Allocate an object holding one reference, owned by the caller.
    pub fn new(value: C) -> ComOwned<C> {
        let count = Self::INTERFACE_COUNT;
        let object = Box::new(Self {
            slots: std::array::from_fn(|_| Slot {
                vtbl: ptr::null(),
                object: ptr::null_mut(),
            }),
            refcount: Mutex::new(1),
            value,
        });
        let raw = Box::into_raw(object);

        // SAFETY: `raw` was just allocated and is not shared yet.
        unsafe {
            for (slot, entry) in (*raw).slots.iter_mut().zip(&C::INTERFACES[..count]) {
                slot.vtbl = entry.vtbl;
                slot.object = raw as *mut c_void;
            }
            ComOwned {
                object: NonNull::new_unchecked(raw),
            }
        }
    }

    /// The wrapped value.
    #[inline]
    pub fn value(&self) -> &C {
        &self.value
    }

    /// Current reference count.
    pub fn ref_count(&self) -> u32 {
        *self.refcount.lock()
    }

    /// Interface pointer for `iid`, without touching the refcount.
    pub fn interface(&self, iid: &Guid) -> Option<*mut c_void> {
        let slot = if *iid == FUnknown::IID {
            Some(0)
        } else {
            registry::find(C::INTERFACES, iid)
        }?;
        Some(&self.slots[slot] as *const Slot as *mut c_void)
    }

    /// Pointer to the header of `I`'s slot, for handing to the host.
    pub fn as_ptr<I: Interface>(&self) -> Option<*mut I> {
        self.interface(&I::IID).map(|ptr| ptr as *mut I)
    }

    /// Increment and return the new count.
    pub fn add_ref(&self) -> u32 {
        let mut count = self.refcount.lock();
        *count += 1;
        *count
    }

    /// Decrement and return the new count, destroying the object at zero.
    ///
    /// # Safety
    /// `this` must point at a live object and the caller must own one of
    /// its references, which this call gives up.
    pub unsafe fn release(this: *mut Self) -> u32 {
        let remaining = {
            let mut count = (*this).refcount.lock();
            if *count == 0 {
                return 0;
            }
            *count -= 1;
            *count
        };

        if remaining == 0 {
            drop(Box::from_raw(this));
        }
        remaining
    }

    /// Recover the object from any of its interface pointers.
    ///
    /// # Safety
    /// `this` must be an interface pointer handed out by a live
    /// `ComObject<C>`.
    #[inline]
    pub unsafe fn from_interface<'a, I>(this: *mut I) -> &'a Self {
        &*Self::header_ptr(this)
    }

    /// The allocation behind any of the object's interface pointers.
    ///
    /// # Safety
    /// Same as [`from_interface`](Self::from_interface).
    #[inline]
    pub unsafe fn header_ptr<I>(this: *mut I) -> *mut Self {
        (*(this as *const Slot)).object as *mut Self
    }

    /// `queryInterface` on behalf of the host.
    ///
    /// # Safety
    /// `obj` must be null or writable.
    pub unsafe fn query_interface(&self, iid: *const TUID, obj: *mut *mut c_void) -> tresult {
        if obj.is_null() {
            return crate::Status::InvalidArgument.to_raw();
        }
        let Some(iid) = registry::read_iid(iid) else {
            *obj = ptr::null_mut();
            return crate::Status::InvalidArgument.to_raw();
        };

        match self.interface(&iid) {
            Some(interface) => {
                self.add_ref();
                *obj = interface;
                trace::trace_query(Direction::HostToPlugin, &iid, true);
                kResultOk
            }
            None => {
                *obj = ptr::null_mut();
                log::trace!("queryInterface: no interface {iid:02x?}");
                trace::trace_query(Direction::HostToPlugin, &iid, false);
                kNoInterface
            }
        }
    }
}

/// The caller's reference to a freshly created object.
///
/// Dropping it releases that reference.
pub struct ComOwned<C: Class> {
    object: NonNull<ComObject<C>>,
}

// SAFETY: the object is `Send + Sync` and its refcount is locked.
unsafe impl<C: Class> Send for ComOwned<C> {}
unsafe impl<C: Class> Sync for ComOwned<C> {}

impl<C: Class> ComOwned<C> {
    /// Hand out interface `I` with its own reference.
    pub fn to_interface<I: Interface>(&self) -> Option<*mut I> {
        let object = self.as_ref();
        let ptr = object.as_ptr::<I>()?;
        object.add_ref();
        Some(ptr)
    }

    /// Give up ownership without releasing, returning the `I` pointer.
    ///
    /// Returns `None`, releasing the reference, if the class lacks `I`.
    pub fn into_interface<I: Interface>(self) -> Option<*mut I> {
        let ptr = self.as_ref().as_ptr::<I>()?;
        std::mem::forget(self);
        Some(ptr)
    }
}

impl<C: Class> AsRef<ComObject<C>> for ComOwned<C> {
    fn as_ref(&self) -> &ComObject<C> {
        // SAFETY: the owned reference keeps the object alive.
        unsafe { self.object.as_ref() }
    }
}

impl<C: Class> Drop for ComOwned<C> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one reference.
        unsafe {
            ComObject::release(self.object.as_ptr());
        }
    }
}

// =============================================================================
// FUnknown
// =============================================================================

unsafe extern "system" fn query_interface<C: Class>(
    this: *mut FUnknown,
    iid: *const TUID,
    obj: *mut *mut c_void,
) -> tresult {
    ComObject::<C>::from_interface(this).query_interface(iid, obj)
}

unsafe extern "system" fn add_ref<C: Class>(this: *mut FUnknown) -> u32 {
    ComObject::<C>::from_interface(this).add_ref()
}

unsafe extern "system" fn release<C: Class>(this: *mut FUnknown) -> u32 {
    ComObject::release(ComObject::<C>::header_ptr(this))
}

/// The `FUnknown` entries every vtable of `C` starts with.
pub const fn unknown_vtbl<C: Class>() -> FUnknownVtbl {
    FUnknownVtbl {
        queryInterface: query_interface::<C>,
        addRef: add_ref::<C>,
        release: release::<C>,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use proptest::prelude::*;
    use vst3::Steinberg::Vst::{IProcessContextRequirements, IProcessContextRequirementsVtbl};
    use vst3::Steinberg::{IPluginBase, IPluginBaseVtbl};

    use super::*;
    use crate::registry::InterfaceEntry;

    struct Probe {
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    unsafe extern "system" fn initialize(_this: *mut IPluginBase, _context: *mut FUnknown) -> tresult {
        kResultOk
    }

    unsafe extern "system" fn terminate(_this: *mut IPluginBase) -> tresult {
        kResultOk
    }

    unsafe extern "system" fn requirements(_this: *mut IProcessContextRequirements) -> u32 {
        0
    }

    impl Probe {
        const PLUGIN_BASE: &'static IPluginBaseVtbl = &IPluginBaseVtbl {
            base: unknown_vtbl::<Probe>(),
            initialize,
            terminate,
        };

        const REQUIREMENTS: &'static IProcessContextRequirementsVtbl = &IProcessContextRequirementsVtbl {
            base: unknown_vtbl::<Probe>(),
            getProcessContextRequirements: requirements,
        };
    }

    impl Class for Probe {
        const INTERFACES: &'static [InterfaceEntry] = &[
            InterfaceEntry::new::<IPluginBase>(Self::PLUGIN_BASE),
            InterfaceEntry::new::<IProcessContextRequirements>(Self::REQUIREMENTS),
        ];
    }

    fn probe() -> (ComOwned<Probe>, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = ComObject::new(Probe {
            drops: drops.clone(),
        });
        (object, drops)
    }

    unsafe fn unknown(object: &ComOwned<Probe>) -> *mut FUnknown {
        object.as_ref().as_ptr::<FUnknown>().unwrap()
    }

    unsafe fn vtbl(this: *mut FUnknown) -> &'static FUnknownVtbl {
        &*(*(this as *const *const FUnknownVtbl))
    }

    #[test]
    fn test_created_with_one_reference() {
        let (object, drops) = probe();
        assert_eq!(object.as_ref().ref_count(), 1);
        drop(object);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thunks_reach_the_header() {
        let (object, drops) = probe();
        unsafe {
            let this = unknown(&object);
            assert_eq!((vtbl(this).addRef)(this), 2);
            assert_eq!((vtbl(this).addRef)(this), 3);
            assert_eq!((vtbl(this).release)(this), 2);
            assert_eq!((vtbl(this).release)(this), 1);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(object);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_last_release_through_later_slot() {
        let (object, drops) = probe();
        let this = object.into_interface::<IProcessContextRequirements>().unwrap();
        assert_ne!(this as *mut c_void, unsafe { ComObject::<Probe>::header_ptr(this) } as *mut c_void);
        unsafe {
            let unknown = this as *mut FUnknown;
            assert_eq!((vtbl(unknown).addRef)(unknown), 2);
            assert_eq!((vtbl(unknown).release)(unknown), 1);
            assert_eq!(drops.load(Ordering::SeqCst), 0);
            assert_eq!((vtbl(unknown).release)(unknown), 0);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_declared_interfaces() {
        let (object, _drops) = probe();
        unsafe {
            let this = unknown(&object);
            for iid in [FUnknown::IID, IPluginBase::IID, IProcessContextRequirements::IID] {
                let tuid = iid.map(|b| b as std::ffi::c_char);
                let mut out = ptr::null_mut();
                assert_eq!((vtbl(this).queryInterface)(this, &tuid, &mut out), kResultOk);
                assert!(!out.is_null());
                assert_eq!((vtbl(out as *mut FUnknown).release)(out as *mut FUnknown), 1);
            }
        }
    }

    #[test]
    fn test_query_null_out_pointer() {
        let (object, _drops) = probe();
        unsafe {
            let this = unknown(&object);
            let tuid = FUnknown::IID.map(|b| b as std::ffi::c_char);
            let status = (vtbl(this).queryInterface)(this, &tuid, ptr::null_mut());
            assert_eq!(status, crate::Status::InvalidArgument.to_raw());
        }
        assert_eq!(object.as_ref().ref_count(), 1);
    }

    #[test]
    fn test_concurrent_refcounting() {
        let (object, drops) = probe();
        let address = unsafe { unknown(&object) } as usize;

        let threads: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(move || unsafe {
                    let this = address as *mut FUnknown;
                    for _ in 0..1000 {
                        (vtbl(this).addRef)(this);
                        (vtbl(this).release)(this);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(object.as_ref().ref_count(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(object);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    /// Turn free choices into N addRefs and N releases that never drop the
    /// count below the creator's reference.
    fn balanced_ops() -> impl Strategy<Value = Vec<bool>> {
        prop::collection::vec(any::<bool>(), 0..128).prop_map(|choices| {
            let mut ops = Vec::with_capacity(choices.len() * 2);
            let mut outstanding = 0usize;
            for add in choices {
                if add || outstanding == 0 {
                    outstanding += 1;
                    ops.push(true);
                } else {
                    outstanding -= 1;
                    ops.push(false);
                }
            }
            ops.extend(std::iter::repeat(false).take(outstanding));
            ops
        })
    }

    proptest! {
        #[test]
        fn prop_balanced_sequences_keep_count(ops in balanced_ops()) {
            let (object, drops) = probe();
            unsafe {
                let this = unknown(&object);
                for add in ops {
                    if add {
                        (vtbl(this).addRef)(this);
                    } else {
                        (vtbl(this).release)(this);
                    }
                }
            }
            prop_assert_eq!(object.as_ref().ref_count(), 1);
            prop_assert_eq!(drops.load(Ordering::SeqCst), 0);
            drop(object);
            prop_assert_eq!(drops.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn prop_undeclared_iids_have_no_interface(iid in any::<[u8; 16]>()) {
            prop_assume!(
                iid != FUnknown::IID && iid != IPluginBase::IID && iid != IProcessContextRequirements::IID
            );
            let (object, _drops) = probe();
            unsafe {
                let this = unknown(&object);
                let tuid = iid.map(|b| b as std::ffi::c_char);
                let mut out = 0x1 as *mut c_void;
                prop_assert_eq!((vtbl(this).queryInterface)(this, &tuid, &mut out), kNoInterface);
                prop_assert!(out.is_null());
            }
            prop_assert_eq!(object.as_ref().ref_count(), 1);
        }
    }
}
