//! Owned references to host objects.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use vst3::Interface;
use vst3::Steinberg::{kResultOk, FUnknown, FUnknownVtbl, TUID};

use crate::trace::{self, Direction};

/// One reference to a host object implementing `I`.
///
/// Cloning adds a reference, dropping releases it.
pub struct HostPtr<I: Interface> {
    ptr: NonNull<I>,
    _marker: PhantomData<I>,
}

// SAFETY: the protocol makes reference counting thread-safe. Which thread a
// method may be called on is part of each method's contract and stays the
// caller's responsibility.
unsafe impl<I: Interface> Send for HostPtr<I> {}
unsafe impl<I: Interface> Sync for HostPtr<I> {}

impl<I: Interface> HostPtr<I> {
    /// Take over a reference the caller already owns.
    ///
    /// # Safety
    /// `ptr` must be null or a valid `I` pointer carrying one reference.
    pub unsafe fn from_raw(ptr: *mut I) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Add a reference to a borrowed pointer.
    ///
    /// # Safety
    /// `ptr` must be null or a valid `I` pointer.
    pub unsafe fn from_borrowed(ptr: *mut I) -> Option<Self> {
        let this = Self::from_raw(ptr)?;
        (this.unknown_vtbl().addRef)(this.unknown());
        Some(this)
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut I {
        self.ptr.as_ptr()
    }

    /// The vtable of the host object.
    ///
    /// # Safety
    /// `V` must be `I`'s vtable type or one of its bases.
    #[inline]
    pub unsafe fn vtbl<V>(&self) -> &V {
        &*(*(self.ptr.as_ptr() as *const *const V))
    }

    #[inline]
    fn unknown(&self) -> *mut FUnknown {
        self.ptr.as_ptr() as *mut FUnknown
    }

    #[inline]
    fn unknown_vtbl(&self) -> &FUnknownVtbl {
        // SAFETY: every interface vtable begins with FUnknown's entries.
        unsafe { self.vtbl::<FUnknownVtbl>() }
    }

    /// Ask the host object for interface `J`.
    pub fn query<J: Interface>(&self) -> Option<HostPtr<J>> {
        let iid: TUID = J::IID.map(|b| b as std::ffi::c_char);
        let mut obj: *mut c_void = ptr::null_mut();
        // SAFETY: `self` holds a live reference and both pointers are valid.
        let status = unsafe { (self.unknown_vtbl().queryInterface)(self.unknown(), &iid, &mut obj) };

        let found = status == kResultOk && !obj.is_null();
        trace::trace_query(Direction::PluginToHost, &J::IID, found);
        if !found {
            return None;
        }
        // SAFETY: a successful query returns an added reference.
        unsafe { HostPtr::from_raw(obj as *mut J) }
    }
}

impl<I: Interface> Clone for HostPtr<I> {
    fn clone(&self) -> Self {
        // SAFETY: `self` holds a live reference.
        unsafe {
            (self.unknown_vtbl().addRef)(self.unknown());
        }
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<I: Interface> Drop for HostPtr<I> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one reference.
        unsafe {
            (self.unknown_vtbl().release)(self.unknown());
        }
    }
}

impl<I: Interface> fmt::Debug for HostPtr<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostPtr").field(&self.ptr).finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A host object double answering a configurable set of interfaces.

    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use vst3::Steinberg::{kNoInterface, tresult};

    use super::*;

    /// One interface of a [`FakeHost`]: a vtable pointer followed by a
    /// pointer back to the shared state.
    #[repr(C)]
    pub(crate) struct Facet {
        vtbl: *const c_void,
        host: *const FakeHost,
    }

    /// Host double with a refcount, a call log and one facet per interface.
    ///
    /// `data` is free-form storage for doubles that keep values, `child`
    /// another double this one hands out (a message, a menu).
    pub(crate) struct FakeHost {
        facets: Vec<([u8; 16], Box<Facet>)>,
        pub refs: Cell<u32>,
        pub queries: Cell<u32>,
        pub calls: RefCell<Vec<String>>,
        pub data: RefCell<HashMap<String, Vec<u8>>>,
        pub child: Cell<*const FakeHost>,
    }

    impl FakeHost {
        pub fn new() -> Box<Self> {
            Box::new(Self {
                facets: Vec::new(),
                refs: Cell::new(1),
                queries: Cell::new(0),
                calls: RefCell::new(Vec::new()),
                data: RefCell::new(HashMap::new()),
                child: Cell::new(ptr::null()),
            })
        }

        /// Hand out `child` from [`hand_out`](Self::hand_out).
        pub fn with_child(self: Box<Self>, child: &FakeHost) -> Box<Self> {
            self.child.set(child);
            self
        }

        /// A new reference to the child's `I` facet, or null.
        pub unsafe fn hand_out<I: Interface>(&self) -> *mut I {
            let child = self.child.get();
            if child.is_null() {
                return ptr::null_mut();
            }
            (*child).refs.set((*child).refs.get() + 1);
            (*child).as_ptr::<I>()
        }

        /// Answer `I` with `vtbl`. The first facet also answers FUnknown.
        pub fn with<I: Interface, V>(mut self: Box<Self>, vtbl: &'static V) -> Box<Self> {
            let host = &*self as *const FakeHost;
            self.facets.push((
                I::IID,
                Box::new(Facet {
                    vtbl: vtbl as *const V as *const c_void,
                    host,
                }),
            ));
            self
        }

        fn facet(&self, iid: &[u8; 16]) -> Option<*mut c_void> {
            let index = if *iid == FUnknown::IID {
                Some(0).filter(|_| !self.facets.is_empty())
            } else {
                self.facets.iter().position(|(facet_iid, _)| facet_iid == iid)
            }?;
            Some(&*self.facets[index].1 as *const Facet as *mut c_void)
        }

        /// Interface pointer for `I`. Panics if `I` was not added.
        pub fn as_ptr<I: Interface>(&self) -> *mut I {
            self.facet(&I::IID).expect("interface not faked") as *mut I
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    /// The double behind an interface pointer it handed out.
    pub(crate) unsafe fn fake<'a, I>(this: *mut I) -> &'a FakeHost {
        &*(*(this as *const Facet)).host
    }

    /// Record a forwarded call on the double behind `this`.
    pub(crate) unsafe fn record<I>(this: *mut I, call: String) {
        fake(this).calls.borrow_mut().push(call);
    }

    pub(crate) unsafe extern "system" fn query_interface(
        this: *mut FUnknown,
        iid: *const TUID,
        obj: *mut *mut c_void,
    ) -> tresult {
        let host = fake(this);
        host.queries.set(host.queries.get() + 1);
        match host.facet(&(*iid).map(|b| b as u8)) {
            Some(facet) => {
                host.refs.set(host.refs.get() + 1);
                *obj = facet;
                kResultOk
            }
            None => {
                *obj = ptr::null_mut();
                kNoInterface
            }
        }
    }

    pub(crate) unsafe extern "system" fn add_ref(this: *mut FUnknown) -> u32 {
        let host = fake(this);
        host.refs.set(host.refs.get() + 1);
        host.refs.get()
    }

    pub(crate) unsafe extern "system" fn release(this: *mut FUnknown) -> u32 {
        let host = fake(this);
        host.refs.set(host.refs.get() - 1);
        host.refs.get()
    }

    pub(crate) const UNKNOWN: FUnknownVtbl = FUnknownVtbl {
        queryInterface: query_interface,
        addRef: add_ref,
        release,
    };
}
