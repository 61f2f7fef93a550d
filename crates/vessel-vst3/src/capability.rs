//! Optional host interfaces, probed once.

use vst3::Interface;

use crate::error::HostError;
use crate::ptr::HostPtr;

/// The outcome of probing a host object for interface `I`.
///
/// Built once when a proxy is constructed and never re-probed: a capability
/// reported absent stays absent for the life of the connection.
pub struct Capability<I: Interface> {
    name: &'static str,
    ptr: Option<HostPtr<I>>,
}

impl<I: Interface> Capability<I> {
    /// Query `source` for `I`, logging the result under `name`.
    pub fn probe<S: Interface>(source: &HostPtr<S>, name: &'static str) -> Self {
        let ptr = source.query::<I>();
        log::debug!(
            "host capability {name}: {}",
            if ptr.is_some() { "present" } else { "absent" }
        );
        Self { name, ptr }
    }

    /// A capability known to be absent.
    pub fn absent(name: &'static str) -> Self {
        Self { name, ptr: None }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        self.ptr.is_some()
    }

    /// The cached pointer, or [`HostError::Unsupported`] naming the capability.
    #[inline]
    pub fn get(&self) -> Result<&HostPtr<I>, HostError> {
        self.ptr.as_ref().ok_or(HostError::Unsupported {
            capability: self.name,
        })
    }
}

impl<I: Interface> std::fmt::Debug for Capability<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("present", &self.is_present())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use vst3::Steinberg::Vst::{IComponentHandler2, IProgress};
    use vst3::Steinberg::{FUnknown, FUnknownVtbl};

    use super::*;
    use crate::ptr::test_support::*;

    static UNKNOWN_ONLY: FUnknownVtbl = UNKNOWN;

    #[test]
    fn test_probe_once() {
        let host = FakeHost::new()
            .with::<FUnknown, _>(&UNKNOWN_ONLY)
            .with::<IProgress, _>(&UNKNOWN_ONLY);
        let source = unsafe { HostPtr::from_borrowed(host.as_ptr::<FUnknown>()) }.unwrap();

        let progress = Capability::<IProgress>::probe(&source, "IProgress");
        let handler2 = Capability::<IComponentHandler2>::probe(&source, "IComponentHandler2");
        assert_eq!(host.queries.get(), 2);

        assert!(progress.is_present());
        assert!(progress.get().is_ok());
        assert!(!handler2.is_present());
        for _ in 0..3 {
            assert_eq!(
                handler2.get().unwrap_err(),
                HostError::Unsupported {
                    capability: "IComponentHandler2"
                }
            );
        }
        assert_eq!(host.queries.get(), 2);
    }

    #[test]
    fn test_absent() {
        let capability = Capability::<IProgress>::absent("IProgress");
        assert!(capability.get().unwrap_err().is_unsupported());
    }
}
