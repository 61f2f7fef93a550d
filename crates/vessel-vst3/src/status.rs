//! The fixed status vocabulary of the native protocol.
//!
//! Windows builds use COM `HRESULT` values, every other platform uses small
//! integers. Both encodings are checked against the `vst3` crate's constants
//! at compile time.

use vessel_core::{HostError, PluginError};
use vst3::Steinberg::{
    kInternalError, kInvalidArgument, kNoInterface, kNotImplemented, kNotInitialized,
    kOutOfMemory, kResultFalse, kResultOk, tresult,
};

/// A status code the host understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Success (`kResultOk`, also `kResultTrue`).
    Ok,
    /// Success with a negative answer (`kResultFalse`).
    False,
    InvalidArgument,
    NotImplemented,
    /// A failure inside plugin code, including caught panics.
    InternalError,
    /// Call made in a state that does not allow it (`kNotInitialized`,
    /// the protocol's "unexpected").
    Unexpected,
    OutOfMemory,
    NoInterface,
}

#[cfg(target_os = "windows")]
mod raw {
    pub const OK: i32 = 0;
    pub const FALSE: i32 = 1;
    pub const NO_INTERFACE: i32 = 0x8000_4002_u32 as i32;
    pub const INVALID_ARGUMENT: i32 = 0x8007_0057_u32 as i32;
    pub const NOT_IMPLEMENTED: i32 = 0x8000_4001_u32 as i32;
    pub const INTERNAL_ERROR: i32 = 0x8000_4005_u32 as i32;
    pub const UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;
    pub const OUT_OF_MEMORY: i32 = 0x8007_000E_u32 as i32;
}

#[cfg(not(target_os = "windows"))]
mod raw {
    pub const OK: i32 = 0;
    pub const FALSE: i32 = 1;
    pub const NO_INTERFACE: i32 = -1;
    pub const INVALID_ARGUMENT: i32 = 2;
    pub const NOT_IMPLEMENTED: i32 = 3;
    pub const INTERNAL_ERROR: i32 = 4;
    pub const UNEXPECTED: i32 = 5;
    pub const OUT_OF_MEMORY: i32 = 6;
}

const _: () = {
    assert!(raw::OK == kResultOk);
    assert!(raw::FALSE == kResultFalse);
    assert!(raw::NO_INTERFACE == kNoInterface);
    assert!(raw::INVALID_ARGUMENT == kInvalidArgument);
    assert!(raw::NOT_IMPLEMENTED == kNotImplemented);
    assert!(raw::INTERNAL_ERROR == kInternalError);
    assert!(raw::UNEXPECTED == kNotInitialized);
    assert!(raw::OUT_OF_MEMORY == kOutOfMemory);
    assert!(std::mem::size_of::<tresult>() == 4);
};

impl Status {
    /// Native encoding.
    pub const fn to_raw(self) -> tresult {
        match self {
            Self::Ok => raw::OK,
            Self::False => raw::FALSE,
            Self::InvalidArgument => raw::INVALID_ARGUMENT,
            Self::NotImplemented => raw::NOT_IMPLEMENTED,
            Self::InternalError => raw::INTERNAL_ERROR,
            Self::Unexpected => raw::UNEXPECTED,
            Self::OutOfMemory => raw::OUT_OF_MEMORY,
            Self::NoInterface => raw::NO_INTERFACE,
        }
    }

    /// Decode a native status. `None` for values outside the vocabulary.
    pub const fn from_raw(code: tresult) -> Option<Self> {
        Some(match code {
            raw::OK => Self::Ok,
            raw::FALSE => Self::False,
            raw::INVALID_ARGUMENT => Self::InvalidArgument,
            raw::NOT_IMPLEMENTED => Self::NotImplemented,
            raw::INTERNAL_ERROR => Self::InternalError,
            raw::UNEXPECTED => Self::Unexpected,
            raw::OUT_OF_MEMORY => Self::OutOfMemory,
            raw::NO_INTERFACE => Self::NoInterface,
            _ => return None,
        })
    }

    /// `true` for [`Status::Ok`] only.
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Map a boolean answer onto `Ok`/`False`.
    pub const fn from_bool(value: bool) -> Self {
        if value {
            Self::Ok
        } else {
            Self::False
        }
    }
}

impl From<Status> for tresult {
    fn from(status: Status) -> Self {
        status.to_raw()
    }
}

impl From<&PluginError> for Status {
    fn from(error: &PluginError) -> Self {
        match error {
            PluginError::UnknownParameter(_)
            | PluginError::InvalidText { .. }
            | PluginError::InvalidBus { .. }
            | PluginError::UnknownUnit(_)
            | PluginError::UnknownProgramList(_)
            | PluginError::UnsupportedSampleSize(_) => Self::InvalidArgument,
            PluginError::DuplicateParameter(_)
            | PluginError::State(_)
            | PluginError::Message(_) => Self::InternalError,
            PluginError::Host(error) => Self::from(error),
        }
    }
}

impl From<PluginError> for Status {
    fn from(error: PluginError) -> Self {
        Self::from(&error)
    }
}

/// The status a host-call failure reports when it has to cross the boundary.
impl From<&HostError> for Status {
    fn from(error: &HostError) -> Self {
        match error {
            HostError::Unsupported { .. } => Self::NotImplemented,
            HostError::Failed { status, .. } => Self::from_raw(*status).unwrap_or(Self::InternalError),
            HostError::EditNotOpen(_) | HostError::EditAlreadyOpen(_) => Self::Unexpected,
            HostError::InvalidText => Self::InvalidArgument,
            HostError::Exhausted(_) => Self::OutOfMemory,
        }
    }
}

/// Convert a domain result into a native status, logging the failure.
pub(crate) fn to_tresult(operation: &'static str, result: Result<(), PluginError>) -> tresult {
    match result {
        Ok(()) => kResultOk,
        Err(error) => {
            log::debug!("{operation} failed: {error}");
            Status::from(&error).to_raw()
        }
    }
}
