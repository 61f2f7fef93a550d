//! Error types for plugin domain code.

use thiserror::Error;

use crate::bus::{BusDirection, MediaType};
use crate::host::HostError;
use crate::process::SampleSize;
use crate::types::{ParamId, ProgramListId, UnitId};

/// Errors raised by plugin domain code.
///
/// These never cross the native boundary directly: the VST3 layer maps each
/// variant onto a status code.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No parameter with this id exists.
    #[error("unknown parameter id {0}")]
    UnknownParameter(ParamId),

    /// Two parameters were registered with the same id.
    #[error("duplicate parameter id {0}")]
    DuplicateParameter(ParamId),

    /// Display text could not be parsed into a value.
    #[error("cannot parse {text:?} as a value for parameter {id}")]
    InvalidText { id: ParamId, text: String },

    /// The plugin cannot process this sample width.
    #[error("unsupported sample size {0:?}")]
    UnsupportedSampleSize(SampleSize),

    /// A bus reference does not exist.
    #[error("no {media:?} {direction:?} bus at index {index}")]
    InvalidBus {
        media: MediaType,
        direction: BusDirection,
        index: i32,
    },

    /// No unit with this id exists.
    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    /// No program list with this id exists, or the program index is out of range.
    #[error("unknown program list {0}")]
    UnknownProgramList(ProgramListId),

    /// Reading or writing persisted state failed.
    #[error("state stream failed: {0}")]
    State(#[from] std::io::Error),

    /// A call back into the host failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// Free-form failure raised by plugin code.
    #[error("{0}")]
    Message(String),
}

impl PluginError {
    /// Create a free-form error.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
