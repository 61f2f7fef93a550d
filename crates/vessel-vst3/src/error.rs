//! Errors raised when calling back into the host.
//!
//! [`HostError`] itself lives in `vessel-core` so plugin code can match on
//! it; this module maps native statuses onto it.

pub use vessel_core::HostError;
use vst3::Steinberg::tresult;

use crate::status::Status;

/// Map a host status onto `Ok(())` or [`HostError::Failed`].
#[inline]
pub(crate) fn check(operation: &'static str, status: tresult) -> Result<(), HostError> {
    if status == Status::Ok.to_raw() {
        Ok(())
    } else {
        Err(HostError::Failed { operation, status })
    }
}
