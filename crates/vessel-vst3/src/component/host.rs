//! The host as the controller model sees it, and `IConnectionPoint`.
//!
//! A [`HostLink`] collects everything the host hands the component over
//! its lifetime: the component handler (`setComponentHandler`), the host
//! application (`initialize`) and a peer connection point (`connect`). The
//! controller model receives the link as an `Arc<dyn Host>` right after a
//! successful `initialize` and loses it at `terminate`. Calls whose backing
//! object has not arrived yet fail with [`HostError::Unsupported`].

use std::sync::Arc;

use parking_lot::Mutex;
use vessel_core::{
    AudioModel, BusDirection, Host, MediaType, MenuItem, Message, ParamId, ParamValue, Plugin,
    ProgressId, ProgressKind, RestartFlags,
};
use vst3::Steinberg::Vst::{IConnectionPoint, IConnectionPointVtbl, IMessage};
use vst3::Steinberg::{kInvalidArgument, tresult};

use super::{component, to_raw, Component};
use crate::error::{check, HostError};
use crate::handler::ComponentHandler;
use crate::object::unknown_vtbl;
use crate::ptr::HostPtr;
use crate::session::HostSession;
use crate::status::Status;
use crate::thunk::guard;

// =============================================================================
// Host Link
// =============================================================================

#[derive(Default)]
pub(crate) struct HostLink {
    handler: Mutex<Option<Arc<ComponentHandler>>>,
    session: Mutex<Option<Arc<HostSession>>>,
    peer: Mutex<Option<HostPtr<IConnectionPoint>>>,
}

impl HostLink {
    pub(super) fn handler(&self) -> Option<Arc<ComponentHandler>> {
        self.handler.lock().clone()
    }

    pub(super) fn set_handler(&self, handler: Option<ComponentHandler>) {
        *self.handler.lock() = handler.map(Arc::new);
    }

    pub(super) fn session(&self) -> Option<Arc<HostSession>> {
        self.session.lock().clone()
    }

    pub(super) fn set_session(&self, session: Option<HostSession>) {
        *self.session.lock() = session.map(Arc::new);
    }

    /// Keep `peer` until it disconnects. A second peer is refused.
    pub(super) fn connect(&self, peer: HostPtr<IConnectionPoint>) -> Result<(), Status> {
        let mut current = self.peer.lock();
        if current.is_some() {
            log::debug!("connect refused, already connected");
            return Err(Status::False);
        }
        *current = Some(peer);
        Ok(())
    }

    pub(super) fn disconnect(&self, peer: *mut IConnectionPoint) -> Result<(), Status> {
        let mut current = self.peer.lock();
        match current.as_ref() {
            Some(connected) if connected.as_ptr() == peer => {
                current.take();
                Ok(())
            }
            _ => Err(Status::False),
        }
    }

    pub(super) fn is_connected(&self) -> bool {
        self.peer.lock().is_some()
    }

    /// Drop every host reference.
    pub(super) fn clear(&self) {
        self.peer.lock().take();
        self.handler.lock().take();
        self.session.lock().take();
    }

    fn require_handler(&self) -> Result<Arc<ComponentHandler>, HostError> {
        self.handler().ok_or(HostError::unsupported("IComponentHandler"))
    }
}

impl Host for HostLink {
    fn begin_edit(&self, id: ParamId) -> Result<(), HostError> {
        self.require_handler()?.begin_edit(id)
    }

    fn perform_edit(&self, id: ParamId, value: ParamValue) -> Result<(), HostError> {
        self.require_handler()?.perform_edit(id, value)
    }

    fn end_edit(&self, id: ParamId) -> Result<(), HostError> {
        self.require_handler()?.end_edit(id)
    }

    fn restart(&self, flags: RestartFlags) -> Result<(), HostError> {
        self.require_handler()?.restart_component(flags)
    }

    fn set_dirty(&self, dirty: bool) -> Result<(), HostError> {
        self.require_handler()?.set_dirty(dirty)
    }

    fn request_open_editor(&self, name: &str) -> Result<(), HostError> {
        self.require_handler()?.request_open_editor(name)
    }

    fn start_group_edit(&self) -> Result<(), HostError> {
        self.require_handler()?.start_group_edit()
    }

    fn finish_group_edit(&self) -> Result<(), HostError> {
        self.require_handler()?.finish_group_edit()
    }

    fn popup_context_menu(
        &self,
        id: Option<ParamId>,
        items: &[MenuItem<'_>],
        x: i32,
        y: i32,
        on_select: Box<dyn Fn(i32) + Send + Sync>,
    ) -> Result<(), HostError> {
        Host::popup_context_menu(&*self.require_handler()?, id, items, x, y, on_select)
    }

    fn request_bus_activation(
        &self,
        media: MediaType,
        direction: BusDirection,
        index: i32,
        active: bool,
    ) -> Result<(), HostError> {
        self.require_handler()?.request_bus_activation(media, direction, index, active)
    }

    fn start_progress(&self, kind: ProgressKind, description: &str) -> Result<ProgressId, HostError> {
        self.require_handler()?.start_progress(kind, description)
    }

    fn update_progress(&self, id: ProgressId, value: f64) -> Result<(), HostError> {
        self.require_handler()?.update_progress(id, value)
    }

    fn finish_progress(&self, id: ProgressId) -> Result<(), HostError> {
        self.require_handler()?.finish_progress(id)
    }

    /// Build a host message and hand it to the connected peer.
    ///
    /// Needs both a peer and a host application to create the message.
    fn send_message(&self, message: &Message) -> Result<(), HostError> {
        let peer = self
            .peer
            .lock()
            .clone()
            .ok_or(HostError::unsupported("IConnectionPoint"))?;
        let session = self.session().ok_or(HostError::unsupported("IHostApplication"))?;
        let native = session.write_message(message)?;
        // SAFETY: live peer reference; the peer adds its own reference to
        // the message if it keeps it. No lock is held, so the peer may call
        // straight back into this component.
        let status =
            unsafe { (peer.vtbl::<IConnectionPointVtbl>().notify)(peer.as_ptr(), native.as_ptr()) };
        check("IConnectionPoint::notify", status)
    }
}

// =============================================================================
// IConnectionPoint
// =============================================================================

impl<P: Plugin> Component<P> {
    pub(super) const CONNECTION_POINT: &'static IConnectionPointVtbl = &IConnectionPointVtbl {
        base: unknown_vtbl::<Self>(),
        connect: connect::<P>,
        disconnect: disconnect::<P>,
        notify: notify::<P>,
    };

    /// Whether a peer connection point is connected.
    pub fn is_connected(&self) -> bool {
        self.host.is_connected()
    }

    /// Hand an incoming message to the controller model.
    fn receive(&self, message: *mut IMessage) -> Result<(), Status> {
        let Some(session) = self.host.session() else {
            log::debug!("message received without a host application");
            return Err(Status::False);
        };
        // SAFETY: the host passes a message valid for the call.
        let native = unsafe { session.message(message) }.ok_or(Status::InvalidArgument)?;
        let incoming = native.reader();
        match self.controller.notify(&incoming) {
            Ok(true) => Ok(()),
            Ok(false) => {
                log::trace!("unhandled message {:?}", vessel_core::MessageReader::id(&incoming));
                Err(Status::False)
            }
            Err(e) => {
                log::debug!("message handling failed: {e}");
                Err(Status::from(&e))
            }
        }
    }
}

unsafe extern "system" fn connect<P: Plugin>(this: *mut IConnectionPoint, other: *mut IConnectionPoint) -> tresult {
    guard("IConnectionPoint::connect", || {
        // SAFETY: the host passes null or a valid connection point.
        let Some(peer) = HostPtr::from_borrowed(other) else {
            return kInvalidArgument;
        };
        to_raw(component::<P, _>(this).host.connect(peer))
    })
}

unsafe extern "system" fn disconnect<P: Plugin>(
    this: *mut IConnectionPoint,
    other: *mut IConnectionPoint,
) -> tresult {
    guard("IConnectionPoint::disconnect", || {
        if other.is_null() {
            return kInvalidArgument;
        }
        to_raw(component::<P, _>(this).host.disconnect(other))
    })
}

unsafe extern "system" fn notify<P: Plugin>(this: *mut IConnectionPoint, message: *mut IMessage) -> tresult {
    guard("IConnectionPoint::notify", || {
        if message.is_null() {
            return kInvalidArgument;
        }
        to_raw(component::<P, _>(this).receive(message))
    })
}
