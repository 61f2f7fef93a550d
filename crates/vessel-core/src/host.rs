//! Services the host offers the plugin's controller model.
//!
//! A format wrapper hands its controller model an `Arc<dyn Host>` once the
//! component is initialized (see [`AudioModel::connect`]) and takes it back
//! at terminate. Every call is made from the host's UI/control thread,
//! never from `process()`.
//!
//! Most services are optional on the host side. A call the host cannot
//! serve fails with [`HostError::Unsupported`], which plugin code is
//! expected to treat as "skip this feature" rather than as a failure.
//!
//! [`AudioModel::connect`]: crate::AudioModel::connect

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::bus::{BusDirection, MediaType};
use crate::types::{ParamId, ParamValue};

// =============================================================================
// Errors
// =============================================================================

/// Failure of a plugin-to-host call.
///
/// [`HostError::Unsupported`] means the host never offered the interface
/// behind the call. It is expected and recoverable, unlike
/// [`HostError::Failed`] where the host was asked and said no.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The optional host interface backing this call is absent.
    #[error("host does not support {capability}")]
    Unsupported { capability: &'static str },

    /// The host returned a non-success status.
    #[error("{operation} failed with status {status}")]
    Failed { operation: &'static str, status: i32 },

    /// `perform`/`end` without a matching `begin`.
    #[error("no edit is open for parameter {0}")]
    EditNotOpen(ParamId),

    /// `begin` twice for the same parameter.
    #[error("an edit is already open for parameter {0}")]
    EditAlreadyOpen(ParamId),

    /// Text passed to the host contains an interior NUL.
    #[error("text contains an interior NUL byte")]
    InvalidText,

    /// A bounded bridge buffer is full.
    #[error("{0} is exhausted")]
    Exhausted(&'static str),
}

impl HostError {
    #[inline]
    pub const fn unsupported(capability: &'static str) -> Self {
        Self::Unsupported { capability }
    }

    #[inline]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

// =============================================================================
// Flags
// =============================================================================

/// What changed, for [`Host::restart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestartFlags(pub i32);

impl RestartFlags {
    pub const RELOAD_COMPONENT: Self = Self(1 << 0);
    pub const IO_CHANGED: Self = Self(1 << 1);
    pub const PARAM_VALUES_CHANGED: Self = Self(1 << 2);
    pub const LATENCY_CHANGED: Self = Self(1 << 3);
    pub const PARAM_TITLES_CHANGED: Self = Self(1 << 4);
    pub const MIDI_CC_ASSIGNMENT_CHANGED: Self = Self(1 << 5);
    pub const NOTE_EXPRESSION_CHANGED: Self = Self(1 << 6);
    pub const IO_TITLES_CHANGED: Self = Self(1 << 7);
    pub const PREFETCHABLE_SUPPORT_CHANGED: Self = Self(1 << 8);
    pub const ROUTING_INFO_CHANGED: Self = Self(1 << 9);
    pub const KEYSWITCH_CHANGED: Self = Self(1 << 10);
    pub const PARAM_ID_MAPPING_CHANGED: Self = Self(1 << 11);

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for RestartFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// What a progress indicator reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ProgressKind {
    AsyncStateRestoration = 0,
    UiBackgroundTask = 1,
}

/// Host-assigned id of a running progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

/// Context menu item flags, as hosts expect them.
pub mod menu_flags {
    pub const SEPARATOR: i32 = 1 << 0;
    pub const DISABLED: i32 = 1 << 1;
    pub const CHECKED: i32 = 1 << 2;
    pub const GROUP_START: i32 = 1 << 3 | DISABLED;
    pub const GROUP_END: i32 = 1 << 4 | SEPARATOR;
}

/// One entry of a context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem<'a> {
    pub name: &'a str,
    /// Passed to the selection callback when the user picks this item.
    pub tag: i32,
    pub flags: i32,
}

impl<'a> MenuItem<'a> {
    pub const fn new(name: &'a str, tag: i32) -> Self {
        Self { name, tag, flags: 0 }
    }

    pub const fn with_flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }
}

// =============================================================================
// Messages
// =============================================================================

/// One typed message attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
}

/// Read access to a message, whoever stores it.
///
/// Getters answer `None` for a missing key or a value of another type.
pub trait MessageReader {
    fn id(&self) -> &str;
    fn int(&self, key: &str) -> Option<i64>;
    fn float(&self, key: &str) -> Option<f64>;
    fn string(&self, key: &str) -> Option<String>;
    fn binary(&self, key: &str) -> Option<Vec<u8>>;
}

/// An owned message for [`Host::send_message`].
///
/// ```ignore
/// let message = Message::new("meter").with_float("peak", 0.8).with_int("channel", 1);
/// host.send_message(&message)?;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    id: String,
    attributes: BTreeMap<String, Attribute>,
}

impl Message {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Attribute) {
        self.attributes.insert(key.into(), value);
    }

    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.set(key, Attribute::Int(value));
        self
    }

    pub fn with_float(mut self, key: impl Into<String>, value: f64) -> Self {
        self.set(key, Attribute::Float(value));
        self
    }

    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, Attribute::String(value.into()));
        self
    }

    pub fn with_binary(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.set(key, Attribute::Binary(value.into()));
        self
    }

    /// Attributes in key order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl MessageReader for Message {
    fn id(&self) -> &str {
        &self.id
    }

    fn int(&self, key: &str) -> Option<i64> {
        match self.attributes.get(key)? {
            Attribute::Int(value) => Some(*value),
            _ => None,
        }
    }

    fn float(&self, key: &str) -> Option<f64> {
        match self.attributes.get(key)? {
            Attribute::Float(value) => Some(*value),
            _ => None,
        }
    }

    fn string(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Attribute::String(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn binary(&self, key: &str) -> Option<Vec<u8>> {
        match self.attributes.get(key)? {
            Attribute::Binary(value) => Some(value.clone()),
            _ => None,
        }
    }
}

// =============================================================================
// Host
// =============================================================================

/// The host, as the controller model sees it.
///
/// Only the edit transaction and restart calls are required; everything
/// else defaults to [`HostError::Unsupported`].
pub trait Host: Send + Sync {
    /// Open an edit transaction for `id`.
    fn begin_edit(&self, id: ParamId) -> Result<(), HostError>;

    /// Report a new normalized value inside an open transaction.
    fn perform_edit(&self, id: ParamId, value: ParamValue) -> Result<(), HostError>;

    /// Close the transaction opened by [`Host::begin_edit`].
    fn end_edit(&self, id: ParamId) -> Result<(), HostError>;

    /// Ask the host to re-read what `flags` names.
    fn restart(&self, flags: RestartFlags) -> Result<(), HostError>;

    /// Mark the project as modified (or clean).
    fn set_dirty(&self, _dirty: bool) -> Result<(), HostError> {
        Err(HostError::unsupported("dirty state"))
    }

    /// Ask the host to open the named editor view.
    fn request_open_editor(&self, _name: &str) -> Result<(), HostError> {
        Err(HostError::unsupported("editor requests"))
    }

    /// Group the following edits into one undo step.
    fn start_group_edit(&self) -> Result<(), HostError> {
        Err(HostError::unsupported("group edits"))
    }

    fn finish_group_edit(&self) -> Result<(), HostError> {
        Err(HostError::unsupported("group edits"))
    }

    /// Show a host context menu, optionally for parameter `id`, at editor
    /// coordinates `(x, y)`. `on_select` receives the picked item's tag.
    fn popup_context_menu(
        &self,
        _id: Option<ParamId>,
        _items: &[MenuItem<'_>],
        _x: i32,
        _y: i32,
        _on_select: Box<dyn Fn(i32) + Send + Sync>,
    ) -> Result<(), HostError> {
        Err(HostError::unsupported("context menus"))
    }

    fn request_bus_activation(
        &self,
        _media: MediaType,
        _direction: BusDirection,
        _index: i32,
        _active: bool,
    ) -> Result<(), HostError> {
        Err(HostError::unsupported("bus activation requests"))
    }

    fn start_progress(&self, _kind: ProgressKind, _description: &str) -> Result<ProgressId, HostError> {
        Err(HostError::unsupported("progress"))
    }

    fn update_progress(&self, _id: ProgressId, _value: f64) -> Result<(), HostError> {
        Err(HostError::unsupported("progress"))
    }

    fn finish_progress(&self, _id: ProgressId) -> Result<(), HostError> {
        Err(HostError::unsupported("progress"))
    }

    /// Deliver `message` to the connected peer object.
    fn send_message(&self, _message: &Message) -> Result<(), HostError> {
        Err(HostError::unsupported("messaging"))
    }
}

/// Ends its edit transaction on drop.
///
/// ```ignore
/// let edit = EditGuard::begin(&*host, GAIN)?;
/// edit.perform(0.5)?;
/// // endEdit when `edit` goes out of scope
/// ```
pub struct EditGuard<'a> {
    host: &'a dyn Host,
    id: ParamId,
}

impl<'a> EditGuard<'a> {
    /// Open an edit transaction for `id`.
    pub fn begin(host: &'a dyn Host, id: ParamId) -> Result<Self, HostError> {
        host.begin_edit(id)?;
        Ok(Self { host, id })
    }

    #[inline]
    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn perform(&self, value: ParamValue) -> Result<(), HostError> {
        self.host.perform_edit(self.id, value)
    }
}

impl Drop for EditGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.host.end_edit(self.id) {
            log::debug!("endEdit({}) failed: {error}", self.id);
        }
    }
}

/// Holds the host a model was connected to.
#[derive(Default)]
pub struct HostSlot(Mutex<Option<Arc<dyn Host>>>);

impl HostSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held host; `None` disconnects.
    pub fn set(&self, host: Option<Arc<dyn Host>>) {
        *self.0.lock() = host;
    }

    /// The connected host, if any.
    pub fn get(&self) -> Option<Arc<dyn Host>> {
        self.0.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.0.lock().is_some()
    }
}

impl std::fmt::Debug for HostSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HostSlot").field(&self.is_connected()).finish()
    }
}
