//! # vessel-core
//!
//! Format-agnostic plugin model for the Vessel VST3 bridge.
//!
//! Plugin authors write against this crate only: parameters, buses, units,
//! program lists and the per-block [`ProcessData`] view. The `vessel-vst3`
//! crate maps all of it onto the native object protocol.
//!
//! ## Main Traits
//!
//! - [`Plugin`] - DSP side of a plugin, driven by the host's process callback
//! - [`AudioModel`] - parameters, units and program lists shared by the
//!   controller and the processor
//! - [`Host`] - services the host offers the controller model
//!
//! ## Process views
//!
//! Everything reachable from [`ProcessData`] borrows host memory for the
//! duration of one callback: audio buses ([`AudioBus`], [`AudioBusMut`]),
//! parameter changes ([`ParameterChanges`], [`ParameterValueQueue`]) and
//! events ([`EventList`]). None of them can outlive the callback that
//! produced them.

pub mod buffer;
pub mod bus;
pub mod changes;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod parameter;
pub mod parameters;
pub mod plugin;
pub mod process;
pub mod sample;
pub mod transport;
pub mod types;
pub mod units;

// Re-exports for convenience
pub use buffer::{AudioBus, AudioBusBuffers, AudioBusMut, AudioBuses, SILENCE_THRESHOLD};
pub use bus::{BusDirection, BusInfo, BusType, MediaType, SpeakerArrangement};
pub use changes::{ParameterChanges, ParameterChangesBackend, ParameterValueQueue};
pub use config::PluginConfig;
pub use error::{PluginError, PluginResult};
pub use events::{
    DataEvent, Event, EventFlags, EventKind, EventList, EventListBackend, LegacyMidiCcOut,
    NoteOff, NoteOn, PolyPressure,
};
pub use host::{
    menu_flags, Attribute, EditGuard, Host, HostError, HostSlot, MenuItem, Message, MessageReader,
    ProgressId, ProgressKind, RestartFlags,
};
pub use parameter::{Parameter, ParameterFlags, ParameterInfo, ParameterKind, DEFAULT_PRECISION};
pub use parameters::Parameters;
pub use plugin::{process_block, AudioModel, Plugin};
pub use process::{ProcessData, ProcessMode, ProcessSetup, SampleSize};
pub use sample::Sample;
pub use transport::{FrameRate, Transport};
pub use types::{
    param_id, ParamId, ParamValue, ProgramListId, UnitId, MAX_BUSES, MAX_CHANNELS, NO_PARENT_UNIT_ID,
    NO_PROGRAM_LIST_ID, ROOT_UNIT_ID,
};
pub use units::{ProgramList, Unit};
