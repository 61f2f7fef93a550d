//! # vessel-vst3
//!
//! Binary interop bridge between a [`vessel_core::Plugin`] and a VST3 host.
//!
//! Everything that crosses the native boundary lives here:
//!
//! - reference-counted native objects with an interface table ([`ComObject`], [`Class`])
//! - panic-contained entry points (every `extern "system"` thunk)
//! - host callbacks behind probe-once capabilities ([`ComponentHandler`], [`HostSession`]),
//!   handed to the controller model as a [`Host`]
//! - zero-copy views over the host's process block
//! - the plugin factory and the module entry points ([`export_vst3!`])
//!
//! ## Architecture
//!
//! One [`Component`] answers the processor and the controller interfaces,
//! so the host sees a single object:
//!
//! ```text
//! Plugin + AudioModel (vessel-core)
//!        ↓
//! Component<P> (lifecycle, buses, state, parameters, units)
//!        ↓
//! IComponent / IAudioProcessor / IEditController / IUnitInfo / IConnectionPoint
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vessel_core::PluginConfig;
//! use vessel_vst3::{export_vst3, vst3, Vst3Config};
//!
//! static CONFIG: PluginConfig = PluginConfig::new("My Plugin").with_vendor("My Company");
//! static VST3_CONFIG: Vst3Config =
//!     Vst3Config::new(vst3::uid(0x12345678, 0x9ABCDEF0, 0xABCDEF12, 0x34567890));
//!
//! export_vst3!(CONFIG, VST3_CONFIG, MyPlugin);
//! ```

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

pub mod capability;
pub mod component;
pub mod config;
pub mod error;
pub mod export;
pub mod factory;
pub mod handler;
pub mod interner;
pub mod object;
pub mod ptr;
pub mod registry;
pub mod session;
pub mod status;
pub mod stream;
pub mod strings;
pub mod trace;

pub(crate) mod marshal;
pub(crate) mod thunk;

// Re-exports
pub use capability::Capability;
pub use component::{Component, Lifecycle};
pub use config::Vst3Config;
pub use error::HostError;
pub use factory::Factory;
pub use handler::{ComponentHandler, ContextMenu};
pub use interner::Interner;
pub use object::{ComObject, ComOwned};
pub use ptr::HostPtr;
pub use registry::{Class, Guid, InterfaceEntry};
pub use session::{AttributeList, HostSession, IncomingMessage, NativeMessage};
pub use status::Status;
pub use stream::{NativeStream, StreamError};
pub use trace::{install_tracer, Direction, InteropTracer};

// Shared with vessel-core
pub use vessel_core::{EditGuard, Host, Message, MessageReader, PluginConfig, RestartFlags};

// Re-export vst3 crate for use in macros and UIDs
pub use vst3;
