//! # Vessel
//!
//! Host a Rust audio plugin behind the VST3 binary interface.
//!
//! `vessel-core` holds the format-agnostic plugin model and `vessel-vst3`
//! exposes it to hosts as one combined component. This crate re-exports
//! both.
//!
//! ## Architecture
//!
//! ```text
//! Your Plugin (implements Plugin + AudioModel)
//!        ↓
//! Component<P> (lifecycle, buses, state, parameters, units)
//!        ↓
//! VST3 interfaces
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vessel::prelude::*;
//!
//! const GAIN: ParamId = 1;
//!
//! pub struct GainModel { parameters: Parameters }
//!
//! impl AudioModel for GainModel {
//!     fn parameters(&self) -> &Parameters { &self.parameters }
//! }
//!
//! #[derive(Default)]
//! pub struct Gain;
//!
//! impl Plugin for Gain {
//!     type Model = GainModel;
//!
//!     fn create_model() -> GainModel { /* ... */ }
//!
//!     fn process(&mut self, model: &GainModel, data: &mut ProcessData) {
//!         let gain = model.parameters().by_id(GAIN).map_or(1.0, |p| p.plain());
//!         data.copy_input_to_output::<f32>(0);
//!         if let Some(mut out) = data.output_mut(0) {
//!             out.apply_gain(gain as f32);
//!         }
//!     }
//! }
//!
//! static CONFIG: PluginConfig = PluginConfig::new("Gain");
//! static VST3_CONFIG: Vst3Config = Vst3Config::new(vst3::uid(1, 2, 3, 4));
//!
//! export_vst3!(CONFIG, VST3_CONFIG, Gain);
//! ```

// Re-export sub-crates
pub use vessel_core as core;
pub use vessel_vst3 as vst3_impl;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use vessel::prelude::*;
/// ```
pub mod prelude {
    // Plugin model
    pub use vessel_core::{
        process_block, AudioModel, Plugin, PluginConfig, PluginError, PluginResult,
        // Buses and buffers
        AudioBus, AudioBusMut, BusInfo, BusType, SpeakerArrangement,
        // Processing
        Event, EventKind, ProcessData, ProcessMode, ProcessSetup, Sample, SampleSize, Transport,
        // Parameters, units and programs
        param_id, ParamId, ParamValue, Parameter, ParameterFlags, Parameters, ProgramList, ProgramListId, Unit,
        UnitId, ROOT_UNIT_ID,
        // Talking to the host
        EditGuard, Host, HostError, HostSlot, Message, MessageReader, RestartFlags,
    };

    // VST3 bridge
    pub use vessel_vst3::{export_vst3, vst3, ComponentHandler, HostSession, Vst3Config};
}
