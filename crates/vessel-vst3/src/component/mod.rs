//! The combined component: one native object acting as audio processor,
//! edit controller and unit info provider.
//!
//! # Models
//!
//! A component keeps two instances of the plugin's [`AudioModel`]. The
//! processor model is read by `process()` and only changes from the
//! block's input parameter queues and from state loads. The controller
//! model answers the host's edit-controller calls and only changes from
//! those calls. Both are loaded from the same bytes in `setState`.
//!
//! # Lifecycle
//!
//! ```text
//! Created --initialize--> Initialized --setActive(true)--> Active
//! Active --setProcessing(true)--> Processing
//! Processing/Active --setActive(false)--> Initialized
//! Initialized/Active/Processing --terminate--> Terminated
//! ```
//!
//! `setupProcessing` must succeed before the first `setActive(true)`.
//! `process()` outside `Processing` answers `kInternalError` and leaves
//! every buffer untouched.
//!
//! # Host access
//!
//! After a successful `initialize` the controller model is connected to
//! the host through [`AudioModel::connect`]; `terminate` disconnects it and
//! releases every host reference the component still holds.

mod audio;
mod controller;
mod host;
mod units;


use std::cell::UnsafeCell;
use std::io::Read;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use vessel_core::{
    AudioModel, BusDirection, BusInfo, Host, MediaType, Plugin, PluginError, PluginResult,
    ProcessSetup, SampleSize, ROOT_UNIT_ID,
};
use vst3::Steinberg::Vst::{
    IAudioProcessor, IComponent, IComponentHandler, IConnectionPoint, IEditController,
    IEditController2, IProcessContextRequirements, IUnitInfo,
};
use vst3::Steinberg::{FUnknown, IBStream, IPluginBase};

use crate::config::Vst3Config;
use crate::handler::{ComponentHandler, RestartFlags};
use crate::object::ComObject;
use crate::ptr::HostPtr;
use crate::registry::{Class, InterfaceEntry};
use crate::session::HostSession;
use self::host::HostLink;
use crate::status::Status;
use crate::stream::NativeStream;

// =============================================================================
// Lifecycle
// =============================================================================

/// Where a component is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Created = 0,
    Initialized = 1,
    Active = 2,
    Processing = 3,
    Terminated = 4,
}

impl Lifecycle {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Initialized,
            2 => Self::Active,
            3 => Self::Processing,
            _ => Self::Terminated,
        }
    }
}

// =============================================================================
// Bus Layout
// =============================================================================

/// The plugin's buses, read once at construction.
struct BusLayout {
    audio_inputs: Vec<BusInfo>,
    audio_outputs: Vec<BusInfo>,
    event_inputs: Vec<BusInfo>,
    event_outputs: Vec<BusInfo>,
}

impl BusLayout {
    fn of<P: Plugin>(plugin: &P) -> Self {
        Self {
            audio_inputs: (0..plugin.audio_input_count())
                .filter_map(|i| plugin.audio_input_info(i))
                .collect(),
            audio_outputs: (0..plugin.audio_output_count())
                .filter_map(|i| plugin.audio_output_info(i))
                .collect(),
            event_inputs: (0..plugin.event_input_count())
                .filter_map(|i| plugin.event_input_info(i))
                .collect(),
            event_outputs: (0..plugin.event_output_count())
                .filter_map(|i| plugin.event_output_info(i))
                .collect(),
        }
    }

    fn buses(&self, media: MediaType, direction: BusDirection) -> &[BusInfo] {
        match (media, direction) {
            (MediaType::Audio, BusDirection::Input) => &self.audio_inputs,
            (MediaType::Audio, BusDirection::Output) => &self.audio_outputs,
            (MediaType::Event, BusDirection::Input) => &self.event_inputs,
            (MediaType::Event, BusDirection::Output) => &self.event_outputs,
        }
    }
}

/// Activation flags per bus, in the same order as [`BusLayout`].
struct BusActivation([Vec<bool>; 4]);

impl BusActivation {
    fn of(layout: &BusLayout) -> Self {
        let defaults = |buses: &[BusInfo]| buses.iter().map(|b| b.is_default_active).collect();
        Self([
            defaults(&layout.audio_inputs),
            defaults(&layout.audio_outputs),
            defaults(&layout.event_inputs),
            defaults(&layout.event_outputs),
        ])
    }

    fn slot(&mut self, media: MediaType, direction: BusDirection, index: usize) -> Option<&mut bool> {
        let list = match (media, direction) {
            (MediaType::Audio, BusDirection::Input) => 0,
            (MediaType::Audio, BusDirection::Output) => 1,
            (MediaType::Event, BusDirection::Input) => 2,
            (MediaType::Event, BusDirection::Output) => 3,
        };
        self.0[list].get_mut(index)
    }
}

// =============================================================================
// Component
// =============================================================================

/// Processing state owned by the audio side.
struct Dsp<P> {
    plugin: P,
    setup: Option<ProcessSetup>,
}

/// The plugin's answers to the processor queries the host may make from
/// any thread. Refreshed whenever the DSP side is known to be idle.
struct ProcessorInfo {
    sample_sizes: [bool; 2],
    latency: AtomicU32,
    tail: AtomicU32,
}

impl ProcessorInfo {
    fn of<P: Plugin>(plugin: &P) -> Self {
        Self {
            sample_sizes: [
                plugin.can_process_sample_size(SampleSize::Float32),
                plugin.can_process_sample_size(SampleSize::Float64),
            ],
            latency: AtomicU32::new(plugin.latency_samples()),
            tail: AtomicU32::new(plugin.tail_samples()),
        }
    }

    fn refresh<P: Plugin>(&self, plugin: &P) {
        self.latency.store(plugin.latency_samples(), Ordering::Relaxed);
        self.tail.store(plugin.tail_samples(), Ordering::Relaxed);
    }

    fn supports(&self, sample_size: SampleSize) -> bool {
        match sample_size {
            SampleSize::Float32 => self.sample_sizes[0],
            SampleSize::Float64 => self.sample_sizes[1],
        }
    }
}

/// A plugin `P` exposed as one native object.
///
/// Construct through [`Component::create`], which returns the object with
/// one reference for the caller.
pub struct Component<P: Plugin> {
    config: &'static Vst3Config,
    lifecycle: AtomicU8,
    selected_unit: AtomicI32,
    knob_mode: AtomicI32,
    layout: BusLayout,
    bus_activation: Mutex<BusActivation>,
    info: ProcessorInfo,
    controller: P::Model,
    processor: P::Model,
    dsp: UnsafeCell<Dsp<P>>,
    host: Arc<HostLink>,
}

// SAFETY: `dsp` is only touched by the host's processing and lifecycle
// calls, which the protocol serializes against each other. Queries the host
// may make from other threads read `info` instead. Everything else is
// atomics, locks or `Sync` models.
unsafe impl<P: Plugin> Sync for Component<P> {}
unsafe impl<P: Plugin> Send for Component<P> {}

impl<P: Plugin> Component<P> {
    pub fn new(config: &'static Vst3Config) -> Self {
        let plugin = P::default();
        let layout = BusLayout::of(&plugin);
        let info = ProcessorInfo::of(&plugin);
        Self {
            config,
            lifecycle: AtomicU8::new(Lifecycle::Created as u8),
            selected_unit: AtomicI32::new(ROOT_UNIT_ID),
            knob_mode: AtomicI32::new(0),
            bus_activation: Mutex::new(BusActivation::of(&layout)),
            layout,
            info,
            controller: P::create_model(),
            processor: P::create_model(),
            dsp: UnsafeCell::new(Dsp { plugin, setup: None }),
            host: Arc::default(),
        }
    }

    /// A new native object holding a fresh component.
    pub fn create(config: &'static Vst3Config) -> crate::object::ComOwned<Self> {
        ComObject::new(Self::new(config))
    }

    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    #[inline]
    fn set_lifecycle(&self, state: Lifecycle) {
        log::trace!("component {:?} -> {state:?}", self.lifecycle());
        self.lifecycle.store(state as u8, Ordering::Release);
    }

    pub fn config(&self) -> &'static Vst3Config {
        self.config
    }

    /// The model behind the edit-controller interfaces.
    pub fn controller_model(&self) -> &P::Model {
        &self.controller
    }

    /// The model `process()` reads.
    pub fn processor_model(&self) -> &P::Model {
        &self.processor
    }

    /// The host's component handler, once the host has set one.
    pub fn handler(&self) -> Option<Arc<ComponentHandler>> {
        self.host.handler()
    }

    /// The host's name, if the component was initialized with a host
    /// application context.
    pub fn host_name(&self) -> Option<String> {
        self.host
            .session()?
            .name()
            .inspect_err(|error| log::debug!("host name unavailable: {error}"))
            .ok()
    }

    /// Run `f` with the host session, if any.
    pub fn with_session<R>(&self, f: impl FnOnce(&HostSession) -> R) -> Option<R> {
        self.host.session().as_deref().map(f)
    }

    /// Latency as of the last time the processor was idle.
    pub fn latency_samples(&self) -> u32 {
        self.info.latency.load(Ordering::Relaxed)
    }

    pub fn tail_samples(&self) -> u32 {
        self.info.tail.load(Ordering::Relaxed)
    }

    pub fn is_bus_active(&self, media: MediaType, direction: BusDirection, index: usize) -> Option<bool> {
        self.bus_activation.lock().slot(media, direction, index).map(|active| *active)
    }

    /// # Safety
    /// Only from the host's processing calls (see the `Sync` impl).
    #[allow(clippy::mut_from_ref)]
    unsafe fn dsp(&self) -> &mut Dsp<P> {
        &mut *self.dsp.get()
    }

    // =========================================================================
    // IPluginBase
    // =========================================================================

    fn initialize(&self, context: *mut FUnknown) -> Result<(), Status> {
        if self.lifecycle() != Lifecycle::Created {
            log::warn!("initialize called in state {:?}", self.lifecycle());
            return Err(Status::Unexpected);
        }

        // SAFETY: the host passes null or a valid context for the call.
        let session = unsafe { HostSession::from_context(context, self.config) };
        if let Some(session) = &session {
            log::debug!("initialized by {:?}", session.name().unwrap_or_default());
        }
        self.host.set_session(session);

        // SAFETY: not processing yet.
        let dsp = unsafe { self.dsp() };
        dsp.plugin.initialize(&self.processor).map_err(|e| {
            log::error!("plugin initialization failed: {e}");
            self.host.set_session(None);
            Status::from(&e)
        })?;
        self.info.refresh(&dsp.plugin);
        self.set_lifecycle(Lifecycle::Initialized);

        let host: Arc<dyn Host> = self.host.clone();
        self.controller.connect(Some(host));
        Ok(())
    }

    fn terminate(&self) -> Result<(), Status> {
        match self.lifecycle() {
            Lifecycle::Terminated => return Ok(()),
            Lifecycle::Created => {}
            state @ (Lifecycle::Active | Lifecycle::Processing) => {
                log::debug!("terminate while {state:?}, deactivating first");
                self.deactivate();
                self.terminate_plugin();
            }
            Lifecycle::Initialized => self.terminate_plugin(),
        }

        self.set_lifecycle(Lifecycle::Terminated);
        self.controller.connect(None);
        if self.host.is_connected() {
            log::debug!("terminate while still connected to a peer");
        }
        self.host.clear();
        Ok(())
    }

    fn terminate_plugin(&self) {
        // SAFETY: processing has stopped.
        unsafe { self.dsp() }.plugin.terminate();
    }

    // =========================================================================
    // Activation
    // =========================================================================

    fn set_active(&self, active: bool) -> Result<(), Status> {
        match (active, self.lifecycle()) {
            (true, Lifecycle::Initialized) => {
                // SAFETY: not processing.
                let dsp = unsafe { self.dsp() };
                if dsp.setup.is_none() {
                    log::warn!("setActive(true) before setupProcessing");
                    return Err(Status::Unexpected);
                }
                dsp.plugin.set_active(true);
                self.info.refresh(&dsp.plugin);
                self.set_lifecycle(Lifecycle::Active);
                Ok(())
            }
            (true, Lifecycle::Active | Lifecycle::Processing) => Ok(()),
            (false, Lifecycle::Active | Lifecycle::Processing) => {
                self.deactivate();
                Ok(())
            }
            (false, Lifecycle::Initialized) => Ok(()),
            (_, state) => {
                log::warn!("setActive({active}) in state {state:?}");
                Err(Status::Unexpected)
            }
        }
    }

    /// Active/Processing -> Initialized.
    fn deactivate(&self) {
        // SAFETY: the host has stopped calling process() before deactivating.
        let dsp = unsafe { self.dsp() };
        if self.lifecycle() == Lifecycle::Processing {
            dsp.plugin.set_processing(false);
        }
        dsp.plugin.set_active(false);
        self.set_lifecycle(Lifecycle::Initialized);
    }

    fn set_processing(&self, processing: bool) -> Result<(), Status> {
        match (processing, self.lifecycle()) {
            (true, Lifecycle::Active) => {
                // SAFETY: the host calls setProcessing outside process().
                unsafe { self.dsp() }.plugin.set_processing(true);
                self.set_lifecycle(Lifecycle::Processing);
                Ok(())
            }
            (true, Lifecycle::Processing) => Ok(()),
            (false, Lifecycle::Processing) => {
                // SAFETY: as above.
                unsafe { self.dsp() }.plugin.set_processing(false);
                self.set_lifecycle(Lifecycle::Active);
                Ok(())
            }
            (false, Lifecycle::Active | Lifecycle::Initialized) => Ok(()),
            (_, state) => {
                log::warn!("setProcessing({processing}) in state {state:?}");
                Err(Status::Unexpected)
            }
        }
    }

    fn setup_processing(&self, setup: ProcessSetup) -> Result<(), Status> {
        if self.lifecycle() != Lifecycle::Initialized {
            log::warn!("setupProcessing in state {:?}", self.lifecycle());
            return Err(Status::Unexpected);
        }
        // SAFETY: not active, so not processing.
        let dsp = unsafe { self.dsp() };
        if !self.info.supports(setup.sample_size) {
            return Err(Status::from(PluginError::UnsupportedSampleSize(setup.sample_size)));
        }
        dsp.plugin.setup_processing(&setup).map_err(|e| Status::from(&e))?;
        self.info.refresh(&dsp.plugin);
        log::debug!(
            "setup: {} Hz, {} samples, {:?}, {:?}",
            setup.sample_rate,
            setup.max_samples_per_block,
            setup.sample_size,
            setup.mode
        );
        dsp.setup = Some(setup);
        Ok(())
    }

    // =========================================================================
    // Buses
    // =========================================================================

    fn bus(&self, media: i32, direction: i32, index: i32) -> PluginResult<(MediaType, BusDirection, &BusInfo)> {
        let invalid = || PluginError::InvalidBus {
            media: MediaType::from_raw(media).unwrap_or(MediaType::Audio),
            direction: BusDirection::from_raw(direction).unwrap_or(BusDirection::Input),
            index,
        };
        let (Some(media), Some(direction)) = (MediaType::from_raw(media), BusDirection::from_raw(direction)) else {
            return Err(invalid());
        };
        let info = crate::thunk::index(index)
            .and_then(|i| self.layout.buses(media, direction).get(i))
            .ok_or_else(invalid)?;
        Ok((media, direction, info))
    }

    fn bus_count(&self, media: i32, direction: i32) -> usize {
        match (MediaType::from_raw(media), BusDirection::from_raw(direction)) {
            (Some(media), Some(direction)) => self.layout.buses(media, direction).len(),
            _ => 0,
        }
    }

    fn activate_bus(&self, media: i32, direction: i32, index: i32, active: bool) -> PluginResult<()> {
        let (media, direction, info) = self.bus(media, direction, index)?;
        log::debug!("bus {:?} {direction:?} {index} ({}) active: {active}", media, info.name);
        if let Some(slot) = self.bus_activation.lock().slot(media, direction, index as usize) {
            *slot = active;
        }
        Ok(())
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Load persisted state into both models.
    fn load_state(&self, stream: *mut IBStream) -> Result<(), Status> {
        // SAFETY: the host passes a stream valid for the call.
        let mut stream = unsafe { NativeStream::from_raw(stream) }.ok_or(Status::InvalidArgument)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).map_err(|e| {
            log::debug!("reading state failed: {e}");
            Status::False
        })?;

        self.processor
            .load(&mut bytes.as_slice())
            .and_then(|()| self.controller.load(&mut bytes.as_slice()))
            .map_err(|e| {
                log::debug!("loading state failed: {e}");
                Status::from(&e)
            })?;

        if let Some(handler) = self.handler() {
            if let Err(error) = handler.restart_component(RestartFlags::PARAM_VALUES_CHANGED) {
                log::debug!("restartComponent after state load: {error}");
            }
        }
        Ok(())
    }

    fn save_state(&self, stream: *mut IBStream) -> Result<(), Status> {
        // SAFETY: the host passes a stream valid for the call.
        let mut stream = unsafe { NativeStream::from_raw(stream) }.ok_or(Status::InvalidArgument)?;
        self.processor.save(&mut stream).map_err(|e| {
            log::debug!("saving state failed: {e}");
            Status::from(&e)
        })
    }

    /// Load the processor's persisted state into the controller model only.
    fn load_component_state(&self, stream: *mut IBStream) -> Result<(), Status> {
        // SAFETY: the host passes a stream valid for the call.
        let mut stream = unsafe { NativeStream::from_raw(stream) }.ok_or(Status::InvalidArgument)?;
        self.controller.load(&mut stream).map_err(|e| Status::from(&e))
    }

    // =========================================================================
    // Component Handler
    // =========================================================================

    fn set_component_handler(&self, handler: *mut IComponentHandler) {
        // SAFETY: the host passes null or a valid handler.
        let handler = unsafe { HostPtr::from_borrowed(handler) }.map(ComponentHandler::new);
        self.host.set_handler(handler);
    }
}

// =============================================================================
// Interfaces
// =============================================================================

/// The component behind an interface pointer.
///
/// # Safety
/// `this` must be an interface pointer handed out by a `Component<P>`.
#[inline]
unsafe fn component<'a, P: Plugin, I>(this: *mut I) -> &'a Component<P> {
    ComObject::<Component<P>>::from_interface(this).value()
}

#[inline]
fn to_raw(result: Result<(), Status>) -> vst3::Steinberg::tresult {
    match result {
        Ok(()) => Status::Ok.to_raw(),
        Err(status) => status.to_raw(),
    }
}

impl<P: Plugin> Class for Component<P> {
    const INTERFACES: &'static [InterfaceEntry] = &[
        InterfaceEntry::new::<IComponent>(Self::COMPONENT),
        InterfaceEntry::base::<IPluginBase, _>(Self::COMPONENT),
        InterfaceEntry::new::<IAudioProcessor>(Self::AUDIO_PROCESSOR),
        InterfaceEntry::new::<IProcessContextRequirements>(Self::CONTEXT_REQUIREMENTS),
        InterfaceEntry::new::<IEditController>(Self::EDIT_CONTROLLER),
        InterfaceEntry::new::<IEditController2>(Self::EDIT_CONTROLLER2),
        InterfaceEntry::new::<IUnitInfo>(Self::UNIT_INFO),
        InterfaceEntry::new::<IConnectionPoint>(Self::CONNECTION_POINT),
    ];
}
