//! `IComponent`, `IAudioProcessor` and `IProcessContextRequirements`.

use vessel_core::{process_block, MediaType, Plugin, SampleSize, SpeakerArrangement as CoreArrangement};
use vst3::Steinberg::Vst::{
    BusInfo, BusInfo_, IAudioProcessor, IAudioProcessorVtbl, IComponent, IComponentVtbl,
    IProcessContextRequirements, IProcessContextRequirementsVtbl, IoMode, ProcessData,
    ProcessSetup, RoutingInfo, SpeakerArrangement,
};
use vst3::Steinberg::{
    kInvalidArgument, kNotImplemented, kResultFalse, kResultOk, kResultTrue, tresult, FUnknown,
    IBStream, IPluginBase, IPluginBaseVtbl, TBool, TUID,
};

use super::{component, to_raw, Component};
use crate::marshal::{process_view, setup_from_native};
use crate::object::unknown_vtbl;
use crate::status::{to_tresult, Status};
use crate::strings::copy_wstring;
use crate::thunk::{guard, guard_value, index};

/// Process context fields the transport view reads.
mod context_flags {
    pub const SYSTEM_TIME: u32 = 1 << 0;
    pub const CONTINUOUS_TIME: u32 = 1 << 1;
    pub const PROJECT_TIME_MUSIC: u32 = 1 << 2;
    pub const BAR_POSITION: u32 = 1 << 3;
    pub const CYCLE: u32 = 1 << 4;
    pub const SAMPLES_TO_NEXT_CLOCK: u32 = 1 << 5;
    pub const TEMPO: u32 = 1 << 6;
    pub const TIME_SIGNATURE: u32 = 1 << 7;
    pub const FRAME_RATE: u32 = 1 << 9;
    pub const TRANSPORT_STATE: u32 = 1 << 10;
}

pub(super) const REQUIRED_CONTEXT: u32 = context_flags::SYSTEM_TIME
    | context_flags::CONTINUOUS_TIME
    | context_flags::PROJECT_TIME_MUSIC
    | context_flags::BAR_POSITION
    | context_flags::CYCLE
    | context_flags::SAMPLES_TO_NEXT_CLOCK
    | context_flags::TEMPO
    | context_flags::TIME_SIGNATURE
    | context_flags::FRAME_RATE
    | context_flags::TRANSPORT_STATE;

impl<P: Plugin> Component<P> {
    pub(super) const COMPONENT: &'static IComponentVtbl = &IComponentVtbl {
        base: IPluginBaseVtbl {
            base: unknown_vtbl::<Self>(),
            initialize: initialize::<P>,
            terminate: terminate::<P>,
        },
        getControllerClassId: get_controller_class_id::<P>,
        setIoMode: set_io_mode::<P>,
        getBusCount: get_bus_count::<P>,
        getBusInfo: get_bus_info::<P>,
        getRoutingInfo: get_routing_info::<P>,
        activateBus: activate_bus::<P>,
        setActive: set_active::<P>,
        setState: set_state::<P>,
        getState: get_state::<P>,
    };

    pub(super) const AUDIO_PROCESSOR: &'static IAudioProcessorVtbl = &IAudioProcessorVtbl {
        base: unknown_vtbl::<Self>(),
        setBusArrangements: set_bus_arrangements::<P>,
        getBusArrangement: get_bus_arrangement::<P>,
        canProcessSampleSize: can_process_sample_size::<P>,
        getLatencySamples: get_latency_samples::<P>,
        setupProcessing: setup_processing::<P>,
        setProcessing: set_processing::<P>,
        process: process::<P>,
        getTailSamples: get_tail_samples::<P>,
    };

    pub(super) const CONTEXT_REQUIREMENTS: &'static IProcessContextRequirementsVtbl =
        &IProcessContextRequirementsVtbl {
            base: unknown_vtbl::<Self>(),
            getProcessContextRequirements: get_process_context_requirements::<P>,
        };
}

// =============================================================================
// IPluginBase
// =============================================================================

pub(super) unsafe extern "system" fn initialize<P: Plugin>(
    this: *mut IPluginBase,
    context: *mut FUnknown,
) -> tresult {
    guard("initialize", || to_raw(component::<P, _>(this).initialize(context)))
}

pub(super) unsafe extern "system" fn terminate<P: Plugin>(this: *mut IPluginBase) -> tresult {
    guard("terminate", || to_raw(component::<P, _>(this).terminate()))
}

// =============================================================================
// IComponent
// =============================================================================

unsafe extern "system" fn get_controller_class_id<P: Plugin>(
    _this: *mut IComponent,
    class_id: *mut TUID,
) -> tresult {
    // Combined component: no separate controller class.
    if class_id.is_null() {
        return kInvalidArgument;
    }
    (*class_id).fill(0);
    kResultFalse
}

unsafe extern "system" fn set_io_mode<P: Plugin>(_this: *mut IComponent, _mode: IoMode) -> tresult {
    kResultOk
}

unsafe extern "system" fn get_bus_count<P: Plugin>(this: *mut IComponent, media: i32, dir: i32) -> i32 {
    guard_value("getBusCount", 0, || {
        component::<P, _>(this).bus_count(media, dir) as i32
    })
}

unsafe extern "system" fn get_bus_info<P: Plugin>(
    this: *mut IComponent,
    media: i32,
    dir: i32,
    index: i32,
    bus: *mut BusInfo,
) -> tresult {
    guard("getBusInfo", || {
        if bus.is_null() {
            return kInvalidArgument;
        }
        let info = match component::<P, _>(this).bus(media, dir, index) {
            Ok((_, _, info)) => info,
            Err(e) => return Status::from(&e).to_raw(),
        };

        let bus = &mut *bus;
        bus.mediaType = media;
        bus.direction = dir;
        bus.channelCount = info.channel_count as i32;
        copy_wstring(info.name, &mut bus.name);
        bus.busType = info.bus_type as i32 as _;
        bus.flags = if info.is_default_active {
            BusInfo_::BusFlags_::kDefaultActive as _
        } else {
            0
        };
        kResultOk
    })
}

unsafe extern "system" fn get_routing_info<P: Plugin>(
    _this: *mut IComponent,
    _in_info: *mut RoutingInfo,
    _out_info: *mut RoutingInfo,
) -> tresult {
    kNotImplemented
}

unsafe extern "system" fn activate_bus<P: Plugin>(
    this: *mut IComponent,
    media: i32,
    dir: i32,
    index: i32,
    state: TBool,
) -> tresult {
    guard("activateBus", || {
        to_tresult("activateBus", component::<P, _>(this).activate_bus(media, dir, index, state != 0))
    })
}

unsafe extern "system" fn set_active<P: Plugin>(this: *mut IComponent, state: TBool) -> tresult {
    guard("setActive", || to_raw(component::<P, _>(this).set_active(state != 0)))
}

unsafe extern "system" fn set_state<P: Plugin>(this: *mut IComponent, state: *mut IBStream) -> tresult {
    guard("IComponent::setState", || to_raw(component::<P, _>(this).load_state(state)))
}

unsafe extern "system" fn get_state<P: Plugin>(this: *mut IComponent, state: *mut IBStream) -> tresult {
    guard("IComponent::getState", || to_raw(component::<P, _>(this).save_state(state)))
}

// =============================================================================
// IAudioProcessor
// =============================================================================

/// Compare the host's proposal against the declared arrangements.
unsafe fn arrangements_match(declared: &[vessel_core::BusInfo], proposed: *const SpeakerArrangement, count: i32) -> bool {
    if index(count) != Some(declared.len()) {
        return false;
    }
    declared
        .iter()
        .enumerate()
        .all(|(i, bus)| bus.arrangement == CoreArrangement(*proposed.add(i)))
}

unsafe extern "system" fn set_bus_arrangements<P: Plugin>(
    this: *mut IAudioProcessor,
    inputs: *mut SpeakerArrangement,
    num_ins: i32,
    outputs: *mut SpeakerArrangement,
    num_outs: i32,
) -> tresult {
    guard("setBusArrangements", || {
        if num_ins < 0 || num_outs < 0 {
            return kInvalidArgument;
        }
        if (num_ins > 0 && inputs.is_null()) || (num_outs > 0 && outputs.is_null()) {
            return kInvalidArgument;
        }

        let layout = &component::<P, _>(this).layout;
        if arrangements_match(&layout.audio_inputs, inputs, num_ins)
            && arrangements_match(&layout.audio_outputs, outputs, num_outs)
        {
            kResultTrue
        } else {
            log::debug!("rejected bus arrangements ({num_ins} in, {num_outs} out)");
            kResultFalse
        }
    })
}

unsafe extern "system" fn get_bus_arrangement<P: Plugin>(
    this: *mut IAudioProcessor,
    dir: i32,
    index: i32,
    arr: *mut SpeakerArrangement,
) -> tresult {
    guard("getBusArrangement", || {
        if arr.is_null() {
            return kInvalidArgument;
        }
        match component::<P, _>(this).bus(MediaType::Audio as i32, dir, index) {
            Ok((_, _, info)) => {
                *arr = info.arrangement.0;
                kResultOk
            }
            Err(e) => Status::from(&e).to_raw(),
        }
    })
}

unsafe extern "system" fn can_process_sample_size<P: Plugin>(
    this: *mut IAudioProcessor,
    symbolic_sample_size: i32,
) -> tresult {
    guard("canProcessSampleSize", || {
        let Some(size) = SampleSize::from_raw(symbolic_sample_size) else {
            return kInvalidArgument;
        };
        Status::from_bool(component::<P, _>(this).info.supports(size)).to_raw()
    })
}

unsafe extern "system" fn get_latency_samples<P: Plugin>(this: *mut IAudioProcessor) -> u32 {
    guard_value("getLatencySamples", 0, || component::<P, _>(this).latency_samples())
}

unsafe extern "system" fn get_tail_samples<P: Plugin>(this: *mut IAudioProcessor) -> u32 {
    guard_value("getTailSamples", 0, || component::<P, _>(this).tail_samples())
}

unsafe extern "system" fn setup_processing<P: Plugin>(
    this: *mut IAudioProcessor,
    setup: *mut ProcessSetup,
) -> tresult {
    guard("setupProcessing", || {
        if setup.is_null() {
            return kInvalidArgument;
        }
        let setup = match setup_from_native(&*setup) {
            Ok(setup) => setup,
            Err(status) => return status.to_raw(),
        };
        to_raw(component::<P, _>(this).setup_processing(setup))
    })
}

unsafe extern "system" fn set_processing<P: Plugin>(this: *mut IAudioProcessor, state: TBool) -> tresult {
    guard("setProcessing", || to_raw(component::<P, _>(this).set_processing(state != 0)))
}

unsafe extern "system" fn process<P: Plugin>(this: *mut IAudioProcessor, data: *mut ProcessData) -> tresult {
    guard("process", || {
        let component = component::<P, _>(this);
        if component.lifecycle() != super::Lifecycle::Processing {
            log::warn!("process() called in state {:?}", component.lifecycle());
            return Status::InternalError.to_raw();
        }
        if data.is_null() {
            return kInvalidArgument;
        }

        // SAFETY: process() is the only caller while Processing.
        let dsp = component.dsp();
        let Some(setup) = dsp.setup else {
            return Status::InternalError.to_raw();
        };
        let mut view = match process_view(&*data, &setup) {
            Ok(view) => view,
            Err(status) => return status.to_raw(),
        };
        process_block(&mut dsp.plugin, &component.processor, &mut view);
        kResultOk
    })
}

// =============================================================================
// IProcessContextRequirements
// =============================================================================

unsafe extern "system" fn get_process_context_requirements<P: Plugin>(
    _this: *mut IProcessContextRequirements,
) -> u32 {
    REQUIRED_CONTEXT
}
