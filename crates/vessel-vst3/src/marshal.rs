//! Zero-copy views over the host's process data.
//!
//! [`process_view`] turns one native `ProcessData` into a
//! [`vessel_core::ProcessData`] without allocating. Bus records are
//! reinterpreted in place, parameter change lists and event lists are
//! wrapped with the stateless backends below, and the transport is read
//! from the process context. Everything produced here borrows from the
//! native call and must not outlive it.

use std::ffi::c_void;
use std::mem::{align_of, offset_of, size_of};
use std::ptr::{self, NonNull};
use std::slice;

use vessel_core::{
    AudioBusBuffers as CoreAudioBusBuffers, AudioBuses, BusDirection, BusType, DataEvent,
    Event as CoreEvent, EventFlags, EventKind, EventList, EventListBackend,
    FrameRate as CoreFrameRate, LegacyMidiCcOut, MediaType, NoteOff, NoteOn, ParamId, ParamValue,
    ParameterChanges, ParameterChangesBackend, PolyPressure, ProcessData as CoreProcessData,
    ProcessMode, ProcessSetup as CoreProcessSetup, SampleSize, Transport,
};
use vst3::Steinberg::kResultOk;
use vst3::Steinberg::Vst::{
    AudioBusBuffers, BusDirections_, BusTypes_, Event, IEventList, IEventListVtbl,
    IParamValueQueue, IParamValueQueueVtbl, IParameterChanges, IParameterChangesVtbl, MediaTypes_,
    ProcessContext, ProcessData, ProcessModes_, ProcessSetup, SymbolicSampleSizes_,
};

use crate::status::Status;

// =============================================================================
// Layout and Constant Agreement
// =============================================================================

const _: () = {
    assert!(size_of::<CoreAudioBusBuffers>() == size_of::<AudioBusBuffers>());
    assert!(align_of::<CoreAudioBusBuffers>() == align_of::<AudioBusBuffers>());
    assert!(offset_of!(CoreAudioBusBuffers, num_channels) == offset_of!(AudioBusBuffers, numChannels));
    assert!(offset_of!(CoreAudioBusBuffers, silence_flags) == offset_of!(AudioBusBuffers, silenceFlags));
    assert!(offset_of!(CoreAudioBusBuffers, channel_buffers) == offset_of!(AudioBusBuffers, __field0));

    assert!(SampleSize::Float32 as i32 == SymbolicSampleSizes_::kSample32 as i32);
    assert!(SampleSize::Float64 as i32 == SymbolicSampleSizes_::kSample64 as i32);
    assert!(ProcessMode::Realtime as i32 == ProcessModes_::kRealtime as i32);
    assert!(ProcessMode::Prefetch as i32 == ProcessModes_::kPrefetch as i32);
    assert!(ProcessMode::Offline as i32 == ProcessModes_::kOffline as i32);
    assert!(MediaType::Audio as i32 == MediaTypes_::kAudio as i32);
    assert!(MediaType::Event as i32 == MediaTypes_::kEvent as i32);
    assert!(BusDirection::Input as i32 == BusDirections_::kInput as i32);
    assert!(BusDirection::Output as i32 == BusDirections_::kOutput as i32);
    assert!(BusType::Main as i32 == BusTypes_::kMain as i32);
    assert!(BusType::Aux as i32 == BusTypes_::kAux as i32);
};

// Event type ids
const K_NOTE_ON_EVENT: u16 = 0;
const K_NOTE_OFF_EVENT: u16 = 1;
const K_DATA_EVENT: u16 = 2;
const K_POLY_PRESSURE_EVENT: u16 = 3;
const K_LEGACY_MIDI_CC_OUT_EVENT: u16 = 65535;

// =============================================================================
// Setup
// =============================================================================

/// Validate a native `ProcessSetup`.
pub(crate) fn setup_from_native(setup: &ProcessSetup) -> Result<CoreProcessSetup, Status> {
    let mode = ProcessMode::from_raw(setup.processMode).ok_or(Status::InvalidArgument)?;
    let sample_size = SampleSize::from_raw(setup.symbolicSampleSize).ok_or(Status::InvalidArgument)?;
    let max_samples_per_block = usize::try_from(setup.maxSamplesPerBlock).map_err(|_| Status::InvalidArgument)?;
    if !(setup.sampleRate.is_finite() && setup.sampleRate > 0.0) {
        return Err(Status::InvalidArgument);
    }
    Ok(CoreProcessSetup {
        mode,
        sample_size,
        max_samples_per_block,
        sample_rate: setup.sampleRate,
    })
}

// =============================================================================
// Process Data
// =============================================================================

/// Build the domain view of one process call.
///
/// Fails with [`Status::InvalidArgument`] for negative counts, a block
/// larger than the negotiated maximum, a sample width other than the
/// negotiated one, or bus arrays missing while their count is positive.
///
/// # Safety
/// `data` must be the host's process data for the current call, with every
/// pointer in it valid for the call's duration.
pub(crate) unsafe fn process_view<'a>(
    data: &'a ProcessData,
    setup: &CoreProcessSetup,
) -> Result<CoreProcessData<'a>, Status> {
    let num_samples = usize::try_from(data.numSamples).map_err(|_| Status::InvalidArgument)?;
    if data.numInputs < 0 || data.numOutputs < 0 || num_samples > setup.max_samples_per_block {
        return Err(Status::InvalidArgument);
    }
    if (data.numInputs > 0 && data.inputs.is_null()) || (data.numOutputs > 0 && data.outputs.is_null()) {
        return Err(Status::InvalidArgument);
    }
    if SampleSize::from_raw(data.symbolicSampleSize) != Some(setup.sample_size) {
        return Err(Status::InvalidArgument);
    }

    let inputs = AudioBuses::from_raw(
        data.inputs as *mut CoreAudioBusBuffers,
        data.numInputs,
        num_samples,
        setup.sample_size,
    );
    let outputs = AudioBuses::from_raw(
        data.outputs as *mut CoreAudioBusBuffers,
        data.numOutputs,
        num_samples,
        setup.sample_size,
    );

    let mut view = CoreProcessData::new(setup, num_samples, inputs, outputs);
    if let Some(mode) = ProcessMode::from_raw(data.processMode) {
        view.mode = mode;
    }
    view.transport = extract_transport(data.processContext);
    view.input_changes = NonNull::new(data.inputParameterChanges as *mut c_void)
        .map(|list| ParameterChanges::from_raw(&Vst3ParameterChanges, list));
    view.output_changes = NonNull::new(data.outputParameterChanges as *mut c_void)
        .map(|list| ParameterChanges::from_raw(&Vst3ParameterChanges, list));
    view.input_events =
        NonNull::new(data.inputEvents as *mut c_void).map(|list| EventList::from_raw(&Vst3EventList, list));
    view.output_events =
        NonNull::new(data.outputEvents as *mut c_void).map(|list| EventList::from_raw(&Vst3EventList, list));
    Ok(view)
}

// =============================================================================
// Transport Extraction
// =============================================================================

macro_rules! valid_if {
    ($state:expr, $flag:expr, $value:expr) => {
        if $state & $flag != 0 {
            Some($value)
        } else {
            None
        }
    };
}

/// Read the transport from a process context. A null context yields
/// [`Transport::default`].
///
/// # Safety
/// `ctx_ptr` must be null or valid for the duration of the call.
pub(crate) unsafe fn extract_transport(ctx_ptr: *const ProcessContext) -> Transport {
    if ctx_ptr.is_null() {
        return Transport::default();
    }

    let ctx = &*ctx_ptr;
    let state = ctx.state;

    const K_PLAYING: u32 = 1 << 1;
    const K_CYCLE_ACTIVE: u32 = 1 << 2;
    const K_RECORDING: u32 = 1 << 3;
    const K_SYSTEM_TIME_VALID: u32 = 1 << 8;
    const K_PROJECT_TIME_MUSIC_VALID: u32 = 1 << 9;
    const K_TEMPO_VALID: u32 = 1 << 10;
    const K_BAR_POSITION_VALID: u32 = 1 << 11;
    const K_CYCLE_VALID: u32 = 1 << 12;
    const K_TIME_SIG_VALID: u32 = 1 << 13;
    const K_SMPTE_VALID: u32 = 1 << 14;
    const K_CLOCK_VALID: u32 = 1 << 15;
    const K_CONT_TIME_VALID: u32 = 1 << 17;

    Transport {
        tempo: valid_if!(state, K_TEMPO_VALID, ctx.tempo),
        time_sig_numerator: valid_if!(state, K_TIME_SIG_VALID, ctx.timeSigNumerator),
        time_sig_denominator: valid_if!(state, K_TIME_SIG_VALID, ctx.timeSigDenominator),

        project_time_samples: Some(ctx.projectTimeSamples),
        project_time_beats: valid_if!(state, K_PROJECT_TIME_MUSIC_VALID, ctx.projectTimeMusic),
        bar_position_beats: valid_if!(state, K_BAR_POSITION_VALID, ctx.barPositionMusic),

        cycle_start_beats: valid_if!(state, K_CYCLE_VALID, ctx.cycleStartMusic),
        cycle_end_beats: valid_if!(state, K_CYCLE_VALID, ctx.cycleEndMusic),

        is_playing: state & K_PLAYING != 0,
        is_recording: state & K_RECORDING != 0,
        is_cycle_active: state & K_CYCLE_ACTIVE != 0,

        system_time_ns: valid_if!(state, K_SYSTEM_TIME_VALID, ctx.systemTime),
        // sic: the SDK field is spelled "continous"
        continuous_time_samples: valid_if!(state, K_CONT_TIME_VALID, ctx.continousTimeSamples),
        samples_to_next_clock: valid_if!(state, K_CLOCK_VALID, ctx.samplesToNextClock),

        smpte_offset_subframes: valid_if!(state, K_SMPTE_VALID, ctx.smpteOffsetSubframes),
        frame_rate: if state & K_SMPTE_VALID != 0 {
            let is_drop = ctx.frameRate.flags & 1 != 0;
            CoreFrameRate::from_raw(ctx.frameRate.framesPerSecond, is_drop)
        } else {
            None
        },
    }
}

// =============================================================================
// Parameter Changes
// =============================================================================

/// Backend for `IParameterChanges` lists and their `IParamValueQueue`s.
pub(crate) struct Vst3ParameterChanges;

impl Vst3ParameterChanges {
    #[inline]
    unsafe fn list(list: NonNull<c_void>) -> (*mut IParameterChanges, &'static IParameterChangesVtbl) {
        let list = list.as_ptr() as *mut IParameterChanges;
        (list, &*(*list).vtbl)
    }

    #[inline]
    unsafe fn queue(queue: NonNull<c_void>) -> (*mut IParamValueQueue, &'static IParamValueQueueVtbl) {
        let queue = queue.as_ptr() as *mut IParamValueQueue;
        (queue, &*(*queue).vtbl)
    }
}

// SAFETY: handles are only the list and queue pointers handed out by the
// host for the current call, and none are retained.
unsafe impl ParameterChangesBackend for Vst3ParameterChanges {
    unsafe fn queue_count(&self, list: NonNull<c_void>) -> usize {
        let (list, vtbl) = Self::list(list);
        (vtbl.getParameterCount)(list).max(0) as usize
    }

    unsafe fn queue(&self, list: NonNull<c_void>, index: usize) -> Option<NonNull<c_void>> {
        let index = i32::try_from(index).ok()?;
        let (list, vtbl) = Self::list(list);
        NonNull::new((vtbl.getParameterData)(list, index) as *mut c_void)
    }

    unsafe fn add_queue(&self, list: NonNull<c_void>, id: ParamId) -> Option<NonNull<c_void>> {
        let (list, vtbl) = Self::list(list);
        let mut index = 0i32;
        NonNull::new((vtbl.addParameterData)(list, &id, &mut index) as *mut c_void)
    }

    unsafe fn parameter_id(&self, queue: NonNull<c_void>) -> ParamId {
        let (queue, vtbl) = Self::queue(queue);
        (vtbl.getParameterId)(queue)
    }

    unsafe fn point_count(&self, queue: NonNull<c_void>) -> usize {
        let (queue, vtbl) = Self::queue(queue);
        (vtbl.getPointCount)(queue).max(0) as usize
    }

    unsafe fn point(&self, queue: NonNull<c_void>, index: usize) -> Option<(i32, ParamValue)> {
        let index = i32::try_from(index).ok()?;
        let (queue, vtbl) = Self::queue(queue);
        let mut sample_offset = 0i32;
        let mut value = 0.0;
        ((vtbl.getPoint)(queue, index, &mut sample_offset, &mut value) == kResultOk).then_some((sample_offset, value))
    }

    unsafe fn add_point(&self, queue: NonNull<c_void>, sample_offset: i32, value: ParamValue) -> Option<usize> {
        let (queue, vtbl) = Self::queue(queue);
        let mut index = 0i32;
        if (vtbl.addPoint)(queue, sample_offset, value, &mut index) != kResultOk {
            return None;
        }
        usize::try_from(index).ok()
    }
}

// =============================================================================
// Events
// =============================================================================

/// Backend for `IEventList`.
pub(crate) struct Vst3EventList;

impl Vst3EventList {
    #[inline]
    unsafe fn list(list: NonNull<c_void>) -> (*mut IEventList, &'static IEventListVtbl) {
        let list = list.as_ptr() as *mut IEventList;
        (list, &*(*list).vtbl)
    }
}

// SAFETY: as for Vst3ParameterChanges. Data event bytes stay in host memory
// and are only borrowed for the call.
unsafe impl EventListBackend for Vst3EventList {
    unsafe fn event_count(&self, list: NonNull<c_void>) -> usize {
        let (list, vtbl) = Self::list(list);
        (vtbl.getEventCount)(list).max(0) as usize
    }

    unsafe fn event<'a>(&self, list: NonNull<c_void>, index: usize) -> Option<CoreEvent<'a>> {
        let index = i32::try_from(index).ok()?;
        let (list, vtbl) = Self::list(list);
        let mut event: Event = std::mem::zeroed();
        if (vtbl.getEvent)(list, index, &mut event) != kResultOk {
            return None;
        }
        Some(event_from_native(&event))
    }

    unsafe fn add_event(&self, list: NonNull<c_void>, event: &CoreEvent<'_>) -> bool {
        let (list, vtbl) = Self::list(list);
        let mut native = event_to_native(event);
        (vtbl.addEvent)(list, &mut native) == kResultOk
    }
}

/// Convert a native event. Data event payloads are borrowed, not copied.
///
/// # Safety
/// The union member selected by `event.type` must be initialized, and data
/// payloads must stay valid for `'a`.
pub(crate) unsafe fn event_from_native<'a>(event: &Event) -> CoreEvent<'a> {
    let kind = match event.r#type {
        K_NOTE_ON_EVENT => {
            let e = &event.__field0.noteOn;
            EventKind::NoteOn(NoteOn {
                channel: e.channel,
                pitch: e.pitch,
                tuning: e.tuning,
                velocity: e.velocity,
                length: e.length,
                note_id: e.noteId,
            })
        }
        K_NOTE_OFF_EVENT => {
            let e = &event.__field0.noteOff;
            EventKind::NoteOff(NoteOff {
                channel: e.channel,
                pitch: e.pitch,
                velocity: e.velocity,
                note_id: e.noteId,
                tuning: e.tuning,
            })
        }
        K_POLY_PRESSURE_EVENT => {
            let e = &event.__field0.polyPressure;
            EventKind::PolyPressure(PolyPressure {
                channel: e.channel,
                pitch: e.pitch,
                pressure: e.pressure,
                note_id: e.noteId,
            })
        }
        K_DATA_EVENT => {
            let e = &event.__field0.data;
            let bytes: &'a [u8] = if e.bytes.is_null() || e.size == 0 {
                &[]
            } else {
                slice::from_raw_parts(e.bytes, e.size as usize)
            };
            EventKind::Data(DataEvent { kind: e.r#type, bytes })
        }
        K_LEGACY_MIDI_CC_OUT_EVENT => {
            let e = &event.__field0.midiCCOut;
            EventKind::LegacyMidiCcOut(LegacyMidiCcOut {
                control_number: e.controlNumber,
                channel: e.channel,
                value: e.value,
                value2: e.value2,
            })
        }
        type_id => EventKind::Other { type_id },
    };

    CoreEvent {
        bus_index: event.busIndex,
        sample_offset: event.sampleOffset,
        ppq_position: event.ppqPosition,
        flags: EventFlags(event.flags),
        kind,
    }
}

/// Convert a domain event for an output list. `Other` events carry no
/// payload and go out zeroed.
pub(crate) fn event_to_native(event: &CoreEvent<'_>) -> Event {
    // SAFETY: Event is plain data; all-zero is a valid value.
    let mut native: Event = unsafe { std::mem::zeroed() };
    native.busIndex = event.bus_index;
    native.sampleOffset = event.sample_offset;
    native.ppqPosition = event.ppq_position;
    native.flags = event.flags.0;
    native.r#type = event.kind.type_id();

    match &event.kind {
        EventKind::NoteOn(e) => {
            native.__field0.noteOn.channel = e.channel;
            native.__field0.noteOn.pitch = e.pitch;
            native.__field0.noteOn.tuning = e.tuning;
            native.__field0.noteOn.velocity = e.velocity;
            native.__field0.noteOn.length = e.length;
            native.__field0.noteOn.noteId = e.note_id;
        }
        EventKind::NoteOff(e) => {
            native.__field0.noteOff.channel = e.channel;
            native.__field0.noteOff.pitch = e.pitch;
            native.__field0.noteOff.velocity = e.velocity;
            native.__field0.noteOff.noteId = e.note_id;
            native.__field0.noteOff.tuning = e.tuning;
        }
        EventKind::PolyPressure(e) => {
            native.__field0.polyPressure.channel = e.channel;
            native.__field0.polyPressure.pitch = e.pitch;
            native.__field0.polyPressure.pressure = e.pressure;
            native.__field0.polyPressure.noteId = e.note_id;
        }
        EventKind::Data(e) => {
            native.__field0.data.r#type = e.kind;
            native.__field0.data.size = e.bytes.len() as u32;
            native.__field0.data.bytes = if e.bytes.is_empty() { ptr::null() } else { e.bytes.as_ptr() };
        }
        EventKind::LegacyMidiCcOut(e) => {
            native.__field0.midiCCOut.controlNumber = e.control_number;
            native.__field0.midiCCOut.channel = e.channel;
            native.__field0.midiCCOut.value = e.value;
            native.__field0.midiCCOut.value2 = e.value2;
        }
        EventKind::Other { .. } => {}
    }
    native
}
