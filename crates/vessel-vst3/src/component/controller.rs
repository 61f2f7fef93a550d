//! `IEditController` and `IEditController2`, answered from the controller
//! model.

use std::ffi::{c_char, CStr};
use std::io::{Read, Write};
use std::sync::atomic::Ordering;

use vessel_core::{
    AudioModel, ParamId, ParamValue, Parameter, ParameterFlags, Plugin, PluginError, PluginResult,
    ROOT_UNIT_ID,
};
use vst3::Steinberg::Vst::{
    IComponentHandler, IEditController, IEditController2, IEditController2Vtbl, IEditControllerVtbl,
    KnobMode, ParamID, ParameterInfo, ParameterInfo_, String128, TChar,
};
use vst3::Steinberg::{
    kInvalidArgument, kResultFalse, kResultOk, tresult, IBStream, IPlugView, IPluginBaseVtbl, TBool,
};

use super::audio::{initialize, terminate};
use super::{component, to_raw, Component};
use crate::handler::RestartFlags;
use crate::object::unknown_vtbl;
use crate::status::{to_tresult, Status};
use crate::stream::NativeStream;
use crate::strings::{copy_wstring, wstring_to_string};
use crate::thunk::{guard, guard_value, index};

/// Highest knob mode the protocol defines (linear).
const MAX_KNOB_MODE: KnobMode = 2;

/// Controller state: selected unit, then knob mode, both `i32` LE.
const CONTROLLER_STATE_LEN: usize = 8;

impl<P: Plugin> Component<P> {
    pub(super) const EDIT_CONTROLLER: &'static IEditControllerVtbl = &IEditControllerVtbl {
        base: IPluginBaseVtbl {
            base: unknown_vtbl::<Self>(),
            initialize: initialize::<P>,
            terminate: terminate::<P>,
        },
        setComponentState: set_component_state::<P>,
        setState: set_state::<P>,
        getState: get_state::<P>,
        getParameterCount: get_parameter_count::<P>,
        getParameterInfo: get_parameter_info::<P>,
        getParamStringByValue: get_param_string_by_value::<P>,
        getParamValueByString: get_param_value_by_string::<P>,
        normalizedParamToPlain: normalized_param_to_plain::<P>,
        plainParamToNormalized: plain_param_to_normalized::<P>,
        getParamNormalized: get_param_normalized::<P>,
        setParamNormalized: set_param_normalized::<P>,
        setComponentHandler: set_component_handler::<P>,
        createView: create_view::<P>,
    };

    pub(super) const EDIT_CONTROLLER2: &'static IEditController2Vtbl = &IEditController2Vtbl {
        base: unknown_vtbl::<Self>(),
        setKnobMode: set_knob_mode::<P>,
        openHelp: open_help::<P>,
        openAboutBox: open_about_box::<P>,
    };

    fn parameter(&self, id: ParamId) -> PluginResult<&Parameter> {
        self.controller
            .parameters()
            .by_id(id)
            .ok_or(PluginError::UnknownParameter(id))
    }

    /// Set a controller value. A program-change parameter also applies the
    /// selected program and asks the host to re-read every value.
    fn set_controller_value(&self, id: ParamId, value: ParamValue) -> PluginResult<()> {
        let parameter = self.parameter(id)?;
        let value = parameter.set_normalized(value);
        if !parameter.info().flags.is_program_change {
            return Ok(());
        }

        let Some((list_id, program)) = self.program_for(parameter, value) else {
            return Ok(());
        };
        self.controller.select_program(list_id, program)?;
        if let Some(handler) = self.handler() {
            if let Err(error) = handler.restart_component(RestartFlags::PARAM_VALUES_CHANGED) {
                log::debug!("restartComponent after program change: {error}");
            }
            match handler.notify_program_list_change(list_id, program) {
                Err(error) if !error.is_unsupported() => log::debug!("notifyProgramListChange: {error}"),
                _ => {}
            }
        }
        Ok(())
    }

    /// The program list driven by a program-change parameter and the
    /// program its value selects.
    fn program_for(&self, parameter: &Parameter, value: ParamValue) -> Option<(i32, i32)> {
        let unit = parameter.info().unit_id;
        let list_id = self
            .controller
            .units()
            .iter()
            .find(|u| u.id == unit)
            .map(|u| u.program_list_id)
            .filter(|id| *id != vessel_core::NO_PROGRAM_LIST_ID)
            .or_else(|| self.controller.program_lists().first().map(|l| l.id))?;
        let list = self.controller.program_lists().iter().find(|l| l.id == list_id)?;
        let last = list.len().checked_sub(1)?;
        Some((list_id, (value * last as f64).round() as i32))
    }

    pub fn knob_mode(&self) -> KnobMode {
        self.knob_mode.load(Ordering::Relaxed)
    }

    fn set_knob_mode(&self, mode: KnobMode) -> bool {
        if !(0..=MAX_KNOB_MODE).contains(&mode) {
            return false;
        }
        self.knob_mode.store(mode, Ordering::Relaxed);
        true
    }

    // =========================================================================
    // Controller State
    // =========================================================================

    /// Persist what only the controller knows: the selected unit and the
    /// knob mode. Parameter values travel with the component state.
    fn save_controller_state(&self, stream: *mut IBStream) -> Result<(), Status> {
        // SAFETY: the host passes a stream valid for the call.
        let mut stream = unsafe { NativeStream::from_raw(stream) }.ok_or(Status::InvalidArgument)?;
        let mut bytes = [0u8; CONTROLLER_STATE_LEN];
        bytes[..4].copy_from_slice(&self.selected_unit().to_le_bytes());
        bytes[4..].copy_from_slice(&self.knob_mode().to_le_bytes());
        stream.write_all(&bytes).map_err(|e| {
            log::debug!("saving controller state failed: {e}");
            Status::from(PluginError::State(e))
        })
    }

    /// Restore [`save_controller_state`](Self::save_controller_state).
    /// An empty stream leaves everything as it is; a unit that no longer
    /// exists falls back to the root unit.
    fn load_controller_state(&self, stream: *mut IBStream) -> Result<(), Status> {
        // SAFETY: the host passes a stream valid for the call.
        let mut stream = unsafe { NativeStream::from_raw(stream) }.ok_or(Status::InvalidArgument)?;
        let mut bytes = Vec::with_capacity(CONTROLLER_STATE_LEN);
        Read::take(&mut stream, CONTROLLER_STATE_LEN as u64)
            .read_to_end(&mut bytes)
            .map_err(|e| Status::from(PluginError::State(e)))?;
        match bytes.len() {
            0 => return Ok(()),
            CONTROLLER_STATE_LEN => {}
            len => {
                log::debug!("controller state truncated at {len} bytes");
                return Err(Status::InternalError);
            }
        }

        let unit = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let knob_mode = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if let Err(e) = self.select_unit(unit) {
            log::debug!("restoring selected unit: {e}");
            let _ = self.select_unit(ROOT_UNIT_ID);
        }
        if !self.set_knob_mode(knob_mode) {
            log::debug!("ignoring stored knob mode {knob_mode}");
        }
        Ok(())
    }
}

fn native_flags(flags: &ParameterFlags) -> i32 {
    use ParameterInfo_::ParameterFlags_ as F;

    let mut native = 0;
    for (set, bit) in [
        (flags.can_automate, F::kCanAutomate),
        (flags.is_read_only, F::kIsReadOnly),
        (flags.is_wrap_around, F::kIsWrapAround),
        (flags.is_list, F::kIsList),
        (flags.is_hidden, F::kIsHidden),
        (flags.is_program_change, F::kIsProgramChange),
        (flags.is_bypass, F::kIsBypass),
    ] {
        if set {
            native |= bit as i32;
        }
    }
    native
}

// =============================================================================
// State
// =============================================================================

unsafe extern "system" fn set_component_state<P: Plugin>(this: *mut IEditController, state: *mut IBStream) -> tresult {
    guard("setComponentState", || to_raw(component::<P, _>(this).load_component_state(state)))
}

unsafe extern "system" fn set_state<P: Plugin>(this: *mut IEditController, state: *mut IBStream) -> tresult {
    guard("IEditController::setState", || to_raw(component::<P, _>(this).load_controller_state(state)))
}

unsafe extern "system" fn get_state<P: Plugin>(this: *mut IEditController, state: *mut IBStream) -> tresult {
    guard("IEditController::getState", || to_raw(component::<P, _>(this).save_controller_state(state)))
}

// =============================================================================
// Parameters
// =============================================================================

unsafe extern "system" fn get_parameter_count<P: Plugin>(this: *mut IEditController) -> i32 {
    guard_value("getParameterCount", 0, || {
        component::<P, _>(this).controller.parameters().len() as i32
    })
}

unsafe extern "system" fn get_parameter_info<P: Plugin>(
    this: *mut IEditController,
    param_index: i32,
    info: *mut ParameterInfo,
) -> tresult {
    guard("getParameterInfo", || {
        if info.is_null() {
            return kInvalidArgument;
        }
        let parameters = component::<P, _>(this).controller.parameters();
        let Some(parameter) = index(param_index).and_then(|i| parameters.get(i)) else {
            return kInvalidArgument;
        };

        let source = parameter.info();
        let info = &mut *info;
        info.id = source.id;
        copy_wstring(source.title, &mut info.title);
        copy_wstring(source.short_title, &mut info.shortTitle);
        copy_wstring(source.units, &mut info.units);
        info.stepCount = source.step_count;
        info.defaultNormalizedValue = source.default_normalized;
        info.unitId = source.unit_id;
        info.flags = native_flags(&source.flags);
        kResultOk
    })
}

unsafe extern "system" fn get_param_string_by_value<P: Plugin>(
    this: *mut IEditController,
    id: ParamID,
    value_normalized: f64,
    string: *mut String128,
) -> tresult {
    guard("getParamStringByValue", || {
        if string.is_null() {
            return kInvalidArgument;
        }
        match component::<P, _>(this).parameter(id) {
            Ok(parameter) => {
                copy_wstring(&parameter.format(value_normalized), &mut *string);
                kResultOk
            }
            Err(e) => Status::from(&e).to_raw(),
        }
    })
}

unsafe extern "system" fn get_param_value_by_string<P: Plugin>(
    this: *mut IEditController,
    id: ParamID,
    string: *mut TChar,
    value_normalized: *mut f64,
) -> tresult {
    guard("getParamValueByString", || {
        if value_normalized.is_null() {
            return kInvalidArgument;
        }
        let Some(text) = wstring_to_string(string, 128) else {
            return kInvalidArgument;
        };
        let result = component::<P, _>(this).parameter(id).and_then(|parameter| {
            parameter
                .parse(&text)
                .ok_or(PluginError::InvalidText { id, text })
        });
        match result {
            Ok(value) => {
                *value_normalized = value;
                kResultOk
            }
            Err(e) => Status::from(&e).to_raw(),
        }
    })
}

unsafe extern "system" fn normalized_param_to_plain<P: Plugin>(
    this: *mut IEditController,
    id: ParamID,
    value_normalized: f64,
) -> f64 {
    guard_value("normalizedParamToPlain", value_normalized, || {
        component::<P, _>(this)
            .parameter(id)
            .map_or(value_normalized, |p| p.to_plain(value_normalized))
    })
}

unsafe extern "system" fn plain_param_to_normalized<P: Plugin>(
    this: *mut IEditController,
    id: ParamID,
    plain_value: f64,
) -> f64 {
    guard_value("plainParamToNormalized", 0.0, || {
        component::<P, _>(this)
            .parameter(id)
            .map_or(0.0, |p| p.to_normalized(plain_value))
    })
}

unsafe extern "system" fn get_param_normalized<P: Plugin>(this: *mut IEditController, id: ParamID) -> f64 {
    guard_value("getParamNormalized", 0.0, || {
        component::<P, _>(this).parameter(id).map_or(0.0, |p| p.normalized())
    })
}

unsafe extern "system" fn set_param_normalized<P: Plugin>(
    this: *mut IEditController,
    id: ParamID,
    value: f64,
) -> tresult {
    guard("setParamNormalized", || {
        to_tresult("setParamNormalized", component::<P, _>(this).set_controller_value(id, value))
    })
}

unsafe extern "system" fn set_component_handler<P: Plugin>(
    this: *mut IEditController,
    handler: *mut IComponentHandler,
) -> tresult {
    guard("setComponentHandler", || {
        component::<P, _>(this).set_component_handler(handler);
        kResultOk
    })
}

unsafe extern "system" fn create_view<P: Plugin>(_this: *mut IEditController, name: *const c_char) -> *mut IPlugView {
    if !name.is_null() {
        log::debug!("no view for {:?}", CStr::from_ptr(name).to_string_lossy());
    }
    std::ptr::null_mut()
}

// =============================================================================
// IEditController2
// =============================================================================

unsafe extern "system" fn set_knob_mode<P: Plugin>(this: *mut IEditController2, mode: KnobMode) -> tresult {
    guard("setKnobMode", || Status::from_bool(component::<P, _>(this).set_knob_mode(mode)).to_raw())
}

unsafe extern "system" fn open_help<P: Plugin>(_this: *mut IEditController2, _only_check: TBool) -> tresult {
    kResultFalse
}

unsafe extern "system" fn open_about_box<P: Plugin>(_this: *mut IEditController2, _only_check: TBool) -> tresult {
    kResultFalse
}
