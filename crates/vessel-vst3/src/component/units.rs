//! `IUnitInfo`: the root unit, the model's units and program lists.

use std::ffi::c_char;
use std::sync::atomic::Ordering;

use vessel_core::{AudioModel, Plugin, PluginError, PluginResult, ProgramList, Unit, UnitId, ROOT_UNIT_ID};
use vst3::Steinberg::Vst::{IUnitInfo, IUnitInfoVtbl, ProgramListInfo, String128, UnitInfo};
use vst3::Steinberg::{kInvalidArgument, kNotImplemented, kResultFalse, kResultOk, tresult, IBStream};

use super::{component, Component};
use crate::object::unknown_vtbl;
use crate::status::{to_tresult, Status};
use crate::strings::copy_wstring;
use crate::thunk::{guard, guard_value, index};

impl<P: Plugin> Component<P> {
    pub(super) const UNIT_INFO: &'static IUnitInfoVtbl = &IUnitInfoVtbl {
        base: unknown_vtbl::<Self>(),
        getUnitCount: get_unit_count::<P>,
        getUnitInfo: get_unit_info::<P>,
        getProgramListCount: get_program_list_count::<P>,
        getProgramListInfo: get_program_list_info::<P>,
        getProgramName: get_program_name::<P>,
        getProgramInfo: get_program_info::<P>,
        hasProgramPitchNames: has_program_pitch_names::<P>,
        getProgramPitchName: get_program_pitch_name::<P>,
        getSelectedUnit: get_selected_unit::<P>,
        selectUnit: select_unit::<P>,
        getUnitByBus: get_unit_by_bus::<P>,
        setUnitProgramData: set_unit_program_data::<P>,
    };

    /// Unit at `index`, the root unit first.
    fn unit(&self, index: usize) -> Option<&Unit> {
        match index {
            0 => Some(&Unit::ROOT),
            i => self.controller.units().get(i - 1),
        }
    }

    fn unit_count(&self) -> usize {
        self.controller.units().len() + 1
    }

    fn program_list(&self, id: i32) -> PluginResult<&ProgramList> {
        self.controller
            .program_lists()
            .iter()
            .find(|list| list.id == id)
            .ok_or(PluginError::UnknownProgramList(id))
    }

    pub fn selected_unit(&self) -> UnitId {
        self.selected_unit.load(Ordering::Relaxed)
    }

    pub(super) fn select_unit(&self, id: UnitId) -> PluginResult<()> {
        let known = id == ROOT_UNIT_ID || self.controller.units().iter().any(|u| u.id == id);
        if !known {
            return Err(PluginError::UnknownUnit(id));
        }
        if self.selected_unit.swap(id, Ordering::Relaxed) == id {
            return Ok(());
        }

        if let Some(handler) = self.handler() {
            match handler.notify_unit_selection(id) {
                Ok(()) => {}
                Err(e) if e.is_unsupported() => {}
                Err(e) => log::debug!("notifyUnitSelection: {e}"),
            }
        }
        Ok(())
    }
}

unsafe extern "system" fn get_unit_count<P: Plugin>(this: *mut IUnitInfo) -> i32 {
    guard_value("getUnitCount", 1, || component::<P, _>(this).unit_count() as i32)
}

unsafe extern "system" fn get_unit_info<P: Plugin>(this: *mut IUnitInfo, unit_index: i32, info: *mut UnitInfo) -> tresult {
    guard("getUnitInfo", || {
        if info.is_null() {
            return kInvalidArgument;
        }
        let Some(unit) = index(unit_index).and_then(|i| component::<P, _>(this).unit(i)) else {
            return kInvalidArgument;
        };

        let info = &mut *info;
        info.id = unit.id;
        info.parentUnitId = unit.parent_id;
        info.programListId = unit.program_list_id;
        copy_wstring(unit.name, &mut info.name);
        kResultOk
    })
}

unsafe extern "system" fn get_program_list_count<P: Plugin>(this: *mut IUnitInfo) -> i32 {
    guard_value("getProgramListCount", 0, || {
        component::<P, _>(this).controller.program_lists().len() as i32
    })
}

unsafe extern "system" fn get_program_list_info<P: Plugin>(
    this: *mut IUnitInfo,
    list_index: i32,
    info: *mut ProgramListInfo,
) -> tresult {
    guard("getProgramListInfo", || {
        if info.is_null() {
            return kInvalidArgument;
        }
        let lists = component::<P, _>(this).controller.program_lists();
        let Some(list) = index(list_index).and_then(|i| lists.get(i)) else {
            return kInvalidArgument;
        };

        let info = &mut *info;
        info.id = list.id;
        info.programCount = list.len() as i32;
        copy_wstring(list.name, &mut info.name);
        kResultOk
    })
}

unsafe extern "system" fn get_program_name<P: Plugin>(
    this: *mut IUnitInfo,
    list_id: i32,
    program_index: i32,
    name: *mut String128,
) -> tresult {
    guard("getProgramName", || {
        if name.is_null() {
            return kInvalidArgument;
        }
        let program = component::<P, _>(this).program_list(list_id).and_then(|list| {
            list.program_name(program_index)
                .ok_or(PluginError::UnknownProgramList(list_id))
        });
        match program {
            Ok(program) => {
                copy_wstring(program, &mut *name);
                kResultOk
            }
            Err(e) => Status::from(&e).to_raw(),
        }
    })
}

// Programs carry no attributes beyond their names.
unsafe extern "system" fn get_program_info<P: Plugin>(
    _this: *mut IUnitInfo,
    _list_id: i32,
    _program_index: i32,
    _attribute_id: *const c_char,
    _attribute_value: *mut String128,
) -> tresult {
    kResultFalse
}

unsafe extern "system" fn has_program_pitch_names<P: Plugin>(
    _this: *mut IUnitInfo,
    _list_id: i32,
    _program_index: i32,
) -> tresult {
    kResultFalse
}

unsafe extern "system" fn get_program_pitch_name<P: Plugin>(
    _this: *mut IUnitInfo,
    _list_id: i32,
    _program_index: i32,
    _midi_pitch: i16,
    _name: *mut String128,
) -> tresult {
    kResultFalse
}

unsafe extern "system" fn get_selected_unit<P: Plugin>(this: *mut IUnitInfo) -> i32 {
    guard_value("getSelectedUnit", ROOT_UNIT_ID, || component::<P, _>(this).selected_unit())
}

unsafe extern "system" fn select_unit<P: Plugin>(this: *mut IUnitInfo, unit_id: i32) -> tresult {
    guard("selectUnit", || to_tresult("selectUnit", component::<P, _>(this).select_unit(unit_id)))
}

// Every bus and channel belongs to the root unit.
unsafe extern "system" fn get_unit_by_bus<P: Plugin>(
    this: *mut IUnitInfo,
    media: i32,
    dir: i32,
    bus_index: i32,
    _channel: i32,
    unit_id: *mut i32,
) -> tresult {
    guard("getUnitByBus", || {
        if unit_id.is_null() {
            return kInvalidArgument;
        }
        if let Err(e) = component::<P, _>(this).bus(media, dir, bus_index) {
            return Status::from(&e).to_raw();
        }
        *unit_id = ROOT_UNIT_ID;
        kResultOk
    })
}

unsafe extern "system" fn set_unit_program_data<P: Plugin>(
    _this: *mut IUnitInfo,
    _list_or_unit_id: i32,
    _program_index: i32,
    _data: *mut IBStream,
) -> tresult {
    kNotImplemented
}
