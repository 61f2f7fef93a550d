//! Plugin factory.
//!
//! One native object answers `IPluginFactory`, `IPluginFactory2` and
//! `IPluginFactory3` with a single vtable, since each version extends the
//! previous one. The factory describes one class, the combined component.

use std::ffi::c_void;
use std::marker::PhantomData;

use vessel_core::{Plugin, PluginConfig};
use vst3::Steinberg::{
    kInvalidArgument, kResultOk, tresult, FIDString, FUnknown, IPluginFactory, IPluginFactory2,
    IPluginFactory2Vtbl, IPluginFactory3, IPluginFactory3Vtbl, IPluginFactoryVtbl, PClassInfo,
    PClassInfo2, PClassInfoW, PClassInfo_, PFactoryInfo, PFactoryInfo_, TUID,
};

use crate::component::Component;
use crate::config::Vst3Config;
use crate::object::{unknown_vtbl, ComObject};
use crate::registry::{read_iid, Class, InterfaceEntry};
use crate::strings::{copy_cstring, copy_wstring};
use crate::thunk::guard;

/// SDK version reported in class infos.
const SDK_VERSION: &str = "VST 3.8.0";

/// Factory producing [`Component<P>`] instances.
pub struct Factory<P> {
    config: &'static PluginConfig,
    vst3_config: &'static Vst3Config,
    _marker: PhantomData<fn() -> P>,
}

impl<P: Plugin> Factory<P> {
    pub const fn new(config: &'static PluginConfig, vst3_config: &'static Vst3Config) -> Self {
        Self {
            config,
            vst3_config,
            _marker: PhantomData,
        }
    }

    const VTBL: &'static IPluginFactory3Vtbl = &IPluginFactory3Vtbl {
        base: IPluginFactory2Vtbl {
            base: IPluginFactoryVtbl {
                base: unknown_vtbl::<Self>(),
                getFactoryInfo: get_factory_info::<P>,
                countClasses: count_classes::<P>,
                getClassInfo: get_class_info::<P>,
                createInstance: create_instance::<P>,
            },
            getClassInfo2: get_class_info2::<P>,
        },
        getClassInfoUnicode: get_class_info_unicode::<P>,
        setHostContext: set_host_context::<P>,
    };

    fn is_component(&self, cid: &TUID) -> bool {
        *cid == self.vst3_config.component_uid
    }
}

impl<P: Plugin> Class for Factory<P> {
    const INTERFACES: &'static [InterfaceEntry] = &[
        InterfaceEntry::new::<IPluginFactory3>(Self::VTBL),
        InterfaceEntry::base::<IPluginFactory2, _>(Self::VTBL),
        InterfaceEntry::base::<IPluginFactory, _>(Self::VTBL),
    ];
}

#[inline]
unsafe fn factory<'a, P: Plugin, I>(this: *mut I) -> &'a Factory<P> {
    ComObject::<Factory<P>>::from_interface(this).value()
}

// =============================================================================
// IPluginFactory
// =============================================================================

unsafe extern "system" fn get_factory_info<P: Plugin>(this: *mut IPluginFactory, info: *mut PFactoryInfo) -> tresult {
    guard("getFactoryInfo", || {
        if info.is_null() {
            return kInvalidArgument;
        }
        let config = factory::<P, _>(this).config;
        let info = &mut *info;
        copy_cstring(config.vendor, &mut info.vendor);
        copy_cstring(config.url, &mut info.url);
        copy_cstring(config.email, &mut info.email);
        info.flags = PFactoryInfo_::FactoryFlags_::kUnicode as _;
        kResultOk
    })
}

unsafe extern "system" fn count_classes<P: Plugin>(_this: *mut IPluginFactory) -> i32 {
    1
}

unsafe extern "system" fn get_class_info<P: Plugin>(
    this: *mut IPluginFactory,
    index: i32,
    info: *mut PClassInfo,
) -> tresult {
    guard("getClassInfo", || {
        if info.is_null() || index != 0 {
            return kInvalidArgument;
        }
        let factory = factory::<P, _>(this);
        let info = &mut *info;
        info.cid = factory.vst3_config.component_uid;
        info.cardinality = PClassInfo_::ClassCardinality_::kManyInstances as _;
        copy_cstring(factory.config.category, &mut info.category);
        copy_cstring(factory.config.name, &mut info.name);
        kResultOk
    })
}

unsafe extern "system" fn create_instance<P: Plugin>(
    this: *mut IPluginFactory,
    cid: FIDString,
    iid: FIDString,
    obj: *mut *mut c_void,
) -> tresult {
    guard("createInstance", || {
        if obj.is_null() {
            return kInvalidArgument;
        }
        *obj = std::ptr::null_mut();
        if cid.is_null() || iid.is_null() {
            return kInvalidArgument;
        }

        let factory = factory::<P, _>(this);
        if !factory.is_component(&*(cid as *const TUID)) {
            log::debug!("createInstance: unknown class {:02x?}", read_iid(cid as *const TUID));
            return kInvalidArgument;
        }

        // The owned handle drops its reference once the host holds its own.
        let component = Component::<P>::create(factory.vst3_config);
        component.as_ref().query_interface(iid as *const TUID, obj)
    })
}

// =============================================================================
// IPluginFactory2 / IPluginFactory3
// =============================================================================

unsafe extern "system" fn get_class_info2<P: Plugin>(
    this: *mut IPluginFactory2,
    index: i32,
    info: *mut PClassInfo2,
) -> tresult {
    guard("getClassInfo2", || {
        if info.is_null() || index != 0 {
            return kInvalidArgument;
        }
        let Factory { config, vst3_config, .. } = factory::<P, _>(this);
        let info = &mut *info;
        info.cid = vst3_config.component_uid;
        info.cardinality = PClassInfo_::ClassCardinality_::kManyInstances as _;
        copy_cstring(config.category, &mut info.category);
        copy_cstring(config.name, &mut info.name);
        info.classFlags = 0;
        copy_cstring(config.sub_categories, &mut info.subCategories);
        copy_cstring(config.vendor, &mut info.vendor);
        copy_cstring(config.version, &mut info.version);
        copy_cstring(SDK_VERSION, &mut info.sdkVersion);
        kResultOk
    })
}

unsafe extern "system" fn get_class_info_unicode<P: Plugin>(
    this: *mut IPluginFactory3,
    index: i32,
    info: *mut PClassInfoW,
) -> tresult {
    guard("getClassInfoUnicode", || {
        if info.is_null() || index != 0 {
            return kInvalidArgument;
        }
        let Factory { config, vst3_config, .. } = factory::<P, _>(this);
        let info = &mut *info;
        info.cid = vst3_config.component_uid;
        info.cardinality = PClassInfo_::ClassCardinality_::kManyInstances as _;
        copy_cstring(config.category, &mut info.category);
        copy_wstring(config.name, &mut info.name);
        info.classFlags = 0;
        copy_cstring(config.sub_categories, &mut info.subCategories);
        copy_wstring(config.vendor, &mut info.vendor);
        copy_wstring(config.version, &mut info.version);
        copy_wstring(SDK_VERSION, &mut info.sdkVersion);
        kResultOk
    })
}

unsafe extern "system" fn set_host_context<P: Plugin>(_this: *mut IPluginFactory3, context: *mut FUnknown) -> tresult {
    log::trace!("factory host context: {context:p}");
    kResultOk
}
