//! Module entry points.

/// Export a plugin from a `cdylib`.
///
/// Generates the platform entry points and `GetPluginFactory`, which hands
/// the host a new [`Factory`](crate::Factory) for `$plugin` with one
/// reference owned by the host.
///
/// # Example
///
/// ```rust,ignore
/// use vessel_core::PluginConfig;
/// use vessel_vst3::{export_vst3, vst3, Vst3Config};
///
/// static CONFIG: PluginConfig = PluginConfig::new("My Plugin").with_vendor("My Company");
/// static VST3_CONFIG: Vst3Config =
///     Vst3Config::new(vst3::uid(0x12345678, 0x9ABCDEF0, 0xABCDEF12, 0x34567890));
///
/// export_vst3!(CONFIG, VST3_CONFIG, MyPlugin);
/// ```
#[macro_export]
macro_rules! export_vst3 {
    ($config:expr, $vst3_config:expr, $plugin:ty) => {
        #[cfg(target_os = "windows")]
        #[no_mangle]
        extern "system" fn InitDll() -> bool {
            true
        }

        #[cfg(target_os = "windows")]
        #[no_mangle]
        extern "system" fn ExitDll() -> bool {
            true
        }

        // Lowercase on macOS.
        #[cfg(target_os = "macos")]
        #[no_mangle]
        extern "system" fn bundleEntry(_bundle_ref: *mut ::std::ffi::c_void) -> bool {
            true
        }

        #[cfg(target_os = "macos")]
        #[no_mangle]
        extern "system" fn bundleExit() -> bool {
            true
        }

        #[cfg(target_os = "linux")]
        #[no_mangle]
        extern "system" fn ModuleEntry(_library_handle: *mut ::std::ffi::c_void) -> bool {
            true
        }

        #[cfg(target_os = "linux")]
        #[no_mangle]
        extern "system" fn ModuleExit() -> bool {
            true
        }

        #[no_mangle]
        extern "system" fn GetPluginFactory() -> *mut ::std::ffi::c_void {
            let factory = $crate::Factory::<$plugin>::new(&$config, &$vst3_config);
            $crate::ComObject::new(factory)
                .into_interface::<$crate::vst3::Steinberg::IPluginFactory>()
                .map_or(::std::ptr::null_mut(), |ptr| ptr.cast())
        }
    };
}
