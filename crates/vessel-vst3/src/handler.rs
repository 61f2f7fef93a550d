//! Plugin-to-host callbacks.
//!
//! [`ComponentHandler`] wraps the host's `IComponentHandler` and probes the
//! optional handler interfaces once, at construction. Methods backed by an
//! absent interface return [`HostError::Unsupported`] without touching the
//! host; every other method forwards exactly one native call.

use std::ffi::CString;

use parking_lot::Mutex;
use vessel_core::{BusDirection, EditGuard, Host, MediaType, MenuItem, ParamId, ParamValue, ProgramListId, UnitId};
use vst3::Steinberg::Vst::{
    IComponentHandler, IComponentHandler2, IComponentHandler2Vtbl, IComponentHandler3,
    IComponentHandler3Vtbl, IComponentHandlerBusActivation, IComponentHandlerBusActivationVtbl,
    IComponentHandlerVtbl, IContextMenu, IContextMenuTarget, IContextMenuTargetVtbl,
    IContextMenuVtbl, IProgress, IProgressVtbl, IUnitHandler, IUnitHandlerVtbl, String128,
};
use vst3::Steinberg::{kResultOk, tresult};

use crate::capability::Capability;
use crate::error::{check, HostError};
use crate::object::{unknown_vtbl, ComObject, ComOwned};
use crate::ptr::HostPtr;
use crate::registry::{Class, InterfaceEntry};
use crate::strings::copy_wstring;
use crate::thunk::guard;

pub use vessel_core::{menu_flags, ProgressId, ProgressKind, RestartFlags};

// =============================================================================
// Component Handler
// =============================================================================

/// The host's component handler plus its optional extensions.
pub struct ComponentHandler {
    handler: HostPtr<IComponentHandler>,
    handler2: Capability<IComponentHandler2>,
    handler3: Capability<IComponentHandler3>,
    bus_activation: Capability<IComponentHandlerBusActivation>,
    progress: Capability<IProgress>,
    unit_handler: Capability<IUnitHandler>,
    open_edits: Mutex<Vec<ParamId>>,
}

impl ComponentHandler {
    /// Wrap `handler`, probing each optional interface once.
    pub fn new(handler: HostPtr<IComponentHandler>) -> Self {
        Self {
            handler2: Capability::probe(&handler, "IComponentHandler2"),
            handler3: Capability::probe(&handler, "IComponentHandler3"),
            bus_activation: Capability::probe(&handler, "IComponentHandlerBusActivation"),
            progress: Capability::probe(&handler, "IProgress"),
            unit_handler: Capability::probe(&handler, "IUnitHandler"),
            handler,
            open_edits: Mutex::new(Vec::new()),
        }
    }

    /// Presence of each optional interface, by name.
    pub fn capabilities(&self) -> [(&'static str, bool); 5] {
        [
            (self.handler2.name(), self.handler2.is_present()),
            (self.handler3.name(), self.handler3.is_present()),
            (self.bus_activation.name(), self.bus_activation.is_present()),
            (self.progress.name(), self.progress.is_present()),
            (self.unit_handler.name(), self.unit_handler.is_present()),
        ]
    }

    #[inline]
    fn vtbl(&self) -> &IComponentHandlerVtbl {
        // SAFETY: the pointer is an IComponentHandler.
        unsafe { self.handler.vtbl() }
    }

    // =========================================================================
    // Edit Transactions
    // =========================================================================

    /// Open an edit transaction for `id`.
    ///
    /// Transactions for different ids may interleave; a second `begin` for
    /// an id that is already open fails with [`HostError::EditAlreadyOpen`].
    pub fn begin_edit(&self, id: ParamId) -> Result<(), HostError> {
        {
            let mut open = self.open_edits.lock();
            if open.contains(&id) {
                return Err(HostError::EditAlreadyOpen(id));
            }
            open.push(id);
        }

        // SAFETY: live handler reference.
        let status = unsafe { (self.vtbl().beginEdit)(self.handler.as_ptr(), id) };
        check("beginEdit", status).inspect_err(|_| {
            self.close(id);
        })
    }

    /// Report a new normalized value inside an open transaction.
    pub fn perform_edit(&self, id: ParamId, value: ParamValue) -> Result<(), HostError> {
        if !self.is_editing(id) {
            return Err(HostError::EditNotOpen(id));
        }
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        // SAFETY: live handler reference.
        let status = unsafe { (self.vtbl().performEdit)(self.handler.as_ptr(), id, value) };
        check("performEdit", status)
    }

    /// Close the transaction for `id`.
    pub fn end_edit(&self, id: ParamId) -> Result<(), HostError> {
        if !self.close(id) {
            return Err(HostError::EditNotOpen(id));
        }
        // SAFETY: live handler reference.
        let status = unsafe { (self.vtbl().endEdit)(self.handler.as_ptr(), id) };
        check("endEdit", status)
    }

    /// Open a transaction that ends when the guard is dropped.
    pub fn edit(&self, id: ParamId) -> Result<EditGuard<'_>, HostError> {
        EditGuard::begin(self, id)
    }

    pub fn is_editing(&self, id: ParamId) -> bool {
        self.open_edits.lock().contains(&id)
    }

    fn close(&self, id: ParamId) -> bool {
        let mut open = self.open_edits.lock();
        match open.iter().position(|open_id| *open_id == id) {
            Some(index) => {
                open.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn restart_component(&self, flags: RestartFlags) -> Result<(), HostError> {
        // SAFETY: live handler reference.
        let status = unsafe { (self.vtbl().restartComponent)(self.handler.as_ptr(), flags.0) };
        check("restartComponent", status)
    }

    // =========================================================================
    // IComponentHandler2
    // =========================================================================

    pub fn set_dirty(&self, dirty: bool) -> Result<(), HostError> {
        let handler2 = self.handler2.get()?;
        // SAFETY: present capability, live reference.
        let status = unsafe {
            (handler2.vtbl::<IComponentHandler2Vtbl>().setDirty)(handler2.as_ptr(), dirty as u8)
        };
        check("setDirty", status)
    }

    /// Ask the host to open the editor view `name` (usually `"editor"`).
    pub fn request_open_editor(&self, name: &str) -> Result<(), HostError> {
        let handler2 = self.handler2.get()?;
        let name = CString::new(name).map_err(|_| HostError::InvalidText)?;
        // SAFETY: present capability; `name` outlives the call.
        let status = unsafe {
            (handler2.vtbl::<IComponentHandler2Vtbl>().requestOpenEditor)(
                handler2.as_ptr(),
                name.as_ptr(),
            )
        };
        check("requestOpenEditor", status)
    }

    pub fn start_group_edit(&self) -> Result<(), HostError> {
        let handler2 = self.handler2.get()?;
        // SAFETY: present capability, live reference.
        let status = unsafe {
            (handler2.vtbl::<IComponentHandler2Vtbl>().startGroupEdit)(handler2.as_ptr())
        };
        check("startGroupEdit", status)
    }

    pub fn finish_group_edit(&self) -> Result<(), HostError> {
        let handler2 = self.handler2.get()?;
        // SAFETY: present capability, live reference.
        let status = unsafe {
            (handler2.vtbl::<IComponentHandler2Vtbl>().finishGroupEdit)(handler2.as_ptr())
        };
        check("finishGroupEdit", status)
    }

    // =========================================================================
    // IComponentHandler3
    // =========================================================================

    /// Create a host context menu, optionally for parameter `id`.
    ///
    /// `on_select` receives the tag of the item the user picks.
    pub fn create_context_menu(
        &self,
        id: Option<ParamId>,
        on_select: impl Fn(i32) + Send + Sync + 'static,
    ) -> Result<ContextMenu, HostError> {
        let handler3 = self.handler3.get()?;
        let id_ptr = id.as_ref().map_or(std::ptr::null(), |id| id as *const ParamId);
        // SAFETY: present capability; the view may be null for menus not
        // attached to an editor.
        let menu = unsafe {
            (handler3.vtbl::<IComponentHandler3Vtbl>().createContextMenu)(
                handler3.as_ptr(),
                std::ptr::null_mut(),
                id_ptr,
            )
        };
        // SAFETY: the host returns a new reference or null.
        let menu = unsafe { HostPtr::from_raw(menu) }.ok_or(HostError::Failed {
            operation: "createContextMenu",
            status: crate::Status::False.to_raw(),
        })?;
        Ok(ContextMenu {
            menu,
            target: ComObject::new(MenuTarget {
                on_select: Box::new(on_select),
            }),
        })
    }

    // =========================================================================
    // Bus Activation, Progress, Units
    // =========================================================================

    pub fn request_bus_activation(
        &self,
        media: MediaType,
        direction: BusDirection,
        index: i32,
        active: bool,
    ) -> Result<(), HostError> {
        let bus_activation = self.bus_activation.get()?;
        // SAFETY: present capability, live reference.
        let status = unsafe {
            (bus_activation.vtbl::<IComponentHandlerBusActivationVtbl>().requestBusActivation)(
                bus_activation.as_ptr(),
                media as i32 as _,
                direction as i32 as _,
                index,
                active as u8,
            )
        };
        check("requestBusActivation", status)
    }

    pub fn start_progress(&self, kind: ProgressKind, description: &str) -> Result<ProgressId, HostError> {
        let progress = self.progress.get()?;
        let mut text: String128 = [0; 128];
        copy_wstring(description, &mut text);
        let mut id = 0u64;
        // SAFETY: present capability; `text` and `id` outlive the call.
        let status = unsafe {
            (progress.vtbl::<IProgressVtbl>().start)(
                progress.as_ptr(),
                kind as u32 as _,
                text.as_ptr() as _,
                &mut id as *mut u64 as _,
            )
        };
        check("IProgress::start", status).map(|()| ProgressId(id))
    }

    pub fn update_progress(&self, id: ProgressId, value: f64) -> Result<(), HostError> {
        let progress = self.progress.get()?;
        // SAFETY: present capability, live reference.
        let status = unsafe {
            (progress.vtbl::<IProgressVtbl>().update)(progress.as_ptr(), id.0 as _, value.clamp(0.0, 1.0))
        };
        check("IProgress::update", status)
    }

    pub fn finish_progress(&self, id: ProgressId) -> Result<(), HostError> {
        let progress = self.progress.get()?;
        // SAFETY: present capability, live reference.
        let status =
            unsafe { (progress.vtbl::<IProgressVtbl>().finish)(progress.as_ptr(), id.0 as _) };
        check("IProgress::finish", status)
    }

    pub fn notify_unit_selection(&self, unit: UnitId) -> Result<(), HostError> {
        let unit_handler = self.unit_handler.get()?;
        // SAFETY: present capability, live reference.
        let status = unsafe {
            (unit_handler.vtbl::<IUnitHandlerVtbl>().notifyUnitSelection)(unit_handler.as_ptr(), unit)
        };
        check("notifyUnitSelection", status)
    }

    pub fn notify_program_list_change(&self, list: ProgramListId, program_index: i32) -> Result<(), HostError> {
        let unit_handler = self.unit_handler.get()?;
        // SAFETY: present capability, live reference.
        let status = unsafe {
            (unit_handler.vtbl::<IUnitHandlerVtbl>().notifyProgramListChange)(
                unit_handler.as_ptr(),
                list,
                program_index,
            )
        };
        check("notifyProgramListChange", status)
    }
}

impl Drop for ComponentHandler {
    fn drop(&mut self) {
        let open = self.open_edits.get_mut();
        if !open.is_empty() {
            log::warn!("component handler dropped with open edits: {open:?}");
        }
    }
}

// Inherent methods take precedence, so each call below forwards to the
// native one of the same name.
impl Host for ComponentHandler {
    fn begin_edit(&self, id: ParamId) -> Result<(), HostError> {
        self.begin_edit(id)
    }

    fn perform_edit(&self, id: ParamId, value: ParamValue) -> Result<(), HostError> {
        self.perform_edit(id, value)
    }

    fn end_edit(&self, id: ParamId) -> Result<(), HostError> {
        self.end_edit(id)
    }

    fn restart(&self, flags: RestartFlags) -> Result<(), HostError> {
        self.restart_component(flags)
    }

    fn set_dirty(&self, dirty: bool) -> Result<(), HostError> {
        self.set_dirty(dirty)
    }

    fn request_open_editor(&self, name: &str) -> Result<(), HostError> {
        self.request_open_editor(name)
    }

    fn start_group_edit(&self) -> Result<(), HostError> {
        self.start_group_edit()
    }

    fn finish_group_edit(&self) -> Result<(), HostError> {
        self.finish_group_edit()
    }

    fn popup_context_menu(
        &self,
        id: Option<ParamId>,
        items: &[MenuItem<'_>],
        x: i32,
        y: i32,
        on_select: Box<dyn Fn(i32) + Send + Sync>,
    ) -> Result<(), HostError> {
        let menu = self.create_context_menu(id, on_select)?;
        for item in items {
            menu.add_item(item.name, item.tag, item.flags)?;
        }
        menu.popup(x, y)
    }

    fn request_bus_activation(
        &self,
        media: MediaType,
        direction: BusDirection,
        index: i32,
        active: bool,
    ) -> Result<(), HostError> {
        self.request_bus_activation(media, direction, index, active)
    }

    fn start_progress(&self, kind: ProgressKind, description: &str) -> Result<ProgressId, HostError> {
        self.start_progress(kind, description)
    }

    fn update_progress(&self, id: ProgressId, value: f64) -> Result<(), HostError> {
        self.update_progress(id, value)
    }

    fn finish_progress(&self, id: ProgressId) -> Result<(), HostError> {
        self.finish_progress(id)
    }
}

// =============================================================================
// Context Menu
// =============================================================================

#[repr(C)]
struct NativeMenuItem {
    name: String128,
    tag: i32,
    flags: i32,
}

/// A host context menu with one target receiving every selection.
pub struct ContextMenu {
    menu: HostPtr<IContextMenu>,
    target: ComOwned<MenuTarget>,
}

impl ContextMenu {
    #[inline]
    fn vtbl(&self) -> &IContextMenuVtbl {
        // SAFETY: the pointer is an IContextMenu.
        unsafe { self.menu.vtbl() }
    }

    pub fn item_count(&self) -> i32 {
        // SAFETY: live menu reference.
        unsafe { (self.vtbl().getItemCount)(self.menu.as_ptr()) }
    }

    /// Append an item. Selecting it calls the menu's callback with `tag`.
    pub fn add_item(&self, name: &str, tag: i32, flags: i32) -> Result<(), HostError> {
        let mut item = NativeMenuItem {
            name: [0; 128],
            tag,
            flags,
        };
        copy_wstring(name, &mut item.name);
        let target = self
            .target
            .as_ref()
            .as_ptr::<IContextMenuTarget>()
            .ok_or(HostError::Exhausted("context menu target"))?;
        // SAFETY: `item` matches the host's item layout and outlives the
        // call; the host adds its own reference to `target` if it keeps it.
        let status = unsafe { add_item(self.vtbl().addItem, self.menu.as_ptr(), &item, target) };
        check("IContextMenu::addItem", status)
    }

    /// Show the menu at editor coordinates.
    pub fn popup(&self, x: i32, y: i32) -> Result<(), HostError> {
        // SAFETY: live menu reference.
        let status = unsafe { (self.vtbl().popup)(self.menu.as_ptr(), x, y) };
        check("IContextMenu::popup", status)
    }
}

/// Call `addItem` with our own item struct, whatever the binding names the
/// item type.
unsafe fn add_item<T>(
    add: unsafe extern "system" fn(*mut IContextMenu, *const T, *mut IContextMenuTarget) -> tresult,
    menu: *mut IContextMenu,
    item: &NativeMenuItem,
    target: *mut IContextMenuTarget,
) -> tresult {
    add(menu, item as *const NativeMenuItem as *const T, target)
}

struct MenuTarget {
    on_select: Box<dyn Fn(i32) + Send + Sync>,
}

impl MenuTarget {
    const VTBL: &'static IContextMenuTargetVtbl = &IContextMenuTargetVtbl {
        base: unknown_vtbl::<MenuTarget>(),
        executeMenuItem: execute_menu_item,
    };
}

impl Class for MenuTarget {
    const INTERFACES: &'static [InterfaceEntry] =
        &[InterfaceEntry::new::<IContextMenuTarget>(Self::VTBL)];
}

unsafe extern "system" fn execute_menu_item(this: *mut IContextMenuTarget, tag: i32) -> tresult {
    guard("executeMenuItem", || {
        let target = ComObject::<MenuTarget>::from_interface(this).value();
        (target.on_select)(tag);
        kResultOk
    })
}

const _: () = assert!(std::mem::size_of::<NativeMenuItem>() == 128 * 2 + 8);

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    use vst3::Steinberg::Vst::ParamID;
    use vst3::Steinberg::{kResultFalse, TBool};

    use super::*;
    use crate::ptr::test_support::*;

    // =========================================================================
    // Host doubles
    // =========================================================================

    unsafe extern "system" fn begin_edit(this: *mut IComponentHandler, id: ParamID) -> tresult {
        record(this, format!("beginEdit({id})"));
        kResultOk
    }

    unsafe extern "system" fn perform_edit(this: *mut IComponentHandler, id: ParamID, value: f64) -> tresult {
        record(this, format!("performEdit({id}, {value})"));
        kResultOk
    }

    unsafe extern "system" fn end_edit(this: *mut IComponentHandler, id: ParamID) -> tresult {
        record(this, format!("endEdit({id})"));
        kResultOk
    }

    unsafe extern "system" fn restart(this: *mut IComponentHandler, flags: i32) -> tresult {
        record(this, format!("restartComponent({flags})"));
        kResultOk
    }

    static HANDLER: IComponentHandlerVtbl = IComponentHandlerVtbl {
        base: UNKNOWN,
        beginEdit: begin_edit,
        performEdit: perform_edit,
        endEdit: end_edit,
        restartComponent: restart,
    };

    unsafe extern "system" fn set_dirty(this: *mut IComponentHandler2, state: TBool) -> tresult {
        record(this, format!("setDirty({state})"));
        kResultOk
    }

    unsafe extern "system" fn request_open_editor(
        this: *mut IComponentHandler2,
        name: *const std::ffi::c_char,
    ) -> tresult {
        let name = std::ffi::CStr::from_ptr(name).to_string_lossy();
        record(this, format!("requestOpenEditor({name})"));
        kResultOk
    }

    unsafe extern "system" fn start_group(this: *mut IComponentHandler2) -> tresult {
        record(this, "startGroupEdit".into());
        kResultOk
    }

    unsafe extern "system" fn finish_group(this: *mut IComponentHandler2) -> tresult {
        record(this, "finishGroupEdit".into());
        kResultFalse
    }

    static HANDLER2: IComponentHandler2Vtbl = IComponentHandler2Vtbl {
        base: UNKNOWN,
        setDirty: set_dirty,
        requestOpenEditor: request_open_editor,
        startGroupEdit: start_group,
        finishGroupEdit: finish_group,
    };

    unsafe extern "system" fn notify_unit(this: *mut IUnitHandler, unit: i32) -> tresult {
        record(this, format!("notifyUnitSelection({unit})"));
        kResultOk
    }

    unsafe extern "system" fn notify_list(this: *mut IUnitHandler, list: i32, index: i32) -> tresult {
        record(this, format!("notifyProgramListChange({list}, {index})"));
        kResultOk
    }

    static UNIT_HANDLER: IUnitHandlerVtbl = IUnitHandlerVtbl {
        base: UNKNOWN,
        notifyUnitSelection: notify_unit,
        notifyProgramListChange: notify_list,
    };

    fn host(extensions: bool) -> Box<FakeHost> {
        let host = FakeHost::new().with::<IComponentHandler, _>(&HANDLER);
        if extensions {
            host.with::<IComponentHandler2, _>(&HANDLER2)
                .with::<IUnitHandler, _>(&UNIT_HANDLER)
        } else {
            host
        }
    }

    fn handler(host: &FakeHost) -> ComponentHandler {
        let ptr = unsafe { HostPtr::from_borrowed(host.as_ptr::<IComponentHandler>()) }.unwrap();
        ComponentHandler::new(ptr)
    }

    // =========================================================================
    // Tests
    // =========================================================================

    #[test]
    fn test_probes_each_capability_once() {
        let host = host(true);
        let handler = handler(&host);
        assert_eq!(host.queries.get(), 5);

        let present: Vec<_> = handler
            .capabilities()
            .iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(present, ["IComponentHandler2", "IUnitHandler"]);

        handler.set_dirty(true).unwrap();
        handler.notify_unit_selection(2).unwrap();
        let _ = handler.start_progress(ProgressKind::UiBackgroundTask, "x");
        assert_eq!(host.queries.get(), 5);
    }

    #[test]
    fn test_present_capabilities_forward_one_call_each() {
        let host = host(true);
        let handler = handler(&host);

        handler.set_dirty(true).unwrap();
        handler.request_open_editor("editor").unwrap();
        handler.start_group_edit().unwrap();
        handler.notify_program_list_change(7, 3).unwrap();

        assert_eq!(
            host.calls(),
            [
                "setDirty(1)",
                "requestOpenEditor(editor)",
                "startGroupEdit",
                "notifyProgramListChange(7, 3)"
            ]
        );
    }

    #[test]
    fn test_absent_capabilities_are_unsupported() {
        let host = host(false);
        let handler = handler(&host);

        let errors = [
            handler.set_dirty(true).unwrap_err(),
            handler.start_group_edit().unwrap_err(),
            handler.create_context_menu(Some(1), |_| {}).err().unwrap(),
            handler
                .request_bus_activation(MediaType::Audio, BusDirection::Input, 1, true)
                .unwrap_err(),
            handler.start_progress(ProgressKind::AsyncStateRestoration, "").unwrap_err(),
            handler.update_progress(ProgressId(1), 0.5).unwrap_err(),
            handler.finish_progress(ProgressId(1)).unwrap_err(),
            handler.notify_unit_selection(0).unwrap_err(),
        ];
        assert!(errors.iter().all(HostError::is_unsupported));
        assert_eq!(
            errors[0],
            HostError::Unsupported {
                capability: "IComponentHandler2"
            }
        );
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_host_failure_is_not_unsupported() {
        let host = host(true);
        let handler = handler(&host);
        let error = handler.finish_group_edit().unwrap_err();
        assert!(!error.is_unsupported());
        assert_eq!(
            error,
            HostError::Failed {
                operation: "finishGroupEdit",
                status: kResultFalse
            }
        );
    }

    #[test]
    fn test_edit_transactions_interleave() {
        let host = host(false);
        let handler = handler(&host);

        handler.begin_edit(1).unwrap();
        handler.begin_edit(2).unwrap();
        handler.perform_edit(1, 0.25).unwrap();
        handler.perform_edit(2, 1.5).unwrap();
        handler.end_edit(1).unwrap();
        handler.end_edit(2).unwrap();

        assert_eq!(
            host.calls(),
            [
                "beginEdit(1)",
                "beginEdit(2)",
                "performEdit(1, 0.25)",
                "performEdit(2, 1)",
                "endEdit(1)",
                "endEdit(2)"
            ]
        );
    }

    #[test]
    fn test_edit_misuse() {
        let host = host(false);
        let handler = handler(&host);

        assert_eq!(handler.perform_edit(4, 0.5), Err(HostError::EditNotOpen(4)));
        assert_eq!(handler.end_edit(4), Err(HostError::EditNotOpen(4)));
        handler.begin_edit(4).unwrap();
        assert_eq!(handler.begin_edit(4), Err(HostError::EditAlreadyOpen(4)));
        handler.end_edit(4).unwrap();
        assert_eq!(host.calls(), ["beginEdit(4)", "endEdit(4)"]);
    }

    #[test]
    fn test_edit_guard() {
        let host = host(false);
        let handler = handler(&host);
        {
            let edit = handler.edit(9).unwrap();
            edit.perform(0.5).unwrap();
            assert!(handler.is_editing(9));
        }
        assert!(!handler.is_editing(9));
        assert_eq!(host.calls(), ["beginEdit(9)", "performEdit(9, 0.5)", "endEdit(9)"]);
    }

    #[test]
    fn test_restart_flags() {
        let host = host(false);
        let handler = handler(&host);
        let flags = RestartFlags::PARAM_VALUES_CHANGED | RestartFlags::LATENCY_CHANGED;
        assert!(flags.contains(RestartFlags::LATENCY_CHANGED));
        handler.restart_component(flags).unwrap();
        assert_eq!(host.calls(), ["restartComponent(12)"]);
    }

    #[test]
    fn test_handler_references_released() {
        let host = host(true);
        drop(handler(&host));
        assert_eq!(host.refs.get(), 1);
    }

    // =========================================================================
    // Context menu
    // =========================================================================

    unsafe extern "system" fn item_count(this: *mut IContextMenu) -> i32 {
        fake(this).calls.borrow().len() as i32
    }

    // The item parameters are generic so the doubles fit the binding's
    // signatures whatever it calls the item type.

    unsafe extern "system" fn get_item<T>(
        _this: *mut IContextMenu,
        _index: i32,
        _item: *mut T,
        _target: *mut *mut IContextMenuTarget,
    ) -> tresult {
        kResultFalse
    }

    unsafe extern "system" fn add_item_double<T>(
        this: *mut IContextMenu,
        item: *const T,
        target: *mut IContextMenuTarget,
    ) -> tresult {
        let item = &*(item as *const NativeMenuItem);
        let name = crate::strings::read_wstring(&item.name);
        record(this, format!("addItem({name}, {})", item.tag));
        // select the item right away
        let vtbl = &**(target as *const *const IContextMenuTargetVtbl);
        (vtbl.executeMenuItem)(target, item.tag)
    }

    unsafe extern "system" fn remove_item<T>(
        _this: *mut IContextMenu,
        _item: *const T,
        _target: *mut IContextMenuTarget,
    ) -> tresult {
        kResultOk
    }

    unsafe extern "system" fn popup(this: *mut IContextMenu, x: i32, y: i32) -> tresult {
        record(this, format!("popup({x}, {y})"));
        kResultOk
    }

    static MENU: IContextMenuVtbl = IContextMenuVtbl {
        base: UNKNOWN,
        getItemCount: item_count,
        getItem: get_item,
        addItem: add_item_double,
        removeItem: remove_item,
        popup,
    };

    unsafe extern "system" fn create_context_menu<V>(
        this: *mut IComponentHandler3,
        _view: *mut V,
        id: *const ParamID,
    ) -> *mut IContextMenu {
        record(this, format!("createContextMenu({})", *id));
        fake(this).hand_out::<IContextMenu>()
    }

    static HANDLER3: IComponentHandler3Vtbl = IComponentHandler3Vtbl {
        base: UNKNOWN,
        createContextMenu: create_context_menu,
    };

    #[test]
    fn test_context_menu() {
        let menu_host = FakeHost::new().with::<IContextMenu, _>(&MENU);
        let host = FakeHost::new()
            .with::<IComponentHandler, _>(&HANDLER)
            .with::<IComponentHandler3, _>(&HANDLER3)
            .with_child(&menu_host);
        let handler = handler(&host);

        let selected = Arc::new(AtomicI32::new(-1));
        let sink = selected.clone();
        let menu = handler
            .create_context_menu(Some(5), move |tag| sink.store(tag, Ordering::SeqCst))
            .unwrap();
        assert_eq!(host.calls(), ["createContextMenu(5)"]);

        menu.add_item("Reset", 42, 0).unwrap();
        assert_eq!(selected.load(Ordering::SeqCst), 42);
        assert_eq!(menu.item_count(), 1);
        menu.popup(10, 20).unwrap();
        assert_eq!(menu_host.calls(), ["addItem(Reset, 42)", "popup(10, 20)"]);

        drop(menu);
        assert_eq!(menu_host.refs.get(), 1);
    }

    #[test]
    fn test_context_menu_through_host_trait() {
        let menu_host = FakeHost::new().with::<IContextMenu, _>(&MENU);
        let host = FakeHost::new()
            .with::<IComponentHandler, _>(&HANDLER)
            .with::<IComponentHandler3, _>(&HANDLER3)
            .with_child(&menu_host);
        let handler = handler(&host);
        let services: &dyn Host = &handler;

        let selected = Arc::new(AtomicI32::new(-1));
        let sink = selected.clone();
        let items = [
            MenuItem::new("Reset", 7),
            MenuItem::new("Learn", 8).with_flags(menu_flags::CHECKED),
        ];
        services
            .popup_context_menu(Some(3), &items, 1, 2, Box::new(move |tag| sink.store(tag, Ordering::SeqCst)))
            .unwrap();

        assert_eq!(selected.load(Ordering::SeqCst), 8);
        assert_eq!(host.calls(), ["createContextMenu(3)"]);
        assert_eq!(menu_host.calls(), ["addItem(Reset, 7)", "addItem(Learn, 8)", "popup(1, 2)"]);
        assert_eq!(menu_host.refs.get(), 1);
    }

    #[test]
    fn test_host_trait_reaches_native_calls() {
        let host = host(true);
        let handler = handler(&host);
        let services: &dyn Host = &handler;

        services.start_group_edit().unwrap();
        {
            let edit = EditGuard::begin(services, 6).unwrap();
            edit.perform(0.125).unwrap();
        }
        services.set_dirty(true).unwrap();
        services.restart(RestartFlags::PARAM_TITLES_CHANGED).unwrap();
        assert!(services.send_message(&vessel_core::Message::new("x")).unwrap_err().is_unsupported());

        assert_eq!(
            host.calls(),
            [
                "startGroupEdit",
                "beginEdit(6)",
                "performEdit(6, 0.125)",
                "endEdit(6)",
                "setDirty(1)",
                "restartComponent(16)"
            ]
        );
    }
}
