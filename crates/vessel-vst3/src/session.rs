//! The plugin's connection to the hosting application.
//!
//! A [`HostSession`] is opened when the host initializes the component with
//! an `IHostApplication` context and closed at `terminate()`. It owns the
//! interned identifier strings handed to the host and a scratch buffer for
//! reading strings back, both bounded by [`Vst3Config`].

use std::borrow::Cow;
use std::ffi::{c_char, c_void};
use std::ptr;

use parking_lot::Mutex;
use vessel_core::{Attribute, Message, MessageReader};
use vst3::Interface;
use vst3::Steinberg::Vst::{
    IAttributeList, IAttributeListVtbl, IHostApplication, IHostApplicationVtbl, IMessage,
    IMessageVtbl, String128, TChar,
};
use vst3::Steinberg::{FUnknown, TUID};

use crate::config::Vst3Config;
use crate::error::{check, HostError};
use crate::interner::Interner;
use crate::ptr::HostPtr;
use crate::status::Status;
use crate::strings::read_wstring;

/// One connection to the hosting application.
pub struct HostSession {
    host: HostPtr<IHostApplication>,
    interner: Interner,
    scratch: Mutex<Vec<TChar>>,
}

impl HostSession {
    pub fn new(host: HostPtr<IHostApplication>, config: &Vst3Config) -> Self {
        Self {
            host,
            interner: Interner::new(config.string_cache_capacity),
            scratch: Mutex::new(vec![0; config.scratch_len.max(2)]),
        }
    }

    /// Open a session from the context passed to `initialize`.
    ///
    /// Returns `None` if the context is null or is not a host application.
    ///
    /// # Safety
    /// `context` must be null or a valid, borrowed `FUnknown` pointer.
    pub unsafe fn from_context(context: *mut FUnknown, config: &Vst3Config) -> Option<Self> {
        let context = HostPtr::from_borrowed(context)?;
        let host = context.query::<IHostApplication>()?;
        Some(Self::new(host, config))
    }

    #[inline]
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    #[inline]
    fn vtbl(&self) -> &IHostApplicationVtbl {
        // SAFETY: the pointer is an IHostApplication.
        unsafe { self.host.vtbl() }
    }

    /// The host's display name.
    pub fn name(&self) -> Result<String, HostError> {
        let mut name: String128 = [0; 128];
        // SAFETY: live host reference, `name` outlives the call.
        let status = unsafe { (self.vtbl().getName)(self.host.as_ptr(), &mut name) };
        check("getName", status)?;
        Ok(read_wstring(&name))
    }

    /// Ask the host to create an object implementing `I`.
    fn create_instance<I: Interface>(&self, operation: &'static str) -> Result<HostPtr<I>, HostError> {
        let mut cid: TUID = I::IID.map(|b| b as c_char);
        let mut iid: TUID = I::IID.map(|b| b as c_char);
        let mut obj: *mut c_void = ptr::null_mut();
        // SAFETY: live host reference, all pointers outlive the call.
        let status = unsafe {
            (self.vtbl().createInstance)(self.host.as_ptr(), &mut cid, &mut iid, &mut obj)
        };
        check(operation, status)?;
        // SAFETY: a successful createInstance returns a new reference.
        unsafe { HostPtr::from_raw(obj as *mut I) }.ok_or(HostError::Failed {
            operation,
            status: Status::False.to_raw(),
        })
    }

    /// Create a host message with id `id`.
    pub fn create_message(&self, id: &str) -> Result<NativeMessage<'_>, HostError> {
        let message = NativeMessage {
            message: self.create_instance::<IMessage>("createInstance(IMessage)")?,
            session: self,
        };
        message.set_id(id)?;
        Ok(message)
    }

    /// Create a host message carrying `message`'s id and attributes.
    pub fn write_message(&self, message: &Message) -> Result<NativeMessage<'_>, HostError> {
        let native = self.create_message(message.id())?;
        let attributes = native.attributes().ok_or(HostError::Failed {
            operation: "IMessage::getAttributes",
            status: Status::False.to_raw(),
        })?;
        for (key, value) in message.attributes() {
            match value {
                Attribute::Int(value) => attributes.set_int(key, *value)?,
                Attribute::Float(value) => attributes.set_float(key, *value)?,
                Attribute::String(value) => attributes.set_string(key, value)?,
                Attribute::Binary(value) => attributes.set_binary(key, value)?,
            }
        }
        drop(attributes);
        Ok(native)
    }

    /// Wrap a message the host passed in.
    ///
    /// # Safety
    /// `message` must be null or a valid, borrowed `IMessage` pointer.
    pub unsafe fn message(&self, message: *mut IMessage) -> Option<NativeMessage<'_>> {
        Some(NativeMessage {
            message: HostPtr::from_borrowed(message)?,
            session: self,
        })
    }
}

impl std::fmt::Debug for HostSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSession")
            .field("host", &self.host)
            .field("interner", &self.interner)
            .finish()
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A host message object.
pub struct NativeMessage<'s> {
    message: HostPtr<IMessage>,
    session: &'s HostSession,
}

impl<'s> NativeMessage<'s> {
    #[inline]
    fn vtbl(&self) -> &IMessageVtbl {
        // SAFETY: the pointer is an IMessage.
        unsafe { self.message.vtbl() }
    }

    /// The raw pointer, for passing the message on.
    #[inline]
    pub fn as_ptr(&self) -> *mut IMessage {
        self.message.as_ptr()
    }

    pub fn id(&self) -> Option<Cow<'s, str>> {
        // SAFETY: live message reference; the host returns null or a
        // zero-terminated string.
        unsafe {
            let id = (self.vtbl().getMessageID)(self.message.as_ptr());
            self.session.interner.resolve(id)
        }
    }

    pub fn set_id(&self, id: &str) -> Result<(), HostError> {
        let id = self.session.interner.intern(id)?;
        // SAFETY: interned strings live as long as the session.
        unsafe { (self.vtbl().setMessageID)(self.message.as_ptr(), id) };
        Ok(())
    }

    pub fn attributes(&self) -> Option<AttributeList<'s>> {
        // SAFETY: the returned list is borrowed from the message.
        let list = unsafe { HostPtr::from_borrowed((self.vtbl().getAttributes)(self.message.as_ptr())) }?;
        Some(AttributeList {
            list,
            session: self.session,
        })
    }

    /// Read access for plugin code. A message without an id reads as `""`.
    pub fn reader(&self) -> IncomingMessage<'s> {
        IncomingMessage {
            id: self.id().map(Cow::into_owned).unwrap_or_default(),
            attributes: self.attributes(),
        }
    }
}

/// A host message as plugin code reads it.
pub struct IncomingMessage<'s> {
    id: String,
    attributes: Option<AttributeList<'s>>,
}

impl MessageReader for IncomingMessage<'_> {
    fn id(&self) -> &str {
        &self.id
    }

    fn int(&self, key: &str) -> Option<i64> {
        self.attributes.as_ref()?.get_int(key).ok()
    }

    fn float(&self, key: &str) -> Option<f64> {
        self.attributes.as_ref()?.get_float(key).ok()
    }

    fn string(&self, key: &str) -> Option<String> {
        self.attributes.as_ref()?.get_string(key).ok()
    }

    fn binary(&self, key: &str) -> Option<Vec<u8>> {
        self.attributes.as_ref()?.get_binary(key).ok()
    }
}

// =============================================================================
// Attribute Lists
// =============================================================================

/// A host attribute list, keyed by interned identifier strings.
pub struct AttributeList<'s> {
    list: HostPtr<IAttributeList>,
    session: &'s HostSession,
}

impl AttributeList<'_> {
    #[inline]
    fn vtbl(&self) -> &IAttributeListVtbl {
        // SAFETY: the pointer is an IAttributeList.
        unsafe { self.list.vtbl() }
    }

    #[inline]
    fn key(&self, key: &str) -> Result<*const c_char, HostError> {
        self.session.interner.intern(key)
    }

    pub fn set_int(&self, key: &str, value: i64) -> Result<(), HostError> {
        let key = self.key(key)?;
        // SAFETY: live list reference, interned key.
        let status = unsafe { (self.vtbl().setInt)(self.list.as_ptr(), key, value) };
        check("setInt", status)
    }

    pub fn get_int(&self, key: &str) -> Result<i64, HostError> {
        let key = self.key(key)?;
        let mut value = 0i64;
        // SAFETY: live list reference, `value` outlives the call.
        let status = unsafe { (self.vtbl().getInt)(self.list.as_ptr(), key, &mut value) };
        check("getInt", status).map(|()| value)
    }

    pub fn set_float(&self, key: &str, value: f64) -> Result<(), HostError> {
        let key = self.key(key)?;
        // SAFETY: live list reference, interned key.
        let status = unsafe { (self.vtbl().setFloat)(self.list.as_ptr(), key, value) };
        check("setFloat", status)
    }

    pub fn get_float(&self, key: &str) -> Result<f64, HostError> {
        let key = self.key(key)?;
        let mut value = 0f64;
        // SAFETY: live list reference, `value` outlives the call.
        let status = unsafe { (self.vtbl().getFloat)(self.list.as_ptr(), key, &mut value) };
        check("getFloat", status).map(|()| value)
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<(), HostError> {
        let key = self.key(key)?;
        let value: Vec<TChar> = value
            .encode_utf16()
            .take_while(|unit| *unit != 0)
            .map(|unit| unit as TChar)
            .chain(std::iter::once(0))
            .collect();
        // SAFETY: live list reference; `value` is terminated and outlives the call.
        let status = unsafe { (self.vtbl().setString)(self.list.as_ptr(), key, value.as_ptr()) };
        check("setString", status)
    }

    /// Read a string through the session's scratch buffer. Strings longer
    /// than the buffer come back truncated.
    pub fn get_string(&self, key: &str) -> Result<String, HostError> {
        let key = self.key(key)?;
        let mut scratch = self.session.scratch.lock();
        scratch.fill(0);
        let size_in_bytes = (scratch.len() * std::mem::size_of::<TChar>()) as u32;
        // SAFETY: live list reference; the buffer holds `size_in_bytes`.
        let status = unsafe {
            (self.vtbl().getString)(self.list.as_ptr(), key, scratch.as_mut_ptr(), size_in_bytes)
        };
        check("getString", status)?;
        let last = scratch.len() - 1;
        scratch[last] = 0;
        Ok(read_wstring(&scratch))
    }

    pub fn set_binary(&self, key: &str, data: &[u8]) -> Result<(), HostError> {
        let key = self.key(key)?;
        let len = u32::try_from(data.len()).map_err(|_| HostError::Exhausted("binary attribute"))?;
        // SAFETY: live list reference; the host copies `data`.
        let status = unsafe {
            (self.vtbl().setBinary)(self.list.as_ptr(), key, data.as_ptr() as *const c_void, len)
        };
        check("setBinary", status)
    }

    /// Copy a binary attribute out of the host's storage.
    pub fn get_binary(&self, key: &str) -> Result<Vec<u8>, HostError> {
        let key = self.key(key)?;
        let mut data: *const c_void = ptr::null();
        let mut len = 0u32;
        // SAFETY: live list reference, both out-pointers outlive the call.
        let status = unsafe { (self.vtbl().getBinary)(self.list.as_ptr(), key, &mut data, &mut len) };
        check("getBinary", status)?;
        if data.is_null() || len == 0 {
            return Ok(Vec::new());
        }
        // SAFETY: the host reports `len` readable bytes at `data`.
        Ok(unsafe { std::slice::from_raw_parts(data as *const u8, len as usize) }.to_vec())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::ffi::CStr;

    use vst3::Steinberg::{kInvalidArgument, kResultFalse, kResultOk, tresult};

    use super::*;
    use crate::ptr::test_support::*;
    use crate::strings::copy_wstring;

    // =========================================================================
    // Host application double
    // =========================================================================

    unsafe extern "system" fn get_name(_this: *mut IHostApplication, name: *mut String128) -> tresult {
        copy_wstring("Test Host", &mut *name);
        kResultOk
    }

    unsafe extern "system" fn create_instance(
        this: *mut IHostApplication,
        cid: *mut TUID,
        _iid: *mut TUID,
        obj: *mut *mut c_void,
    ) -> tresult {
        let cid = (*cid).map(|b| b as u8);
        if cid != IMessage::IID {
            *obj = ptr::null_mut();
            return kResultFalse;
        }
        *obj = fake(this).hand_out::<IMessage>() as *mut c_void;
        kResultOk
    }

    pub(crate) static HOST: IHostApplicationVtbl = IHostApplicationVtbl {
        base: UNKNOWN,
        getName: get_name,
        createInstance: create_instance,
    };

    // =========================================================================
    // Message and attribute list double
    // =========================================================================

    unsafe extern "system" fn get_message_id(this: *mut IMessage) -> *const c_char {
        fake(this)
            .data
            .borrow()
            .get("@id")
            .map_or(ptr::null(), |id| id.as_ptr() as *const c_char)
    }

    unsafe extern "system" fn set_message_id(this: *mut IMessage, id: *const c_char) {
        let mut id = CStr::from_ptr(id).to_bytes_with_nul().to_vec();
        id.shrink_to_fit();
        fake(this).data.borrow_mut().insert("@id".into(), id);
    }

    unsafe extern "system" fn get_attributes(this: *mut IMessage) -> *mut IAttributeList {
        fake(this).as_ptr::<IAttributeList>()
    }

    pub(crate) static MESSAGE: IMessageVtbl = IMessageVtbl {
        base: UNKNOWN,
        getMessageID: get_message_id,
        setMessageID: set_message_id,
        getAttributes: get_attributes,
    };

    unsafe fn store(this: *mut IAttributeList, key: *const c_char, bytes: Vec<u8>) -> tresult {
        let key = CStr::from_ptr(key).to_string_lossy().into_owned();
        record(this, key.clone());
        fake(this).data.borrow_mut().insert(key, bytes);
        kResultOk
    }

    unsafe fn load(this: *mut IAttributeList, key: *const c_char) -> Option<Vec<u8>> {
        let key = CStr::from_ptr(key).to_string_lossy();
        fake(this).data.borrow().get(key.as_ref()).cloned()
    }

    unsafe extern "system" fn set_int(this: *mut IAttributeList, key: *const c_char, value: i64) -> tresult {
        store(this, key, value.to_le_bytes().to_vec())
    }

    unsafe extern "system" fn get_int(this: *mut IAttributeList, key: *const c_char, value: *mut i64) -> tresult {
        match load(this, key) {
            Some(bytes) if bytes.len() == 8 => {
                *value = i64::from_le_bytes(bytes.try_into().unwrap());
                kResultOk
            }
            _ => kResultFalse,
        }
    }

    unsafe extern "system" fn set_float(this: *mut IAttributeList, key: *const c_char, value: f64) -> tresult {
        store(this, key, value.to_le_bytes().to_vec())
    }

    unsafe extern "system" fn get_float(this: *mut IAttributeList, key: *const c_char, value: *mut f64) -> tresult {
        match load(this, key) {
            Some(bytes) if bytes.len() == 8 => {
                *value = f64::from_le_bytes(bytes.try_into().unwrap());
                kResultOk
            }
            _ => kResultFalse,
        }
    }

    unsafe extern "system" fn set_string(
        this: *mut IAttributeList,
        key: *const c_char,
        value: *const TChar,
    ) -> tresult {
        let len = crate::strings::len_wstring(value, 1 << 16);
        let units = std::slice::from_raw_parts(value, len);
        let bytes = units.iter().flat_map(|unit| (*unit as u16).to_le_bytes()).collect();
        store(this, key, bytes)
    }

    unsafe extern "system" fn get_string(
        this: *mut IAttributeList,
        key: *const c_char,
        out: *mut TChar,
        size_in_bytes: u32,
    ) -> tresult {
        let Some(bytes) = load(this, key) else {
            return kResultFalse;
        };
        let capacity = size_in_bytes as usize / 2;
        if capacity == 0 {
            return kInvalidArgument;
        }
        let units: Vec<u16> = bytes.chunks(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        let len = units.len().min(capacity - 1);
        for (i, unit) in units[..len].iter().enumerate() {
            *out.add(i) = *unit as TChar;
        }
        *out.add(len) = 0;
        kResultOk
    }

    unsafe extern "system" fn set_binary(
        this: *mut IAttributeList,
        key: *const c_char,
        data: *const c_void,
        size: u32,
    ) -> tresult {
        let bytes = std::slice::from_raw_parts(data as *const u8, size as usize).to_vec();
        store(this, key, bytes)
    }

    unsafe extern "system" fn get_binary(
        this: *mut IAttributeList,
        key: *const c_char,
        data: *mut *const c_void,
        size: *mut u32,
    ) -> tresult {
        let key = CStr::from_ptr(key).to_string_lossy();
        let stored = fake(this).data.borrow();
        match stored.get(key.as_ref()) {
            Some(bytes) => {
                // the map entry is not touched again while the test reads it
                *data = bytes.as_ptr() as *const c_void;
                *size = bytes.len() as u32;
                kResultOk
            }
            None => kResultFalse,
        }
    }

    pub(crate) static ATTRIBUTES: IAttributeListVtbl = IAttributeListVtbl {
        base: UNKNOWN,
        setInt: set_int,
        getInt: get_int,
        setFloat: set_float,
        getFloat: get_float,
        setString: set_string,
        getString: get_string,
        setBinary: set_binary,
        getBinary: get_binary,
    };

    /// A host application whose `createInstance` hands out one shared
    /// message double.
    pub(crate) struct Rig {
        pub message: Box<FakeHost>,
        pub host: Box<FakeHost>,
    }

    pub(crate) fn rig() -> Rig {
        let message = FakeHost::new()
            .with::<IMessage, _>(&MESSAGE)
            .with::<IAttributeList, _>(&ATTRIBUTES);
        let host = FakeHost::new()
            .with::<IHostApplication, _>(&HOST)
            .with_child(&message);
        Rig { message, host }
    }
}
