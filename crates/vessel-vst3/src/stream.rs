//! `std::io` adapter over host `IBStream` objects.

use std::ffi::c_void;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::ptr::NonNull;

use thiserror::Error;
use vst3::Steinberg::IBStream_::IStreamSeekMode_::{kIBSeekCur, kIBSeekEnd, kIBSeekSet};
use vst3::Steinberg::{tresult, IBStream, IBStreamVtbl};

use crate::status::Status;

/// A native stream call returned a non-success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream {operation} failed with status {status}")]
pub struct StreamError {
    pub operation: &'static str,
    pub status: tresult,
}

impl From<StreamError> for io::Error {
    fn from(error: StreamError) -> Self {
        io::Error::other(error)
    }
}

fn check(operation: &'static str, status: tresult) -> io::Result<()> {
    if status == Status::Ok.to_raw() {
        Ok(())
    } else {
        Err(StreamError { operation, status }.into())
    }
}

/// Largest request passed to the host in one native call.
const MAX_CHUNK: usize = i32::MAX as usize;

/// A host stream borrowed for the duration of one callback.
///
/// `read` and `write` keep calling the host until the buffer is done or the
/// host moves fewer bytes than asked, then report what was moved. A native
/// error status is an `io::Error` wrapping [`StreamError`], even when some
/// bytes went through first.
pub struct NativeStream<'a> {
    stream: NonNull<IBStream>,
    _marker: PhantomData<&'a IBStream>,
}

impl<'a> NativeStream<'a> {
    /// # Safety
    /// `stream` must be null or a valid `IBStream` pointer that outlives `'a`.
    pub unsafe fn from_raw(stream: *mut IBStream) -> Option<Self> {
        NonNull::new(stream).map(|stream| Self {
            stream,
            _marker: PhantomData,
        })
    }

    #[inline]
    fn vtbl(&self) -> &IBStreamVtbl {
        // SAFETY: the pointer is a live IBStream for `'a`.
        unsafe { &*(*self.stream.as_ptr()).vtbl }
    }

    /// Current position as reported by `tell`.
    pub fn position(&mut self) -> io::Result<u64> {
        let mut pos = 0i64;
        // SAFETY: live stream, `pos` outlives the call.
        let status = unsafe { (self.vtbl().tell)(self.stream.as_ptr(), &mut pos) };
        check("tell", status)?;
        u64::try_from(pos).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative stream position"))
    }

    pub fn set_position(&mut self, pos: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(pos)).map(|_| ())
    }

    /// Drive one native transfer function over `len` bytes starting at `base`.
    fn transfer(
        &mut self,
        operation: &'static str,
        base: *mut u8,
        len: usize,
        call: unsafe extern "system" fn(*mut IBStream, *mut c_void, i32, *mut i32) -> tresult,
    ) -> io::Result<usize> {
        let mut done = 0;
        while done < len {
            let request = (len - done).min(MAX_CHUNK);
            let mut moved = 0i32;
            // SAFETY: `base..base + len` is a live buffer owned by the caller.
            let status = unsafe {
                call(
                    self.stream.as_ptr(),
                    base.add(done) as *mut c_void,
                    request as i32,
                    &mut moved,
                )
            };
            check(operation, status)?;

            let moved = usize::try_from(moved)
                .ok()
                .filter(|moved| *moved <= request)
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("stream {operation} reported {moved} bytes for a request of {request}"),
                    )
                })?;
            done += moved;
            if moved < request {
                break;
            }
        }
        Ok(done)
    }
}

impl Read for NativeStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.vtbl().read;
        self.transfer("read", buf.as_mut_ptr(), buf.len(), read)
    }
}

impl Write for NativeStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The host only reads from the buffer.
        let write = self.vtbl().write;
        self.transfer("write", buf.as_ptr() as *mut u8, buf.len(), write)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for NativeStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, mode) = match pos {
            SeekFrom::Start(offset) => (
                i64::try_from(offset)
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek offset out of range"))?,
                kIBSeekSet,
            ),
            SeekFrom::Current(offset) => (offset, kIBSeekCur),
            SeekFrom::End(offset) => (offset, kIBSeekEnd),
        };
        let mut result = 0i64;
        // SAFETY: live stream, `result` outlives the call.
        let status = unsafe { (self.vtbl().seek)(self.stream.as_ptr(), offset, mode as i32, &mut result) };
        check("seek", status)?;
        u64::try_from(result).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative stream position"))
    }
}

impl std::fmt::Debug for NativeStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NativeStream").field(&self.stream).finish()
    }
}

#[cfg(test)]
pub(crate) mod test_stream {
    //! In-memory `IBStream` double that can cap transfers and inject errors.

    use std::cell::{Cell, RefCell};

    use vst3::Steinberg::{kInternalError, kInvalidArgument, kResultOk, FUnknown, FUnknownVtbl, TUID};

    use super::*;

    #[repr(C)]
    pub(crate) struct TestStream {
        vtbl: *const IBStreamVtbl,
        pub data: RefCell<Vec<u8>>,
        pub pos: Cell<usize>,
        /// Most bytes moved per native call.
        pub accept: Cell<usize>,
        /// Fail every native transfer once this many have happened.
        pub fail_after: Cell<Option<usize>>,
        /// `(offset, len)` of every native write, in order.
        pub writes: RefCell<Vec<(usize, usize)>>,
        pub transfers: Cell<usize>,
    }

    impl TestStream {
        pub fn new(data: Vec<u8>) -> Box<Self> {
            Box::new(Self {
                vtbl: &VTBL,
                data: RefCell::new(data),
                pos: Cell::new(0),
                accept: Cell::new(usize::MAX),
                fail_after: Cell::new(None),
                writes: RefCell::new(Vec::new()),
                transfers: Cell::new(0),
            })
        }

        pub fn as_ptr(&self) -> *mut IBStream {
            self as *const Self as *mut IBStream
        }

        pub fn stream(&self) -> NativeStream<'_> {
            unsafe { NativeStream::from_raw(self.as_ptr()) }.unwrap()
        }

        fn begin(&self) -> Result<(), tresult> {
            let n = self.transfers.get();
            self.transfers.set(n + 1);
            match self.fail_after.get() {
                Some(limit) if n >= limit => Err(kInternalError),
                _ => Ok(()),
            }
        }
    }

    unsafe fn this<'a>(stream: *mut IBStream) -> &'a TestStream {
        &*(stream as *const TestStream)
    }

    unsafe extern "system" fn query_interface(
        _this: *mut FUnknown,
        _iid: *const TUID,
        _obj: *mut *mut c_void,
    ) -> tresult {
        kInvalidArgument
    }

    unsafe extern "system" fn add_ref(_this: *mut FUnknown) -> u32 {
        1
    }

    unsafe extern "system" fn release(_this: *mut FUnknown) -> u32 {
        1
    }

    unsafe extern "system" fn read(stream: *mut IBStream, buffer: *mut c_void, len: i32, read: *mut i32) -> tresult {
        let stream = this(stream);
        if let Err(status) = stream.begin() {
            return status;
        }
        let data = stream.data.borrow();
        let pos = stream.pos.get();
        let n = (len as usize).min(stream.accept.get()).min(data.len().saturating_sub(pos));
        std::ptr::copy_nonoverlapping(data.as_ptr().add(pos), buffer as *mut u8, n);
        stream.pos.set(pos + n);
        *read = n as i32;
        kResultOk
    }

    unsafe extern "system" fn write(
        stream: *mut IBStream,
        buffer: *mut c_void,
        len: i32,
        written: *mut i32,
    ) -> tresult {
        let stream = this(stream);
        if let Err(status) = stream.begin() {
            return status;
        }
        let n = (len as usize).min(stream.accept.get());
        let pos = stream.pos.get();
        let mut data = stream.data.borrow_mut();
        if data.len() < pos + n {
            data.resize(pos + n, 0);
        }
        std::ptr::copy_nonoverlapping(buffer as *const u8, data.as_mut_ptr().add(pos), n);
        stream.writes.borrow_mut().push((pos, n));
        stream.pos.set(pos + n);
        *written = n as i32;
        kResultOk
    }

    unsafe extern "system" fn seek(stream: *mut IBStream, pos: i64, mode: i32, result: *mut i64) -> tresult {
        let stream = this(stream);
        let base = match mode {
            m if m == kIBSeekSet as i32 => 0,
            m if m == kIBSeekCur as i32 => stream.pos.get() as i64,
            m if m == kIBSeekEnd as i32 => stream.data.borrow().len() as i64,
            _ => return kInvalidArgument,
        };
        let target = base + pos;
        if target < 0 {
            return kInvalidArgument;
        }
        stream.pos.set(target as usize);
        if !result.is_null() {
            *result = target;
        }
        kResultOk
    }

    unsafe extern "system" fn tell(stream: *mut IBStream, pos: *mut i64) -> tresult {
        *pos = this(stream).pos.get() as i64;
        kResultOk
    }

    static VTBL: IBStreamVtbl = IBStreamVtbl {
        base: FUnknownVtbl {
            queryInterface: query_interface,
            addRef: add_ref,
            release,
        },
        read,
        write,
        seek,
        tell,
    };
}
