//! OS boundary for named semaphores
//!
//! [`SemaphoreBackend`] is the capability set the handle needs from the host:
//! open, close, unlink, post, wait, try-wait, and optionally a native bounded
//! wait. [`PosixBackend`] binds it to the libc `sem_*` family; tests swap in
//! their own implementation without touching the handle's state machine.

use std::ffi::{c_uint, CStr};
use std::io;
use std::ptr::NonNull;
use std::time::Duration;

/// How `open` treats an existing (or missing) name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    /// Open the name, creating it if absent (`O_CREAT`)
    #[default]
    OpenOrCreate,
    /// Create the name, failing with `EEXIST` if it exists (`O_CREAT | O_EXCL`)
    CreateNew,
    /// Open an existing name, failing with `ENOENT` if absent
    OpenExisting,
}

impl CreateMode {
    /// Convert to the `oflag` argument of `sem_open`
    #[must_use]
    pub fn to_oflag(self) -> i32 {
        match self {
            CreateMode::OpenOrCreate => libc::O_CREAT,
            CreateMode::CreateNew => libc::O_CREAT | libc::O_EXCL,
            CreateMode::OpenExisting => 0,
        }
    }
}

/// Host primitives a named semaphore handle is built on
///
/// Every method is a single forwarding call. Implementations must not cache
/// or mirror the count, and must not add locking of their own.
pub trait SemaphoreBackend {
    /// Opaque process-local reference to the OS object
    type Handle;

    /// Open (or create) the named semaphore
    ///
    /// `mode` and `value` only matter when the call creates the object.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the name is malformed, access is denied, or the
    /// `mode` rules out the current state of the name.
    fn open(&self, name: &CStr, mode: CreateMode, perms: u32, value: u32)
        -> io::Result<Self::Handle>;

    /// Release the process-local reference
    ///
    /// # Errors
    ///
    /// Returns the OS error if the reference is not valid.
    fn close(&self, handle: &Self::Handle) -> io::Result<()>;

    /// Remove the name from the OS namespace
    ///
    /// # Errors
    ///
    /// Returns the OS error, typically `ENOENT` if the name is already gone.
    fn unlink(&self, name: &CStr) -> io::Result<()>;

    /// Increment the count
    ///
    /// # Errors
    ///
    /// Returns the OS error, e.g. `EOVERFLOW`.
    fn post(&self, handle: &Self::Handle) -> io::Result<()>;

    /// Block until the count is positive, then decrement it
    ///
    /// # Errors
    ///
    /// Returns the OS error, e.g. `EINTR`.
    fn wait(&self, handle: &Self::Handle) -> io::Result<()>;

    /// Decrement the count if positive, without blocking
    ///
    /// # Errors
    ///
    /// Returns an error of kind [`io::ErrorKind::WouldBlock`] if the count is
    /// zero, or any other OS error unchanged.
    fn try_wait(&self, handle: &Self::Handle) -> io::Result<()>;

    /// Whether [`SemaphoreBackend::timed_wait`] is backed by a native call
    fn has_native_timed_wait(&self) -> bool {
        false
    }

    /// Native bounded wait
    ///
    /// # Errors
    ///
    /// Returns an error of kind [`io::ErrorKind::TimedOut`] once `timeout`
    /// elapses, or [`io::ErrorKind::Unsupported`] when no native call exists.
    fn timed_wait(&self, _handle: &Self::Handle, _timeout: Duration) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }
}

/// A `sem_t*` returned by `sem_open`
#[derive(Debug)]
pub struct PosixHandle(NonNull<libc::sem_t>);

// SAFETY: POSIX semaphore operations are thread-safe, and a named semaphore
// reference is valid from any thread of the process that opened it.
unsafe impl Send for PosixHandle {}
unsafe impl Sync for PosixHandle {}

impl PosixHandle {
    /// Raw pointer for libc calls
    fn as_ptr(&self) -> *mut libc::sem_t {
        self.0.as_ptr()
    }
}

/// libc-backed named semaphores
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixBackend;

/// Map a `0`/`-1` libc return value to an `io::Result`
fn cvt(ret: libc::c_int) -> io::Result<()> {
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

impl SemaphoreBackend for PosixBackend {
    type Handle = PosixHandle;

    fn open(
        &self,
        name: &CStr,
        mode: CreateMode,
        perms: u32,
        value: u32,
    ) -> io::Result<PosixHandle> {
        // SAFETY: `name` is NUL-terminated; the variadic mode/value are
        // passed as `c_uint` as required after default argument promotion.
        let sem = unsafe {
            libc::sem_open(
                name.as_ptr(),
                mode.to_oflag(),
                perms as c_uint,
                value as c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(sem)
            .map(PosixHandle)
            .ok_or_else(io::Error::last_os_error)
    }

    fn close(&self, handle: &PosixHandle) -> io::Result<()> {
        // SAFETY: the pointer came from a successful `sem_open`.
        cvt(unsafe { libc::sem_close(handle.as_ptr()) })
    }

    fn unlink(&self, name: &CStr) -> io::Result<()> {
        // SAFETY: `name` is NUL-terminated.
        cvt(unsafe { libc::sem_unlink(name.as_ptr()) })
    }

    fn post(&self, handle: &PosixHandle) -> io::Result<()> {
        // SAFETY: the pointer came from a successful `sem_open`.
        cvt(unsafe { libc::sem_post(handle.as_ptr()) })
    }

    fn wait(&self, handle: &PosixHandle) -> io::Result<()> {
        // SAFETY: the pointer came from a successful `sem_open`.
        cvt(unsafe { libc::sem_wait(handle.as_ptr()) })
    }

    fn try_wait(&self, handle: &PosixHandle) -> io::Result<()> {
        // SAFETY: the pointer came from a successful `sem_open`.
        cvt(unsafe { libc::sem_trywait(handle.as_ptr()) })
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    fn has_native_timed_wait(&self) -> bool {
        true
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    fn timed_wait(&self, handle: &PosixHandle, timeout: Duration) -> io::Result<()> {
        let deadline = realtime_deadline(timeout)?;
        // SAFETY: the pointer came from a successful `sem_open` and
        // `deadline` outlives the call.
        cvt(unsafe { libc::sem_timedwait(handle.as_ptr(), &deadline) })
    }
}

/// Absolute `CLOCK_REALTIME` time `timeout` from now, as `sem_timedwait` expects
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn realtime_deadline(timeout: Duration) -> io::Result<libc::timespec> {
    const NANOS_PER_SEC: i64 = 1_000_000_000;

    // SAFETY: timespec is plain data; zeroed is a valid value.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: `ts` is a valid out-pointer.
    cvt(unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) })?;

    let mut nsec = ts.tv_nsec as i64 + i64::from(timeout.subsec_nanos());
    let mut carry = 0;
    if nsec >= NANOS_PER_SEC {
        nsec -= NANOS_PER_SEC;
        carry = 1;
    }
    let secs = libc::time_t::try_from(timeout.as_secs()).unwrap_or(libc::time_t::MAX);
    ts.tv_sec = ts.tv_sec.saturating_add(secs).saturating_add(carry);
    ts.tv_nsec = nsec as _;
    Ok(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mode_flags() {
        assert_eq!(CreateMode::OpenOrCreate.to_oflag(), libc::O_CREAT);
        assert_eq!(
            CreateMode::CreateNew.to_oflag(),
            libc::O_CREAT | libc::O_EXCL
        );
        assert_eq!(CreateMode::OpenExisting.to_oflag(), 0);
        assert_eq!(CreateMode::default(), CreateMode::OpenOrCreate);
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    #[test]
    fn test_realtime_deadline_is_normalized() {
        let ts = realtime_deadline(Duration::from_nanos(999_999_999)).unwrap();
        assert!(ts.tv_nsec >= 0);
        assert!((ts.tv_nsec as i64) < 1_000_000_000);
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    #[test]
    fn test_realtime_deadline_saturates() {
        let ts = realtime_deadline(Duration::MAX).unwrap();
        assert_eq!(ts.tv_sec, libc::time_t::MAX);
    }
}
