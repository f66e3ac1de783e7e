//! Named semaphore handle
//!
//! [`NamedSemaphore`] wraps a process-local reference to an OS named
//! semaphore. The reference is an `Option`: every operation except `open`
//! fails with [`SemError::NotInitialized`] while it is `None`, before any OS
//! call is made.
//!
//! # Example
//!
//! ```rust,no_run
//! use named_semaphore::NamedSemaphore;
//! use std::time::Duration;
//!
//! # fn example() -> named_semaphore::Result<()> {
//! let mut sem = NamedSemaphore::new();
//! sem.open("/jobs", 0o644, 1)?;
//!
//! sem.timed_wait(Duration::from_secs(2))?;
//! // ... critical section shared with other processes ...
//! sem.post()?;
//!
//! sem.close()?;
//! # Ok(())
//! # }
//! ```

use crate::config::{OpenOptions, TimedWaitStrategy, WaitConfig};
use crate::error::{Result, SemError};
use crate::sys::{PosixBackend, SemaphoreBackend};
use std::ffi::CString;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// A handle to a named counting semaphore shared between processes
///
/// The zero value ([`NamedSemaphore::new`] / [`Default`]) is uninitialized.
/// `open` and `close` need `&mut self`, so lifecycle changes on one handle
/// are serialized by the borrow checker. `post`, `wait`, `try_wait` and
/// `timed_wait` take `&self` and may be called from many threads at once;
/// the OS object serializes them.
///
/// Dropping an initialized handle closes the local reference but never
/// unlinks the name.
pub struct NamedSemaphore<B: SemaphoreBackend = PosixBackend> {
    /// Host primitives
    backend: B,
    /// Opaque OS reference; `None` means uninitialized
    handle: Option<B::Handle>,
    /// Name passed to the last successful open
    name: Option<CString>,
    /// Tuning for `timed_wait`
    config: WaitConfig,
}

impl NamedSemaphore<PosixBackend> {
    /// Create an uninitialized handle backed by POSIX `sem_*` calls
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(PosixBackend)
    }

    /// Remove `name` from the OS namespace without holding a handle
    ///
    /// # Errors
    ///
    /// Returns [`SemError::Os`] if the name does not exist or cannot be removed.
    pub fn unlink_name(name: &str) -> Result<()> {
        let name = to_cstring(name)?;
        PosixBackend.unlink(&name)?;
        debug!("Unlinked {:?}", name);
        Ok(())
    }
}

impl Default for NamedSemaphore<PosixBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SemaphoreBackend> NamedSemaphore<B> {
    /// Create an uninitialized handle over a custom backend
    #[must_use]
    pub fn with_backend(backend: B) -> Self {
        Self::with_config(backend, WaitConfig::default())
    }

    /// Create an uninitialized handle over a custom backend with explicit
    /// `timed_wait` tuning
    #[must_use]
    pub fn with_config(backend: B, config: WaitConfig) -> Self {
        Self {
            backend,
            handle: None,
            name: None,
            config,
        }
    }

    /// Replace the `timed_wait` tuning; takes effect on the next call
    pub fn set_wait_config(&mut self, config: WaitConfig) {
        self.config = config;
    }

    /// Current `timed_wait` tuning
    #[must_use]
    pub fn wait_config(&self) -> WaitConfig {
        self.config
    }

    /// Whether the handle holds an open OS reference
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    /// Name of the semaphore this handle was last opened under
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.to_str().ok())
    }

    /// Host primitives this handle forwards to
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open `name`, creating it with `permissions` and `initial_count` if absent
    ///
    /// If the semaphore already exists its count is left as is.
    ///
    /// # Errors
    ///
    /// Returns [`SemError::Os`] if the OS rejects the name or the request.
    /// The handle is unchanged on error.
    pub fn open(&mut self, name: &str, permissions: u32, initial_count: u32) -> Result<()> {
        self.open_with(name, &OpenOptions::new(permissions, initial_count))
    }

    /// Open `name` with explicit create behavior
    ///
    /// Re-opening an initialized handle acquires the new reference first and
    /// only then closes the old one.
    ///
    /// # Errors
    ///
    /// Returns [`SemError::Os`] if the OS call fails (including `EEXIST` for
    /// [`crate::CreateMode::CreateNew`] and `ENOENT` for
    /// [`crate::CreateMode::OpenExisting`]). The handle is unchanged on error.
    pub fn open_with(&mut self, name: &str, options: &OpenOptions) -> Result<()> {
        let cname = to_cstring(name)?;
        let handle = self.backend.open(
            &cname,
            options.create_mode,
            options.permissions,
            options.initial_count,
        )?;
        debug!(
            "Opened {:?} ({:?}, mode {:o}, initial {})",
            cname, options.create_mode, options.permissions, options.initial_count
        );

        if let Some(previous) = self.handle.replace(handle) {
            if let Err(e) = self.backend.close(&previous) {
                warn!("Failed to close replaced semaphore {:?}: {}", self.name, e);
            }
        }
        self.name = Some(cname);
        Ok(())
    }

    /// Release the local reference; the name stays in the OS namespace
    ///
    /// # Errors
    ///
    /// Returns [`SemError::NotInitialized`] if the handle is not open (this
    /// includes a second `close`), or [`SemError::Os`] if the OS call fails.
    pub fn close(&mut self) -> Result<()> {
        let handle = self.raw()?;
        self.backend.close(handle)?;
        self.handle = None;
        debug!("Closed {:?}", self.name);
        Ok(())
    }

    /// Remove the semaphore's name from the OS namespace
    ///
    /// The handle stays open and can still be used.
    ///
    /// # Errors
    ///
    /// Returns [`SemError::NotInitialized`] if the handle is not open, or
    /// [`SemError::Os`] if the name no longer exists.
    pub fn unlink(&self) -> Result<()> {
        self.raw()?;
        let name = self.name.as_deref().ok_or(SemError::NotInitialized)?;
        self.backend.unlink(name)?;
        debug!("Unlinked {:?}", name);
        Ok(())
    }

    /// Increment the count, waking at most one waiter
    ///
    /// # Errors
    ///
    /// Returns [`SemError::NotInitialized`] or the OS error (e.g. `EOVERFLOW`).
    pub fn post(&self) -> Result<()> {
        self.backend.post(self.raw()?)?;
        Ok(())
    }

    /// Block until the count is positive, then decrement it
    ///
    /// # Errors
    ///
    /// Returns [`SemError::NotInitialized`] or the OS error (e.g. `EINTR`).
    pub fn wait(&self) -> Result<()> {
        self.backend.wait(self.raw()?)?;
        Ok(())
    }

    /// Decrement the count if it is positive, without blocking
    ///
    /// # Errors
    ///
    /// Returns [`SemError::WouldBlock`] if the count is zero,
    /// [`SemError::NotInitialized`], or any other OS error.
    pub fn try_wait(&self) -> Result<()> {
        self.probe(self.raw()?)
    }

    /// Wait at most `timeout` for the count to become positive
    ///
    /// Uses the backend's native bounded wait when available (and allowed by
    /// [`TimedWaitStrategy`]); otherwise polls `try_wait`, sleeping up to
    /// [`WaitConfig::poll_interval`] between probes. `Timeout` is never
    /// reported before `timeout` has elapsed on the monotonic clock.
    ///
    /// # Errors
    ///
    /// Returns [`SemError::Timeout`] when the deadline passes,
    /// [`SemError::NotInitialized`], or the first OS error other than
    /// would-block.
    pub fn timed_wait(&self, timeout: Duration) -> Result<()> {
        let handle = self.raw()?;
        let start = Instant::now();

        if self.config.strategy() == TimedWaitStrategy::Auto && self.backend.has_native_timed_wait()
        {
            match self.backend.timed_wait(handle, timeout) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    if start.elapsed() >= timeout {
                        return Err(SemError::Timeout(timeout));
                    }
                    // Realtime clock moved; finish on the monotonic deadline.
                    debug!("Native timed wait returned early, polling remainder");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.poll_until(handle, start, timeout)
    }

    /// Polling fallback for `timed_wait`
    fn poll_until(&self, handle: &B::Handle, start: Instant, timeout: Duration) -> Result<()> {
        let deadline = start.checked_add(timeout);
        let interval = self.config.poll_interval();
        let mut probes: u64 = 0;

        loop {
            probes += 1;
            match self.probe(handle) {
                Err(SemError::WouldBlock) => {}
                other => return other,
            }

            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => interval,
            };
            if remaining.is_zero() {
                trace!("Timed wait expired after {} probes", probes);
                return Err(SemError::Timeout(timeout));
            }
            thread::sleep(remaining.min(interval));
        }
    }

    /// One `try_wait`, with `EAGAIN` mapped to [`SemError::WouldBlock`]
    fn probe(&self, handle: &B::Handle) -> Result<()> {
        self.backend.try_wait(handle).map_err(|e| {
            if e.kind() == io::ErrorKind::WouldBlock {
                SemError::WouldBlock
            } else {
                SemError::Os(e)
            }
        })
    }

    /// The open OS reference, or [`SemError::NotInitialized`]
    fn raw(&self) -> Result<&B::Handle> {
        self.handle.as_ref().ok_or(SemError::NotInitialized)
    }
}

impl<B: SemaphoreBackend> Drop for NamedSemaphore<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.backend.close(&handle) {
                warn!("Failed to close semaphore {:?} on drop: {}", self.name, e);
            }
        }
    }
}

impl<B: SemaphoreBackend> std::fmt::Debug for NamedSemaphore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedSemaphore")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .field("config", &self.config)
            .finish()
    }
}

/// Names with an interior NUL can't reach the OS; report them the way the OS
/// reports other malformed names.
fn to_cstring(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| SemError::Os(io::Error::from_raw_os_error(libc::EINVAL)))
}
