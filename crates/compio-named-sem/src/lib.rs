//! Async named semaphore waits for the compio runtime
//!
//! [`AsyncNamedSemaphore`] wraps a [`NamedSemaphore`] so that waiting never
//! blocks a compio runtime thread: instead of `sem_wait`, it probes with
//! `try_wait` and yields with `compio::time::sleep` between probes.
//!
//! # Example
//!
//! ```rust,no_run
//! use compio_named_sem::AsyncNamedSemaphore;
//! use std::time::Duration;
//!
//! # async fn example() -> named_semaphore::Result<()> {
//! let sem = AsyncNamedSemaphore::open("/jobs", 0o644, 1)?;
//!
//! sem.timed_wait(Duration::from_secs(2)).await?;
//! // ... work shared with other processes ...
//! sem.post()?;
//! # Ok(())
//! # }
//! ```

use named_semaphore::{NamedSemaphore, PosixBackend, Result, SemError, SemaphoreBackend};
use std::time::{Duration, Instant};
use tracing::trace;

/// A named semaphore whose waits yield to the compio runtime
///
/// Probes are independent `try_wait` calls; nothing is held across the sleep,
/// so posts from other handles or processes are seen at the next probe. The
/// sleep between probes is the wrapped handle's
/// [`named_semaphore::WaitConfig::poll_interval`].
#[derive(Debug)]
pub struct AsyncNamedSemaphore<B: SemaphoreBackend = PosixBackend> {
    /// Wrapped synchronous handle
    inner: NamedSemaphore<B>,
}

impl AsyncNamedSemaphore<PosixBackend> {
    /// Open (or create) a POSIX named semaphore
    ///
    /// # Errors
    ///
    /// Returns [`SemError::Os`] if the OS rejects the open.
    pub fn open(name: &str, permissions: u32, initial_count: u32) -> Result<Self> {
        let mut inner = NamedSemaphore::new();
        inner.open(name, permissions, initial_count)?;
        Ok(Self { inner })
    }
}

impl<B: SemaphoreBackend> From<NamedSemaphore<B>> for AsyncNamedSemaphore<B> {
    fn from(inner: NamedSemaphore<B>) -> Self {
        Self { inner }
    }
}

impl<B: SemaphoreBackend> AsyncNamedSemaphore<B> {
    /// The wrapped synchronous handle
    #[must_use]
    pub fn inner(&self) -> &NamedSemaphore<B> {
        &self.inner
    }

    /// Unwrap into the synchronous handle, keeping it open
    #[must_use]
    pub fn into_inner(self) -> NamedSemaphore<B> {
        self.inner
    }

    /// Increment the count
    ///
    /// # Errors
    ///
    /// Same as [`NamedSemaphore::post`].
    pub fn post(&self) -> Result<()> {
        self.inner.post()
    }

    /// Decrement the count if positive, without waiting
    ///
    /// # Errors
    ///
    /// Same as [`NamedSemaphore::try_wait`].
    pub fn try_wait(&self) -> Result<()> {
        self.inner.try_wait()
    }

    /// Wait until the count is positive, then decrement it
    ///
    /// # Errors
    ///
    /// Returns [`SemError::NotInitialized`] or the first OS error other than
    /// would-block.
    pub async fn wait(&self) -> Result<()> {
        self.poll(None).await
    }

    /// Wait at most `timeout` for the count to become positive
    ///
    /// # Errors
    ///
    /// Returns [`SemError::Timeout`] once `timeout` has elapsed, never earlier,
    /// plus the errors of [`AsyncNamedSemaphore::wait`].
    pub async fn timed_wait(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        match start.checked_add(timeout) {
            Some(deadline) => self.poll(Some((deadline, timeout))).await,
            None => self.poll(None).await,
        }
    }

    /// Release the local reference
    ///
    /// # Errors
    ///
    /// Same as [`NamedSemaphore::close`].
    pub fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    /// Remove the name from the OS namespace
    ///
    /// # Errors
    ///
    /// Same as [`NamedSemaphore::unlink`].
    pub fn unlink(&self) -> Result<()> {
        self.inner.unlink()
    }

    /// Probe with `try_wait`, sleeping between probes until `deadline`
    async fn poll(&self, deadline: Option<(Instant, Duration)>) -> Result<()> {
        let interval = self.inner.wait_config().poll_interval();
        loop {
            match self.inner.try_wait() {
                Err(SemError::WouldBlock) => {}
                other => return other,
            }

            let nap = match deadline {
                Some((deadline, timeout)) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(SemError::Timeout(timeout));
                    }
                    remaining.min(interval)
                }
                None => interval,
            };
            trace!("Semaphore unavailable, sleeping {:?}", nap);
            compio::time::sleep(nap).await;
        }
    }
}
