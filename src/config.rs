//! Open and wait configuration

use crate::sys::CreateMode;
use std::time::Duration;

/// Default sleep between probes of the polling `timed_wait` fallback
///
/// Trades wake-up latency against CPU usage.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Smallest poll interval accepted; zero would spin
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default permission bits for newly created semaphores
pub const DEFAULT_PERMISSIONS: u32 = 0o644;

/// How `timed_wait` waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimedWaitStrategy {
    /// Use the backend's native bounded wait when it has one, else poll
    ///
    /// POSIX `sem_timedwait` takes a `CLOCK_REALTIME` deadline. An early
    /// return caused by the wall clock stepping forward is finished by polling,
    /// but a backward step can make the native call return late, by up to the
    /// size of the step. Use [`TimedWaitStrategy::Poll`] when the wait must be
    /// bounded strictly on the monotonic clock.
    #[default]
    Auto,
    /// Always use the `try_wait` polling loop, with its deadline on the
    /// monotonic clock
    Poll,
}

/// Tuning for `timed_wait`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Sleep between polling probes
    poll_interval: Duration,
    /// Native or polling wait
    strategy: TimedWaitStrategy,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            strategy: TimedWaitStrategy::Auto,
        }
    }
}

impl WaitConfig {
    /// Set the sleep between polling probes (raised to [`MIN_POLL_INTERVAL`])
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Choose between the native bounded wait and polling
    #[must_use]
    pub fn with_strategy(mut self, strategy: TimedWaitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sleep between polling probes
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How `timed_wait` waits
    #[must_use]
    pub fn strategy(&self) -> TimedWaitStrategy {
        self.strategy
    }
}

/// Parameters for [`crate::NamedSemaphore::open_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Behavior for existing/missing names
    pub create_mode: CreateMode,
    /// Permission bits applied on creation
    pub permissions: u32,
    /// Initial count, honored only on creation
    pub initial_count: u32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            create_mode: CreateMode::OpenOrCreate,
            permissions: DEFAULT_PERMISSIONS,
            initial_count: 0,
        }
    }
}

impl OpenOptions {
    /// Open-or-create with the given permission bits and initial count
    #[must_use]
    pub fn new(permissions: u32, initial_count: u32) -> Self {
        Self {
            permissions,
            initial_count,
            ..Self::default()
        }
    }

    /// Set how existing and missing names are treated
    #[must_use]
    pub fn create_mode(mut self, mode: CreateMode) -> Self {
        self.create_mode = mode;
        self
    }
}
