//! named-semaphore: cross-process named counting semaphores
//!
//! This library wraps the host's named semaphore facility (`sem_open` and
//! friends) in a handle with an explicit lifecycle, plus a bounded wait that
//! falls back to polling `try_wait` where no native timed wait exists.

pub mod cli;
pub mod config;
pub mod error;
pub mod parse;
pub mod semaphore;
pub mod sys;

// Re-export commonly used types
pub use config::{OpenOptions, TimedWaitStrategy, WaitConfig, DEFAULT_POLL_INTERVAL};
pub use error::{Result, SemError};
pub use semaphore::NamedSemaphore;
pub use sys::{CreateMode, PosixBackend, SemaphoreBackend};
