//! Error handling and types

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Named semaphore errors
#[derive(Error, Debug)]
pub enum SemError {
    /// The handle holds no open OS reference (never opened, or already closed)
    #[error("semaphore is not initialized")]
    NotInitialized,

    /// The underlying OS call failed; the OS error is kept as-is
    #[error("OS error: {0}")]
    Os(#[from] io::Error),

    /// `try_wait` found the count at zero
    #[error("operation would block")]
    WouldBlock,

    /// `timed_wait` deadline elapsed before the count became available
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl SemError {
    /// Check if error is due to an uninitialized handle
    #[must_use]
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, SemError::NotInitialized)
    }

    /// Check if error is a would-block result from `try_wait`
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(self, SemError::WouldBlock)
    }

    /// Check if error is an elapsed `timed_wait` deadline
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, SemError::Timeout(_))
    }

    /// The raw OS error code, if this error came from the OS
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            SemError::Os(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

/// Result type for named semaphore operations
pub type Result<T> = std::result::Result<T, SemError>;
