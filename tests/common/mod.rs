//! Common test helpers for integration tests

#![allow(dead_code)]

use named_semaphore::NamedSemaphore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_NAME: AtomicUsize = AtomicUsize::new(0);

/// A semaphore name no other test (or test binary run) is using
///
/// Kept short: some systems cap names at 31 bytes.
pub fn unique_name() -> String {
    format!(
        "/nsem-{}-{}",
        std::process::id(),
        NEXT_NAME.fetch_add(1, Ordering::SeqCst)
    )
}

/// Unlinks the name on drop so failed tests don't leak kernel objects
pub struct UnlinkOnDrop(pub String);

impl Drop for UnlinkOnDrop {
    fn drop(&mut self) {
        let _ = NamedSemaphore::unlink_name(&self.0);
    }
}

/// A fresh name plus the guard that removes it
pub fn scratch_name() -> (String, UnlinkOnDrop) {
    let name = unique_name();
    (name.clone(), UnlinkOnDrop(name))
}

pub struct TestTimeoutGuard {
    cancelled: Arc<AtomicBool>,
}

impl Drop for TestTimeoutGuard {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Abort the test process if a blocking semaphore call hangs
pub fn test_timeout_guard(duration: Duration) -> TestTimeoutGuard {
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_clone = Arc::clone(&cancelled);
    std::thread::spawn(move || {
        std::thread::sleep(duration);
        if !cancelled_clone.load(Ordering::SeqCst) {
            eprintln!("Test timeout exceeded ({}s). Aborting.", duration.as_secs());
            std::process::abort();
        }
    });
    TestTimeoutGuard { cancelled }
}
