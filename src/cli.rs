//! Command-line interface definitions

use crate::config::{OpenOptions, TimedWaitStrategy, WaitConfig, DEFAULT_POLL_INTERVAL};
use crate::error::SemError;
use crate::parse::{parse_duration, parse_mode};
use crate::semaphore::NamedSemaphore;
use crate::sys::{CreateMode, PosixBackend};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Process exit codes
pub mod exit_codes {
    /// Operation succeeded
    pub const SUCCESS: i32 = 0;
    /// OS or usage error
    pub const FAILURE: i32 = 1;
    /// `try-wait` found the count at zero
    pub const WOULD_BLOCK: i32 = 2;
    /// `timed-wait` deadline elapsed (same as GNU `timeout`)
    pub const TIMED_OUT: i32 = 124;
}

/// Operate on POSIX named semaphores shared between processes
#[derive(Parser, Debug)]
#[command(name = "namedsem", author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// How to open the semaphore a command works on
#[derive(clap::Args, Debug, Clone)]
pub struct OpenArgs {
    /// Semaphore name, e.g. `/jobs` (leading slash, no other slashes)
    pub name: String,

    /// Permission bits in octal, applied only when the semaphore is created
    #[arg(long, default_value = "644", value_parser = parse_mode)]
    pub mode: u32,

    /// Initial count, applied only when the semaphore is created
    #[arg(long, default_value_t = 0)]
    pub initial: u32,
}

impl OpenArgs {
    /// Open parameters for `create_mode`
    fn options(&self, create_mode: CreateMode) -> OpenOptions {
        OpenOptions::new(self.mode, self.initial).create_mode(create_mode)
    }
}

/// Semaphore operations, one per invocation
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create (or open) a semaphore and leave it in the namespace
    Create {
        #[command(flatten)]
        open: OpenArgs,

        /// Fail if the semaphore already exists
        #[arg(long)]
        exclusive: bool,
    },

    /// Increment the count
    Post {
        #[command(flatten)]
        open: OpenArgs,

        /// Number of times to post
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },

    /// Block until the count is positive, then decrement it
    Wait {
        #[command(flatten)]
        open: OpenArgs,
    },

    /// Decrement the count if positive; exit 2 if it would block
    TryWait {
        #[command(flatten)]
        open: OpenArgs,
    },

    /// Wait with a deadline; exit 124 on timeout
    TimedWait {
        #[command(flatten)]
        open: OpenArgs,

        /// Maximum time to wait (e.g. `500ms`, `2s`, `1m`)
        #[arg(long, value_parser = parse_duration)]
        timeout: Duration,

        /// Sleep between probes when polling
        #[arg(long, value_parser = parse_duration, default_value = "10ms")]
        poll_interval: Duration,

        /// Poll with try-wait even if a native timed wait exists
        #[arg(long)]
        force_poll: bool,
    },

    /// Remove a semaphore name from the namespace
    Unlink {
        /// Semaphore name
        name: String,
    },
}

/// Run a parsed command
///
/// # Errors
///
/// Returns the failure wrapped with context; the underlying [`SemError`]
/// stays reachable through `downcast_ref` for [`exit_code`].
pub fn execute(command: &Command) -> Result<()> {
    match command {
        Command::Create { open, exclusive } => {
            let create_mode = if *exclusive {
                CreateMode::CreateNew
            } else {
                CreateMode::OpenOrCreate
            };
            with_semaphore(open, create_mode, WaitConfig::default(), "create", |_| Ok(()))
        }
        Command::Post { open, count } => {
            with_semaphore(open, CreateMode::OpenOrCreate, WaitConfig::default(), "post", |sem| {
                for _ in 0..*count {
                    sem.post()?;
                }
                Ok(())
            })
        }
        Command::Wait { open } => {
            with_semaphore(open, CreateMode::OpenOrCreate, WaitConfig::default(), "wait", |sem| {
                sem.wait()
            })
        }
        Command::TryWait { open } => with_semaphore(
            open,
            CreateMode::OpenOrCreate,
            WaitConfig::default(),
            "try-wait",
            NamedSemaphore::try_wait,
        ),
        Command::TimedWait {
            open,
            timeout,
            poll_interval,
            force_poll,
        } => {
            let strategy = if *force_poll {
                TimedWaitStrategy::Poll
            } else {
                TimedWaitStrategy::Auto
            };
            let config = WaitConfig::default()
                .with_poll_interval(*poll_interval)
                .with_strategy(strategy);
            with_semaphore(open, CreateMode::OpenOrCreate, config, "timed-wait", |sem| {
                let start = Instant::now();
                let result = sem.timed_wait(*timeout);
                debug!("timed-wait finished after {:?}", start.elapsed());
                result
            })
        }
        Command::Unlink { name } => {
            NamedSemaphore::unlink_name(name)
                .with_context(|| format!("Failed to unlink semaphore {}", name))?;
            info!("Unlinked {}", name);
            Ok(())
        }
    }
}

/// Open `args.name`, run `op`, then close the handle
fn with_semaphore<F>(
    args: &OpenArgs,
    create_mode: CreateMode,
    config: WaitConfig,
    verb: &str,
    op: F,
) -> Result<()>
where
    F: FnOnce(&NamedSemaphore) -> crate::Result<()>,
{
    let mut sem = NamedSemaphore::with_config(PosixBackend, config);
    sem.open_with(&args.name, &args.options(create_mode))
        .with_context(|| format!("Failed to open semaphore {}", args.name))?;
    debug!(
        "Opened {} (poll interval {:?}, default {:?})",
        args.name,
        config.poll_interval(),
        DEFAULT_POLL_INTERVAL
    );

    let result = op(&sem);
    let closed = sem.close();

    result.with_context(|| format!("{} on {} failed", verb, args.name))?;
    closed.with_context(|| format!("Failed to close semaphore {}", args.name))?;
    info!("{} on {} succeeded", verb, args.name);
    Ok(())
}

/// Map an error from [`execute`] to a process exit code
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SemError>() {
        Some(SemError::WouldBlock) => exit_codes::WOULD_BLOCK,
        Some(SemError::Timeout(_)) => exit_codes::TIMED_OUT,
        _ => exit_codes::FAILURE,
    }
}
