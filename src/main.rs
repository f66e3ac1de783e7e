//! namedsem: command-line access to POSIX named semaphores
//!
//! Each subcommand opens a named semaphore, performs one operation, and closes
//! it again, so shell scripts in unrelated processes can coordinate through a
//! shared name.

use clap::Parser;
use named_semaphore::cli::{self, exit_codes, Args};
use tracing::{debug, Level};

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging based on verbosity and quiet mode
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error: failed to initialize logging: {}", e);
        std::process::exit(exit_codes::FAILURE);
    }

    debug!("Starting namedsem v{}", env!("CARGO_PKG_VERSION"));

    match cli::execute(&args.command) {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(cli::exit_code(&e));
        }
    }
}
