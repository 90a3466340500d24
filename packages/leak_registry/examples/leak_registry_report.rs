//! Tracks a couple of allocations, releases one of them and reports what is left over.
//!
//! Pass `--verbose` to install a `tracing` subscriber that shows every registration and release.

use std::process::ExitCode;

use argh::FromArgs;
use leak_registry::{Registry, call_site};
use tracing::Level;

/// Leak report demo.
#[derive(FromArgs)]
struct Args {
    /// release every allocation before reporting, so no leaks are detected
    #[argh(switch)]
    release_all: bool,

    /// log every registration and release to stderr
    #[argh(switch, short = 'v')]
    verbose: bool,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_writer(std::io::stderr)
            .init();
    }

    let registry = Registry::new();

    let numbers = match registry.register(100 * size_of::<i32>(), call_site!()) {
        Ok(allocation) => allocation,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let scratch = match registry.register(50 * size_of::<i32>(), call_site!()) {
        Ok(allocation) => allocation,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    // SAFETY: `scratch` came from this registry and is released exactly once.
    if let Err(error) = unsafe { registry.deregister(Some(scratch)) } {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    if args.release_all {
        // SAFETY: `numbers` came from this registry and is released exactly once.
        if let Err(error) = unsafe { registry.deregister(Some(numbers)) } {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    }

    registry.query_by_source(file!()).print_to_stderr();

    ExitCode::SUCCESS
}
