//! The process-wide runtime instance and the fatal-error policy.
//!
//! The runtime sits below generated code that assumes its calls succeed, so
//! every error that reaches the exported symbol surface is terminal: one
//! diagnostic line on stderr, then abort. Interior code keeps propagating
//! `Result`s; this module is where they stop.

use once_cell::sync::OnceCell;

use helios_platform_api::RuntimeError;

use crate::runtime::Runtime;
use crate::time::Clock;

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Returns the process-wide runtime, constructing the default (host-only)
/// instance on first use.
///
/// Embedders that link accelerator platforms call [`install`] before the
/// first runtime call instead.
pub fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        init_diagnostics();
        Runtime::builder().build()
    })
}

/// Installs a custom-assembled runtime as the process-wide instance.
///
/// Fails with the rejected runtime if the global instance already exists
/// (the first runtime call wins).
pub fn install(runtime: Runtime) -> Result<(), Runtime> {
    init_diagnostics();
    RUNTIME.set(runtime)
}

/// Terminates the process over an unrecoverable runtime condition.
///
/// Prints a single `Runtime error:` line to stderr and aborts; there is no
/// unwinding and no error code for generated code to mishandle.
pub fn fatal(err: &RuntimeError) -> ! {
    eprintln!("Runtime error: {err}");
    std::process::abort();
}

/// Unwraps a runtime result, taking the fatal path on error.
pub fn ok_or_fatal<T>(result: Result<T, RuntimeError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => fatal(&err),
    }
}

/// Installs the trace-line logger and anchors the wall clock.
///
/// Debug builds default to `debug` filtering so `Runtime message:` lines
/// appear; release builds default to `error`. `RUST_LOG` overrides either.
fn init_diagnostics() {
    let default_filter = if cfg!(debug_assertions) { "debug" } else { "error" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            use std::io::Write as _;
            writeln!(buf, "Runtime message: {}", record.args())
        })
        .try_init();
    Clock::anchor();
}
