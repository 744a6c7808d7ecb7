//! Host-side parallelism symbols.
//!
//! The function arguments arrive as raw `void*` and are transmuted to the
//! trampoline signatures the code generator emits.

use libc::c_void;

use helios_host::thread::{self, ParallelForFn, ThreadFn};

/// Runs a body function over `[lower, upper)` on `num_threads` workers
/// (non-positive means one per core). Blocks until the range is done.
///
/// # Safety
///
/// `body` must be a `fn(void*, i32, i32)` trampoline safe to call
/// concurrently over disjoint subranges, and `closure` must stay valid for
/// the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn helios_parallel_for(
    num_threads: i32,
    lower: i32,
    upper: i32,
    closure: *mut c_void,
    body: *mut c_void,
) {
    // SAFETY: The generator emits a ParallelForFn-shaped trampoline here.
    let body: ParallelForFn = unsafe { std::mem::transmute(body) };
    // SAFETY: Forwarded caller contract.
    unsafe { thread::parallel_for(num_threads, lower, upper, closure, body) }
}

/// Spawns a thread running `body(closure)`; returns an id for
/// [`helios_sync_thread`].
///
/// # Safety
///
/// `body` must be a `fn(void*)` trampoline safe to run on another thread;
/// `closure` must stay valid until the matching sync returns.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn helios_spawn_thread(closure: *mut c_void, body: *mut c_void) -> i32 {
    // SAFETY: The generator emits a ThreadFn-shaped trampoline here.
    let body: ThreadFn = unsafe { std::mem::transmute(body) };
    // SAFETY: Forwarded caller contract.
    unsafe { thread::spawn_thread(closure, body) }
}

/// Joins a thread created by [`helios_spawn_thread`].
#[unsafe(no_mangle)]
pub extern "C" fn helios_sync_thread(id: i32) {
    thread::sync_thread(id);
}
