//! Host-side parallelism helpers for generated code.
//!
//! Generated code hands the runtime raw closure pointers and `extern "C"`
//! trampolines; nothing here inspects the closure, it is only carried across
//! the thread boundary and handed back.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread::JoinHandle;

use libc::c_void;

/// Body trampoline for [`parallel_for`]: `(closure, lower, upper)`.
pub type ParallelForFn = unsafe extern "C" fn(*mut c_void, i32, i32);

/// Body trampoline for [`spawn_thread`]: `(closure)`.
pub type ThreadFn = unsafe extern "C" fn(*mut c_void);

/// Raw pointer wrapper that may cross a thread boundary.
///
/// The closure data is owned by the caller, which must keep it alive and
/// race-free for the duration of the parallel region.
struct SendPtr(*mut c_void);

// SAFETY: The pointer is only passed back to caller-provided code; the
// caller owns the synchronization of whatever it points to.
unsafe impl Send for SendPtr {}

/// Runs `body` over `[lower, upper)` split across `num_threads` workers.
///
/// A non-positive `num_threads` means "one worker per available core".
/// Blocks until every chunk has completed.
///
/// # Safety
///
/// `body` must be safe to call concurrently with `closure` and any
/// half-open subrange of `[lower, upper)`.
pub unsafe fn parallel_for(
    num_threads: i32,
    lower: i32,
    upper: i32,
    closure: *mut c_void,
    body: ParallelForFn,
) {
    let total = upper.saturating_sub(lower);
    if total <= 0 {
        return;
    }
    let workers = if num_threads > 0 {
        num_threads as usize
    } else {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    };
    let workers = workers.min(total as usize);
    let chunk = (total as usize).div_ceil(workers) as i32;

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let chunk_lower = lower + chunk * worker as i32;
            let chunk_upper = (chunk_lower + chunk).min(upper);
            let ptr = SendPtr(closure);
            scope.spawn(move || {
                // Rebind the whole wrapper: disjoint capture would otherwise
                // grab the !Send field.
                let ptr = ptr;
                // SAFETY: The caller guarantees `body` tolerates concurrent
                // invocation over disjoint subranges.
                unsafe { body(ptr.0, chunk_lower, chunk_upper) };
            });
        }
    });
}

/// Join handles of detached-until-synced threads, keyed by handed-out id.
static THREADS: Mutex<Option<HashMap<i32, JoinHandle<()>>>> = Mutex::new(None);

/// Next thread id. Ids are dense and never reused within a process.
static NEXT_THREAD_ID: AtomicI32 = AtomicI32::new(1);

/// Spawns a thread running `body(closure)` and returns its id for
/// [`sync_thread`].
///
/// # Safety
///
/// `closure` must remain valid until the matching [`sync_thread`] returns,
/// and `body` must be safe to run on another thread.
pub unsafe fn spawn_thread(closure: *mut c_void, body: ThreadFn) -> i32 {
    let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    let ptr = SendPtr(closure);
    let handle = std::thread::spawn(move || {
        // Rebind the whole wrapper: disjoint capture would otherwise grab
        // the !Send field.
        let ptr = ptr;
        // SAFETY: Caller contract: closure outlives the thread, body is
        // thread-safe.
        unsafe { body(ptr.0) };
    });
    let mut threads = THREADS.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    threads.get_or_insert_with(HashMap::new).insert(id, handle);
    id
}

/// Blocks until the thread created under `id` finishes.
///
/// Unknown ids (never handed out, or already synced) are ignored with a
/// warning, matching the forgiving behaviour generated code relies on.
pub fn sync_thread(id: i32) {
    let handle = {
        let mut threads = THREADS.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        threads.as_mut().and_then(|map| map.remove(&id))
    };
    match handle {
        Some(handle) => {
            if handle.join().is_err() {
                log::error!("thread {id} panicked before sync");
            }
        }
        None => log::warn!("sync_thread: unknown thread id {id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;

    unsafe extern "C" fn sum_range(closure: *mut c_void, lower: i32, upper: i32) {
        // SAFETY: tests pass a pointer to an AtomicI64.
        let acc = unsafe { &*closure.cast::<AtomicI64>() };
        let mut sum = 0_i64;
        for i in lower..upper {
            sum += i64::from(i);
        }
        acc.fetch_add(sum, Ordering::Relaxed);
    }

    unsafe extern "C" fn store_flag(closure: *mut c_void) {
        // SAFETY: tests pass a pointer to an AtomicI64.
        let flag = unsafe { &*closure.cast::<AtomicI64>() };
        flag.store(99, Ordering::Relaxed);
    }

    #[test]
    fn parallel_for_covers_the_range_once() {
        let acc = AtomicI64::new(0);
        let closure = std::ptr::from_ref(&acc).cast_mut().cast::<c_void>();
        // SAFETY: sum_range only touches the atomic accumulator.
        unsafe { parallel_for(4, 0, 1000, closure, sum_range) };
        assert_eq!(acc.load(Ordering::Relaxed), (0..1000_i64).sum());
    }

    #[test]
    fn parallel_for_empty_range_is_a_no_op() {
        let acc = AtomicI64::new(0);
        let closure = std::ptr::from_ref(&acc).cast_mut().cast::<c_void>();
        // SAFETY: as above.
        unsafe { parallel_for(4, 10, 10, closure, sum_range) };
        assert_eq!(acc.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn spawn_then_sync_observes_side_effect() {
        let flag = AtomicI64::new(0);
        let closure = std::ptr::from_ref(&flag).cast_mut().cast::<c_void>();
        // SAFETY: store_flag only touches the atomic flag, which outlives
        // the sync below.
        let id = unsafe { spawn_thread(closure, store_flag) };
        sync_thread(id);
        assert_eq!(flag.load(Ordering::Relaxed), 99);
    }

    #[test]
    fn sync_unknown_id_is_ignored() {
        sync_thread(-1);
    }
}
