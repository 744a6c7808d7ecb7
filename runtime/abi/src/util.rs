//! Timing, RNG, diagnostic printing, and IEEE-754 classification symbols.

use std::ffi::CStr;
use std::io::Write as _;

use libc::c_char;

use helios_core::{Clock, rng};

/// Monotonic wall-clock microseconds.
#[unsafe(no_mangle)]
pub extern "C" fn helios_get_micro_time() -> u64 {
    Clock::micro_time()
}

/// Cumulative kernel execution microseconds across all devices.
#[unsafe(no_mangle)]
pub extern "C" fn helios_get_kernel_time() -> u64 {
    Clock::kernel_time()
}

/// Reseeds the calling thread's random generator.
#[unsafe(no_mangle)]
pub extern "C" fn helios_random_seed(seed: u32) {
    rng::seed(seed);
}

/// Draws a uniform `f32` in `[0, 1)`.
#[unsafe(no_mangle)]
pub extern "C" fn helios_random_val() -> f32 {
    rng::val()
}

fn print(args: std::fmt::Arguments<'_>) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_fmt(args);
}

/// Prints one character to standard output.
#[unsafe(no_mangle)]
pub extern "C" fn helios_print_char(c: c_char) {
    print(format_args!("{}", (c as u8) as char));
}

/// Prints a 16-bit integer to standard output.
#[unsafe(no_mangle)]
pub extern "C" fn helios_print_short(s: i16) {
    print(format_args!("{s}"));
}

/// Prints a 32-bit integer to standard output.
#[unsafe(no_mangle)]
pub extern "C" fn helios_print_int(i: i32) {
    print(format_args!("{i}"));
}

/// Prints a 64-bit integer to standard output.
#[unsafe(no_mangle)]
pub extern "C" fn helios_print_long(l: i64) {
    print(format_args!("{l}"));
}

/// Prints a single-precision float to standard output.
#[unsafe(no_mangle)]
pub extern "C" fn helios_print_float(f: f32) {
    print(format_args!("{f}"));
}

/// Prints a double-precision float to standard output.
#[unsafe(no_mangle)]
pub extern "C" fn helios_print_double(d: f64) {
    print(format_args!("{d}"));
}

/// Prints a NUL-terminated string to standard output.
///
/// # Safety
///
/// `s` must be null (no-op) or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn helios_print_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    // SAFETY: Checked non-null; caller guarantees NUL termination.
    let s = unsafe { CStr::from_ptr(s) };
    print(format_args!("{}", s.to_string_lossy()));
}

/// Returns 1 if `f` is an infinity, else 0.
#[unsafe(no_mangle)]
pub extern "C" fn helios_isinff(f: f32) -> i32 {
    i32::from(f.is_infinite())
}

/// Returns 1 if `f` is a NaN, else 0.
#[unsafe(no_mangle)]
pub extern "C" fn helios_isnanf(f: f32) -> i32 {
    i32::from(f.is_nan())
}

/// Returns 1 if `f` is neither infinite nor NaN, else 0.
#[unsafe(no_mangle)]
pub extern "C" fn helios_isfinitef(f: f32) -> i32 {
    i32::from(f.is_finite())
}

/// Returns 1 if `d` is an infinity, else 0.
#[unsafe(no_mangle)]
pub extern "C" fn helios_isinf(d: f64) -> i32 {
    i32::from(d.is_infinite())
}

/// Returns 1 if `d` is a NaN, else 0.
#[unsafe(no_mangle)]
pub extern "C" fn helios_isnan(d: f64) -> i32 {
    i32::from(d.is_nan())
}

/// Returns 1 if `d` is neither infinite nor NaN, else 0.
#[unsafe(no_mangle)]
pub extern "C" fn helios_isfinite(d: f64) -> i32 {
    i32::from(d.is_finite())
}
