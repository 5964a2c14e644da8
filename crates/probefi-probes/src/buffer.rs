//! Buffer probe: callee allocates, caller releases.
//!
//! [`buffer_probe`] copies `length` bytes into a fresh block obtained from the
//! C allocator and hands the block to the caller. The probe never sees the
//! block again; the caller releases it exactly once, either through
//! [`buffer_probe_release`] or the C library's `free`.

use std::os::raw::{c_char, c_int};
use std::ptr;

/// Copy `length` bytes of `data` into a newly allocated buffer.
///
/// Returns null (and allocates nothing) when `length` is negative or when
/// `data` is null with a positive `length`. A zero `length` still returns a
/// distinct, releasable block.
///
/// # Safety
///
/// `data` must be valid for reads of `length` bytes. No bound is checked:
/// a `length` larger than the real input reads out of bounds.
#[no_mangle]
pub unsafe extern "C" fn buffer_probe(data: *const c_char, length: c_int) -> *mut c_char {
    if length < 0 || (data.is_null() && length > 0) {
        return ptr::null_mut();
    }

    let len = length as usize;
    // malloc(0) may legally return null; always ask for at least one byte.
    let out = libc::malloc(len.max(1)) as *mut c_char;
    if out.is_null() {
        return out;
    }
    if len > 0 {
        ptr::copy_nonoverlapping(data, out, len);
    }
    out
}

/// Release a buffer returned by [`buffer_probe`]. Null is a no-op.
///
/// # Safety
///
/// `buffer` must be null or a pointer returned by [`buffer_probe`] that has
/// not been released yet.
#[no_mangle]
pub unsafe extern "C" fn buffer_probe_release(buffer: *mut c_char) {
    if !buffer.is_null() {
        libc::free(buffer as *mut libc::c_void);
    }
}
