//! Constant probes.
//!
//! Each probe takes no arguments and returns one literal in one exact
//! representation. Signed probes return the negated width, unsigned probes
//! the width itself; the native `int` pair returns -1 / 1.

use std::os::raw::{c_int, c_uint};

#[no_mangle]
pub extern "C" fn int_probe() -> c_int {
    -1
}

#[no_mangle]
pub extern "C" fn int8_probe() -> i8 {
    -8
}

#[no_mangle]
pub extern "C" fn int16_probe() -> i16 {
    -16
}

#[no_mangle]
pub extern "C" fn int32_probe() -> i32 {
    -32
}

#[no_mangle]
pub extern "C" fn int64_probe() -> i64 {
    -64
}

#[no_mangle]
pub extern "C" fn uint_probe() -> c_uint {
    1
}

#[no_mangle]
pub extern "C" fn uint8_probe() -> u8 {
    8
}

#[no_mangle]
pub extern "C" fn uint16_probe() -> u16 {
    16
}

#[no_mangle]
pub extern "C" fn uint32_probe() -> u32 {
    32
}

#[no_mangle]
pub extern "C" fn uint64_probe() -> u64 {
    64
}

/// Returns 32.1 rounded to the nearest `f32`.
#[no_mangle]
pub extern "C" fn float_probe() -> f32 {
    32.1
}

#[no_mangle]
pub extern "C" fn double_probe() -> f64 {
    -64.2
}

#[no_mangle]
pub extern "C" fn bool_probe() -> bool {
    true
}

/// Does nothing. Exercises the void-return path of a bridge.
#[no_mangle]
pub extern "C" fn void_probe() {}
