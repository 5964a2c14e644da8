//! Unary transform probes.
//!
//! `probe(v) = v - K` where K is the bit width of the declared type, or 1 for
//! the native `int` / `unsigned int` pair. Integer subtraction wraps in two's
//! complement exactly like the C fixed-width types do; float subtraction
//! rounds per IEEE 754.

use std::os::raw::{c_int, c_uint};

#[no_mangle]
pub extern "C" fn int_probe_unary(v: c_int) -> c_int {
    v.wrapping_sub(1)
}

#[no_mangle]
pub extern "C" fn int8_probe_unary(v: i8) -> i8 {
    v.wrapping_sub(8)
}

#[no_mangle]
pub extern "C" fn int16_probe_unary(v: i16) -> i16 {
    v.wrapping_sub(16)
}

#[no_mangle]
pub extern "C" fn int32_probe_unary(v: i32) -> i32 {
    v.wrapping_sub(32)
}

#[no_mangle]
pub extern "C" fn int64_probe_unary(v: i64) -> i64 {
    v.wrapping_sub(64)
}

#[no_mangle]
pub extern "C" fn uint_probe_unary(v: c_uint) -> c_uint {
    v.wrapping_sub(1)
}

#[no_mangle]
pub extern "C" fn uint8_probe_unary(v: u8) -> u8 {
    v.wrapping_sub(8)
}

#[no_mangle]
pub extern "C" fn uint16_probe_unary(v: u16) -> u16 {
    v.wrapping_sub(16)
}

#[no_mangle]
pub extern "C" fn uint32_probe_unary(v: u32) -> u32 {
    v.wrapping_sub(32)
}

#[no_mangle]
pub extern "C" fn uint64_probe_unary(v: u64) -> u64 {
    v.wrapping_sub(64)
}

#[no_mangle]
pub extern "C" fn float_probe_unary(v: f32) -> f32 {
    v - 32.0
}

#[no_mangle]
pub extern "C" fn double_probe_unary(v: f64) -> f64 {
    v - 64.0
}

/// Logical negation.
#[no_mangle]
pub extern "C" fn bool_probe_unary(v: bool) -> bool {
    !v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int8_scenario() {
        assert_eq!(int8_probe_unary(-120), -128);
        assert_eq!(int8_probe_unary(-125), 123);
    }

    #[test]
    fn small_values() {
        assert_eq!(int_probe_unary(2), 1);
        assert_eq!(int8_probe_unary(15), 7);
        assert_eq!(int16_probe_unary(31), 15);
        assert_eq!(int32_probe_unary(63), 31);
        assert_eq!(int64_probe_unary(127), 63);
        assert_eq!(uint_probe_unary(2), 1);
        assert_eq!(uint8_probe_unary(15), 7);
        assert_eq!(uint16_probe_unary(31), 15);
        assert_eq!(uint32_probe_unary(63), 31);
        assert_eq!(uint64_probe_unary(127), 63);
    }

    #[test]
    fn minimum_values_wrap() {
        assert_eq!(int_probe_unary(c_int::MIN), c_int::MAX);
        assert_eq!(int8_probe_unary(i8::MIN), i8::MAX - 7);
        assert_eq!(int16_probe_unary(i16::MIN), i16::MAX - 15);
        assert_eq!(int32_probe_unary(i32::MIN), i32::MAX - 31);
        assert_eq!(int64_probe_unary(i64::MIN), i64::MAX - 63);
    }

    #[test]
    fn unsigned_zero_wraps() {
        assert_eq!(uint_probe_unary(0), c_uint::MAX);
        assert_eq!(uint8_probe_unary(0), 248);
        assert_eq!(uint16_probe_unary(0), u16::MAX - 15);
        assert_eq!(uint32_probe_unary(0), u32::MAX - 31);
        assert_eq!(uint64_probe_unary(0), u64::MAX - 63);
    }

    #[test]
    fn floats() {
        assert_eq!(float_probe_unary(63.0), 31.0);
        assert_eq!(double_probe_unary(127.0), 63.0);
        assert!(double_probe_unary(f64::NAN).is_nan());
        assert_eq!(float_probe_unary(f32::INFINITY), f32::INFINITY);
    }

    #[test]
    fn bool_negates() {
        assert!(bool_probe_unary(false));
        assert!(!bool_probe_unary(true));
    }
}
