//! Math-library probe.

use std::os::raw::c_double;

mod libm {
    use std::os::raw::c_double;

    #[cfg_attr(unix, link(name = "m"))]
    extern "C" {
        pub fn sqrt(x: c_double) -> c_double;
    }
}

/// Real square root from the C math library. Negative inputs produce NaN,
/// never a fault.
#[no_mangle]
pub extern "C" fn sqrt_probe(v: c_double) -> c_double {
    unsafe { libm::sqrt(v) }
}
