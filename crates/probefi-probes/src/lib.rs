//! Native probe library.
//!
//! A flat set of C-ABI functions with fixed signatures. Each one returns a
//! known value (or a known transform of its argument), so a foreign-function
//! bridge can be checked against them for every integer width, signedness,
//! float precision and the pointer+length buffer convention.
//!
//! The crate builds as a `cdylib` (`libprobefi_probes.so`) for loading by
//! name, and as an `rlib` so tests can take the probes' addresses directly.
//!
//! ## Modules
//!
//! - [`constant`]: zero-argument probes returning fixed literals
//! - [`unary`]: `v - K` transforms with the declared type's wraparound
//! - [`math`]: square root from the standard math routines
//! - [`buffer`]: callee-allocates, caller-releases byte buffer copy
//! - [`catalog`]: symbol/signature table of every exported probe

pub mod buffer;
pub mod catalog;
pub mod constant;
pub mod math;
pub mod unary;

pub use buffer::{buffer_probe, buffer_probe_release};
pub use catalog::{catalog, ProbeEntry, ProbeKind};
pub use constant::*;
pub use math::sqrt_probe;
pub use unary::*;
