//! Table of every exported probe.
//!
//! Each entry carries the exported symbol, the C declaration a bridge should
//! import it with, and the probe's in-process address. The address lets tests
//! and `probefi verify --in-process` drive the probes through a bridge
//! without loading the shared object.

use std::ffi::c_void;
use std::fmt;

use crate::{buffer, constant, math, unary};

/// Signature class of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Zero arguments, fixed literal result.
    Constant,
    /// One argument, width-specific `v - K`.
    Unary,
    /// Backed by a math-library routine.
    Math,
    /// Pointer + length in, owned buffer out.
    Buffer,
    /// Releases memory handed out by a [`ProbeKind::Buffer`] probe.
    Release,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Constant => write!(f, "constant"),
            ProbeKind::Unary => write!(f, "unary"),
            ProbeKind::Math => write!(f, "math"),
            ProbeKind::Buffer => write!(f, "buffer"),
            ProbeKind::Release => write!(f, "release"),
        }
    }
}

/// One exported probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeEntry {
    /// Exported symbol name.
    pub symbol: &'static str,
    /// C declaration, parseable by the bridge's signature parser.
    pub signature: &'static str,
    /// Signature class.
    pub kind: ProbeKind,
    /// In-process address of the probe.
    pub address: *const c_void,
}

// Addresses of `extern "C"` functions are immutable for the life of the
// process.
unsafe impl Send for ProbeEntry {}
unsafe impl Sync for ProbeEntry {}

macro_rules! entry {
    ($kind:ident, $module:ident :: $name:ident, $sig:literal) => {
        ProbeEntry {
            symbol: stringify!($name),
            signature: $sig,
            kind: ProbeKind::$kind,
            address: $module::$name as *const c_void,
        }
    };
}

/// Every exported probe, constants first.
pub fn catalog() -> Vec<ProbeEntry> {
    vec![
        entry!(Constant, constant::int_probe, "int int_probe(void)"),
        entry!(Constant, constant::int8_probe, "int8_t int8_probe(void)"),
        entry!(Constant, constant::int16_probe, "int16_t int16_probe(void)"),
        entry!(Constant, constant::int32_probe, "int32_t int32_probe(void)"),
        entry!(Constant, constant::int64_probe, "int64_t int64_probe(void)"),
        entry!(Constant, constant::uint_probe, "unsigned int uint_probe(void)"),
        entry!(Constant, constant::uint8_probe, "uint8_t uint8_probe(void)"),
        entry!(Constant, constant::uint16_probe, "uint16_t uint16_probe(void)"),
        entry!(Constant, constant::uint32_probe, "uint32_t uint32_probe(void)"),
        entry!(Constant, constant::uint64_probe, "uint64_t uint64_probe(void)"),
        entry!(Constant, constant::float_probe, "float float_probe(void)"),
        entry!(Constant, constant::double_probe, "double double_probe(void)"),
        entry!(Constant, constant::bool_probe, "_Bool bool_probe(void)"),
        entry!(Constant, constant::void_probe, "void void_probe(void)"),
        entry!(Unary, unary::int_probe_unary, "int int_probe_unary(int v)"),
        entry!(Unary, unary::int8_probe_unary, "int8_t int8_probe_unary(int8_t v)"),
        entry!(Unary, unary::int16_probe_unary, "int16_t int16_probe_unary(int16_t v)"),
        entry!(Unary, unary::int32_probe_unary, "int32_t int32_probe_unary(int32_t v)"),
        entry!(Unary, unary::int64_probe_unary, "int64_t int64_probe_unary(int64_t v)"),
        entry!(Unary, unary::uint_probe_unary, "unsigned int uint_probe_unary(unsigned int v)"),
        entry!(Unary, unary::uint8_probe_unary, "uint8_t uint8_probe_unary(uint8_t v)"),
        entry!(Unary, unary::uint16_probe_unary, "uint16_t uint16_probe_unary(uint16_t v)"),
        entry!(Unary, unary::uint32_probe_unary, "uint32_t uint32_probe_unary(uint32_t v)"),
        entry!(Unary, unary::uint64_probe_unary, "uint64_t uint64_probe_unary(uint64_t v)"),
        entry!(Unary, unary::float_probe_unary, "float float_probe_unary(float v)"),
        entry!(Unary, unary::double_probe_unary, "double double_probe_unary(double v)"),
        entry!(Unary, unary::bool_probe_unary, "_Bool bool_probe_unary(_Bool v)"),
        entry!(Math, math::sqrt_probe, "double sqrt_probe(double v)"),
        entry!(Buffer, buffer::buffer_probe, "char* buffer_probe(const char* data, int length)"),
        entry!(Release, buffer::buffer_probe_release, "void buffer_probe_release(char* buffer)"),
    ]
}

/// Look up a probe by symbol name.
pub fn find(symbol: &str) -> Option<ProbeEntry> {
    catalog().into_iter().find(|e| e.symbol == symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn symbols_are_unique() {
        let all = catalog();
        let names: HashSet<_> = all.iter().map(|e| e.symbol).collect();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn symbol_matches_declared_name() {
        for e in catalog() {
            let before_paren = e.signature.split('(').next().unwrap();
            let declared = before_paren.trim().rsplit(|c: char| c == ' ' || c == '*').next().unwrap();
            assert_eq!(declared, e.symbol, "signature '{}' names another symbol", e.signature);
        }
    }

    #[test]
    fn addresses_are_non_null() {
        assert!(catalog().iter().all(|e| !e.address.is_null()));
    }

    #[test]
    fn find_by_symbol() {
        let e = find("sqrt_probe").unwrap();
        assert_eq!(e.kind, ProbeKind::Math);
        assert!(find("no_such_probe").is_none());
    }

    #[test]
    fn every_kind_is_present() {
        let kinds: HashSet<_> = catalog().iter().map(|e| e.kind).collect();
        assert_eq!(kinds.len(), 5);
    }
}
