//! Bridge tests against the probe library linked into the test binary.

use std::ffi::c_void;
use std::sync::Arc;
use std::thread;

use probefi_bridge::{run_suite, BridgeError, ProbeSuite, SymbolSource, SymbolTable, Value};
use probefi_probes::{catalog, ProbeKind};

fn probe_table() -> SymbolTable {
    let mut table = SymbolTable::new("probefi_probes (in-process)");
    for entry in catalog() {
        table.insert(entry.symbol, entry.address);
    }
    table
}

#[test]
fn builtin_suite_passes() {
    let suite = ProbeSuite::builtin().unwrap();
    let report = unsafe { run_suite(&probe_table(), &suite) };
    for failure in report.failures() {
        eprintln!("{}: {:?}", failure.name, failure.detail);
    }
    assert!(report.is_success());
    assert_eq!(report.passed, suite.active_cases().len());
}

#[test]
fn every_catalog_signature_imports() {
    let table = probe_table();
    for entry in catalog() {
        let f = unsafe { table.import(entry.signature) }
            .unwrap_or_else(|e| panic!("{}: {e}", entry.symbol));
        assert_eq!(f.name(), entry.symbol);
        assert_eq!(f.address(), entry.address);
    }
}

#[test]
fn constants_through_the_bridge() {
    let table = probe_table();
    let call = |decl: &str| unsafe { table.import(decl) }.unwrap().call(&[]).unwrap();
    assert_eq!(call("int int_probe(void)"), Value::Int(-1));
    assert_eq!(call("int8_t int8_probe(void)"), Value::I8(-8));
    assert_eq!(call("uint64_t uint64_probe(void)"), Value::U64(64));
    assert_eq!(call("float float_probe(void)"), Value::F32(32.1));
    assert_eq!(call("double double_probe(void)"), Value::F64(-64.2));
    assert_eq!(call("_Bool bool_probe(void)"), Value::Bool(true));
    assert_eq!(call("void void_probe(void)"), Value::Void);
}

#[test]
fn int8_round_trip_scenario() {
    let table = probe_table();
    let f = unsafe { table.import("int8_t int8_probe_unary(int8_t v)") }.unwrap();
    assert_eq!(f.call(&[Value::I8(-120)]).unwrap(), Value::I8(-128));
    assert_eq!(f.call(&[Value::I8(-125)]).unwrap(), Value::I8(123));
    assert_eq!(f.call(&[Value::I64(300)]).unwrap(), Value::I8(36));
}

#[test]
fn unary_probes_match_wrapping_arithmetic() {
    let table = probe_table();
    let i16_f = unsafe { table.import("int16_t int16_probe_unary(int16_t v)") }.unwrap();
    let u32_f = unsafe { table.import("uint32_t uint32_probe_unary(uint32_t v)") }.unwrap();
    let i64_f = unsafe { table.import("int64_t int64_probe_unary(int64_t v)") }.unwrap();
    for v in [i16::MIN, -1, 0, 15, 16, i16::MAX] {
        assert_eq!(i16_f.call(&[Value::I16(v)]).unwrap(), Value::I16(v.wrapping_sub(16)));
    }
    for v in [0u32, 31, 32, u32::MAX] {
        assert_eq!(u32_f.call(&[Value::U32(v)]).unwrap(), Value::U32(v.wrapping_sub(32)));
    }
    for v in [i64::MIN, i64::MIN + 63, 0, i64::MAX] {
        assert_eq!(i64_f.call(&[Value::I64(v)]).unwrap(), Value::I64(v.wrapping_sub(64)));
    }
}

#[test]
fn argument_count_is_checked() {
    let table = probe_table();
    let f = unsafe { table.import("double sqrt_probe(double v)") }.unwrap();
    let err = f.call(&[]).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::ArgumentCount {
            expected: 1,
            got: 0,
            ..
        }
    ));
    assert!(f.call(&[Value::F64(1.0), Value::F64(2.0)]).is_err());
}

#[test]
fn void_parameter_rules() {
    let table = probe_table();
    assert!(unsafe { table.import("int int_probe(void)") }.is_ok());
    let err = unsafe { table.import("int int_probe_unary(int v, void)") }.unwrap_err();
    assert!(matches!(err, BridgeError::IllegalVoidParameter { .. }));
}

#[test]
fn buffer_ownership_scenario() {
    let table = probe_table();
    let f = unsafe { table.import("char* buffer_probe(const char* data, int length)") }.unwrap();

    let input = b"probe bytes".to_vec();
    let len = input.len();
    let buffer = unsafe { f.call_buffer(&[Value::Bytes(input.clone()), Value::Int(len as i32)], len) }
        .unwrap();
    assert_eq!(buffer.as_bytes(), &input[..]);
    assert_ne!(buffer.as_ptr(), input.as_ptr());

    let prefix = unsafe { f.call_buffer(&[Value::from("abcdef"), Value::Int(2)], 2) }.unwrap();
    assert_eq!(prefix.into_vec(), b"ab".to_vec());

    let empty = unsafe { f.call_buffer(&[Value::from(""), Value::Int(0)], 0) }.unwrap();
    assert!(empty.is_empty());

    let err = unsafe { f.call_buffer(&[Value::from("x"), Value::Int(-1)], 0) }.unwrap_err();
    assert!(matches!(err, BridgeError::NullReturn { .. }));
}

#[test]
fn buffer_released_through_the_probe() {
    let table = probe_table();
    let copy = unsafe { table.import("char* buffer_probe(const char* data, int length)") }.unwrap();
    let release = unsafe { table.import("void buffer_probe_release(char* buffer)") }.unwrap();

    let ptr = match copy.call(&[Value::from("xyz"), Value::Int(3)]).unwrap() {
        Value::Pointer(p) => p,
        other => panic!("expected pointer, got {other:?}"),
    };
    assert!(!ptr.is_null());
    let copied = unsafe { std::slice::from_raw_parts(ptr as *const u8, 3) };
    assert_eq!(copied, b"xyz");
    assert_eq!(release.call(&[Value::Pointer(ptr)]).unwrap(), Value::Void);
    assert_eq!(
        release.call(&[Value::Pointer(std::ptr::null_mut::<c_void>())]).unwrap(),
        Value::Void
    );
}

#[test]
fn concurrent_calls_share_no_state() {
    let table = Arc::new(probe_table());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let unary = unsafe { table.import("int32_t int32_probe_unary(int32_t v)") }.unwrap();
                let copy =
                    unsafe { table.import("char* buffer_probe(const char* data, int length)") }.unwrap();
                for i in 0..500i32 {
                    let v = i * 8 + t;
                    assert_eq!(unary.call(&[Value::I32(v)]).unwrap(), Value::I32(v - 32));
                    let text = format!("thread {t} call {i}");
                    let args = [Value::from(text.as_str()), Value::Int(text.len() as i32)];
                    let buf = unsafe { copy.call_buffer(&args, text.len()) }.unwrap();
                    assert_eq!(buf.as_bytes(), text.as_bytes());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn catalog_covers_every_kind() {
    let table = probe_table();
    assert_eq!(table.len(), catalog().len());
    for kind in [ProbeKind::Constant, ProbeKind::Unary, ProbeKind::Math, ProbeKind::Buffer] {
        assert!(catalog().iter().any(|e| e.kind == kind));
    }
}
