//! Running oracle suites through the bridge.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::declaration::{Expectation, ProbeCase, ProbeSuite};
use crate::error::{BridgeError, Result};
use crate::library::SymbolSource;
use crate::marshal::{NativeType, Value};

/// Result of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub name: String,
    pub signature: String,
    pub passed: bool,
    /// Rendered result of the call, when it returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// Why the case failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of a whole suite run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    /// Library or symbol table the suite ran against.
    pub source: String,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cases: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.cases.iter().filter(|c| !c.passed)
    }
}

/// Run every active case of `suite` against `source`.
///
/// A failing case is recorded and the run continues.
///
/// # Safety
///
/// Every declaration in the suite must match the definition of the symbol
/// it binds in `source`. For `expect_bytes` cases, the function must return
/// a C-allocated block the caller owns, and `buffer_len` must not exceed
/// that block's length.
pub unsafe fn run_suite<S: SymbolSource + ?Sized>(source: &S, suite: &ProbeSuite) -> SuiteReport {
    let active = suite.active_cases();
    let mut report = SuiteReport {
        suite: suite.suite.name.clone(),
        source: source.label().to_string(),
        passed: 0,
        failed: 0,
        skipped: suite.cases.len() - active.len(),
        cases: Vec::with_capacity(active.len()),
    };

    for case in active {
        let outcome = match run_case(source, case) {
            Ok(Check { passed: true, actual }) => {
                debug!(case = %case.name, %actual, "case passed");
                CaseOutcome {
                    name: case.name.clone(),
                    signature: case.signature.clone(),
                    passed: true,
                    actual: Some(actual),
                    detail: None,
                }
            }
            Ok(Check { passed: false, actual }) => {
                let detail = format!("expected {}, got {actual}", describe_expectation(case));
                warn!(case = %case.name, %detail, "case failed");
                CaseOutcome {
                    name: case.name.clone(),
                    signature: case.signature.clone(),
                    passed: false,
                    actual: Some(actual),
                    detail: Some(detail),
                }
            }
            Err(e) => {
                warn!(case = %case.name, error = %e, "case errored");
                CaseOutcome {
                    name: case.name.clone(),
                    signature: case.signature.clone(),
                    passed: false,
                    actual: None,
                    detail: Some(e.to_string()),
                }
            }
        };
        if outcome.passed {
            report.passed += 1;
        } else {
            report.failed += 1;
        }
        report.cases.push(outcome);
    }

    info!(
        suite = %report.suite,
        passed = report.passed,
        failed = report.failed,
        skipped = report.skipped,
        "suite finished"
    );
    report
}

struct Check {
    passed: bool,
    actual: String,
}

unsafe fn run_case<S: SymbolSource + ?Sized>(source: &S, case: &ProbeCase) -> Result<Check> {
    let function = match case.symbol() {
        Some(symbol) => source.import_as(symbol, &case.signature)?,
        None => source.import(&case.signature)?,
    };
    let sig = function.signature();
    let args = case
        .args
        .iter()
        .enumerate()
        .map(|(i, v)| host_value(v, sig.params.get(i).copied()))
        .collect::<Result<Vec<_>>>()?;

    match case.expectation()? {
        Expectation::Bytes { bytes, len } => {
            // SAFETY: the caller vouches for the returned block and its
            // length. Only `buffer_len` bytes are read, whatever the
            // expectation's length.
            let buffer = unsafe { function.call_buffer(&args, len)? };
            Ok(Check {
                passed: buffer.as_bytes() == bytes,
                actual: format!("\"{}\"", buffer.as_bytes().escape_ascii()),
            })
        }
        Expectation::Void => {
            let actual = function.call(&args)?;
            Ok(Check {
                passed: actual == Value::Void,
                actual: actual.to_string(),
            })
        }
        Expectation::Nan => {
            let actual = function.call(&args)?;
            Ok(Check {
                passed: sig.ret.is_float() && actual.as_f64().is_some_and(f64::is_nan),
                actual: actual.to_string(),
            })
        }
        Expectation::Null => {
            let actual = function.call(&args)?;
            Ok(Check {
                passed: matches!(actual, Value::Pointer(p) if p.is_null()),
                actual: actual.to_string(),
            })
        }
        Expectation::Scalar(expected) => {
            let expected = host_value(expected, None)?.coerce(sig.ret)?;
            let actual = function.call(&args)?;
            Ok(Check {
                passed: scalar_matches(&actual, &expected, sig.ret, case.tolerance),
                actual: actual.to_string(),
            })
        }
    }
}

fn scalar_matches(actual: &Value, expected: &Value, ret: NativeType, tolerance: Option<f64>) -> bool {
    if !ret.is_float() {
        return actual == expected;
    }
    match (actual.as_f64(), expected.as_f64(), tolerance) {
        (Some(a), Some(e), Some(tol)) => a == e || (a - e).abs() <= tol,
        (Some(a), Some(e), None) => a == e,
        _ => false,
    }
}

/// Convert a TOML argument or expectation to a host value. Strings are
/// parsed against the parameter type when it is known.
pub fn host_value(value: &toml::Value, ty: Option<NativeType>) -> Result<Value> {
    match value {
        toml::Value::Integer(i) => Ok(Value::I64(*i)),
        toml::Value::Float(f) => Ok(Value::F64(*f)),
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        toml::Value::String(s) => match ty {
            Some(ty) => Value::parse_as(s, ty),
            None => Ok(Value::Str(s.clone())),
        },
        toml::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                toml::Value::Integer(b) => u8::try_from(*b)
                    .map_err(|_| BridgeError::marshal(format!("byte value {b} out of range"))),
                other => Err(BridgeError::marshal(format!(
                    "byte arrays hold integers, got {}",
                    other.type_str()
                ))),
            })
            .collect::<Result<Vec<u8>>>()
            .map(Value::Bytes),
        other => Err(BridgeError::marshal(format!(
            "unsupported argument type {}",
            other.type_str()
        ))),
    }
}

fn describe_expectation(case: &ProbeCase) -> String {
    match (&case.expect, &case.expect_bytes) {
        (Some(v), _) => v.to_string(),
        (None, Some(bytes)) => format!("\"{}\"", bytes.as_bytes().escape_ascii()),
        (None, None) => "nothing".to_string(),
    }
}
