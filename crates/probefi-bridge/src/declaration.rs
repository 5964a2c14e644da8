//! Oracle suite files (`*.toml`).
//!
//! A suite names C declarations, the arguments to call them with and the
//! result each call must produce. The bridge runs them against a library
//! whose behavior is known, so a mismatch points at the bridge.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

const BUILTIN_SUITE: &str = include_str!("../suites/probes.toml");

/// A complete suite parsed from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSuite {
    pub suite: SuiteMeta,
    #[serde(default)]
    pub cases: Vec<ProbeCase>,
}

/// Suite metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteMeta {
    pub name: String,
    /// Library the suite is written against, if it has a default.
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One call and its expected outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeCase {
    pub name: String,
    /// C declaration of the function to call.
    pub signature: String,
    /// Symbol to bind when it differs from the declared name.
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub args: Vec<toml::Value>,
    /// Scalar result, or one of `"nan"`, `"void"`, `"null"`.
    #[serde(default)]
    pub expect: Option<toml::Value>,
    /// Bytes of a returned buffer, as text or an array of byte values.
    #[serde(default)]
    pub expect_bytes: Option<ByteSpec>,
    /// Bytes to take ownership of from a returned buffer.
    #[serde(default)]
    pub buffer_len: Option<usize>,
    /// Absolute tolerance for float results.
    #[serde(default)]
    pub tolerance: Option<f64>,
    #[serde(default)]
    pub excluded: bool,
}

/// Expected buffer contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ByteSpec {
    Text(String),
    Raw(Vec<u8>),
}

impl ByteSpec {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ByteSpec::Text(s) => s.as_bytes(),
            ByteSpec::Raw(b) => b,
        }
    }
}

/// What a case checks, resolved from its optional fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation<'a> {
    Void,
    Nan,
    Null,
    Scalar(&'a toml::Value),
    Bytes { bytes: &'a [u8], len: usize },
}

impl ProbeCase {
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn expectation(&self) -> Result<Expectation<'_>> {
        match (&self.expect, &self.expect_bytes) {
            (Some(_), Some(_)) => Err(self.invalid("has both expect and expect_bytes")),
            (None, None) => Err(self.invalid("has no expectation")),
            (None, Some(bytes)) => match self.buffer_len {
                Some(len) => Ok(Expectation::Bytes {
                    bytes: bytes.as_bytes(),
                    len,
                }),
                None => Err(self.invalid("has expect_bytes without buffer_len")),
            },
            (Some(toml::Value::String(s)), None) => match s.as_str() {
                "void" => Ok(Expectation::Void),
                "nan" => Ok(Expectation::Nan),
                "null" => Ok(Expectation::Null),
                other => Err(self.invalid(&format!("unknown expectation '{other}'"))),
            },
            (Some(v @ (toml::Value::Integer(_) | toml::Value::Float(_) | toml::Value::Boolean(_))), None) => {
                Ok(Expectation::Scalar(v))
            }
            (Some(other), None) => Err(self.invalid(&format!(
                "expect must be a number, boolean or keyword, got {}",
                other.type_str()
            ))),
        }
    }

    fn invalid(&self, what: &str) -> BridgeError {
        BridgeError::InvalidSuite {
            detail: format!("case '{}' {what}", self.name),
        }
    }
}

impl ProbeSuite {
    /// Parse and validate a suite from TOML text.
    pub fn parse(input: &str) -> Result<Self> {
        let suite: ProbeSuite = toml::from_str(input)?;

        if suite.suite.name.is_empty() {
            return Err(BridgeError::InvalidSuite {
                detail: "suite.name is required".to_string(),
            });
        }
        if suite.cases.is_empty() {
            return Err(BridgeError::InvalidSuite {
                detail: format!("suite '{}' has no cases", suite.suite.name),
            });
        }
        let mut seen = HashSet::new();
        for case in &suite.cases {
            if !seen.insert(case.name.as_str()) {
                return Err(BridgeError::InvalidSuite {
                    detail: format!("duplicate case name '{}'", case.name),
                });
            }
            case.expectation()?;
        }

        Ok(suite)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// The embedded suite covering every probe.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_SUITE)
    }

    /// Cases not marked `excluded`.
    pub fn active_cases(&self) -> Vec<&ProbeCase> {
        self.cases.iter().filter(|c| !c.excluded).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_suite() {
        let toml = r#"
[suite]
name = "mini"

[[cases]]
name = "int8 wraps"
signature = "int8_t int8_probe_unary(int8_t v)"
args = [-125]
expect = 123
"#;
        let suite = ProbeSuite::parse(toml).unwrap();
        assert_eq!(suite.suite.name, "mini");
        assert!(suite.suite.library.is_none());
        assert_eq!(suite.cases.len(), 1);
        assert_eq!(suite.cases[0].args, vec![toml::Value::Integer(-125)]);
        assert_eq!(
            suite.cases[0].expectation().unwrap(),
            Expectation::Scalar(&toml::Value::Integer(123))
        );
    }

    #[test]
    fn keyword_and_byte_expectations() {
        let toml = r#"
[suite]
name = "forms"
library = "probefi_probes"

[[cases]]
name = "void"
signature = "void void_probe(void)"
expect = "void"

[[cases]]
name = "nan"
signature = "double sqrt_probe(double v)"
args = [-1.0]
expect = "nan"

[[cases]]
name = "text"
signature = "char* buffer_probe(const char* data, int length)"
args = ["hello", 5]
expect_bytes = "hello"
buffer_len = 5

[[cases]]
name = "raw"
signature = "char* buffer_probe(const char* data, int length)"
args = [[1, 2, 3], 3]
expect_bytes = [1, 2, 3]
buffer_len = 3
"#;
        let suite = ProbeSuite::parse(toml).unwrap();
        assert_eq!(suite.suite.library.as_deref(), Some("probefi_probes"));
        assert_eq!(suite.cases[0].expectation().unwrap(), Expectation::Void);
        assert_eq!(suite.cases[1].expectation().unwrap(), Expectation::Nan);
        assert_eq!(
            suite.cases[2].expectation().unwrap(),
            Expectation::Bytes {
                bytes: b"hello",
                len: 5
            }
        );
        assert_eq!(
            suite.cases[3].expect_bytes,
            Some(ByteSpec::Raw(vec![1, 2, 3]))
        );
    }

    #[test]
    fn excluded_cases_filtered() {
        let toml = r#"
[suite]
name = "filter"

[[cases]]
name = "on"
signature = "int int_probe(void)"
expect = -1

[[cases]]
name = "off"
signature = "int int_probe(void)"
expect = -1
excluded = true
"#;
        let suite = ProbeSuite::parse(toml).unwrap();
        let active = suite.active_cases();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "on");
    }

    #[test]
    fn rejects_structural_errors() {
        let no_cases = "[suite]\nname = \"empty\"\n";
        assert!(matches!(
            ProbeSuite::parse(no_cases),
            Err(BridgeError::InvalidSuite { .. })
        ));

        let both = r#"
[suite]
name = "both"
[[cases]]
name = "x"
signature = "int int_probe(void)"
expect = -1
expect_bytes = "a"
"#;
        assert!(ProbeSuite::parse(both).is_err());

        let neither = r#"
[suite]
name = "neither"
[[cases]]
name = "x"
signature = "int int_probe(void)"
"#;
        assert!(ProbeSuite::parse(neither).is_err());

        let unsized_bytes = r#"
[suite]
name = "unsized"
[[cases]]
name = "x"
signature = "char* buffer_probe(const char* data, int length)"
args = ["hi", 2]
expect_bytes = "hi"
"#;
        let err = ProbeSuite::parse(unsized_bytes).unwrap_err();
        assert!(err.to_string().contains("has expect_bytes without buffer_len"));

        let duplicate = r#"
[suite]
name = "dup"
[[cases]]
name = "x"
signature = "int int_probe(void)"
expect = -1
[[cases]]
name = "x"
signature = "int int_probe(void)"
expect = -1
"#;
        let err = ProbeSuite::parse(duplicate).unwrap_err();
        assert!(err.to_string().contains("duplicate case name 'x'"));
    }

    #[test]
    fn missing_suite_section() {
        let toml = r#"
[[cases]]
name = "orphan"
signature = "int int_probe(void)"
expect = -1
"#;
        assert!(matches!(ProbeSuite::parse(toml), Err(BridgeError::Toml(_))));
    }

    #[test]
    fn builtin_suite_parses() {
        let suite = ProbeSuite::builtin().unwrap();
        assert_eq!(suite.suite.name, "probes");
        assert!(suite.active_cases().len() >= 30);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.toml");
        std::fs::write(
            &path,
            "[suite]\nname = \"file\"\n[[cases]]\nname = \"c\"\nsignature = \"int int_probe(void)\"\nexpect = -1\n",
        )
        .unwrap();
        assert_eq!(ProbeSuite::load(&path).unwrap().suite.name, "file");
        assert!(matches!(
            ProbeSuite::load(&dir.path().join("missing.toml")),
            Err(BridgeError::Io(_))
        ));
    }
}
