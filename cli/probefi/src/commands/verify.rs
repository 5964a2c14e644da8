//! `probefi verify`: run an oracle suite through the bridge.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use probefi_bridge::{run_suite, ProbeSuite, SuiteReport, SymbolSource};

/// How the report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    /// Parse the manifest's `[verify] format` value.
    pub fn from_manifest(value: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(value, true)
            .map_err(|_| anyhow::anyhow!("verify.format must be \"text\" or \"json\", got \"{value}\""))
    }
}

/// Load `path`, or the built-in suite when no path is given.
pub fn load_suite(path: Option<&Path>) -> Result<ProbeSuite> {
    match path {
        Some(path) => ProbeSuite::load(path).with_context(|| format!("loading suite {}", path.display())),
        None => ProbeSuite::builtin().context("loading built-in suite"),
    }
}

pub fn run<S: SymbolSource + ?Sized>(source: &S, suite: &ProbeSuite, format: ReportFormat) -> Result<()> {
    // Suite declarations are trusted to describe the library they name.
    let report = unsafe { run_suite(source, suite) };
    match format {
        ReportFormat::Text => print!("{}", render_text(&report)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    if !report.is_success() {
        bail!(
            "{} of {} cases failed",
            report.failed,
            report.passed + report.failed
        );
    }
    Ok(())
}

pub fn render_text(report: &SuiteReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "suite '{}' against {}", report.suite, report.source);
    for case in &report.cases {
        if case.passed {
            let _ = writeln!(
                out,
                "  ok    {} = {}",
                case.name,
                case.actual.as_deref().unwrap_or("")
            );
        } else {
            let _ = writeln!(
                out,
                "  FAIL  {}: {}",
                case.name,
                case.detail.as_deref().unwrap_or("failed")
            );
        }
    }
    let _ = writeln!(
        out,
        "{} passed, {} failed, {} skipped",
        report.passed, report.failed, report.skipped
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::in_process_table;

    #[test]
    fn builtin_suite_passes_in_process() {
        let suite = load_suite(None).unwrap();
        run(&in_process_table(), &suite, ReportFormat::Json).unwrap();
    }

    #[test]
    fn failures_make_the_command_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrong.toml");
        std::fs::write(
            &path,
            r#"
[suite]
name = "wrong"

[[cases]]
name = "off by one"
signature = "int int_probe(void)"
expect = 0
"#,
        )
        .unwrap();
        let suite = load_suite(Some(&path)).unwrap();
        let err = run(&in_process_table(), &suite, ReportFormat::Text).unwrap_err();
        assert_eq!(err.to_string(), "1 of 1 cases failed");
    }

    #[test]
    fn text_report_lists_cases() {
        let suite = ProbeSuite::parse(
            r#"
[suite]
name = "two"

[[cases]]
name = "good"
signature = "int int_probe(void)"
expect = -1

[[cases]]
name = "bad"
signature = "int int_probe(void)"
expect = 1
"#,
        )
        .unwrap();
        let report = unsafe { run_suite(&in_process_table(), &suite) };
        let text = render_text(&report);
        assert!(text.starts_with("suite 'two' against probefi_probes (in-process)\n"));
        assert!(text.contains("  ok    good = -1\n"));
        assert!(text.contains("  FAIL  bad: expected 1, got -1\n"));
        assert!(text.ends_with("1 passed, 1 failed, 0 skipped\n"));
    }

    #[test]
    fn missing_suite_file() {
        let err = load_suite(Some(Path::new("/nonexistent/suite.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("loading suite /nonexistent/suite.toml"));
    }

    #[test]
    fn manifest_formats() {
        assert_eq!(ReportFormat::from_manifest("JSON").unwrap(), ReportFormat::Json);
        assert_eq!(ReportFormat::from_manifest("text").unwrap(), ReportFormat::Text);
        assert!(ReportFormat::from_manifest("yaml").is_err());
    }
}
