//! End-to-end tests of the `probefi` binary.

use std::path::Path;
use std::process::{Command, Output};

fn probefi(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_probefi"))
        .args(args)
        .current_dir(dir)
        .env_remove("PROBEFI_LOG")
        .output()
        .expect("failed to run probefi")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn list_prints_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let out = probefi(dir.path(), &["list"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("int8_probe_unary"));
    assert!(text.contains("buffer_probe_release"));
    assert!(text.trim_end().ends_with("30 probes"));
}

#[test]
fn call_in_process() {
    let dir = tempfile::tempdir().unwrap();
    let out = probefi(
        dir.path(),
        &["call", "int8_t int8_probe_unary(int8_t v)", "-125", "--in-process"],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out).trim(), "123");

    let out = probefi(
        dir.path(),
        &[
            "call",
            "char* buffer_probe(const char* data, int length)",
            "hello",
            "5",
            "--buffer-len",
            "5",
            "--in-process",
        ],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out).trim(), "\"hello\"");
}

#[test]
fn call_errors_exit_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let out = probefi(dir.path(), &["call", "int int_probe_unary(int v, void)", "--in-process"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("error:"));
    assert!(stderr(&out).contains("void is not a legal parameter type"));
}

#[test]
fn verify_builtin_suite_in_process() {
    let dir = tempfile::tempdir().unwrap();
    let out = probefi(dir.path(), &["verify", "--in-process"]);
    assert!(out.status.success(), "stdout: {}\nstderr: {}", stdout(&out), stderr(&out));
    assert!(stdout(&out).contains(" 0 failed"));
}

#[test]
fn verify_reads_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("probefi.toml"),
        "[verify]\nsuite = \"suites/bad.toml\"\nformat = \"json\"\n",
    )
    .unwrap();
    std::fs::create_dir(dir.path().join("suites")).unwrap();
    std::fs::write(
        dir.path().join("suites/bad.toml"),
        r#"
[suite]
name = "bad"

[[cases]]
name = "wrong constant"
signature = "int int_probe(void)"
expect = 7
"#,
    )
    .unwrap();

    let nested = dir.path().join("sub");
    std::fs::create_dir(&nested).unwrap();
    let out = probefi(&nested, &["verify", "--in-process"]);
    assert_eq!(out.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["suite"], "bad");
    assert_eq!(report["failed"], 1);
    assert!(stderr(&out).contains("1 of 1 cases failed"));
}

#[test]
fn doctor_runs() {
    let dir = tempfile::tempdir().unwrap();
    let out = probefi(dir.path(), &["doctor"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("probefi.toml: not found"));
}
