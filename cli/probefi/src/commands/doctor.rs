//! `probefi doctor`: environment diagnostics.

use std::fmt::Write;
use std::path::Path;

use anyhow::Result;
use probefi_bridge::library::{find_library, search_dirs};
use probefi_bridge::{Library, SymbolSource};

use crate::logging::{LogConfig, LOG_ENV};
use crate::manifest::{ProbefiManifest, MANIFEST_NAME};

use super::{bind_mode, choose_library, LibraryOrigin, PROBE_LIBRARY};

/// Build the configuration and library resolution report.
pub fn render(project_dir: &Path, library_flag: Option<&str>) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "=== probefi doctor ===")?;
    writeln!(out)?;
    writeln!(out, "probefi version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        out,
        "platform:        {}-{}",
        std::env::consts::ARCH,
        std::env::consts::OS
    )?;
    writeln!(out)?;

    writeln!(out, "--- Project ---")?;
    let manifest = match ProbefiManifest::find_and_load(project_dir) {
        Ok(Some((manifest, dir))) => {
            writeln!(out, "  {MANIFEST_NAME}: found at {}", dir.display())?;
            Some((manifest, dir))
        }
        Ok(None) => {
            writeln!(out, "  {MANIFEST_NAME}: not found")?;
            None
        }
        Err(e) => {
            writeln!(out, "  {MANIFEST_NAME}: error: {e:#}")?;
            None
        }
    };
    let base = manifest
        .as_ref()
        .map(|(_, dir)| dir.as_path())
        .unwrap_or(project_dir);
    let manifest = manifest.as_ref().map(|(m, _)| m);
    writeln!(out)?;

    writeln!(out, "--- Library ---")?;
    let choice = choose_library(library_flag, manifest, base, PROBE_LIBRARY);
    writeln!(out, "  requested: {} ({})", choice.name, choice.origin)?;
    if choice.origin == LibraryOrigin::Search {
        match find_library(&choice.name) {
            Some(path) => writeln!(out, "  resolved:  {}", path.display())?,
            None => writeln!(out, "  resolved:  not found")?,
        }
    }
    match bind_mode(manifest) {
        Ok(mode) => {
            writeln!(out, "  bind mode: {mode}")?;
            match Library::open(&choice.name, mode) {
                Ok(lib) => {
                    writeln!(out, "  load:      ok ({})", lib.path().display())?;
                    match lib.resolve("int_probe") {
                        Ok(_) => writeln!(out, "  probes:    exported")?,
                        Err(_) => writeln!(out, "  probes:    int_probe missing (not a probe library?)")?,
                    }
                }
                Err(e) => writeln!(out, "  load:      failed: {e}")?,
            }
        }
        Err(e) => writeln!(out, "  bind mode: invalid: {e:#}")?,
    }
    writeln!(out, "  search path:")?;
    for dir in search_dirs() {
        writeln!(out, "    {}", dir.display())?;
    }
    writeln!(out)?;

    writeln!(out, "--- Logging ---")?;
    let log = LogConfig::resolve(manifest.map(|m| &m.log));
    writeln!(
        out,
        "  {LOG_ENV}: {}",
        std::env::var(LOG_ENV).unwrap_or_else(|_| "(unset)".to_string())
    )?;
    writeln!(out, "  filter:      {}", log.filter)?;
    writeln!(out, "  format:      {}", if log.json_format { "json" } else { "text" })?;

    Ok(out)
}

/// Print configuration and library resolution status.
pub fn run(project_dir: &Path, library_flag: Option<&str>) -> Result<()> {
    print!("{}", render(project_dir, library_flag)?);
    Ok(())
}
