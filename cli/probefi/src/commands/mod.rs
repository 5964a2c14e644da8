//! CLI command implementations.

pub mod call;
pub mod doctor;
pub mod list;
pub mod verify;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use probefi_bridge::{BindMode, Library, SymbolTable};

use crate::manifest::ProbefiManifest;

/// Base name of the probe library, as given to the library search.
pub const PROBE_LIBRARY: &str = "probefi_probes";

/// Where the library to load came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryOrigin {
    Flag,
    Manifest,
    Executable,
    Search,
}

impl fmt::Display for LibraryOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryOrigin::Flag => write!(f, "--library"),
            LibraryOrigin::Manifest => write!(f, "probefi.toml"),
            LibraryOrigin::Executable => write!(f, "next to executable"),
            LibraryOrigin::Search => write!(f, "library search"),
        }
    }
}

/// A library path or name, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryChoice {
    pub name: String,
    pub origin: LibraryOrigin,
}

/// Pick the library to load: the `--library` flag, then the manifest, then
/// `fallback` next to the running executable, then a search for `fallback`.
pub fn choose_library(
    flag: Option<&str>,
    manifest: Option<&ProbefiManifest>,
    project_dir: &Path,
    fallback: &str,
) -> LibraryChoice {
    if let Some(name) = flag {
        return LibraryChoice {
            name: name.to_string(),
            origin: LibraryOrigin::Flag,
        };
    }
    if let Some(name) = manifest.and_then(|m| m.library_path(project_dir)) {
        return LibraryChoice {
            name,
            origin: LibraryOrigin::Manifest,
        };
    }
    if let Some(path) = beside_executable(fallback) {
        return LibraryChoice {
            name: path.display().to_string(),
            origin: LibraryOrigin::Executable,
        };
    }
    LibraryChoice {
        name: fallback.to_string(),
        origin: LibraryOrigin::Search,
    }
}

/// The library `name` in the executable's directory or its parent (cargo
/// puts test binaries one level down, in `deps/`).
fn beside_executable(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        return None;
    }
    let exe = std::env::current_exe().ok()?;
    let file = format!(
        "{}{name}{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    );
    exe.ancestors()
        .skip(1)
        .take(2)
        .map(|dir| dir.join(&file))
        .find(|candidate| candidate.is_file())
}

/// Bind mode from the manifest, defaulting to `now|local`.
pub fn bind_mode(manifest: Option<&ProbefiManifest>) -> Result<BindMode> {
    match manifest {
        Some(m) => m.bind_mode(),
        None => Ok(BindMode::default()),
    }
}

pub fn open_library(choice: &LibraryChoice, mode: BindMode) -> Result<Library> {
    Library::open(&choice.name, mode)
        .with_context(|| format!("loading '{}' (from {})", choice.name, choice.origin))
}

/// The probes linked into this binary, addressed by symbol.
pub fn in_process_table() -> SymbolTable {
    let mut table = SymbolTable::new("probefi_probes (in-process)");
    for entry in probefi_probes::catalog() {
        table.insert(entry.symbol, entry.address);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins() {
        let manifest = ProbefiManifest::from_str("[library]\npath = \"libother.so\"\n").unwrap();
        let choice = choose_library(Some("m"), Some(&manifest), Path::new("/proj"), PROBE_LIBRARY);
        assert_eq!(choice.name, "m");
        assert_eq!(choice.origin, LibraryOrigin::Flag);
    }

    #[test]
    fn manifest_before_fallbacks() {
        let manifest = ProbefiManifest::from_str("[library]\npath = \"lib/libp.so\"\n").unwrap();
        let choice = choose_library(None, Some(&manifest), Path::new("/proj"), PROBE_LIBRARY);
        assert_eq!(choice.name, "/proj/lib/libp.so");
        assert_eq!(choice.origin, LibraryOrigin::Manifest);
    }

    #[test]
    fn falls_back_without_configuration() {
        let choice = choose_library(None, None, Path::new("/proj"), PROBE_LIBRARY);
        match choice.origin {
            LibraryOrigin::Executable => assert!(choice.name.contains(PROBE_LIBRARY)),
            LibraryOrigin::Search => assert_eq!(choice.name, PROBE_LIBRARY),
            other => panic!("unexpected origin {other}"),
        }
    }

    #[test]
    fn in_process_table_has_every_probe() {
        assert_eq!(in_process_table().len(), probefi_probes::catalog().len());
    }

    #[test]
    fn missing_library_has_context() {
        let choice = LibraryChoice {
            name: "123probefi_missing".into(),
            origin: LibraryOrigin::Flag,
        };
        let err = open_library(&choice, BindMode::NOW).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("loading '123probefi_missing' (from --library)"));
        assert!(text.contains("not found"));
    }
}
