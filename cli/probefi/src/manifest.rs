//! `probefi.toml` manifest parsing.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use probefi_bridge::BindMode;
use serde::{Deserialize, Serialize};

pub const MANIFEST_NAME: &str = "probefi.toml";

/// Project-level settings. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbefiManifest {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub log: LogSection,
}

/// Which shared object to load and how.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Library path, relative to the manifest's directory, or a bare name.
    #[serde(default)]
    pub path: Option<String>,
    /// `"now"` or `"lazy"`.
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Suite file, relative to the manifest's directory.
    #[serde(default)]
    pub suite: Option<String>,
    /// `"text"` or `"json"`.
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSection {
    /// Filter used when `PROBEFI_LOG` is unset.
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

impl ProbefiManifest {
    /// Search upward from `start_dir` for a `probefi.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_NAME);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest = Self::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    pub fn from_str(s: &str) -> Result<Self> {
        let manifest: ProbefiManifest = toml::from_str(s)?;
        manifest.bind_mode()?;
        Ok(manifest)
    }

    /// Bind mode from `[library] bind` and `global`.
    pub fn bind_mode(&self) -> Result<BindMode> {
        let binding = match self.library.bind.as_deref() {
            None | Some("now") => BindMode::NOW,
            Some("lazy") => BindMode::LAZY,
            Some(other) => bail!("library.bind must be \"now\" or \"lazy\", got \"{other}\""),
        };
        let visibility = if self.library.global {
            BindMode::GLOBAL
        } else {
            BindMode::LOCAL
        };
        Ok(binding | visibility)
    }

    /// `[library] path`, resolved against `base` when it is a path.
    pub fn library_path(&self, base: &Path) -> Option<String> {
        let path = self.library.path.as_deref()?;
        if path.contains('/') && Path::new(path).is_relative() {
            Some(base.join(path).display().to_string())
        } else {
            Some(path.to_string())
        }
    }

    pub fn suite_path(&self, base: &Path) -> Option<PathBuf> {
        self.verify.suite.as_deref().map(|s| base.join(s))
    }
}
