//! probefi CLI: call native functions through the bridge and check the
//! bridge against the probe library.

mod commands;
mod logging;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;

use commands::verify::ReportFormat;
use logging::LogConfig;
use manifest::ProbefiManifest;

#[derive(Parser)]
#[command(name = "probefi", version, about = "Native probe library and FFI bridge oracle")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one function from a C declaration and call it
    Call {
        /// C declaration, e.g. "int8_t int8_probe_unary(int8_t v)"
        signature: String,
        /// Arguments, parsed for the declared parameter types
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,
        /// Library path or name (defaults to the probe library)
        #[arg(long)]
        library: Option<String>,
        /// Take ownership of this many bytes of a returned buffer
        #[arg(long)]
        buffer_len: Option<usize>,
        /// Resolve against the probes linked into probefi itself
        #[arg(long, conflicts_with = "library")]
        in_process: bool,
    },
    /// Run an oracle suite and report mismatches
    Verify {
        /// Suite file (defaults to probefi.toml's verify.suite, then the built-in suite)
        #[arg(long)]
        suite: Option<PathBuf>,
        /// Library path or name (defaults to the probe library)
        #[arg(long)]
        library: Option<String>,
        /// Report format
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,
        /// Run against the probes linked into probefi itself
        #[arg(long, conflicts_with = "library")]
        in_process: bool,
    },
    /// List the exported probes
    List,
    /// Show configuration and library resolution status
    Doctor {
        /// Library path or name to check
        #[arg(long)]
        library: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let (manifest, project_dir) = load_manifest_optional(&cwd)?;
    logging::init_with_config(&LogConfig::resolve(manifest.as_ref().map(|m| &m.log)));
    if let Some(dir) = &project_dir {
        debug!(dir = %dir.display(), "using probefi.toml");
    }
    let project_dir = project_dir.unwrap_or(cwd);

    match cli.command {
        Commands::Call {
            signature,
            args,
            library,
            buffer_len,
            in_process,
        } => {
            if in_process {
                let table = commands::in_process_table();
                return commands::call::run(&table, &signature, &args, buffer_len);
            }
            let choice = commands::choose_library(
                library.as_deref(),
                manifest.as_ref(),
                &project_dir,
                commands::PROBE_LIBRARY,
            );
            let lib = commands::open_library(&choice, commands::bind_mode(manifest.as_ref())?)?;
            commands::call::run(&lib, &signature, &args, buffer_len)
        }

        Commands::Verify {
            suite,
            library,
            format,
            in_process,
        } => {
            let suite_path = suite.or_else(|| manifest.as_ref().and_then(|m| m.suite_path(&project_dir)));
            let suite = commands::verify::load_suite(suite_path.as_deref())?;
            let format = match (format, manifest.as_ref().and_then(|m| m.verify.format.as_deref())) {
                (Some(format), _) => format,
                (None, Some(value)) => ReportFormat::from_manifest(value)?,
                (None, None) => ReportFormat::Text,
            };
            if in_process {
                let table = commands::in_process_table();
                return commands::verify::run(&table, &suite, format);
            }
            let fallback = suite.suite.library.as_deref().unwrap_or(commands::PROBE_LIBRARY);
            let choice =
                commands::choose_library(library.as_deref(), manifest.as_ref(), &project_dir, fallback);
            let lib = commands::open_library(&choice, commands::bind_mode(manifest.as_ref())?)?;
            commands::verify::run(&lib, &suite, format)
        }

        Commands::List => commands::list::run(),

        Commands::Doctor { library } => commands::doctor::run(&project_dir, library.as_deref()),
    }
}

/// Try to load a manifest from the current directory upward. Returns (None, None) if not found.
fn load_manifest_optional(cwd: &Path) -> anyhow::Result<(Option<ProbefiManifest>, Option<PathBuf>)> {
    match ProbefiManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}
