//! `probefi list`: print the probe catalog.

use anyhow::Result;
use probefi_probes::{catalog, ProbeEntry};

pub fn render(entries: &[ProbeEntry]) -> String {
    let width = entries.iter().map(|e| e.symbol.len()).max().unwrap_or(0);
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "{:<9} {:<width$}  {}\n",
            entry.kind.to_string(),
            entry.symbol,
            entry.signature
        ));
    }
    out
}

pub fn run() -> Result<()> {
    let entries = catalog();
    print!("{}", render(&entries));
    println!("{} probes", entries.len());
    Ok(())
}
