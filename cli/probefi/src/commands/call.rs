//! `probefi call`: call one function through the bridge.

use anyhow::{Context, Result};
use probefi_bridge::{SymbolSource, Value};
use tracing::warn;

/// Import `signature` from `source`, call it with `args` parsed for the
/// declared parameter types, and render the result.
///
/// With `buffer_len`, the function must return a C-allocated buffer of at
/// least `buffer_len` bytes; those bytes are rendered and the buffer is
/// released.
pub fn render<S: SymbolSource + ?Sized>(
    source: &S,
    signature: &str,
    args: &[String],
    buffer_len: Option<usize>,
) -> Result<String> {
    // The declaration comes from the user and cannot be checked against
    // the symbol's real definition.
    let function = unsafe { source.import(signature) }
        .with_context(|| format!("importing '{signature}' from {}", source.label()))?;

    let params = &function.signature().params;
    let values = args
        .iter()
        .enumerate()
        .map(|(i, text)| match params.get(i) {
            Some(&ty) => Value::parse_as(text, ty),
            None => Ok(Value::Str(text.clone())),
        })
        .collect::<probefi_bridge::Result<Vec<_>>>()?;

    match buffer_len {
        Some(len) => {
            // SAFETY: `--buffer-len` asserts the result is an owned
            // C-allocated block of at least `len` bytes, as with the
            // declaration itself.
            let buffer = unsafe { function.call_buffer(&values, len) }
                .with_context(|| format!("calling {}", function.name()))?;
            Ok(format!("\"{}\"", buffer.as_bytes().escape_ascii()))
        }
        None => {
            let result = function
                .call(&values)
                .with_context(|| format!("calling {}", function.name()))?;
            if matches!(result, Value::Pointer(p) if !p.is_null()) {
                warn!(
                    function = function.name(),
                    "pointer result is not released; pass --buffer-len to take ownership"
                );
            }
            Ok(result.to_string())
        }
    }
}

pub fn run<S: SymbolSource + ?Sized>(
    source: &S,
    signature: &str,
    args: &[String],
    buffer_len: Option<usize>,
) -> Result<()> {
    println!("{}", render(source, signature, args, buffer_len)?);
    Ok(())
}
