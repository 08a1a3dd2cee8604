//! PEP 723 inline script metadata parsing
//!
//! PEP 723 defines a comment-delimited metadata block for single-file
//! Python scripts:
//!
//! ```python
//! # /// script
//! # requires-python = ">=3.11"
//! # dependencies = ["requests==2.32.5"]
//! # ///
//! ```
//!
//! This is *pure parsing*: the block is located, the comment framing is
//! stripped, and the payload is handed to the `toml` crate. Nothing is
//! executed. Only `requires-python` and `dependencies` are surfaced;
//! other keys in the block are ignored.

use anyhow::{Result, bail};
use serde::Serialize;

const START_MARKER: &str = "# /// script";
const END_MARKER: &str = "# ///";

/// Parsed metadata from a PEP 723 `# /// script` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pep723Metadata {
    /// The `requires-python` specifier, when present
    #[serde(rename = "requiresPython")]
    pub requires_python: Option<String>,
    /// Declared dependency requirement strings
    pub dependencies: Vec<String>,
    /// Raw TOML payload with the comment framing removed
    #[serde(skip)]
    pub raw_toml: String,
}

/// Extract the TOML payload of the first `# /// script` block.
///
/// Returns `None` when no block exists. A start marker without its end
/// marker, or a non-comment line inside the block, is an error.
pub fn extract_script_toml(source: &str) -> Result<Option<String>> {
    let mut lines = source.lines();
    for line in lines.by_ref() {
        if line.trim() == START_MARKER {
            let mut payload = Vec::new();
            for line in lines.by_ref() {
                if line.trim() == END_MARKER {
                    return Ok(Some(payload.join("\n")));
                }
                let raw = line.trim_start();
                let Some(content) = raw.strip_prefix('#') else {
                    bail!("PEP 723 block lines must be comments starting with '#'");
                };
                payload.push(content.strip_prefix(' ').unwrap_or(content).to_string());
            }
            bail!("PEP 723 block start found but end marker '# ///' missing");
        }
    }
    Ok(None)
}

/// Parse the first `# /// script` block of a Python source file.
///
/// Returns `None` when the file carries no block; malformed blocks and
/// badly typed fields are errors.
pub fn parse_script_metadata(source: &str) -> Result<Option<Pep723Metadata>> {
    let Some(raw_toml) = extract_script_toml(source)? else {
        return Ok(None);
    };

    let table: toml::Table = toml::from_str(&raw_toml)
        .map_err(|e| anyhow::anyhow!("invalid TOML in PEP 723 block: {e}"))?;

    let requires_python = match table.get("requires-python") {
        None => None,
        Some(toml::Value::String(s)) => Some(s.clone()),
        Some(_) => bail!("requires-python must be a string"),
    };

    let dependencies = match table.get("dependencies") {
        None => Vec::new(),
        Some(toml::Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                toml::Value::String(s) => Ok(s.clone()),
                _ => bail!("dependencies array must contain only strings"),
            })
            .collect::<Result<Vec<String>>>()?,
        Some(_) => bail!("dependencies must be a TOML array"),
    };

    Ok(Some(Pep723Metadata { requires_python, dependencies, raw_toml }))
}
