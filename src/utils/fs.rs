//! File system utilities
//!
//! Safe, atomic file operations shared by every module that persists
//! state. All writes here follow the same discipline: stage into a
//! `.tmp` sibling, then rename over the destination, so a reader never
//! observes a partially written file.
//!
//! Canonical JSON is also defined here because every JSON artifact
//! Botpack owns (lockfile, sync state, conflict records, catalog, MCP
//! documents) shares one formatting contract: recursively sorted object
//! keys, 2-space indent, UTF-8 kept unescaped, trailing newline.

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating parents as needed.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory {}", path.display()))
}

/// Atomically write bytes: stage into `<path>.tmp`, then rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = tmp_sibling(path);
    fs::write(&tmp, content)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to rename {} into place", tmp.display()))?;
    Ok(())
}

/// Atomically write a string.
pub fn atomic_write_text(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Atomically copy `src` to `dst` byte-for-byte.
pub fn atomic_copy(src: &Path, dst: &Path) -> Result<()> {
    let bytes =
        fs::read(src).with_context(|| format!("failed to read {}", src.display()))?;
    atomic_write(dst, &bytes)
}

/// SHA-256 of a file's content as lowercase hex (no prefix).
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of a byte slice as lowercase hex (no prefix).
pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Render a JSON value canonically: object keys sorted recursively,
/// 2-space indent, trailing newline.
///
/// Map ordering is normalized here rather than relying on the library's
/// serialization order, so equivalent values always produce identical
/// bytes.
pub fn canonical_json(value: &Value) -> String {
    let sorted = sort_value(value);
    let mut out = serde_json::to_string_pretty(&sorted).expect("JSON value serializes");
    out.push('\n');
    out
}

/// Serialize any `Serialize` into canonical JSON text.
pub fn to_canonical_json<T: serde::Serialize>(value: &T) -> Result<String> {
    let v = serde_json::to_value(value).context("failed to convert value to JSON")?;
    Ok(canonical_json(&v))
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), sort_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

/// `<path>.tmp` sibling used by the atomic write discipline.
pub fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_leaves_no_tmp() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("state").join("file.json");
        atomic_write_text(&target, "{}\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "{}\n");
        assert!(!tmp_sibling(&target).exists());
    }

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let v = json!({
            "zeta": {"b": 2, "a": 1},
            "alpha": [{"y": true, "x": false}]
        });
        let text = canonical_json(&v);
        let alpha = text.find("\"alpha\"").unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        assert!(alpha < zeta);
        let x = text.find("\"x\"").unwrap();
        let y = text.find("\"y\"").unwrap();
        assert!(x < y);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn canonical_json_is_stable() {
        let a = json!({"b": 1, "a": {"d": 4, "c": 3}});
        let b = json!({"a": {"c": 3, "d": 4}, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn sha256_helpers_agree() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("f.txt");
        fs::write(&p, b"hello").unwrap();
        assert_eq!(sha256_file(&p).unwrap(), sha256_bytes(b"hello"));
    }
}
