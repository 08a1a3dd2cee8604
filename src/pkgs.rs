//! Stable project-local package materialization
//!
//! Installed packages live in the content-addressed store under opaque
//! digest names. For humans (and for scripts that reference shared
//! assets) each package is also projected to a stable, readable path:
//!
//! ```text
//! .botpack/pkgs/@acme/thing@1.2.3/   ->  <store>/sha256:<hex>/
//! ```
//!
//! Ownership is tracked in `.botpack/state/pkgs.json` so the
//! materializer can tell its own outputs from foreign content. Foreign
//! content is never overwritten without `force`; owned-but-drifted
//! destinations are repaired; `clean` removes owned destinations whose
//! package is no longer desired, pruning empty parent directories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::lockfile::{Lockfile, split_package_key};
use crate::paths::ProjectDirs;
use crate::store::{LinkMode, Store, StoredTree, materialize, remove_any, tree_digest};
use crate::utils::fs::{atomic_write_text, to_canonical_json};

/// Result of one materialization pass, as path lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgsResult {
    /// Destinations created this pass
    pub created: Vec<String>,
    /// Destinations repaired or replaced
    pub updated: Vec<String>,
    /// Destinations removed by `clean`
    pub removed: Vec<String>,
    /// Destinations refused (foreign or modified content)
    pub conflicts: Vec<String>,
}

/// One owned destination in the state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PkgOwnership {
    pkg_key: String,
    integrity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<LinkMode>,
}

/// On-disk ownership map (`.botpack/state/pkgs.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PkgsState {
    version: i64,
    paths: BTreeMap<String, PkgOwnership>,
}

impl Default for PkgsState {
    fn default() -> Self {
        Self { version: 1, paths: BTreeMap::new() }
    }
}

fn load_state(path: &Path) -> PkgsState {
    let Ok(text) = fs::read_to_string(path) else {
        return PkgsState::default();
    };
    match serde_json::from_str::<PkgsState>(&text) {
        Ok(state) if state.version == 1 => state,
        _ => {
            warn!(path = %path.display(), "ignoring unreadable pkgs state");
            PkgsState::default()
        }
    }
}

/// Human-readable relative path for a package key.
///
/// `@acme/thing@1.2.3` keeps its scope as a directory:
/// `@acme/thing@1.2.3`.
pub fn pkg_key_relpath(pkg_key: &str) -> Result<PathBuf, crate::core::BotpackError> {
    let (name, version) = split_package_key(pkg_key)?;
    let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
    let Some((leaf, scope)) = parts.split_last() else {
        return Err(crate::core::BotpackError::Lockfile {
            reason: format!("invalid package key: {pkg_key:?}"),
        });
    };
    let mut out = PathBuf::new();
    for part in scope {
        out.push(part);
    }
    out.push(format!("{leaf}@{version}"));
    Ok(out)
}

/// Does `dest` already hold the desired content?
///
/// A symlink is correct when it resolves to the store entry; a directory
/// is correct when its tree digest matches the integrity.
fn is_correct(dest: &Path, integrity: &str, store_path: &Path) -> bool {
    if dest.is_symlink() {
        let Ok(target) = fs::read_link(dest) else {
            return false;
        };
        let resolved = if target.is_absolute() {
            target
        } else {
            dest.parent().map(|p| p.join(&target)).unwrap_or(target)
        };
        let resolved = resolved.canonicalize().unwrap_or(resolved);
        let store_path = store_path.canonicalize().unwrap_or_else(|_| store_path.to_path_buf());
        return resolved == store_path;
    }
    if dest.is_dir() {
        return tree_digest(dest).map(|d| d == integrity).unwrap_or(false);
    }
    false
}

/// Materialize every store-backed package in `lock` under
/// `.botpack/pkgs/`, honoring the ownership map.
pub fn materialize_pkgs(
    dirs: &ProjectDirs,
    lock: &Lockfile,
    mode: LinkMode,
    dry_run: bool,
    clean: bool,
    force: bool,
) -> anyhow::Result<PkgsResult> {
    let root = dirs.pkgs_dir();
    let store = Store::new(dirs.store_dir());
    let state_path = dirs.pkgs_state_path();

    let prev = load_state(&state_path);
    let mut next_paths: BTreeMap<String, PkgOwnership> = BTreeMap::new();
    let mut result = PkgsResult::default();

    // Desired destinations, keyed by path string for deterministic order.
    let mut desired: BTreeMap<String, (String, String)> = BTreeMap::new();
    for (pkg_key, pkg) in &lock.packages {
        let Some(integrity) = &pkg.integrity else {
            continue;
        };
        if store.get(integrity).is_none() {
            debug!(pkg_key = %pkg_key, "store entry missing; skipping materialization");
            continue;
        }
        // Do not resolve the destination: resolving would collapse an
        // existing symlink into the store path and corrupt the state key.
        let dest = root.join(pkg_key_relpath(pkg_key)?);
        desired.insert(dest.display().to_string(), (pkg_key.clone(), integrity.clone()));
    }

    for (dest_str, (pkg_key, integrity)) in &desired {
        let dest = PathBuf::from(dest_str);
        let store_path = store.entry_path(integrity);

        let prev_entry = prev.paths.get(dest_str);
        let owned = prev_entry.is_some();
        let pre_exists = dest.exists() || dest.is_symlink();

        if pre_exists {
            if !owned && !force {
                warn!(dest = %dest.display(), "refusing to overwrite foreign content");
                result.conflicts.push(dest_str.clone());
                continue;
            }
            if is_correct(&dest, integrity, &store_path) {
                next_paths.insert(
                    dest_str.clone(),
                    PkgOwnership {
                        pkg_key: pkg_key.clone(),
                        integrity: integrity.clone(),
                        mode: prev_entry.and_then(|e| e.mode),
                    },
                );
                continue;
            }
            // Owned but drifted or wrong content: repair.
        }

        let used = if dry_run {
            mode
        } else {
            materialize(
                &StoredTree { digest: integrity.clone(), path: store_path },
                &dest,
                mode,
            )?
        };

        if pre_exists {
            result.updated.push(dest_str.clone());
        } else {
            result.created.push(dest_str.clone());
        }
        next_paths.insert(
            dest_str.clone(),
            PkgOwnership { pkg_key: pkg_key.clone(), integrity: integrity.clone(), mode: Some(used) },
        );
    }

    if clean {
        for (dest_str, prev_entry) in &prev.paths {
            if next_paths.contains_key(dest_str) {
                continue;
            }
            let dest = PathBuf::from(dest_str);
            if !dest.exists() && !dest.is_symlink() {
                continue;
            }
            let store_path = store.entry_path(&prev_entry.integrity);
            if store_path.exists()
                && !force
                && !is_correct(&dest, &prev_entry.integrity, &store_path)
            {
                // Owned path was modified since we wrote it; keep it.
                result.conflicts.push(dest_str.clone());
                next_paths.insert(dest_str.clone(), prev_entry.clone());
                continue;
            }
            if !dry_run {
                remove_any(&dest)?;
                prune_empty_parents(&dest, &root);
            }
            result.removed.push(dest_str.clone());
        }
    }

    if !dry_run {
        let state = PkgsState { version: 1, paths: next_paths };
        atomic_write_text(&state_path, &to_canonical_json(&state)?)?;
    }

    Ok(result)
}

/// Remove now-empty ancestors of `path`, stopping at `stop`.
fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut cur = path.parent();
    while let Some(dir) = cur {
        if dir == stop || !dir.starts_with(stop) {
            return;
        }
        if fs::remove_dir(dir).is_err() {
            return;
        }
        cur = dir.parent();
    }
}
