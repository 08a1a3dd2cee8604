//! Path and git dependency acquisition
//!
//! Fetching turns a declared dependency into a local directory tree the
//! store can ingest, plus the free-form `resolved` detail recorded in the
//! lockfile.
//!
//! - **path** dependencies resolve relative to the manifest and must point
//!   at an existing directory; there is nothing to cache.
//! - **git** dependencies clone into a per-source cache directory
//!   (`<cache>/git/<safe(url)>-<rev>`) staged via `.tmp` + rename. The
//!   resolved 40-char commit is captured with `git rev-parse HEAD` on
//!   *every* fetch - including cache hits - so the lockfile stays
//!   deterministic.
//!
//! Offline mode never transitions a dependency from uncached to fetched:
//! a cache hit succeeds (with the trailing commit read), a miss is the
//! distinct [`BotpackError::OfflineCacheMiss`].
//!
//! Git is driven through the system binary (discovered with `which`), not
//! a bundled implementation, so the user's existing authentication setup
//! applies.

use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::BotpackError;
use crate::store::remove_any;
use crate::utils::fs::tmp_sibling;

/// A fetched dependency tree plus the detail recorded as
/// `Package.resolved`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTree {
    /// Local directory holding the dependency content
    pub path: PathBuf,
    /// Free-form resolution detail for the lockfile
    pub resolved: BTreeMap<String, Value>,
}

/// Resolve a path dependency against the manifest directory.
pub fn fetch_path(path_spec: &str, base_dir: &Path) -> Result<FetchedTree, BotpackError> {
    let raw = Path::new(path_spec);
    let p = if raw.is_absolute() { raw.to_path_buf() } else { base_dir.join(raw) };
    let p = p.canonicalize().unwrap_or(p);
    if !p.is_dir() {
        return Err(BotpackError::PathDependencyNotFound { path: p.display().to_string() });
    }
    let mut resolved = BTreeMap::new();
    resolved.insert("type".to_string(), json!("path"));
    resolved.insert("path".to_string(), json!(p.display().to_string()));
    Ok(FetchedTree { path: p, resolved })
}

/// Fetch a git dependency through the per-source cache.
///
/// Cached checkouts are reused as-is; the commit is still re-read so the
/// lockfile records it. Fresh clones stage into `<dir>.tmp` and rename.
pub async fn fetch_git(
    url: &str,
    rev: Option<&str>,
    cache_dir: &Path,
    offline: bool,
) -> Result<FetchedTree, BotpackError> {
    which::which("git").map_err(|_| BotpackError::GitNotFound)?;

    std::fs::create_dir_all(cache_dir)?;

    let rev_label = rev.unwrap_or("HEAD");
    let checkout_dir = cache_dir.join(format!("{}-{rev_label}", safe_dir_name(url)));

    if checkout_dir.is_dir() {
        debug!(url, rev = rev_label, "git cache hit");
        let commit = rev_parse_head(&checkout_dir).await?;
        return Ok(FetchedTree {
            path: checkout_dir,
            resolved: git_resolved(url, rev_label, &commit),
        });
    }

    if offline {
        return Err(BotpackError::OfflineCacheMiss {
            url: url.to_string(),
            rev: rev_label.to_string(),
        });
    }

    let tmp = tmp_sibling(&checkout_dir);
    remove_any(&tmp).map_err(|e| BotpackError::Other { message: e.to_string() })?;

    info!(url, rev = rev_label, "cloning");
    run_git(&["clone", "--quiet", url, &tmp.display().to_string()], None, "clone").await?;
    if let Some(rev) = rev {
        run_git(&["checkout", "--quiet", rev], Some(&tmp), "checkout").await?;
    }

    std::fs::rename(&tmp, &checkout_dir)?;
    let commit = rev_parse_head(&checkout_dir).await?;
    Ok(FetchedTree { path: checkout_dir, resolved: git_resolved(url, rev_label, &commit) })
}

fn git_resolved(url: &str, rev: &str, commit: &str) -> BTreeMap<String, Value> {
    let mut resolved = BTreeMap::new();
    resolved.insert("type".to_string(), json!("git"));
    resolved.insert("url".to_string(), json!(url));
    resolved.insert("rev".to_string(), json!(rev));
    resolved.insert("commit".to_string(), json!(commit));
    resolved
}

async fn rev_parse_head(repo: &Path) -> Result<String, BotpackError> {
    let out = run_git(&["rev-parse", "HEAD"], Some(repo), "rev-parse").await?;
    Ok(out.trim().to_string())
}

async fn run_git(
    args: &[&str],
    cwd: Option<&Path>,
    operation: &str,
) -> Result<String, BotpackError> {
    let mut cmd = Command::new("git");
    if let Some(cwd) = cwd {
        cmd.arg("-C").arg(cwd);
    }
    cmd.args(args);
    let output = cmd.output().await.map_err(|e| BotpackError::GitCommand {
        operation: operation.to_string(),
        stderr: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(BotpackError::GitCommand {
            operation: operation.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Stable, filesystem-safe cache directory name for a source URL.
fn safe_dir_name(url: &str) -> String {
    url.replace("://", "_").replace('/', "_").replace('@', "_")
}
