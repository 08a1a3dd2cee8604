//! Stable issue IDs and the structured status surface
//!
//! Issues surfaced by `botpack status` get short, stable, copy/paste
//! friendly identifiers that `botpack explain <id>` resolves back into an
//! actionable description:
//!
//! - `conflict:<8-hex>` hashed over `target:path`
//! - `trust:<8-hex>` hashed over the package key
//! - `blocked:<8-hex>` hashed over the blocked reason
//!
//! The hash input includes every field that differentiates an issue;
//! pairwise collision at 2^-32 is accepted. Nothing here touches the
//! network - status is assembled purely from on-disk state, and
//! formatting is the CLI's concern.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::lockfile::Lockfile;
use crate::paths::ProjectDirs;
use crate::sync::{ConflictRecord, KNOWN_TARGETS, load_conflicts, state_summary};
use crate::trust::{TrustConfig, check_package_trust};

fn hash8(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))[..8].to_string()
}

/// Issue id for a sync conflict at `path` in `target`.
pub fn conflict_issue_id(target: &str, path: &str) -> String {
    format!("conflict:{}", hash8(&format!("{target}:{path}")))
}

/// Issue id for a package awaiting trust.
pub fn trust_issue_id(pkg_key: &str) -> String {
    format!("trust:{}", hash8(pkg_key))
}

/// Issue id for a blocked MCP server (or similar denial).
pub fn blocked_issue_id(reason: &str) -> String {
    format!("blocked:{}", hash8(reason))
}

/// Status of one sync target.
#[derive(Debug, Clone, Default)]
pub struct TargetStatus {
    /// Target name
    pub name: String,
    /// Whether a v2 state file exists
    pub state_exists: bool,
    /// Number of tracked output paths
    pub paths_count: usize,
    /// Conflicted paths with their issue ids
    pub conflict_ids: BTreeMap<String, String>,
}

/// A locked package that declares capabilities it is not trusted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustGate {
    /// Package key (`name@version`)
    pub pkg_key: String,
    /// Package declares exec
    pub needs_exec: bool,
    /// Package declares mcp
    pub needs_mcp: bool,
    /// Stable issue id
    pub issue_id: String,
}

/// A conflict record annotated with its target and issue id.
#[derive(Debug, Clone)]
pub struct ConflictDetail {
    /// Target the conflict belongs to
    pub target: String,
    /// The underlying record
    pub record: ConflictRecord,
}

/// Aggregated, network-free status for a project root.
#[derive(Debug, Clone, Default)]
pub struct StatusInfo {
    /// Project root
    pub root: PathBuf,
    /// Manifest location
    pub manifest_path: PathBuf,
    /// Whether the manifest exists
    pub manifest_exists: bool,
    /// Lockfile location
    pub lock_path: PathBuf,
    /// Whether the lockfile exists
    pub lock_exists: bool,
    /// `botpackVersion` recorded in the lockfile
    pub lock_version: Option<String>,
    /// Number of locked packages
    pub packages_count: usize,
    /// Per-target status keyed by target name
    pub targets: BTreeMap<String, TargetStatus>,
    /// Conflict details keyed by issue id
    pub conflicts: BTreeMap<String, ConflictDetail>,
    /// Packages awaiting trust
    pub trust_gates: Vec<TrustGate>,
    /// Problems reading state (bad lockfile, bad manifest)
    pub errors: Vec<String>,
}

impl StatusInfo {
    /// Anything actionable?
    pub fn has_issues(&self) -> bool {
        !self.conflicts.is_empty() || !self.trust_gates.is_empty() || !self.errors.is_empty()
    }
}

/// Collect status from on-disk state only.
pub fn collect_status(dirs: &ProjectDirs) -> StatusInfo {
    let manifest_path = dirs.manifest_path();
    let lock_path = dirs.lock_path();

    let mut info = StatusInfo {
        root: dirs.root().to_path_buf(),
        manifest_exists: manifest_path.exists(),
        manifest_path,
        lock_exists: lock_path.exists(),
        lock_path: lock_path.clone(),
        ..StatusInfo::default()
    };

    let lock = if info.lock_exists {
        match Lockfile::load(&lock_path) {
            Ok(lock) => {
                info.lock_version = Some(lock.botpack_version.clone());
                info.packages_count = lock.packages.len();
                Some(lock)
            }
            Err(e) => {
                info.errors.push(e.to_string());
                None
            }
        }
    } else {
        None
    };

    for target in KNOWN_TARGETS {
        let summary = state_summary(dirs, target);
        let mut status = TargetStatus {
            name: target.to_string(),
            state_exists: summary.exists,
            paths_count: summary.paths_count,
            conflict_ids: BTreeMap::new(),
        };
        for record in load_conflicts(dirs, target) {
            let id = conflict_issue_id(target, &record.path);
            status.conflict_ids.insert(record.path.clone(), id.clone());
            info.conflicts.insert(id, ConflictDetail { target: target.to_string(), record });
        }
        info.targets.insert(target.to_string(), status);
    }

    if let Some(lock) = &lock {
        match TrustConfig::load(&dirs.trust_path()) {
            Ok(trust) => {
                info.trust_gates = trust_gates(&trust, lock);
            }
            Err(e) => info.errors.push(e.to_string()),
        }
    }

    info
}

/// Packages in the lock whose declared capabilities lack trust.
pub fn trust_gates(trust: &TrustConfig, lock: &Lockfile) -> Vec<TrustGate> {
    let mut gates = Vec::new();
    for (pkg_key, pkg) in &lock.packages {
        let needs_exec = pkg.capability("exec");
        let needs_mcp = pkg.capability("mcp");
        if !needs_exec && !needs_mcp {
            continue;
        }
        let decision =
            check_package_trust(trust, pkg_key, pkg.integrity.as_deref(), needs_exec, needs_mcp);
        if !decision.ok {
            gates.push(TrustGate {
                pkg_key: pkg_key.clone(),
                needs_exec,
                needs_mcp,
                issue_id: trust_issue_id(pkg_key),
            });
        }
    }
    gates
}

/// Resolve an issue id back to an actionable description.
///
/// Returns `None` for ids that do not match any current issue.
pub fn explain(info: &StatusInfo, issue_id: &str) -> Option<String> {
    if let Some(detail) = info.conflicts.get(issue_id) {
        let mut out = format!(
            "Sync conflict in target '{}':\n  path: {}\n  reason: {}",
            detail.target, detail.record.path, detail.record.reason
        );
        if let Some(addr) = &detail.record.asset_address {
            out.push_str(&format!("\n  asset: {}", addr.address()));
        }
        if let Some(sha) = &detail.record.last_known_good_sha256 {
            out.push_str(&format!("\n  last known good sha256: {sha}"));
        }
        out.push_str(&format!(
            "\n  fix: review the file, then re-run 'botpack sync --target {} --force' to overwrite it",
            detail.target
        ));
        return Some(out);
    }

    if let Some(gate) = info.trust_gates.iter().find(|g| g.issue_id == issue_id) {
        let mut needs = Vec::new();
        if gate.needs_exec {
            needs.push("allowExec = true");
        }
        if gate.needs_mcp {
            needs.push("allowMcp = true");
        }
        return Some(format!(
            "Package '{}' declares capabilities that are not trusted.\n  fix: add to .botpack/trust.toml:\n  [\"{}\"]\n  {}",
            gate.pkg_key,
            gate.pkg_key,
            needs.join("\n  ")
        ));
    }

    None
}
