//! Per-target sync engine with drift detection
//!
//! Sync projects first-party assets and installed package assets into a
//! target front-end's directory layout:
//!
//! | target     | root       |
//! |------------|------------|
//! | claude     | `.claude`  |
//! | amp        | `.agents`  |
//! | droid      | `.factory` |
//! | letta-code | `.letta`   |
//!
//! Output names are prefixed by provenance - `assets.<id>` for
//! first-party (or the sanitized assets name), `<scope>-<name>.<id>` for
//! packages - so assets from different sources never collide.
//!
//! The engine is drift-aware: every write records the output's SHA-256 in
//! the per-target sync state (`.botpack/state/sync-<target>.json`, v2).
//! On the next sync, an output whose current hash no longer matches that
//! last-known-good hash was modified by the user; the engine refuses to
//! overwrite it, carries the previous state entry forward, and records a
//! [`ConflictRecord`] for doctor/explain. `force` demotes conflicts to
//! plain updates.
//!
//! Per path, sync is atomic: a path either moves forward (staged write +
//! rename, state entry updated with the new hash) or stays at its
//! last-known-good bytes. A crash between file writes and the state
//! rewrite surfaces as drift on the next run, never as data loss.

pub mod letta;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::assets::{AssetIndex, scan_assets};
use crate::core::BotpackError;
use crate::lockfile::{Lockfile, split_package_key};
use crate::manifest::Manifest;
use crate::mcp::{build_mcp_servers, build_target_mcp_json, check_unique_fqids};
use crate::paths::ProjectDirs;
use crate::pkgs::materialize_pkgs;
use crate::store::Store;
use crate::trust::{TrustConfig, WORKSPACE_TRUST_KEY, check_mcp_server_trust};
use crate::utils::fs::{atomic_copy, atomic_write_text, canonical_json, sha256_bytes, sha256_file};

/// Where a projected path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// The first-party assets directory
    AssetsDir,
    /// An installed package
    Pkg,
}

/// Stable asset address for UX and diagnostics.
///
/// The rendered form is `<type>:<id>`, e.g. `skill:fetch_web`,
/// `command:pr-review`, `mcp:servers`, `letta-code:settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAddress {
    /// Asset type: skill, command, agent, mcp, letta-code
    pub asset_type: String,
    /// Asset id within the type
    pub asset_id: String,
    /// Which kind of source produced it
    pub source_type: SourceType,
    /// Package name, or `None` for first-party
    pub source_name: Option<String>,
}

impl AssetAddress {
    fn new(
        asset_type: &str,
        asset_id: &str,
        source_type: SourceType,
        source_name: Option<&str>,
    ) -> Self {
        Self {
            asset_type: asset_type.to_string(),
            asset_id: asset_id.to_string(),
            source_type,
            source_name: source_name.map(ToString::to_string),
        }
    }

    /// The stable `<type>:<id>` address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.asset_type, self.asset_id)
    }
}

/// A recorded conflict, persisted for doctor/explain consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    /// The output path in conflict
    pub path: String,
    /// Address of the asset that wanted the path, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_address: Option<AssetAddress>,
    /// Why the path conflicted
    pub reason: String,
    /// The last hash the tool wrote at this path, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_known_good_sha256: Option<String>,
}

/// Persisted shape of `.botpack/state/conflicts-<target>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConflictsFile {
    version: i64,
    conflicts: Vec<ConflictRecord>,
}

/// One path entry in the v2 sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathState {
    /// Source file for single-source outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Source files for aggregated outputs (mcp.json)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcs: Option<Vec<String>>,
    /// SHA-256 of the last tool-written content - the drift anchor
    pub sha256: String,
    /// Provenance kind
    pub source_type: SourceType,
    /// Package name for package-sourced outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// Stable asset address string
    pub asset_address: String,
}

/// Persisted shape of `.botpack/state/sync-<target>.json` (v2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncState {
    version: i64,
    target: String,
    assets_dir: String,
    paths: BTreeMap<String, PathState>,
}

/// Flags controlling one sync invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncFlags {
    /// Plan and report without touching the filesystem
    pub dry_run: bool,
    /// Remove outputs whose source has gone away
    pub clean: bool,
    /// Overwrite drifted outputs instead of conflicting
    pub force: bool,
}

/// Result of syncing one target.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    /// Target name
    pub target: String,
    /// Paths created
    pub created: Vec<String>,
    /// Paths updated
    pub updated: Vec<String>,
    /// Paths removed by clean
    pub removed: Vec<String>,
    /// Paths left untouched because they conflicted
    pub conflicts: Vec<String>,
    /// Reasons for MCP servers omitted by the trust gate
    pub blocked: Vec<String>,
    /// Detailed conflict records (also persisted)
    pub conflict_records: Vec<ConflictRecord>,
}

impl SyncResult {
    /// Did this sync finish without conflicts?
    pub fn clean_run(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Built-in root directory for a target.
fn default_target_root(target: &str) -> Option<&'static str> {
    match target {
        "claude" => Some(".claude"),
        "amp" => Some(".agents"),
        "droid" => Some(".factory"),
        "letta-code" => Some(".letta"),
        _ => None,
    }
}

/// Sync assets to a target. Main entry point of the engine.
pub fn sync(dirs: &ProjectDirs, target: &str, flags: SyncFlags) -> anyhow::Result<SyncResult> {
    let manifest = Manifest::load(&dirs.manifest_path())?;
    sync_with_manifest(dirs, &manifest, target, flags)
}

/// Sync with an already-loaded manifest.
pub fn sync_with_manifest(
    dirs: &ProjectDirs,
    manifest: &Manifest,
    target: &str,
    flags: SyncFlags,
) -> anyhow::Result<SyncResult> {
    let Some(default_root) = default_target_root(target) else {
        return Err(BotpackError::UnsupportedTarget { target: target.to_string() }.into());
    };

    let assets_dir = resolve_assets_dir(dirs, manifest);

    if target == "letta-code" {
        return letta::sync_letta_code(dirs, &assets_dir, flags);
    }

    let root_override = manifest.targets.get(target).and_then(|t| t.root.clone());
    let root_dir = dirs.root().join(root_override.as_deref().unwrap_or(default_root));

    let mut engine = TargetSync::new(dirs, manifest, target, root_dir, assets_dir, flags)?;
    engine.run()
}

/// Assets dir from the manifest, made absolute against the project root.
pub fn resolve_assets_dir(dirs: &ProjectDirs, manifest: &Manifest) -> PathBuf {
    let raw = Path::new(&manifest.assets.dir);
    if raw.is_absolute() { raw.to_path_buf() } else { dirs.root().join(raw) }
}

/// First-party output prefix: the sanitized assets name, or `assets`.
pub fn assets_prefix(manifest: &Manifest) -> String {
    match &manifest.assets.name {
        Some(name) if !name.is_empty() => sanitize_prefix(name),
        _ => "assets".to_string(),
    }
}

/// File-safe prefix for a package name: `@acme/quality` -> `acme-quality`.
pub fn sanitize_prefix(name: &str) -> String {
    name.replace('/', "-").replace('@', "")
}

/// One store-backed package participating in a sync.
struct PkgIndex {
    pkg_key: String,
    pkg_name: String,
    prefix: String,
    integrity: String,
    root: PathBuf,
    index: AssetIndex,
}

struct TargetSync<'a> {
    dirs: &'a ProjectDirs,
    manifest: &'a Manifest,
    target: String,
    root_dir: PathBuf,
    assets_dir: PathBuf,
    flags: SyncFlags,
    trust: TrustConfig,
    lock: Option<Lockfile>,
    assets_index: AssetIndex,
    pkg_indices: Vec<PkgIndex>,
    prev: BTreeMap<String, PathState>,
    next: BTreeMap<String, PathState>,
    result: SyncResult,
}

impl<'a> TargetSync<'a> {
    fn new(
        dirs: &'a ProjectDirs,
        manifest: &'a Manifest,
        target: &str,
        root_dir: PathBuf,
        assets_dir: PathBuf,
        flags: SyncFlags,
    ) -> anyhow::Result<Self> {
        let trust = TrustConfig::load(&dirs.trust_path())?;
        let lock_path = dirs.lock_path();
        let lock = if lock_path.exists() { Some(Lockfile::load(&lock_path)?) } else { None };

        let assets_index = scan_assets(&assets_dir);

        let store = Store::new(dirs.store_dir());
        let mut pkg_indices = Vec::new();
        if let Some(lock) = &lock {
            // BTreeMap iteration keeps packages in sorted key order.
            for (pkg_key, pkg) in &lock.packages {
                let Some(integrity) = &pkg.integrity else {
                    continue;
                };
                let Some(stored) = store.get(integrity) else {
                    // Store drift: nothing to project from. Surfaced by
                    // status, not fatal here.
                    warn!(pkg_key = %pkg_key, "store entry missing; package not synced");
                    continue;
                };
                let (pkg_name, _) = split_package_key(pkg_key)?;
                pkg_indices.push(PkgIndex {
                    pkg_key: pkg_key.clone(),
                    pkg_name: pkg_name.to_string(),
                    prefix: sanitize_prefix(pkg_name),
                    integrity: integrity.clone(),
                    index: scan_assets(&stored.path),
                    root: stored.path,
                });
            }
        }

        let prev = load_state(&dirs.sync_state_path(target));

        Ok(Self {
            dirs,
            manifest,
            target: target.to_string(),
            root_dir,
            assets_dir,
            flags,
            trust,
            lock,
            assets_index,
            pkg_indices,
            prev,
            next: BTreeMap::new(),
            result: SyncResult { target: target.to_string(), ..SyncResult::default() },
        })
    }

    fn run(&mut self) -> anyhow::Result<SyncResult> {
        // Stable project-local package roots first, so skill scripts can
        // reference them.
        if let Some(lock) = self.lock.clone() {
            let pr = materialize_pkgs(
                self.dirs,
                &lock,
                self.manifest.sync.link_mode,
                self.flags.dry_run,
                self.flags.clean,
                self.flags.force,
            )?;
            self.result.created.extend(pr.created);
            self.result.updated.extend(pr.updated);
            self.result.removed.extend(pr.removed);
            self.result.conflicts.extend(pr.conflicts);
        }

        self.sync_skills()?;
        self.sync_commands()?;
        self.sync_agents()?;
        self.sync_mcp()?;

        if self.flags.clean {
            self.clean_stale()?;
        }

        self.persist()?;

        info!(
            target = %self.target,
            created = self.result.created.len(),
            updated = self.result.updated.len(),
            conflicts = self.result.conflicts.len(),
            "sync finished"
        );
        Ok(std::mem::take(&mut self.result))
    }

    fn sync_skills(&mut self) -> anyhow::Result<()> {
        let first_party: Vec<(String, String)> = self
            .assets_index
            .skills
            .iter()
            .map(|s| (s.id.clone(), s.path.clone()))
            .collect();
        let prefix = assets_prefix(self.manifest);
        for (id, src) in first_party {
            let out = self.root_dir.join("skills").join(format!("{prefix}.{id}")).join("SKILL.md");
            let addr = AssetAddress::new("skill", &id, SourceType::AssetsDir, None);
            self.sync_one_file(&out, Path::new(&src), addr)?;
        }

        let pkg_files: Vec<(String, String, String, String)> = self
            .pkg_indices
            .iter()
            .flat_map(|p| {
                p.index
                    .skills
                    .iter()
                    .map(|s| (p.prefix.clone(), p.pkg_name.clone(), s.id.clone(), s.path.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (prefix, pkg_name, id, src) in pkg_files {
            let out = self.root_dir.join("skills").join(format!("{prefix}.{id}")).join("SKILL.md");
            let addr = AssetAddress::new("skill", &id, SourceType::Pkg, Some(&pkg_name));
            self.sync_one_file(&out, Path::new(&src), addr)?;
        }
        Ok(())
    }

    fn sync_commands(&mut self) -> anyhow::Result<()> {
        let first_party: Vec<(String, String)> = self
            .assets_index
            .commands
            .iter()
            .map(|c| (c.id.clone(), c.path.clone()))
            .collect();
        let prefix = assets_prefix(self.manifest);
        for (id, src) in first_party {
            let out = self.root_dir.join("commands").join(format!("{prefix}.{id}.md"));
            let addr = AssetAddress::new("command", &id, SourceType::AssetsDir, None);
            self.sync_one_file(&out, Path::new(&src), addr)?;
        }

        let pkg_files: Vec<(String, String, String, String)> = self
            .pkg_indices
            .iter()
            .flat_map(|p| {
                p.index
                    .commands
                    .iter()
                    .map(|c| (p.prefix.clone(), p.pkg_name.clone(), c.id.clone(), c.path.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (prefix, pkg_name, id, src) in pkg_files {
            let out = self.root_dir.join("commands").join(format!("{prefix}.{id}.md"));
            let addr = AssetAddress::new("command", &id, SourceType::Pkg, Some(&pkg_name));
            self.sync_one_file(&out, Path::new(&src), addr)?;
        }
        Ok(())
    }

    fn sync_agents(&mut self) -> anyhow::Result<()> {
        let first_party: Vec<(String, String)> = self
            .assets_index
            .agents
            .iter()
            .map(|a| (a.id.clone(), a.path.clone()))
            .collect();
        let prefix = assets_prefix(self.manifest);
        for (id, src) in first_party {
            let out = self.root_dir.join("agents").join(format!("{prefix}.{id}.md"));
            let addr = AssetAddress::new("agent", &id, SourceType::AssetsDir, None);
            self.sync_one_file(&out, Path::new(&src), addr)?;
        }

        let pkg_files: Vec<(String, String, String, String)> = self
            .pkg_indices
            .iter()
            .flat_map(|p| {
                p.index
                    .agents
                    .iter()
                    .map(|a| (p.prefix.clone(), p.pkg_name.clone(), a.id.clone(), a.path.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (prefix, pkg_name, id, src) in pkg_files {
            let out = self.root_dir.join("agents").join(format!("{prefix}.{id}.md"));
            let addr = AssetAddress::new("agent", &id, SourceType::Pkg, Some(&pkg_name));
            self.sync_one_file(&out, Path::new(&src), addr)?;
        }
        Ok(())
    }

    /// Drift-check one verbatim file projection and apply it.
    fn sync_one_file(
        &mut self,
        out: &Path,
        src: &Path,
        addr: AssetAddress,
    ) -> anyhow::Result<()> {
        let p_str = out.display().to_string();
        let prev_entry = self.prev.get(&p_str).cloned();
        let desired_hash = sha256_file(src)?;

        let exists = out.exists();
        let differs = exists && files_differ(src, out);

        if differs {
            if !self.flags.force && is_drifted(out, prev_entry.as_ref()) {
                debug!(path = %p_str, "conflict: output drifted");
                self.record_conflict(
                    &p_str,
                    Some(addr),
                    "target file modified since last sync",
                    prev_entry,
                );
                return Ok(());
            }
            if !self.flags.dry_run {
                atomic_copy(src, out)?;
            }
            self.result.updated.push(p_str.clone());
        } else if !exists {
            if !self.flags.dry_run {
                atomic_copy(src, out)?;
            }
            self.result.created.push(p_str.clone());
        }

        self.next.insert(
            p_str,
            PathState {
                src: Some(src.display().to_string()),
                srcs: None,
                sha256: desired_hash,
                source_type: addr.source_type,
                source_name: addr.source_name.clone(),
                asset_address: addr.address(),
            },
        );
        Ok(())
    }

    fn sync_mcp(&mut self) -> anyhow::Result<()> {
        let assets_servers_toml = self.assets_dir.join("mcp").join("servers.toml");
        let mut inputs: Vec<PathBuf> = Vec::new();
        if assets_servers_toml.exists() {
            inputs.push(assets_servers_toml.clone());
        }
        for pkg in &self.pkg_indices {
            let p = pkg.root.join("mcp").join("servers.toml");
            if p.exists() {
                inputs.push(p);
            }
        }
        if inputs.is_empty() {
            return Ok(());
        }

        let mut servers = Vec::new();

        // First-party servers are trust-gated exactly like package
        // servers, under the reserved workspace key.
        if assets_servers_toml.exists() {
            let prefix = assets_prefix(self.manifest);
            for server in build_mcp_servers(&prefix, &assets_servers_toml)? {
                let decision = check_mcp_server_trust(
                    &self.trust,
                    WORKSPACE_TRUST_KEY,
                    None,
                    &server.fqid,
                    server.needs_exec(),
                    !server.needs_exec(),
                );
                if !decision.ok {
                    self.result.blocked.push(decision.reason.unwrap_or_else(|| {
                        format!("{WORKSPACE_TRUST_KEY}: not trusted for {}", server.fqid)
                    }));
                    continue;
                }
                servers.push(server);
            }
        }

        let pkg_server_inputs: Vec<(String, String, Option<String>, PathBuf)> = self
            .pkg_indices
            .iter()
            .map(|p| {
                (
                    p.pkg_key.clone(),
                    p.pkg_name.clone(),
                    Some(p.integrity.clone()),
                    p.root.join("mcp").join("servers.toml"),
                )
            })
            .collect();
        for (pkg_key, pkg_name, integrity, servers_toml) in pkg_server_inputs {
            if !servers_toml.exists() {
                continue;
            }
            for server in build_mcp_servers(&pkg_name, &servers_toml)? {
                let decision = check_mcp_server_trust(
                    &self.trust,
                    &pkg_key,
                    integrity.as_deref(),
                    &server.fqid,
                    server.needs_exec(),
                    !server.needs_exec(),
                );
                if !decision.ok {
                    self.result.blocked.push(
                        decision
                            .reason
                            .unwrap_or_else(|| format!("{pkg_key}: not trusted for {}", server.fqid)),
                    );
                    continue;
                }
                servers.push(server);
            }
        }

        servers.sort_by(|a, b| a.fqid.cmp(&b.fqid));
        check_unique_fqids(&servers)?;

        let payload = canonical_json(&build_target_mcp_json(&servers));
        let desired_hash = sha256_bytes(payload.as_bytes());
        let mcp_out = self.root_dir.join("mcp.json");
        let p_str = mcp_out.display().to_string();
        let prev_entry = self.prev.get(&p_str).cloned();

        let mut srcs: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
        srcs.sort();
        let state = PathState {
            src: None,
            srcs: Some(srcs),
            sha256: desired_hash,
            source_type: SourceType::AssetsDir,
            source_name: None,
            asset_address: "mcp:servers".to_string(),
        };

        let existing = fs::read_to_string(&mcp_out).ok();
        match existing {
            Some(current) if current != payload => {
                if !self.flags.force && is_drifted(&mcp_out, prev_entry.as_ref()) {
                    self.record_conflict(
                        &p_str,
                        Some(AssetAddress::new("mcp", "servers", SourceType::AssetsDir, None)),
                        "mcp.json modified since last sync",
                        prev_entry,
                    );
                    return Ok(());
                }
                if !self.flags.dry_run {
                    atomic_write_text(&mcp_out, &payload)?;
                }
                self.result.updated.push(p_str.clone());
                self.next.insert(p_str, state);
            }
            Some(_) => {
                // Up to date; keep it in state.
                self.next.insert(p_str, state);
            }
            None => {
                if !self.flags.dry_run {
                    atomic_write_text(&mcp_out, &payload)?;
                }
                self.result.created.push(p_str.clone());
                self.next.insert(p_str, state);
            }
        }
        Ok(())
    }

    fn clean_stale(&mut self) -> anyhow::Result<()> {
        let stale: Vec<(String, Option<PathState>)> = self
            .prev
            .iter()
            .filter(|(p, _)| !self.next.contains_key(*p))
            .map(|(p, e)| (p.clone(), Some(e.clone())))
            .collect();
        for (p_str, prev_entry) in stale {
            let path = PathBuf::from(&p_str);
            if !path.exists() {
                continue;
            }
            if !self.flags.force && is_drifted(&path, prev_entry.as_ref()) {
                self.record_conflict(
                    &p_str,
                    None,
                    "stale file modified since last sync",
                    prev_entry,
                );
                continue;
            }
            if self.flags.dry_run {
                self.result.removed.push(p_str);
                continue;
            }
            if fs::remove_file(&path).is_ok() {
                self.result.removed.push(p_str);
            }
        }
        Ok(())
    }

    fn record_conflict(
        &mut self,
        path: &str,
        addr: Option<AssetAddress>,
        reason: &str,
        prev_entry: Option<PathState>,
    ) {
        self.result.conflicts.push(path.to_string());
        self.result.conflict_records.push(ConflictRecord {
            path: path.to_string(),
            asset_address: addr,
            reason: reason.to_string(),
            last_known_good_sha256: prev_entry.as_ref().map(|e| e.sha256.clone()),
        });
        // Preserve the last-known-good entry so a later sync can still
        // tell drift from foreign content.
        if let Some(entry) = prev_entry {
            self.next.insert(path.to_string(), entry);
        }
    }

    fn persist(&mut self) -> anyhow::Result<()> {
        if self.flags.dry_run {
            return Ok(());
        }
        let state = SyncState {
            version: 2,
            target: self.target.clone(),
            assets_dir: self.assets_dir.display().to_string(),
            paths: std::mem::take(&mut self.next),
        };
        write_state(&self.dirs.sync_state_path(&self.target), &state)?;

        let conflicts_path = self.dirs.conflicts_path(&self.target);
        if self.result.conflict_records.is_empty() {
            let _ = fs::remove_file(&conflicts_path);
        } else {
            let file =
                ConflictsFile { version: 1, conflicts: self.result.conflict_records.clone() };
            atomic_write_text(
                &conflicts_path,
                &crate::utils::fs::to_canonical_json(&file)?,
            )?;
        }
        Ok(())
    }
}

/// Was `dst` modified since the last tool-managed write?
///
/// No previous entry means the file is foreign - treated as drifted. A
/// missing file is not drifted (there is nothing to protect).
fn is_drifted(dst: &Path, prev_entry: Option<&PathState>) -> bool {
    let Some(prev) = prev_entry else {
        return true;
    };
    if prev.sha256.is_empty() {
        return true;
    }
    match sha256_file(dst) {
        Ok(current) => current != prev.sha256,
        Err(_) => false,
    }
}

fn files_differ(src: &Path, dst: &Path) -> bool {
    match (fs::read(src), fs::read(dst)) {
        (Ok(a), Ok(b)) => a != b,
        _ => true,
    }
}

fn load_state(path: &Path) -> BTreeMap<String, PathState> {
    let Ok(text) = fs::read_to_string(path) else {
        return BTreeMap::new();
    };
    match serde_json::from_str::<SyncState>(&text) {
        Ok(state) if state.version == 2 => state.paths,
        _ => {
            warn!(path = %path.display(), "ignoring unreadable sync state");
            BTreeMap::new()
        }
    }
}

fn write_state(path: &Path, state: &SyncState) -> anyhow::Result<()> {
    atomic_write_text(path, &crate::utils::fs::to_canonical_json(state)?)
}

/// Load the persisted conflict records for a target, if any.
pub fn load_conflicts(dirs: &ProjectDirs, target: &str) -> Vec<ConflictRecord> {
    let path = dirs.conflicts_path(target);
    let Ok(text) = fs::read_to_string(&path) else {
        return Vec::new();
    };
    match serde_json::from_str::<ConflictsFile>(&text) {
        Ok(file) => file.conflicts,
        Err(_) => Vec::new(),
    }
}

/// Summary of a target's persisted sync state, for the status surface.
#[derive(Debug, Clone, Default)]
pub struct SyncStateSummary {
    /// Whether a state file exists and parsed
    pub exists: bool,
    /// Number of tracked paths
    pub paths_count: usize,
}

/// Read a target's sync state summary without touching outputs.
pub fn state_summary(dirs: &ProjectDirs, target: &str) -> SyncStateSummary {
    let path = dirs.sync_state_path(target);
    let Ok(text) = fs::read_to_string(&path) else {
        return SyncStateSummary::default();
    };
    match serde_json::from_str::<SyncState>(&text) {
        Ok(state) if state.version == 2 => {
            SyncStateSummary { exists: true, paths_count: state.paths.len() }
        }
        _ => SyncStateSummary::default(),
    }
}

/// Targets the engine knows how to project.
pub const KNOWN_TARGETS: [&str; 4] = ["claude", "amp", "droid", "letta-code"];
