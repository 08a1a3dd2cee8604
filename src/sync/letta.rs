//! Letta Code target materialization
//!
//! The `letta-code` target is a thin variant of the sync engine: instead
//! of projecting individual asset files it maintains exactly one managed
//! document, `.letta/settings.json`, stamped with a
//! `_botpack: {managed: true, version: 1}` sentinel.
//!
//! Two rules are absolute:
//! - `.letta/settings.local.json` (user-local bindings and caches) is
//!   NEVER written, under any flag
//! - an existing `settings.json` without the managed sentinel belongs to
//!   the user and conflicts instead of being overwritten (unless forced)

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::paths::ProjectDirs;
use crate::sync::{
    AssetAddress, ConflictRecord, PathState, SourceType, SyncFlags, SyncResult,
};
use crate::utils::fs::{atomic_write_text, canonical_json, sha256_bytes};

/// Sync state target name for Letta Code.
const TARGET: &str = "letta-code";

/// Managed configuration written to `.letta/settings.json`.
///
/// Everything here is shared, Git-trackable configuration; user-local
/// overrides belong in `settings.local.json`, which Botpack never
/// touches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LettaSettings {
    /// Default Letta API URL
    pub api_url: Option<String>,
    /// Default agent name
    pub default_agent: Option<String>,
    /// Memory block labels to auto-load
    pub memory_blocks: Vec<String>,
    /// MCP server ids to enable
    pub mcp_servers: Vec<String>,
    /// Default model
    pub model: Option<String>,
    /// Additional settings carried verbatim
    pub custom: BTreeMap<String, Value>,
}

impl LettaSettings {
    /// Render the managed document body, sentinel included.
    fn to_document(&self) -> Value {
        let mut out = Map::new();
        if let Some(v) = &self.api_url {
            out.insert("api_url".to_string(), json!(v));
        }
        if let Some(v) = &self.default_agent {
            out.insert("default_agent".to_string(), json!(v));
        }
        if !self.memory_blocks.is_empty() {
            out.insert("memory_blocks".to_string(), json!(self.memory_blocks));
        }
        if !self.mcp_servers.is_empty() {
            out.insert("mcp_servers".to_string(), json!(self.mcp_servers));
        }
        if let Some(v) = &self.model {
            out.insert("model".to_string(), json!(v));
        }
        for (k, v) in &self.custom {
            out.insert(k.clone(), v.clone());
        }
        out.insert("_botpack".to_string(), json!({"managed": true, "version": 1}));
        Value::Object(out)
    }
}

/// Outcome of materializing the Letta settings.
#[derive(Debug, Clone, Default)]
pub struct LettaMaterializeResult {
    /// Files created
    pub created: Vec<String>,
    /// Files updated
    pub updated: Vec<String>,
    /// Files deliberately left alone (settings.local.json)
    pub preserved: Vec<String>,
    /// Conflict descriptions
    pub conflicts: Vec<String>,
}

/// Write `.letta/settings.json`, preserving `settings.local.json`.
pub fn materialize_letta_settings(
    root: &Path,
    settings: &LettaSettings,
    dry_run: bool,
    force: bool,
) -> anyhow::Result<LettaMaterializeResult> {
    let mut result = LettaMaterializeResult::default();
    let letta_dir = root.join(".letta");
    let settings_path = letta_dir.join("settings.json");
    let local_path = letta_dir.join("settings.local.json");

    if local_path.exists() {
        result.preserved.push(local_path.display().to_string());
    }

    let desired = canonical_json(&settings.to_document());

    let existing: Option<Value> =
        fs::read_to_string(&settings_path).ok().and_then(|t| serde_json::from_str(&t).ok());

    match existing {
        Some(existing) => {
            if canonical_json(&existing) == desired {
                debug!(path = %settings_path.display(), "letta settings up to date");
                return Ok(result);
            }
            let managed = existing
                .get("_botpack")
                .and_then(|m| m.get("managed"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !managed && !force {
                result.conflicts.push(format!(
                    "{}: modified outside botpack; use --force to overwrite",
                    settings_path.display()
                ));
                return Ok(result);
            }
            if !dry_run {
                atomic_write_text(&settings_path, &desired)?;
            }
            result.updated.push(settings_path.display().to_string());
        }
        None => {
            if !dry_run {
                atomic_write_text(&settings_path, &desired)?;
            }
            result.created.push(settings_path.display().to_string());
        }
    }
    Ok(result)
}

/// Sync entry point for the `letta-code` target.
///
/// Wraps settings materialization in the standard sync bookkeeping:
/// state entries for the managed document, conflict records, and the
/// conflicts file lifecycle.
pub fn sync_letta_code(
    dirs: &ProjectDirs,
    assets_dir: &Path,
    flags: SyncFlags,
) -> anyhow::Result<SyncResult> {
    let settings = LettaSettings::default();
    let mat =
        materialize_letta_settings(dirs.root(), &settings, flags.dry_run, flags.force)?;

    let mut result = SyncResult { target: TARGET.to_string(), ..SyncResult::default() };
    result.created = mat.created.clone();
    result.updated = mat.updated.clone();

    let settings_path = dirs.root().join(".letta").join("settings.json");
    let settings_str = settings_path.display().to_string();

    let state_path = dirs.sync_state_path(TARGET);
    let prev_paths = load_prev_paths(&state_path);

    for reason in &mat.conflicts {
        result.conflicts.push(settings_str.clone());
        let last_good = prev_paths.get(&settings_str).map(|e| e.sha256.clone());
        result.conflict_records.push(ConflictRecord {
            path: settings_str.clone(),
            asset_address: Some(AssetAddress {
                asset_type: "letta-code".to_string(),
                asset_id: "settings".to_string(),
                source_type: SourceType::AssetsDir,
                source_name: None,
            }),
            reason: reason.clone(),
            last_known_good_sha256: last_good,
        });
    }

    // Carry prior entries forward; refresh the managed document's hash
    // when this run wrote it.
    let mut next_paths = prev_paths;
    let wrote = result.created.contains(&settings_str) || result.updated.contains(&settings_str);
    if !flags.dry_run && wrote {
        if let Ok(bytes) = fs::read(&settings_path) {
            next_paths.insert(
                settings_str.clone(),
                PathState {
                    src: None,
                    srcs: None,
                    sha256: sha256_bytes(&bytes),
                    source_type: SourceType::AssetsDir,
                    source_name: None,
                    asset_address: "letta-code:settings".to_string(),
                },
            );
        }
    }

    if !flags.dry_run {
        persist(dirs, assets_dir, next_paths, &result)?;
    }
    Ok(result)
}

fn load_prev_paths(state_path: &Path) -> BTreeMap<String, PathState> {
    #[derive(serde::Deserialize)]
    struct State {
        version: i64,
        paths: BTreeMap<String, PathState>,
    }
    let Ok(text) = fs::read_to_string(state_path) else {
        return BTreeMap::new();
    };
    match serde_json::from_str::<State>(&text) {
        Ok(s) if s.version == 2 => s.paths,
        _ => BTreeMap::new(),
    }
}

fn persist(
    dirs: &ProjectDirs,
    assets_dir: &Path,
    paths: BTreeMap<String, PathState>,
    result: &SyncResult,
) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct State<'a> {
        version: i64,
        target: &'a str,
        assets_dir: String,
        paths: &'a BTreeMap<String, PathState>,
    }
    let state = State {
        version: 2,
        target: TARGET,
        assets_dir: assets_dir.display().to_string(),
        paths: &paths,
    };
    atomic_write_text(
        &dirs.sync_state_path(TARGET),
        &crate::utils::fs::to_canonical_json(&state)?,
    )?;

    let conflicts_path = dirs.conflicts_path(TARGET);
    if result.conflict_records.is_empty() {
        let _ = fs::remove_file(&conflicts_path);
    } else {
        #[derive(serde::Serialize)]
        struct ConflictsFile<'a> {
            version: i64,
            conflicts: &'a [ConflictRecord],
        }
        let file = ConflictsFile { version: 1, conflicts: &result.conflict_records };
        atomic_write_text(&conflicts_path, &crate::utils::fs::to_canonical_json(&file)?)?;
    }
    Ok(())
}

/// Destination the managed settings document lives at.
pub fn settings_path(root: &Path) -> PathBuf {
    root.join(".letta").join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_managed_settings_with_sentinel() {
        let tmp = TempDir::new().unwrap();
        let r = materialize_letta_settings(tmp.path(), &LettaSettings::default(), false, false)
            .unwrap();
        assert_eq!(r.created.len(), 1);

        let text = fs::read_to_string(settings_path(tmp.path())).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["_botpack"]["managed"], json!(true));
        assert_eq!(doc["_botpack"]["version"], json!(1));
    }

    #[test]
    fn second_run_is_noop() {
        let tmp = TempDir::new().unwrap();
        materialize_letta_settings(tmp.path(), &LettaSettings::default(), false, false).unwrap();
        let r = materialize_letta_settings(tmp.path(), &LettaSettings::default(), false, false)
            .unwrap();
        assert!(r.created.is_empty());
        assert!(r.updated.is_empty());
        assert!(r.conflicts.is_empty());
    }

    #[test]
    fn unmanaged_settings_conflict_unless_forced() {
        let tmp = TempDir::new().unwrap();
        let path = settings_path(tmp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{\"mine\": true}\n").unwrap();

        let r = materialize_letta_settings(tmp.path(), &LettaSettings::default(), false, false)
            .unwrap();
        assert_eq!(r.conflicts.len(), 1);
        assert!(fs::read_to_string(&path).unwrap().contains("mine"));

        let r = materialize_letta_settings(tmp.path(), &LettaSettings::default(), false, true)
            .unwrap();
        assert_eq!(r.updated.len(), 1);
        assert!(fs::read_to_string(&path).unwrap().contains("_botpack"));
    }

    #[test]
    fn settings_local_json_never_written() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join(".letta").join("settings.local.json");
        fs::create_dir_all(local.parent().unwrap()).unwrap();
        fs::write(&local, "{\"secret\": true}\n").unwrap();

        let r = materialize_letta_settings(tmp.path(), &LettaSettings::default(), false, true)
            .unwrap();
        assert_eq!(r.preserved, vec![local.display().to_string()]);
        assert_eq!(fs::read_to_string(&local).unwrap(), "{\"secret\": true}\n");
    }

    #[test]
    fn custom_settings_carried_into_document() {
        let tmp = TempDir::new().unwrap();
        let mut settings = LettaSettings {
            default_agent: Some("main".into()),
            ..LettaSettings::default()
        };
        settings.custom.insert("theme".into(), json!("dark"));
        materialize_letta_settings(tmp.path(), &settings, false, false).unwrap();

        let doc: Value =
            serde_json::from_str(&fs::read_to_string(settings_path(tmp.path())).unwrap()).unwrap();
        assert_eq!(doc["default_agent"], json!("main"));
        assert_eq!(doc["theme"], json!("dark"));
    }
}
