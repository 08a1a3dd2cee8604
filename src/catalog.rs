//! Human-readable asset inventory (.botpack/catalog.json)
//!
//! The catalog is a canonical-JSON snapshot of everything the first-party
//! assets directory exports: skills (with their scripts and any PEP 723
//! metadata), commands, and agents. Front-ends and editor tooling read it
//! instead of re-scanning the tree.
//!
//! `generatedAt` defaults to a fixed epoch timestamp so repeated
//! generation over unchanged inputs is byte-identical; callers that want
//! a real timestamp pass one in.

use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

use crate::assets::{AssetIndex, ScriptAsset, SkillAsset, scan_assets};
use crate::manifest::Manifest;
use crate::paths::ProjectDirs;
use crate::sync::resolve_assets_dir;
use crate::utils::fs::{atomic_write_text, canonical_json};

/// Catalog document version.
pub const CATALOG_VERSION: i64 = 1;

/// Deterministic default for `generatedAt`.
pub const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

fn script_json(script: &ScriptAsset) -> Value {
    let mut out = Map::new();
    out.insert("path".to_string(), json!(script.path));
    out.insert("runtime".to_string(), json!(script.runtime));
    if let Some(runner) = &script.runner {
        out.insert("runner".to_string(), json!(runner));
    }
    if let Some(meta) = &script.pep723 {
        out.insert("pep723".to_string(), json!(meta));
    }
    Value::Object(out)
}

fn skill_json(skill: &SkillAsset) -> Value {
    let mut out = Map::new();
    out.insert("id".to_string(), json!(skill.id));
    out.insert("title".to_string(), json!(skill.title));
    out.insert("description".to_string(), json!(skill.description));
    out.insert("path".to_string(), json!(skill.path));
    if !skill.scripts.is_empty() {
        out.insert(
            "scripts".to_string(),
            Value::Array(skill.scripts.iter().map(script_json).collect()),
        );
    }
    Value::Object(out)
}

/// The `workspaceAssets` section of the catalog.
pub fn build_workspace_assets(index: &AssetIndex) -> Value {
    json!({
        "skills": index.skills.iter().map(skill_json).collect::<Vec<_>>(),
        "commands": index.commands.iter()
            .map(|c| json!({"id": c.id, "path": c.path}))
            .collect::<Vec<_>>(),
        "agents": index.agents.iter()
            .map(|a| json!({"id": a.id, "path": a.path}))
            .collect::<Vec<_>>(),
    })
}

/// Build the full catalog document.
pub fn generate_catalog(
    workspace_dir: &Path,
    index: &AssetIndex,
    generated_at: Option<&str>,
) -> Value {
    let mut out = Map::new();
    out.insert("version".to_string(), json!(CATALOG_VERSION));
    if let Some(ts) = generated_at {
        out.insert("generatedAt".to_string(), json!(ts));
    }
    out.insert("workspace".to_string(), json!({"dir": workspace_dir.display().to_string()}));
    out.insert("workspaceAssets".to_string(), build_workspace_assets(index));
    out.insert("packages".to_string(), json!([]));
    Value::Object(out)
}

/// Scan the assets directory and write `.botpack/catalog.json`.
pub fn generate_and_write_catalog(
    dirs: &ProjectDirs,
    manifest: &Manifest,
    generated_at: Option<&str>,
) -> anyhow::Result<PathBuf> {
    let workspace_dir = resolve_assets_dir(dirs, manifest);
    let index = scan_assets(&workspace_dir);
    let catalog =
        generate_catalog(&workspace_dir, &index, generated_at.or(Some(EPOCH_TIMESTAMP)));

    let out_path = dirs.catalog_path();
    atomic_write_text(&out_path, &canonical_json(&catalog))?;
    Ok(out_path)
}
