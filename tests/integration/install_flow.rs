//! Install pipeline flows: path dependencies through store, lock, and
//! package sync, plus the trust gate.

use botpack::install::install;
use botpack::lockfile::Lockfile;
use botpack::paths::ProjectDirs;
use botpack::store::tree_digest;
use botpack::sync::{SyncFlags, sync};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, content).unwrap();
}

fn package_project() -> (TempDir, ProjectDirs) {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "pack/agentpkg.toml",
        "agentpkg = \"1\"\nname = \"@acme/pack\"\nversion = \"1.0.0\"\n",
    );
    write(tmp.path(), "pack/commands/hi.md", "hi from pack\n");
    write(
        tmp.path(),
        "pack/skills/review/SKILL.md",
        "---\nid: review\nname: Review\n---\nbody\n",
    );
    write(
        tmp.path(),
        "botpack.toml",
        "version = 1\n\n[dependencies]\n\"@acme/pack\" = { path = \"pack\" }\n",
    );
    let dirs = ProjectDirs::new(tmp.path(), tmp.path().join("store"));
    (tmp, dirs)
}

#[tokio::test]
async fn install_then_sync_projects_package_assets() {
    let (tmp, dirs) = package_project();

    let outcome = install(&dirs, false).await.unwrap();
    let pkg = &outcome.lockfile.packages["@acme/pack@1.0.0"];
    let digest = pkg.integrity.clone().unwrap();

    // Store entry round-trips to the same digest.
    assert_eq!(tree_digest(&dirs.store_dir().join(&digest)).unwrap(), digest);

    // Lockfile on disk parses back identically.
    let loaded = Lockfile::load(&outcome.lock_path).unwrap();
    assert_eq!(loaded.serialize(), outcome.lockfile.serialize());

    let result = sync(&dirs, "claude", SyncFlags::default()).unwrap();
    assert!(result.conflicts.is_empty());

    // Package assets land under the sanitized package prefix.
    assert_eq!(
        fs::read_to_string(tmp.path().join(".claude/commands/acme-pack.hi.md")).unwrap(),
        "hi from pack\n"
    );
    assert!(tmp.path().join(".claude/skills/acme-pack.review/SKILL.md").is_file());

    // Stable project-local package root was materialized and owned.
    assert!(tmp.path().join(".botpack/pkgs/@acme/pack@1.0.0").exists());
    let state: Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join(".botpack/state/pkgs.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["version"], 1);
    let (_, entry) = state["paths"].as_object().unwrap().iter().next().unwrap();
    assert_eq!(entry["pkgKey"], "@acme/pack@1.0.0");
    assert_eq!(entry["integrity"], Value::String(digest));
}

#[tokio::test]
async fn package_mcp_servers_need_package_trust() {
    let (tmp, dirs) = package_project();
    write(
        tmp.path(),
        "pack/mcp/servers.toml",
        "version = 1\n\n[[server]]\nid = \"tool\"\ncommand = \"npx\"\nargs = [\"-y\", \"tool\"]\n",
    );

    install(&dirs, false).await.unwrap();

    // No trust entry: server blocked, sync still succeeds.
    let result = sync(&dirs, "claude", SyncFlags::default()).unwrap();
    assert_eq!(result.blocked.len(), 1);
    assert!(result.blocked[0].contains("@acme/pack@1.0.0"));
    let doc: Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join(".claude/mcp.json")).unwrap(),
    )
    .unwrap();
    assert!(doc["servers"].as_array().unwrap().is_empty());

    // Package-level exec trust admits the stdio server.
    write(
        tmp.path(),
        ".botpack/trust.toml",
        "version = 1\n[\"@acme/pack@1.0.0\"]\nallowExec = true\n",
    );
    let result = sync(&dirs, "claude", SyncFlags { force: true, ..SyncFlags::default() }).unwrap();
    assert!(result.blocked.is_empty());
    let doc: Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join(".claude/mcp.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(doc["servers"][0]["name"], "@acme/pack/tool");
}

#[tokio::test]
async fn digest_pinned_trust_rejects_changed_content() {
    let (tmp, dirs) = package_project();
    write(
        tmp.path(),
        "pack/agentpkg.toml",
        "agentpkg = \"1\"\nname = \"@acme/pack\"\nversion = \"1.0.0\"\n\n[capabilities]\nexec = true\n",
    );

    // Pin trust to a digest that will not match.
    write(
        tmp.path(),
        ".botpack/trust.toml",
        "version = 1\n[\"@acme/pack@1.0.0\"]\nallowExec = true\n[\"@acme/pack@1.0.0\".digest]\nintegrity = \"sha256:0000\"\n",
    );

    let err = install(&dirs, false).await.unwrap_err();
    assert!(err.to_string().contains("digest mismatch"));
}

#[tokio::test]
async fn removing_dependency_and_cleaning_prunes_outputs() {
    let (tmp, dirs) = package_project();
    install(&dirs, false).await.unwrap();
    sync(&dirs, "claude", SyncFlags::default()).unwrap();
    assert!(tmp.path().join(".claude/commands/acme-pack.hi.md").exists());

    // Drop the dependency and reinstall: the lock empties.
    write(tmp.path(), "botpack.toml", "version = 1\n");
    let outcome = install(&dirs, false).await.unwrap();
    assert!(outcome.lockfile.packages.is_empty());

    let result = sync(&dirs, "claude", SyncFlags { clean: true, ..SyncFlags::default() }).unwrap();
    assert!(result.removed.iter().any(|p| p.ends_with("acme-pack.hi.md")));
    assert!(!tmp.path().join(".claude/commands/acme-pack.hi.md").exists());
    assert!(!tmp.path().join(".botpack/pkgs/@acme/pack@1.0.0").exists());
}
