//! Sync engine flows: create, drift, force, clean, MCP aggregation.

use botpack::issues::{collect_status, conflict_issue_id, explain};
use botpack::paths::ProjectDirs;
use botpack::sync::{SyncFlags, sync};
use botpack::utils::fs::sha256_bytes;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, content).unwrap();
}

fn project(manifest: &str) -> (TempDir, ProjectDirs) {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "botpack.toml", manifest);
    let dirs = ProjectDirs::new(tmp.path(), tmp.path().join("store"));
    (tmp, dirs)
}

const WORKSPACE_MANIFEST: &str = "version = 1\n\n[assets]\ndir = \".botpack/workspace\"\n";

#[test]
fn sync_creates_outputs_and_records_hashes() {
    let (tmp, dirs) = project(WORKSPACE_MANIFEST);
    write(tmp.path(), ".botpack/workspace/commands/hi.md", "hi");

    let result = sync(&dirs, "claude", SyncFlags::default()).unwrap();

    let out = tmp.path().join(".claude/commands/assets.hi.md");
    assert_eq!(result.created, vec![out.display().to_string()]);
    assert!(result.conflicts.is_empty());
    assert_eq!(fs::read_to_string(&out).unwrap(), "hi");

    let state: Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join(".botpack/state/sync-claude.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["version"], 2);
    assert_eq!(state["target"], "claude");
    let entry = &state["paths"][&out.display().to_string()];
    assert_eq!(entry["sha256"], Value::String(sha256_bytes(b"hi")));
    assert_eq!(entry["sourceType"], "assets_dir");
    assert_eq!(entry["assetAddress"], "command:hi");
}

#[test]
fn drifted_output_conflicts_until_forced() {
    let (tmp, dirs) = project(WORKSPACE_MANIFEST);
    write(tmp.path(), ".botpack/workspace/commands/hi.md", "hi");
    let out = tmp.path().join(".claude/commands/assets.hi.md");

    sync(&dirs, "claude", SyncFlags::default()).unwrap();

    // User edits the projected file.
    fs::write(&out, "user edit").unwrap();

    let second = sync(&dirs, "claude", SyncFlags::default()).unwrap();
    assert_eq!(second.conflicts.len(), 1);
    assert_eq!(fs::read_to_string(&out).unwrap(), "user edit");
    let conflicts_path = tmp.path().join(".botpack/state/conflicts-claude.json");
    assert!(conflicts_path.exists());

    let record = &second.conflict_records[0];
    assert_eq!(record.path, out.display().to_string());
    assert_eq!(record.last_known_good_sha256, Some(sha256_bytes(b"hi")));

    // Status surfaces the conflict with a stable, explainable id.
    let info = collect_status(&dirs);
    let id = conflict_issue_id("claude", &record.path);
    assert!(info.conflicts.contains_key(&id));
    let text = explain(&info, &id).unwrap();
    assert!(text.contains("modified since last sync"));

    // Force overwrites and clears the conflicts file.
    let third = sync(&dirs, "claude", SyncFlags { force: true, ..SyncFlags::default() }).unwrap();
    assert!(third.conflicts.is_empty());
    assert_eq!(third.updated.len(), 1);
    assert_eq!(fs::read_to_string(&out).unwrap(), "hi");
    assert!(!conflicts_path.exists());
}

#[test]
fn unchanged_second_sync_is_noop() {
    let (tmp, dirs) = project(WORKSPACE_MANIFEST);
    write(tmp.path(), ".botpack/workspace/commands/hi.md", "hi");

    sync(&dirs, "claude", SyncFlags::default()).unwrap();
    let second = sync(&dirs, "claude", SyncFlags::default()).unwrap();
    assert!(second.created.is_empty());
    assert!(second.updated.is_empty());
    assert!(second.conflicts.is_empty());

    let state = fs::read_to_string(tmp.path().join(".botpack/state/sync-claude.json")).unwrap();
    sync(&dirs, "claude", SyncFlags::default()).unwrap();
    let again = fs::read_to_string(tmp.path().join(".botpack/state/sync-claude.json")).unwrap();
    assert_eq!(state, again);
}

#[test]
fn clean_removes_stale_outputs_but_keeps_drifted_ones() {
    let (tmp, dirs) = project(WORKSPACE_MANIFEST);
    write(tmp.path(), ".botpack/workspace/commands/old.md", "old");
    write(tmp.path(), ".botpack/workspace/commands/keep.md", "keep");

    sync(&dirs, "claude", SyncFlags::default()).unwrap();
    let old_out = tmp.path().join(".claude/commands/assets.old.md");
    assert!(old_out.exists());

    // Source goes away; clean sync removes the projection.
    fs::remove_file(tmp.path().join(".botpack/workspace/commands/old.md")).unwrap();
    let result = sync(&dirs, "claude", SyncFlags { clean: true, ..SyncFlags::default() }).unwrap();
    assert_eq!(result.removed, vec![old_out.display().to_string()]);
    assert!(!old_out.exists());

    // A drifted stale output is preserved and reported instead.
    write(tmp.path(), ".botpack/workspace/commands/tmp.md", "tmp");
    sync(&dirs, "claude", SyncFlags::default()).unwrap();
    let tmp_out = tmp.path().join(".claude/commands/assets.tmp.md");
    fs::remove_file(tmp.path().join(".botpack/workspace/commands/tmp.md")).unwrap();
    fs::write(&tmp_out, "user kept this").unwrap();

    let result = sync(&dirs, "claude", SyncFlags { clean: true, ..SyncFlags::default() }).unwrap();
    assert!(result.removed.is_empty());
    assert_eq!(result.conflicts, vec![tmp_out.display().to_string()]);
    assert!(tmp_out.exists());
}

#[test]
fn skills_project_into_prefixed_directories() {
    let (tmp, dirs) = project(WORKSPACE_MANIFEST);
    write(
        tmp.path(),
        ".botpack/workspace/skills/hello/SKILL.md",
        "---\nid: hello\nname: Hello\n---\nbody\n",
    );
    write(tmp.path(), ".botpack/workspace/agents/default.md", "agent\n");

    let result = sync(&dirs, "amp", SyncFlags::default()).unwrap();
    assert_eq!(result.created.len(), 2);
    assert!(tmp.path().join(".agents/skills/assets.hello/SKILL.md").is_file());
    assert!(tmp.path().join(".agents/agents/assets.default.md").is_file());
}

#[test]
fn target_root_override_is_honored() {
    let (tmp, dirs) = project(
        "version = 1\n\n[assets]\ndir = \"botpack\"\n\n[targets.claude]\nroot = \".custom-claude\"\n",
    );
    write(tmp.path(), "botpack/commands/hi.md", "hi\n");

    sync(&dirs, "claude", SyncFlags::default()).unwrap();
    assert!(tmp.path().join(".custom-claude/commands/assets.hi.md").is_file());
    assert!(!tmp.path().join(".claude").exists());
}

#[test]
fn mcp_document_is_aggregated_sorted_and_trust_gated() {
    let (tmp, dirs) = project("version = 1\n\n[assets]\ndir = \"botpack\"\nname = \"workspace\"\n");
    write(
        tmp.path(),
        "botpack/mcp/servers.toml",
        r#"version = 1

[[server]]
id = "zeta"
command = "npx"
args = ["-y", "zeta"]

[[server]]
id = "alpha"
url = "http://example.test"
env = { FOO = "bar", BAZ = "qux" }
"#,
    );
    write(
        tmp.path(),
        ".botpack/trust.toml",
        "version = 1\n[__workspace__]\nallowExec = true\nallowMcp = true\n",
    );

    let result = sync(&dirs, "claude", SyncFlags::default()).unwrap();
    assert!(result.blocked.is_empty());

    let text = fs::read_to_string(tmp.path().join(".claude/mcp.json")).unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["$schema"], "https://smartykit.dev/schemas/mcp.json");
    assert_eq!(doc["servers"][0]["name"], "workspace/alpha");
    assert_eq!(doc["servers"][0]["transport"], "http");
    assert_eq!(doc["servers"][1]["name"], "workspace/zeta");
    assert_eq!(doc["servers"][1]["transport"], "stdio");

    // Nested keys are sorted in the emitted bytes.
    let baz = text.find("\"BAZ\"").unwrap();
    let foo = text.find("\"FOO\"").unwrap();
    assert!(baz < foo);
    assert!(text.ends_with('\n'));
}

#[test]
fn untrusted_first_party_servers_are_blocked_not_fatal() {
    let (tmp, dirs) = project(WORKSPACE_MANIFEST);
    write(
        tmp.path(),
        ".botpack/workspace/mcp/servers.toml",
        "version = 1\n\n[[server]]\nid = \"runner\"\ncommand = \"npx\"\n",
    );
    write(tmp.path(), ".botpack/workspace/commands/hi.md", "hi\n");

    let result = sync(&dirs, "claude", SyncFlags::default()).unwrap();
    // The command still syncs; the stdio server is omitted and reported.
    assert!(tmp.path().join(".claude/commands/assets.hi.md").is_file());
    assert_eq!(result.blocked.len(), 1);
    assert!(result.blocked[0].contains("__workspace__"));

    let doc: Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join(".claude/mcp.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(doc["servers"].as_array().unwrap().len(), 0);
}

#[test]
fn letta_target_manages_settings_and_preserves_local() {
    let (tmp, dirs) = project("version = 1\n");
    let local = tmp.path().join(".letta/settings.local.json");
    write(tmp.path(), ".letta/settings.local.json", "{\"secret\": true}\n");

    let result = sync(&dirs, "letta-code", SyncFlags::default()).unwrap();
    assert_eq!(result.created.len(), 1);

    let settings: Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join(".letta/settings.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(settings["_botpack"]["managed"], Value::Bool(true));
    assert_eq!(fs::read_to_string(&local).unwrap(), "{\"secret\": true}\n");

    // A user-owned settings.json conflicts instead of being replaced.
    fs::write(tmp.path().join(".letta/settings.json"), "{\"mine\": 1}\n").unwrap();
    let result = sync(&dirs, "letta-code", SyncFlags::default()).unwrap();
    assert_eq!(result.conflicts.len(), 1);
    assert!(tmp.path().join(".botpack/state/conflicts-letta-code.json").exists());

    let result =
        sync(&dirs, "letta-code", SyncFlags { force: true, ..SyncFlags::default() }).unwrap();
    assert_eq!(result.updated.len(), 1);
    assert!(!tmp.path().join(".botpack/state/conflicts-letta-code.json").exists());
}

#[test]
fn unsupported_target_is_a_validation_error() {
    let (_tmp, dirs) = project("version = 1\n");
    let err = sync(&dirs, "cursor", SyncFlags::default()).unwrap_err();
    assert!(err.to_string().contains("unsupported target"));
}
