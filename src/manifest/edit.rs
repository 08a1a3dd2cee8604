//! Canonical manifest rewriting for dependency edits
//!
//! `botpack add` / `botpack remove` do not patch text in place: they parse
//! the manifest, mutate the in-memory model, and rewrite the whole file in
//! a canonical minimal layout. Two edit sequences that end in the same
//! dependency set therefore produce byte-identical manifests.
//!
//! Layout contract:
//! - section order: `version`, `[assets]`, `[dependencies]`, `[sync]`,
//!   `[targets.*]`, `[aliases.*]`, `[entry]`
//! - dependency keys in lexicographic order
//! - per-dependency inline tables use a fixed key order
//!   (`path` | `git`, `rev` | `url`, `integrity`)
//! - sections whose content equals the defaults are omitted

use anyhow::{Result, bail};
use std::path::Path;
use toml_edit::{DocumentMut, InlineTable, Item, Table, value};

use crate::manifest::{DepSpec, Manifest};
use crate::utils::fs::atomic_write_text;

/// Parse `name@versionSpec` where the name may itself contain `@`
/// (scoped packages), e.g. `@acme/quality-skills@^2`.
pub fn parse_add_spec(spec: &str) -> Result<(String, String)> {
    let s = spec.trim();
    match s.rsplit_once('@') {
        Some((name, ver)) if !name.trim().is_empty() && !ver.trim().is_empty() => {
            Ok((name.trim().to_string(), ver.trim().to_string()))
        }
        _ => bail!("invalid add spec: {spec:?} (expected name@version)"),
    }
}

/// Apply dependency additions and removals, rewriting the manifest
/// canonically and atomically.
pub fn update_dependencies(
    path: &Path,
    add: &[(String, DepSpec)],
    remove: &[String],
) -> Result<()> {
    let mut manifest = Manifest::load(path)?;
    for (name, spec) in add {
        manifest.dependencies.insert(name.clone(), spec.clone());
    }
    for name in remove {
        manifest.dependencies.remove(name);
    }
    atomic_write_text(path, &render(&manifest))
}

/// Render a manifest in the canonical minimal layout.
pub fn render(manifest: &Manifest) -> String {
    let mut doc = DocumentMut::new();
    doc.insert("version", value(manifest.version));

    let assets = &manifest.assets;
    let default_assets = crate::manifest::AssetsConfig::default();
    if *assets != default_assets {
        let mut t = Table::new();
        t.insert("dir", value(assets.dir.as_str()));
        if let Some(name) = &assets.name {
            t.insert("name", value(name.as_str()));
        }
        if !assets.private {
            t.insert("private", value(false));
        }
        doc.insert("assets", Item::Table(t));
    }

    if !manifest.dependencies.is_empty() {
        let mut t = Table::new();
        for (name, spec) in &manifest.dependencies {
            t.insert(name, dep_item(spec));
        }
        doc.insert("dependencies", Item::Table(t));
    }

    let sync = &manifest.sync;
    let default_sync = crate::manifest::SyncOptions::default();
    if *sync != default_sync {
        let mut t = Table::new();
        if sync.on_add != default_sync.on_add {
            t.insert("onAdd", value(sync.on_add));
        }
        if sync.on_install != default_sync.on_install {
            t.insert("onInstall", value(sync.on_install));
        }
        if sync.catalog != default_sync.catalog {
            t.insert("catalog", value(sync.catalog));
        }
        if sync.link_mode != default_sync.link_mode {
            t.insert("linkMode", value(sync.link_mode.to_string()));
        }
        doc.insert("sync", Item::Table(t));
    }

    if !manifest.targets.is_empty() {
        let mut targets = Table::new();
        targets.set_implicit(true);
        for (name, cfg) in &manifest.targets {
            let mut t = Table::new();
            let fields: [(&str, &Option<String>); 8] = [
                ("root", &cfg.root),
                ("skillsDir", &cfg.skills_dir),
                ("commandsDir", &cfg.commands_dir),
                ("agentsDir", &cfg.agents_dir),
                ("mcpOut", &cfg.mcp_out),
                ("policyMode", &cfg.policy_mode),
                ("skillsFallbackRoot", &cfg.skills_fallback_root),
                ("skillsFallbackDir", &cfg.skills_fallback_dir),
            ];
            for (key, val) in fields {
                if let Some(v) = val {
                    t.insert(key, value(v.as_str()));
                }
            }
            targets.insert(name, Item::Table(t));
        }
        doc.insert("targets", Item::Table(targets));
    }

    if !manifest.aliases.skills.is_empty() || !manifest.aliases.commands.is_empty() {
        let mut aliases = Table::new();
        aliases.set_implicit(true);
        if !manifest.aliases.skills.is_empty() {
            let mut t = Table::new();
            for (k, v) in &manifest.aliases.skills {
                t.insert(k, value(v.as_str()));
            }
            aliases.insert("skills", Item::Table(t));
        }
        if !manifest.aliases.commands.is_empty() {
            let mut t = Table::new();
            for (k, v) in &manifest.aliases.commands {
                t.insert(k, value(v.as_str()));
            }
            aliases.insert("commands", Item::Table(t));
        }
        doc.insert("aliases", Item::Table(aliases));
    }

    if manifest.entry != crate::manifest::EntryConfig::default() {
        let mut t = Table::new();
        if let Some(agent) = &manifest.entry.agent {
            t.insert("agent", value(agent.as_str()));
        }
        if let Some(target) = &manifest.entry.target {
            t.insert("target", value(target.as_str()));
        }
        doc.insert("entry", Item::Table(t));
    }

    doc.to_string()
}

fn dep_item(spec: &DepSpec) -> Item {
    match spec {
        DepSpec::Semver(s) => value(s.as_str()),
        DepSpec::Path { path } => {
            let mut t = InlineTable::new();
            t.insert("path", path.as_str().into());
            value(t)
        }
        DepSpec::Git { git, rev } => {
            let mut t = InlineTable::new();
            t.insert("git", git.as_str().into());
            if let Some(rev) = rev {
                t.insert("rev", rev.as_str().into());
            }
            value(t)
        }
        DepSpec::Url { url, integrity } => {
            let mut t = InlineTable::new();
            t.insert("url", url.as_str().into());
            if let Some(integrity) = integrity {
                t.insert("integrity", integrity.as_str().into());
            }
            value(t)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn add_spec_splits_on_last_at() {
        assert_eq!(
            parse_add_spec("@acme/quality-skills@^2").unwrap(),
            ("@acme/quality-skills".to_string(), "^2".to_string())
        );
        assert_eq!(parse_add_spec("foo@1.2.3").unwrap(), ("foo".to_string(), "1.2.3".to_string()));
        assert!(parse_add_spec("no-version").is_err());
        assert!(parse_add_spec("@scope/name@").is_err());
    }

    #[test]
    fn render_orders_sections_and_dependencies() {
        let mut m = Manifest::default();
        m.dependencies.insert("zeta".into(), DepSpec::Semver("^1".into()));
        m.dependencies
            .insert("@acme/a".into(), DepSpec::Git { git: "https://g".into(), rev: Some("v1".into()) });
        m.sync.link_mode = crate::store::LinkMode::Copy;

        let text = render(&m);
        let deps_at = text.find("[dependencies]").unwrap();
        let sync_at = text.find("[sync]").unwrap();
        assert!(deps_at < sync_at);
        let acme_at = text.find("\"@acme/a\"").unwrap();
        let zeta_at = text.find("zeta").unwrap();
        assert!(acme_at < zeta_at);
        assert!(text.contains("git = \"https://g\""));
        assert!(text.contains("linkMode = \"copy\""));

        // Round-trips through the validator.
        let parsed = Manifest::parse(&text, "botpack.toml").unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn equivalent_edit_sequences_produce_identical_bytes() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.toml");
        let b = tmp.path().join("b.toml");
        fs::write(&a, "version = 1\n").unwrap();
        fs::write(&b, "version = 1\n").unwrap();

        // a: add x, add y, remove x, add x
        update_dependencies(&a, &[("x".into(), DepSpec::Semver("^1".into()))], &[]).unwrap();
        update_dependencies(&a, &[("y".into(), DepSpec::Semver("^2".into()))], &[]).unwrap();
        update_dependencies(&a, &[], &["x".into()]).unwrap();
        update_dependencies(&a, &[("x".into(), DepSpec::Semver("^1".into()))], &[]).unwrap();

        // b: add y then x
        update_dependencies(&b, &[("y".into(), DepSpec::Semver("^2".into()))], &[]).unwrap();
        update_dependencies(&b, &[("x".into(), DepSpec::Semver("^1".into()))], &[]).unwrap();

        assert_eq!(fs::read_to_string(&a).unwrap(), fs::read_to_string(&b).unwrap());
    }

    #[test]
    fn removing_last_dependency_drops_the_section() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("botpack.toml");
        fs::write(&p, "version = 1\n").unwrap();

        update_dependencies(&p, &[("only".into(), DepSpec::Path { path: "../p".into() })], &[])
            .unwrap();
        assert!(fs::read_to_string(&p).unwrap().contains("[dependencies]"));

        update_dependencies(&p, &[], &["only".into()]).unwrap();
        assert!(!fs::read_to_string(&p).unwrap().contains("[dependencies]"));
    }

    #[test]
    fn workspace_alias_rewritten_as_assets() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("botpack.toml");
        fs::write(&p, "version = 1\n\n[workspace]\ndir = \"ws\"\n").unwrap();

        update_dependencies(&p, &[("x".into(), DepSpec::Semver("^1".into()))], &[]).unwrap();
        let text = fs::read_to_string(&p).unwrap();
        assert!(text.contains("[assets]"));
        assert!(!text.contains("[workspace]"));
        assert!(text.contains("dir = \"ws\""));
    }
}
