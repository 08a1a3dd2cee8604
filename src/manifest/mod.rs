//! Manifest (botpack.toml) parsing and validation
//!
//! The manifest is parsed in two stages: the `toml` crate produces a
//! loosely typed value tree, and validation then projects it into the
//! typed model. That split lets every unknown-key or wrong-type error
//! carry the dotted path to the offending key (`sync.linkMode`,
//! `dependencies.foo.rev`), which a direct `serde` derive cannot do.
//!
//! The schema is closed at every level: any key outside the allowed set
//! is a deterministic validation error naming the keys, sorted.
//!
//! Legacy acceptance: `[workspace]` is an alias for `[assets]` on read
//! (both present is an error); writes only ever emit `[assets]`.
//!
//! # Example
//!
//! ```toml
//! version = 1
//!
//! [assets]
//! dir = "botpack"
//!
//! [dependencies]
//! "@acme/quality-skills" = "^2"
//! "local" = { path = "../local-pack" }
//!
//! [sync]
//! linkMode = "auto"
//! ```

pub mod edit;
pub mod package;

pub use package::PackageManifest;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use toml::Value;
use toml::map::Map;

use crate::core::BotpackError;
use crate::store::LinkMode;

/// A declared dependency, dispatched on key presence.
///
/// - a bare string is a registry semver spec
/// - `{ path = "..." }` is a local directory
/// - `{ git = "...", rev = "..."? }` is a git checkout
/// - `{ url = "...", integrity = "..."? }` is a fetched archive (deferred
///   to the registry path in v1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepSpec {
    /// Registry semver spec such as `^2` or `=1.2.3`
    Semver(String),
    /// Local directory, absolute or manifest-relative
    Path {
        /// The directory path as written in the manifest
        path: String,
    },
    /// Git repository with an optional rev (branch, tag, or commit)
    Git {
        /// Clone URL
        git: String,
        /// Optional rev to check out
        rev: Option<String>,
    },
    /// Direct URL with optional integrity pin
    Url {
        /// Archive URL
        url: String,
        /// Optional `sha256:<hex>` integrity pin
        integrity: Option<String>,
    },
}

impl DepSpec {
    /// The spec string recorded in the lockfile `dependencies` map.
    ///
    /// Semver deps keep their original spelling; everything else records
    /// `*` since the source table pins it precisely.
    pub fn lock_spec(&self) -> String {
        match self {
            Self::Semver(spec) => spec.clone(),
            _ => "*".to_string(),
        }
    }
}

/// The `[assets]` section: where first-party assets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetsConfig {
    /// Assets directory, relative to the manifest unless absolute
    pub dir: String,
    /// Optional display name used as the first-party sync prefix
    pub name: Option<String>,
    /// Whether the first-party assets are private (not publishable)
    pub private: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self { dir: "botpack".to_string(), name: None, private: true }
    }
}

/// The `[sync]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Sync after `botpack add`
    pub on_add: bool,
    /// Sync after `botpack install`
    pub on_install: bool,
    /// Regenerate the catalog during sync
    pub catalog: bool,
    /// Link mode for materialized package trees
    pub link_mode: LinkMode,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { on_add: true, on_install: true, catalog: true, link_mode: LinkMode::Auto }
    }
}

/// Per-target overrides from `[targets.<name>]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetConfig {
    /// Override of the target root directory
    pub root: Option<String>,
    /// Override of the skills output directory name
    pub skills_dir: Option<String>,
    /// Override of the commands output directory name
    pub commands_dir: Option<String>,
    /// Override of the agents output directory name
    pub agents_dir: Option<String>,
    /// Override of the MCP document output path
    pub mcp_out: Option<String>,
    /// Target policy mode hint
    pub policy_mode: Option<String>,
    /// Fallback root for targets without native skill support
    pub skills_fallback_root: Option<String>,
    /// Fallback directory under the fallback root
    pub skills_fallback_dir: Option<String>,
}

/// Alias maps from `[aliases.skills]` / `[aliases.commands]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AliasesConfig {
    /// Skill id aliases
    pub skills: BTreeMap<String, String>,
    /// Command id aliases
    pub commands: BTreeMap<String, String>,
}

/// Default launch selection from `[entry]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryConfig {
    /// Default agent id
    pub agent: Option<String>,
    /// Default target name
    pub target: Option<String>,
}

/// Parsed and validated project manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Schema version; must be 1
    pub version: i64,
    /// First-party assets section
    pub assets: AssetsConfig,
    /// Declared dependencies
    pub dependencies: BTreeMap<String, DepSpec>,
    /// Sync options
    pub sync: SyncOptions,
    /// Per-target overrides
    pub targets: BTreeMap<String, TargetConfig>,
    /// Alias maps
    pub aliases: AliasesConfig,
    /// Launch defaults
    pub entry: EntryConfig,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: 1,
            assets: AssetsConfig::default(),
            dependencies: BTreeMap::new(),
            sync: SyncOptions::default(),
            targets: BTreeMap::new(),
            aliases: AliasesConfig::default(),
            entry: EntryConfig::default(),
        }
    }
}

impl Manifest {
    /// Load and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self, BotpackError> {
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BotpackError::ManifestNotFound
            } else {
                BotpackError::ConfigValidation {
                    file: path.display().to_string(),
                    message: format!("unable to read file: {e}"),
                }
            }
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parse and validate manifest text. `file` labels error messages.
    pub fn parse(text: &str, file: &str) -> Result<Self, BotpackError> {
        let value: Value = toml::from_str(text).map_err(|e| BotpackError::ConfigParse {
            file: file.to_string(),
            message: e.to_string(),
            line: None,
            col: None,
        })?;
        let table = value.as_table().ok_or_else(|| BotpackError::ConfigValidation {
            file: file.to_string(),
            message: "top-level must be a table".to_string(),
        })?;
        project(table, file)
    }
}

fn project(data: &Map<String, Value>, file: &str) -> Result<Manifest, BotpackError> {
    check_keys(
        data,
        &["version", "assets", "workspace", "dependencies", "sync", "targets", "aliases", "entry"],
        file,
        "",
    )?;

    let version = require_int(data.get("version"), file, "version")?;
    if version != 1 {
        return Err(validation(file, format!("version: expected 1, got {version}")));
    }

    let assets_raw = data.get("assets");
    let workspace_raw = data.get("workspace");
    if assets_raw.is_some() && workspace_raw.is_some() {
        return Err(validation(
            file,
            "cannot have both [assets] and [workspace]; use [assets]".to_string(),
        ));
    }

    let mut assets = AssetsConfig::default();
    if let Some(tbl) = assets_raw.or(workspace_raw) {
        let tbl = require_table(Some(tbl), file, "assets")?;
        check_keys(tbl, &["dir", "name", "private"], file, "assets")?;
        if let Some(dir) = tbl.get("dir") {
            assets.dir = require_str(Some(dir), file, "assets.dir")?.to_string();
        }
        if let Some(name) = tbl.get("name") {
            assets.name = Some(require_str(Some(name), file, "assets.name")?.to_string());
        }
        if let Some(private) = tbl.get("private") {
            assets.private = require_bool(Some(private), file, "assets.private")?;
        }
    }

    let mut dependencies = BTreeMap::new();
    if let Some(deps_raw) = data.get("dependencies") {
        let deps = require_table(Some(deps_raw), file, "dependencies")?;
        for (name, spec) in deps {
            dependencies.insert(name.clone(), parse_dep(name, spec, file)?);
        }
    }

    let mut sync = SyncOptions::default();
    if let Some(sync_raw) = data.get("sync") {
        let tbl = require_table(Some(sync_raw), file, "sync")?;
        check_keys(tbl, &["onAdd", "onInstall", "catalog", "linkMode"], file, "sync")?;
        if let Some(v) = tbl.get("onAdd") {
            sync.on_add = require_bool(Some(v), file, "sync.onAdd")?;
        }
        if let Some(v) = tbl.get("onInstall") {
            sync.on_install = require_bool(Some(v), file, "sync.onInstall")?;
        }
        if let Some(v) = tbl.get("catalog") {
            sync.catalog = require_bool(Some(v), file, "sync.catalog")?;
        }
        if let Some(v) = tbl.get("linkMode") {
            let raw = require_str(Some(v), file, "sync.linkMode")?;
            sync.link_mode = raw.parse().map_err(|_| {
                validation(
                    file,
                    format!(
                        "sync.linkMode: expected one of [auto, copy, hardlink, symlink], got {raw:?}"
                    ),
                )
            })?;
        }
    }

    let mut targets = BTreeMap::new();
    if let Some(targets_raw) = data.get("targets") {
        let tbl = require_table(Some(targets_raw), file, "targets")?;
        for (target_name, target_raw) in tbl {
            let at = format!("targets.{target_name}");
            let target_tbl = require_table(Some(target_raw), file, &at)?;
            targets.insert(target_name.clone(), parse_target(target_tbl, file, &at)?);
        }
    }

    let mut aliases = AliasesConfig::default();
    if let Some(aliases_raw) = data.get("aliases") {
        let tbl = require_table(Some(aliases_raw), file, "aliases")?;
        check_keys(tbl, &["skills", "commands"], file, "aliases")?;
        if let Some(v) = tbl.get("skills") {
            aliases.skills = parse_string_map(v, file, "aliases.skills")?;
        }
        if let Some(v) = tbl.get("commands") {
            aliases.commands = parse_string_map(v, file, "aliases.commands")?;
        }
    }

    let mut entry = EntryConfig::default();
    if let Some(entry_raw) = data.get("entry") {
        let tbl = require_table(Some(entry_raw), file, "entry")?;
        check_keys(tbl, &["agent", "target"], file, "entry")?;
        if let Some(v) = tbl.get("agent") {
            entry.agent = Some(require_str(Some(v), file, "entry.agent")?.to_string());
        }
        if let Some(v) = tbl.get("target") {
            entry.target = Some(require_str(Some(v), file, "entry.target")?.to_string());
        }
    }

    Ok(Manifest { version, assets, dependencies, sync, targets, aliases, entry })
}

fn parse_dep(name: &str, spec: &Value, file: &str) -> Result<DepSpec, BotpackError> {
    let at = format!("dependencies.{name}");
    if let Some(s) = spec.as_str() {
        return Ok(DepSpec::Semver(s.to_string()));
    }
    let tbl = spec
        .as_table()
        .ok_or_else(|| validation(file, format!("{at}: expected string or table")))?;

    if tbl.contains_key("git") {
        check_keys(tbl, &["git", "rev"], file, &at)?;
        let git = require_str(tbl.get("git"), file, &format!("{at}.git"))?.to_string();
        let rev = match tbl.get("rev") {
            None => None,
            Some(v) => Some(require_str(Some(v), file, &format!("{at}.rev"))?.to_string()),
        };
        return Ok(DepSpec::Git { git, rev });
    }
    if tbl.contains_key("path") {
        check_keys(tbl, &["path"], file, &at)?;
        let path = require_str(tbl.get("path"), file, &format!("{at}.path"))?.to_string();
        return Ok(DepSpec::Path { path });
    }
    if tbl.contains_key("url") {
        check_keys(tbl, &["url", "integrity"], file, &at)?;
        let url = require_str(tbl.get("url"), file, &format!("{at}.url"))?.to_string();
        let integrity = match tbl.get("integrity") {
            None => None,
            Some(v) => Some(require_str(Some(v), file, &format!("{at}.integrity"))?.to_string()),
        };
        return Ok(DepSpec::Url { url, integrity });
    }

    Err(validation(
        file,
        format!("{at}: unsupported spec; expected string or one of {{git=...}}, {{path=...}}, {{url=...}}"),
    ))
}

fn parse_target(
    tbl: &Map<String, Value>,
    file: &str,
    at: &str,
) -> Result<TargetConfig, BotpackError> {
    check_keys(
        tbl,
        &[
            "root",
            "skillsDir",
            "commandsDir",
            "agentsDir",
            "mcpOut",
            "policyMode",
            "skillsFallbackRoot",
            "skillsFallbackDir",
        ],
        file,
        at,
    )?;
    let get = |key: &str| -> Result<Option<String>, BotpackError> {
        match tbl.get(key) {
            None => Ok(None),
            Some(v) => Ok(Some(require_str(Some(v), file, &format!("{at}.{key}"))?.to_string())),
        }
    };
    Ok(TargetConfig {
        root: get("root")?,
        skills_dir: get("skillsDir")?,
        commands_dir: get("commandsDir")?,
        agents_dir: get("agentsDir")?,
        mcp_out: get("mcpOut")?,
        policy_mode: get("policyMode")?,
        skills_fallback_root: get("skillsFallbackRoot")?,
        skills_fallback_dir: get("skillsFallbackDir")?,
    })
}

fn parse_string_map(
    value: &Value,
    file: &str,
    at: &str,
) -> Result<BTreeMap<String, String>, BotpackError> {
    let tbl = require_table(Some(value), file, at)?;
    let mut out = BTreeMap::new();
    for (k, v) in tbl {
        out.insert(k.clone(), require_str(Some(v), file, &format!("{at}.{k}"))?.to_string());
    }
    Ok(out)
}

// --- small validation helpers keeping dotted paths in messages ---

pub(crate) fn validation(file: &str, message: String) -> BotpackError {
    BotpackError::ConfigValidation { file: file.to_string(), message }
}

pub(crate) fn check_keys(
    tbl: &Map<String, Value>,
    allowed: &[&str],
    file: &str,
    at: &str,
) -> Result<(), BotpackError> {
    let unknown: Vec<String> = tbl
        .keys()
        .filter(|k| !allowed.contains(&k.as_str()))
        .map(|k| k.to_string())
        .collect();
    if unknown.is_empty() { Ok(()) } else { Err(BotpackError::unknown_keys(file, at, unknown)) }
}

pub(crate) fn require_table<'a>(
    value: Option<&'a Value>,
    file: &str,
    at: &str,
) -> Result<&'a Map<String, Value>, BotpackError> {
    value
        .and_then(Value::as_table)
        .ok_or_else(|| validation(file, format!("{at}: expected table")))
}

pub(crate) fn require_str<'a>(
    value: Option<&'a Value>,
    file: &str,
    at: &str,
) -> Result<&'a str, BotpackError> {
    value
        .and_then(Value::as_str)
        .ok_or_else(|| validation(file, format!("{at}: expected string")))
}

pub(crate) fn require_bool(
    value: Option<&Value>,
    file: &str,
    at: &str,
) -> Result<bool, BotpackError> {
    value
        .and_then(Value::as_bool)
        .ok_or_else(|| validation(file, format!("{at}: expected bool")))
}

pub(crate) fn require_int(
    value: Option<&Value>,
    file: &str,
    at: &str,
) -> Result<i64, BotpackError> {
    value
        .and_then(Value::as_integer)
        .ok_or_else(|| validation(file, format!("{at}: expected integer")))
}

pub(crate) fn require_str_list(
    value: Option<&Value>,
    file: &str,
    at: &str,
) -> Result<Vec<String>, BotpackError> {
    let arr = value
        .and_then(Value::as_array)
        .ok_or_else(|| validation(file, format!("{at}: expected list of strings")))?;
    arr.iter()
        .map(|v| {
            v.as_str()
                .map(ToString::to_string)
                .ok_or_else(|| validation(file, format!("{at}: expected list of strings")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
version = 1

[assets]
dir = ".botpack/workspace"
name = "@acme/mono"

[dependencies]
"@acme/quality-skills" = "^2"
"local" = { path = "../local-pack" }
"pinned" = { git = "https://example.test/r.git", rev = "v1.2.0" }

[sync]
onAdd = false
linkMode = "copy"

[targets.claude]
root = ".claude"

[aliases.skills]
"hello" = "greetings"

[entry]
agent = "default"
target = "claude"
"#;

    #[test]
    fn parses_full_manifest() {
        let m = Manifest::parse(FULL, "botpack.toml").unwrap();
        assert_eq!(m.version, 1);
        assert_eq!(m.assets.dir, ".botpack/workspace");
        assert_eq!(m.assets.name.as_deref(), Some("@acme/mono"));
        assert!(m.assets.private);
        assert_eq!(
            m.dependencies["@acme/quality-skills"],
            DepSpec::Semver("^2".to_string())
        );
        assert_eq!(m.dependencies["local"], DepSpec::Path { path: "../local-pack".into() });
        assert_eq!(
            m.dependencies["pinned"],
            DepSpec::Git { git: "https://example.test/r.git".into(), rev: Some("v1.2.0".into()) }
        );
        assert!(!m.sync.on_add);
        assert!(m.sync.on_install);
        assert_eq!(m.sync.link_mode, LinkMode::Copy);
        assert_eq!(m.targets["claude"].root.as_deref(), Some(".claude"));
        assert_eq!(m.aliases.skills["hello"], "greetings");
        assert_eq!(m.entry.target.as_deref(), Some("claude"));
    }

    #[test]
    fn workspace_is_a_read_alias_for_assets() {
        let m = Manifest::parse("version = 1\n[workspace]\ndir = \"ws\"\n", "botpack.toml").unwrap();
        assert_eq!(m.assets.dir, "ws");
    }

    #[test]
    fn assets_and_workspace_together_rejected() {
        let err = Manifest::parse(
            "version = 1\n[assets]\ndir = \"a\"\n[workspace]\ndir = \"b\"\n",
            "botpack.toml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("[assets] and [workspace]"));
    }

    #[test]
    fn unknown_keys_carry_dotted_path() {
        let err =
            Manifest::parse("version = 1\n[sync]\nfrobnicate = true\n", "botpack.toml").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid config in botpack.toml: sync: unknown keys: frobnicate"
        );

        let err = Manifest::parse(
            "version = 1\n[dependencies]\nfoo = { git = \"u\", branch = \"main\" }\n",
            "botpack.toml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("dependencies.foo: unknown keys: branch"));
    }

    #[test]
    fn version_must_be_one() {
        let err = Manifest::parse("version = 2\n", "botpack.toml").unwrap_err();
        assert!(err.to_string().contains("version: expected 1"));
    }

    #[test]
    fn bad_link_mode_rejected() {
        let err = Manifest::parse("version = 1\n[sync]\nlinkMode = \"tarball\"\n", "botpack.toml")
            .unwrap_err();
        assert!(err.to_string().contains("sync.linkMode"));
    }

    #[test]
    fn dependency_needs_recognized_shape() {
        let err = Manifest::parse(
            "version = 1\n[dependencies]\nfoo = { registry = \"x\" }\n",
            "botpack.toml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("dependencies.foo: unsupported spec"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Manifest::parse("version = [", "botpack.toml").unwrap_err();
        assert!(matches!(err, BotpackError::ConfigParse { .. }));
    }

    #[test]
    fn defaults_apply_for_minimal_manifest() {
        let m = Manifest::parse("version = 1\n", "botpack.toml").unwrap();
        assert_eq!(m.assets.dir, "botpack");
        assert!(m.dependencies.is_empty());
        assert_eq!(m.sync.link_mode, LinkMode::Auto);
    }
}
