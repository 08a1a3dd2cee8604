//! Package manifest (agentpkg.toml) parsing
//!
//! Every installable package carries an `agentpkg.toml` at its root
//! describing the package name, version, what it exports, and - most
//! importantly for the trust gate - the capabilities it declares
//! (`exec`, `network`, `mcp`). The same closed-schema, dotted-path
//! validation style as the project manifest applies.

use std::fs;
use std::path::Path;
use toml::Value;
use toml::map::Map;

use crate::core::BotpackError;
use crate::manifest::{check_keys, require_bool, require_str, require_str_list, require_table, validation};

/// Declared package capabilities gated by trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackageCapabilities {
    /// Package wants to execute processes (scripts, stdio MCP servers)
    pub exec: bool,
    /// Package wants network access
    pub network: bool,
    /// Package wants to register MCP servers
    pub mcp: bool,
}

/// Compatibility requirements (front-ends the package expects).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageCompat {
    /// Required front-end identifiers
    pub requires: Vec<String>,
}

/// Optional explicit export lists; `None` means "everything discovered".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageExports {
    /// Exported skill ids
    pub skills: Option<Vec<String>>,
    /// Exported command ids
    pub commands: Option<Vec<String>>,
    /// Exported agent ids
    pub agents: Option<Vec<String>>,
}

/// Parsed and validated package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    /// Format marker from the `agentpkg` key
    pub agentpkg: String,
    /// Package name, possibly scoped (`@scope/name`)
    pub name: String,
    /// 3-segment semver version
    pub version: String,
    /// Optional description
    pub description: Option<String>,
    /// Optional SPDX license expression
    pub license: Option<String>,
    /// Optional repository URL
    pub repository: Option<String>,
    /// Compatibility requirements
    pub compat: PackageCompat,
    /// Explicit export lists
    pub exports: PackageExports,
    /// Declared capabilities
    pub capabilities: PackageCapabilities,
}

impl PackageManifest {
    /// Load `agentpkg.toml` from a file, or from `<dir>/agentpkg.toml`
    /// when handed a directory.
    pub fn load(path: &Path) -> Result<Self, BotpackError> {
        let p = if path.is_dir() { path.join("agentpkg.toml") } else { path.to_path_buf() };
        let file = p.display().to_string();
        let text = fs::read_to_string(&p).map_err(|e| BotpackError::ConfigValidation {
            file: file.clone(),
            message: format!("unable to read file: {e}"),
        })?;
        Self::parse(&text, &file)
    }

    /// Parse and validate package manifest text.
    pub fn parse(text: &str, file: &str) -> Result<Self, BotpackError> {
        let value: Value = toml::from_str(text).map_err(|e| BotpackError::ConfigParse {
            file: file.to_string(),
            message: e.to_string(),
            line: None,
            col: None,
        })?;
        let table = value.as_table().ok_or_else(|| {
            validation(file, "top-level must be a table".to_string())
        })?;
        project(table, file)
    }
}

fn project(data: &Map<String, Value>, file: &str) -> Result<PackageManifest, BotpackError> {
    check_keys(
        data,
        &[
            "agentpkg",
            "name",
            "version",
            "description",
            "license",
            "repository",
            "compat",
            "exports",
            "capabilities",
        ],
        file,
        "",
    )?;

    let agentpkg = require_str(data.get("agentpkg"), file, "agentpkg")?.to_string();
    let name = require_str(data.get("name"), file, "name")?.to_string();
    let version = require_str(data.get("version"), file, "version")?.to_string();

    let opt_str = |key: &str| -> Result<Option<String>, BotpackError> {
        match data.get(key) {
            None => Ok(None),
            Some(v) => Ok(Some(require_str(Some(v), file, key)?.to_string())),
        }
    };
    let description = opt_str("description")?;
    let license = opt_str("license")?;
    let repository = opt_str("repository")?;

    let mut compat = PackageCompat::default();
    if let Some(raw) = data.get("compat") {
        let tbl = require_table(Some(raw), file, "compat")?;
        check_keys(tbl, &["requires"], file, "compat")?;
        if let Some(v) = tbl.get("requires") {
            compat.requires = require_str_list(Some(v), file, "compat.requires")?;
        }
    }

    let mut exports = PackageExports::default();
    if let Some(raw) = data.get("exports") {
        let tbl = require_table(Some(raw), file, "exports")?;
        check_keys(tbl, &["skills", "commands", "agents"], file, "exports")?;
        if let Some(v) = tbl.get("skills") {
            exports.skills = Some(require_str_list(Some(v), file, "exports.skills")?);
        }
        if let Some(v) = tbl.get("commands") {
            exports.commands = Some(require_str_list(Some(v), file, "exports.commands")?);
        }
        if let Some(v) = tbl.get("agents") {
            exports.agents = Some(require_str_list(Some(v), file, "exports.agents")?);
        }
    }

    let mut capabilities = PackageCapabilities::default();
    if let Some(raw) = data.get("capabilities") {
        let tbl = require_table(Some(raw), file, "capabilities")?;
        check_keys(tbl, &["exec", "network", "mcp"], file, "capabilities")?;
        if let Some(v) = tbl.get("exec") {
            capabilities.exec = require_bool(Some(v), file, "capabilities.exec")?;
        }
        if let Some(v) = tbl.get("network") {
            capabilities.network = require_bool(Some(v), file, "capabilities.network")?;
        }
        if let Some(v) = tbl.get("mcp") {
            capabilities.mcp = require_bool(Some(v), file, "capabilities.mcp")?;
        }
    }

    Ok(PackageManifest {
        agentpkg,
        name,
        version,
        description,
        license,
        repository,
        compat,
        exports,
        capabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
agentpkg = "1"
name = "@acme/quality-skills"
version = "2.1.0"
description = "Review helpers"
license = "MIT"

[compat]
requires = ["claude"]

[exports]
skills = ["review"]

[capabilities]
exec = true
mcp = false
"#;

    #[test]
    fn parses_package_manifest() {
        let pkg = PackageManifest::parse(SAMPLE, "agentpkg.toml").unwrap();
        assert_eq!(pkg.name, "@acme/quality-skills");
        assert_eq!(pkg.version, "2.1.0");
        assert_eq!(pkg.compat.requires, vec!["claude"]);
        assert_eq!(pkg.exports.skills.as_deref(), Some(&["review".to_string()][..]));
        assert!(pkg.exports.commands.is_none());
        assert!(pkg.capabilities.exec);
        assert!(!pkg.capabilities.network);
    }

    #[test]
    fn required_fields_enforced() {
        let err = PackageManifest::parse("agentpkg = \"1\"\nname = \"x\"\n", "agentpkg.toml")
            .unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn unknown_capability_keys_rejected() {
        let err = PackageManifest::parse(
            "agentpkg = \"1\"\nname = \"x\"\nversion = \"1.0.0\"\n[capabilities]\nroot = true\n",
            "agentpkg.toml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("capabilities: unknown keys: root"));
    }
}
