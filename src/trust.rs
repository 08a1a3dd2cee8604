//! Exec/MCP capability trust gating
//!
//! Packages (and the first-party workspace) must be explicitly trusted
//! before anything they ship can execute processes or register MCP
//! servers. Trust lives in `.botpack/trust.toml`, keyed by package key
//! (`name@version`) with the reserved key `__workspace__` for first-party
//! assets.
//!
//! A trust entry may pin `digest.integrity`; when pinned, the entry only
//! applies to packages whose stored integrity matches exactly - a
//! mismatch is a hard deny, never a silent acceptance. Per-server
//! overrides under `mcp.<fqid>` overlay the package-level allowances.
//!
//! Decision functions are pure `(config, inputs) -> TrustDecision` so
//! they are trivially testable; callers load the config once per
//! invocation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use toml::Value;
use tracing::debug;

use crate::core::BotpackError;
use crate::manifest::{check_keys, require_bool, require_int, require_str, require_table};

/// Reserved trust key for repo-local (first-party) assets.
pub const WORKSPACE_TRUST_KEY: &str = "__workspace__";

/// Outcome of a trust evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustDecision {
    /// Whether the requested capabilities are allowed
    pub ok: bool,
    /// Denial reason including the package key, when not ok
    pub reason: Option<String>,
}

impl TrustDecision {
    fn allow() -> Self {
        Self { ok: true, reason: None }
    }

    fn deny(reason: String) -> Self {
        Self { ok: false, reason: Some(reason) }
    }
}

/// Per-server trust override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct McpTrust {
    /// Allow stdio (process-spawning) transport
    pub allow_exec: bool,
    /// Allow non-stdio (network) transport
    pub allow_mcp: bool,
}

/// Optional digest pin on a trust entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustDigest {
    /// Required `sha256:<hex>` tree digest
    pub integrity: String,
}

/// One trust grant, keyed by package key or [`WORKSPACE_TRUST_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrustEntry {
    /// Package-level exec allowance
    pub allow_exec: bool,
    /// Package-level mcp allowance
    pub allow_mcp: bool,
    /// Optional digest pin
    pub digest: Option<TrustDigest>,
    /// Per-server overrides keyed by fqid
    pub mcp: BTreeMap<String, McpTrust>,
}

/// Parsed trust file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustConfig {
    /// Schema version; must be 1
    pub version: i64,
    /// Trust entries keyed by package key string
    pub packages: BTreeMap<String, TrustEntry>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self { version: 1, packages: BTreeMap::new() }
    }
}

impl TrustConfig {
    /// Load `.botpack/trust.toml`. A missing file is an empty config;
    /// anything else must validate.
    pub fn load(path: &Path) -> Result<Self, BotpackError> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(BotpackError::ConfigValidation {
                    file: path.display().to_string(),
                    message: format!("unable to read file: {e}"),
                });
            }
        };
        Self::parse(&text, &path.display().to_string())
    }

    /// Parse and validate trust file text.
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

        let version = require_int(table.get("version"), file, "version")?;
        if version != 1 {
            return Err(BotpackError::ConfigValidation {
                file: file.to_string(),
                message: format!("version: expected 1, got {version}"),
            });
        }

        let mut packages = BTreeMap::new();
        for (key, raw) in table {
            if key.as_str() == "version" {
                continue;
            }
            let tbl = require_table(Some(raw), file, key)?;
            check_keys(tbl, &["allowExec", "allowMcp", "digest", "mcp"], file, key)?;

            let mut entry = TrustEntry::default();
            if let Some(v) = tbl.get("allowExec") {
                entry.allow_exec = require_bool(Some(v), file, &format!("{key}.allowExec"))?;
            }
            if let Some(v) = tbl.get("allowMcp") {
                entry.allow_mcp = require_bool(Some(v), file, &format!("{key}.allowMcp"))?;
            }
            if let Some(v) = tbl.get("digest") {
                let at = format!("{key}.digest");
                let digest_tbl = require_table(Some(v), file, &at)?;
                check_keys(digest_tbl, &["integrity"], file, &at)?;
                let integrity =
                    require_str(digest_tbl.get("integrity"), file, &format!("{at}.integrity"))?;
                entry.digest = Some(TrustDigest { integrity: integrity.to_string() });
            }
            if let Some(v) = tbl.get("mcp") {
                let at = format!("{key}.mcp");
                let mcp_tbl = require_table(Some(v), file, &at)?;
                for (fqid, server_raw) in mcp_tbl {
                    let server_at = format!("{at}.{fqid}");
                    let server_tbl = require_table(Some(server_raw), file, &server_at)?;
                    check_keys(server_tbl, &["allowExec", "allowMcp"], file, &server_at)?;
                    let mut t = McpTrust::default();
                    if let Some(v) = server_tbl.get("allowExec") {
                        t.allow_exec =
                            require_bool(Some(v), file, &format!("{server_at}.allowExec"))?;
                    }
                    if let Some(v) = server_tbl.get("allowMcp") {
                        t.allow_mcp =
                            require_bool(Some(v), file, &format!("{server_at}.allowMcp"))?;
                    }
                    entry.mcp.insert(fqid.clone(), t);
                }
            }
            packages.insert(key.clone(), entry);
        }

        Ok(Self { version, packages })
    }
}

/// Evaluate trust for a whole package at install time.
///
/// A package declaring neither exec nor mcp needs no entry. A declared
/// need with no entry denies; a digest pin that does not match the stored
/// integrity denies regardless of allowances.
pub fn check_package_trust(
    config: &TrustConfig,
    pkg_key: &str,
    integrity: Option<&str>,
    needs_exec: bool,
    needs_mcp: bool,
) -> TrustDecision {
    let Some(entry) = config.packages.get(pkg_key) else {
        if needs_exec || needs_mcp {
            return TrustDecision::deny(format!("{pkg_key}: requires trust for exec/mcp"));
        }
        return TrustDecision::allow();
    };

    if let (Some(integrity), Some(pin)) = (integrity, &entry.digest) {
        if pin.integrity != integrity {
            return TrustDecision::deny(format!(
                "{pkg_key}: trust.digest mismatch (trust={}, got={integrity})",
                pin.integrity
            ));
        }
    }

    if needs_exec && !entry.allow_exec {
        return TrustDecision::deny(format!("{pkg_key}: exec not trusted"));
    }
    if needs_mcp && !entry.allow_mcp {
        return TrustDecision::deny(format!("{pkg_key}: mcp not trusted"));
    }
    TrustDecision::allow()
}

/// Evaluate trust for a single MCP server.
///
/// Starts from the package-level allowances and overlays any
/// `mcp.<fqid>` override. Stdio servers need exec; url servers need mcp.
pub fn check_mcp_server_trust(
    config: &TrustConfig,
    pkg_key: &str,
    integrity: Option<&str>,
    fqid: &str,
    needs_exec: bool,
    needs_mcp: bool,
) -> TrustDecision {
    let Some(entry) = config.packages.get(pkg_key) else {
        if needs_exec || needs_mcp {
            return TrustDecision::deny(format!("{pkg_key}: requires trust for exec/mcp"));
        }
        return TrustDecision::allow();
    };

    if let (Some(integrity), Some(pin)) = (integrity, &entry.digest) {
        if pin.integrity != integrity {
            return TrustDecision::deny(format!(
                "{pkg_key}: trust.digest mismatch (trust={}, got={integrity})",
                pin.integrity
            ));
        }
    }

    let (allow_exec, allow_mcp) = match entry.mcp.get(fqid) {
        Some(o) => (o.allow_exec, o.allow_mcp),
        None => (entry.allow_exec, entry.allow_mcp),
    };

    if needs_exec && !allow_exec {
        debug!(pkg_key, fqid, "mcp server denied: exec not trusted");
        return TrustDecision::deny(format!("{pkg_key}: exec not trusted for {fqid}"));
    }
    if needs_mcp && !allow_mcp {
        debug!(pkg_key, fqid, "mcp server denied: mcp not trusted");
        return TrustDecision::deny(format!("{pkg_key}: mcp not trusted for {fqid}"));
    }
    TrustDecision::allow()
}
