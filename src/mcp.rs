//! MCP server aggregation and target document emission
//!
//! Server descriptors live in `mcp/servers.toml` files, one per source
//! (first-party assets plus each installed package):
//!
//! ```toml
//! version = 1
//!
//! [[server]]
//! id = "zeta"
//! command = "npx"
//! args = ["-y", "zeta"]
//!
//! [[server]]
//! id = "alpha"
//! url = "http://example.test"
//! env = { FOO = "bar" }
//! ```
//!
//! A server with a `command` uses stdio transport (and therefore needs
//! exec trust); a server with a `url` uses http transport (and needs mcp
//! trust). Each server is namespaced into an fqid
//! `"<namespace>/<id>"` where the namespace is the first-party prefix or
//! the package name. The aggregated target document is canonical JSON
//! sorted by fqid; a duplicate fqid after aggregation is a hard error.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::BotpackError;
use crate::manifest::{check_keys, require_int, require_str, require_str_list, require_table, validation};

/// Stable schema URI stamped into every emitted MCP document.
pub const MCP_SCHEMA_URI: &str = "https://smartykit.dev/schemas/mcp.json";

/// Server transport, derived from which field the descriptor carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Spawns a process; requires exec trust
    Stdio,
    /// Speaks HTTP to a URL; requires mcp trust
    Http,
}

impl Transport {
    /// Wire name used in the emitted document.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

/// One namespaced MCP server ready for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServer {
    /// Fully-qualified id: `<namespace>/<id>`
    pub fqid: String,
    /// Human-readable name from the descriptor (may be empty)
    pub name: String,
    /// Derived transport
    pub transport: Transport,
    /// Command for stdio servers
    pub command: Option<String>,
    /// Arguments for stdio servers
    pub args: Option<Vec<String>>,
    /// URL for http servers
    pub url: Option<String>,
    /// Environment variables handed to the server
    pub env: Option<BTreeMap<String, String>>,
}

impl McpServer {
    /// Does this server need exec trust (stdio) rather than mcp trust?
    pub fn needs_exec(&self) -> bool {
        self.transport == Transport::Stdio
    }

    /// JSON object emitted into the target document.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".to_string(), json!(self.fqid));
        out.insert("transport".to_string(), json!(self.transport.as_str()));
        if let Some(command) = &self.command {
            out.insert("command".to_string(), json!(command));
        }
        if let Some(args) = &self.args {
            out.insert("args".to_string(), json!(args));
        }
        if let Some(url) = &self.url {
            out.insert("url".to_string(), json!(url));
        }
        if let Some(env) = &self.env {
            out.insert("env".to_string(), json!(env));
        }
        if !self.name.is_empty() {
            out.insert("notes".to_string(), json!(self.name));
        }
        Value::Object(out)
    }
}

/// Parse one `servers.toml` and namespace its servers, sorted by fqid.
pub fn build_mcp_servers(
    namespace: &str,
    servers_toml_path: &Path,
) -> Result<Vec<McpServer>, BotpackError> {
    let file = servers_toml_path.display().to_string();
    let text = fs::read_to_string(servers_toml_path).map_err(|e| BotpackError::ConfigValidation {
        file: file.clone(),
        message: format!("unable to read file: {e}"),
    })?;
    let value: toml::Value = toml::from_str(&text).map_err(|e| BotpackError::ConfigParse {
        file: file.clone(),
        message: e.to_string(),
        line: None,
        col: None,
    })?;
    let table = value
        .as_table()
        .ok_or_else(|| validation(&file, "top-level must be a table".to_string()))?;

    check_keys(table, &["version", "server"], &file, "")?;
    let version = require_int(table.get("version"), &file, "version")?;
    if version != 1 {
        return Err(validation(&file, format!("version: expected 1, got {version}")));
    }

    let mut out = Vec::new();
    let Some(servers_raw) = table.get("server") else {
        return Ok(out);
    };
    let servers = servers_raw
        .as_array()
        .ok_or_else(|| validation(&file, "server: [[server]] must be an array".to_string()))?;

    for (i, raw) in servers.iter().enumerate() {
        let at = format!("server[{i}]");
        let tbl = require_table(Some(raw), &file, &at)?;
        check_keys(tbl, &["id", "name", "command", "args", "url", "env"], &file, &at)?;

        let id = require_str(tbl.get("id"), &file, &format!("{at}.id"))?.trim().to_string();
        if id.is_empty() {
            return Err(validation(&file, format!("{at}.id: must be non-empty")));
        }
        let fqid = format!("{namespace}/{id}");
        let name = match tbl.get("name") {
            None => String::new(),
            Some(v) => require_str(Some(v), &file, &format!("{at}.name"))?.to_string(),
        };

        let env = match tbl.get("env") {
            None => None,
            Some(v) => {
                let env_tbl = require_table(Some(v), &file, &format!("{at}.env"))?;
                let mut env = BTreeMap::new();
                for (k, val) in env_tbl {
                    let s = require_str(Some(val), &file, &format!("{at}.env.{k}"))?;
                    env.insert(k.clone(), s.to_string());
                }
                if env.is_empty() { None } else { Some(env) }
            }
        };

        if tbl.contains_key("url") {
            let url = require_str(tbl.get("url"), &file, &format!("{at}.url"))?.to_string();
            out.push(McpServer {
                fqid,
                name,
                transport: Transport::Http,
                command: None,
                args: None,
                url: Some(url),
                env,
            });
            continue;
        }

        let command = require_str(tbl.get("command"), &file, &format!("{at}.command"))?.to_string();
        let args = match tbl.get("args") {
            None => Vec::new(),
            Some(v) => require_str_list(Some(v), &file, &format!("{at}.args"))?,
        };
        out.push(McpServer {
            fqid,
            name,
            transport: Transport::Stdio,
            command: Some(command),
            args: Some(args),
            url: None,
            env,
        });
    }

    out.sort_by(|a, b| a.fqid.cmp(&b.fqid));
    Ok(out)
}

/// Assert fqid uniqueness across an aggregated, sorted server list.
///
/// Well-formed inputs cannot collide (each source namespaces its own
/// ids), so a duplicate here is an implementation bug or malformed input
/// and is a hard error.
pub fn check_unique_fqids(servers: &[McpServer]) -> Result<(), BotpackError> {
    for pair in servers.windows(2) {
        if pair[0].fqid == pair[1].fqid {
            return Err(BotpackError::DuplicateMcpServer { fqid: pair[0].fqid.clone() });
        }
    }
    Ok(())
}

/// Build the target MCP document value (pre-canonicalization).
pub fn build_target_mcp_json(servers: &[McpServer]) -> Value {
    json!({
        "$schema": MCP_SCHEMA_URI,
        "servers": servers.iter().map(McpServer::to_json).collect::<Vec<_>>(),
    })
}
