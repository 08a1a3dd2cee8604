//! Lockfile (botpack.lock) generation, parsing, and canonical writing
//!
//! The lockfile is the deterministic record of resolved dependencies. Two
//! lockfiles produced from equivalent inputs must be byte-identical, so
//! serialization is canonical: recursively sorted keys, 2-space indent,
//! trailing newline, no timestamps. Empty optional structures are
//! preserved so `parse(serialize(L)) == L` round-trips bit-exact.
//!
//! Reading is strict: unknown keys, an unsupported `lockfileVersion`, or
//! badly typed capability maps are hard errors. The legacy
//! `botyardVersion` key is accepted on read (and must agree with
//! `botpackVersion` when both are present); writes always emit
//! `botpackVersion`.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::core::BotpackError;
use crate::utils::fs::{atomic_write_text, to_canonical_json};

/// Supported `lockfileVersion`.
pub const LOCKFILE_VERSION: i64 = 1;
/// The data-model revision recorded as `specVersion`.
pub const SPEC_VERSION: &str = "0.1";

/// Compute the stable package key, e.g. `@scope/name@1.2.3`.
pub fn package_key(name: &str, version: &str) -> String {
    format!("{name}@{version}")
}

/// Split a package key back into `(name, version)`.
///
/// Splits on the *last* `@` so scoped names survive.
pub fn split_package_key(key: &str) -> Result<(&str, &str), BotpackError> {
    match key.rsplit_once('@') {
        Some((name, version)) if !name.is_empty() && !version.is_empty() => Ok((name, version)),
        _ => Err(BotpackError::Lockfile { reason: format!("invalid package key: {key:?}") }),
    }
}

/// A resolved package entry in the lockfile.
///
/// `source` is the type-tagged origin (must carry a string `type`);
/// `resolved` is free-form detail from the fetcher (e.g. the pinned
/// commit); `integrity` is the tree digest of the stored content.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Package {
    /// Origin description; always carries a string `type`
    pub source: BTreeMap<String, Value>,
    /// Fetcher-resolved detail (commit, absolute path, ...)
    pub resolved: BTreeMap<String, Value>,
    /// Tree digest of the stored content, when stored
    pub integrity: Option<String>,
    /// Declared package dependencies (name -> spec); leaves in v1
    pub dependencies: BTreeMap<String, String>,
    /// Declared capability flags (`exec`, `network`, `mcp`)
    pub capabilities: BTreeMap<String, bool>,
}

impl Package {
    /// Does this package declare a capability as true?
    pub fn capability(&self, name: &str) -> bool {
        self.capabilities.get(name).copied().unwrap_or(false)
    }
}

/// Top-level lockfile model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lockfile {
    /// Schema version; only [`LOCKFILE_VERSION`] is supported
    #[serde(rename = "lockfileVersion")]
    pub lockfile_version: i64,
    /// Version of the tool that wrote the file
    #[serde(rename = "botpackVersion")]
    pub botpack_version: String,
    /// Data-model revision
    #[serde(rename = "specVersion")]
    pub spec_version: String,
    /// Direct dependencies as originally spelled in the manifest
    pub dependencies: BTreeMap<String, String>,
    /// Resolved packages keyed `name@version`
    pub packages: BTreeMap<String, Package>,
}

impl Lockfile {
    /// Fresh lockfile with the current version stamps and no packages.
    pub fn new(botpack_version: impl Into<String>) -> Self {
        Self {
            lockfile_version: LOCKFILE_VERSION,
            botpack_version: botpack_version.into(),
            spec_version: SPEC_VERSION.to_string(),
            dependencies: BTreeMap::new(),
            packages: BTreeMap::new(),
        }
    }

    /// Load and validate a lockfile.
    pub fn load(path: &Path) -> Result<Self, BotpackError> {
        let raw = fs::read_to_string(path).map_err(|e| BotpackError::Lockfile {
            reason: format!("unable to read {}: {e}", path.display()),
        })?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| BotpackError::Lockfile { reason: format!("invalid JSON: {e}") })?;
        let top = expect_object(&value, "top-level")?;
        Self::from_json(top)
    }

    /// Serialize canonically: sorted keys, 2-space indent, trailing
    /// newline.
    pub fn serialize(&self) -> String {
        to_canonical_json(self).expect("lockfile serializes")
    }

    /// Write the lockfile atomically (staged `.tmp` + rename).
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        debug!(path = %path.display(), packages = self.packages.len(), "writing lockfile");
        atomic_write_text(path, &self.serialize())
    }

    fn from_json(data: &Map<String, Value>) -> Result<Self, BotpackError> {
        const REQUIRED: [&str; 4] = ["lockfileVersion", "specVersion", "dependencies", "packages"];

        let version_key = if data.contains_key("botpackVersion") {
            Some("botpackVersion")
        } else if data.contains_key("botyardVersion") {
            Some("botyardVersion")
        } else {
            None
        };

        let mut missing: Vec<&str> =
            REQUIRED.iter().copied().filter(|k| !data.contains_key(*k)).collect();
        if version_key.is_none() {
            missing.push("botpackVersion");
        }
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(BotpackError::Lockfile {
                reason: format!("missing required keys: {missing:?}"),
            });
        }

        let allowed = ["lockfileVersion", "botpackVersion", "botyardVersion", "specVersion", "dependencies", "packages"];
        let mut unknown: Vec<&str> =
            data.keys().map(String::as_str).filter(|k| !allowed.contains(k)).collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(BotpackError::Lockfile {
                reason: format!("unknown top-level keys: {unknown:?}"),
            });
        }

        let lockfile_version = expect_int(&data["lockfileVersion"], "lockfileVersion")?;
        if lockfile_version != LOCKFILE_VERSION {
            return Err(BotpackError::Lockfile {
                reason: format!(
                    "unsupported lockfileVersion: {lockfile_version} (expected {LOCKFILE_VERSION})"
                ),
            });
        }

        if let (Some(bp), Some(by)) = (data.get("botpackVersion"), data.get("botyardVersion")) {
            let bp = expect_str(bp, "botpackVersion")?;
            let by = expect_str(by, "botyardVersion")?;
            if bp != by {
                return Err(BotpackError::Lockfile {
                    reason: "botpackVersion and botyardVersion disagree".to_string(),
                });
            }
        }

        let version_key = version_key.expect("checked above");
        let botpack_version = expect_str(&data[version_key], version_key)?.to_string();

        let spec_version = expect_str(&data["specVersion"], "specVersion")?.to_string();
        if spec_version != SPEC_VERSION {
            return Err(BotpackError::Lockfile {
                reason: format!("unsupported specVersion: {spec_version} (expected {SPEC_VERSION})"),
            });
        }

        let dependencies = expect_string_map(&data["dependencies"], "dependencies")?;

        let packages_raw = expect_object(&data["packages"], "packages")?;
        let mut packages = BTreeMap::new();
        for (key, value) in packages_raw {
            let obj = expect_object(value, &format!("packages[{key}]"))?;
            packages.insert(key.clone(), parse_package(obj)?);
        }

        Ok(Self { lockfile_version, botpack_version, spec_version, dependencies, packages })
    }
}

fn parse_package(data: &Map<String, Value>) -> Result<Package, BotpackError> {
    let allowed = ["source", "resolved", "integrity", "dependencies", "capabilities"];
    let mut unknown: Vec<&str> =
        data.keys().map(String::as_str).filter(|k| !allowed.contains(k)).collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(BotpackError::Lockfile { reason: format!("unknown package keys: {unknown:?}") });
    }

    let source_raw = data
        .get("source")
        .ok_or_else(|| BotpackError::Lockfile { reason: "package.source is required".into() })?;
    let source_obj = expect_object(source_raw, "package.source")?;
    if !matches!(source_obj.get("type"), Some(Value::String(_))) {
        return Err(BotpackError::Lockfile {
            reason: "package.source.type is required and must be a string".into(),
        });
    }
    let source: BTreeMap<String, Value> =
        source_obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

    let resolved = match data.get("resolved") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(v) => expect_object(v, "package.resolved")?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };

    let integrity = match data.get("integrity") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(BotpackError::Lockfile {
                reason: "package.integrity must be a string".into(),
            });
        }
    };

    let dependencies = match data.get("dependencies") {
        None => BTreeMap::new(),
        Some(v) => expect_string_map(v, "package.dependencies")?,
    };

    let capabilities = match data.get("capabilities") {
        None => BTreeMap::new(),
        Some(v) => {
            let obj = expect_object(v, "package.capabilities")?;
            let mut out = BTreeMap::new();
            for (k, v) in obj {
                match v {
                    Value::Bool(b) => {
                        out.insert(k.clone(), *b);
                    }
                    _ => {
                        return Err(BotpackError::Lockfile {
                            reason: "package.capabilities must be a map of strings to booleans"
                                .into(),
                        });
                    }
                }
            }
            out
        }
    };

    Ok(Package { source, resolved, integrity, dependencies, capabilities })
}

fn expect_object<'a>(value: &'a Value, ctx: &str) -> Result<&'a Map<String, Value>, BotpackError> {
    value
        .as_object()
        .ok_or_else(|| BotpackError::Lockfile { reason: format!("{ctx} must be an object") })
}

fn expect_str<'a>(value: &'a Value, ctx: &str) -> Result<&'a str, BotpackError> {
    value
        .as_str()
        .ok_or_else(|| BotpackError::Lockfile { reason: format!("{ctx} must be a string") })
}

fn expect_int(value: &Value, ctx: &str) -> Result<i64, BotpackError> {
    value
        .as_i64()
        .ok_or_else(|| BotpackError::Lockfile { reason: format!("{ctx} must be an integer") })
}

fn expect_string_map(value: &Value, ctx: &str) -> Result<BTreeMap<String, String>, BotpackError> {
    let obj = expect_object(value, ctx)?;
    let mut out = BTreeMap::new();
    for (k, v) in obj {
        match v {
            Value::String(s) => {
                out.insert(k.clone(), s.clone());
            }
            _ => {
                return Err(BotpackError::Lockfile {
                    reason: format!("{ctx} must be a map of strings to strings"),
                });
            }
        }
    }
    Ok(out)
}
