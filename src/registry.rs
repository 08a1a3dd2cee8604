//! Static registry index resolution for semver dependencies
//!
//! The registry is a static file tree: `<base>/<name>/versions.json`
//! advertises the published versions of a package, each pointing at a git
//! repository and an immutable commit:
//!
//! ```json
//! {
//!   "versions": {
//!     "1.2.3": {"git": "https://...", "commit": "<sha>"}
//!   }
//! }
//! ```
//!
//! Resolution picks the highest version satisfying the spec and folds the
//! result into a git dependency pinned at that commit, so everything
//! downstream (fetch, store, lockfile) follows the ordinary git path.
//! Index selection is pure and separated from the HTTP fetch for
//! testability.

use serde_json::Value;
use std::env;

use crate::core::BotpackError;
use crate::manifest::DepSpec;
use crate::resolver::pick_highest_satisfying;

/// Default static index base.
pub const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/Smarty-Pants-Inc/botpack-registry/main";

/// Environment variable overriding the registry base URL.
pub const ENV_REGISTRY_URL: &str = "BOTPACK_REGISTRY_URL";

/// The active registry base URL (env override or default), sans trailing
/// slash.
pub fn registry_base_url() -> String {
    env::var(ENV_REGISTRY_URL)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// A semver dependency resolved to a pinned git source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryResolution {
    /// Package name as looked up
    pub name: String,
    /// The original spec string
    pub spec: String,
    /// The chosen version
    pub version: String,
    /// Git URL the version lives at
    pub git: String,
    /// Immutable commit of the version
    pub commit: String,
}

impl RegistryResolution {
    /// Fold into a git dependency pinned at the immutable commit.
    pub fn as_git_dep(&self) -> DepSpec {
        DepSpec::Git { git: self.git.clone(), rev: Some(self.commit.clone()) }
    }
}

/// URL of the versions index for `name`.
///
/// Path segments are percent-encoded, but `@` is kept readable so scoped
/// package directories stay recognizable on disk and in URLs.
pub fn versions_index_url(name: &str, base_url: Option<&str>) -> String {
    let base = base_url
        .map(|b| b.trim_end_matches('/').to_string())
        .unwrap_or_else(registry_base_url);
    let mut segments: Vec<String> = Vec::new();
    for seg in name.split('/') {
        if seg.is_empty() || seg == "." {
            continue;
        }
        segments.push(encode_segment(seg));
    }
    segments.push("versions.json".to_string());
    format!("{base}/{}", segments.join("/"))
}

fn encode_segment(seg: &str) -> String {
    let mut out = String::with_capacity(seg.len());
    for b in seg.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'@' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Select a version from a parsed index document. Pure.
pub fn resolve_from_index(
    name: &str,
    spec: &str,
    index: &Value,
) -> Result<RegistryResolution, BotpackError> {
    let versions = index
        .get("versions")
        .and_then(Value::as_object)
        .ok_or_else(|| BotpackError::Registry {
            reason: format!("invalid index for {name} (expected versions object)"),
        })?;

    let available: Vec<String> = versions.keys().cloned().collect();
    let chosen = pick_highest_satisfying(&available, spec)?.ok_or_else(|| {
        BotpackError::NoMatchingVersion { name: name.to_string(), spec: spec.to_string() }
    })?;

    let entry = versions
        .get(&chosen)
        .and_then(Value::as_object)
        .ok_or_else(|| BotpackError::Registry {
            reason: format!("invalid entry for {name}@{chosen} (expected object)"),
        })?;

    let git = entry.get("git").and_then(Value::as_str).filter(|s| !s.is_empty()).ok_or_else(
        || BotpackError::Registry {
            reason: format!("versions[{chosen}].git must be a non-empty string"),
        },
    )?;
    let commit = entry
        .get("commit")
        .or_else(|| entry.get("rev"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BotpackError::Registry {
            reason: format!("versions[{chosen}].commit must be a non-empty string"),
        })?;

    Ok(RegistryResolution {
        name: name.to_string(),
        spec: spec.to_string(),
        version: chosen,
        git: git.to_string(),
        commit: commit.to_string(),
    })
}

/// Resolve `name@spec` against the registry over HTTP.
pub async fn resolve(
    name: &str,
    spec: &str,
    base_url: Option<&str>,
) -> Result<RegistryResolution, BotpackError> {
    let url = versions_index_url(name, base_url);
    let response = reqwest::get(&url).await.map_err(|e| BotpackError::Registry {
        reason: format!("failed to fetch {url}: {e}"),
    })?;
    if !response.status().is_success() {
        return Err(BotpackError::Registry {
            reason: format!("failed to fetch {url}: HTTP {}", response.status()),
        });
    }
    let index: Value = response.json().await.map_err(|e| BotpackError::Registry {
        reason: format!("invalid index JSON at {url}: {e}"),
    })?;
    resolve_from_index(name, spec, &index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index() -> Value {
        json!({
            "versions": {
                "1.0.0": {"git": "https://example.test/q.git", "commit": "a".repeat(40)},
                "1.2.0": {"git": "https://example.test/q.git", "commit": "b".repeat(40)},
                "2.0.0": {"git": "https://example.test/q2.git", "commit": "c".repeat(40)}
            }
        })
    }

    #[test]
    fn picks_highest_satisfying_and_pins() {
        let r = resolve_from_index("@acme/quality", "^1", &index()).unwrap();
        assert_eq!(r.version, "1.2.0");
        assert_eq!(r.commit, "b".repeat(40));
        assert_eq!(
            r.as_git_dep(),
            DepSpec::Git { git: "https://example.test/q.git".into(), rev: Some("b".repeat(40)) }
        );
    }

    #[test]
    fn no_match_is_distinct_error() {
        let err = resolve_from_index("@acme/quality", "^3", &index()).unwrap_err();
        assert!(matches!(err, BotpackError::NoMatchingVersion { .. }));
    }

    #[test]
    fn malformed_index_rejected() {
        let err = resolve_from_index("@acme/quality", "^1", &json!({})).unwrap_err();
        assert!(err.to_string().contains("versions object"));

        let err = resolve_from_index(
            "@acme/quality",
            "^1",
            &json!({"versions": {"1.0.0": {"git": "u"}}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("commit"));
    }

    #[test]
    fn rev_is_accepted_as_commit_alias() {
        let idx = json!({"versions": {"1.0.0": {"git": "u", "rev": "abc"}}});
        let r = resolve_from_index("p", "^1", &idx).unwrap();
        assert_eq!(r.commit, "abc");
    }

    #[test]
    fn index_url_keeps_scoped_names_readable() {
        let url = versions_index_url("@acme/quality", Some("https://registry.test/base/"));
        assert_eq!(url, "https://registry.test/base/@acme/quality/versions.json");

        let url = versions_index_url("we ird", Some("https://registry.test"));
        assert_eq!(url, "https://registry.test/we%20ird/versions.json");
    }
}
