//! Install pipeline: fetch, store, trust-gate, lock
//!
//! `install` walks the manifest's declared dependencies (each a leaf in
//! v1 - no transitive resolution), turns every one into a stored tree,
//! and records the outcome in the lockfile:
//!
//! 1. **path** deps are used in place; **git** deps go through the cache;
//!    **semver** deps resolve via the registry into a git dependency
//!    pinned at an immutable commit first
//! 2. the fetched tree is published into the content-addressed store
//! 3. the package's `agentpkg.toml` is read and its declared
//!    capabilities are checked against the trust file - a package that
//!    wants exec/mcp without a matching trust entry aborts the install
//!    with the package key in the denial
//! 4. a lockfile entry is recorded with the source, the fetcher's
//!    resolved detail, and the tree digest
//!
//! The resulting lockfile is canonical: installing the same manifest
//! against the same sources yields byte-identical bytes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::core::BotpackError;
use crate::fetch::{fetch_git, fetch_path};
use crate::lockfile::{Lockfile, Package, package_key};
use crate::manifest::{DepSpec, Manifest, PackageManifest};
use crate::paths::ProjectDirs;
use crate::registry;
use crate::store::Store;
use crate::trust::{TrustConfig, check_package_trust};

/// Outcome of a successful install.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// Where the lockfile was written
    pub lock_path: PathBuf,
    /// The lockfile that was written
    pub lockfile: Lockfile,
}

/// Resolve, fetch, trust-check, and lock every declared dependency.
pub async fn install(dirs: &ProjectDirs, offline: bool) -> anyhow::Result<InstallOutcome> {
    let manifest = Manifest::load(&dirs.manifest_path())?;
    install_with_manifest(dirs, &manifest, offline).await
}

/// Install with an already-loaded manifest.
pub async fn install_with_manifest(
    dirs: &ProjectDirs,
    manifest: &Manifest,
    offline: bool,
) -> anyhow::Result<InstallOutcome> {
    let store = Store::new(dirs.store_dir());
    let trust = TrustConfig::load(&dirs.trust_path())?;
    let cache_dir = dirs.git_cache_dir();

    let mut direct_deps: BTreeMap<String, String> = BTreeMap::new();
    let mut packages: BTreeMap<String, Package> = BTreeMap::new();

    for (dep_name, dep) in &manifest.dependencies {
        direct_deps.insert(dep_name.clone(), dep.lock_spec());

        let (fetched, source) = match dep {
            DepSpec::Path { path } => {
                let fetched = fetch_path(path, dirs.root())?;
                let mut source = BTreeMap::new();
                source.insert("type".to_string(), serde_json::json!("path"));
                source.insert("path".to_string(), serde_json::json!(path));
                (fetched, source)
            }
            DepSpec::Git { git, rev } => {
                let fetched = fetch_git(git, rev.as_deref(), &cache_dir, offline).await?;
                let mut source = BTreeMap::new();
                source.insert("type".to_string(), serde_json::json!("git"));
                source.insert("url".to_string(), serde_json::json!(git));
                source.insert("rev".to_string(), serde_json::json!(rev));
                (fetched, source)
            }
            DepSpec::Semver(spec) => {
                if offline {
                    return Err(BotpackError::Registry {
                        reason: format!("offline: cannot resolve {dep_name}@{spec}"),
                    }
                    .into());
                }
                let resolution = registry::resolve(dep_name, spec, None).await?;
                debug!(
                    name = %dep_name,
                    version = %resolution.version,
                    commit = %resolution.commit,
                    "registry resolved"
                );
                let mut fetched = fetch_git(
                    &resolution.git,
                    Some(&resolution.commit),
                    &cache_dir,
                    offline,
                )
                .await?;
                fetched
                    .resolved
                    .insert("version".to_string(), serde_json::json!(resolution.version));
                let mut source = BTreeMap::new();
                source.insert("type".to_string(), serde_json::json!("git"));
                source.insert("url".to_string(), serde_json::json!(resolution.git));
                source.insert("rev".to_string(), serde_json::json!(resolution.commit));
                (fetched, source)
            }
            DepSpec::Url { .. } => {
                return Err(BotpackError::UnsupportedDependency { what: "url".to_string() }.into());
            }
        };

        let stored = store.put_tree(&fetched.path)?;
        let pkg_manifest = PackageManifest::load(&fetched.path)?;
        let key = package_key(&pkg_manifest.name, &pkg_manifest.version);

        let decision = check_package_trust(
            &trust,
            &key,
            Some(&stored.digest),
            pkg_manifest.capabilities.exec,
            pkg_manifest.capabilities.mcp,
        );
        if !decision.ok {
            return Err(BotpackError::TrustDenied {
                reason: decision.reason.unwrap_or_else(|| format!("{key}: not trusted")),
            }
            .into());
        }

        let mut capabilities = BTreeMap::new();
        capabilities.insert("exec".to_string(), pkg_manifest.capabilities.exec);
        capabilities.insert("network".to_string(), pkg_manifest.capabilities.network);
        capabilities.insert("mcp".to_string(), pkg_manifest.capabilities.mcp);

        info!(pkg = %key, digest = %stored.digest, "installed");
        packages.insert(
            key,
            Package {
                source,
                resolved: fetched.resolved,
                integrity: Some(stored.digest),
                dependencies: BTreeMap::new(),
                capabilities,
            },
        );
    }

    let mut lockfile = Lockfile::new(env!("CARGO_PKG_VERSION"));
    lockfile.dependencies = direct_deps;
    lockfile.packages = packages;

    // Writes always use the new name, even when a legacy botyard.lock
    // was the one read.
    let lock_path = dirs.lock_write_path();
    lockfile.save(&lock_path)?;
    Ok(InstallOutcome { lock_path, lockfile })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    fn project_with_path_dep(caps: &str) -> (TempDir, ProjectDirs) {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "pack/agentpkg.toml",
            &format!("agentpkg = \"1\"\nname = \"@acme/pack\"\nversion = \"1.0.0\"\n{caps}"),
        );
        write(tmp.path(), "pack/commands/hi.md", "hi\n");
        write(
            tmp.path(),
            "botpack.toml",
            "version = 1\n\n[dependencies]\n\"@acme/pack\" = { path = \"pack\" }\n",
        );
        let dirs = ProjectDirs::new(tmp.path(), tmp.path().join("store"));
        (tmp, dirs)
    }

    #[tokio::test]
    async fn installs_path_dependency_into_store_and_lock() {
        let (_tmp, dirs) = project_with_path_dep("");
        let outcome = install(&dirs, false).await.unwrap();

        assert!(outcome.lock_path.ends_with("botpack.lock"));
        let pkg = &outcome.lockfile.packages["@acme/pack@1.0.0"];
        assert_eq!(pkg.source["type"], serde_json::json!("path"));
        let digest = pkg.integrity.clone().unwrap();
        assert!(dirs.store_dir().join(&digest).join("commands/hi.md").is_file());
        assert_eq!(outcome.lockfile.dependencies["@acme/pack"], "*");

        // Reinstall is deterministic.
        let again = install(&dirs, false).await.unwrap();
        assert_eq!(again.lockfile.serialize(), outcome.lockfile.serialize());
    }

    #[tokio::test]
    async fn exec_capability_requires_trust() {
        let (tmp, dirs) = project_with_path_dep("\n[capabilities]\nexec = true\n");

        let err = install(&dirs, false).await.unwrap_err();
        let reason = err.to_string();
        assert!(reason.contains("trust denied"));
        assert!(reason.contains("@acme/pack@1.0.0"));

        // Granting trust lets the install through.
        write(
            tmp.path(),
            ".botpack/trust.toml",
            "version = 1\n[\"@acme/pack@1.0.0\"]\nallowExec = true\n",
        );
        let outcome = install(&dirs, false).await.unwrap();
        assert_eq!(
            outcome.lockfile.packages["@acme/pack@1.0.0"].capability("exec"),
            true
        );
    }

    #[tokio::test]
    async fn url_dependencies_are_deferred() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "botpack.toml",
            "version = 1\n\n[dependencies]\nx = { url = \"https://example.test/x.tar\" }\n",
        );
        let dirs = ProjectDirs::new(tmp.path(), tmp.path().join("store"));
        let err = install(&dirs, false).await.unwrap_err();
        assert!(err.to_string().contains("url"));
    }
}
