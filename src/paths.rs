//! Project root, state, and store path resolution
//!
//! All paths the toolchain reads or writes hang off a [`ProjectDirs`]
//! value resolved once per invocation. Environment overrides and legacy
//! aliases are applied here and nowhere else:
//!
//! - project root: `BOTPACK_ROOT` (legacy `BOTYARD_ROOT`, `SMARTY_ROOT`)
//! - store: `BOTPACK_STORE` (legacy `BOTYARD_STORE`), `~`-expanded,
//!   defaulting to `<home>/.botpack/store/v1`
//! - state dir: `.botpack/` preferred, legacy `.botyard/` accepted when it
//!   is the only one present
//! - `botpack.toml` / `botpack.lock` preferred over the legacy `botyard.*`
//!   spellings
//!
//! Legacy forms are read-only aliases; anything Botpack writes uses the new
//! names.

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the project root.
pub const ENV_ROOT: &str = "BOTPACK_ROOT";
/// Legacy aliases for [`ENV_ROOT`], accepted in order.
pub const ENV_ROOT_LEGACY: [&str; 2] = ["BOTYARD_ROOT", "SMARTY_ROOT"];
/// Environment variable overriding the content-addressed store.
pub const ENV_STORE: &str = "BOTPACK_STORE";
/// Legacy alias for [`ENV_STORE`].
pub const ENV_STORE_LEGACY: &str = "BOTYARD_STORE";

/// Resolved filesystem layout for one invocation.
///
/// Holds the project root and the store root; everything else is derived.
#[derive(Debug, Clone)]
pub struct ProjectDirs {
    root: PathBuf,
    store: PathBuf,
}

impl ProjectDirs {
    /// Build from explicit paths. Used by tests and embedding callers.
    pub fn new(root: impl Into<PathBuf>, store: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), store: store.into() }
    }

    /// Resolve root and store from the environment.
    ///
    /// Falls back to the current working directory for the root and the
    /// home-anchored default for the store.
    pub fn from_env() -> Self {
        let root = env_root_override()
            .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let store = env_store_override().unwrap_or_else(default_store_dir);
        Self { root, store }
    }

    /// The project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The content-addressed store root.
    pub fn store_dir(&self) -> &Path {
        &self.store
    }

    /// Project-local state directory (`.botpack/`), preferring the new name
    /// over a legacy `.botyard/` when only that exists.
    pub fn botpack_dir(&self) -> PathBuf {
        let new = self.root.join(".botpack");
        let old = self.root.join(".botyard");
        if new.exists() || !old.exists() { new } else { old }
    }

    /// Sync/materializer state directory (`.botpack/state`).
    pub fn state_dir(&self) -> PathBuf {
        self.botpack_dir().join("state")
    }

    /// Materialized package roots (`.botpack/pkgs`).
    pub fn pkgs_dir(&self) -> PathBuf {
        self.botpack_dir().join("pkgs")
    }

    /// Per-source fetch cache (`.botpack/cache/git`).
    pub fn git_cache_dir(&self) -> PathBuf {
        self.botpack_dir().join("cache").join("git")
    }

    /// Project manifest path, preferring `botpack.toml` over the legacy
    /// `botyard.toml` when only that exists.
    pub fn manifest_path(&self) -> PathBuf {
        let new = self.root.join("botpack.toml");
        let old = self.root.join("botyard.toml");
        if new.exists() || !old.exists() { new } else { old }
    }

    /// Lockfile path for reading, preferring `botpack.lock` over the
    /// legacy `botyard.lock` when only that exists.
    pub fn lock_path(&self) -> PathBuf {
        let new = self.root.join("botpack.lock");
        let old = self.root.join("botyard.lock");
        if new.exists() || !old.exists() { new } else { old }
    }

    /// Lockfile path for writing. Always the new spelling; the legacy
    /// name is a read-only alias.
    pub fn lock_write_path(&self) -> PathBuf {
        self.root.join("botpack.lock")
    }

    /// Trust file path (`.botpack/trust.toml`).
    pub fn trust_path(&self) -> PathBuf {
        self.botpack_dir().join("trust.toml")
    }

    /// Catalog output path (`.botpack/catalog.json`).
    pub fn catalog_path(&self) -> PathBuf {
        self.botpack_dir().join("catalog.json")
    }

    /// Sync state file for a target (`.botpack/state/sync-<target>.json`).
    pub fn sync_state_path(&self, target: &str) -> PathBuf {
        self.state_dir().join(format!("sync-{target}.json"))
    }

    /// Conflict records file for a target
    /// (`.botpack/state/conflicts-<target>.json`).
    pub fn conflicts_path(&self, target: &str) -> PathBuf {
        self.state_dir().join(format!("conflicts-{target}.json"))
    }

    /// Package-materializer ownership map (`.botpack/state/pkgs.json`).
    pub fn pkgs_state_path(&self) -> PathBuf {
        self.state_dir().join("pkgs.json")
    }
}

fn env_root_override() -> Option<PathBuf> {
    if let Ok(v) = env::var(ENV_ROOT) {
        if !v.is_empty() {
            return Some(PathBuf::from(v));
        }
    }
    for key in ENV_ROOT_LEGACY {
        if let Ok(v) = env::var(key) {
            if !v.is_empty() {
                return Some(PathBuf::from(v));
            }
        }
    }
    None
}

fn env_store_override() -> Option<PathBuf> {
    let raw = env::var(ENV_STORE).ok().filter(|v| !v.is_empty()).or_else(|| {
        env::var(ENV_STORE_LEGACY).ok().filter(|v| !v.is_empty())
    })?;
    Some(PathBuf::from(shellexpand::tilde(&raw).into_owned()))
}

/// Default store location: `<home>/.botpack/store/v1`, with a read-through
/// to the legacy `<home>/.botyard/store/v1` when only that exists.
pub fn default_store_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let new = home.join(".botpack").join("store").join("v1");
    let old = home.join(".botyard").join("store").join("v1");
    if new.exists() || !old.exists() { new } else { old }
}
