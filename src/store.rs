//! Tree digests and the content-addressed store
//!
//! A store entry is an immutable directory living under
//! `<store>/sha256:<hex>/` whose content hashes back to its own name. The
//! digest is computed over the ordered sequence of `(kind, relpath,
//! payload)` records for every regular file and symlink in the tree;
//! directories contribute nothing beyond their contained entries.
//!
//! Publishing is atomic: trees are copied to `<entry>.tmp` and renamed
//! into place, so concurrent writers of the same digest are idempotent
//! (the second writer observes the existing entry).
//!
//! # Example
//!
//! ```rust,no_run
//! use botpack::store::{Store, LinkMode};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let store = Store::new("/home/user/.botpack/store/v1");
//! let stored = store.put_tree(Path::new("./some-package"))?;
//! let used = botpack::store::materialize(&stored, Path::new("out/pkg"), LinkMode::Auto)?;
//! println!("materialized {} via {}", stored.digest, used);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use walkdir::WalkDir;

use crate::utils::fs::tmp_sibling;

/// How a stored tree is projected to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Try symlink, then hardlink, then copy; first success wins.
    Auto,
    /// A single directory symlink pointing at the store entry.
    Symlink,
    /// Hardlink regular files, recreate the directory skeleton.
    Hardlink,
    /// Full recursive copy preserving symlinks.
    Copy,
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Symlink => "symlink",
            Self::Hardlink => "hardlink",
            Self::Copy => "copy",
        };
        f.write_str(s)
    }
}

impl FromStr for LinkMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "symlink" => Ok(Self::Symlink),
            "hardlink" => Ok(Self::Hardlink),
            "copy" => Ok(Self::Copy),
            other => bail!("unsupported link mode: {other}"),
        }
    }
}

/// A published tree: its digest and the store path it lives at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTree {
    /// `sha256:<hex>` digest the entry is keyed by
    pub digest: String,
    /// Absolute path of the entry directory
    pub path: PathBuf,
}

/// Handle on a content-addressed store root.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open a store at `root`. The directory is created lazily on first
    /// publish.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `digest` (whether or not it exists).
    pub fn entry_path(&self, digest: &str) -> PathBuf {
        self.root.join(digest)
    }

    /// Look up an existing entry by digest.
    pub fn get(&self, digest: &str) -> Option<StoredTree> {
        let path = self.entry_path(digest);
        path.is_dir().then(|| StoredTree { digest: digest.to_string(), path })
    }

    /// Publish `src` into the store under its tree digest.
    ///
    /// Idempotent: if an entry with the same digest already exists it is
    /// returned untouched. Racing writers tolerate the rename target
    /// already existing.
    pub fn put_tree(&self, src: &Path) -> Result<StoredTree> {
        if !src.is_dir() {
            bail!("store put_tree: expected directory, got {}", src.display());
        }

        let digest = tree_digest(src)?;
        let dst = self.entry_path(&digest);
        if dst.exists() {
            debug!(digest = %digest, "store hit");
            return Ok(StoredTree { digest, path: dst });
        }

        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create store at {}", self.root.display()))?;

        let tmp = tmp_sibling(&dst);
        remove_any(&tmp)?;
        copy_tree(src, &tmp)?;
        match fs::rename(&tmp, &dst) {
            Ok(()) => {}
            // A concurrent writer published the same digest first.
            Err(_) if dst.exists() => {
                remove_any(&tmp)?;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to publish {}", dst.display()));
            }
        }
        debug!(digest = %digest, "store publish");
        Ok(StoredTree { digest, path: dst })
    }
}

/// Compute the deterministic digest of a directory tree.
///
/// Every regular file contributes `F<relpath>\0<bytes>\0` and every
/// symlink `L<relpath>\0<target>\0`, in lexicographic order of the
/// posix-form relative path. Two trees hash equal iff they have identical
/// relative paths, file contents, and symlink targets.
pub fn tree_digest(root: &Path) -> Result<String> {
    let mut entries: Vec<(String, PathBuf, bool)> = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        let is_symlink = entry.path_is_symlink();
        if !is_symlink && entry.file_type().is_dir() {
            continue;
        }
        if !is_symlink && !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .context("walked entry escaped its root")?;
        entries.push((posix_relpath(rel), entry.path().to_path_buf(), is_symlink));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (rel, path, is_symlink) in entries {
        if is_symlink {
            let target = fs::read_link(&path)
                .with_context(|| format!("failed to read symlink {}", path.display()))?;
            hasher.update(b"L");
            hasher.update(rel.as_bytes());
            hasher.update(b"\0");
            hasher.update(target.to_string_lossy().as_bytes());
            hasher.update(b"\0");
        } else {
            hasher.update(b"F");
            hasher.update(rel.as_bytes());
            hasher.update(b"\0");
            let mut file = fs::File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            io::copy(&mut file, &mut hasher)
                .with_context(|| format!("failed to hash {}", path.display()))?;
            hasher.update(b"\0");
        }
    }
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Materialize a stored tree at `dest`, returning the mode actually used.
///
/// All modes stage into `<dest>.tmp` and rename; any pre-existing `dest`
/// is removed only after the staged tree is fully built. `Auto` tries
/// symlink, hardlink, then copy, falling through on failure (cross-device,
/// permission, and access errors being the usual signals).
pub fn materialize(tree: &StoredTree, dest: &Path, mode: LinkMode) -> Result<LinkMode> {
    let attempts: &[LinkMode] = match mode {
        LinkMode::Auto => &[LinkMode::Symlink, LinkMode::Hardlink, LinkMode::Copy],
        LinkMode::Symlink => &[LinkMode::Symlink],
        LinkMode::Hardlink => &[LinkMode::Hardlink],
        LinkMode::Copy => &[LinkMode::Copy],
    };

    let mut last_err = None;
    for &attempt in attempts {
        match materialize_one(&tree.path, dest, attempt) {
            Ok(()) => {
                debug!(mode = %attempt, dest = %dest.display(), "materialized");
                return Ok(attempt);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.expect("at least one materialize attempt"))
}

fn materialize_one(src: &Path, dest: &Path, mode: LinkMode) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = tmp_sibling(dest);
    remove_any(&tmp)?;

    let built = match mode {
        LinkMode::Symlink => symlink_dir(src, &tmp),
        LinkMode::Copy => copy_tree(src, &tmp),
        LinkMode::Hardlink => hardlink_tree(src, &tmp),
        LinkMode::Auto => unreachable!("auto is expanded by the caller"),
    };
    if let Err(e) = built {
        remove_any(&tmp).ok();
        return Err(e);
    }

    remove_any(dest)?;
    fs::rename(&tmp, dest)
        .with_context(|| format!("failed to move staged tree into {}", dest.display()))?;
    Ok(())
}

#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, dst)
        .with_context(|| format!("failed to symlink {} -> {}", dst.display(), src.display()))
}

#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
        .with_context(|| format!("failed to symlink {} -> {}", dst.display(), src.display()))
}

/// Recursive copy preserving symlinks as symlinks.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).context("walked entry escaped its root")?;
        let out = dst.join(rel);
        if entry.path_is_symlink() {
            let target = fs::read_link(entry.path())?;
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            copy_symlink(&target, &out)?;
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&out)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &out)
                .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Hardlink files, recreate directories, preserve symlinks.
fn hardlink_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).context("walked entry escaped its root")?;
        let out = dst.join(rel);
        if entry.path_is_symlink() {
            let target = fs::read_link(entry.path())?;
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            copy_symlink(&target, &out)?;
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&out)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::hard_link(entry.path(), &out)
                .with_context(|| format!("failed to hardlink {}", entry.path().display()))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)
        .with_context(|| format!("failed to recreate symlink {}", link.display()))
}

#[cfg(windows)]
fn copy_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(target, link)
        .with_context(|| format!("failed to recreate symlink {}", link.display()))
}

/// Remove a path of any kind (file, symlink, or directory).
pub fn remove_any(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Err(_) => Ok(()),
        Ok(meta) => {
            if meta.is_dir() {
                fs::remove_dir_all(path)
                    .with_context(|| format!("failed to remove {}", path.display()))
            } else {
                fs::remove_file(path)
                    .with_context(|| format!("failed to remove {}", path.display()))
            }
        }
    }
}

/// Forward-slash relative path string used for digest framing and sorting.
fn posix_relpath(rel: &Path) -> String {
    let parts: Vec<String> =
        rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    #[test]
    fn digest_is_stable_and_content_sensitive() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "skills/hello/SKILL.md", "# hi\n");
        write(a.path(), "commands/go.md", "go\n");
        write(b.path(), "skills/hello/SKILL.md", "# hi\n");
        write(b.path(), "commands/go.md", "go\n");

        let da = tree_digest(a.path()).unwrap();
        let db = tree_digest(b.path()).unwrap();
        assert!(da.starts_with("sha256:"));
        assert_eq!(da, db);

        write(b.path(), "commands/go.md", "stop\n");
        assert_ne!(da, tree_digest(b.path()).unwrap());
    }

    #[test]
    fn digest_sees_paths_not_just_bytes() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "x.md", "same\n");
        write(b.path(), "y.md", "same\n");
        assert_ne!(tree_digest(a.path()).unwrap(), tree_digest(b.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn digest_hashes_symlink_targets() {
        let a = TempDir::new().unwrap();
        write(a.path(), "file.txt", "data\n");
        std::os::unix::fs::symlink("file.txt", a.path().join("link")).unwrap();
        let d1 = tree_digest(a.path()).unwrap();

        let b = TempDir::new().unwrap();
        write(b.path(), "file.txt", "data\n");
        std::os::unix::fs::symlink("other.txt", b.path().join("link")).unwrap();
        assert_ne!(d1, tree_digest(b.path()).unwrap());
    }

    #[test]
    fn put_tree_is_idempotent() {
        let src = TempDir::new().unwrap();
        let store_root = TempDir::new().unwrap();
        write(src.path(), "a/b.txt", "hello\n");

        let store = Store::new(store_root.path());
        let first = store.put_tree(src.path()).unwrap();
        let second = store.put_tree(src.path()).unwrap();
        assert_eq!(first.digest, second.digest);
        assert_eq!(first.path, second.path);
        assert!(first.path.join("a/b.txt").is_file());

        // Exactly one published entry, no leftover staging dirs.
        let entries: Vec<_> = fs::read_dir(store_root.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn materialize_copy_round_trips() {
        let src = TempDir::new().unwrap();
        let store_root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "skills/s/SKILL.md", "body\n");

        let store = Store::new(store_root.path());
        let stored = store.put_tree(src.path()).unwrap();
        let dest = out.path().join("pkg");
        let used = materialize(&stored, &dest, LinkMode::Copy).unwrap();
        assert_eq!(used, LinkMode::Copy);
        assert_eq!(fs::read_to_string(dest.join("skills/s/SKILL.md")).unwrap(), "body\n");
        assert_eq!(tree_digest(&dest).unwrap(), stored.digest);
    }

    #[cfg(unix)]
    #[test]
    fn materialize_auto_prefers_symlink() {
        let src = TempDir::new().unwrap();
        let store_root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "f.txt", "x\n");

        let store = Store::new(store_root.path());
        let stored = store.put_tree(src.path()).unwrap();
        let dest = out.path().join("pkg");
        let used = materialize(&stored, &dest, LinkMode::Auto).unwrap();
        assert_eq!(used, LinkMode::Symlink);
        assert_eq!(fs::read_link(&dest).unwrap(), stored.path);
    }

    #[test]
    fn materialize_replaces_existing_dest() {
        let src = TempDir::new().unwrap();
        let store_root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write(src.path(), "f.txt", "new\n");

        let store = Store::new(store_root.path());
        let stored = store.put_tree(src.path()).unwrap();
        let dest = out.path().join("pkg");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), "old").unwrap();

        materialize(&stored, &dest, LinkMode::Copy).unwrap();
        assert!(!dest.join("stale.txt").exists());
        assert!(dest.join("f.txt").is_file());
    }

    #[test]
    fn link_mode_parses_and_displays() {
        assert_eq!("auto".parse::<LinkMode>().unwrap(), LinkMode::Auto);
        assert_eq!(LinkMode::Hardlink.to_string(), "hardlink");
        assert!("frobnicate".parse::<LinkMode>().is_err());
    }
}
