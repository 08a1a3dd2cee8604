//! Asset discovery under a source root
//!
//! A source root (the first-party assets directory or a package tree)
//! holds assets in a conventional layout:
//!
//! ```text
//! <root>/
//!     skills/<dir>/SKILL.md        # + optional scripts/*.py
//!     commands/<name>.md
//!     agents/<name>.md
//!     mcp/servers.toml             # handled by the mcp module
//! ```
//!
//! Scanning returns an [`AssetIndex`] with entries sorted by id so every
//! downstream consumer (sync planning, catalog generation) observes a
//! stable order. Hidden (`.`-prefixed) directories and files are skipped.
//! Unreadable or malformed entries are skipped with a warning rather than
//! failing the whole scan - a package with one broken skill still syncs
//! its good assets.

pub mod pep723;

use gray_matter::Matter;
use gray_matter::engine::YAML;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use pep723::Pep723Metadata;

/// A script shipped inside a skill's `scripts/` directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptAsset {
    /// Absolute path of the script
    pub path: String,
    /// Script runtime (`python` for `.py` files)
    pub runtime: String,
    /// Runner hint; `uv` when the script declares PEP 723 metadata
    pub runner: Option<String>,
    /// Parsed PEP 723 metadata, when present
    pub pep723: Option<Pep723Metadata>,
}

/// A skill: a directory with a `SKILL.md` and optional scripts.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillAsset {
    /// Stable skill id (frontmatter `id`, else the directory name)
    pub id: String,
    /// Display title (frontmatter `name`, else the id)
    pub title: String,
    /// Description from frontmatter, empty when absent
    pub description: String,
    /// Absolute path of the SKILL.md
    pub path: String,
    /// Discovered scripts, sorted by path
    pub scripts: Vec<ScriptAsset>,
}

/// A slash-command markdown file; id is the file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAsset {
    /// Command id
    pub id: String,
    /// Absolute path of the markdown file
    pub path: String,
}

/// An agent prompt markdown file; id is the file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentAsset {
    /// Agent id
    pub id: String,
    /// Absolute path of the markdown file
    pub path: String,
}

/// Everything discovered under one source root, sorted by id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssetIndex {
    /// Skills sorted by id
    pub skills: Vec<SkillAsset>,
    /// Commands sorted by id
    pub commands: Vec<CommandAsset>,
    /// Agents sorted by id
    pub agents: Vec<AgentAsset>,
}

/// SKILL.md frontmatter fields Botpack reads; extra keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
struct SkillFrontmatter {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Scan a source root into an [`AssetIndex`].
pub fn scan_assets(root: &Path) -> AssetIndex {
    let mut index = AssetIndex {
        skills: scan_skills(&root.join("skills")),
        commands: scan_markdown(&root.join("commands"))
            .into_iter()
            .map(|(id, path)| CommandAsset { id, path })
            .collect(),
        agents: scan_markdown(&root.join("agents"))
            .into_iter()
            .map(|(id, path)| AgentAsset { id, path })
            .collect(),
    };
    index.skills.sort_by(|a, b| a.id.cmp(&b.id));
    index.commands.sort_by(|a, b| a.id.cmp(&b.id));
    index.agents.sort_by(|a, b| a.id.cmp(&b.id));
    index
}

fn scan_skills(skills_dir: &Path) -> Vec<SkillAsset> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(skills_dir) else {
        return out;
    };
    let mut dirs: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    dirs.sort();

    for dir in dirs {
        if !dir.is_dir() || is_hidden(&dir) {
            continue;
        }
        let skill_md = dir.join("SKILL.md");
        if !skill_md.is_file() {
            continue;
        }
        let text = match fs::read_to_string(&skill_md) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %skill_md.display(), "skipping unreadable SKILL.md: {e}");
                continue;
            }
        };

        let fm = parse_frontmatter(&text, &skill_md);
        let dir_name = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let id = fm.id.filter(|s| !s.trim().is_empty()).unwrap_or(dir_name);
        let id = id.trim().to_string();
        let title = fm.name.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| id.clone());
        let description = fm.description.unwrap_or_default().trim().to_string();

        out.push(SkillAsset {
            id,
            title: title.trim().to_string(),
            description,
            path: skill_md.display().to_string(),
            scripts: scan_scripts(&dir.join("scripts")),
        });
    }
    out
}

fn parse_frontmatter(text: &str, path: &Path) -> SkillFrontmatter {
    // Extract the frontmatter block with gray_matter, then deserialize
    // the YAML into the typed fields.
    let matter = Matter::<YAML>::new();
    let raw = match matter.parse::<serde_yaml::Value>(text) {
        Ok(parsed) => parsed.data.and_then(|data| serde_yaml::to_string(&data).ok()),
        Err(e) => {
            warn!(path = %path.display(), "unparsable SKILL.md frontmatter: {e}");
            None
        }
    };
    let Some(raw) = raw else {
        return SkillFrontmatter::default();
    };
    serde_yaml::from_str(&raw).unwrap_or_else(|e| {
        warn!(path = %path.display(), "SKILL.md frontmatter does not match schema: {e}");
        SkillFrontmatter::default()
    })
}

fn scan_scripts(scripts_dir: &Path) -> Vec<ScriptAsset> {
    let mut out = Vec::new();
    if !scripts_dir.is_dir() {
        return out;
    }
    let mut paths: Vec<_> = walkdir::WalkDir::new(scripts_dir)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| p.extension().is_some_and(|ext| ext == "py") && !is_hidden(p))
        .collect();
    paths.sort();

    for path in paths {
        let meta = match fs::read_to_string(&path) {
            Ok(source) => match pep723::parse_script_metadata(&source) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %path.display(), "ignoring malformed PEP 723 block: {e}");
                    None
                }
            },
            Err(_) => None,
        };
        out.push(ScriptAsset {
            path: path.display().to_string(),
            runtime: "python".to_string(),
            runner: meta.as_ref().map(|_| "uv".to_string()),
            pep723: meta,
        });
    }
    out
}

/// Enumerate `<dir>/*.md` as `(stem, path)`, skipping hidden files.
fn scan_markdown(dir: &Path) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return out;
    };
    let mut paths: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if !path.is_file() || is_hidden(&path) {
            continue;
        }
        if path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        out.push((stem, path.display().to_string()));
    }
    out
}

fn is_hidden(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.'))
}
