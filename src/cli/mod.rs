//! Command-line interface for Botpack
//!
//! The CLI is a thin shell over the library: every command calls into a
//! structured core operation and maps the outcome onto the exit-code
//! conventions (`0` success, `1` generic failure, `2` validation or
//! sync-with-conflicts, `4` network/offline, `6` trust denial). All
//! user-facing formatting lives here; the core returns values.
//!
//! # Available Commands
//!
//! - `install` - resolve, fetch, trust-check, and lock dependencies
//! - `sync` - project assets into a target front-end
//! - `add` / `remove` - edit manifest dependencies canonically
//! - `status` - network-free health summary with stable issue ids
//! - `explain` - resolve an issue id into an actionable description
//! - `catalog` - regenerate `.botpack/catalog.json`
//!
//! # Usage
//!
//! ```bash
//! botpack install
//! botpack sync --target claude
//! botpack add "@acme/quality-skills@^2"
//! botpack add local --path ../local-pack
//! botpack status
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::catalog::generate_and_write_catalog;
use crate::core::{BotpackError, ErrorContext, exit_codes};
use crate::install::install;
use crate::issues::{collect_status, explain};
use crate::manifest::edit::{parse_add_spec, update_dependencies};
use crate::manifest::{DepSpec, Manifest};
use crate::paths::ProjectDirs;
use crate::sync::{KNOWN_TARGETS, SyncFlags, sync};

/// Botpack - dependency and materialization toolchain for agent assets.
#[derive(Debug, Parser)]
#[command(name = "botpack", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve and fetch dependencies, write botpack.lock
    Install {
        /// Fail instead of fetching anything not already cached
        #[arg(long)]
        offline: bool,
    },
    /// Project assets into a target front-end
    Sync {
        /// Target to sync (claude, amp, droid, letta-code)
        #[arg(long, value_parser = KNOWN_TARGETS)]
        target: String,
        /// Plan and report without writing
        #[arg(long)]
        dry_run: bool,
        /// Remove outputs whose source has gone away
        #[arg(long)]
        clean: bool,
        /// Overwrite drifted outputs instead of conflicting
        #[arg(long)]
        force: bool,
    },
    /// Add a dependency to the manifest
    Add {
        /// `name@versionSpec` for registry packages, bare name with
        /// --path/--git otherwise
        spec: String,
        /// Add as a local path dependency
        #[arg(long, conflicts_with = "git")]
        path: Option<String>,
        /// Add as a git dependency
        #[arg(long)]
        git: Option<String>,
        /// Rev to pin the git dependency at
        #[arg(long, requires = "git")]
        rev: Option<String>,
    },
    /// Remove a dependency from the manifest
    Remove {
        /// Dependency name
        name: String,
    },
    /// Show a network-free health summary
    Status,
    /// Explain an issue id from `botpack status`
    Explain {
        /// Issue id, e.g. `conflict:1a2b3c4d`
        id: String,
    },
    /// Regenerate .botpack/catalog.json
    Catalog,
}

impl Cli {
    /// Execute the parsed command, returning the process exit code.
    pub async fn run(self) -> i32 {
        let dirs = ProjectDirs::from_env();
        match self.command.execute(&dirs).await {
            Ok(code) => code,
            Err(err) => {
                let code = err
                    .downcast_ref::<BotpackError>()
                    .map_or(exit_codes::FAILURE, BotpackError::exit_code);
                match err.downcast::<BotpackError>() {
                    Ok(bp) => ErrorContext::new(bp).display(),
                    Err(other) => eprintln!("{} {other:#}", "error:".red().bold()),
                }
                code
            }
        }
    }
}

impl Command {
    async fn execute(self, dirs: &ProjectDirs) -> anyhow::Result<i32> {
        match self {
            Self::Install { offline } => {
                let outcome = install(dirs, offline).await?;
                println!(
                    "locked {} package(s) -> {}",
                    outcome.lockfile.packages.len(),
                    outcome.lock_path.display()
                );
                let manifest = Manifest::load(&dirs.manifest_path())?;
                if manifest.sync.catalog {
                    generate_and_write_catalog(dirs, &manifest, None)?;
                }
                Ok(exit_codes::SUCCESS)
            }
            Self::Sync { target, dry_run, clean, force } => {
                let result = sync(dirs, &target, SyncFlags { dry_run, clean, force })?;
                for path in &result.created {
                    println!("{} {path}", "created".green());
                }
                for path in &result.updated {
                    println!("{} {path}", "updated".green());
                }
                for path in &result.removed {
                    println!("{} {path}", "removed".yellow());
                }
                for reason in &result.blocked {
                    println!("{} {reason}", "blocked".yellow());
                }
                for record in &result.conflict_records {
                    println!("{} {} ({})", "conflict".red(), record.path, record.reason);
                }
                if result.clean_run() {
                    Ok(exit_codes::SUCCESS)
                } else {
                    Ok(exit_codes::VALIDATION)
                }
            }
            Self::Add { spec, path, git, rev } => {
                let (name, dep) = if let Some(path) = path {
                    (spec, DepSpec::Path { path })
                } else if let Some(git) = git {
                    (spec, DepSpec::Git { git, rev })
                } else {
                    let (name, version) = parse_add_spec(&spec)?;
                    (name, DepSpec::Semver(version))
                };
                update_dependencies(&dirs.manifest_path(), &[(name.clone(), dep)], &[])?;
                println!("added {name}");
                Ok(exit_codes::SUCCESS)
            }
            Self::Remove { name } => {
                update_dependencies(&dirs.manifest_path(), &[], &[name.clone()])?;
                println!("removed {name}");
                Ok(exit_codes::SUCCESS)
            }
            Self::Status => {
                let info = collect_status(dirs);
                print_status(&info);
                if info.has_issues() {
                    Ok(exit_codes::VALIDATION)
                } else {
                    Ok(exit_codes::SUCCESS)
                }
            }
            Self::Explain { id } => {
                let info = collect_status(dirs);
                match explain(&info, &id) {
                    Some(text) => {
                        println!("{text}");
                        Ok(exit_codes::SUCCESS)
                    }
                    None => {
                        eprintln!("no such issue: {id}");
                        Ok(exit_codes::FAILURE)
                    }
                }
            }
            Self::Catalog => {
                let manifest = Manifest::load(&dirs.manifest_path())?;
                let path = generate_and_write_catalog(dirs, &manifest, None)?;
                println!("wrote {}", path.display());
                Ok(exit_codes::SUCCESS)
            }
        }
    }
}

fn print_status(info: &crate::issues::StatusInfo) {
    println!("root: {}", info.root.display());
    println!(
        "manifest: {}",
        if info.manifest_exists { "present".to_string() } else { "absent".red().to_string() }
    );
    if info.lock_exists {
        println!(
            "lock: present ({} package(s), botpack {})",
            info.packages_count,
            info.lock_version.as_deref().unwrap_or("?")
        );
    } else {
        println!("lock: absent");
    }

    for (name, target) in &info.targets {
        if !target.state_exists {
            continue;
        }
        println!("target {name}: {} tracked path(s)", target.paths_count);
        for (path, id) in &target.conflict_ids {
            println!("  {} {id} {path}", "conflict".red());
        }
    }

    for gate in &info.trust_gates {
        let mut needs = Vec::new();
        if gate.needs_exec {
            needs.push("exec");
        }
        if gate.needs_mcp {
            needs.push("mcp");
        }
        println!("{} {} {} needs {}", "trust".red(), gate.issue_id, gate.pkg_key, needs.join("+"));
    }

    for error in &info.errors {
        println!("{} {error}", "error".red());
    }

    if !info.has_issues() {
        println!("{}", "ok".green());
    }
}
