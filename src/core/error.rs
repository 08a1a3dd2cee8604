//! Error handling for Botpack
//!
//! The error system is designed around two core principles:
//! 1. **Strongly-typed errors** for precise handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! Errors fall into the taxonomy the rest of the crate reports against:
//! config parse, config validation, lockfile, fetch, trust denial, and MCP
//! aggregation. Trust denials and sync conflicts that are *expected*
//! outcomes of an operation are returned inside result objects rather than
//! as errors; only operations that cannot proceed surface a
//! [`BotpackError`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use botpack::core::{BotpackError, ErrorContext};
//!
//! fn load_something() -> Result<(), BotpackError> {
//!     Err(BotpackError::ManifestNotFound)
//! }
//!
//! if let Err(e) = load_something() {
//!     let ctx = ErrorContext::new(e)
//!         .with_suggestion("Run 'botpack init' to create botpack.toml");
//!     ctx.display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::core::exit_codes;

/// The main error type for Botpack operations.
///
/// Each variant represents a specific failure mode and carries the context
/// needed to build an actionable message (file paths, dotted config paths,
/// package keys).
#[derive(Error, Debug)]
pub enum BotpackError {
    /// A TOML or JSON file could not be parsed at all.
    ///
    /// `line`/`col` are carried when the underlying parser supplies them.
    #[error("invalid TOML in {file}: {message}")]
    ConfigParse {
        /// Path of the file that failed to parse
        file: String,
        /// Parser message
        message: String,
        /// 1-based line of the parse failure, when known
        line: Option<usize>,
        /// 1-based column of the parse failure, when known
        col: Option<usize>,
    },

    /// A parsed config file does not match the closed schema.
    ///
    /// `message` includes the dotted path to the offending key(s), e.g.
    /// `dependencies.foo: unknown keys: frobnicate`.
    #[error("invalid config in {file}: {message}")]
    ConfigValidation {
        /// Path of the offending file
        file: String,
        /// Validation message including the dotted key path
        message: String,
    },

    /// Manifest file (botpack.toml) not found.
    #[error("manifest file botpack.toml not found")]
    ManifestNotFound,

    /// The lockfile is malformed or does not match the expected schema.
    #[error("invalid lockfile: {reason}")]
    Lockfile {
        /// Why the lockfile was rejected
        reason: String,
    },

    /// Git executable not found in PATH.
    #[error("git is not installed or not found in PATH")]
    GitNotFound,

    /// A git command returned a non-zero exit status.
    #[error("git {operation} failed: {stderr}")]
    GitCommand {
        /// The git operation that failed (e.g. "clone", "checkout")
        operation: String,
        /// Captured stderr from the git process
        stderr: String,
    },

    /// Offline mode was requested and the dependency is not cached.
    #[error("offline: git dependency not cached: {url}@{rev}")]
    OfflineCacheMiss {
        /// Repository URL of the uncached dependency
        url: String,
        /// Requested rev (or "HEAD")
        rev: String,
    },

    /// A path dependency does not point at an existing directory.
    #[error("path dependency not found: {path}")]
    PathDependencyNotFound {
        /// The resolved path that was expected to exist
        path: String,
    },

    /// The registry index could not be fetched or is malformed.
    #[error("registry: {reason}")]
    Registry {
        /// What went wrong, including the index URL where relevant
        reason: String,
    },

    /// No registry version satisfies the requested spec.
    #[error("registry: no version for '{name}' satisfies '{spec}'")]
    NoMatchingVersion {
        /// Package name
        name: String,
        /// The version spec that could not be satisfied
        spec: String,
    },

    /// A version or version spec could not be parsed.
    #[error("invalid version spec: {spec}")]
    InvalidVersionSpec {
        /// The offending spec string
        spec: String,
    },

    /// A package (or server) needs exec/mcp capabilities it is not trusted
    /// for, or its digest pin does not match.
    #[error("trust denied: {reason}")]
    TrustDenied {
        /// Denial reason including the package key
        reason: String,
    },

    /// Two aggregated MCP servers collided on the same fully-qualified id.
    #[error("duplicate mcp server fqid: {fqid}")]
    DuplicateMcpServer {
        /// The colliding fqid
        fqid: String,
    },

    /// An unsupported sync target was requested.
    #[error("unsupported target: {target}")]
    UnsupportedTarget {
        /// The unknown target name
        target: String,
    },

    /// Dependency kinds not implemented in this version.
    #[error("{what} dependencies are not supported in this version")]
    UnsupportedDependency {
        /// Human description of the dependency kind
        what: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that do not fit the taxonomy.
    #[error("{message}")]
    Other {
        /// Description of the failure
        message: String,
    },
}

impl BotpackError {
    /// Map this error onto the process exit-code conventions.
    ///
    /// `2` config/validation, `4` network/offline, `6` trust denial,
    /// `1` everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigParse { .. }
            | Self::ConfigValidation { .. }
            | Self::ManifestNotFound
            | Self::Lockfile { .. }
            | Self::InvalidVersionSpec { .. }
            | Self::UnsupportedTarget { .. } => exit_codes::VALIDATION,
            Self::OfflineCacheMiss { .. }
            | Self::Registry { .. }
            | Self::NoMatchingVersion { .. } => exit_codes::NETWORK,
            Self::TrustDenied { .. } => exit_codes::TRUST,
            _ => exit_codes::FAILURE,
        }
    }

    /// Build a validation error for unknown keys at a dotted config path.
    ///
    /// Keys are reported sorted so messages are deterministic.
    pub fn unknown_keys(file: &str, at: &str, mut unknown: Vec<String>) -> Self {
        unknown.sort();
        let keys = unknown.join(", ");
        let message = if at.is_empty() {
            format!("unknown keys: {keys}")
        } else {
            format!("{at}: unknown keys: {keys}")
        };
        Self::ConfigValidation { file: file.to_string(), message }
    }
}

/// Wrapper that pairs a [`BotpackError`] with user-facing guidance.
///
/// The CLI builds one of these before printing so the error, optional
/// details, and an actionable suggestion render consistently.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: BotpackError,
    /// One-line suggested fix
    pub suggestion: Option<String>,
    /// Extra detail lines
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error with no additional context yet.
    pub fn new(error: BotpackError) -> Self {
        Self { error, suggestion: None, details: None }
    }

    /// Attach a one-line suggestion shown after the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach extra detail lines shown between error and suggestion.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with color when attached to a terminal.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);
        if let Some(details) = &self.details {
            eprintln!("  {details}");
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("  {} {}", "hint:".cyan(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\n  {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  hint: {suggestion}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_taxonomy() {
        let validation = BotpackError::ConfigValidation {
            file: "botpack.toml".into(),
            message: "unknown keys: nope".into(),
        };
        assert_eq!(validation.exit_code(), exit_codes::VALIDATION);

        let offline = BotpackError::OfflineCacheMiss {
            url: "https://example.test/repo.git".into(),
            rev: "HEAD".into(),
        };
        assert_eq!(offline.exit_code(), exit_codes::NETWORK);

        let trust = BotpackError::TrustDenied { reason: "@acme/exec@1.0.0: exec not trusted".into() };
        assert_eq!(trust.exit_code(), exit_codes::TRUST);

        let other = BotpackError::Other { message: "boom".into() };
        assert_eq!(other.exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn unknown_keys_sorted_and_dotted() {
        let err = BotpackError::unknown_keys(
            "botpack.toml",
            "sync",
            vec!["zeta".into(), "alpha".into()],
        );
        assert_eq!(
            err.to_string(),
            "invalid config in botpack.toml: sync: unknown keys: alpha, zeta"
        );
    }

    #[test]
    fn context_display_includes_suggestion() {
        let ctx = ErrorContext::new(BotpackError::ManifestNotFound)
            .with_suggestion("run botpack init");
        let s = format!("{ctx}");
        assert!(s.contains("botpack.toml not found"));
        assert!(s.contains("hint: run botpack init"));
    }
}
