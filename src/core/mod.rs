//! Core types and error handling for Botpack
//!
//! This module hosts the shared error type used across the crate plus the
//! exit-code conventions the CLI layer maps structured results onto.

pub mod error;

pub use error::{BotpackError, ErrorContext};

/// Exit code conventions for the interactive caller.
///
/// The core library returns structured results; the CLI maps them to these
/// process exit codes.
pub mod exit_codes {
    /// Success.
    pub const SUCCESS: i32 = 0;
    /// Generic failure.
    pub const FAILURE: i32 = 1;
    /// Config/validation error, or a sync that reported conflicts.
    pub const VALIDATION: i32 = 2;
    /// Network failure or offline cache miss.
    pub const NETWORK: i32 = 4;
    /// Permission/trust denial.
    pub const TRUST: i32 = 6;
}
