// ABOUTME: Configuration and constants for the EZ interpreter
// This module contains version info, interpreter limits, and the diagnostic
// rendering style.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const WELCOME_MESSAGE: &str = "EZ interpreter";
pub const WELCOME_FOOTER: &str = "Type :help for commands, :quit to exit.";

/// Default cap on active call frames; `--max-recursion` overrides it.
pub const DEFAULT_MAX_RECURSION: usize = 1000;

/// How diagnostics are rendered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DiagnosticFormat {
    /// Four-line block with source line and caret span
    Human,
    /// One JSON object per diagnostic
    Json,
}
