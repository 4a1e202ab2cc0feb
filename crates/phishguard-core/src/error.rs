//! Error types for phishguard-core

use std::fmt::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Remediation command for resolving an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationCommand {
    /// Short label describing the command purpose
    pub label: String,
    /// Command to run
    pub command: String,
}

/// Actionable remediation guidance for an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    /// One-line summary of how to fix the issue
    pub summary: String,
    /// Suggested commands to resolve or diagnose the issue
    pub commands: Vec<RemediationCommand>,
    /// Additional alternative guidance
    pub alternatives: Vec<String>,
}

impl Remediation {
    /// Create a new remediation with a summary
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            commands: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    /// Add a command
    #[must_use]
    pub fn command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.push(RemediationCommand {
            label: label.into(),
            command: command.into(),
        });
        self
    }

    /// Add an alternative suggestion
    #[must_use]
    pub fn alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Render remediation text for human-readable output
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "To fix:");
        let _ = writeln!(output, "  {}", self.summary);

        if !self.commands.is_empty() {
            let _ = writeln!(output, "  Commands:");
            for cmd in &self.commands {
                let _ = writeln!(output, "    - {}: {}", cmd.label, cmd.command);
            }
        }

        if !self.alternatives.is_empty() {
            let _ = writeln!(output, "  Alternatives:");
            for alt in &self.alternatives {
                let _ = writeln!(output, "    - {alt}");
            }
        }

        output
    }
}

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for phishguard-core
#[derive(Error, Debug)]
pub enum Error {
    /// Relay / analysis service errors
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Runtime errors (channel failures, task join errors)
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Return remediation guidance when available.
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::Relay(err) => Some(err.remediation()),
            Self::Config(err) => Some(err.remediation()),
            Self::Io(_) => Some(
                Remediation::new("Check filesystem permissions and paths, then retry.")
                    .alternative("Verify the config directory exists and is readable."),
            ),
            Self::Json(_) => Some(
                Remediation::new("Validate the JSON input and retry.")
                    .alternative("Check for trailing commas or invalid UTF-8."),
            ),
            Self::Runtime(_) => Some(
                Remediation::new("Restart the overlay and retry.")
                    .command("Watch", "phishguard watch"),
            ),
        }
    }
}

/// Coarse classification of relay failures.
///
/// The overlay never distinguishes these in the rendered indicator; the kind
/// exists for logs and diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayErrorKind {
    /// Network unreachable, timeout, non-2xx
    Transport,
    /// Malformed or missing fields in a response body
    Protocol,
    /// Relay message lost or the privileged side unavailable
    Boundary,
}

impl RelayErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Boundary => "boundary",
        }
    }
}

impl std::fmt::Display for RelayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single relay round-trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("invalid page url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("analysis service unreachable: {0}")]
    Unreachable(String),

    #[error("relay timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("analysis service returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed analysis response: {0}")]
    Malformed(String),

    #[error("analysis response missing field `{0}`")]
    MissingField(&'static str),

    #[error("privileged relay unavailable: {0}")]
    Unavailable(String),

    #[error("relay reply lost before completion")]
    ReplyLost,

    #[error("privileged relay reported {kind} failure: {message}")]
    Remote {
        kind: RelayErrorKind,
        message: String,
    },
}

impl RelayError {
    #[must_use]
    pub const fn kind(&self) -> RelayErrorKind {
        match self {
            Self::Unreachable(_) | Self::Timeout(_) | Self::Status { .. } => {
                RelayErrorKind::Transport
            }
            Self::InvalidUrl { .. } | Self::Malformed(_) | Self::MissingField(_) => {
                RelayErrorKind::Protocol
            }
            Self::Unavailable(_) | Self::ReplyLost => RelayErrorKind::Boundary,
            Self::Remote { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self.kind() {
            RelayErrorKind::Transport => Remediation::new(
                "Start the analysis service and confirm the relay endpoint in phishguard.toml.",
            )
            .command("Manual scan", "phishguard scan https://example.com")
            .alternative("Raise [relay].timeout_ms if the service is slow to answer."),
            RelayErrorKind::Protocol => Remediation::new(
                "The analysis service answered with an unexpected body. Check its version.",
            )
            .command("History", "phishguard history --json"),
            RelayErrorKind::Boundary => {
                Remediation::new("The privileged relay stopped answering. Restart the overlay.")
                    .command("Watch", "phishguard watch")
            }
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file {0}: {1}")]
    ReadFailed(String, String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::FileNotFound(path) => Remediation::new(format!(
                "Config file not found: {path}. Verify the path and retry."
            ))
            .command("Check path", format!("ls -l \"{path}\""))
            .alternative("Pass --config with the correct path."),
            Self::ReadFailed(path, _) => Remediation::new(format!(
                "Failed to read config file: {path}. Check permissions."
            ))
            .command("Check permissions", format!("ls -l \"{path}\""))
            .alternative("Ensure the file is readable by the current user."),
            Self::ParseFailed(_) => Remediation::new("Config parse failed. Fix the TOML syntax.")
                .alternative("Compare against the documented [general]/[watcher]/[relay] tables."),
            Self::ValidationError(_) => {
                Remediation::new("Config values are out of range. Correct them and retry.")
                    .alternative("Remove the offending key to fall back to its default.")
            }
        }
    }
}
