//! Crate-wide error types. I/O boundaries (sockets, files) keep using
//! `io::Result` throughout; this module covers the places that need a
//! structured reason instead of an `io::ErrorKind` repurposed for the
//! occasion: config validation and CGI execution.

use std::fmt;

/// An error raised while validating or parsing the configuration file.
///
/// `Display` renders exactly the `Error: Config: <reason>[: <offending line>]`
/// diagnostic the config grammar requires, so callers can print it directly.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A single directive line failed a value check, was malformed, or was
    /// seen twice in the same block.
    #[error("Error: Config: {reason}: {line}")]
    Directive { reason: String, line: String },

    /// A block-level or file-level rule was violated (bad nesting, missing
    /// mandatory directive, unexpected EOF).
    #[error("Error: Config: {reason}")]
    Structural { reason: String },

    #[error("Error: Config: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl ConfigError {
    pub fn directive(reason: impl Into<String>, line: impl Into<String>) -> Self {
        ConfigError::Directive {
            reason: reason.into(),
            line: line.into(),
        }
    }

    pub fn structural(reason: impl Into<String>) -> Self {
        ConfigError::Structural {
            reason: reason.into(),
        }
    }
}

/// Why a CGI invocation failed to produce a usable response.
///
/// `spec.md` §4.8/§7 splits CGI failure into a 500 (spawn failure, non-zero
/// exit, unparsable output) and a 504 (timeout) response; this enum carries
/// that distinction through to the handler.
#[derive(Debug, thiserror::Error)]
pub enum CgiError {
    #[error("CGI script did not produce output within the time budget")]
    Timeout,
    #[error("failed to spawn CGI process: {0}")]
    SpawnFailed(String),
    #[error("CGI script exited with status {0}")]
    NonZeroExit(i32),
    #[error("CGI output could not be parsed: {0}")]
    BadOutput(String),
    #[error("I/O error talking to CGI child: {0}")]
    Io(#[from] std::io::Error),
}

impl CgiError {
    /// The HTTP status this failure should be reported to the client as.
    pub fn status_code(&self) -> u16 {
        match self {
            CgiError::Timeout => 504,
            _ => 500,
        }
    }
}

/// Top-level startup failure `main` reports before exiting 1
/// (`spec.md` §4.1/§4.3: "fatal error on any step aborts startup").
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Error: {0}")]
    Io(#[from] std::io::Error),
}

/// A reason a connection was dropped, for the one-line log message
/// `spec.md` §7 requires ("log one-line reason, close, release resources").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    PeerClosed,
    RecvError,
    SendError,
    Malformed,
    ReceiveTimeout,
    SendTimeout,
    ResponseComplete,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::PeerClosed => "CLIENT_DISCONNECT",
            DropReason::RecvError => "CLIENT_SEND_ERROR",
            DropReason::SendError => "CLIENT_SEND_ERROR",
            DropReason::Malformed => "MALFORMED_REQUEST",
            DropReason::ReceiveTimeout => "CLIENT_TIMEOUT",
            DropReason::SendTimeout => "CLIENT_TIMEOUT",
            DropReason::ResponseComplete => "CONNECTION_CLOSE",
        };
        write!(f, "{s}")
    }
}
