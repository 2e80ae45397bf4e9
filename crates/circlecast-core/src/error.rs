//! Unified error type for circlecast.
//!
//! Library code funnels its failures into [`Error`]. Expected conversion
//! failures (timeouts, tool exits, empty output) are *not* errors; they travel
//! as explicit outcome values and only genuinely unexpected faults end up here.

/// Unified error type covering the unexpected failure modes in circlecast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be parsed or is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg) could not be run or reported a failure.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The messaging platform answered a request with `ok: false`.
    #[error("API error [{method}]: {description}")]
    Api {
        /// The Bot API method that was called.
        method: String,
        /// The description returned by the platform.
        description: String,
    },

    /// Transport-level HTTP failure (connect, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Api`].
    pub fn api(method: impl Into<String>, description: impl Into<String>) -> Self {
        Error::Api {
            method: method.into(),
            description: description.into(),
        }
    }

    /// Whether this error was caused by the remote platform rather than by us.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Api { .. } | Error::Http(_))
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_display() {
        let err = Error::Config("conversion.size must be even".into());
        assert_eq!(err.to_string(), "Config error: conversion.size must be even");
        assert!(!err.is_remote());
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "failed to spawn: No such file or directory");
        assert_eq!(
            err.to_string(),
            "Tool error [ffmpeg]: failed to spawn: No such file or directory"
        );
    }

    #[test]
    fn api_display() {
        let err = Error::api("sendVideoNote", "Bad Request: chat not found");
        assert_eq!(
            err.to_string(),
            "API error [sendVideoNote]: Bad Request: chat not found"
        );
        assert!(err.is_remote());
    }

    #[test]
    fn http_is_remote() {
        assert!(Error::Http("connection reset".into()).is_remote());
        assert!(!Error::Internal("boom".into()).is_remote());
    }
}
