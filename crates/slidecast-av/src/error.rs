//! Error types for slidecast-av.
//!
//! The variants encode the composer's failure classification: bad caller
//! input (`MissingInput`/`EmptyInput`: skip the unit, never invoke the
//! tool), tool failure (`ToolFailed`/`ToolTimedOut`: non-zero exit or
//! expired deadline, with captured diagnostics), and missing results
//! (`MissingOutput`/`EmptyOutput`: an exit-0 run that produced nothing is
//! still a failure).

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during media processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool exited with a non-zero status.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// An external tool did not finish within its deadline and was killed.
    #[error("tool timed out after {secs}s: {tool}")]
    ToolTimedOut { tool: String, secs: u64 },

    /// An input artifact the caller promised does not exist.
    #[error("input file not found: {}", path.display())]
    MissingInput { path: PathBuf },

    /// An input artifact exists but is empty.
    #[error("input file is empty: {}", path.display())]
    EmptyInput { path: PathBuf },

    /// The tool reported success but the expected output is missing.
    #[error("expected output was not created: {}", path.display())]
    MissingOutput { path: PathBuf },

    /// The tool reported success but the expected output is empty.
    #[error("expected output is empty: {}", path.display())]
    EmptyOutput { path: PathBuf },

    /// Every slide segment was dropped; there is nothing to concatenate.
    #[error("no slide videos created")]
    NoSegments,

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a bad input artifact (caller error): the unit
    /// should be skipped rather than the invocation retried.
    pub fn is_input_fault(&self) -> bool {
        matches!(self, Self::MissingInput { .. } | Self::EmptyInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_segments_message() {
        assert_eq!(Error::NoSegments.to_string(), "no slide videos created");
    }

    #[test]
    fn test_input_fault_classification() {
        assert!(Error::MissingInput { path: "/a".into() }.is_input_fault());
        assert!(Error::EmptyInput { path: "/a".into() }.is_input_fault());
        assert!(!Error::tool_failed("ffmpeg", "boom").is_input_fault());
        assert!(!Error::MissingOutput { path: "/a".into() }.is_input_fault());
    }
}
