//! Slidecast-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across slidecast:
//!
//! - **Typed IDs**: Type-safe UUID wrapper for job identifiers
//! - **Core Types**: Enums for input kinds, style presets, and avatar options,
//!   plus the slide/script/audio-clip records exchanged between pipeline stages
//! - **Path Utilities**: Functions to detect input kinds by extension
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use slidecast_common::{JobId, InputKind, Error, Result};
//! use slidecast_common::paths::detect_input_kind;
//! use std::path::Path;
//!
//! // Create typed IDs
//! let job_id = JobId::new();
//!
//! // Detect what was uploaded
//! assert_eq!(detect_input_kind(Path::new("paper.pdf")), Some(InputKind::Document));
//!
//! // Use common error types
//! fn example() -> Result<()> {
//!     Err(Error::not_found("job"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
