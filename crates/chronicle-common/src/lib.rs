//! Chronicle Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the Chronicle workspace.
//!
//! # Overview
//!
//! - **Error Handling**: `ChronicleError` and the `Result` alias
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Types**: attribute maps, polymorphic subject identifiers and SQL
//!   identifier validation
//!
//! # Example
//!
//! ```no_run
//! use chronicle_common::types::{MorphKeyType, SubjectId};
//!
//! fn parse_article_id(raw: &str) -> chronicle_common::Result<SubjectId> {
//!     SubjectId::parse(raw, MorphKeyType::Integer)
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{ChronicleError, Result};
pub use types::{Attributes, MorphKeyType, SubjectId};
