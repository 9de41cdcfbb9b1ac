//! CNAE Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the CNAE pipeline.
//!
//! # Overview
//!
//! - **Error Handling**: `CnaeError` and the `Result` alias
//! - **Logging**: `LogConfig` and `init_logging`, used by every binary
//! - **Checksums**: SHA-256 digests for stored artifacts
//! - **Types**: `CnaeRecord` and the artifact addressing types
//!
//! # Example
//!
//! ```no_run
//! use cnae_common::checksum::sha256_file;
//! use cnae_common::Result;
//!
//! fn describe(path: &str) -> Result<()> {
//!     let digest = sha256_file(path)?;
//!     tracing::info!(%digest, "Cached artifact");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CnaeError, Result};
pub use types::{ArtifactRef, CnaeRecord, Tier};
