//! ECP Common Library
//!
//! Shared types, utilities, and error handling for the ECP project.
//!
//! # Overview
//!
//! This crate provides common functionality used across all ECP workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: Centralized tracing configuration
//! - **Types**: Shared domain types (processing periods)
//!
//! # Example
//!
//! ```
//! use ecp_common::types::TargetPeriod;
//!
//! let period = TargetPeriod::new(2024, 7).unwrap();
//! assert_eq!(period.file_name(), "2024-07.csv");
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{EcpError, Result};
