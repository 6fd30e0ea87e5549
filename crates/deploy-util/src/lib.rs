//! Shared utilities for deploy.
//!
//! This crate provides common utilities used across the deploy workspace:
//! - ULID-based identifier generation
//! - Logging setup with tracing
//! - Data directory and path resolution helpers

pub mod id;
pub mod log;
pub mod path;

pub use id::Identifier;
