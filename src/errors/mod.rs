//! Centralized error handling for the logo cache
//!
//! Every fallible step of logo retrieval (fetch, body read, image
//! validation) reports through [`LogoError`]. None of these errors cross the
//! service boundary: `LogoCacheService::encoded_logo` catches them, emits a
//! diagnostic log entry, and resolves to `None` so that a missing or broken
//! logo can never block the operation that wanted to embed it.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using LogoError
pub type LogoResult<T> = Result<T, LogoError>;
