//! Port Interfaces
//!
//! Contracts for external collaborators following the Hexagonal
//! Architecture pattern. The streaming core depends on these traits;
//! the infrastructure layer provides the HTTP-backed implementations.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from an instrument lookup.
///
/// All variants are recoverable per-symbol: callers degrade the failed
/// symbol to its upper-cased literal form rather than propagating.
#[derive(Debug, Clone, Error)]
pub enum ResolverError {
    /// Lookup endpoint returned a non-success status.
    #[error("instrument lookup failed with status {0}")]
    Status(u16),

    /// Response was missing the streamer symbol field.
    #[error("instrument response missing streamer symbol")]
    MissingField,

    /// Transport-level failure reaching the lookup endpoint.
    #[error("instrument lookup transport error: {0}")]
    Transport(String),
}

/// Maps a requested symbol to its streamer-native form.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SymbolResolver: Send + Sync {
    /// Resolve one symbol to its streamer-native identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolverError`] when the lookup fails; callers are
    /// expected to fall back rather than abort.
    async fn resolve(&self, symbol: &str) -> Result<String, ResolverError>;
}
