//! Tastytrade REST Adapters
//!
//! HTTP clients for the REST endpoints the streamer depends on:
//!
//! - **token**: Session-token to streaming-credential exchange
//! - **instruments**: Requested-symbol to streamer-symbol lookup

pub mod instruments;
pub mod token;

pub use instruments::InstrumentResolver;
pub use token::{QuoteTokenClient, StreamCredentials, TokenError};
