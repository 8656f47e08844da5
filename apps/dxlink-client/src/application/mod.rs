//! Application Layer - Port definitions.
//!
//! This layer defines the interfaces through which the streaming core
//! talks to external collaborators (instrument lookup).

/// Port interfaces for external systems.
pub mod ports;
