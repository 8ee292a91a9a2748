//! Relay hub.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Hub`] | Listener, accept loop, session registry, shutdown |
//! | [`HubBuilder`] | Fluent configuration builder |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for hub configuration.
pub mod builder;

/// Core hub implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::HubBuilder;
pub use core::Hub;
