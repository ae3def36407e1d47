//! Error types for the physics core
//!
//! Lookups of unknown nodes or pairs are not errors: they resolve to `None`
//! or a default. Errors are reserved for parameters that would let
//! non-finite values into the simulation state.

use thiserror::Error;

/// Errors raised when building constraints or configuring the simulation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Spring parameters out of range
    #[error("invalid spring: {0}")]
    InvalidSpring(String),

    /// Tether parameters out of range
    #[error("invalid tether: {0}")]
    InvalidTether(String),

    /// Mass must be positive (infinity pins the node)
    #[error("invalid mass {0}: must be greater than zero")]
    InvalidMass(f64),

    /// Force field parameters out of range
    #[error("invalid force field: {0}")]
    InvalidField(String),

    /// Simulation configuration out of range
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    /// A connection needs two distinct nodes
    #[error("a node cannot be connected to itself")]
    SelfConnection,
}

/// Result type for physics operations
pub type PhysicsResult<T> = Result<T, PhysicsError>;
