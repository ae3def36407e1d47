//! physlayout - A mass-spring layout engine for 2D node graphs.
//!
//! Nodes are connected by springs, optionally tethered to fixed points and
//! pushed around by force fields. A fixed-step simulation moves them, syncing
//! with a caller-owned view so user drags override the physics.

pub mod arrange;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod graph;
pub mod scene;
pub mod spring;
pub mod view;

pub use config::SimulationConfig;
pub use engine::{Body, Simulation, SimulationState};
pub use error::{PhysicsError, PhysicsResult};
pub use field::ForceField;
pub use graph::{ConnectionGraph, GraphStats, NodeEvent, UnorderedPair};
pub use scene::{PositionReport, Scene, SceneError, SceneResult, SceneSetup};
pub use spring::{Spring, Tether};
pub use view::{Canvas, NodeView, Placement};
