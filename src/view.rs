//! The caller-owned side of the simulation
//!
//! The engine never owns where nodes are drawn. It reads positions (and
//! whether the user is holding a node) through [`NodeView`], and writes the
//! simulated positions back through the same trait.

use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Access to the visual position of each node
pub trait NodeView<N> {
    /// Current visual position, or `None` if the view does not know the node
    fn position(&self, node: &N) -> Option<DVec2>;

    /// Move the node to a new visual position
    fn set_position(&mut self, node: &N, position: DVec2);

    /// Whether the user is currently holding (dragging) the node
    fn is_held(&self, _node: &N) -> bool {
        false
    }
}

/// Position and hold state of one node on a [`Canvas`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Placement {
    pub position: DVec2,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub held: bool,
}

/// In-memory [`NodeView`] for headless use
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas<N> {
    placements: BTreeMap<N, Placement>,
}

impl<N: Ord> Default for Canvas<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Ord> Canvas<N> {
    pub fn new() -> Self {
        Self {
            placements: BTreeMap::new(),
        }
    }

    /// Put a node at a position (released)
    pub fn place(&mut self, node: N, position: DVec2) {
        self.placements.insert(
            node,
            Placement {
                position,
                held: false,
            },
        );
    }

    /// Mark a node as held by the user; returns `false` for unknown nodes
    pub fn hold(&mut self, node: &N) -> bool {
        self.set_held(node, true)
    }

    pub fn release(&mut self, node: &N) -> bool {
        self.set_held(node, false)
    }

    /// Move a node as if dragged, leaving its hold state alone
    pub fn drag_to(&mut self, node: &N, position: DVec2) -> bool {
        match self.placements.get_mut(node) {
            Some(placement) => {
                placement.position = position;
                true
            }
            None => false,
        }
    }

    pub fn placement(&self, node: &N) -> Option<&Placement> {
        self.placements.get(node)
    }

    pub fn remove(&mut self, node: &N) -> Option<Placement> {
        self.placements.remove(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&N, &Placement)> {
        self.placements.iter()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    fn set_held(&mut self, node: &N, held: bool) -> bool {
        match self.placements.get_mut(node) {
            Some(placement) => {
                placement.held = held;
                true
            }
            None => false,
        }
    }
}

impl<N: Ord + Clone> NodeView<N> for Canvas<N> {
    fn position(&self, node: &N) -> Option<DVec2> {
        self.placements.get(node).map(|p| p.position)
    }

    fn set_position(&mut self, node: &N, position: DVec2) {
        self.placements
            .entry(node.clone())
            .or_default()
            .position = position;
    }

    fn is_held(&self, node: &N) -> bool {
        self.placements.get(node).is_some_and(|p| p.held)
    }
}
