//! The connection graph
//!
//! Holds everything the simulation needs to know about the caller's nodes:
//! which nodes exist, the springs between pairs of them, per-node tethers and
//! masses, and the global force fields.
//!
//! Springs are stored once per unordered pair, oriented from the smaller to
//! the larger node. Lookups from the other side get the springs reversed, so
//! both orientations always agree.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::mpsc;

use tracing::debug;

use crate::error::{PhysicsError, PhysicsResult};
use crate::field::ForceField;
use crate::spring::{Spring, Tether};

/// Mass of a node nobody has set a mass for
pub const DEFAULT_MASS: f64 = 1.0;

/// Change to the node set, delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent<N> {
    Added(N),
    Removed(N),
}

/// Two distinct nodes, stored smallest first
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnorderedPair<N> {
    first: N,
    second: N,
}

impl<N: Ord> UnorderedPair<N> {
    /// Returns `None` if both nodes are the same
    pub fn new(a: N, b: N) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self {
                first: a,
                second: b,
            }),
            std::cmp::Ordering::Greater => Some(Self {
                first: b,
                second: a,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> &N {
        &self.first
    }

    pub fn second(&self) -> &N {
        &self.second
    }

    pub fn contains(&self, node: &N) -> bool {
        &self.first == node || &self.second == node
    }

    /// The other end of the pair, if `node` is one of its ends
    pub fn other(&self, node: &N) -> Option<&N> {
        if &self.first == node {
            Some(&self.second)
        } else if &self.second == node {
            Some(&self.first)
        } else {
            None
        }
    }
}

/// How a node entered the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    /// Added directly; stays until removed
    Explicit,
    /// Created by a connection; goes away with its last connection
    Implicit,
}

/// Counts describing a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: usize,
    pub pinned: usize,
    pub connections: usize,
    pub springs: usize,
    pub tethers: usize,
    pub fields: usize,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes: {} ({} pinned), connections: {} ({} springs), tethers: {}, fields: {}",
            self.nodes, self.pinned, self.connections, self.springs, self.tethers, self.fields
        )
    }
}

/// Nodes and the elastic constraints between them
#[derive(Debug)]
pub struct ConnectionGraph<N> {
    nodes: BTreeMap<N, Membership>,
    connections: BTreeMap<UnorderedPair<N>, Vec<Spring>>,
    neighbors: BTreeMap<N, BTreeSet<N>>,
    tethers: BTreeMap<N, Tether>,
    masses: BTreeMap<N, f64>,
    fields: Vec<ForceField>,
    listeners: Vec<mpsc::Sender<NodeEvent<N>>>,
}

impl<N: Ord + Clone + fmt::Debug> Default for ConnectionGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Ord + Clone + fmt::Debug> ConnectionGraph<N> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            connections: BTreeMap::new(),
            neighbors: BTreeMap::new(),
            tethers: BTreeMap::new(),
            masses: BTreeMap::new(),
            fields: Vec::new(),
            listeners: Vec::new(),
        }
    }

    // ========== Nodes ==========

    /// Add a node. Explicitly added nodes survive losing all their connections.
    pub fn add_node(&mut self, node: N) {
        match self.nodes.get_mut(&node) {
            Some(membership) => *membership = Membership::Explicit,
            None => {
                debug!(?node, "node added");
                self.nodes.insert(node.clone(), Membership::Explicit);
                self.notify(NodeEvent::Added(node));
            }
        }
    }

    /// Remove a node with all its connections, its tether and its mass.
    ///
    /// Neighbours that only existed because of a connection to this node are
    /// removed as well. Returns `false` if the node was not in the graph.
    pub fn remove_node(&mut self, node: &N) -> bool {
        if self.nodes.remove(node).is_none() {
            return false;
        }
        debug!(?node, "node removed");
        self.tethers.remove(node);
        self.masses.remove(node);

        let neighbors = self.neighbors.remove(node).unwrap_or_default();
        for other in &neighbors {
            if let Some(pair) = UnorderedPair::new(node.clone(), other.clone()) {
                self.connections.remove(&pair);
            }
            if let Some(set) = self.neighbors.get_mut(other) {
                set.remove(node);
            }
        }
        self.notify(NodeEvent::Removed(node.clone()));

        for other in &neighbors {
            self.prune(other);
        }
        true
    }

    pub fn contains(&self, node: &N) -> bool {
        self.nodes.contains_key(node)
    }

    /// All nodes, in order
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.keys()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes sharing at least one spring with `node`
    pub fn neighbors(&self, node: &N) -> Option<&BTreeSet<N>> {
        self.neighbors.get(node).filter(|set| !set.is_empty())
    }

    // ========== Mass ==========

    /// Set the mass of a node, adding the node if needed.
    ///
    /// An infinite mass pins the node in place.
    pub fn set_mass(&mut self, node: N, mass: f64) -> PhysicsResult<()> {
        if mass.is_nan() || mass <= 0.0 {
            return Err(PhysicsError::InvalidMass(mass));
        }
        self.add_node(node.clone());
        debug!(?node, mass, "mass set");
        self.masses.insert(node, mass);
        Ok(())
    }

    /// Mass of a node, 1.0 unless set
    pub fn mass(&self, node: &N) -> f64 {
        self.masses.get(node).copied().unwrap_or(DEFAULT_MASS)
    }

    pub fn is_pinned(&self, node: &N) -> bool {
        self.mass(node).is_infinite()
    }

    /// Reset every node to the default mass
    pub fn clear_all_masses(&mut self) {
        self.masses.clear();
    }

    // ========== Connections ==========

    /// Connect two nodes with one or more springs.
    ///
    /// The springs are oriented from `a` to `b`. Missing nodes are created,
    /// and springs already present for the pair are not duplicated. With no
    /// springs the call only adds both nodes, as if by [`Self::add_node`].
    pub fn add_connection(
        &mut self,
        a: N,
        b: N,
        springs: impl IntoIterator<Item = Spring>,
    ) -> PhysicsResult<()> {
        let reversed = a > b;
        let pair = UnorderedPair::new(a.clone(), b.clone()).ok_or(PhysicsError::SelfConnection)?;

        let mut incoming = springs.into_iter().peekable();
        if incoming.peek().is_none() {
            self.add_node(a);
            self.add_node(b);
            return Ok(());
        }
        self.add_implicit(a.clone());
        self.add_implicit(b.clone());

        let mut added = 0;
        let set = self.connections.entry(pair).or_default();
        for spring in incoming {
            let spring = if reversed { spring.reverse() } else { spring };
            if !set.contains(&spring) {
                set.push(spring);
                added += 1;
            }
        }

        self.neighbors
            .entry(a.clone())
            .or_default()
            .insert(b.clone());
        self.neighbors
            .entry(b.clone())
            .or_default()
            .insert(a.clone());
        debug!(?a, ?b, added, "connection added");
        Ok(())
    }

    /// Remove one spring between two nodes.
    ///
    /// Once the last spring of a pair is gone the pair is dropped, and nodes
    /// that were only created by connections disappear with their last one.
    /// Returns `false` if the spring was not present.
    pub fn remove_connection(&mut self, a: &N, b: &N, spring: &Spring) -> bool {
        let Some(pair) = UnorderedPair::new(a.clone(), b.clone()) else {
            return false;
        };
        let oriented = if a > b { spring.reverse() } else { *spring };

        let Some(set) = self.connections.get_mut(&pair) else {
            return false;
        };
        let Some(index) = set.iter().position(|s| *s == oriented) else {
            return false;
        };
        set.remove(index);
        debug!(?a, ?b, "spring removed");

        if set.is_empty() {
            self.drop_pair(&pair);
        }
        true
    }

    /// Remove every spring between two nodes
    pub fn clear_connections(&mut self, a: &N, b: &N) -> bool {
        match UnorderedPair::new(a.clone(), b.clone()) {
            Some(pair) if self.connections.contains_key(&pair) => {
                self.drop_pair(&pair);
                true
            }
            _ => false,
        }
    }

    /// Remove every spring in the graph.
    ///
    /// Nodes stay, and from now on behave as explicitly added: a node is
    /// only ever implicit while it has a connection.
    pub fn clear_all_connections(&mut self) {
        debug!(pairs = self.connections.len(), "all connections cleared");
        self.connections.clear();
        self.neighbors.clear();
        for membership in self.nodes.values_mut() {
            *membership = Membership::Explicit;
        }
    }

    /// Springs between `a` and `b`, oriented from `a` to `b`
    pub fn connections_between(&self, a: &N, b: &N) -> Option<Vec<Spring>> {
        let pair = UnorderedPair::new(a.clone(), b.clone())?;
        let set = self.connections.get(&pair)?;
        Some(if a > b {
            set.iter().map(Spring::reverse).collect()
        } else {
            set.clone()
        })
    }

    /// Every connected pair with its springs, oriented from `first` to `second`
    pub fn connections(&self) -> impl Iterator<Item = (&UnorderedPair<N>, &[Spring])> {
        self.connections
            .iter()
            .map(|(pair, springs)| (pair, springs.as_slice()))
    }

    /// Number of connected pairs
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ========== Tethers ==========

    /// Tether a node to a fixed point, replacing any previous tether
    pub fn add_tether(&mut self, node: N, tether: Tether) {
        self.add_node(node.clone());
        debug!(?node, target = ?tether.target(), "tether added");
        self.tethers.insert(node, tether);
    }

    pub fn tether(&self, node: &N) -> Option<&Tether> {
        self.tethers.get(node)
    }

    pub fn remove_tether(&mut self, node: &N) -> Option<Tether> {
        self.tethers.remove(node)
    }

    pub fn tethers(&self) -> impl Iterator<Item = (&N, &Tether)> {
        self.tethers.iter()
    }

    pub fn clear_all_tethers(&mut self) {
        self.tethers.clear();
    }

    // ========== Fields ==========

    /// Add a force field; an identical field is only kept once
    pub fn add_field(&mut self, field: ForceField) {
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    pub fn add_fields(&mut self, fields: impl IntoIterator<Item = ForceField>) {
        for field in fields {
            self.add_field(field);
        }
    }

    pub fn remove_field(&mut self, field: &ForceField) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| f != field);
        self.fields.len() != before
    }

    pub fn fields(&self) -> &[ForceField] {
        &self.fields
    }

    // ========== Notifications ==========

    /// Receive an event for every node added to or removed from the graph
    pub fn subscribe(&mut self) -> mpsc::Receiver<NodeEvent<N>> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.nodes.len(),
            pinned: self.nodes.keys().filter(|n| self.is_pinned(n)).count(),
            connections: self.connections.len(),
            springs: self.connections.values().map(Vec::len).sum(),
            tethers: self.tethers.len(),
            fields: self.fields.len(),
        }
    }

    fn add_implicit(&mut self, node: N) {
        if !self.nodes.contains_key(&node) {
            debug!(?node, "node added by connection");
            self.nodes.insert(node.clone(), Membership::Implicit);
            self.notify(NodeEvent::Added(node));
        }
    }

    fn drop_pair(&mut self, pair: &UnorderedPair<N>) {
        self.connections.remove(pair);
        for (node, other) in [(pair.first(), pair.second()), (pair.second(), pair.first())] {
            if let Some(set) = self.neighbors.get_mut(node) {
                set.remove(other);
            }
        }
        self.prune(pair.first());
        self.prune(pair.second());
    }

    /// Remove an implicitly created node once nothing refers to it
    fn prune(&mut self, node: &N) {
        let unused = self.nodes.get(node) == Some(&Membership::Implicit)
            && self.neighbors.get(node).is_none_or(BTreeSet::is_empty)
            && !self.tethers.contains_key(node);
        if unused {
            self.nodes.remove(node);
            self.neighbors.remove(node);
            self.masses.remove(node);
            debug!(?node, "unconnected node pruned");
            self.notify(NodeEvent::Removed(node.clone()));
        }
    }

    fn notify(&mut self, event: NodeEvent<N>) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
