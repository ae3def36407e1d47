//! Fixed-step spring simulation
//!
//! Every node of the [`ConnectionGraph`] gets a [`Body`]. Each step
//! accumulates spring, tether, friction and field forces from one snapshot
//! of body positions, then integrates with semi-implicit Euler (velocity
//! first, then position), which keeps stiff, lightly damped systems stable.
//!
//! A tick always runs in the order sync -> step -> push: pull positions the
//! user may have changed, advance the physics, write the result back.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use glam::DVec2;
use tracing::{debug, trace, warn};

use crate::config::{self, SimulationConfig};
use crate::error::PhysicsResult;
use crate::graph::ConnectionGraph;
use crate::view::NodeView;

/// Dynamical state of one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: DVec2,
    pub velocity: DVec2,
    /// Pinned bodies never move on their own and always have zero velocity
    pub pinned: bool,
}

impl Body {
    fn at(position: DVec2, pinned: bool) -> Self {
        Self {
            position,
            velocity: DVec2::ZERO,
            pinned,
        }
    }
}

/// Whether ticks advance the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationState {
    #[default]
    Stopped,
    Running,
}

/// A mass-spring simulation over a connection graph
pub struct Simulation<N> {
    graph: ConnectionGraph<N>,
    bodies: BTreeMap<N, Body>,
    config: SimulationConfig,
    state: SimulationState,
    /// Simulated time reached so far, on the caller's clock
    clock: Option<Duration>,
}

impl<N: Ord + Clone + fmt::Debug> Simulation<N> {
    /// Create a simulation with the default configuration.
    ///
    /// Each body starts at the position the view reports for its node (the
    /// origin if the view does not know it).
    pub fn new(graph: ConnectionGraph<N>, view: &impl NodeView<N>) -> Self {
        let mut simulation = Self {
            graph,
            bodies: BTreeMap::new(),
            config: SimulationConfig::default(),
            state: SimulationState::Stopped,
            clock: None,
        };
        simulation.reconcile(|node| view.position(node));
        simulation
    }

    /// Create a simulation with a custom configuration
    pub fn with_config(
        graph: ConnectionGraph<N>,
        view: &impl NodeView<N>,
        config: SimulationConfig,
    ) -> PhysicsResult<Self> {
        config.validate()?;
        let mut simulation = Self::new(graph, view);
        simulation.config = config;
        Ok(simulation)
    }

    // ========== State machine ==========

    /// Start reacting to ticks, with simulated time starting at `now`.
    ///
    /// Starting a running simulation only resets the clock reference.
    pub fn start(&mut self, now: Duration) {
        if self.state == SimulationState::Stopped {
            debug!("simulation started");
        }
        self.state = SimulationState::Running;
        self.clock = Some(now);
    }

    /// Stop reacting to ticks. Manual steps remain possible.
    pub fn stop(&mut self) {
        if self.state == SimulationState::Running {
            debug!("simulation stopped");
        }
        self.state = SimulationState::Stopped;
        self.clock = None;
    }

    pub fn is_running(&self) -> bool {
        self.state == SimulationState::Running
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    // ========== Clocked loop ==========

    /// Catch simulated time up with `now` in fixed steps.
    ///
    /// Each step runs sync -> step -> push against `view`. At most
    /// `max_steps_per_tick` steps run per call; any backlog beyond that is
    /// dropped so a stalled caller cannot trigger an unbounded burst.
    /// Returns the number of steps taken (0 while stopped).
    pub fn tick(&mut self, now: Duration, view: &mut impl NodeView<N>) -> usize {
        if !self.is_running() {
            return 0;
        }
        let step = self.config.time_step_duration();
        let mut clock = *self.clock.get_or_insert(now);
        let mut steps = 0;

        while clock + step <= now {
            if steps == self.config.max_steps_per_tick {
                let behind = now - clock;
                warn!(
                    steps,
                    behind_ms = behind.as_secs_f64() * 1e3,
                    "simulation fell behind, dropping backlog"
                );
                clock = now;
                break;
            }
            self.sync_from_external(view);
            self.advance(self.config.time_step);
            self.push_to_external(view);
            clock += step;
            steps += 1;
        }

        self.clock = Some(clock);
        trace!(steps, "tick");
        steps
    }

    /// One manual sync -> step -> push cycle, independent of the clock
    pub fn step_once(&mut self, view: &mut impl NodeView<N>) {
        self.sync_from_external(view);
        self.advance(self.config.time_step);
        self.push_to_external(view);
    }

    /// Advance the physics by `steps` configured time steps without a view
    pub fn run_steps(&mut self, steps: usize) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Step until every free body is slower than `speed` or `max_steps` ran.
    ///
    /// Returns the number of steps taken.
    pub fn run_until_settled(&mut self, speed: f64, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps {
            self.step();
            steps += 1;
            if self.max_speed() < speed {
                break;
            }
        }
        steps
    }

    // ========== External sync ==========

    /// Pull positions from the view.
    ///
    /// A body whose node was moved externally, or is held by the user,
    /// snaps to the external position and loses its velocity. Bodies for
    /// nodes added to the graph since the last step are created here.
    pub fn sync_from_external(&mut self, view: &impl NodeView<N>) {
        self.reconcile(|node| view.position(node));
        let epsilon = self.config.sync_epsilon;

        for (node, body) in &mut self.bodies {
            let Some(external) = view.position(node) else {
                continue;
            };
            if !external.is_finite() {
                warn!(?node, "ignoring non-finite external position");
                continue;
            }
            if external.distance(body.position) > epsilon || view.is_held(node) {
                body.position = external;
                body.velocity = DVec2::ZERO;
            }
        }
    }

    /// Write every free body's position to the view
    pub fn push_to_external(&self, view: &mut impl NodeView<N>) {
        for (node, body) in &self.bodies {
            if !body.pinned {
                view.set_position(node, body.position);
            }
        }
    }

    // ========== Physics ==========

    /// Advance by the configured time step
    pub fn step(&mut self) {
        self.advance(self.config.time_step);
    }

    /// Advance by an explicit time step (seconds)
    pub fn step_by(&mut self, dt: f64) -> PhysicsResult<()> {
        config::check_time_step(dt)?;
        self.advance(dt);
        Ok(())
    }

    fn advance(&mut self, dt: f64) {
        self.reconcile(|_| None);

        let mut forces: BTreeMap<N, DVec2> = self
            .bodies
            .keys()
            .map(|node| (node.clone(), DVec2::ZERO))
            .collect();
        self.apply_link_force(&mut forces);
        self.apply_tether_force(&mut forces);
        self.apply_friction(&mut forces);
        self.apply_fields(&mut forces);

        for (node, body) in &mut self.bodies {
            if body.pinned {
                body.velocity = DVec2::ZERO;
                continue;
            }
            let force = forces.get(node).copied().unwrap_or(DVec2::ZERO);
            let inverse_mass = self.graph.mass(node).recip();

            let velocity = body.velocity + force * inverse_mass * dt;
            let position = body.position + velocity * dt;
            if velocity.is_finite() && position.is_finite() {
                body.velocity = velocity;
                body.position = position;
            } else {
                warn!(?node, "integration diverged, holding body in place");
                body.velocity = DVec2::ZERO;
            }
        }
    }

    /// Springs between connected pairs (equal and opposite)
    fn apply_link_force(&self, forces: &mut BTreeMap<N, DVec2>) {
        for (pair, springs) in self.graph.connections() {
            let (Some(a), Some(b)) = (self.bodies.get(pair.first()), self.bodies.get(pair.second()))
            else {
                debug_assert!(false, "connected node without a body: {pair:?}");
                continue;
            };
            let force: DVec2 = springs
                .iter()
                .map(|spring| spring.force_between(a.position, b.position))
                .sum();
            add_force(forces, pair.first(), force);
            add_force(forces, pair.second(), -force);
        }
    }

    /// Tethers towards their fixed targets
    fn apply_tether_force(&self, forces: &mut BTreeMap<N, DVec2>) {
        for (node, tether) in self.graph.tethers() {
            let Some(body) = self.bodies.get(node) else {
                debug_assert!(false, "tethered node without a body: {node:?}");
                continue;
            };
            add_force(forces, node, tether.force_on(body.position));
        }
    }

    /// Velocity-proportional damping
    fn apply_friction(&self, forces: &mut BTreeMap<N, DVec2>) {
        if self.config.friction == 0.0 {
            return;
        }
        for (node, body) in &self.bodies {
            add_force(forces, node, -self.config.friction * body.velocity);
        }
    }

    /// Global force fields
    fn apply_fields(&self, forces: &mut BTreeMap<N, DVec2>) {
        let fields = self.graph.fields();
        if fields.is_empty() {
            return;
        }
        for (node, body) in &self.bodies {
            let force: DVec2 = fields.iter().map(|f| f.force(body.position)).sum();
            add_force(forces, node, force);
        }
    }

    /// Bring the body map in line with the graph.
    ///
    /// New nodes get a body at `initial(node)` (or the origin), bodies of
    /// removed nodes are dropped, and pin state follows the current mass.
    fn reconcile(&mut self, initial: impl Fn(&N) -> Option<DVec2>) {
        self.bodies.retain(|node, _| self.graph.contains(node));

        for node in self.graph.nodes() {
            let pinned = self.graph.is_pinned(node);
            match self.bodies.get_mut(node) {
                Some(body) => {
                    if pinned {
                        body.velocity = DVec2::ZERO;
                    }
                    body.pinned = pinned;
                }
                None => {
                    let position = initial(node)
                        .filter(|p| p.is_finite())
                        .unwrap_or(DVec2::ZERO);
                    trace!(?node, ?position, pinned, "body created");
                    self.bodies
                        .insert(node.clone(), Body::at(position, pinned));
                }
            }
        }
        debug_assert_eq!(self.bodies.len(), self.graph.node_count());
    }

    // ========== Accessors ==========

    pub fn graph(&self) -> &ConnectionGraph<N> {
        &self.graph
    }

    /// Mutable graph access; changes take effect on the next step
    pub fn graph_mut(&mut self) -> &mut ConnectionGraph<N> {
        &mut self.graph
    }

    pub fn body(&self, node: &N) -> Option<&Body> {
        self.bodies.get(node)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (&N, &Body)> {
        self.bodies.iter()
    }

    pub fn position(&self, node: &N) -> Option<DVec2> {
        self.bodies.get(node).map(|b| b.position)
    }

    pub fn velocity(&self, node: &N) -> Option<DVec2> {
        self.bodies.get(node).map(|b| b.velocity)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn set_friction(&mut self, friction: f64) -> PhysicsResult<()> {
        config::check_friction(friction)?;
        self.config.friction = friction;
        Ok(())
    }

    /// Change the fixed time step (seconds)
    pub fn set_time_step(&mut self, time_step: f64) -> PhysicsResult<()> {
        config::check_time_step(time_step)?;
        self.config.time_step = time_step;
        Ok(())
    }

    /// Fastest speed among free bodies
    pub fn max_speed(&self) -> f64 {
        self.bodies
            .values()
            .filter(|b| !b.pinned)
            .map(|b| b.velocity.length())
            .fold(0.0, f64::max)
    }

    /// Kinetic energy of all free bodies
    pub fn kinetic_energy(&self) -> f64 {
        self.bodies
            .iter()
            .filter(|(_, b)| !b.pinned)
            .map(|(node, b)| 0.5 * self.graph.mass(node) * b.velocity.length_squared())
            .sum()
    }

    /// Elastic energy stored in springs and tethers
    pub fn potential_energy(&self) -> f64 {
        let springs: f64 = self
            .graph
            .connections()
            .filter_map(|(pair, springs)| {
                let a = self.bodies.get(pair.first())?;
                let b = self.bodies.get(pair.second())?;
                Some(
                    springs
                        .iter()
                        .map(|s| s.energy(a.position, b.position))
                        .sum::<f64>(),
                )
            })
            .sum();
        let tethers: f64 = self
            .graph
            .tethers()
            .filter_map(|(node, tether)| Some(tether.energy(self.bodies.get(node)?.position)))
            .sum();
        springs + tethers
    }
}

fn add_force<N: Ord>(forces: &mut BTreeMap<N, DVec2>, node: &N, force: DVec2) {
    if let Some(total) = forces.get_mut(node) {
        *total += force;
    }
}
