//! Scene files
//!
//! A scene describes a complete simulation setup in YAML or JSON: node
//! placements and masses, springs, tethers, force fields, ready-made
//! arrangements, and the simulation config. [`Scene::build`] turns it into a
//! [`ConnectionGraph`] plus the [`Canvas`] holding the initial positions.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::arrange;
use crate::config::SimulationConfig;
use crate::engine::Simulation;
use crate::error::PhysicsError;
use crate::field::ForceField;
use crate::graph::ConnectionGraph;
use crate::spring::{DEFAULT_STIFFNESS, Spring, Tether};
use crate::view::{Canvas, NodeView};

/// Length of one frame of the synthetic clock used by [`SceneSetup::run`]
pub const FRAME: Duration = Duration::from_nanos(16_666_667);

/// Errors that can occur while loading or building a scene
#[derive(Error, Debug)]
pub enum SceneError {
    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The scene text could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// The file extension is not a known scene format
    #[error("unsupported scene format: {0}")]
    UnsupportedFormat(String),

    /// A spring, tether or arrangement names a node the scene never declares
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// The same node id is declared twice
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    /// A report could not be written
    #[error("write error: {0}")]
    Write(String),

    /// A physical parameter is out of range
    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;

/// On-disk scene formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    Yaml,
    Json,
}

impl SceneFormat {
    /// Pick the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> SceneResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| SceneError::UnsupportedFormat(path.display().to_string()))?;
        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Ok(Self::Yaml)
        } else if ext.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(SceneError::UnsupportedFormat(ext.to_string()))
        }
    }
}

/// A node with its initial placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub position: DVec2,
    /// Mass, 1.0 when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    /// Pinned nodes get infinite mass, overriding `mass`
    #[serde(default)]
    pub pinned: bool,
}

/// A spring between two declared nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpringSpec {
    pub a: String,
    pub b: String,
    /// Defaults to the initial distance between the anchor points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_length: Option<f64>,
    #[serde(default = "default_stiffness")]
    pub stiffness: f64,
    #[serde(default)]
    pub anchor_a: DVec2,
    #[serde(default)]
    pub anchor_b: DVec2,
}

/// A tether pulling a declared node toward a fixed point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TetherSpec {
    pub node: String,
    /// Defaults to the node's initial position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<DVec2>,
    #[serde(default)]
    pub rest_length: f64,
    #[serde(default = "default_stiffness")]
    pub stiffness: f64,
}

/// A ready-made arrangement over declared nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Arrangement {
    /// See [`arrange::wheel`]
    Wheel {
        center: String,
        rim: Vec<String>,
        radius: f64,
        #[serde(default = "default_stiffness")]
        stiffness: f64,
    },
    /// See [`arrange::chain`]; replaces connections built before it
    Chain {
        nodes: Vec<String>,
        #[serde(default = "default_stiffness")]
        stiffness: f64,
    },
}

fn default_stiffness() -> f64 {
    DEFAULT_STIFFNESS
}

/// A complete simulation setup as read from a scene file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub arrangements: Vec<Arrangement>,
    #[serde(default)]
    pub springs: Vec<SpringSpec>,
    #[serde(default)]
    pub tethers: Vec<TetherSpec>,
    #[serde(default)]
    pub fields: Vec<ForceField>,
}

impl Scene {
    /// Load a scene, choosing YAML or JSON from the file extension
    pub fn from_path(path: &Path) -> SceneResult<Self> {
        let format = SceneFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), ?format, "loading scene");
        match format {
            SceneFormat::Yaml => Self::from_yaml_str(&content),
            SceneFormat::Json => Self::from_json_str(&content),
        }
    }

    pub fn from_yaml_str(content: &str) -> SceneResult<Self> {
        serde_yaml::from_str(content).map_err(|e| SceneError::Parse(e.to_string()))
    }

    pub fn from_json_str(content: &str) -> SceneResult<Self> {
        serde_json::from_str(content).map_err(|e| SceneError::Parse(e.to_string()))
    }

    /// Validate the scene and build the graph and canvas it describes.
    ///
    /// Arrangements are applied first, then springs, then tethers, so
    /// explicit springs survive a chain arrangement.
    pub fn build(&self) -> SceneResult<SceneSetup> {
        self.simulation.validate()?;

        let mut graph = ConnectionGraph::new();
        let mut canvas = Canvas::new();
        for node in &self.nodes {
            if canvas.position(&node.id).is_some() {
                return Err(SceneError::DuplicateNode(node.id.clone()));
            }
            canvas.place(node.id.clone(), node.position);
            graph.add_node(node.id.clone());
            if node.pinned {
                graph.set_mass(node.id.clone(), f64::INFINITY)?;
            } else if let Some(mass) = node.mass {
                graph.set_mass(node.id.clone(), mass)?;
            }
        }

        let position_of = |id: &String| {
            canvas
                .position(id)
                .ok_or_else(|| SceneError::UnknownNode(id.clone()))
        };

        for arrangement in &self.arrangements {
            match arrangement {
                Arrangement::Wheel {
                    center,
                    rim,
                    radius,
                    stiffness,
                } => {
                    position_of(center)?;
                    for node in rim {
                        position_of(node)?;
                    }
                    arrange::wheel(&mut graph, center.clone(), rim, *radius, *stiffness)?;
                }
                Arrangement::Chain { nodes, stiffness } => {
                    let links = nodes
                        .iter()
                        .map(|id| position_of(id).map(|at| (id.clone(), at)))
                        .collect::<SceneResult<Vec<_>>>()?;
                    arrange::chain(&mut graph, &links, *stiffness)?;
                }
            }
        }

        for entry in &self.springs {
            let a_at = position_of(&entry.a)?;
            let b_at = position_of(&entry.b)?;
            let rest_length = entry
                .rest_length
                .unwrap_or_else(|| (a_at + entry.anchor_a).distance(b_at + entry.anchor_b));
            let spring =
                Spring::with_anchors(rest_length, entry.stiffness, entry.anchor_a, entry.anchor_b)?;
            graph.add_connection(entry.a.clone(), entry.b.clone(), [spring])?;
        }

        for entry in &self.tethers {
            let at = position_of(&entry.node)?;
            let tether = Tether::new(entry.rest_length, entry.stiffness, entry.target.unwrap_or(at))?;
            graph.add_tether(entry.node.clone(), tether);
        }

        for field in &self.fields {
            field.validate()?;
        }
        graph.add_fields(self.fields.iter().map(|f| f.normalized()));

        debug!(stats = %graph.stats(), "scene built");
        Ok(SceneSetup {
            graph,
            canvas,
            config: self.simulation,
        })
    }
}

/// A built scene, ready to simulate
#[derive(Debug)]
pub struct SceneSetup {
    pub graph: ConnectionGraph<String>,
    pub canvas: Canvas<String>,
    pub config: SimulationConfig,
}

impl SceneSetup {
    /// Drive the clocked loop for `duration` of synthetic time.
    ///
    /// The clock advances in [`FRAME`]s, each frame ticking the simulation
    /// against the scene canvas, until at least `duration` has elapsed.
    pub fn run(self, duration: Duration) -> SceneResult<PositionReport> {
        let SceneSetup {
            graph,
            mut canvas,
            config,
        } = self;
        let mut simulation = Simulation::with_config(graph, &canvas, config)?;

        let mut now = Duration::ZERO;
        let mut steps = 0;
        simulation.start(now);
        while now < duration {
            now += FRAME;
            steps += simulation.tick(now, &mut canvas);
        }
        simulation.stop();
        debug!(steps, elapsed = now.as_secs_f64(), "scene run finished");

        Ok(PositionReport::capture(
            &simulation,
            &canvas,
            steps as f64 * config.time_step,
            steps,
        ))
    }
}

/// Final node positions after a run, serialised as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    /// Simulated seconds covered by the steps taken
    pub time: f64,
    pub steps: usize,
    pub kinetic_energy: f64,
    pub potential_energy: f64,
    pub positions: BTreeMap<String, [f64; 2]>,
}

impl PositionReport {
    /// Snapshot the canvas positions and the simulation's energy
    pub fn capture(
        simulation: &Simulation<String>,
        canvas: &Canvas<String>,
        time: f64,
        steps: usize,
    ) -> Self {
        let positions = canvas
            .iter()
            .map(|(id, placement)| (id.clone(), placement.position.to_array()))
            .collect();
        Self {
            time,
            steps,
            kinetic_energy: simulation.kinetic_energy(),
            potential_energy: simulation.potential_energy(),
            positions,
        }
    }

    pub fn to_json(&self) -> SceneResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SceneError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::DEFAULT_TIME_STEP;

    const PENDULUM: &str = r#"
simulation:
  friction: 2.0
nodes:
  - { id: anchor, position: [0, 0], pinned: true }
  - { id: bob, position: [3, 4], mass: 2.0 }
springs:
  - { a: anchor, b: bob, rest_length: 1, stiffness: 10 }
fields:
  - { kind: point, source: [10, 10], strength: 5 }
"#;

    // ========== Loading ==========

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            SceneFormat::from_path(Path::new("a.yaml")).unwrap(),
            SceneFormat::Yaml
        );
        assert_eq!(
            SceneFormat::from_path(Path::new("a.YML")).unwrap(),
            SceneFormat::Yaml
        );
        assert_eq!(
            SceneFormat::from_path(Path::new("a.json")).unwrap(),
            SceneFormat::Json
        );
        assert!(matches!(
            SceneFormat::from_path(Path::new("a.ttl")),
            Err(SceneError::UnsupportedFormat(_))
        ));
        assert!(SceneFormat::from_path(Path::new("scene")).is_err());
    }

    #[test]
    fn parses_yaml_scene() {
        let scene = Scene::from_yaml_str(PENDULUM).unwrap();
        assert_eq!(scene.nodes.len(), 2);
        assert!(scene.nodes[0].pinned);
        assert_eq!(scene.nodes[1].mass, Some(2.0));
        assert_eq!(scene.springs[0].stiffness, 10.0);
        assert_eq!(scene.simulation.friction, 2.0);
        assert_eq!(scene.simulation.time_step, DEFAULT_TIME_STEP);
        assert_eq!(
            scene.fields,
            vec![ForceField::point(DVec2::new(10.0, 10.0), 5.0).unwrap()]
        );
    }

    #[test]
    fn parses_json_scene() {
        let json = r#"{
            "nodes": [{ "id": "a" }, { "id": "b", "position": [1.5, 0] }],
            "springs": [{ "a": "a", "b": "b" }]
        }"#;
        let scene = Scene::from_json_str(json).unwrap();
        assert_eq!(scene.nodes[0].position, DVec2::ZERO);
        assert_eq!(scene.springs[0].rest_length, None);
        assert_eq!(scene.springs[0].stiffness, DEFAULT_STIFFNESS);
    }

    #[test]
    fn rejects_unknown_keys() {
        let result = Scene::from_yaml_str("nodes: []\nspring: []\n");
        assert!(matches!(result, Err(SceneError::Parse(_))));
    }

    #[test]
    fn loads_scene_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(PENDULUM.as_bytes()).unwrap();

        let scene = Scene::from_path(file.path()).unwrap();
        assert_eq!(scene, Scene::from_yaml_str(PENDULUM).unwrap());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = Scene::from_path(Path::new("does/not/exist.yaml"));
        assert!(matches!(result, Err(SceneError::Io(_))));
    }

    // ========== Building ==========

    #[test]
    fn builds_graph_and_canvas() {
        let setup = Scene::from_yaml_str(PENDULUM).unwrap().build().unwrap();
        let anchor = "anchor".to_string();
        let bob = "bob".to_string();

        assert!(setup.graph.is_pinned(&anchor));
        assert_eq!(setup.graph.mass(&bob), 2.0);
        assert_eq!(setup.canvas.position(&bob), Some(DVec2::new(3.0, 4.0)));
        insta::assert_snapshot!(
            setup.graph.stats().to_string(),
            @"nodes: 2 (1 pinned), connections: 1 (1 springs), tethers: 0, fields: 1"
        );
    }

    #[test]
    fn omitted_rest_length_uses_initial_spacing() {
        let scene = Scene::from_yaml_str(
            r#"
nodes:
  - { id: a, position: [0, 0] }
  - { id: b, position: [6, 8] }
springs:
  - { a: a, b: b }
tethers:
  - { node: b }
"#,
        )
        .unwrap();
        let setup = scene.build().unwrap();
        let (a, b) = ("a".to_string(), "b".to_string());

        let springs = setup.graph.connections_between(&a, &b).unwrap();
        assert_eq!(springs[0].rest_length(), 10.0);
        let tether = setup.graph.tether(&b).unwrap();
        assert_eq!(tether.target(), DVec2::new(6.0, 8.0));
        assert_eq!(tether.rest_length(), 0.0);
    }

    #[test]
    fn undeclared_nodes_are_rejected() {
        let scene = Scene::from_yaml_str(
            "nodes: [{ id: a }]\nsprings: [{ a: a, b: ghost, rest_length: 1 }]\n",
        )
        .unwrap();
        match scene.build() {
            Err(SceneError::UnknownNode(id)) => assert_eq!(id, "ghost"),
            other => panic!("expected UnknownNode, got {other:?}"),
        }

        let scene = Scene::from_yaml_str("tethers: [{ node: nobody }]\n").unwrap();
        assert!(matches!(scene.build(), Err(SceneError::UnknownNode(_))));
    }

    #[test]
    fn duplicate_nodes_are_rejected() {
        let scene = Scene::from_yaml_str("nodes: [{ id: a }, { id: a }]\n").unwrap();
        assert!(matches!(scene.build(), Err(SceneError::DuplicateNode(_))));
    }

    #[test]
    fn bad_parameters_surface_as_physics_errors() {
        let scene = Scene::from_yaml_str(
            "nodes: [{ id: a }, { id: b }]\nsprings: [{ a: a, b: b, stiffness: 0 }]\n",
        )
        .unwrap();
        assert!(matches!(
            scene.build(),
            Err(SceneError::Physics(PhysicsError::InvalidSpring(_)))
        ));

        let scene = Scene::from_yaml_str("nodes: [{ id: a, mass: -1 }]\n").unwrap();
        assert!(matches!(
            scene.build(),
            Err(SceneError::Physics(PhysicsError::InvalidMass(_)))
        ));

        let scene = Scene::from_yaml_str("simulation: { time_step: 0 }\n").unwrap();
        assert!(matches!(
            scene.build(),
            Err(SceneError::Physics(PhysicsError::InvalidConfig(_)))
        ));

        let scene = Scene::from_yaml_str("nodes: [{ id: a }]\nsprings: [{ a: a, b: a }]\n")
            .unwrap();
        assert!(matches!(
            scene.build(),
            Err(SceneError::Physics(PhysicsError::SelfConnection))
        ));
    }

    #[test]
    fn arrangements_build_their_springs() {
        let scene = Scene::from_yaml_str(
            r#"
nodes:
  - { id: hub }
  - { id: r1, position: [1, 0] }
  - { id: r2, position: [0, 1] }
  - { id: r3, position: [-1, 0] }
arrangements:
  - { kind: wheel, center: hub, rim: [r1, r2, r3], radius: 5, stiffness: 2 }
"#,
        )
        .unwrap();
        let setup = scene.build().unwrap();
        assert!(setup.graph.is_pinned(&"hub".to_string()));
        assert_eq!(setup.graph.connection_count(), 6);

        let scene = Scene::from_yaml_str(
            "nodes: [{ id: a }, { id: b, position: [2, 0] }]\narrangements: [{ kind: chain, nodes: [a, b] }]\n",
        )
        .unwrap();
        let setup = scene.build().unwrap();
        assert_eq!(setup.graph.stats().tethers, 2);

        let scene = Scene::from_yaml_str(
            "nodes: [{ id: a }]\narrangements: [{ kind: chain, nodes: [a, z] }]\n",
        )
        .unwrap();
        assert!(matches!(scene.build(), Err(SceneError::UnknownNode(_))));
    }

    // ========== Running ==========

    #[test]
    fn run_settles_damped_pendulum() {
        let setup = Scene::from_yaml_str(
            r#"
simulation: { friction: 4.0 }
nodes:
  - { id: anchor, pinned: true }
  - { id: bob, position: [3, 4] }
springs:
  - { a: anchor, b: bob, rest_length: 1, stiffness: 10 }
"#,
        )
        .unwrap()
        .build()
        .unwrap();

        let report = setup.run(Duration::from_secs(20)).unwrap();

        assert!(report.steps >= 1990 && report.steps <= 2000, "{}", report.steps);
        assert_eq!(report.positions["anchor"], [0.0, 0.0]);
        let [x, y] = report.positions["bob"];
        // Pulled straight in along the initial direction.
        assert!((x - 0.6).abs() < 1e-3, "x = {x}");
        assert!((y - 0.8).abs() < 1e-3, "y = {y}");
        assert!(report.kinetic_energy < 1e-6);
    }

    #[test]
    fn pinned_nodes_hold_the_chain() {
        let setup = Scene::from_yaml_str(
            r#"
simulation: { friction: 1.0 }
nodes:
  - { id: left, position: [0, 0], pinned: true }
  - { id: mid, position: [5, -3] }
  - { id: right, position: [10, 0], pinned: true }
springs:
  - { a: left, b: mid, rest_length: 0 }
  - { a: mid, b: right, rest_length: 0 }
"#,
        )
        .unwrap()
        .build()
        .unwrap();

        let report = setup.run(Duration::from_secs(1)).unwrap();
        assert_eq!(report.positions["left"], [0.0, 0.0]);
        assert_eq!(report.positions["right"], [10.0, 0.0]);
        assert!(report.positions["mid"][1] > -3.0);
    }

    #[test]
    fn report_serialises_as_json() {
        let report = PositionReport {
            time: 0.5,
            steps: 50,
            kinetic_energy: 0.0,
            potential_energy: 0.0,
            positions: BTreeMap::from([("a".to_string(), [1.0, -2.0])]),
        };
        let json = report.to_json().unwrap();
        let back: PositionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
        assert!(json.contains("\"a\""));
    }
}
