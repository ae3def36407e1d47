//! Ready-made spring arrangements
//!
//! Helpers that wire up common layouts on a [`ConnectionGraph`]: a wheel
//! around a pinned hub, a chain held at both ends, and a rigid link made of
//! many parallel anchored springs.

use std::f64::consts::PI;
use std::fmt;

use glam::DVec2;
use tracing::debug;

use crate::error::PhysicsResult;
use crate::graph::ConnectionGraph;
use crate::spring::{Spring, Tether};

/// Arrange `rim` evenly on a circle of `radius` around a pinned `center`.
///
/// Every rim node is connected to the center at `radius` and to every other
/// rim node at the chord length between their slots, so the wheel keeps its
/// shape and the rim order.
pub fn wheel<N: Ord + Clone + fmt::Debug>(
    graph: &mut ConnectionGraph<N>,
    center: N,
    rim: &[N],
    radius: f64,
    stiffness: f64,
) -> PhysicsResult<()> {
    let rim: Vec<&N> = rim.iter().filter(|n| **n != center).collect();
    let n = rim.len();
    // Validate once up front so a bad radius leaves the graph untouched.
    let spoke = Spring::new(radius, stiffness)?;
    graph.set_mass(center.clone(), f64::INFINITY)?;

    for (i, node) in rim.iter().enumerate() {
        for j in 1..n {
            // Chord of the circle spanning j slots.
            let chord = 2.0 * radius * (j as f64 * PI / n as f64).sin();
            let other = rim[(i + j) % n];
            graph.add_connection(
                (*node).clone(),
                other.clone(),
                [Spring::new(chord.max(0.0), stiffness)?],
            )?;
        }
        graph.add_connection(center.clone(), (*node).clone(), [spoke])?;
    }
    debug!(?center, rim = n, radius, "wheel arranged");
    Ok(())
}

/// Link `nodes` into a chain at their current spacing.
///
/// The ends are tethered to where they are now, so the chain sags back
/// into place when disturbed. Replaces every connection and tether in
/// the graph.
pub fn chain<N: Ord + Clone + fmt::Debug>(
    graph: &mut ConnectionGraph<N>,
    nodes: &[(N, DVec2)],
    stiffness: f64,
) -> PhysicsResult<()> {
    graph.clear_all_connections();
    graph.clear_all_tethers();

    let (Some((first, first_at)), Some((last, last_at))) = (nodes.first(), nodes.last()) else {
        return Ok(());
    };
    graph.add_tether(first.clone(), Tether::new(0.0, stiffness, *first_at)?);
    graph.add_tether(last.clone(), Tether::new(0.0, stiffness, *last_at)?);

    for link in nodes.windows(2) {
        let [(a, a_at), (b, b_at)] = link else {
            continue;
        };
        let spring = Spring::new(a_at.distance(*b_at), stiffness)?;
        graph.add_connection(a.clone(), b.clone(), [spring])?;
    }
    debug!(links = nodes.len().saturating_sub(1), "chain arranged");
    Ok(())
}

/// Hold `b` rigidly relative to `a` using one spring per anchor pair.
///
/// Each spring's rest length is the current distance between its anchor
/// points, so the pair keeps its present relative placement.
pub fn rigid_fixation<N: Ord + Clone + fmt::Debug>(
    graph: &mut ConnectionGraph<N>,
    (a, a_at): (N, DVec2),
    (b, b_at): (N, DVec2),
    anchors: &[(DVec2, DVec2)],
    stiffness: f64,
) -> PhysicsResult<()> {
    let springs = anchors
        .iter()
        .map(|&(anchor_a, anchor_b)| {
            let length = (a_at + anchor_a).distance(b_at + anchor_b);
            Spring::with_anchors(length, stiffness, anchor_a, anchor_b)
        })
        .collect::<PhysicsResult<Vec<_>>>()?;
    graph.add_connection(a, b, springs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Simulation;
    use crate::view::Canvas;

    #[test]
    fn wheel_connects_every_pair() {
        let mut graph = ConnectionGraph::new();
        wheel(&mut graph, "hub", &["a", "b", "c", "d"], 10.0, 5.0).unwrap();

        assert!(graph.is_pinned(&"hub"));
        // 4 spokes + 6 rim pairs
        assert_eq!(graph.connection_count(), 10);
        assert_eq!(graph.stats().springs, 10);

        let side = graph.connections_between(&"a", &"b").unwrap();
        assert!((side[0].rest_length() - 10.0 * 2f64.sqrt()).abs() < 1e-9);
        let across = graph.connections_between(&"a", &"c").unwrap();
        assert!((across[0].rest_length() - 20.0).abs() < 1e-9);
        let spoke = graph.connections_between(&"hub", &"d").unwrap();
        assert_eq!(spoke[0].rest_length(), 10.0);
    }

    #[test]
    fn wheel_ignores_center_in_rim() {
        let mut graph = ConnectionGraph::new();
        wheel(&mut graph, 0, &[0, 1, 2], 3.0, 1.0).unwrap();
        assert_eq!(graph.connection_count(), 3);
    }

    #[test]
    fn wheel_rejects_bad_radius() {
        let mut graph: ConnectionGraph<u8> = ConnectionGraph::new();
        assert!(wheel(&mut graph, 0, &[1, 2], -1.0, 1.0).is_err());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn wheel_settles_into_a_circle() {
        let mut graph = ConnectionGraph::new();
        let rim = ["a", "b", "c", "d", "e"];
        wheel(&mut graph, "hub", &rim, 20.0, 10.0).unwrap();

        let mut canvas = Canvas::new();
        canvas.place("hub", DVec2::ZERO);
        for (i, node) in rim.iter().enumerate() {
            // Roughly in order, but squashed and off-radius.
            let angle = i as f64 * 1.1;
            canvas.place(*node, DVec2::new(angle.cos() * 30.0, angle.sin() * 12.0));
        }
        let mut sim = Simulation::new(graph, &canvas);
        sim.set_friction(5.0).unwrap();
        sim.run_steps(5000);

        for node in rim {
            let r = sim.position(&node).unwrap().length();
            assert!((r - 20.0).abs() < 0.05, "{node} at radius {r}");
        }
    }

    #[test]
    fn chain_links_neighbours_and_tethers_ends() {
        let mut graph = ConnectionGraph::new();
        graph
            .add_connection("x", "y", [Spring::new(1.0, 1.0).unwrap()])
            .unwrap();
        let nodes = [
            ("a", DVec2::new(0.0, 0.0)),
            ("b", DVec2::new(0.0, 3.0)),
            ("c", DVec2::new(4.0, 6.0)),
        ];
        chain(&mut graph, &nodes, 2.0).unwrap();

        assert!(graph.connections_between(&"x", &"y").is_none());
        assert_eq!(graph.connection_count(), 2);
        assert_eq!(
            graph.connections_between(&"b", &"c").unwrap()[0].rest_length(),
            5.0
        );
        assert_eq!(graph.tether(&"a").unwrap().target(), DVec2::ZERO);
        assert_eq!(graph.tether(&"c").unwrap().target(), DVec2::new(4.0, 6.0));
        assert!(graph.tether(&"b").is_none());
    }

    #[test]
    fn empty_chain_only_clears() {
        let mut graph: ConnectionGraph<&str> = ConnectionGraph::new();
        chain(&mut graph, &[], 1.0).unwrap();
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn fixation_keeps_relative_placement() {
        let mut graph = ConnectionGraph::new();
        let anchors = [
            (DVec2::new(-1.0, -1.0), DVec2::new(1.0, 0.0)),
            (DVec2::new(1.0, 1.0), DVec2::new(0.0, -1.0)),
            (DVec2::new(0.0, 1.0), DVec2::new(-1.0, 1.0)),
        ];
        rigid_fixation(
            &mut graph,
            ("anchor", DVec2::ZERO),
            ("body", DVec2::new(6.0, 0.0)),
            &anchors,
            100.0,
        )
        .unwrap();
        graph.set_mass("anchor", f64::INFINITY).unwrap();
        assert_eq!(graph.stats().springs, 3);

        let mut canvas = Canvas::new();
        canvas.place("anchor", DVec2::ZERO);
        canvas.place("body", DVec2::new(6.0, 0.0));
        let mut sim = Simulation::new(graph, &canvas);
        sim.run_steps(100);

        // Already at rest: nothing moves.
        assert!(sim.position(&"body").unwrap().distance(DVec2::new(6.0, 0.0)) < 1e-9);
    }
}
