//! Elastic constraints: springs between two nodes and tethers to a fixed point
//!
//! Both follow Hooke's law along the line joining their endpoints. A
//! positive force pulls the endpoints together.

use glam::DVec2;

use crate::error::{PhysicsError, PhysicsResult};

/// Distances at or below this are treated as coincident points.
///
/// The direction between coincident points is undefined, so no force is
/// produced rather than dividing by (almost) zero.
pub const MIN_DISTANCE: f64 = 1e-9;

/// Default stiffness used by scene files and arrangements
pub const DEFAULT_STIFFNESS: f64 = 1.0;

/// An immutable spring between two bodies.
///
/// The anchors are offsets from each body's position where the spring is
/// attached. Bodies are points and never rotate, so an anchor is a fixed
/// world-space offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    rest_length: f64,
    stiffness: f64,
    anchor_a: DVec2,
    anchor_b: DVec2,
}

impl Spring {
    /// Create a spring attached at the centres of both bodies
    pub fn new(rest_length: f64, stiffness: f64) -> PhysicsResult<Self> {
        Self::with_anchors(rest_length, stiffness, DVec2::ZERO, DVec2::ZERO)
    }

    /// Create a spring attached at offsets from both bodies
    pub fn with_anchors(
        rest_length: f64,
        stiffness: f64,
        anchor_a: DVec2,
        anchor_b: DVec2,
    ) -> PhysicsResult<Self> {
        check_law(rest_length, stiffness).map_err(PhysicsError::InvalidSpring)?;
        if !anchor_a.is_finite() || !anchor_b.is_finite() {
            return Err(PhysicsError::InvalidSpring(
                "anchors must be finite".to_string(),
            ));
        }
        Ok(Self {
            rest_length,
            stiffness,
            anchor_a,
            anchor_b,
        })
    }

    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    pub fn anchor_a(&self) -> DVec2 {
        self.anchor_a
    }

    pub fn anchor_b(&self) -> DVec2 {
        self.anchor_b
    }

    /// The same spring seen from the other endpoint
    pub fn reverse(&self) -> Self {
        Self {
            anchor_a: self.anchor_b,
            anchor_b: self.anchor_a,
            ..*self
        }
    }

    /// Scalar force at the given length (positive = pulling inward)
    pub fn force(&self, length: f64) -> f64 {
        (length - self.rest_length) * self.stiffness
    }

    /// Force on body A, given the positions of both bodies.
    ///
    /// Body B receives the negation.
    pub fn force_between(&self, position_a: DVec2, position_b: DVec2) -> DVec2 {
        let relative = (position_b + self.anchor_b) - (position_a + self.anchor_a);
        directed(relative, self.force(relative.length()))
    }

    /// Elastic energy stored at the given body positions
    pub fn energy(&self, position_a: DVec2, position_b: DVec2) -> f64 {
        let relative = (position_b + self.anchor_b) - (position_a + self.anchor_a);
        let stretch = relative.length() - self.rest_length;
        0.5 * self.stiffness * stretch * stretch
    }
}

/// A spring from one node to a fixed point in the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tether {
    rest_length: f64,
    stiffness: f64,
    target: DVec2,
}

impl Tether {
    pub fn new(rest_length: f64, stiffness: f64, target: DVec2) -> PhysicsResult<Self> {
        check_law(rest_length, stiffness).map_err(PhysicsError::InvalidTether)?;
        if !target.is_finite() {
            return Err(PhysicsError::InvalidTether(
                "target must be finite".to_string(),
            ));
        }
        Ok(Self {
            rest_length,
            stiffness,
            target,
        })
    }

    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    pub fn target(&self) -> DVec2 {
        self.target
    }

    /// Force on a body at `position`
    pub fn force_on(&self, position: DVec2) -> DVec2 {
        let relative = self.target - position;
        directed(relative, (relative.length() - self.rest_length) * self.stiffness)
    }

    pub fn energy(&self, position: DVec2) -> f64 {
        let stretch = (self.target - position).length() - self.rest_length;
        0.5 * self.stiffness * stretch * stretch
    }
}

/// Scale the unit direction of `relative` by `magnitude`, or zero if degenerate
fn directed(relative: DVec2, magnitude: f64) -> DVec2 {
    let distance = relative.length();
    if distance <= MIN_DISTANCE {
        return DVec2::ZERO;
    }
    relative * (magnitude / distance)
}

fn check_law(rest_length: f64, stiffness: f64) -> Result<(), String> {
    // A rest length of zero is a valid "pull together" constraint.
    if !rest_length.is_finite() || rest_length < 0.0 {
        return Err(format!(
            "rest length must be finite and non-negative, got {rest_length}"
        ));
    }
    if !stiffness.is_finite() || stiffness <= 0.0 {
        return Err(format!(
            "stiffness must be finite and positive, got {stiffness}"
        ));
    }
    Ok(())
}
