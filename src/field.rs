//! Global force fields
//!
//! A field is a pure function from a world position to a force, applied to
//! every body on every step. Positive strength pushes bodies away from the
//! field's source; negative strength attracts them.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};
use crate::spring::MIN_DISTANCE;

/// The closed set of field shapes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForceField {
    /// Radial field around a point, falling off with the square of distance
    Point { source: DVec2, strength: f64 },
    /// Field perpendicular to an infinite line, falling off with the square
    /// of the distance to the line
    Line {
        origin: DVec2,
        direction: DVec2,
        strength: f64,
    },
    /// Constant field on either side of an infinite line, along its normal
    Uniform {
        origin: DVec2,
        normal: DVec2,
        strength: f64,
    },
}

impl ForceField {
    /// Radial field emanating from `source`
    pub fn point(source: DVec2, strength: f64) -> PhysicsResult<Self> {
        let field = Self::Point { source, strength };
        field.validate()?;
        Ok(field)
    }

    /// Field around the line through `origin` along `direction`
    pub fn line(origin: DVec2, direction: DVec2, strength: f64) -> PhysicsResult<Self> {
        let field = Self::Line {
            origin,
            direction,
            strength,
        };
        field.validate()?;
        Ok(field.normalized())
    }

    /// Uniform field on both sides of the line through `origin` with the given normal
    pub fn uniform(origin: DVec2, normal: DVec2, strength: f64) -> PhysicsResult<Self> {
        let field = Self::Uniform {
            origin,
            normal,
            strength,
        };
        field.validate()?;
        Ok(field.normalized())
    }

    pub fn strength(&self) -> f64 {
        match *self {
            Self::Point { strength, .. }
            | Self::Line { strength, .. }
            | Self::Uniform { strength, .. } => strength,
        }
    }

    /// Check that every parameter is finite and every direction non-zero
    pub fn validate(&self) -> PhysicsResult<()> {
        let (points, axis, strength) = match *self {
            Self::Point { source, strength } => ([source, DVec2::ZERO], None, strength),
            Self::Line {
                origin,
                direction,
                strength,
            } => ([origin, direction], Some(("direction", direction)), strength),
            Self::Uniform {
                origin,
                normal,
                strength,
            } => ([origin, normal], Some(("normal", normal)), strength),
        };
        if !strength.is_finite() {
            return Err(PhysicsError::InvalidField(format!(
                "strength must be finite, got {strength}"
            )));
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(PhysicsError::InvalidField(
                "coordinates must be finite".to_string(),
            ));
        }
        if let Some((name, v)) = axis {
            if v.length() <= MIN_DISTANCE {
                return Err(PhysicsError::InvalidField(format!(
                    "{name} must not be zero"
                )));
            }
        }
        Ok(())
    }

    /// Unit axis, and for line-shaped fields an origin moved to the foot of
    /// the perpendicular from the world origin.
    pub(crate) fn normalized(self) -> Self {
        match self {
            Self::Point { .. } => self,
            Self::Line {
                origin,
                direction,
                strength,
            } => {
                let direction = direction.normalize_or_zero();
                Self::Line {
                    origin: origin - direction * origin.dot(direction),
                    direction,
                    strength,
                }
            }
            Self::Uniform {
                origin,
                normal,
                strength,
            } => {
                let normal = normal.normalize_or_zero();
                Self::Uniform {
                    origin: normal * origin.dot(normal),
                    normal,
                    strength,
                }
            }
        }
    }

    /// Force exerted on a body at `position`
    pub fn force(&self, position: DVec2) -> DVec2 {
        match *self {
            Self::Point { source, strength } => inverse_square(position - source, strength),
            Self::Line {
                origin,
                direction,
                strength,
            } => {
                let relative = position - origin;
                let axis_sq = direction.length_squared();
                if axis_sq <= MIN_DISTANCE * MIN_DISTANCE {
                    return DVec2::ZERO;
                }
                let along = direction * (relative.dot(direction) / axis_sq);
                inverse_square(relative - along, strength)
            }
            Self::Uniform {
                origin,
                normal,
                strength,
            } => {
                let unit = normal.normalize_or_zero();
                let side = (position - origin).dot(unit);
                if side.abs() <= MIN_DISTANCE {
                    return DVec2::ZERO;
                }
                unit * (strength * side.signum())
            }
        }
    }
}

/// `strength / r^2` along `relative`, zero when `relative` is degenerate
fn inverse_square(relative: DVec2, strength: f64) -> DVec2 {
    let distance = relative.length();
    if distance <= MIN_DISTANCE {
        return DVec2::ZERO;
    }
    relative * (strength / (distance * distance * distance))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn point_field_follows_inverse_square_law() {
        let field = ForceField::point(DVec2::ZERO, 100.0).unwrap();
        let f = field.force(DVec2::new(2.0, 0.0));
        assert!((f - DVec2::new(25.0, 0.0)).length() < EPS);

        let f = field.force(DVec2::new(0.0, -5.0));
        assert!((f.length() - 4.0).abs() < EPS);
        assert!(f.y < 0.0, "positive strength repels");
    }

    #[test]
    fn negative_point_field_attracts() {
        let field = ForceField::point(DVec2::new(1.0, 1.0), -8.0).unwrap();
        let f = field.force(DVec2::new(1.0, 3.0));
        assert!((f - DVec2::new(0.0, -2.0)).length() < EPS);
    }

    #[test]
    fn point_field_at_source_is_zero() {
        let field = ForceField::point(DVec2::new(4.0, 4.0), 1e6).unwrap();
        assert_eq!(field.force(DVec2::new(4.0, 4.0)), DVec2::ZERO);
    }

    #[test]
    fn line_field_is_perpendicular_to_the_line() {
        // Horizontal line through (7, 2)
        let field = ForceField::line(DVec2::new(7.0, 2.0), DVec2::new(3.0, 0.0), 16.0).unwrap();
        let f = field.force(DVec2::new(-40.0, 6.0));
        assert!(f.x.abs() < EPS);
        assert!((f.y - 1.0).abs() < EPS);

        let below = field.force(DVec2::new(100.0, 0.0));
        assert!((below.y + 4.0).abs() < EPS);
    }

    #[test]
    fn line_field_on_the_line_is_zero() {
        let field = ForceField::line(DVec2::ZERO, DVec2::new(1.0, 1.0), 5.0).unwrap();
        assert_eq!(field.force(DVec2::new(3.0, 3.0)), DVec2::ZERO);
    }

    #[test]
    fn uniform_field_is_constant_on_each_side() {
        // Vertical line x = 10, normal pointing along +x
        let field = ForceField::uniform(DVec2::new(10.0, 0.0), DVec2::new(2.0, 0.0), 3.0).unwrap();
        let near = field.force(DVec2::new(11.0, 5.0));
        let far = field.force(DVec2::new(500.0, -80.0));
        assert!((near - DVec2::new(3.0, 0.0)).length() < EPS);
        assert!((far - near).length() < EPS);

        let other_side = field.force(DVec2::new(-3.0, 0.0));
        assert!((other_side - DVec2::new(-3.0, 0.0)).length() < EPS);
    }

    #[test]
    fn constructors_reject_degenerate_axes() {
        assert!(matches!(
            ForceField::line(DVec2::ZERO, DVec2::ZERO, 1.0),
            Err(PhysicsError::InvalidField(_))
        ));
        assert!(ForceField::uniform(DVec2::ZERO, DVec2::ZERO, 1.0).is_err());
        assert!(ForceField::point(DVec2::ZERO, f64::NAN).is_err());
        assert!(ForceField::point(DVec2::new(f64::INFINITY, 0.0), 1.0).is_err());
    }

    #[test]
    fn deserializes_tagged_variants() {
        let field: ForceField =
            serde_json::from_str(r#"{"kind":"point","source":[1.0,2.0],"strength":-3.0}"#)
                .unwrap();
        assert_eq!(
            field,
            ForceField::Point {
                source: DVec2::new(1.0, 2.0),
                strength: -3.0
            }
        );
        assert_eq!(field.strength(), -3.0);
    }
}
