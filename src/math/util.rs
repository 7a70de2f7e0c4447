use super::Vector2d;
use crate::error::{Error, Result};
use cgmath::prelude::*;

/// The tolerance used when testing two vectors for colinearity.
const COLINEAR_TOLERANCE: f64 = 0.001;

/// Vectors shorter than this cannot be normalised.
const MIN_MAGNITUDE: f64 = 1e-12;

/// Rotates a vector 90 degrees clockwise in screen space (y pointing down),
/// giving the normal on the right hand side of the direction of travel.
pub fn right_normal(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// Rotates a vector 90 degrees anti-clockwise in screen space,
/// giving the normal on the left hand side of the direction of travel.
pub fn left_normal(vec: Vector2d) -> Vector2d {
    Vector2d::new(vec.y, -vec.x)
}

/// The normal that lanes are offset along. Reversed lanes drive the other way,
/// so their right hand side is the original curve's left hand side.
pub fn side_normal(vec: Vector2d, reverse: bool) -> Vector2d {
    if reverse {
        left_normal(vec)
    } else {
        right_normal(vec)
    }
}

/// Normalises a vector, failing if it has no length.
pub fn unit(vec: Vector2d) -> Result<Vector2d> {
    let mag = vec.magnitude();
    if mag.is_finite() && mag > MIN_MAGNITUDE {
        Ok(vec / mag)
    } else {
        Err(Error::DegenerateGeometry("cannot normalise a zero length vector"))
    }
}

/// Tests whether two vectors are parallel or anti-parallel.
/// A zero vector is considered colinear with everything.
pub fn is_colinear(a: Vector2d, b: Vector2d) -> bool {
    let mag = a.magnitude() * b.magnitude();
    if mag <= MIN_MAGNITUDE {
        return true;
    }
    (a.perp_dot(b) / mag).abs() < COLINEAR_TOLERANCE
}

/// The signed angle in radians that rotates `a` onto `b`, in (-π, π].
pub fn signed_angle(a: Vector2d, b: Vector2d) -> f64 {
    a.perp_dot(b).atan2(a.dot(b))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn normals() {
        let v = Vector2d::new(1.0, 0.0);
        assert_eq!(right_normal(v), Vector2d::new(0.0, 1.0));
        assert_eq!(left_normal(v), Vector2d::new(0.0, -1.0));
        assert_eq!(side_normal(v, true), left_normal(v));
    }

    #[test]
    fn colinearity() {
        assert!(is_colinear(Vector2d::new(1.0, 2.0), Vector2d::new(2.0, 4.0)));
        assert!(is_colinear(Vector2d::new(1.0, 0.0), Vector2d::new(-3.0, 0.0)));
        assert!(!is_colinear(Vector2d::new(1.0, 0.0), Vector2d::new(1.0, 0.1)));
    }

    #[test]
    fn angles() {
        let x = Vector2d::new(1.0, 0.0);
        let y = Vector2d::new(0.0, 1.0);
        assert_approx_eq!(signed_angle(x, y), FRAC_PI_2);
        assert_approx_eq!(signed_angle(y, x), -FRAC_PI_2);
    }

    #[test]
    fn zero_vector_cannot_be_normalised() {
        assert!(matches!(
            unit(Vector2d::new(0.0, 0.0)),
            Err(Error::DegenerateGeometry(_))
        ));
        assert_approx_eq!(unit(Vector2d::new(3.0, 4.0)).unwrap().x, 0.6);
    }
}
