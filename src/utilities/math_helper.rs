use glam::Vec3;

/// Default tolerance for geometric comparisons in single precision.
pub const EPSILON: f32 = 1e-5;

/// Clamps a value between a minimum and maximum value.
#[inline(always)]
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Returns -1 if the value is negative and 1 otherwise.
#[inline(always)]
pub fn binary_sign(x: f32) -> f32 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Checks if two values are equal within an absolute and relative tolerance.
#[inline]
pub fn are_numerically_equal(a: f32, b: f32, epsilon: f32) -> bool {
    let difference = (a - b).abs();
    difference <= epsilon || difference <= epsilon * a.abs().max(b.abs())
}

/// Builds two vectors perpendicular to the given unit normal and to each other.
#[inline]
pub fn build_orthonormal_basis(normal: Vec3) -> (Vec3, Vec3) {
    // Frisvad-style construction, stable for both hemispheres.
    let sign = binary_sign(normal.z);
    let scale = -1.0 / (sign + normal.z);
    let t = normal.x * normal.y * scale;
    let t1 = Vec3::new(1.0 + sign * normal.x * normal.x * scale, sign * t, -sign * normal.x);
    let t2 = Vec3::new(t, sign + normal.y * normal.y * scale, -normal.y);
    (t1, t2)
}

/// Unnormalized normal of a counter-clockwise triangle.
#[inline]
pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}

/// Computes the closest points between segments `a0-a1` and `b0-b1`.
///
/// Returns `(s, t, point_on_a, point_on_b)` where `s` and `t` are the segment parameters.
pub fn closest_points_on_segments(a0: Vec3, a1: Vec3, b0: Vec3, b1: Vec3) -> (f32, f32, Vec3, Vec3) {
    let da = a1 - a0;
    let db = b1 - b0;
    let r = a0 - b0;
    let a = da.length_squared();
    let e = db.length_squared();
    let f = db.dot(r);

    let (s, t);
    if a <= f32::EPSILON && e <= f32::EPSILON {
        return (0.0, 0.0, a0, b0);
    }
    if a <= f32::EPSILON {
        s = 0.0;
        t = clamp(f / e, 0.0, 1.0);
    } else {
        let c = da.dot(r);
        if e <= f32::EPSILON {
            t = 0.0;
            s = clamp(-c / a, 0.0, 1.0);
        } else {
            let b = da.dot(db);
            let denominator = a * e - b * b;
            // Parallel segments pick an arbitrary s; the clamp pass below fixes t.
            let mut s_candidate = if denominator > f32::EPSILON * a * e {
                clamp((b * f - c * e) / denominator, 0.0, 1.0)
            } else {
                0.0
            };
            let mut t_candidate = (b * s_candidate + f) / e;
            if t_candidate < 0.0 {
                t_candidate = 0.0;
                s_candidate = clamp(-c / a, 0.0, 1.0);
            } else if t_candidate > 1.0 {
                t_candidate = 1.0;
                s_candidate = clamp((b - c) / a, 0.0, 1.0);
            }
            s = s_candidate;
            t = t_candidate;
        }
    }
    (s, t, a0 + da * s, b0 + db * t)
}

/// Closest point on segment `a-b` to `p`, with its parameter.
#[inline]
pub fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> (f32, Vec3) {
    let ab = b - a;
    let length_squared = ab.length_squared();
    if length_squared <= f32::EPSILON {
        return (0.0, a);
    }
    let t = clamp((p - a).dot(ab) / length_squared, 0.0, 1.0);
    (t, a + ab * t)
}

/// Closest point on triangle `abc` to `p`, using Voronoi region classification.
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denominator = 1.0 / (va + vb + vc);
    let v = vb * denominator;
    let w = vc * denominator;
    a + ab * v + ac * w
}

/// Newell normal of a polygon: twice its area along its unit normal. Zero for degenerate polygons.
pub fn polygon_normal(points: &[Vec3]) -> Vec3 {
    let mut sum = Vec3::ZERO;
    for (i, &current) in points.iter().enumerate() {
        sum += current.cross(points[(i + 1) % points.len()]);
    }
    sum
}

/// Signed volume of the tetrahedron `abcd`, positive when `d` is below the counter-clockwise triangle `abc`.
#[inline]
pub fn signed_tetrahedron_volume(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> f32 {
    (a - d).dot((b - d).cross(c - d)) / 6.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn orthonormal_basis_is_orthonormal() {
        for n in [Vec3::X, Vec3::Y, -Vec3::Z, Vec3::new(1.0, 2.0, -3.0).normalize()] {
            let (t1, t2) = build_orthonormal_basis(n);
            assert_relative_eq!(t1.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(t2.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(t1.dot(n), 0.0, epsilon = 1e-5);
            assert_relative_eq!(t2.dot(n), 0.0, epsilon = 1e-5);
            assert_relative_eq!(t1.dot(t2), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn crossing_segments() {
        let (s, t, pa, pb) = closest_points_on_segments(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        assert_relative_eq!(s, 0.5);
        assert_relative_eq!(t, 0.5);
        assert_relative_eq!(pa, Vec3::ZERO);
        assert_relative_eq!(pb, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn parallel_segments() {
        let (_, _, pa, pb) = closest_points_on_segments(
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(0.5, 1.0, 0.0),
            Vec3::new(3.0, 1.0, 0.0),
        );
        assert_relative_eq!(pa.distance(pb), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn triangle_regions() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        assert_relative_eq!(closest_point_on_triangle(Vec3::new(-1.0, -1.0, 0.0), a, b, c), a);
        assert_relative_eq!(
            closest_point_on_triangle(Vec3::new(0.25, 0.25, 3.0), a, b, c),
            Vec3::new(0.25, 0.25, 0.0)
        );
        assert_relative_eq!(
            closest_point_on_triangle(Vec3::new(1.0, 1.0, 0.0), a, b, c),
            Vec3::new(0.5, 0.5, 0.0)
        );
    }

    #[test]
    fn numeric_equality() {
        assert!(are_numerically_equal(1000.0, 1000.001, 1e-5));
        assert!(!are_numerically_equal(1.0, 1.1, 1e-5));
    }
}
