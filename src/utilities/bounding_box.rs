use glam::Vec3;

/// Result of a containment test between two volumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainmentType {
    /// The objects are separate.
    Disjoint,
    /// One object fully contains the other.
    Contains,
    /// The objects are intersecting, but neither object fully contains the other.
    Intersects,
}

/// Provides simple axis-aligned bounding box functionality.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Location with the lowest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub min: Vec3,
    /// Location with the highest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Constructs a bounding box from the specified minimum and maximum.
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that merges into anything without changing it.
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(-f32::MAX),
        }
    }

    /// Creates a bounding box around a point with the given half extents.
    #[inline]
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Creates the tightest bounding box containing all points. Returns an empty box for no points.
    pub fn from_points<'a, I: IntoIterator<Item = &'a Vec3>>(points: I) -> Self {
        points
            .into_iter()
            .fold(Self::empty(), |bounds, p| Self::new(bounds.min.min(*p), bounds.max.max(*p)))
    }

    /// Whether min <= max on every axis and all values are finite.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    /// Determines if two bounding boxes intersect. Touching boxes intersect.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        Self::intersects_bounds(self.min, self.max, other.min, other.max)
    }

    /// Determines if a bounding box intersects another bounding box.
    #[inline]
    pub fn intersects_bounds(min_a: Vec3, max_a: Vec3, min_b: Vec3, max_b: Vec3) -> bool {
        let no_intersection_on_axes = max_a.cmplt(min_b) | max_b.cmplt(min_a);
        !no_intersection_on_axes.any()
    }

    /// Classifies how `other` relates to this box.
    #[inline]
    pub fn contains(&self, other: &BoundingBox) -> ContainmentType {
        if !self.intersects(other) {
            ContainmentType::Disjoint
        } else if self.min.cmple(other.min).all() && self.max.cmpge(other.max).all() {
            ContainmentType::Contains
        } else {
            ContainmentType::Intersects
        }
    }

    /// Whether the point is inside or on the boundary of the box.
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && self.max.cmpge(point).all()
    }

    /// Computes a bounding box which contains two other bounding boxes.
    #[inline]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Computes a bounding box which contains two other bounding boxes.
    #[inline]
    pub fn create_merged(min_a: Vec3, max_a: Vec3, min_b: Vec3, max_b: Vec3) -> (Vec3, Vec3) {
        (min_a.min(min_b), max_a.max(max_b))
    }

    /// Grows the box by `margin` in every direction.
    #[inline]
    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Translates the box.
    #[inline]
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Computes the volume of the bounding box.
    #[inline]
    pub fn volume(&self) -> f32 {
        let diagonal = self.max - self.min;
        diagonal.x * diagonal.y * diagonal.z
    }

    /// Half of the surface area. Used as the node cost metric of the trees.
    #[inline]
    pub fn surface_metric(&self) -> f32 {
        let d = self.max - self.min;
        d.x * d.y + d.y * d.z + d.z * d.x
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the size of the box along each axis.
    #[inline]
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Closest point in (or on) the box to the given point.
    #[inline]
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }

    /// Squared distance from a point to the box. Zero for contained points.
    #[inline]
    pub fn distance_squared_to_point(&self, point: Vec3) -> f32 {
        point.distance_squared(self.closest_point(point))
    }

    /// Squared distance between two boxes. Zero when they intersect.
    #[inline]
    pub fn distance_squared(&self, other: &Self) -> f32 {
        let gap = (other.min - self.max).max(self.min - other.max).max(Vec3::ZERO);
        gap.length_squared()
    }

    /// Intersects a ray with the box, returning the entry parameter clamped to `[0, maximum_t]`.
    pub fn ray_intersection(&self, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = maximum_t;
        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < 1e-12 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
            } else {
                let inverse = 1.0 / d;
                let mut t0 = (self.min[axis] - o) * inverse;
                let mut t1 = (self.max[axis] - o) * inverse;
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                t_min = t_min.max(t0);
                t_max = t_max.min(t1);
                if t_min > t_max {
                    return None;
                }
            }
        }
        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit() -> BoundingBox {
        BoundingBox::new(Vec3::ZERO, Vec3::ONE)
    }

    #[test]
    fn touching_boxes_intersect() {
        let other = BoundingBox::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(unit().intersects(&other));
        let apart = other.translated(Vec3::new(0.01, 0.0, 0.0));
        assert!(!unit().intersects(&apart));
    }

    #[test]
    fn containment() {
        let inner = BoundingBox::new(Vec3::splat(0.25), Vec3::splat(0.75));
        assert_eq!(unit().contains(&inner), ContainmentType::Contains);
        assert_eq!(inner.contains(&unit()), ContainmentType::Intersects);
        assert_eq!(
            unit().contains(&inner.translated(Vec3::splat(5.0))),
            ContainmentType::Disjoint
        );
    }

    #[test]
    fn empty_merges_to_other() {
        let merged = BoundingBox::empty().merged(&unit());
        assert_eq!(merged, unit());
        assert!(!BoundingBox::empty().is_valid());
        assert_eq!(BoundingBox::from_points(&[]), BoundingBox::empty());
    }

    #[test]
    fn metrics() {
        let b = BoundingBox::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(b.volume(), 6.0);
        assert_relative_eq!(b.surface_metric(), 2.0 + 6.0 + 3.0);
        assert_relative_eq!(b.center(), Vec3::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn distances() {
        let other = unit().translated(Vec3::new(3.0, 0.0, 4.0));
        assert_relative_eq!(unit().distance_squared(&other), 4.0 + 9.0);
        assert_relative_eq!(unit().distance_squared_to_point(Vec3::splat(0.5)), 0.0);
        assert_relative_eq!(unit().distance_squared_to_point(Vec3::new(-2.0, 0.5, 0.5)), 4.0);
    }

    #[test]
    fn ray_hits_and_misses() {
        let t = unit()
            .ray_intersection(Vec3::new(-1.0, 0.5, 0.5), Vec3::X, 10.0)
            .unwrap();
        assert_relative_eq!(t, 1.0);
        assert!(unit()
            .ray_intersection(Vec3::new(-1.0, 2.0, 0.5), Vec3::X, 10.0)
            .is_none());
        assert!(unit()
            .ray_intersection(Vec3::new(-1.0, 0.5, 0.5), Vec3::X, 0.5)
            .is_none());
        // Origin inside.
        assert_eq!(
            unit().ray_intersection(Vec3::splat(0.5), Vec3::Y, 1.0),
            Some(0.0)
        );
    }
}
