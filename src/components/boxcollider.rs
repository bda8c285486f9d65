use bevy_ecs::prelude::Component;
use glam::Vec2;
use serde::Serialize;

/// Axis-aligned bounds in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    /// Strict overlap: boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Inclusive overlap: shared edges and corners count.
    pub fn touches(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Penetration of `other` into `self` along each axis, or `None` when
    /// they do not intersect.
    pub fn penetration(&self, other: &Aabb) -> Option<Vec2> {
        if !self.intersects(other) {
            return None;
        }
        let x = (self.max.x - other.min.x).min(other.max.x - self.min.x);
        let y = (self.max.y - other.min.y).min(other.max.y - self.min.y);
        Some(Vec2::new(x, y))
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct BoxCollider {
    pub size: Vec2,
    pub offset: Vec2,
}

impl BoxCollider {
    /// Create a BoxCollider with given size
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: Vec2::new(width, height),
            offset: Vec2::ZERO,
        }
    }

    /// Modify BoxCollider with given size and offset
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Returns the collider AABB for a given entity position.
    /// Handles negative size by normalizing to proper min/max.
    pub fn aabb(&self, position: Vec2) -> Aabb {
        let p0 = position + self.offset;
        let p1 = p0 + self.size;
        Aabb {
            min: p0.min(p1),
            max: p0.max(p1),
        }
    }

    /// AABB vs AABB overlap test against another BoxCollider at a different entity position.
    pub fn overlaps(&self, position: Vec2, other: &Self, other_position: Vec2) -> bool {
        self.aabb(position).intersects(&other.aabb(other_position))
    }

    /// Point containment in world space.
    pub fn contains_point(&self, position: Vec2, point: Vec2) -> bool {
        let bounds = self.aabb(position);
        point.x >= bounds.min.x
            && point.x <= bounds.max.x
            && point.y >= bounds.min.y
            && point.y <= bounds.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_size_is_normalized() {
        let collider = BoxCollider::new(-10.0, -4.0);
        let bounds = collider.aabb(Vec2::new(10.0, 4.0));
        assert_eq!(bounds.min, Vec2::ZERO);
        assert_eq!(bounds.max, Vec2::new(10.0, 4.0));
    }

    #[test]
    fn shared_edge_touches_but_does_not_intersect() {
        let a = BoxCollider::new(10.0, 10.0);
        let left = a.aabb(Vec2::ZERO);
        let right = a.aabb(Vec2::new(10.0, 0.0));
        assert!(!left.intersects(&right));
        assert!(left.touches(&right));
    }

    #[test]
    fn overlap_and_penetration() {
        let a = BoxCollider::new(10.0, 10.0);
        let b = BoxCollider::new(4.0, 4.0).with_offset(Vec2::new(-2.0, -2.0));
        assert!(a.overlaps(Vec2::ZERO, &b, Vec2::new(9.0, 5.0)));
        let pen = a
            .aabb(Vec2::ZERO)
            .penetration(&b.aabb(Vec2::new(9.0, 5.0)))
            .unwrap();
        assert!((pen.x - 3.0).abs() < 1e-6);
        assert!((pen.y - 7.0).abs() < 1e-6);
    }

    #[test]
    fn point_containment_is_inclusive() {
        let c = BoxCollider::new(2.0, 2.0);
        assert!(c.contains_point(Vec2::ZERO, Vec2::new(2.0, 2.0)));
        assert!(!c.contains_point(Vec2::ZERO, Vec2::new(2.1, 0.0)));
    }
}
