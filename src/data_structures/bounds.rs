//! Bounding volumes used to frame the camera on freshly loaded scenes.

use cgmath::{EuclideanSpace, InnerSpace, Point3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

impl BoundingSphere {
    /// The sphere reported for scenes without geometry.
    pub fn unit() -> Self {
        Self {
            center: Point3::origin(),
            radius: 1.0,
        }
    }

    pub fn contains(&self, point: Point3<f32>, tolerance: f32) -> bool {
        (point - self.center).magnitude() <= self.radius + tolerance
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::unit()
    }
}

/// Axis-aligned box accumulated point by point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn from_point(p: Point3<f32>) -> Self {
        Self { min: p, max: p }
    }

    pub fn grow(&mut self, p: Point3<f32>) {
        self.min = Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn center(&self) -> Point3<f32> {
        self.min.midpoint(self.max)
    }
}

/// Sphere around a set of points: centred on their box, reaching the farthest point.
///
/// Takes a cloneable iterator because the points are walked twice.
pub fn bounding_sphere<I>(points: I) -> BoundingSphere
where
    I: Iterator<Item = Point3<f32>> + Clone,
{
    let mut points_for_box = points.clone().filter(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite());
    let Some(first) = points_for_box.next() else {
        return BoundingSphere::unit();
    };
    let mut aabb = Aabb::from_point(first);
    points_for_box.for_each(|p| aabb.grow(p));
    let center = aabb.center();
    let radius = points
        .filter(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite())
        .map(|p| (p - center).magnitude())
        .fold(0.0_f32, f32::max);
    BoundingSphere { center, radius }
}
