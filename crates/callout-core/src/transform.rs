//! Local transforms, bounding boxes and rotation helpers

use glam::{Affine3A, Mat3, Quat, Vec3};

/// Translation, rotation and (possibly non-uniform) scale relative to a parent node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Rotate so the -Z axis points from the translation towards `target`
    pub fn looking_at(mut self, target: Vec3, up: Vec3) -> Self {
        self.rotation = look_rotation(target - self.translation, up);
        self
    }

    /// Affine matrix equivalent (scale, then rotate, then translate)
    pub fn compute_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decompose an affine matrix. Shear cannot be represented and is dropped.
    pub fn from_affine(affine: &Affine3A) -> Self {
        let (scale, rotation, translation) = affine.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Interpolate towards `to`: translation and scale linearly, rotation by slerp
    pub fn lerp(&self, to: &Transform, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            translation: self.translation.lerp(to.translation, t),
            rotation: self.rotation.slerp(to.rotation, t),
            scale: self.scale.lerp(to.scale, t),
        }
    }
}

/// Rotation whose -Z axis points along `direction`.
///
/// When `direction` is parallel to `up` another up axis is chosen, so the
/// result is always a valid rotation. A zero direction yields identity.
pub fn look_rotation(direction: Vec3, up: Vec3) -> Quat {
    let Some(forward) = direction.try_normalize() else {
        return Quat::IDENTITY;
    };
    let back = -forward;
    let right = up
        .cross(back)
        .try_normalize()
        .or_else(|| Vec3::Z.cross(back).try_normalize())
        .or_else(|| Vec3::Y.cross(back).try_normalize())
        .unwrap_or(Vec3::X);
    let up = back.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, back))
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half_extents = half_extents.abs();
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Smallest box containing all points, or `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after applying `matrix` to all eight corners
    pub fn transformed(&self, matrix: &Affine3A) -> Aabb {
        let corners = self.corners().map(|c| matrix.transform_point3(c));
        // Eight corners, never empty
        Aabb::from_points(corners).unwrap_or(*self)
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Slab test. Returns the entry distance along the ray when it hits.
    pub fn ray_intersection(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < f32::EPSILON {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let t0 = (self.min[axis] - o) * inv;
            let t1 = (self.max[axis] - o) * inv;
            t_min = t_min.max(t0.min(t1));
            t_max = t_max.min(t0.max(t1));
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn test_affine_round_trip() {
        let t = Transform::from_xyz(1.0, 2.0, 3.0)
            .with_rotation(Quat::from_rotation_y(0.7))
            .with_scale(Vec3::new(2.0, 1.0, 0.5));
        let back = Transform::from_affine(&t.compute_affine());
        assert!(approx(back.translation, t.translation));
        assert!(approx(back.scale, t.scale));
        assert!(back.rotation.abs_diff_eq(t.rotation, 1e-5));
    }

    #[test]
    fn test_look_rotation_points_forward() {
        let dir = Vec3::new(1.0, 0.0, 1.0).normalize();
        let rot = look_rotation(dir, Vec3::Y);
        assert!(approx(rot * Vec3::NEG_Z, dir));
    }

    #[test]
    fn test_look_rotation_parallel_to_up() {
        let rot = look_rotation(Vec3::Y * 3.0, Vec3::Y);
        assert!(rot.is_finite());
        assert!(rot.is_normalized());
        assert!(approx(rot * Vec3::NEG_Z, Vec3::Y));

        let rot = look_rotation(Vec3::NEG_Y, Vec3::Y);
        assert!(approx(rot * Vec3::NEG_Z, Vec3::NEG_Y));
    }

    #[test]
    fn test_looking_at_target() {
        let t = Transform::from_xyz(0.0, 1.0, 0.0).looking_at(Vec3::new(0.0, 1.0, -3.0), Vec3::Y);
        assert!(approx(t.rotation * Vec3::NEG_Z, Vec3::NEG_Z));
        assert_eq!(t.translation, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_look_rotation_zero_direction() {
        assert_eq!(look_rotation(Vec3::ZERO, Vec3::Y), Quat::IDENTITY);
    }

    #[test]
    fn test_aabb_transformed_by_rotation() {
        let b = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(2.0, 1.0, 0.5));
        let m = Affine3A::from_rotation_z(FRAC_PI_2);
        let rotated = b.transformed(&m);
        assert!(approx(rotated.half_extents(), Vec3::new(1.0, 2.0, 0.5)));
    }

    #[test]
    fn test_aabb_union_and_size() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        let u = a.union(&b);
        assert_eq!(u.size(), Vec3::splat(3.0));
        assert_eq!(u.center(), Vec3::splat(1.5));
        assert!(u.contains(Vec3::splat(2.5)));
        assert!(!a.contains(Vec3::splat(2.5)));
    }

    #[test]
    fn test_ray_intersection() {
        let b = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -5.0), Vec3::ONE);
        let hit = b.ray_intersection(Vec3::ZERO, Vec3::NEG_Z).unwrap();
        assert!((hit - 4.0).abs() < 1e-5);
        assert!(b.ray_intersection(Vec3::ZERO, Vec3::Z).is_none());
        assert!(b.ray_intersection(Vec3::new(3.0, 0.0, 0.0), Vec3::NEG_Z).is_none());
    }

    #[test]
    fn test_lerp_endpoints() {
        let a = Transform::IDENTITY;
        let b = Transform::from_xyz(1.0, 0.0, 0.0).with_rotation(Quat::from_rotation_y(-FRAC_PI_2));
        assert_eq!(a.lerp(&b, 0.0).translation, Vec3::ZERO);
        let end = a.lerp(&b, 1.0);
        assert!(approx(end.translation, b.translation));
        assert!(end.rotation.abs_diff_eq(b.rotation, 1e-5));
    }
}
