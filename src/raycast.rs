//! Ray picking against planes, boxes and scene meshes.
//!
//! Rays come from [`PerspectiveCamera::ray_from_ndc`] fed with the normalized
//! pointer from [`Input::pointer`](crate::input::Input::pointer); that pair is
//! the only input to any picking in vislab.

use glam::{Vec2, Vec3};

use crate::camera::PerspectiveCamera;
use crate::scene::{NodeId, Renderable, SceneGraph};

/// A half-line `origin + t * direction`, `t >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance to the plane through `point` with normal `normal`.
    pub fn intersect_plane(&self, point: Vec3, normal: Vec3) -> Option<f32> {
        let denom = normal.dot(self.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = (point - self.origin).dot(normal) / denom;
        (t >= 0.0).then_some(t)
    }

    /// Slab test against an axis-aligned box. Returns the entry distance, or
    /// 0 when the origin is inside the box.
    pub fn intersect_aabb(&self, min: Vec3, max: Vec3) -> Option<f32> {
        let inv = self.direction.recip();
        let t0 = (min - self.origin) * inv;
        let t1 = (max - self.origin) * inv;
        let t_near = t0.min(t1).max_element();
        let t_far = t0.max(t1).min_element();
        if t_near.is_nan() || t_far.is_nan() || t_far < t_near.max(0.0) {
            return None;
        }
        Some(t_near.max(0.0))
    }
}

/// Closest mesh hit found by [`SceneGraph::raycast`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
}

impl SceneGraph {
    /// Nearest visible, non-background mesh whose local bounds the ray hits.
    pub fn raycast(&self, ray: &Ray) -> Option<Hit> {
        self.raycast_filtered(ray, |_| true)
    }

    /// Like [`raycast`](Self::raycast), restricted to nodes accepted by `filter`.
    pub fn raycast_filtered(&self, ray: &Ray, filter: impl Fn(NodeId) -> bool) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        for item in self.renderables() {
            let Renderable::Mesh(mesh) = item.renderable else {
                continue;
            };
            if mesh.material.background || !filter(item.node) {
                continue;
            }
            let Some(geometry) = self.geometry(mesh.geometry) else {
                continue;
            };
            let inverse = item.world.inverse();
            let local_origin = inverse.transform_point3(ray.origin);
            let local_dir = inverse.transform_vector3(ray.direction);
            let local_ray = Ray {
                origin: local_origin,
                direction: local_dir,
            };
            let (min, max) = geometry.bounds();
            // local_dir is unnormalized, so t is in world units already
            if let Some(t) = local_ray.intersect_aabb(min, max) {
                if best.map_or(true, |b| t < b.distance) {
                    best = Some(Hit {
                        node: item.node,
                        distance: t,
                        point: ray.at(t),
                    });
                }
            }
        }
        best
    }
}

/// Project the pointer onto the plane through `point` with `normal`.
///
/// The gravity and floating experiments use this with the `z = 0` plane;
/// the domino run uses the floor.
pub fn pointer_on_plane(
    camera: &PerspectiveCamera,
    pointer: Vec2,
    point: Vec3,
    normal: Vec3,
) -> Option<Vec3> {
    let ray = camera.ray_from_ndc(pointer);
    ray.intersect_plane(point, normal).map(|t| ray.at(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use crate::scene::{Material, Mesh, Transform};

    #[test]
    fn test_plane_hit_and_miss() {
        let ray = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y);
        assert_eq!(ray.intersect_plane(Vec3::ZERO, Vec3::Y), Some(5.0));

        let away = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::Y);
        assert_eq!(away.intersect_plane(Vec3::ZERO, Vec3::Y), None);

        let parallel = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::X);
        assert_eq!(parallel.intersect_plane(Vec3::ZERO, Vec3::Y), None);
    }

    #[test]
    fn test_aabb_hit() {
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let t = ray.intersect_aabb(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(t, Some(4.0));

        let miss = Ray::new(Vec3::new(-5.0, 3.0, 0.0), Vec3::X);
        assert_eq!(miss.intersect_aabb(Vec3::splat(-1.0), Vec3::splat(1.0)), None);
    }

    #[test]
    fn test_scene_raycast_picks_nearest() {
        let mut scene = SceneGraph::new();
        let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
        let mesh = Mesh {
            geometry,
            material: Material::default(),
        };
        let root = scene.root();
        let far = scene.add_mesh(root, Transform::from_translation(Vec3::new(0.0, 0.0, -10.0)), mesh);
        let near = scene.add_mesh(root, Transform::from_translation(Vec3::new(0.0, 0.0, -4.0)), mesh);

        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let hit = scene.raycast(&ray).unwrap();
        assert_eq!(hit.node, near);
        assert!((hit.distance - 3.5).abs() < 1e-5);

        let hit = scene.raycast_filtered(&ray, |n| n == far).unwrap();
        assert!((hit.distance - 9.5).abs() < 1e-5);
    }

    #[test]
    fn test_scaled_mesh_distance_is_world_space() {
        let mut scene = SceneGraph::new();
        let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
        let root = scene.root();
        scene.add_mesh(
            root,
            Transform::from_translation(Vec3::new(0.0, 0.0, -10.0)).with_scale(Vec3::splat(4.0)),
            Mesh {
                geometry,
                material: Material::default(),
            },
        );
        let hit = scene.raycast(&Ray::new(Vec3::ZERO, Vec3::NEG_Z)).unwrap();
        assert!((hit.distance - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_pointer_center_hits_target_plane() {
        let mut camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0);
        camera.position = Vec3::new(0.0, 0.0, 8.0);
        camera.target = Vec3::ZERO;
        let p = pointer_on_plane(&camera, Vec2::ZERO, Vec3::ZERO, Vec3::Z).unwrap();
        assert!(p.length() < 1e-4);
    }
}
