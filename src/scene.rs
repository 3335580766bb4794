//! Scene graph: a node arena with parent/child transforms, renderables,
//! lights, fog and a geometry store.
//!
//! Nodes are addressed by generational [`NodeId`]s, so a handle to a removed
//! node never aliases a node created later. Only nodes reachable from the
//! root are drawn.

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::geometry::Geometry;

/// Handle to a node in a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Handle to a mesh in the scene's geometry store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub(crate) usize);

impl GeometryId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Local transform relative to the parent node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
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

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// How a mesh responds to scene lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shading {
    /// Lambert diffuse plus ambient.
    #[default]
    Lit,
    /// Flat colour, no lighting.
    Unlit,
    /// World-space normal as colour.
    Normal,
}

/// Surface appearance of a mesh. `color` multiplies the vertex colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Vec4,
    pub shading: Shading,
    /// Drawn before everything else without writing depth, and ignores fog.
    pub background: bool,
    /// Extra self-illumination added after lighting.
    pub emissive: f32,
}

impl Material {
    pub fn lit(color: Vec4) -> Self {
        Self {
            color,
            shading: Shading::Lit,
            background: false,
            emissive: 0.0,
        }
    }

    pub fn unlit(color: Vec4) -> Self {
        Self {
            shading: Shading::Unlit,
            ..Self::lit(color)
        }
    }

    pub fn normal() -> Self {
        Self {
            shading: Shading::Normal,
            ..Self::lit(Vec4::ONE)
        }
    }

    pub fn background() -> Self {
        Self {
            background: true,
            ..Self::unlit(Vec4::ONE)
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::lit(Vec4::ONE)
    }
}

/// A mesh instance referencing shared geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mesh {
    pub geometry: GeometryId,
    pub material: Material,
}

/// A cloud of camera-facing round sprites.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub positions: Vec<Vec3>,
    pub colors: Vec<Vec4>,
    /// Sprite diameter in world units, shrinking with distance.
    pub size: f32,
    pub additive: bool,
    pub opacity: f32,
    pub version: u64,
}

impl PointCloud {
    pub fn new(positions: Vec<Vec3>, colors: Vec<Vec4>, size: f32) -> Self {
        Self {
            positions,
            colors,
            size,
            additive: false,
            opacity: 1.0,
            version: 0,
        }
    }
}

/// A connected strip of line segments.
#[derive(Debug, Clone, Default)]
pub struct Polyline {
    pub points: Vec<Vec3>,
    pub color: Vec4,
}

#[derive(Debug, Clone)]
pub enum Renderable {
    Mesh(Mesh),
    Points(PointCloud),
    Line(Polyline),
}

/// Scene light. Directional lights shine *from* `direction` toward the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient {
        color: Vec3,
        intensity: f32,
    },
    Directional {
        direction: Vec3,
        color: Vec3,
        intensity: f32,
    },
    Point {
        position: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
    },
}

/// Maximum number of directional and point lights shaded per frame.
pub const MAX_LIGHTS: usize = 4;

/// Linear distance fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Vec3,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    transform: Transform,
    visible: bool,
    renderable: Option<Renderable>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// One drawable node with its resolved world matrix.
#[derive(Debug, Clone, Copy)]
pub struct RenderItem<'a> {
    pub node: NodeId,
    pub world: Mat4,
    pub renderable: &'a Renderable,
}

/// The scene root plus everything hanging off it.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    geometries: Vec<Geometry>,
    pub lights: Vec<Light>,
    pub fog: Option<Fog>,
    pub clear_color: Vec4,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root_node = Node {
            parent: None,
            children: Vec::new(),
            transform: Transform::IDENTITY,
            visible: true,
            renderable: None,
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root_node),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            geometries: Vec::new(),
            lights: Vec::new(),
            fog: None,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    // ========== Construction ==========

    /// Add an empty node under `parent` (the root if `parent` is stale).
    pub fn add(&mut self, parent: NodeId, transform: Transform) -> NodeId {
        self.insert(parent, transform, None)
    }

    pub fn add_mesh(&mut self, parent: NodeId, transform: Transform, mesh: Mesh) -> NodeId {
        self.insert(parent, transform, Some(Renderable::Mesh(mesh)))
    }

    pub fn add_points(&mut self, parent: NodeId, transform: Transform, points: PointCloud) -> NodeId {
        self.insert(parent, transform, Some(Renderable::Points(points)))
    }

    pub fn add_line(&mut self, parent: NodeId, line: Polyline) -> NodeId {
        self.insert(parent, Transform::IDENTITY, Some(Renderable::Line(line)))
    }

    fn insert(&mut self, parent: NodeId, transform: Transform, renderable: Option<Renderable>) -> NodeId {
        let parent = if self.contains(parent) { parent } else { self.root };
        let node = Node {
            parent: Some(parent),
            children: Vec::new(),
            transform,
            visible: true,
            renderable,
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: self.slots.len() as u32 - 1,
                    generation: 0,
                }
            }
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Remove a node and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        self.unlink(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let slot = &mut self.slots[next.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
            }
        }
        true
    }

    /// Remove every child of `id`, keeping `id` itself.
    pub fn clear_children(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.remove(child);
        }
    }

    fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
    }

    // ========== Hierarchy ==========

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Whether `ancestor` is `id` or one of its parents.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            if c == ancestor {
                return true;
            }
            cursor = self.parent(c);
        }
        false
    }

    /// Re-parent `child` under `new_parent`, keeping its world transform.
    ///
    /// The child's local transform becomes `inverse(parent_world) * world`.
    /// Returns `false` for stale handles, the root, or a parent inside the
    /// child's own subtree.
    pub fn attach(&mut self, child: NodeId, new_parent: NodeId) -> bool {
        if child == self.root
            || !self.contains(child)
            || !self.contains(new_parent)
            || self.is_ancestor(child, new_parent)
        {
            return false;
        }
        let world = self.world_matrix(child);
        let parent_world = self.world_matrix(new_parent);
        let local = Transform::from_matrix(parent_world.inverse() * world);

        self.unlink(child);
        if let Some(p) = self.node_mut(new_parent) {
            p.children.push(child);
        }
        if let Some(n) = self.node_mut(child) {
            n.parent = Some(new_parent);
            n.transform = local;
        }
        true
    }

    // ========== Transforms ==========

    pub fn transform(&self, id: NodeId) -> Option<&Transform> {
        self.node(id).map(|n| &n.transform)
    }

    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.node_mut(id).map(|n| &mut n.transform)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) {
        if let Some(n) = self.node_mut(id) {
            n.transform = transform;
        }
    }

    /// Accumulated matrix from the root down to `id`. Stale handles yield
    /// the identity.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            match self.node(c) {
                Some(n) => {
                    m = n.transform.matrix() * m;
                    cursor = n.parent;
                }
                None => break,
            }
        }
        m
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).w_axis.truncate()
    }

    // ========== Renderables ==========

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(n) = self.node_mut(id) {
            n.visible = visible;
        }
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.visible).unwrap_or(false)
    }

    pub fn renderable(&self, id: NodeId) -> Option<&Renderable> {
        self.node(id).and_then(|n| n.renderable.as_ref())
    }

    pub fn renderable_mut(&mut self, id: NodeId) -> Option<&mut Renderable> {
        self.node_mut(id).and_then(|n| n.renderable.as_mut())
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut Mesh> {
        match self.renderable_mut(id) {
            Some(Renderable::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn points_mut(&mut self, id: NodeId) -> Option<&mut PointCloud> {
        match self.renderable_mut(id) {
            Some(Renderable::Points(points)) => Some(points),
            _ => None,
        }
    }

    pub fn line_mut(&mut self, id: NodeId) -> Option<&mut Polyline> {
        match self.renderable_mut(id) {
            Some(Renderable::Line(line)) => Some(line),
            _ => None,
        }
    }

    /// Every visible renderable reachable from the root, in depth-first order.
    pub fn renderables(&self) -> Vec<RenderItem<'_>> {
        let mut items = Vec::new();
        let mut stack = vec![(self.root, Mat4::IDENTITY)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform.matrix();
            if let Some(renderable) = &node.renderable {
                items.push(RenderItem {
                    node: id,
                    world,
                    renderable,
                });
            }
            stack.extend(node.children.iter().rev().map(|c| (*c, world)));
        }
        items
    }

    // ========== Geometry store ==========

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        self.geometries.push(geometry);
        GeometryId(self.geometries.len() - 1)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id.0)
    }

    /// Mutable access; marks the geometry as changed.
    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        let g = self.geometries.get_mut(id.0)?;
        g.version = g.version.wrapping_add(1);
        Some(g)
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    // ========== Lights ==========

    /// Add a light and return its index in [`SceneGraph::lights`].
    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut scene = SceneGraph::new();
        let parent = scene.add(scene.root(), Transform::from_translation(Vec3::X));
        let child = scene.add(parent, Transform::from_translation(Vec3::Y));
        assert!(approx(scene.world_position(child), Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_attach_preserves_world_transform() {
        let mut scene = SceneGraph::new();
        let pivot = scene.add(
            scene.root(),
            Transform::from_translation(Vec3::new(2.0, 0.0, 0.0))
                .with_rotation(Quat::from_rotation_y(FRAC_PI_2)),
        );
        let cube = scene.add(scene.root(), Transform::from_translation(Vec3::new(1.0, 2.0, 3.0)));

        let before = scene.world_matrix(cube);
        assert!(scene.attach(cube, pivot));
        assert_eq!(scene.parent(cube), Some(pivot));
        let after = scene.world_matrix(cube);
        assert!(before.abs_diff_eq(after, 1e-5));

        // rotating the pivot now carries the cube along
        scene.transform_mut(pivot).unwrap().rotation = Quat::IDENTITY;
        assert!(!before.abs_diff_eq(scene.world_matrix(cube), 1e-3));

        let moved = scene.world_matrix(cube);
        assert!(scene.attach(cube, scene.root()));
        assert!(moved.abs_diff_eq(scene.world_matrix(cube), 1e-5));
        assert!(scene.children(pivot).is_empty());
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let mut scene = SceneGraph::new();
        let a = scene.add(scene.root(), Transform::IDENTITY);
        let b = scene.add(a, Transform::IDENTITY);
        assert!(!scene.attach(a, b));
        assert!(!scene.attach(scene.root(), a));
    }

    #[test]
    fn test_remove_invalidates_handles() {
        let mut scene = SceneGraph::new();
        let a = scene.add(scene.root(), Transform::IDENTITY);
        let b = scene.add(a, Transform::IDENTITY);
        assert!(scene.remove(a));
        assert!(!scene.contains(a));
        assert!(!scene.contains(b));

        let c = scene.add(scene.root(), Transform::IDENTITY);
        assert_ne!(c, a);
        assert!(scene.contains(c));
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn test_renderables_skip_hidden_subtrees() {
        let mut scene = SceneGraph::new();
        let geometry = scene.add_geometry(Geometry::cuboid(1.0, 1.0, 1.0));
        let mesh = Mesh {
            geometry,
            material: Material::default(),
        };
        let group = scene.add(scene.root(), Transform::IDENTITY);
        scene.add_mesh(group, Transform::IDENTITY, mesh);
        scene.add_mesh(scene.root(), Transform::IDENTITY, mesh);
        assert_eq!(scene.renderables().len(), 2);

        scene.set_visible(group, false);
        assert_eq!(scene.renderables().len(), 1);
    }

    #[test]
    fn test_geometry_mut_bumps_version() {
        let mut scene = SceneGraph::new();
        let id = scene.add_geometry(Geometry::plane(1.0, 1.0, 1, 1));
        let before = scene.geometry(id).unwrap().version;
        scene.geometry_mut(id).unwrap().vertices[0].position[2] = 1.0;
        assert_eq!(scene.geometry(id).unwrap().version, before + 1);
    }
}
