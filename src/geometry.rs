//! CPU-side mesh builders.
//!
//! Every builder returns an indexed triangle list of [`Vertex`] with
//! counter-clockwise front faces, ready for upload by the renderer.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use std::f32::consts::{PI, TAU};

/// Vertex layout shared by every mesh pipeline.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color: color.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x4];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// An indexed triangle mesh.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Bumped whenever the vertex data changes, so GPU copies can be refreshed.
    pub version: u64,
}

/// Convert a `0xRRGGBB` colour to linear RGBA.
pub fn hex(rgb: u32) -> Vec4 {
    let srgb = |c: u32| {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec4::new(
        srgb((rgb >> 16) & 0xff),
        srgb((rgb >> 8) & 0xff),
        srgb(rgb & 0xff),
        1.0,
    )
}

impl Geometry {
    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3, color: Vec4) {
        let base = self.vertices.len() as u32;
        for corner in corners {
            self.vertices.push(Vertex::new(corner, normal, color));
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Box with one colour per face, ordered +X, -X, +Y, -Y, +Z, -Z.
    pub fn colored_cuboid(size: Vec3, face_colors: [Vec4; 6]) -> Self {
        let h = size * 0.5;
        let mut g = Geometry::default();
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        for ((normal, right, up), color) in faces.into_iter().zip(face_colors) {
            let center = normal * h;
            let r = right * h;
            let u = up * h;
            g.push_quad(
                [center - r - u, center + r - u, center + r + u, center - r + u],
                normal,
                color,
            );
        }
        g
    }

    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Self::colored_cuboid(Vec3::new(width, height, depth), [Vec4::ONE; 6])
    }

    /// Flat-shaded regular octahedron.
    pub fn octahedron(radius: f32) -> Self {
        let p = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ]
        .map(|v| v * radius);
        let faces = [
            [0, 2, 4],
            [0, 4, 3],
            [0, 3, 5],
            [0, 5, 2],
            [1, 2, 5],
            [1, 5, 3],
            [1, 3, 4],
            [1, 4, 2],
        ];
        let mut g = Geometry::default();
        for f in faces {
            g.push_triangle(p[f[0]], p[f[1]], p[f[2]], Vec4::ONE);
        }
        g
    }

    fn push_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, color: Vec4) {
        let normal = (b - a).cross(c - a).normalize_or_zero();
        let base = self.vertices.len() as u32;
        for p in [a, b, c] {
            self.vertices.push(Vertex::new(p, normal, color));
        }
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    /// Smooth sphere built by subdividing an icosahedron.
    pub fn icosphere(radius: f32, subdivisions: u32) -> Self {
        let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
        let mut points: Vec<Vec3> = [
            (-1.0, t, 0.0),
            (1.0, t, 0.0),
            (-1.0, -t, 0.0),
            (1.0, -t, 0.0),
            (0.0, -1.0, t),
            (0.0, 1.0, t),
            (0.0, -1.0, -t),
            (0.0, 1.0, -t),
            (t, 0.0, -1.0),
            (t, 0.0, 1.0),
            (-t, 0.0, -1.0),
            (-t, 0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
        .collect();
        let mut faces: Vec<[u32; 3]> = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoints = std::collections::HashMap::new();
            let mut midpoint = |a: u32, b: u32, points: &mut Vec<Vec3>| -> u32 {
                let key = (a.min(b), a.max(b));
                *midpoints.entry(key).or_insert_with(|| {
                    let m = ((points[a as usize] + points[b as usize]) * 0.5).normalize();
                    points.push(m);
                    points.len() as u32 - 1
                })
            };
            let mut next = Vec::with_capacity(faces.len() * 4);
            for [a, b, c] in faces {
                let ab = midpoint(a, b, &mut points);
                let bc = midpoint(b, c, &mut points);
                let ca = midpoint(c, a, &mut points);
                next.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
            }
            faces = next;
        }

        Geometry {
            vertices: points
                .iter()
                .map(|&n| Vertex::new(n * radius, n, Vec4::ONE))
                .collect(),
            indices: faces.into_iter().flatten().collect(),
            version: 0,
        }
    }

    /// Flat-shaded icosahedron.
    pub fn icosahedron(radius: f32) -> Self {
        Self::icosphere(radius, 0).flat()
    }

    /// Latitude/longitude sphere.
    pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let ws = width_segments.max(3);
        let hs = height_segments.max(2);
        let mut g = Geometry::default();
        for y in 0..=hs {
            let v = y as f32 / hs as f32;
            let phi = v * PI;
            for x in 0..=ws {
                let u = x as f32 / ws as f32;
                let theta = u * TAU;
                let n = Vec3::new(-theta.cos() * phi.sin(), phi.cos(), theta.sin() * phi.sin());
                g.vertices.push(Vertex::new(n * radius, n, Vec4::ONE));
            }
        }
        let row = ws + 1;
        for y in 0..hs {
            for x in 0..ws {
                let a = y * row + x;
                let b = a + row;
                if y != 0 {
                    g.indices.extend_from_slice(&[a, b, a + 1]);
                }
                if y != hs - 1 {
                    g.indices.extend_from_slice(&[a + 1, b, b + 1]);
                }
            }
        }
        g
    }

    /// Capped cylinder centred on the origin, axis along +Y.
    pub fn cylinder(radius: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let half = height * 0.5;
        let mut g = Geometry::default();
        for i in 0..=segments {
            let theta = i as f32 / segments as f32 * TAU;
            let n = Vec3::new(theta.sin(), 0.0, theta.cos());
            g.vertices
                .push(Vertex::new(n * radius + Vec3::Y * half, n, Vec4::ONE));
            g.vertices
                .push(Vertex::new(n * radius - Vec3::Y * half, n, Vec4::ONE));
        }
        for i in 0..segments {
            let a = i * 2;
            g.indices
                .extend_from_slice(&[a, a + 1, a + 3, a, a + 3, a + 2]);
        }
        for (y, normal) in [(half, Vec3::Y), (-half, Vec3::NEG_Y)] {
            let center = g.vertices.len() as u32;
            g.vertices
                .push(Vertex::new(Vec3::Y * y, normal, Vec4::ONE));
            for i in 0..=segments {
                let theta = i as f32 / segments as f32 * TAU;
                let p = Vec3::new(theta.sin() * radius, y, theta.cos() * radius);
                g.vertices.push(Vertex::new(p, normal, Vec4::ONE));
            }
            for i in 0..segments {
                let a = center + 1 + i;
                if normal.y > 0.0 {
                    g.indices.extend_from_slice(&[center, a, a + 1]);
                } else {
                    g.indices.extend_from_slice(&[center, a + 1, a]);
                }
            }
        }
        g
    }

    /// Torus in the XY plane.
    pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Self {
        let rs = radial_segments.max(3);
        let ts = tubular_segments.max(3);
        let mut g = Geometry::default();
        for j in 0..=rs {
            let v = j as f32 / rs as f32 * TAU;
            for i in 0..=ts {
                let u = i as f32 / ts as f32 * TAU;
                let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
                let p = Vec3::new(
                    (radius + tube * v.cos()) * u.cos(),
                    (radius + tube * v.cos()) * u.sin(),
                    tube * v.sin(),
                );
                g.vertices
                    .push(Vertex::new(p, (p - center).normalize_or_zero(), Vec4::ONE));
            }
        }
        let row = ts + 1;
        for j in 1..=rs {
            for i in 1..=ts {
                let a = row * j + i - 1;
                let b = row * (j - 1) + i - 1;
                let c = row * (j - 1) + i;
                let d = row * j + i;
                g.indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }
        g
    }

    /// Grid in the XY plane facing +Z, `(segments_x + 1) * (segments_y + 1)`
    /// vertices laid out row by row from the top edge.
    pub fn plane(width: f32, height: f32, segments_x: u32, segments_y: u32) -> Self {
        let sx = segments_x.max(1);
        let sy = segments_y.max(1);
        let mut g = Geometry::default();
        g.vertices.reserve(((sx + 1) * (sy + 1)) as usize);
        for iy in 0..=sy {
            let y = height * 0.5 - iy as f32 / sy as f32 * height;
            for ix in 0..=sx {
                let x = ix as f32 / sx as f32 * width - width * 0.5;
                g.vertices
                    .push(Vertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec4::ONE));
            }
        }
        let row = sx + 1;
        g.indices.reserve((sx * sy * 6) as usize);
        for iy in 0..sy {
            for ix in 0..sx {
                let a = iy * row + ix;
                let b = a + row;
                g.indices
                    .extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
            }
        }
        g
    }

    /// Inward-facing sphere coloured by a vertical gradient.
    ///
    /// `stops` are `(offset, colour)` pairs with offsets in `[0, 1]` from the
    /// bottom of the dome to the top.
    pub fn gradient_dome(radius: f32, stops: &[(f32, Vec4)]) -> Self {
        let mut g = Self::icosphere(radius, 3);
        for v in &mut g.vertices {
            let t = (v.position[1] / radius + 1.0) * 0.5;
            v.color = sample_gradient(stops, t).to_array();
            v.normal = (-Vec3::from_array(v.normal)).to_array();
        }
        for tri in g.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
        g
    }

    /// Paint every vertex with one colour.
    pub fn with_color(mut self, color: Vec4) -> Self {
        for v in &mut self.vertices {
            v.color = color.to_array();
        }
        self
    }

    /// Un-index the mesh and assign per-face normals.
    pub fn flat(&self) -> Self {
        let mut g = Geometry::default();
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| self.vertices[i as usize]);
            let color = Vec4::from_array(a.color);
            g.push_triangle(a.position(), b.position(), c.position(), color);
        }
        g
    }

    /// Local axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        if self.vertices.is_empty() {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        self.vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), v| (min.min(v.position()), max.max(v.position())),
        )
    }

    /// Recompute smooth vertex normals from triangle faces.
    pub fn recompute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
            let pa = self.vertices[a].position();
            let face = (self.vertices[b].position() - pa).cross(self.vertices[c].position() - pa);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        for (v, n) in self.vertices.iter_mut().zip(normals) {
            v.normal = n.normalize_or_zero().to_array();
        }
    }
}

/// Piecewise-linear colour ramp lookup.
pub fn sample_gradient(stops: &[(f32, Vec4)], t: f32) -> Vec4 {
    match stops {
        [] => Vec4::ONE,
        [(_, only)] => *only,
        _ => {
            if t <= stops[0].0 {
                return stops[0].1;
            }
            for pair in stops.windows(2) {
                let (o0, c0) = pair[0];
                let (o1, c1) = pair[1];
                if t <= o1 {
                    let span = (o1 - o0).max(f32::EPSILON);
                    return c0.lerp(c1, (t - o0) / span);
                }
            }
            stops[stops.len() - 1].1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(g: &Geometry) {
        assert!(!g.vertices.is_empty());
        assert_eq!(g.indices.len() % 3, 0);
        assert!(g.indices.iter().all(|&i| (i as usize) < g.vertices.len()));
    }

    #[test]
    fn test_cuboid_bounds() {
        let g = Geometry::cuboid(1.2, 2.0, 0.5);
        assert_valid(&g);
        assert_eq!(g.vertices.len(), 24);
        let (min, max) = g.bounds();
        assert!((max - Vec3::new(0.6, 1.0, 0.25)).length() < 1e-6);
        assert!((min + Vec3::new(0.6, 1.0, 0.25)).length() < 1e-6);
    }

    #[test]
    fn test_cuboid_faces_wind_outward() {
        let g = Geometry::cuboid(1.0, 1.0, 1.0);
        for tri in g.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| g.vertices[i as usize]);
            let face = (b.position() - a.position()).cross(c.position() - a.position());
            assert!(face.dot(Vec3::from_array(a.normal)) > 0.0);
        }
    }

    #[test]
    fn test_all_builders_are_well_formed() {
        for g in [
            Geometry::octahedron(0.5),
            Geometry::icosphere(1.0, 2),
            Geometry::icosahedron(1.0),
            Geometry::uv_sphere(1.0, 8, 6),
            Geometry::cylinder(0.5, 1.0, 12),
            Geometry::torus(1.0, 0.3, 8, 16),
            Geometry::plane(4.0, 4.0, 4, 4),
        ] {
            assert_valid(&g);
        }
    }

    #[test]
    fn test_icosphere_vertices_lie_on_sphere() {
        let g = Geometry::icosphere(2.0, 2);
        assert!(g.vertices.iter().all(|v| (v.position().length() - 2.0).abs() < 1e-4));
    }

    #[test]
    fn test_plane_grid_size() {
        let g = Geometry::plane(10.0, 10.0, 4, 2);
        assert_eq!(g.vertices.len(), 5 * 3);
        assert_eq!(g.indices.len(), 4 * 2 * 6);
        assert_eq!(g.vertices[0].position, [-5.0, 5.0, 0.0]);
    }

    #[test]
    fn test_gradient_sampling() {
        let stops = [(0.0, Vec4::ZERO), (1.0, Vec4::ONE)];
        assert_eq!(sample_gradient(&stops, -1.0), Vec4::ZERO);
        assert!((sample_gradient(&stops, 0.5) - Vec4::splat(0.5)).length() < 1e-6);
        assert_eq!(sample_gradient(&stops, 2.0), Vec4::ONE);
    }

    #[test]
    fn test_hex_white_and_black() {
        assert_eq!(hex(0xffffff), Vec4::ONE);
        assert_eq!(hex(0x000000), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }
}
