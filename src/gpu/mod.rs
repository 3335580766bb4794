//! GPU side of the renderer.
//!
//! [`Renderer`] owns the wgpu surface, device and queue. Each frame it
//! rasterizes the [`SceneGraph`](crate::scene::SceneGraph) of a
//! [`RenderContext`] into an HDR target, then hands off to the
//! [`Compositor`](post_process::Compositor) for the post chain and tone
//! mapping. Geometry is uploaded lazily and re-uploaded when its version
//! changes; mesh nodes are drawn instanced, batched by geometry.

#[cfg(feature = "egui")]
mod egui_integration;
mod post_process;
pub mod shaders;

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;
use winit::window::Window;

#[cfg(feature = "egui")]
pub use egui_integration::{EguiFrameOutput, EguiIntegration};
pub use post_process::{bloom_factor, Compositor};

use crate::config::ExperimentConfig;
use crate::error::GpuError;
use crate::experiment::RenderContext;
use crate::geometry::Vertex;
use crate::scene::{GeometryId, Light, Material, NodeId, PointCloud, Renderable, Shading, MAX_LIGHTS};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuLight {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

/// Group 0 uniforms for every scene shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub ambient: [f32; 4],
    pub fog_color: [f32; 4],
    /// near, far, elapsed, light count
    pub fog_range: [f32; 4],
    pub lights: [GpuLight; MAX_LIGHTS],
}

impl FrameUniforms {
    /// Pack camera, lights and fog. Ambient lights are summed; the first
    /// [`MAX_LIGHTS`] directional/point lights are kept, the rest dropped.
    pub fn from_context(ctx: &RenderContext) -> Self {
        let camera = &ctx.camera;
        let view = camera.view_matrix();
        let proj = camera.projection_matrix();

        let mut ambient = Vec3::ZERO;
        let mut lights = [GpuLight::zeroed(); MAX_LIGHTS];
        let mut count = 0;
        for light in &ctx.scene.lights {
            let packed = match *light {
                Light::Ambient { color, intensity } => {
                    ambient += color * intensity;
                    None
                }
                Light::Directional {
                    direction,
                    color,
                    intensity,
                } => Some(GpuLight {
                    position: direction.normalize_or_zero().extend(0.0).to_array(),
                    color: (color * intensity).extend(0.0).to_array(),
                }),
                Light::Point {
                    position,
                    color,
                    intensity,
                    range,
                } => Some(GpuLight {
                    position: position.extend(1.0).to_array(),
                    color: (color * intensity).extend(range).to_array(),
                }),
            };
            if let Some(packed) = packed {
                if count < MAX_LIGHTS {
                    lights[count] = packed;
                    count += 1;
                } else {
                    log::debug!("Light limit reached, ignoring extra light");
                }
            }
        }

        let (fog_color, fog_near, fog_far) = match ctx.scene.fog {
            Some(fog) => (fog.color.extend(1.0), fog.near, fog.far),
            None => (Vec4::ZERO, 0.0, 0.0),
        };

        Self {
            view_proj: (proj * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
            ambient: ambient.extend(1.0).to_array(),
            fog_color: fog_color.to_array(),
            fog_range: [fog_near, fog_far, ctx.clock.elapsed(), count as f32],
            lights,
        }
    }
}

/// Per-instance data for mesh pipelines.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshInstance {
    pub model: [[f32; 4]; 4],
    pub tint: [f32; 4],
    /// shading, emissive, background, unused
    pub params: [f32; 4],
}

impl MeshInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
    ];

    pub fn new(world: Mat4, material: &Material) -> Self {
        let shading = match material.shading {
            Shading::Lit => 0.0,
            Shading::Unlit => 1.0,
            Shading::Normal => 2.0,
        };
        Self {
            model: world.to_cols_array_2d(),
            tint: material.color.to_array(),
            params: [shading, material.emissive, material.background as u32 as f32, 0.0],
        }
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PointInstance {
    position: [f32; 4],
    color: [f32; 4],
}

impl PointInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CloudUniforms {
    model: [[f32; 4]; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct LineVertex {
    position: [f32; 3],
    color: [f32; 4],
}

impl LineVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Draw order of mesh batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MeshPass {
    Background,
    Opaque,
    Transparent,
}

impl MeshPass {
    pub fn of(material: &Material) -> Self {
        if material.background {
            MeshPass::Background
        } else if material.color.w < 1.0 {
            MeshPass::Transparent
        } else {
            MeshPass::Opaque
        }
    }
}

/// A run of instances sharing pass and geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub pass: MeshPass,
    pub geometry: GeometryId,
    pub instances: Range<u32>,
}

/// Sort mesh instances into contiguous batches.
pub fn build_batches(mut items: Vec<(MeshPass, GeometryId, MeshInstance)>) -> (Vec<MeshInstance>, Vec<Batch>) {
    items.sort_by_key(|(pass, geometry, _)| (*pass, *geometry));
    let mut instances = Vec::with_capacity(items.len());
    let mut batches: Vec<Batch> = Vec::new();
    for (pass, geometry, instance) in items {
        let index = instances.len() as u32;
        instances.push(instance);
        match batches.last_mut() {
            Some(b) if b.pass == pass && b.geometry == geometry => b.instances.end = index + 1,
            _ => batches.push(Batch {
                pass,
                geometry,
                instances: index..index + 1,
            }),
        }
    }
    (instances, batches)
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    version: u64,
}

struct GpuCloud {
    instances: wgpu::Buffer,
    capacity: usize,
    count: u32,
    version: u64,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    additive: bool,
}

struct Pipelines {
    background: wgpu::RenderPipeline,
    opaque: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
    points_alpha: wgpu::RenderPipeline,
    points_additive: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
}

struct PipelineOptions<'a> {
    label: &'a str,
    topology: wgpu::PrimitiveTopology,
    blend: Option<wgpu::BlendState>,
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
}

fn scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    buffers: &[wgpu::VertexBufferLayout],
    options: PipelineOptions,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(options.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: HDR_FORMAT,
                blend: options.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: options.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: options.depth_write,
            depth_compare: options.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    scene_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    cloud_layout: wgpu::BindGroupLayout,
    pipelines: Pipelines,
    meshes: Vec<Option<GpuMesh>>,
    clouds: HashMap<NodeId, GpuCloud>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    line_buffer: wgpu::Buffer,
    line_capacity: usize,
    compositor: Compositor,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, config: &ExperimentConfig, plan: &crate::post::PassPlan) -> Result<Self, GpuError> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::UnsupportedSurface)?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let (scene_view, depth_view) = create_scene_targets(&device, width, height);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });
        let cloud_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Point Cloud Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipelines = create_pipelines(&device, &frame_layout, &cloud_layout);

        let instance_capacity = 256;
        let instance_buffer = create_vertex_buffer(&device, "Mesh Instances", instance_capacity * std::mem::size_of::<MeshInstance>());
        let line_capacity = 256;
        let line_buffer = create_vertex_buffer(&device, "Line Vertices", line_capacity * std::mem::size_of::<LineVertex>());

        let compositor = Compositor::new(&device, plan, surface_format, width, height);

        log::info!(
            "Renderer ready for '{}': {}x{} {:?}",
            config.title,
            width,
            height,
            surface_format
        );

        Ok(Self {
            surface,
            device,
            queue,
            config: surface_config,
            scene_view,
            depth_view,
            frame_buffer,
            frame_bind_group,
            cloud_layout,
            pipelines,
            meshes: Vec::new(),
            clouds: HashMap::new(),
            instance_buffer,
            instance_capacity,
            line_buffer,
            line_capacity,
            compositor,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Reconfigure the surface and every size-dependent target.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if new_size.width == self.config.width && new_size.height == self.config.height {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        let (scene_view, depth_view) = create_scene_targets(&self.device, new_size.width, new_size.height);
        self.scene_view = scene_view;
        self.depth_view = depth_view;
        self.compositor.resize(&self.device, new_size.width, new_size.height);
    }

    /// Configure the surface again at its current size.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn render(&mut self, ctx: &RenderContext) -> Result<(), wgpu::SurfaceError> {
        self.render_with(ctx, |_, _, _, _| {})
    }

    /// Render, then let `overlay` record extra work into the surface before
    /// presenting.
    pub fn render_with<F>(&mut self, ctx: &RenderContext, overlay: F) -> Result<(), wgpu::SurfaceError>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView),
    {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.draw_scene(ctx, &mut encoder);
        self.compositor.execute(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.scene_view,
            &self.depth_view,
            &view,
            &ctx.post,
            &ctx.camera,
        );
        overlay(&self.device, &self.queue, &mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn sync_geometry(&mut self, ctx: &RenderContext, id: GeometryId) {
        let Some(geometry) = ctx.scene.geometry(id) else { return };
        if self.meshes.len() <= id.index() {
            self.meshes.resize_with(id.index() + 1, || None);
        }
        let stale = match &self.meshes[id.index()] {
            Some(mesh) => mesh.version != geometry.version,
            None => true,
        };
        if !stale {
            return;
        }
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertices"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Indices"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.meshes[id.index()] = Some(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: geometry.indices.len() as u32,
            version: geometry.version,
        });
    }

    fn sync_cloud(&mut self, node: NodeId, world: Mat4, cloud: &PointCloud) {
        let count = cloud.positions.len();
        let needs_buffer = match self.clouds.get(&node) {
            Some(gpu) => gpu.capacity < count,
            None => true,
        };
        if needs_buffer {
            let capacity = count.max(1).next_power_of_two();
            let instances = create_vertex_buffer(&self.device, "Point Instances", capacity * std::mem::size_of::<PointInstance>());
            let uniform = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Point Cloud Uniforms"),
                size: std::mem::size_of::<CloudUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Point Cloud Bind Group"),
                layout: &self.cloud_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                }],
            });
            self.clouds.insert(
                node,
                GpuCloud {
                    instances,
                    capacity,
                    count: 0,
                    version: u64::MAX,
                    uniform,
                    bind_group,
                    additive: cloud.additive,
                },
            );
        }
        let Some(gpu) = self.clouds.get_mut(&node) else { return };

        if needs_buffer || gpu.version != cloud.version || gpu.count as usize != count {
            let data: Vec<PointInstance> = cloud
                .positions
                .iter()
                .enumerate()
                .map(|(i, p)| PointInstance {
                    position: p.extend(1.0).to_array(),
                    color: cloud.colors.get(i).copied().unwrap_or(Vec4::ONE).to_array(),
                })
                .collect();
            self.queue.write_buffer(&gpu.instances, 0, bytemuck::cast_slice(&data));
            gpu.count = count as u32;
            gpu.version = cloud.version;
        }
        gpu.additive = cloud.additive;
        let uniforms = CloudUniforms {
            model: world.to_cols_array_2d(),
            params: [cloud.size, cloud.opacity, 0.0, 0.0],
        };
        self.queue.write_buffer(&gpu.uniform, 0, bytemuck::bytes_of(&uniforms));
    }

    fn draw_scene(&mut self, ctx: &RenderContext, encoder: &mut wgpu::CommandEncoder) {
        let uniforms = FrameUniforms::from_context(ctx);
        self.queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut mesh_items = Vec::new();
        let mut cloud_nodes = Vec::new();
        let mut line_vertices: Vec<LineVertex> = Vec::new();
        let mut line_ranges: Vec<Range<u32>> = Vec::new();

        for item in ctx.scene.renderables() {
            match item.renderable {
                Renderable::Mesh(mesh) => {
                    self.sync_geometry(ctx, mesh.geometry);
                    mesh_items.push((
                        MeshPass::of(&mesh.material),
                        mesh.geometry,
                        MeshInstance::new(item.world, &mesh.material),
                    ));
                }
                Renderable::Points(cloud) => {
                    if cloud.positions.is_empty() {
                        continue;
                    }
                    self.sync_cloud(item.node, item.world, cloud);
                    cloud_nodes.push(item.node);
                }
                Renderable::Line(line) => {
                    if line.points.len() < 2 {
                        continue;
                    }
                    let start = line_vertices.len() as u32;
                    line_vertices.extend(line.points.iter().map(|p| LineVertex {
                        position: item.world.transform_point3(*p).to_array(),
                        color: line.color.to_array(),
                    }));
                    line_ranges.push(start..line_vertices.len() as u32);
                }
            }
        }
        self.clouds.retain(|node, _| cloud_nodes.contains(node));

        let (instances, batches) = build_batches(mesh_items);
        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_buffer = create_vertex_buffer(
                &self.device,
                "Mesh Instances",
                self.instance_capacity * std::mem::size_of::<MeshInstance>(),
            );
        }
        if !instances.is_empty() {
            self.queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        if line_vertices.len() > self.line_capacity {
            self.line_capacity = line_vertices.len().next_power_of_two();
            self.line_buffer = create_vertex_buffer(
                &self.device,
                "Line Vertices",
                self.line_capacity * std::mem::size_of::<LineVertex>(),
            );
        }
        if !line_vertices.is_empty() {
            self.queue.write_buffer(&self.line_buffer, 0, bytemuck::cast_slice(&line_vertices));
        }

        let clear = ctx.scene.clear_color;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.scene_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear.x as f64,
                        g: clear.y as f64,
                        b: clear.z as f64,
                        a: clear.w as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, &self.frame_bind_group, &[]);

        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for batch in &batches {
            let Some(Some(mesh)) = self.meshes.get(batch.geometry.index()) else { continue };
            let pipeline = match batch.pass {
                MeshPass::Background => &self.pipelines.background,
                MeshPass::Opaque => &self.pipelines.opaque,
                MeshPass::Transparent => &self.pipelines.transparent,
            };
            pass.set_pipeline(pipeline);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, batch.instances.clone());
        }

        if !line_ranges.is_empty() {
            pass.set_pipeline(&self.pipelines.lines);
            pass.set_vertex_buffer(0, self.line_buffer.slice(..));
            for range in &line_ranges {
                pass.draw(range.clone(), 0..1);
            }
        }

        for node in &cloud_nodes {
            let Some(gpu) = self.clouds.get(node) else { continue };
            let pipeline = if gpu.additive {
                &self.pipelines.points_additive
            } else {
                &self.pipelines.points_alpha
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(1, &gpu.bind_group, &[]);
            pass.set_vertex_buffer(0, gpu.instances.slice(..));
            pass.draw(0..6, 0..gpu.count);
        }
    }
}

fn create_pipelines(
    device: &wgpu::Device,
    frame_layout: &wgpu::BindGroupLayout,
    cloud_layout: &wgpu::BindGroupLayout,
) -> Pipelines {
    let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(shaders::mesh_shader().into()),
    });
    let points_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Points Shader"),
        source: wgpu::ShaderSource::Wgsl(shaders::points_shader().into()),
    });
    let line_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Line Shader"),
        source: wgpu::ShaderSource::Wgsl(shaders::line_shader().into()),
    });

    let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Scene Pipeline Layout"),
        bind_group_layouts: &[frame_layout],
        push_constant_ranges: &[],
    });
    let points_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Points Pipeline Layout"),
        bind_group_layouts: &[frame_layout, cloud_layout],
        push_constant_ranges: &[],
    });

    let mesh_buffers = [Vertex::layout(), MeshInstance::layout()];
    let triangles = wgpu::PrimitiveTopology::TriangleList;

    Pipelines {
        background: scene_pipeline(
            device,
            &scene_layout,
            &mesh_shader,
            &mesh_buffers,
            PipelineOptions {
                label: "Background Pipeline",
                topology: triangles,
                blend: None,
                depth_write: false,
                depth_compare: wgpu::CompareFunction::Always,
            },
        ),
        opaque: scene_pipeline(
            device,
            &scene_layout,
            &mesh_shader,
            &mesh_buffers,
            PipelineOptions {
                label: "Opaque Mesh Pipeline",
                topology: triangles,
                blend: None,
                depth_write: true,
                depth_compare: wgpu::CompareFunction::Less,
            },
        ),
        transparent: scene_pipeline(
            device,
            &scene_layout,
            &mesh_shader,
            &mesh_buffers,
            PipelineOptions {
                label: "Transparent Mesh Pipeline",
                topology: triangles,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                depth_write: false,
                depth_compare: wgpu::CompareFunction::Less,
            },
        ),
        points_alpha: scene_pipeline(
            device,
            &points_layout,
            &points_shader,
            &[PointInstance::layout()],
            PipelineOptions {
                label: "Points Pipeline",
                topology: triangles,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                depth_write: false,
                depth_compare: wgpu::CompareFunction::Less,
            },
        ),
        points_additive: scene_pipeline(
            device,
            &points_layout,
            &points_shader,
            &[PointInstance::layout()],
            PipelineOptions {
                label: "Additive Points Pipeline",
                topology: triangles,
                blend: Some(ADDITIVE_BLENDING),
                depth_write: false,
                depth_compare: wgpu::CompareFunction::Less,
            },
        ),
        lines: scene_pipeline(
            device,
            &scene_layout,
            &line_shader,
            &[LineVertex::layout()],
            PipelineOptions {
                label: "Line Pipeline",
                topology: wgpu::PrimitiveTopology::LineStrip,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                depth_write: true,
                depth_compare: wgpu::CompareFunction::Less,
            },
        ),
    }
}

fn create_vertex_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(16) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// HDR colour target and a sampleable depth buffer.
fn create_scene_targets(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::TextureView, wgpu::TextureView) {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Scene Color"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HDR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    (
        color.create_view(&wgpu::TextureViewDescriptor::default()),
        depth.create_view(&wgpu::TextureViewDescriptor::default()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Fog, Mesh, Transform};

    #[test]
    fn test_uniform_sizes_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<FrameUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 384);
        assert_eq!(std::mem::size_of::<MeshInstance>(), 96);
        assert_eq!(std::mem::size_of::<CloudUniforms>(), 80);
    }

    #[test]
    fn test_frame_uniforms_pack_lights_and_fog() {
        let mut ctx = RenderContext::new(&ExperimentConfig::default(), 640, 480);
        ctx.scene.add_light(Light::Ambient {
            color: Vec3::ONE,
            intensity: 0.25,
        });
        ctx.scene.add_light(Light::Ambient {
            color: Vec3::ONE,
            intensity: 0.25,
        });
        for _ in 0..6 {
            ctx.scene.add_light(Light::Directional {
                direction: Vec3::new(0.0, 2.0, 0.0),
                color: Vec3::ONE,
                intensity: 1.0,
            });
        }
        ctx.scene.fog = Some(Fog {
            color: Vec3::new(0.1, 0.2, 0.3),
            near: 1.0,
            far: 50.0,
        });

        let u = FrameUniforms::from_context(&ctx);
        assert_eq!(u.ambient[0], 0.5);
        assert_eq!(u.fog_range, [1.0, 50.0, 0.0, MAX_LIGHTS as f32]);
        assert_eq!(u.fog_color[3], 1.0);
        assert_eq!(u.lights[0].position, [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_batches_group_by_pass_then_geometry() {
        let mut scene = crate::scene::SceneGraph::new();
        let a = scene.add_geometry(crate::geometry::Geometry::cuboid(1.0, 1.0, 1.0));
        let b = scene.add_geometry(crate::geometry::Geometry::cuboid(1.0, 1.0, 1.0));
        let opaque = Material::default();
        let glass = Material::lit(Vec4::new(1.0, 1.0, 1.0, 0.5));
        let root = scene.root();
        for (geometry, material) in [(b, opaque), (a, glass), (a, opaque), (b, opaque), (a, Material::background())] {
            scene.add_mesh(root, Transform::IDENTITY, Mesh { geometry, material });
        }

        let items = scene
            .renderables()
            .into_iter()
            .filter_map(|item| match item.renderable {
                Renderable::Mesh(m) => Some((MeshPass::of(&m.material), m.geometry, MeshInstance::new(item.world, &m.material))),
                _ => None,
            })
            .collect();
        let (instances, batches) = build_batches(items);
        assert_eq!(instances.len(), 5);
        let summary: Vec<_> = batches.iter().map(|b| (b.pass, b.geometry, b.instances.clone())).collect();
        assert_eq!(
            summary,
            vec![
                (MeshPass::Background, a, 0..1),
                (MeshPass::Opaque, a, 1..2),
                (MeshPass::Opaque, b, 2..4),
                (MeshPass::Transparent, a, 4..5),
            ]
        );
    }
}
