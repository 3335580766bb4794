//! Image-space pass chain.
//!
//! The scene is rasterized into an HDR target. [`Compositor::execute`] then
//! walks the [`PassPlan`] once per frame, ping-ponging between two HDR
//! targets, and the output pass tone maps the result into the surface.
//! Disabled passes are skipped without touching the chain; every target,
//! including the afterimage history, is only reallocated on resize.

use bytemuck::{Pod, Zeroable};

use super::shaders;
use super::HDR_FORMAT;
use crate::camera::PerspectiveCamera;
use crate::config::ToneMapping;
use crate::post::{PassKind, PassPlan, PostSettings};

/// Bloom mip levels.
const BLOOM_MIPS: usize = 5;
/// Gaussian radius (taps) per bloom mip.
const BLOOM_KERNELS: [u32; BLOOM_MIPS] = [3, 5, 7, 9, 11];
/// Base contribution of each bloom mip before the radius bend.
const BLOOM_FACTORS: [f32; BLOOM_MIPS] = [1.0, 0.8, 0.6, 0.4, 0.2];

/// Uniform block shared by every fullscreen shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PassUniforms {
    matrix: [[f32; 4]; 4],
    a: [f32; 4],
    b: [f32; 4],
    c: [f32; 4],
    d: [f32; 4],
}

impl PassUniforms {
    fn new(a: [f32; 4]) -> Self {
        Self {
            a,
            ..Zeroable::zeroed()
        }
    }
}

/// Bend a mip factor toward its mirror as the radius grows.
pub fn bloom_factor(factor: f32, radius: f32) -> f32 {
    factor + (1.2 - factor - factor) * radius
}

/// An offscreen colour target.
struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl Target {
    fn new(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width: width.max(1),
            height: height.max(1),
        }
    }

    fn size(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

/// A fullscreen pipeline plus its layout and uniform buffers.
struct FullscreenPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    textures: u32,
    depth: bool,
    uniforms: Vec<wgpu::Buffer>,
}

impl FullscreenPass {
    #[allow(clippy::too_many_arguments)]
    fn new(
        device: &wgpu::Device,
        label: &str,
        source: String,
        textures: u32,
        depth: bool,
        format: wgpu::TextureFormat,
        uniform_slots: usize,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        for i in 0..textures {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: i + 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        if depth {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: textures + 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniforms = (0..uniform_slots.max(1))
            .map(|_| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size: std::mem::size_of::<PassUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();

        Self {
            pipeline,
            layout,
            textures,
            depth,
            uniforms,
        }
    }

    /// Record one draw into `target`, reading `inputs` (and `depth` when the
    /// pass takes one). `slot` picks the uniform buffer.
    #[allow(clippy::too_many_arguments)]
    fn draw(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        sampler: &wgpu::Sampler,
        slot: usize,
        uniforms: &PassUniforms,
        inputs: &[&wgpu::TextureView],
        depth: Option<&wgpu::TextureView>,
        target: &wgpu::TextureView,
    ) {
        debug_assert_eq!(inputs.len() as u32, self.textures);
        let buffer = &self.uniforms[slot.min(self.uniforms.len() - 1)];
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(uniforms));

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ];
        for (i, view) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: i as u32 + 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        if let (true, Some(depth)) = (self.depth, depth) {
            entries.push(wgpu::BindGroupEntry {
                binding: self.textures + 2,
                resource: wgpu::BindingResource::TextureView(depth),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post Pass Bind Group"),
            layout: &self.layout,
            entries: &entries,
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Post Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

struct BloomChain {
    bright: FullscreenPass,
    blur: FullscreenPass,
    composite: FullscreenPass,
    /// Full-resolution bright-pass output.
    highlights: Target,
    /// (horizontal scratch, result) per mip.
    mips: Vec<(Target, Target)>,
}

impl BloomChain {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self {
            bright: FullscreenPass::new(
                device,
                "Bloom Bright Pass",
                shaders::fullscreen_shader(shaders::BRIGHT_PASS, 1, false),
                1,
                false,
                HDR_FORMAT,
                1,
            ),
            blur: FullscreenPass::new(
                device,
                "Bloom Blur",
                shaders::fullscreen_shader(shaders::GAUSSIAN_BLUR, 1, false),
                1,
                false,
                HDR_FORMAT,
                BLOOM_MIPS * 2,
            ),
            composite: FullscreenPass::new(
                device,
                "Bloom Composite",
                shaders::fullscreen_shader(shaders::BLOOM_COMPOSITE, 6, false),
                6,
                false,
                HDR_FORMAT,
                1,
            ),
            highlights: Target::new(device, "Bloom Highlights", width, height),
            mips: Self::mip_targets(device, width, height),
        }
    }

    fn mip_targets(device: &wgpu::Device, width: u32, height: u32) -> Vec<(Target, Target)> {
        (0..BLOOM_MIPS)
            .map(|i| {
                let w = (width >> (i + 1)).max(1);
                let h = (height >> (i + 1)).max(1);
                (
                    Target::new(device, "Bloom Scratch", w, h),
                    Target::new(device, "Bloom Mip", w, h),
                )
            })
            .collect()
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.highlights = Target::new(device, "Bloom Highlights", width, height);
        self.mips = Self::mip_targets(device, width, height);
    }
}

struct AoChain {
    sao: FullscreenPass,
    blur: FullscreenPass,
    composite: FullscreenPass,
    raw: Target,
    blurred: Target,
}

impl AoChain {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self {
            sao: FullscreenPass::new(
                device,
                "SAO",
                format!(
                    "{}{}",
                    shaders::fullscreen_shader(shaders::SAO, 0, true),
                    shaders::VIEW_POSITION
                ),
                0,
                true,
                HDR_FORMAT,
                1,
            ),
            blur: FullscreenPass::new(
                device,
                "SAO Blur",
                shaders::fullscreen_shader(shaders::DEPTH_BLUR, 1, true),
                1,
                true,
                HDR_FORMAT,
                1,
            ),
            composite: FullscreenPass::new(
                device,
                "SAO Composite",
                shaders::fullscreen_shader(shaders::AO_COMPOSITE, 2, false),
                2,
                false,
                HDR_FORMAT,
                1,
            ),
            raw: Target::new(device, "SAO Raw", width, height),
            blurred: Target::new(device, "SAO Blurred", width, height),
        }
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.raw = Target::new(device, "SAO Raw", width, height);
        self.blurred = Target::new(device, "SAO Blurred", width, height);
    }
}

struct Afterimage {
    blend: FullscreenPass,
    history: Target,
}

/// Where the current image lives while walking the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Current {
    Scene,
    Ping(usize),
}

impl Current {
    /// Ping target the afterimage history is copied from. The scene target
    /// is never saved, since no blend has run yet.
    fn saved(self) -> Option<usize> {
        match self {
            Current::Scene => None,
            Current::Ping(i) => Some(i),
        }
    }
}

/// GPU side of the post-processing pipeline.
pub struct Compositor {
    plan: PassPlan,
    sampler: wgpu::Sampler,
    ping: [Target; 2],
    bloom: Option<BloomChain>,
    ao: Option<AoChain>,
    afterimage: Option<Afterimage>,
    output: FullscreenPass,
    frame: u32,
}

impl Compositor {
    /// Allocate pipelines for exactly the passes in `plan`.
    pub fn new(
        device: &wgpu::Device,
        plan: &PassPlan,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bloom = plan
            .contains(PassKind::Bloom)
            .then(|| BloomChain::new(device, width, height));
        let ao = plan
            .contains(PassKind::AmbientOcclusion)
            .then(|| AoChain::new(device, width, height));
        let afterimage = plan.contains(PassKind::AfterimageBlend).then(|| Afterimage {
            blend: FullscreenPass::new(
                device,
                "Afterimage",
                shaders::fullscreen_shader(shaders::AFTERIMAGE, 2, false),
                2,
                false,
                HDR_FORMAT,
                1,
            ),
            history: Target::new(device, "Afterimage History", width, height),
        });

        log::info!("Post chain: {:?}", plan.passes());

        Self {
            plan: plan.clone(),
            sampler,
            ping: [
                Target::new(device, "Post Ping", width, height),
                Target::new(device, "Post Pong", width, height),
            ],
            bloom,
            ao,
            afterimage,
            output: FullscreenPass::new(
                device,
                "Output Pass",
                shaders::fullscreen_shader(shaders::OUTPUT, 1, false),
                1,
                false,
                surface_format,
                1,
            ),
            frame: 0,
        }
    }

    /// Reallocate every target for a new size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.ping = [
            Target::new(device, "Post Ping", width, height),
            Target::new(device, "Post Pong", width, height),
        ];
        if let Some(bloom) = self.bloom.as_mut() {
            bloom.resize(device, width, height);
        }
        if let Some(ao) = self.ao.as_mut() {
            ao.resize(device, width, height);
        }
        if let Some(after) = self.afterimage.as_mut() {
            after.history = Target::new(device, "Afterimage History", width, height);
        }
    }

    fn view<'a>(&'a self, scene: &'a wgpu::TextureView, current: Current) -> &'a wgpu::TextureView {
        match current {
            Current::Scene => scene,
            Current::Ping(i) => &self.ping[i].view,
        }
    }

    fn next(current: Current) -> usize {
        match current {
            Current::Scene | Current::Ping(1) => 0,
            Current::Ping(_) => 1,
        }
    }

    /// Run every active pass after `Scene` and write the surface.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        surface: &wgpu::TextureView,
        settings: &PostSettings,
        camera: &PerspectiveCamera,
    ) {
        self.frame = self.frame.wrapping_add(1);
        let mut current = Current::Scene;
        let passes: Vec<PassKind> = self.plan.active(settings).collect();

        for pass in passes {
            match pass {
                PassKind::Scene => {}
                PassKind::Bloom => {
                    if let Some(bloom) = settings.bloom {
                        let out = Self::next(current);
                        self.run_bloom(device, queue, encoder, scene, current, out, bloom.threshold, bloom.strength, bloom.radius);
                        current = Current::Ping(out);
                    }
                }
                PassKind::AmbientOcclusion => {
                    if let Some(ao) = settings.ambient_occlusion {
                        let out = Self::next(current);
                        self.run_ao(device, queue, encoder, scene, depth, current, out, &ao.params, camera);
                        current = Current::Ping(out);
                    }
                }
                PassKind::AfterimageBlend => {
                    if let (Some(after), Some(settings)) = (self.afterimage.as_ref(), settings.afterimage) {
                        let out = Self::next(current);
                        after.blend.draw(
                            device,
                            queue,
                            encoder,
                            &self.sampler,
                            0,
                            &PassUniforms::new([settings.damp, 0.0, 0.0, 0.0]),
                            &[self.view(scene, current), &after.history.view],
                            None,
                            &self.ping[out].view,
                        );
                        current = Current::Ping(out);
                    }
                }
                PassKind::AfterimageSave => {
                    if let (Some(after), Some(i)) = (self.afterimage.as_ref(), current.saved()) {
                        let target = &self.ping[i];
                        encoder.copy_texture_to_texture(
                            target.texture.as_image_copy(),
                            after.history.texture.as_image_copy(),
                            wgpu::Extent3d {
                                width: target.width,
                                height: target.height,
                                depth_or_array_layers: 1,
                            },
                        );
                    }
                }
                PassKind::Output => {
                    let aces = match settings.tone_mapping {
                        ToneMapping::AcesFilmic => 1.0,
                        ToneMapping::None => 0.0,
                    };
                    self.output.draw(
                        device,
                        queue,
                        encoder,
                        &self.sampler,
                        0,
                        &PassUniforms::new([settings.tone_mapping_exposure(), aces, 0.0, 0.0]),
                        &[self.view(scene, current)],
                        None,
                        surface,
                    );
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_bloom(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene: &wgpu::TextureView,
        current: Current,
        out: usize,
        threshold: f32,
        strength: f32,
        radius: f32,
    ) {
        let Some(bloom) = self.bloom.as_ref() else { return };
        let source = self.view(scene, current);

        bloom.bright.draw(
            device,
            queue,
            encoder,
            &self.sampler,
            0,
            &PassUniforms::new([threshold, 0.0, 0.0, 0.0]),
            &[source],
            None,
            &bloom.highlights.view,
        );

        let mut input = &bloom.highlights.view;
        for (i, (scratch, mip)) in bloom.mips.iter().enumerate() {
            let [w, h] = mip.size();
            let kernel = BLOOM_KERNELS[i] as f32;
            bloom.blur.draw(
                device,
                queue,
                encoder,
                &self.sampler,
                i * 2,
                &PassUniforms::new([1.0 / w, 0.0, kernel, kernel]),
                &[input],
                None,
                &scratch.view,
            );
            bloom.blur.draw(
                device,
                queue,
                encoder,
                &self.sampler,
                i * 2 + 1,
                &PassUniforms::new([0.0, 1.0 / h, kernel, kernel]),
                &[&scratch.view],
                None,
                &mip.view,
            );
            input = &mip.view;
        }

        let f: Vec<f32> = BLOOM_FACTORS.iter().map(|&f| bloom_factor(f, radius)).collect();
        let mut uniforms = PassUniforms::new([f[0], f[1], f[2], f[3]]);
        uniforms.b = [f[4], strength, 0.0, 0.0];
        let mip_views: Vec<&wgpu::TextureView> = bloom.mips.iter().map(|(_, m)| &m.view).collect();
        bloom.composite.draw(
            device,
            queue,
            encoder,
            &self.sampler,
            0,
            &uniforms,
            &[source, mip_views[0], mip_views[1], mip_views[2], mip_views[3], mip_views[4]],
            None,
            &self.ping[out].view,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn run_ao(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        current: Current,
        out: usize,
        params: &crate::config::AoParams,
        camera: &PerspectiveCamera,
    ) {
        let Some(ao) = self.ao.as_ref() else { return };
        let size = ao.raw.size();

        let mut sao = PassUniforms::new([params.bias, params.intensity, params.scale, params.kernel_radius]);
        sao.matrix = camera.projection_matrix().inverse().to_cols_array_2d();
        sao.b = [params.min_resolution, camera.near, camera.far, (self.frame % 64) as f32 * 0.013];
        sao.c = [size[0], size[1], 0.0, 0.0];
        ao.sao.draw(device, queue, encoder, &self.sampler, 0, &sao, &[], Some(depth), &ao.raw.view);

        let occlusion = if params.blur {
            let mut blur = PassUniforms::new([params.blur_radius, params.blur_std_dev, params.blur_depth_cutoff, 0.0]);
            blur.c = [size[0], size[1], 0.0, 0.0];
            ao.blur.draw(
                device,
                queue,
                encoder,
                &self.sampler,
                0,
                &blur,
                &[&ao.raw.view],
                Some(depth),
                &ao.blurred.view,
            );
            &ao.blurred.view
        } else {
            &ao.raw.view
        };

        ao.composite.draw(
            device,
            queue,
            encoder,
            &self.sampler,
            0,
            &PassUniforms::new([0.0; 4]),
            &[self.view(scene, current), occlusion],
            None,
            &self.ping[out].view,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloom_factor_bends_toward_mirror() {
        assert_eq!(bloom_factor(1.0, 0.0), 1.0);
        assert!((bloom_factor(1.0, 1.0) - 0.2).abs() < 1e-6);
        assert!((bloom_factor(0.2, 1.0) - 1.0).abs() < 1e-6);
        assert!((bloom_factor(0.6, 0.5) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_afterimage_saves_blended_target() {
        assert_eq!(Current::Scene.saved(), None);
        assert_eq!(Current::Ping(1).saved(), Some(1));
        assert_eq!(Compositor::next(Current::Ping(1)), 0);
        assert_eq!(Current::Ping(Compositor::next(Current::Scene)).saved(), Some(0));
    }

    #[test]
    fn test_uniform_block_is_std140_sized() {
        assert_eq!(std::mem::size_of::<PassUniforms>(), 128);
    }
}
