//! WGSL sources for scene drawing and post-processing.
//!
//! Scene shaders share the `FrameUniforms` block at group 0. Post passes are
//! generated by [`fullscreen_shader`], which wraps a fragment body with the
//! fullscreen-triangle vertex stage and a common binding layout.

/// Frame uniform block shared by the mesh, point and line shaders.
const FRAME_UNIFORMS: &str = r#"
struct Light {
    // w = 0 directional (xyz points toward the light), w = 1 point
    position: vec4<f32>,
    // rgb premultiplied by intensity, w = range for point lights
    color: vec4<f32>,
};

struct FrameUniforms {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    // w = 1 when fog is on
    fog_color: vec4<f32>,
    // near, far, elapsed, light count
    fog_range: vec4<f32>,
    lights: array<Light, 4>,
};

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

fn apply_fog(color: vec3<f32>, world_pos: vec3<f32>) -> vec3<f32> {
    if (frame.fog_color.w < 0.5) {
        return color;
    }
    let dist = distance(world_pos, frame.camera_position.xyz);
    let f = smoothstep(frame.fog_range.x, frame.fog_range.y, dist);
    return mix(color, frame.fog_color.rgb, f);
}
"#;

const MESH_BODY: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
    @location(7) tint: vec4<f32>,
    // x = shading (0 lit, 1 unlit, 2 normal), y = emissive, z = background
    @location(8) params: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) params: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(instance.model_0, instance.model_1, instance.model_2, instance.model_3);
    let world = model * vec4<f32>(vertex.position, 1.0);
    let normal_matrix = mat3x3<f32>(model[0].xyz, model[1].xyz, model[2].xyz);

    var out: VertexOutput;
    out.clip_position = frame.view_proj * world;
    out.world_pos = world.xyz;
    out.normal = normal_matrix * vertex.normal;
    out.color = vertex.color * instance.tint;
    out.params = instance.params;
    return out;
}

fn shade(base: vec3<f32>, world_pos: vec3<f32>, n: vec3<f32>) -> vec3<f32> {
    var light = frame.ambient.rgb;
    let count = u32(frame.fog_range.w);
    for (var i = 0u; i < count; i = i + 1u) {
        let l = frame.lights[i];
        if (l.position.w < 0.5) {
            light += l.color.rgb * max(dot(n, normalize(l.position.xyz)), 0.0);
        } else {
            let to_light = l.position.xyz - world_pos;
            let dist = length(to_light);
            var attenuation = 1.0;
            if (l.color.w > 0.0) {
                attenuation = pow(clamp(1.0 - dist / l.color.w, 0.0, 1.0), 2.0);
            }
            light += l.color.rgb * attenuation * max(dot(n, to_light / max(dist, 1e-4)), 0.0);
        }
    }
    return base * light;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.normal);
    var rgb = in.color.rgb;
    let mode = u32(in.params.x + 0.5);
    if (mode == 0u) {
        rgb = shade(in.color.rgb, in.world_pos, n) + in.color.rgb * in.params.y;
    } else if (mode == 2u) {
        rgb = n * 0.5 + vec3<f32>(0.5);
    }
    if (in.params.z < 0.5) {
        rgb = apply_fog(rgb, in.world_pos);
    }
    return vec4<f32>(rgb, in.color.a);
}
"#;

const POINTS_BODY: &str = r#"
struct CloudUniforms {
    model: mat4x4<f32>,
    // x = sprite size in world units, y = opacity
    params: vec4<f32>,
};

@group(1) @binding(0)
var<uniform> cloud: CloudUniforms;

struct PointInput {
    @location(0) position: vec4<f32>,
    @location(1) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32, point: PointInput) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[vertex_index];
    var view_pos = frame.view * cloud.model * vec4<f32>(point.position.xyz, 1.0);
    view_pos = vec4<f32>(view_pos.xy + corner * cloud.params.x * 0.5, view_pos.zw);

    var out: VertexOutput;
    out.clip_position = frame.proj * view_pos;
    out.uv = corner;
    out.color = vec4<f32>(point.color.rgb, point.color.a * cloud.params.y);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let d = length(in.uv);
    if (d > 1.0) {
        discard;
    }
    let falloff = 1.0 - smoothstep(0.6, 1.0, d);
    return vec4<f32>(in.color.rgb, in.color.a * falloff);
}
"#;

const LINE_BODY: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = frame.view_proj * vec4<f32>(vertex.position, 1.0);
    out.color = vertex.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

pub fn mesh_shader() -> String {
    format!("{FRAME_UNIFORMS}{MESH_BODY}")
}

pub fn points_shader() -> String {
    format!("{FRAME_UNIFORMS}{POINTS_BODY}")
}

pub fn line_shader() -> String {
    format!("{FRAME_UNIFORMS}{LINE_BODY}")
}

/// Build a fullscreen post pass.
///
/// Bindings: 0 = `params` uniform, 1 = linear sampler, `2..2 + textures` =
/// colour inputs named `tex0`, `tex1`, ..., and, with `depth`, a depth
/// texture named `depth_tex` after them. `body` is the fragment function body;
/// it receives `in.uv`.
pub fn fullscreen_shader(body: &str, textures: u32, depth: bool) -> String {
    let mut bindings = String::new();
    for i in 0..textures {
        bindings.push_str(&format!(
            "@group(0) @binding({})\nvar tex{}: texture_2d<f32>;\n",
            i + 2,
            i
        ));
    }
    if depth {
        bindings.push_str(&format!(
            "@group(0) @binding({})\nvar depth_tex: texture_depth_2d;\n",
            textures + 2
        ));
    }
    format!(
        r#"
struct Params {{
    matrix: mat4x4<f32>,
    a: vec4<f32>,
    b: vec4<f32>,
    c: vec4<f32>,
    d: vec4<f32>,
}};

struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}};

@group(0) @binding(0)
var<uniform> params: Params;
@group(0) @binding(1)
var samp: sampler;
{bindings}
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {{
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var uvs = array<vec2<f32>, 3>(
        vec2<f32>(0.0, 1.0),
        vec2<f32>(2.0, 1.0),
        vec2<f32>(0.0, -1.0),
    );

    var out: VertexOutput;
    out.clip_position = vec4<f32>(positions[vertex_index], 0.0, 1.0);
    out.uv = uvs[vertex_index];
    return out;
}}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{
{body}
}}
"#
    )
}

/// Keep pixels brighter than `params.a.x`. One input.
pub const BRIGHT_PASS: &str = r#"
    let color = textureSample(tex0, samp, in.uv);
    let luma = dot(color.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    let keep = smoothstep(params.a.x, params.a.x + 0.01, luma);
    return vec4<f32>(color.rgb * keep, 1.0);
"#;

/// Separable gaussian. `params.a.xy` = texel step along the blur direction,
/// `params.a.z` = kernel radius in taps, `params.a.w` = sigma. One input.
pub const GAUSSIAN_BLUR: &str = r#"
    let texel_step = params.a.xy;
    let radius = i32(params.a.z);
    let sigma = params.a.w;
    var sum = textureSampleLevel(tex0, samp, in.uv, 0.0).rgb;
    var weight_sum = 1.0;
    for (var i = 1; i <= radius; i = i + 1) {
        let x = f32(i);
        let w = exp(-0.5 * x * x / (sigma * sigma));
        sum += textureSampleLevel(tex0, samp, in.uv + texel_step * x, 0.0).rgb * w;
        sum += textureSampleLevel(tex0, samp, in.uv - texel_step * x, 0.0).rgb * w;
        weight_sum += 2.0 * w;
    }
    return vec4<f32>(sum / weight_sum, 1.0);
"#;

/// Add the weighted bloom mips to the scene. Six inputs: scene then mips
/// 0..5. `params.a` / `params.b.x` = per-mip factors, `params.b.y` = strength.
pub const BLOOM_COMPOSITE: &str = r#"
    let base = textureSample(tex0, samp, in.uv);
    var bloom = textureSample(tex1, samp, in.uv).rgb * params.a.x;
    bloom += textureSample(tex2, samp, in.uv).rgb * params.a.y;
    bloom += textureSample(tex3, samp, in.uv).rgb * params.a.z;
    bloom += textureSample(tex4, samp, in.uv).rgb * params.a.w;
    bloom += textureSample(tex5, samp, in.uv).rgb * params.b.x;
    return vec4<f32>(base.rgb + bloom * params.b.y, base.a);
"#;

/// Scalable ambient obscurance from depth. No colour inputs, depth only.
///
/// `params.matrix` = inverse projection; `params.a` = (bias, intensity,
/// scale, kernel radius px); `params.b` = (min resolution, near, far, seed);
/// `params.c.xy` = texture size.
pub const SAO: &str = r#"
    let size = params.c.xy;
    let pixel = vec2<i32>(in.uv * size);
    let center_depth = textureLoad(depth_tex, pixel, 0);
    if (center_depth >= 1.0) {
        return vec4<f32>(1.0);
    }
    let center = view_position(in.uv, center_depth);
    let right = view_position(in.uv + vec2<f32>(1.0, 0.0) / size, textureLoad(depth_tex, pixel + vec2<i32>(1, 0), 0));
    let up = view_position(in.uv + vec2<f32>(0.0, 1.0) / size, textureLoad(depth_tex, pixel + vec2<i32>(0, 1), 0));
    let normal = normalize(cross(up - center, right - center));

    let bias = params.a.x;
    let intensity = params.a.y;
    let far = params.b.z;
    let scale_over_far = params.a.z / far;
    let min_res_far = params.b.x * far;

    let samples = 16;
    let spiral_turns = 7.0;
    let angle_step = 6.2831853 * spiral_turns / f32(samples);
    let noise = fract(sin(dot(in.uv + params.b.w, vec2<f32>(12.9898, 78.233))) * 43758.5453);
    var angle = noise * 6.2831853;
    var occlusion = 0.0;
    var weight = 0.0;
    for (var i = 0; i < samples; i = i + 1) {
        let t = (f32(i) + 0.5) / f32(samples);
        let offset = vec2<f32>(cos(angle), sin(angle)) * t * params.a.w / size;
        angle += angle_step;
        let uv = in.uv + offset;
        if (any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0))) {
            continue;
        }
        let sample_depth = textureLoad(depth_tex, vec2<i32>(uv * size), 0);
        let delta = view_position(uv, sample_depth) - center;
        let scaled = scale_over_far * length(delta);
        occlusion += max(0.0, (dot(normal, delta) - min_res_far) / max(scaled, 1e-4) - bias) / (1.0 + scaled * scaled);
        weight += 1.0;
    }
    let ao = occlusion * intensity / max(weight, 1.0);
    return vec4<f32>(vec3<f32>(clamp(1.0 - ao, 0.0, 1.0)), 1.0);
"#;

/// Helper appended to [`SAO`] shaders.
pub const VIEW_POSITION: &str = r#"
fn view_position(uv: vec2<f32>, depth: f32) -> vec3<f32> {
    let ndc = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let p = params.matrix * ndc;
    return p.xyz / p.w;
}
"#;

/// Depth-aware blur of the occlusion buffer. One input plus depth.
/// `params.a` = (radius px, std dev, depth cutoff, _), `params.c.xy` = size.
pub const DEPTH_BLUR: &str = r#"
    let size = params.c.xy;
    let pixel = vec2<i32>(in.uv * size);
    let center_depth = textureLoad(depth_tex, pixel, 0);
    let spacing = max(params.a.x / 3.0, 1.0);
    let sigma = max(params.a.y, 0.5);
    var sum = 0.0;
    var weight_sum = 0.0;
    for (var y = -3; y <= 3; y = y + 1) {
        for (var x = -3; x <= 3; x = x + 1) {
            let offset = vec2<f32>(f32(x), f32(y)) * spacing;
            let p = clamp(pixel + vec2<i32>(offset), vec2<i32>(0), vec2<i32>(size) - vec2<i32>(1));
            let d = textureLoad(depth_tex, p, 0);
            if (abs(d - center_depth) > params.a.z) {
                continue;
            }
            let w = exp(-0.5 * dot(offset, offset) / (sigma * sigma));
            sum += textureSampleLevel(tex0, samp, (vec2<f32>(p) + vec2<f32>(0.5)) / size, 0.0).r * w;
            weight_sum += w;
        }
    }
    return vec4<f32>(vec3<f32>(sum / max(weight_sum, 1e-4)), 1.0);
"#;

/// Multiply the image by the occlusion term. Two inputs: image, occlusion.
pub const AO_COMPOSITE: &str = r#"
    let base = textureSample(tex0, samp, in.uv);
    let ao = textureSample(tex1, samp, in.uv).r;
    return vec4<f32>(base.rgb * ao, base.a);
"#;

/// Keep the brighter of the new frame and the damped previous frame.
/// Two inputs: new, history. `params.a.x` = damp.
pub const AFTERIMAGE: &str = r#"
    let new_color = textureSample(tex0, samp, in.uv);
    var old_color = textureSample(tex1, samp, in.uv);
    let alive = max(sign(old_color - vec4<f32>(0.1)), vec4<f32>(0.0));
    old_color = old_color * params.a.x * alive;
    return max(new_color, old_color);
"#;

/// Exposure and tone mapping into the surface. One input.
/// `params.a.x` = exposure, `params.a.y` = 1 for ACES filmic.
pub const OUTPUT: &str = r#"
    var color = textureSample(tex0, samp, in.uv).rgb * params.a.x;
    if (params.a.y > 0.5) {
        color = color / 0.6;
        let input_mat = mat3x3<f32>(
            vec3<f32>(0.59719, 0.07600, 0.02840),
            vec3<f32>(0.35458, 0.90834, 0.13383),
            vec3<f32>(0.04823, 0.01566, 0.83777),
        );
        let output_mat = mat3x3<f32>(
            vec3<f32>(1.60475, -0.10208, -0.00327),
            vec3<f32>(-0.53108, 1.10813, -0.07276),
            vec3<f32>(-0.07367, -0.00605, 1.07602),
        );
        color = input_mat * color;
        let a = color * (color + 0.0245786) - 0.000090537;
        let b = color * (0.983729 * color + 0.4329510) + 0.238081;
        color = output_mat * (a / b);
    }
    return vec4<f32>(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(name: &str, src: &str) {
        let module = naga::front::wgsl::parse_str(src)
            .unwrap_or_else(|e| panic!("{} failed to parse: {}", name, e.emit_to_string(src)));
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        if let Err(e) = validator.validate(&module) {
            panic!("{} failed validation: {:?}", name, e);
        }
    }

    #[test]
    fn test_scene_shaders_validate() {
        validate("mesh", &mesh_shader());
        validate("points", &points_shader());
        validate("line", &line_shader());
    }

    #[test]
    fn test_post_shaders_validate() {
        validate("bright", &fullscreen_shader(BRIGHT_PASS, 1, false));
        validate("blur", &fullscreen_shader(GAUSSIAN_BLUR, 1, false));
        validate("bloom", &fullscreen_shader(BLOOM_COMPOSITE, 6, false));
        validate("sao", &format!("{}{}", fullscreen_shader(SAO, 0, true), VIEW_POSITION));
        validate("depth blur", &fullscreen_shader(DEPTH_BLUR, 1, true));
        validate("ao composite", &fullscreen_shader(AO_COMPOSITE, 2, false));
        validate("afterimage", &fullscreen_shader(AFTERIMAGE, 2, false));
        validate("output", &fullscreen_shader(OUTPUT, 1, false));
    }
}
