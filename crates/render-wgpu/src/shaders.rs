/// WGSL shader for instanced scene geometry.
///
/// `fs_lit` applies ambient, directional and point lights; `fs_unlit` uses
/// the surface color as is. Both multiply the material factor, the instance
/// color and the color map, and tone map only when the material asks for it.
/// Colors are linear; the color target is sRGB so encoding happens on store.
pub const SCENE_SHADER: &str = r#"
const MAX_DIRECTIONAL: u32 = 2u;
const MAX_POINT: u32 = 4u;

struct Frame {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    directional_dir: array<vec4<f32>, 2>,
    directional_color: array<vec4<f32>, 2>,
    point_position: array<vec4<f32>, 4>,
    point_color: array<vec4<f32>, 4>,
    // x: directional lights, y: point lights
    counts: vec4<u32>,
};

struct MaterialParams {
    base_color: vec4<f32>,
    // x: tone mapped
    flags: vec4<u32>,
};

@group(0) @binding(0)
var<uniform> frame: Frame;

@group(1) @binding(0)
var<uniform> material: MaterialParams;
@group(1) @binding(1)
var color_map: texture_2d<f32>;
@group(1) @binding(2)
var color_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
    @location(7) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) color: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = frame.view_proj * world_pos;
    out.world_position = world_pos.xyz;
    out.world_normal = (model * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.uv = vertex.uv;
    out.color = instance.color;
    return out;
}

// Narkowicz ACES filmic fit.
fn aces(x: vec3<f32>) -> vec3<f32> {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    return clamp((x * (a * x + b)) / (x * (c * x + d) + e), vec3<f32>(0.0), vec3<f32>(1.0));
}

fn surface(in: VertexOutput) -> vec4<f32> {
    return material.base_color * in.color * textureSample(color_map, color_sampler, in.uv);
}

fn finish(rgb: vec3<f32>, alpha: f32) -> vec4<f32> {
    if material.flags.x != 0u {
        return vec4<f32>(aces(rgb), alpha);
    }
    return vec4<f32>(rgb, alpha);
}

@fragment
fn fs_lit(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = surface(in);
    let n = normalize(in.world_normal);
    var light = frame.ambient.rgb;

    let directional = min(frame.counts.x, MAX_DIRECTIONAL);
    for (var i = 0u; i < directional; i = i + 1u) {
        let l = -normalize(frame.directional_dir[i].xyz);
        light = light + frame.directional_color[i].rgb * max(dot(n, l), 0.0);
    }

    let points = min(frame.counts.y, MAX_POINT);
    for (var i = 0u; i < points; i = i + 1u) {
        let to_light = frame.point_position[i].xyz - in.world_position;
        let l = to_light / max(length(to_light), 0.0001);
        light = light + frame.point_color[i].rgb * max(dot(n, l), 0.0);
    }

    return finish(base.rgb * light, base.a);
}

@fragment
fn fs_unlit(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = surface(in);
    return finish(base.rgb, base.a);
}
"#;
