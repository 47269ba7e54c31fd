// WGSL shader source code for the flat, image, SDF and tone-map pipelines.

/// Declarations shared by the three quad pipelines.
const COMMON: &str = r#"
struct FrameConstants {
    window_extent: vec2<f32>,
    viewport_scale: vec2<f32>,
    atlas_extent: vec2<f32>,
    atlas_scale: vec2<f32>,
    subpixel_mode: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
};

@group(0) @binding(0)
var<uniform> frame: FrameConstants;

// Window pixels (origin top-left, y down) to clip space.
fn to_clip(position: vec3<f32>) -> vec4<f32> {
    let x = position.x * frame.viewport_scale.x - 1.0;
    let y = position.y * frame.viewport_scale.y + 1.0;
    return vec4<f32>(x, y, position.z, 1.0);
}

fn outside_clip(frag: vec2<f32>, clip: vec4<f32>) -> bool {
    return frag.x < clip.x || frag.y < clip.y || frag.x >= clip.z || frag.y >= clip.w;
}
"#;

const FLAT_BODY: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) clip: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) clip: vec4<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = to_clip(in.position);
    out.color = in.color;
    out.clip = in.clip;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    if outside_clip(in.clip_position.xy, in.clip) || in.color.a <= 0.0 {
        discard;
    }
    return vec4<f32>(in.color.rgb * in.color.a, in.color.a);
}
"#;

const IMAGE_BODY: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) tex: vec3<f32>,
    @location(2) clip: vec4<f32>,
    @location(3) alpha: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) @interpolate(flat) layer: i32,
    @location(2) clip: vec4<f32>,
    @location(3) alpha: f32,
};

@group(1) @binding(0)
var image_atlas: texture_2d_array<f32>;
@group(1) @binding(1)
var glyph_atlas: texture_2d_array<f32>;
@group(1) @binding(2)
var atlas_sampler: sampler;

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = to_clip(in.position);
    out.uv = in.tex.xy;
    out.layer = i32(round(in.tex.z));
    out.clip = in.clip;
    out.alpha = in.alpha;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(image_atlas, atlas_sampler, in.uv, in.layer);
    let a = texel.a * in.alpha;
    if outside_clip(in.clip_position.xy, in.clip) || a <= 0.0 {
        discard;
    }
    return vec4<f32>(texel.rgb * a, a);
}
"#;

const SDF_BODY: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) tex: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) clip: vec4<f32>,
    @location(4) range: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) @interpolate(flat) layer: i32,
    @location(2) color: vec4<f32>,
    @location(3) clip: vec4<f32>,
    @location(4) range: f32,
};

@group(1) @binding(0)
var image_atlas: texture_2d_array<f32>;
@group(1) @binding(1)
var glyph_atlas: texture_2d_array<f32>;
@group(1) @binding(2)
var atlas_sampler: sampler;

fn median3(v: vec3<f32>) -> f32 {
    return max(min(v.r, v.g), min(max(v.r, v.g), v.b));
}

// Linear ramp over one window pixel centred on the outline.
fn coverage(uv: vec2<f32>, layer: i32, range: f32) -> f32 {
    let s = textureSample(glyph_atlas, atlas_sampler, uv, layer).rgb;
    return clamp((median3(s) - 0.5) * range + 0.5, 0.0, 1.0);
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = to_clip(in.position);
    out.uv = in.tex.xy;
    out.layer = i32(round(in.tex.z));
    out.color = in.color;
    out.clip = in.clip;
    out.range = in.range;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let mode = frame.subpixel_mode;
    let horizontal = mode == 1u || mode == 2u;
    // One third of a window pixel along the stripe direction, at most half a texel.
    let stripe = select(dpdy(in.uv), dpdx(in.uv), horizontal) / 3.0;
    let limit = frame.atlas_scale * 0.5;
    let offset = clamp(stripe, -limit, limit);

    let before = coverage(in.uv - offset, in.layer, in.range);
    let centre = coverage(in.uv, in.layer, in.range);
    let after = coverage(in.uv + offset, in.layer, in.range);

    var cov = vec3<f32>(centre);
    if mode == 1u || mode == 3u {
        cov = vec3<f32>(before, centre, after);
    } else if mode == 2u || mode == 4u {
        cov = vec3<f32>(after, centre, before);
    }

    let a = in.color.a * max(cov.r, max(cov.g, cov.b));
    if outside_clip(in.clip_position.xy, in.clip) || a <= 0.0 {
        discard;
    }
    return vec4<f32>(in.color.rgb * in.color.a * cov, a);
}
"#;

/// Full-screen triangle copying the HDR target into the swap image. The
/// `transfer_function` override is fixed when the pipeline is created:
/// 0 sRGB, 1 Rec.709, 2 Rec.2020 PQ, 3 passthrough for sRGB swap formats.
pub const TONEMAP_SHADER: &str = r#"
override transfer_function: u32 = 0u;

@group(0) @binding(0)
var hdr_target: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var out: VertexOutput;
    let x = f32(i32(index & 1u) * 4 - 1);
    let y = f32(i32(index >> 1u) * 4 - 1);
    out.clip_position = vec4<f32>(x, y, 0.0, 1.0);
    return out;
}

fn srgb_oetf(c: vec3<f32>) -> vec3<f32> {
    let lo = c * 12.92;
    let hi = 1.055 * pow(c, vec3<f32>(1.0 / 2.4)) - 0.055;
    return select(hi, lo, c <= vec3<f32>(0.0031308));
}

fn rec709_oetf(c: vec3<f32>) -> vec3<f32> {
    let lo = c * 4.5;
    let hi = 1.099 * pow(c, vec3<f32>(0.45)) - 0.099;
    return select(hi, lo, c < vec3<f32>(0.018));
}

fn pq_oetf(linear_709: vec3<f32>) -> vec3<f32> {
    let to_2020 = mat3x3<f32>(
        vec3<f32>(0.6274, 0.0691, 0.0164),
        vec3<f32>(0.3293, 0.9195, 0.0880),
        vec3<f32>(0.0433, 0.0114, 0.8956),
    );
    // Reference white at 203 cd/m2 of the 10000 cd/m2 PQ range.
    let y = max(to_2020 * linear_709, vec3<f32>(0.0)) * (203.0 / 10000.0);
    let m1 = 0.1593017578125;
    let m2 = 78.84375;
    let c1 = 0.8359375;
    let c2 = 18.8515625;
    let c3 = 18.6875;
    let p = pow(y, vec3<f32>(m1));
    return pow((c1 + c2 * p) / (1.0 + c3 * p), vec3<f32>(m2));
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureLoad(hdr_target, vec2<i32>(in.clip_position.xy), 0);
    let c = max(texel.rgb, vec3<f32>(0.0));
    var encoded = c;
    if transfer_function == 0u {
        encoded = srgb_oetf(min(c, vec3<f32>(1.0)));
    } else if transfer_function == 1u {
        encoded = rec709_oetf(min(c, vec3<f32>(1.0)));
    } else if transfer_function == 2u {
        encoded = pq_oetf(c);
    }
    return vec4<f32>(encoded, 1.0);
}
"#;

/// Value of the tone-mapper override for a swap format that encodes sRGB
/// in hardware.
pub const TRANSFER_PASSTHROUGH: f64 = 3.0;

pub fn flat_shader() -> String {
    [COMMON, FLAT_BODY].concat()
}

pub fn image_shader() -> String {
    [COMMON, IMAGE_BODY].concat()
}

pub fn sdf_shader() -> String {
    [COMMON, SDF_BODY].concat()
}
