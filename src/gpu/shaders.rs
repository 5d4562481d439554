//! WGSL sources of the built-in programs
//!
//! Every program shares the [`UNIFORMS`] block. The same source compiles
//! to a visual variant and a picking variant: [`program_source`] prepends a
//! `PICKING_MODE` constant that the shaders branch on. In picking mode the
//! fragment outputs the item fingerprint, fully opaque and without
//! anti-aliasing.
//!
//! Packed colors arrive as `unorm8x4` with their alpha lowest bit cleared,
//! so alpha is scaled back by 255/254.
//!
//! Vertex locations follow the program layout: template attributes first,
//! then item attributes, in declaration order.

/// Uniform block shared by all programs, bound at group 0, binding 0
pub const UNIFORMS: &str = r#"
struct Uniforms {
    view: mat3x3<f32>,
    size_ratio: f32,
    zoom_ratio: f32,
    correction_ratio: f32,
    pixel_ratio: f32,
    min_edge_thickness: f32,
    feather: f32,
    arrow_head_length_ratio: f32,
    arrow_head_wideness_ratio: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;

const ALPHA_BIAS: f32 = 255.0 / 254.0;

fn output_color(color: vec4<f32>, id: vec4<f32>) -> vec4<f32> {
    if (PICKING_MODE) {
        return vec4<f32>(id.rgb, 1.0);
    }
    return vec4<f32>(color.rgb, min(color.a * ALPHA_BIAS, 1.0));
}
"#;

/// Nodes: one triangle per node, the disc is cut out in the fragment stage
pub const NODE_CIRCLE_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) diff: vec2<f32>,
    @location(2) radius: f32,
}

@vertex
fn vs_main(
    @location(0) angle: f32,
    @location(1) position: vec2<f32>,
    @location(2) size: f32,
    @location(3) color: vec4<f32>,
    @location(4) id: vec4<f32>,
) -> VertexOutput {
    let full_size = size * u.correction_ratio / u.size_ratio * 4.0;
    let diff = full_size * vec2<f32>(cos(angle), sin(angle));
    let clip = u.view * vec3<f32>(position + diff, 1.0);

    var out: VertexOutput;
    out.clip = vec4<f32>(clip.xy, 0.0, 1.0);
    out.color = output_color(color, id);
    out.diff = diff;
    out.radius = full_size * 0.5;
    return out;
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let border = u.correction_ratio * 2.0;
    let dist = length(frag.diff) - frag.radius + border;

    if (PICKING_MODE) {
        if (dist > border) {
            discard;
        }
        return frag.color;
    }

    var t = 0.0;
    if (dist > border) {
        t = 1.0;
    } else if (dist > 0.0) {
        t = dist / border;
    }
    return mix(frag.color, vec4<f32>(0.0), t);
}
"#;

/// Edges: a quad around the segment, with a feathered border
pub const EDGE_LINE_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) normal: vec2<f32>,
    @location(2) thickness: f32,
    @location(3) feather: f32,
}

@vertex
fn vs_main(
    @location(0) start: vec2<f32>,
    @location(1) end: vec2<f32>,
    @location(2) normal: vec2<f32>,
    @location(3) position_coef: f32,
    @location(4) normal_coef: f32,
    @location(5) color: vec4<f32>,
    @location(6) id: vec4<f32>,
) -> VertexOutput {
    let scaled_normal = normal * normal_coef;
    let normal_length = length(scaled_normal);
    var unit_normal = vec2<f32>(0.0);
    if (normal_length > 0.0) {
        unit_normal = scaled_normal / normal_length;
    }

    let pixels_thickness = max(normal_length, u.min_edge_thickness * u.size_ratio);
    let thickness = pixels_thickness * u.correction_ratio / u.size_ratio;
    let position = mix(start, end, position_coef);
    let clip = u.view * vec3<f32>(position + unit_normal * thickness, 1.0);

    var out: VertexOutput;
    out.clip = vec4<f32>(clip.xy, 0.0, 1.0);
    out.color = output_color(color, id);
    out.normal = unit_normal;
    out.thickness = thickness / u.zoom_ratio;
    out.feather = u.feather * u.correction_ratio / u.zoom_ratio / u.pixel_ratio * 2.0;
    return out;
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    if (PICKING_MODE) {
        return frag.color;
    }
    let dist = length(frag.normal) * frag.thickness;
    let t = smoothstep(frag.thickness - frag.feather, frag.thickness, dist);
    return mix(frag.color, vec4<f32>(0.0), t);
}
"#;

/// Arrow heads: one triangle per edge, tip on the target node border
pub const EDGE_ARROW_HEAD_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(
    @location(0) barycentric: vec3<f32>,
    @location(1) position: vec2<f32>,
    @location(2) direction: vec2<f32>,
    @location(3) radius: f32,
    @location(4) color: vec4<f32>,
    @location(5) id: vec4<f32>,
) -> VertexOutput {
    let direction_length = length(direction);
    var unit = vec2<f32>(0.0);
    if (direction_length > 0.0) {
        unit = direction / direction_length;
    }
    let normal = vec2<f32>(-unit.y, unit.x);

    let thickness = max(direction_length, u.min_edge_thickness * u.size_ratio)
        * u.correction_ratio / u.size_ratio;
    let node_radius = radius * 2.0 * u.correction_ratio / u.size_ratio;
    let head_length = thickness * u.arrow_head_length_ratio * 2.0;
    let half_width = thickness * u.arrow_head_wideness_ratio;

    let tip = position - unit * node_radius;
    let base = tip - unit * head_length;
    let corner = barycentric.x * tip
        + barycentric.y * (base + normal * half_width)
        + barycentric.z * (base - normal * half_width);
    let clip = u.view * vec3<f32>(corner, 1.0);

    var out: VertexOutput;
    out.clip = vec4<f32>(clip.xy, 0.0, 1.0);
    out.color = output_color(color, id);
    return out;
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    return frag.color;
}
"#;

/// Full WGSL module of a program, in its visual or picking variant
pub fn program_source(shader: &str, picking: bool) -> String {
    format!("const PICKING_MODE: bool = {picking};\n{UNIFORMS}\n{shader}")
}
