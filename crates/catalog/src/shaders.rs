//! The shader catalog: one shared vertex program and one fragment program per
//! [`EffectKind`].
//!
//! Fragment programs are assembled from three parts:
//!
//! 1. [`FRAGMENT_PRELUDE`], declaring the varyings, the input image binding and
//!    the `luminance` helper shared by several effects.
//! 2. An `EffectParams` uniform block generated from the kind's
//!    [`uniform_contract`], so the std140 layout used by the renderer and the
//!    GLSL declaration always agree.
//! 3. The effect body, which defines `main`.
//!
//! Uniform contracts (every program additionally receives `vec2 resolution`):
//!
//! | kind | uniforms (defaults) |
//! |---|---|
//! | `blur` | `radius` 1.0 |
//! | `sharpen` | `amount` 1.0 |
//! | `chromaKey` | `keyColor` (0,1,0), `tolerance` 0.3, `softness` 0.1, `spillSuppression` 0.0 |
//! | `vignette` | `amount` 0.5, `size` 0.5, `softness` 0.3 |
//! | `edgeDetect` | `strength` 1.0 |
//! | `bloom` | `threshold` 0.7, `intensity` 1.0, `radius` 2.0 |
//! | `chromaticAberration` | `amount` 0.005 |
//! | `distortion` | `mode` 0 (barrel, pincushion, wave, ripple), `strength` 0.5, `frequency` 10.0, `time` 0.0 |
//! | `colorCorrection` | `brightness` 0, `contrast` 1, `exposure` 0, `saturation` 1, `hue` 0 (degrees), `temperature` 0, `tint` 0 |
//! | `lut` | `intensity` 1.0, `lutSize` 16 |

use std::fmt::Write as _;

use crate::kind::EffectKind;
use crate::layout::RESOLUTION_UNIFORM;
use crate::uniform::UniformDecl;

/// Name of the uniform carrying the edge length of the bound LUT cube.
pub const LUT_SIZE_UNIFORM: &str = "lutSize";

/// Distortion `mode` values.
pub mod distortion_mode {
    pub const BARREL: f32 = 0.0;
    pub const PINCUSHION: f32 = 1.0;
    pub const WAVE: f32 = 2.0;
    pub const RIPPLE: f32 = 3.0;
}

const BLUR_UNIFORMS: &[UniformDecl] = &[UniformDecl::float("radius", 1.0)];

const SHARPEN_UNIFORMS: &[UniformDecl] = &[UniformDecl::float("amount", 1.0)];

const CHROMA_KEY_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::vec3("keyColor", [0.0, 1.0, 0.0]),
    UniformDecl::float("tolerance", 0.3),
    UniformDecl::float("softness", 0.1),
    UniformDecl::float("spillSuppression", 0.0),
];

const VIGNETTE_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::float("amount", 0.5),
    UniformDecl::float("size", 0.5),
    UniformDecl::float("softness", 0.3),
];

const EDGE_DETECT_UNIFORMS: &[UniformDecl] = &[UniformDecl::float("strength", 1.0)];

const BLOOM_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::float("threshold", 0.7),
    UniformDecl::float("intensity", 1.0),
    UniformDecl::float("radius", 2.0),
];

const CHROMATIC_ABERRATION_UNIFORMS: &[UniformDecl] = &[UniformDecl::float("amount", 0.005)];

const DISTORTION_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::float("mode", distortion_mode::BARREL),
    UniformDecl::float("strength", 0.5),
    UniformDecl::float("frequency", 10.0),
    UniformDecl::float("time", 0.0),
];

const COLOR_CORRECTION_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::float("brightness", 0.0),
    UniformDecl::float("contrast", 1.0),
    UniformDecl::float("exposure", 0.0),
    UniformDecl::float("saturation", 1.0),
    UniformDecl::float("hue", 0.0),
    UniformDecl::float("temperature", 0.0),
    UniformDecl::float("tint", 0.0),
];

const LUT_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::float("intensity", 1.0),
    UniformDecl::float(LUT_SIZE_UNIFORM, 16.0),
];

/// The uniforms a kind's fragment program declares, in block order.
pub fn uniform_contract(kind: EffectKind) -> &'static [UniformDecl] {
    match kind {
        EffectKind::Blur => BLUR_UNIFORMS,
        EffectKind::Sharpen => SHARPEN_UNIFORMS,
        EffectKind::ChromaKey => CHROMA_KEY_UNIFORMS,
        EffectKind::Vignette => VIGNETTE_UNIFORMS,
        EffectKind::EdgeDetect => EDGE_DETECT_UNIFORMS,
        EffectKind::Bloom => BLOOM_UNIFORMS,
        EffectKind::ChromaticAberration => CHROMATIC_ABERRATION_UNIFORMS,
        EffectKind::Distortion => DISTORTION_UNIFORMS,
        EffectKind::ColorCorrection => COLOR_CORRECTION_UNIFORMS,
        EffectKind::Lut => LUT_UNIFORMS,
    }
}

/// Shared fullscreen-quad vertex program.
///
/// Consumes a 4-vertex triangle strip from two buffers: clip-space positions
/// at location 0 and texture coordinates at location 1.
pub fn vertex_source() -> &'static str {
    VERTEX_SHADER
}

/// Complete GLSL for a kind's fragment program.
pub fn fragment_source(kind: EffectKind) -> String {
    let mut source = String::with_capacity(4096);
    source.push_str(FRAGMENT_PRELUDE);
    source.push_str(&uniform_block(kind));
    if kind.samples_lut() {
        source.push_str(LUT_BINDINGS);
    }
    source.push_str(fragment_body(kind));
    source
}

fn uniform_block(kind: EffectKind) -> String {
    let mut block = String::from(
        "layout(std140, set = 0, binding = 0) uniform EffectParams {\n",
    );
    let _ = writeln!(block, "    vec2 {RESOLUTION_UNIFORM};");
    for decl in uniform_contract(kind) {
        let _ = writeln!(block, "    {} {};", decl.ty.glsl_name(), decl.name);
    }
    block.push_str("} params;\n\n");
    block
}

fn fragment_body(kind: EffectKind) -> &'static str {
    match kind {
        EffectKind::Blur => BLUR_FRAGMENT,
        EffectKind::Sharpen => SHARPEN_FRAGMENT,
        EffectKind::ChromaKey => CHROMA_KEY_FRAGMENT,
        EffectKind::Vignette => VIGNETTE_FRAGMENT,
        EffectKind::EdgeDetect => EDGE_DETECT_FRAGMENT,
        EffectKind::Bloom => BLOOM_FRAGMENT,
        EffectKind::ChromaticAberration => CHROMATIC_ABERRATION_FRAGMENT,
        EffectKind::Distortion => DISTORTION_FRAGMENT,
        EffectKind::ColorCorrection => COLOR_CORRECTION_FRAGMENT,
        EffectKind::Lut => LUT_FRAGMENT,
    }
}

const VERTEX_SHADER: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_texCoord;
layout(location = 0) out vec2 v_texCoord;

void main() {
    v_texCoord = a_texCoord;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Declarations shared by every fragment program. The image sampler lives in
/// bind group 1 next to the optional LUT sampler.
const FRAGMENT_PRELUDE: &str = r"#version 450
layout(location = 0) in vec2 v_texCoord;
layout(location = 0) out vec4 fragColor;

layout(set = 1, binding = 0) uniform texture2D u_image_texture;
layout(set = 1, binding = 1) uniform sampler u_image_sampler;
#define u_image sampler2D(u_image_texture, u_image_sampler)

float luminance(vec3 color) {
    return dot(color, vec3(0.299, 0.587, 0.114));
}

";

const LUT_BINDINGS: &str = r"layout(set = 1, binding = 2) uniform texture2D u_lut_texture;
layout(set = 1, binding = 3) uniform sampler u_lut_sampler;
#define u_lut sampler2D(u_lut_texture, u_lut_sampler)

";

const BLUR_FRAGMENT: &str = r"void main() {
    vec2 texel = params.radius / params.resolution;
    vec4 sum = vec4(0.0);
    float weightSum = 0.0;
    for (int y = -2; y <= 2; y++) {
        for (int x = -2; x <= 2; x++) {
            vec2 offset = vec2(float(x), float(y));
            float weight = exp(-dot(offset, offset) / 2.0);
            sum += texture(u_image, v_texCoord + offset * texel) * weight;
            weightSum += weight;
        }
    }
    fragColor = sum / weightSum;
}
";

const SHARPEN_FRAGMENT: &str = r"void main() {
    vec2 texel = 1.0 / params.resolution;
    vec4 center = texture(u_image, v_texCoord);
    vec3 neighbors = texture(u_image, v_texCoord + vec2(texel.x, 0.0)).rgb
        + texture(u_image, v_texCoord - vec2(texel.x, 0.0)).rgb
        + texture(u_image, v_texCoord + vec2(0.0, texel.y)).rgb
        + texture(u_image, v_texCoord - vec2(0.0, texel.y)).rgb;
    vec3 sharpened = center.rgb + (center.rgb - neighbors * 0.25) * params.amount;
    fragColor = vec4(clamp(sharpened, 0.0, 1.0), center.a);
}
";

const CHROMA_KEY_FRAGMENT: &str = r"void main() {
    vec4 color = texture(u_image, v_texCoord);
    float dist = distance(color.rgb, params.keyColor);
    float edge = params.tolerance + max(params.softness, 0.0001);
    float alpha = smoothstep(params.tolerance, edge, dist);
    float proximity = 1.0 - clamp(dist, 0.0, 1.0);
    vec3 despilled = mix(
        color.rgb,
        color.rgb * (1.0 - params.keyColor),
        params.spillSuppression * proximity
    );
    fragColor = vec4(despilled, color.a * alpha);
}
";

// 1 - smoothstep(size - softness, size, d) equals smoothstep(size, size - softness, d)
// without relying on reversed edges.
const VIGNETTE_FRAGMENT: &str = r"void main() {
    vec4 color = texture(u_image, v_texCoord);
    float dist = distance(v_texCoord, vec2(0.5));
    float inner = params.size - max(params.softness, 0.0001);
    float vignette = 1.0 - smoothstep(inner, params.size, dist);
    fragColor = vec4(mix(color.rgb, color.rgb * vignette, params.amount), color.a);
}
";

const EDGE_DETECT_FRAGMENT: &str = r"float lumaAt(vec2 offset) {
    return luminance(texture(u_image, v_texCoord + offset / params.resolution).rgb);
}

void main() {
    float tl = lumaAt(vec2(-1.0, -1.0));
    float t = lumaAt(vec2(0.0, -1.0));
    float tr = lumaAt(vec2(1.0, -1.0));
    float l = lumaAt(vec2(-1.0, 0.0));
    float r = lumaAt(vec2(1.0, 0.0));
    float bl = lumaAt(vec2(-1.0, 1.0));
    float b = lumaAt(vec2(0.0, 1.0));
    float br = lumaAt(vec2(1.0, 1.0));

    float gx = -tl - 2.0 * l - bl + tr + 2.0 * r + br;
    float gy = -tl - 2.0 * t - tr + bl + 2.0 * b + br;
    float edge = clamp(sqrt(gx * gx + gy * gy) * params.strength, 0.0, 1.0);
    fragColor = vec4(vec3(edge), texture(u_image, v_texCoord).a);
}
";

const BLOOM_FRAGMENT: &str = r"void main() {
    vec4 color = texture(u_image, v_texCoord);
    vec2 texel = params.radius / params.resolution;
    vec3 bright = vec3(0.0);
    for (int y = -1; y <= 1; y++) {
        for (int x = -1; x <= 1; x++) {
            vec3 tap = texture(u_image, v_texCoord + vec2(float(x), float(y)) * texel).rgb;
            bright += tap * step(params.threshold, luminance(tap));
        }
    }
    bright /= 9.0;
    fragColor = vec4(clamp(color.rgb + bright * params.intensity, 0.0, 1.0), color.a);
}
";

const CHROMATIC_ABERRATION_FRAGMENT: &str = r"void main() {
    vec2 direction = v_texCoord - vec2(0.5);
    vec4 color = texture(u_image, v_texCoord);
    float red = texture(u_image, v_texCoord + direction * params.amount).r;
    float blue = texture(u_image, v_texCoord - direction * params.amount).b;
    fragColor = vec4(red, color.g, blue, color.a);
}
";

const DISTORTION_FRAGMENT: &str = r"void main() {
    vec2 uv = v_texCoord;
    vec2 centered = v_texCoord - vec2(0.5);
    float radiusSq = dot(centered, centered);
    int mode = int(params.mode + 0.5);

    if (mode == 0) {
        uv = vec2(0.5) + centered * (1.0 + params.strength * radiusSq);
    } else if (mode == 1) {
        uv = vec2(0.5) + centered * (1.0 - params.strength * radiusSq);
    } else if (mode == 2) {
        vec2 wave = vec2(
            sin(v_texCoord.y * params.frequency + params.time),
            cos(v_texCoord.x * params.frequency + params.time)
        );
        uv += wave * params.strength * 0.05;
    } else {
        float dist = sqrt(radiusSq);
        vec2 direction = centered / max(dist, 0.00001);
        uv += direction * sin(dist * params.frequency - params.time) * params.strength * 0.05;
    }

    fragColor = texture(u_image, uv);
}
";

const COLOR_CORRECTION_FRAGMENT: &str = r"vec3 rgb2hsv(vec3 c) {
    vec4 K = vec4(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    vec4 p = mix(vec4(c.bg, K.wz), vec4(c.gb, K.xy), step(c.b, c.g));
    vec4 q = mix(vec4(p.xyw, c.r), vec4(c.r, p.yzx), step(p.x, c.r));
    float d = q.x - min(q.w, q.y);
    float e = 1.0e-10;
    return vec3(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

vec3 hsv2rgb(vec3 c) {
    vec4 K = vec4(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    vec3 p = abs(fract(c.xxx + K.xyz) * 6.0 - K.www);
    return c.z * mix(K.xxx, clamp(p - K.xxx, 0.0, 1.0), c.y);
}

void main() {
    vec4 color = texture(u_image, v_texCoord);
    vec3 rgb = color.rgb * exp2(params.exposure);
    rgb += params.brightness;
    rgb = (rgb - 0.5) * params.contrast + 0.5;

    vec3 hsv = rgb2hsv(clamp(rgb, 0.0, 1.0));
    hsv.x = fract(hsv.x + params.hue / 360.0);
    hsv.y = clamp(hsv.y * params.saturation, 0.0, 1.0);
    rgb = hsv2rgb(hsv);

    rgb.r += params.temperature * 0.1;
    rgb.b -= params.temperature * 0.1;
    rgb.g += params.tint * 0.1;
    fragColor = vec4(clamp(rgb, 0.0, 1.0), color.a);
}
";

const LUT_FRAGMENT: &str = r"vec3 lookup(vec3 color) {
    float size = params.lutSize;
    float blue = color.b * (size - 1.0);
    float slice0 = floor(blue);
    float slice1 = min(slice0 + 1.0, size - 1.0);
    float t = blue - slice0;
    float x = (color.r * (size - 1.0) + 0.5) / (size * size);
    float y = (color.g * (size - 1.0) + 0.5) / size;
    vec3 low = texture(u_lut, vec2(x + slice0 / size, y)).rgb;
    vec3 high = texture(u_lut, vec2(x + slice1 / size, y)).rgb;
    return mix(low, high, t);
}

void main() {
    vec4 color = texture(u_image, v_texCoord);
    vec3 graded = lookup(clamp(color.rgb, 0.0, 1.0));
    fragColor = vec4(mix(color.rgb, graded, params.intensity), color.a);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fragment_declares_its_contract() {
        for kind in EffectKind::ALL {
            let source = fragment_source(kind);
            assert!(source.starts_with("#version 450"), "{kind}");
            assert!(source.contains("void main()"), "{kind}");
            assert!(source.contains("vec2 resolution;"), "{kind}");
            for decl in uniform_contract(kind) {
                let declaration = format!("{} {};", decl.ty.glsl_name(), decl.name);
                assert!(source.contains(&declaration), "{kind} lacks {declaration}");
                assert!(
                    source.contains(&format!("params.{}", decl.name)),
                    "{kind} never reads {}",
                    decl.name
                );
            }
        }
    }

    #[test]
    fn only_lut_binds_the_lut_sampler() {
        for kind in EffectKind::ALL {
            let source = fragment_source(kind);
            assert_eq!(source.contains("u_lut_texture"), kind == EffectKind::Lut);
        }
    }

    #[test]
    fn contract_names_are_unique() {
        for kind in EffectKind::ALL {
            let contract = uniform_contract(kind);
            for (index, decl) in contract.iter().enumerate() {
                assert!(decl.name != RESOLUTION_UNIFORM);
                assert!(contract[index + 1..].iter().all(|other| other.name != decl.name));
            }
        }
    }

    #[test]
    fn vertex_program_reads_both_attributes() {
        let source = vertex_source();
        assert!(source.contains("layout(location = 0) in vec2 a_position"));
        assert!(source.contains("layout(location = 1) in vec2 a_texCoord"));
    }
}
