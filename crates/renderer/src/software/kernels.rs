//! CPU versions of the catalog fragment programs.
//!
//! Each kernel follows its GLSL body statement for statement so the software
//! backend produces the same image a GPU would, up to filtering precision.

use catalog::{distortion_mode, EffectKind};

use super::sampler::Texture;
use crate::uniforms::ResolvedUniforms;

pub(crate) struct ShadeInputs<'a> {
    pub image: Texture<'a>,
    pub lut: Option<Texture<'a>>,
    pub uniforms: &'a ResolvedUniforms,
}

pub(crate) fn shade(kind: EffectKind, inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    match kind {
        EffectKind::Blur => blur(inputs, uv),
        EffectKind::Sharpen => sharpen(inputs, uv),
        EffectKind::ChromaKey => chroma_key(inputs, uv),
        EffectKind::Vignette => vignette(inputs, uv),
        EffectKind::EdgeDetect => edge_detect(inputs, uv),
        EffectKind::Bloom => bloom(inputs, uv),
        EffectKind::ChromaticAberration => chromatic_aberration(inputs, uv),
        EffectKind::Distortion => distortion(inputs, uv),
        EffectKind::ColorCorrection => color_correction(inputs, uv),
        EffectKind::Lut => lut(inputs, uv),
    }
}

fn tex(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    inputs.image.sample(uv[0], uv[1])
}

fn rgb(color: [f32; 4]) -> [f32; 3] {
    [color[0], color[1], color[2]]
}

fn with_alpha(color: [f32; 3], alpha: f32) -> [f32; 4] {
    [color[0], color[1], color[2], alpha]
}

fn luminance(color: [f32; 3]) -> f32 {
    color[0] * 0.299 + color[1] * 0.587 + color[2] * 0.114
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

fn mix3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [mix(a[0], b[0], t), mix(a[1], b[1], t), mix(a[2], b[2], t)]
}

fn clamp3(c: [f32; 3]) -> [f32; 3] {
    c.map(|v| v.clamp(0.0, 1.0))
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn distance3(a: [f32; 3], b: [f32; 3]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

fn texel_step(inputs: &ShadeInputs<'_>, scale: f32) -> [f32; 2] {
    let resolution = inputs.uniforms.vec2("resolution");
    [scale / resolution[0], scale / resolution[1]]
}

fn blur(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let texel = texel_step(inputs, inputs.uniforms.float("radius"));
    let mut sum = [0.0f32; 4];
    let mut weight_sum = 0.0f32;
    for y in -2..=2 {
        for x in -2..=2 {
            let (ox, oy) = (x as f32, y as f32);
            let weight = (-(ox * ox + oy * oy) / 2.0).exp();
            let tap = tex(inputs, [uv[0] + ox * texel[0], uv[1] + oy * texel[1]]);
            for channel in 0..4 {
                sum[channel] += tap[channel] * weight;
            }
            weight_sum += weight;
        }
    }
    sum.map(|v| v / weight_sum)
}

fn sharpen(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let texel = texel_step(inputs, 1.0);
    let center = tex(inputs, uv);
    let taps = [
        tex(inputs, [uv[0] + texel[0], uv[1]]),
        tex(inputs, [uv[0] - texel[0], uv[1]]),
        tex(inputs, [uv[0], uv[1] + texel[1]]),
        tex(inputs, [uv[0], uv[1] - texel[1]]),
    ];
    let amount = inputs.uniforms.float("amount");
    let mut sharpened = [0.0; 3];
    for channel in 0..3 {
        let neighbors: f32 = taps.iter().map(|tap| tap[channel]).sum();
        sharpened[channel] = center[channel] + (center[channel] - neighbors * 0.25) * amount;
    }
    with_alpha(clamp3(sharpened), center[3])
}

fn chroma_key(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let color = tex(inputs, uv);
    let key = inputs.uniforms.vec3("keyColor");
    let tolerance = inputs.uniforms.float("tolerance");
    let softness = inputs.uniforms.float("softness");
    let spill = inputs.uniforms.float("spillSuppression");

    let dist = distance3(rgb(color), key);
    let edge = tolerance + softness.max(0.0001);
    let alpha = smoothstep(tolerance, edge, dist);
    let proximity = 1.0 - dist.clamp(0.0, 1.0);
    let despilled = [
        color[0] * (1.0 - key[0]),
        color[1] * (1.0 - key[1]),
        color[2] * (1.0 - key[2]),
    ];
    with_alpha(mix3(rgb(color), despilled, spill * proximity), color[3] * alpha)
}

fn vignette(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let color = tex(inputs, uv);
    let size = inputs.uniforms.float("size");
    let softness = inputs.uniforms.float("softness");
    let amount = inputs.uniforms.float("amount");

    let dist = ((uv[0] - 0.5).powi(2) + (uv[1] - 0.5).powi(2)).sqrt();
    let inner = size - softness.max(0.0001);
    let factor = 1.0 - smoothstep(inner, size, dist);
    let darkened = rgb(color).map(|c| c * factor);
    with_alpha(mix3(rgb(color), darkened, amount), color[3])
}

fn edge_detect(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let resolution = inputs.uniforms.vec2("resolution");
    let luma_at = |dx: f32, dy: f32| {
        luminance(rgb(tex(
            inputs,
            [uv[0] + dx / resolution[0], uv[1] + dy / resolution[1]],
        )))
    };
    let tl = luma_at(-1.0, -1.0);
    let t = luma_at(0.0, -1.0);
    let tr = luma_at(1.0, -1.0);
    let l = luma_at(-1.0, 0.0);
    let r = luma_at(1.0, 0.0);
    let bl = luma_at(-1.0, 1.0);
    let b = luma_at(0.0, 1.0);
    let br = luma_at(1.0, 1.0);

    let gx = -tl - 2.0 * l - bl + tr + 2.0 * r + br;
    let gy = -tl - 2.0 * t - tr + bl + 2.0 * b + br;
    let edge = ((gx * gx + gy * gy).sqrt() * inputs.uniforms.float("strength")).clamp(0.0, 1.0);
    [edge, edge, edge, tex(inputs, uv)[3]]
}

fn bloom(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let color = tex(inputs, uv);
    let texel = texel_step(inputs, inputs.uniforms.float("radius"));
    let threshold = inputs.uniforms.float("threshold");
    let mut bright = [0.0f32; 3];
    for y in -1..=1 {
        for x in -1..=1 {
            let tap = rgb(tex(
                inputs,
                [uv[0] + x as f32 * texel[0], uv[1] + y as f32 * texel[1]],
            ));
            // step(threshold, l) is 1.0 when l >= threshold
            let pass = if luminance(tap) >= threshold { 1.0 } else { 0.0 };
            for channel in 0..3 {
                bright[channel] += tap[channel] * pass;
            }
        }
    }
    let intensity = inputs.uniforms.float("intensity");
    let mut out = [0.0; 3];
    for channel in 0..3 {
        out[channel] = color[channel] + bright[channel] / 9.0 * intensity;
    }
    with_alpha(clamp3(out), color[3])
}

fn chromatic_aberration(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let amount = inputs.uniforms.float("amount");
    let direction = [uv[0] - 0.5, uv[1] - 0.5];
    let color = tex(inputs, uv);
    let red = tex(
        inputs,
        [uv[0] + direction[0] * amount, uv[1] + direction[1] * amount],
    )[0];
    let blue = tex(
        inputs,
        [uv[0] - direction[0] * amount, uv[1] - direction[1] * amount],
    )[2];
    [red, color[1], blue, color[3]]
}

fn distortion(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let strength = inputs.uniforms.float("strength");
    let frequency = inputs.uniforms.float("frequency");
    let time = inputs.uniforms.float("time");
    let centered = [uv[0] - 0.5, uv[1] - 0.5];
    let radius_sq = centered[0] * centered[0] + centered[1] * centered[1];
    let mode = (inputs.uniforms.float("mode") + 0.5).trunc();

    let sampled = if mode == distortion_mode::BARREL {
        let scale = 1.0 + strength * radius_sq;
        [0.5 + centered[0] * scale, 0.5 + centered[1] * scale]
    } else if mode == distortion_mode::PINCUSHION {
        let scale = 1.0 - strength * radius_sq;
        [0.5 + centered[0] * scale, 0.5 + centered[1] * scale]
    } else if mode == distortion_mode::WAVE {
        let wave = [
            (uv[1] * frequency + time).sin(),
            (uv[0] * frequency + time).cos(),
        ];
        [
            uv[0] + wave[0] * strength * 0.05,
            uv[1] + wave[1] * strength * 0.05,
        ]
    } else {
        let dist = radius_sq.sqrt();
        let direction = [
            centered[0] / dist.max(0.00001),
            centered[1] / dist.max(0.00001),
        ];
        let offset = (dist * frequency - time).sin() * strength * 0.05;
        [uv[0] + direction[0] * offset, uv[1] + direction[1] * offset]
    };
    tex(inputs, sampled)
}

fn rgb2hsv(c: [f32; 3]) -> [f32; 3] {
    let k = [0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0];
    let s1 = if c[1] >= c[2] { 1.0 } else { 0.0 };
    let p = [
        mix(c[2], c[1], s1),
        mix(c[1], c[2], s1),
        mix(k[3], k[0], s1),
        mix(k[2], k[1], s1),
    ];
    let s2 = if c[0] >= p[0] { 1.0 } else { 0.0 };
    let q = [
        mix(p[0], c[0], s2),
        mix(p[1], p[1], s2),
        mix(p[3], p[2], s2),
        mix(c[0], p[0], s2),
    ];
    let d = q[0] - q[3].min(q[1]);
    let e = 1.0e-10;
    [
        (q[2] + (q[3] - q[1]) / (6.0 * d + e)).abs(),
        d / (q[0] + e),
        q[0],
    ]
}

fn hsv2rgb(c: [f32; 3]) -> [f32; 3] {
    let k = [1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0];
    let p = [
        (fract(c[0] + k[0]) * 6.0 - k[3]).abs(),
        (fract(c[0] + k[1]) * 6.0 - k[3]).abs(),
        (fract(c[0] + k[2]) * 6.0 - k[3]).abs(),
    ];
    p.map(|v| c[2] * mix(k[0], (v - k[0]).clamp(0.0, 1.0), c[1]))
}

fn color_correction(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let u = inputs.uniforms;
    let color = tex(inputs, uv);
    let exposure = u.float("exposure").exp2();
    let brightness = u.float("brightness");
    let contrast = u.float("contrast");
    let mut out = rgb(color).map(|c| ((c * exposure + brightness) - 0.5) * contrast + 0.5);

    let mut hsv = rgb2hsv(clamp3(out));
    hsv[0] = fract(hsv[0] + u.float("hue") / 360.0);
    hsv[1] = (hsv[1] * u.float("saturation")).clamp(0.0, 1.0);
    out = hsv2rgb(hsv);

    let temperature = u.float("temperature");
    out[0] += temperature * 0.1;
    out[2] -= temperature * 0.1;
    out[1] += u.float("tint") * 0.1;
    with_alpha(clamp3(out), color[3])
}

fn lut(inputs: &ShadeInputs<'_>, uv: [f32; 2]) -> [f32; 4] {
    let color = tex(inputs, uv);
    let Some(table) = inputs.lut else {
        return color;
    };
    let size = inputs.uniforms.float("lutSize");
    let c = clamp3(rgb(color));

    let blue = c[2] * (size - 1.0);
    let slice0 = blue.floor();
    let slice1 = (slice0 + 1.0).min(size - 1.0);
    let t = blue - slice0;
    let x = (c[0] * (size - 1.0) + 0.5) / (size * size);
    let y = (c[1] * (size - 1.0) + 0.5) / size;
    let low = rgb(table.sample(x + slice0 / size, y));
    let high = rgb(table.sample(x + slice1 / size, y));
    let graded = mix3(low, high, t);

    with_alpha(
        mix3(rgb(color), graded, inputs.uniforms.float("intensity")),
        color[3],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_round_trip_is_stable() {
        for color in [[0.2, 0.4, 0.6], [1.0, 0.0, 0.0], [0.5, 0.5, 0.5], [0.1, 0.9, 0.3]] {
            let back = hsv2rgb(rgb2hsv(color));
            for channel in 0..3 {
                assert!((back[channel] - color[channel]).abs() < 1e-4, "{color:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn hue_of_pure_colors() {
        assert!(rgb2hsv([1.0, 0.0, 0.0])[0].abs() < 1e-6);
        assert!((rgb2hsv([0.0, 1.0, 0.0])[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!((rgb2hsv([0.0, 0.0, 1.0])[0] - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn smoothstep_matches_glsl() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
    }
}
