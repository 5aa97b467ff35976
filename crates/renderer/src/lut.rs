//! Colour lookup tables for the `lut` effect.
//!
//! A LUT cube of edge `N` is stored as an RGBA8 strip `N * N` pixels wide and
//! `N` pixels tall: blue selects one of `N` horizontal slices, red runs along
//! x inside a slice and green runs down y. This is the layout the `lut`
//! fragment program samples.

use std::path::Path;

use anyhow::Context;
use image::RgbaImage;

use crate::error::RenderError;

pub const DEFAULT_LUT_SIZE: u32 = 16;
pub const MIN_LUT_SIZE: u32 = 2;
pub const MAX_LUT_SIZE: u32 = 64;

#[derive(Clone, PartialEq, Eq)]
pub struct LutImage {
    size: u32,
    pixels: Vec<u8>,
}

impl LutImage {
    /// A table that maps every colour to itself.
    pub fn identity(size: u32) -> Result<Self, RenderError> {
        check_size(size)?;
        let max = (size - 1) as f32;
        let mut pixels = Vec::with_capacity((size * size * size * 4) as usize);
        for g in 0..size {
            for b in 0..size {
                for r in 0..size {
                    pixels.extend_from_slice(&[
                        unit_to_byte(r as f32 / max),
                        unit_to_byte(g as f32 / max),
                        unit_to_byte(b as f32 / max),
                        255,
                    ]);
                }
            }
        }
        Ok(Self { size, pixels })
    }

    /// Parses an Adobe `.cube` 3D table. Red varies fastest in the data rows.
    pub fn from_cube(source: &str) -> Result<Self, RenderError> {
        let mut size: Option<u32> = None;
        let mut domain_min = [0.0f32; 3];
        let mut domain_max = [1.0f32; 3];
        let mut entries: Vec<[f32; 3]> = Vec::new();

        for (number, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("TITLE") {
                continue;
            }
            if line.starts_with("LUT_1D_SIZE") {
                return Err(RenderError::InvalidLut(
                    "1D tables are not supported".to_string(),
                ));
            }
            if let Some(rest) = line.strip_prefix("LUT_3D_SIZE") {
                let parsed = rest.trim().parse::<u32>().map_err(|_| {
                    RenderError::InvalidLut(format!("line {}: bad LUT_3D_SIZE", number + 1))
                })?;
                size = Some(parsed);
                continue;
            }
            if let Some(rest) = line.strip_prefix("DOMAIN_MIN") {
                domain_min = parse_triplet(rest, number)?;
                continue;
            }
            if let Some(rest) = line.strip_prefix("DOMAIN_MAX") {
                domain_max = parse_triplet(rest, number)?;
                continue;
            }
            entries.push(parse_triplet(line, number)?);
        }

        let size = size.ok_or_else(|| RenderError::InvalidLut("missing LUT_3D_SIZE".to_string()))?;
        check_size(size)?;
        let expected = (size * size * size) as usize;
        if entries.len() != expected {
            return Err(RenderError::InvalidLut(format!(
                "expected {expected} entries for a {size}^3 table, got {}",
                entries.len()
            )));
        }

        let mut pixels = vec![0u8; expected * 4];
        for (index, entry) in entries.iter().enumerate() {
            let n = size as usize;
            let (r, g, b) = (index % n, (index / n) % n, index / (n * n));
            let offset = (g * n * n + b * n + r) * 4;
            for channel in 0..3 {
                let span = domain_max[channel] - domain_min[channel];
                let unit = if span.abs() > f32::EPSILON {
                    (entry[channel] - domain_min[channel]) / span
                } else {
                    entry[channel]
                };
                pixels[offset + channel] = unit_to_byte(unit);
            }
            pixels[offset + 3] = 255;
        }
        Ok(Self { size, pixels })
    }

    /// Accepts a strip image whose width is the square of its height.
    pub fn from_strip(image: &RgbaImage) -> Result<Self, RenderError> {
        let size = image.height();
        check_size(size)?;
        if image.width() != size * size {
            return Err(RenderError::InvalidLut(format!(
                "strip must be {0}x{1} for a {1}^3 table, got {2}x{1}",
                size * size,
                size,
                image.width()
            )));
        }
        Ok(Self {
            size,
            pixels: image.as_raw().clone(),
        })
    }

    /// Loads a `.cube` file, or any image the `image` crate decodes as a strip.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let is_cube = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("cube"));
        if is_cube {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read LUT at {}", path.display()))?;
            return Self::from_cube(&source)
                .with_context(|| format!("failed to parse LUT at {}", path.display()));
        }
        let image = image::open(path)
            .with_context(|| format!("failed to open LUT image at {}", path.display()))?
            .to_rgba8();
        Self::from_strip(&image).with_context(|| format!("invalid LUT strip at {}", path.display()))
    }

    /// Edge length of the cube.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size * self.size
    }

    pub fn height(&self) -> u32 {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl std::fmt::Debug for LutImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LutImage").field("size", &self.size).finish()
    }
}

fn check_size(size: u32) -> Result<(), RenderError> {
    if (MIN_LUT_SIZE..=MAX_LUT_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(RenderError::InvalidLut(format!(
            "table size {size} outside {MIN_LUT_SIZE}..={MAX_LUT_SIZE}"
        )))
    }
}

fn parse_triplet(text: &str, number: usize) -> Result<[f32; 3], RenderError> {
    let values = text
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| RenderError::InvalidLut(format!("line {}: {err}", number + 1)))?;
    match values.as_slice() {
        [r, g, b] => Ok([*r, *g, *b]),
        _ => Err(RenderError::InvalidLut(format!(
            "line {}: expected three values, got {}",
            number + 1,
            values.len()
        ))),
    }
}

fn unit_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(lut: &LutImage, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * lut.width() + x) * 4) as usize;
        lut.pixels()[offset..offset + 4].try_into().unwrap()
    }

    #[test]
    fn identity_strip_layout() {
        let lut = LutImage::identity(4).unwrap();
        assert_eq!((lut.width(), lut.height()), (16, 4));
        assert_eq!(pixel(&lut, 0, 0), [0, 0, 0, 255]);
        // red 3, slice 2, green 1
        assert_eq!(pixel(&lut, 2 * 4 + 3, 1), [255, 85, 170, 255]);
    }

    #[test]
    fn strip_height_is_bounded_before_width_check() {
        let err = LutImage::from_strip(&RgbaImage::new(1, 70_000)).unwrap_err();
        assert!(matches!(err, RenderError::InvalidLut(_)));
        assert!(LutImage::from_strip(&RgbaImage::new(15, 4)).is_err());
        assert!(LutImage::from_strip(&RgbaImage::new(16, 4)).is_ok());
    }

    #[test]
    fn cube_identity_matches_generated_identity() {
        let mut cube = String::from("TITLE \"identity\"\n# comment\nLUT_3D_SIZE 2\n");
        for b in 0..2 {
            for g in 0..2 {
                for r in 0..2 {
                    cube.push_str(&format!("{r}.0 {g}.0 {b}.0\n"));
                }
            }
        }
        let parsed = LutImage::from_cube(&cube).unwrap();
        assert_eq!(parsed, LutImage::identity(2).unwrap());
    }

    #[test]
    fn cube_domain_is_normalised() {
        let mut cube = String::from("LUT_3D_SIZE 2\nDOMAIN_MIN 0 0 0\nDOMAIN_MAX 2 2 2\n");
        for _ in 0..8 {
            cube.push_str("1.0 2.0 0.0\n");
        }
        let parsed = LutImage::from_cube(&cube).unwrap();
        assert_eq!(pixel(&parsed, 0, 0), [128, 255, 0, 255]);
    }

    #[test]
    fn rejects_malformed_tables() {
        assert!(LutImage::from_cube("0 0 0\n").is_err());
        assert!(LutImage::from_cube("LUT_3D_SIZE 2\n0 0 0\n").is_err());
        assert!(LutImage::from_cube("LUT_1D_SIZE 16\n").is_err());
        assert!(LutImage::from_cube("LUT_3D_SIZE 2\n0 0\n").is_err());
        assert!(LutImage::identity(1).is_err());
        assert!(LutImage::from_strip(&RgbaImage::new(10, 4)).is_err());
    }

    #[test]
    fn strip_round_trips_through_image() {
        let lut = LutImage::identity(3).unwrap();
        let image = RgbaImage::from_raw(lut.width(), lut.height(), lut.pixels().to_vec()).unwrap();
        assert_eq!(LutImage::from_strip(&image).unwrap(), lut);
    }
}
