use std::borrow::Cow;
use std::fmt;

use image::RgbaImage;
use serde::Serialize;

use crate::error::RenderError;

/// Snapshot of what the graphics hardware can do.
///
/// `available` and `full_featured` are the two support tiers: any usable
/// adapter, and an adapter meeting the full (non-downlevel) feature set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuCapabilities {
    pub available: bool,
    pub full_featured: bool,
    pub max_texture_size: u32,
    pub max_renderbuffer_size: u32,
    pub vendor: String,
    pub renderer: String,
    pub backend: String,
    pub software: bool,
}

impl GpuCapabilities {
    /// All-false capabilities reported when no adapter could be created.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            full_featured: false,
            max_texture_size: 0,
            max_renderbuffer_size: 0,
            vendor: String::new(),
            renderer: String::new(),
            backend: String::new(),
            software: false,
        }
    }

    /// Capabilities of the CPU rasterizer in [`crate::software`].
    pub fn software_rasterizer() -> Self {
        Self {
            available: true,
            full_featured: false,
            max_texture_size: SOFTWARE_MAX_TEXTURE_SIZE,
            max_renderbuffer_size: SOFTWARE_MAX_TEXTURE_SIZE,
            vendor: "gpufx".to_string(),
            renderer: "software rasterizer".to_string(),
            backend: "cpu".to_string(),
            software: true,
        }
    }
}

/// Largest edge the software backend advertises. Keeps it in the low tier.
pub const SOFTWARE_MAX_TEXTURE_SIZE: u32 = 2048;

/// RGBA8 pixels of one input frame. Rows are top to bottom.
#[derive(Clone)]
pub struct FrameSource<'a> {
    width: u32,
    height: u32,
    pixels: Cow<'a, [u8]>,
}

impl<'a> FrameSource<'a> {
    pub fn new(width: u32, height: u32, pixels: impl Into<Cow<'a, [u8]>>) -> Result<Self, RenderError> {
        let pixels = pixels.into();
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidFrame(format!(
                "frame must have non-zero dimensions, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::InvalidFrame(format!(
                "{width}x{height} frame needs {expected} bytes of RGBA8, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn from_image(image: &'a RgbaImage) -> Result<Self, RenderError> {
        Self::new(image.width(), image.height(), image.as_raw().as_slice())
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<FrameSource<'static>, RenderError> {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect::<Vec<_>>();
        FrameSource::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_owned(self) -> FrameSource<'static> {
        FrameSource {
            width: self.width,
            height: self.height,
            pixels: Cow::Owned(self.pixels.into_owned()),
        }
    }
}

impl fmt::Debug for FrameSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSource")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

impl GpuPowerPreference {
    pub(crate) fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Backend handle for one linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u64);

/// Encodings supported by canvas export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    /// Guesses the format from a file extension (`png`, `jpg`, `jpeg`, `webp`).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        })
    }
}
