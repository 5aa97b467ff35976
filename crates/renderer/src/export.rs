use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::error::RenderError;
use crate::types::ImageFormat;

pub const DEFAULT_QUALITY: f32 = 0.92;

/// Canvas contents encoded into an image file format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>` form of the image.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            BASE64_STANDARD.encode(&self.bytes)
        )
    }
}

/// Encodes RGBA8 pixels.
///
/// `quality` is clamped to `0.0..=1.0` and only affects JPEG. WebP output is
/// lossless. JPEG has no alpha channel, so pixels are composited onto black.
pub fn encode(
    width: u32,
    height: u32,
    pixels: &[u8],
    format: ImageFormat,
    quality: f32,
) -> Result<EncodedImage, RenderError> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(RenderError::Export(format!(
            "{width}x{height} canvas needs {expected} bytes, got {}",
            pixels.len()
        )));
    }

    let mut bytes = Vec::new();
    let result = match format {
        ImageFormat::Png => PngEncoder::new(Cursor::new(&mut bytes)).write_image(
            pixels,
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        ImageFormat::Jpeg => {
            let rgb = flatten_onto_black(pixels);
            JpegEncoder::new_with_quality(Cursor::new(&mut bytes), jpeg_quality(quality))
                .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
        }
        ImageFormat::Webp => WebPEncoder::new_lossless(Cursor::new(&mut bytes)).write_image(
            pixels,
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
    };
    result.map_err(|err| RenderError::Export(err.to_string()))?;

    Ok(EncodedImage { format, bytes })
}

fn jpeg_quality(quality: f32) -> u8 {
    let quality = if quality.is_finite() {
        quality.clamp(0.0, 1.0)
    } else {
        DEFAULT_QUALITY
    };
    ((quality * 100.0).round() as u8).max(1)
}

fn flatten_onto_black(pixels: &[u8]) -> Vec<u8> {
    pixels
        .chunks_exact(4)
        .flat_map(|px| {
            let alpha = px[3] as u32;
            [0, 1, 2].map(|channel| ((px[channel] as u32 * alpha + 127) / 255) as u8)
        })
        .collect()
}

/// Export running on a worker thread.
pub struct PendingExport {
    receiver: Receiver<Result<EncodedImage, RenderError>>,
    finished: Option<Result<EncodedImage, RenderError>>,
}

impl PendingExport {
    /// Encodes `pixels` off the calling thread.
    pub fn spawn(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        format: ImageFormat,
        quality: f32,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let result = encode(width, height, &pixels, format, quality);
            let _ = sender.send(result);
        });
        Self {
            receiver,
            finished: None,
        }
    }

    /// Returns the image once the worker has finished, `Ok(None)` before.
    pub fn poll(&mut self) -> Result<Option<EncodedImage>, RenderError> {
        if let Some(result) = self.finished.take() {
            return result.map(Some);
        }
        match self.receiver.try_recv() {
            Ok(result) => result.map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RenderError::Export(
                "export worker disconnected before returning a result".to_string(),
            )),
        }
    }

    pub fn wait(mut self) -> Result<EncodedImage, RenderError> {
        if let Some(result) = self.finished.take() {
            return result;
        }
        self.receiver.recv().map_err(|_| {
            RenderError::Export("export worker disconnected before returning a result".to_string())
        })?
    }

    pub(crate) fn failed(err: RenderError) -> Self {
        let (_, receiver) = mpsc::channel();
        Self {
            receiver,
            finished: Some(Err(err)),
        }
    }
}
