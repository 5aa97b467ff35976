use anyhow::{anyhow, Context, Result};

use crate::types::FrameSource;

pub(crate) const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// The input texture programs sample and the canvas they render into.
pub(crate) struct FrameTargets {
    pub width: u32,
    pub height: u32,
    pub input: wgpu::Texture,
    pub input_view: wgpu::TextureView,
    pub canvas: wgpu::Texture,
    pub canvas_view: wgpu::TextureView,
}

impl FrameTargets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let input = create_texture(
            device,
            "gpufx input",
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        );
        let canvas = create_texture(
            device,
            "gpufx canvas",
            width,
            height,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        );
        let input_view = input.create_view(&wgpu::TextureViewDescriptor::default());
        let canvas_view = canvas.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            width,
            height,
            input,
            input_view,
            canvas,
            canvas_view,
        }
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    pub fn upload(&self, queue: &wgpu::Queue, frame: &FrameSource<'_>) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.input,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            frame.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.width),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );
    }

    pub fn copy_input_to_canvas(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_texture(
            self.input.as_image_copy(),
            self.canvas.as_image_copy(),
            self.extent(),
        );
    }

    pub fn copy_canvas_to_input(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_texture(
            self.canvas.as_image_copy(),
            self.input.as_image_copy(),
            self.extent(),
        );
    }

    /// Copies the canvas into host memory, removing row padding.
    pub fn read_canvas(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<u8>> {
        let unpadded = 4 * self.width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gpufx readback"),
            size: u64::from(padded) * u64::from(self.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gpufx readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            self.canvas.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            self.extent(),
        );
        queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("failed to wait for canvas readback: {err}"))?;
        receiver
            .recv()
            .context("readback callback dropped")?
            .context("failed to map readback buffer")?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * self.height) as usize);
        for row in mapped.chunks(padded as usize).take(self.height as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(pixels)
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CANVAS_FORMAT,
        usage,
        view_formats: &[],
    })
}

/// Uploads a LUT strip as a filterable texture.
pub(crate) fn create_lut_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    lut: &crate::lut::LutImage,
) -> wgpu::TextureView {
    use wgpu::util::DeviceExt;

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("gpufx lut"),
            size: wgpu::Extent3d {
                width: lut.width(),
                height: lut.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CANVAS_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        lut.pixels(),
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
