//! Headless wgpu implementation of [`GraphicsBackend`].

pub(crate) mod context;
mod pipeline;
mod target;

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, trace};

use crate::backend::{GraphicsBackend, ProgramSource, ShaderDiagnostics};
use crate::lut::LutImage;
use crate::types::{FrameSource, GpuCapabilities, GpuPowerPreference, ProgramId};
use crate::uniforms::ResolvedUniforms;

use context::GpuContext;
use pipeline::{EffectPipeline, PipelineLayouts};
use target::{create_lut_texture, FrameTargets};

struct GpuResources {
    context: GpuContext,
    layouts: PipelineLayouts,
    targets: Option<FrameTargets>,
    lut_view: Option<wgpu::TextureView>,
    pipelines: HashMap<ProgramId, EffectPipeline>,
}

/// Renders into an offscreen canvas texture on the default adapter.
pub struct WgpuBackend {
    resources: Option<GpuResources>,
    capabilities: GpuCapabilities,
    next_program: u64,
}

impl WgpuBackend {
    pub fn new(power: GpuPowerPreference) -> Result<Self> {
        let context = GpuContext::new(power)?;
        let layouts = PipelineLayouts::new(&context.device);
        let capabilities = context.capabilities.clone();
        Ok(Self {
            resources: Some(GpuResources {
                context,
                layouts,
                targets: None,
                lut_view: None,
                pipelines: HashMap::new(),
            }),
            capabilities,
            next_program: 1,
        })
    }

    fn resources(&self) -> Result<&GpuResources> {
        self.resources
            .as_ref()
            .ok_or_else(|| anyhow!("wgpu backend has been released"))
    }

    fn resources_mut(&mut self) -> Result<&mut GpuResources> {
        self.resources
            .as_mut()
            .ok_or_else(|| anyhow!("wgpu backend has been released"))
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    fn canvas_size(&self) -> (u32, u32) {
        self.resources
            .as_ref()
            .and_then(|resources| resources.targets.as_ref())
            .map_or((0, 0), |targets| (targets.width, targets.height))
    }

    fn upload_frame(&mut self, frame: &FrameSource<'_>) -> Result<()> {
        let resources = self.resources_mut()?;
        let device = &resources.context.device;
        let queue = &resources.context.queue;

        let resize = resources
            .targets
            .as_ref()
            .is_none_or(|targets| (targets.width, targets.height) != frame.size());
        if resize {
            debug!(width = frame.width(), height = frame.height(), "resizing canvas");
            resources.targets = Some(FrameTargets::new(device, frame.width(), frame.height()));
        }
        let Some(targets) = resources.targets.as_ref() else {
            bail!("canvas targets missing after resize");
        };

        targets.upload(queue, frame);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gpufx upload encoder"),
        });
        targets.copy_input_to_canvas(&mut encoder);
        queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn upload_lut(&mut self, lut: &LutImage) -> Result<()> {
        let resources = self.resources_mut()?;
        resources.lut_view = Some(create_lut_texture(
            &resources.context.device,
            &resources.context.queue,
            lut,
        ));
        Ok(())
    }

    fn compile_program(
        &mut self,
        source: &ProgramSource<'_>,
    ) -> std::result::Result<ProgramId, ShaderDiagnostics> {
        let id = ProgramId(self.next_program);
        let Some(resources) = self.resources.as_mut() else {
            return Err(ShaderDiagnostics::new("link", "context has been released"));
        };
        let pipeline = EffectPipeline::new(&resources.context.device, &mut resources.layouts, source)?;
        resources.pipelines.insert(id, pipeline);
        self.next_program += 1;
        trace!(kind = %source.kind, program = id.0, "linked effect program");
        Ok(id)
    }

    fn draw(&mut self, program: ProgramId, uniforms: &ResolvedUniforms) -> Result<()> {
        let resources = self.resources()?;
        let Some(pipeline) = resources.pipelines.get(&program) else {
            bail!("program {program:?} does not exist");
        };
        let Some(targets) = resources.targets.as_ref() else {
            bail!("no frame has been uploaded");
        };
        let device = &resources.context.device;
        let queue = &resources.context.queue;
        let layouts = &resources.layouts;

        pipeline.write_uniforms(queue, &uniforms.std140_words());

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&targets.input_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&layouts.sampler),
            },
        ];
        if pipeline.kind.samples_lut() {
            let Some(lut_view) = resources.lut_view.as_ref() else {
                bail!("{} program needs a LUT but none is bound", pipeline.kind);
            };
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(lut_view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(&layouts.sampler),
            });
        }
        let images = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("effect image bind group"),
            layout: layouts.texture_layout(pipeline.kind),
            entries: &entries,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gpufx draw encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("effect pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &targets.canvas_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pipeline.draw(&mut pass, layouts, &images);
        }
        targets.copy_canvas_to_input(&mut encoder);
        queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_pixels(&self) -> Result<Vec<u8>> {
        let resources = self.resources()?;
        let Some(targets) = resources.targets.as_ref() else {
            bail!("no frame has been uploaded");
        };
        targets.read_canvas(&resources.context.device, &resources.context.queue)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(resources) = self.resources.as_mut() {
            resources.pipelines.remove(&program);
        }
    }

    fn release(&mut self) {
        if let Some(resources) = self.resources.take() {
            debug!(programs = resources.pipelines.len(), "releasing GPU resources");
        }
    }

    fn is_lost(&self) -> bool {
        self.resources
            .as_ref()
            .is_some_and(|resources| resources.context.is_lost())
    }
}

#[cfg(test)]
mod tests {
    use catalog::{EffectChain, EffectKind, EffectSpec};

    use super::*;
    use crate::effect_renderer::EffectRenderer;

    fn gpu_renderer() -> Option<EffectRenderer> {
        match WgpuBackend::new(GpuPowerPreference::Low) {
            Ok(backend) => Some(EffectRenderer::new(Box::new(backend))),
            Err(err) => {
                eprintln!("skipping wgpu test, no adapter: {err:#}");
                None
            }
        }
    }

    #[test]
    fn compiles_and_draws_every_kind() {
        let Some(mut renderer) = gpu_renderer() else {
            return;
        };
        let frame = FrameSource::solid(8, 6, [128, 128, 128, 255]).unwrap();
        let chain = EffectKind::ALL
            .iter()
            .fold(EffectChain::new(), |chain, &kind| chain.then(EffectSpec::new(kind)));

        let canvas = renderer.render(&frame, &chain).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (8, 6));
        assert_eq!(canvas.read_pixels().unwrap().len(), 8 * 6 * 4);

        let first = renderer.program(EffectKind::Blur).unwrap();
        assert_eq!(renderer.program(EffectKind::Blur).unwrap(), first);
        assert_eq!(renderer.stats().programs_compiled, EffectKind::ALL.len() as u64);
    }

    #[test]
    fn empty_chain_reads_back_the_frame() {
        let Some(mut renderer) = gpu_renderer() else {
            return;
        };
        let frame = FrameSource::solid(5, 3, [10, 200, 30, 255]).unwrap();
        let pixels = renderer
            .render(&frame, &EffectChain::new())
            .unwrap()
            .read_pixels()
            .unwrap();
        assert_eq!(pixels, frame.pixels());
    }

    #[test]
    fn vignette_darkens_corners() {
        let Some(mut renderer) = gpu_renderer() else {
            return;
        };
        let frame = FrameSource::solid(16, 16, [128, 128, 128, 255]).unwrap();
        let chain = EffectChain::new().then(
            EffectSpec::new(EffectKind::Vignette)
                .with("amount", 1.0)
                .with("size", 0.5)
                .with("softness", 0.1),
        );
        let pixels = renderer.render(&frame, &chain).unwrap().read_pixels().unwrap();
        let center = pixels[((8 * 16 + 8) * 4) as usize];
        let corner = pixels[0];
        assert!(center >= corner, "center {center} corner {corner}");

        renderer.dispose();
        assert!(renderer.is_disposed());
    }
}
