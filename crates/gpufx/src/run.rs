use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use accelerator::{Accelerator, ImageSequence, QualityTier, RealtimeReport};
use anyhow::{anyhow, bail, Context, Result};
use catalog::{uniform_contract, EffectChain, EffectKind, UniformType};
use fxconfig::{BackendChoice, EngineConfig};
use renderer::{CapabilityProbe, FrameSource, ImageFormat, LutImage, WgpuProbe};
use scheduler::{FrameScheduler, IntervalScheduler, ManualScheduler};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::cli::{BackendArgs, CatalogArgs, ProbeArgs, RenderArgs, SequenceArgs};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = EngineConfig::load_or_default(path)
        .with_context(|| match path {
            Some(path) => format!("failed to load config {}", path.display()),
            None => "failed to build default config".to_string(),
        })?;
    if let Some(path) = path {
        tracing::debug!(config = %path.display(), "loaded engine config");
    }
    Ok(config)
}

pub fn probe(config: &EngineConfig, args: ProbeArgs) -> Result<()> {
    let power = args.power.unwrap_or(config.gpu.power);
    let capabilities = WgpuProbe::new(power).probe();
    let tier = QualityTier::for_max_texture_size(capabilities.max_texture_size);

    if args.json {
        let report = json!({
            "capabilities": capabilities,
            "recommended": tier,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("GPU capabilities:");
    println!("  available:        {}", capabilities.available);
    println!("  full featured:    {}", capabilities.full_featured);
    println!("  max texture:      {}", capabilities.max_texture_size);
    println!("  max renderbuffer: {}", capabilities.max_renderbuffer_size);
    println!("  vendor:           {}", capabilities.vendor);
    println!("  renderer:         {}", capabilities.renderer);
    println!("  backend:          {}", capabilities.backend);
    println!("Recommended settings:");
    println!("  tier:             {}", tier.level);
    println!(
        "  max resolution:   {}x{}",
        tier.max_resolution.0, tier.max_resolution.1
    );
    println!("  max effects:      {}", tier.max_effect_count);
    println!("  realtime preview: {}", tier.enable_realtime);
    Ok(())
}

pub fn catalog(args: CatalogArgs) -> Result<()> {
    if args.json {
        let kinds: Vec<_> = EffectKind::ALL
            .iter()
            .map(|&kind| {
                let uniforms: Vec<_> = uniform_contract(kind)
                    .iter()
                    .map(|decl| {
                        json!({
                            "name": decl.name,
                            "type": decl.ty.glsl_name(),
                            "default": &decl.default[..decl.ty.components()],
                        })
                    })
                    .collect();
                json!({ "kind": kind, "uniforms": uniforms })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&kinds)?);
        return Ok(());
    }

    for kind in EffectKind::ALL {
        println!("{kind}");
        for decl in uniform_contract(kind) {
            let default = &decl.default[..decl.ty.components()];
            let default = match decl.ty {
                UniformType::Float => format!("{}", default[0]),
                _ => format!("{default:?}"),
            };
            println!("  {:<18} {:<5} = {default}", decl.name, decl.ty.glsl_name());
        }
    }
    Ok(())
}

pub fn render(config: &EngineConfig, args: RenderArgs) -> Result<()> {
    let format = output_format(args.format, &args.output, config);
    let quality = args.quality.unwrap_or(config.export.quality);
    let chain = load_chain(&args.chain)?;
    let image = image::open(&args.input)
        .with_context(|| format!("failed to decode {}", args.input.display()))?
        .to_rgba8();
    let frame = FrameSource::from_image(&image)?;

    let mut accelerator = build_accelerator(config, &args.backend)?;
    let canvas = accelerator
        .render_frame(&frame, &chain)?
        .ok_or_else(|| anyhow!("frame was dropped; see log for the render failure"))?;
    let (width, height) = (canvas.width(), canvas.height());
    let encoded = accelerator.export_frame(format, quality)?;
    fs::write(&args.output, &encoded.bytes)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    tracing::info!(
        output = %args.output.display(),
        width,
        height,
        effects = chain.len(),
        format = %format,
        "rendered frame"
    );
    accelerator.dispose();
    Ok(())
}

pub fn sequence(config: &EngineConfig, args: SequenceArgs) -> Result<()> {
    let format = args.format.unwrap_or(config.export.format);
    let quality = args.quality.unwrap_or(config.export.quality);
    let fps = args.fps.unwrap_or(config.preview.refresh_rate);
    let chain = load_chain(&args.chain)?;
    let mut video = ImageSequence::from_dir(&args.input_dir, fps)?;
    if video.is_empty() {
        bail!("no frames found in {}", args.input_dir.display());
    }
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let mut accelerator = build_accelerator(config, &args.backend)?;
    let tier = accelerator.recommended_settings();
    if !tier.enable_realtime && !args.offline {
        tracing::warn!(tier = %tier.level, "hardware tier does not recommend realtime preview");
    }

    let report = if args.offline {
        let scheduler = ManualScheduler::new(fps)?;
        play(&mut accelerator, &mut video, &chain, scheduler, &args.output_dir, format, quality)?
    } else {
        let scheduler = IntervalScheduler::new(fps)?;
        play(&mut accelerator, &mut video, &chain, scheduler, &args.output_dir, format, quality)?
    };
    let performance = accelerator.performance();

    if args.json {
        let summary = json!({
            "frames": video.len(),
            "ticks": report.ticks,
            "rendered": report.frames_rendered,
            "dropped": report.frames_dropped,
            "stopped": format!("{:?}", report.stopped).to_ascii_lowercase(),
            "performance": performance,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Sequence finished ({:?}):", report.stopped);
        println!("  rendered:   {}", report.frames_rendered);
        println!("  dropped:    {}", performance.dropped_frames);
        println!("  fps:        {:.1}", performance.fps);
        println!("  frame time: {:.2}ms", performance.frame_time_ms);
    }
    accelerator.dispose();
    Ok(())
}

fn play(
    accelerator: &mut Accelerator,
    video: &mut ImageSequence,
    chain: &EffectChain,
    scheduler: impl FrameScheduler,
    output_dir: &Path,
    format: ImageFormat,
    quality: f32,
) -> Result<RealtimeReport> {
    let mut write_error = None;
    let report = accelerator.render_video_realtime(video, chain, scheduler, |frame| {
        let Some(canvas) = frame.canvas else {
            return ControlFlow::Continue(());
        };
        let path = frame_path(output_dir, frame.tick.index, format);
        let written = canvas
            .export(format, quality)
            .map_err(anyhow::Error::from)
            .and_then(|encoded| {
                fs::write(&path, &encoded.bytes)
                    .with_context(|| format!("failed to write {}", path.display()))
            });
        match written {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => {
                write_error = Some(err);
                ControlFlow::Break(())
            }
        }
    })?;
    match write_error {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

fn frame_path(dir: &Path, index: u64, format: ImageFormat) -> PathBuf {
    dir.join(format!("frame_{index:05}.{format}"))
}

fn output_format(explicit: Option<ImageFormat>, output: &Path, config: &EngineConfig) -> ImageFormat {
    explicit
        .or_else(|| {
            output
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(ImageFormat::from_extension)
        })
        .unwrap_or(config.export.format)
}

fn load_chain(path: &Path) -> Result<EffectChain> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read effect chain {}", path.display()))?;
    EffectChain::from_json(&source)
        .with_context(|| format!("invalid effect chain {}", path.display()))
}

/// Builds and initializes an accelerator for the chosen backend. `auto`
/// falls back to the software rasterizer when no GPU initializes.
fn build_accelerator(config: &EngineConfig, args: &BackendArgs) -> Result<Accelerator> {
    let choice = args.backend.unwrap_or(config.gpu.backend);
    let power = args.power.unwrap_or(config.gpu.power);
    let budget = config.preview.frame_budget;

    let mut accelerator = match choice {
        BackendChoice::Software => software_accelerator(budget)?,
        BackendChoice::Gpu => {
            let mut accelerator = Accelerator::gpu(power).with_frame_budget(budget);
            if !accelerator.initialize(None) {
                bail!("no usable GPU found; rerun with --backend software");
            }
            accelerator
        }
        BackendChoice::Auto => {
            let mut accelerator = Accelerator::gpu(power).with_frame_budget(budget);
            if accelerator.initialize(None) {
                accelerator
            } else {
                tracing::warn!("GPU unavailable; falling back to the software renderer");
                software_accelerator(budget)?
            }
        }
    };

    if let Some(path) = &args.lut {
        let lut = LutImage::load(path)?;
        accelerator
            .load_lut(&lut)
            .with_context(|| format!("failed to bind LUT {}", path.display()))?;
    }
    Ok(accelerator)
}

fn software_accelerator(budget: std::time::Duration) -> Result<Accelerator> {
    let mut accelerator = Accelerator::software().with_frame_budget(budget);
    if !accelerator.initialize(None) {
        bail!("software renderer failed to initialize");
    }
    Ok(accelerator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_prefers_flag_then_extension() {
        let config = EngineConfig::default();
        assert_eq!(
            output_format(Some(ImageFormat::Webp), Path::new("a.png"), &config),
            ImageFormat::Webp
        );
        assert_eq!(
            output_format(None, Path::new("a.JPG"), &config),
            ImageFormat::Jpeg
        );
        assert_eq!(
            output_format(None, Path::new("a.bin"), &config),
            ImageFormat::Png
        );
    }

    #[test]
    fn frame_paths_are_zero_padded() {
        let path = frame_path(Path::new("/tmp/out"), 7, ImageFormat::Jpeg);
        assert_eq!(path, Path::new("/tmp/out/frame_00007.jpeg"));
    }
}
