use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fxconfig::BackendChoice;
use renderer::{GpuPowerPreference, ImageFormat};

#[derive(Parser, Debug)]
#[command(
    name = "gpufx",
    author,
    version,
    about = "GPU effect compositing engine",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Engine configuration TOML file.
    #[arg(long, global = true, env = "GPUFX_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report GPU capabilities and the recommended quality tier.
    Probe(ProbeArgs),
    /// List effect kinds and their uniforms.
    Catalog(CatalogArgs),
    /// Apply an effect chain to one image.
    Render(RenderArgs),
    /// Play an image sequence through an effect chain.
    Sequence(SequenceArgs),
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Adapter power preference: `high` or `low`.
    #[arg(long, value_name = "POWER", value_parser = parse_power)]
    pub power: Option<GpuPowerPreference>,
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Graphics backend: `auto`, `gpu`, or `software`.
    #[arg(long, value_name = "BACKEND", value_parser = parse_backend)]
    pub backend: Option<BackendChoice>,

    /// Adapter power preference: `high` or `low`.
    #[arg(long, value_name = "POWER", value_parser = parse_power)]
    pub power: Option<GpuPowerPreference>,

    /// Lookup table for `lut` effects (`.cube` file or packed strip image).
    #[arg(long, value_name = "FILE")]
    pub lut: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[arg(long, value_name = "IMG")]
    pub input: PathBuf,

    /// JSON effect chain.
    #[arg(long, value_name = "CHAIN.json")]
    pub chain: PathBuf,

    #[arg(long, value_name = "OUT")]
    pub output: PathBuf,

    /// Output encoding; defaults to the output extension, then the config.
    #[arg(long, value_name = "FORMAT", value_parser = parse_image_format)]
    pub format: Option<ImageFormat>,

    /// JPEG quality in 0..=1.
    #[arg(long, value_name = "QUALITY", value_parser = parse_quality)]
    pub quality: Option<f32>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

#[derive(Args, Debug)]
pub struct SequenceArgs {
    /// Directory of frames, played in file-name order.
    #[arg(long, value_name = "DIR")]
    pub input_dir: PathBuf,

    #[arg(long, value_name = "CHAIN.json")]
    pub chain: PathBuf,

    #[arg(long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Playback rate of the sequence; defaults to the configured refresh rate.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Render as fast as possible instead of pacing to the refresh rate.
    #[arg(long)]
    pub offline: bool,

    #[arg(long, value_name = "FORMAT", value_parser = parse_image_format)]
    pub format: Option<ImageFormat>,

    #[arg(long, value_name = "QUALITY", value_parser = parse_quality)]
    pub quality: Option<f32>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub backend: BackendArgs,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_backend(value: &str) -> Result<BackendChoice, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(BackendChoice::Auto),
        "gpu" | "wgpu" => Ok(BackendChoice::Gpu),
        "software" | "cpu" => Ok(BackendChoice::Software),
        other => Err(format!(
            "unknown backend '{other}'; expected auto, gpu, or software"
        )),
    }
}

pub fn parse_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "high" | "high-performance" => Ok(GpuPowerPreference::High),
        "low" | "low-power" => Ok(GpuPowerPreference::Low),
        other => Err(format!("unknown power preference '{other}'; expected high or low")),
    }
}

pub fn parse_image_format(value: &str) -> Result<ImageFormat, String> {
    let trimmed = value.trim();
    ImageFormat::from_extension(trimmed)
        .or_else(|| ImageFormat::from_mime(trimmed))
        .ok_or_else(|| format!("unknown image format '{trimmed}'; expected png, jpeg, or webp"))
}

pub fn parse_quality(value: &str) -> Result<f32, String> {
    let quality: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid quality '{value}'"))?;
    if !(0.0..=1.0).contains(&quality) {
        return Err(format!("quality must be within 0..=1, got {quality}"));
    }
    Ok(quality)
}
