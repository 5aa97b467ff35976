//! TOML configuration for the gpufx engine.
//!
//! Every section is optional; missing sections and keys fall back to the
//! defaults below. Durations accept either a number of seconds or a
//! human-readable string such as `"16ms"`.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use renderer::{GpuPowerPreference, ImageFormat, DEFAULT_QUALITY};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_REFRESH_RATE: f32 = 60.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which graphics backend the engine should construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// GPU when one is available, otherwise the software rasterizer.
    #[default]
    Auto,
    Gpu,
    Software,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub gpu: GpuSection,
    #[serde(default)]
    pub preview: PreviewSection,
    #[serde(default)]
    pub export: ExportSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct GpuSection {
    #[serde(default)]
    pub backend: BackendChoice,
    #[serde(default)]
    pub power: GpuPowerPreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PreviewSection {
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: f32,
    #[serde(
        default = "default_frame_budget",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub frame_budget: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ExportSection {
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default = "default_quality")]
    pub quality: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            gpu: GpuSection::default(),
            preview: PreviewSection::default(),
            export: ExportSection::default(),
        }
    }
}

impl Default for PreviewSection {
    fn default() -> Self {
        Self {
            refresh_rate: DEFAULT_REFRESH_RATE,
            frame_budget: default_frame_budget(),
        }
    }
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            format: ImageFormat::default(),
            quality: DEFAULT_QUALITY,
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_refresh_rate() -> f32 {
    DEFAULT_REFRESH_RATE
}

fn default_frame_budget() -> Duration {
    Duration::from_millis(16)
}

fn default_quality() -> f32 {
    DEFAULT_QUALITY
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: EngineConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        let rate = self.preview.refresh_rate;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "preview.refresh_rate must be > 0, got {rate}"
            )));
        }

        if self.preview.frame_budget.is_zero() {
            return Err(ConfigError::Invalid(
                "preview.frame_budget must be greater than zero".into(),
            ));
        }

        let quality = self.export.quality;
        if !(0.0..=1.0).contains(&quality) {
            return Err(ConfigError::Invalid(format!(
                "export.quality must be within 0..=1, got {quality}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[gpu]
backend = "software"
power = "low"

[preview]
refresh_rate = 30
frame_budget = "33ms"

[export]
format = "webp"
quality = 0.8
"#;

    #[test]
    fn parses_sample_config() {
        let config = EngineConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.gpu.backend, BackendChoice::Software);
        assert_eq!(config.gpu.power, GpuPowerPreference::Low);
        assert_eq!(config.preview.refresh_rate, 30.0);
        assert_eq!(config.preview.frame_budget, Duration::from_millis(33));
        assert_eq!(config.export.format, ImageFormat::Webp);
        assert!((config.export.quality - 0.8).abs() < 1e-6);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = EngineConfig::from_toml_str("version = 1").expect("parse config");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.gpu.backend, BackendChoice::Auto);
        assert_eq!(config.gpu.power, GpuPowerPreference::High);
        assert_eq!(config.preview.frame_budget, Duration::from_millis(16));
        assert_eq!(config.export.format, ImageFormat::Png);
    }

    #[test]
    fn numeric_durations_are_seconds() {
        let config = EngineConfig::from_toml_str(
            r#"
[preview]
frame_budget = 0.25
"#,
        )
        .expect("parse config");
        assert_eq!(config.preview.frame_budget, Duration::from_millis(250));
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = EngineConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for input in [
            "[preview]\nrefresh_rate = 0",
            "[preview]\nframe_budget = \"0s\"",
            "[export]\nquality = 1.5",
        ] {
            let err = EngineConfig::from_toml_str(input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{input}: {err}");
        }
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = EngineConfig::from_toml_str("[gpu]\nbackend = \"vulkan\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpufx.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = EngineConfig::load(&path).expect("load config");
        let reparsed = EngineConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(config, reparsed);

        let missing = EngineConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
