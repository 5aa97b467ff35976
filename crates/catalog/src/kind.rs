use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Raised when a chain names an effect outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown effect kind '{0}'")]
pub struct UnknownEffectKind(pub String);

/// The closed set of effects the catalog ships programs for.
///
/// The wire name (`as_str`) is the key used in JSON effect chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum EffectKind {
    Blur,
    Sharpen,
    ChromaKey,
    Vignette,
    EdgeDetect,
    Bloom,
    ChromaticAberration,
    Distortion,
    ColorCorrection,
    Lut,
}

impl EffectKind {
    pub const ALL: [EffectKind; 10] = [
        EffectKind::Blur,
        EffectKind::Sharpen,
        EffectKind::ChromaKey,
        EffectKind::Vignette,
        EffectKind::EdgeDetect,
        EffectKind::Bloom,
        EffectKind::ChromaticAberration,
        EffectKind::Distortion,
        EffectKind::ColorCorrection,
        EffectKind::Lut,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::Blur => "blur",
            EffectKind::Sharpen => "sharpen",
            EffectKind::ChromaKey => "chromaKey",
            EffectKind::Vignette => "vignette",
            EffectKind::EdgeDetect => "edgeDetect",
            EffectKind::Bloom => "bloom",
            EffectKind::ChromaticAberration => "chromaticAberration",
            EffectKind::Distortion => "distortion",
            EffectKind::ColorCorrection => "colorCorrection",
            EffectKind::Lut => "lut",
        }
    }

    /// Whether the fragment program samples the LUT texture in addition to the frame.
    pub fn samples_lut(self) -> bool {
        matches!(self, EffectKind::Lut)
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = UnknownEffectKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EffectKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownEffectKind(value.to_string()))
    }
}

impl TryFrom<String> for EffectKind {
    type Error = UnknownEffectKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EffectKind> for &'static str {
    fn from(kind: EffectKind) -> Self {
        kind.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in EffectKind::ALL {
            assert_eq!(kind.as_str().parse::<EffectKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "nonexistent".parse::<EffectKind>().unwrap_err();
        assert_eq!(err, UnknownEffectKind("nonexistent".into()));
        assert_eq!(err.to_string(), "unknown effect kind 'nonexistent'");
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!("ChromaKey".parse::<EffectKind>().is_err());
        assert!("chromaKey".parse::<EffectKind>().is_ok());
    }
}
