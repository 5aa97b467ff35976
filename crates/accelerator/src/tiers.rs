use std::fmt;

use serde::Serialize;

pub const HIGH_TIER_TEXTURE_SIZE: u32 = 8192;
pub const MID_TIER_TEXTURE_SIZE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierLevel {
    Low,
    Mid,
    High,
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TierLevel::Low => "low",
            TierLevel::Mid => "mid",
            TierLevel::High => "high",
        })
    }
}

/// Advisory quality settings for the detected hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityTier {
    pub level: TierLevel,
    /// Largest output resolution, `(width, height)`.
    pub max_resolution: (u32, u32),
    pub max_effect_count: usize,
    pub enable_realtime: bool,
}

impl QualityTier {
    pub const HIGH: QualityTier = QualityTier {
        level: TierLevel::High,
        max_resolution: (3840, 2160),
        max_effect_count: 10,
        enable_realtime: true,
    };

    pub const MID: QualityTier = QualityTier {
        level: TierLevel::Mid,
        max_resolution: (1920, 1080),
        max_effect_count: 6,
        enable_realtime: true,
    };

    pub const LOW: QualityTier = QualityTier {
        level: TierLevel::Low,
        max_resolution: (1280, 720),
        max_effect_count: 3,
        enable_realtime: false,
    };

    pub fn for_max_texture_size(max_texture_size: u32) -> Self {
        if max_texture_size >= HIGH_TIER_TEXTURE_SIZE {
            Self::HIGH
        } else if max_texture_size >= MID_TIER_TEXTURE_SIZE {
            Self::MID
        } else {
            Self::LOW
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_texture_limits() {
        assert_eq!(QualityTier::for_max_texture_size(16384), QualityTier::HIGH);
        assert_eq!(QualityTier::for_max_texture_size(8192), QualityTier::HIGH);
        assert_eq!(QualityTier::for_max_texture_size(8191), QualityTier::MID);
        assert_eq!(QualityTier::for_max_texture_size(4096), QualityTier::MID);
        assert_eq!(QualityTier::for_max_texture_size(4095), QualityTier::LOW);
        assert_eq!(QualityTier::for_max_texture_size(0), QualityTier::LOW);
    }

    #[test]
    fn low_tier_disables_realtime() {
        let low = QualityTier::for_max_texture_size(2048);
        assert_eq!(low.level, TierLevel::Low);
        assert_eq!(low.max_resolution, (1280, 720));
        assert_eq!(low.max_effect_count, 3);
        assert!(!low.enable_realtime);
    }

    #[test]
    fn serializes_for_reports() {
        let json = serde_json::to_value(QualityTier::MID).unwrap();
        assert_eq!(json["level"], "mid");
        assert_eq!(json["max_resolution"], serde_json::json!([1920, 1080]));
        assert_eq!(json["enable_realtime"], true);
    }
}
