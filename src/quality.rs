//! Render quality recommendations.
//!
//! Four fixed tiers, picked from the capability record and the caller's form
//! factor. Deliberately coarse: the point is a sane starting preset, not a
//! benchmark-driven auto-tuner.

use crate::caps::Capabilities;

/// Device class as declared by the caller. The probe cannot tell a laptop
/// from a phone, so this comes from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFactor {
    Mobile,
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    /// No usable context; render nothing fancy.
    Unsupported,
    Mobile,
    MidRangeDesktop,
    HighEndDesktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetailLevel {
    Off,
    Low,
    Medium,
    High,
}

/// A renderer preset. Embedders map these onto their own pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySettings {
    pub tier: QualityTier,
    pub antialias: bool,
    pub shadows: DetailLevel,
    pub textures: DetailLevel,
    pub max_particles: u32,
    pub target_fps: u32,
}

impl QualitySettings {
    fn for_tier(tier: QualityTier) -> Self {
        match tier {
            QualityTier::Unsupported => QualitySettings {
                tier,
                antialias: false,
                shadows: DetailLevel::Off,
                textures: DetailLevel::Low,
                max_particles: 0,
                target_fps: 0,
            },
            QualityTier::Mobile => QualitySettings {
                tier,
                antialias: false,
                shadows: DetailLevel::Low,
                textures: DetailLevel::Medium,
                max_particles: 75,
                target_fps: 30,
            },
            QualityTier::MidRangeDesktop => QualitySettings {
                tier,
                antialias: true,
                shadows: DetailLevel::Medium,
                textures: DetailLevel::High,
                max_particles: 150,
                target_fps: 60,
            },
            QualityTier::HighEndDesktop => QualitySettings {
                tier,
                antialias: true,
                shadows: DetailLevel::High,
                textures: DetailLevel::High,
                max_particles: 300,
                target_fps: 60,
            },
        }
    }
}

/// Texture dimension above which a desktop is treated as high-end. 8K
/// textures mean a reasonably current discrete or integrated GPU.
const HIGH_END_TEXTURE_SIZE: u32 = 8192;

/// Pick a preset. Pure function of its inputs.
pub fn recommended_settings(caps: &Capabilities, form_factor: FormFactor) -> QualitySettings {
    let tier = if !caps.webgl() {
        QualityTier::Unsupported
    } else if form_factor == FormFactor::Mobile {
        QualityTier::Mobile
    } else if caps.webgl2() && caps.max_texture_size >= HIGH_END_TEXTURE_SIZE {
        QualityTier::HighEndDesktop
    } else {
        QualityTier::MidRangeDesktop
    };
    QualitySettings::for_tier(tier)
}
