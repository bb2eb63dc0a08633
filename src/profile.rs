//! Per-helmet visor and vignette profiles.

use std::fmt;
use std::str::FromStr;

/// Helmets that carry a visor profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Headgear {
    HarmSuitHelmet,
    HardsuitHelmet,
    SpaceHelmet,
    EmergencySpaceHelmet,
    IcarusHelmet,
}

impl Headgear {
    pub const ALL: [Headgear; 5] = [
        Headgear::HarmSuitHelmet,
        Headgear::HardsuitHelmet,
        Headgear::SpaceHelmet,
        Headgear::EmergencySpaceHelmet,
        Headgear::IcarusHelmet,
    ];

    /// Prefab identifier as reported by the player-state query.
    pub fn id(self) -> &'static str {
        match self {
            Headgear::HarmSuitHelmet => "ItemSuitHelmetHARM",
            Headgear::HardsuitHelmet => "ItemHardsuitHelmet",
            Headgear::SpaceHelmet => "ItemSpaceHelmet",
            Headgear::EmergencySpaceHelmet => "ItemEmergencySpaceHelmet",
            Headgear::IcarusHelmet => "ItemIcarusHelmet",
        }
    }

    pub fn profile(self) -> EffectProfile {
        // Every known helmet currently shares one visor shape
        EffectProfile::STANDARD_VISOR
    }
}

impl fmt::Display for Headgear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Returned when an identifier names no known helmet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownHeadgear(pub String);

impl fmt::Display for UnknownHeadgear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown headgear '{}'", self.0)
    }
}

impl std::error::Error for UnknownHeadgear {}

impl FromStr for Headgear {
    type Err = UnknownHeadgear;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Headgear::ALL
            .into_iter()
            .find(|h| h.id() == s)
            .ok_or_else(|| UnknownHeadgear(s.to_string()))
    }
}

/// Visor and vignette parameters applied while a helmet is closed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectProfile {
    pub reflection_radius: f32,
    pub inner_fade_start: f32,
    pub vignette_intensity: f32,
    pub vignette_blur: f32,
}

impl EffectProfile {
    pub const STANDARD_VISOR: EffectProfile = EffectProfile {
        reflection_radius: 0.45,
        inner_fade_start: 0.6,
        vignette_intensity: 0.35,
        vignette_blur: 0.4,
    };
}

/// Profile for a raw headgear identifier, if it names a known helmet.
pub fn profile_for(id: &str) -> Option<EffectProfile> {
    id.parse::<Headgear>().ok().map(Headgear::profile)
}
