//! User-editable effect settings and the typed option store they are read from.
//!
//! Every option the stack understands is listed in [`OPTIONS`] together with its
//! section, default and bounds. Settings are rebuilt from a [`ConfigStore`] each
//! time the host refreshes them; missing keys fall back to defaults and
//! out-of-range numbers are clamped.
//!
//! # Example
//!
//! ```
//! use visorfx::{ConfigStore, EffectsConfig, MemoryConfig, OptionValue};
//!
//! let mut store = MemoryConfig::new();
//! store.set("dof.enabled", OptionValue::Bool(true)).unwrap();
//! store.set("dof.aperture", OptionValue::Float(3.0)).unwrap(); // clamped to 1.0
//!
//! let config = EffectsConfig::from_store(&store);
//! assert!(config.dof.enabled);
//! assert_eq!(config.dof.aperture, 1.0);
//! ```

use std::collections::HashMap;

use crate::autofocus::AutoFocusMode;
use crate::dof::SampleQuality;
use crate::error::EffectError;

/// A value held by the configuration store.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Choice(String),
}

/// Default value and accepted range of an option.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OptionKind {
    Bool { default: bool },
    Int { default: i32, min: i32, max: i32 },
    Float { default: f32, min: f32, max: f32 },
    Choice { default: &'static str, choices: &'static [&'static str] },
}

/// Description of one configuration option.
#[derive(Clone, Copy, Debug)]
pub struct OptionSpec {
    pub section: &'static str,
    pub key: &'static str,
    pub description: &'static str,
    pub kind: OptionKind,
}

const DOF: &str = "Depth of Field";
const AUTO_FOCUS: &str = "Depth of Field Auto Focus";
const VISOR: &str = "Helmet Visor";

/// Every option understood by the effect stack.
pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        section: DOF,
        key: "dof.enabled",
        description: "Enable depth of field",
        kind: OptionKind::Bool { default: false },
    },
    OptionSpec {
        section: DOF,
        key: "dof.focal_distance",
        description: "Distance to focus point (used when auto-focus is disabled)",
        kind: OptionKind::Float { default: 2.0, min: 0.1, max: 100.0 },
    },
    OptionSpec {
        section: DOF,
        key: "dof.focal_size",
        description: "Depth range around the focal plane that stays sharp",
        kind: OptionKind::Float { default: 0.2, min: 0.0, max: 2.0 },
    },
    OptionSpec {
        section: DOF,
        key: "dof.aperture",
        description: "Lens aperture (affects blur falloff)",
        kind: OptionKind::Float { default: 0.3, min: 0.0, max: 1.0 },
    },
    OptionSpec {
        section: DOF,
        key: "dof.max_blur_size",
        description: "Maximum blur amount away from the focal area",
        kind: OptionKind::Float { default: 5.0, min: 0.1, max: 10.0 },
    },
    OptionSpec {
        section: DOF,
        key: "dof.high_resolution",
        description: "Blur at full resolution (more expensive)",
        kind: OptionKind::Bool { default: true },
    },
    OptionSpec {
        section: DOF,
        key: "dof.sample_quality",
        description: "Blur sample quality",
        kind: OptionKind::Choice {
            default: "High",
            choices: &["Low", "Medium", "High"],
        },
    },
    OptionSpec {
        section: AUTO_FOCUS,
        key: "autofocus.enabled",
        description: "Focus automatically on what is at the centre of the screen",
        kind: OptionKind::Bool { default: false },
    },
    OptionSpec {
        section: AUTO_FOCUS,
        key: "autofocus.mode",
        description: "Focus sampling mode",
        kind: OptionKind::Choice {
            default: "SinglePoint",
            choices: &["SinglePoint", "NinePointAverage"],
        },
    },
    OptionSpec {
        section: AUTO_FOCUS,
        key: "autofocus.sample_radius",
        description: "Grid spacing for nine-point sampling (fraction of screen width)",
        kind: OptionKind::Float { default: 0.05, min: 0.01, max: 0.25 },
    },
    OptionSpec {
        section: AUTO_FOCUS,
        key: "autofocus.offset",
        description: "Offset added to the measured focus distance",
        kind: OptionKind::Float { default: 0.0, min: -10.0, max: 10.0 },
    },
    OptionSpec {
        section: AUTO_FOCUS,
        key: "autofocus.smooth_time",
        description: "Focus transition smoothing time (0 = instant)",
        kind: OptionKind::Float { default: 0.15, min: 0.0, max: 1.0 },
    },
    OptionSpec {
        section: AUTO_FOCUS,
        key: "autofocus.min_distance",
        description: "Minimum auto-focus distance",
        kind: OptionKind::Float { default: 0.5, min: 0.1, max: 10.0 },
    },
    OptionSpec {
        section: AUTO_FOCUS,
        key: "autofocus.max_distance",
        description: "Maximum auto-focus distance",
        kind: OptionKind::Float { default: 100.0, min: 10.0, max: 500.0 },
    },
    OptionSpec {
        section: AUTO_FOCUS,
        key: "autofocus.show_indicator",
        description: "Show the focus sample points on screen",
        kind: OptionKind::Bool { default: false },
    },
    OptionSpec {
        section: VISOR,
        key: "visor.enabled",
        description: "Enable the helmet visor effect",
        kind: OptionKind::Bool { default: true },
    },
    OptionSpec {
        section: VISOR,
        key: "visor.reflection_samples",
        description: "Reflection sample count (more is slower)",
        kind: OptionKind::Int { default: 32, min: 8, max: 64 },
    },
    OptionSpec {
        section: VISOR,
        key: "visor.reflection_intensity",
        description: "Strength of the reflection",
        kind: OptionKind::Float { default: 0.3, min: 0.0, max: 2.0 },
    },
];

/// Look up the description of an option by key.
pub fn option_spec(key: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|spec| spec.key == key)
}

impl OptionKind {
    /// Check the type of `value` against this option and clamp it into bounds.
    pub fn coerce(&self, value: OptionValue) -> Result<OptionValue, String> {
        match (self, value) {
            (OptionKind::Bool { .. }, OptionValue::Bool(b)) => Ok(OptionValue::Bool(b)),
            (OptionKind::Int { min, max, .. }, OptionValue::Int(i)) => {
                Ok(OptionValue::Int(i.clamp(*min, *max)))
            }
            (OptionKind::Float { min, max, .. }, OptionValue::Float(f)) => {
                if f.is_nan() {
                    return Err("NaN is not a valid value".to_string());
                }
                Ok(OptionValue::Float(f.clamp(*min, *max)))
            }
            (OptionKind::Float { min, max, .. }, OptionValue::Int(i)) => {
                Ok(OptionValue::Float((i as f32).clamp(*min, *max)))
            }
            (OptionKind::Choice { choices, .. }, OptionValue::Choice(s)) => choices
                .iter()
                .find(|c| c.eq_ignore_ascii_case(&s))
                .map(|c| OptionValue::Choice(c.to_string()))
                .ok_or_else(|| format!("'{}' is not one of {:?}", s, choices)),
            // Enumerations may also be stored by index
            (OptionKind::Choice { choices, .. }, OptionValue::Int(i)) => usize::try_from(i)
                .ok()
                .and_then(|i| choices.get(i))
                .map(|c| OptionValue::Choice(c.to_string()))
                .ok_or_else(|| format!("index {} out of range", i)),
            (kind, value) => Err(format!("expected {}, got {:?}", kind.type_name(), value)),
        }
    }

    pub fn default_value(&self) -> OptionValue {
        match *self {
            OptionKind::Bool { default } => OptionValue::Bool(default),
            OptionKind::Int { default, .. } => OptionValue::Int(default),
            OptionKind::Float { default, .. } => OptionValue::Float(default),
            OptionKind::Choice { default, .. } => OptionValue::Choice(default.to_string()),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            OptionKind::Bool { .. } => "bool",
            OptionKind::Int { .. } => "int",
            OptionKind::Float { .. } => "float",
            OptionKind::Choice { .. } => "choice",
        }
    }
}

/// Read access to persisted option values.
pub trait ConfigStore {
    /// Current raw value of `key`, if the store has one.
    fn get(&self, key: &str) -> Option<OptionValue>;
}

/// An in-memory [`ConfigStore`] that validates values on write.
#[derive(Clone, Debug, Default)]
pub struct MemoryConfig {
    values: HashMap<String, OptionValue>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value after checking its type and clamping it to the option's bounds.
    pub fn set(&mut self, key: &str, value: OptionValue) -> Result<(), EffectError> {
        let spec = option_spec(key).ok_or_else(|| EffectError::InvalidOption {
            key: key.to_string(),
            reason: "unknown option".to_string(),
        })?;
        let value = spec
            .kind
            .coerce(value)
            .map_err(|reason| EffectError::InvalidOption {
                key: key.to_string(),
                reason,
            })?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.values.remove(key)
    }
}

impl ConfigStore for MemoryConfig {
    fn get(&self, key: &str) -> Option<OptionValue> {
        self.values.get(key).cloned()
    }
}

/// Reads `key` from the store, validated against its spec, falling back to the default.
fn read(store: &dyn ConfigStore, key: &str) -> OptionValue {
    let Some(spec) = option_spec(key) else {
        log::warn!("Option '{}' is not registered", key);
        return OptionValue::Bool(false);
    };
    match store.get(key) {
        Some(value) => spec.kind.coerce(value).unwrap_or_else(|reason| {
            log::warn!("Ignoring option '{}': {}", key, reason);
            spec.kind.default_value()
        }),
        None => spec.kind.default_value(),
    }
}

fn read_bool(store: &dyn ConfigStore, key: &str) -> bool {
    matches!(read(store, key), OptionValue::Bool(true))
}

fn read_int(store: &dyn ConfigStore, key: &str) -> i32 {
    match read(store, key) {
        OptionValue::Int(i) => i,
        _ => 0,
    }
}

fn read_float(store: &dyn ConfigStore, key: &str) -> f32 {
    match read(store, key) {
        OptionValue::Float(f) => f,
        _ => 0.0,
    }
}

fn read_choice(store: &dyn ConfigStore, key: &str) -> String {
    match read(store, key) {
        OptionValue::Choice(s) => s,
        _ => String::new(),
    }
}

/// Auto-focus configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AutoFocusSettings {
    pub enabled: bool,
    pub mode: AutoFocusMode,
    pub sample_radius: f32,
    pub offset: f32,
    pub smooth_time: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub show_indicator: bool,
}

impl Default for AutoFocusSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: AutoFocusMode::SinglePoint,
            sample_radius: 0.05,
            offset: 0.0,
            smooth_time: 0.15,
            min_distance: 0.5,
            max_distance: 100.0,
            show_indicator: false,
        }
    }
}

impl AutoFocusSettings {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn mode(mut self, mode: AutoFocusMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn smooth_time(mut self, seconds: f32) -> Self {
        self.smooth_time = seconds;
        self
    }

    pub fn range(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.min_distance = min_distance;
        self.max_distance = max_distance;
        self
    }

    pub fn from_store(store: &dyn ConfigStore) -> Self {
        let mode = match read_choice(store, "autofocus.mode").as_str() {
            "NinePointAverage" => AutoFocusMode::NinePointAverage,
            _ => AutoFocusMode::SinglePoint,
        };
        Self {
            enabled: read_bool(store, "autofocus.enabled"),
            mode,
            sample_radius: read_float(store, "autofocus.sample_radius"),
            offset: read_float(store, "autofocus.offset"),
            smooth_time: read_float(store, "autofocus.smooth_time"),
            min_distance: read_float(store, "autofocus.min_distance"),
            max_distance: read_float(store, "autofocus.max_distance"),
            show_indicator: read_bool(store, "autofocus.show_indicator"),
        }
    }
}

/// Depth of field configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DofSettings {
    pub enabled: bool,
    pub focal_distance: f32,
    pub focal_size: f32,
    pub aperture: f32,
    pub max_blur_size: f32,
    pub high_resolution: bool,
    pub sample_quality: SampleQuality,
    pub near_blur: bool,
    pub foreground_overlap: f32,
    pub auto_focus: AutoFocusSettings,
}

impl Default for DofSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            focal_distance: 2.0,
            focal_size: 0.2,
            aperture: 0.3,
            max_blur_size: 5.0,
            high_resolution: true,
            sample_quality: SampleQuality::High,
            near_blur: false,
            foreground_overlap: 1.0,
            auto_focus: AutoFocusSettings::default(),
        }
    }
}

impl DofSettings {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn focal_distance(mut self, distance: f32) -> Self {
        self.focal_distance = distance;
        self
    }

    pub fn aperture(mut self, aperture: f32) -> Self {
        self.aperture = aperture;
        self
    }

    pub fn high_resolution(mut self, high_resolution: bool) -> Self {
        self.high_resolution = high_resolution;
        self
    }

    pub fn sample_quality(mut self, quality: SampleQuality) -> Self {
        self.sample_quality = quality;
        self
    }

    pub fn near_blur(mut self, near_blur: bool, foreground_overlap: f32) -> Self {
        self.near_blur = near_blur;
        self.foreground_overlap = foreground_overlap;
        self
    }

    pub fn auto_focus(mut self, auto_focus: AutoFocusSettings) -> Self {
        self.auto_focus = auto_focus;
        self
    }

    pub fn from_store(store: &dyn ConfigStore) -> Self {
        let sample_quality = match read_choice(store, "dof.sample_quality").as_str() {
            "Low" => SampleQuality::Low,
            "Medium" => SampleQuality::Medium,
            _ => SampleQuality::High,
        };
        Self {
            enabled: read_bool(store, "dof.enabled"),
            focal_distance: read_float(store, "dof.focal_distance"),
            focal_size: read_float(store, "dof.focal_size"),
            aperture: read_float(store, "dof.aperture"),
            max_blur_size: read_float(store, "dof.max_blur_size"),
            high_resolution: read_bool(store, "dof.high_resolution"),
            sample_quality,
            auto_focus: AutoFocusSettings::from_store(store),
            ..Default::default()
        }
    }
}

/// Helmet visor configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct VisorSettings {
    pub enabled: bool,
    pub reflection_samples: u32,
    pub reflection_intensity: f32,
}

impl Default for VisorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reflection_samples: 32,
            reflection_intensity: 0.3,
        }
    }
}

impl VisorSettings {
    pub fn from_store(store: &dyn ConfigStore) -> Self {
        Self {
            enabled: read_bool(store, "visor.enabled"),
            reflection_samples: read_int(store, "visor.reflection_samples").max(1) as u32,
            reflection_intensity: read_float(store, "visor.reflection_intensity"),
        }
    }
}

/// All user settings of the effect stack.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectsConfig {
    pub dof: DofSettings,
    pub visor: VisorSettings,
}

impl EffectsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store(store: &dyn ConfigStore) -> Self {
        Self {
            dof: DofSettings::from_store(store),
            visor: VisorSettings::from_store(store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_matches_defaults() {
        let store = MemoryConfig::new();
        assert_eq!(EffectsConfig::from_store(&store), EffectsConfig::default());
    }

    #[test]
    fn option_keys_are_unique() {
        for (i, a) in OPTIONS.iter().enumerate() {
            for b in &OPTIONS[i + 1..] {
                assert_ne!(a.key, b.key);
            }
        }
    }

    #[test]
    fn set_clamps_into_bounds() {
        let mut store = MemoryConfig::new();
        store
            .set("visor.reflection_samples", OptionValue::Int(500))
            .unwrap();
        store
            .set("autofocus.min_distance", OptionValue::Float(-3.0))
            .unwrap();

        assert_eq!(store.get("visor.reflection_samples"), Some(OptionValue::Int(64)));
        assert_eq!(
            store.get("autofocus.min_distance"),
            Some(OptionValue::Float(0.1))
        );
    }

    #[test]
    fn set_rejects_unknown_and_mistyped() {
        let mut store = MemoryConfig::new();
        assert!(store.set("dof.nonsense", OptionValue::Bool(true)).is_err());
        assert!(store.set("dof.enabled", OptionValue::Float(1.0)).is_err());
        assert!(
            store
                .set("dof.sample_quality", OptionValue::Choice("Ultra".into()))
                .is_err()
        );
    }

    #[test]
    fn choices_accept_index_and_any_case() {
        let mut store = MemoryConfig::new();
        store.set("dof.sample_quality", OptionValue::Int(0)).unwrap();
        store
            .set("autofocus.mode", OptionValue::Choice("ninepointaverage".into()))
            .unwrap();

        let dof = DofSettings::from_store(&store);
        assert_eq!(dof.sample_quality, SampleQuality::Low);
        assert_eq!(dof.auto_focus.mode, AutoFocusMode::NinePointAverage);
    }

    struct RawStore(HashMap<String, OptionValue>);

    impl ConfigStore for RawStore {
        fn get(&self, key: &str) -> Option<OptionValue> {
            self.0.get(key).cloned()
        }
    }

    #[test]
    fn unvalidated_store_values_are_checked_on_read() {
        let mut raw = HashMap::new();
        raw.insert("dof.max_blur_size".to_string(), OptionValue::Float(99.0));
        raw.insert("dof.enabled".to_string(), OptionValue::Choice("yes".into()));
        let store = RawStore(raw);

        let dof = DofSettings::from_store(&store);
        assert_eq!(dof.max_blur_size, 10.0);
        assert!(!dof.enabled);
    }
}
