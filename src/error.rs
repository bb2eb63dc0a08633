//! Error type shared by effect initialization, configuration and the GPU backend.

/// Errors that can occur while setting up or configuring effects.
///
/// None of these ever escape a per-frame entry point: the effect stack logs them
/// and falls back to a pass-through render or the previous parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectError {
    /// A shader required by an effect is not present in the shader library.
    ShaderMissing {
        /// Human readable effect name.
        effect: &'static str,
        /// Symbolic shader name that failed to resolve.
        shader: &'static str,
    },
    /// A configuration option had the wrong type or an unknown key.
    InvalidOption {
        /// Option key as stored in the configuration.
        key: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The rendering backend could not be created or used.
    Backend(String),
}

impl std::fmt::Display for EffectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectError::ShaderMissing { effect, shader } => {
                write!(f, "{} shader '{}' not found", effect, shader)
            }
            EffectError::InvalidOption { key, reason } => {
                write!(f, "Invalid option '{}': {}", key, reason)
            }
            EffectError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for EffectError {}
