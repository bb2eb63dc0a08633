//! Helmet visor overlay: a faint reflection of the scene around the rim of a closed visor.

use bytemuck::{Pod, Zeroable};

use crate::backend::{PassBindings, RenderBackend, ShaderLibrary};
use crate::config::VisorSettings;
use crate::error::EffectError;

/// Symbolic name of the visor shader.
pub const SHADER_NAME: &str = "helmet_visor";

pub const DEFAULT_RADIUS: f32 = 0.45;
pub const DEFAULT_INNER_FADE: f32 = 0.6;
const SAMPLE_RANGE: (u32, u32) = (8, 64);

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VisorUniforms {
    pub reflection_radius: f32,
    pub reflection_samples: u32,
    pub reflection_intensity: f32,
    pub inner_fade_start: f32,
}

/// Single-pass visor reflection effect.
pub struct HelmetVisor<S> {
    enabled: bool,
    shader: Option<S>,
    uniforms: VisorUniforms,
}

impl<S: Clone> HelmetVisor<S> {
    pub fn new(settings: &VisorSettings) -> Self {
        let mut visor = Self {
            enabled: false,
            shader: None,
            uniforms: VisorUniforms::default(),
        };
        visor.set_parameters(None, None, settings);
        visor
    }

    pub fn initialize(&mut self, library: &dyn ShaderLibrary<S>) -> Result<(), EffectError> {
        let shader = library.shader(SHADER_NAME).ok_or(EffectError::ShaderMissing {
            effect: "Helmet",
            shader: SHADER_NAME,
        })?;
        self.shader = Some(shader);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.shader.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn uniforms(&self) -> VisorUniforms {
        self.uniforms
    }

    /// Set the visor shape; `None` falls back to the default shape. Sample
    /// count and intensity always come from `settings`.
    pub fn set_parameters(&mut self, radius: Option<f32>, inner_fade: Option<f32>, settings: &VisorSettings) {
        self.uniforms = VisorUniforms {
            reflection_radius: radius.unwrap_or(DEFAULT_RADIUS).max(0.0),
            reflection_samples: settings
                .reflection_samples
                .clamp(SAMPLE_RANGE.0, SAMPLE_RANGE.1),
            reflection_intensity: settings.reflection_intensity.max(0.0),
            inner_fade_start: inner_fade.unwrap_or(DEFAULT_INNER_FADE).clamp(0.0, 1.0),
        };
    }

    pub fn render<B>(&self, backend: &mut B, source: B::Target, dest: B::Target)
    where
        B: RenderBackend<Shader = S> + ?Sized,
    {
        match self.shader.as_ref() {
            Some(shader) if self.enabled => backend.draw(
                shader,
                0,
                source,
                dest,
                PassBindings::new(bytemuck::bytes_of(&self.uniforms)),
            ),
            _ => backend.copy(source, dest),
        }
    }
}
