//! Screen-edge darkening with an optional blurred rim.
//!
//! The vignette pass darkens the frame towards its edges. When `blur` is
//! non-zero it also mixes in a blurred copy of the frame produced by the
//! [`SecondaryBlurCompositor`], so the edges go soft as well as dark.

use bytemuck::{Pod, Zeroable};

use crate::backend::{PassBindings, RenderBackend, ShaderLibrary, TemporaryScope};
use crate::error::EffectError;

/// Symbolic name of the vignette shader.
pub const SHADER_NAME: &str = "vignetting";
/// Symbolic name of the separable blur shader.
pub const BLUR_SHADER_NAME: &str = "separable_blur";

pub const DEFAULT_INTENSITY: f32 = 0.036;
pub const DEFAULT_BLUR: f32 = 0.0;
pub const DEFAULT_BLUR_SPREAD: f32 = 0.75;

/// Blur offsets are expressed relative to a 512 pixel base size.
const ONE_OVER_BASE_SIZE: f32 = 1.0 / 512.0;
const BLUR_ITERATIONS: usize = 2;
const MAX_AMOUNT: f32 = 0.999;

/// `1/(1-x) - 1`: zero at zero, unbounded as `x` approaches one.
pub fn remap(x: f32) -> f32 {
    1.0 / (1.0 - x) - 1.0
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BlurUniforms {
    pub offsets: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VignetteUniforms {
    pub intensity: f32,
    pub blur: f32,
    pub _padding: [f32; 2],
}

/// Two-pass separable blur on a half-resolution copy.
pub struct SecondaryBlurCompositor<S> {
    shader: Option<S>,
    spread: f32,
}

impl<S: Clone> SecondaryBlurCompositor<S> {
    pub fn new() -> Self {
        Self {
            shader: None,
            spread: DEFAULT_BLUR_SPREAD,
        }
    }

    pub fn load_shader(&mut self, library: &dyn ShaderLibrary<S>) -> Result<(), EffectError> {
        let shader = library.shader(BLUR_SHADER_NAME).ok_or(EffectError::ShaderMissing {
            effect: "SeparableBlur",
            shader: BLUR_SHADER_NAME,
        })?;
        self.shader = Some(shader);
        Ok(())
    }

    pub fn has_shader(&self) -> bool {
        self.shader.is_some()
    }

    pub fn spread(&self) -> f32 {
        self.spread
    }

    pub fn set_spread(&mut self, spread: f32) {
        self.spread = spread.max(0.0);
    }

    /// Blur a half-resolution copy of `source`, horizontally then vertically.
    ///
    /// The returned target belongs to `scope` and stays live until the scope
    /// drops. Returns `None` without touching the backend if no shader is loaded.
    pub fn render<B>(&self, scope: &mut TemporaryScope<'_, B>, source: B::Target) -> Option<B::Target>
    where
        B: RenderBackend<Shader = S> + ?Sized,
    {
        let shader = self.shader.as_ref()?;
        let full = scope.describe(source);
        let half = full.half();
        let step = self.spread * ONE_OVER_BASE_SIZE;
        let horizontal = BlurUniforms {
            offsets: [step / full.aspect(), 0.0, 0.0, 0.0],
        };
        let vertical = BlurUniforms {
            offsets: [0.0, step, 0.0, 0.0],
        };

        let mut blurred = scope.acquire(half);
        scope.copy(source, blurred);

        for _ in 0..BLUR_ITERATIONS {
            let pass = scope.acquire(half);
            scope.draw(
                shader,
                0,
                blurred,
                pass,
                PassBindings::new(bytemuck::bytes_of(&horizontal)),
            );
            scope.release(blurred);

            blurred = scope.acquire(half);
            scope.draw(
                shader,
                0,
                pass,
                blurred,
                PassBindings::new(bytemuck::bytes_of(&vertical)),
            );
            scope.release(pass);
        }

        Some(blurred)
    }
}

/// Vignette effect.
pub struct Vignette<S> {
    enabled: bool,
    shader: Option<S>,
    blur_pass: SecondaryBlurCompositor<S>,
    intensity: f32,
    blur: f32,
}

impl<S: Clone> Vignette<S> {
    pub fn new() -> Self {
        Self {
            enabled: false,
            shader: None,
            blur_pass: SecondaryBlurCompositor::new(),
            intensity: DEFAULT_INTENSITY,
            blur: DEFAULT_BLUR,
        }
    }

    /// Look up both shaders. Only the vignette shader is required; without the
    /// blur shader the rim is darkened but not softened.
    pub fn initialize(&mut self, library: &dyn ShaderLibrary<S>) -> Result<(), EffectError> {
        let shader = library.shader(SHADER_NAME).ok_or(EffectError::ShaderMissing {
            effect: "Vignette",
            shader: SHADER_NAME,
        })?;
        self.shader = Some(shader);

        if let Err(e) = self.blur_pass.load_shader(library) {
            log::warn!("{}, vignette edges will not be blurred", e);
        }
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

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn blur(&self) -> f32 {
        self.blur
    }

    pub fn blur_spread(&self) -> f32 {
        self.blur_pass.spread()
    }

    /// Set the darkening and blur amounts; `None` restores the default.
    /// The blur spread is reset to its default as well.
    pub fn set_parameters(&mut self, intensity: Option<f32>, blur: Option<f32>) {
        self.intensity = intensity.unwrap_or(DEFAULT_INTENSITY).clamp(0.0, MAX_AMOUNT);
        self.blur = blur.unwrap_or(DEFAULT_BLUR).clamp(0.0, MAX_AMOUNT);
        self.blur_pass.set_spread(DEFAULT_BLUR_SPREAD);
    }

    pub fn uniforms(&self) -> VignetteUniforms {
        VignetteUniforms {
            intensity: remap(self.intensity),
            blur: remap(self.blur),
            _padding: [0.0; 2],
        }
    }

    /// Render one frame, copying `source` through when there is nothing to do.
    pub fn render<B>(&self, backend: &mut B, source: B::Target, dest: B::Target)
    where
        B: RenderBackend<Shader = S> + ?Sized,
    {
        let Some(shader) = self.shader.as_ref().filter(|_| self.enabled) else {
            backend.copy(source, dest);
            return;
        };
        if self.blur.abs() <= 0.0 && self.intensity.abs() <= 0.0 {
            backend.copy(source, dest);
            return;
        }

        let mut scope = TemporaryScope::new(backend);
        let blurred = if self.blur.abs() > 0.0 {
            self.blur_pass.render(&mut scope, source)
        } else {
            None
        };

        let uniforms = self.uniforms();
        let mut bindings = PassBindings::new(bytemuck::bytes_of(&uniforms));
        bindings.aux[0] = blurred;
        scope.draw(shader, 0, source, dest, bindings);
    }
}
