//! Depth of field.
//!
//! [`CocCompositor`] blurs a frame according to each pixel's circle of
//! confusion: how far its depth lies from the focal plane, scaled by the lens
//! parameters. [`DepthOfField`] wraps the compositor with an enable flag and an
//! [`AutoFocusController`] that moves the focal plane to whatever the camera is
//! looking at.
//!
//! The pass chain for one frame:
//!
//! ```text
//!             ┌─ near blur: downsample ─▶ max filter H ─▶ max filter V ─┐
//!             │                                                        ▼ (aux)
//! source ─────┴──────────────────────────────────────────────▶ CoC write ─▶ coc
//!
//! high resolution:  coc ─▶ blur (full res) ─▶ dest
//! otherwise:        coc ─▶ downsample ─▶ blur ─▶ low ─┐
//!                   coc ──────────────────────────────┴▶ composite ─▶ dest
//! ```

use bytemuck::{Pod, Zeroable};

use crate::autofocus::{AutoFocusController, FocusIndicator};
use crate::backend::{PassBindings, RenderBackend, ShaderLibrary, TemporaryScope};
use crate::camera::Camera;
use crate::config::DofSettings;
use crate::error::EffectError;
use crate::focus::FocusSampler;
use crate::picking::SceneQuery;

/// Symbolic name of the depth-of-field shader.
pub const SHADER_NAME: &str = "dof_hdr";

/// Pass indices inside the depth-of-field shader.
pub mod pass {
    pub const COC: u32 = 0;
    pub const MAX_FILTER: u32 = 2;
    pub const FOREGROUND_DOWNSAMPLE: u32 = 4;
    pub const DOWNSAMPLE: u32 = 6;
    pub const BLUR_NARROW: u32 = 11;
    pub const COMPOSITE: u32 = 12;
    pub const COC_FOREGROUND: u32 = 13;
    pub const BLUR_WIDE: u32 = 17;
    pub const COMPOSITE_FINE: u32 = 18;
}

/// Falloff of the full-resolution blur.
const FULL_RES_FALLOFF: f32 = 0.025;
/// Falloff of the half-resolution blur.
const LOW_RES_FALLOFF: f32 = 0.1;
/// Apertures are kept strictly below one so the curve term stays finite.
const MAX_APERTURE: f32 = 0.999;

/// Blur kernel quality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl SampleQuality {
    /// Blur pass used at this quality.
    pub fn blur_pass(self) -> u32 {
        match self {
            SampleQuality::Low => pass::BLUR_NARROW,
            SampleQuality::Medium | SampleQuality::High => pass::BLUR_WIDE,
        }
    }

    /// Pass that merges the half-resolution blur back into the frame.
    pub fn composite_pass(self) -> u32 {
        match self {
            SampleQuality::High => pass::COMPOSITE_FINE,
            SampleQuality::Low | SampleQuality::Medium => pass::COMPOSITE,
        }
    }
}

/// Uniform block shared by every depth-of-field pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DofUniforms {
    /// `(1, focal_size, aperture curve, focal_distance01)`.
    pub curve_params: [f32; 4],
    /// Kernel offsets; meaning depends on the pass.
    pub offsets: [f32; 4],
}

/// Lens model driving the circle of confusion.
///
/// Every setter clamps its input into the valid range, so a `LensParameters`
/// is always renderable.
#[derive(Clone, Debug, PartialEq)]
pub struct LensParameters {
    focal_distance: f32,
    focal_size: f32,
    aperture: f32,
    max_blur_size: f32,
    high_resolution: bool,
    sample_quality: SampleQuality,
    near_blur: bool,
    foreground_overlap: f32,
}

impl Default for LensParameters {
    fn default() -> Self {
        Self::from_settings(&DofSettings::default())
    }
}

impl LensParameters {
    pub fn from_settings(settings: &DofSettings) -> Self {
        let mut lens = Self {
            focal_distance: 1.0,
            focal_size: 0.0,
            aperture: 0.0,
            max_blur_size: 0.1,
            high_resolution: settings.high_resolution,
            sample_quality: settings.sample_quality,
            near_blur: settings.near_blur,
            foreground_overlap: 0.0,
        };
        lens.set_focal_distance(settings.focal_distance);
        lens.set_focal_size(settings.focal_size);
        lens.set_aperture(settings.aperture);
        lens.set_max_blur_size(settings.max_blur_size);
        lens.set_foreground_overlap(settings.foreground_overlap);
        lens
    }

    pub fn focal_distance(&self) -> f32 {
        self.focal_distance
    }

    pub fn set_focal_distance(&mut self, distance: f32) {
        self.focal_distance = distance.max(f32::EPSILON);
    }

    pub fn focal_size(&self) -> f32 {
        self.focal_size
    }

    pub fn set_focal_size(&mut self, size: f32) {
        self.focal_size = size.clamp(0.0, 2.0);
    }

    pub fn aperture(&self) -> f32 {
        self.aperture
    }

    pub fn set_aperture(&mut self, aperture: f32) {
        self.aperture = aperture.clamp(0.0, MAX_APERTURE);
    }

    pub fn max_blur_size(&self) -> f32 {
        self.max_blur_size
    }

    pub fn set_max_blur_size(&mut self, size: f32) {
        self.max_blur_size = size.max(0.1);
    }

    pub fn high_resolution(&self) -> bool {
        self.high_resolution
    }

    pub fn set_high_resolution(&mut self, high_resolution: bool) {
        self.high_resolution = high_resolution;
    }

    pub fn sample_quality(&self) -> SampleQuality {
        self.sample_quality
    }

    pub fn set_sample_quality(&mut self, quality: SampleQuality) {
        self.sample_quality = quality;
    }

    pub fn near_blur(&self) -> bool {
        self.near_blur
    }

    pub fn set_near_blur(&mut self, near_blur: bool) {
        self.near_blur = near_blur;
    }

    pub fn foreground_overlap(&self) -> f32 {
        self.foreground_overlap
    }

    pub fn set_foreground_overlap(&mut self, overlap: f32) {
        self.foreground_overlap = overlap.max(0.0);
    }

    /// Third curve term: grows without bound as the aperture opens.
    pub fn aperture_curve(&self) -> f32 {
        1.0 / (1.0 - self.aperture) - 1.0
    }

    /// Blur width in pixels, doubled at full resolution.
    pub fn blur_width(&self) -> f32 {
        if self.high_resolution {
            self.max_blur_size * 2.0
        } else {
            self.max_blur_size
        }
    }
}

/// Multi-pass circle-of-confusion blur.
pub struct CocCompositor<S> {
    shader: Option<S>,
    lens: LensParameters,
}

impl<S: Clone> CocCompositor<S> {
    pub fn new(lens: LensParameters) -> Self {
        Self { shader: None, lens }
    }

    /// Look up the shader; on failure the compositor keeps passing frames through.
    pub fn load_shader(&mut self, library: &dyn ShaderLibrary<S>) -> Result<(), EffectError> {
        let shader = library.shader(SHADER_NAME).ok_or(EffectError::ShaderMissing {
            effect: "DOF",
            shader: SHADER_NAME,
        })?;
        self.shader = Some(shader);
        Ok(())
    }

    pub fn has_shader(&self) -> bool {
        self.shader.is_some()
    }

    pub fn lens(&self) -> &LensParameters {
        &self.lens
    }

    pub fn lens_mut(&mut self) -> &mut LensParameters {
        &mut self.lens
    }

    /// Curve parameters for a focal plane `focal_distance` in front of `camera`.
    pub fn curve_params(&self, camera: &Camera, focal_distance: f32) -> [f32; 4] {
        [
            1.0,
            self.lens.focal_size,
            self.lens.aperture_curve(),
            camera.focal_distance01(focal_distance),
        ]
    }

    /// Blur `source` into `dest` with the focal plane at `focal_distance`.
    ///
    /// Without a shader or a camera the frame is copied through unchanged.
    pub fn render<B>(
        &self,
        backend: &mut B,
        camera: Option<&Camera>,
        focal_distance: f32,
        source: B::Target,
        dest: B::Target,
    ) where
        B: RenderBackend<Shader = S> + ?Sized,
    {
        let (Some(shader), Some(camera)) = (&self.shader, camera) else {
            backend.copy(source, dest);
            return;
        };

        let lens = &self.lens;
        let curve_params = self.curve_params(camera, focal_distance);
        let width = lens.blur_width();

        let mut scope = TemporaryScope::new(backend);
        let full = scope.describe(source);

        let coc = scope.acquire(full);
        self.write_coc(&mut scope, shader, curve_params, source, coc);

        let blur_pass = lens.sample_quality.blur_pass();
        if lens.high_resolution {
            let uniforms = DofUniforms {
                curve_params,
                offsets: [0.0, width, FULL_RES_FALLOFF, width],
            };
            scope.draw(
                shader,
                blur_pass,
                coc,
                dest,
                PassBindings::new(bytemuck::bytes_of(&uniforms)),
            );
        } else {
            let half = full.half();
            let low = scope.acquire(half);
            let low_blurred = scope.acquire(half);

            let uniforms = DofUniforms {
                curve_params,
                offsets: [0.0, width, LOW_RES_FALLOFF, width],
            };
            scope.draw(
                shader,
                pass::DOWNSAMPLE,
                coc,
                low,
                PassBindings::new(bytemuck::bytes_of(&uniforms)),
            );
            scope.draw(
                shader,
                blur_pass,
                low,
                low_blurred,
                PassBindings::new(bytemuck::bytes_of(&uniforms)),
            );

            let scale = full.width as f32 / half.width as f32 * width;
            let uniforms = DofUniforms {
                curve_params,
                offsets: [scale; 4],
            };
            scope.draw(
                shader,
                lens.sample_quality.composite_pass(),
                coc,
                dest,
                PassBindings::new(bytemuck::bytes_of(&uniforms)).with_aux(0, low_blurred),
            );
        }
    }

    fn write_coc<B>(
        &self,
        scope: &mut TemporaryScope<'_, B>,
        shader: &S,
        curve_params: [f32; 4],
        source: B::Target,
        coc: B::Target,
    ) where
        B: RenderBackend<Shader = S> + ?Sized,
    {
        if !self.lens.near_blur {
            let uniforms = DofUniforms {
                curve_params,
                offsets: [0.0; 4],
            };
            scope.draw(
                shader,
                pass::COC,
                source,
                coc,
                PassBindings::new(bytemuck::bytes_of(&uniforms)),
            );
            return;
        }

        let half = scope.describe(source).half();
        let dilate = self.lens.blur_width() * self.lens.foreground_overlap;

        let downsampled = scope.acquire(half);
        let uniforms = DofUniforms {
            curve_params,
            offsets: [0.0; 4],
        };
        scope.draw(
            shader,
            pass::FOREGROUND_DOWNSAMPLE,
            source,
            downsampled,
            PassBindings::new(bytemuck::bytes_of(&uniforms)),
        );

        let horizontal = scope.acquire(half);
        let uniforms = DofUniforms {
            curve_params,
            offsets: [dilate, 0.0, 0.0, dilate],
        };
        scope.draw(
            shader,
            pass::MAX_FILTER,
            downsampled,
            horizontal,
            PassBindings::new(bytemuck::bytes_of(&uniforms)),
        );
        scope.release(downsampled);

        let dilated = scope.acquire(half);
        let uniforms = DofUniforms {
            curve_params,
            offsets: [0.0, dilate, 0.0, dilate],
        };
        scope.draw(
            shader,
            pass::MAX_FILTER,
            horizontal,
            dilated,
            PassBindings::new(bytemuck::bytes_of(&uniforms)),
        );
        scope.release(horizontal);

        let uniforms = DofUniforms {
            curve_params,
            offsets: [0.0; 4],
        };
        scope.draw(
            shader,
            pass::COC_FOREGROUND,
            source,
            coc,
            PassBindings::new(bytemuck::bytes_of(&uniforms)).with_aux(1, dilated),
        );
        scope.release(dilated);
    }
}

/// Depth of field with optional auto-focus.
pub struct DepthOfField<S> {
    enabled: bool,
    compositor: CocCompositor<S>,
    auto_focus_enabled: bool,
    show_indicator: bool,
    auto_focus: AutoFocusController,
}

impl<S: Clone> DepthOfField<S> {
    pub fn new(settings: &DofSettings) -> Self {
        let lens = LensParameters::from_settings(settings);
        let auto_focus = AutoFocusController::new(&settings.auto_focus, lens.focal_distance());
        Self {
            enabled: settings.enabled,
            compositor: CocCompositor::new(lens),
            auto_focus_enabled: settings.auto_focus.enabled,
            show_indicator: settings.auto_focus.show_indicator,
            auto_focus,
        }
    }

    /// Look up the shader and put auto-focus at rest on the manual focal distance.
    pub fn initialize(&mut self, library: &dyn ShaderLibrary<S>) -> Result<(), EffectError> {
        self.compositor.load_shader(library)?;
        self.auto_focus
            .reset_to(self.compositor.lens().focal_distance());
        Ok(())
    }

    /// Apply new settings; smoothing state survives unless auto-focus was just switched on.
    pub fn configure(&mut self, settings: &DofSettings) {
        let lens = LensParameters::from_settings(settings);
        let switched_on = settings.auto_focus.enabled && !self.auto_focus_enabled;

        self.enabled = settings.enabled;
        self.auto_focus_enabled = settings.auto_focus.enabled;
        self.show_indicator = settings.auto_focus.show_indicator;
        self.auto_focus.configure(&settings.auto_focus);
        if switched_on {
            self.auto_focus.reset_to(lens.focal_distance());
        }
        *self.compositor.lens_mut() = lens;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_initialized(&self) -> bool {
        self.compositor.has_shader()
    }

    pub fn lens(&self) -> &LensParameters {
        self.compositor.lens()
    }

    pub fn lens_mut(&mut self) -> &mut LensParameters {
        self.compositor.lens_mut()
    }

    pub fn auto_focus_enabled(&self) -> bool {
        self.auto_focus_enabled
    }

    pub fn auto_focus(&self) -> &AutoFocusController {
        &self.auto_focus
    }

    /// Focal distance used for rendering: tracked when auto-focus is on, manual otherwise.
    pub fn current_focal_distance(&self) -> f32 {
        if self.auto_focus_enabled {
            self.auto_focus.current_distance()
        } else {
            self.lens().focal_distance()
        }
    }

    /// Where auto-focus is heading, or the manual focal distance.
    pub fn target_focal_distance(&self) -> f32 {
        if self.auto_focus_enabled {
            self.auto_focus.target_distance()
        } else {
            self.lens().focal_distance()
        }
    }

    /// Advance auto-focus by `dt` seconds.
    ///
    /// Skipped while disabled, with auto-focus off, or outside a ready world.
    pub fn update<Q: SceneQuery + ?Sized>(
        &mut self,
        camera: Option<&Camera>,
        scene: &Q,
        world_ready: bool,
        dt: f32,
    ) {
        if !self.enabled || !self.auto_focus_enabled || !world_ready {
            return;
        }
        let sampler = FocusSampler::new(camera, scene, self.auto_focus.max_distance());
        self.auto_focus.update(&sampler, dt);
    }

    /// Render one frame, copying `source` through when the effect cannot run.
    pub fn render<B>(
        &self,
        backend: &mut B,
        camera: Option<&Camera>,
        world_ready: bool,
        source: B::Target,
        dest: B::Target,
    ) where
        B: RenderBackend<Shader = S> + ?Sized,
    {
        if !self.enabled || !world_ready {
            backend.copy(source, dest);
            return;
        }
        self.compositor.render(
            backend,
            camera,
            self.current_focal_distance(),
            source,
            dest,
        );
    }

    /// Debug overlay for a `width` × `height` screen, when requested and meaningful.
    pub fn focus_indicator(&self, width: f32, height: f32, world_ready: bool) -> Option<FocusIndicator> {
        if !self.enabled || !self.auto_focus_enabled || !self.show_indicator || !world_ready {
            return None;
        }
        Some(self.auto_focus.indicator(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{TargetDesc, TargetFormat};
    use crate::config::AutoFocusSettings;
    use crate::recording::{RecordingBackend, Shaders};

    fn frame() -> TargetDesc {
        TargetDesc::new(640, 360, TargetFormat::Rgba16Float)
    }

    fn setup(settings: &DofSettings) -> (DepthOfField<String>, RecordingBackend, u32, u32) {
        let mut dof = DepthOfField::new(settings);
        dof.initialize(&Shaders::of(&[SHADER_NAME])).unwrap();
        let mut backend = RecordingBackend::new();
        let source = backend.create_target(frame(), "scene");
        let dest = backend.create_target(frame(), "");
        (dof, backend, source, dest)
    }

    fn passes(backend: &RecordingBackend) -> Vec<u32> {
        backend.passes().into_iter().map(|(_, pass)| pass).collect()
    }

    #[test]
    fn lens_setters_clamp() {
        let mut lens = LensParameters::default();
        lens.set_aperture(-1.0);
        assert_eq!(lens.aperture(), 0.0);
        lens.set_aperture(1.0);
        assert!(lens.aperture() < 1.0);
        assert!(lens.aperture_curve().is_finite());
        lens.set_max_blur_size(0.0);
        assert_eq!(lens.max_blur_size(), 0.1);
        lens.set_focal_size(5.0);
        assert_eq!(lens.focal_size(), 2.0);
        lens.set_foreground_overlap(-2.0);
        assert_eq!(lens.foreground_overlap(), 0.0);
    }

    #[test]
    fn quality_selects_passes() {
        assert_eq!(SampleQuality::Low.blur_pass(), pass::BLUR_NARROW);
        assert_eq!(SampleQuality::Medium.blur_pass(), pass::BLUR_WIDE);
        assert_eq!(SampleQuality::Medium.composite_pass(), pass::COMPOSITE);
        assert_eq!(SampleQuality::High.composite_pass(), pass::COMPOSITE_FINE);
    }

    #[test]
    fn disabled_passes_through_unchanged() {
        let (dof, mut backend, source, dest) = setup(&DofSettings::default().enabled(false));
        dof.render(&mut backend, Some(&Camera::new()), true, source, dest);

        assert_eq!(backend.content(dest), backend.content(source));
        assert!(backend.passes().is_empty());
        assert_eq!(backend.acquired(), 0);
    }

    #[test]
    fn uninitialized_passes_through_unchanged() {
        let dof: DepthOfField<String> = DepthOfField::new(&DofSettings::default().enabled(true));
        let mut backend = RecordingBackend::new();
        let source = backend.create_target(frame(), "scene");
        let dest = backend.create_target(frame(), "");

        dof.render(&mut backend, Some(&Camera::new()), true, source, dest);
        assert_eq!(backend.content(dest), "scene");
        assert!(!dof.is_initialized());
    }

    #[test]
    fn missing_shader_is_reported() {
        let mut dof: DepthOfField<String> = DepthOfField::new(&DofSettings::default());
        let err = dof.initialize(&Shaders::of(&[])).unwrap_err();
        assert!(matches!(err, EffectError::ShaderMissing { shader: SHADER_NAME, .. }));
    }

    #[test]
    fn no_camera_or_world_passes_through() {
        let (dof, mut backend, source, dest) = setup(&DofSettings::default().enabled(true));
        dof.render(&mut backend, None, true, source, dest);
        dof.render(&mut backend, Some(&Camera::new()), false, source, dest);

        assert_eq!(backend.content(dest), "scene");
        assert!(backend.passes().is_empty());
    }

    #[test]
    fn high_resolution_blurs_at_full_size() {
        let settings = DofSettings::default().enabled(true).high_resolution(true);
        let (dof, mut backend, source, dest) = setup(&settings);
        dof.render(&mut backend, Some(&Camera::new()), true, source, dest);

        assert_eq!(passes(&backend), vec![pass::COC, pass::BLUR_WIDE]);
        let blur = backend.uniforms_of(pass::BLUR_WIDE);
        let uniforms: DofUniforms = bytemuck::pod_read_unaligned(&blur[0]);
        assert_eq!(uniforms.offsets, [0.0, 10.0, 0.025, 10.0]);
        assert_eq!(backend.live_temporaries(), 0);
    }

    #[test]
    fn low_resolution_composites_blurred_half_frame() {
        let settings = DofSettings::default()
            .enabled(true)
            .high_resolution(false)
            .sample_quality(SampleQuality::Medium);
        let (dof, mut backend, source, dest) = setup(&settings);
        dof.render(&mut backend, Some(&Camera::new()), true, source, dest);

        assert_eq!(
            passes(&backend),
            vec![pass::COC, pass::DOWNSAMPLE, pass::BLUR_WIDE, pass::COMPOSITE]
        );
        let composite: DofUniforms =
            bytemuck::pod_read_unaligned(&backend.uniforms_of(pass::COMPOSITE)[0]);
        assert_eq!(composite.offsets, [10.0; 4]);
        assert_eq!(backend.acquired(), 3);
        assert_eq!(backend.live_temporaries(), 0);
    }

    #[test]
    fn low_quality_uses_narrow_kernel() {
        let settings = DofSettings::default()
            .enabled(true)
            .high_resolution(false)
            .sample_quality(SampleQuality::Low);
        let (dof, mut backend, source, dest) = setup(&settings);
        dof.render(&mut backend, Some(&Camera::new()), true, source, dest);

        assert!(passes(&backend).contains(&pass::BLUR_NARROW));
        assert!(passes(&backend).contains(&pass::COMPOSITE));
    }

    #[test]
    fn near_blur_dilates_foreground_first() {
        let settings = DofSettings::default()
            .enabled(true)
            .high_resolution(true)
            .near_blur(true, 0.5);
        let (dof, mut backend, source, dest) = setup(&settings);
        dof.render(&mut backend, Some(&Camera::new()), true, source, dest);

        assert_eq!(
            passes(&backend),
            vec![
                pass::FOREGROUND_DOWNSAMPLE,
                pass::MAX_FILTER,
                pass::MAX_FILTER,
                pass::COC_FOREGROUND,
                pass::BLUR_WIDE,
            ]
        );
        let filters = backend.uniforms_of(pass::MAX_FILTER);
        let horizontal: DofUniforms = bytemuck::pod_read_unaligned(&filters[0]);
        let vertical: DofUniforms = bytemuck::pod_read_unaligned(&filters[1]);
        assert_eq!(horizontal.offsets, [5.0, 0.0, 0.0, 5.0]);
        assert_eq!(vertical.offsets, [0.0, 5.0, 0.0, 5.0]);
        assert_eq!(backend.live_temporaries(), 0);
    }

    #[test]
    fn curve_params_follow_lens() {
        let settings = DofSettings::default().aperture(0.5);
        let dof: DepthOfField<String> = DepthOfField::new(&settings);
        let camera = Camera::new();
        let params = dof.compositor.curve_params(&camera, 2.0);

        assert_eq!(params[0], 1.0);
        assert_eq!(params[1], 0.2);
        assert!((params[2] - 1.0).abs() < 1e-6);
        assert!(params[3] > 0.0 && params[3] < 1.0);
    }

    #[test]
    fn buffers_balance_over_many_frames() {
        let settings = DofSettings::default().enabled(true).near_blur(true, 1.0);
        let (mut dof, mut backend, source, dest) = setup(&settings);
        let camera = Camera::new();

        for frame in 0..30 {
            dof.lens_mut().set_high_resolution(frame % 2 == 0);
            let camera = if frame % 5 == 0 { None } else { Some(&camera) };
            dof.render(&mut backend, camera, frame % 7 != 0, source, dest);
            assert_eq!(backend.live_temporaries(), 0);
        }
        assert_eq!(backend.acquired(), backend.released());
    }

    #[test]
    fn focal_distance_is_manual_without_auto_focus() {
        let dof: DepthOfField<String> = DepthOfField::new(&DofSettings::default().focal_distance(7.0));
        assert_eq!(dof.current_focal_distance(), 7.0);
        assert_eq!(dof.target_focal_distance(), 7.0);
    }

    #[test]
    fn auto_focus_tracks_scene() {
        let settings = DofSettings::default()
            .enabled(true)
            .auto_focus(AutoFocusSettings::default().enabled(true).smooth_time(0.0));
        let (mut dof, _, _, _) = setup(&settings);
        let camera = Camera::new();
        let scene = hecs::World::new();

        dof.update(Some(&camera), &scene, false, 0.016);
        assert_eq!(dof.current_focal_distance(), 2.0);

        dof.update(Some(&camera), &scene, true, 0.016);
        assert_eq!(dof.current_focal_distance(), 100.0);
        assert_eq!(dof.target_focal_distance(), 100.0);
    }

    #[test]
    fn re_enabling_auto_focus_keeps_focus_in_range() {
        let auto_focus = AutoFocusSettings::default()
            .enabled(true)
            .range(5.0, 50.0)
            .smooth_time(1.0);
        let on = DofSettings::default()
            .enabled(true)
            .focal_distance(0.2)
            .auto_focus(auto_focus.clone());
        let off = on.clone().auto_focus(auto_focus.enabled(false));
        let (mut dof, _, _, _) = setup(&on);
        let camera = Camera::new();
        let scene = hecs::World::new();

        dof.update(Some(&camera), &scene, true, 0.016);
        assert!(dof.current_focal_distance() >= 5.0);

        dof.configure(&off);
        dof.configure(&on);
        for _ in 0..5 {
            dof.update(Some(&camera), &scene, true, 0.016);
            assert!(dof.current_focal_distance() >= 5.0);
            assert!(dof.current_focal_distance() <= 50.0);
        }
    }

    #[test]
    fn enabling_auto_focus_starts_from_manual_distance() {
        let mut settings = DofSettings::default().enabled(true).focal_distance(4.0);
        let mut dof: DepthOfField<String> = DepthOfField::new(&settings);
        settings.auto_focus = AutoFocusSettings::default().enabled(true);
        dof.configure(&settings);

        assert_eq!(dof.current_focal_distance(), 4.0);
        assert_eq!(dof.auto_focus().velocity(), 0.0);
    }

    #[test]
    fn indicator_only_when_requested() {
        let mut settings = DofSettings::default().enabled(true);
        settings.auto_focus = AutoFocusSettings::default().enabled(true);
        let mut dof: DepthOfField<String> = DepthOfField::new(&settings);
        assert!(dof.focus_indicator(800.0, 600.0, true).is_none());

        settings.auto_focus.show_indicator = true;
        dof.configure(&settings);
        assert!(dof.focus_indicator(800.0, 600.0, true).is_some());
        assert!(dof.focus_indicator(800.0, 600.0, false).is_none());
    }
}
