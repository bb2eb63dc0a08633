//! The effect stack: owns every effect and drives them once per frame.
//!
//! # Frame order
//!
//! 1. [`PostStack::update`] samples the world context, lets the coordinator
//!    switch visor/vignette profiles, then advances auto-focus.
//! 2. [`PostStack::render`] runs depth of field, visor and vignette in that
//!    order, ping-ponging between two pooled temporaries.
//!
//! Nothing here panics or returns an error to the caller. Missing shaders are
//! logged once during [`initialize`](PostStack::initialize) and the affected
//! effect then passes frames through.

use crate::autofocus::FocusIndicator;
use crate::backend::{RenderBackend, ShaderLibrary, TemporaryScope};
use crate::camera::Camera;
use crate::config::{ConfigStore, DofSettings, EffectsConfig};
use crate::context::{PlayerQuery, WorldContext, WorldQuery};
use crate::coordinator::{ContextAction, ContextState, EffectContextCoordinator};
use crate::dof::DepthOfField;
use crate::picking::SceneQuery;
use crate::vignette::Vignette;
use crate::visor::HelmetVisor;

/// Handle to one of the managed effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectId {
    DepthOfField,
    HelmetVisor,
    Vignette,
}

/// New parameters for one effect. `None` fields fall back to the effect's defaults.
#[derive(Clone, Debug, PartialEq)]
pub enum EffectParams {
    DepthOfField(DofSettings),
    HelmetVisor {
        radius: Option<f32>,
        inner_fade: Option<f32>,
    },
    Vignette {
        intensity: Option<f32>,
        blur: Option<f32>,
    },
}

impl EffectParams {
    pub fn effect(&self) -> EffectId {
        match self {
            EffectParams::DepthOfField(_) => EffectId::DepthOfField,
            EffectParams::HelmetVisor { .. } => EffectId::HelmetVisor,
            EffectParams::Vignette { .. } => EffectId::Vignette,
        }
    }
}

/// Per-frame inputs from the host.
pub struct FrameInput<'a> {
    pub camera: Option<&'a Camera>,
    pub scene: &'a dyn SceneQuery,
    pub world: &'a dyn WorldQuery,
    pub player: Option<&'a dyn PlayerQuery>,
    /// Seconds since the previous frame.
    pub dt: f32,
}

pub struct PostStack<S> {
    config: EffectsConfig,
    initialized: Option<bool>,
    dof: DepthOfField<S>,
    visor: HelmetVisor<S>,
    vignette: Vignette<S>,
    coordinator: EffectContextCoordinator,
    context: WorldContext,
}

impl<S: Clone> PostStack<S> {
    pub fn new(config: EffectsConfig) -> Self {
        let mut dof = DepthOfField::new(&config.dof);
        dof.set_enabled(false);
        Self {
            dof,
            visor: HelmetVisor::new(&config.visor),
            vignette: Vignette::new(),
            coordinator: EffectContextCoordinator::new(),
            context: WorldContext::default(),
            initialized: None,
            config,
        }
    }

    /// Resolve every effect's shaders.
    ///
    /// Runs once; later calls return the first result. Effects whose shaders
    /// are missing are logged and stay disabled. Returns `true` when every
    /// effect found its shaders.
    pub fn initialize(&mut self, library: &dyn ShaderLibrary<S>) -> bool {
        if let Some(result) = self.initialized {
            return result;
        }

        let mut complete = true;
        if let Err(e) = self.vignette.initialize(library) {
            log::error!("Vignette failed to initialize: {}", e);
            complete = false;
        }
        if let Err(e) = self.visor.initialize(library) {
            log::error!("Helmet visor failed to initialize: {}", e);
            complete = false;
        }
        if let Err(e) = self.dof.initialize(library) {
            log::error!("Depth of field failed to initialize: {}", e);
            complete = false;
        }

        self.vignette.set_enabled(false);
        self.visor.set_enabled(false);
        self.dof.set_enabled(self.config.dof.enabled);
        self.initialized = Some(complete);

        log::info!(
            "Effect stack initialized (vignette: {}, visor: {}, depth of field: {})",
            self.vignette.is_initialized(),
            self.visor.is_initialized(),
            self.dof.is_initialized()
        );
        complete
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.is_some()
    }

    pub fn config(&self) -> &EffectsConfig {
        &self.config
    }

    /// Replace the user settings and re-evaluate the helmet profile next frame.
    pub fn configure(&mut self, config: EffectsConfig) {
        self.dof.configure(&config.dof);
        if !self.is_initialized() {
            self.dof.set_enabled(false);
        }
        self.config = config;
        self.coordinator.force_refresh();
    }

    /// Re-read every setting from `store`.
    pub fn refresh_config(&mut self, store: &dyn ConfigStore) {
        self.configure(EffectsConfig::from_store(store));
    }

    pub fn is_enabled(&self, effect: EffectId) -> bool {
        match effect {
            EffectId::DepthOfField => self.dof.is_enabled(),
            EffectId::HelmetVisor => self.visor.is_enabled(),
            EffectId::Vignette => self.vignette.is_enabled(),
        }
    }

    pub fn set_enabled(&mut self, effect: EffectId, enabled: bool) {
        match effect {
            EffectId::DepthOfField => self.dof.set_enabled(enabled),
            EffectId::HelmetVisor => self.visor.set_enabled(enabled),
            EffectId::Vignette => self.vignette.set_enabled(enabled),
        }
    }

    /// Update one effect's parameters. Parameters meant for a different
    /// effect are ignored with a warning.
    pub fn apply_parameters(&mut self, effect: EffectId, params: EffectParams) {
        if params.effect() != effect {
            log::warn!(
                "Ignoring {:?} parameters sent to {:?}",
                params.effect(),
                effect
            );
            return;
        }
        match params {
            EffectParams::DepthOfField(settings) => {
                let enabled = self.dof.is_enabled();
                self.dof.configure(&settings);
                self.dof.set_enabled(enabled);
                self.config.dof = settings;
            }
            EffectParams::HelmetVisor { radius, inner_fade } => {
                self.visor
                    .set_parameters(radius, inner_fade, &self.config.visor);
            }
            EffectParams::Vignette { intensity, blur } => {
                self.vignette.set_parameters(intensity, blur);
            }
        }
    }

    /// Focal distance used for the next frame.
    pub fn current_focal_distance(&self) -> f32 {
        self.dof.current_focal_distance()
    }

    /// Focal distance auto-focus is moving towards.
    pub fn target_focal_distance(&self) -> f32 {
        self.dof.target_focal_distance()
    }

    /// Re-apply the helmet profile on the next update even if nothing changed.
    pub fn force_context_refresh(&mut self) {
        self.coordinator.force_refresh();
    }

    pub fn context(&self) -> &WorldContext {
        &self.context
    }

    pub fn context_state(&self) -> ContextState {
        self.coordinator.state()
    }

    pub fn depth_of_field(&self) -> &DepthOfField<S> {
        &self.dof
    }

    pub fn visor(&self) -> &HelmetVisor<S> {
        &self.visor
    }

    pub fn vignette(&self) -> &Vignette<S> {
        &self.vignette
    }

    /// Debug overlay for the auto-focus sample points, when enabled.
    pub fn focus_indicator(&self, width: f32, height: f32) -> Option<FocusIndicator> {
        self.dof
            .focus_indicator(width, height, self.context.in_world)
    }

    /// Sample the world, apply any profile change, then advance auto-focus.
    pub fn update(&mut self, frame: &FrameInput<'_>) {
        self.context = WorldContext::evaluate(frame.world, frame.player);

        if self.is_initialized() {
            if let Some(action) = self
                .coordinator
                .update(&self.context, self.config.visor.enabled)
            {
                self.apply_action(action);
            }
        }

        self.dof
            .update(frame.camera, frame.scene, self.context.in_world, frame.dt);
    }

    fn apply_action(&mut self, action: ContextAction) {
        match action {
            ContextAction::Reset | ContextAction::ApplyDefault => {
                self.visor.set_enabled(false);
                self.vignette.set_enabled(false);
            }
            ContextAction::ApplyProfile(profile) => {
                self.visor.set_enabled(true);
                self.visor.set_parameters(
                    Some(profile.reflection_radius),
                    Some(profile.inner_fade_start),
                    &self.config.visor,
                );
                self.vignette.set_enabled(true);
                self.vignette
                    .set_parameters(Some(profile.vignette_intensity), Some(profile.vignette_blur));
            }
        }
    }

    /// Run every active effect from `source` into `dest`.
    pub fn render<B>(&self, backend: &mut B, camera: Option<&Camera>, source: B::Target, dest: B::Target)
    where
        B: RenderBackend<Shader = S> + ?Sized,
    {
        let in_world = self.context.in_world;
        let active: Vec<EffectId> = [
            (EffectId::DepthOfField, self.dof.is_enabled() && self.dof.is_initialized() && in_world),
            (EffectId::HelmetVisor, self.visor.is_enabled() && self.visor.is_initialized()),
            (EffectId::Vignette, self.vignette.is_enabled() && self.vignette.is_initialized()),
        ]
        .into_iter()
        .filter_map(|(id, active)| active.then_some(id))
        .collect();

        if active.is_empty() {
            backend.copy(source, dest);
            return;
        }

        let mut scope = TemporaryScope::new(backend);
        let desc = scope.describe(source);
        let ping_pong = if active.len() > 1 {
            let first = scope.acquire(desc);
            let second = if active.len() > 2 {
                scope.acquire(desc)
            } else {
                first
            };
            [first, second]
        } else {
            [dest, dest]
        };

        let mut input = source;
        for (index, effect) in active.iter().enumerate() {
            let output = if index + 1 == active.len() {
                dest
            } else {
                ping_pong[index % 2]
            };
            let backend = scope.backend();
            match effect {
                EffectId::DepthOfField => self.dof.render(backend, camera, in_world, input, output),
                EffectId::HelmetVisor => self.visor.render(backend, input, output),
                EffectId::Vignette => self.vignette.render(backend, input, output),
            }
            input = output;
        }
    }
}
