//! # visorfx
//!
//! **Camera post-processing for helmeted first-person views.**
//!
//! Three fullscreen effects share one stack:
//!
//! - **Depth of field** with a circle-of-confusion compositor and an
//!   auto-focus controller that ray-casts the scene and eases the focal plane
//!   towards whatever sits under the crosshair.
//! - **Helmet visor**: a faint reflection ring and inner fade, switched on per
//!   helmet.
//! - **Vignette** with optional edge blur.
//!
//! The stack watches what the player is wearing and where they are. It turns
//! the visor and vignette on with a per-helmet [`EffectProfile`] only while a
//! known helmet is closed in a loaded world.
//!
//! ## Quick Start
//!
//! ```no_run
//! use visorfx::*;
//!
//! # fn frame(backend: &mut WgpuBackend, source: TargetId, dest: TargetId) {
//! let mut stack: PostStack<ShaderId> = PostStack::new(EffectsConfig::new());
//! stack.initialize(&*backend);
//!
//! let camera = Camera::new().at(0.0, 1.7, 0.0).looking_at(Vec3::new(0.0, 1.7, -10.0));
//! let scene = visorfx::hecs::World::new();
//! let world = SceneState::loaded("Station");
//! let player = PlayerState::wearing("ItemHardsuitHelmet", true);
//!
//! stack.update(&FrameInput {
//!     camera: Some(&camera),
//!     scene: &scene,
//!     world: &world,
//!     player: Some(&player),
//!     dt: 1.0 / 60.0,
//! });
//! stack.render(backend, Some(&camera), source, dest);
//! # }
//! ```
//!
//! Effects only talk to the GPU through [`RenderBackend`]; [`WgpuBackend`] is
//! the bundled implementation.

mod autofocus;
mod backend;
mod camera;
mod config;
mod context;
mod coordinator;
mod dof;
mod error;
mod focus;
mod gpu;
mod picking;
mod profile;
mod shaders;
mod stack;
mod vignette;
mod visor;
mod wgpu_backend;

#[cfg(test)]
mod recording;

pub use autofocus::{AutoFocusController, AutoFocusMode, FocusIndicator, smooth_damp};
pub use backend::{
    PassBindings, RenderBackend, ShaderLibrary, TargetDesc, TargetFormat, TemporaryScope,
};
pub use camera::Camera;
pub use config::{
    AutoFocusSettings, ConfigStore, DofSettings, EffectsConfig, MemoryConfig, OPTIONS,
    OptionKind, OptionSpec, OptionValue, VisorSettings, option_spec,
};
pub use context::{
    HeadgearState, PlayerQuery, PlayerState, SceneState, WorldContext, WorldQuery, is_menu_scene,
};
pub use coordinator::{ContextAction, ContextState, EffectContextCoordinator};
pub use dof::{CocCompositor, DepthOfField, DofUniforms, LensParameters, SampleQuality};
pub use error::EffectError;
pub use focus::FocusSampler;
pub use gpu::GpuContext;
pub use picking::{Collider, Ray, RayHit, SceneQuery, Transform, raycast, raycast_all};
pub use profile::{EffectProfile, Headgear, UnknownHeadgear, profile_for};
pub use shaders::{ShaderRegistry, ShaderSource};
pub use stack::{EffectId, EffectParams, FrameInput, PostStack};
pub use vignette::{SecondaryBlurCompositor, Vignette};
pub use visor::HelmetVisor;
pub use wgpu_backend::{ShaderId, TargetId, WgpuBackend};

// Re-export commonly used external types
pub use glam::{Mat4, Vec2, Vec3};
pub use hecs;
