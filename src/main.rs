//! Demo: a small ray-traced room viewed through the effect stack.
//!
//! Keys: `H` opens/closes the helmet, `V` toggles the visor option, `F` toggles
//! auto-focus, `D` toggles depth of field. Shader files under `src/shaders`
//! are hot-reloaded while the demo runs.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use visorfx::{
    Camera, Collider, ConfigStore, EffectsConfig, FrameInput, GpuContext, MemoryConfig,
    OptionValue, PlayerState, PostStack, SceneState, ShaderId, ShaderRegistry, TargetDesc,
    TargetFormat, TargetId, Transform, Vec2, Vec3, WgpuBackend, raycast,
};

const SCENE_WIDTH: u32 = 480;
const SCENE_HEIGHT: u32 = 270;
const HELMET: &str = "ItemHardsuitHelmet";

/// Surface colour of a scene object.
struct Tint([f32; 3]);

struct Renderer {
    window: Arc<Window>,
    gpu: GpuContext,
    backend: WgpuBackend,
    scene_target: TargetId,
}

struct App {
    renderer: Option<Renderer>,
    registry: ShaderRegistry,
    options: MemoryConfig,
    stack: PostStack<ShaderId>,
    world: hecs::World,
    scene: SceneState,
    player: PlayerState,
    pixels: Vec<u8>,
    start_time: Instant,
    last_frame: Instant,
}

impl App {
    fn new() -> Self {
        let shader_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/shaders");
        let registry = ShaderRegistry::load_dir(&shader_dir).unwrap_or_else(|e| {
            log::warn!("Using bundled shaders ({:?}: {})", shader_dir, e);
            ShaderRegistry::builtin()
        });

        let mut options = MemoryConfig::new();
        for (key, value) in [
            ("dof.enabled", OptionValue::Bool(true)),
            ("autofocus.enabled", OptionValue::Bool(true)),
            ("autofocus.mode", OptionValue::Choice("NinePointAverage".to_string())),
        ] {
            if let Err(e) = options.set(key, value) {
                log::warn!("{}", e);
            }
        }
        let stack = PostStack::new(EffectsConfig::from_store(&options));

        let now = Instant::now();
        Self {
            renderer: None,
            registry,
            options,
            stack,
            world: build_world(),
            scene: SceneState::loaded("Outpost"),
            player: PlayerState::wearing(HELMET, true),
            pixels: Vec::new(),
            start_time: now,
            last_frame: now,
        }
    }

    fn toggle_option(&mut self, key: &str) {
        let current = self
            .options
            .get(key)
            .or_else(|| visorfx::option_spec(key).map(|spec| spec.kind.default_value()));
        let enabled = !matches!(current, Some(OptionValue::Bool(true)));
        match self.options.set(key, OptionValue::Bool(enabled)) {
            Ok(()) => {
                log::info!("{} = {}", key, enabled);
                self.stack.refresh_config(&self.options);
            }
            Err(e) => log::warn!("{}", e),
        }
    }

    fn toggle_helmet(&mut self) {
        if let Some(headgear) = &mut self.player.headgear {
            headgear.closed = !headgear.closed;
            log::info!("Helmet {}", if headgear.closed { "closed" } else { "open" });
        }
    }

    fn redraw(&mut self) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;
        let time = self.start_time.elapsed().as_secs_f32();

        renderer.backend.reload_changed(&mut self.registry);

        let look = Vec3::new(5.0 * (time * 0.25).sin(), 1.2, -10.0);
        let camera = Camera::new()
            .at(0.0, 1.7, 0.0)
            .looking_at(look)
            .with_aspect(SCENE_WIDTH as f32 / SCENE_HEIGHT as f32)
            .with_clip(0.1, 60.0);

        trace_scene(&self.world, &camera, &mut self.pixels);
        if let Err(e) = renderer.backend.write_pixels(renderer.scene_target, &self.pixels) {
            log::error!("{}", e);
            return;
        }

        self.stack.update(&FrameInput {
            camera: Some(&camera),
            scene: &self.world,
            world: &self.scene,
            player: Some(&self.player),
            dt,
        });

        let Some(surface) = &renderer.gpu.surface else {
            return;
        };
        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                renderer.window.request_redraw();
                return;
            }
        };
        match renderer.backend.import_texture(&frame.texture) {
            Ok(dest) => {
                self.stack
                    .render(&mut renderer.backend, Some(&camera), renderer.scene_target, dest);
                renderer.backend.remove_target(dest);
            }
            Err(e) => log::error!("{}", e),
        }
        frame.present();

        renderer.window.set_title(&format!(
            "visorfx | focus {:.2} m -> {:.2} m | {:?}",
            self.stack.current_focal_distance(),
            self.stack.target_focal_distance(),
            self.stack.context_state(),
        ));
        renderer.window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("visorfx")
            .with_inner_size(winit::dpi::LogicalSize::new(1280.0, 720.0));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let gpu = match GpuContext::new(window.clone()) {
            Ok(gpu) => gpu,
            Err(e) => {
                log::error!("{}", e);
                event_loop.exit();
                return;
            }
        };

        let mut backend = WgpuBackend::new(&gpu);
        let compiled = backend.load_registry(&self.registry);
        log::info!("Compiled {} of {} shaders", compiled, self.registry.len());
        if !self.stack.initialize(&backend) {
            log::warn!("Some effects are unavailable");
        }

        let scene_target = backend.create_target(
            TargetDesc::new(SCENE_WIDTH, SCENE_HEIGHT, TargetFormat::Rgba8Unorm),
            "Scene Target",
        );

        window.request_redraw();
        self.renderer = Some(Renderer {
            window,
            gpu,
            backend,
            scene_target,
        });
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.gpu.resize(size.width, size.height);
                    renderer.backend.trim_pool();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::KeyH) => self.toggle_helmet(),
                    PhysicalKey::Code(KeyCode::KeyV) => self.toggle_option("visor.enabled"),
                    PhysicalKey::Code(KeyCode::KeyF) => self.toggle_option("autofocus.enabled"),
                    PhysicalKey::Code(KeyCode::KeyD) => self.toggle_option("dof.enabled"),
                    PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

fn build_world() -> hecs::World {
    let mut world = hecs::World::new();
    // Floor and back wall
    world.spawn((
        Transform::from_position(Vec3::new(0.0, -0.5, -20.0)),
        Collider::box_collider(Vec3::new(60.0, 1.0, 60.0)),
        Tint([0.45, 0.47, 0.5]),
    ));
    world.spawn((
        Transform::from_position(Vec3::new(0.0, 5.0, -40.0)),
        Collider::box_collider(Vec3::new(60.0, 12.0, 1.0)),
        Tint([0.3, 0.35, 0.45]),
    ));
    // Crates and pillars at increasing distances
    for i in 0..6 {
        let z = -3.0 - i as f32 * 5.0;
        let x = if i % 2 == 0 { -2.5 } else { 2.5 };
        world.spawn((
            Transform::from_position(Vec3::new(x, 1.0, z)),
            Collider::box_collider(Vec3::new(1.2, 2.0, 1.2)),
            Tint([0.8, 0.45 + i as f32 * 0.08, 0.2]),
        ));
    }
    world.spawn((
        Transform::from_position(Vec3::new(0.0, 1.2, -12.0)),
        Collider::sphere(1.2),
        Tint([0.2, 0.7, 0.9]),
    ));
    world
}

/// Ray-trace the scene into 8-bit RGBA with linear 0..1 depth in alpha.
fn trace_scene(world: &hecs::World, camera: &Camera, pixels: &mut Vec<u8>) {
    pixels.clear();
    let range = camera.far - camera.near;
    for y in 0..SCENE_HEIGHT {
        for x in 0..SCENE_WIDTH {
            let viewport = Vec2::new(
                (x as f32 + 0.5) / SCENE_WIDTH as f32,
                1.0 - (y as f32 + 0.5) / SCENE_HEIGHT as f32,
            );
            let ray = camera.viewport_ray(viewport);

            let (color, depth) = match raycast(world, &ray, range) {
                Some(hit) => {
                    let base = world
                        .get::<&Tint>(hit.entity)
                        .map(|tint| tint.0)
                        .unwrap_or([1.0, 0.0, 1.0]);
                    let checker = ((hit.point.x.floor() + hit.point.z.floor()) as i32 & 1) as f32;
                    let shade = 0.85 + 0.15 * checker;
                    let depth = (camera.view_depth(hit.point) / range).clamp(0.0, 1.0);
                    let fog = 1.0 - depth * 0.6;
                    (base.map(|c| c * shade * fog), depth)
                }
                None => {
                    let sky = 0.4 + 0.4 * viewport.y;
                    ([sky * 0.6, sky * 0.75, sky], 1.0)
                }
            };

            pixels.extend(color.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8));
            pixels.push((depth * 255.0) as u8);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
    }
}
