//! [`RenderBackend`] implementation on top of wgpu.
//!
//! Every shader pass is a fullscreen triangle drawn with one shared bind group
//! layout:
//!
//! | binding | contents                                  |
//! |---------|-------------------------------------------|
//! | 0       | uniform block (`PassBindings::uniforms`)  |
//! | 1       | source texture                            |
//! | 2       | linear clamp sampler                      |
//! | 3, 4    | auxiliary textures, 1×1 black when unset  |
//!
//! Pass `n` of a shader is its fragment entry point `pass_n`; the vertex entry
//! point is always `vs`. Pipelines are built on first use and cached per
//! `(shader, pass, target format)`.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::backend::{PassBindings, RenderBackend, ShaderLibrary, TargetDesc, TargetFormat};
use crate::error::EffectError;
use crate::gpu::GpuContext;
use crate::shaders::{ShaderRegistry, find_by_name};

const BLIT_SHADER: &str = include_str!("shaders/fullscreen.wgsl");
const BLIT_NAME: &str = "fullscreen";

/// Handle to a texture owned by a [`WgpuBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId(u32);

/// Handle to a shader module compiled by a [`WgpuBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(u32);

impl TargetFormat {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TargetFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TargetFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TargetFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TargetFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        }
    }

    pub fn from_wgpu(format: wgpu::TextureFormat) -> Option<Self> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => Some(TargetFormat::Rgba8Unorm),
            wgpu::TextureFormat::Rgba8UnormSrgb => Some(TargetFormat::Rgba8UnormSrgb),
            wgpu::TextureFormat::Bgra8UnormSrgb => Some(TargetFormat::Bgra8UnormSrgb),
            wgpu::TextureFormat::Rgba16Float => Some(TargetFormat::Rgba16Float),
            _ => None,
        }
    }
}

struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: TargetDesc,
    temporary: bool,
}

type PipelineKey = (ShaderId, u32, TargetFormat);

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    fallback_view: wgpu::TextureView,

    targets: Vec<Option<Target>>,
    free_slots: Vec<u32>,
    /// Released temporaries waiting for reuse, by size and format.
    pool: HashMap<TargetDesc, Vec<TargetId>>,

    modules: Vec<wgpu::ShaderModule>,
    names: HashMap<String, ShaderId>,
    /// `None` records a pass that failed to build so it is not retried every frame.
    pipelines: HashMap<PipelineKey, Option<wgpu::RenderPipeline>>,
    blit: Option<ShaderId>,
}

impl WgpuBackend {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = gpu.device.clone();

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Effect Bind Group Layout"),
            entries: &[
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Source
                texture_entry(1),
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Auxiliary inputs
                texture_entry(3),
                texture_entry(4),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Effect Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Effect Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let fallback = device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some("Fallback Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[0, 0, 0, 0],
        );
        let fallback_view = fallback.create_view(&wgpu::TextureViewDescriptor::default());

        let mut backend = Self {
            device,
            queue: gpu.queue.clone(),
            bind_group_layout,
            pipeline_layout,
            sampler,
            fallback_view,
            targets: Vec::new(),
            free_slots: Vec::new(),
            pool: HashMap::new(),
            modules: Vec::new(),
            names: HashMap::new(),
            pipelines: HashMap::new(),
            blit: None,
        };

        match backend.compile(BLIT_NAME, BLIT_SHADER) {
            Ok(id) => backend.blit = Some(id),
            Err(e) => log::error!("Copy shader failed to compile: {}", e),
        }
        backend
    }

    /// Compile `source` under `name`, replacing any earlier shader of that name.
    ///
    /// Handles to a replaced shader stay valid and pick up the new code.
    pub fn compile(&mut self, name: &str, source: &str) -> Result<ShaderId, EffectError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(EffectError::Backend(format!(
                "Shader '{}' failed to compile: {}",
                name, error
            )));
        }

        if let Some(&id) = self.names.get(name) {
            self.modules[id.0 as usize] = module;
            self.pipelines.retain(|(shader, _, _), _| *shader != id);
            return Ok(id);
        }

        let id = ShaderId(self.modules.len() as u32);
        self.modules.push(module);
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Compile every shader in `registry`; returns how many compiled.
    pub fn load_registry(&mut self, registry: &ShaderRegistry) -> usize {
        let mut compiled = 0;
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        for name in names {
            let Some(source) = registry.source(&name) else {
                continue;
            };
            match self.compile(&name, source) {
                Ok(_) => compiled += 1,
                Err(e) => log::error!("{}", e),
            }
        }
        compiled
    }

    /// Reload changed shader files and recompile them, keeping the previous
    /// version of any shader that no longer compiles.
    pub fn reload_changed(&mut self, registry: &mut ShaderRegistry) {
        for name in registry.check_reload() {
            let Some(source) = registry.source(&name) else {
                continue;
            };
            if let Err(e) = self.compile(&name, source) {
                log::warn!("{}, keeping previous version", e);
            }
        }
    }

    fn insert(&mut self, target: Target) -> TargetId {
        match self.free_slots.pop() {
            Some(slot) => {
                self.targets[slot as usize] = Some(target);
                TargetId(slot)
            }
            None => {
                self.targets.push(Some(target));
                TargetId((self.targets.len() - 1) as u32)
            }
        }
    }

    fn allocate(&self, desc: TargetDesc, label: &str) -> Target {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.to_wgpu(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Target {
            texture,
            view,
            desc,
            temporary: false,
        }
    }

    /// Create a long-lived render target.
    pub fn create_target(&mut self, desc: TargetDesc, label: &str) -> TargetId {
        let target = self.allocate(desc, label);
        self.insert(target)
    }

    /// Upload tightly packed 8-bit RGBA pixels into `target`.
    pub fn write_pixels(&mut self, target: TargetId, rgba: &[u8]) -> Result<(), EffectError> {
        let Some(target) = self.target(target) else {
            return Err(EffectError::Backend(format!("Unknown target {:?}", target)));
        };
        let desc = target.desc;
        if desc.format == TargetFormat::Rgba16Float {
            return Err(EffectError::Backend(
                "Pixel upload needs an 8-bit target".to_string(),
            ));
        }
        let expected = desc.width as usize * desc.height as usize * 4;
        if rgba.len() != expected {
            return Err(EffectError::Backend(format!(
                "Expected {} bytes of pixel data, got {}",
                expected,
                rgba.len()
            )));
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * 4),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Wrap a texture created elsewhere, e.g. the current surface texture.
    pub fn import_texture(&mut self, texture: &wgpu::Texture) -> Result<TargetId, EffectError> {
        let format = TargetFormat::from_wgpu(texture.format()).ok_or_else(|| {
            EffectError::Backend(format!("Unsupported texture format {:?}", texture.format()))
        })?;
        let desc = TargetDesc::new(texture.width(), texture.height(), format);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.insert(Target {
            texture: texture.clone(),
            view,
            desc,
            temporary: false,
        }))
    }

    /// Forget a target created or imported earlier.
    pub fn remove_target(&mut self, target: TargetId) {
        if let Some(slot) = self.targets.get_mut(target.0 as usize) {
            if slot.take().is_some() {
                self.free_slots.push(target.0);
            }
        }
    }

    /// Drop every pooled temporary, e.g. after a resize made them the wrong size.
    pub fn trim_pool(&mut self) {
        let pooled: Vec<TargetId> = self.pool.drain().flat_map(|(_, ids)| ids).collect();
        for id in pooled {
            self.remove_target(id);
        }
    }

    pub fn texture(&self, target: TargetId) -> Option<&wgpu::Texture> {
        self.target(target).map(|t| &t.texture)
    }

    fn target(&self, target: TargetId) -> Option<&Target> {
        self.targets.get(target.0 as usize).and_then(Option::as_ref)
    }

    /// Build the pipeline for `key` if needed; `false` if it cannot be built.
    fn ensure_pipeline(&mut self, key: PipelineKey) -> bool {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return pipeline.is_some();
        }

        let (shader, pass, format) = key;
        let Some(module) = self.modules.get(shader.0 as usize) else {
            return false;
        };
        let entry_point = format!("pass_{}", pass);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&entry_point),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(&entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: format.to_wgpu(),
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let built = match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => {
                log::error!(
                    "Pass {} of shader {:?} failed to build: {}",
                    pass,
                    shader,
                    error
                );
                None
            }
            None => Some(pipeline),
        };
        let ok = built.is_some();
        self.pipelines.insert(key, built);
        ok
    }

    fn blit(&mut self, source: TargetId, dest: TargetId) {
        let Some(blit) = self.blit else {
            return;
        };
        self.run_pass(blit, 0, source, dest, PassBindings::new(&[]));
    }

    /// Record and submit one fullscreen pass. Returns `false` if nothing was drawn.
    fn run_pass(
        &mut self,
        shader: ShaderId,
        pass: u32,
        source: TargetId,
        dest: TargetId,
        bindings: PassBindings<'_, TargetId>,
    ) -> bool {
        let Some(dest_format) = self.target(dest).map(|t| t.desc.format) else {
            return false;
        };
        let key = (shader, pass, dest_format);
        if !self.ensure_pipeline(key) {
            return false;
        }
        let (Some(Some(pipeline)), Some(src), Some(dst)) = (
            self.pipelines.get(&key),
            self.target(source),
            self.target(dest),
        ) else {
            return false;
        };

        // Uniform buffers must be a non-empty multiple of 16 bytes
        let mut uniforms = bindings.uniforms.to_vec();
        uniforms.resize(uniforms.len().max(16).next_multiple_of(16), 0);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Effect Uniforms"),
                contents: &uniforms,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let aux_view = |slot: usize| {
            bindings.aux[slot]
                .and_then(|id| self.target(id))
                .map(|t| &t.view)
                .unwrap_or(&self.fallback_view)
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&src.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(aux_view(0)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(aux_view(1)),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Effect Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Effect Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dst.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        true
    }
}

impl RenderBackend for WgpuBackend {
    type Target = TargetId;
    type Shader = ShaderId;

    fn describe(&self, target: TargetId) -> TargetDesc {
        match self.target(target) {
            Some(t) => t.desc,
            None => {
                log::warn!("Describing unknown target {:?}", target);
                TargetDesc::new(1, 1, TargetFormat::Rgba8Unorm)
            }
        }
    }

    fn acquire_temporary(&mut self, desc: TargetDesc) -> TargetId {
        if let Some(id) = self.pool.get_mut(&desc).and_then(Vec::pop) {
            return id;
        }
        let mut target = self.allocate(desc, "Temporary Target");
        target.temporary = true;
        self.insert(target)
    }

    fn release_temporary(&mut self, target: TargetId) {
        match self.target(target) {
            Some(t) if t.temporary => {
                let desc = t.desc;
                self.pool.entry(desc).or_default().push(target);
            }
            _ => log::warn!("Released {:?}, which is not a temporary", target),
        }
    }

    fn copy(&mut self, source: TargetId, dest: TargetId) {
        if source == dest {
            return;
        }
        let (Some(src), Some(dst)) = (self.target(source), self.target(dest)) else {
            return;
        };

        let direct = src.desc == dst.desc
            && src.texture.usage().contains(wgpu::TextureUsages::COPY_SRC)
            && dst.texture.usage().contains(wgpu::TextureUsages::COPY_DST);
        if !direct {
            self.blit(source, dest);
            return;
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Copy Encoder"),
            });
        encoder.copy_texture_to_texture(
            src.texture.as_image_copy(),
            dst.texture.as_image_copy(),
            wgpu::Extent3d {
                width: src.desc.width,
                height: src.desc.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw(
        &mut self,
        shader: &ShaderId,
        pass: u32,
        source: TargetId,
        dest: TargetId,
        bindings: PassBindings<'_, TargetId>,
    ) {
        if source == dest || bindings.aux.contains(&Some(dest)) {
            log::warn!("Pass {} reads the target it writes, skipping", pass);
            return;
        }
        if !self.run_pass(*shader, pass, source, dest, bindings) {
            self.copy(source, dest);
        }
    }
}

impl ShaderLibrary<ShaderId> for WgpuBackend {
    fn shader(&self, name: &str) -> Option<ShaderId> {
        find_by_name(&self.names, name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_map_both_ways() {
        for format in [
            TargetFormat::Rgba8Unorm,
            TargetFormat::Rgba8UnormSrgb,
            TargetFormat::Bgra8UnormSrgb,
            TargetFormat::Rgba16Float,
        ] {
            assert_eq!(TargetFormat::from_wgpu(format.to_wgpu()), Some(format));
        }
        assert_eq!(TargetFormat::from_wgpu(wgpu::TextureFormat::R8Unorm), None);
    }

    fn headless() -> Option<WgpuBackend> {
        match GpuContext::new_headless(64, 64) {
            Ok(gpu) => Some(WgpuBackend::new(&gpu)),
            Err(e) => {
                eprintln!("skipping, no GPU: {}", e);
                None
            }
        }
    }

    #[test]
    fn released_temporaries_are_reused_by_desc() {
        let Some(mut backend) = headless() else {
            return;
        };
        let desc = TargetDesc::new(32, 16, TargetFormat::Rgba8Unorm);

        let first = backend.acquire_temporary(desc);
        backend.release_temporary(first);
        assert_eq!(backend.acquire_temporary(desc), first);

        let other = backend.acquire_temporary(desc.half());
        assert_ne!(other, first);
        assert_eq!(backend.describe(other), desc.half());
    }

    #[test]
    fn persistent_targets_never_enter_the_pool() {
        let Some(mut backend) = headless() else {
            return;
        };
        let desc = TargetDesc::new(8, 8, TargetFormat::Rgba8Unorm);
        let persistent = backend.create_target(desc, "persistent");

        backend.release_temporary(persistent);
        assert_ne!(backend.acquire_temporary(desc), persistent);
        assert!(backend.texture(persistent).is_some());
    }

    #[test]
    fn trimmed_pool_allocates_fresh_targets() {
        let Some(mut backend) = headless() else {
            return;
        };
        let desc = TargetDesc::new(8, 8, TargetFormat::Rgba8Unorm);
        let temporary = backend.acquire_temporary(desc);
        backend.release_temporary(temporary);

        backend.trim_pool();
        assert!(backend.texture(temporary).is_none());
        let fresh = backend.acquire_temporary(desc);
        assert!(backend.texture(fresh).is_some());
    }

    #[test]
    fn copy_handles_matching_and_mismatched_targets() {
        let Some(mut backend) = headless() else {
            return;
        };
        let desc = TargetDesc::new(4, 4, TargetFormat::Rgba8Unorm);
        let source = backend.create_target(desc, "source");
        backend.write_pixels(source, &[128; 64]).unwrap();

        let same = backend.create_target(desc, "same");
        let other = backend.create_target(
            TargetDesc::new(2, 2, TargetFormat::Rgba16Float),
            "other",
        );
        backend.copy(source, same);
        backend.copy(source, other);

        assert!(backend.write_pixels(source, &[0; 3]).is_err());
        assert!(backend.write_pixels(other, &[0; 16]).is_err());
    }
}
