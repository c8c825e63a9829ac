use crate::camera::OrbitCamera;
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use oldcomputers_assets::{MeshData, TextureImage};
use oldcomputers_common::Color;
use oldcomputers_render::{
    DrawList, DrawMaterial, DrawTexture, FramePlan, LightSet, Shading, TargetPass,
};
use oldcomputers_scene::{RenderTextureId, Scene};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Color format of every offscreen render target.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const MAX_DIRECTIONAL: usize = 2;
const MAX_POINT: usize = 4;
const INITIAL_INSTANCES: u64 = 256;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    ambient: [f32; 4],
    directional_dir: [[f32; 4]; MAX_DIRECTIONAL],
    directional_color: [[f32; 4]; MAX_DIRECTIONAL],
    point_position: [[f32; 4]; MAX_POINT],
    point_color: [[f32; 4]; MAX_POINT],
    counts: [u32; 4],
}

impl FrameUniforms {
    fn new(view_proj: Mat4, eye: Vec3, lights: &LightSet) -> Self {
        if lights.directional.len() > MAX_DIRECTIONAL || lights.point.len() > MAX_POINT {
            tracing::debug!(
                "pass has {} directional and {} point lights, extra lights are ignored",
                lights.directional.len(),
                lights.point.len()
            );
        }
        let mut uniforms = Self::zeroed();
        uniforms.view_proj = view_proj.to_cols_array_2d();
        uniforms.camera_position = eye.extend(1.0).to_array();
        uniforms.ambient = lights.ambient.to_rgba(1.0);
        for (i, light) in lights.directional.iter().take(MAX_DIRECTIONAL).enumerate() {
            uniforms.directional_dir[i] = light.direction.extend(0.0).to_array();
            uniforms.directional_color[i] = light.color.to_rgba(1.0);
        }
        for (i, light) in lights.point.iter().take(MAX_POINT).enumerate() {
            uniforms.point_position[i] = light.position.extend(1.0).to_array();
            uniforms.point_color[i] = light.color.to_rgba(1.0);
        }
        uniforms.counts = [
            lights.directional.len().min(MAX_DIRECTIONAL) as u32,
            lights.point.len().min(MAX_POINT) as u32,
            0,
            0,
        ];
        uniforms
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct MaterialUniforms {
    base_color: [f32; 4],
    flags: [u32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    color: [f32; 4],
}

impl InstanceData {
    fn new(model: Mat4, color: [f32; 4]) -> Self {
        let cols = model.to_cols_array_2d();
        Self {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            color,
        }
    }
}

/// Interleave a mesh's attributes. Missing normals point up, missing UVs
/// are zero.
fn vertices(mesh: &MeshData) -> Vec<Vertex> {
    mesh.positions
        .iter()
        .enumerate()
        .map(|(i, position)| Vertex {
            position: *position,
            normal: mesh.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            uv: mesh.uvs.get(i).copied().unwrap_or([0.0, 0.0]),
        })
        .collect()
}

/// Flatten a draw list into one instance stream and each batch's range in it.
fn instance_stream(list: &DrawList) -> (Vec<InstanceData>, Vec<Range<u32>>) {
    let mut data = Vec::with_capacity(list.instance_count());
    let mut ranges = Vec::with_capacity(list.batch_count());
    for batch in &list.batches {
        let start = data.len() as u32;
        data.extend(
            batch
                .instances
                .iter()
                .map(|instance| InstanceData::new(instance.model, instance.color)),
        );
        ranges.push(start..data.len() as u32);
    }
    (data, ranges)
}

fn clear_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(color.r),
        g: f64::from(color.g),
        b: f64::from(color.b),
        a: 1.0,
    }
}

struct GpuMesh {
    // Held so the pointer used as cache key stays unique.
    _source: Arc<MeshData>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct GpuTexture {
    _source: Arc<TextureImage>,
    view: wgpu::TextureView,
}

struct OffscreenTarget {
    width: u32,
    height: u32,
    anisotropy: u16,
    view: wgpu::TextureView,
    depth: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// Uniforms and instances of one pass. Each pass gets its own so writes for
/// different passes in one submission do not overwrite each other.
struct PassResources {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instance_buffer: wgpu::Buffer,
    capacity: u64,
}

impl PassResources {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        Self {
            uniform_buffer,
            bind_group,
            instance_buffer: Self::instance_buffer(device, INITIAL_INSTANCES),
            capacity: INITIAL_INSTANCES,
        }
    }

    fn instance_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_buffer"),
            size: capacity * std::mem::size_of::<InstanceData>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        uniforms: &FrameUniforms,
        instances: &[InstanceData],
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        let needed = instances.len() as u64;
        if needed > self.capacity {
            self.capacity = needed.next_power_of_two();
            self.instance_buffer = Self::instance_buffer(device, self.capacity);
            tracing::debug!("instance buffer grown to {} instances", self.capacity);
        }
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(instances));
        }
    }
}

struct Pipelines {
    lit: wgpu::RenderPipeline,
    unlit: wgpu::RenderPipeline,
}

/// Texture a material bind group samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Binding {
    White,
    Image(usize),
    Target(usize),
}

/// Inputs of one material bind group. Batches with equal keys share it
/// across passes and frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct MaterialKey {
    base_color: [u32; 4],
    tone_mapped: bool,
    binding: Binding,
}

impl MaterialKey {
    /// `current` is the target being drawn into. It is never sampled.
    fn new(material: &DrawMaterial, current: Option<RenderTextureId>) -> Self {
        let binding = match &material.texture {
            Some(DrawTexture::Image(image)) => Binding::Image(Arc::as_ptr(image) as usize),
            Some(DrawTexture::Target(id)) if Some(*id) != current => Binding::Target(id.index()),
            _ => Binding::White,
        };
        Self {
            base_color: material.base_color.map(f32::to_bits),
            tone_mapped: material.tone_mapped,
            binding,
        }
    }

    fn uniforms(&self) -> MaterialUniforms {
        MaterialUniforms {
            base_color: self.base_color.map(f32::from_bits),
            flags: [u32::from(self.tone_mapped), 0, 0, 0],
        }
    }
}

struct PreparedBatch {
    mesh: usize,
    shading: Shading,
    material: MaterialKey,
    instances: Range<u32>,
}

/// Counters for the last rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub passes: usize,
    pub draw_calls: usize,
    pub instances: usize,
    /// Geometries uploaded so far.
    pub meshes: usize,
}

/// wgpu renderer for a composed [`Scene`]: offscreen passes for every render
/// target, then the main pass to the surface.
pub struct WgpuRenderer {
    surface_pipelines: Pipelines,
    offscreen_pipelines: Pipelines,
    frame_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    passes: Vec<PassResources>,
    meshes: BTreeMap<usize, GpuMesh>,
    textures: BTreeMap<usize, GpuTexture>,
    targets: BTreeMap<usize, OffscreenTarget>,
    materials: BTreeMap<MaterialKey, wgpu::BindGroup>,
    white: wgpu::TextureView,
    image_sampler: wgpu::Sampler,
    depth_texture: wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SCENE_SHADER.into()),
        });

        let surface_pipelines = Pipelines {
            lit: create_pipeline(device, &pipeline_layout, &shader, "fs_lit", surface_format),
            unlit: create_pipeline(device, &pipeline_layout, &shader, "fs_unlit", surface_format),
        };
        let offscreen_pipelines = Pipelines {
            lit: create_pipeline(device, &pipeline_layout, &shader, "fs_lit", OFFSCREEN_FORMAT),
            unlit: create_pipeline(device, &pipeline_layout, &shader, "fs_unlit", OFFSCREEN_FORMAT),
        };

        let white = device
            .create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some("white_texture"),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8UnormSrgb,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &[255, 255, 255, 255],
            )
            .create_view(&Default::default());

        let image_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("image_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let depth_texture = create_depth_texture(device, width, height);

        Self {
            surface_pipelines,
            offscreen_pipelines,
            frame_layout,
            material_layout,
            passes: Vec::new(),
            meshes: BTreeMap::new(),
            textures: BTreeMap::new(),
            targets: BTreeMap::new(),
            materials: BTreeMap::new(),
            white,
            image_sampler,
            depth_texture,
            surface_format,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = create_depth_texture(device, width, height);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// Render one frame: every render target, then the main graph into `view`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        camera: &OrbitCamera,
        background: Color,
        scene: &Scene,
    ) -> FrameStats {
        let plan = FramePlan::build(scene);

        for pass in &plan.targets {
            self.ensure_target(device, pass);
            self.upload(device, queue, &pass.draw);
        }
        self.upload(device, queue, &plan.main);
        while self.passes.len() < plan.targets.len() + 1 {
            self.passes.push(PassResources::new(device, &self.frame_layout));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });
        let mut stats = FrameStats::default();

        for (i, pass) in plan.targets.iter().enumerate() {
            let slot = i + 1;
            let uniforms = FrameUniforms::new(
                pass.camera.view_projection(),
                pass.camera.position,
                &pass.draw.lights,
            );
            let batches =
                self.prepare(device, queue, slot, &uniforms, &pass.draw, Some(pass.target));
            let Some(target) = self.targets.get(&pass.target.index()) else {
                continue;
            };
            self.record(
                &mut encoder,
                true,
                slot,
                &target.view,
                &target.depth,
                pass.clear_color,
                &batches,
            );
            stats.passes += 1;
            stats.draw_calls += batches.len();
            stats.instances += pass.draw.instance_count();
        }

        let uniforms = FrameUniforms::new(camera.view_projection(), camera.eye(), &plan.main.lights);
        let batches = self.prepare(device, queue, 0, &uniforms, &plan.main, None);
        self.record(
            &mut encoder,
            false,
            0,
            view,
            &self.depth_texture,
            background,
            &batches,
        );
        stats.passes += 1;
        stats.draw_calls += batches.len();
        stats.instances += plan.main.instance_count();
        stats.meshes = self.meshes.len();

        queue.submit(std::iter::once(encoder.finish()));
        stats
    }

    /// Upload geometry and images not yet on the GPU.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, list: &DrawList) {
        for batch in &list.batches {
            let key = Arc::as_ptr(&batch.geometry) as usize;
            if !self.meshes.contains_key(&key) {
                let mesh = upload_mesh(device, &batch.geometry);
                tracing::debug!(
                    "uploaded mesh {:?} ({} triangles)",
                    batch.geometry.name,
                    batch.geometry.triangle_count()
                );
                self.meshes.insert(key, mesh);
            }
            if let Some(DrawTexture::Image(image)) = &batch.material.texture {
                let key = Arc::as_ptr(image) as usize;
                if !self.textures.contains_key(&key) {
                    if let Some(texture) = upload_image(device, queue, image) {
                        self.textures.insert(key, texture);
                    }
                }
            }
        }
    }

    /// Create or resize the target a pass draws into.
    fn ensure_target(&mut self, device: &wgpu::Device, pass: &TargetPass) {
        let key = pass.target.index();
        let current = self.targets.get(&key).is_some_and(|t| {
            t.width == pass.width && t.height == pass.height && t.anisotropy == pass.anisotropy
        });
        if current {
            return;
        }
        let size = wgpu::Extent3d {
            width: pass.width.max(1),
            height: pass.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render_target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("render_target_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            anisotropy_clamp: pass.anisotropy.max(1),
            ..Default::default()
        });
        self.materials
            .retain(|material, _| material.binding != Binding::Target(key));
        tracing::info!(
            "created render target #{} ({}x{}, anisotropy {})",
            key,
            size.width,
            size.height,
            pass.anisotropy
        );
        self.targets.insert(
            key,
            OffscreenTarget {
                width: pass.width,
                height: pass.height,
                anisotropy: pass.anisotropy,
                view: texture.create_view(&Default::default()),
                depth: create_depth_texture(device, size.width, size.height),
                sampler,
            },
        );
    }

    /// Write a pass's uniforms and instances, creating any material bind
    /// groups not cached yet. `current` is the target being drawn into.
    fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: usize,
        uniforms: &FrameUniforms,
        list: &DrawList,
        current: Option<RenderTextureId>,
    ) -> Vec<PreparedBatch> {
        let (instances, ranges) = instance_stream(list);
        if let Some(resources) = self.passes.get_mut(slot) {
            resources.write(device, queue, uniforms, &instances);
        }

        let mut prepared = Vec::with_capacity(list.batches.len());
        for (batch, instances) in list.batches.iter().zip(ranges) {
            let material = MaterialKey::new(&batch.material, current);
            if !self.materials.contains_key(&material) {
                let bind_group = self.material_bind_group(device, &material);
                self.materials.insert(material, bind_group);
                tracing::debug!(
                    "created material bind group for {:?} ({} cached)",
                    batch.label,
                    self.materials.len()
                );
            }
            prepared.push(PreparedBatch {
                mesh: Arc::as_ptr(&batch.geometry) as usize,
                shading: batch.material.shading,
                material,
                instances,
            });
        }
        prepared
    }

    fn material_bind_group(&self, device: &wgpu::Device, key: &MaterialKey) -> wgpu::BindGroup {
        let (view, sampler) = self.sampled(key.binding);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("material_uniforms"),
            contents: bytemuck::bytes_of(&key.uniforms()),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bind_group"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn sampled(&self, binding: Binding) -> (&wgpu::TextureView, &wgpu::Sampler) {
        let fallback = (&self.white, &self.image_sampler);
        match binding {
            Binding::Image(key) => self
                .textures
                .get(&key)
                .map_or(fallback, |t| (&t.view, &self.image_sampler)),
            Binding::Target(key) => self
                .targets
                .get(&key)
                .map_or(fallback, |t| (&t.view, &t.sampler)),
            Binding::White => fallback,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        offscreen: bool,
        slot: usize,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        clear: Color,
        batches: &[PreparedBatch],
    ) {
        let Some(resources) = self.passes.get(slot) else {
            return;
        };
        let pipelines = if offscreen {
            &self.offscreen_pipelines
        } else {
            &self.surface_pipelines
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(if offscreen { "offscreen_pass" } else { "main_pass" }),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color(clear)),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        pass.set_bind_group(0, &resources.bind_group, &[]);
        pass.set_vertex_buffer(1, resources.instance_buffer.slice(..));
        for batch in batches {
            let (Some(mesh), Some(material)) = (
                self.meshes.get(&batch.mesh),
                self.materials.get(&batch.material),
            ) else {
                continue;
            };
            pass.set_pipeline(match batch.shading {
                Shading::Lit => &pipelines.lit,
                Shading::Unlit => &pipelines.unlit,
            });
            pass.set_bind_group(1, material, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, batch.instances.clone());
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let lit = fragment_entry == "fs_lit";
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(fragment_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x3,
                        1 => Float32x3,
                        2 => Float32x2,
                    ],
                },
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<InstanceData>() as u64,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &wgpu::vertex_attr_array![
                        3 => Float32x4,
                        4 => Float32x4,
                        5 => Float32x4,
                        6 => Float32x4,
                        7 => Float32x4,
                    ],
                },
            ],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            // Tessellated text and asset panels have mixed winding.
            cull_mode: if lit { Some(wgpu::Face::Back) } else { None },
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn upload_mesh(device: &wgpu::Device, mesh: &Arc<MeshData>) -> GpuMesh {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("mesh_vertex_buffer"),
        contents: bytemuck::cast_slice(&vertices(mesh)),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("mesh_index_buffer"),
        contents: bytemuck::cast_slice(&mesh.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    GpuMesh {
        _source: mesh.clone(),
        vertex_buffer,
        index_buffer,
        index_count: mesh.indices.len() as u32,
    }
}

fn upload_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &Arc<TextureImage>,
) -> Option<GpuTexture> {
    let expected = image.width as usize * image.height as usize * 4;
    if image.width == 0 || image.height == 0 || image.rgba.len() != expected {
        tracing::warn!(
            "skipping {}x{} image with {} bytes",
            image.width,
            image.height,
            image.rgba.len()
        );
        return None;
    }
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("image_texture"),
            size: wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &image.rgba,
    );
    Some(GpuTexture {
        _source: image.clone(),
        view: texture.create_view(&Default::default()),
    })
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oldcomputers_render::{DirectionalLight, PointLight};

    #[test]
    fn gpu_structs_match_shader_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::size_of::<InstanceData>(), 80);
        assert_eq!(std::mem::size_of::<MaterialUniforms>(), 32);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 304);
        assert_eq!(std::mem::size_of::<FrameUniforms>() % 16, 0);
    }

    #[test]
    fn frame_uniforms_cap_light_counts() {
        let lights = LightSet {
            ambient: Color::rgb(0.5, 0.5, 0.5),
            directional: vec![
                DirectionalLight {
                    direction: Vec3::NEG_Y,
                    color: Color::WHITE,
                };
                3
            ],
            point: vec![PointLight {
                position: Vec3::new(10.0, 10.0, 10.0),
                color: Color::rgb(0.75, 0.75, 0.75),
            }],
        };
        let uniforms = FrameUniforms::new(Mat4::IDENTITY, Vec3::Z, &lights);
        assert_eq!(uniforms.counts, [2, 1, 0, 0]);
        assert_eq!(uniforms.ambient, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(uniforms.point_position[0], [10.0, 10.0, 10.0, 1.0]);
        assert_eq!(uniforms.camera_position, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn vertices_fill_missing_attributes() {
        let mesh = MeshData {
            name: "partial".into(),
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]],
            uvs: Vec::new(),
            indices: vec![0, 1, 2],
        };
        let v = vertices(&mesh);
        assert_eq!(v.len(), 3);
        assert_eq!(v[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(v[2].normal, [0.0, 1.0, 0.0]);
        assert_eq!(v[1].uv, [0.0, 0.0]);
    }

    #[test]
    fn instance_stream_ranges_follow_batches() {
        use oldcomputers_assets::fixture;
        use oldcomputers_scene::{InstanceProvider, SingleComputer};

        let asset = Arc::new(fixture::computers_scene().unwrap());
        let instances = InstanceProvider::new().instances(&asset).unwrap();
        let mut scene = Scene::new();
        let root = scene.graph().root();
        instances
            .provide(|ctx| SingleComputer::default().compose(ctx, &mut scene, root))
            .unwrap();
        let plan = FramePlan::build(&scene);
        let (data, ranges) = instance_stream(&plan.main);
        assert_eq!(data.len(), plan.main.instance_count());
        assert_eq!(ranges.len(), plan.main.batch_count());
        assert_eq!(ranges.last().map(|r| r.end), Some(data.len() as u32));
        // One range of ten for the LEDs.
        assert!(ranges.iter().any(|r| r.len() == 10));
    }

    #[test]
    fn material_keys_share_equal_materials() {
        let image = Arc::new(TextureImage {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        });
        let textured = DrawMaterial {
            shading: Shading::Lit,
            tone_mapped: true,
            base_color: [1.0, 0.5, 0.25, 1.0],
            texture: Some(DrawTexture::Image(image.clone())),
        };
        let key = MaterialKey::new(&textured, None);
        assert_eq!(key.binding, Binding::Image(Arc::as_ptr(&image) as usize));
        assert_eq!(key, MaterialKey::new(&textured.clone(), None));
        assert_eq!(key.uniforms().base_color, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(key.uniforms().flags, [1, 0, 0, 0]);

        let flat = DrawMaterial {
            tone_mapped: false,
            ..textured.clone()
        };
        assert_ne!(MaterialKey::new(&flat, None), key);
    }

    #[test]
    fn material_key_never_binds_the_current_target() {
        use oldcomputers_scene::{PerspectiveCamera, RenderTexture, SubScene};

        let mut scene = Scene::new();
        let target = scene.add_render_texture(RenderTexture {
            width: 4,
            height: 4,
            anisotropy: 1,
            content: SubScene::new(PerspectiveCamera::default(), Color::BLACK),
        });
        let panel = DrawMaterial {
            shading: Shading::Unlit,
            tone_mapped: false,
            base_color: [1.0; 4],
            texture: Some(DrawTexture::Target(target)),
        };
        assert_eq!(
            MaterialKey::new(&panel, None).binding,
            Binding::Target(target.index())
        );
        assert_eq!(MaterialKey::new(&panel, Some(target)).binding, Binding::White);
    }
}
