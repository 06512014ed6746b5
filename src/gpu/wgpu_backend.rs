//! `wgpu` implementation of the backend seam
//!
//! Native ids index into tables owned by the backend. Bind group layouts
//! are built explicitly from the bindings of each call and cached together
//! with the pipelines that use them; pipelines are dropped when one of
//! their shaders is destroyed, so a hot-swapped program gets a fresh
//! pipeline on its next use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::backend::*;
use crate::error::{EngineError, EngineResult};

struct BufferEntry {
    buffer: wgpu::Buffer,
    size: u64,
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: TextureDesc,
}

struct ShaderEntry {
    module: wgpu::ShaderModule,
    stage: ShaderStage,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LayoutEntryKey {
    Uniform,
    Storage {
        read_only: bool,
    },
    Texture {
        dimension: TextureDimension,
    },
    StorageTexture {
        dimension: TextureDimension,
        format: TextureFormat,
        access: StorageAccess,
    },
}

type LayoutKey = Vec<(u32, LayoutEntryKey)>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RenderPipelineKey {
    vertex: u64,
    fragment: u64,
    format: TextureFormat,
    vertex_stride: Option<u64>,
    layout: LayoutKey,
}

#[derive(Default)]
struct Resources {
    buffers: HashMap<u64, BufferEntry>,
    textures: HashMap<u64, TextureEntry>,
    shaders: HashMap<u64, ShaderEntry>,
    layouts: HashMap<(LayoutKey, bool), wgpu::BindGroupLayout>,
    compute_pipelines: HashMap<(u64, LayoutKey), wgpu::ComputePipeline>,
    render_pipelines: HashMap<RenderPipelineKey, wgpu::RenderPipeline>,
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_name: String,
    resources: Mutex<Resources>,
    next_id: AtomicU64,
}

impl WgpuBackend {
    /// Create a device without a surface
    pub fn new_headless() -> EngineResult<Self> {
        pollster::block_on(Self::request())
    }

    async fn request() -> EngineResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EngineError::gpu("request_adapter", "no suitable adapter"))?;

        let info = adapter.get_info();
        log::info!("[WgpuBackend] Using adapter {} ({:?})", info.name, info.backend);

        // Read/write access to the r32float volume needs adapter specific
        // format features on this wgpu version
        let required_features =
            adapter.features() & wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        if required_features.is_empty() {
            log::warn!("[WgpuBackend] Adapter lacks read/write storage textures; sculpting will fail validation");
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Sculpt Device"),
                    required_features,
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| EngineError::gpu("request_device", e))?;

        Ok(Self::from_device(Arc::new(device), Arc::new(queue), info.name))
    }

    /// Wrap an existing device, e.g. one created together with a surface
    pub fn from_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        adapter_name: String,
    ) -> Self {
        device.on_uncaptured_error(Box::new(|error| {
            log::error!("[WgpuBackend] Uncaptured device error: {}", error);
        }));

        Self {
            device,
            queue,
            adapter_name,
            resources: Mutex::new(Resources::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check_scope(&self, operation: &str) -> EngineResult<()> {
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(EngineError::gpu(operation, error)),
            None => Ok(()),
        }
    }

    fn layout_key(resources: &Resources, bindings: &[Binding]) -> EngineResult<LayoutKey> {
        let mut key = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let entry = match binding.resource {
                BindingResource::Uniform(_) => LayoutEntryKey::Uniform,
                BindingResource::Storage { read_only, .. } => LayoutEntryKey::Storage { read_only },
                BindingResource::Texture(texture) => {
                    let entry = texture_entry(resources, texture)?;
                    LayoutEntryKey::Texture {
                        dimension: entry.desc.dimension,
                    }
                }
                BindingResource::StorageTexture { texture, access } => {
                    let entry = texture_entry(resources, texture)?;
                    LayoutEntryKey::StorageTexture {
                        dimension: entry.desc.dimension,
                        format: entry.desc.format,
                        access,
                    }
                }
            };
            key.push((binding.slot, entry));
        }
        Ok(key)
    }

    fn ensure_layout(&self, resources: &mut Resources, key: &LayoutKey, compute: bool) {
        if resources.layouts.contains_key(&(key.clone(), compute)) {
            return;
        }

        let visibility = if compute {
            wgpu::ShaderStages::COMPUTE
        } else {
            wgpu::ShaderStages::VERTEX_FRAGMENT
        };

        let entries: Vec<wgpu::BindGroupLayoutEntry> = key
            .iter()
            .map(|(slot, entry)| wgpu::BindGroupLayoutEntry {
                binding: *slot,
                visibility,
                ty: match entry {
                    LayoutEntryKey::Uniform => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    LayoutEntryKey::Storage { read_only } => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage {
                            read_only: *read_only,
                        },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    LayoutEntryKey::Texture { dimension } => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: view_dimension(*dimension),
                        multisampled: false,
                    },
                    LayoutEntryKey::StorageTexture {
                        dimension,
                        format,
                        access,
                    } => wgpu::BindingType::StorageTexture {
                        access: match access {
                            StorageAccess::WriteOnly => wgpu::StorageTextureAccess::WriteOnly,
                            StorageAccess::ReadWrite => wgpu::StorageTextureAccess::ReadWrite,
                        },
                        format: native_format(*format),
                        view_dimension: view_dimension(*dimension),
                    },
                },
                count: None,
            })
            .collect();

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Sculpt Bind Group Layout"),
                entries: &entries,
            });
        resources.layouts.insert((key.clone(), compute), layout);
    }

    fn bind_group(
        &self,
        resources: &Resources,
        label: &str,
        key: &LayoutKey,
        compute: bool,
        bindings: &[Binding],
    ) -> EngineResult<wgpu::BindGroup> {
        let layout = resources
            .layouts
            .get(&(key.clone(), compute))
            .ok_or_else(|| EngineError::gpu("bind_group", "layout missing"))?;

        let mut entries = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let resource = match binding.resource {
                BindingResource::Uniform(buffer) | BindingResource::Storage { buffer, .. } => {
                    buffer_entry(resources, buffer)?.buffer.as_entire_binding()
                }
                BindingResource::Texture(texture)
                | BindingResource::StorageTexture { texture, .. } => {
                    wgpu::BindingResource::TextureView(&texture_entry(resources, texture)?.view)
                }
            };
            entries.push(wgpu::BindGroupEntry {
                binding: binding.slot,
                resource,
            });
        }

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        }))
    }

    fn padded_row(width_bytes: u32) -> u32 {
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        (width_bytes + align - 1) / align * align
    }

    fn map_and_wait(&self, staging: &wgpu::Buffer) -> EngineResult<Vec<u8>> {
        let slice = staging.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| EngineError::gpu("map_async", e))?
            .map_err(|e| EngineError::gpu("map_async", e))?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }
}

fn buffer_entry(resources: &Resources, buffer: NativeBuffer) -> EngineResult<&BufferEntry> {
    resources
        .buffers
        .get(&buffer.0)
        .ok_or_else(|| EngineError::ResourceNotFound {
            resource_type: "buffer".to_string(),
            id: buffer.0.to_string(),
        })
}

fn texture_entry(resources: &Resources, texture: NativeTexture) -> EngineResult<&TextureEntry> {
    resources
        .textures
        .get(&texture.0)
        .ok_or_else(|| EngineError::ResourceNotFound {
            resource_type: "texture".to_string(),
            id: texture.0.to_string(),
        })
}

fn shader_entry(resources: &Resources, shader: NativeShader) -> EngineResult<&ShaderEntry> {
    resources
        .shaders
        .get(&shader.0)
        .ok_or_else(|| EngineError::ResourceNotFound {
            resource_type: "shader".to_string(),
            id: shader.0.to_string(),
        })
}

fn native_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn view_dimension(dimension: TextureDimension) -> wgpu::TextureViewDimension {
    match dimension {
        TextureDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureDimension::D3 => wgpu::TextureViewDimension::D3,
    }
}

fn extent(desc: &TextureDesc) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: desc.size[0],
        height: desc.size[1],
        depth_or_array_layers: desc.size[2],
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> String {
        self.adapter_name.clone()
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> EngineResult<NativeBuffer> {
        let usage = match desc.usage {
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferUsage::Storage => wgpu::BufferUsages::STORAGE,
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
        } | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;

        let size = wgpu::util::align_to(desc.size.max(4), wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size,
            usage,
            mapped_at_creation: false,
        });

        let id = self.next_id();
        self.resources
            .lock()
            .buffers
            .insert(id, BufferEntry { buffer, size });
        Ok(NativeBuffer(id))
    }

    fn write_buffer(&self, buffer: NativeBuffer, offset: u64, data: &[u8]) -> EngineResult<()> {
        let resources = self.resources.lock();
        let entry = buffer_entry(&resources, buffer)?;
        if offset + data.len() as u64 > entry.size {
            return Err(EngineError::BufferError(format!(
                "write of {} bytes at {} overflows {} byte buffer",
                data.len(),
                offset,
                entry.size
            )));
        }
        self.queue.write_buffer(&entry.buffer, offset, data);
        Ok(())
    }

    fn read_buffer(&self, buffer: NativeBuffer) -> EngineResult<Vec<u8>> {
        let staging = {
            let resources = self.resources.lock();
            let entry = buffer_entry(&resources, buffer)?;
            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Readback Staging Buffer"),
                size: entry.size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Buffer Readback"),
                });
            encoder.copy_buffer_to_buffer(&entry.buffer, 0, &staging, 0, entry.size);
            self.queue.submit(Some(encoder.finish()));
            staging
        };
        self.map_and_wait(&staging)
    }

    fn destroy_buffer(&self, buffer: NativeBuffer) {
        if let Some(entry) = self.resources.lock().buffers.remove(&buffer.0) {
            entry.buffer.destroy();
        }
    }

    fn create_texture(&self, desc: &TextureDesc) -> EngineResult<NativeTexture> {
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        if desc.render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: extent(desc),
            mip_level_count: 1,
            sample_count: 1,
            dimension: match desc.dimension {
                TextureDimension::D2 => wgpu::TextureDimension::D2,
                TextureDimension::D3 => wgpu::TextureDimension::D3,
            },
            format: native_format(desc.format),
            usage,
            view_formats: &[],
        });
        self.check_scope("create_texture")?;

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.next_id();
        self.resources.lock().textures.insert(
            id,
            TextureEntry {
                texture,
                view,
                desc: desc.clone(),
            },
        );
        Ok(NativeTexture(id))
    }

    fn write_texture(&self, texture: NativeTexture, data: &[u8]) -> EngineResult<()> {
        let resources = self.resources.lock();
        let entry = texture_entry(&resources, texture)?;
        let desc = &entry.desc;
        if data.len() as u64 != desc.byte_size() {
            return Err(EngineError::BufferError(format!(
                "texture '{}' expects {} bytes, got {}",
                desc.label,
                desc.byte_size(),
                data.len()
            )));
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(desc.size[0] * desc.format.bytes_per_texel()),
                rows_per_image: Some(desc.size[1]),
            },
            extent(desc),
        );
        Ok(())
    }

    fn read_texture(&self, texture: NativeTexture) -> EngineResult<Vec<u8>> {
        let (staging, desc, padded) = {
            let resources = self.resources.lock();
            let entry = texture_entry(&resources, texture)?;
            let desc = entry.desc.clone();
            let row = desc.size[0] * desc.format.bytes_per_texel();
            let padded = Self::padded_row(row);

            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Texture Readback Staging Buffer"),
                size: padded as u64 * desc.size[1] as u64 * desc.size[2] as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Texture Readback"),
                });
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture: &entry.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &staging,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(padded),
                        rows_per_image: Some(desc.size[1]),
                    },
                },
                extent(&desc),
            );
            self.queue.submit(Some(encoder.finish()));
            (staging, desc, padded)
        };

        let padded_data = self.map_and_wait(&staging)?;
        let row = (desc.size[0] * desc.format.bytes_per_texel()) as usize;
        let mut data = Vec::with_capacity(desc.byte_size() as usize);
        for chunk in padded_data.chunks(padded as usize) {
            data.extend_from_slice(&chunk[..row]);
        }
        Ok(data)
    }

    fn clear_texture(&self, texture: NativeTexture) -> EngineResult<()> {
        let size = {
            let resources = self.resources.lock();
            texture_entry(&resources, texture)?.desc.byte_size()
        };
        self.write_texture(texture, &vec![0u8; size as usize])
    }

    fn destroy_texture(&self, texture: NativeTexture) {
        if let Some(entry) = self.resources.lock().textures.remove(&texture.0) {
            entry.texture.destroy();
        }
    }

    fn compile_shader(
        &self,
        label: &str,
        stage: ShaderStage,
        source: &str,
    ) -> EngineResult<NativeShader> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(EngineError::ShaderCompileFailed {
                name: label.to_string(),
                error: error.to_string(),
            });
        }

        let id = self.next_id();
        self.resources
            .lock()
            .shaders
            .insert(id, ShaderEntry { module, stage });
        Ok(NativeShader(id))
    }

    fn destroy_shader(&self, shader: NativeShader) {
        let mut resources = self.resources.lock();
        resources.shaders.remove(&shader.0);
        resources
            .compute_pipelines
            .retain(|(id, _), _| *id != shader.0);
        resources
            .render_pipelines
            .retain(|key, _| key.vertex != shader.0 && key.fragment != shader.0);
    }

    fn dispatch(&self, dispatch: &ComputeDispatch<'_>) -> EngineResult<()> {
        let mut resources = self.resources.lock();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = self.encode_dispatch(&mut resources, dispatch);
        drop(resources);
        let scope = self.check_scope(dispatch.label);
        result.and(scope)
    }

    fn draw(&self, draw: &DrawCall<'_>) -> EngineResult<()> {
        let mut resources = self.resources.lock();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = self.encode_draw(&mut resources, draw);
        drop(resources);
        let scope = self.check_scope(draw.label);
        result.and(scope)
    }
}

impl WgpuBackend {
    fn encode_dispatch(
        &self,
        resources: &mut Resources,
        dispatch: &ComputeDispatch<'_>,
    ) -> EngineResult<()> {
        if shader_entry(resources, dispatch.shader)?.stage != ShaderStage::Compute {
            return Err(EngineError::gpu(
                "dispatch",
                format!("'{}' is not a compute shader", dispatch.label),
            ));
        }

        let key = Self::layout_key(resources, dispatch.bindings)?;
        self.ensure_layout(resources, &key, true);

        let pipeline_key = (dispatch.shader.0, key.clone());
        if !resources.compute_pipelines.contains_key(&pipeline_key) {
            let layout = &resources.layouts[&(key.clone(), true)];
            let pipeline_layout =
                self.device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(dispatch.label),
                        bind_group_layouts: &[layout],
                        push_constant_ranges: &[],
                    });
            let module = &shader_entry(resources, dispatch.shader)?.module;
            let pipeline = self
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(dispatch.label),
                    layout: Some(&pipeline_layout),
                    module,
                    entry_point: "main",
                });
            resources
                .compute_pipelines
                .insert(pipeline_key.clone(), pipeline);
        }

        let bind_group = self.bind_group(resources, dispatch.label, &key, true, dispatch.bindings)?;
        let pipeline = &resources.compute_pipelines[&pipeline_key];

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(dispatch.label),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(dispatch.label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let [x, y, z] = dispatch.groups;
            pass.dispatch_workgroups(x, y, z);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn encode_draw(&self, resources: &mut Resources, draw: &DrawCall<'_>) -> EngineResult<()> {
        let key = Self::layout_key(resources, draw.bindings)?;
        let format = texture_entry(resources, draw.target)?.desc.format;
        self.ensure_layout(resources, &key, false);

        let pipeline_key = RenderPipelineKey {
            vertex: draw.vertex.0,
            fragment: draw.fragment.0,
            format,
            vertex_stride: draw.vertex_input.as_ref().map(|input| input.stride),
            layout: key.clone(),
        };

        if !resources.render_pipelines.contains_key(&pipeline_key) {
            let layout = &resources.layouts[&(key.clone(), false)];
            let pipeline_layout =
                self.device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(draw.label),
                        bind_group_layouts: &[layout],
                        push_constant_ranges: &[],
                    });

            let attributes = [wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
                shader_location: 0,
            }];
            let vertex_layouts: Vec<wgpu::VertexBufferLayout> = draw
                .vertex_input
                .iter()
                .map(|input| wgpu::VertexBufferLayout {
                    array_stride: input.stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                })
                .collect();

            let vertex_module = &shader_entry(resources, draw.vertex)?.module;
            let fragment_module = &shader_entry(resources, draw.fragment)?.module;
            let pipeline = self
                .device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(draw.label),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: vertex_module,
                        entry_point: "main",
                        buffers: &vertex_layouts,
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        // Back faces only, so the volume still shows with the
                        // camera inside the proxy cube
                        cull_mode: Some(wgpu::Face::Front),
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    fragment: Some(wgpu::FragmentState {
                        module: fragment_module,
                        entry_point: "main",
                        targets: &[Some(wgpu::ColorTargetState {
                            format: native_format(format),
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    multiview: None,
                });
            resources
                .render_pipelines
                .insert(pipeline_key.clone(), pipeline);
        }

        let bind_group = self.bind_group(resources, draw.label, &key, false, draw.bindings)?;
        let pipeline = &resources.render_pipelines[&pipeline_key];
        let target = texture_entry(resources, draw.target)?;
        let vertex_buffer = match &draw.vertex_input {
            Some(input) => Some(&buffer_entry(resources, input.buffer)?.buffer),
            None => None,
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(draw.label),
            });
        {
            let [r, g, b, a] = draw.clear_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(draw.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            if let Some(buffer) = vertex_buffer {
                pass.set_vertex_buffer(0, buffer.slice(..));
            }
            pass.draw(0..draw.vertex_count, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
