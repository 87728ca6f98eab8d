//! wgpu implementation of [`RenderBackend`].
//!
//! The context owns the device, the queue, the configured surface and everything
//! the single mesh pipeline needs. Per-draw transforms travel in an instance
//! buffer that is rewritten every frame and grows on demand.

use std::iter;

use anyhow::Context as _;
use wgpu::util::DeviceExt;

use crate::{
    camera::{CameraResources, CameraUniform},
    data_structures::{instance::InstanceRaw, mesh::MeshPrimitive, texture::DepthTexture},
    error::{RenderError, UploadError},
    pipelines::basic::mk_mesh_pipeline,
    render::{Frame, RenderBackend},
};

/// Vertex and index buffers of one uploaded primitive.
#[derive(Debug)]
pub struct GpuMesh {
    pub label: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

/// Create the wgpu instance for the current platform.
pub fn create_instance() -> wgpu::Instance {
    // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        #[cfg(not(target_arch = "wasm32"))]
        backends: wgpu::Backends::PRIMARY,
        #[cfg(target_arch = "wasm32")]
        backends: wgpu::Backends::GL,
        ..Default::default()
    })
}

#[derive(Debug)]
pub struct Context {
    pub(crate) depth_texture: DepthTexture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pipeline: wgpu::RenderPipeline,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    is_surface_configured: bool,
}

impl Context {
    /// Acquire an adapter and device for `surface` and configure it at `size`.
    pub async fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        size: (u32, u32),
    ) -> anyhow::Result<Self> {
        log::info!("requesting adapter");
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow::anyhow!("no graphics adapter can present to this surface: {e}"))?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("glb-viewer device"),
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow::anyhow!("requesting a device failed: {e}"))?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour, so prefer an sRGB surface
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.0.max(1),
            height: size.1.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let is_surface_configured = size.0 > 0 && size.1 > 0;
        if is_surface_configured {
            surface.configure(&device, &config);
        }

        let camera = CameraResources::new(&device);
        let pipeline = mk_mesh_pipeline(&device, config.format, &camera.bind_group_layout);
        let depth_texture =
            DepthTexture::new(&device, [config.width, config.height], "depth_texture");
        let instance_capacity = 16;
        let instance_buffer = create_instance_buffer(&device, instance_capacity);

        Ok(Self {
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera,
            pipeline,
            instance_buffer,
            instance_capacity,
            is_surface_configured,
        })
    }

    fn reserve_instances(&mut self, count: usize) {
        if count <= self.instance_capacity {
            return;
        }
        self.instance_capacity = count.next_power_of_two();
        log::debug!("growing instance buffer to {} entries", self.instance_capacity);
        self.instance_buffer = create_instance_buffer(&self.device, self.instance_capacity);
    }

    fn check_size(&self, bytes: usize) -> Result<(), UploadError> {
        let limit = self.device.limits().max_buffer_size;
        if bytes as u64 > limit {
            return Err(UploadError::TooLarge {
                bytes: bytes as u64,
                limit,
            });
        }
        Ok(())
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: (capacity.max(1) * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl RenderBackend for Context {
    type Mesh = GpuMesh;

    fn upload_mesh(&mut self, primitive: &MeshPrimitive) -> Result<GpuMesh, UploadError> {
        let vertices: &[u8] = bytemuck::cast_slice(&primitive.vertices);
        let indices: &[u8] = bytemuck::cast_slice(&primitive.indices);
        self.check_size(vertices.len())?;
        self.check_size(indices.len())?;
        let num_elements = u32::try_from(primitive.indices.len())
            .map_err(|_| UploadError::TooLarge {
                bytes: indices.len() as u64,
                limit: u32::MAX as u64,
            })?;

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Vertex Buffer", primitive.label)),
                contents: vertices,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Index Buffer", primitive.label)),
                contents: indices,
                usage: wgpu::BufferUsages::INDEX,
            });
        Ok(GpuMesh {
            label: primitive.label.clone(),
            vertex_buffer,
            index_buffer,
            num_elements,
        })
    }

    fn render_frame(&mut self, frame: &Frame<'_, GpuMesh>) -> Result<(), RenderError> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::SurfaceLost);
            }
            Err(e) => return Err(RenderError::Surface(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniform = CameraUniform::from_matrices(frame.camera.eye(), frame.view, frame.proj);
        self.camera.write(&self.queue, uniform);

        let instances: Vec<InstanceRaw> = frame
            .draws()
            .map(|(_, draw)| InstanceRaw::new(&draw.world, draw.color))
            .collect();
        self.reserve_instances(instances.len());
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.camera.bind_group, &[]);
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for (i, (mesh, _)) in frame.draws().enumerate() {
                let instance = i as u32;
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.num_elements, 0, instance..instance + 1);
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.is_surface_configured = true;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = DepthTexture::new(&self.device, [width, height], "depth_texture");
        }
    }
}
