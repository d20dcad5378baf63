pub mod body;
pub mod pipeline;
pub mod target;
pub mod tessellate;

use std::sync::Arc;

use glam::Vec2;
use winit::window::Window;

use crate::body::BodyPose;

use self::body::BodyPainter;
use self::pipeline::{FillPipeline, MAX_FILL_VERTICES};
use self::target::{Blend, Path, RadialGradient, RenderTarget};
use self::tessellate::{Tessellator, Transform};

/// Core GPU state: device, queue, surface, fill pipeline and the scene
/// geometry built each frame.
pub struct GpuState {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub fill_pipeline: FillPipeline,

    /// Flame fills in emitter-local space, rebuilt every flame tick.
    flame: Tessellator,
    /// Shadow, flame and body composed for upload.
    scene: Tessellator,
    painter: BodyPainter,
    pose: Option<BodyPose>,
}

/// Intermediate frame state returned by `begin_frame`.
pub struct FrameContext {
    pub output: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

impl GpuState {
    /// Initialize wgpu and the fill pipeline.
    pub fn new(window: Arc<Window>) -> Result<Self, Box<dyn std::error::Error>> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;

        log::info!(
            "GPU adapter: {:?} ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("emberpet_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            ..Default::default()
        }))?;

        let surface_caps = surface.get_capabilities(&adapter);

        let format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or("surface reports no texture formats")?;

        log::info!("Available alpha modes: {:?}", surface_caps.alpha_modes);

        let alpha_mode = if surface_caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else if surface_caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PostMultiplied)
        {
            wgpu::CompositeAlphaMode::PostMultiplied
        } else {
            wgpu::CompositeAlphaMode::Auto
        };

        // Prefer Mailbox (no CPU-blocking on missed deadlines) with Fifo fallback.
        let present_mode = if surface_caps
            .present_modes
            .contains(&wgpu::PresentMode::Mailbox)
        {
            log::info!("Using PresentMode::Mailbox");
            wgpu::PresentMode::Mailbox
        } else {
            log::info!("Mailbox unavailable, falling back to PresentMode::Fifo");
            wgpu::PresentMode::Fifo
        };

        log::info!("Surface: format={:?}, alpha_mode={:?}", format, alpha_mode);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let mut fill_pipeline = FillPipeline::new(&device, format);
        fill_pipeline.update_screen_size(
            &queue,
            surface_config.width as f32,
            surface_config.height as f32,
        );

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            fill_pipeline,
            flame: Tessellator::with_capacity(MAX_FILL_VERTICES / 2),
            scene: Tessellator::with_capacity(MAX_FILL_VERTICES),
            painter: BodyPainter::new(),
            pose: None,
        })
    }

    /// Resize the surface.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.fill_pipeline
            .update_screen_size(&self.queue, width as f32, height as f32);
    }

    /// Place the resting sphere center on the surface (px).
    pub fn set_origin(&mut self, origin: Vec2) {
        self.fill_pipeline.update_origin(&self.queue, origin.x, origin.y);
    }

    /// Change the present mode at runtime.
    pub fn set_present_mode(&mut self, mode: wgpu::PresentMode) {
        self.surface_config.present_mode = mode;
        self.surface.configure(&self.device, &self.surface_config);
        log::info!("Present mode changed to {:?}", mode);
    }

    /// Compose shadow, flame and body and upload them. The flame follows the
    /// pose's vertical offset.
    pub fn upload_scene(&mut self) {
        self.scene.clear();
        let offset_y = match &self.pose {
            Some(pose) => {
                self.painter.paint_shadow(pose, &mut self.scene);
                pose.offset_y
            }
            None => 0.0,
        };
        self.scene.append_translated(&self.flame, Vec2::new(0.0, offset_y));
        if let Some(pose) = &self.pose {
            self.painter.paint_body(pose, &mut self.scene);
        }
        self.fill_pipeline
            .update_vertices(&self.queue, self.scene.vertices());
    }

    /// Acquire the next surface texture and create a command encoder.
    /// Returns None if the surface is lost/outdated (caller should skip this frame).
    pub fn begin_frame(&self) -> Option<FrameContext> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return None;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory");
                return None;
            }
            Err(e) => {
                log::warn!("Surface error: {e:?}");
                return None;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        Some(FrameContext {
            output,
            view,
            encoder,
        })
    }

    /// Clear to transparent and draw the uploaded scene, switching pipelines
    /// per blend batch.
    pub fn draw_scene(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene_render_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.0,
                        g: 0.0,
                        b: 0.0,
                        a: 0.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let p = &self.fill_pipeline;
        if p.num_vertices == 0 {
            return;
        }
        render_pass.set_bind_group(0, &p.scene_bind_group, &[]);
        render_pass.set_vertex_buffer(0, p.vertex_buffer.slice(..));
        for batch in self.scene.batches() {
            let end = batch.vertices.end.min(p.num_vertices);
            if batch.vertices.start >= end {
                continue;
            }
            render_pass.set_pipeline(p.pipeline(batch.blend));
            render_pass.draw(batch.vertices.start..end, 0..1);
        }
    }

    /// Create an egui render pass that preserves existing content (LoadOp::Load).
    /// Returns a 'static render pass suitable for egui_wgpu::Renderer::render().
    pub fn begin_egui_pass(
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> wgpu::RenderPass<'static> {
        let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("egui_render_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.forget_lifetime()
    }

    /// Submit the command encoder and present.
    pub fn finish_frame(
        &self,
        encoder: wgpu::CommandEncoder,
        output: wgpu::SurfaceTexture,
        extra_cmd_bufs: Vec<wgpu::CommandBuffer>,
    ) {
        self.queue.submit(
            extra_cmd_bufs
                .into_iter()
                .chain(std::iter::once(encoder.finish())),
        );
        output.present();
    }
}

impl RenderTarget for GpuState {
    fn begin_flame(&mut self) {
        self.flame.clear();
    }

    fn fill_path(&mut self, path: &Path, paint: &RadialGradient, blend: Blend) {
        self.flame.fill(path, paint, blend, Transform::IDENTITY);
    }

    fn apply_pose(&mut self, pose: &BodyPose) {
        self.pose = Some(*pose);
    }
}
