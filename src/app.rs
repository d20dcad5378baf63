use std::sync::Arc;

use glam::Vec2;
use instant::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId, WindowLevel};

use crate::config::{ConfigBridge, Preset};
use crate::debug::timer::SystemPhase;
use crate::debug::{DebugOverlay, EngineReadout};
use crate::engine::AnimationLoop;
use crate::render::target::RenderTarget;
use crate::render::GpuState;

/// Initial window size (logical px). Leaves headroom above the sphere for
/// the flame and the bounce.
const WINDOW_WIDTH: f64 = 480.0;
const WINDOW_HEIGHT: f64 = 520.0;
/// Resting sphere center as a fraction of the surface height.
const ANCHOR_Y_FRAC: f32 = 0.62;

/// Top-level application state.
struct App {
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    overlay: Option<DebugOverlay>,

    bridge: ConfigBridge,
    engine: AnimationLoop,

    // Frame timing
    last_frame_time: Option<Instant>,

    preset: Preset,
    pointer: Option<Vec2>,
    error: Option<Box<dyn std::error::Error>>,
}

impl App {
    fn new() -> Self {
        let bridge = ConfigBridge::new();
        bridge.on_click(|| log::debug!("bounce"));
        let engine = AnimationLoop::new(bridge.clone());
        Self {
            window: None,
            gpu: None,
            overlay: None,
            bridge,
            engine,
            last_frame_time: None,
            preset: Preset::Default,
            pointer: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Box<dyn std::error::Error>) {
        log::error!("Startup failed: {error}");
        self.error = Some(error);
        event_loop.exit();
    }

    /// Re-center the resting sphere on the surface.
    fn place_anchor(&mut self, width: u32, height: u32) {
        let anchor = Vec2::new(width as f32 * 0.5, height as f32 * ANCHOR_Y_FRAC);
        self.bridge.set_anchor(anchor);
        if let Some(gpu) = &mut self.gpu {
            gpu.set_origin(anchor);
        }
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode) {
        match key {
            KeyCode::Escape => {
                log::info!("ESC pressed, exiting");
                event_loop.exit();
            }
            KeyCode::F12 => {
                if let Some(overlay) = &mut self.overlay {
                    overlay.toggle();
                }
            }
            KeyCode::KeyM => {
                let mood = self.bridge.snapshot().mood.next();
                self.bridge.set_mood(mood);
            }
            KeyCode::KeyP => {
                self.preset = self.preset.next();
                self.bridge.apply_preset(self.preset);
            }
            KeyCode::KeyF => {
                let follow = !self.bridge.snapshot().follow_pointer;
                self.bridge.set_follow_mode(follow);
            }
            _ => {}
        }
    }

    fn on_left_press(&mut self) {
        let Some(pointer) = self.pointer else {
            return;
        };
        if self.engine.hit_test(pointer) {
            self.bridge.trigger();
        } else if let Some(window) = &self.window {
            // Undecorated: dragging anywhere off the body moves the window.
            if let Err(e) = window.drag_window() {
                log::warn!("drag_window failed: {e}");
            }
        }
    }

    /// Apply overlay control changes that live outside the config bridge.
    fn sync_overlay_controls(&mut self) {
        let Some(overlay) = &mut self.overlay else {
            return;
        };
        if overlay.pause_changed {
            overlay.pause_changed = false;
            if overlay.paused {
                self.engine.stop();
            } else {
                self.engine.start();
                // Skip the paused interval instead of replaying it.
                self.last_frame_time = None;
            }
        }
        if overlay.present_mode_changed {
            overlay.present_mode_changed = false;
            if let Some(gpu) = &mut self.gpu {
                gpu.set_present_mode(overlay.selected_present_mode());
            }
        }
    }

    fn redraw(&mut self) {
        // --- Timing ---
        let now = Instant::now();
        let dt = self
            .last_frame_time
            .map(|last| now.duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_frame_time = Some(now);

        let (window, gpu) = match (&self.window, &mut self.gpu) {
            (Some(window), Some(gpu)) => (window, gpu),
            _ => {
                self.engine.frame(dt, None);
                return;
            }
        };

        if let Some(overlay) = &mut self.overlay {
            overlay.record_frame(dt);
        }

        // --- Simulate + build scene geometry ---
        let target: &mut dyn RenderTarget = &mut *gpu;
        self.engine.frame(dt, Some(target));

        let timers = self.engine.timers_mut();
        timers.begin();
        gpu.upload_scene();
        timers.end(SystemPhase::Upload);

        // --- Render ---
        timers.begin();
        if let Some(mut frame) = gpu.begin_frame() {
            gpu.draw_scene(&mut frame.encoder, &frame.view);

            let mut extra_cmd_bufs = Vec::new();
            let mut textures_delta = None;
            if let Some(overlay) = self.overlay.as_mut().filter(|o| o.visible) {
                overlay.readout = EngineReadout::capture(&self.engine);
                overlay.system_timers = *self.engine.timers();

                let (primitives, delta, screen) = overlay.run_frame(
                    window,
                    gpu.surface_config.width,
                    gpu.surface_config.height,
                );
                extra_cmd_bufs = overlay.prepare_egui(
                    &gpu.device,
                    &gpu.queue,
                    &mut frame.encoder,
                    &primitives,
                    &delta,
                    &screen,
                );
                {
                    let mut pass = GpuState::begin_egui_pass(&mut frame.encoder, &frame.view);
                    overlay.render_egui(&mut pass, &primitives, &screen);
                }
                textures_delta = Some(delta);
            }

            gpu.finish_frame(frame.encoder, frame.output, extra_cmd_bufs);

            if let (Some(overlay), Some(delta)) = (&mut self.overlay, textures_delta) {
                overlay.free_textures(&delta);
            }
        }
        self.engine.timers_mut().end(SystemPhase::Render);

        self.sync_overlay_controls();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("Emberpet")
            .with_decorations(false)
            .with_transparent(true)
            .with_resizable(false)
            .with_visible(false)
            .with_window_level(WindowLevel::AlwaysOnTop)
            .with_inner_size(winit::dpi::LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT));

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        let size = window.inner_size();
        log::info!("Window created: {}x{}", size.width, size.height);

        // Initialize wgpu + fill pipeline
        let gpu = match GpuState::new(window.clone()) {
            Ok(gpu) => gpu,
            Err(e) => return self.fail(event_loop, e),
        };
        log::info!("wgpu + fill pipeline initialized");

        self.overlay = Some(DebugOverlay::new(&window, &gpu, self.bridge.clone()));
        self.gpu = Some(gpu);
        self.place_anchor(size.width, size.height);

        // Continuous animation loop
        event_loop.set_control_flow(ControlFlow::Poll);
        self.engine.start();

        window.set_visible(true);
        self.window = Some(window);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(window), Some(overlay)) = (&self.window, &mut self.overlay) {
            if overlay.on_window_event(window, &event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting");
                self.engine.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                }
                self.place_anchor(new_size.width, new_size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let pointer = Vec2::new(position.x as f32, position.y as f32);
                self.pointer = Some(pointer);
                self.bridge.set_pointer(Some(pointer));
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer = None;
                self.bridge.set_pointer(None);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.on_left_press(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        self.on_key(event_loop, key);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

/// Entry point: create the event loop and run.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new();
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
