pub mod ring;
pub mod timer;

use glam::Vec2;
use winit::window::Window;

use self::ring::RingBuffer;
use self::timer::{SystemPhase, SystemTimers, PHASE_COUNT};

use crate::config::{ConfigBridge, InputSnapshot, Preset};
use crate::engine::AnimationLoop;
use crate::mood::Mood;
use crate::render::GpuState;

/// Number of frame times to keep in the histogram.
const FRAME_HISTORY_LEN: usize = 300;
/// How often to log FPS (seconds).
const FPS_LOG_INTERVAL: f64 = 5.0;

/// Body and gaze state shown in the overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineReadout {
    pub body_ticks: u64,
    pub airborne: bool,
    pub vertical_position: f32,
    pub squash: f32,
    pub jelly: f32,
    pub eye_offset: Vec2,
    pub eye_target: Vec2,
    pub blinking: bool,
    pub running: bool,
}

impl EngineReadout {
    pub fn capture(engine: &AnimationLoop) -> Self {
        let state = engine.body().state();
        Self {
            body_ticks: engine.body_ticks(),
            airborne: engine.body().is_airborne(),
            vertical_position: state.vertical_position,
            squash: state.squash.position,
            jelly: state.jelly.position,
            eye_offset: engine.gaze().current(),
            eye_target: engine.gaze().target(),
            blinking: engine.blink().is_closed(),
            running: engine.is_running(),
        }
    }
}

/// Debug overlay powered by egui.
pub struct DebugOverlay {
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    pub egui_renderer: egui_wgpu::Renderer,

    pub visible: bool,

    /// Rolling window of frame times (seconds).
    pub frame_times: RingBuffer<f64>,

    /// Computed stats.
    pub fps: f64,
    pub frame_time_avg: f64,
    pub frame_time_min: f64,
    pub frame_time_max: f64,

    /// Per-phase timers (copied from the engine each frame).
    pub system_timers: SystemTimers,
    pub readout: EngineReadout,

    /// UI controls.
    pub paused: bool,
    pub pause_changed: bool,
    pub present_mode_index: usize,
    pub present_mode_changed: bool,

    /// Configuration writes go through the same bridge as every other input.
    bridge: ConfigBridge,

    // Stats accumulator.
    frame_count: u64,
    log_timer: f64,
    log_frame_count: u32,
    log_frame_sum: f64,
    log_frame_min: f64,
    log_frame_max: f64,
}

const PRESENT_MODES: [wgpu::PresentMode; 3] = [
    wgpu::PresentMode::Mailbox,
    wgpu::PresentMode::Fifo,
    wgpu::PresentMode::Immediate,
];

const PRESENT_MODE_LABELS: [&str; 3] = ["Mailbox", "Fifo (vsync)", "Immediate"];

impl DebugOverlay {
    pub fn new(window: &Window, gpu: &GpuState, bridge: ConfigBridge) -> Self {
        let egui_ctx = egui::Context::default();

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            Some(gpu.device.limits().max_texture_dimension_2d as usize),
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            &gpu.device,
            gpu.surface_config.format,
            egui_wgpu::RendererOptions {
                depth_stencil_format: None,
                msaa_samples: 1,
                dithering: true,
                predictable_texture_filtering: false,
            },
        );

        let present_mode_index = PRESENT_MODES
            .iter()
            .position(|m| *m == gpu.surface_config.present_mode)
            .unwrap_or(0);

        Self {
            egui_ctx,
            egui_state,
            egui_renderer,
            visible: false,
            frame_times: RingBuffer::new(FRAME_HISTORY_LEN),
            fps: 0.0,
            frame_time_avg: 0.0,
            frame_time_min: 0.0,
            frame_time_max: 0.0,
            system_timers: SystemTimers::new(),
            readout: EngineReadout::default(),
            paused: false,
            pause_changed: false,
            present_mode_index,
            present_mode_changed: false,
            bridge,
            frame_count: 0,
            log_timer: 0.0,
            log_frame_count: 0,
            log_frame_sum: 0.0,
            log_frame_min: f64::MAX,
            log_frame_max: 0.0,
        }
    }

    /// Record a frame time, update rolling stats, and periodically log.
    pub fn record_frame(&mut self, dt: f64) {
        self.frame_count += 1;
        self.frame_times.push(dt);

        // Compute stats from ring buffer.
        let len = self.frame_times.len();
        if len > 0 {
            let mut sum = 0.0;
            let mut min = f64::MAX;
            let mut max = 0.0f64;
            for &t in self.frame_times.iter() {
                sum += t;
                min = min.min(t);
                max = max.max(t);
            }
            self.frame_time_avg = sum / len as f64;
            self.frame_time_min = min;
            self.frame_time_max = max;
            self.fps = if self.frame_time_avg > 0.0 {
                1.0 / self.frame_time_avg
            } else {
                0.0
            };
        }

        // Periodic log.
        self.log_frame_count += 1;
        self.log_frame_sum += dt;
        self.log_frame_min = self.log_frame_min.min(dt);
        self.log_frame_max = self.log_frame_max.max(dt);
        self.log_timer += dt;

        if self.log_timer >= FPS_LOG_INTERVAL {
            let avg_ms = (self.log_frame_sum / self.log_frame_count as f64) * 1000.0;
            let fps = self.log_frame_count as f64 / self.log_timer;
            log::info!(
                "FPS: {:.0} | avg: {:.2}ms | min: {:.2}ms | max: {:.2}ms | total frames: {}",
                fps,
                avg_ms,
                self.log_frame_min * 1000.0,
                self.log_frame_max * 1000.0,
                self.frame_count,
            );
            self.log_timer = 0.0;
            self.log_frame_count = 0;
            self.log_frame_sum = 0.0;
            self.log_frame_min = f64::MAX;
            self.log_frame_max = 0.0;
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        log::debug!("debug overlay {}", if self.visible { "shown" } else { "hidden" });
    }

    /// Forward a winit event to egui. Returns true if egui consumed it.
    pub fn on_window_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        if !self.visible {
            return false;
        }
        let response = self.egui_state.on_window_event(window, event);
        response.consumed
    }

    /// The selected present mode.
    pub fn selected_present_mode(&self) -> wgpu::PresentMode {
        PRESENT_MODES[self.present_mode_index]
    }

    /// Run the egui frame and produce paint output.
    /// Returns (clipped_primitives, textures_delta, screen_descriptor).
    pub fn run_frame(
        &mut self,
        window: &Window,
        screen_w: u32,
        screen_h: u32,
    ) -> (
        Vec<egui::epaint::ClippedPrimitive>,
        egui::TexturesDelta,
        egui_wgpu::ScreenDescriptor,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);

        // Snapshot read-only state for UI drawing (avoids borrow conflict
        // between egui_ctx.run() borrowing self and the closure borrowing self).
        let ui_state = UiSnapshot {
            visible: self.visible,
            fps: self.fps,
            frame_time_avg: self.frame_time_avg,
            frame_time_min: self.frame_time_min,
            frame_time_max: self.frame_time_max,
            frame_times: self.frame_times.iter().copied().collect(),
            system_durations: self.system_timers.durations_us,
            readout: self.readout,
        };

        // Mutable controls, written back after run().
        let before = self.bridge.snapshot();
        let mut controls = Controls {
            paused: self.paused,
            present_mode_index: self.present_mode_index,
            inputs: before,
            preset: None,
            bounce: false,
        };

        let ctx = self.egui_ctx.clone();
        let full_output = ctx.run(raw_input, |ctx| {
            draw_ui(ctx, &ui_state, &mut controls);
        });

        self.apply_controls(before, controls);

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let pixels_per_point = full_output.pixels_per_point;
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes, pixels_per_point);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [screen_w, screen_h],
            pixels_per_point,
        };

        (clipped_primitives, full_output.textures_delta, screen_descriptor)
    }

    fn apply_controls(&mut self, before: InputSnapshot, c: Controls) {
        if c.paused != self.paused {
            self.pause_changed = true;
        }
        self.paused = c.paused;
        if c.present_mode_index != self.present_mode_index {
            self.present_mode_changed = true;
        }
        self.present_mode_index = c.present_mode_index;

        // Only forward fields the user touched so host writes are not clobbered.
        let after = c.inputs;
        if after.flame != before.flame {
            self.bridge.set_flame(after.flame);
        }
        if after.mood != before.mood {
            self.bridge.set_mood(after.mood);
        }
        if after.sphere_scale != before.sphere_scale {
            self.bridge.set_sphere_scale(after.sphere_scale);
        }
        if after.sphere_opacity != before.sphere_opacity {
            self.bridge.set_sphere_opacity(after.sphere_opacity);
        }
        if after.follow_pointer != before.follow_pointer {
            self.bridge.set_follow_mode(after.follow_pointer);
        }
        if let Some(preset) = c.preset {
            self.bridge.apply_preset(preset);
        }
        if c.bounce {
            self.bridge.trigger();
        }
    }

    /// Upload egui textures and buffers. Call before draw_egui render pass.
    pub fn prepare_egui(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        primitives: &[egui::epaint::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) -> Vec<wgpu::CommandBuffer> {
        for (id, image_delta) in &textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, primitives, screen_descriptor)
    }

    /// Render egui into the given render pass.
    pub fn render_egui(
        &self,
        render_pass: &mut wgpu::RenderPass<'static>,
        primitives: &[egui::epaint::ClippedPrimitive],
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        self.egui_renderer
            .render(render_pass, primitives, screen_descriptor);
    }

    /// Free textures after present.
    pub fn free_textures(&mut self, textures_delta: &egui::TexturesDelta) {
        for &id in &textures_delta.free {
            self.egui_renderer.free_texture(&id);
        }
    }
}

// ---------------------------------------------------------------------------
// UI snapshot + free-function draw (avoids borrow conflicts with egui_ctx)
// ---------------------------------------------------------------------------

struct UiSnapshot {
    visible: bool,
    fps: f64,
    frame_time_avg: f64,
    frame_time_min: f64,
    frame_time_max: f64,
    frame_times: Vec<f64>,
    system_durations: [f64; PHASE_COUNT],
    readout: EngineReadout,
}

struct Controls {
    paused: bool,
    present_mode_index: usize,
    inputs: InputSnapshot,
    preset: Option<Preset>,
    bounce: bool,
}

fn draw_ui(ctx: &egui::Context, s: &UiSnapshot, c: &mut Controls) {
    if !s.visible {
        return;
    }

    let panel_frame = egui::Frame::NONE
        .fill(egui::Color32::from_rgba_unmultiplied(20, 20, 20, 220))
        .corner_radius(6.0)
        .inner_margin(10.0);

    egui::Window::new("Debug")
        .default_pos([10.0, 10.0])
        .default_width(320.0)
        .resizable(true)
        .frame(panel_frame)
        .show(ctx, |ui| {
            ui.style_mut().visuals.override_text_color = Some(egui::Color32::from_gray(220));

            // --- Performance ---
            ui.heading("Performance");
            ui.label(format!("FPS: {:.1}", s.fps));
            ui.label(format!(
                "Frame: {:.2}ms avg | {:.2} min | {:.2} max",
                s.frame_time_avg * 1000.0,
                s.frame_time_min * 1000.0,
                s.frame_time_max * 1000.0,
            ));
            ui.add_space(4.0);

            // --- Frame time histogram ---
            ui.heading("Frame Time History");
            if !s.frame_times.is_empty() {
                let max_time = s
                    .frame_times
                    .iter()
                    .copied()
                    .fold(0.0f64, f64::max)
                    .max(0.020);

                let (response, painter) =
                    ui.allocate_painter(egui::vec2(300.0, 60.0), egui::Sense::hover());
                let rect = response.rect;

                let bar_width = rect.width() / s.frame_times.len() as f32;
                let target_y = rect.bottom() - (0.01667 / max_time as f32) * rect.height();

                for (i, &t) in s.frame_times.iter().enumerate() {
                    let h = (t / max_time) as f32 * rect.height();
                    let x = rect.left() + i as f32 * bar_width;
                    let color = if t > 0.01667 {
                        egui::Color32::from_rgb(255, 100, 80)
                    } else {
                        egui::Color32::from_rgb(80, 200, 120)
                    };
                    painter.rect_filled(
                        egui::Rect::from_min_max(
                            egui::pos2(x, rect.bottom() - h),
                            egui::pos2(x + bar_width - 1.0, rect.bottom()),
                        ),
                        0.0,
                        color,
                    );
                }

                // 16.67ms target line
                painter.line_segment(
                    [
                        egui::pos2(rect.left(), target_y),
                        egui::pos2(rect.right(), target_y),
                    ],
                    egui::Stroke::new(1.0, egui::Color32::from_rgb(255, 255, 100)),
                );
            }
            ui.add_space(4.0);

            // --- Phase timers ---
            ui.heading("System Timers");
            let total: f64 = s.system_durations.iter().sum::<f64>().max(1.0);
            let max_us = s
                .system_durations
                .iter()
                .copied()
                .fold(0.0f64, f64::max)
                .max(1.0);

            for phase in SystemPhase::ALL {
                let us = s.system_durations[phase as usize];
                let pct = us / total * 100.0;
                let bar_frac = (us / max_us) as f32;

                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(format!("{:<12}", phase.label())).monospace());
                    ui.label(
                        egui::RichText::new(format!("{:>5.0}us ({:>2.0}%)", us, pct)).monospace(),
                    );

                    let (response, painter) =
                        ui.allocate_painter(egui::vec2(80.0, 12.0), egui::Sense::hover());
                    let r = response.rect;
                    painter.rect_filled(
                        egui::Rect::from_min_max(
                            r.left_top(),
                            egui::pos2(r.left() + r.width() * bar_frac, r.bottom()),
                        ),
                        2.0,
                        egui::Color32::from_rgb(255, 150, 60),
                    );
                });
            }
            ui.label(
                egui::RichText::new(format!("Total: {:.0}us ({:.2}ms)", total, total / 1000.0))
                    .monospace(),
            );
            ui.add_space(4.0);

            // --- Body ---
            ui.heading("Body");
            let r = &s.readout;
            ui.label(format!(
                "{} | y: {:.1}px | ticks: {}",
                if r.airborne { "Airborne" } else { "Grounded" },
                r.vertical_position,
                r.body_ticks,
            ));
            ui.label(format!("Squash: {:.3} | Jelly: {:.3}", r.squash, r.jelly));
            ui.label(format!(
                "Eyes: ({:.1}, {:.1}) -> ({:.1}, {:.1}){}",
                r.eye_offset.x,
                r.eye_offset.y,
                r.eye_target.x,
                r.eye_target.y,
                if r.blinking { " | blink" } else { "" },
            ));
            if ui.button("Bounce").clicked() {
                c.bounce = true;
            }
            ui.add_space(4.0);

            // --- Flame ---
            ui.heading("Flame");
            let f = &mut c.inputs.flame;
            ui.add(egui::Slider::new(&mut f.amplitude, 0.0..=120.0).text("Amplitude"));
            ui.add(egui::Slider::new(&mut f.intensity, 0.0..=3.0).text("Intensity"));
            ui.add(egui::Slider::new(&mut f.drift, 0.0..=4.0).text("Drift"));
            ui.add(egui::Slider::new(&mut f.noise_scale, 0.01..=4.0).text("Noise scale"));
            ui.add(egui::Slider::new(&mut f.upward_bias, 0.0..=2.0).text("Upward bias"));
            ui.add(egui::Slider::new(&mut f.spread, 0.01..=6.0).text("Spread"));
            ui.add_space(4.0);

            // --- Look ---
            ui.heading("Look");
            ui.horizontal(|ui| {
                ui.label("Mood:");
                egui::ComboBox::from_id_salt("mood")
                    .selected_text(c.inputs.mood.label())
                    .show_ui(ui, |ui| {
                        for mood in Mood::ALL {
                            ui.selectable_value(&mut c.inputs.mood, mood, mood.label());
                        }
                    });
            });
            ui.horizontal(|ui| {
                ui.label("Preset:");
                for preset in Preset::ALL {
                    if ui.button(preset.label()).clicked() {
                        c.preset = Some(preset);
                    }
                }
            });
            ui.add(egui::Slider::new(&mut c.inputs.sphere_scale, 0.2..=2.0).text("Sphere scale"));
            ui.add(egui::Slider::new(&mut c.inputs.sphere_opacity, 0.0..=1.0).text("Sphere opacity"));
            ui.checkbox(&mut c.inputs.follow_pointer, "Follow pointer");
            ui.add_space(4.0);

            // --- Controls ---
            ui.heading("Controls");
            ui.checkbox(&mut c.paused, "Pause Animation");
            ui.horizontal(|ui| {
                ui.label("Present:");
                egui::ComboBox::from_id_salt("present_mode")
                    .selected_text(PRESENT_MODE_LABELS[c.present_mode_index])
                    .show_ui(ui, |ui| {
                        for (i, label) in PRESENT_MODE_LABELS.iter().enumerate() {
                            ui.selectable_value(&mut c.present_mode_index, i, *label);
                        }
                    });
            });
            ui.add_space(4.0);

            // --- Info ---
            ui.heading("Info");
            ui.label(if r.running { "Running" } else { "Stopped" });
            ui.label("Click: Bounce | M: Mood | P: Preset | F: Follow");
            ui.label("F12: Toggle | ESC: Quit");
        });
}
