use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use oldcomputers_assets::{AssetCache, fixture};
use oldcomputers_common::Color;
use oldcomputers_render::{LedState, SceneSummary};
use oldcomputers_render_wgpu::{FrameStats, OrbitCamera, WgpuRenderer};
use oldcomputers_scene::{FrameClock, InstanceProvider, Scene, SpinningBox, Stage, StageHandle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{
    DeviceEvent, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent,
};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "oldcomputers-desktop", about = "Old computers desktop viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Binary glTF scene asset
    #[arg(long, default_value = "computers_1-transformed.glb")]
    asset: PathBuf,

    /// Use the built-in synthetic scene instead of --asset
    #[arg(long)]
    synthetic: bool,

    /// Font for the text monitors
    #[arg(long, default_value = "Inter-Medium.ttf")]
    font: PathBuf,

    /// Also compose the seven text monitors
    #[arg(long)]
    text_screens: bool,
}

/// Application state.
struct AppState {
    scene: Scene,
    stage: StageHandle,
    spinner: SpinningBox,
    background: Color,
    summary: SceneSummary,
    clock: FrameClock,
    camera: OrbitCamera,
    stats: FrameStats,
    show_overlay: bool,
    // Input state
    orbiting: bool,
    last_frame: Instant,
    fps: f32,
}

impl AppState {
    fn load(cli: &Cli) -> Result<Self> {
        let mut cache = AssetCache::new();
        let asset = if cli.synthetic {
            Arc::new(fixture::computers_scene()?)
        } else {
            cache
                .scene(&cli.asset)
                .with_context(|| format!("loading {}", cli.asset.display()))?
        };

        let mut stage = Stage::default();
        if cli.text_screens {
            let font = cache
                .font(&cli.font)
                .with_context(|| format!("loading {}", cli.font.display()))?;
            stage.computers = stage.computers.clone().with_text_screens(font);
        }

        let instances = InstanceProvider::new().instances(&asset)?;
        let mut scene = Scene::new();
        let handle = stage.compose(&instances, &mut scene)?;
        let summary = SceneSummary::of(&scene);
        tracing::info!(
            "scene ready: {} nodes, {} render targets, {} draw calls",
            summary.nodes,
            summary.render_targets,
            summary.draw_calls
        );

        Ok(Self {
            scene,
            stage: handle,
            spinner: stage.computers.screen.spinner.clone(),
            background: stage.background,
            summary,
            clock: FrameClock::new(),
            camera: OrbitCamera::default(),
            stats: FrameStats::default(),
            show_overlay: true,
            orbiting: false,
            last_frame: Instant::now(),
            fps: 0.0,
        })
    }

    fn update(&mut self, dt: f32) {
        if dt > 0.0 {
            self.fps = self.fps * 0.9 + 0.1 / dt;
        }
        let frame = self.clock.tick(dt);
        self.scene.advance(&frame);
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if !pressed {
            return;
        }

        match key {
            KeyCode::KeyB => {
                let clicked = self.spinner.toggle_clicked();
                tracing::info!("spinning box clicked: {}", clicked);
            }
            KeyCode::KeyH => {
                let hovered = self.spinner.interaction().get().hovered;
                self.spinner.set_hovered(!hovered);
            }
            KeyCode::KeyR => {
                self.camera = OrbitCamera {
                    aspect: self.camera.aspect,
                    ..OrbitCamera::default()
                };
            }
            KeyCode::F1 => {
                self.show_overlay = !self.show_overlay;
            }
            _ => {}
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_overlay {
            return;
        }

        egui::SidePanel::left("overlay")
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Old Computers");
                ui.separator();
                ui.label(format!(
                    "Time: {:.2}s  Frame: {}  FPS: {:.0}",
                    self.clock.elapsed(),
                    self.clock.frame(),
                    self.fps
                ));
                let eye = self.camera.eye();
                ui.label(format!("Camera: ({:.1}, {:.1}, {:.1})", eye.x, eye.y, eye.z));
                ui.separator();

                ui.heading("Scene");
                ui.label(format!(
                    "Nodes: {}  Meshes: {}  Instances: {}",
                    self.summary.nodes, self.summary.meshes, self.summary.instances
                ));
                ui.label(format!(
                    "Texts: {}  Lights: {}  Callbacks: {}",
                    self.summary.texts, self.summary.lights, self.summary.frame_callbacks
                ));
                for target in &self.summary.targets {
                    ui.label(format!(
                        "Target #{}: {}x{} aniso {} ({} nodes)",
                        target.id, target.width, target.height, target.anisotropy, target.nodes
                    ));
                }
                ui.label(format!(
                    "Last frame: {} passes, {} draws, {} instances, {} meshes",
                    self.stats.passes,
                    self.stats.draw_calls,
                    self.stats.instances,
                    self.stats.meshes
                ));
                ui.separator();

                ui.heading("Spinning box");
                let mut state = self.spinner.interaction().get();
                if ui.checkbox(&mut state.hovered, "Hovered (H)").changed() {
                    self.spinner.set_hovered(state.hovered);
                }
                if ui.checkbox(&mut state.clicked, "Clicked (B)").changed() {
                    self.spinner.toggle_clicked();
                }
                ui.separator();

                ui.heading("LEDs");
                egui::Grid::new("leds").striped(true).show(ui, |ui| {
                    for led in LedState::collect(&self.scene, &self.stage.computers.leds) {
                        ui.label(format!("{}", led.index));
                        ui.label(format!(
                            "({:.3}, {:.3}, {:.3})",
                            led.position[0], led.position[1], led.position[2]
                        ));
                        ui.label(if led.on { "on" } else { "off" });
                        ui.end_row();
                    }
                });

                ui.separator();
                ui.small("F1: Overlay | RMB: Orbit | Wheel: Zoom | R: Reset view");
            });
    }
}

struct GpuApp {
    state: AppState,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    config: Option<wgpu::SurfaceConfiguration>,
    renderer: Option<WgpuRenderer>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
}

impl GpuApp {
    fn new(state: AppState) -> Self {
        Self {
            state,
            window: None,
            surface: None,
            device: None,
            queue: None,
            config: None,
            renderer: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
        }
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Old Computers")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("oldcomputers_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.state.camera.aspect = size.width as f32 / size.height.max(1) as f32;

        let renderer = WgpuRenderer::new(&device, &queue, surface_format, size.width, size.height);

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        self.window = Some(window);
        self.surface = Some(surface);
        self.device = Some(device);
        self.queue = Some(queue);
        self.config = Some(config);
        self.renderer = Some(renderer);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);
        Ok(())
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
        self.state.last_frame = now;
        self.state.update(dt);

        let (
            Some(window),
            Some(surface),
            Some(device),
            Some(queue),
            Some(config),
            Some(renderer),
            Some(egui_winit),
            Some(egui_renderer),
        ) = (
            &self.window,
            &self.surface,
            &self.device,
            &self.queue,
            &self.config,
            &mut self.renderer,
            &mut self.egui_winit,
            &mut self.egui_renderer,
        )
        else {
            return;
        };

        let output = match surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(device, config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.state.stats = renderer.render(
            device,
            queue,
            &view,
            &self.state.camera,
            self.state.background,
            &self.state.scene,
        );

        let raw_input = egui_winit.take_egui_input(window);
        let state = &mut self.state;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            state.draw_ui(ctx);
        });
        egui_winit.handle_platform_output(window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [config.width, config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        egui_renderer.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            egui_renderer.free_texture(id);
        }

        output.present();
        window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_gpu(event_loop) {
            tracing::error!("failed to initialize GPU: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            let response = egui_winit.on_window_event(window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(surface), Some(device), Some(config)) =
                    (&self.surface, &self.device, &mut self.config)
                {
                    config.width = new_size.width.max(1);
                    config.height = new_size.height.max(1);
                    surface.configure(device, config);
                    self.state.camera.aspect = config.width as f32 / config.height as f32;
                    if let Some(renderer) = &mut self.renderer {
                        renderer.resize(device, config.width, config.height);
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                self.state
                    .handle_key(key, key_state == ElementState::Pressed);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.state.orbiting = btn_state == ElementState::Pressed;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                self.state.camera.zoom(steps);
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.orbiting {
                self.state.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("oldcomputers-desktop starting");
    let state = AppState::load(&cli)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(state);
    event_loop.run_app(&mut app)?;

    Ok(())
}
