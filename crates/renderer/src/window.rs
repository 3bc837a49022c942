use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use scheduler::{FrameStats, TickDecision};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::compile::adapt_program;
use crate::engine::{Engine, EngineSettings, RenderTarget};
use crate::error::FrameError;
use crate::gpu::GpuState;
use crate::input::SurfaceBounds;
use crate::types::{NamedPalette, Resolution, RendererConfig};
use crate::uniforms::resolve_uniforms;
use crate::RunSummary;

const WINDOW_TITLE: &str = "huefield";

/// What a key press asks the host to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostAction {
    ToggleRenderMode,
    StepResolution(i32),
    NextPalette,
    Close,
}

pub(crate) fn action_for_key(key: &Key) -> Option<HostAction> {
    match key {
        Key::Named(NamedKey::Space) => Some(HostAction::ToggleRenderMode),
        Key::Named(NamedKey::ArrowUp) => Some(HostAction::StepResolution(1)),
        Key::Named(NamedKey::ArrowDown) => Some(HostAction::StepResolution(-1)),
        Key::Named(NamedKey::Escape) => Some(HostAction::Close),
        Key::Character(value) => match value.as_str() {
            "m" | "M" | " " => Some(HostAction::ToggleRenderMode),
            "+" | "=" => Some(HostAction::StepResolution(1)),
            "-" | "_" => Some(HostAction::StepResolution(-1)),
            "p" | "P" => Some(HostAction::NextPalette),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn title_text(stats: Option<FrameStats>, resolution: Resolution) -> String {
    let stats = stats.unwrap_or_default();
    format!(
        "{WINDOW_TITLE} | FPS: {} MSPT: {} | {}px",
        stats.fps,
        stats.mspt,
        resolution.pixels()
    )
}

/// How the host reacts to a failed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrawRecovery {
    Reconfigure,
    Fail,
}

/// Allows one reconfigure per run of lost or outdated frames. A second stale
/// frame in a row, or any other error, ends the loop.
#[derive(Debug, Default)]
pub(crate) struct StaleSurfaceGuard {
    consecutive: u32,
}

impl StaleSurfaceGuard {
    pub(crate) fn rendered(&mut self) {
        self.consecutive = 0;
    }

    pub(crate) fn on_error(&mut self, err: &FrameError) -> DrawRecovery {
        if !err.is_surface_stale() {
            return DrawRecovery::Fail;
        }
        self.consecutive += 1;
        if self.consecutive > 1 {
            DrawRecovery::Fail
        } else {
            DrawRecovery::Reconfigure
        }
    }
}

/// The square size the window must have for `resolution`, or `None` when
/// `actual` already matches.
pub(crate) fn enforced_size(
    actual: PhysicalSize<u32>,
    resolution: Resolution,
) -> Option<PhysicalSize<u32>> {
    let (width, height) = resolution.surface_size();
    let expected = PhysicalSize::new(width, height);
    (actual != expected).then_some(expected)
}

struct WindowHost {
    // Dropped before `window`: the surface borrows the raw window handle.
    engine: Engine<GpuState>,
    window: Arc<Window>,
    palettes: Vec<NamedPalette>,
    palette_index: usize,
    title: String,
    stale: StaleSurfaceGuard,
}

impl WindowHost {
    fn refresh_title(&mut self) {
        let title = title_text(self.engine.stats(), self.engine.resolution());
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }

    fn apply(&mut self, action: HostAction) -> Result<bool> {
        match action {
            HostAction::ToggleRenderMode => {
                self.engine.toggle_render_mode();
            }
            HostAction::StepResolution(delta) => {
                let Some(next) = self.engine.resolution().step(delta) else {
                    return Ok(true);
                };
                let resolution = self.engine.set_resolution(next.slider())?;
                let _ = self
                    .window
                    .request_inner_size(PhysicalSize::new(resolution.pixels(), resolution.pixels()));
                self.refresh_title();
            }
            HostAction::NextPalette => {
                if self.palettes.len() > 1 {
                    self.palette_index = (self.palette_index + 1) % self.palettes.len();
                    let entry = &self.palettes[self.palette_index];
                    self.engine.apply_gradient(entry.palette.to_hex())?;
                    info!(palette = %entry.name, "switched palette");
                }
            }
            HostAction::Close => return Ok(false),
        }
        Ok(true)
    }

    fn surface_bounds(&self) -> SurfaceBounds {
        let (width, height) = self.engine.target().drawable_size();
        SurfaceBounds::at_origin(width, height)
    }
}

pub(crate) fn run_window(config: RendererConfig) -> Result<RunSummary> {
    let program = adapt_program(&config.vertex_source, &config.fragment_source)?;

    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let (width, height) = config.resolution.surface_size();
    let window_size = PhysicalSize::new(width, height);
    let window = WindowBuilder::new()
        .with_title(WINDOW_TITLE)
        .with_inner_size(window_size)
        .with_resizable(false)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let gpu = GpuState::windowed(window.as_ref(), window_size, &program)?;
    let settings = EngineSettings {
        resolution: config.resolution,
        target_fps: config.target_fps,
        render_mode: config.render_mode,
    };
    let engine = Engine::new(gpu, resolve_uniforms(&program), settings, config.initial_palette())?;

    let mut host = WindowHost {
        engine,
        window,
        palettes: config.palettes,
        palette_index: 0,
        title: String::new(),
        stale: StaleSurfaceGuard::default(),
    };
    host.refresh_title();
    host.engine.start(Instant::now())?;
    host.window.request_redraw();

    let mut failure: Option<anyhow::Error> = None;
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == host.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                let Some(action) = action_for_key(&event.logical_key) else {
                    return;
                };
                match host.apply(action) {
                    Ok(true) => {}
                    Ok(false) => elwt.exit(),
                    Err(err) => warn!("control rejected: {err:#}"),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let bounds = host.surface_bounds();
                host.engine.on_pointer_move(position.x, position.y, bounds);
            }
            WindowEvent::Resized(new_size) => {
                // Only resolution changes size the surface; ask for the square back.
                if let Some(square) = enforced_size(new_size, host.engine.resolution()) {
                    warn!(
                        width = new_size.width,
                        height = new_size.height,
                        "window resized externally; keeping {}px surface",
                        square.width
                    );
                    let _ = host.window.request_inner_size(square);
                }
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let _ = inner_size_writer.request_inner_size(host.engine.target().size());
            }
            WindowEvent::RedrawRequested => match host.engine.tick(Instant::now()) {
                Ok(TickDecision::Rendered(_)) => {
                    host.stale.rendered();
                    host.refresh_title();
                }
                Ok(TickDecision::Skipped) => {}
                Err(err) => match host.stale.on_error(&err) {
                    DrawRecovery::Reconfigure => {
                        warn!("surface lost or outdated; reconfiguring");
                        host.engine.target_mut().reconfigure();
                    }
                    DrawRecovery::Fail => {
                        error!("draw failed: {err}");
                        failure = Some(err.into());
                        elwt.exit();
                    }
                },
            },
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            match host.engine.next_tick_due() {
                Some(due) if due > now => elwt.set_control_flow(ControlFlow::WaitUntil(due)),
                _ => {
                    host.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
        }
        _ => {}
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    if let Some(err) = failure {
        return Err(err);
    }

    Ok(RunSummary {
        frames_rendered: host.engine.frame_count(),
        stats: host.engine.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_controls() {
        assert_eq!(
            action_for_key(&Key::Character("m".into())),
            Some(HostAction::ToggleRenderMode)
        );
        assert_eq!(
            action_for_key(&Key::Named(NamedKey::Space)),
            Some(HostAction::ToggleRenderMode)
        );
        assert_eq!(
            action_for_key(&Key::Named(NamedKey::ArrowUp)),
            Some(HostAction::StepResolution(1))
        );
        assert_eq!(
            action_for_key(&Key::Character("-".into())),
            Some(HostAction::StepResolution(-1))
        );
        assert_eq!(
            action_for_key(&Key::Character("P".into())),
            Some(HostAction::NextPalette)
        );
        assert_eq!(action_for_key(&Key::Character("x".into())), None);
    }

    #[test]
    fn title_shows_stats_and_resolution() {
        let stats = FrameStats { fps: 60, mspt: 17 };
        assert_eq!(
            title_text(Some(stats), Resolution::default()),
            "huefield | FPS: 60 MSPT: 17 | 500px"
        );
        assert_eq!(
            title_text(None, Resolution::from_slider(20).unwrap()),
            "huefield | FPS: 0 MSPT: 0 | 200px"
        );
    }

    #[test]
    fn one_reconfigure_per_stale_run() {
        let mut guard = StaleSurfaceGuard::default();
        let lost = FrameError::Surface(wgpu::SurfaceError::Lost);
        let outdated = FrameError::Surface(wgpu::SurfaceError::Outdated);

        assert_eq!(guard.on_error(&lost), DrawRecovery::Reconfigure);
        assert_eq!(guard.on_error(&outdated), DrawRecovery::Fail);

        guard.rendered();
        assert_eq!(guard.on_error(&outdated), DrawRecovery::Reconfigure);
        guard.rendered();
        assert_eq!(guard.on_error(&lost), DrawRecovery::Reconfigure);
    }

    #[test]
    fn other_draw_errors_fail_immediately() {
        let mut guard = StaleSurfaceGuard::default();
        let timeout = FrameError::Surface(wgpu::SurfaceError::Timeout);
        assert_eq!(guard.on_error(&timeout), DrawRecovery::Fail);
        assert_eq!(
            guard.on_error(&FrameError::Validation("bad bind group".into())),
            DrawRecovery::Fail
        );
    }

    #[test]
    fn external_resize_is_pulled_back_to_the_square() {
        let resolution = Resolution::default();
        assert_eq!(enforced_size(PhysicalSize::new(500, 500), resolution), None);
        assert_eq!(
            enforced_size(PhysicalSize::new(1280, 700), resolution),
            Some(PhysicalSize::new(500, 500))
        );
        let larger = Resolution::from_slider(80).unwrap();
        assert_eq!(
            enforced_size(PhysicalSize::new(500, 500), larger),
            Some(PhysicalSize::new(800, 800))
        );
    }
}
