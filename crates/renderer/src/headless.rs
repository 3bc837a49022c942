use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use scheduler::PacedRefresh;
use winit::dpi::PhysicalSize;

use crate::compile::adapt_program;
use crate::engine::{Engine, EngineSettings};
use crate::gpu::GpuState;
use crate::types::RendererConfig;
use crate::uniforms::resolve_uniforms;
use crate::RunSummary;

/// Renders into an offscreen texture on a fixed cadence for `refreshes`
/// refresh signals, then optionally writes the last frame to `capture`.
pub(crate) fn run_headless(
    config: &RendererConfig,
    refreshes: u64,
    capture: Option<&Path>,
) -> Result<RunSummary> {
    let program = adapt_program(&config.vertex_source, &config.fragment_source)?;
    let (width, height) = config.resolution.surface_size();
    let gpu = GpuState::headless(PhysicalSize::new(width, height), &program)?;

    let settings = EngineSettings {
        resolution: config.resolution,
        target_fps: config.target_fps,
        render_mode: config.render_mode,
    };
    let mut engine = Engine::new(gpu, resolve_uniforms(&program), settings, config.initial_palette())?;

    let mut signal = PacedRefresh::new(engine.scheduler().interval()).limit(refreshes);
    engine.start(Instant::now())?;
    let delivered = engine
        .drive(&mut signal)
        .context("headless render loop failed")?;

    if let Some(path) = capture {
        engine
            .target()
            .capture_png(path)
            .with_context(|| format!("failed to capture frame to {}", path.display()))?;
    }

    let summary = RunSummary {
        frames_rendered: engine.frame_count(),
        stats: engine.stats(),
    };
    tracing::info!(
        refreshes = delivered,
        frames = summary.frames_rendered,
        fps = summary.stats.map(|stats| stats.fps),
        "headless run finished"
    );
    Ok(summary)
}
