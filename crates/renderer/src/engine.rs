use std::time::{Duration, Instant};

use gradient::{Palette, PaletteImage};
use scheduler::{FrameScheduler, FrameStats, RefreshSignal, SchedulerError, TickDecision};

use crate::error::{ControlError, FrameError, InitError};
use crate::input::{InputState, SurfaceBounds};
use crate::types::Resolution;
use crate::uniforms::{FrameUniforms, UniformTable, UniformValues};

/// The GPU side of the engine: a sized drawable, one palette texture and one
/// linked program.
pub trait RenderTarget {
    /// Current drawable size in device pixels.
    fn drawable_size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Replaces the bound palette texture.
    fn upload_palette(&mut self, image: &PaletteImage) -> Result<(), FrameError>;

    /// Clears, binds the palette and draws the quad with `uniforms`.
    fn draw(&mut self, uniforms: &FrameUniforms) -> Result<(), FrameError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub resolution: Resolution,
    pub target_fps: f32,
    pub render_mode: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            target_fps: scheduler::DEFAULT_TARGET_FPS,
            render_mode: true,
        }
    }
}

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Owns everything the draw step touches. Lives on the host's event thread.
pub struct Engine<T: RenderTarget> {
    target: T,
    uniforms: UniformTable,
    input: InputState,
    resolution: Resolution,
    scheduler: FrameScheduler,
    palette: Palette,
    last_uniforms: FrameUniforms,
    last_stats_log: Option<Instant>,
}

impl<T: RenderTarget> Engine<T> {
    /// Sizes the target and uploads the initial palette. The scheduler stays
    /// idle until [`Engine::start`].
    pub fn new(
        mut target: T,
        uniforms: UniformTable,
        settings: EngineSettings,
        palette: Palette,
    ) -> Result<Self, InitError> {
        let scheduler = FrameScheduler::new(settings.target_fps)?;
        let (width, height) = settings.resolution.surface_size();
        target.resize(width, height);
        target
            .upload_palette(&palette.encode())
            .map_err(InitError::Palette)?;

        Ok(Self {
            target,
            uniforms,
            input: InputState::new(settings.render_mode),
            resolution: settings.resolution,
            scheduler,
            palette,
            last_uniforms: FrameUniforms::default(),
            last_stats_log: None,
        })
    }

    pub fn start(&mut self, now: Instant) -> Result<(), SchedulerError> {
        self.scheduler.start(now)?;
        tracing::info!(
            resolution = self.resolution.pixels(),
            target_fps = self.scheduler.target_fps(),
            "render loop started"
        );
        Ok(())
    }

    /// One refresh callback. Skipped ticks leave every piece of state alone.
    pub fn tick(&mut self, now: Instant) -> Result<TickDecision, FrameError> {
        let Self {
            target,
            uniforms,
            input,
            resolution,
            scheduler,
            last_uniforms,
            ..
        } = self;

        let decision = scheduler.tick(now, |tick| {
            let (width, height) = target.drawable_size();
            let values = UniformValues {
                time: tick.seconds,
                pointer: input.pointer(),
                render_mode: input.render_mode(),
                resolution: resolution.pixels() as f32,
            };
            let mut frame = *last_uniforms;
            frame.viewport = [width as f32, height as f32];
            frame.apply(uniforms, &values);
            target.draw(&frame)?;
            *last_uniforms = frame;
            Ok::<(), FrameError>(())
        })?;

        if let TickDecision::Rendered(tick) = &decision {
            self.log_stats(tick.now, tick.stats);
        }
        Ok(decision)
    }

    /// Feeds refreshes from `signal` into [`Engine::tick`] until the signal
    /// ends or a draw fails. Returns the number of refreshes delivered.
    pub fn drive<S>(&mut self, signal: &mut S) -> Result<u64, FrameError>
    where
        S: RefreshSignal + ?Sized,
    {
        scheduler::drive(signal, |now| self.tick(now).map(|_| ()))
    }

    /// Earliest instant the next tick can be accepted.
    pub fn next_tick_due(&self) -> Option<Instant> {
        self.scheduler
            .frame_state()
            .map(|state| state.last_tick + self.scheduler.interval())
    }

    fn log_stats(&mut self, now: Instant, stats: FrameStats) {
        let due = self
            .last_stats_log
            .map_or(true, |last| now.saturating_duration_since(last) >= STATS_LOG_INTERVAL);
        if due {
            self.last_stats_log = Some(now);
            tracing::debug!(
                fps = stats.fps,
                mspt = stats.mspt,
                frame_count = self.scheduler.frame_count(),
                "render stats"
            );
        }
    }

    /// Encodes and uploads `palette`, replacing the bound texture.
    pub fn apply_palette(&mut self, palette: Palette) -> Result<(), FrameError> {
        self.target.upload_palette(&palette.encode())?;
        tracing::debug!(colors = palette.len(), "applied palette");
        self.palette = palette;
        Ok(())
    }

    /// Decodes `#rrggbb` entries and applies them. Nothing changes if any
    /// entry is malformed.
    pub fn apply_gradient<I, S>(&mut self, hex: I) -> Result<(), ControlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let palette = Palette::from_hex(hex)?;
        self.apply_palette(palette)?;
        Ok(())
    }

    pub fn toggle_render_mode(&mut self) -> bool {
        let mode = self.input.toggle_render_mode();
        tracing::debug!(render_mode = mode, "toggled render mode");
        mode
    }

    /// Resizes the surface to `slider × 10` pixels square. The program and
    /// palette texture are kept.
    pub fn set_resolution(&mut self, slider: u32) -> Result<Resolution, ControlError> {
        let resolution = Resolution::from_slider(slider)?;
        let (width, height) = resolution.surface_size();
        self.target.resize(width, height);
        self.resolution = resolution;
        tracing::info!(resolution = resolution.pixels(), "resolution changed");
        Ok(resolution)
    }

    pub fn on_pointer_move(&mut self, client_x: f64, client_y: f64, bounds: SurfaceBounds) {
        self.input.on_pointer_move(client_x, client_y, bounds);
    }

    /// Stats from the most recent accepted tick.
    pub fn stats(&self) -> Option<FrameStats> {
        self.scheduler.last_stats()
    }

    pub fn frame_count(&self) -> u64 {
        self.scheduler.frame_count()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn uniform_table(&self) -> &UniformTable {
        &self.uniforms
    }

    /// Uniform block written by the last successful draw.
    pub fn last_uniforms(&self) -> &FrameUniforms {
        &self.last_uniforms
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;
    use crate::compile::adapt_program;
    use crate::uniforms::resolve_uniforms;

    #[derive(Default)]
    struct Recorder {
        size: (u32, u32),
        palettes: Vec<PaletteImage>,
        draws: Vec<FrameUniforms>,
        fail_next_draw: bool,
    }

    impl RenderTarget for Recorder {
        fn drawable_size(&self) -> (u32, u32) {
            self.size
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }

        fn upload_palette(&mut self, image: &PaletteImage) -> Result<(), FrameError> {
            self.palettes.push(image.clone());
            Ok(())
        }

        fn draw(&mut self, uniforms: &FrameUniforms) -> Result<(), FrameError> {
            if std::mem::take(&mut self.fail_next_draw) {
                return Err(FrameError::Surface(wgpu::SurfaceError::Lost));
            }
            self.draws.push(*uniforms);
            Ok(())
        }
    }

    fn engine() -> Engine<Recorder> {
        let program = adapt_program(builtin::VERTEX_SHADER, builtin::FRAGMENT_SHADER).unwrap();
        Engine::new(
            Recorder::default(),
            resolve_uniforms(&program),
            EngineSettings::default(),
            Palette::default_gradient(),
        )
        .unwrap()
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn new_sizes_target_and_uploads_palette() {
        let engine = engine();
        assert_eq!(engine.target().size, (500, 500));
        assert_eq!(engine.target().palettes.len(), 1);
        assert_eq!(engine.target().palettes[0].width(), 15);
        assert_eq!(engine.frame_count(), 0);
    }

    #[test]
    fn tick_before_start_never_draws() {
        let mut engine = engine();
        let decision = engine.tick(Instant::now()).unwrap();
        assert_eq!(decision, TickDecision::Skipped);
        assert!(engine.target().draws.is_empty());
    }

    #[test]
    fn accepted_tick_writes_fresh_uniforms() {
        let mut engine = engine();
        let origin = Instant::now();
        engine.start(origin).unwrap();
        engine.on_pointer_move(250.0, 125.0, SurfaceBounds::at_origin(500, 500));

        assert!(engine.tick(origin + ms(20)).unwrap().is_rendered());
        assert!(engine.tick(origin + ms(40)).unwrap().is_rendered());

        let draws = &engine.target().draws;
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].time, 0.0);
        assert!((draws[1].time - 1.0 / 60.0).abs() < 1e-6);
        assert_eq!(draws[1].pointer, [0.5, 0.25]);
        assert_eq!(draws[1].render_mode, 1);
        assert_eq!(draws[1].resolution, 500.0);
        assert_eq!(draws[1].viewport, [500.0, 500.0]);
        assert_eq!(engine.frame_count(), 2);
    }

    #[test]
    fn early_tick_is_skipped_without_draw() {
        let mut engine = engine();
        let origin = Instant::now();
        engine.start(origin).unwrap();
        assert_eq!(engine.tick(origin + ms(5)).unwrap(), TickDecision::Skipped);
        assert_eq!(engine.tick(origin + ms(10)).unwrap(), TickDecision::Skipped);
        assert!(engine.target().draws.is_empty());
        assert_eq!(engine.scheduler().frame_state().unwrap().last_tick, origin);
    }

    #[test]
    fn draw_failure_propagates_and_does_not_count() {
        let mut engine = engine();
        let origin = Instant::now();
        engine.start(origin).unwrap();
        engine.target_mut().fail_next_draw = true;
        let err = engine.tick(origin + ms(20)).unwrap_err();
        assert!(err.is_surface_stale());
        assert_eq!(engine.frame_count(), 0);
    }

    #[test]
    fn drive_renders_every_accepted_refresh() {
        let mut engine = engine();
        let origin = Instant::now();
        engine.start(origin).unwrap();
        let step = engine.scheduler().interval();
        // A refresh on every interval plus an early one in between, which is throttled.
        let mut signal = scheduler::SimulatedRefresh::new(
            (1..=4u32).flat_map(|k| [origin + step * k, origin + step * k + step / 4]),
        );
        let delivered = engine.drive(&mut signal).unwrap();
        assert_eq!(delivered, 8);
        assert_eq!(engine.frame_count(), 4);
        assert_eq!(engine.target().draws.len(), 4);
        assert!(engine.next_tick_due().unwrap() > origin);
    }

    #[test]
    fn malformed_gradient_leaves_palette_untouched() {
        let mut engine = engine();
        let err = engine.apply_gradient(["#000000", "not-a-colour"]).unwrap_err();
        assert!(matches!(err, ControlError::InvalidGradient(_)));
        assert_eq!(engine.target().palettes.len(), 1);
        assert_eq!(engine.palette(), &Palette::default_gradient());
    }

    #[test]
    fn resolution_change_keeps_palette_texture() {
        let mut engine = engine();
        let resolution = engine.set_resolution(80).unwrap();
        assert_eq!(resolution.pixels(), 800);
        assert_eq!(engine.target().size, (800, 800));
        assert_eq!(engine.target().palettes.len(), 1);
        assert!(matches!(
            engine.set_resolution(0),
            Err(ControlError::ResolutionOutOfRange(0))
        ));
        assert_eq!(engine.resolution().pixels(), 800);
    }
}
