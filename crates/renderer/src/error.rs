use gradient::PaletteError;
use scheduler::SchedulerError;

use crate::compile::ProgramError;

/// Failures that stop the renderer before the first tick.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to acquire {kind} handle: {message}")]
    Handle { kind: &'static str, message: String },
    #[error("failed to create rendering surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to find a suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("GPU max texture dimension is {max}, requested surface is {width}x{height}")]
    SurfaceTooLarge { max: u32, width: u32, height: u32 },
    #[error("surface reports no supported formats for this adapter")]
    NoSurfaceFormat,
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("failed to upload initial palette: {0}")]
    Palette(#[source] FrameError),
}

/// Errors raised while drawing or updating per-frame resources.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("palette needs a {width}-texel texture; device limit is {max}")]
    PaletteTooWide { width: u32, max: u32 },
    #[error("GPU validation failed: {0}")]
    Validation(String),
    #[error("failed to read back frame: {0}")]
    Readback(String),
    #[error("failed to write captured frame: {0}")]
    Capture(#[from] image::ImageError),
}

impl FrameError {
    /// True for swapchain states the host can fix by reconfiguring the surface.
    pub fn is_surface_stale(&self) -> bool {
        matches!(
            self,
            FrameError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)
        )
    }
}

/// Rejections from the control entry points.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("resolution slider {0} outside 1..=200")]
    ResolutionOutOfRange(u32),
    #[error("invalid gradient: {0}")]
    InvalidGradient(#[from] PaletteError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}
