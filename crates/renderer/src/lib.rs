//! Renderer crate for huefield.
//!
//! Drives one WebGL-style fragment shader over a full-screen quad at a fixed
//! tick rate, feeding it time, pointer, render mode, resolution and a palette
//! texture. The overall flow is:
//!
//! ```text
//!   huefield CLI
//!          │ RendererConfig (sources already fetched)
//!          ▼
//!   Renderer::run ──▶ adapt_program ──▶ GpuState (surface, pipeline, palette)
//!          │                                   │
//!          ▼                                   ▼
//!   window / headless host ──refresh──▶ Engine::tick ──▶ FrameScheduler ──▶ draw
//! ```
//!
//! [`Engine`] is generic over [`RenderTarget`] so everything above the GPU can
//! be exercised without a device.

pub mod builtin;
mod compile;
mod engine;
mod error;
mod gpu;
mod headless;
mod input;
mod types;
mod uniforms;
mod window;

pub use compile::{
    adapt_program, AdaptedProgram, AdaptedStage, ContractUniform, DeclaredUniforms, ProgramError,
    Stage, UniformType, FRAME_BLOCK, POSITION_ATTRIBUTE,
};
pub use engine::{Engine, EngineSettings, RenderTarget};
pub use error::{ControlError, FrameError, InitError};
pub use gpu::{GpuState, CLEAR_COLOR, QUAD_VERTEX_COUNT, QUAD_VERTICES};
pub use input::{InputState, SurfaceBounds};
pub use types::{
    HostMode, NamedPalette, RendererConfig, Resolution, BASE_RESOLUTION_UNIT, RESOLUTION_STEP,
    SLIDER_RANGE,
};
pub use uniforms::{
    resolve_uniforms, FrameUniforms, SamplerSlot, UniformSlot, UniformTable, UniformValues,
    PALETTE_BIND_GROUP,
};

use anyhow::Result;
use scheduler::FrameStats;

/// What a finished run rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_rendered: u64,
    pub stats: Option<FrameStats>,
}

pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Blocks until the window closes or the headless run completes.
    pub fn run(self) -> Result<RunSummary> {
        match self.config.mode.clone() {
            HostMode::Windowed => window::run_window(self.config),
            HostMode::Headless { frames, capture } => {
                headless::run_headless(&self.config, frames, capture.as_deref())
            }
        }
    }
}
