use bytemuck::{Pod, Zeroable};

use crate::compile::{AdaptedProgram, ContractUniform};

/// CPU mirror of the `HuefieldFrame` std140 block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct FrameUniforms {
    pub pointer: [f32; 2],
    pub time: f32,
    pub resolution: f32,
    pub viewport: [f32; 2],
    pub render_mode: i32,
    pub _padding: f32,
}

/// Resolved handle for one scalar or vector uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot(ContractUniform);

impl UniformSlot {
    pub fn uniform(self) -> ContractUniform {
        self.0
    }
}

/// Bind group the palette texture goes in. Present only when a stage
/// declares `colors`; otherwise the pipeline has no palette set and draws
/// bind nothing there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSlot {
    pub group: u32,
}

/// Handles resolved once after linking. `None` means the program never
/// declared the name and writes to it are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UniformTable {
    pub time: Option<UniformSlot>,
    pub pointer: Option<UniformSlot>,
    pub palette_sampler: Option<SamplerSlot>,
    pub render_mode: Option<UniformSlot>,
    pub resolution: Option<UniformSlot>,
}

pub const PALETTE_BIND_GROUP: u32 = 1;

pub fn resolve_uniforms(program: &AdaptedProgram) -> UniformTable {
    let slot = |uniform| program.declared.contains(uniform).then_some(UniformSlot(uniform));
    UniformTable {
        time: slot(ContractUniform::Time),
        pointer: slot(ContractUniform::Pointer),
        palette_sampler: program
            .declared
            .contains(ContractUniform::Palette)
            .then_some(SamplerSlot {
                group: PALETTE_BIND_GROUP,
            }),
        render_mode: slot(ContractUniform::RenderMode),
        resolution: slot(ContractUniform::Resolution),
    }
}

/// Values computed for one accepted tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformValues {
    pub time: f32,
    pub pointer: [f32; 2],
    pub render_mode: bool,
    pub resolution: f32,
}

impl FrameUniforms {
    /// Writes `values` through the table. Absent slots leave their field as is.
    pub fn apply(&mut self, table: &UniformTable, values: &UniformValues) {
        if table.time.is_some() {
            self.time = values.time;
        }
        if table.pointer.is_some() {
            self.pointer = values.pointer;
        }
        if table.render_mode.is_some() {
            self.render_mode = i32::from(values.render_mode);
        }
        if table.resolution.is_some() {
            self.resolution = values.resolution;
        }
    }
}
