use std::path::Path;
use std::sync::mpsc;

use gradient::PaletteImage;
use image::RgbaImage;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::compile::AdaptedProgram;
use crate::engine::RenderTarget;
use crate::error::{FrameError, InitError};
use crate::uniforms::FrameUniforms;

use super::context::GpuContext;
use super::geometry::{QuadGeometry, QUAD_VERTEX_COUNT};
use super::palette::{palette_layout, PaletteTexture};
use super::pipeline::{uniform_layout, ShaderPipeline};

/// Background every frame is cleared to before the quad is drawn.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 1.0,
    g: 0.5,
    b: 0.5,
    a: 1.0,
};

pub struct GpuState {
    context: GpuContext,
    pipeline: ShaderPipeline,
    quad: QuadGeometry,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    palette_layout: wgpu::BindGroupLayout,
    palette: Option<PaletteTexture>,
}

impl GpuState {
    pub(crate) fn windowed<T>(
        target: &T,
        size: PhysicalSize<u32>,
        program: &AdaptedProgram,
    ) -> Result<Self, InitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::windowed(target, size)?;
        Self::with_context(context, program)
    }

    pub(crate) fn headless(
        size: PhysicalSize<u32>,
        program: &AdaptedProgram,
    ) -> Result<Self, InitError> {
        let context = GpuContext::headless(size)?;
        Self::with_context(context, program)
    }

    fn with_context(context: GpuContext, program: &AdaptedProgram) -> Result<Self, InitError> {
        tracing::info!(adapter = %context.adapter_name, format = ?context.format, "GPU ready");

        let uniform_layout = uniform_layout(&context.device);
        let palette_layout = palette_layout(&context.device);
        let pipeline = ShaderPipeline::new(
            &context.device,
            context.format,
            program,
            &uniform_layout,
            &palette_layout,
        )?;

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
        let quad = QuadGeometry::new(&context.device);

        Ok(Self {
            context,
            pipeline,
            quad,
            uniform_buffer,
            uniform_bind_group,
            palette_layout,
            palette: None,
        })
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Re-applies the surface configuration after a lost or outdated frame.
    pub fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    /// Copies the offscreen target to `path` as PNG. Window surfaces cannot
    /// be read back.
    pub fn capture_png(&self, path: &Path) -> Result<(), FrameError> {
        let texture = self.context.offscreen_texture().ok_or_else(|| {
            FrameError::Readback("only offscreen targets can be captured".to_string())
        })?;
        let image = read_texture(&self.context.device, &self.context.queue, texture)?;
        image.save(path)?;
        tracing::info!(path = %path.display(), "captured frame");
        Ok(())
    }
}

impl RenderTarget for GpuState {
    fn drawable_size(&self) -> (u32, u32) {
        (self.context.size.width, self.context.size.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(PhysicalSize::new(width, height));
    }

    fn upload_palette(&mut self, image: &PaletteImage) -> Result<(), FrameError> {
        let texture = PaletteTexture::upload(
            &self.context.device,
            &self.context.queue,
            &self.palette_layout,
            image,
            self.context.max_texture_dimension,
        )?;
        self.palette = Some(texture);
        Ok(())
    }

    fn draw(&mut self, uniforms: &FrameUniforms) -> Result<(), FrameError> {
        let palette = match self.pipeline.palette_group {
            Some(group) => {
                let texture = self.palette.as_ref().ok_or_else(|| {
                    FrameError::Validation("no palette texture uploaded".to_string())
                })?;
                Some((group, &texture.bind_group))
            }
            None => None,
        };

        let frame = self.context.acquire()?;
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("huefield pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let (width, height) = self.drawable_size();
            pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            pass.set_pipeline(&self.pipeline.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            if let Some((group, bind_group)) = palette {
                pass.set_bind_group(group, bind_group, &[]);
            }
            if self.pipeline.uses_quad_buffer {
                pass.set_vertex_buffer(0, self.quad.buffer.slice(..));
            }
            pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

/// Rows in a texture-to-buffer copy must be padded to this many bytes.
fn padded_row_bytes(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<RgbaImage, FrameError> {
    let width = texture.width();
    let height = texture.height();
    let padded = padded_row_bytes(width);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("capture staging buffer"),
        size: u64::from(padded) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("capture encoder"),
    });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| FrameError::Readback(err.to_string()))?;
    rx.recv()
        .map_err(|err| FrameError::Readback(err.to_string()))?
        .map_err(|err| FrameError::Readback(err.to_string()))?;

    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..(width * 4) as usize]);
        }
    }
    staging.unmap();

    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| FrameError::Readback("captured buffer has the wrong size".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_row_bytes(64), 256);
        assert_eq!(padded_row_bytes(65), 512);
        assert_eq!(padded_row_bytes(500), 2048);
    }
}
