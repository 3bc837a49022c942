use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::error::InitError;

/// Format used when rendering without a window.
pub(crate) const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub(crate) enum RenderSurface {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// Texture the next draw renders into. Window frames are presented on drop
/// through [`FrameTarget::present`].
pub(crate) struct FrameTarget {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl FrameTarget {
    pub(crate) fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

pub(crate) struct GpuContext {
    _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: RenderSurface,
    pub size: PhysicalSize<u32>,
    pub format: wgpu::TextureFormat,
    pub adapter_name: String,
    pub max_texture_dimension: u32,
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

struct DeviceParts {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    max_texture_dimension: u32,
}

fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
    size: PhysicalSize<u32>,
) -> Result<DeviceParts, InitError> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface,
        force_fallback_adapter: false,
    }))?;

    let info = adapter.get_info();
    let limits = adapter.limits();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );

    let max = limits.max_texture_dimension_2d;
    if size.width > max || size.height > max {
        return Err(InitError::SurfaceTooLarge {
            max,
            width: size.width,
            height: size.height,
        });
    }

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("huefield device"),
        required_features: wgpu::Features::empty(),
        required_limits: limits.clone(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))?;

    device.on_uncaptured_error(Box::new(|err| {
        tracing::error!(error = %err, "uncaptured GPU error");
    }));

    Ok(DeviceParts {
        adapter,
        device,
        queue,
        adapter_name: info.name,
        max_texture_dimension: max,
    })
}

fn offscreen_texture(
    device: &wgpu::Device,
    size: PhysicalSize<u32>,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen color target"),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

impl GpuContext {
    pub(crate) fn windowed<T>(target: &T, initial_size: PhysicalSize<u32>) -> Result<Self, InitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();

        let window_handle = target.window_handle().map_err(|err| InitError::Handle {
            kind: "window",
            message: err.to_string(),
        })?;
        let display_handle = target.display_handle().map_err(|err| InitError::Handle {
            kind: "display",
            message: err.to_string(),
        })?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }?;

        let size = PhysicalSize::new(initial_size.width.max(1), initial_size.height.max(1));
        let parts = request_device(&instance, Some(&surface), size)?;

        let caps = surface.get_capabilities(&parts.adapter);
        // The canvas this replaces wrote shader output without sRGB encoding.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(InitError::NoSurfaceFormat)?;
        if format.is_srgb() {
            tracing::warn!(?format, "no linear surface format available; colours will be sRGB encoded");
        }

        let present_mode = caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .unwrap_or(wgpu::PresentMode::AutoVsync);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&parts.device, &config);
        tracing::debug!(?format, ?present_mode, "configured window surface");

        Ok(Self {
            _instance: instance,
            device: parts.device,
            queue: parts.queue,
            surface: RenderSurface::Window { surface, config },
            size,
            format,
            adapter_name: parts.adapter_name,
            max_texture_dimension: parts.max_texture_dimension,
        })
    }

    pub(crate) fn headless(initial_size: PhysicalSize<u32>) -> Result<Self, InitError> {
        let instance = create_instance();
        let size = PhysicalSize::new(initial_size.width.max(1), initial_size.height.max(1));
        let parts = request_device(&instance, None, size)?;
        let (texture, view) = offscreen_texture(&parts.device, size);

        Ok(Self {
            _instance: instance,
            device: parts.device,
            queue: parts.queue,
            surface: RenderSurface::Offscreen { texture, view },
            size,
            format: OFFSCREEN_FORMAT,
            adapter_name: parts.adapter_name,
            max_texture_dimension: parts.max_texture_dimension,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        match &mut self.surface {
            RenderSurface::Window { surface, config } => {
                config.width = new_size.width;
                config.height = new_size.height;
                surface.configure(&self.device, config);
            }
            RenderSurface::Offscreen { texture, view } => {
                let (next_texture, next_view) = offscreen_texture(&self.device, new_size);
                *texture = next_texture;
                *view = next_view;
            }
        }
    }

    /// Re-applies the current configuration after a lost or outdated surface.
    pub(crate) fn reconfigure(&mut self) {
        self.resize(self.size);
    }

    pub(crate) fn acquire(&self) -> Result<FrameTarget, wgpu::SurfaceError> {
        match &self.surface {
            RenderSurface::Window { surface, .. } => {
                let frame = surface.get_current_texture()?;
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(FrameTarget {
                    view,
                    surface_texture: Some(frame),
                })
            }
            RenderSurface::Offscreen { view, .. } => Ok(FrameTarget {
                view: view.clone(),
                surface_texture: None,
            }),
        }
    }

    pub(crate) fn offscreen_texture(&self) -> Option<&wgpu::Texture> {
        match &self.surface {
            RenderSurface::Offscreen { texture, .. } => Some(texture),
            RenderSurface::Window { .. } => None,
        }
    }
}
