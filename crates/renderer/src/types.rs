use std::ops::RangeInclusive;
use std::path::PathBuf;

use gradient::Palette;
use scheduler::DEFAULT_TARGET_FPS;

use crate::error::ControlError;

/// Pixel size of one unit of pointer travel and of the initial surface.
pub const BASE_RESOLUTION_UNIT: u32 = 500;

/// Pixels per slider step.
pub const RESOLUTION_STEP: u32 = 10;

/// Accepted slider values; keeps the surface between 10 and 2000 pixels.
pub const SLIDER_RANGE: RangeInclusive<u32> = 1..=200;

/// Square surface dimension driven by the resolution slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    slider: u32,
}

impl Resolution {
    pub fn from_slider(slider: u32) -> Result<Self, ControlError> {
        if !SLIDER_RANGE.contains(&slider) {
            return Err(ControlError::ResolutionOutOfRange(slider));
        }
        Ok(Self { slider })
    }

    pub fn slider(self) -> u32 {
        self.slider
    }

    /// Edge length in device pixels.
    pub fn pixels(self) -> u32 {
        self.slider * RESOLUTION_STEP
    }

    pub fn surface_size(self) -> (u32, u32) {
        (self.pixels(), self.pixels())
    }

    /// Neighbouring slider value, or `None` at either end of the range.
    pub fn step(self, delta: i32) -> Option<Self> {
        let next = self.slider.checked_add_signed(delta)?;
        Self::from_slider(next).ok()
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            slider: BASE_RESOLUTION_UNIT / RESOLUTION_STEP,
        }
    }
}

/// Which host drives the refresh loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMode {
    Windowed,
    /// Offscreen target paced at the target rate for `frames` refreshes.
    Headless {
        frames: u64,
        capture: Option<PathBuf>,
    },
}

/// A palette plus the label it is listed under when cycling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPalette {
    pub name: String,
    pub palette: Palette,
}

impl NamedPalette {
    pub fn new(name: impl Into<String>, palette: Palette) -> Self {
        Self {
            name: name.into(),
            palette,
        }
    }
}

/// Everything the renderer needs once the shader sources have been fetched.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub vertex_source: String,
    pub fragment_source: String,
    /// First entry is applied at startup; the windowed host cycles the rest.
    pub palettes: Vec<NamedPalette>,
    pub resolution: Resolution,
    pub target_fps: f32,
    pub render_mode: bool,
    pub mode: HostMode,
}

impl RendererConfig {
    pub fn new(vertex_source: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        Self {
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            palettes: vec![NamedPalette::new("default", Palette::default_gradient())],
            resolution: Resolution::default(),
            target_fps: DEFAULT_TARGET_FPS,
            render_mode: true,
            mode: HostMode::Windowed,
        }
    }

    pub fn initial_palette(&self) -> Palette {
        self.palettes
            .first()
            .map(|entry| entry.palette.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolution_is_base_unit() {
        let resolution = Resolution::default();
        assert_eq!(resolution.slider(), 50);
        assert_eq!(resolution.pixels(), 500);
        assert_eq!(resolution.surface_size(), (500, 500));
    }

    #[test]
    fn slider_bounds_are_enforced() {
        assert!(Resolution::from_slider(0).is_err());
        assert!(Resolution::from_slider(201).is_err());
        assert_eq!(Resolution::from_slider(1).unwrap().pixels(), 10);
        assert_eq!(Resolution::from_slider(200).unwrap().pixels(), 2000);
    }

    #[test]
    fn step_stops_at_range_ends() {
        let low = Resolution::from_slider(1).unwrap();
        assert!(low.step(-1).is_none());
        assert_eq!(low.step(1).unwrap().slider(), 2);
        let high = Resolution::from_slider(200).unwrap();
        assert!(high.step(1).is_none());
    }

    #[test]
    fn config_defaults_start_at_base_resolution() {
        let config = RendererConfig::new("v", "f");
        assert!(config.render_mode);
        assert_eq!(config.resolution.pixels(), 500);
        assert_eq!(config.target_fps, 60.0);
        assert_eq!(config.initial_palette().len(), 15);
    }
}
