use crate::types::BASE_RESOLUTION_UNIT;

/// On-screen rectangle of the drawable surface, in the same coordinate space
/// as the pointer events handed to [`InputState::on_pointer_move`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceBounds {
    /// Bounds for events that are already relative to the surface, as winit
    /// reports cursor positions.
    pub fn at_origin(width: u32, height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: f64::from(width),
            height: f64::from(height),
        }
    }
}

/// Pointer position and render-mode flag read by every draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputState {
    pointer: [f32; 2],
    render_mode: bool,
}

impl InputState {
    pub fn new(render_mode: bool) -> Self {
        Self {
            pointer: [0.0, 0.0],
            render_mode,
        }
    }

    /// Normalises against the fixed base unit, not the current surface size,
    /// so pointer travel past 500 px saturates at 1.
    pub fn on_pointer_move(&mut self, client_x: f64, client_y: f64, bounds: SurfaceBounds) {
        let unit = f64::from(BASE_RESOLUTION_UNIT);
        let x = ((client_x - bounds.left) / unit).clamp(0.0, 1.0);
        let y = ((client_y - bounds.top) / unit).clamp(0.0, 1.0);
        if x.is_nan() || y.is_nan() {
            return;
        }
        self.pointer = [x as f32, y as f32];
    }

    pub fn toggle_render_mode(&mut self) -> bool {
        self.render_mode = !self.render_mode;
        self.render_mode
    }

    pub fn pointer(&self) -> [f32; 2] {
        self.pointer
    }

    pub fn render_mode(&self) -> bool {
        self.render_mode
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_is_normalised_by_base_unit() {
        let mut input = InputState::default();
        let bounds = SurfaceBounds {
            left: 100.0,
            top: 50.0,
            width: 500.0,
            height: 500.0,
        };
        input.on_pointer_move(350.0, 175.0, bounds);
        assert_eq!(input.pointer(), [0.5, 0.25]);
    }

    #[test]
    fn pointer_outside_bounds_is_clamped() {
        let mut input = InputState::default();
        let bounds = SurfaceBounds::at_origin(500, 500);
        input.on_pointer_move(-20.0, 900.0, bounds);
        assert_eq!(input.pointer(), [0.0, 1.0]);
        input.on_pointer_move(1200.0, -1.0, bounds);
        assert_eq!(input.pointer(), [1.0, 0.0]);
    }

    #[test]
    fn large_surface_saturates_past_base_unit() {
        let mut input = InputState::default();
        input.on_pointer_move(750.0, 250.0, SurfaceBounds::at_origin(1000, 1000));
        assert_eq!(input.pointer(), [1.0, 0.5]);
    }

    #[test]
    fn nan_coordinates_are_ignored() {
        let mut input = InputState::default();
        input.on_pointer_move(250.0, 250.0, SurfaceBounds::default());
        input.on_pointer_move(f64::NAN, 10.0, SurfaceBounds::default());
        assert_eq!(input.pointer(), [0.5, 0.5]);
    }

    #[test]
    fn double_toggle_restores_flag() {
        let mut input = InputState::new(true);
        assert!(!input.toggle_render_mode());
        assert!(input.toggle_render_mode());
        assert!(input.render_mode());
    }
}
