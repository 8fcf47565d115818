//! Viewer controls, independent of any windowing library.

use bitflags::bitflags;
use glam::Vec2;

use crate::fractal::FractalFamily;

bitflags! {
    /// Controls currently held down.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HeldControls: u8 {
        const UP       = 0b0000_0001;
        const DOWN     = 0b0000_0010;
        const LEFT     = 0b0000_0100;
        const RIGHT    = 0b0000_1000;
        const ZOOM_IN  = 0b0001_0000;
        const ZOOM_OUT = 0b0010_0000;
        /// Primary pointer button.
        const POINTER  = 0b0100_0000;
    }
}

impl HeldControls {
    /// Zoom direction: +1 zooms out, -1 zooms in. Zoom out wins when both are held.
    #[must_use]
    pub const fn zoom_axis(self) -> f32 {
        if self.contains(Self::ZOOM_OUT) {
            1.0
        } else if self.contains(Self::ZOOM_IN) {
            -1.0
        } else {
            0.0
        }
    }

    /// Pan direction in plane units (+x right, +y up).
    #[must_use]
    pub fn pan_axis(self) -> Vec2 {
        let x = if self.contains(Self::RIGHT) {
            1.0
        } else if self.contains(Self::LEFT) {
            -1.0
        } else {
            0.0
        };
        let y = if self.contains(Self::UP) {
            1.0
        } else if self.contains(Self::DOWN) {
            -1.0
        } else {
            0.0
        };
        Vec2::new(x, y)
    }
}

/// A continuously held movement control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveControl {
    Up,
    Down,
    Left,
    Right,
    ZoomIn,
    ZoomOut,
}

impl MoveControl {
    #[must_use]
    pub const fn flag(self) -> HeldControls {
        match self {
            Self::Up => HeldControls::UP,
            Self::Down => HeldControls::DOWN,
            Self::Left => HeldControls::LEFT,
            Self::Right => HeldControls::RIGHT,
            Self::ZoomIn => HeldControls::ZOOM_IN,
            Self::ZoomOut => HeldControls::ZOOM_OUT,
        }
    }
}

/// A discrete input event after key binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    Press(MoveControl),
    Release(MoveControl),
    PointerDown,
    PointerUp,
    /// Cursor position in physical pixels, origin top-left.
    CursorMoved(Vec2),
    SelectFamily(FractalFamily),
    ToggleMode,
    ToggleVsync,
    ToggleFullscreen,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_out_takes_precedence() {
        let held = HeldControls::ZOOM_IN | HeldControls::ZOOM_OUT;
        assert_eq!(held.zoom_axis(), 1.0);
        assert_eq!(HeldControls::ZOOM_IN.zoom_axis(), -1.0);
        assert_eq!(HeldControls::empty().zoom_axis(), 0.0);
    }

    #[test]
    fn pan_axis_directions() {
        let held = HeldControls::UP | HeldControls::LEFT;
        assert_eq!(held.pan_axis(), Vec2::new(-1.0, 1.0));
        assert_eq!(HeldControls::POINTER.pan_axis(), Vec2::ZERO);
    }
}
