//! Edge detection for keys and pointer buttons.

/// State of a key or button.
///
/// Operating systems repeat key-down messages while a key is held. Only the
/// first press and the matching release are edges; everything in between
/// is ignored.
///
/// ```text
/// Released ─press()=true─> Pressed ─release()=true─> Released
///    │ release()=false        │ press()=false (repeat)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    Pressed,
    #[default]
    Released,
}

impl ButtonState {
    #[inline]
    #[must_use]
    pub const fn is_pressed(self) -> bool {
        matches!(self, Self::Pressed)
    }

    /// Move to pressed. Returns `true` on the released-to-pressed edge.
    #[inline]
    pub fn press(&mut self) -> bool {
        let edge = !self.is_pressed();
        *self = Self::Pressed;
        edge
    }

    /// Move to released. Returns `true` on the pressed-to-released edge.
    #[inline]
    pub fn release(&mut self) -> bool {
        let edge = self.is_pressed();
        *self = Self::Released;
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_only() {
        let mut state = ButtonState::default();
        assert!(!state.is_pressed());

        assert!(state.press());
        assert!(state.is_pressed());

        // Auto-repeat
        assert!(!state.press());
        assert!(state.is_pressed());

        assert!(state.release());
        assert!(!state.is_pressed());
    }

    #[test]
    fn release_without_press_ignored() {
        let mut state = ButtonState::Released;
        assert!(!state.release());
        assert_eq!(state, ButtonState::Released);
    }
}
