//! Modifier key flags.

use bitflags::bitflags;
use winit::keyboard::ModifiersState;

bitflags! {
    /// Modifier keys held alongside a key press.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        const SUPER = 0b1000;
    }
}

impl Modifiers {
    /// Returns `true` if every modifier in `required` is held.
    #[inline]
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        self.contains(required)
    }
}

impl From<ModifiersState> for Modifiers {
    fn from(state: ModifiersState) -> Self {
        [
            (state.shift_key(), Self::SHIFT),
            (state.control_key(), Self::CTRL),
            (state.alt_key(), Self::ALT),
            (state.super_key(), Self::SUPER),
        ]
        .into_iter()
        .filter(|(held, _)| *held)
        .fold(Self::empty(), |acc, (_, flag)| acc | flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_winit_state() {
        let mods = Modifiers::from(ModifiersState::ALT | ModifiersState::SHIFT);
        assert_eq!(mods, Modifiers::ALT | Modifiers::SHIFT);
        assert_eq!(Modifiers::from(ModifiersState::empty()), Modifiers::empty());
    }

    #[test]
    fn extra_modifiers_still_satisfy() {
        let held = Modifiers::ALT | Modifiers::CTRL;
        assert!(held.satisfies(Modifiers::ALT));
        assert!(held.satisfies(Modifiers::empty()));
        assert!(!Modifiers::CTRL.satisfies(Modifiers::ALT));
    }
}
