//! Input bindings for viewer commands.

use fractus_core::{FractalFamily, MoveControl};
use hashbrown::HashMap;
use winit::event::MouseButton as WinitMouseButton;
use winit::keyboard::KeyCode;

use crate::modifiers::Modifiers;

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl TryFrom<WinitMouseButton> for MouseButton {
    type Error = ();

    fn try_from(button: WinitMouseButton) -> Result<Self, Self::Error> {
        match button {
            WinitMouseButton::Left => Ok(Self::Left),
            WinitMouseButton::Right => Ok(Self::Right),
            WinitMouseButton::Middle => Ok(Self::Middle),
            _ => Err(()),
        }
    }
}

/// An input that can trigger a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputBinding {
    /// A keyboard key.
    Key(KeyCode),
    /// A keyboard key with required modifiers.
    KeyWithModifiers(KeyCode, Modifiers),
    /// A mouse button.
    Mouse(MouseButton),
}

impl From<KeyCode> for InputBinding {
    fn from(key: KeyCode) -> Self {
        Self::Key(key)
    }
}

impl From<MouseButton> for InputBinding {
    fn from(button: MouseButton) -> Self {
        Self::Mouse(button)
    }
}

/// What a bound input does.
///
/// Held commands report both edges; the rest fire once per press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Hold(MoveControl),
    Pointer,
    SelectFamily(FractalFamily),
    ToggleMode,
    ToggleVsync,
    ToggleFullscreen,
    Quit,
}

/// Maps inputs to commands.
#[derive(Debug, Default, Clone)]
pub struct BindingMap {
    keys: HashMap<KeyCode, Vec<(Modifiers, Command)>>,
    buttons: HashMap<MouseButton, Command>,
}

impl BindingMap {
    /// Create an empty binding map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a binding map with a builder pattern.
    #[must_use]
    pub fn builder() -> BindingMapBuilder {
        BindingMapBuilder::default()
    }

    /// The viewer's standard layout.
    #[must_use]
    pub fn defaults() -> Self {
        Self::builder()
            .bind(KeyCode::KeyW, Command::Hold(MoveControl::Up))
            .bind(KeyCode::KeyS, Command::Hold(MoveControl::Down))
            .bind(KeyCode::KeyA, Command::Hold(MoveControl::Left))
            .bind(KeyCode::KeyD, Command::Hold(MoveControl::Right))
            .bind(KeyCode::KeyE, Command::Hold(MoveControl::ZoomIn))
            .bind(KeyCode::KeyQ, Command::Hold(MoveControl::ZoomOut))
            .bind(KeyCode::Digit1, Command::SelectFamily(FractalFamily::Mandelbrot))
            .bind(KeyCode::Digit2, Command::SelectFamily(FractalFamily::Tricorn))
            .bind(KeyCode::Digit3, Command::SelectFamily(FractalFamily::BurningShip))
            .bind(KeyCode::Space, Command::ToggleMode)
            .bind(KeyCode::KeyV, Command::ToggleVsync)
            .bind(
                InputBinding::KeyWithModifiers(KeyCode::Enter, Modifiers::ALT),
                Command::ToggleFullscreen,
            )
            .bind(KeyCode::Escape, Command::Quit)
            .bind(MouseButton::Left, Command::Pointer)
            .build()
    }

    /// Bind an input to a command, replacing any previous binding of that input.
    pub fn bind(&mut self, binding: impl Into<InputBinding>, command: Command) {
        match binding.into() {
            InputBinding::Key(key) => self.bind_key(key, Modifiers::empty(), command),
            InputBinding::KeyWithModifiers(key, mods) => self.bind_key(key, mods, command),
            InputBinding::Mouse(button) => {
                self.buttons.insert(button, command);
            }
        }
    }

    fn bind_key(&mut self, key: KeyCode, mods: Modifiers, command: Command) {
        let entries = self.keys.entry(key).or_default();
        entries.retain(|(existing, _)| *existing != mods);
        entries.push((mods, command));
        // Most specific combination first
        entries.sort_by_key(|(mods, _)| std::cmp::Reverse(mods.bits().count_ones()));
    }

    /// Remove a binding.
    pub fn unbind(&mut self, binding: impl Into<InputBinding>) {
        match binding.into() {
            InputBinding::Key(key) => self.unbind_key(key, Modifiers::empty()),
            InputBinding::KeyWithModifiers(key, mods) => self.unbind_key(key, mods),
            InputBinding::Mouse(button) => {
                self.buttons.remove(&button);
            }
        }
    }

    fn unbind_key(&mut self, key: KeyCode, mods: Modifiers) {
        if let Some(entries) = self.keys.get_mut(&key) {
            entries.retain(|(existing, _)| *existing != mods);
        }
    }

    /// Command for `key` given the held modifiers.
    ///
    /// Bindings that require modifiers win over plain ones when satisfied.
    #[must_use]
    pub fn key_command(&self, key: KeyCode, held: Modifiers) -> Option<Command> {
        self.keys
            .get(&key)?
            .iter()
            .find(|(required, _)| held.satisfies(*required))
            .map(|(_, command)| *command)
    }

    /// Command for a mouse button.
    #[must_use]
    pub fn button_command(&self, button: MouseButton) -> Option<Command> {
        self.buttons.get(&button).copied()
    }
}

/// Builder for a binding map.
#[derive(Debug, Default)]
pub struct BindingMapBuilder {
    map: BindingMap,
}

impl BindingMapBuilder {
    #[must_use]
    pub fn bind(mut self, binding: impl Into<InputBinding>, command: Command) -> Self {
        self.map.bind(binding, command);
        self
    }

    #[must_use]
    pub fn build(self) -> BindingMap {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let map = BindingMap::defaults();
        assert_eq!(
            map.key_command(KeyCode::KeyQ, Modifiers::empty()),
            Some(Command::Hold(MoveControl::ZoomOut))
        );
        assert_eq!(
            map.key_command(KeyCode::Digit3, Modifiers::empty()),
            Some(Command::SelectFamily(FractalFamily::BurningShip))
        );
        assert_eq!(map.button_command(MouseButton::Left), Some(Command::Pointer));
        assert_eq!(map.button_command(MouseButton::Right), None);
    }

    #[test]
    fn modifier_binding_needs_modifier() {
        let map = BindingMap::defaults();
        assert_eq!(map.key_command(KeyCode::Enter, Modifiers::empty()), None);
        assert_eq!(
            map.key_command(KeyCode::Enter, Modifiers::ALT),
            Some(Command::ToggleFullscreen)
        );
    }

    #[test]
    fn specific_binding_wins() {
        let map = BindingMap::builder()
            .bind(KeyCode::KeyV, Command::ToggleVsync)
            .bind(
                InputBinding::KeyWithModifiers(KeyCode::KeyV, Modifiers::CTRL),
                Command::ToggleMode,
            )
            .build();

        assert_eq!(
            map.key_command(KeyCode::KeyV, Modifiers::CTRL),
            Some(Command::ToggleMode)
        );
        assert_eq!(
            map.key_command(KeyCode::KeyV, Modifiers::SHIFT),
            Some(Command::ToggleVsync)
        );
    }

    #[test]
    fn rebind_and_unbind() {
        let mut map = BindingMap::defaults();
        map.bind(KeyCode::KeyW, Command::Quit);
        assert_eq!(
            map.key_command(KeyCode::KeyW, Modifiers::empty()),
            Some(Command::Quit)
        );

        map.unbind(KeyCode::KeyW);
        assert_eq!(map.key_command(KeyCode::KeyW, Modifiers::empty()), None);
    }
}
