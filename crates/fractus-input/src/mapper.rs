//! Window events to control events.

use fractus_core::ControlEvent;
use glam::Vec2;
use hashbrown::HashMap;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::bindings::{BindingMap, Command, MouseButton};
use crate::button_state::ButtonState;
use crate::modifiers::Modifiers;

/// Turns raw window events into [`ControlEvent`]s.
///
/// A key that is held remembers the command it started, so its release
/// reports the same command even if modifiers changed in between.
#[derive(Debug, Default)]
pub struct ControlMapper {
    bindings: BindingMap,
    keys: HashMap<KeyCode, (ButtonState, Option<Command>)>,
    buttons: HashMap<MouseButton, ButtonState>,
    modifiers: Modifiers,
}

impl ControlMapper {
    /// Mapper using the default layout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bindings(BindingMap::defaults())
    }

    #[must_use]
    pub fn with_bindings(bindings: BindingMap) -> Self {
        Self {
            bindings,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Process a window event.
    pub fn process_window_event(&mut self, event: &WindowEvent) -> Vec<ControlEvent> {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return Vec::new();
                };
                self.key(key, event.state == ElementState::Pressed)
                    .into_iter()
                    .collect()
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.set_modifiers(Modifiers::from(modifiers.state()));
                Vec::new()
            }
            WindowEvent::CursorMoved { position, .. } => {
                vec![Self::cursor_moved(position.x, position.y)]
            }
            WindowEvent::MouseInput { button, state, .. } => MouseButton::try_from(*button)
                .ok()
                .and_then(|button| self.mouse_button(button, *state == ElementState::Pressed))
                .into_iter()
                .collect(),
            WindowEvent::Focused(false) => self.release_all(),
            _ => Vec::new(),
        }
    }

    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    /// Key edge. Repeats and unbound keys produce nothing.
    pub fn key(&mut self, key: KeyCode, pressed: bool) -> Option<ControlEvent> {
        let command = self.bindings.key_command(key, self.modifiers);
        let (state, started) = self.keys.entry(key).or_default();

        if pressed {
            if !state.press() {
                return None;
            }
            *started = command;
            command.map(press_event)
        } else {
            if !state.release() {
                return None;
            }
            started.take().and_then(release_event)
        }
    }

    /// Pointer button edge.
    pub fn mouse_button(&mut self, button: MouseButton, pressed: bool) -> Option<ControlEvent> {
        let command = self.bindings.button_command(button)?;
        let state = self.buttons.entry(button).or_default();

        if pressed {
            state.press().then(|| press_event(command))
        } else {
            state.release().then(|| release_event(command)).flatten()
        }
    }

    /// Cursor position in window pixels.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn cursor_moved(x: f64, y: f64) -> ControlEvent {
        ControlEvent::CursorMoved(Vec2::new(x as f32, y as f32))
    }

    /// Release everything held. Used when the window loses focus, since the
    /// matching key-up events never arrive.
    pub fn release_all(&mut self) -> Vec<ControlEvent> {
        let mut events: Vec<ControlEvent> = self
            .keys
            .values_mut()
            .filter_map(|(state, started)| {
                if state.release() {
                    started.take().and_then(release_event)
                } else {
                    None
                }
            })
            .collect();

        for (button, state) in &mut self.buttons {
            if state.release() {
                if let Some(event) = self
                    .bindings
                    .button_command(*button)
                    .and_then(release_event)
                {
                    events.push(event);
                }
            }
        }

        self.modifiers = Modifiers::empty();
        if !events.is_empty() {
            tracing::debug!("Focus lost, released {} held controls", events.len());
        }
        events
    }
}

const fn press_event(command: Command) -> ControlEvent {
    match command {
        Command::Hold(control) => ControlEvent::Press(control),
        Command::Pointer => ControlEvent::PointerDown,
        Command::SelectFamily(family) => ControlEvent::SelectFamily(family),
        Command::ToggleMode => ControlEvent::ToggleMode,
        Command::ToggleVsync => ControlEvent::ToggleVsync,
        Command::ToggleFullscreen => ControlEvent::ToggleFullscreen,
        Command::Quit => ControlEvent::Quit,
    }
}

const fn release_event(command: Command) -> Option<ControlEvent> {
    match command {
        Command::Hold(control) => Some(ControlEvent::Release(control)),
        Command::Pointer => Some(ControlEvent::PointerUp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractus_core::{FractalFamily, MoveControl};

    #[test]
    fn held_key_reports_both_edges() {
        let mut mapper = ControlMapper::new();
        assert_eq!(
            mapper.key(KeyCode::KeyW, true),
            Some(ControlEvent::Press(MoveControl::Up))
        );
        // Auto-repeat
        assert_eq!(mapper.key(KeyCode::KeyW, true), None);
        assert_eq!(
            mapper.key(KeyCode::KeyW, false),
            Some(ControlEvent::Release(MoveControl::Up))
        );
        assert_eq!(mapper.key(KeyCode::KeyW, false), None);
    }

    #[test]
    fn tap_commands_fire_on_press_only() {
        let mut mapper = ControlMapper::new();
        assert_eq!(
            mapper.key(KeyCode::Digit2, true),
            Some(ControlEvent::SelectFamily(FractalFamily::Tricorn))
        );
        assert_eq!(mapper.key(KeyCode::Digit2, false), None);

        assert_eq!(mapper.key(KeyCode::Space, true), Some(ControlEvent::ToggleMode));
        assert_eq!(mapper.key(KeyCode::Space, true), None);
        assert_eq!(mapper.key(KeyCode::Space, false), None);
        assert_eq!(mapper.key(KeyCode::Space, true), Some(ControlEvent::ToggleMode));
    }

    #[test]
    fn alt_enter_toggles_fullscreen() {
        let mut mapper = ControlMapper::new();
        assert_eq!(mapper.key(KeyCode::Enter, true), None);
        mapper.key(KeyCode::Enter, false);

        mapper.set_modifiers(Modifiers::ALT);
        assert_eq!(
            mapper.key(KeyCode::Enter, true),
            Some(ControlEvent::ToggleFullscreen)
        );
    }

    #[test]
    fn release_matches_press_despite_modifier_change() {
        let mut mapper = ControlMapper::new();
        mapper.key(KeyCode::KeyE, true);
        mapper.set_modifiers(Modifiers::ALT | Modifiers::SHIFT);
        assert_eq!(
            mapper.key(KeyCode::KeyE, false),
            Some(ControlEvent::Release(MoveControl::ZoomIn))
        );
    }

    #[test]
    fn pointer_button() {
        let mut mapper = ControlMapper::new();
        assert_eq!(
            mapper.mouse_button(MouseButton::Left, true),
            Some(ControlEvent::PointerDown)
        );
        assert_eq!(mapper.mouse_button(MouseButton::Left, true), None);
        assert_eq!(
            mapper.mouse_button(MouseButton::Left, false),
            Some(ControlEvent::PointerUp)
        );
        assert_eq!(mapper.mouse_button(MouseButton::Right, true), None);
        assert_eq!(
            ControlMapper::cursor_moved(12.0, 30.5),
            ControlEvent::CursorMoved(Vec2::new(12.0, 30.5))
        );
    }

    #[test]
    fn focus_loss_releases_held_controls() {
        let mut mapper = ControlMapper::new();
        mapper.key(KeyCode::KeyA, true);
        mapper.key(KeyCode::KeyV, true);
        mapper.mouse_button(MouseButton::Left, true);

        let mut released = mapper.release_all();
        released.sort_by_key(|event| format!("{event:?}"));
        assert_eq!(
            released,
            vec![
                ControlEvent::PointerUp,
                ControlEvent::Release(MoveControl::Left),
            ]
        );
        assert!(mapper.release_all().is_empty());
    }
}
