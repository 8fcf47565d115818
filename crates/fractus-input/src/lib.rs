//! Input handling for the Fractus fractal viewer.
//!
//! Window events from winit are mapped through a [`BindingMap`] into
//! [`fractus_core::ControlEvent`]s, which the view state consumes.
//!
//! # Default layout
//!
//! | Input        | Control                |
//! |--------------|------------------------|
//! | W / S        | pan up / down          |
//! | A / D        | pan left / right       |
//! | E / Q        | zoom in / out          |
//! | 1 / 2 / 3    | Mandelbrot / Tricorn / Burning Ship |
//! | Space        | toggle detail-only mode|
//! | V            | toggle vsync           |
//! | Alt+Enter    | toggle fullscreen      |
//! | Escape       | quit                   |
//! | Left button  | pick the detail target |
//!
//! # Usage
//!
//! ```ignore
//! let mut mapper = ControlMapper::new();
//!
//! fn on_event(mapper: &mut ControlMapper, view: &mut ViewState, event: &WindowEvent) {
//!     for control in mapper.process_window_event(event) {
//!         view.apply(control);
//!     }
//! }
//! ```

mod bindings;
mod button_state;
mod mapper;
mod modifiers;

pub use bindings::{BindingMap, BindingMapBuilder, Command, InputBinding, MouseButton};
pub use button_state::ButtonState;
pub use mapper::ControlMapper;
pub use modifiers::Modifiers;

// Re-export winit types commonly used with input
pub use winit::event::WindowEvent;
pub use winit::keyboard::KeyCode;
