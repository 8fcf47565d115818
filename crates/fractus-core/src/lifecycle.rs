//! Window lifecycle state machine.
//!
//! Every `(state, event kind)` pair has exactly one handler, looked up in a
//! table. Handlers call into [`LifecycleHooks`] and return the next state.
//!
//! ```text
//! Uninitialized --Initialized--> Ready <--Restored / Resized(non-empty)-- Suspended
//!                                  |  --Minimized / Resized(empty)-->        |
//!                                  +--CloseRequested / Quit--> ShuttingDown <-+
//! ```

use crate::controls::ControlEvent;
use crate::plan::Extent;

/// Lifecycle state of the viewer window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Window or GPU not created yet.
    #[default]
    Uninitialized,
    /// Producing frames.
    Ready,
    /// Minimized; nothing is recorded.
    Suspended,
    /// Terminal.
    ShuttingDown,
}

impl LifecycleState {
    const COUNT: usize = 4;

    const fn index(self) -> usize {
        self as usize
    }
}

/// Events fed into the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecycleEvent {
    /// Window and GPU objects exist.
    Initialized,
    Resized(Extent),
    Minimized,
    Restored,
    RedrawRequested,
    Control(ControlEvent),
    CloseRequested,
}

#[derive(Debug, Clone, Copy)]
enum EventKind {
    Initialized,
    Resized,
    Minimized,
    Restored,
    RedrawRequested,
    Control,
    CloseRequested,
}

impl EventKind {
    const COUNT: usize = 7;

    const fn index(self) -> usize {
        self as usize
    }
}

impl LifecycleEvent {
    const fn kind(&self) -> EventKind {
        match self {
            Self::Initialized => EventKind::Initialized,
            Self::Resized(_) => EventKind::Resized,
            Self::Minimized => EventKind::Minimized,
            Self::Restored => EventKind::Restored,
            Self::RedrawRequested => EventKind::RedrawRequested,
            Self::Control(_) => EventKind::Control,
            Self::CloseRequested => EventKind::CloseRequested,
        }
    }
}

/// Operations the state machine drives.
pub trait LifecycleHooks {
    type Error;

    /// Initial sizing, once the window and GPU exist.
    fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Output dimensions changed to a non-empty extent.
    fn resize(&mut self, extent: Extent) -> Result<(), Self::Error>;

    /// Stop producing frames.
    fn suspend(&mut self) -> Result<(), Self::Error>;

    /// Resume producing frames.
    fn resume(&mut self) -> Result<(), Self::Error>;

    /// Produce and present one frame.
    fn render_frame(&mut self) -> Result<(), Self::Error>;

    /// Apply a control event other than quit.
    fn control(&mut self, event: ControlEvent) -> Result<(), Self::Error>;

    /// Apply a control event other than quit while suspended.
    ///
    /// Only view state may change here. Display surface work waits for
    /// [`LifecycleHooks::resume`].
    fn defer_control(&mut self, event: ControlEvent) -> Result<(), Self::Error>;

    /// Drain outstanding work and release resources.
    fn shutdown(&mut self) -> Result<(), Self::Error>;
}

type Handler<H> = fn(
    &mut H,
    LifecycleState,
    &LifecycleEvent,
) -> Result<LifecycleState, <H as LifecycleHooks>::Error>;

mod handlers {
    use super::{LifecycleEvent, LifecycleHooks, LifecycleState};
    use crate::controls::ControlEvent;

    pub fn ignore<H: LifecycleHooks>(
        _: &mut H,
        state: LifecycleState,
        _: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        Ok(state)
    }

    pub fn initialize<H: LifecycleHooks>(
        hooks: &mut H,
        _: LifecycleState,
        _: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        hooks.initialize()?;
        Ok(LifecycleState::Ready)
    }

    pub fn ready_resized<H: LifecycleHooks>(
        hooks: &mut H,
        state: LifecycleState,
        event: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        match event {
            LifecycleEvent::Resized(extent) if extent.is_empty() => {
                hooks.suspend()?;
                Ok(LifecycleState::Suspended)
            }
            LifecycleEvent::Resized(extent) => {
                hooks.resize(*extent)?;
                Ok(LifecycleState::Ready)
            }
            _ => Ok(state),
        }
    }

    pub fn suspended_resized<H: LifecycleHooks>(
        hooks: &mut H,
        state: LifecycleState,
        event: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        match event {
            LifecycleEvent::Resized(extent) if !extent.is_empty() => {
                hooks.resize(*extent)?;
                hooks.resume()?;
                Ok(LifecycleState::Ready)
            }
            _ => Ok(state),
        }
    }

    pub fn suspend<H: LifecycleHooks>(
        hooks: &mut H,
        _: LifecycleState,
        _: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        hooks.suspend()?;
        Ok(LifecycleState::Suspended)
    }

    pub fn resume<H: LifecycleHooks>(
        hooks: &mut H,
        _: LifecycleState,
        _: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        hooks.resume()?;
        Ok(LifecycleState::Ready)
    }

    pub fn render<H: LifecycleHooks>(
        hooks: &mut H,
        state: LifecycleState,
        _: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        hooks.render_frame()?;
        Ok(state)
    }

    pub fn control<H: LifecycleHooks>(
        hooks: &mut H,
        state: LifecycleState,
        event: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        match event {
            LifecycleEvent::Control(ControlEvent::Quit) => shutdown(hooks, state, event),
            LifecycleEvent::Control(control) => {
                hooks.control(*control)?;
                Ok(state)
            }
            _ => Ok(state),
        }
    }

    pub fn suspended_control<H: LifecycleHooks>(
        hooks: &mut H,
        state: LifecycleState,
        event: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        match event {
            LifecycleEvent::Control(ControlEvent::Quit) => shutdown(hooks, state, event),
            LifecycleEvent::Control(control) => {
                hooks.defer_control(*control)?;
                Ok(state)
            }
            _ => Ok(state),
        }
    }

    pub fn shutdown<H: LifecycleHooks>(
        hooks: &mut H,
        _: LifecycleState,
        _: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        hooks.shutdown()?;
        Ok(LifecycleState::ShuttingDown)
    }

    /// Close before anything was created: nothing to release.
    pub fn abandon<H: LifecycleHooks>(
        _: &mut H,
        _: LifecycleState,
        _: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        Ok(LifecycleState::ShuttingDown)
    }
}

fn transition_table<H: LifecycleHooks>() -> [[Handler<H>; EventKind::COUNT]; LifecycleState::COUNT]
{
    let ignore: Handler<H> = handlers::ignore::<H>;
    let initialize: Handler<H> = handlers::initialize::<H>;
    let ready_resized: Handler<H> = handlers::ready_resized::<H>;
    let suspended_resized: Handler<H> = handlers::suspended_resized::<H>;
    let suspend: Handler<H> = handlers::suspend::<H>;
    let resume: Handler<H> = handlers::resume::<H>;
    let render: Handler<H> = handlers::render::<H>;
    let control: Handler<H> = handlers::control::<H>;
    let suspended_control: Handler<H> = handlers::suspended_control::<H>;
    let shutdown: Handler<H> = handlers::shutdown::<H>;
    let abandon: Handler<H> = handlers::abandon::<H>;

    // Columns: Initialized, Resized, Minimized, Restored, RedrawRequested, Control, CloseRequested
    [
        // Uninitialized
        [initialize, ignore, ignore, ignore, ignore, ignore, abandon],
        // Ready
        [ignore, ready_resized, suspend, ignore, render, control, shutdown],
        // Suspended
        [ignore, suspended_resized, ignore, resume, ignore, suspended_control, shutdown],
        // ShuttingDown
        [ignore; EventKind::COUNT],
    ]
}

/// The state machine itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: LifecycleState::Uninitialized,
        }
    }

    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Run the handler for `event` in the current state.
    ///
    /// On error the state is left unchanged.
    pub fn dispatch<H: LifecycleHooks>(
        &mut self,
        hooks: &mut H,
        event: &LifecycleEvent,
    ) -> Result<LifecycleState, H::Error> {
        let handler = transition_table::<H>()[self.state.index()][event.kind().index()];
        self.state = handler(hooks, self.state, event)?;
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        fail_render: bool,
    }

    impl LifecycleHooks for Recorder {
        type Error = &'static str;

        fn initialize(&mut self) -> Result<(), Self::Error> {
            self.calls.push("initialize");
            Ok(())
        }

        fn resize(&mut self, _extent: Extent) -> Result<(), Self::Error> {
            self.calls.push("resize");
            Ok(())
        }

        fn suspend(&mut self) -> Result<(), Self::Error> {
            self.calls.push("suspend");
            Ok(())
        }

        fn resume(&mut self) -> Result<(), Self::Error> {
            self.calls.push("resume");
            Ok(())
        }

        fn render_frame(&mut self) -> Result<(), Self::Error> {
            if self.fail_render {
                return Err("device lost");
            }
            self.calls.push("render");
            Ok(())
        }

        fn control(&mut self, _event: ControlEvent) -> Result<(), Self::Error> {
            self.calls.push("control");
            Ok(())
        }

        fn defer_control(&mut self, _event: ControlEvent) -> Result<(), Self::Error> {
            self.calls.push("defer_control");
            Ok(())
        }

        fn shutdown(&mut self) -> Result<(), Self::Error> {
            self.calls.push("shutdown");
            Ok(())
        }
    }

    fn ready(hooks: &mut Recorder) -> Lifecycle {
        let mut lifecycle = Lifecycle::new();
        lifecycle
            .dispatch(hooks, &LifecycleEvent::Initialized)
            .unwrap();
        lifecycle
    }

    #[test]
    fn nothing_renders_before_initialization() {
        let mut hooks = Recorder::default();
        let mut lifecycle = Lifecycle::new();

        let state = lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::RedrawRequested)
            .unwrap();
        assert_eq!(state, LifecycleState::Uninitialized);
        assert!(hooks.calls.is_empty());

        let state = lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Initialized)
            .unwrap();
        assert_eq!(state, LifecycleState::Ready);
        assert_eq!(hooks.calls, ["initialize"]);
    }

    #[test]
    fn minimize_suspends_until_restored() {
        let mut hooks = Recorder::default();
        let mut lifecycle = ready(&mut hooks);

        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Resized(Extent::new(0, 0)))
            .unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Suspended);

        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::RedrawRequested)
            .unwrap();
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Resized(Extent::new(0, 0)))
            .unwrap();
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Resized(Extent::new(800, 600)))
            .unwrap();

        assert_eq!(lifecycle.state(), LifecycleState::Ready);
        assert_eq!(hooks.calls, ["initialize", "suspend", "resize", "resume"]);
    }

    #[test]
    fn explicit_minimize_and_restore() {
        let mut hooks = Recorder::default();
        let mut lifecycle = ready(&mut hooks);

        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Minimized)
            .unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Suspended);
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Restored)
            .unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::RedrawRequested)
            .unwrap();

        assert_eq!(hooks.calls, ["initialize", "suspend", "resume", "render"]);
    }

    #[test]
    fn quit_control_shuts_down() {
        let mut hooks = Recorder::default();
        let mut lifecycle = ready(&mut hooks);

        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Control(ControlEvent::ToggleMode))
            .unwrap();
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Control(ControlEvent::Quit))
            .unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::ShuttingDown);

        // Terminal: later events are ignored
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::RedrawRequested)
            .unwrap();
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::CloseRequested)
            .unwrap();
        assert_eq!(hooks.calls, ["initialize", "control", "shutdown"]);
    }

    #[test]
    fn controls_while_suspended_are_deferred() {
        let mut hooks = Recorder::default();
        let mut lifecycle = ready(&mut hooks);

        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Resized(Extent::new(0, 0)))
            .unwrap();
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Control(ControlEvent::ToggleVsync))
            .unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Suspended);

        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Restored)
            .unwrap();
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Control(ControlEvent::ToggleVsync))
            .unwrap();

        assert_eq!(
            hooks.calls,
            ["initialize", "suspend", "defer_control", "resume", "control"]
        );
    }

    #[test]
    fn quit_while_suspended_shuts_down() {
        let mut hooks = Recorder::default();
        let mut lifecycle = ready(&mut hooks);

        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Minimized)
            .unwrap();
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::Control(ControlEvent::Quit))
            .unwrap();

        assert_eq!(lifecycle.state(), LifecycleState::ShuttingDown);
        assert_eq!(hooks.calls, ["initialize", "suspend", "shutdown"]);
    }

    #[test]
    fn close_before_initialization_skips_hooks() {
        let mut hooks = Recorder::default();
        let mut lifecycle = Lifecycle::new();
        lifecycle
            .dispatch(&mut hooks, &LifecycleEvent::CloseRequested)
            .unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::ShuttingDown);
        assert!(hooks.calls.is_empty());
    }

    #[test]
    fn failed_handler_keeps_state() {
        let mut hooks = Recorder::default();
        let mut lifecycle = ready(&mut hooks);
        hooks.fail_render = true;

        let result = lifecycle.dispatch(&mut hooks, &LifecycleEvent::RedrawRequested);
        assert_eq!(result, Err("device lost"));
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
    }
}
