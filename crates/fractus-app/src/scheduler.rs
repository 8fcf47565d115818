//! Per-slot frame protocol.
//!
//! One frame, for the slot owned by the acquired display image:
//!
//! ```text
//! acquire -> block on Drained[s] -> reconcile minimap -> integrate input
//!   -> write params[s] -> compute submit (signal ComputeDone[s])
//!   -> present submit (wait ComputeDone[s]) -> present
//!   -> signal Drained[s] on the present queue -> compute waits on Drained[s]
//! ```
//!
//! The scheduler owns the fence bookkeeping and decides the order of work.
//! Everything that touches the GPU goes through [`FrameBackend`], so the
//! protocol can be exercised without a device.

use fractus_core::{
    Extent, FenceFamily, FenceSignal, FenceWait, FractalParams, FramePlan, ImageStates,
    MinimapResidency, ParamsKind, QueueRole, RenderMode, Residency, ResidencyChange, Timeline,
    ViewState,
};
use tracing::{debug, info, trace};

/// A display image handed out by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    /// The surface still works but no longer matches the window.
    pub suboptimal: bool,
}

/// One queue submission.
///
/// A submission without a plan carries only its waits and signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub queue: QueueRole,
    pub slot: usize,
    /// Display image of the frame.
    pub image: u32,
    pub plan: Option<FramePlan>,
    pub waits: Vec<FenceWait>,
    pub signal: Option<FenceSignal>,
}

/// GPU operations the scheduler and resize coordinator rely on.
pub trait FrameBackend {
    type Error: From<fractus_core::Error>;

    /// Acquire the next display image. `None` when the surface is out of date.
    fn acquire(&mut self) -> Result<Option<AcquiredImage>, Self::Error>;

    /// Block the CPU until every wait is reached.
    fn block_until(&mut self, waits: &[FenceWait]) -> Result<(), Self::Error>;

    /// Free or restore minimap memory. Only called with every slot drained.
    fn apply_residency(&mut self, change: ResidencyChange) -> Result<(), Self::Error>;

    /// Copy a parameter record into the slot's buffer.
    fn write_params(
        &mut self,
        slot: usize,
        kind: ParamsKind,
        params: &FractalParams,
    ) -> Result<(), Self::Error>;

    /// Record (if there is a plan) and submit.
    fn submit(&mut self, submission: Submission) -> Result<(), Self::Error>;

    /// Present a display image. Returns `true` if the surface needs recreating.
    fn present(&mut self, image: u32) -> Result<bool, Self::Error>;

    /// Recreate the display surface images. Only called with every slot drained.
    fn recreate_surface(&mut self, extent: Extent, vsync: bool) -> Result<(), Self::Error>;

    /// Recreate Main and Minimap at a new size. Only called with every slot drained.
    fn recreate_targets(&mut self, extent: Extent, minimap: Residency)
        -> Result<(), Self::Error>;

    /// Rebuild the descriptor sets of every slot.
    fn rebuild_bindings(&mut self, minimap: Residency) -> Result<(), Self::Error>;
}

/// Result of one scheduler step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and presented.
    Presented {
        slot: usize,
        image: u32,
        /// The surface should be recreated before the next frame.
        needs_recreate: bool,
    },
    /// The surface could not hand out an image; nothing was recorded.
    OutOfDate,
}

/// Drives frames through the compute and present queues.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    timeline: Timeline,
    residency: MinimapResidency,
    frames: u64,
}

impl FrameScheduler {
    /// Create a scheduler for `slots` frames in flight, starting in `mode`.
    #[must_use]
    pub fn new(slots: usize, mode: RenderMode) -> Self {
        Self {
            timeline: Timeline::new(slots.max(1)),
            residency: MinimapResidency::new(mode),
            frames: 0,
        }
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.timeline.slot_count()
    }

    /// Current minimap residency.
    #[must_use]
    pub const fn residency(&self) -> Residency {
        self.residency.current()
    }

    /// Minimap evictions and restores carried out so far.
    #[must_use]
    pub const fn residency_changes(&self) -> u64 {
        self.residency.changes()
    }

    /// Frames presented so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Slot owned by a display image.
    #[must_use]
    pub fn slot_for(&self, image: u32) -> usize {
        image as usize % self.timeline.slot_count()
    }

    /// Run one frame.
    pub fn run_frame<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        view: &mut ViewState,
        dt: f32,
    ) -> Result<FrameOutcome, B::Error> {
        let Some(acquired) = backend.acquire()? else {
            debug!("Display surface out of date, skipping frame");
            return Ok(FrameOutcome::OutOfDate);
        };
        let slot = self.slot_for(acquired.index);

        // Nothing below may touch the slot's buffers before this returns
        if let Some(wait) = self.timeline.drain_wait(slot)? {
            backend.block_until(&[wait])?;
        }

        self.reconcile_residency(backend, view.mode)?;

        view.integrate(dt);
        backend.write_params(slot, ParamsKind::Movable, &view.movable_params())?;
        if view.mode == RenderMode::Base {
            backend.write_params(slot, ParamsKind::Stationary, &view.stationary_params())?;
        }

        let compute = FramePlan::compute(view.mode, view.family, view.extent());
        let present = FramePlan::present();
        let mut states = ImageStates::frame_boundary();
        states.apply(&compute)?;
        states.apply(&present)?;

        let compute_done = self.timeline.signal(FenceFamily::ComputeDone, slot)?;
        backend.submit(Submission {
            queue: QueueRole::Compute,
            slot,
            image: acquired.index,
            plan: Some(compute),
            waits: self.timeline.take_waits(QueueRole::Compute),
            signal: Some(compute_done),
        })?;

        self.timeline
            .wait_on_queue(QueueRole::Present, compute_done.as_wait())?;
        backend.submit(Submission {
            queue: QueueRole::Present,
            slot,
            image: acquired.index,
            plan: Some(present),
            waits: self.timeline.take_waits(QueueRole::Present),
            signal: None,
        })?;

        let out_of_date = backend.present(acquired.index)?;

        let drained = self.timeline.signal(FenceFamily::Drained, slot)?;
        backend.submit(Submission {
            queue: QueueRole::Present,
            slot,
            image: acquired.index,
            plan: None,
            waits: Vec::new(),
            signal: Some(drained),
        })?;
        self.timeline
            .wait_on_queue(QueueRole::Compute, drained.as_wait())?;

        self.frames += 1;
        trace!(
            "Frame {} presented: image {}, slot {}, compute {}, drained {}",
            self.frames,
            acquired.index,
            slot,
            compute_done.value,
            drained.value
        );

        Ok(FrameOutcome::Presented {
            slot,
            image: acquired.index,
            needs_recreate: acquired.suboptimal || out_of_date,
        })
    }

    /// Block until every slot has drained.
    pub fn drain<B: FrameBackend>(&self, backend: &mut B) -> Result<(), B::Error> {
        let waits = self.timeline.drain_all();
        if waits.is_empty() {
            return Ok(());
        }
        backend.block_until(&waits)
    }

    /// Write both parameter records into every slot.
    ///
    /// Callers must have drained every slot first.
    pub fn write_all_params<B: FrameBackend>(
        &self,
        backend: &mut B,
        view: &ViewState,
    ) -> Result<(), B::Error> {
        let movable = view.movable_params();
        let stationary = view.stationary_params();
        for slot in 0..self.slot_count() {
            backend.write_params(slot, ParamsKind::Movable, &movable)?;
            backend.write_params(slot, ParamsKind::Stationary, &stationary)?;
        }
        Ok(())
    }

    /// Bring minimap residency in line with `mode`, under a full drain.
    fn reconcile_residency<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        mode: RenderMode,
    ) -> Result<(), B::Error> {
        let Some(change) = self.residency.pending(mode) else {
            return Ok(());
        };

        self.drain(backend)?;
        backend.apply_residency(change)?;
        self.residency.commit(change);
        backend.rebuild_bindings(self.residency.current())?;
        info!(
            "Minimap {:?} for {:?} mode ({} changes)",
            self.residency.current(),
            mode,
            self.residency.changes()
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use fractus_core::{ControlEvent, Error, MoveControl, Target, ViewConfig};
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Acquire,
        Block(Vec<FenceWait>),
        Residency(ResidencyChange),
        Params(usize, ParamsKind),
        Submit(QueueRole, usize),
        Present(u32),
        Surface(Extent, bool),
        Targets(Extent, Residency),
        Bindings(Residency),
    }

    /// Records every call and checks the fence protocol as it goes.
    #[derive(Debug, Default)]
    pub struct MockBackend {
        pub images: u32,
        pub next_image: u32,
        pub out_of_date: bool,
        pub calls: Vec<Call>,
        pub submissions: Vec<Submission>,
        /// Highest value submitted for signaling, per counter.
        pub signaled: HashMap<(FenceFamily, usize), u64>,
        /// Highest value the CPU has waited for, per counter.
        pub observed: HashMap<(FenceFamily, usize), u64>,
        pub params: HashMap<(usize, ParamsKind), FractalParams>,
    }

    impl MockBackend {
        pub fn new(images: u32) -> Self {
            Self {
                images,
                ..Self::default()
            }
        }

        pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|call| matches(call)).count()
        }
    }

    impl FrameBackend for MockBackend {
        type Error = Error;

        fn acquire(&mut self) -> Result<Option<AcquiredImage>, Error> {
            self.calls.push(Call::Acquire);
            if self.out_of_date {
                return Ok(None);
            }
            let index = self.next_image;
            self.next_image = (self.next_image + 1) % self.images;
            Ok(Some(AcquiredImage {
                index,
                suboptimal: false,
            }))
        }

        fn block_until(&mut self, waits: &[FenceWait]) -> Result<(), Error> {
            for wait in waits {
                let signaled = self.signaled.get(&(wait.family, wait.slot)).copied();
                assert!(
                    signaled.unwrap_or(0) >= wait.value,
                    "CPU waits for a value that was never submitted: {wait:?}"
                );
                let observed = self.observed.entry((wait.family, wait.slot)).or_default();
                *observed = (*observed).max(wait.value);
            }
            self.calls.push(Call::Block(waits.to_vec()));
            Ok(())
        }

        fn apply_residency(&mut self, change: ResidencyChange) -> Result<(), Error> {
            for (key, value) in &self.signaled {
                if key.0 == FenceFamily::Drained {
                    let observed = self.observed.get(key).copied().unwrap_or(0);
                    assert!(observed >= *value, "residency change without a drain");
                }
            }
            self.calls.push(Call::Residency(change));
            Ok(())
        }

        fn write_params(
            &mut self,
            slot: usize,
            kind: ParamsKind,
            params: &FractalParams,
        ) -> Result<(), Error> {
            let key = (FenceFamily::Drained, slot);
            let signaled = self.signaled.get(&key).copied().unwrap_or(0);
            let observed = self.observed.get(&key).copied().unwrap_or(0);
            assert!(
                observed >= signaled,
                "slot {slot} written while drained value {signaled} was not waited for"
            );
            self.params.insert((slot, kind), *params);
            self.calls.push(Call::Params(slot, kind));
            Ok(())
        }

        fn submit(&mut self, submission: Submission) -> Result<(), Error> {
            if let Some(signal) = submission.signal {
                let last = self
                    .signaled
                    .insert((signal.family, signal.slot), signal.value)
                    .unwrap_or(0);
                assert!(signal.value > last, "fence value regressed: {signal:?}");
            }
            self.calls
                .push(Call::Submit(submission.queue, submission.slot));
            self.submissions.push(submission);
            Ok(())
        }

        fn present(&mut self, image: u32) -> Result<bool, Error> {
            self.calls.push(Call::Present(image));
            Ok(false)
        }

        fn recreate_surface(&mut self, extent: Extent, vsync: bool) -> Result<(), Error> {
            self.calls.push(Call::Surface(extent, vsync));
            Ok(())
        }

        fn recreate_targets(&mut self, extent: Extent, minimap: Residency) -> Result<(), Error> {
            self.calls.push(Call::Targets(extent, minimap));
            Ok(())
        }

        fn rebuild_bindings(&mut self, minimap: Residency) -> Result<(), Error> {
            self.calls.push(Call::Bindings(minimap));
            Ok(())
        }
    }

    fn view() -> ViewState {
        ViewState::new(ViewConfig::default(), Extent::new(640, 360))
    }

    #[test]
    fn slots_follow_image_index() {
        let mut backend = MockBackend::new(4);
        let mut scheduler = FrameScheduler::new(3, RenderMode::Base);
        let mut view = view();

        let slots: Vec<usize> = (0..6)
            .map(|_| match scheduler.run_frame(&mut backend, &mut view, 0.016) {
                Ok(FrameOutcome::Presented { slot, .. }) => slot,
                other => panic!("unexpected outcome {other:?}"),
            })
            .collect();

        assert_eq!(slots, vec![0, 1, 2, 0, 0, 1]);
        assert_eq!(scheduler.frames(), 6);
    }

    #[test]
    fn slot_reuse_waits_for_its_drain() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3, RenderMode::Base);
        let mut view = view();

        for _ in 0..7 {
            scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();
        }

        // The mock asserts on every write; also check that each reuse blocked
        let blocks = backend.count(|call| matches!(call, Call::Block(_)));
        assert_eq!(blocks, 4);
        assert_eq!(
            scheduler.timeline().last_signaled(FenceFamily::Drained, 0),
            Ok(3)
        );
    }

    #[test]
    fn fence_values_increase_per_counter() {
        let mut backend = MockBackend::new(2);
        let mut scheduler = FrameScheduler::new(2, RenderMode::Base);
        let mut view = view();

        for _ in 0..10 {
            scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();
        }

        let mut last: HashMap<(FenceFamily, usize), u64> = HashMap::new();
        for signal in backend.submissions.iter().filter_map(|s| s.signal) {
            let previous = last.insert((signal.family, signal.slot), signal.value);
            assert!(signal.value > previous.unwrap_or(0));
        }
        assert_eq!(last.len(), 4);
    }

    #[test]
    fn queues_hand_off_through_fences() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3, RenderMode::Base);
        let mut view = view();

        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();
        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();

        let frame = |n: usize| &backend.submissions[n * 3..n * 3 + 3];

        // Present copies only after the same slot's compute finished
        let [compute, present, drain] = frame(1) else {
            unreachable!()
        };
        assert_eq!(compute.queue, QueueRole::Compute);
        let compute_done = compute.signal.unwrap();
        assert_eq!(compute_done.family, FenceFamily::ComputeDone);
        assert_eq!(present.waits, vec![compute_done.as_wait()]);
        assert!(present.signal.is_none());
        assert!(drain.plan.is_none());
        assert_eq!(drain.queue, QueueRole::Present);
        assert_eq!(drain.signal.unwrap().family, FenceFamily::Drained);

        // The second frame's compute waits on the first frame's drain
        let first_drain = frame(0)[2].signal.unwrap();
        assert_eq!(compute.waits, vec![first_drain.as_wait()]);
        assert!(frame(0)[0].waits.is_empty());
    }

    #[test]
    fn submitted_plans_follow_the_image_protocol() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3, RenderMode::Base);
        let mut view = view();

        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();
        view.apply(ControlEvent::ToggleMode);
        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();

        for pair in backend
            .submissions
            .iter()
            .filter_map(|s| s.plan.as_ref())
            .collect::<Vec<_>>()
            .chunks(2)
        {
            let mut states = ImageStates::frame_boundary();
            for plan in pair {
                states.apply(plan).unwrap();
            }
            assert_eq!(states, ImageStates::frame_boundary());
        }

        let last_compute = backend.submissions[3].plan.as_ref().unwrap();
        assert!(!last_compute.touches(Target::Minimap));
    }

    #[test]
    fn stationary_params_only_in_base_mode() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3, RenderMode::DetailOnly);
        let mut view = view();
        view.mode = RenderMode::DetailOnly;

        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();
        assert_eq!(
            backend.count(|call| matches!(call, Call::Params(_, ParamsKind::Stationary))),
            0
        );
        assert_eq!(
            backend.count(|call| matches!(call, Call::Params(0, ParamsKind::Movable))),
            1
        );
    }

    #[test]
    fn double_toggle_between_frames_is_free() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3, RenderMode::Base);
        let mut view = view();

        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();
        view.apply(ControlEvent::ToggleMode);
        view.apply(ControlEvent::ToggleMode);
        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();

        assert_eq!(scheduler.residency(), Residency::Resident);
        assert_eq!(scheduler.residency_changes(), 0);
        assert_eq!(backend.count(|call| matches!(call, Call::Residency(_))), 0);
        assert_eq!(backend.count(|call| matches!(call, Call::Bindings(_))), 0);
    }

    #[test]
    fn mode_switch_evicts_under_full_drain() {
        let mut backend = MockBackend::new(3);
        let mut scheduler = FrameScheduler::new(3, RenderMode::Base);
        let mut view = view();

        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();
        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();
        view.apply(ControlEvent::ToggleMode);
        backend.calls.clear();
        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();

        let evict = backend
            .calls
            .iter()
            .position(|call| *call == Call::Residency(ResidencyChange::Evict))
            .unwrap();
        let Call::Block(waits) = &backend.calls[evict - 1] else {
            panic!("eviction not preceded by a drain: {:?}", backend.calls);
        };
        assert_eq!(waits.len(), 2);
        assert_eq!(
            backend.calls[evict + 1],
            Call::Bindings(Residency::Evicted)
        );
        assert_eq!(scheduler.residency_changes(), 1);

        view.apply(ControlEvent::ToggleMode);
        scheduler.run_frame(&mut backend, &mut view, 0.016).unwrap();
        assert_eq!(scheduler.residency(), Residency::Resident);
        assert_eq!(scheduler.residency_changes(), 2);
        assert_eq!(
            backend.count(|call| *call == Call::Residency(ResidencyChange::MakeResident)),
            1
        );
    }

    #[test]
    fn out_of_date_surface_skips_the_frame() {
        let mut backend = MockBackend::new(3);
        backend.out_of_date = true;
        let mut scheduler = FrameScheduler::new(3, RenderMode::Base);
        let mut view = view();
        view.apply(ControlEvent::Press(MoveControl::ZoomOut));
        let before = view.viewport;

        let outcome = scheduler.run_frame(&mut backend, &mut view, 0.1).unwrap();

        assert_eq!(outcome, FrameOutcome::OutOfDate);
        assert_eq!(backend.calls, vec![Call::Acquire]);
        assert_eq!(view.viewport, before);
        assert_eq!(scheduler.frames(), 0);
    }
}
