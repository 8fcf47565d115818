//! Ordered per-queue frame plans.
//!
//! A plan lists what one queue does in one frame: image state transitions,
//! kernel dispatches and the final copy. Plans are pure data; the GPU crate
//! encodes them into command buffers.
//!
//! Image state protocol over a frame (base mode):
//!
//! ```text
//! compute: dispatch detail -> Minimap       (Minimap ShaderWrite)
//!          Minimap ShaderWrite -> ShaderRead
//!          dispatch base -> Main, samples Minimap
//!          Minimap ShaderRead -> ShaderWrite (discard)
//!          Main ShaderWrite -> CopySource
//! present: Display Present -> CopyDest (discard)
//!          copy Main -> Display
//!          Display CopyDest -> Present
//!          Main CopySource -> ShaderWrite (discard)
//! ```

use crate::constants::WORKGROUP_EDGE;
use crate::error::{Error, Result};
use crate::fractal::{FractalFamily, KernelId, KernelVariant, RenderMode};

/// The two GPU queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueRole {
    /// Runs the fractal kernels.
    Compute,
    /// Copies into the display image and presents.
    Present,
}

impl QueueRole {
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Output dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero-area extents happen while minimized.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Workgroups needed to cover the extent, rounding up.
    #[must_use]
    pub const fn dispatch_groups(self) -> [u32; 2] {
        [
            self.width.div_ceil(WORKGROUP_EDGE),
            self.height.div_ceil(WORKGROUP_EDGE),
        ]
    }
}

/// Images touched by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Full-view output, always resident.
    Main,
    /// Detail-view preview, resident only in base mode.
    Minimap,
    /// The acquired display surface image.
    Display,
}

/// Access state of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageState {
    ShaderWrite,
    ShaderRead,
    CopySource,
    CopyDest,
    Present,
}

/// A state change for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub target: Target,
    pub from: ImageState,
    pub to: ImageState,
    /// Previous contents need not be preserved.
    pub discard: bool,
}

impl Transition {
    #[must_use]
    pub const fn new(target: Target, from: ImageState, to: ImageState) -> Self {
        Self {
            target,
            from,
            to,
            discard: false,
        }
    }

    #[must_use]
    pub const fn discarding(mut self) -> Self {
        self.discard = true;
        self
    }
}

/// Which parameter buffer a dispatch reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamsKind {
    /// Fixed minimap viewport plus the click target.
    Stationary,
    /// The user-driven viewport.
    Movable,
}

/// Resource bindings of a dispatch. Each key maps to one descriptor set per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKey {
    /// Detail kernel writing Minimap from Stationary params.
    MinimapDetail,
    /// Detail kernel writing Main from Movable params.
    MainDetail,
    /// Base kernel writing Main from Movable params, sampling Minimap.
    MainBase,
}

impl BindingKey {
    pub const ALL: [Self; 3] = [Self::MinimapDetail, Self::MainDetail, Self::MainBase];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn output(self) -> Target {
        match self {
            Self::MinimapDetail => Target::Minimap,
            Self::MainDetail | Self::MainBase => Target::Main,
        }
    }

    #[must_use]
    pub const fn params(self) -> ParamsKind {
        match self {
            Self::MinimapDetail => ParamsKind::Stationary,
            Self::MainDetail | Self::MainBase => ParamsKind::Movable,
        }
    }

    /// Image sampled as a texture, if any.
    #[must_use]
    pub const fn sampled(self) -> Option<Target> {
        match self {
            Self::MainBase => Some(Target::Minimap),
            Self::MinimapDetail | Self::MainDetail => None,
        }
    }

    /// Whether the key references Minimap at all.
    #[must_use]
    pub const fn uses_minimap(self) -> bool {
        matches!(self, Self::MinimapDetail | Self::MainBase)
    }
}

/// A kernel dispatch over the output grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub kernel: KernelId,
    pub binding: BindingKey,
    pub groups: [u32; 2],
}

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Transitions issued together as one barrier.
    Barrier(Vec<Transition>),
    Dispatch(Dispatch),
    Copy { src: Target, dst: Target },
}

/// Operations for one queue in one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    pub queue: QueueRole,
    pub ops: Vec<Op>,
}

impl FramePlan {
    /// Compute queue work for a frame.
    #[must_use]
    pub fn compute(mode: RenderMode, family: FractalFamily, extent: Extent) -> Self {
        let groups = extent.dispatch_groups();
        let detail = KernelId::new(family, KernelVariant::Detail);

        let ops = match mode {
            RenderMode::Base => vec![
                Op::Dispatch(Dispatch {
                    kernel: detail,
                    binding: BindingKey::MinimapDetail,
                    groups,
                }),
                Op::Barrier(vec![Transition::new(
                    Target::Minimap,
                    ImageState::ShaderWrite,
                    ImageState::ShaderRead,
                )]),
                Op::Dispatch(Dispatch {
                    kernel: KernelId::new(family, KernelVariant::Base),
                    binding: BindingKey::MainBase,
                    groups,
                }),
                Op::Barrier(vec![
                    Transition::new(
                        Target::Minimap,
                        ImageState::ShaderRead,
                        ImageState::ShaderWrite,
                    )
                    .discarding(),
                    Transition::new(Target::Main, ImageState::ShaderWrite, ImageState::CopySource),
                ]),
            ],
            RenderMode::DetailOnly => vec![
                Op::Dispatch(Dispatch {
                    kernel: detail,
                    binding: BindingKey::MainDetail,
                    groups,
                }),
                Op::Barrier(vec![Transition::new(
                    Target::Main,
                    ImageState::ShaderWrite,
                    ImageState::CopySource,
                )]),
            ],
        };

        Self {
            queue: QueueRole::Compute,
            ops,
        }
    }

    /// Present queue work for a frame: copy Main into the display image.
    #[must_use]
    pub fn present() -> Self {
        Self {
            queue: QueueRole::Present,
            ops: vec![
                Op::Barrier(vec![Transition::new(
                    Target::Display,
                    ImageState::Present,
                    ImageState::CopyDest,
                )
                .discarding()]),
                Op::Copy {
                    src: Target::Main,
                    dst: Target::Display,
                },
                Op::Barrier(vec![
                    Transition::new(Target::Display, ImageState::CopyDest, ImageState::Present),
                    Transition::new(Target::Main, ImageState::CopySource, ImageState::ShaderWrite)
                        .discarding(),
                ]),
            ],
        }
    }

    /// Dispatches in recording order.
    pub fn dispatches(&self) -> impl Iterator<Item = &Dispatch> {
        self.ops.iter().filter_map(|op| match op {
            Op::Dispatch(dispatch) => Some(dispatch),
            _ => None,
        })
    }

    /// Whether any op touches `target`.
    #[must_use]
    pub fn touches(&self, target: Target) -> bool {
        self.ops.iter().any(|op| match op {
            Op::Barrier(transitions) => transitions.iter().any(|t| t.target == target),
            Op::Dispatch(dispatch) => {
                dispatch.binding.output() == target || dispatch.binding.sampled() == Some(target)
            }
            Op::Copy { src, dst } => *src == target || *dst == target,
        })
    }
}

/// Tracked state of every image, used to check plans against the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageStates {
    pub main: ImageState,
    pub minimap: ImageState,
    pub display: ImageState,
}

impl ImageStates {
    /// States between frames.
    #[must_use]
    pub const fn frame_boundary() -> Self {
        Self {
            main: ImageState::ShaderWrite,
            minimap: ImageState::ShaderWrite,
            display: ImageState::Present,
        }
    }

    #[must_use]
    pub const fn get(&self, target: Target) -> ImageState {
        match target {
            Target::Main => self.main,
            Target::Minimap => self.minimap,
            Target::Display => self.display,
        }
    }

    fn set(&mut self, target: Target, state: ImageState) {
        match target {
            Target::Main => self.main = state,
            Target::Minimap => self.minimap = state,
            Target::Display => self.display = state,
        }
    }

    fn expect(&self, target: Target, state: ImageState) -> Result<()> {
        let current = self.get(target);
        if current == state {
            Ok(())
        } else {
            Err(Error::InvalidTransition(format!(
                "{target:?} is {current:?}, expected {state:?}"
            )))
        }
    }

    /// Run `plan` against the tracked states.
    ///
    /// Fails if an op finds an image in a state other than the one it requires.
    pub fn apply(&mut self, plan: &FramePlan) -> Result<()> {
        for op in &plan.ops {
            match op {
                Op::Barrier(transitions) => {
                    for transition in transitions {
                        self.expect(transition.target, transition.from)?;
                        self.set(transition.target, transition.to);
                    }
                }
                Op::Dispatch(dispatch) => {
                    self.expect(dispatch.binding.output(), ImageState::ShaderWrite)?;
                    if let Some(sampled) = dispatch.binding.sampled() {
                        self.expect(sampled, ImageState::ShaderRead)?;
                    }
                }
                Op::Copy { src, dst } => {
                    self.expect(*src, ImageState::CopySource)?;
                    self.expect(*dst, ImageState::CopyDest)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_grid_rounds_up() {
        assert_eq!(Extent::new(1280, 720).dispatch_groups(), [40, 23]);
        assert_eq!(Extent::new(300, 200).dispatch_groups(), [10, 7]);
        assert_eq!(Extent::new(32, 33).dispatch_groups(), [1, 2]);
        assert!(Extent::new(0, 720).is_empty());
    }

    #[test]
    fn base_mode_renders_minimap_then_main() {
        let plan = FramePlan::compute(
            RenderMode::Base,
            FractalFamily::Tricorn,
            Extent::new(800, 600),
        );
        let dispatches: Vec<_> = plan.dispatches().collect();

        assert_eq!(dispatches.len(), 2);
        assert_eq!(dispatches[0].binding, BindingKey::MinimapDetail);
        assert_eq!(dispatches[0].kernel.variant, KernelVariant::Detail);
        assert_eq!(dispatches[1].binding, BindingKey::MainBase);
        assert_eq!(dispatches[1].kernel.variant, KernelVariant::Base);
        assert!(dispatches.iter().all(|d| d.kernel.family == FractalFamily::Tricorn));
        assert!(dispatches.iter().all(|d| d.groups == [25, 19]));
    }

    #[test]
    fn detail_mode_never_touches_minimap() {
        let plan = FramePlan::compute(
            RenderMode::DetailOnly,
            FractalFamily::Mandelbrot,
            Extent::new(800, 600),
        );
        assert!(!plan.touches(Target::Minimap));
        assert_eq!(plan.dispatches().count(), 1);
        assert_eq!(plan.dispatches().next().map(|d| d.binding), Some(BindingKey::MainDetail));
    }

    #[test]
    fn every_op_finds_its_required_state() {
        for mode in [RenderMode::Base, RenderMode::DetailOnly] {
            let mut states = ImageStates::frame_boundary();
            let compute = FramePlan::compute(mode, FractalFamily::BurningShip, Extent::new(640, 480));
            states.apply(&compute).unwrap();
            assert_eq!(states.main, ImageState::CopySource);

            states.apply(&FramePlan::present()).unwrap();
            assert_eq!(states, ImageStates::frame_boundary());
        }
    }

    #[test]
    fn present_before_compute_is_rejected() {
        let mut states = ImageStates::frame_boundary();
        let err = states.apply(&FramePlan::present()).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[test]
    fn discarded_transitions() {
        let plan = FramePlan::present();
        let Op::Barrier(first) = &plan.ops[0] else {
            panic!("present plan starts with a barrier");
        };
        assert!(first[0].discard);

        let Op::Barrier(last) = &plan.ops[2] else {
            panic!("present plan ends with a barrier");
        };
        let main = last.iter().find(|t| t.target == Target::Main).unwrap();
        assert!(main.discard);
        assert_eq!(main.to, ImageState::ShaderWrite);
    }
}
