//! Per-slot fence counters for the compute/present hand-off.
//!
//! Every slot owns two monotonically increasing counters:
//! - `ComputeDone`, signaled by the compute queue and waited on by the present queue
//!   before it copies the finished image
//! - `Drained`, signaled by the present queue after present and waited on by the
//!   CPU before it reuses the slot, and by the compute queue before its next submission
//!
//! [`Timeline`] only does the bookkeeping. The GPU side maps each
//! `(family, slot)` pair onto a timeline semaphore.

use crate::error::{Error, Result};
use crate::plan::QueueRole;

/// Which of the two per-slot counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FenceFamily {
    ComputeDone,
    Drained,
}

impl FenceFamily {
    pub const ALL: [Self; 2] = [Self::ComputeDone, Self::Drained];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Queue that signals this family.
    #[must_use]
    pub const fn signaling_queue(self) -> QueueRole {
        match self {
            Self::ComputeDone => QueueRole::Compute,
            Self::Drained => QueueRole::Present,
        }
    }
}

/// A value a queue will signal once its preceding work completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceSignal {
    pub family: FenceFamily,
    pub slot: usize,
    pub value: u64,
}

impl FenceSignal {
    /// The wait that is satisfied by this signal.
    #[must_use]
    pub const fn as_wait(self) -> FenceWait {
        FenceWait {
            family: self.family,
            slot: self.slot,
            value: self.value,
        }
    }
}

/// A value that must be reached before work may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceWait {
    pub family: FenceFamily,
    pub slot: usize,
    pub value: u64,
}

/// Fence values for every slot, plus the queue-side waits not yet attached to a submission.
#[derive(Debug, Clone)]
pub struct Timeline {
    signaled: Vec<[u64; 2]>,
    pending: [Vec<FenceWait>; 2],
}

impl Timeline {
    /// Create counters for `slots` frame slots, all at zero.
    #[must_use]
    pub fn new(slots: usize) -> Self {
        Self {
            signaled: vec![[0; 2]; slots],
            pending: [Vec::new(), Vec::new()],
        }
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.signaled.len()
    }

    /// Reserve the next value for `(family, slot)`.
    ///
    /// The value is strictly greater than every value previously returned for the pair.
    pub fn signal(&mut self, family: FenceFamily, slot: usize) -> Result<FenceSignal> {
        let count = self.signaled.len();
        let values = self
            .signaled
            .get_mut(slot)
            .ok_or(Error::SlotOutOfRange { slot, count })?;
        let last = values[family.index()];
        let value = last.checked_add(1).ok_or(Error::FenceRegression {
            family,
            slot,
            last,
            requested: last,
        })?;
        values[family.index()] = value;
        Ok(FenceSignal {
            family,
            slot,
            value,
        })
    }

    /// Make `queue` wait for `wait` before its next submission.
    ///
    /// Waits on the same counter collapse to the highest value.
    pub fn wait_on_queue(&mut self, queue: QueueRole, wait: FenceWait) -> Result<()> {
        let last = self.last_signaled(wait.family, wait.slot)?;
        if wait.value > last {
            return Err(Error::FenceRegression {
                family: wait.family,
                slot: wait.slot,
                last,
                requested: wait.value,
            });
        }

        let pending = &mut self.pending[queue.index()];
        if let Some(existing) = pending
            .iter_mut()
            .find(|w| w.family == wait.family && w.slot == wait.slot)
        {
            existing.value = existing.value.max(wait.value);
        } else {
            pending.push(wait);
        }
        Ok(())
    }

    /// Take the waits to attach to the next submission on `queue`.
    pub fn take_waits(&mut self, queue: QueueRole) -> Vec<FenceWait> {
        std::mem::take(&mut self.pending[queue.index()])
    }

    /// Waits registered for `queue` that have not been attached yet.
    #[must_use]
    pub fn pending_waits(&self, queue: QueueRole) -> &[FenceWait] {
        &self.pending[queue.index()]
    }

    /// Last value handed out for `(family, slot)`, zero if never signaled.
    pub fn last_signaled(&self, family: FenceFamily, slot: usize) -> Result<u64> {
        self.signaled
            .get(slot)
            .map(|values| values[family.index()])
            .ok_or(Error::SlotOutOfRange {
                slot,
                count: self.signaled.len(),
            })
    }

    /// What the CPU must wait for before reusing `slot`. `None` for a fresh slot.
    pub fn drain_wait(&self, slot: usize) -> Result<Option<FenceWait>> {
        let value = self.last_signaled(FenceFamily::Drained, slot)?;
        Ok((value > 0).then_some(FenceWait {
            family: FenceFamily::Drained,
            slot,
            value,
        }))
    }

    /// Drain waits for every slot that has been used.
    #[must_use]
    pub fn drain_all(&self) -> Vec<FenceWait> {
        self.signaled
            .iter()
            .enumerate()
            .filter(|(_, values)| values[FenceFamily::Drained.index()] > 0)
            .map(|(slot, values)| FenceWait {
                family: FenceFamily::Drained,
                slot,
                value: values[FenceFamily::Drained.index()],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_are_strictly_increasing_per_counter() {
        let mut timeline = Timeline::new(3);
        let mut last = [[0u64; 2]; 3];

        for frame in 0..30 {
            let slot = frame % 3;
            for family in FenceFamily::ALL {
                let signal = timeline.signal(family, slot).unwrap();
                assert!(signal.value > last[slot][family.index()]);
                last[slot][family.index()] = signal.value;
            }
        }
        assert_eq!(timeline.last_signaled(FenceFamily::Drained, 0).unwrap(), 10);
    }

    #[test]
    fn counters_are_independent() {
        let mut timeline = Timeline::new(2);
        timeline.signal(FenceFamily::ComputeDone, 0).unwrap();
        timeline.signal(FenceFamily::ComputeDone, 0).unwrap();

        assert_eq!(timeline.signal(FenceFamily::ComputeDone, 1).unwrap().value, 1);
        assert_eq!(timeline.signal(FenceFamily::Drained, 0).unwrap().value, 1);
    }

    #[test]
    fn rejects_unknown_slot() {
        let mut timeline = Timeline::new(3);
        assert_eq!(
            timeline.signal(FenceFamily::Drained, 3),
            Err(Error::SlotOutOfRange { slot: 3, count: 3 })
        );
    }

    #[test]
    fn queue_waits_collapse_and_drain() {
        let mut timeline = Timeline::new(3);
        let first = timeline.signal(FenceFamily::Drained, 1).unwrap();
        let second = timeline.signal(FenceFamily::Drained, 1).unwrap();

        timeline
            .wait_on_queue(QueueRole::Compute, first.as_wait())
            .unwrap();
        timeline
            .wait_on_queue(QueueRole::Compute, second.as_wait())
            .unwrap();
        assert!(timeline.pending_waits(QueueRole::Present).is_empty());

        let waits = timeline.take_waits(QueueRole::Compute);
        assert_eq!(waits, vec![second.as_wait()]);
        assert!(timeline.take_waits(QueueRole::Compute).is_empty());
    }

    #[test]
    fn cannot_wait_for_unsignaled_value() {
        let mut timeline = Timeline::new(1);
        let wait = FenceWait {
            family: FenceFamily::ComputeDone,
            slot: 0,
            value: 1,
        };
        assert!(timeline.wait_on_queue(QueueRole::Present, wait).is_err());
    }

    #[test]
    fn drain_waits_cover_used_slots() {
        let mut timeline = Timeline::new(3);
        assert_eq!(timeline.drain_wait(0).unwrap(), None);

        timeline.signal(FenceFamily::Drained, 0).unwrap();
        timeline.signal(FenceFamily::Drained, 2).unwrap();
        timeline.signal(FenceFamily::Drained, 2).unwrap();

        let waits = timeline.drain_all();
        assert_eq!(waits.len(), 2);
        assert_eq!(waits[1].slot, 2);
        assert_eq!(waits[1].value, 2);
        assert_eq!(timeline.drain_wait(0).unwrap().map(|w| w.value), Some(1));
    }
}
