//! Minimap residency.
//!
//! Minimap memory is only needed in base mode. Mode toggles are recorded in
//! the view immediately but residency is reconciled once per frame, so a
//! double toggle between two frames never touches the GPU.

use crate::fractal::RenderMode;

/// Whether a render target has backing memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Residency {
    Resident,
    Evicted,
}

impl Residency {
    /// Residency the minimap needs in `mode`.
    #[must_use]
    pub const fn for_mode(mode: RenderMode) -> Self {
        if mode.uses_minimap() {
            Self::Resident
        } else {
            Self::Evicted
        }
    }
}

/// Work needed to bring the minimap to the wanted residency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidencyChange {
    Evict,
    MakeResident,
}

/// Tracks the minimap's current residency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimapResidency {
    current: Residency,
    changes: u64,
}

impl MinimapResidency {
    /// Start in the residency `mode` needs.
    #[must_use]
    pub const fn new(mode: RenderMode) -> Self {
        Self {
            current: Residency::for_mode(mode),
            changes: 0,
        }
    }

    #[must_use]
    pub const fn current(&self) -> Residency {
        self.current
    }

    /// Number of residency changes applied so far.
    #[must_use]
    pub const fn changes(&self) -> u64 {
        self.changes
    }

    /// Change needed before rendering a frame in `mode`, if any.
    #[must_use]
    pub fn pending(&self, mode: RenderMode) -> Option<ResidencyChange> {
        match (self.current, Residency::for_mode(mode)) {
            (Residency::Resident, Residency::Evicted) => Some(ResidencyChange::Evict),
            (Residency::Evicted, Residency::Resident) => Some(ResidencyChange::MakeResident),
            _ => None,
        }
    }

    /// Record that `change` was carried out.
    pub fn commit(&mut self, change: ResidencyChange) {
        self.current = match change {
            ResidencyChange::Evict => Residency::Evicted,
            ResidencyChange::MakeResident => Residency::Resident,
        };
        self.changes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_toggle_needs_no_change() {
        let residency = MinimapResidency::new(RenderMode::Base);
        let mode = RenderMode::Base.toggled().toggled();
        assert_eq!(residency.pending(mode), None);
        assert_eq!(residency.changes(), 0);
    }

    #[test]
    fn evict_and_restore() {
        let mut residency = MinimapResidency::new(RenderMode::Base);

        let change = residency.pending(RenderMode::DetailOnly);
        assert_eq!(change, Some(ResidencyChange::Evict));
        residency.commit(ResidencyChange::Evict);
        assert_eq!(residency.current(), Residency::Evicted);
        assert_eq!(residency.pending(RenderMode::DetailOnly), None);

        assert_eq!(
            residency.pending(RenderMode::Base),
            Some(ResidencyChange::MakeResident)
        );
        residency.commit(ResidencyChange::MakeResident);
        assert_eq!(residency.current(), Residency::Resident);
        assert_eq!(residency.changes(), 2);
    }

    #[test]
    fn starts_evicted_in_detail_mode() {
        let residency = MinimapResidency::new(RenderMode::DetailOnly);
        assert_eq!(residency.current(), Residency::Evicted);
    }
}
