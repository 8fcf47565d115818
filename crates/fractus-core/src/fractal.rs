//! Fractal families, kernel variants and render modes.

use serde::{Deserialize, Serialize};

/// Fractal family rendered by the kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractalFamily {
    #[default]
    Mandelbrot,
    Tricorn,
    BurningShip,
}

impl FractalFamily {
    /// All families, in selector order (keys 1, 2, 3).
    pub const ALL: [Self; 3] = [Self::Mandelbrot, Self::Tricorn, Self::BurningShip];

    /// Family for a zero-based selector index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Zero-based selector index.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Kernel file stem shared by both variants.
    #[must_use]
    pub const fn stem(self) -> &'static str {
        match self {
            Self::Mandelbrot => "mandelbrot",
            Self::Tricorn => "tricorn",
            Self::BurningShip => "burningship",
        }
    }
}

/// Kernel variant within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelVariant {
    /// Julia-style detail view. Writes one image, reads one parameter buffer.
    Detail,
    /// Full view. Additionally samples the detail output as the minimap.
    Base,
}

/// Identifies one of the six compute kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId {
    pub family: FractalFamily,
    pub variant: KernelVariant,
}

impl KernelId {
    /// Number of distinct kernels.
    pub const COUNT: usize = FractalFamily::ALL.len() * 2;

    #[must_use]
    pub const fn new(family: FractalFamily, variant: KernelVariant) -> Self {
        Self { family, variant }
    }

    /// Every kernel, ordered by [`KernelId::index`].
    #[must_use]
    pub fn all() -> [Self; Self::COUNT] {
        let mut kernels = [Self::new(FractalFamily::Mandelbrot, KernelVariant::Detail); Self::COUNT];
        for family in FractalFamily::ALL {
            for variant in [KernelVariant::Detail, KernelVariant::Base] {
                let id = Self::new(family, variant);
                kernels[id.index()] = id;
            }
        }
        kernels
    }

    /// Dense index into per-kernel tables.
    #[must_use]
    pub const fn index(self) -> usize {
        let variant = match self.variant {
            KernelVariant::Detail => 0,
            KernelVariant::Base => 1,
        };
        self.family.index() * 2 + variant
    }

    /// Bytecode file name, e.g. `mandelbrot_julia.spv`.
    #[must_use]
    pub fn file_name(self) -> String {
        match self.variant {
            KernelVariant::Detail => format!("{}_julia.spv", self.family.stem()),
            KernelVariant::Base => format!("{}.spv", self.family.stem()),
        }
    }
}

/// Which views are produced each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Base view into Main with the detail view as a minimap.
    #[default]
    Base,
    /// Detail view only, rendered straight into Main.
    DetailOnly,
}

impl RenderMode {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Base => Self::DetailOnly,
            Self::DetailOnly => Self::Base,
        }
    }

    /// Whether this mode renders the minimap.
    #[must_use]
    pub const fn uses_minimap(self) -> bool {
        matches!(self, Self::Base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_indices_are_dense() {
        let all = KernelId::all();
        for (i, kernel) in all.iter().enumerate() {
            assert_eq!(kernel.index(), i);
        }
    }

    #[test]
    fn kernel_file_names() {
        let detail = KernelId::new(FractalFamily::BurningShip, KernelVariant::Detail);
        let base = KernelId::new(FractalFamily::Tricorn, KernelVariant::Base);
        assert_eq!(detail.file_name(), "burningship_julia.spv");
        assert_eq!(base.file_name(), "tricorn.spv");
    }

    #[test]
    fn family_selector() {
        assert_eq!(FractalFamily::from_index(0), Some(FractalFamily::Mandelbrot));
        assert_eq!(FractalFamily::from_index(2), Some(FractalFamily::BurningShip));
        assert_eq!(FractalFamily::from_index(3), None);
    }

    #[test]
    fn mode_toggle_round_trips() {
        assert_eq!(RenderMode::Base.toggled(), RenderMode::DetailOnly);
        assert_eq!(RenderMode::Base.toggled().toggled(), RenderMode::Base);
        assert!(!RenderMode::DetailOnly.uses_minimap());
    }
}
