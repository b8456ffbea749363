//! The shaded regions of the face and small per-region/per-side containers.

use std::ops::{Index, IndexMut};

use crate::config::StyleParams;

/// One contoured region of the face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Cheeks,
    Jaw,
    Nose,
    Forehead,
}

impl Region {
    /// All regions, in mask channel order.
    pub const ALL: [Self; 4] = [Self::Cheeks, Self::Jaw, Self::Nose, Self::Forehead];

    /// Mask channel this region renders into.
    pub fn channel(self) -> usize {
        match self {
            Self::Cheeks => 0,
            Self::Jaw => 1,
            Self::Nose => 2,
            Self::Forehead => 3,
        }
    }

    /// The user-facing slider for this region, scaled by the master intensity.
    pub fn base_strength(self, style: &StyleParams) -> f32 {
        let slider = match self {
            Self::Cheeks => style.cheek,
            Self::Jaw => style.jaw,
            Self::Nose => style.nose,
            Self::Forehead => style.forehead,
        };
        slider * style.intensity
    }
}

/// Per-region storage indexed by [`Region`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerRegion<T>([T; 4]);

impl<T> PerRegion<T> {
    pub fn from_fn(f: impl FnMut(Region) -> T) -> Self {
        Self(Region::ALL.map(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Region, &T)> {
        Region::ALL.iter().copied().zip(self.0.iter())
    }
}

impl<T> Index<Region> for PerRegion<T> {
    type Output = T;

    fn index(&self, region: Region) -> &T {
        &self.0[region.channel()]
    }
}

impl<T> IndexMut<Region> for PerRegion<T> {
    fn index_mut(&mut self, region: Region) -> &mut T {
        &mut self.0[region.channel()]
    }
}

/// Lateral half of the face, in image space after any mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];

    /// `-1.0` for the left half of the image, `+1.0` for the right.
    pub fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}
