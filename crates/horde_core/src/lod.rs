//! Level-of-detail bands for the steering pass.
//!
//! Agents close to the target get full behavior every tick. Farther agents
//! drift on their last velocity and only re-steer on ticks selected by
//! `(tick + index) & mask == 0`, which spreads the recompute cost evenly
//! across agents without any randomness.

use serde::{Deserialize, Serialize};

use crate::config::SteeringConfig;

/// Distance band of an agent relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LodBand {
    /// Full separation, flow blending and collision.
    Near,
    /// Seek-only recompute on masked ticks, straight drift otherwise.
    Far,
    /// As [`LodBand::Far`] with a sparser mask.
    VeryFar,
}

impl LodBand {
    /// Classify by squared distance to the target.
    #[must_use]
    pub fn classify(dist_sq: f32, config: &SteeringConfig) -> Self {
        let near = config.sep_active_radius;
        let very_far = config.very_far_radius();
        if dist_sq <= near * near {
            Self::Near
        } else if dist_sq <= very_far * very_far {
            Self::Far
        } else {
            Self::VeryFar
        }
    }

    /// Stagger mask for this band. Near agents recompute every tick.
    #[must_use]
    pub const fn recompute_mask(self, config: &SteeringConfig) -> u64 {
        match self {
            Self::Near => 0,
            Self::Far => config.far_recompute_mask,
            Self::VeryFar => config.very_far_recompute_mask,
        }
    }

    /// True if agent `index` re-steers on `tick`.
    #[must_use]
    pub const fn should_recompute(self, tick: u64, index: usize, config: &SteeringConfig) -> bool {
        stagger(tick, index, self.recompute_mask(config))
    }
}

/// `(tick + index) & mask == 0`.
#[inline]
#[must_use]
pub const fn stagger(tick: u64, index: usize, mask: u64) -> bool {
    tick.wrapping_add(index as u64) & mask == 0
}
