//! Ground contact probe.
//!
//! A single ray is cast straight down from a fixed height above the kart's
//! reference point. No hit is the airborne case, never an error. The geometry
//! behind the ray (and any layer filtering) belongs to the `GroundQuery`
//! implementation.

use super::tuning::KartTuning;
use super::types::{ContactState, Vec3};

pub trait GroundQuery {
    /// Distance along world -Y from `origin` to the first surface, if within `max_distance`.
    fn cast_down(&self, origin: Vec3, max_distance: f32) -> Option<f32>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundProbe {
    pub height: f32,
    pub distance: f32,
    pub grounded_drag: f32,
    pub grounded_drag_multiplier: f32,
    pub airborne_drag: f32,
}

impl GroundProbe {
    pub fn from_tuning(tuning: &KartTuning) -> Self {
        Self {
            height: tuning.probe_height,
            distance: tuning.probe_distance,
            grounded_drag: tuning.grounded_drag,
            grounded_drag_multiplier: tuning.grounded_drag_multiplier,
            airborne_drag: tuning.airborne_drag,
        }
    }

    pub fn origin(&self, position: Vec3) -> Vec3 {
        position + Vec3::y() * self.height
    }

    /// Contact on a hit, None when nothing is below within range.
    pub fn hit<Q: GroundQuery + ?Sized>(&self, query: &Q, position: Vec3) -> Option<ContactState> {
        query.cast_down(self.origin(position), self.distance)?;
        Some(ContactState {
            grounded: true,
            effective_drag: self.grounded_drag * self.grounded_drag_multiplier,
        })
    }

    pub fn probe<Q: GroundQuery + ?Sized>(&self, query: &Q, position: Vec3) -> ContactState {
        self.hit(query, position)
            .unwrap_or(ContactState::airborne(self.airborne_drag))
    }
}

/// Infinite horizontal plane, for headless runs and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatGround {
    pub height: f32,
}

impl GroundQuery for FlatGround {
    fn cast_down(&self, origin: Vec3, max_distance: f32) -> Option<f32> {
        let gap = origin.y - self.height;
        (gap >= 0.0 && gap <= max_distance).then_some(gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kart::tuning::CLASSIC;

    #[test]
    fn grounded_within_probe_range() {
        let probe = GroundProbe::from_tuning(&CLASSIC);
        let ground = FlatGround { height: 0.0 };

        let contact = probe.probe(&ground, Vec3::new(3.0, 0.1, -2.0));
        assert!(contact.grounded);
        assert_eq!(contact.effective_drag, CLASSIC.grounded_drag * CLASSIC.grounded_drag_multiplier);

        // ray origin 0.2 above, length 0.6 -> up to 0.4 above the surface
        assert!(probe.probe(&ground, Vec3::new(0.0, 0.39, 0.0)).grounded);
        assert!(!probe.probe(&ground, Vec3::new(0.0, 0.41, 0.0)).grounded);
    }

    #[test]
    fn miss_is_airborne_not_error() {
        let probe = GroundProbe::from_tuning(&CLASSIC);
        let ground = FlatGround { height: 0.0 };
        assert_eq!(probe.hit(&ground, Vec3::new(0.0, 5.0, 0.0)), None);

        let contact = probe.probe(&ground, Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(contact, ContactState::airborne(CLASSIC.airborne_drag));
    }
}
