use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::kart::{Rot, Vec3};

// ---------------------------------------------
// SPAWN POSE (GRID SLOT / RESPAWN POINT)
// ---------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPose {
    pub position: Vec3,
    pub yaw: f32, // radians about +Y, 0 faces +Z
}

impl SpawnPose {
    pub fn rotation(&self) -> Rot {
        Rot::from_axis_angle(&Vec3::y_axis(), self.yaw)
    }
}

// ---------------------------------------------
// START GRID
// ---------------------------------------------
// Two columns, staggered, everyone facing +Z. Slots are handed out lowest
// first and returned on disconnect, so a rejoining player fills the gap.
#[derive(Debug, Clone)]
pub struct SpawnGrid {
    pub origin: Vec3,
    pub column_spacing: f32, // meters between the two columns
    pub row_spacing: f32,    // meters between rows
    pub stagger: f32,        // right column sits this far behind the left
    occupied: HashMap<String, usize>, // kart id -> slot
}

impl Default for SpawnGrid {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.5, 0.0), 4.0, 6.0, 2.0)
    }
}

impl SpawnGrid {
    pub fn new(origin: Vec3, column_spacing: f32, row_spacing: f32, stagger: f32) -> Self {
        Self {
            origin,
            column_spacing,
            row_spacing,
            stagger,
            occupied: HashMap::new(),
        }
    }

    // ---------------------------------------------------------
    // Slot -> pose
    // ---------------------------------------------------------
    pub fn pose_for(&self, slot: usize) -> SpawnPose {
        let row = (slot / 2) as f32;
        let (x, behind) = if slot % 2 == 0 {
            (-self.column_spacing * 0.5, 0.0)
        } else {
            (self.column_spacing * 0.5, self.stagger)
        };
        SpawnPose {
            position: self.origin + Vec3::new(x, 0.0, -(row * self.row_spacing + behind)),
            yaw: 0.0,
        }
    }

    // ---------------------------------------------------------
    // Full allocation pipeline called from net.rs
    // ---------------------------------------------------------
    pub fn allocate(&mut self, kart_id: &str) -> (usize, SpawnPose) {
        if let Some(&slot) = self.occupied.get(kart_id) {
            return (slot, self.pose_for(slot));
        }
        let slot = (0..)
            .find(|s| !self.occupied.values().any(|taken| taken == s))
            .unwrap_or(self.occupied.len());
        self.occupied.insert(kart_id.to_string(), slot);
        (slot, self.pose_for(slot))
    }

    pub fn release(&mut self, kart_id: &str) -> Option<usize> {
        self.occupied.remove(kart_id)
    }

    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_fill_lowest_first_and_are_reused() {
        let mut grid = SpawnGrid::default();
        assert_eq!(grid.allocate("a").0, 0);
        assert_eq!(grid.allocate("b").0, 1);
        assert_eq!(grid.allocate("c").0, 2);
        assert_eq!(grid.allocate("b").0, 1);

        assert_eq!(grid.release("b"), Some(1));
        assert_eq!(grid.allocate("d").0, 1);
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn columns_alternate_and_rows_step_back() {
        let grid = SpawnGrid::default();
        let p0 = grid.pose_for(0).position;
        let p1 = grid.pose_for(1).position;
        let p2 = grid.pose_for(2).position;
        assert!(p0.x < 0.0 && p1.x > 0.0);
        assert!(p1.z < p0.z);
        assert_eq!(p2.x, p0.x);
        assert_eq!(p2.z, p0.z - grid.row_spacing);
    }
}
