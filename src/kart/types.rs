//! Core shared types for `kart` (engine-agnostic).
// kart/types.rs
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::KartError;

pub type Vec3 = Vector3<f32>;
pub type Rot = UnitQuaternion<f32>;

/// Throttle magnitudes at or below this count as "off pedal".
pub const THROTTLE_DEADZONE: f32 = 1e-3;

// Kart-local basis: +Z forward, +X right, +Y up.
#[inline] pub fn forward_of(rot: &Rot) -> Vec3 { rot * Vec3::z() }
#[inline] pub fn right_of(rot: &Rot) -> Vec3 { rot * Vec3::x() }
#[inline] pub fn up_of(rot: &Rot) -> Vec3 { rot * Vec3::y() }

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    if (b - a).abs() < f32::EPSILON {
        return 0.0;
    }
    ((v - a) / (b - a)).clamp(0.0, 1.0)
}

// ============================================
// ----- per-tick inputs ----------------------
// ============================================

/// Canonical player intent for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlSignal {
    pub steer: f32,       // -1 (full left) .. 1 (full right)
    pub throttle: f32,    // -1 (full reverse) .. 1 (full forward)
    pub drift_held: bool,
    pub use_item: bool,   // edge: true for exactly one tick per press
}

impl ControlSignal {
    pub const IDLE: ControlSignal = ControlSignal {
        steer: 0.0,
        throttle: 0.0,
        drift_held: false,
        use_item: false,
    };

    pub fn is_forward(&self) -> bool {
        self.throttle > 0.0
    }

    pub fn is_coasting(&self) -> bool {
        self.throttle.abs() <= THROTTLE_DEADZONE
    }
}

/// Ground contact for one tick; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactState {
    pub grounded: bool,
    pub effective_drag: f32, // >= 0, fed to the body's linear damping
}

impl ContactState {
    pub fn airborne(drag: f32) -> Self {
        Self { grounded: false, effective_drag: drag }
    }
}

// ============================================
// ----- drift / status -----------------------
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftMode {
    #[default]
    Idle,
    Drifting,
}

/// Side of a drift, latched from the steer sign on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDirection {
    Left,
    Right,
}

impl DriftDirection {
    pub fn from_steer(steer: f32) -> Self {
        if steer < 0.0 { DriftDirection::Left } else { DriftDirection::Right }
    }

    pub fn sign(self) -> f32 {
        match self {
            DriftDirection::Left => -1.0,
            DriftDirection::Right => 1.0,
        }
    }
}

/// What a HUD shows. Drifting wins over Boosting when both hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KartStatus {
    Idle,
    Drifting,
    Boosting,
    SpinningOut,
}

// ============================================
// ----- body state + physics requests --------
// ============================================

/// Read-only snapshot of the rigid body the host physics engine owns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KartBody {
    pub position: Vec3,
    pub rotation: Rot,
    pub linvel: Vec3,
    pub angvel: Vec3,
}

impl KartBody {
    pub fn at_rest(position: Vec3, rotation: Rot) -> Self {
        Self {
            position,
            rotation,
            linvel: Vec3::zeros(),
            angvel: Vec3::zeros(),
        }
    }

    pub fn forward_speed(&self) -> f32 {
        self.linvel.dot(&forward_of(&self.rotation))
    }

    /// Rejects NaN/inf anywhere in the pose or velocities.
    pub fn check_finite(&self) -> Result<(), KartError> {
        let v3 = |v: &Vec3| [v.x, v.y, v.z, 0.0];
        let q = self.rotation.quaternion();
        let checks = [
            ("position", v3(&self.position)),
            ("linear velocity", v3(&self.linvel)),
            ("angular velocity", v3(&self.angvel)),
            ("rotation", [q.i, q.j, q.k, q.w]),
        ];
        for (quantity, value) in checks {
            if value.iter().any(|c| !c.is_finite()) {
                return Err(KartError::NonFinite { quantity, value });
            }
        }
        Ok(())
    }
}

/// How the integrator should interpret a force vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceMode {
    /// Mass-independent (m/s^2). All kart tuning assumes this mode.
    Acceleration,
    /// Newtons.
    Force,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceRequest {
    pub vector: Vec3, // world space
    pub mode: ForceMode,
}

impl ForceRequest {
    pub fn acceleration(vector: Vec3) -> Self {
        Self { vector, mode: ForceMode::Acceleration }
    }

    /// World-space force in newtons for a body of `mass`.
    pub fn as_force(&self, mass: f32) -> Vec3 {
        match self.mode {
            ForceMode::Acceleration => self.vector * mass,
            ForceMode::Force => self.vector,
        }
    }

    /// World-space acceleration for a body of `mass`.
    pub fn as_acceleration(&self, mass: f32) -> Vec3 {
        match self.mode {
            ForceMode::Acceleration => self.vector,
            ForceMode::Force => self.vector / mass.max(1e-6),
        }
    }
}
