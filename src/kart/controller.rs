// ==============================================================================
// controller.rs — KART DYNAMICS CONTROLLER (ONE CALL PER PHYSICS TICK)
// ==============================================================================
// step(body, control, contact, dt) -> StepOutput
//
//   0) reject bad dt / non-finite body
//   1) spinout: constant yaw spin, no throttle or steering; boost keeps running
//   2) drift state machine (may request a boost through request_boost)
//   3) longitudinal: throttle with falloff + headroom clamp, reverse, engine brake
//   4) steering: smoothed steer -> yaw increment (pose correction, not torque)
//   5) lateral grip, drift slide force, downforce, angular damping (grounded)
//   6) hop + boost forces
//
// The controller never touches the integrator. Everything it wants done to the
// body goes out as requests in StepOutput, all forces in acceleration mode.
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::error::KartError;

use super::boost::{BoostImpulse, Spinout};
use super::drift::{DriftInputs, DriftStateMachine, DriftTransition};
use super::events::KartEvent;
use super::powerup::BoostTarget;
use super::steering::SteeringFilter;
use super::tuning::KartTuning;
use super::types::{
    forward_of, inverse_lerp, lerp, right_of, up_of, ContactState, ControlSignal, DriftMode, ForceRequest,
    KartBody, KartStatus, Rot, Vec3,
};

/// Grip and angular retain values are specified per tick at this rate.
pub const REFERENCE_RATE: f32 = 60.0;

/// Requests for the host integrator, produced by one `step`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub forces: Vec<ForceRequest>,
    /// Local yaw increment; the host applies `rotation * rotation_delta`.
    pub rotation_delta: Rot,
    /// Replaces the linear velocity before forces are integrated.
    pub velocity: Option<Vec3>,
    pub angular_velocity: Option<Vec3>,
    pub linear_damping: f32,
    pub events: Vec<KartEvent>,
}

impl StepOutput {
    fn new(linear_damping: f32) -> Self {
        Self {
            forces: Vec::new(),
            rotation_delta: Rot::identity(),
            velocity: None,
            angular_velocity: None,
            linear_damping,
            events: Vec::new(),
        }
    }

    fn push(&mut self, vector: Vec3) {
        if vector != Vec3::zeros() {
            self.forces.push(ForceRequest::acceleration(vector));
        }
    }

    /// Sum of all requested accelerations (every request is acceleration mode).
    pub fn total_acceleration(&self) -> Vec3 {
        self.forces.iter().fold(Vec3::zeros(), |acc, f| acc + f.as_acceleration(1.0))
    }
}

/// Spinout countdown plus whether the entry slowdown is still owed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ActiveSpinout {
    spin: Spinout,
    entry_pending: bool,
}

/// Restoring a snapshot goes through `SavedController`, so tuning is
/// validated on that path exactly as in `new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SavedController")]
pub struct KartController {
    tuning: KartTuning,
    steering: SteeringFilter,
    drift: DriftStateMachine,
    boost: Option<BoostImpulse>,
    spinout: Option<ActiveSpinout>,
    last_charge: f32,
    #[serde(skip)]
    events: Vec<KartEvent>,
}

#[derive(Deserialize)]
struct SavedController {
    tuning: KartTuning,
    steering: SteeringFilter,
    drift: DriftStateMachine,
    boost: Option<BoostImpulse>,
    spinout: Option<ActiveSpinout>,
    last_charge: f32,
}

impl TryFrom<SavedController> for KartController {
    type Error = KartError;

    fn try_from(saved: SavedController) -> Result<Self, KartError> {
        saved.tuning.validate()?;
        Ok(Self {
            tuning: saved.tuning,
            steering: saved.steering,
            drift: saved.drift,
            boost: saved.boost,
            spinout: saved.spinout,
            last_charge: saved.last_charge,
            events: Vec::new(),
        })
    }
}

impl KartController {
    pub fn new(tuning: KartTuning) -> Result<Self, KartError> {
        tuning.validate()?;
        Ok(Self {
            tuning,
            steering: SteeringFilter::new(tuning.steer_response),
            drift: DriftStateMachine::new(),
            boost: None,
            spinout: None,
            last_charge: 0.0,
            events: Vec::new(),
        })
    }

    pub fn step(
        &mut self,
        body: &KartBody,
        control: &ControlSignal,
        contact: &ContactState,
        dt: f32,
    ) -> Result<StepOutput, KartError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(KartError::InvalidTimestep(dt));
        }
        body.check_finite()?;

        let t = self.tuning;
        let forward = forward_of(&body.rotation);
        let mut out = StepOutput::new(contact.effective_drag);

        // --------------------------------------------------------------
        // 1) Spinout overrides driver control
        // --------------------------------------------------------------
        if let Some(active) = self.spinout.as_mut() {
            if active.entry_pending {
                out.velocity = Some(body.linvel * t.spinout_velocity_retain);
                active.entry_pending = false;
            }
            let yaw = active.spin.tick(dt);
            out.rotation_delta = Rot::from_axis_angle(&Vec3::y_axis(), yaw);
            if active.spin.is_over() {
                self.spinout = None;
                self.events.push(KartEvent::SpinoutEnded);
            }
            self.apply_boost(forward, dt, &mut out);
            out.events = std::mem::take(&mut self.events);
            return Ok(out);
        }

        let right = right_of(&body.rotation);
        let up = up_of(&body.rotation);
        let forward_speed = body.linvel.dot(&forward);

        // --------------------------------------------------------------
        // 2) Drift
        // --------------------------------------------------------------
        let inputs = DriftInputs {
            grounded: contact.grounded,
            drift_held: control.drift_held,
            steer: control.steer,
            throttle: control.throttle,
            forward_speed,
        };
        match self.drift.update(&t, &inputs, dt) {
            DriftTransition::Entered(direction) => {
                self.events.push(KartEvent::DriftStarted { direction });
            }
            DriftTransition::Exited { charge, boost } => {
                self.events.push(KartEvent::DriftEnded { charge, boosted: boost });
                if boost {
                    self.request_boost();
                }
            }
            DriftTransition::None => {}
        }
        self.publish_charge();
        let drifting = self.drift.is_drifting();

        // --------------------------------------------------------------
        // 3) Longitudinal
        // --------------------------------------------------------------
        let accel = if control.is_coasting() {
            if contact.grounded {
                let drag = t.engine_brake_drag * if drifting { t.drift_drag_factor } else { 1.0 };
                // exact decay over dt: never crosses zero, whatever drag * dt is
                -forward_speed * (1.0 - (-drag * dt).exp()) / dt
            } else {
                0.0
            }
        } else if control.throttle > 0.0 {
            if forward_speed < t.top_speed {
                let nominal = control.throttle * t.acceleration * t.accel_gain(forward_speed);
                nominal.min((t.top_speed - forward_speed) / dt)
            } else {
                0.0
            }
        } else if -forward_speed < t.reverse_cap {
            let nominal = control.throttle * t.acceleration;
            nominal.max(-(t.reverse_cap + forward_speed) / dt)
        } else {
            0.0
        };
        out.push(forward * accel);

        // --------------------------------------------------------------
        // 4) Steering
        // --------------------------------------------------------------
        let target = match self.drift.direction() {
            Some(direction) => lerp(direction.sign(), control.steer, t.drift_control_factor),
            None => control.steer,
        };
        let smoothed = self.steering.update(target, dt);
        let speed_factor = inverse_lerp(0.0, t.top_speed, body.linvel.norm()).max(t.turn_floor_factor);
        let multiplier = if drifting { t.drift_turn_multiplier } else { 1.0 };
        let yaw_deg = smoothed * t.turn_rate_base * speed_factor * multiplier * dt;
        out.rotation_delta = Rot::from_axis_angle(&Vec3::y_axis(), yaw_deg.to_radians());

        // --------------------------------------------------------------
        // 5) Grip + stability (ground only)
        // --------------------------------------------------------------
        if contact.grounded {
            let ticks = dt * REFERENCE_RATE;
            let per_tick = if drifting {
                t.drift_grip_retain
            } else {
                (t.grounded_grip_retain + smoothed.abs() * t.steer_slip).min(1.0)
            };
            let lateral = body.linvel.dot(&right);
            let retain = per_tick.powf(ticks);
            out.velocity = Some(body.linvel - right * (lateral * (1.0 - retain)));

            if let Some(direction) = self.drift.direction() {
                out.push(right * (direction.sign() * t.drift_slip_accel));
            }
            out.push(-up * t.downforce);
            out.angular_velocity = Some(body.angvel * t.angular_retain.powf(ticks));
        }

        // --------------------------------------------------------------
        // 6) Timed impulses
        // --------------------------------------------------------------
        let hop = self.drift.tick_hop(dt);
        out.push(Vec3::y() * hop);
        self.apply_boost(forward, dt, &mut out);

        out.events = std::mem::take(&mut self.events);
        Ok(out)
    }

    fn apply_boost(&mut self, forward: Vec3, dt: f32, out: &mut StepOutput) {
        let Some(boost) = self.boost.as_mut() else { return };
        let accel = boost.tick(dt);
        out.push(forward * accel);
        if boost.is_expired() {
            self.boost = None;
            self.events.push(KartEvent::BoostEnded);
        }
    }

    fn publish_charge(&mut self) {
        let charge = self.drift.charge(&self.tuning);
        if charge != self.last_charge {
            self.last_charge = charge;
            self.events.push(KartEvent::DriftChargeChanged { charge });
        }
    }

    /// Starts the boost, or restarts it at full duration if one is running.
    /// Drift charge and item use both land here.
    pub fn request_boost(&mut self) {
        let restarted = self.boost.is_some();
        let duration = self.tuning.boost_duration;
        self.boost = Some(BoostImpulse::new(duration, self.tuning.boost_acceleration()));
        self.events.push(KartEvent::BoostStarted { duration, restarted });
    }

    /// Starts a spinout. Cancels any drift without a boost; a running boost
    /// completes. Returns false if already spinning.
    pub fn trigger_spinout(&mut self) -> bool {
        if self.spinout.is_some() {
            return false;
        }
        if let Some(charge) = self.drift.cancel(&self.tuning) {
            self.events.push(KartEvent::DriftEnded { charge, boosted: false });
            self.publish_charge();
        }
        self.steering.reset();
        self.spinout = Some(ActiveSpinout {
            spin: Spinout::new(self.tuning.spinout_duration, self.tuning.spinout_rate),
            entry_pending: true,
        });
        self.events.push(KartEvent::SpinoutStarted {
            duration: self.tuning.spinout_duration,
        });
        true
    }

    /// Clears drift, boost, hop, spinout and steering. Pending events are dropped.
    pub fn reset(&mut self) {
        self.steering.reset();
        self.drift = DriftStateMachine::new();
        self.boost = None;
        self.spinout = None;
        self.last_charge = 0.0;
        self.events.clear();
    }

    /// Queues an event raised outside `step` so it leaves with the next output.
    pub fn notify(&mut self, event: KartEvent) {
        self.events.push(event);
    }

    pub fn status(&self) -> KartStatus {
        if self.spinout.is_some() {
            KartStatus::SpinningOut
        } else if self.drift.is_drifting() {
            KartStatus::Drifting
        } else if self.boost.is_some() {
            KartStatus::Boosting
        } else {
            KartStatus::Idle
        }
    }

    pub fn tuning(&self) -> &KartTuning {
        &self.tuning
    }

    pub fn drift_mode(&self) -> DriftMode {
        self.drift.mode()
    }

    pub fn drift(&self) -> &DriftStateMachine {
        &self.drift
    }

    pub fn drift_charge(&self) -> f32 {
        self.drift.charge(&self.tuning)
    }

    pub fn boost(&self) -> Option<&BoostImpulse> {
        self.boost.as_ref()
    }

    pub fn is_spinning_out(&self) -> bool {
        self.spinout.is_some()
    }

    pub fn smoothed_steer(&self) -> f32 {
        self.steering.value()
    }
}

impl BoostTarget for KartController {
    fn request_boost(&mut self) {
        KartController::request_boost(self);
    }
}
