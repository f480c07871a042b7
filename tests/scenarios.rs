//! Controller scenarios driven through the headless integrator.

use kart_server::kart::sim::HeadlessKart;
use kart_server::kart::{
    ControlSignal, DriftMode, KartBody, KartController, KartEvent, KartStatus, KartTuning, Rot, Vec3, ARCADE,
    CLASSIC,
};

const DT: f32 = 1.0 / 60.0;

fn kart_at_rest(tuning: KartTuning) -> HeadlessKart {
    let controller = KartController::new(tuning).unwrap();
    HeadlessKart::new(controller, KartBody::at_rest(Vec3::zeros(), Rot::identity()))
}

fn kart_moving(tuning: KartTuning, speed: f32) -> HeadlessKart {
    let mut kart = kart_at_rest(tuning);
    kart.body.linvel = Vec3::new(0.0, 0.0, speed);
    kart
}

fn throttle() -> ControlSignal {
    ControlSignal { throttle: 1.0, ..ControlSignal::IDLE }
}

fn boost_starts(events: &[KartEvent]) -> usize {
    events.iter().filter(|e| matches!(e, KartEvent::BoostStarted { .. })).count()
}

#[test]
fn full_throttle_approaches_top_speed_without_exceeding_it() {
    let tuning = KartTuning { top_speed: 20.0, acceleration: 30.0, ..CLASSIC };
    let mut kart = kart_at_rest(tuning);

    let mut prev = 0.0;
    for tick in 0..120 {
        kart.tick(&throttle(), DT).unwrap();
        let speed = kart.forward_speed();
        assert!(speed >= prev - 1e-4, "speed dropped at tick {tick}: {prev} -> {speed}");
        assert!(speed <= 20.0 + 1e-4, "speed {speed} above top speed at tick {tick}");
        prev = speed;
    }
    assert!(prev > 15.0);
    assert!(kart.body.linvel.x.abs() < 1e-5);
}

#[test]
fn arcade_profile_also_respects_top_speed() {
    let mut kart = kart_at_rest(ARCADE);
    for _ in 0..600 {
        kart.tick(&throttle(), DT).unwrap();
        assert!(kart.forward_speed() <= ARCADE.top_speed + 1e-4);
    }
}

#[test]
fn idle_kart_at_rest_stays_at_rest() {
    let mut kart = kart_at_rest(CLASSIC);
    for _ in 0..1200 {
        kart.tick(&ControlSignal::IDLE, DT).unwrap();
    }
    assert_eq!(kart.body.linvel, Vec3::zeros());
    assert_eq!(kart.body.position, Vec3::zeros());
    assert_eq!(kart.controller.drift_mode(), DriftMode::Idle);
}

#[test]
fn coasting_slows_the_kart() {
    let mut kart = kart_moving(CLASSIC, 15.0);
    for _ in 0..60 {
        kart.tick(&ControlSignal::IDLE, DT).unwrap();
    }
    assert!(kart.forward_speed() < 15.0);
    assert!(kart.forward_speed() > 0.0);
}

#[test]
fn held_drift_charges_and_release_boosts_once() {
    let mut kart = kart_moving(CLASSIC, 6.0);
    let drift = ControlSignal { steer: 1.0, throttle: 1.0, drift_held: true, use_item: false };

    let out = kart.tick(&drift, DT).unwrap();
    assert!(out.events.iter().any(|e| matches!(e, KartEvent::DriftStarted { .. })));

    let ticks = (CLASSIC.drift_required_duration / DT).round() as usize;
    let mut boosts = 0;
    for _ in 0..ticks {
        let out = kart.tick(&drift, DT).unwrap();
        boosts += boost_starts(&out.events);
        assert_eq!(kart.controller.status(), KartStatus::Drifting);
    }
    assert_eq!(boosts, 0);
    assert_eq!(kart.controller.drift_charge(), 1.0);

    let release = ControlSignal { drift_held: false, ..drift };
    let out = kart.tick(&release, DT).unwrap();
    assert_eq!(boost_starts(&out.events), 1);
    assert_eq!(kart.controller.drift_charge(), 0.0);

    let mut later = 0;
    for _ in 0..120 {
        later += boost_starts(&kart.tick(&release, DT).unwrap().events);
    }
    assert_eq!(later, 0);
}

#[test]
fn drift_turns_tighter_than_plain_steering() {
    let steer = ControlSignal { steer: 1.0, throttle: 1.0, drift_held: false, use_item: false };
    let drift = ControlSignal { drift_held: true, ..steer };

    let mut plain = kart_moving(CLASSIC, 12.0);
    let mut drifting = kart_moving(CLASSIC, 12.0);
    // half a second keeps both headings below 180 degrees
    for _ in 0..30 {
        plain.tick(&steer, DT).unwrap();
        drifting.tick(&drift, DT).unwrap();
    }
    assert!(drifting.controller.drift().is_drifting());
    let yaw = |k: &HeadlessKart| k.body.rotation.angle();
    assert!(yaw(&drifting) > yaw(&plain));
}

#[test]
fn boost_pushes_past_top_speed_then_ends() {
    let mut kart = kart_moving(CLASSIC, 20.0);
    kart.controller.request_boost();

    let mut peak: f32 = 0.0;
    let mut ended = false;
    for _ in 0..200 {
        let out = kart.tick(&throttle(), DT).unwrap();
        peak = peak.max(kart.forward_speed());
        ended |= out.events.contains(&KartEvent::BoostEnded);
    }
    assert!(peak > CLASSIC.top_speed);
    assert!(ended);
    assert_eq!(kart.controller.status(), KartStatus::Idle);
}

#[test]
fn spinout_halves_speed_and_returns_control() {
    let mut kart = kart_moving(CLASSIC, 16.0);
    assert!(kart.controller.trigger_spinout());
    kart.tick(&throttle(), DT).unwrap();
    assert!(kart.forward_speed() < 8.5);

    let ticks = (CLASSIC.spinout_duration / DT).ceil() as usize + 1;
    for _ in 0..ticks {
        kart.tick(&throttle(), DT).unwrap();
    }
    assert!(!kart.controller.is_spinning_out());
    assert_eq!(kart.controller.status(), KartStatus::Idle);
}

#[test]
fn nan_velocity_is_rejected_every_tick() {
    let mut kart = kart_moving(CLASSIC, 5.0);
    kart.body.linvel.z = f32::NAN;
    for _ in 0..3 {
        assert!(kart.tick(&throttle(), DT).is_err());
    }
}
