// ==============================================================================
// drivetrain.rs — DRIVETRAIN INTEGRATOR (THROTTLE + BRAKE + COAST-DOWN)
// ==============================================================================
// Responsibilities:
// - go_forward / go_reverse: ramp the signed throttle axis at 3.0/s and convert
//   it to motor torque on all four wheels, subject to the speed caps
// - brake-before-reverse: torque against the current travel direction is never
//   applied through the drivetrain; full brake force is applied until the
//   forward velocity crosses the +-1 m/s threshold
// - throttle_off: zero motor torque (baseline when no drive intent is active)
// - decelerate: the periodic coast-down law (0.1 s cadence, driven by the
//   controller): exponential velocity decay + throttle relaxation, terminating
//   with a hard stop below 0.25 m/s
//
// The speed caps compare round(speed) to the cap on purpose. Torque removal
// still lets the car coast a little above the cap under external forces; the
// cap is an approximation, not a hard clamp.
// ==============================================================================

use crate::arcade_drive::types::{CarConfig, VelocityCommand, WheelState};

const THROTTLE_RAMP: f32 = 3.0; // axis units per second, not configurable
const TORQUE_PER_MULTIPLIER: f32 = 50.0;

pub(crate) fn go_forward(
    cfg: &CarConfig,
    throttle_axis: &mut f32,
    wheels: &mut [WheelState; 4],
    car_speed: f32,
    local_velocity_z: f32,
    dt: f32,
) {
    *throttle_axis += dt * THROTTLE_RAMP;
    if *throttle_axis > 1.0 {
        *throttle_axis = 1.0;
    }
    // Still rolling backwards: brake to zero first instead of reversing
    // the drivetrain instantaneously.
    if local_velocity_z < -1.0 {
        brakes(cfg, wheels);
    } else if car_speed.round() < cfg.max_speed {
        for w in wheels.iter_mut() {
            w.brake_torque = 0.0;
            w.motor_torque = cfg.acceleration_multiplier * TORQUE_PER_MULTIPLIER * *throttle_axis;
        }
    } else {
        for w in wheels.iter_mut() {
            w.motor_torque = 0.0;
        }
    }
}

pub(crate) fn go_reverse(
    cfg: &CarConfig,
    throttle_axis: &mut f32,
    wheels: &mut [WheelState; 4],
    car_speed: f32,
    local_velocity_z: f32,
    dt: f32,
) {
    *throttle_axis -= dt * THROTTLE_RAMP;
    if *throttle_axis < -1.0 {
        *throttle_axis = -1.0;
    }
    // Still rolling forwards: brake to zero first.
    if local_velocity_z > 1.0 {
        brakes(cfg, wheels);
    } else if car_speed.round().abs() < cfg.max_reverse_speed {
        for w in wheels.iter_mut() {
            w.brake_torque = 0.0;
            w.motor_torque = cfg.acceleration_multiplier * TORQUE_PER_MULTIPLIER * *throttle_axis;
        }
    } else {
        for w in wheels.iter_mut() {
            w.motor_torque = 0.0;
        }
    }
}

pub(crate) fn throttle_off(wheels: &mut [WheelState; 4]) {
    for w in wheels.iter_mut() {
        w.motor_torque = 0.0;
    }
}

pub(crate) fn brakes(cfg: &CarConfig, wheels: &mut [WheelState; 4]) {
    for w in wheels.iter_mut() {
        w.brake_torque = cfg.brake_force;
    }
}

/// One invocation of the periodic coast-down. `speed` is the body's
/// current |velocity| in m/s; the returned command is the velocity
/// write the host must perform. `Stop` is the terminal condition and
/// ends the periodic sub-process.
pub(crate) fn decelerate(
    cfg: &CarConfig,
    throttle_axis: &mut f32,
    wheels: &mut [WheelState; 4],
    speed: f32,
    dt: f32,
) -> VelocityCommand {
    if *throttle_axis != 0.0 {
        if *throttle_axis > 0.0 {
            *throttle_axis -= dt * 10.0;
        } else {
            *throttle_axis += dt * 10.0;
        }
        if throttle_axis.abs() < 0.15 {
            *throttle_axis = 0.0;
        }
    }
    let scale = 1.0 / (1.0 + 0.025 * cfg.deceleration_multiplier);
    throttle_off(wheels);
    if speed * scale < 0.25 {
        VelocityCommand::Stop
    } else {
        VelocityCommand::Scale(scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arcade_drive::types::{FrictionCurve, WheelId, HATCH};
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn wheels() -> [WheelState; 4] {
        WheelId::ALL.map(|id| WheelState::new(id, FrictionCurve::default()).unwrap())
    }

    #[test]
    fn forward_torque_uses_multiplier_times_fifty() {
        let mut throttle = 0.0;
        let mut w = wheels();
        // Enough ticks to saturate the throttle axis (3/s -> 1/3 s).
        for _ in 0..25 {
            go_forward(&HATCH, &mut throttle, &mut w, 40.0, 10.0, DT);
        }
        assert_relative_eq!(throttle, 1.0);
        for wheel in &w {
            assert_relative_eq!(wheel.motor_torque, 6.0 * 50.0);
            assert_eq!(wheel.brake_torque, 0.0);
        }
    }

    #[test]
    fn torque_snaps_to_zero_at_speed_cap() {
        let mut throttle = 1.0;
        let mut w = wheels();
        // 119.4 rounds to 119: still under the cap.
        go_forward(&HATCH, &mut throttle, &mut w, 119.4, 30.0, DT);
        assert!(w[0].motor_torque > 0.0);
        // 119.6 rounds to 120: at the cap, torque removed this tick.
        go_forward(&HATCH, &mut throttle, &mut w, 119.6, 30.0, DT);
        for wheel in &w {
            assert_eq!(wheel.motor_torque, 0.0);
        }
    }

    #[test]
    fn forward_intent_brakes_while_still_rolling_backwards() {
        let mut throttle = 0.0;
        let mut w = wheels();
        go_forward(&HATCH, &mut throttle, &mut w, 20.0, -3.0, DT);
        for wheel in &w {
            assert_eq!(wheel.brake_torque, HATCH.brake_force);
            assert_eq!(wheel.motor_torque, 0.0);
        }
        // Throttle still ramps while braking.
        assert!(throttle > 0.0);
    }

    #[test]
    fn reverse_mirrors_forward() {
        let mut fwd_throttle = 0.0;
        let mut rev_throttle = 0.0;
        let mut fwd = wheels();
        let mut rev = wheels();
        for _ in 0..30 {
            go_forward(&HATCH, &mut fwd_throttle, &mut fwd, 20.0, 5.0, DT);
            go_reverse(&HATCH, &mut rev_throttle, &mut rev, 20.0, -5.0, DT);
        }
        assert_relative_eq!(fwd_throttle, -rev_throttle);
        for (f, r) in fwd.iter().zip(rev.iter()) {
            assert_relative_eq!(f.motor_torque, -r.motor_torque);
            assert_eq!(f.brake_torque, r.brake_torque);
        }
    }

    #[test]
    fn reverse_cap_uses_absolute_rounded_speed() {
        let mut throttle = -1.0;
        let mut w = wheels();
        go_reverse(&HATCH, &mut throttle, &mut w, -59.4, -10.0, DT);
        assert!(w[0].motor_torque < 0.0);
        go_reverse(&HATCH, &mut throttle, &mut w, -59.6, -10.0, DT);
        for wheel in &w {
            assert_eq!(wheel.motor_torque, 0.0);
        }
    }

    #[test]
    fn throttle_off_is_idempotent() {
        let mut w = wheels();
        for wheel in w.iter_mut() {
            wheel.motor_torque = 275.0;
        }
        for _ in 0..5 {
            throttle_off(&mut w);
            for wheel in &w {
                assert_eq!(wheel.motor_torque, 0.0);
            }
        }
    }

    #[test]
    fn decelerate_applies_exponential_drag() {
        let mut throttle = 0.0;
        let mut w = wheels();
        let cmd = decelerate(&HATCH, &mut throttle, &mut w, 10.0, DT);
        assert_eq!(cmd, VelocityCommand::Scale(1.0 / 1.025));
    }

    #[test]
    fn decelerate_relaxes_throttle_and_snaps_near_zero() {
        let mut throttle = 1.0;
        let mut w = wheels();
        decelerate(&HATCH, &mut throttle, &mut w, 10.0, DT);
        assert_relative_eq!(throttle, 1.0 - DT * 10.0);

        throttle = 0.2;
        decelerate(&HATCH, &mut throttle, &mut w, 10.0, DT);
        assert_eq!(throttle, 0.0); // 0.2 - 0.1667 < 0.15 snaps

        throttle = -0.2;
        decelerate(&HATCH, &mut throttle, &mut w, 10.0, DT);
        assert_eq!(throttle, 0.0);
    }

    #[test]
    fn decelerate_stops_the_car_below_threshold() {
        let mut throttle = 0.0;
        let mut w = wheels();
        let cmd = decelerate(&HATCH, &mut throttle, &mut w, 0.2, DT);
        assert_eq!(cmd, VelocityCommand::Stop);
    }

    #[test]
    fn decelerate_zeroes_motor_torque() {
        let mut throttle = 0.5;
        let mut w = wheels();
        for wheel in w.iter_mut() {
            wheel.motor_torque = 300.0;
        }
        decelerate(&HATCH, &mut throttle, &mut w, 5.0, DT);
        for wheel in &w {
            assert_eq!(wheel.motor_torque, 0.0);
        }
    }
}
