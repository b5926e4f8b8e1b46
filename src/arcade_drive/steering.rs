// ==============================================================================
// steering.rs — STEERING INTEGRATOR (FRONT AXLE)
// ==============================================================================
// Responsibilities:
// - Advance the signed steering axis from turn intent (rate 10 * steering_speed
//   per second, clamped to [-1, 1])
// - Relax the axis back toward center when no turn intent is active; snap it to
//   exactly 0 once the realized front-left angle drops under 1 degree
// - Convert axis -> target angle (axis * max_steering_angle) and lag each front
//   wheel toward it with a per-tick lerp of factor steering_speed
//
// The lerp is a first-order lag, not a direct set: wheels never snap to the
// target angle in one tick.
// ==============================================================================

use crate::arcade_drive::types::{CarConfig, WheelId, WheelState};

const AXIS_RATE: f32 = 10.0; // axis units per second at steering_speed = 1

pub(crate) fn turn_left(cfg: &CarConfig, axis: &mut f32, wheels: &mut [WheelState; 4], dt: f32) {
    *axis -= dt * AXIS_RATE * cfg.steering_speed;
    if *axis < -1.0 {
        *axis = -1.0;
    }
    apply_steering(cfg, *axis, wheels);
}

pub(crate) fn turn_right(cfg: &CarConfig, axis: &mut f32, wheels: &mut [WheelState; 4], dt: f32) {
    *axis += dt * AXIS_RATE * cfg.steering_speed;
    if *axis > 1.0 {
        *axis = 1.0;
    }
    apply_steering(cfg, *axis, wheels);
}

/// Walks the axis back toward 0 at the turn rate. The realized wheel
/// angle lags the axis, so the axis is snapped to exactly 0 once the
/// front-left wheel is within a degree of center; without the snap the
/// sign test oscillates around zero forever.
pub(crate) fn reset_steering(cfg: &CarConfig, axis: &mut f32, wheels: &mut [WheelState; 4], dt: f32) {
    if *axis < 0.0 {
        *axis += dt * AXIS_RATE * cfg.steering_speed;
    } else if *axis > 0.0 {
        *axis -= dt * AXIS_RATE * cfg.steering_speed;
    }
    if wheels[WheelId::FL.index()].steer_angle.abs() < 1.0 {
        *axis = 0.0;
    }
    apply_steering(cfg, *axis, wheels);
}

fn apply_steering(cfg: &CarConfig, axis: f32, wheels: &mut [WheelState; 4]) {
    let target = axis * cfg.max_steering_angle;
    for id in WheelId::ALL {
        if id.is_front() {
            let w = &mut wheels[id.index()];
            w.steer_angle = lerp(w.steer_angle, target, cfg.steering_speed);
        }
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}
