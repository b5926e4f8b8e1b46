// ==============================================================================
// traction.rs — TRACTION / DRIFT STATE MACHINE
// ==============================================================================
// The drift model works by amplifying each wheel's sideways-friction extremum
// slip: the further the slip value sits above its cached nominal, the less
// lateral grip the wheel generates. driftingAxis in [0, 1] tracks how far along
// that ramp the vehicle is:
//
//   Nominal  — driftingAxis == 0, friction at the cached nominal value
//   Ramping  — 0 < driftingAxis < 1, drifting or recovering
//   MaxDrift — driftingAxis == 1
//
// handbrake() runs every tick the handbrake is held and ramps the axis up at
// 1.0/s; recover_traction() runs every tick it is released and ramps down at
// 1/1.5 per second (recovery is deliberately 1.5x slower than onset). Recovery
// is a polling convergence: the interpolated slip is rewritten each tick until
// it falls to/below nominal, then snapped exactly to nominal. The front-left
// wheel is the convergence sentinel.
//
// The divide in the minimum-effective-drift floor is safe because a zero
// nominal slip is rejected at vehicle initialization.
// ==============================================================================

use crate::arcade_drive::types::{CarConfig, WheelId, WheelState};

const RECOVERY_SLOWDOWN: f32 = 1.5;

pub(crate) fn handbrake(
    cfg: &CarConfig,
    drifting_axis: &mut f32,
    wheels: &mut [WheelState; 4],
    is_traction_locked: &mut bool,
    dt: f32,
) {
    *drifting_axis += dt;

    // Minimum-effective-drift floor: if the interpolated slip would
    // still sit below nominal, the ramp is visually and physically
    // negligible, so skip straight to the point where it crosses it.
    let nominal = wheels[WheelId::FL.index()].nominal_extremum_slip;
    let secure_starting_point = *drifting_axis * nominal * cfg.handbrake_drift_multiplier;
    if secure_starting_point < nominal {
        *drifting_axis = nominal / (nominal * cfg.handbrake_drift_multiplier);
    }
    if *drifting_axis > 1.0 {
        *drifting_axis = 1.0;
    }

    if *drifting_axis < 1.0 {
        for w in wheels.iter_mut() {
            w.friction.extremum_slip =
                w.nominal_extremum_slip * cfg.handbrake_drift_multiplier * *drifting_axis;
        }
    }

    *is_traction_locked = true;
}

pub(crate) fn recover_traction(
    cfg: &CarConfig,
    drifting_axis: &mut f32,
    wheels: &mut [WheelState; 4],
    is_traction_locked: &mut bool,
    dt: f32,
) {
    *is_traction_locked = false;
    *drifting_axis -= dt / RECOVERY_SLOWDOWN;
    if *drifting_axis < 0.0 {
        *drifting_axis = 0.0;
    }

    let fl = wheels[WheelId::FL.index()];
    if fl.friction.extremum_slip > fl.nominal_extremum_slip {
        // Still above nominal: keep walking the interpolation down and
        // poll again next tick.
        for w in wheels.iter_mut() {
            w.friction.extremum_slip =
                w.nominal_extremum_slip * cfg.handbrake_drift_multiplier * *drifting_axis;
        }
    } else if fl.friction.extremum_slip < fl.nominal_extremum_slip {
        // Converged: snap exactly to nominal on all four wheels.
        for w in wheels.iter_mut() {
            w.friction.extremum_slip = w.nominal_extremum_slip;
        }
        *drifting_axis = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arcade_drive::types::{FrictionCurve, HATCH};
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn wheels_with_slip(nominal: f32) -> [WheelState; 4] {
        let friction = FrictionCurve {
            extremum_slip: nominal,
            ..FrictionCurve::default()
        };
        WheelId::ALL.map(|id| WheelState::new(id, friction).unwrap())
    }

    #[test]
    fn handbrake_skips_the_sub_nominal_ramp() {
        let mut axis = 0.0;
        let mut locked = false;
        let mut w = wheels_with_slip(0.3);
        handbrake(&HATCH, &mut axis, &mut w, &mut locked, DT);
        // One dt of ramp (0.0167) * 0.3 * 5 = 0.025 < 0.3, so the axis
        // snaps up to the floor 1/multiplier.
        assert_relative_eq!(axis, 1.0 / HATCH.handbrake_drift_multiplier);
        assert!(locked);
        // At the floor the interpolated slip equals nominal exactly.
        for wheel in &w {
            assert_relative_eq!(wheel.friction.extremum_slip, 0.3);
        }
    }

    #[test]
    fn drifting_axis_clamps_at_one_and_slip_ramps_toward_amplified_target() {
        let mut axis = 0.0;
        let mut locked = false;
        let mut w = wheels_with_slip(0.3);
        let mut last_slip = 0.0;
        for _ in 0..120 {
            // two simulated seconds
            handbrake(&HATCH, &mut axis, &mut w, &mut locked, DT);
            assert!(axis <= 1.0);
            let slip = w[0].friction.extremum_slip;
            assert!(slip >= last_slip);
            assert!(slip <= 0.3 * 5.0);
            last_slip = slip;
        }
        assert_eq!(axis, 1.0);
        // Slip was last written on the final tick with axis < 1, so it
        // sits just under the amplified target.
        assert!(last_slip > 0.3 * 5.0 * 0.95);
    }

    #[test]
    fn nominal_slip_never_mutates() {
        let mut axis = 0.0;
        let mut locked = false;
        let mut w = wheels_with_slip(0.3);
        for _ in 0..60 {
            handbrake(&HATCH, &mut axis, &mut w, &mut locked, DT);
        }
        for _ in 0..120 {
            recover_traction(&HATCH, &mut axis, &mut w, &mut locked, DT);
        }
        for wheel in &w {
            assert_eq!(wheel.nominal_extremum_slip, 0.3);
        }
    }

    #[test]
    fn recovery_converges_and_snaps_exactly_to_nominal() {
        let mut axis = 0.0;
        let mut locked = false;
        let mut w = wheels_with_slip(0.3);
        for _ in 0..90 {
            handbrake(&HATCH, &mut axis, &mut w, &mut locked, DT);
        }
        assert_eq!(axis, 1.0);

        let mut last_slip = w[0].friction.extremum_slip;
        let mut ticks = 0;
        while axis > 0.0 || w[0].friction.extremum_slip != 0.3 {
            recover_traction(&HATCH, &mut axis, &mut w, &mut locked, DT);
            let slip = w[0].friction.extremum_slip;
            // Decreases tick by tick, except the terminal snap which may
            // lift a slightly-overshot value back up to exactly nominal.
            assert!(
                slip <= last_slip || slip == 0.3,
                "slip must decrease tick by tick"
            );
            last_slip = slip;
            ticks += 1;
            assert!(ticks < 600, "recovery never converged");
        }
        assert!(!locked);
        for wheel in &w {
            assert_eq!(wheel.friction.extremum_slip, 0.3); // exact snap
        }
        assert_eq!(axis, 0.0);
    }

    #[test]
    fn recovery_is_one_point_five_times_slower_than_onset() {
        let mut axis = 0.0;
        let mut locked = false;
        let mut w = wheels_with_slip(0.3);

        // Hold the handbrake for 0.5 s (past the floor snap).
        for _ in 0..30 {
            handbrake(&HATCH, &mut axis, &mut w, &mut locked, DT);
        }
        let onset_axis = axis;
        assert!(onset_axis < 1.0);

        // While the interpolated slip sits above nominal the axis
        // unwinds at exactly dt / 1.5 per tick (onset ramps at dt).
        // Once it crosses 1/multiplier the convergence snap takes it
        // straight to zero, so the rate only holds down to the floor.
        let floor = 1.0 / HATCH.handbrake_drift_multiplier;
        let release_ticks = ((onset_axis - floor) * RECOVERY_SLOWDOWN / DT).ceil() as usize;
        for _ in 0..release_ticks - 2 {
            let before = axis;
            recover_traction(&HATCH, &mut axis, &mut w, &mut locked, DT);
            assert_relative_eq!(before - axis, DT / RECOVERY_SLOWDOWN, epsilon = 1e-5);
        }
        assert!(axis > floor, "axis crossed the floor too early");
        for _ in 0..3 {
            recover_traction(&HATCH, &mut axis, &mut w, &mut locked, DT);
        }
        assert_eq!(axis, 0.0, "convergence snap did not fire");
        for wheel in &w {
            assert_eq!(wheel.friction.extremum_slip, 0.3);
        }
    }

    #[test]
    fn recovery_on_nominal_wheels_is_a_no_op() {
        let mut axis = 0.0;
        let mut locked = true;
        let mut w = wheels_with_slip(0.2);
        recover_traction(&HATCH, &mut axis, &mut w, &mut locked, DT);
        assert!(!locked);
        assert_eq!(axis, 0.0);
        for wheel in &w {
            assert_eq!(wheel.friction.extremum_slip, 0.2);
        }
    }
}
