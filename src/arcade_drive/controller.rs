// ==============================================================================
// controller.rs — PER-TICK DRIVE MODEL ORCHESTRATOR
// ==============================================================================
// CarController owns the whole mutable drive state of one vehicle and advances
// it with an explicit tick function:
//
//     advance(dt, intent, feedback) -> Option<VelocityCommand>
//
// Each tick:
// 1) refresh telemetry (car speed from wheel rpm, chassis-frame velocity) and
//    recompute the drift flag from lateral slip
// 2) dispatch intent to the steering, drivetrain and traction handlers; the
//    handlers are mutually exclusive per tick by construction of the gates
// 3) run the periodic coast-down if armed (0.1 s cadence; armed whenever no
//    drive, reverse or handbrake intent is active, re-armed only by one of
//    those intents after its terminal stop)
//
// The host applies the wheel actuation (read via wheels()) and the returned
// velocity command to its physics body after the call.
// ==============================================================================

use crate::arcade_drive::drivetrain;
use crate::arcade_drive::steering;
use crate::arcade_drive::traction;
use crate::arcade_drive::types::{
    BodyFeedback, CarConfig, ConfigError, DriveIntent, FrictionCurve, VelocityCommand, WheelId,
    WheelState,
};

/// Cadence of the passive deceleration law, in seconds.
const DECELERATE_PERIOD: f32 = 0.1;

/// Lateral slip speed above which the car counts as drifting (m/s).
const DRIFT_SLIP_THRESHOLD: f32 = 2.5;

/// Lateral slip / speed gates for skid effects (trails, screech).
const SKID_SLIP_THRESHOLD: f32 = 5.0;
const SKID_SPEED_THRESHOLD: f32 = 12.0;

pub struct CarController {
    config: CarConfig,
    wheels: [WheelState; 4],

    steering_axis: f32, // [-1, 1]
    throttle_axis: f32, // [-1, 1], positive = forward
    drifting_axis: f32, // [0, 1]

    is_drifting: bool,
    is_traction_locked: bool,

    local_velocity_x: f32,
    local_velocity_z: f32,
    car_speed: f32, // km/h, from wheel angular velocity

    // Coast-down bookkeeping. `decelerating` is the intent latch;
    // `decelerate_in` counts down to the next periodic invocation and
    // is None once the law has hit its terminal stop. The latch stays
    // set after a terminal stop until a drive intent clears it.
    decelerating: bool,
    decelerate_in: Option<f32>,
}

impl CarController {
    pub fn new(config: CarConfig, friction: [FrictionCurve; 4]) -> Result<Self, ConfigError> {
        config.validate()?;
        let [fl, fr, rl, rr] = friction;
        let wheels = [
            WheelState::new(WheelId::FL, fl)?,
            WheelState::new(WheelId::FR, fr)?,
            WheelState::new(WheelId::RL, rl)?,
            WheelState::new(WheelId::RR, rr)?,
        ];
        Ok(Self {
            config,
            wheels,
            steering_axis: 0.0,
            throttle_axis: 0.0,
            drifting_axis: 0.0,
            is_drifting: false,
            is_traction_locked: false,
            local_velocity_x: 0.0,
            local_velocity_z: 0.0,
            car_speed: 0.0,
            decelerating: false,
            decelerate_in: None,
        })
    }

    /// Advance the drive model by one fixed simulation tick.
    pub fn advance(
        &mut self,
        dt: f32,
        intent: DriveIntent,
        feedback: BodyFeedback,
    ) -> Option<VelocityCommand> {
        // Telemetry refresh: km/h from the front-left wheel's angular
        // velocity, chassis-frame velocity from the body.
        self.car_speed =
            2.0 * std::f32::consts::PI * feedback.wheel_radius * feedback.wheel_rpm * 60.0 / 1000.0;
        self.local_velocity_x = feedback.local_velocity_x;
        self.local_velocity_z = feedback.local_velocity_z;
        self.is_drifting = self.local_velocity_x.abs() > DRIFT_SLIP_THRESHOLD;

        if intent.accelerate {
            self.cancel_deceleration();
            drivetrain::go_forward(
                &self.config,
                &mut self.throttle_axis,
                &mut self.wheels,
                self.car_speed,
                self.local_velocity_z,
                dt,
            );
        }
        if intent.reverse {
            self.cancel_deceleration();
            drivetrain::go_reverse(
                &self.config,
                &mut self.throttle_axis,
                &mut self.wheels,
                self.car_speed,
                self.local_velocity_z,
                dt,
            );
        }
        if intent.turn_left {
            steering::turn_left(&self.config, &mut self.steering_axis, &mut self.wheels, dt);
        }
        if intent.turn_right {
            steering::turn_right(&self.config, &mut self.steering_axis, &mut self.wheels, dt);
        }
        if intent.handbrake {
            self.cancel_deceleration();
            traction::handbrake(
                &self.config,
                &mut self.drifting_axis,
                &mut self.wheels,
                &mut self.is_traction_locked,
                dt,
            );
        } else {
            traction::recover_traction(
                &self.config,
                &mut self.drifting_axis,
                &mut self.wheels,
                &mut self.is_traction_locked,
                dt,
            );
        }
        if !intent.accelerate && !intent.reverse {
            drivetrain::throttle_off(&mut self.wheels);
        }
        if !intent.reverse && !intent.accelerate && !intent.handbrake && !self.decelerating {
            self.decelerating = true;
            self.decelerate_in = Some(0.0); // first invocation fires this tick
        }
        if !intent.turn_left && !intent.turn_right && self.steering_axis != 0.0 {
            steering::reset_steering(&self.config, &mut self.steering_axis, &mut self.wheels, dt);
        }

        self.step_deceleration(dt, feedback.speed)
    }

    fn step_deceleration(&mut self, dt: f32, speed: f32) -> Option<VelocityCommand> {
        let next = self.decelerate_in.as_mut()?;
        *next -= dt;
        if *next > 0.0 {
            return None;
        }
        *next += DECELERATE_PERIOD;
        let cmd = drivetrain::decelerate(
            &self.config,
            &mut self.throttle_axis,
            &mut self.wheels,
            speed,
            dt,
        );
        if cmd == VelocityCommand::Stop {
            // Terminal condition: the periodic sub-process ends, but the
            // latch deliberately stays set until a drive intent clears it.
            self.decelerate_in = None;
        }
        Some(cmd)
    }

    fn cancel_deceleration(&mut self) {
        self.decelerating = false;
        self.decelerate_in = None;
    }

    // ----- telemetry / host readback -----

    pub fn wheels(&self) -> &[WheelState; 4] {
        &self.wheels
    }

    pub fn config(&self) -> &CarConfig {
        &self.config
    }

    /// Speed in km/h derived from wheel angular velocity. Signed.
    pub fn car_speed(&self) -> f32 {
        self.car_speed
    }

    pub fn is_drifting(&self) -> bool {
        self.is_drifting
    }

    pub fn is_traction_locked(&self) -> bool {
        self.is_traction_locked
    }

    /// Gate for skid trails / tire screech: needs traction lock or hard
    /// lateral slip, and real road speed so effects never show while
    /// shuffling around a parking spot.
    pub fn skid_active(&self) -> bool {
        (self.is_traction_locked || self.local_velocity_x.abs() > SKID_SLIP_THRESHOLD)
            && self.car_speed.abs() > SKID_SPEED_THRESHOLD
    }

    pub fn steering_axis(&self) -> f32 {
        self.steering_axis
    }

    pub fn throttle_axis(&self) -> f32 {
        self.throttle_axis
    }

    pub fn drifting_axis(&self) -> f32 {
        self.drifting_axis
    }
}
