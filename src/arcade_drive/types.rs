//! Core shared types for `arcade_drive` (engine-agnostic).

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

// ============================================
// Wheel identification
// ============================================

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum WheelId {
    FL,
    FR,
    RL,
    RR,
}

impl WheelId {
    pub const ALL: [WheelId; 4] = [WheelId::FL, WheelId::FR, WheelId::RL, WheelId::RR];

    pub const fn index(self) -> usize {
        match self {
            WheelId::FL => 0,
            WheelId::FR => 1,
            WheelId::RL => 2,
            WheelId::RR => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WheelId::FL => "FL",
            WheelId::FR => "FR",
            WheelId::RL => "RL",
            WheelId::RR => "RR",
        }
    }

    pub fn is_front(&self) -> bool {
        matches!(self, WheelId::FL | WheelId::FR)
    }
}

impl fmt::Display for WheelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// ----- configs / inputs ---------------------
// ============================================

/// Per-vehicle tuning. Multipliers are small linear scale factors
/// (roughly 1-10), not physical units; speeds are km/h, angles degrees.
#[derive(Debug, Clone, Copy)]
pub struct CarConfig {
    pub max_speed: f32,                  // km/h
    pub max_reverse_speed: f32,          // km/h
    pub acceleration_multiplier: f32,    // 1 slow .. 10 very fast
    pub max_steering_angle: f32,         // degrees
    pub steering_speed: f32,             // (0, 1], lerp factor per tick
    pub brake_force: f32,                // brake torque per wheel
    pub deceleration_multiplier: f32,    // 1 slowest .. 10 fastest coast-down
    pub handbrake_drift_multiplier: f32, // grip lost under handbrake
    pub body_mass_center: [f32; 3],      // chassis-local COM offset
}

/// Everyday hatchback, forgiving to drive.
pub const HATCH: CarConfig = CarConfig {
    max_speed: 120.0,
    max_reverse_speed: 60.0,
    acceleration_multiplier: 6.0,
    max_steering_angle: 30.0,
    steering_speed: 0.5,
    brake_force: 350.0,
    deceleration_multiplier: 1.0,
    handbrake_drift_multiplier: 5.0,
    body_mass_center: [0.0, -0.15, 0.0],
};

/// Sportier setup: faster, twitchier steering, less drift on handbrake.
pub const COUPE: CarConfig = CarConfig {
    max_speed: 160.0,
    max_reverse_speed: 70.0,
    acceleration_multiplier: 8.0,
    max_steering_angle: 27.0,
    steering_speed: 0.8,
    brake_force: 450.0,
    deceleration_multiplier: 2.0,
    handbrake_drift_multiplier: 3.0,
    body_mass_center: [0.0, -0.2, 0.0],
};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },

    #[error("steering_speed must be in (0, 1], got {value}")]
    SteeringSpeedRange { value: f32 },

    #[error("wheel {wheel} has a zero sideways-friction extremum slip")]
    ZeroNominalSlip { wheel: WheelId },
}

impl CarConfig {
    /// Rejects degenerate tuning at vehicle initialization so the
    /// per-tick code never has to guard against it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives = [
            ("max_speed", self.max_speed),
            ("max_reverse_speed", self.max_reverse_speed),
            ("acceleration_multiplier", self.acceleration_multiplier),
            ("max_steering_angle", self.max_steering_angle),
            ("brake_force", self.brake_force),
            ("deceleration_multiplier", self.deceleration_multiplier),
            ("handbrake_drift_multiplier", self.handbrake_drift_multiplier),
        ];
        for (field, value) in positives {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if !(self.steering_speed > 0.0 && self.steering_speed <= 1.0) {
            return Err(ConfigError::SteeringSpeedRange {
                value: self.steering_speed,
            });
        }
        Ok(())
    }
}

/// Player intent for one tick, sampled by the input collaborator.
/// Buttons missing from the wire payload default to released.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct DriveIntent {
    pub accelerate: bool,
    pub reverse: bool,
    pub turn_left: bool,
    pub turn_right: bool,
    pub handbrake: bool,
}

// ============================================
// ----- wheels -------------------------------
// ============================================

/// Plain copy of a sideways-friction curve. Only `extremum_slip` is
/// ever mutated by the drive model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionCurve {
    pub extremum_slip: f32,
    pub extremum_value: f32,
    pub asymptote_slip: f32,
    pub asymptote_value: f32,
    pub stiffness: f32,
}

impl Default for FrictionCurve {
    fn default() -> Self {
        Self {
            extremum_slip: 0.2,
            extremum_value: 1.0,
            asymptote_slip: 0.5,
            asymptote_value: 0.75,
            stiffness: 1.0,
        }
    }
}

/// Actuation state of one wheel, written by the drive model and read
/// by whatever physics backend hosts the vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelState {
    pub steer_angle: f32,  // degrees
    pub motor_torque: f32, // signed
    pub brake_torque: f32, // >= 0
    /// Default (non-drifting) extremum slip, cached once. This is the
    /// recovery target and never mutates afterwards.
    pub nominal_extremum_slip: f32,
    pub friction: FrictionCurve,
}

impl WheelState {
    pub fn new(wheel: WheelId, friction: FrictionCurve) -> Result<Self, ConfigError> {
        if !(friction.extremum_slip > 0.0) {
            return Err(ConfigError::ZeroNominalSlip { wheel });
        }
        Ok(Self {
            steer_angle: 0.0,
            motor_torque: 0.0,
            brake_torque: 0.0,
            nominal_extremum_slip: friction.extremum_slip,
            friction,
        })
    }
}

// ============================================
// ----- per-tick feedback / outputs ----------
// ============================================

/// Readback from the physics body, sampled once per tick before the
/// drive model runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyFeedback {
    pub local_velocity_x: f32, // chassis-frame lateral velocity (m/s)
    pub local_velocity_z: f32, // chassis-frame forward velocity (m/s)
    pub speed: f32,            // |velocity| (m/s)
    pub wheel_rpm: f32,        // front-left wheel angular velocity
    pub wheel_radius: f32,     // front-left wheel radius (m)
}

/// Velocity write requested by the passive deceleration law. The host
/// applies it to the rigid body after the tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityCommand {
    /// Multiply the body's linear velocity by this factor.
    Scale(f32),
    /// Hard-stop the body (linear and angular).
    Stop,
}
