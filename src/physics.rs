// src/physics.rs
//
// rapier3d hosting for the arcade drive model. Each vehicle is a dynamic
// chassis body with four suspension raycast wheels; per tick the drive
// controller turns the player's intent into per-wheel actuation (steer
// angle, motor/brake torque, sideways-slip amplification) and this module
// converts that actuation into impulses at the contact patches:
//
//   - motor torque / radius along the steered forward direction
//   - brake torque opposing the longitudinal contact velocity
//   - lateral grip impulse, scaled down as the slip curve is amplified
//     past nominal (that scaling IS the drift)
//
// Chassis local frame: +Z forward, +X right, +Y up.

use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::*;

use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;

use crate::arcade_drive::{
    BodyFeedback, CarConfig, CarController, ConfigError, DriveIntent, FrictionCurve,
    VelocityCommand, WheelId, COUPE, HATCH,
};

const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);

/// Base lateral friction coefficient at nominal slip.
const MU_LAT: f32 = 0.9;

/// Per-wheel normal force cap; keeps suspension spikes from launching the car.
const MAX_NORMAL_FORCE: f32 = 25_000.0;

const CHASSIS_MASS: f32 = 1350.0; // kg
const CHASSIS_HALF_EXTENTS: [f32; 3] = [1.0, 0.35, 2.1];
const SPAWN_HEIGHT: f32 = 1.3; // fixed server convention

/// Suspension raycast wheel. Geometry only; actuation lives in the drive
/// controller's per-wheel state.
#[derive(Clone)]
pub struct Wheel {
    pub id: WheelId,
    pub offset: Point<Real>, // position in chassis local space
    pub rest_length: Real,   // suspension neutral length
    pub max_length: Real,    // max compression
    pub radius: Real,
    pub stiffness: Real, // spring constant (N/m)
    pub damping: Real,   // damper constant (N*s/m)
}

/// World pose of one wheel, mirrored into snapshots so clients can place
/// wheel meshes without re-deriving suspension state.
#[derive(Clone, Serialize)]
pub struct WheelPose {
    pub wheel: String, // "FL" | "FR" | "RL" | "RR"
    pub center: [f32; 3],
    pub steer_angle: f32, // degrees
    pub grounded: bool,
}

pub struct Vehicle {
    pub body: RigidBodyHandle,
    pub controller: CarController,
    pub intent: DriveIntent,
    pub wheels: Vec<Wheel>,
    pub wheel_poses: Vec<WheelPose>,
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline,
    pub vehicles: HashMap<String, Vehicle>, // playerId -> vehicle
}

/// Spring/damper constants from static sag: k = F_static / sag,
/// c = 2 * zeta * sqrt(k * m).
fn suspension_from_sag(vehicle_mass: f32, wheels: usize, sag_m: f32, zeta: f32) -> (f32, f32) {
    let m = vehicle_mass / wheels as f32;
    let g = 9.81_f32;
    let k = (m * g) / sag_m.max(1e-3);
    let c = 2.0 * zeta * (k * m).sqrt();
    (k, c)
}

fn default_wheel_layout() -> Vec<Wheel> {
    let (k, c) = suspension_from_sag(CHASSIS_MASS, 4, 0.05, 0.9);
    let wheel = |id: WheelId, x: f32, z: f32| Wheel {
        id,
        offset: point![x, -0.3, z],
        rest_length: 0.5,
        max_length: 0.9,
        radius: 0.35,
        stiffness: k,
        damping: c,
    };
    vec![
        wheel(WheelId::FL, -0.8, 1.5),
        wheel(WheelId::FR, 0.8, 1.5),
        wheel(WheelId::RL, -0.8, -1.5),
        wheel(WheelId::RR, 0.8, -1.5),
    ]
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let gravity = vector![0.0, -9.81, 0.0];

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // Big static ground slab, top surface at y = 0.
        let ground_rb = RigidBodyBuilder::fixed()
            .translation(vector![0.0, -1.0, 0.0])
            .build();
        let ground_handle = bodies.insert(ground_rb);

        let ground_collider = ColliderBuilder::cuboid(500.0, 1.0, 500.0)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.2)
            .restitution(0.0)
            .build();
        colliders.insert_with_parent(ground_collider, ground_handle, &mut bodies);

        info!(
            "ground inserted, bodies = {}, colliders = {}",
            bodies.len(),
            colliders.len()
        );

        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            vehicles: HashMap::new(),
        }
    }

    /// Store the latest intent for a player's vehicle (just stores it;
    /// actuation happens in `step`).
    pub fn apply_player_input(&mut self, player_id: &str, intent: DriveIntent) {
        if let Some(v) = self.vehicles.get_mut(player_id) {
            v.intent = intent;
        }
    }

    /// Spawn a car for this player: dynamic rigid body with a box
    /// collider, four suspension raycasts, and a fresh drive controller.
    /// Presets alternate by join order until a garage screen picks them.
    pub fn spawn_vehicle_for_player(
        &mut self,
        id: String,
        position: [f32; 3],
    ) -> Result<(), ConfigError> {
        let config = if self.vehicles.len() % 2 == 0 {
            HATCH
        } else {
            COUPE
        };
        self.spawn_vehicle(id, position, config)
    }

    pub fn spawn_vehicle(
        &mut self,
        id: String,
        position: [f32; 3],
        config: CarConfig,
    ) -> Result<(), ConfigError> {
        let controller = CarController::new(config, [FrictionCurve::default(); 4])?;

        let [hx, hy, hz] = CHASSIS_HALF_EXTENTS;
        let volume = 8.0 * hx * hy * hz;
        let density = CHASSIS_MASS / volume;
        let [cx, cy, cz] = config.body_mass_center;

        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![position[0], SPAWN_HEIGHT, position[2]])
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(rb);

        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .translation(vector![cx, cy, cz]) // COM offset
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND))
            .density(density)
            .friction(0.0) // all tire grip comes from the drive model
            .restitution(0.0)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        info!("spawned vehicle for player {id} at {position:?} (body = {handle:?})");

        self.vehicles.insert(
            id,
            Vehicle {
                body: handle,
                controller,
                intent: DriveIntent::default(),
                wheels: default_wheel_layout(),
                wheel_poses: Vec::with_capacity(4),
            },
        );
        Ok(())
    }

    pub fn remove_vehicle(&mut self, player_id: &str) {
        if let Some(v) = self.vehicles.remove(player_id) {
            self.bodies.remove(
                v.body,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.joints,
                &mut self.multibody_joints,
                true,
            );
            info!("removed vehicle for player {player_id}");
        }
    }

    pub fn step(&mut self, dt: Real) {
        self.query_pipeline.update(&self.colliders);
        let ground_n: Vector<Real> = vector![0.0, 1.0, 0.0];

        for vehicle in self.vehicles.values_mut() {
            let Some(body) = self.bodies.get(vehicle.body) else {
                continue;
            };
            let iso = *body.position();
            let linvel = *body.linvel();
            let angvel = *body.angvel();
            let mass = body.mass();
            let com = *body.center_of_mass();

            // ============================================================
            // 1) Body feedback -> drive controller tick
            // ============================================================
            let local = iso.rotation.inverse_transform_vector(&linvel);
            let radius = vehicle.wheels[0].radius;
            let feedback = BodyFeedback {
                local_velocity_x: local.x,
                local_velocity_z: local.z,
                speed: linvel.magnitude(),
                wheel_rpm: local.z * 60.0 / (std::f32::consts::TAU * radius),
                wheel_radius: radius,
            };
            let velocity_cmd = vehicle.controller.advance(dt, vehicle.intent, feedback);

            // ============================================================
            // 2) Suspension raycasts + actuation -> impulses
            // ============================================================
            let filter = QueryFilter::default().exclude_rigid_body(vehicle.body);
            let mut impulses: Vec<(Vector<Real>, Option<Point<Real>>)> = Vec::new();
            vehicle.wheel_poses.clear();

            for (i, wheel) in vehicle.wheels.iter().enumerate() {
                let actuation = vehicle.controller.wheels()[i];
                let origin = iso * (wheel.offset + vector![0.0, wheel.radius + 0.02, 0.0]);
                let dir: Vector<Real> = vector![0.0, -1.0, 0.0];
                let ray = Ray::new(origin, dir);
                let max_dist = wheel.rest_length + wheel.max_length + wheel.radius;

                let mut grounded = false;
                let mut center = origin + dir * wheel.rest_length;

                if let Some((_hit, toi)) = self.query_pipeline.cast_ray(
                    &self.bodies,
                    &self.colliders,
                    &ray,
                    max_dist,
                    true,
                    filter,
                ) {
                    if toi > wheel.radius {
                        let suspension_length = toi - wheel.radius;
                        center = origin + dir * suspension_length;
                        let compression =
                            (wheel.rest_length - suspension_length).clamp(0.0, wheel.max_length);

                        if compression > 0.0 {
                            grounded = true;
                            let hit_point = origin + dir * toi;

                            let r = hit_point - com;
                            let point_vel = linvel + angvel.cross(&r);

                            // Suspension: spring + one-way damper, with a
                            // deadzone against micro jitter.
                            let mut suspension_vel = point_vel.dot(&ground_n);
                            if suspension_vel.abs() < 0.05 {
                                suspension_vel = 0.0;
                            }
                            if suspension_vel > 0.0 {
                                suspension_vel *= 0.15;
                            }
                            let spring_force = wheel.stiffness * compression;
                            let damper_force = (-wheel.damping * suspension_vel)
                                .clamp(-spring_force * 0.6, spring_force * 0.6);
                            let mut normal_force =
                                (spring_force + damper_force).clamp(0.0, MAX_NORMAL_FORCE);
                            // Keep minimal support force to avoid tunneling.
                            if normal_force < 200.0 {
                                normal_force = 200.0;
                            }
                            impulses.push((ground_n * (normal_force * dt), Some(hit_point)));

                            // Steered wheel basis, projected on the ground plane.
                            let steer_rot = UnitQuaternion::from_axis_angle(
                                &Vector::y_axis(),
                                actuation.steer_angle.to_radians(),
                            );
                            let chassis_forward =
                                iso.rotation * (steer_rot * vector![0.0, 0.0, 1.0]);
                            let wheel_forward = {
                                let v = chassis_forward - ground_n * chassis_forward.dot(&ground_n);
                                if v.magnitude() > 1e-6 {
                                    v.normalize()
                                } else {
                                    vector![0.0, 0.0, 1.0]
                                }
                            };
                            let wheel_side = ground_n.cross(&wheel_forward);

                            let v_long = point_vel.dot(&wheel_forward);
                            let v_lat = point_vel.dot(&wheel_side);
                            let mass_share = mass * 0.25;

                            // Drive: motor torque at the contact patch.
                            if actuation.motor_torque != 0.0 {
                                impulses.push((
                                    wheel_forward * (actuation.motor_torque / wheel.radius * dt),
                                    None,
                                ));
                            }

                            // Brake: opposes longitudinal motion, never
                            // pushes; deadzone near standstill.
                            if actuation.brake_torque > 0.0 && v_long.abs() >= 0.05 {
                                let cap = actuation.brake_torque / wheel.radius * dt;
                                let desired = (-v_long * mass_share).clamp(-cap, cap);
                                impulses.push((wheel_forward * desired, None));
                            }

                            // Lateral grip fades as the slip curve is
                            // amplified past its nominal value.
                            let grip = (actuation.nominal_extremum_slip
                                / actuation.friction.extremum_slip)
                                .clamp(0.0, 1.0);
                            let max_lat = MU_LAT * normal_force * dt;
                            let lat = (-v_lat * mass_share * grip).clamp(-max_lat, max_lat);
                            if lat.abs() > 1e-6 {
                                let apply_point = hit_point + ground_n * (wheel.radius * 0.25);
                                impulses.push((wheel_side * lat, Some(apply_point)));
                            }
                        }
                    }
                }

                vehicle.wheel_poses.push(WheelPose {
                    wheel: wheel.id.to_string(),
                    center: [center.x, center.y, center.z],
                    steer_angle: actuation.steer_angle,
                    grounded,
                });
            }

            // ============================================================
            // 3) Apply impulses + the controller's velocity command
            // ============================================================
            if let Some(body) = self.bodies.get_mut(vehicle.body) {
                for (impulse, point) in impulses {
                    match point {
                        Some(p) => body.apply_impulse_at_point(impulse, p, true),
                        None => body.apply_impulse(impulse, true),
                    }
                }
                match velocity_cmd {
                    Some(VelocityCommand::Scale(factor)) => {
                        let v = *body.linvel();
                        body.set_linvel(v * factor, true);
                    }
                    Some(VelocityCommand::Stop) => {
                        body.set_linvel(vector![0.0, 0.0, 0.0], true);
                        body.set_angvel(vector![0.0, 0.0, 0.0], true);
                    }
                    None => {}
                }
                // Angular damping (kills roll/yaw oscillations).
                let factor = (-2.0 * dt).exp();
                let av = *body.angvel();
                body.set_angvel(av * factor, true);
            }
        }

        // ============================================================
        // 4) Step the pipeline
        // ============================================================
        let hooks = ();
        let mut events = ();
        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &mut events,
            &hooks,
        );

        // Safety: prevent bodies from exploding to insane coordinates.
        for (_, body) in self.bodies.iter_mut() {
            let pos = *body.translation();
            let bad = !pos.x.is_finite()
                || !pos.y.is_finite()
                || !pos.z.is_finite()
                || pos.x.abs() > 1_000.0
                || pos.y.abs() > 1_000.0
                || pos.z.abs() > 1_000.0;
            if bad {
                warn!("resetting exploded body from {pos:?}");
                body.set_translation(vector![0.0, SPAWN_HEIGHT, 0.0], true);
                body.set_linvel(vector![0.0, 0.0, 0.0], true);
                body.set_angvel(vector![0.0, 0.0, 0.0], true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn world_with_car() -> PhysicsWorld {
        let mut world = PhysicsWorld::new();
        world
            .spawn_vehicle("p1".to_string(), [0.0, 0.0, 0.0], HATCH)
            .unwrap();
        world
    }

    fn settle(world: &mut PhysicsWorld, ticks: usize) {
        for _ in 0..ticks {
            world.step(DT);
        }
    }

    #[test]
    fn car_settles_on_its_suspension() {
        let mut world = world_with_car();
        settle(&mut world, 300);
        let v = &world.vehicles["p1"];
        let body = world.bodies.get(v.body).unwrap();
        let pos = body.translation();
        assert!(pos.y.is_finite());
        assert!(pos.y > 0.0 && pos.y < 2.0, "chassis at y = {}", pos.y);
        assert!(v.wheel_poses.iter().all(|w| w.grounded));
    }

    #[test]
    fn accelerating_moves_the_car_forward() {
        let mut world = world_with_car();
        settle(&mut world, 120);

        world.apply_player_input(
            "p1",
            DriveIntent {
                accelerate: true,
                ..DriveIntent::default()
            },
        );
        settle(&mut world, 240);

        let v = &world.vehicles["p1"];
        let body = world.bodies.get(v.body).unwrap();
        assert!(
            body.translation().z > 1.0,
            "car did not move forward, z = {}",
            body.translation().z
        );
        assert!(v.controller.throttle_axis() > 0.9);
    }

    #[test]
    fn released_pedals_coast_the_car_to_rest() {
        let mut world = world_with_car();
        settle(&mut world, 120);
        world.apply_player_input(
            "p1",
            DriveIntent {
                accelerate: true,
                ..DriveIntent::default()
            },
        );
        settle(&mut world, 180);
        world.apply_player_input("p1", DriveIntent::default());
        settle(&mut world, 1800); // 30 s of coast-down

        let v = &world.vehicles["p1"];
        let body = world.bodies.get(v.body).unwrap();
        assert!(
            body.linvel().magnitude() < 0.5,
            "still moving at {} m/s",
            body.linvel().magnitude()
        );
    }

    #[test]
    fn removing_a_vehicle_frees_its_body() {
        let mut world = world_with_car();
        let handle = world.vehicles["p1"].body;
        world.remove_vehicle("p1");
        assert!(world.vehicles.is_empty());
        assert!(world.bodies.get(handle).is_none());
    }

    #[test]
    fn spawn_presets_alternate_by_join_order() {
        let mut world = PhysicsWorld::new();
        world
            .spawn_vehicle_for_player("a".to_string(), [0.0, 0.0, 0.0])
            .unwrap();
        world
            .spawn_vehicle_for_player("b".to_string(), [5.0, 0.0, 0.0])
            .unwrap();
        let a = world.vehicles["a"].controller.config().max_speed;
        let b = world.vehicles["b"].controller.config().max_speed;
        assert_ne!(a, b);
    }
}
