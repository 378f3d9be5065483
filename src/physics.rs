// ==============================================================================
// physics.rs — RAPIER WORLD + VEHICLE REGISTRY
// ------------------------------------------------------------------------------
// Owns the rapier sets and pipelines, a large static ground slab, and one
// Vehicle per connected player. step() runs the per-tick protocol: refresh the
// query pipeline, tick every vehicle controller (which probes, applies wheel
// impulses and integrates spin), then step the rigid-body pipeline.
// ==============================================================================

use rapier3d::prelude::*;
use rand::Rng;
use std::collections::HashMap;

use crate::vehicle::{Vehicle, VehicleConfig, ROADSTER};
use crate::wheel::types::AssemblyError;

const GROUP_GROUND: Group = Group::from_bits_truncate(0b0001);
const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);

/// Fixed server convention: chassis center height at spawn. The car drops
/// onto its suspension from here.
const SPAWN_HEIGHT: Real = 1.3;
/// Bodies past this coordinate (or with non-finite position) get reset.
const WORLD_LIMIT: Real = 1_000.0;

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

impl PhysicsWorld {
    pub fn new() -> Self {
        let gravity = vector![0.0, -9.81, 0.0];

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // Large static ground slab, top surface exactly at y = 0.
        let ground = bodies.insert(
            RigidBodyBuilder::fixed()
                .translation(vector![0.0, -1.0, 0.0])
                .build(),
        );
        colliders.insert_with_parent(
            ColliderBuilder::cuboid(500.0, 1.0, 500.0)
                .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
                .friction(1.2)
                .restitution(0.0)
                .build(),
            ground,
            &mut bodies,
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

    /// Spawn a car for this player: dynamic chassis body with a frictionless
    /// box collider (all ground interaction goes through the wheel model) and
    /// a Vehicle assembled from the preset config.
    pub fn spawn_vehicle_for_player(&mut self, id: String) -> Result<RigidBodyHandle, AssemblyError> {
        self.spawn_vehicle_with_config(id, ROADSTER)
    }

    pub fn spawn_vehicle_with_config(
        &mut self,
        id: String,
        config: VehicleConfig,
    ) -> Result<RigidBodyHandle, AssemblyError> {
        let mut rng = rand::thread_rng();
        let spawn_x: Real = rng.gen_range(-2.0..2.0);
        let spawn_z: Real = rng.gen_range(-2.0..2.0);

        let [hx, hy, hz] = config.chassis_half_extents;
        let volume = 8.0 * hx * hy * hz;
        let density = config.mass / volume;

        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![spawn_x, SPAWN_HEIGHT, spawn_z])
            .linear_damping(config.linear_damping)
            .angular_damping(config.angular_damping)
            .ccd_enabled(true)
            .build();

        // Chassis friction must stay zero: tire forces come from the wheel
        // model, not from the box scraping the ground.
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND))
            .density(density)
            .friction(0.0)
            .restitution(0.0)
            .build();

        let handle = self.bodies.insert(rb);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        let vehicle = match Vehicle::new(config, handle) {
            Ok(v) => v,
            Err(e) => {
                // Roll the half-spawned body back out of the world.
                self.bodies.remove(
                    handle,
                    &mut self.island_manager,
                    &mut self.colliders,
                    &mut self.joints,
                    &mut self.multibody_joints,
                    true,
                );
                return Err(e);
            }
        };
        self.vehicles.insert(id.clone(), vehicle);

        println!("🚗 Spawned vehicle for player {} (body = {:?})", id, handle);
        Ok(handle)
    }

    pub fn remove_player(&mut self, id: &str) {
        if let Some(vehicle) = self.vehicles.remove(id) {
            self.bodies.remove(
                vehicle.body,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.joints,
                &mut self.multibody_joints,
                true,
            );
        }
    }

    /// Store input on the player's vehicle; forces are applied in `step`.
    pub fn apply_player_input(&mut self, id: &str, throttle: Real, steer: Real, handbrake: bool) {
        if let Some(v) = self.vehicles.get_mut(id) {
            v.set_input(throttle, steer);
            v.set_handbrake(handbrake);
        }
    }

    pub fn step(&mut self, dt: Real) {
        // 1) Fresh spatial index for this tick's wheel probes.
        self.query_pipeline.update(&self.colliders);

        // 2) Vehicle controllers: probe, wheel impulses, spin integration.
        for vehicle in self.vehicles.values_mut() {
            vehicle.step(dt, &mut self.bodies, &self.colliders, &self.query_pipeline);
        }

        // 3) Rigid-body step.
        let hooks = ();
        let events = ();
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
            &hooks,
            &events,
        );

        // 4) Failsafe: a body that escaped to non-finite or absurd
        //    coordinates is reset instead of poisoning the whole world.
        for (_, body) in self.bodies.iter_mut() {
            let pos = *body.translation();
            let bad = !pos.x.is_finite()
                || !pos.y.is_finite()
                || !pos.z.is_finite()
                || pos.x.abs() > WORLD_LIMIT
                || pos.y.abs() > WORLD_LIMIT
                || pos.z.abs() > WORLD_LIMIT;

            if bad {
                body.set_translation(vector![0.0, SPAWN_HEIGHT, 0.0], true);
                body.set_linvel(vector![0.0, 0.0, 0.0], true);
                body.set_angvel(vector![0.0, 0.0, 0.0], true);
                println!("⚠️ Reset exploding body back to spawn");
            }
        }
    }
}
