// ==============================================================================
// vehicle.rs — FOUR-WHEEL CONTROLLER + INPUT SMOOTHING
// ------------------------------------------------------------------------------
// Owns the four WheelUnits and drives the two-phase tick protocol:
//
//   rate-limit throttle/steer -> write steer angles + drive torque
//   -> pre_step ALL wheels -> apply collected impulses in one pass
//   -> post_step ALL wheels
//
// PreStep for every wheel runs before any wheel integrates, so no wheel's
// suspension or friction ever sees a partially-integrated sibling. All
// impulses enter the engine at a single accumulation point between the two
// phases.
// ==============================================================================

use rapier3d::prelude::{
    ColliderSet, Point, QueryPipeline, Real, RigidBodyHandle, RigidBodySet,
};
use serde::Serialize;

use crate::wheel::probe::ProbeContext;
use crate::wheel::types::{AssemblyError, WheelSpec};
use crate::wheel::unit::{ChassisFrame, WheelForces, WheelUnit};

/// Gravity used when sizing the suspension, m/s^2.
const GRAVITY: Real = 9.81;
/// Fraction of the travel the static load should compress the spring to.
const SPRING_FRAC: Real = 0.45;
/// Damper fraction of critical, keeps some bounce.
const DAMPING_FRAC: Real = 0.8;
/// Below this spin rate a wheel with released throttle is braked to a halt.
const ROLLING_STOP_SPIN: Real = 0.8;

const WHEEL_IDS: [&str; 4] = ["FL", "FR", "RL", "RR"];

/// Fixed vehicle parameters. Wheel spring, damper and inertia are derived
/// from these at assembly time, see [`VehicleConfig::wheel_rates`].
pub struct VehicleConfig {
    pub mass: Real,                     // kg
    pub chassis_half_extents: [Real; 3],
    pub linear_damping: Real,           // drag
    pub angular_damping: Real,          // rotational drag

    /// Hub mount points in chassis space, FL/FR/RL/RR. Forward is -Z.
    pub wheel_mounts: [[Real; 3]; 4],
    pub wheel_radius: Real,             // m
    pub wheel_travel: Real,             // m
    pub ray_count: u32,                 // rays per wheel contact fan
    pub side_friction: Real,
    pub forward_friction: Real,
    pub max_spin: Real,                 // rad/s

    pub steer_angle_limit: Real,        // rad, at full steer input
    pub max_torque: Real,               // N*m per driven wheel at full throttle
    pub throttle_rate: Real,            // input units per second
    pub steer_rate: Real,               // input units per second
}

pub const ROADSTER: VehicleConfig = VehicleConfig {
    mass: 1350.0,
    chassis_half_extents: [1.0, 0.35, 2.1],
    linear_damping: 0.08,
    angular_damping: 0.6,

    wheel_mounts: [
        [-0.8, -0.3, -1.5], // FL
        [0.8, -0.3, -1.5],  // FR
        [-0.8, -0.3, 1.5],  // RL
        [0.8, -0.3, 1.5],   // RR
    ],
    wheel_radius: 0.35,
    wheel_travel: 0.25,
    ray_count: 3,
    side_friction: 3.2,
    forward_friction: 5.0,
    max_spin: 200.0,

    steer_angle_limit: 0.6,
    max_torque: 600.0,
    throttle_rate: 10.0,
    steer_rate: 5.0,
};

impl VehicleConfig {
    /// Derive per-wheel (spring, damping, inertia) from chassis mass and
    /// travel: the spring carries a quarter of the weight at `SPRING_FRAC`
    /// compression, the damper sits at a fraction of critical, and the
    /// inertia is a solid disc weighing 3% of the chassis.
    fn wheel_rates(&self) -> (Real, Real, Real) {
        let corner_mass = self.mass / 4.0;
        let spring = corner_mass * GRAVITY / (self.wheel_travel * SPRING_FRAC);
        let damping = 2.0 * (spring * self.mass).sqrt() * 0.25 * DAMPING_FRAC;
        let wheel_mass = 0.03 * self.mass;
        let inertia = 0.5 * self.wheel_radius * self.wheel_radius * wheel_mass;
        (spring, damping, inertia)
    }
}

/// Per-wheel read-only state for snapshots and rendering.
#[derive(Clone, Debug, Serialize)]
pub struct WheelTelemetry {
    pub id: String,
    pub spin: Real,
    pub displacement: Real,
    pub on_ground: bool,
    pub rotation: Real,
}

pub struct Vehicle {
    pub body: RigidBodyHandle, // the chassis body
    config: VehicleConfig,
    wheels: Vec<WheelUnit>,

    desired_throttle: Real, // -1.0 (full reverse) .. 1.0 (full forward)
    desired_steer: Real,    // -1.0 (full left) .. 1.0 (full right)
    throttle: Real,         // rate-limited toward desired
    steer: Real,            // rate-limited toward desired
    handbrake: bool,
}

/// Move `current` toward `desired` by at most `max_delta`, symmetric for
/// increase and decrease.
#[inline]
fn rate_limit(current: Real, desired: Real, max_delta: Real) -> Real {
    current + (desired - current).clamp(-max_delta, max_delta)
}

impl Vehicle {
    /// Assemble the four wheels from the config. Front wheels steer, rear
    /// wheels drive. Every spec is validated here; nothing on the tick path
    /// checks configuration again.
    pub fn new(config: VehicleConfig, body: RigidBodyHandle) -> Result<Self, AssemblyError> {
        if config.mass <= 0.0 {
            return Err(AssemblyError::InvalidMass { value: config.mass });
        }

        let (spring, damping, inertia) = config.wheel_rates();

        let mut wheels = Vec::with_capacity(WHEEL_IDS.len());
        for (i, id) in WHEEL_IDS.iter().enumerate() {
            let front = i < 2;
            wheels.push(WheelUnit::new(WheelSpec {
                debug_id: id.to_string(),
                mount: Point::from(config.wheel_mounts[i]),
                radius: config.wheel_radius,
                travel: config.wheel_travel,
                spring,
                damping,
                side_friction: config.side_friction,
                forward_friction: config.forward_friction,
                ray_count: config.ray_count,
                max_spin: config.max_spin,
                inertia,
                drive: !front,
                steer: front,
            })?);
        }

        Ok(Self {
            body,
            config,
            wheels,
            desired_throttle: 0.0,
            desired_steer: 0.0,
            throttle: 0.0,
            steer: 0.0,
            handbrake: false,
        })
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    /// Desired input for the next ticks; the live values chase these at the
    /// configured rates.
    pub fn set_input(&mut self, throttle: Real, steer: Real) {
        self.desired_throttle = throttle.clamp(-1.0, 1.0);
        self.desired_steer = steer.clamp(-1.0, 1.0);
    }

    /// Locks or releases the rear wheels.
    pub fn set_handbrake(&mut self, on: bool) {
        self.handbrake = on;
        for wheel in &mut self.wheels {
            if wheel.spec().drive {
                wheel.set_locked(on);
            }
        }
    }

    pub fn throttle(&self) -> Real {
        self.throttle
    }

    pub fn steer(&self) -> Real {
        self.steer
    }

    pub fn handbrake(&self) -> bool {
        self.handbrake
    }

    pub fn wheels(&self) -> &[WheelUnit] {
        &self.wheels
    }

    pub fn wheels_mut(&mut self) -> &mut [WheelUnit] {
        &mut self.wheels
    }

    pub fn wheel_telemetry(&self) -> Vec<WheelTelemetry> {
        self.wheels
            .iter()
            .map(|w| WheelTelemetry {
                id: w.spec().debug_id.clone(),
                spin: w.spin(),
                displacement: w.displacement(),
                on_ground: w.on_ground(),
                rotation: w.rotation(),
            })
            .collect()
    }

    /// One full simulation tick for this vehicle.
    pub fn step(
        &mut self,
        dt: Real,
        bodies: &mut RigidBodySet,
        colliders: &ColliderSet,
        query: &QueryPipeline,
    ) {
        if dt <= 0.0 {
            return;
        }

        self.throttle = rate_limit(
            self.throttle,
            self.desired_throttle,
            self.config.throttle_rate * dt,
        );
        self.steer = rate_limit(self.steer, self.desired_steer, self.config.steer_rate * dt);

        let steer_angle = self.config.steer_angle_limit * self.steer;
        let drive_torque = self.config.max_torque * self.throttle;

        for wheel in &mut self.wheels {
            if wheel.spec().steer {
                wheel.set_steer_angle(steer_angle);
            }
            if wheel.spec().drive {
                wheel.add_torque(drive_torque);
            }
            // Rolling-stop assist: with the throttle released a nearly
            // stopped wheel is braked to a complete halt instead of creeping.
            if self.desired_throttle == 0.0 && wheel.spin().abs() < ROLLING_STOP_SPIN {
                wheel.add_torque(-wheel.spin());
            }
        }

        let Some(body) = bodies.get(self.body) else {
            return;
        };
        let chassis = ChassisFrame {
            position: *body.position(),
            linvel: *body.linvel(),
            angvel: *body.angvel(),
            com: *body.center_of_mass(),
        };

        // Phase 1: contact + force computation for every wheel, no engine
        // mutation yet. A wheel that degrades simply contributes no batch.
        let mut batches: Vec<WheelForces> = Vec::with_capacity(self.wheels.len());
        {
            let ctx = ProbeContext {
                query,
                bodies: &*bodies,
                colliders,
                exclude: self.body,
            };
            for wheel in &mut self.wheels {
                if let Some(forces) = wheel.pre_step(dt, &ctx, &chassis) {
                    batches.push(forces);
                }
            }
        }

        // Single accumulation point into the engine: forces become impulses
        // at the contact points, chassis first, then capped reactions on
        // whatever the wheels are standing on.
        for batch in &batches {
            if let Some(body) = bodies.get_mut(self.body) {
                body.apply_impulse_at_point(batch.force * dt, batch.at, true);
            }
            if let Some((handle, reaction)) = batch.reaction {
                if let Some(other) = bodies.get_mut(handle) {
                    other.apply_impulse_at_point(reaction * dt, batch.at, true);
                }
            }
        }

        // Phase 2: spin integration, only after every wheel produced forces.
        for wheel in &mut self.wheels {
            wheel.post_step(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::RigidBodyHandle;

    const DT: Real = 1.0 / 60.0;

    #[test]
    fn rate_limit_reaches_target_linearly() {
        // desired = 1.0 at rate r: after n ticks the value is min(1, n*dt*r).
        let rate = ROADSTER.steer_rate;
        let mut current: Real = 0.0;
        for n in 1..=20 {
            current = rate_limit(current, 1.0, rate * DT);
            let expected = (n as Real * DT * rate).min(1.0);
            assert!((current - expected).abs() < 1e-5, "tick {n}");
        }
        assert!((current - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rate_limit_is_symmetric() {
        let up = rate_limit(0.0, 1.0, 0.25);
        let down = rate_limit(0.0, -1.0, 0.25);
        assert!((up + down).abs() < 1e-6);
        // Within one step of the target: lands exactly on it.
        assert_eq!(rate_limit(0.9, 1.0, 0.25), 1.0);
    }

    #[test]
    fn roadster_assembles() {
        let v = Vehicle::new(ROADSTER, RigidBodyHandle::invalid()).unwrap();
        assert_eq!(v.wheels().len(), 4);
        // Front steers, rear drives.
        assert!(v.wheels()[0].spec().steer && !v.wheels()[0].spec().drive);
        assert!(v.wheels()[3].spec().drive && !v.wheels()[3].spec().steer);
    }

    #[test]
    fn derived_rates_are_sane() {
        let (spring, damping, inertia) = ROADSTER.wheel_rates();
        // Static sag at SPRING_FRAC of travel: displacement * spring carries
        // a quarter of the weight.
        let sag = ROADSTER.wheel_travel * SPRING_FRAC;
        assert!((sag * spring - ROADSTER.mass / 4.0 * GRAVITY).abs() < 1.0);
        assert!(damping > 0.0 && inertia > 0.0);
    }

    #[test]
    fn zero_mass_rejected() {
        let cfg = VehicleConfig { mass: 0.0, ..ROADSTER };
        assert!(matches!(
            Vehicle::new(cfg, RigidBodyHandle::invalid()),
            Err(AssemblyError::InvalidMass { .. })
        ));
    }

    #[test]
    fn input_is_clamped() {
        let mut v = Vehicle::new(ROADSTER, RigidBodyHandle::invalid()).unwrap();
        v.set_input(4.0, -7.0);
        assert_eq!(v.desired_throttle, 1.0);
        assert_eq!(v.desired_steer, -1.0);
    }

    #[test]
    fn handbrake_locks_rear_wheels_only() {
        let mut v = Vehicle::new(ROADSTER, RigidBodyHandle::invalid()).unwrap();
        v.set_handbrake(true);
        for w in v.wheels() {
            assert_eq!(w.locked(), w.spec().drive);
        }
        v.set_handbrake(false);
        assert!(v.wheels().iter().all(|w| !w.locked()));
    }
}
