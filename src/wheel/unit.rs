// ==============================================================================
// unit.rs — PER-WHEEL STATE + TWO-PHASE TICK PROTOCOL
// ------------------------------------------------------------------------------
// One WheelUnit owns everything a single wheel carries across ticks: spin,
// suspension displacement, steer angle, the per-tick torque accumulator and
// the grip-reference spin.
//
// pre_step:  probe -> suspension -> tire friction. Produces the force on the
//            chassis at the contact point plus a capped reaction on dynamic
//            contacted bodies. Applies no forces itself; the controller owns
//            the single accumulation point into the engine.
// post_step: integrates spin from the accumulated torque, clamps it, snaps to
//            the grip-reference spin when integration would cross it, and
//            advances the cosmetic rotation angle.
//
// A wheel that cannot produce a valid contact this tick degrades to airborne:
// zero force, drive torque attenuated. One bad contact never faults the tick.
// ==============================================================================

use rapier3d::na::{Unit, UnitQuaternion};
use rapier3d::prelude::{Isometry, Point, Real, RigidBodyHandle, Vector};

use crate::wheel::friction::{compute_tire_friction, point_velocity};
use crate::wheel::probe::{probe, ProbeContext};
use crate::wheel::suspension::compute_suspension_force;
use crate::wheel::types::{AssemblyError, WheelSpec};

/// Acceleration cap for the reaction force pushed into a contacted dynamic
/// body, m/s^2. Keeps a wheel from launching light debris.
const MAX_OTHER_BODY_ACC: Real = 500.0;
/// Drive torque attenuation while airborne (no ground reaction to work
/// against).
const AIRBORNE_TORQUE_SCALE: Real = 0.1;

/// Chassis kinematic state, read once per tick by the controller and shared
/// by all four wheels' pre_step.
#[derive(Clone, Copy)]
pub struct ChassisFrame {
    pub position: Isometry<Real>,
    pub linvel: Vector<Real>,
    pub angvel: Vector<Real>,
    /// Center of mass, world space.
    pub com: Point<Real>,
}

/// Forces one wheel wants applied this tick.
pub struct WheelForces {
    /// Force on the chassis, world space.
    pub force: Vector<Real>,
    /// Application point (the ground contact).
    pub at: Point<Real>,
    /// Capped equal-and-opposite force on the contacted dynamic body.
    pub reaction: Option<(RigidBodyHandle, Vector<Real>)>,
}

pub struct WheelUnit {
    spec: WheelSpec,

    // suspension state
    displacement: Real,
    on_ground: bool,

    // spin state
    spin: Real,          // rad/s
    grip_spin: Real,     // rad/s implied by rolling contact
    torque: Real,        // accumulated this tick, N*m
    rotation: Real,      // cosmetic accumulator, rad
    locked: bool,

    steer_angle: Real,   // rad

    warned_stale_contact: bool,
}

impl WheelUnit {
    pub fn new(spec: WheelSpec) -> Result<Self, AssemblyError> {
        spec.validate()?;
        Ok(Self {
            spec,
            displacement: 0.0,
            on_ground: false,
            spin: 0.0,
            grip_spin: 0.0,
            torque: 0.0,
            rotation: 0.0,
            locked: false,
            steer_angle: 0.0,
            warned_stale_contact: false,
        })
    }

    pub fn spec(&self) -> &WheelSpec {
        &self.spec
    }

    // --- telemetry ---

    pub fn spin(&self) -> Real {
        self.spin
    }

    pub fn displacement(&self) -> Real {
        self.displacement
    }

    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    pub fn rotation(&self) -> Real {
        self.rotation
    }

    // --- controller interface ---

    pub fn add_torque(&mut self, torque: Real) {
        self.torque += torque;
    }

    pub fn set_steer_angle(&mut self, angle: Real) {
        self.steer_angle = angle;
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Hub position in world space, suspension displacement included.
    pub fn wheel_center(&self, position: &Isometry<Real>) -> Point<Real> {
        let axis_up = position.rotation * Vector::y();
        position * self.spec.mount + axis_up * self.displacement
    }

    /// Probe the ground and turn the contact into suspension + tire forces.
    /// Returns `None` when airborne or degraded; that wheel simply
    /// contributes nothing this tick.
    pub fn pre_step(
        &mut self,
        dt: Real,
        ctx: &ProbeContext<'_>,
        chassis: &ChassisFrame,
    ) -> Option<WheelForces> {
        if dt <= 0.0 {
            return None;
        }

        let was_grounded = self.on_ground;
        self.on_ground = false;

        let rot = chassis.position.rotation;
        let center = chassis.position * self.spec.mount;
        let axis_up = rot * Vector::y();

        // Steered rolling frame.
        let chassis_fwd = rot * -Vector::z();
        let steer_rot =
            UnitQuaternion::from_axis_angle(&Unit::new_normalize(axis_up), self.steer_angle);
        let wheel_fwd = steer_rot * chassis_fwd;
        let mut wheel_left = axis_up.cross(&wheel_fwd);
        if wheel_left.norm_squared() < 1e-12 {
            // Degenerate steering frame; nothing sensible to do this tick.
            return self.go_airborne();
        }
        wheel_left.normalize_mut();
        let wheel_up = wheel_fwd.cross(&wheel_left);

        let result = probe(ctx, &self.spec, center, axis_up, wheel_fwd, wheel_up);
        if result.stale_hit && !self.warned_stale_contact {
            self.warned_stale_contact = true;
            println!(
                "wheel {}: ray hit an unresolvable collider, treating as airborne",
                self.spec.debug_id
            );
        }

        let Some(sample) = result.sample else {
            return self.go_airborne();
        };

        // Resolve the contacted body up front; a hit that claims a body which
        // no longer exists degrades to airborne for this tick.
        let other = match sample.body {
            Some(handle) => match ctx.bodies.get(handle) {
                Some(body) => Some((handle, body)),
                None => {
                    if !self.warned_stale_contact {
                        self.warned_stale_contact = true;
                        println!(
                            "wheel {}: contact reported a vanished body, treating as airborne",
                            self.spec.debug_id
                        );
                    }
                    return self.go_airborne();
                }
            },
            None => None,
        };

        let mut normal = sample.normal;
        if normal.norm_squared() > 0.0 {
            normal.normalize_mut();
        } else {
            normal = axis_up;
        }

        let suspension = compute_suspension_force(
            &self.spec,
            sample.fraction,
            was_grounded.then_some(self.displacement),
            normal.dot(&axis_up),
            dt,
        );
        self.displacement = suspension.displacement;
        self.on_ground = true;

        let mut force = suspension.magnitude * axis_up;

        // Relative rim velocity at the contact: chassis point velocity, plus
        // the rim's own surface speed, minus whatever the ground is doing.
        let chassis_vel =
            point_velocity(chassis.linvel, chassis.angvel, chassis.com, sample.point);
        let rim_vel = self.spin * wheel_left.cross(&(sample.point - center));
        let other_vel = other
            .map(|(_, body)| {
                point_velocity(*body.linvel(), *body.angvel(), *body.center_of_mass(), sample.point)
            })
            .unwrap_or_else(Vector::zeros);
        let rel_vel = chassis_vel + rim_vel - other_vel;

        let hub_vel = point_velocity(chassis.linvel, chassis.angvel, chassis.com, center);

        if let Some(tire) = compute_tire_friction(
            self.spec.side_friction,
            self.spec.forward_friction,
            self.spec.radius,
            normal,
            wheel_fwd,
            rel_vel,
            hub_vel,
            suspension.magnitude,
        ) {
            force += tire.force;
            self.torque += tire.spin_torque;
            self.grip_spin = tire.grip_spin;
        }

        let reaction = other.and_then(|(handle, body)| {
            if !body.is_dynamic() {
                return None;
            }
            let max_force = MAX_OTHER_BODY_ACC * body.mass();
            let mut reaction = -force;
            let mag_sq = reaction.norm_squared();
            if mag_sq > max_force * max_force {
                reaction *= max_force / mag_sq.sqrt();
            }
            Some((handle, reaction))
        });

        Some(WheelForces { force, at: sample.point, reaction })
    }

    fn go_airborne(&mut self) -> Option<WheelForces> {
        self.displacement = 0.0;
        self.torque *= AIRBORNE_TORQUE_SCALE;
        None
    }

    /// Integrate spin from the torque accumulated since the last tick.
    pub fn post_step(&mut self, dt: Real) {
        if dt <= 0.0 {
            return;
        }

        if self.locked {
            self.spin = 0.0;
            self.torque = 0.0;
            return;
        }

        let prev_spin = self.spin;
        let mut spin = prev_spin + self.torque * dt / self.spec.inertia;
        self.torque = 0.0;

        // Friction must not push the wheel past the kinematically consistent
        // rolling speed; crossing the grip reference means it tried to.
        if self.on_ground
            && ((prev_spin > self.grip_spin && spin < self.grip_spin)
                || (prev_spin < self.grip_spin && spin > self.grip_spin))
        {
            spin = self.grip_spin;
        }

        self.spin = spin.clamp(-self.spec.max_spin, self.spec.max_spin);
        self.rotation += self.spin * dt;
    }
}
