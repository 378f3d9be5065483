//! Core shared types for the `wheel` module.

use rapier3d::prelude::{Point, Real, RigidBodyHandle, Vector};
use thiserror::Error;

/// Rejected vehicle/wheel configuration. Raised at assembly time only;
/// nothing on the per-tick path returns these.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("wheel {id}: radius must be positive, got {value}")]
    InvalidRadius { id: String, value: Real },

    #[error("wheel {id}: suspension travel must be positive, got {value}")]
    InvalidTravel { id: String, value: Real },

    #[error("wheel {id}: rotational inertia must be positive, got {value}")]
    InvalidInertia { id: String, value: Real },

    #[error("wheel {id}: spring rate must be non-negative, got {value}")]
    InvalidSpring { id: String, value: Real },

    #[error("wheel {id}: damping must be non-negative, got {value}")]
    InvalidDamping { id: String, value: Real },

    #[error("wheel {id}: ray fan needs at least one ray")]
    NoRays { id: String },

    #[error("wheel {id}: maximum spin rate must be positive, got {value}")]
    InvalidMaxSpin { id: String, value: Real },

    #[error("chassis mass must be positive, got {value}")]
    InvalidMass { value: Real },
}

/// Immutable per-wheel parameters, fixed at vehicle assembly.
#[derive(Clone, Debug)]
pub struct WheelSpec {
    pub debug_id: String,        // "FL", "FR", "RL", "RR"
    pub mount: Point<Real>,      // hub position in chassis local space
    pub radius: Real,            // m
    pub travel: Real,            // suspension travel length, m
    pub spring: Real,            // N/m
    pub damping: Real,           // N*s/m
    pub side_friction: Real,     // lateral friction coefficient
    pub forward_friction: Real,  // longitudinal friction coefficient
    pub ray_count: u32,          // rays in the contact fan, >= 1
    pub max_spin: Real,          // rad/s
    pub inertia: Real,           // kg*m^2 about the axle
    pub drive: bool,             // receives drive torque
    pub steer: bool,             // follows the steering angle
}

impl WheelSpec {
    /// Length of the suspension ray: full wheel diameter plus travel.
    #[inline]
    pub fn ray_length(&self) -> Real {
        2.0 * self.radius + self.travel
    }

    pub fn validate(&self) -> Result<(), AssemblyError> {
        let id = || self.debug_id.clone();
        if self.radius <= 0.0 {
            return Err(AssemblyError::InvalidRadius { id: id(), value: self.radius });
        }
        if self.travel <= 0.0 {
            return Err(AssemblyError::InvalidTravel { id: id(), value: self.travel });
        }
        if self.inertia <= 0.0 {
            return Err(AssemblyError::InvalidInertia { id: id(), value: self.inertia });
        }
        if self.spring < 0.0 {
            return Err(AssemblyError::InvalidSpring { id: id(), value: self.spring });
        }
        if self.damping < 0.0 {
            return Err(AssemblyError::InvalidDamping { id: id(), value: self.damping });
        }
        if self.ray_count == 0 {
            return Err(AssemblyError::NoRays { id: id() });
        }
        if self.max_spin <= 0.0 {
            return Err(AssemblyError::InvalidMaxSpin { id: id(), value: self.max_spin });
        }
        Ok(())
    }
}

/// Authoritative ground contact for one wheel, valid for the current tick only.
#[derive(Clone, Copy, Debug)]
pub struct ContactSample {
    /// Parametric depth along the suspension ray, 0..1. Smaller = deeper.
    pub fraction: Real,
    /// World contact point.
    pub point: Point<Real>,
    /// Ground surface normal (unit).
    pub normal: Vector<Real>,
    /// Body the wheel is resting on. `None` for parentless (static) colliders.
    pub body: Option<RigidBodyHandle>,
}
