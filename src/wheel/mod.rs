//! wheel - raycast suspension, slip-curve tire friction and spin integration
//! for a single wheel.

pub mod friction;
pub mod probe;
pub mod suspension;
pub mod types;
pub mod unit;

pub use probe::{probe, ProbeContext, ProbeResult};
pub use types::{AssemblyError, ContactSample, WheelSpec};
pub use unit::{ChassisFrame, WheelForces, WheelUnit};
