//! Raycast-vehicle physics server: spring-damper suspension, slip-curve tire
//! friction and wheel spin integration on top of rapier3d, with a WebSocket
//! input/snapshot surface.

pub mod net;
pub mod physics;
pub mod state;
pub mod vehicle;
pub mod wheel;
