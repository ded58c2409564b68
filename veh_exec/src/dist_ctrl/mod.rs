//! # Distance control module
//!
//! Converts a commanded relative displacement of each wheel into a motor power pair, once per
//! tick. Each wheel follows a bell-shaped velocity profile which peaks early in the leg and leaves
//! the remainder for deceleration. On top of the profile:
//!
//! - a stuck wheel creeps up in power until it moves again,
//! - the encoder's counting direction is only reversed once the wheel is stationary,
//! - a static bias and a lateral correction keep straight legs straight.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;
mod wheel;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;
pub use wheel::{DirState, WheelState};
