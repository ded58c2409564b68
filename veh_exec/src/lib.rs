//! # Vehicle library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access the control
//! modules of the vehicle executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Data store - the executable's per-cycle data
pub mod data_store;

/// Distance control module - drives both wheels through a commanded displacement
pub mod dist_ctrl;

/// Navigation control module - steps through the route and deals with hazards
pub mod nav_ctrl;

/// Executable parameters
pub mod params;

/// Simulated vehicle - stands in for the wheels, encoders, sensors and display
pub mod sim;
