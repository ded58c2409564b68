//! # Vehicle interface crate.
//!
//! Provides the interfaces between the vehicle's control software and the equipment it drives,
//! along with the route definitions shared by the executable and the utility crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Equipment interfaces (odometer, motors, hazard sensors, display)
pub mod eqpt;

/// Route table definitions
pub mod route;

/// Sensor threshold calibration
pub mod calib;
