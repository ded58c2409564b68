//! # Equipment Interface
//!
//! This module defines the traits through which the control software talks to the vehicle's
//! equipment. Implementations live either on the hardware side or in the simulation.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod display;
pub mod hazard;
pub mod motor;
pub mod odometer;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use display::{NullDisplay, StatusDisplay};
pub use hazard::{HazardReading, HazardSensor, TravelDir};
pub use motor::{MotorDrive, PowerPair, POWER_LIMIT};
pub use odometer::{ClickCounter, Odometer, SharedOdometer};
