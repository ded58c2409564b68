//! # Hazard Sensor Interface
//!
//! A hazard sensor reports whether an obstacle blocks the vehicle's path. Only a binary reading is
//! exposed, the underlying measurement (ultrasonic range, colour sensor proximity, etc.) is the
//! sensor's own concern.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Direction of travel along the vehicle's longitudinal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TravelDir {
    Forward,
    Backward,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single sample of the hazard sensors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardReading {
    /// An obstacle is in front of the vehicle
    pub forward: bool,

    /// An obstacle is behind the vehicle
    pub backward: bool,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait HazardSensor {
    fn is_hazard_forward(&mut self) -> bool;

    /// Vehicles without a rear sensor never report a backward hazard.
    fn is_hazard_backward(&mut self) -> bool {
        false
    }

    /// Sample both directions.
    fn read(&mut self) -> HazardReading {
        HazardReading {
            forward: self.is_hazard_forward(),
            backward: self.is_hazard_backward(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TravelDir {
    pub fn reversed(self) -> Self {
        match self {
            TravelDir::Forward => TravelDir::Backward,
            TravelDir::Backward => TravelDir::Forward,
        }
    }

    /// `1.0` for forward travel, `-1.0` for backward.
    pub fn sign(self) -> f64 {
        match self {
            TravelDir::Forward => 1.0,
            TravelDir::Backward => -1.0,
        }
    }
}

impl HazardReading {
    pub const CLEAR: HazardReading = HazardReading {
        forward: false,
        backward: false,
    };

    /// Whether there is a hazard in the given direction of travel.
    pub fn is_hazard(&self, dir: TravelDir) -> bool {
        match dir {
            TravelDir::Forward => self.forward,
            TravelDir::Backward => self.backward,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
