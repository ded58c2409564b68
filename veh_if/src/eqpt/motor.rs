//! # Motor Drive Interface

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum magnitude of power accepted by a motor drive.
pub const POWER_LIMIT: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Signed power demand for the left and right motors, in the range `[-100, 100]`.
///
/// Positive power drives the wheel forwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerPair {
    pub left: i32,
    pub right: i32,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Actuates the two drive motors.
pub trait MotorDrive {
    /// Command the motors. Callers shall clamp the demand first, however drives must also clamp
    /// any demand outside of `[-POWER_LIMIT, POWER_LIMIT]`.
    fn set_motors(&mut self, power: PowerPair);
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PowerPair {
    pub const ZERO: PowerPair = PowerPair { left: 0, right: 0 };

    pub fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    /// Return this pair limited to the motor drive's accepted range.
    pub fn clamped(self) -> Self {
        Self {
            left: self.left.max(-POWER_LIMIT).min(POWER_LIMIT),
            right: self.right.max(-POWER_LIMIT).min(POWER_LIMIT),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.left == 0 && self.right == 0
    }
}

impl From<(i32, i32)> for PowerPair {
    fn from(pair: (i32, i32)) -> Self {
        Self::new(pair.0, pair.1)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
