//! Parameters structure for NavCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for navigation control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavCtrlParams {
    // ---- MARKERS ----
    /// Units: milliseconds
    pub splash_ms: u64,

    /// Units: milliseconds
    pub road_info_ms: u64,

    /// Time spent deploying the sensor.
    ///
    /// Units: milliseconds
    pub deploy_ms: u64,

    // ---- LEGS ----
    /// Zero power is held for this long at the start of every leg, letting the vehicle come to
    /// rest before the leg is measured.
    ///
    /// Units: milliseconds
    pub settle_ms: u64,

    /// When resuming a straight leg, resume both wheels with the mean of their remainders.
    pub average_straight_remainder: bool,

    // ---- HAZARD ----
    /// How long to wait for a hazard to clear before bypassing it.
    ///
    /// Units: milliseconds
    pub hazard_timeout_ms: u64,

    /// Power of the reversed pulse used to brake when a hazard is detected.
    pub brake_power: i32,

    /// Units: milliseconds
    pub brake_ms: u64,

    /// Veer added to the left wheel, and removed from the right, when a hazard is seen on a leg
    /// with `adjust` avoidance.
    ///
    /// Units: millimeters
    pub adjust_veer_mm: f64,

    // ---- BYPASS ----
    /// Maximum power of all bypass legs.
    pub bypass_power: f64,

    /// Distance backed off from the obstacle before turning away.
    ///
    /// Units: millimeters
    pub clearance_mm: f64,

    /// Sideways distance driven to get out of the obstacle's way.
    ///
    /// Units: millimeters
    pub lateral_offset_mm: f64,

    /// Distance driven alongside the obstacle to get past it.
    ///
    /// Units: millimeters
    pub pass_length_mm: f64,

    /// Distance each wheel travels in a 90 degree turn on the spot.
    ///
    /// Units: millimeters
    pub quarter_turn_arc_mm: f64,

    /// Any single bypass leg taking longer than this abandons the route.
    ///
    /// Units: milliseconds
    pub bypass_phase_timeout_ms: u64,

    /// Number of bypass attempts before giving up. Zero retries forever.
    pub max_bypass_attempts: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for NavCtrlParams {
    fn default() -> Self {
        Self {
            splash_ms: 2000,
            road_info_ms: 1500,
            deploy_ms: 3000,
            settle_ms: 200,
            average_straight_remainder: false,
            hazard_timeout_ms: 4000,
            brake_power: 40,
            brake_ms: 150,
            adjust_veer_mm: 15.0,
            bypass_power: 45.0,
            clearance_mm: 60.0,
            lateral_offset_mm: 150.0,
            pass_length_mm: 300.0,
            quarter_turn_arc_mm: 94.0,
            bypass_phase_timeout_ms: 8000,
            max_bypass_attempts: 3,
        }
    }
}

impl NavCtrlParams {
    /// The bypass attempt limit, `None` if unbounded.
    pub fn bypass_attempt_limit(&self) -> Option<u32> {
        match self.max_bypass_attempts {
            0 => None,
            n => Some(n),
        }
    }
}
