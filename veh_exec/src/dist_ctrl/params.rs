//! Parameters structure for DistCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for distance control.
///
/// Any item missing from the parameter file takes the value tuned for the reference vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistCtrlParams {
    // ---- VELOCITY PROFILE ----
    /// Peak height of the bell curve above the base power, before scaling by the target length.
    ///
    /// Units: power
    pub amplitude: f64,

    /// Target length at which the amplitude reaches `atan(1)` of its maximum.
    ///
    /// Units: millimeters
    pub amplitude_scale_mm: f64,

    /// Exponent shaping the width of the bell curve. Valid range: (0, 3].
    pub width_exponent: f64,

    /// The bell curve peaks at `target / offset_fraction` of remaining distance. Must be > 1.
    pub offset_fraction: f64,

    /// Power added underneath the bell curve, must overcome static friction.
    ///
    /// Units: power
    pub base_power: f64,

    /// Lower limit of the commanded power.
    pub min_power: f64,

    /// Upper limit of the commanded power.
    pub max_power: f64,

    /// A wheel is considered arrived once its error is within this band.
    ///
    /// Units: millimeters
    pub tolerance_mm: f64,

    // ---- CORRECTIONS ----
    /// Static left/right power imbalance correction. Positive values give more power to the left
    /// motor and less to the right.
    ///
    /// Units: power
    pub bias: f64,

    /// Gain applied to the difference in absolute remaining error between the wheels.
    ///
    /// Units: power/millimeter
    pub lateral_gain: f64,

    /// Maximum magnitude of the lateral correction.
    ///
    /// Units: power
    pub lateral_clamp: f64,

    // ---- STALL RECOVERY ----
    /// A change in error at or below this means the wheel hasn't moved.
    ///
    /// Units: millimeters
    pub stuck_epsilon_mm: f64,

    /// Power added per unit of stuck count.
    pub stuck_creep_gain: f64,

    /// Stuck count removed per nominal tick once the wheel is moving again.
    pub stuck_decay: f64,

    /// Tick period the stuck count is normalised against.
    ///
    /// Units: seconds
    pub nominal_tick_s: f64,

    // ---- GEOMETRY ----
    pub geometry: WheelGeometry,
}

/// Wheel and encoder geometry, converting encoder clicks into distance travelled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelGeometry {
    /// Number of encoder clicks in one wheel revolution.
    pub clicks_per_rev: u32,

    /// Units: millimeters
    pub wheel_diameter_mm: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DistCtrlParams {
    fn default() -> Self {
        Self {
            amplitude: 45.0,
            amplitude_scale_mm: 300.0,
            width_exponent: 1.6,
            offset_fraction: 1.2,
            base_power: 30.0,
            min_power: -65.0,
            max_power: 65.0,
            tolerance_mm: 11.0,
            bias: 0.0,
            lateral_gain: 5.0,
            lateral_clamp: 25.0,
            stuck_epsilon_mm: 1.0,
            stuck_creep_gain: 2.0,
            stuck_decay: 0.5,
            nominal_tick_s: 0.05,
            geometry: WheelGeometry::default(),
        }
    }
}

impl Default for WheelGeometry {
    fn default() -> Self {
        Self {
            clicks_per_rev: 40,
            wheel_diameter_mm: 65.0,
        }
    }
}

impl WheelGeometry {
    /// Distance travelled by the wheel rim in one revolution.
    pub fn circumference_mm(&self) -> f64 {
        PI * self.wheel_diameter_mm
    }

    /// Distance covered by one encoder click.
    pub fn mm_per_click(&self) -> f64 {
        self.circumference_mm() / self.clicks_per_rev.max(1) as f64
    }

    pub fn clicks_to_mm(&self, clicks: i32) -> f64 {
        clicks as f64 * self.mm_per_click()
    }

    /// Number of whole clicks covering the given distance, truncated towards zero.
    pub fn mm_to_clicks(&self, mm: f64) -> i32 {
        (mm / self.mm_per_click()) as i32
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_geometry() {
        let g = WheelGeometry::default();

        assert!((g.mm_per_click() - 5.105088).abs() < 1e-6);
        assert_eq!(g.mm_to_clicks(100.0), 19);
        assert_eq!(g.mm_to_clicks(-100.0), -19);
        assert!((g.clicks_to_mm(40) - g.circumference_mm()).abs() < 1e-9);
    }

    #[test]
    fn test_partial_params_file() {
        let p: DistCtrlParams =
            util::params::from_str("bias = 3.0\n[geometry]\nwheel_diameter_mm = 70.0\n").unwrap();

        assert_eq!(p.bias, 3.0);
        assert_eq!(p.amplitude, 45.0);
        assert_eq!(p.geometry.wheel_diameter_mm, 70.0);
        assert_eq!(p.geometry.clicks_per_rev, 40);
    }
}
