//! # Vehicle simulation
//!
//! Stand-ins for the vehicle's equipment, used by the executable when no hardware is present and
//! by the tests.
//!
//! [`SimVehicle`] models each wheel's speed as a first-order response to the commanded power and
//! generates encoder edges whenever a wheel crosses a click boundary. Edges are counted through a
//! [`ClickCounter`] exactly as the hardware edge handler would count them, so the count follows the
//! counting-direction flag and not the true direction of rotation.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info};
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::dist_ctrl::WheelGeometry;
use util::maths::{clamp, lin_map, polarity, wrap_pi};
use veh_if::eqpt::{
    ClickCounter, HazardSensor, MotorDrive, Odometer, PowerPair, SharedOdometer, StatusDisplay,
    TravelDir, POWER_LIMIT,
};

pub use veh_if::eqpt::NullDisplay;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Wheels slower than this are considered stopped.
///
/// Units: millimeters/second
const STATIONARY_SPEED_MM_S: f64 = 0.5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulated vehicle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    pub geometry: WheelGeometry,

    /// Distance between the wheel contact points.
    ///
    /// Units: millimeters
    pub track_width_mm: f64,

    /// Wheel speed at full power.
    ///
    /// Units: millimeters/second
    pub max_speed_mm_s: f64,

    /// Time constant of the wheel speed response.
    ///
    /// Units: seconds
    pub time_constant_s: f64,

    /// Power at or below which the motors don't turn.
    pub deadband_power: f64,
}

/// A simulated two wheel vehicle.
#[derive(Debug)]
pub struct SimVehicle {
    params: SimParams,

    counter: Arc<ClickCounter>,

    power: PowerPair,

    /// True distance rolled by each wheel, `[left, right]`.
    ///
    /// Units: millimeters
    wheel_pos_mm: [f64; 2],

    /// Units: millimeters/second
    wheel_speed_mm_s: [f64; 2],

    /// Position of the vehicle in the start frame.
    ///
    /// Units: millimeters
    position_mm: Vector2<f64>,

    /// Units: radians
    heading_rad: f64,
}

/// Odometer whose counts are set directly.
#[derive(Debug, Clone, Copy)]
pub struct ManualOdometer {
    left: i32,
    right: i32,
    left_fwd: bool,
    right_fwd: bool,
}

/// A period during which the simulated hazard sensor reports an obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HazardWindow {
    /// Units: milliseconds
    pub start_ms: u64,

    /// End of the window, or `None` if the obstacle never clears.
    ///
    /// Units: milliseconds
    pub end_ms: Option<u64>,

    pub dir: TravelDir,
}

/// Hazard sensor driven by a timetable of obstacles.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHazard {
    windows: Vec<HazardWindow>,
    now_ms: u64,
}

/// Status display writing to the log.
///
/// Repeated status text is only logged once.
#[derive(Debug, Default)]
pub struct LogDisplay {
    last_status: Option<String>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            geometry: WheelGeometry::default(),
            track_width_mm: 120.0,
            max_speed_mm_s: 400.0,
            time_constant_s: 0.08,
            deadband_power: 5.0,
        }
    }
}

impl SimVehicle {
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            counter: Arc::new(ClickCounter::new()),
            power: PowerPair::ZERO,
            wheel_pos_mm: [0.0; 2],
            wheel_speed_mm_s: [0.0; 2],
            position_mm: Vector2::zeros(),
            heading_rad: 0.0,
        }
    }

    /// An odometer reading this vehicle's encoders.
    pub fn odometer(&self) -> SharedOdometer {
        SharedOdometer::from_counter(self.counter.clone())
    }

    /// Advance the simulation by `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        if dt_s <= 0.0 {
            return;
        }

        let alpha = if self.params.time_constant_s > 0.0 {
            clamp(dt_s / self.params.time_constant_s, 0.0, 1.0)
        } else {
            1.0
        };

        let mut deltas = [0.0; 2];
        let powers = [self.power.left, self.power.right];

        for i in 0..2 {
            let demand = self.speed_demand(powers[i] as f64);
            let speed = &mut self.wheel_speed_mm_s[i];

            *speed += (demand - *speed) * alpha;
            if demand == 0.0 && speed.abs() < STATIONARY_SPEED_MM_S {
                *speed = 0.0;
            }

            let before = self.wheel_pos_mm[i];
            self.wheel_pos_mm[i] += *speed * dt_s;
            deltas[i] = self.wheel_pos_mm[i] - before;

            let edges = self.edges_crossed(before, self.wheel_pos_mm[i]);
            for _ in 0..edges {
                if i == 0 {
                    self.counter.on_left_edge();
                } else {
                    self.counter.on_right_edge();
                }
            }
        }

        // Differential drive kinematics
        let ds = 0.5 * (deltas[0] + deltas[1]);
        let dtheta = (deltas[1] - deltas[0]) / self.params.track_width_mm;

        let mid_heading = self.heading_rad + 0.5 * dtheta;
        self.position_mm += Rotation2::new(mid_heading) * Vector2::new(ds, 0.0);
        self.heading_rad = wrap_pi(self.heading_rad + dtheta);
    }

    /// True if both wheels have stopped.
    pub fn is_stationary(&self) -> bool {
        self.wheel_speed_mm_s
            .iter()
            .all(|s| s.abs() < STATIONARY_SPEED_MM_S)
    }

    /// True distance rolled by each wheel since the start, `(left, right)`.
    pub fn wheel_positions_mm(&self) -> (f64, f64) {
        (self.wheel_pos_mm[0], self.wheel_pos_mm[1])
    }

    pub fn position_mm(&self) -> Vector2<f64> {
        self.position_mm
    }

    pub fn heading_rad(&self) -> f64 {
        self.heading_rad
    }

    pub fn power(&self) -> PowerPair {
        self.power
    }

    fn speed_demand(&self, power: f64) -> f64 {
        let deadband = self.params.deadband_power;

        if power.abs() <= deadband {
            return 0.0;
        }

        polarity(power)
            * lin_map(
                (deadband, POWER_LIMIT as f64),
                (0.0, self.params.max_speed_mm_s),
                power.abs(),
            )
    }

    fn edges_crossed(&self, before_mm: f64, after_mm: f64) -> u64 {
        let mm_per_click = self.params.geometry.mm_per_click();
        if mm_per_click <= 0.0 {
            return 0;
        }

        let before = (before_mm / mm_per_click).floor() as i64;
        let after = (after_mm / mm_per_click).floor() as i64;

        (after - before).abs() as u64
    }
}

impl MotorDrive for SimVehicle {
    fn set_motors(&mut self, power: PowerPair) {
        self.power = power.clamped();
    }
}

impl ManualOdometer {
    /// Overwrite both counts.
    pub fn set_counts(&mut self, left: i32, right: i32) {
        self.left = left;
        self.right = right;
    }
}

impl Default for ManualOdometer {
    fn default() -> Self {
        Self {
            left: 0,
            right: 0,
            left_fwd: true,
            right_fwd: true,
        }
    }
}

impl Odometer for ManualOdometer {
    fn left_clicks(&self) -> i32 {
        self.left
    }

    fn right_clicks(&self) -> i32 {
        self.right
    }

    fn clear_counts(&mut self) {
        self.left = 0;
        self.right = 0;
    }

    fn set_left_counting_forward(&mut self, forward: bool) {
        self.left_fwd = forward;
    }

    fn set_right_counting_forward(&mut self, forward: bool) {
        self.right_fwd = forward;
    }

    fn is_left_counting_forward(&self) -> bool {
        self.left_fwd
    }

    fn is_right_counting_forward(&self) -> bool {
        self.right_fwd
    }
}

impl HazardWindow {
    fn is_active(&self, now_ms: u64, dir: TravelDir) -> bool {
        self.dir == dir && now_ms >= self.start_ms && self.end_ms.map_or(true, |e| now_ms < e)
    }
}

impl ScriptedHazard {
    pub fn new(windows: Vec<HazardWindow>) -> Self {
        Self { windows, now_ms: 0 }
    }

    /// Set the time the next reading is taken at.
    pub fn set_time(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }

    fn is_hazard(&self, dir: TravelDir) -> bool {
        self.windows.iter().any(|w| w.is_active(self.now_ms, dir))
    }
}

impl HazardSensor for ScriptedHazard {
    fn is_hazard_forward(&mut self) -> bool {
        self.is_hazard(TravelDir::Forward)
    }

    fn is_hazard_backward(&mut self) -> bool {
        self.is_hazard(TravelDir::Backward)
    }
}

impl StatusDisplay for LogDisplay {
    fn print_status(&mut self, text: &str) {
        if self.last_status.as_deref() == Some(text) {
            return;
        }

        for line in text.lines() {
            info!("[display] {}", line);
        }
        self.last_status = Some(text.to_string());
    }

    fn print_variable_region(&mut self, text: &str, col: u8, row: u8) {
        debug!("[display ({}, {})] {}", col, row, text);
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
