//! Per-wheel state of the distance controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use serde::{Deserialize, Serialize};

use super::DistCtrlParams;
use util::maths::{clamp, polarity};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// State of the encoder counting-direction protocol for one wheel.
///
/// The encoder cannot sense direction, so the counting direction may only be reversed once the
/// wheel has stopped. While a reversal is pending the wheel's power is held at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirState {
    /// Counting direction matches the demanded direction of travel.
    Stable,

    /// The demand has changed sign and the wheel is coasting to a stop before the counting
    /// direction is toggled.
    PendingToggle,
}

/// Outcome of one step of the direction protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DirStep {
    /// Power the wheel may be driven at this tick.
    pub power: f64,

    /// The counting direction must be toggled now.
    pub toggle: bool,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State of a single wheel since the last target was set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelState {
    /// Units: millimeters
    pub target_mm: f64,

    /// Distance travelled since the last reset, as measured by the odometer.
    ///
    /// Units: millimeters
    pub traveled_mm: f64,

    /// Units: millimeters
    pub prev_traveled_mm: f64,

    /// Always `target_mm - traveled_mm`.
    ///
    /// Units: millimeters
    pub error_mm: f64,

    /// Units: millimeters
    pub prev_error_mm: f64,

    /// Power commanded on the last tick, after all corrections.
    pub power: f64,

    /// How long the wheel has been stalled, in nominal ticks.
    pub stuck_count: f64,

    /// Mirror of the odometer's counting-direction flag.
    pub counting_fwd: bool,

    pub dir_state: DirState,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WheelState {
    pub fn new(target_mm: f64) -> Self {
        Self {
            target_mm,
            traveled_mm: 0.0,
            prev_traveled_mm: 0.0,
            error_mm: target_mm,
            prev_error_mm: target_mm,
            power: 0.0,
            stuck_count: 0.0,
            counting_fwd: target_mm >= 0.0,
            dir_state: DirState::Stable,
        }
    }

    /// True if the wheel has arrived, or has nowhere to go.
    pub fn is_settled(&self, tolerance_mm: f64) -> bool {
        self.target_mm == 0.0 || self.error_mm.abs() <= tolerance_mm
    }

    pub fn is_within_tolerance(&self, tolerance_mm: f64) -> bool {
        self.error_mm.abs() <= tolerance_mm
    }

    /// Move the target by `delta_mm` without touching the distance travelled so far.
    pub(crate) fn shift_target(&mut self, delta_mm: f64) {
        self.target_mm += delta_mm;
        self.error_mm = self.target_mm - self.traveled_mm;
    }

    /// Record a new odometer reading.
    pub(crate) fn update_distance(&mut self, traveled_mm: f64) {
        self.prev_traveled_mm = self.traveled_mm;
        self.prev_error_mm = self.error_mm;
        self.traveled_mm = traveled_mm;
        self.error_mm = self.target_mm - self.traveled_mm;
    }

    /// Update the stall counter.
    ///
    /// `tick_ratio` is the elapsed time of this tick over the nominal tick period. A wheel only
    /// counts as stuck if it was driven on the last tick and hasn't moved since.
    pub(crate) fn update_stuck(&mut self, params: &DistCtrlParams, tick_ratio: f64, name: &str) {
        if self.is_settled(params.tolerance_mm) {
            self.stuck_count = 0.0;
            return;
        }

        let moved = (self.prev_error_mm - self.error_mm).abs() > params.stuck_epsilon_mm;

        if self.power != 0.0 && !moved {
            if self.stuck_count == 0.0 {
                debug!("DistCtrl {} wheel stuck at {:.1} mm", name, self.traveled_mm);
            }
            self.stuck_count += tick_ratio;
        } else {
            self.stuck_count = (self.stuck_count - params.stuck_decay * tick_ratio).max(0.0);
        }
    }

    /// Velocity profile demand including the stall creep, limited to `[min_power, max_power]`.
    pub(crate) fn demand(&self, params: &DistCtrlParams, min_power: f64, max_power: f64) -> f64 {
        if self.is_settled(params.tolerance_mm) {
            return 0.0;
        }

        let pol = polarity(self.error_mm);

        let power = pol * profile_magnitude(params, self.target_mm.abs(), self.error_mm)
            + pol * self.stuck_count * params.stuck_creep_gain;

        clamp(power, min_power, max_power)
    }

    /// Run one step of the counting-direction protocol for the given demand.
    pub(crate) fn step_direction(&mut self, demand: f64, name: &str) -> DirStep {
        match self.dir_state {
            DirState::Stable => {
                if disagrees(demand, self.counting_fwd) {
                    debug!(
                        "DistCtrl {} wheel direction toggle queued (demand {:.1})",
                        name, demand
                    );
                    self.dir_state = DirState::PendingToggle;
                    DirStep {
                        power: 0.0,
                        toggle: false,
                    }
                } else {
                    DirStep {
                        power: demand,
                        toggle: false,
                    }
                }
            }
            DirState::PendingToggle => {
                // Power was held at zero for the whole of the last tick
                if self.traveled_mm != self.prev_traveled_mm {
                    return DirStep {
                        power: 0.0,
                        toggle: false,
                    };
                }

                self.dir_state = DirState::Stable;

                let toggle = disagrees(demand, self.counting_fwd);
                if toggle {
                    self.counting_fwd = !self.counting_fwd;
                    debug!(
                        "DistCtrl {} wheel direction toggled, counting {}",
                        name,
                        if self.counting_fwd {
                            "forward"
                        } else {
                            "backward"
                        }
                    );
                }

                DirStep { power: 0.0, toggle }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Magnitude of the bell-shaped velocity profile for a leg of length `target_mm` with `error_mm`
/// still to go.
pub(crate) fn profile_magnitude(params: &DistCtrlParams, target_mm: f64, error_mm: f64) -> f64 {
    let amplitude = if params.amplitude_scale_mm > 0.0 {
        params.amplitude * (target_mm / params.amplitude_scale_mm).atan()
    } else {
        params.amplitude
    };

    let width = if target_mm != 0.0 {
        1.0 / target_mm.powf(params.width_exponent)
    } else {
        0.0
    };

    let offset = if params.offset_fraction > 0.0 {
        target_mm / params.offset_fraction
    } else {
        0.0
    };

    let pol = polarity(error_mm);

    amplitude * (-width * (pol * error_mm - offset).powi(2)).exp() + params.base_power
}

fn disagrees(demand: f64, counting_fwd: bool) -> bool {
    (demand > 0.0 && !counting_fwd) || (demand < 0.0 && counting_fwd)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_profile_peaks_early() {
        let params = DistCtrlParams::default();

        // Peak is at target / offset_fraction of remaining distance
        let peak = profile_magnitude(&params, 300.0, 250.0);
        assert!((peak - (45.0 * 1f64.atan() + 30.0)).abs() < 1e-9);

        assert!(profile_magnitude(&params, 300.0, 300.0) < peak);
        assert!(profile_magnitude(&params, 300.0, 100.0) < peak);

        // Close to the target only the base power remains
        assert!((profile_magnitude(&params, 300.0, 12.0) - 30.0).abs() < 0.2);
    }

    #[test]
    fn test_settled_wheel_has_no_demand() {
        let params = DistCtrlParams::default();

        let mut w = WheelState::new(100.0);
        assert!(w.demand(&params, -65.0, 65.0) > 0.0);

        w.update_distance(95.0);
        assert_eq!(w.demand(&params, -65.0, 65.0), 0.0);

        let w = WheelState::new(0.0);
        assert!(w.is_settled(params.tolerance_mm));
        assert_eq!(w.demand(&params, -65.0, 65.0), 0.0);
    }

    #[test]
    fn test_stuck_count() {
        let params = DistCtrlParams::default();
        let mut w = WheelState::new(200.0);

        // Not driven yet so never stuck
        w.update_distance(0.0);
        w.update_stuck(&params, 1.0, "test");
        assert_eq!(w.stuck_count, 0.0);

        w.power = 30.0;
        w.update_distance(0.0);
        w.update_stuck(&params, 1.0, "test");
        w.update_distance(0.0);
        w.update_stuck(&params, 2.0, "test");
        assert_eq!(w.stuck_count, 3.0);

        let creep = w.demand(&params, -65.0, 65.0) - profile_magnitude(&params, 200.0, 200.0);
        assert!((creep - 6.0).abs() < 1e-9);

        // Decays once moving
        w.update_distance(10.0);
        w.update_stuck(&params, 1.0, "test");
        assert_eq!(w.stuck_count, 2.5);
    }
}
