//! # NavCtrl telemetry and archive records

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{NavFailure, NavState};
use crate::dist_ctrl::DistCtrlReport;
use veh_if::{eqpt::PowerPair, route::Move};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry summarising the navigation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavTm {
    pub state: NavState,
    pub prev_state: NavState,
    pub phase: u32,

    /// Index of the next route move.
    pub cursor: usize,

    pub active_move: Option<Move>,

    /// The state to return to once the hazard has been dealt with.
    pub callback: Option<NavState>,

    /// Displacement still owed by the interrupted move.
    pub remainder_mm: Option<(f64, f64)>,

    pub output: PowerPair,

    pub bypass_attempts: u32,

    pub failure: Option<NavFailure>,

    pub dist_ctrl: DistCtrlReport,
}

/// Per-cycle status report, archived as one csv row.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NavStatusReport {
    /// Units: seconds since the session epoch
    pub time_s: f64,

    pub state: Option<NavState>,
    pub phase: u32,
    pub cursor: usize,

    /// The state was entered this cycle.
    pub entered: bool,

    /// A hazard preempted the active move this cycle.
    pub preempted: bool,

    pub hazard_forward: bool,
    pub hazard_backward: bool,

    pub left_power: i32,
    pub right_power: i32,

    pub bypass_attempts: u32,

    pub failure: Option<NavFailure>,
}

/// Per-cycle record of the distance controller, archived as one csv row.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DistCtrlRecord {
    /// Units: seconds since the session epoch
    pub time_s: f64,

    /// Units: seconds
    pub dt_s: f64,

    pub left_duty: i32,
    pub right_duty: i32,

    /// Units: millimeters
    pub left_target_mm: f64,
    pub right_target_mm: f64,
    pub left_distance_mm: f64,
    pub right_distance_mm: f64,
    pub left_error_mm: f64,
    pub right_error_mm: f64,

    pub left_stuck: f64,
    pub right_stuck: f64,

    pub left_counting_fwd: bool,
    pub right_counting_fwd: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DistCtrlRecord {
    pub fn from_report(time_s: f64, report: &DistCtrlReport) -> Self {
        Self {
            time_s,
            dt_s: report.dt_s,
            left_duty: report.output.left,
            right_duty: report.output.right,
            left_target_mm: report.left.target_mm,
            right_target_mm: report.right.target_mm,
            left_distance_mm: report.left.traveled_mm,
            right_distance_mm: report.right.traveled_mm,
            left_error_mm: report.left.error_mm,
            right_error_mm: report.right.error_mm,
            left_stuck: report.left.stuck_count,
            right_stuck: report.right.stuck_count,
            left_counting_fwd: report.left.counting_fwd,
            right_counting_fwd: report.right.counting_fwd,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dist_ctrl::{DistCtrl, DistCtrlParams},
        sim::ManualOdometer,
    };

    #[test]
    fn test_dist_ctrl_record() {
        let mut ctrl = DistCtrl::new(DistCtrlParams::default(), ManualOdometer::default());
        ctrl.set_target(200.0, -200.0);
        ctrl.odometer_mut().set_counts(4, -4);
        let output = ctrl.run_dt(0.05);

        let rec = DistCtrlRecord::from_report(1.5, &ctrl.status());
        assert_eq!(rec.time_s, 1.5);
        assert_eq!(rec.dt_s, 0.05);
        assert_eq!((rec.left_duty, rec.right_duty), (output.left, output.right));
        assert_eq!(rec.left_target_mm, 200.0);
        assert_eq!(rec.right_target_mm, -200.0);
        assert!((rec.left_error_mm + rec.left_distance_mm - 200.0).abs() < 1e-9);
        assert!(rec.left_counting_fwd);
        assert!(!rec.right_counting_fwd);
    }

    #[test]
    fn test_tm_json() {
        let ctrl = DistCtrl::new(DistCtrlParams::default(), ManualOdometer::default());

        let tm = NavTm {
            state: NavState::HazardForward,
            prev_state: NavState::Forward,
            phase: 1,
            cursor: 3,
            active_move: Some(Move::forward(500.0)),
            callback: Some(NavState::Forward),
            remainder_mm: Some((120.0, 118.0)),
            output: PowerPair::ZERO,
            bypass_attempts: 0,
            failure: None,
            dist_ctrl: ctrl.status(),
        };

        let json = serde_json::to_value(&tm).unwrap();
        assert_eq!(json["state"], "HazardForward");
        assert_eq!(json["callback"], "Forward");
        assert_eq!(json["remainder_mm"][0], 120.0);
        assert!(json["failure"].is_null());
    }
}
