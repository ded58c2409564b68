//! Implementations for the DistCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{DistCtrlParams, WheelState};
use util::maths::{clamp, polarity};
use veh_if::eqpt::{Odometer, PowerPair, POWER_LIMIT};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Upper bound on how many nominal ticks a single tick may count for in the stall counter.
const MAX_TICK_RATIO: f64 = 4.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Distance controller.
///
/// Drives each wheel through a commanded relative displacement, reading progress from the
/// odometer it owns.
#[derive(Debug)]
pub struct DistCtrl<O: Odometer> {
    params: DistCtrlParams,

    odometer: O,

    left: WheelState,
    right: WheelState,

    /// Active power limits, may be narrowed from the parameters by `set_max_power`
    min_power: f64,
    max_power: f64,

    last_run: Option<Instant>,
    last_dt_s: f64,

    output: PowerPair,
}

/// Snapshot of the controller's state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistCtrlReport {
    /// Elapsed time of the last tick.
    ///
    /// Units: seconds
    pub dt_s: f64,

    pub max_power: f64,

    pub left: WheelState,
    pub right: WheelState,

    pub output: PowerPair,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<O: Odometer> DistCtrl<O> {
    /// Create a new controller holding position.
    pub fn new(params: DistCtrlParams, odometer: O) -> Self {
        let mut ctrl = Self {
            params,
            odometer,
            left: WheelState::new(0.0),
            right: WheelState::new(0.0),
            min_power: 0.0,
            max_power: 0.0,
            last_run: None,
            last_dt_s: params.nominal_tick_s,
            output: PowerPair::ZERO,
        };
        ctrl.reset(params);
        ctrl
    }

    /// Replace the configuration and clear all wheel state, holding position.
    pub fn reset(&mut self, params: DistCtrlParams) {
        self.params = params;
        self.min_power = clamp(params.min_power, -POWER_LIMIT as f64, 0.0);
        self.max_power = clamp(params.max_power, 0.0, POWER_LIMIT as f64);
        self.last_run = None;
        self.last_dt_s = params.nominal_tick_s;
        self.set_target(0.0, 0.0);
    }

    /// Command a new displacement relative to the current position.
    ///
    /// Clears the odometer and sets each wheel's counting direction from the sign of its target.
    /// A target of `(0, 0)` holds position. Non-finite targets are treated as zero.
    pub fn set_target(&mut self, left_mm: f64, right_mm: f64) {
        let left_mm = finite_or_zero(left_mm);
        let right_mm = finite_or_zero(right_mm);

        self.odometer.clear_counts();
        self.odometer.set_left_counting_forward(left_mm >= 0.0);
        self.odometer.set_right_counting_forward(right_mm >= 0.0);

        self.left = WheelState::new(left_mm);
        self.right = WheelState::new(right_mm);
        self.output = PowerPair::ZERO;
    }

    /// Add to the outstanding displacement without resetting progress.
    ///
    /// The odometer is left untouched so the commanded power continues smoothly from the current
    /// tick.
    pub fn add_target(&mut self, delta_left_mm: f64, delta_right_mm: f64) {
        self.left.shift_target(finite_or_zero(delta_left_mm));
        self.right.shift_target(finite_or_zero(delta_right_mm));
    }

    /// Limit the commanded power to `[-|power|, |power|]` until the next reset.
    pub fn set_max_power(&mut self, power: f64) {
        let p = clamp(finite_or_zero(power).abs(), 0.0, POWER_LIMIT as f64);
        self.max_power = p;
        self.min_power = -p;
    }

    /// Run one tick, measuring the elapsed time since the last tick.
    pub fn run(&mut self) -> PowerPair {
        let now = Instant::now();
        let dt_s = match self.last_run {
            Some(t) => now.duration_since(t).as_secs_f64(),
            None => self.params.nominal_tick_s,
        };
        self.last_run = Some(now);

        self.run_dt(dt_s)
    }

    /// Run one tick which took `dt_s` seconds.
    pub fn run_dt(&mut self, dt_s: f64) -> PowerPair {
        self.last_dt_s = dt_s;

        let tick_ratio = if self.params.nominal_tick_s > 0.0 {
            clamp(dt_s / self.params.nominal_tick_s, 0.0, MAX_TICK_RATIO)
        } else {
            1.0
        };

        // Both counts from one snapshot
        let (left_clicks, right_clicks) = self.odometer.snapshot();
        let geom = self.params.geometry;
        self.left.update_distance(geom.clicks_to_mm(left_clicks));
        self.right.update_distance(geom.clicks_to_mm(right_clicks));

        self.left.counting_fwd = self.odometer.is_left_counting_forward();
        self.right.counting_fwd = self.odometer.is_right_counting_forward();

        self.left.update_stuck(&self.params, tick_ratio, "left");
        self.right.update_stuck(&self.params, tick_ratio, "right");

        let left_demand = self
            .left
            .demand(&self.params, self.min_power, self.max_power);
        let right_demand = self
            .right
            .demand(&self.params, self.min_power, self.max_power);

        let left_step = self.left.step_direction(left_demand, "left");
        if left_step.toggle {
            self.odometer.toggle_left_counting_direction();
        }
        let right_step = self.right.step_direction(right_demand, "right");
        if right_step.toggle {
            self.odometer.toggle_right_counting_direction();
        }

        let (left_power, right_power) = self.correct(left_step.power, right_step.power);

        self.left.power = left_power;
        self.right.power = right_power;
        self.output = PowerPair::new(left_power as i32, right_power as i32);

        trace!(
            "DistCtrl dt {:.3} s, L: {:.1}/{:.1} mm -> {}, R: {:.1}/{:.1} mm -> {}",
            dt_s,
            self.left.traveled_mm,
            self.left.target_mm,
            self.output.left,
            self.right.traveled_mm,
            self.right.target_mm,
            self.output.right
        );

        self.output
    }

    /// True if both wheels are within tolerance of their targets.
    pub fn target_met(&self) -> bool {
        self.left.is_within_tolerance(self.params.tolerance_mm)
            && self.right.is_within_tolerance(self.params.tolerance_mm)
    }

    /// The signed displacement still owed by each wheel, `(left, right)`.
    ///
    /// Measured from the odometer now rather than at the last tick, so clicks counted since then
    /// are not owed twice when the leg is resumed.
    pub fn remainder_target(&self) -> (f64, f64) {
        let (left_clicks, right_clicks) = self.odometer.snapshot();
        let geom = self.params.geometry;

        (
            self.left.target_mm - geom.clicks_to_mm(left_clicks),
            self.right.target_mm - geom.clicks_to_mm(right_clicks),
        )
    }

    /// The mean absolute remainder of both wheels, signed per wheel.
    ///
    /// Resuming a straight leg from this keeps both wheels on equal targets.
    pub fn averaged_remainder_target(&self) -> (f64, f64) {
        let (left, right) = self.remainder_target();
        let mean = 0.5 * (left.abs() + right.abs());

        (polarity(left) * mean, polarity(right) * mean)
    }

    /// The current target of each wheel, `(left, right)`.
    pub fn target(&self) -> (f64, f64) {
        (self.left.target_mm, self.right.target_mm)
    }

    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    pub fn output(&self) -> PowerPair {
        self.output
    }

    pub fn params(&self) -> &DistCtrlParams {
        &self.params
    }

    pub fn left(&self) -> &WheelState {
        &self.left
    }

    pub fn right(&self) -> &WheelState {
        &self.right
    }

    pub fn odometer(&self) -> &O {
        &self.odometer
    }

    pub fn odometer_mut(&mut self) -> &mut O {
        &mut self.odometer
    }

    pub fn status(&self) -> DistCtrlReport {
        DistCtrlReport {
            dt_s: self.last_dt_s,
            max_power: self.max_power,
            left: self.left,
            right: self.right,
            output: self.output,
        }
    }

    /// Apply the static bias and the lateral correction to the driven wheels.
    ///
    /// Positive corrections give more power to the left wheel and less to the right. The lateral
    /// term only applies when both wheels are commanded the same distance, so that the lagging
    /// wheel is sped up and the leading one slowed.
    fn correct(&self, left: f64, right: f64) -> (f64, f64) {
        let tol = self.params.tolerance_mm;

        let lateral = if (self.left.target_mm.abs() - self.right.target_mm.abs()).abs() <= tol {
            clamp(
                self.params.lateral_gain * (self.left.error_mm.abs() - self.right.error_mm.abs()),
                -self.params.lateral_clamp.abs(),
                self.params.lateral_clamp.abs(),
            )
        } else {
            0.0
        };

        let correction = self.params.bias + lateral;

        (
            clamp(
                add_magnitude(left, correction),
                self.min_power,
                self.max_power,
            ),
            clamp(
                add_magnitude(right, -correction),
                self.min_power,
                self.max_power,
            ),
        )
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Add to the magnitude of a power without changing its sign. Zero stays zero.
fn add_magnitude(power: f64, delta: f64) -> f64 {
    if power == 0.0 {
        return 0.0;
    }

    polarity(power) * (power.abs() + delta).max(0.0)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::dist_ctrl::DirState;
    use crate::sim::ManualOdometer;
    use std::{thread, time::Duration};
    use veh_if::eqpt::SharedOdometer;

    const DT: f64 = 0.05;

    fn manual_ctrl() -> DistCtrl<ManualOdometer> {
        DistCtrl::new(DistCtrlParams::default(), ManualOdometer::default())
    }

    /// Odometer that advances proportionally to commanded power, counting each click in the
    /// current counting direction.
    struct Proportional {
        pos_mm: [f64; 2],
        mm_per_power: f64,
        mm_per_click: f64,
    }

    impl Proportional {
        fn step(&mut self, odo: &SharedOdometer, power: PowerPair) {
            let counter = odo.counter();
            for (i, p) in [power.left, power.right].iter().enumerate() {
                let before = (self.pos_mm[i] / self.mm_per_click).floor() as i64;
                self.pos_mm[i] += *p as f64 * self.mm_per_power;
                let after = (self.pos_mm[i] / self.mm_per_click).floor() as i64;

                for _ in 0..(after - before).abs() {
                    if i == 0 {
                        counter.on_left_edge();
                    } else {
                        counter.on_right_edge();
                    }
                }
            }
        }
    }

    #[test]
    fn test_converges() {
        let targets = [
            (300.0, 300.0),
            (-200.0, -200.0),
            (150.0, -150.0),
            (-95.0, 95.0),
            (50.0, 80.0),
            (500.0, 480.0),
            (20.0, 0.0),
        ];

        for (l, r) in targets.iter() {
            let mut ctrl = DistCtrl::new(DistCtrlParams::default(), SharedOdometer::new());
            let odo = ctrl.odometer().clone();
            let mut prop = Proportional {
                pos_mm: [0.0; 2],
                mm_per_power: 0.15,
                mm_per_click: ctrl.params().geometry.mm_per_click(),
            };

            ctrl.set_target(*l, *r);

            let mut ticks = 0;
            while !ctrl.target_met() {
                let power = ctrl.run_dt(DT);
                prop.step(&odo, power);
                ticks += 1;
                assert!(ticks < 500, "Target ({}, {}) not met in 500 ticks", l, r);
            }

            // Odometer still agrees with the true position
            let (el, er) = ctrl.remainder_target();
            assert!((l - prop.pos_mm[0] - el).abs() <= prop.mm_per_click);
            assert!((r - prop.pos_mm[1] - er).abs() <= prop.mm_per_click);
        }
    }

    #[test]
    fn test_target_met() {
        let mut ctrl = manual_ctrl();

        ctrl.set_target(300.0, 300.0);
        assert!(!ctrl.target_met());

        ctrl.set_target(8.0, -11.0);
        assert!(ctrl.target_met());

        ctrl.set_target(300.0, 5.0);
        ctrl.odometer_mut().set_counts(57, 0);
        ctrl.run_dt(DT);
        assert!(ctrl.target_met());

        ctrl.set_target(300.0, 300.0);
        ctrl.odometer_mut().set_counts(56, 57);
        ctrl.run_dt(DT);
        assert!(!ctrl.target_met());
    }

    #[test]
    fn test_zero_target_holds() {
        let mut ctrl = manual_ctrl();
        ctrl.set_target(120.0, -40.0);
        ctrl.run_dt(DT);

        ctrl.set_target(0.0, 0.0);
        for i in 0..50 {
            ctrl.odometer_mut().set_counts(i % 7 - 3, -(i % 5));
            assert_eq!(ctrl.run_dt(DT), PowerPair::ZERO);
        }

        ctrl.set_target(std::f64::NAN, std::f64::INFINITY);
        assert_eq!(ctrl.target(), (0.0, 0.0));
        assert_eq!(ctrl.run_dt(DT), PowerPair::ZERO);
    }

    #[test]
    fn test_power_decreases_on_approach() {
        let mut ctrl = manual_ctrl();
        ctrl.set_target(300.0, 300.0);

        let mm_per_click = ctrl.params().geometry.mm_per_click();
        let mut last = std::i32::MAX;

        // From 50 mm travelled the profile is past its peak
        for clicks in 10..60 {
            ctrl.odometer_mut().set_counts(clicks, clicks);
            let power = ctrl.run_dt(DT);

            assert_eq!(power.left, power.right);
            assert!(power.left <= last);
            last = power.left;

            let traveled = clicks as f64 * mm_per_click;
            if traveled >= 289.0 && traveled <= 311.0 {
                assert!(ctrl.target_met());
                assert_eq!(power, PowerPair::ZERO);
            } else {
                assert!(!ctrl.target_met());
                assert!(power.left >= 30);
            }
        }
    }

    #[test]
    fn test_direction_protocol() {
        let mut ctrl = manual_ctrl();
        ctrl.set_target(100.0, 100.0);

        ctrl.odometer_mut().set_counts(10, 10);
        assert!(ctrl.run_dt(DT).left > 0);

        // Overshoot the target while still moving
        ctrl.odometer_mut().set_counts(30, 30);
        assert_eq!(ctrl.run_dt(DT), PowerPair::ZERO);
        assert_eq!(ctrl.left().dir_state, DirState::PendingToggle);
        assert!(ctrl.odometer().is_left_counting_forward());

        // Still coasting
        ctrl.odometer_mut().set_counts(31, 31);
        assert_eq!(ctrl.run_dt(DT), PowerPair::ZERO);
        assert!(ctrl.odometer().is_left_counting_forward());

        // Stationary for a full tick, so the direction toggles
        assert_eq!(ctrl.run_dt(DT), PowerPair::ZERO);
        assert!(!ctrl.odometer().is_left_counting_forward());
        assert!(!ctrl.odometer().is_right_counting_forward());
        assert_eq!(ctrl.left().dir_state, DirState::Stable);

        // Driving back towards the target
        let power = ctrl.run_dt(DT);
        assert!(power.left < 0 && power.right < 0);
    }

    #[test]
    fn test_pending_toggle_cancelled_if_demand_agrees() {
        let mut ctrl = manual_ctrl();
        ctrl.set_target(100.0, 0.0);

        ctrl.odometer_mut().set_counts(24, 0);
        ctrl.run_dt(DT);
        assert_eq!(ctrl.left().dir_state, DirState::PendingToggle);

        // Coasts back into tolerance before stopping
        ctrl.odometer_mut().set_counts(20, 0);
        ctrl.run_dt(DT);
        ctrl.run_dt(DT);
        assert_eq!(ctrl.left().dir_state, DirState::Stable);
        assert!(ctrl.odometer().is_left_counting_forward());
    }

    #[test]
    fn test_add_target() {
        let mut ctrl = manual_ctrl();
        ctrl.set_target(200.0, 200.0);
        ctrl.odometer_mut().set_counts(12, 12);
        ctrl.run_dt(DT);

        let (rl, rr) = ctrl.remainder_target();
        ctrl.add_target(-15.0, 15.0);
        let (al, ar) = ctrl.remainder_target();

        assert!((al - (rl - 15.0)).abs() < 1e-9);
        assert!((ar - (rr + 15.0)).abs() < 1e-9);
        assert_eq!(ctrl.target(), (185.0, 215.0));

        // Progress and direction are kept
        ctrl.odometer_mut().set_counts(13, 13);
        let power = ctrl.run_dt(DT);
        assert!(power.left > 0 && power.right > 0);
        assert!((ctrl.left().traveled_mm - 13.0 * ctrl.params().geometry.mm_per_click()).abs() < 1e-9);
    }

    #[test]
    fn test_averaged_remainder() {
        let mut ctrl = manual_ctrl();
        ctrl.set_target(100.0, -60.0);

        assert_eq!(ctrl.remainder_target(), (100.0, -60.0));
        assert_eq!(ctrl.averaged_remainder_target(), (80.0, -80.0));

        // Clicks counted since the last tick are already accounted for
        let mm_per_click = ctrl.params().geometry.mm_per_click();
        ctrl.odometer_mut().set_counts(4, 0);
        let (left, right) = ctrl.remainder_target();
        assert!((left - (100.0 - 4.0 * mm_per_click)).abs() < 1e-9);
        assert_eq!(right, -60.0);
    }

    #[test]
    fn test_corrections() {
        let params = DistCtrlParams {
            bias: 4.0,
            ..Default::default()
        };
        let mut ctrl = DistCtrl::new(params, ManualOdometer::default());

        // Left wheel lagging on a straight leg
        ctrl.set_target(300.0, 300.0);
        ctrl.odometer_mut().set_counts(10, 12);
        let power = ctrl.run_dt(DT);
        assert_eq!(power.left, 65);
        assert!(power.right < 65 - 25);

        // No lateral correction on a curve, bias only
        let mut plain = DistCtrl::new(DistCtrlParams::default(), ManualOdometer::default());
        plain.set_target(300.0, 100.0);
        plain.odometer_mut().set_counts(2, 2);
        let p0 = plain.run_dt(DT);

        ctrl.set_target(300.0, 100.0);
        ctrl.odometer_mut().set_counts(2, 2);
        let p1 = ctrl.run_dt(DT);

        assert!((p1.left - p0.left - 4).abs() <= 1);
        assert!((p0.right - p1.right - 4).abs() <= 1);

        // A settled wheel is never woken by a correction
        ctrl.set_target(300.0, 5.0);
        ctrl.odometer_mut().set_counts(0, 0);
        assert_eq!(ctrl.run_dt(DT).right, 0);
    }

    #[test]
    fn test_max_power_and_reset() {
        let mut ctrl = manual_ctrl();

        ctrl.set_target(300.0, 300.0);
        ctrl.set_max_power(-40.0);
        ctrl.odometer_mut().set_counts(10, 10);
        assert_eq!(ctrl.run_dt(DT), PowerPair::new(40, 40));

        ctrl.reset(DistCtrlParams {
            base_power: 20.0,
            ..Default::default()
        });
        assert_eq!(ctrl.params().base_power, 20.0);
        assert_eq!(ctrl.max_power(), 65.0);
        assert_eq!(ctrl.target(), (0.0, 0.0));
        assert_eq!(ctrl.output(), PowerPair::ZERO);
    }

    #[test]
    fn test_run_measures_tick() {
        let mut ctrl = manual_ctrl();
        ctrl.set_target(300.0, 300.0);

        // No previous tick, so the first is nominal
        let power = ctrl.run();
        assert!(power.left > 0 && power.right > 0);
        assert_eq!(ctrl.status().dt_s, DT);
        assert_eq!(ctrl.left().stuck_count, 0.0);

        // Stalled, the counter grows by the measured number of nominal ticks
        thread::sleep(Duration::from_millis(120));
        ctrl.run();
        let dt_s = ctrl.status().dt_s;
        assert!(dt_s >= 0.12);
        let count = ctrl.left().stuck_count;
        assert!((count - (dt_s / DT).min(4.0)).abs() < 1e-9);

        // A long gap counts for at most four ticks
        thread::sleep(Duration::from_millis(300));
        ctrl.run();
        assert!(ctrl.status().dt_s >= 0.3);
        assert_eq!(ctrl.left().stuck_count, count + 4.0);
        assert_eq!(ctrl.right().stuck_count, ctrl.left().stuck_count);
    }
}
