//! # Hazard bypass
//!
//! The bypass drives a box around a hazard which hasn't cleared in time. Each phase is one leg of
//! the distance controller:
//!
//! 0. Back off from the hazard by the clearance distance.
//! 1. Quarter turn left.
//! 2. Drive the lateral offset.
//! 3. Quarter turn right, so the vehicle is parallel to the route line. If the hazard is still
//!    there the bypass starts again from phase 0, stepping further out. Otherwise this phase is
//!    repeated as the pass, driving the pass length alongside the hazard.
//! 4. Quarter turn right.
//! 5. Drive back across every lateral offset taken.
//! 6. Quarter turn left, back on the route line and heading.
//!
//! The interrupted move is then resumed, less the progress made along the line.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{error, info, warn};

use super::{state::LegStatus, NavCtrl, NavCtrlError, NavFailure};
use veh_if::eqpt::{Odometer, PowerPair, StatusDisplay, TravelDir};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Progress through the bypass of a single hazard.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct BypassCtx {
    /// Number of times the box has been started, including the current one.
    pub attempts: u32,

    /// Total distance backed away from the hazard over all attempts.
    ///
    /// Units: millimeters
    pub backed_off_mm: f64,

    /// Number of lateral offsets driven away from the route line.
    pub offset_legs: u32,

    /// The hazard was clear at the end of phase 3, so phase 3 is now the pass.
    pub passing: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<O: Odometer, D: StatusDisplay> NavCtrl<O, D> {
    /// Body of `HazardForwardBypass` and `HazardBackwardBypass`.
    pub(super) fn bypass_step(
        &mut self,
        entered: bool,
        dt_s: f64,
    ) -> Result<PowerPair, NavCtrlError> {
        let dir = self.state.hazard_dir().unwrap_or(TravelDir::Forward);

        if entered {
            self.bypass = BypassCtx {
                attempts: 1,
                ..Default::default()
            };
            warn!("Starting bypass of {:?} hazard", dir);
        }

        if self.phase_elapsed_ms() > self.params.bypass_phase_timeout_ms {
            self.fail(NavFailure::BypassPhaseTimeout);
            return Ok(PowerPair::ZERO);
        }

        if std::mem::replace(&mut self.phase_fresh, false) {
            let target = self.phase_target(dir);
            self.start_leg(target, self.params.bypass_power);
        }

        match self.drive_leg(dt_s) {
            LegStatus::Settling => Ok(PowerPair::ZERO),
            LegStatus::Driving(power) => Ok(power),
            LegStatus::Done(power) => {
                self.phase_done(dir)?;
                Ok(power)
            }
        }
    }

    /// Wheel targets of the current phase's leg.
    fn phase_target(&mut self, dir: TravelDir) -> (f64, f64) {
        let s = dir.sign();
        let p = &self.params;
        let arc = p.quarter_turn_arc_mm;

        match self.phase {
            0 => {
                self.bypass.backed_off_mm += p.clearance_mm;
                (-s * p.clearance_mm, -s * p.clearance_mm)
            }
            1 | 6 => (-arc, arc),
            2 => {
                self.bypass.offset_legs += 1;
                (s * p.lateral_offset_mm, s * p.lateral_offset_mm)
            }
            3 if self.bypass.passing => (s * p.pass_length_mm, s * p.pass_length_mm),
            3 | 4 => (arc, -arc),
            _ => {
                let back = s * p.lateral_offset_mm * self.bypass.offset_legs as f64;
                (back, back)
            }
        }
    }

    fn phase_done(&mut self, dir: TravelDir) -> Result<(), NavCtrlError> {
        match self.phase {
            3 if !self.bypass.passing => {
                if !self.hazard.is_hazard(dir) {
                    info!("Hazard clear alongside, passing");
                    self.bypass.passing = true;
                    self.set_phase(3);
                    return Ok(());
                }

                match self.params.bypass_attempt_limit() {
                    Some(max) if self.bypass.attempts >= max => {
                        error!("Hazard still present after {} bypass attempts", max);
                        self.fail(NavFailure::BypassAttemptsExhausted);
                    }
                    _ => {
                        self.bypass.attempts += 1;
                        warn!(
                            "Hazard still present, starting bypass attempt {}",
                            self.bypass.attempts
                        );
                        self.set_phase(0);
                    }
                }
            }
            3 => {
                // Progress along the route line
                let s = dir.sign();
                let progress = s * (self.params.pass_length_mm - self.bypass.backed_off_mm);
                if let Some((l, r)) = self.resume.as_mut() {
                    *l = reduce_owed(*l, progress, s);
                    *r = reduce_owed(*r, progress, s);
                }
                self.set_phase(4);
            }
            6 => {
                info!("Bypass complete after {} attempt(s)", self.bypass.attempts);
                self.resume_callback()?;
            }
            n => self.set_phase(n + 1),
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Reduce a wheel's owed displacement by the progress made along the route line.
///
/// A pass longer than the distance owed leaves nothing to drive, never a move against the
/// direction of travel.
fn reduce_owed(owed_mm: f64, progress_mm: f64, sign: f64) -> f64 {
    let rest = owed_mm - progress_mm;
    if sign * rest < 0.0 {
        0.0
    } else {
        rest
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
