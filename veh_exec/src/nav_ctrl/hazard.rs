//! # Hazard preemption and the hazard wait states

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};

use super::{state::Leg, NavCtrl, NavCtrlError, NavFailure, NavState};
use veh_if::{
    eqpt::{Odometer, PowerPair, StatusDisplay, TravelDir, POWER_LIMIT},
    route::{AvoidanceMode, Move},
};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<O: Odometer, D: StatusDisplay> NavCtrl<O, D> {
    /// Check the hazard sensors against the active move, preempting it if needed.
    ///
    /// Runs before the state body every cycle. Returns true if the active move was preempted.
    pub(super) fn check_hazard(&mut self) -> bool {
        if !self.state.is_motion() {
            return false;
        }

        let travel_dir = self.active_move.and_then(|m| m.travel_dir());

        // A park is never resumed. Any forward hazard stops it, as does a hazard behind a
        // reversing park.
        if self.state == NavState::Park {
            let behind = travel_dir.map_or(false, |d| self.hazard.is_hazard(d));
            if self.hazard.forward || behind {
                self.fail(NavFailure::ParkInterrupted);
                return true;
            }
            return false;
        }

        // Rotations have no travel direction and are never preempted
        let dir = match travel_dir {
            Some(d) => d,
            None => return false,
        };

        let hazard = self.hazard.is_hazard(dir);

        if self.avoidance() == AvoidanceMode::Adjust {
            // The leg's target isn't set until its first cycle
            if self.fresh_entry {
                return false;
            }

            if hazard && !self.adjust_latched {
                self.veer();
            }
            self.adjust_latched = hazard;
            return false;
        }

        if !hazard {
            return false;
        }

        let remainder = self.capture_remainder();

        warn!(
            "Hazard {:?} during {}, remainder ({:.1}, {:.1}) mm",
            dir, self.state, remainder.0, remainder.1
        );

        self.callback = Some(self.state);
        self.resume = Some(remainder);
        self.leg = None;
        self.transition(NavState::hazard_for(dir));

        true
    }

    /// Body of `HazardForward` and `HazardBackward`.
    ///
    /// Phase 0 brakes with a reversed pulse, phase 1 holds position until the hazard clears or the
    /// timeout expires.
    pub(super) fn hazard_wait(
        &mut self,
        entered: bool,
        dt_s: f64,
    ) -> Result<PowerPair, NavCtrlError> {
        let dir = self.state.hazard_dir().unwrap_or(TravelDir::Forward);

        if entered {
            self.dist.set_target(0.0, 0.0);
        }

        if self.phase == 0 {
            if self.elapsed_ms() < self.params.brake_ms {
                let brake = self.params.brake_power.saturating_abs().min(POWER_LIMIT);
                return Ok(match dir {
                    TravelDir::Forward => PowerPair::new(-brake, -brake),
                    TravelDir::Backward => PowerPair::new(brake, brake),
                });
            }
            self.set_phase(1);
        }

        let power = self.dist.run_dt(dt_s);

        if !self.hazard.is_hazard(dir) {
            info!("Hazard cleared after {} ms", self.elapsed_ms());
            self.resume_callback()?;
            return Ok(power);
        }

        if self.elapsed_ms() >= self.params.hazard_timeout_ms {
            match self.avoidance() {
                AvoidanceMode::Halt => self.fail(NavFailure::HazardTimeout),
                _ => {
                    warn!(
                        "Hazard {:?} still present after {} ms, bypassing",
                        dir,
                        self.elapsed_ms()
                    );
                    self.transition(NavState::bypass_for(dir));
                }
            }
        }

        Ok(power)
    }

    /// The displacement still owed by the active move.
    fn capture_remainder(&self) -> (f64, f64) {
        // Preempted before the leg started, the whole pending target is owed
        if self.fresh_entry {
            if let Some(r) = self.resume {
                return r;
            }
            if let Some(Move::Motion {
                left_mm, right_mm, ..
            }) = self.active_move
            {
                return (left_mm, right_mm);
            }
        }

        if let Some(Leg {
            target,
            settle_until_ms: Some(_),
        }) = self.leg
        {
            return target;
        }

        let straight = matches!(self.state, NavState::Forward | NavState::Backward);
        if straight && self.params.average_straight_remainder {
            self.dist.averaged_remainder_target()
        } else {
            self.dist.remainder_target()
        }
    }

    /// Veer away from a hazard without leaving the leg.
    fn veer(&mut self) {
        let veer = self.params.adjust_veer_mm;

        info!("Hazard during {}, veering by {} mm", self.state, veer);

        self.dist.add_target(veer, -veer);
        if let Some(leg) = self.leg.as_mut() {
            leg.target.0 += veer;
            leg.target.1 -= veer;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
