//! # Data Store

use log::warn;

use crate::nav_ctrl::NavStatusReport;
use veh_if::eqpt::{HazardReading, PowerPair};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive overruns after which every further overrun is reported.
const OVERRUN_WARN_LIMIT: u64 = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Debug, Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// Simulation elapsed time, advanced by one cycle period per cycle
    ///
    /// Units: milliseconds
    pub sim_time_ms: u64,

    // Sensing
    pub hazard: HazardReading,

    // NavCtrl
    pub nav_output: PowerPair,
    pub nav_status_rpt: NavStatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Clear the per-cycle items at the start of a new cycle.
    pub fn cycle_start(&mut self) {
        self.hazard = HazardReading::CLEAR;
        self.nav_output = PowerPair::ZERO;
    }

    /// Advance the cycle counters once a cycle of `cycle_period_ms` has finished.
    pub fn cycle_end(&mut self, cycle_period_ms: u64) {
        self.num_cycles += 1;
        self.sim_time_ms += cycle_period_ms;
    }

    /// Record whether the cycle that just finished overran its period.
    pub fn record_overrun(&mut self, overran: bool, overrun_ms: u64) {
        if !overran {
            self.num_consec_cycle_overruns = 0;
            return;
        }

        self.num_consec_cycle_overruns += 1;

        if self.num_consec_cycle_overruns == 1
            || self.num_consec_cycle_overruns >= OVERRUN_WARN_LIMIT
        {
            warn!(
                "Cycle overran by {} ms ({} consecutive)",
                overrun_ms, self.num_consec_cycle_overruns
            );
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
