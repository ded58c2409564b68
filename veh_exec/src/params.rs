//! # Vehicle Executable Parameters
//!
//! This module provide parameters for the vehicle executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    nav_ctrl::NavState,
    sim::{HazardWindow, SimParams},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Route loaded when none is given on the command line, relative to the software root.
    pub route_script: String,

    /// State to start in, `Splash` if not set.
    pub initial_state: Option<NavState>,

    /// Stop after this many cycles even if the route hasn't finished.
    pub max_cycles: Option<u64>,

    pub sim: SimParams,

    /// Obstacles presented to the simulated hazard sensor.
    pub hazards: Vec<HazardWindow>,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for VehExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.05,
            route_script: String::from("routes/demo.route"),
            initial_state: None,
            max_cycles: None,
            sim: SimParams::default(),
            hazards: Vec::new(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
