//! # Navigation control module
//!
//! This module implements the [`NavCtrl`] state machine, which drives the vehicle along its route
//! using the distance controller and supervises hazard preemption and recovery. The states are:
//!
//! - `Splash` - Start-up screen, waits before showing the route information.
//! - `RoadInfo` - Shows a summary of the route then loads the first move.
//! - `Forward`, `Backward`, `RotateLeft`, `RotateRight`, `Park`, `Unpark` - Motion states, each
//!   drives the active move's wheel targets to completion.
//! - `DeploySensor` - Holds position while the sensor is deployed.
//! - `HazardForward`, `HazardBackward` - A motion state was preempted by a hazard. Brakes, then
//!   waits for the hazard to clear before resuming the interrupted move.
//! - `HazardForwardBypass`, `HazardBackwardBypass` - The hazard didn't clear in time, so drive
//!   around it and resume the interrupted move on the far side.
//! - `Stop` - Terminal state, holds position for the rest of the execution.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod bypass;
mod hazard;
mod params;
mod state;
pub mod tm;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use util::archive::ArchiveError;
use veh_if::{
    eqpt::TravelDir,
    route::{Marker, MotionKind, Move},
};

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use params::NavCtrlParams;
pub use state::*;
pub use tm::{DistCtrlRecord, NavStatusReport, NavTm};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Logical state of the navigation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavState {
    Splash,
    RoadInfo,
    Stop,
    Forward,
    Backward,
    RotateLeft,
    RotateRight,
    Park,
    Unpark,
    DeploySensor,
    HazardForward,
    HazardBackward,
    HazardForwardBypass,
    HazardBackwardBypass,
}

/// Reasons the route was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavFailure {
    /// The hazard didn't clear on a leg which may not bypass it.
    HazardTimeout,

    /// The hazard was still present after the maximum number of bypass attempts.
    BypassAttemptsExhausted,

    /// A single bypass leg didn't complete in time.
    BypassPhaseTimeout,

    /// A hazard appeared during a park, which is never resumed.
    ParkInterrupted,
}

/// Possible errors that can occur during NavCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum NavCtrlError {
    #[error("The route cursor ran past the end of the route")]
    RouteCursorOverrun,

    #[error("{0} is not a valid initial state for a route starting with {1:?}")]
    InvalidInitialState(NavState, Option<Move>),

    #[error("Entered {0} without an active motion move")]
    NoActiveMove(NavState),

    #[error("Entered {0} without a state to return to")]
    NoCallbackState(NavState),

    #[error("Could not create the NavCtrl archives: {0}")]
    ArchiveInit(ArchiveError),
}

/// Error returned when a state name can't be parsed.
#[derive(Debug, thiserror::Error)]
#[error("Unknown navigation state `{0}`")]
pub struct ParseNavStateError(String);

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NavState {
    const ALL: [NavState; 14] = [
        NavState::Splash,
        NavState::RoadInfo,
        NavState::Stop,
        NavState::Forward,
        NavState::Backward,
        NavState::RotateLeft,
        NavState::RotateRight,
        NavState::Park,
        NavState::Unpark,
        NavState::DeploySensor,
        NavState::HazardForward,
        NavState::HazardBackward,
        NavState::HazardForwardBypass,
        NavState::HazardBackwardBypass,
    ];

    /// The state a route entry is executed in.
    pub fn from_move(m: &Move) -> Self {
        match *m {
            Move::Motion { kind, .. } => match kind {
                MotionKind::Forward => NavState::Forward,
                MotionKind::Backward => NavState::Backward,
                MotionKind::RotateLeft => NavState::RotateLeft,
                MotionKind::RotateRight => NavState::RotateRight,
                MotionKind::Park => NavState::Park,
                MotionKind::Unpark => NavState::Unpark,
            },
            Move::Marker(marker) => match marker {
                Marker::Splash => NavState::Splash,
                Marker::RoadInfo => NavState::RoadInfo,
                Marker::DeploySensor => NavState::DeploySensor,
                Marker::Stop => NavState::Stop,
            },
        }
    }

    /// True for the states which execute a motion move.
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            NavState::Forward
                | NavState::Backward
                | NavState::RotateLeft
                | NavState::RotateRight
                | NavState::Park
                | NavState::Unpark
        )
    }

    /// The hazard wait state guarding travel in `dir`.
    pub fn hazard_for(dir: TravelDir) -> Self {
        match dir {
            TravelDir::Forward => NavState::HazardForward,
            TravelDir::Backward => NavState::HazardBackward,
        }
    }

    /// The bypass state for travel in `dir`.
    pub fn bypass_for(dir: TravelDir) -> Self {
        match dir {
            TravelDir::Forward => NavState::HazardForwardBypass,
            TravelDir::Backward => NavState::HazardBackwardBypass,
        }
    }

    /// The direction a hazard or bypass state is guarding, if any.
    pub fn hazard_dir(&self) -> Option<TravelDir> {
        match self {
            NavState::HazardForward | NavState::HazardForwardBypass => Some(TravelDir::Forward),
            NavState::HazardBackward | NavState::HazardBackwardBypass => Some(TravelDir::Backward),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            NavState::Splash => "Splash",
            NavState::RoadInfo => "RoadInfo",
            NavState::Stop => "Stop",
            NavState::Forward => "Forward",
            NavState::Backward => "Backward",
            NavState::RotateLeft => "RotateLeft",
            NavState::RotateRight => "RotateRight",
            NavState::Park => "Park",
            NavState::Unpark => "Unpark",
            NavState::DeploySensor => "DeploySensor",
            NavState::HazardForward => "HazardForward",
            NavState::HazardBackward => "HazardBackward",
            NavState::HazardForwardBypass => "HazardForwardBypass",
            NavState::HazardBackwardBypass => "HazardBackwardBypass",
        }
    }
}

impl Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NavState::{}", self.name())
    }
}

impl FromStr for NavState {
    type Err = ParseNavStateError;

    /// Parse a state from its name, ignoring case and underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_lowercase();

        NavState::ALL
            .iter()
            .find(|st| st.name().to_lowercase() == wanted)
            .copied()
            .ok_or_else(|| ParseNavStateError(s.to_string()))
    }
}

impl Display for NavFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavFailure::HazardTimeout => write!(f, "Hazard did not clear"),
            NavFailure::BypassAttemptsExhausted => write!(f, "Could not bypass hazard"),
            NavFailure::BypassPhaseTimeout => write!(f, "Bypass leg timed out"),
            NavFailure::ParkInterrupted => write!(f, "Park interrupted by hazard"),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
