//! # Route Definitions
//!
//! A route is the fixed, ordered table of moves the vehicle executes. Each entry is either a motion
//! step, which is driven by the distance controller, or a marker step, which puts the navigation
//! state machine into one of its non-motion states (splash screen, sensor deployment, stop, etc.).
//!
//! Routes are validated on construction: they must contain at least one move and must end in a
//! [`Marker::Stop`] so that the vehicle always comes to rest once the table is exhausted.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eqpt::TravelDir;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum power used by a motion step if none is given.
pub const DEFAULT_MAX_POWER: f64 = 65.0;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The kind of a motion step, which selects the navigation state it's executed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionKind {
    Forward,
    Backward,
    RotateLeft,
    RotateRight,
    Park,
    Unpark,
}

/// Non-motion steps of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Splash,
    RoadInfo,
    DeploySensor,
    Stop,
}

/// How a motion step reacts to a hazard in its direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidanceMode {
    /// Wait for the hazard to clear, stopping the route if it doesn't clear in time.
    Halt,

    /// Wait for the hazard to clear, driving around it if it doesn't clear in time.
    Bypass,

    /// Veer slightly away without stopping the step.
    Adjust,
}

/// A single entry in the route table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Move {
    Motion {
        kind: MotionKind,

        /// Left wheel displacement in millimeters
        left_mm: f64,

        /// Right wheel displacement in millimeters
        right_mm: f64,

        #[serde(default = "default_max_power")]
        max_power: f64,

        #[serde(default)]
        avoidance: AvoidanceMode,
    },
    Marker(Marker),
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("The route contains no moves")]
    Empty,

    #[error("The route does not end with a stop marker")]
    MissingStop,

    #[error("Move {0} has a non-finite displacement target")]
    NonFiniteTarget(usize),

    #[error("Move {0} has a maximum power outside of (0, 100]")]
    InvalidMaxPower(usize),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An ordered route table with a cursor pointing at the next move to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    moves: Vec<Move>,
    next: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for AvoidanceMode {
    fn default() -> Self {
        AvoidanceMode::Bypass
    }
}

impl Move {
    fn motion(kind: MotionKind, left_mm: f64, right_mm: f64) -> Self {
        Move::Motion {
            kind,
            left_mm,
            right_mm,
            max_power: DEFAULT_MAX_POWER,
            avoidance: AvoidanceMode::default(),
        }
    }

    pub fn forward(dist_mm: f64) -> Self {
        Self::motion(MotionKind::Forward, dist_mm, dist_mm)
    }

    pub fn backward(dist_mm: f64) -> Self {
        Self::motion(MotionKind::Backward, -dist_mm, -dist_mm)
    }

    /// Rotate on the spot to the left, each wheel travelling `arc_mm`.
    pub fn rotate_left(arc_mm: f64) -> Self {
        Self::motion(MotionKind::RotateLeft, -arc_mm, arc_mm)
    }

    /// Rotate on the spot to the right, each wheel travelling `arc_mm`.
    pub fn rotate_right(arc_mm: f64) -> Self {
        Self::motion(MotionKind::RotateRight, arc_mm, -arc_mm)
    }

    /// Build a motion step with explicit wheel targets.
    pub fn with_targets(kind: MotionKind, left_mm: f64, right_mm: f64) -> Self {
        Self::motion(kind, left_mm, right_mm)
    }

    /// Set the maximum power of a motion step. Has no effect on markers.
    pub fn with_max_power(mut self, power: f64) -> Self {
        if let Move::Motion {
            ref mut max_power, ..
        } = self
        {
            *max_power = power;
        }
        self
    }

    /// Set the avoidance mode of a motion step. Has no effect on markers.
    pub fn with_avoidance(mut self, mode: AvoidanceMode) -> Self {
        if let Move::Motion {
            ref mut avoidance, ..
        } = self
        {
            *avoidance = mode;
        }
        self
    }

    /// The direction this move carries the vehicle, used to decide which hazard sensor guards it.
    ///
    /// Rotations on the spot, markers, and moves with no net longitudinal travel have no direction.
    pub fn travel_dir(&self) -> Option<TravelDir> {
        match *self {
            Move::Motion {
                kind: MotionKind::RotateLeft,
                ..
            }
            | Move::Motion {
                kind: MotionKind::RotateRight,
                ..
            }
            | Move::Marker(_) => None,
            Move::Motion {
                left_mm, right_mm, ..
            } => {
                let net = left_mm + right_mm;
                if net > 0.0 {
                    Some(TravelDir::Forward)
                } else if net < 0.0 {
                    Some(TravelDir::Backward)
                } else {
                    None
                }
            }
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Move::Marker(Marker::Stop))
    }
}

impl Route {
    /// Validate and build a new route, with the cursor at the first move.
    pub fn new(moves: Vec<Move>) -> Result<Self, RouteError> {
        match moves.last() {
            None => return Err(RouteError::Empty),
            Some(m) if !m.is_stop() => return Err(RouteError::MissingStop),
            _ => (),
        }

        for (i, m) in moves.iter().enumerate() {
            if let Move::Motion {
                left_mm,
                right_mm,
                max_power,
                ..
            } = *m
            {
                if !left_mm.is_finite() || !right_mm.is_finite() {
                    return Err(RouteError::NonFiniteTarget(i));
                }
                if !(max_power > 0.0 && max_power <= 100.0) {
                    return Err(RouteError::InvalidMaxPower(i));
                }
            }
        }

        Ok(Self { moves, next: 0 })
    }

    /// Get the move at the cursor and advance the cursor past it.
    ///
    /// Returns `None` once every move has been consumed.
    pub fn next_move(&mut self) -> Option<Move> {
        let m = self.moves.get(self.next).copied();
        if m.is_some() {
            self.next += 1;
        }
        m
    }

    /// Look at the move at the cursor without advancing.
    pub fn peek(&self) -> Option<&Move> {
        self.moves.get(self.next)
    }

    /// Index of the next move to be executed.
    pub fn cursor(&self) -> usize {
        self.next
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Always false for a validated route.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.moves.len()
    }

    /// Sum of the mean absolute wheel displacement over all motion steps.
    pub fn total_distance_mm(&self) -> f64 {
        self.moves
            .iter()
            .map(|m| match *m {
                Move::Motion {
                    left_mm, right_mm, ..
                } => 0.5 * (left_mm.abs() + right_mm.abs()),
                Move::Marker(_) => 0.0,
            })
            .sum()
    }
}

fn default_max_power() -> f64 {
    DEFAULT_MAX_POWER
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
