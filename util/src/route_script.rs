//! # Route script interpreter
//!
//! Routes are written either as a JSON array of [`Move`]s or as a line-oriented route script. A
//! route script holds one statement per line:
//!
//! ```text
//! # Comments run to the end of the line
//! splash;
//! road_info;
//! fwd 300;                # both wheels 300 mm
//! fwd 250 260 50 adjust;  # explicit wheel targets, max power, avoidance mode
//! rotl 95;                # left wheel -95 mm, right wheel 95 mm
//! deploy;
//! stop;
//! ```
//!
//! Motion kinds are `fwd`, `bwd`, `rotl`, `rotr`, `park` and `unpark`, markers are `splash`,
//! `road_info`, `deploy` and `stop`. A motion statement takes either one distance or an explicit
//! left and right target, optionally followed by a maximum power. The avoidance mode (`halt`,
//! `bypass` or `adjust`) is always last.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use regex::{Captures, Regex};
use std::fs;
use std::path::Path;
use thiserror::Error;

use veh_if::route::{AvoidanceMode, Marker, MotionKind, Move, Route, RouteError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const STATEMENT_PATTERN: &str = r"^(?P<kind>[a-z_]+)(?P<args>(?:\s+-?\d+(?:\.\d+)?)*)(?:\s+(?P<avoid>halt|bypass|adjust))?\s*;$";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RouteScriptError {
    #[error("Could not load the route script: {0}")]
    LoadError(std::io::Error),

    #[error("Route statement pattern is invalid: {0}")]
    InvalidPattern(regex::Error),

    #[error("Line {line}: cannot parse statement `{text}`")]
    InvalidSyntax { line: usize, text: String },

    #[error("Line {line}: unknown move kind `{kind}`")]
    UnknownKind { line: usize, kind: String },

    #[error("Line {line}: {reason}")]
    InvalidArgs { line: usize, reason: String },

    #[error("Route JSON is invalid: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Route is invalid: {0}")]
    InvalidRoute(RouteError),
}

enum Kind {
    Motion(MotionKind),
    Marker(Marker),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a route from a file, choosing the format from the extension (`.json` for JSON, anything
/// else is treated as a route script).
pub fn load_route<P: AsRef<Path>>(path: P) -> Result<Route, RouteScriptError> {
    let text = fs::read_to_string(path.as_ref()).map_err(RouteScriptError::LoadError)?;

    match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some("json") => parse_json(&text),
        _ => parse_script(&text),
    }
}

/// Parse a JSON array of moves into a route.
pub fn parse_json(text: &str) -> Result<Route, RouteScriptError> {
    let moves: Vec<Move> = serde_json::from_str(text).map_err(RouteScriptError::InvalidJson)?;

    Route::new(moves).map_err(RouteScriptError::InvalidRoute)
}

/// Parse a route script into a route.
pub fn parse_script(text: &str) -> Result<Route, RouteScriptError> {
    let re = Regex::new(STATEMENT_PATTERN).map_err(RouteScriptError::InvalidPattern)?;

    let mut moves = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;

        let stmt = match raw.find('#') {
            Some(i) => &raw[..i],
            None => raw,
        }
        .trim();

        if stmt.is_empty() {
            continue;
        }

        let cap = re
            .captures(stmt)
            .ok_or_else(|| RouteScriptError::InvalidSyntax {
                line,
                text: stmt.to_string(),
            })?;

        moves.push(parse_statement(line, &cap)?);
    }

    Route::new(moves).map_err(RouteScriptError::InvalidRoute)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parse_statement(line: usize, cap: &Captures) -> Result<Move, RouteScriptError> {
    let kind_str = cap.name("kind").map(|m| m.as_str()).unwrap_or("");

    let kind = match kind_str {
        "fwd" => Kind::Motion(MotionKind::Forward),
        "bwd" => Kind::Motion(MotionKind::Backward),
        "rotl" => Kind::Motion(MotionKind::RotateLeft),
        "rotr" => Kind::Motion(MotionKind::RotateRight),
        "park" => Kind::Motion(MotionKind::Park),
        "unpark" => Kind::Motion(MotionKind::Unpark),
        "splash" => Kind::Marker(Marker::Splash),
        "road_info" => Kind::Marker(Marker::RoadInfo),
        "deploy" => Kind::Marker(Marker::DeploySensor),
        "stop" => Kind::Marker(Marker::Stop),
        k => {
            return Err(RouteScriptError::UnknownKind {
                line,
                kind: k.to_string(),
            })
        }
    };

    // The pattern only admits well formed numbers so parsing can't fail
    let args: Vec<f64> = cap
        .name("args")
        .map(|m| m.as_str())
        .unwrap_or("")
        .split_whitespace()
        .filter_map(|a| a.parse().ok())
        .collect();

    let avoid = cap.name("avoid").map(|m| match m.as_str() {
        "halt" => AvoidanceMode::Halt,
        "adjust" => AvoidanceMode::Adjust,
        _ => AvoidanceMode::Bypass,
    });

    let kind = match kind {
        Kind::Marker(marker) => {
            if !args.is_empty() || avoid.is_some() {
                return Err(RouteScriptError::InvalidArgs {
                    line,
                    reason: format!("`{}` takes no arguments", kind_str),
                });
            }
            return Ok(Move::Marker(marker));
        }
        Kind::Motion(k) => k,
    };

    let (left_mm, right_mm, max_power) = match args.as_slice() {
        [dist] => {
            let (l, r) = expand_single(kind, *dist);
            (l, r, None)
        }
        [l, r] => (*l, *r, None),
        [l, r, p] => (*l, *r, Some(*p)),
        _ => {
            return Err(RouteScriptError::InvalidArgs {
                line,
                reason: format!(
                    "`{}` takes a distance or `left right [max_power]`, found {} numbers",
                    kind_str,
                    args.len()
                ),
            })
        }
    };

    let mut m = Move::with_targets(kind, left_mm, right_mm);
    if let Some(p) = max_power {
        m = m.with_max_power(p);
    }
    if let Some(a) = avoid {
        m = m.with_avoidance(a);
    }

    Ok(m)
}

/// Expand a single distance into wheel targets for the given motion kind.
fn expand_single(kind: MotionKind, dist: f64) -> (f64, f64) {
    match kind {
        MotionKind::Forward | MotionKind::Park | MotionKind::Unpark => (dist, dist),
        MotionKind::Backward => (-dist, -dist),
        MotionKind::RotateLeft => (-dist, dist),
        MotionKind::RotateRight => (dist, -dist),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script = "
            # Demo route
            splash;
            road_info;
            fwd 300;               # straight
            rotl 95;
            bwd 250 260 40 halt;
            park 120 adjust;
            deploy;
            stop;
        ";

        let route = parse_script(script).unwrap();
        let moves = route.moves();

        assert_eq!(moves.len(), 8);
        assert_eq!(moves[0], Move::Marker(Marker::Splash));
        assert_eq!(moves[2], Move::forward(300.0));
        assert_eq!(moves[3], Move::rotate_left(95.0));
        assert_eq!(
            moves[4],
            Move::with_targets(MotionKind::Backward, 250.0, 260.0)
                .with_max_power(40.0)
                .with_avoidance(AvoidanceMode::Halt)
        );
        assert_eq!(
            moves[5],
            Move::with_targets(MotionKind::Park, 120.0, 120.0).with_avoidance(AvoidanceMode::Adjust)
        );
        assert_eq!(moves[6], Move::Marker(Marker::DeploySensor));
        assert!(moves[7].is_stop());
    }

    #[test]
    fn test_backward_single_distance_is_negated() {
        let route = parse_script("bwd 100;\nstop;").unwrap();
        assert_eq!(route.moves()[0], Move::backward(100.0));
    }

    #[test]
    fn test_errors_carry_line() {
        match parse_script("fwd 100;\nfly 20;\nstop;") {
            Err(RouteScriptError::UnknownKind { line: 2, kind }) => assert_eq!(kind, "fly"),
            r => panic!("Unexpected result {:?}", r),
        }

        match parse_script("fwd 100;\n\nfwd 1 2 3 4;\nstop;") {
            Err(RouteScriptError::InvalidArgs { line: 3, .. }) => (),
            r => panic!("Unexpected result {:?}", r),
        }

        match parse_script("fwd 100\nstop;") {
            Err(RouteScriptError::InvalidSyntax { line: 1, .. }) => (),
            r => panic!("Unexpected result {:?}", r),
        }

        match parse_script("stop 3;") {
            Err(RouteScriptError::InvalidArgs { line: 1, .. }) => (),
            r => panic!("Unexpected result {:?}", r),
        }
    }

    #[test]
    fn test_route_must_stop() {
        match parse_script("fwd 100;") {
            Err(RouteScriptError::InvalidRoute(RouteError::MissingStop)) => (),
            r => panic!("Unexpected result {:?}", r),
        }
        match parse_script("# nothing here\n") {
            Err(RouteScriptError::InvalidRoute(RouteError::Empty)) => (),
            r => panic!("Unexpected result {:?}", r),
        }
    }

    #[test]
    fn test_parse_json() {
        let route = parse_json(
            r#"[{"motion": {"kind": "rotate_right", "left_mm": 90, "right_mm": -90}},
                {"marker": "stop"}]"#,
        )
        .unwrap();
        assert_eq!(route.moves()[0], Move::rotate_right(90.0));
    }
}
