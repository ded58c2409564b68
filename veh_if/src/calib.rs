//! # Sensor Threshold Calibration
//!
//! Surface sensors (infra-red reflectance, colour proximity) distinguish road from off-road by
//! comparing a raw reading against a threshold. The threshold is found by sampling both surfaces
//! and placing it midway between the two sets of readings. If the sets overlap no clear threshold
//! exists and sampling is repeated, up to a bounded number of attempts.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A calibrated surface threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    /// Threshold value in raw sensor units
    pub value: i32,

    /// If true road readings are above the threshold, otherwise they are below it
    pub road_above: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalibError {
    #[error("The sampler returned no readings for one of the surfaces")]
    NoReadings,

    #[error("No clear distinction between road and off-road readings after {attempts} attempts")]
    Ambiguous { attempts: u32 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Threshold {
    /// Classify a raw reading as road (`true`) or off-road (`false`).
    pub fn is_road(&self, reading: i32) -> bool {
        if self.road_above {
            reading > self.value
        } else {
            reading < self.value
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Find the threshold separating road from off-road readings.
///
/// `sample` is called with the attempt number (starting at 1) and must return the
/// `(road, off_road)` readings for that attempt. It's the sampler's job to prompt the operator and
/// wait between surfaces.
pub fn calibrate_threshold<F>(mut sample: F, max_attempts: u32) -> Result<Threshold, CalibError>
where
    F: FnMut(u32) -> (Vec<i32>, Vec<i32>),
{
    for attempt in 1..=max_attempts {
        let (road, off_road) = sample(attempt);

        let (road_min, road_max) = min_max(&road).ok_or(CalibError::NoReadings)?;
        let (off_min, off_max) = min_max(&off_road).ok_or(CalibError::NoReadings)?;

        debug!(
            "Calibration attempt {}: road [{}, {}], off-road [{}, {}]",
            attempt, road_min, road_max, off_min, off_max
        );

        if road_min > off_max {
            return Ok(Threshold {
                value: midpoint(road_min, off_max),
                road_above: true,
            });
        }
        if off_min > road_max {
            return Ok(Threshold {
                value: midpoint(road_max, off_min),
                road_above: false,
            });
        }

        warn!(
            "Calibration attempt {} ambiguous, road and off-road readings overlap",
            attempt
        );
    }

    Err(CalibError::Ambiguous {
        attempts: max_attempts,
    })
}

fn min_max(readings: &[i32]) -> Option<(i32, i32)> {
    let min = *readings.iter().min()?;
    let max = *readings.iter().max()?;
    Some((min, max))
}

fn midpoint(a: i32, b: i32) -> i32 {
    ((a as i64 + b as i64) / 2) as i32
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clear_separation() {
        let t = calibrate_threshold(|_| (vec![800, 820, 790], vec![200, 260, 240]), 3).unwrap();
        assert_eq!(
            t,
            Threshold {
                value: 525,
                road_above: true
            }
        );
        assert!(t.is_road(600));
        assert!(!t.is_road(400));

        let t = calibrate_threshold(|_| (vec![10, 20], vec![50, 60]), 1).unwrap();
        assert!(!t.road_above);
        assert_eq!(t.value, 35);
    }

    #[test]
    fn test_retries_until_separated() {
        let mut calls = 0;
        let t = calibrate_threshold(
            |attempt| {
                calls += 1;
                if attempt < 3 {
                    (vec![100, 500], vec![300])
                } else {
                    (vec![500, 510], vec![300])
                }
            },
            5,
        )
        .unwrap();

        assert_eq!(calls, 3);
        assert_eq!(t.value, 400);
    }

    #[test]
    fn test_bounded() {
        assert_eq!(
            calibrate_threshold(|_| (vec![1, 5], vec![3]), 4),
            Err(CalibError::Ambiguous { attempts: 4 })
        );
        assert_eq!(
            calibrate_threshold(|_| (vec![], vec![3]), 4),
            Err(CalibError::NoReadings)
        );
    }
}
