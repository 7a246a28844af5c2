//! Output time grids.

use serde::{Deserialize, Serialize};

use crate::{error::TbError, solver::check_output_times};

/// Grid values are rounded to this many decimal places so that `start + i * step` reproduces
/// the decimal literal a caller would filter on (`0.3`, not `0.30000000000000004`).
const GRID_DECIMALS: i32 = 12;

/// Largest number of steps a uniform grid or sweep range may span.
pub(crate) const MAX_GRID_STEPS: usize = 10_000_000;

/// A non-empty, strictly increasing sequence of output times.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeGrid {
    times: Vec<f64>,
}

impl TimeGrid {
    pub fn new(times: Vec<f64>) -> Result<Self, TbError> {
        check_output_times(&times)?;
        Ok(TimeGrid { times })
    }

    /// `start, start + step, ...` up to and including `end` when `end - start` is a whole
    /// number of steps. `uniform(0.0, 7.5, 0.1)` has 76 points.
    pub fn uniform(start: f64, end: f64, step: f64) -> Result<Self, TbError> {
        TimeGrid::new(uniform_points(start, end, step).map_err(TbError::InvalidTimeGrid)?)
    }

    /// The grid used by the reference scenarios: 0 to 7.5 in steps of 0.1.
    #[must_use]
    pub fn reference() -> Self {
        let times = (0..=75).map(|i| f64::from(i) / 10.0).collect();
        TimeGrid { times }
    }

    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[must_use]
    pub fn start(&self) -> f64 {
        self.times[0]
    }

    #[must_use]
    pub fn end(&self) -> f64 {
        self.times[self.times.len() - 1]
    }
}

/// `start, start + step, ...` up to `end`, rounded to [`GRID_DECIMALS`] places. Also used for
/// sweep axes given as a range.
pub(crate) fn uniform_points(start: f64, end: f64, step: f64) -> Result<Vec<f64>, String> {
    if !start.is_finite() || !end.is_finite() || !step.is_finite() || step <= 0.0 {
        return Err(format!("cannot step from {start} to {end} by {step}"));
    }
    if end < start {
        return Err(format!("end {end} is before start {start}"));
    }
    let steps = ((end - start) / step + 1e-9).floor();
    if !steps.is_finite() || steps > MAX_GRID_STEPS as f64 {
        return Err(format!(
            "stepping from {start} to {end} by {step} takes more than {MAX_GRID_STEPS} steps"
        ));
    }
    let intervals = steps as usize;
    let scale = 10f64.powi(GRID_DECIMALS);
    Ok((0..=intervals)
        .map(|i| ((start + i as f64 * step) * scale).round() / scale)
        .collect())
}

impl<'de> Deserialize<'de> for TimeGrid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let times = Vec::<f64>::deserialize(deserializer)?;
        TimeGrid::new(times).map_err(serde::de::Error::custom)
    }
}
