/*!

Parameter sweeps: one model, one initial state and one time grid integrated under every
combination of a Cartesian parameter grid.

Every combination is validated before anything is integrated, so a configuration error anywhere
in the grid fails the whole sweep up front. The runs themselves are independent and are spread
over the rayon thread pool. A run that fails numerically is recorded in
[`SweepReport::failures`] with its tag and does not affect the others.

```rust
use possum_tb::{
    ModelKind, ParameterSet, State, TimeGrid,
    parameters::Parameter,
    sweep::{ParameterGrid, Selection, Sweep, SweepAxis, select},
};

let grid = ParameterGrid::new(ParameterSet::reference())
    .vary(SweepAxis::new(Parameter::Epsilon, vec![0.0, 0.8])?)?;
let sweep = Sweep::new(
    ModelKind::Culling,
    grid,
    State::new(20.0, 0.0, 0.0, 30.0, 0.0, 1.0),
    TimeGrid::reference(),
);
let report = sweep.run()?;
assert!(report.is_complete());

let culled = select(&report.table, &Selection::new().with(Parameter::Epsilon, 0.8)).unwrap();
assert_eq!(culled.len(), 76);
# Ok::<(), possum_tb::TbError>(())
```

*/

mod query;
mod table;
mod tag;

use log::{error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub use query::{Selection, TagQuery, select};
pub use table::{SweepRow, SweepTable, TaggedTrajectory};
pub use tag::{Tag, TagKey};

use crate::{
    error::TbError,
    model::ModelKind,
    parameters::{Parameter, ParameterSet},
    simulation::Simulation,
    solver::{CancellationToken, SolverOptions},
    state::State,
    time_grid::{TimeGrid, uniform_points},
    trajectory::Trajectory,
};

/// The values one parameter takes across a sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AxisSpec")]
pub struct SweepAxis {
    parameter: Parameter,
    values: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AxisSpec {
    Values {
        parameter: Parameter,
        values: Vec<f64>,
    },
    Range {
        parameter: Parameter,
        start: f64,
        end: f64,
        step: f64,
    },
}

impl TryFrom<AxisSpec> for SweepAxis {
    type Error = TbError;

    fn try_from(spec: AxisSpec) -> Result<Self, Self::Error> {
        match spec {
            AxisSpec::Values { parameter, values } => SweepAxis::new(parameter, values),
            AxisSpec::Range {
                parameter,
                start,
                end,
                step,
            } => SweepAxis::range(parameter, start, end, step),
        }
    }
}

impl SweepAxis {
    /// An axis over explicit values. Values must be finite and distinct.
    pub fn new(parameter: Parameter, values: Vec<f64>) -> Result<Self, TbError> {
        if values.is_empty() {
            return Err(TbError::InvalidSweep(format!("no values given for `{parameter}`")));
        }
        if let Some(value) = values.iter().find(|value| !value.is_finite()) {
            return Err(TbError::InvalidSweep(format!(
                "non-finite value {value} for `{parameter}`"
            )));
        }
        for (i, value) in values.iter().enumerate() {
            if values[..i].contains(value) {
                return Err(TbError::InvalidSweep(format!(
                    "value {value} repeated for `{parameter}`"
                )));
            }
        }
        Ok(SweepAxis { parameter, values })
    }

    /// `start, start + step, ...` up to and including `end`, e.g. κ from 10 to 100 by 5.
    pub fn range(parameter: Parameter, start: f64, end: f64, step: f64) -> Result<Self, TbError> {
        let values = uniform_points(start, end, step)
            .map_err(|message| TbError::InvalidSweep(format!("`{parameter}`: {message}")))?;
        SweepAxis::new(parameter, values)
    }

    #[must_use]
    pub fn parameter(&self) -> Parameter {
        self.parameter
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// A base parameter set and the axes varied on top of it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterGrid {
    base: ParameterSet,
    axes: Vec<SweepAxis>,
}

impl ParameterGrid {
    #[must_use]
    pub fn new(base: ParameterSet) -> Self {
        ParameterGrid {
            base,
            axes: Vec::new(),
        }
    }

    /// Adds an axis. Each parameter can be varied at most once.
    pub fn vary(mut self, axis: SweepAxis) -> Result<Self, TbError> {
        if self.axes.iter().any(|existing| existing.parameter == axis.parameter) {
            return Err(TbError::InvalidSweep(format!(
                "`{}` is varied twice",
                axis.parameter
            )));
        }
        self.axes.push(axis);
        Ok(self)
    }

    #[must_use]
    pub fn base(&self) -> &ParameterSet {
        &self.base
    }

    #[must_use]
    pub fn axes(&self) -> &[SweepAxis] {
        &self.axes
    }

    /// Number of combinations; a grid without axes has exactly one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes.iter().map(|axis| axis.values.len()).product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination with its full parameter set. The last axis varies fastest.
    #[must_use]
    pub fn combinations(&self) -> Vec<(Tag, ParameterSet)> {
        let mut combinations = Vec::with_capacity(self.len());
        let mut positions = vec![0usize; self.axes.len()];
        loop {
            let values: Vec<(Parameter, f64)> = self
                .axes
                .iter()
                .zip(&positions)
                .map(|(axis, &position)| (axis.parameter, axis.values[position]))
                .collect();
            let mut parameters = self.base.clone();
            for &(parameter, value) in &values {
                parameters.set(parameter, value);
            }
            combinations.push((Tag::new(values), parameters));

            // Odometer increment, rightmost axis first.
            let mut axis = self.axes.len();
            loop {
                if axis == 0 {
                    return combinations;
                }
                axis -= 1;
                positions[axis] += 1;
                if positions[axis] < self.axes[axis].values.len() {
                    break;
                }
                positions[axis] = 0;
            }
        }
    }
}

/// A combination whose integration failed.
#[derive(Debug)]
pub struct RunFailure {
    pub tag: Tag,
    pub error: TbError,
}

#[derive(Debug)]
pub struct SweepReport {
    pub table: SweepTable,
    pub failures: Vec<RunFailure>,
}

impl SweepReport {
    /// Whether every combination produced a trajectory.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Sweep {
    kind: ModelKind,
    grid: ParameterGrid,
    initial_state: State,
    time_grid: TimeGrid,
    options: SolverOptions,
    cancellation: Option<CancellationToken>,
}

impl Sweep {
    #[must_use]
    pub fn new(
        kind: ModelKind,
        grid: ParameterGrid,
        initial_state: State,
        time_grid: TimeGrid,
    ) -> Self {
        Sweep {
            kind,
            grid,
            initial_state,
            time_grid,
            options: SolverOptions::default(),
            cancellation: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Cancelling the token stops every run of the sweep that has not finished.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    #[must_use]
    pub fn grid(&self) -> &ParameterGrid {
        &self.grid
    }

    fn prepare(&self, parameters: &ParameterSet) -> Result<Simulation, TbError> {
        let simulation = Simulation::new(
            self.kind,
            parameters,
            self.initial_state,
            self.time_grid.clone(),
        )?
        .with_options(self.options.clone())?;
        Ok(match &self.cancellation {
            Some(token) => simulation.with_cancellation(token.clone()),
            None => simulation,
        })
    }

    /// Runs every combination. Configuration errors are returned before any run starts;
    /// numerical failures are collected in the report.
    pub fn run(&self) -> Result<SweepReport, TbError> {
        let simulations = self
            .grid
            .combinations()
            .into_iter()
            .map(|(tag, parameters)| match self.prepare(&parameters) {
                Ok(simulation) => Ok((tag, simulation)),
                Err(error) => {
                    error!("invalid combination {tag}: {error}");
                    Err(error)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "sweeping {} model over {} combinations",
            self.kind,
            simulations.len()
        );
        let results: Vec<(Tag, Result<Trajectory, TbError>)> = simulations
            .into_par_iter()
            .map(|(tag, simulation)| {
                let result = simulation.run();
                (tag, result)
            })
            .collect();

        let axes = self.grid.axes.iter().map(SweepAxis::parameter).collect();
        let mut table = SweepTable::new(self.kind, axes);
        let mut failures = Vec::new();
        for (tag, result) in results {
            match result {
                Ok(trajectory) => table.insert(tag, trajectory)?,
                Err(error) => {
                    warn!("run {tag} failed: {error}");
                    failures.push(RunFailure { tag, error });
                }
            }
        }
        info!(
            "sweep finished: {} runs succeeded, {} failed",
            table.len(),
            failures.len()
        );

        Ok(SweepReport { table, failures })
    }
}
