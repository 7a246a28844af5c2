/*!

Scenario files: a JSON description of one simulation or one sweep.

```json
{
  "model": "culling",
  "initial_state": {"sj": 20, "ej": 0, "ij": 0, "sad": 30, "ead": 0, "iad": 1},
  "time_grid": {"start": 0.0, "end": 7.5, "step": 0.1},
  "parameters": {"lambda": 5, "kappa": 50, "rho": 0.5, "mu": 0.2, "tau": 1,
                 "gamma": 1, "alpha": 5, "r_beta": 2.1, "epsilon": 0.0},
  "sweep": [{"parameter": "epsilon", "values": [0.0, 0.5, 1.0]}],
  "solver": {"rtol": 1e-8, "atol": 1e-10}
}
```

`time_grid` may also be an explicit array of times. `sweep` and `solver` are optional. A sweep
axis is either a list of `values` or a `start`/`end`/`step` range.

*/

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::TbError,
    model::ModelKind,
    parameters::ParameterSet,
    simulation::Simulation,
    solver::SolverOptions,
    state::State,
    sweep::{ParameterGrid, Sweep, SweepAxis},
    time_grid::TimeGrid,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeGridSpec {
    Uniform { start: f64, end: f64, step: f64 },
    Explicit(Vec<f64>),
}

impl TimeGridSpec {
    pub fn to_time_grid(&self) -> Result<TimeGrid, TbError> {
        match self {
            TimeGridSpec::Uniform { start, end, step } => TimeGrid::uniform(*start, *end, *step),
            TimeGridSpec::Explicit(times) => TimeGrid::new(times.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub model: ModelKind,
    pub initial_state: State,
    pub time_grid: TimeGridSpec,
    pub parameters: ParameterSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sweep: Vec<SweepAxis>,
    #[serde(default)]
    pub solver: SolverOptions,
}

impl ScenarioConfig {
    /// The baseline reference scenario: SJ=20, SAd=30, IAd=1 over 0..7.5 by 0.1.
    #[must_use]
    pub fn reference() -> Self {
        ScenarioConfig {
            model: ModelKind::Baseline,
            initial_state: State::new(20.0, 0.0, 0.0, 30.0, 0.0, 1.0),
            time_grid: TimeGridSpec::Uniform {
                start: 0.0,
                end: 7.5,
                step: 0.1,
            },
            parameters: ParameterSet::reference(),
            sweep: Vec::new(),
            solver: SolverOptions::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, TbError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TbError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let config: ScenarioConfig = serde_json::from_reader(BufReader::new(file))?;
        log::debug!("loaded {} scenario from {}", config.model, path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, TbError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The single run described by the file. Any sweep axes are ignored.
    pub fn simulation(&self) -> Result<Simulation, TbError> {
        Simulation::new(
            self.model,
            &self.parameters,
            self.initial_state,
            self.time_grid.to_time_grid()?,
        )?
        .with_options(self.solver.clone())
    }

    /// The sweep described by the file; without axes it has a single untagged run.
    pub fn sweep(&self) -> Result<Sweep, TbError> {
        let mut grid = ParameterGrid::new(self.parameters.clone());
        for axis in &self.sweep {
            grid = grid.vary(axis.clone())?;
        }
        self.solver.validate()?;
        Ok(Sweep::new(
            self.model,
            grid,
            self.initial_state,
            self.time_grid.to_time_grid()?,
        )
        .with_options(self.solver.clone()))
    }
}
