//! A deterministic compartmental model of bovine tuberculosis in a possum population.
//!
//! Possums are split into juveniles and adults, each susceptible, exposed or infectious. Five
//! model variants ([`ModelKind`]) share one mass-balance structure with density-dependent births
//! and mortality. A [`Simulation`] integrates one variant over a [`TimeGrid`]; a
//! [`sweep::Sweep`] integrates it for every combination of a parameter grid and collects the
//! tagged trajectories into a [`sweep::SweepTable`].
pub mod config;
pub mod error;
pub mod log;
pub mod model;
pub mod parameters;
pub mod simulation;
pub mod solver;
pub mod state;
pub mod sweep;
pub mod time_grid;
pub mod trajectory;

pub use config::ScenarioConfig;
pub use error::{SolverFailure, TbError};
pub use model::{Model, ModelKind};
pub use parameters::{Parameter, ParameterSet};
pub use simulation::Simulation;
pub use solver::{CancellationToken, SolverOptions, SolverStats};
pub use state::{AgeClass, Compartment, State};
pub use time_grid::TimeGrid;
pub use trajectory::{TimePoint, Trajectory, TrajectorySummary};
