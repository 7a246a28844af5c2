/*!

A single integration run: one model variant, one parameter set, one initial state, one time grid.

Everything that can be checked before integrating is checked in [`Simulation::new`], so a
`Simulation` that exists can only fail at [`Simulation::run`] for numerical reasons (or
because it was cancelled or timed out).

```rust
use possum_tb::{ModelKind, ParameterSet, Simulation, State, TimeGrid};

let simulation = Simulation::new(
    ModelKind::Baseline,
    &ParameterSet::reference(),
    State::new(20.0, 0.0, 0.0, 30.0, 0.0, 1.0),
    TimeGrid::reference(),
)?;
let trajectory = simulation.run()?;
assert_eq!(trajectory.len(), 76);
# Ok::<(), possum_tb::TbError>(())
```

*/

use log::debug;

use crate::{
    error::TbError,
    model::{Model, ModelKind},
    parameters::ParameterSet,
    solver::{CancellationToken, SolverOptions, integrate},
    state::State,
    time_grid::TimeGrid,
    trajectory::Trajectory,
};

#[derive(Clone, Debug)]
pub struct Simulation {
    model: Model,
    initial_state: State,
    time_grid: TimeGrid,
    options: SolverOptions,
    cancellation: Option<CancellationToken>,
}

impl Simulation {
    pub fn new(
        kind: ModelKind,
        parameters: &ParameterSet,
        initial_state: State,
        time_grid: TimeGrid,
    ) -> Result<Self, TbError> {
        parameters.validate()?;
        let model = Model::new(kind, parameters)?;
        Simulation::from_model(model, initial_state, time_grid)
    }

    pub fn from_model(
        model: Model,
        initial_state: State,
        time_grid: TimeGrid,
    ) -> Result<Self, TbError> {
        model.check_initial_state(&initial_state)?;
        Ok(Simulation {
            model,
            initial_state,
            time_grid,
            options: SolverOptions::default(),
            cancellation: None,
        })
    }

    pub fn with_options(mut self, options: SolverOptions) -> Result<Self, TbError> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[must_use]
    pub fn initial_state(&self) -> &State {
        &self.initial_state
    }

    #[must_use]
    pub fn time_grid(&self) -> &TimeGrid {
        &self.time_grid
    }

    #[must_use]
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Integrates the model over the time grid.
    pub fn run(&self) -> Result<Trajectory, TbError> {
        debug!(
            "running {} model from t={} to t={} ({} output times)",
            self.model.kind(),
            self.time_grid.start(),
            self.time_grid.end(),
            self.time_grid.len()
        );
        let states = integrate(
            &self.model,
            &self.initial_state.to_array(),
            self.time_grid.times(),
            &self.options,
            self.cancellation.as_ref(),
        )?;
        let states: Vec<State> = states.iter().map(|y| State::from_slice(y)).collect();
        Ok(Trajectory::from_states(&self.model, self.time_grid.times(), &states))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::SolverFailure,
        parameters::Parameter,
        state::{AgeClass, Compartment},
    };

    fn initial_state() -> State {
        State::new(20.0, 0.0, 0.0, 30.0, 0.0, 1.0)
    }

    fn run(kind: ModelKind, parameters: &ParameterSet) -> Trajectory {
        Simulation::new(kind, parameters, initial_state(), TimeGrid::reference())
            .unwrap()
            .run()
            .unwrap()
    }

    fn max_difference(a: &Trajectory, b: &Trajectory) -> f64 {
        a.iter()
            .zip(b)
            .flat_map(|(p, q)| {
                p.state
                    .to_array()
                    .into_iter()
                    .zip(q.state.to_array())
                    .map(|(x, y)| (x - y).abs())
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn baseline_population_peaks_early_above_carrying_capacity() {
        let trajectory = run(ModelKind::Baseline, &ParameterSet::reference());
        let peak = trajectory.peak_total_population().unwrap();
        assert!(peak.auxiliaries.total_population > 50.0);
        assert!(peak.time < 1.5, "peak at t={}", peak.time);
        assert_eq!(trajectory.first().unwrap().state, initial_state());
        assert_eq!(trajectory.last().unwrap().time, 7.5);
    }

    #[test]
    fn time_points_strictly_increase() {
        let trajectory = run(ModelKind::Baseline, &ParameterSet::reference());
        assert_eq!(trajectory.len(), 76);
        assert!(trajectory.points().windows(2).all(|pair| pair[0].time < pair[1].time));
    }

    #[test]
    fn compartments_stay_non_negative() {
        let parameters = ParameterSet::reference()
            .with_r_beta1(1.0)
            .with_r_beta2(3.0)
            .with_r_beta3(0.5)
            .with_mu1(0.3)
            .with_mu2(0.1)
            .with_tau1(1.5)
            .with_tau2(0.7)
            .with_epsilon(0.8);
        for kind in ModelKind::ALL {
            let trajectory = run(kind, &parameters);
            for point in &trajectory {
                for compartment in Compartment::ALL {
                    assert!(
                        point.state.get(compartment) >= -1e-9,
                        "{kind}: {} = {} at t={}",
                        compartment.label(),
                        point.state.get(compartment),
                        point.time
                    );
                }
            }
        }
    }

    #[test]
    fn total_population_changes_by_births_minus_deaths() {
        let parameters = ParameterSet::reference().with_epsilon(0.4);
        let grid = TimeGrid::uniform(0.0, 3.0, 0.001).unwrap();
        let options = SolverOptions { rtol: 1e-11, atol: 1e-12, ..SolverOptions::default() };
        let trajectory = Simulation::new(ModelKind::Culling, &parameters, initial_state(), grid)
            .unwrap()
            .with_options(options)
            .unwrap()
            .run()
            .unwrap();

        let points = trajectory.points();
        for window in points.windows(3) {
            let [before, point, after] = window else { unreachable!() };
            let finite_difference = (after.auxiliaries.total_population
                - before.auxiliaries.total_population)
                / (after.time - before.time);
            let net_growth = point.auxiliaries.net_growth();
            assert!(
                (finite_difference - net_growth).abs() <= 1e-3 * net_growth.abs().max(1.0),
                "t={}: {finite_difference} vs {net_growth}",
                point.time
            );
        }
    }

    #[test]
    fn culling_lowers_final_infectious_adults() {
        let without = run(ModelKind::Culling, &ParameterSet::reference().with_epsilon(0.0));
        let with = run(ModelKind::Culling, &ParameterSet::reference().with_epsilon(0.8));
        let without = without.at_time(7.5).unwrap().state.iad;
        let with = with.at_time(7.5).unwrap().state.iad;
        assert!(with < without, "{with} >= {without}");
    }

    #[test]
    fn zero_transmission_generates_no_infections() {
        let trajectory = run(ModelKind::Baseline, &ParameterSet::reference().with_r_beta(0.0));
        let points = trajectory.points();
        for point in points {
            assert_eq!(point.auxiliaries.force_of_infection_juvenile, 0.0);
            assert_eq!(point.auxiliaries.force_of_infection_adult, 0.0);
        }
        // The seeded infectious adult only decays; offspring born exposed never outnumber it.
        for pair in points.windows(2) {
            assert!(pair[1].state.iad <= pair[0].state.iad);
            assert!(pair[1].state.infected() <= pair[0].state.infected() + 1e-12);
        }

        let silent_parameters = ParameterSet::reference()
            .with_r_beta1(0.0)
            .with_r_beta2(0.0)
            .with_r_beta3(0.0);
        let uninfected = State::new(20.0, 0.0, 0.0, 30.0, 0.0, 0.0);
        let trajectory = Simulation::new(
            ModelKind::AgeTransmission,
            &silent_parameters,
            uninfected,
            TimeGrid::reference(),
        )
        .unwrap()
        .run()
        .unwrap();
        for point in &trajectory {
            assert_eq!(point.state.ej, 0.0);
            assert_eq!(point.state.ij, 0.0);
            assert_eq!(point.state.ead, 0.0);
            assert_eq!(point.state.iad, 0.0);
        }
    }

    #[test]
    fn larger_carrying_capacity_supports_larger_population() {
        let small = run(ModelKind::CarryingCapacity, &ParameterSet::reference().with_kappa(10.0));
        let large = run(ModelKind::CarryingCapacity, &ParameterSet::reference().with_kappa(100.0));
        let small = small.summary().unwrap().final_total_population;
        let large = large.summary().unwrap().final_total_population;
        assert!(small < large, "{small} >= {large}");
    }

    #[test]
    fn peak_population_does_not_decrease_with_carrying_capacity() {
        let mut previous_peak = 0.0;
        for kappa in (10..=100).step_by(5) {
            let parameters = ParameterSet::reference().with_kappa(f64::from(kappa));
            let peak = run(ModelKind::CarryingCapacity, &parameters)
                .summary()
                .unwrap()
                .peak_total_population;
            assert!(peak >= previous_peak - 1e-9, "kappa={kappa}: {peak} < {previous_peak}");
            previous_peak = peak;
        }
    }

    #[test]
    fn equal_contact_rates_reduce_to_baseline() {
        let parameters = ParameterSet::reference()
            .with_r_beta1(2.1)
            .with_r_beta2(2.1)
            .with_r_beta3(2.1);
        let baseline = run(ModelKind::Baseline, &parameters);
        let age_structured = run(ModelKind::AgeTransmission, &parameters);
        // The two forces of infection agree only up to rounding, so step sequences may differ.
        assert!(max_difference(&baseline, &age_structured) < 1e-5);
    }

    #[test]
    fn equal_mortality_rates_reduce_to_baseline() {
        let parameters = ParameterSet::reference()
            .with_mu1(0.2)
            .with_mu2(0.2)
            .with_tau1(1.0)
            .with_tau2(1.0);
        let baseline = run(ModelKind::Baseline, &parameters);
        let age_structured = run(ModelKind::AgeMortality, &parameters);
        assert!(max_difference(&baseline, &age_structured) < 1e-6);
    }

    #[test]
    fn configuration_errors_fail_before_integration() {
        let missing = Simulation::new(
            ModelKind::Culling,
            &ParameterSet::reference(),
            initial_state(),
            TimeGrid::reference(),
        );
        assert!(matches!(missing, Err(TbError::MissingParameter(Parameter::Epsilon))));

        let negative_state = State::new(20.0, 0.0, -1.0, 30.0, 0.0, 1.0);
        let invalid = Simulation::new(
            ModelKind::Baseline,
            &ParameterSet::reference(),
            negative_state,
            TimeGrid::reference(),
        );
        assert!(matches!(invalid, Err(TbError::InvalidInitialState { .. })));

        let no_adults = State::new(20.0, 0.0, 1.0, 0.0, 0.0, 0.0);
        let empty = Simulation::new(
            ModelKind::Baseline,
            &ParameterSet::reference(),
            no_adults,
            TimeGrid::reference(),
        );
        assert!(matches!(empty, Err(TbError::EmptyAgeClass(AgeClass::Adult))));

        // Parameters not read by the variant are still checked.
        let stray = ParameterSet::reference().with_tau2(-1.0);
        let invalid =
            Simulation::new(ModelKind::Baseline, &stray, initial_state(), TimeGrid::reference());
        assert!(matches!(
            invalid,
            Err(TbError::InvalidParameter { parameter: Parameter::Tau2, .. })
        ));
    }

    #[test]
    fn unrepresentable_timeout_is_a_configuration_error() {
        let simulation = Simulation::new(
            ModelKind::Baseline,
            &ParameterSet::reference(),
            initial_state(),
            TimeGrid::reference(),
        )
        .unwrap();
        let options = SolverOptions { timeout_secs: Some(1e20), ..SolverOptions::default() };
        assert!(simulation.clone().with_options(options).is_err());

        let options = SolverOptions { timeout_secs: Some(60.0), ..SolverOptions::default() };
        let trajectory = simulation.with_options(options).unwrap().run().unwrap();
        assert_eq!(trajectory.len(), 76);
    }

    #[test]
    fn cancelled_run_reports_numerical_failure() {
        let token = CancellationToken::new();
        let simulation = Simulation::new(
            ModelKind::Baseline,
            &ParameterSet::reference(),
            initial_state(),
            TimeGrid::reference(),
        )
        .unwrap()
        .with_cancellation(token.clone());
        token.cancel();
        match simulation.run() {
            Err(TbError::SolverFailure(SolverFailure::Cancelled { t })) => assert_eq!(t, 0.0),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
