/*!

The five right-hand sides of the possum TB model.

Every variant shares the same mass-balance skeleton (births, maturation, latency, density-
modulated natural mortality, TB mortality). A variant only decides three things, expressed by the
[`Dynamics`] trait:

 - the force of infection felt by juvenile and adult susceptibles,
 - how natural and TB mortality are split between age classes,
 - an additive culling rate for adults (zero except for the culling variant).

[`Model`] is the tagged union of the five variants. It is built from a [`ModelKind`] and a
[`ParameterSet`], validating the parameters the variant needs, and implements [`OdeSystem`] so
the solver can integrate it. The system is autonomous: time is never read.

*/

mod age_mortality;
mod age_transmission;
mod baseline;
mod carrying_capacity;
mod culling;
pub mod demography;

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

pub use age_mortality::AgeMortality;
pub use age_transmission::AgeTransmission;
pub use baseline::Baseline;
pub use carrying_capacity::CarryingCapacity;
pub use culling::Culling;
pub use demography::{DemographicRates, Demography};

use crate::{
    error::TbError,
    parameters::{Parameter, ParameterSet},
    solver::OdeSystem,
    state::{AgeClass, NUM_COMPARTMENTS, State},
};

/// Selects one of the five model variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Baseline,
    AgeTransmission,
    AgeMortality,
    Culling,
    CarryingCapacity,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Baseline,
        ModelKind::AgeTransmission,
        ModelKind::AgeMortality,
        ModelKind::Culling,
        ModelKind::CarryingCapacity,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Baseline => "baseline",
            ModelKind::AgeTransmission => "age_transmission",
            ModelKind::AgeMortality => "age_mortality",
            ModelKind::Culling => "culling",
            ModelKind::CarryingCapacity => "carrying_capacity",
        }
    }

    /// The parameters the variant reads. `delta` is optional everywhere and not listed.
    #[must_use]
    pub fn required_parameters(self) -> &'static [Parameter] {
        use Parameter::*;
        match self {
            ModelKind::Baseline | ModelKind::CarryingCapacity => {
                &[Lambda, Kappa, Rho, Mu, Tau, Gamma, Alpha, RBeta]
            }
            ModelKind::AgeTransmission => {
                &[Lambda, Kappa, Rho, Mu, Tau, Gamma, Alpha, RBeta1, RBeta2, RBeta3]
            }
            ModelKind::AgeMortality => {
                &[Lambda, Kappa, Rho, Mu1, Mu2, Tau1, Tau2, Gamma, Alpha, RBeta]
            }
            ModelKind::Culling => &[Lambda, Kappa, Rho, Mu, Tau, Gamma, Alpha, RBeta, Epsilon],
        }
    }
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Force of infection acting on each age class of susceptibles.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ForceOfInfection {
    pub juvenile: f64,
    pub adult: f64,
}

/// Per-capita mortality rates. Natural rates are scaled by the density feedback Y, TB rates are
/// not.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Mortality {
    pub juvenile_natural: f64,
    pub adult_natural: f64,
    pub juvenile_tb: f64,
    pub adult_tb: f64,
}

impl Mortality {
    #[must_use]
    pub fn uniform(natural: f64, tb: f64) -> Self {
        Mortality {
            juvenile_natural: natural,
            adult_natural: natural,
            juvenile_tb: tb,
            adult_tb: tb,
        }
    }
}

/// What distinguishes one model variant from another.
pub trait Dynamics {
    fn demographic_rates(&self) -> &DemographicRates;

    fn force_of_infection(&self, demography: &Demography) -> ForceOfInfection;

    fn mortality(&self) -> Mortality;

    /// Additive per-capita removal rate of adults.
    fn culling_rate(&self) -> f64 {
        0.0
    }

    /// Whether any contact transmission rate is positive.
    fn transmits(&self) -> bool;
}

/// Derived quantities evaluated at one time point. Never integrated; always recomputed from the
/// state that produced them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Auxiliaries {
    /// NJ
    pub juveniles: f64,
    /// NAd
    pub adults: f64,
    /// Y
    pub mortality_modifier: f64,
    /// X
    pub birth_modifier: f64,
    pub force_of_infection_juvenile: f64,
    pub force_of_infection_adult: f64,
    pub births: f64,
    pub natural_deaths: f64,
    pub tb_deaths: f64,
    pub tb_deaths_juvenile: f64,
    pub tb_deaths_adult: f64,
    pub culling_deaths: f64,
    pub total_population: f64,
}

impl Auxiliaries {
    /// Field names in serialization order.
    pub const FIELD_NAMES: [&'static str; 13] = [
        "juveniles",
        "adults",
        "mortality_modifier",
        "birth_modifier",
        "force_of_infection_juvenile",
        "force_of_infection_adult",
        "births",
        "natural_deaths",
        "tb_deaths",
        "tb_deaths_juvenile",
        "tb_deaths_adult",
        "culling_deaths",
        "total_population",
    ];

    #[must_use]
    pub fn to_array(&self) -> [f64; 13] {
        [
            self.juveniles,
            self.adults,
            self.mortality_modifier,
            self.birth_modifier,
            self.force_of_infection_juvenile,
            self.force_of_infection_adult,
            self.births,
            self.natural_deaths,
            self.tb_deaths,
            self.tb_deaths_juvenile,
            self.tb_deaths_adult,
            self.culling_deaths,
            self.total_population,
        ]
    }

    /// Births minus deaths of every cause; equals d(total population)/dt.
    #[must_use]
    pub fn net_growth(&self) -> f64 {
        self.births - self.natural_deaths - self.tb_deaths - self.culling_deaths
    }
}

/// Evaluates the derivative and auxiliaries of any variant at `state`.
pub fn evaluate<D: Dynamics + ?Sized>(dynamics: &D, state: &State) -> (State, Auxiliaries) {
    let rates = dynamics.demographic_rates();
    let demography = Demography::new(rates, state);
    let foi = dynamics.force_of_infection(&demography);
    let mortality = dynamics.mortality();
    let culling = dynamics.culling_rate();

    let y = demography.mortality_modifier;
    let gamma = rates.maturation_rate;
    let alpha = rates.latency_rate;
    let juvenile_death = mortality.juvenile_natural * y;
    let adult_death = mortality.adult_natural * y;

    let derivative = State {
        sj: demography.susceptible_births - (foi.juvenile + gamma + juvenile_death) * state.sj,
        ej: demography.exposed_births + foi.juvenile * state.sj
            - (alpha + gamma + juvenile_death) * state.ej,
        ij: alpha * state.ej - (gamma + juvenile_death + mortality.juvenile_tb) * state.ij,
        sad: gamma * state.sj - (foi.adult + adult_death + culling) * state.sad,
        ead: gamma * state.ej + foi.adult * state.sad - (alpha + adult_death + culling) * state.ead,
        iad: gamma * state.ij + alpha * state.ead
            - (adult_death + mortality.adult_tb + culling) * state.iad,
    };

    let tb_deaths_juvenile = mortality.juvenile_tb * state.ij;
    let tb_deaths_adult = mortality.adult_tb * state.iad;
    let auxiliaries = Auxiliaries {
        juveniles: demography.juveniles,
        adults: demography.adults,
        mortality_modifier: y,
        birth_modifier: demography.birth_modifier,
        force_of_infection_juvenile: foi.juvenile,
        force_of_infection_adult: foi.adult,
        births: demography.births(),
        natural_deaths: juvenile_death * demography.juveniles + adult_death * demography.adults,
        tb_deaths: tb_deaths_juvenile + tb_deaths_adult,
        tb_deaths_juvenile,
        tb_deaths_adult,
        culling_deaths: culling * demography.adults,
        total_population: demography.total(),
    };

    (derivative, auxiliaries)
}

/// A fully parameterized model variant.
#[derive(Clone, Debug, PartialEq)]
pub enum Model {
    Baseline(Baseline),
    AgeTransmission(AgeTransmission),
    AgeMortality(AgeMortality),
    Culling(Culling),
    CarryingCapacity(CarryingCapacity),
}

impl Model {
    /// Builds the `kind` variant, reading and validating the parameters it needs.
    pub fn new(kind: ModelKind, parameters: &ParameterSet) -> Result<Model, TbError> {
        Ok(match kind {
            ModelKind::Baseline => Model::Baseline(Baseline::from_parameters(parameters)?),
            ModelKind::AgeTransmission => {
                Model::AgeTransmission(AgeTransmission::from_parameters(parameters)?)
            }
            ModelKind::AgeMortality => {
                Model::AgeMortality(AgeMortality::from_parameters(parameters)?)
            }
            ModelKind::Culling => Model::Culling(Culling::from_parameters(parameters)?),
            ModelKind::CarryingCapacity => {
                Model::CarryingCapacity(CarryingCapacity::from_parameters(parameters)?)
            }
        })
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Baseline(_) => ModelKind::Baseline,
            Model::AgeTransmission(_) => ModelKind::AgeTransmission,
            Model::AgeMortality(_) => ModelKind::AgeMortality,
            Model::Culling(_) => ModelKind::Culling,
            Model::CarryingCapacity(_) => ModelKind::CarryingCapacity,
        }
    }

    fn dynamics(&self) -> &dyn Dynamics {
        match self {
            Model::Baseline(model) => model,
            Model::AgeTransmission(model) => model,
            Model::AgeMortality(model) => model,
            Model::Culling(model) => model,
            Model::CarryingCapacity(model) => model,
        }
    }

    /// The derivative of each compartment and the auxiliary outputs at `state`.
    #[must_use]
    pub fn evaluate(&self, state: &State) -> (State, Auxiliaries) {
        evaluate(self.dynamics(), state)
    }

    #[must_use]
    pub fn derivative(&self, state: &State) -> State {
        self.evaluate(state).0
    }

    #[must_use]
    pub fn auxiliaries(&self, state: &State) -> Auxiliaries {
        self.evaluate(state).1
    }

    /// Rejects initial states for which the infection term starts out as 0/0: an empty age
    /// class while transmission is switched on.
    pub fn check_initial_state(&self, state: &State) -> Result<(), TbError> {
        state.validate()?;
        if self.dynamics().transmits() {
            for age_class in [AgeClass::Juvenile, AgeClass::Adult] {
                if state.age_class_total(age_class) <= 0.0 {
                    return Err(TbError::EmptyAgeClass(age_class));
                }
            }
        }
        Ok(())
    }
}

impl OdeSystem for Model {
    fn dim(&self) -> usize {
        NUM_COMPARTMENTS
    }

    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        let derivative = self.derivative(&State::from_slice(y));
        dydt.copy_from_slice(&derivative.to_array());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states() -> Vec<State> {
        vec![
            State::new(20.0, 0.0, 0.0, 30.0, 0.0, 1.0),
            State::new(9.8, 4.5, 10.4, 3.7, 2.7, 20.8),
            State::new(1.0, 2.0, 3.0, 40.0, 5.0, 6.0),
            State::new(0.0, 0.0, 0.0, 12.0, 1.0, 2.0),
        ]
    }

    fn parameters_for(kind: ModelKind) -> ParameterSet {
        ParameterSet::reference()
            .with_r_beta1(0.7)
            .with_r_beta2(1.9)
            .with_r_beta3(0.4)
            .with_mu1(0.3)
            .with_mu2(0.15)
            .with_tau1(1.2)
            .with_tau2(0.8)
            .with_epsilon(if kind == ModelKind::Culling { 0.6 } else { 0.0 })
    }

    #[test]
    fn derivative_sum_matches_births_minus_deaths() {
        for kind in ModelKind::ALL {
            let model = Model::new(kind, &parameters_for(kind)).unwrap();
            for state in states() {
                let (derivative, auxiliaries) = model.evaluate(&state);
                let total_change: f64 = derivative.to_array().iter().sum();
                assert!(
                    (total_change - auxiliaries.net_growth()).abs() < 1e-9,
                    "{kind}: {total_change} vs {}",
                    auxiliaries.net_growth()
                );
                assert_eq!(auxiliaries.total_population, state.total());
            }
        }
    }

    #[test]
    fn kind_round_trips() {
        for kind in ModelKind::ALL {
            let model = Model::new(kind, &parameters_for(kind)).unwrap();
            assert_eq!(model.kind(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }

    #[test]
    fn every_required_parameter_is_checked() {
        for kind in ModelKind::ALL {
            for &parameter in kind.required_parameters() {
                let mut parameters = parameters_for(kind);
                parameters.remove(parameter);
                match Model::new(kind, &parameters) {
                    Err(TbError::MissingParameter(missing)) => assert_eq!(missing, parameter),
                    other => panic!("{kind} without {}: {other:?}", parameter.name()),
                }
            }
        }
    }

    #[test]
    fn negative_rate_is_rejected() {
        let parameters = ParameterSet::reference().with_alpha(-5.0);
        assert!(matches!(
            Model::new(ModelKind::Baseline, &parameters),
            Err(TbError::InvalidParameter { parameter: Parameter::Alpha, .. })
        ));
    }

    #[test]
    fn empty_age_class_with_transmission_is_rejected() {
        let model = Model::new(ModelKind::Baseline, &ParameterSet::reference()).unwrap();
        let no_juveniles = State::new(0.0, 0.0, 0.0, 30.0, 0.0, 1.0);
        assert!(matches!(
            model.check_initial_state(&no_juveniles),
            Err(TbError::EmptyAgeClass(AgeClass::Juvenile))
        ));

        let silent = Model::new(ModelKind::Baseline, &ParameterSet::reference().with_r_beta(0.0))
            .unwrap();
        assert!(silent.check_initial_state(&no_juveniles).is_ok());
    }

    #[test]
    fn empty_age_class_exerts_no_pressure() {
        let model = Model::new(ModelKind::Baseline, &ParameterSet::reference()).unwrap();
        let (derivative, auxiliaries) = model.evaluate(&State::new(0.0, 0.0, 0.0, 12.0, 1.0, 2.0));
        assert!(derivative.to_array().iter().all(|value| value.is_finite()));
        assert_eq!(auxiliaries.force_of_infection_adult, 2.1 * (2.0 / 15.0));
    }

    #[test]
    fn rhs_writes_derivative_in_compartment_order() {
        let model = Model::new(ModelKind::Culling, &parameters_for(ModelKind::Culling)).unwrap();
        let state = states()[1];
        let mut dydt = [0.0; NUM_COMPARTMENTS];
        model.rhs(0.0, &state.to_array(), &mut dydt);
        assert_eq!(dydt, model.derivative(&state).to_array());
        assert_eq!(model.dim(), 6);
    }
}
