/*!

Sub-terms shared by every model variant: age-class totals, density feedback, births and the
per-capita prevalence used by the force of infection.

*/

use crate::{
    error::TbError,
    parameters::{DEFAULT_VERTICAL_TRANSMISSION, Parameter, ParameterSet},
    state::State,
};

/// Rates that every variant reads the same way.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DemographicRates {
    /// λ
    pub birth_rate: f64,
    /// κ
    pub carrying_capacity: f64,
    /// ρ
    pub feedback_steepness: f64,
    /// γ
    pub maturation_rate: f64,
    /// α
    pub latency_rate: f64,
    /// δ
    pub vertical_transmission: f64,
}

impl DemographicRates {
    pub(crate) fn from_parameters(parameters: &ParameterSet) -> Result<Self, TbError> {
        Ok(DemographicRates {
            birth_rate: parameters.require(Parameter::Lambda)?,
            carrying_capacity: parameters.require(Parameter::Kappa)?,
            feedback_steepness: parameters.require(Parameter::Rho)?,
            maturation_rate: parameters.require(Parameter::Gamma)?,
            latency_rate: parameters.require(Parameter::Alpha)?,
            vertical_transmission: parameters
                .require_or(Parameter::Delta, DEFAULT_VERTICAL_TRANSMISSION)?,
        })
    }
}

/// Density feedback Y = 1 / (1 + exp(-ρ(N - κ))).
///
/// Y tends to 1 above the carrying capacity and to 0 below it. The exponential overflows to
/// infinity far below κ, which still yields the correct limit of 0.
#[must_use]
#[inline]
pub fn mortality_modifier(total: f64, carrying_capacity: f64, steepness: f64) -> f64 {
    1.0 / (1.0 + (-steepness * (total - carrying_capacity)).exp())
}

/// `infectious / class_total`, with an empty class exerting no infection pressure.
#[must_use]
#[inline]
pub fn per_capita(infectious: f64, class_total: f64) -> f64 {
    if class_total > 0.0 { infectious / class_total } else { 0.0 }
}

/// The shared sub-terms evaluated at one state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Demography {
    /// NJ
    pub juveniles: f64,
    /// NAd
    pub adults: f64,
    /// Y
    pub mortality_modifier: f64,
    /// X = 1 - Y
    pub birth_modifier: f64,
    /// Newborns entering SJ per unit time.
    pub susceptible_births: f64,
    /// Newborns of infectious adults entering EJ per unit time.
    pub exposed_births: f64,
    /// IJ / NJ
    pub juvenile_prevalence: f64,
    /// IAd / NAd
    pub adult_prevalence: f64,
}

impl Demography {
    #[must_use]
    pub fn new(rates: &DemographicRates, state: &State) -> Self {
        let juveniles = state.juveniles();
        let adults = state.adults();
        let mortality_modifier = mortality_modifier(
            juveniles + adults,
            rates.carrying_capacity,
            rates.feedback_steepness,
        );
        let birth_modifier = 1.0 - mortality_modifier;
        let fecundity = birth_modifier * rates.birth_rate;
        // Only infectious adults pass the infection on at birth.
        let susceptible_births = fecundity * (state.sad + state.ead)
            + fecundity * state.iad * (1.0 - rates.vertical_transmission);
        let exposed_births = fecundity * state.iad * rates.vertical_transmission;

        Demography {
            juveniles,
            adults,
            mortality_modifier,
            birth_modifier,
            susceptible_births,
            exposed_births,
            juvenile_prevalence: per_capita(state.ij, juveniles),
            adult_prevalence: per_capita(state.iad, adults),
        }
    }

    #[must_use]
    pub fn births(&self) -> f64 {
        self.susceptible_births + self.exposed_births
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.juveniles + self.adults
    }
}
