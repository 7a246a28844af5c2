use crate::{
    error::TbError,
    model::{
        Baseline, DemographicRates, Demography, Dynamics, ForceOfInfection, Mortality,
        baseline::uniform_force_of_infection,
    },
    parameters::{Parameter, ParameterSet},
};

/// Baseline dynamics plus an additive, density-independent removal rate ε of every adult
/// compartment.
#[derive(Clone, Debug, PartialEq)]
pub struct Culling {
    pub baseline: Baseline,
    pub culling_rate: f64,
}

impl Culling {
    pub fn from_parameters(parameters: &ParameterSet) -> Result<Self, TbError> {
        Ok(Culling {
            baseline: Baseline::from_parameters(parameters)?,
            culling_rate: parameters.require(Parameter::Epsilon)?,
        })
    }
}

impl Dynamics for Culling {
    fn demographic_rates(&self) -> &DemographicRates {
        &self.baseline.rates
    }

    fn force_of_infection(&self, demography: &Demography) -> ForceOfInfection {
        uniform_force_of_infection(self.baseline.transmission, demography)
    }

    fn mortality(&self) -> Mortality {
        self.baseline.mortality()
    }

    fn culling_rate(&self) -> f64 {
        self.culling_rate
    }

    fn transmits(&self) -> bool {
        self.baseline.transmits()
    }
}
