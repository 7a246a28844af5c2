use crate::{
    error::TbError,
    model::{DemographicRates, Demography, Dynamics, ForceOfInfection, Mortality},
    parameters::{Parameter, ParameterSet},
};

/// One contact rate rβ acting on the combined prevalence of both age classes, one natural
/// mortality rate μ and one TB mortality rate τ.
#[derive(Clone, Debug, PartialEq)]
pub struct Baseline {
    pub rates: DemographicRates,
    pub natural_mortality: f64,
    pub tb_mortality: f64,
    pub transmission: f64,
}

impl Baseline {
    pub fn from_parameters(parameters: &ParameterSet) -> Result<Self, TbError> {
        Ok(Baseline {
            rates: DemographicRates::from_parameters(parameters)?,
            natural_mortality: parameters.require(Parameter::Mu)?,
            tb_mortality: parameters.require(Parameter::Tau)?,
            transmission: parameters.require(Parameter::RBeta)?,
        })
    }
}

/// rβ·(IJ/NJ + IAd/NAd), felt equally by both age classes.
pub(super) fn uniform_force_of_infection(
    transmission: f64,
    demography: &Demography,
) -> ForceOfInfection {
    let force = transmission * (demography.juvenile_prevalence + demography.adult_prevalence);
    ForceOfInfection { juvenile: force, adult: force }
}

impl Dynamics for Baseline {
    fn demographic_rates(&self) -> &DemographicRates {
        &self.rates
    }

    fn force_of_infection(&self, demography: &Demography) -> ForceOfInfection {
        uniform_force_of_infection(self.transmission, demography)
    }

    fn mortality(&self) -> Mortality {
        Mortality::uniform(self.natural_mortality, self.tb_mortality)
    }

    fn transmits(&self) -> bool {
        self.transmission > 0.0
    }
}
