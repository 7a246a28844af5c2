use crate::{
    error::TbError,
    model::{
        DemographicRates, Demography, Dynamics, ForceOfInfection, Mortality,
        baseline::uniform_force_of_infection,
    },
    parameters::{Parameter, ParameterSet},
};

/// Baseline transmission with natural mortality split μ1 (juveniles) / μ2 (adults) and TB
/// mortality split τ1 / τ2.
#[derive(Clone, Debug, PartialEq)]
pub struct AgeMortality {
    pub rates: DemographicRates,
    pub mortality: Mortality,
    pub transmission: f64,
}

impl AgeMortality {
    pub fn from_parameters(parameters: &ParameterSet) -> Result<Self, TbError> {
        let rates = DemographicRates::from_parameters(parameters)?;
        let mortality = Mortality {
            juvenile_natural: parameters.require(Parameter::Mu1)?,
            adult_natural: parameters.require(Parameter::Mu2)?,
            juvenile_tb: parameters.require(Parameter::Tau1)?,
            adult_tb: parameters.require(Parameter::Tau2)?,
        };
        Ok(AgeMortality {
            rates,
            mortality,
            transmission: parameters.require(Parameter::RBeta)?,
        })
    }
}

impl Dynamics for AgeMortality {
    fn demographic_rates(&self) -> &DemographicRates {
        &self.rates
    }

    fn force_of_infection(&self, demography: &Demography) -> ForceOfInfection {
        uniform_force_of_infection(self.transmission, demography)
    }

    fn mortality(&self) -> Mortality {
        self.mortality
    }

    fn transmits(&self) -> bool {
        self.transmission > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::evaluate, state::State};

    #[test]
    fn tb_deaths_are_split_by_age() {
        let parameters = ParameterSet::reference()
            .with_mu1(0.4)
            .with_mu2(0.1)
            .with_tau1(2.0)
            .with_tau2(0.5);
        let model = AgeMortality::from_parameters(&parameters).unwrap();
        let state = State::new(10.0, 1.0, 3.0, 20.0, 2.0, 4.0);
        let (_, auxiliaries) = evaluate(&model, &state);

        assert_eq!(auxiliaries.tb_deaths_juvenile, 6.0);
        assert_eq!(auxiliaries.tb_deaths_adult, 2.0);
        assert_eq!(auxiliaries.tb_deaths, 8.0);
        let y = auxiliaries.mortality_modifier;
        assert!((auxiliaries.natural_deaths - (0.4 * y * 14.0 + 0.1 * y * 26.0)).abs() < 1e-12);
    }
}
