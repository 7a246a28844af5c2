use crate::{
    error::TbError,
    model::{DemographicRates, Demography, Dynamics, ForceOfInfection, Mortality},
    parameters::{Parameter, ParameterSet},
};

/// Age-structured contacts: juveniles infect juveniles at rβ1, adults infect adults at rβ2, and
/// contacts across age classes transmit at rβ3. With rβ1 = rβ2 = rβ3 the pressure on either
/// class is rβ·(IJ/NJ + IAd/NAd), the baseline force of infection.
#[derive(Clone, Debug, PartialEq)]
pub struct AgeTransmission {
    pub rates: DemographicRates,
    pub natural_mortality: f64,
    pub tb_mortality: f64,
    pub juvenile_transmission: f64,
    pub adult_transmission: f64,
    pub cross_transmission: f64,
}

impl AgeTransmission {
    pub fn from_parameters(parameters: &ParameterSet) -> Result<Self, TbError> {
        Ok(AgeTransmission {
            rates: DemographicRates::from_parameters(parameters)?,
            natural_mortality: parameters.require(Parameter::Mu)?,
            tb_mortality: parameters.require(Parameter::Tau)?,
            juvenile_transmission: parameters.require(Parameter::RBeta1)?,
            adult_transmission: parameters.require(Parameter::RBeta2)?,
            cross_transmission: parameters.require(Parameter::RBeta3)?,
        })
    }
}

impl Dynamics for AgeTransmission {
    fn demographic_rates(&self) -> &DemographicRates {
        &self.rates
    }

    fn force_of_infection(&self, demography: &Demography) -> ForceOfInfection {
        let within_juveniles = self.juvenile_transmission * demography.juvenile_prevalence;
        let within_adults = self.adult_transmission * demography.adult_prevalence;
        ForceOfInfection {
            juvenile: within_juveniles + self.cross_transmission * demography.adult_prevalence,
            adult: within_adults + self.cross_transmission * demography.juvenile_prevalence,
        }
    }

    fn mortality(&self) -> Mortality {
        Mortality::uniform(self.natural_mortality, self.tb_mortality)
    }

    fn transmits(&self) -> bool {
        self.juvenile_transmission > 0.0
            || self.adult_transmission > 0.0
            || self.cross_transmission > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;

    fn model(r_beta1: f64, r_beta2: f64, r_beta3: f64) -> AgeTransmission {
        let parameters = ParameterSet::reference()
            .with_r_beta1(r_beta1)
            .with_r_beta2(r_beta2)
            .with_r_beta3(r_beta3);
        AgeTransmission::from_parameters(&parameters).unwrap()
    }

    #[test]
    fn classes_feel_their_own_internal_rate() {
        let model = model(1.0, 2.0, 0.5);
        let state = State::new(10.0, 0.0, 2.0, 20.0, 0.0, 4.0);
        let demography = Demography::new(&model.rates, &state);
        let foi = model.force_of_infection(&demography);

        let juvenile_prevalence = 2.0 / 12.0;
        let adult_prevalence = 4.0 / 24.0;
        assert!((foi.juvenile - (juvenile_prevalence + 0.5 * adult_prevalence)).abs() < 1e-15);
        assert!((foi.adult - (2.0 * adult_prevalence + 0.5 * juvenile_prevalence)).abs() < 1e-15);
    }

    #[test]
    fn equal_rates_give_uniform_pressure() {
        let model = model(2.1, 2.1, 2.1);
        let state = State::new(10.0, 1.0, 2.0, 20.0, 3.0, 4.0);
        let demography = Demography::new(&model.rates, &state);
        let foi = model.force_of_infection(&demography);
        let uniform = 2.1 * (demography.juvenile_prevalence + demography.adult_prevalence);
        assert!((foi.juvenile - uniform).abs() < 1e-15);
        assert!((foi.adult - uniform).abs() < 1e-15);
        assert!(model.transmits());
        assert!(!self::model(0.0, 0.0, 0.0).transmits());
    }
}
