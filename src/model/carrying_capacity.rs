use crate::{
    error::TbError,
    model::{Baseline, DemographicRates, Demography, Dynamics, ForceOfInfection, Mortality},
    parameters::{Parameter, ParameterSet},
};

/// The baseline dynamics, parameterized for sweeps over the carrying capacity κ. A zero κ is
/// rejected: the feedback midpoint would sit at an empty population.
#[derive(Clone, Debug, PartialEq)]
pub struct CarryingCapacity {
    pub baseline: Baseline,
}

impl CarryingCapacity {
    pub fn from_parameters(parameters: &ParameterSet) -> Result<Self, TbError> {
        let baseline = Baseline::from_parameters(parameters)?;
        let kappa = baseline.rates.carrying_capacity;
        if kappa <= 0.0 {
            return Err(TbError::InvalidParameter {
                parameter: Parameter::Kappa,
                value: kappa,
            });
        }
        Ok(CarryingCapacity { baseline })
    }

    #[must_use]
    pub fn carrying_capacity(&self) -> f64 {
        self.baseline.rates.carrying_capacity
    }
}

impl Dynamics for CarryingCapacity {
    fn demographic_rates(&self) -> &DemographicRates {
        self.baseline.demographic_rates()
    }

    fn force_of_infection(&self, demography: &Demography) -> ForceOfInfection {
        self.baseline.force_of_infection(demography)
    }

    fn mortality(&self) -> Mortality {
        self.baseline.mortality()
    }

    fn transmits(&self) -> bool {
        self.baseline.transmits()
    }
}
