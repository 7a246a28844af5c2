/*!

The six-compartment state vector.

Possums are split into two age classes, each of which is split into susceptible, exposed
(latent) and infectious individuals:

| compartment | label |
|-------------|-------|
| Susceptible juvenile | `SJ` |
| Exposed juvenile | `EJ` |
| Infectious juvenile | `IJ` |
| Susceptible adult | `SAd` |
| Exposed adult | `EAd` |
| Infectious adult | `IAd` |

Values are real-valued densities, not head counts. Non-negativity is checked when a state is
used as an initial condition but never enforced by clamping during integration.

*/

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::TbError;

/// Number of integrated compartments.
pub const NUM_COMPARTMENTS: usize = 6;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeClass {
    Juvenile,
    Adult,
}

impl Display for AgeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeClass::Juvenile => write!(f, "juvenile"),
            AgeClass::Adult => write!(f, "adult"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compartment {
    SusceptibleJuvenile,
    ExposedJuvenile,
    InfectiousJuvenile,
    SusceptibleAdult,
    ExposedAdult,
    InfectiousAdult,
}

impl Compartment {
    /// All compartments in state-vector order.
    pub const ALL: [Compartment; NUM_COMPARTMENTS] = [
        Compartment::SusceptibleJuvenile,
        Compartment::ExposedJuvenile,
        Compartment::InfectiousJuvenile,
        Compartment::SusceptibleAdult,
        Compartment::ExposedAdult,
        Compartment::InfectiousAdult,
    ];

    /// Position of the compartment in the integrated vector.
    #[must_use]
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Compartment::SusceptibleJuvenile => "SJ",
            Compartment::ExposedJuvenile => "EJ",
            Compartment::InfectiousJuvenile => "IJ",
            Compartment::SusceptibleAdult => "SAd",
            Compartment::ExposedAdult => "EAd",
            Compartment::InfectiousAdult => "IAd",
        }
    }

    #[must_use]
    pub fn age_class(self) -> AgeClass {
        match self {
            Compartment::SusceptibleJuvenile
            | Compartment::ExposedJuvenile
            | Compartment::InfectiousJuvenile => AgeClass::Juvenile,
            _ => AgeClass::Adult,
        }
    }
}

/// A point in the six-dimensional state space. The same type carries time derivatives.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub sj: f64,
    pub ej: f64,
    pub ij: f64,
    pub sad: f64,
    pub ead: f64,
    pub iad: f64,
}

impl State {
    /// Field names in serialization order. CSV exports use them as column names too.
    pub const FIELD_NAMES: [&'static str; NUM_COMPARTMENTS] =
        ["sj", "ej", "ij", "sad", "ead", "iad"];

    #[must_use]
    pub fn new(sj: f64, ej: f64, ij: f64, sad: f64, ead: f64, iad: f64) -> Self {
        State { sj, ej, ij, sad, ead, iad }
    }

    #[must_use]
    pub fn from_array(values: [f64; NUM_COMPARTMENTS]) -> Self {
        let [sj, ej, ij, sad, ead, iad] = values;
        State { sj, ej, ij, sad, ead, iad }
    }

    /// Copies the first six entries of `values`. Panics if `values` is shorter.
    #[must_use]
    pub(crate) fn from_slice(values: &[f64]) -> Self {
        State::new(values[0], values[1], values[2], values[3], values[4], values[5])
    }

    #[must_use]
    pub fn to_array(&self) -> [f64; NUM_COMPARTMENTS] {
        [self.sj, self.ej, self.ij, self.sad, self.ead, self.iad]
    }

    #[must_use]
    pub fn get(&self, compartment: Compartment) -> f64 {
        self.to_array()[compartment.index()]
    }

    pub fn set(&mut self, compartment: Compartment, value: f64) {
        match compartment {
            Compartment::SusceptibleJuvenile => self.sj = value,
            Compartment::ExposedJuvenile => self.ej = value,
            Compartment::InfectiousJuvenile => self.ij = value,
            Compartment::SusceptibleAdult => self.sad = value,
            Compartment::ExposedAdult => self.ead = value,
            Compartment::InfectiousAdult => self.iad = value,
        }
    }

    /// NJ = SJ + EJ + IJ
    #[must_use]
    #[inline]
    pub fn juveniles(&self) -> f64 {
        self.sj + self.ej + self.ij
    }

    /// NAd = SAd + EAd + IAd
    #[must_use]
    #[inline]
    pub fn adults(&self) -> f64 {
        self.sad + self.ead + self.iad
    }

    #[must_use]
    pub fn age_class_total(&self, age_class: AgeClass) -> f64 {
        match age_class {
            AgeClass::Juvenile => self.juveniles(),
            AgeClass::Adult => self.adults(),
        }
    }

    #[must_use]
    #[inline]
    pub fn total(&self) -> f64 {
        self.juveniles() + self.adults()
    }

    /// Exposed plus infectious individuals of both age classes.
    #[must_use]
    pub fn infected(&self) -> f64 {
        self.ej + self.ij + self.ead + self.iad
    }

    #[must_use]
    pub fn infectious(&self) -> f64 {
        self.ij + self.iad
    }

    /// Checks that the state can be used as an initial condition: every compartment finite
    /// and non-negative, and at least one individual present.
    pub fn validate(&self) -> Result<(), TbError> {
        for compartment in Compartment::ALL {
            let value = self.get(compartment);
            if !value.is_finite() || value < 0.0 {
                return Err(TbError::InvalidInitialState { compartment, value });
            }
        }
        if self.total() <= 0.0 {
            return Err(TbError::EmptyInitialState);
        }
        Ok(())
    }
}
