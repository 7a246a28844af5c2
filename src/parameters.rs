/*!

Named rate constants and the sets they are grouped into.

A [`ParameterSet`] is a sparse mapping from [`Parameter`] to value. Each model variant reads the
subset it needs with [`ParameterSet::require`], so an incomplete set is reported as a
configuration error naming the missing parameter. Sets serialize as a JSON object keyed by the
parameter names (`lambda`, `kappa`, `r_beta1`, ...).

```rust
use possum_tb::parameters::{Parameter, ParameterSet};

let parameters = ParameterSet::reference().with_epsilon(0.8);
assert_eq!(parameters.epsilon(), Some(0.8));
assert_eq!(parameters.get(Parameter::Kappa), Some(50.0));
```

*/

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    str::FromStr,
};

use paste::paste;
use serde::{Deserialize, Serialize};

use crate::error::TbError;

/// The vertical transmission probability used when a set does not give `delta`.
pub const DEFAULT_VERTICAL_TRANSMISSION: f64 = 0.1;

/// Defines the `Parameter` enum together with name lookup and typed accessors on
/// `ParameterSet`:
/// * `$variant`: the enum variant
/// * `$field`: the accessor name; `with_$field` is generated as a builder method
/// * `$symbol`: the serialized name
/// * `$description`: one-line documentation
macro_rules! define_parameters {
    ($($variant:ident => $field:ident, $symbol:literal, $description:literal;)+) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Parameter {
            $(
                #[doc = $description]
                #[serde(rename = $symbol)]
                $variant,
            )+
        }

        impl Parameter {
            pub const ALL: &'static [Parameter] = &[$(Parameter::$variant),+];

            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Parameter::$variant => $symbol,)+
                }
            }

            #[must_use]
            pub fn description(self) -> &'static str {
                match self {
                    $(Parameter::$variant => $description,)+
                }
            }
        }

        impl FromStr for Parameter {
            type Err = TbError;

            fn from_str(name: &str) -> Result<Self, Self::Err> {
                match name {
                    $($symbol => Ok(Parameter::$variant),)+
                    _ => Err(TbError::TbError(format!("unknown parameter `{name}`"))),
                }
            }
        }

        paste! {
            impl ParameterSet {
                $(
                    #[must_use]
                    pub fn [<with_ $field>](self, value: f64) -> Self {
                        self.with(Parameter::$variant, value)
                    }

                    #[must_use]
                    pub fn $field(&self) -> Option<f64> {
                        self.get(Parameter::$variant)
                    }
                )+
            }
        }
    };
}

define_parameters! {
    Lambda  => lambda,  "lambda",  "Birth rate per adult.";
    Kappa   => kappa,   "kappa",   "Carrying capacity.";
    Rho     => rho,     "rho",     "Steepness of the density feedback.";
    Mu      => mu,      "mu",      "Natural mortality rate.";
    Mu1     => mu1,     "mu1",     "Natural mortality rate of juveniles.";
    Mu2     => mu2,     "mu2",     "Natural mortality rate of adults.";
    Tau     => tau,     "tau",     "TB-induced mortality rate.";
    Tau1    => tau1,    "tau1",    "TB-induced mortality rate of juveniles.";
    Tau2    => tau2,    "tau2",    "TB-induced mortality rate of adults.";
    Gamma   => gamma,   "gamma",   "Maturation rate from juvenile to adult.";
    Alpha   => alpha,   "alpha",   "Rate of progression from exposed to infectious.";
    RBeta   => r_beta,  "r_beta",  "Contact transmission rate.";
    RBeta1  => r_beta1, "r_beta1", "Transmission rate among juveniles.";
    RBeta2  => r_beta2, "r_beta2", "Transmission rate among adults.";
    RBeta3  => r_beta3, "r_beta3", "Transmission rate between age classes.";
    Delta   => delta,   "delta",   "Probability that an infectious adult's newborn is exposed.";
    Epsilon => epsilon, "epsilon", "Additive culling rate applied to adults.";
}

impl Parameter {
    /// Number of distinct parameters.
    pub const COUNT: usize = Parameter::ALL.len();

    #[must_use]
    #[inline(always)]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Parameters interpreted as probabilities.
    #[must_use]
    pub fn is_probability(self) -> bool {
        matches!(self, Parameter::Delta)
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A sparse set of parameter values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Parameter, f64>", into = "BTreeMap<Parameter, f64>")]
pub struct ParameterSet {
    values: [Option<f64>; Parameter::COUNT],
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        ParameterSet::default()
    }

    /// The reference parameterization: λ=5, κ=50, ρ=0.5, μ=0.2, τ=1, γ=1, α=5, rβ=2.1, δ=0.1.
    #[must_use]
    pub fn reference() -> Self {
        ParameterSet::new()
            .with_lambda(5.0)
            .with_kappa(50.0)
            .with_rho(0.5)
            .with_mu(0.2)
            .with_tau(1.0)
            .with_gamma(1.0)
            .with_alpha(5.0)
            .with_r_beta(2.1)
            .with_delta(DEFAULT_VERTICAL_TRANSMISSION)
    }

    #[must_use]
    pub fn with(mut self, parameter: Parameter, value: f64) -> Self {
        self.set(parameter, value);
        self
    }

    pub fn set(&mut self, parameter: Parameter, value: f64) {
        self.values[parameter.index()] = Some(value);
    }

    pub fn remove(&mut self, parameter: Parameter) -> Option<f64> {
        self.values[parameter.index()].take()
    }

    #[must_use]
    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        self.values[parameter.index()]
    }

    #[must_use]
    pub fn contains(&self, parameter: Parameter) -> bool {
        self.get(parameter).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the parameters that have values, in `Parameter` order.
    pub fn iter(&self) -> impl Iterator<Item = (Parameter, f64)> + '_ {
        Parameter::ALL
            .iter()
            .filter_map(|&parameter| self.get(parameter).map(|value| (parameter, value)))
    }

    /// Returns a copy of `self` with every value of `overrides` applied on top.
    #[must_use]
    pub fn merged(&self, overrides: &ParameterSet) -> ParameterSet {
        let mut merged = self.clone();
        for (parameter, value) in overrides.iter() {
            merged.set(parameter, value);
        }
        merged
    }

    /// Returns the value of `parameter`, rejecting absent, negative and non-finite values.
    pub fn require(&self, parameter: Parameter) -> Result<f64, TbError> {
        match self.get(parameter) {
            None => Err(TbError::MissingParameter(parameter)),
            Some(value) => check_value(parameter, value),
        }
    }

    /// Like [`ParameterSet::require`], but falls back to `default` when the value is absent.
    pub fn require_or(&self, parameter: Parameter, default: f64) -> Result<f64, TbError> {
        check_value(parameter, self.get(parameter).unwrap_or(default))
    }

    /// Checks every value present in the set.
    pub fn validate(&self) -> Result<(), TbError> {
        for (parameter, value) in self.iter() {
            check_value(parameter, value)?;
        }
        Ok(())
    }
}

fn check_value(parameter: Parameter, value: f64) -> Result<f64, TbError> {
    let out_of_range = !value.is_finite()
        || value < 0.0
        || (parameter.is_probability() && value > 1.0);
    if out_of_range {
        return Err(TbError::InvalidParameter { parameter, value });
    }
    Ok(value)
}

impl From<BTreeMap<Parameter, f64>> for ParameterSet {
    fn from(map: BTreeMap<Parameter, f64>) -> Self {
        map.into_iter().collect()
    }
}

impl From<ParameterSet> for BTreeMap<Parameter, f64> {
    fn from(parameters: ParameterSet) -> Self {
        parameters.iter().collect()
    }
}

impl FromIterator<(Parameter, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (Parameter, f64)>>(iter: I) -> Self {
        let mut parameters = ParameterSet::new();
        for (parameter, value) in iter {
            parameters.set(parameter, value);
        }
        parameters
    }
}
