use seq_macro::seq;

use crate::{
    parameters::Parameter,
    sweep::{SweepTable, TaggedTrajectory},
    trajectory::Trajectory,
};

/// Exact-match constraints on tag values.
///
/// Implemented for `()` (matches everything), a single `(Parameter, f64)` pair, tuples of
/// pairs, and [`Selection`].
pub trait TagQuery {
    fn constraints(&self) -> Vec<(Parameter, f64)>;
}

impl TagQuery for () {
    fn constraints(&self) -> Vec<(Parameter, f64)> {
        Vec::new()
    }
}

impl TagQuery for (Parameter, f64) {
    fn constraints(&self) -> Vec<(Parameter, f64)> {
        vec![*self]
    }
}

// Implement the versions with 1..9 pairs.
macro_rules! impl_tag_query {
    ($ct:expr) => {
        seq!(N in 0..$ct {
            impl TagQuery for (
                #(
                    (Parameter, f64),
                )*
            )
            {
                fn constraints(&self) -> Vec<(Parameter, f64)> {
                    vec![
                        #(
                            self.N,
                        )*
                    ]
                }
            }
        });
    }
}

seq!(Z in 1..9 {
    impl_tag_query!(Z);
});

/// A chosen point of a sweep, given as parameter values.
///
/// ```rust
/// use possum_tb::{parameters::Parameter, sweep::Selection};
///
/// let selection = Selection::new().with(Parameter::Kappa, 40.0).with(Parameter::Epsilon, 0.3);
/// assert_eq!(selection.get(Parameter::Kappa), Some(40.0));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    values: Vec<(Parameter, f64)>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Selection::default()
    }

    /// Sets the selected value of `parameter`, replacing any earlier choice.
    #[must_use]
    pub fn with(mut self, parameter: Parameter, value: f64) -> Self {
        match self.values.iter_mut().find(|(selected, _)| *selected == parameter) {
            Some(entry) => entry.1 = value,
            None => self.values.push((parameter, value)),
        }
        self
    }

    #[must_use]
    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        self.values
            .iter()
            .find(|(selected, _)| *selected == parameter)
            .map(|&(_, value)| value)
    }
}

impl TagQuery for Selection {
    fn constraints(&self) -> Vec<(Parameter, f64)> {
        self.values.clone()
    }
}

impl<Q: TagQuery + ?Sized> TagQuery for &Q {
    fn constraints(&self) -> Vec<(Parameter, f64)> {
        (**self).constraints()
    }
}

pub(super) fn satisfies(run: &TaggedTrajectory, constraints: &[(Parameter, f64)]) -> bool {
    constraints
        .iter()
        .all(|&(parameter, value)| run.tag.get(parameter) == Some(value))
}

/// The trajectory of the run whose tag is exactly `selection`, if there is one.
///
/// `selection` must give a value for every axis of the sweep and nothing else; partial
/// selections match several runs and are served by [`SweepTable::query`].
#[must_use]
pub fn select<'a>(table: &'a SweepTable, selection: &Selection) -> Option<&'a Trajectory> {
    table.lookup(&selection.constraints()).map(|run| &run.trajectory)
}
