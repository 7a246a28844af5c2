/*!

The output of one integration run.

A [`Trajectory`] is an ordered list of [`TimePoint`]s, strictly increasing in time. Each point
carries the integrated state and the auxiliary quantities recomputed from that state, so the two
can never disagree.

*/

use serde::{Deserialize, Serialize};

use crate::{
    model::{Auxiliaries, Model, ModelKind},
    state::{Compartment, State},
};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub time: f64,
    pub state: State,
    pub auxiliaries: Auxiliaries,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    model: ModelKind,
    points: Vec<TimePoint>,
}

/// Epidemiological and demographic totals over one trajectory.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub peak_total_population: f64,
    pub peak_time: f64,
    pub final_total_population: f64,
    pub final_infectious: f64,
    /// Infectious share of the final population, zero if the population died out.
    pub final_prevalence: f64,
    pub cumulative_births: f64,
    pub cumulative_natural_deaths: f64,
    pub cumulative_tb_deaths: f64,
    pub cumulative_culling_deaths: f64,
}

impl Trajectory {
    /// Pairs each state with its time and evaluates the auxiliaries. `times` and `states` must
    /// have the same length and `times` must be strictly increasing.
    pub(crate) fn from_states(model: &Model, times: &[f64], states: &[State]) -> Self {
        debug_assert_eq!(times.len(), states.len());
        let points = times
            .iter()
            .zip(states)
            .map(|(&time, state)| TimePoint {
                time,
                state: *state,
                auxiliaries: model.auxiliaries(state),
            })
            .collect();
        Trajectory {
            model: model.kind(),
            points,
        }
    }

    #[must_use]
    pub fn model(&self) -> ModelKind {
        self.model
    }

    #[must_use]
    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimePoint> {
        self.points.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&TimePoint> {
        self.points.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&TimePoint> {
        self.points.last()
    }

    /// The point at exactly `time`, if the grid contains it.
    #[must_use]
    pub fn at_time(&self, time: f64) -> Option<&TimePoint> {
        self.points
            .binary_search_by(|point| point.time.total_cmp(&time))
            .ok()
            .map(|index| &self.points[index])
    }

    /// `(time, value)` pairs for one compartment.
    #[must_use]
    pub fn series(&self, compartment: Compartment) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|point| (point.time, point.state.get(compartment)))
            .collect()
    }

    /// The first point at which the total population is largest.
    #[must_use]
    pub fn peak_total_population(&self) -> Option<&TimePoint> {
        self.points.iter().fold(None, |peak: Option<&TimePoint>, point| match peak {
            Some(best)
                if best.auxiliaries.total_population >= point.auxiliaries.total_population =>
            {
                Some(best)
            }
            _ => Some(point),
        })
    }

    /// Trapezoidal integral of an auxiliary rate over the output grid.
    fn cumulative(&self, rate: impl Fn(&Auxiliaries) -> f64) -> f64 {
        self.points
            .windows(2)
            .map(|pair| {
                let dt = pair[1].time - pair[0].time;
                0.5 * dt * (rate(&pair[0].auxiliaries) + rate(&pair[1].auxiliaries))
            })
            .sum()
    }

    #[must_use]
    pub fn summary(&self) -> Option<TrajectorySummary> {
        let peak = self.peak_total_population()?;
        let last = self.last()?;
        let final_total_population = last.auxiliaries.total_population;
        let final_infectious = last.state.infectious();
        let final_prevalence = if final_total_population > 0.0 {
            final_infectious / final_total_population
        } else {
            0.0
        };

        Some(TrajectorySummary {
            peak_total_population: peak.auxiliaries.total_population,
            peak_time: peak.time,
            final_total_population,
            final_infectious,
            final_prevalence,
            cumulative_births: self.cumulative(|aux| aux.births),
            cumulative_natural_deaths: self.cumulative(|aux| aux.natural_deaths),
            cumulative_tb_deaths: self.cumulative(|aux| aux.tb_deaths),
            cumulative_culling_deaths: self.cumulative(|aux| aux.culling_deaths),
        })
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a TimePoint;
    type IntoIter = std::slice::Iter<'a, TimePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSet;

    fn trajectory() -> Trajectory {
        let model = Model::new(ModelKind::Baseline, &ParameterSet::reference()).unwrap();
        let times = [0.0, 0.5, 1.0];
        let states = [
            State::new(20.0, 0.0, 0.0, 30.0, 0.0, 1.0),
            State::new(18.0, 1.0, 0.5, 33.0, 1.0, 2.0),
            State::new(16.0, 2.0, 1.0, 32.0, 2.0, 3.0),
        ];
        Trajectory::from_states(&model, &times, &states)
    }

    #[test]
    fn auxiliaries_follow_states() {
        let trajectory = trajectory();
        assert_eq!(trajectory.len(), 3);
        assert_eq!(trajectory.model(), ModelKind::Baseline);
        for point in &trajectory {
            assert_eq!(point.auxiliaries.total_population, point.state.total());
        }
    }

    #[test]
    fn lookup_by_time() {
        let trajectory = trajectory();
        assert_eq!(trajectory.at_time(0.5).unwrap().state.sj, 18.0);
        assert!(trajectory.at_time(0.25).is_none());
        assert_eq!(
            trajectory.series(Compartment::InfectiousAdult),
            vec![(0.0, 1.0), (0.5, 2.0), (1.0, 3.0)]
        );
    }

    #[test]
    fn summary_statistics() {
        let trajectory = trajectory();
        let summary = trajectory.summary().unwrap();
        assert_eq!(summary.peak_total_population, 56.0);
        assert_eq!(summary.peak_time, 1.0);
        assert_eq!(summary.final_total_population, 56.0);
        assert_eq!(summary.final_infectious, 4.0);
        assert_eq!(summary.final_prevalence, 4.0 / 56.0);

        // τ = 1, so TB deaths per unit time equal IJ + IAd: 1, 2.5, 4.
        assert!((summary.cumulative_tb_deaths - (0.25 * 3.5 + 0.25 * 6.5)).abs() < 1e-12);
        assert_eq!(summary.cumulative_culling_deaths, 0.0);
    }

    #[test]
    fn peak_prefers_earliest_maximum() {
        let model = Model::new(ModelKind::Baseline, &ParameterSet::reference()).unwrap();
        let state = State::new(20.0, 0.0, 0.0, 30.0, 0.0, 1.0);
        let trajectory = Trajectory::from_states(&model, &[0.0, 1.0], &[state, state]);
        assert_eq!(trajectory.peak_total_population().unwrap().time, 0.0);
    }
}
