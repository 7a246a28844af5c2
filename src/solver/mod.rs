/*!

Numerical integration of arbitrary autonomous or non-autonomous ODE systems `dy/dt = f(t, y)`.

[`integrate`] evaluates the solution at a caller-supplied, strictly increasing sequence of output
times. The stepping itself is done by the Dormand–Prince 5(4) integrator of `ode_solvers`; every
interval between two output times is integrated on its own, so each output time is hit exactly
and no interpolation is involved.

Each call owns its working buffers, so independent integrations can run on different threads.
A run can be stopped cooperatively through a [`CancellationToken`] or a wall-clock timeout in
[`SolverOptions`].

*/

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use ode_solvers::{
    DVector,
    dop_shared::{IntegrationError, OutputType, System},
    dopri5::Dopri5,
};
use serde::{Deserialize, Serialize};

pub use crate::error::SolverFailure;
use crate::error::TbError;

// Step controller settings handed to `Dopri5::from_param`; these are its documented defaults.
const SAFETY_FACTOR: f64 = 0.9;
const BETA: f64 = 0.04;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const STIFFNESS_CHECK: u32 = 1000;

/// Right-hand side of an ODE system.
pub trait OdeSystem {
    /// Number of state variables.
    fn dim(&self) -> usize;

    /// Evaluates `f(t, y)` into `dydt`. Both slices have length `dim()`.
    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]);
}

impl<S: OdeSystem + ?Sized> OdeSystem for &S {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
        (**self).rhs(t, y, dydt);
    }
}

/// Tolerances and limits of one integration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// First trial step. Zero lets the integrator choose one.
    pub initial_step: f64,
    /// Smallest accepted step before the run fails.
    pub min_step: f64,
    /// Largest step, unbounded if `None`.
    pub max_step: Option<f64>,
    /// Budget of attempted steps, accepted and rejected, over the whole run.
    pub max_steps: usize,
    /// Wall-clock budget in seconds, unbounded if `None`.
    pub timeout_secs: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            rtol: 1e-8,
            atol: 1e-10,
            initial_step: 0.0,
            min_step: 1e-12,
            max_step: None,
            max_steps: 100_000,
            timeout_secs: None,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<(), TbError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.rtol) || !positive(self.atol) {
            return Err(TbError::TbError("solver tolerances must be finite and positive".into()));
        }
        if !self.initial_step.is_finite() || self.initial_step < 0.0 {
            return Err(TbError::TbError("initial step must be finite and non-negative".into()));
        }
        if !positive(self.min_step) {
            return Err(TbError::TbError("minimum step must be finite and positive".into()));
        }
        if let Some(max_step) = self.max_step {
            if !max_step.is_finite() || max_step < self.min_step {
                return Err(TbError::TbError(
                    "maximum step must be finite and not below the minimum step".into(),
                ));
            }
        }
        if self.max_steps == 0 {
            return Err(TbError::TbError("step budget must be positive".into()));
        }
        if let Some(seconds) = self.timeout_secs {
            if !positive(seconds) || Duration::try_from_secs_f64(seconds).is_err() {
                return Err(TbError::TbError(format!(
                    "timeout must be a positive, representable number of seconds, got {seconds}"
                )));
            }
        }
        Ok(())
    }

    /// The wall-clock budget, `None` if unbounded or not representable.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }
}

/// A shared flag that asks running integrations to stop at their next step.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Work done by one call to [`integrate_with_stats`], summed over all output intervals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// Right-hand-side evaluations.
    pub evaluations: usize,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
}

impl SolverStats {
    #[must_use]
    pub fn attempted_steps(&self) -> usize {
        self.accepted_steps + self.rejected_steps
    }
}

/// Checks that `times` is non-empty, finite and strictly increasing.
pub fn check_output_times(times: &[f64]) -> Result<(), TbError> {
    if times.is_empty() {
        return Err(TbError::InvalidTimeGrid("no output times".into()));
    }
    if let Some(t) = times.iter().find(|t| !t.is_finite()) {
        return Err(TbError::InvalidTimeGrid(format!("non-finite time {t}")));
    }
    if let Some(pair) = times.windows(2).find(|pair| pair[1] <= pair[0]) {
        return Err(TbError::InvalidTimeGrid(format!(
            "times must be strictly increasing, found {} followed by {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Run-wide limits, checked before each interval and after each accepted step.
struct Watch<'a> {
    cancellation: Option<&'a CancellationToken>,
    started: Instant,
    timeout: Option<Duration>,
    min_step: f64,
}

impl Watch<'_> {
    fn check(&self, t: f64) -> Result<(), SolverFailure> {
        if self.cancellation.is_some_and(CancellationToken::is_cancelled) {
            return Err(SolverFailure::Cancelled { t });
        }
        if let Some(timeout) = self.timeout {
            let elapsed = self.started.elapsed();
            if elapsed >= timeout {
                return Err(SolverFailure::TimedOut { t, elapsed });
            }
        }
        Ok(())
    }
}

/// What the integrator reported back through `solout` during one interval.
struct Progress {
    /// Time of the last accepted step.
    t: f64,
    /// Size of the last accepted step that did not land on the interval end.
    step: f64,
    stopped: Option<SolverFailure>,
}

/// Presents an [`OdeSystem`] to `ode_solvers` for one output interval.
struct Interval<'a, S: ?Sized> {
    system: &'a S,
    watch: &'a Watch<'a>,
    end: f64,
    progress: &'a mut Progress,
}

impl<S: OdeSystem + ?Sized> System<f64, DVector<f64>> for Interval<'_, S> {
    fn system(&self, t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        self.system.rhs(t, y.as_slice(), dy.as_mut_slice());
    }

    fn solout(&mut self, t: f64, y: &DVector<f64>, dy: &DVector<f64>) -> bool {
        let step = t - self.progress.t;
        self.progress.t = t;
        if step > 0.0 && t < self.end {
            self.progress.step = step;
        }
        let verdict = if !all_finite(y.as_slice()) || !all_finite(dy.as_slice()) {
            Err(SolverFailure::NonFiniteDerivative { t })
        } else if step > 0.0 && step < self.watch.min_step && t < self.end {
            Err(SolverFailure::StepSizeUnderflow { t, step })
        } else {
            self.watch.check(t)
        };
        match verdict {
            Ok(()) => false,
            Err(failure) => {
                self.progress.stopped = Some(failure);
                true
            }
        }
    }
}

/// Integrates `system` from `y0` at `times[0]` and returns the state at every time in `times`.
/// The first entry is `y0` itself.
pub fn integrate<S: OdeSystem + ?Sized>(
    system: &S,
    y0: &[f64],
    times: &[f64],
    options: &SolverOptions,
    cancellation: Option<&CancellationToken>,
) -> Result<Vec<Vec<f64>>, TbError> {
    integrate_with_stats(system, y0, times, options, cancellation).map(|(states, _)| states)
}

/// Same as [`integrate`], also reporting how much work the integrator did.
pub fn integrate_with_stats<S: OdeSystem + ?Sized>(
    system: &S,
    y0: &[f64],
    times: &[f64],
    options: &SolverOptions,
    cancellation: Option<&CancellationToken>,
) -> Result<(Vec<Vec<f64>>, SolverStats), TbError> {
    let watch = Watch {
        cancellation,
        started: Instant::now(),
        timeout: options.timeout(),
        min_step: options.min_step,
    };
    options.validate()?;
    check_output_times(times)?;
    if y0.len() != system.dim() {
        return Err(SolverFailure::DimensionMismatch {
            expected: system.dim(),
            found: y0.len(),
        }
        .into());
    }

    let mut dydt = vec![0.0; y0.len()];
    system.rhs(times[0], y0, &mut dydt);
    if !all_finite(&dydt) {
        return Err(SolverFailure::NonFiniteDerivative { t: times[0] }.into());
    }

    let mut stats = SolverStats::default();
    let mut y = DVector::from_column_slice(y0);
    let mut states = Vec::with_capacity(times.len());
    states.push(y0.to_vec());
    let mut first_step = options.initial_step;

    for pair in times.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        watch.check(start)?;
        let budget = options.max_steps.saturating_sub(stats.attempted_steps());
        if budget == 0 {
            return Err(SolverFailure::MaxStepsExceeded {
                t: start,
                steps: options.max_steps,
            }
            .into());
        }

        let span = end - start;
        let max_step = options.max_step.map_or(span, |max_step| max_step.min(span));
        let mut progress = Progress {
            t: start,
            step: first_step,
            stopped: None,
        };
        let interval = Interval {
            system,
            watch: &watch,
            end,
            progress: &mut progress,
        };
        let mut stepper = Dopri5::from_param(
            interval,
            start,
            end,
            span,
            y.clone(),
            options.rtol,
            options.atol,
            SAFETY_FACTOR,
            BETA,
            MIN_FACTOR,
            MAX_FACTOR,
            max_step,
            first_step.min(max_step),
            u32::try_from(budget).unwrap_or(u32::MAX),
            STIFFNESS_CHECK,
            OutputType::Sparse,
        );
        let outcome = stepper.integrate();
        let end_state = stepper.y_out().last().cloned();
        drop(stepper);

        let interval_stats = outcome.map_err(|error| {
            let failure = match error {
                IntegrationError::MaxNumStepReached { x, .. } => SolverFailure::MaxStepsExceeded {
                    t: x,
                    steps: options.max_steps,
                },
                IntegrationError::StepSizeUnderflow { x } => SolverFailure::StepSizeUnderflow {
                    t: x,
                    step: progress.step,
                },
                IntegrationError::StiffnessDetected { x } => {
                    SolverFailure::StiffnessDetected { t: x }
                }
            };
            // A breakdown seen in `solout` is the cause of whatever the integrator reported.
            progress.stopped.take().unwrap_or(failure)
        })?;
        stats.evaluations += interval_stats.num_eval as usize;
        stats.accepted_steps += interval_stats.accepted_steps as usize;
        stats.rejected_steps += interval_stats.rejected_steps as usize;
        if let Some(failure) = progress.stopped {
            return Err(failure.into());
        }

        y = match end_state {
            Some(state) if all_finite(state.as_slice()) => state,
            _ => return Err(SolverFailure::NonFiniteDerivative { t: end }.into()),
        };
        states.push(y.as_slice().to_vec());
        // The next interval starts from the step size the controller last settled on.
        first_step = progress.step;
    }
    log::trace!(
        "integrated {} output times with {} accepted and {} rejected steps ({} evaluations)",
        times.len(),
        stats.accepted_steps,
        stats.rejected_steps,
        stats.evaluations
    );

    Ok((states, stats))
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|value| value.is_finite())
}
