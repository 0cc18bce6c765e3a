//! # Bounded nonlinear least squares on top of the `levenberg-marquardt` crate
//!
//! The crate minimizes `½·Σ r_i(x)²` through the [`LeastSquaresProblem`] trait. The residual functions
//! met here are forward models that may fail for some candidates (the ODE system cannot be integrated)
//! and whose parameters live in a box, so [`minimize_projected`] wraps them:
//! - every candidate is first mapped into the feasible set by a caller supplied projection
//! - a failed candidate gets a constant residual vector far above any attainable cost, so the trial step
//!   is rejected and the trust region shrinks
//! - the Jacobian is a forward difference; the step flips sign when the forward point fails or is
//!   clipped by the projection
//!
//! The evaluation budget is handed to the crate as its `patience` (evaluations per free parameter).
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::{debug, info};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use thiserror::Error;

/// residual given to a candidate that could not be evaluated
const FAILED_RESIDUAL: f64 = 1e10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LMSettings {
    /// residual evaluations allowed, Jacobian columns included
    pub max_evaluations: usize,
    /// relative reduction of the cost below which the fit is converged
    pub ftol: f64,
    /// relative step length below which the fit is converged
    pub xtol: f64,
    /// cosine between residuals and Jacobian columns below which the fit is converged
    pub gtol: f64,
    /// initial trust-region radius factor
    pub stepbound: f64,
    /// relative forward-difference step
    pub diff_step: f64,
}

impl Default for LMSettings {
    fn default() -> Self {
        LMSettings {
            max_evaluations: 4000,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            stepbound: 100.0,
            diff_step: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    CostConverged,
    StepConverged,
    /// residuals orthogonal to the Jacobian columns
    GradientConverged,
    ResidualsZero,
    BudgetExhausted,
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        !matches!(self, Termination::BudgetExhausted)
    }
}

#[derive(Debug, Clone)]
pub struct LMReport {
    pub parameters: DVector<f64>,
    pub residuals: DVector<f64>,
    /// sum of squared residuals
    pub cost: f64,
    /// Jacobian evaluations
    pub iterations: usize,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    pub termination: Termination,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LMError {
    #[error("residuals could not be evaluated at the starting point")]
    InitialEvaluationFailed,
    #[error("no parameters to optimize")]
    NoParameters,
    #[error("residual vector is empty")]
    NoResiduals,
    #[error("Levenberg-Marquardt stopped: {0}")]
    Numerical(String),
}

/// Residual function plus projection seen through [`LeastSquaresProblem`]; keeps the best point found.
struct ProjectedProblem<'a, F, P> {
    residual_fn: &'a F,
    project: &'a P,
    x: DVector<f64>,
    r: DVector<f64>,
    best_x: DVector<f64>,
    best_r: DVector<f64>,
    best_cost: f64,
    diff_step: f64,
    evaluations: Cell<usize>,
    failed: Cell<usize>,
    jacobians: Cell<usize>,
}

impl<F, P> ProjectedProblem<'_, F, P>
where
    F: Fn(&DVector<f64>) -> Option<DVector<f64>>,
    P: Fn(&mut DVector<f64>),
{
    fn evaluate(&self, x: &DVector<f64>) -> Option<DVector<f64>> {
        self.evaluations.set(self.evaluations.get() + 1);
        let r = (self.residual_fn)(x)
            .filter(|r| r.len() == self.r.len() && r.iter().all(|v| v.is_finite()));
        if r.is_none() {
            self.failed.set(self.failed.get() + 1);
        }
        r
    }
}

impl<F, P> LeastSquaresProblem<f64, Dyn, Dyn> for ProjectedProblem<'_, F, P>
where
    F: Fn(&DVector<f64>) -> Option<DVector<f64>>,
    P: Fn(&mut DVector<f64>),
{
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        let mut projected = x.clone();
        (self.project)(&mut projected);
        self.r = match self.evaluate(&projected) {
            Some(r) => {
                let cost = r.norm_squared();
                if cost < self.best_cost {
                    self.best_cost = cost;
                    self.best_x = projected.clone();
                    self.best_r = r.clone();
                }
                r
            }
            None => DVector::from_element(self.r.len(), FAILED_RESIDUAL),
        };
        self.x = projected;
    }

    fn params(&self) -> DVector<f64> {
        self.x.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(self.r.clone())
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        self.jacobians.set(self.jacobians.get() + 1);
        let n = self.x.len();
        let mut jac = DMatrix::<f64>::zeros(self.r.len(), n);
        for j in 0..n {
            let h = self.diff_step * self.x[j].abs().max(1.0);
            for step in [h, -h] {
                let mut xp = self.x.clone();
                xp[j] += step;
                (self.project)(&mut xp);
                let actual = xp[j] - self.x[j];
                if actual == 0.0 {
                    continue;
                }
                if let Some(rp) = self.evaluate(&xp) {
                    jac.set_column(j, &((rp - &self.r) / actual));
                    break;
                }
            }
        }
        Some(jac)
    }
}

/// Minimizes `Σ r(x)²` over the set defined by `project`, starting from `x0`.
pub fn minimize_projected<F, P>(
    residuals: F,
    project: P,
    x0: DVector<f64>,
    settings: &LMSettings,
) -> Result<LMReport, LMError>
where
    F: Fn(&DVector<f64>) -> Option<DVector<f64>>,
    P: Fn(&mut DVector<f64>),
{
    let n = x0.len();
    if n == 0 {
        return Err(LMError::NoParameters);
    }
    let mut x = x0;
    project(&mut x);
    let mut problem = ProjectedProblem {
        residual_fn: &residuals,
        project: &project,
        x: x.clone(),
        r: DVector::zeros(0),
        best_x: x.clone(),
        best_r: DVector::zeros(0),
        best_cost: f64::INFINITY,
        diff_step: settings.diff_step,
        evaluations: Cell::new(0),
        failed: Cell::new(0),
        jacobians: Cell::new(0),
    };
    problem.evaluations.set(1);
    let r0 = residuals(&x)
        .filter(|r| r.iter().all(|v| v.is_finite()))
        .ok_or(LMError::InitialEvaluationFailed)?;
    if r0.is_empty() {
        return Err(LMError::NoResiduals);
    }
    problem.best_cost = r0.norm_squared();
    problem.best_r = r0.clone();
    problem.r = r0;

    let patience = (settings.max_evaluations / (n + 1)).max(1);
    let (problem, report) = LevenbergMarquardt::new()
        .with_ftol(settings.ftol)
        .with_xtol(settings.xtol)
        .with_gtol(settings.gtol)
        .with_stepbound(settings.stepbound)
        .with_patience(patience)
        .minimize(problem);
    debug!(
        "levenberg-marquardt: {:?} after {} evaluations, objective {:e}",
        report.termination, report.number_of_evaluations, report.objective_function
    );
    let termination = match report.termination {
        TerminationReason::Converged { ftol: true, .. } => Termination::CostConverged,
        TerminationReason::Converged { .. } => Termination::StepConverged,
        TerminationReason::Orthogonal => Termination::GradientConverged,
        TerminationReason::ResidualsZero => Termination::ResidualsZero,
        TerminationReason::LostPatience => Termination::BudgetExhausted,
        other => return Err(LMError::Numerical(format!("{:?}", other))),
    };
    let report = LMReport {
        cost: problem.best_cost,
        parameters: problem.best_x,
        residuals: problem.best_r,
        iterations: problem.jacobians.get(),
        evaluations: problem.evaluations.get(),
        failed_evaluations: problem.failed.get(),
        termination,
    };
    info!(
        "LM finished: {:?} after {} iterations, {} evaluations ({} failed), cost = {:e}",
        report.termination,
        report.iterations,
        report.evaluations,
        report.failed_evaluations,
        report.cost
    );
    Ok(report)
}
