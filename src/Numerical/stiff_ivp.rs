//! # Stiff initial value problems through RustedSciThe
//!
//! The kinetic right-hand side is handed to [`UniversalODESolver`] as symbolic expressions (rate
//! constants already replaced by numbers); the solver differentiates them for its Newton iterations and
//! returns the solution on its own adaptive mesh.
//!
//! Observations are rarely taken on that mesh, so the solution is sampled at the requested times by
//! cubic Hermite interpolation: between mesh nodes `t_k`, `t_k+1` with `h = t_k+1 − t_k` and
//! `s = (t − t_k)/h`
//! ```text
//! y(t) = h00(s)·y_k + h·h10(s)·f(y_k) + h01(s)·y_k+1 + h·h11(s)·f(y_k+1)
//! ```
//! where `f` is the numeric right-hand side. Mesh nodes are reproduced exactly.
//!
//! The largest step is tied to the integration span (`max_step_fraction`), so the interpolation error
//! stays well below the solver tolerance for the smooth kinetic curves.
use RustedSciThe::numerical::ODE_api2::{SolverParam, SolverType, UniversalODESolver};
use RustedSciThe::numerical::Radau::Radau_main::RadauOrder;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StiffMethod {
    /// variable-order BDF with adaptive steps
    #[default]
    BDF,
    Radau3,
    Radau7,
    BackwardEuler,
}

impl StiffMethod {
    pub fn solver_type(&self) -> SolverType {
        match self {
            StiffMethod::BDF => SolverType::BDF,
            StiffMethod::Radau3 => SolverType::Radau(RadauOrder::Order3),
            StiffMethod::Radau7 => SolverType::Radau(RadauOrder::Order7),
            StiffMethod::BackwardEuler => SolverType::BackwardEuler,
        }
    }
}

impl fmt::Display for StiffMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StiffMethod::BDF => write!(f, "BDF"),
            StiffMethod::Radau3 => write!(f, "Radau (order 3)"),
            StiffMethod::Radau7 => write!(f, "Radau (order 7)"),
            StiffMethod::BackwardEuler => write!(f, "backward Euler"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IvpSettings {
    pub method: StiffMethod,
    pub rtol: f64,
    pub atol: f64,
    /// largest step as a fraction of the integration span
    pub max_step_fraction: f64,
    /// estimated by the solver when `None`
    pub first_step: Option<f64>,
    /// step of the fixed-step implicit methods (Radau, backward Euler)
    pub step_size: f64,
    /// Newton tolerance of the implicit stages
    pub newton_tolerance: f64,
}

impl Default for IvpSettings {
    fn default() -> Self {
        IvpSettings {
            method: StiffMethod::BDF,
            rtol: 1e-8,
            atol: 1e-10,
            max_step_fraction: 0.05,
            first_step: None,
            step_size: 1e-3,
            newton_tolerance: 1e-8,
        }
    }
}

impl IvpSettings {
    pub fn validate(&self) -> Result<(), IvpError> {
        let positive = [
            ("rtol", self.rtol),
            ("atol", self.atol),
            ("step_size", self.step_size),
            ("newton_tolerance", self.newton_tolerance),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(IvpError::InvalidSettings(format!("{} = {}", name, value)));
            }
        }
        if !(self.max_step_fraction > 0.0 && self.max_step_fraction <= 1.0) {
            return Err(IvpError::InvalidSettings(format!(
                "max_step_fraction = {}",
                self.max_step_fraction
            )));
        }
        if let Some(h) = self.first_step {
            if !(h > 0.0 && h.is_finite()) {
                return Err(IvpError::InvalidSettings(format!("first_step = {}", h)));
            }
        }
        Ok(())
    }

    fn solver_params(&self, t_end: f64) -> HashMap<String, SolverParam> {
        HashMap::from([
            ("step_size".to_owned(), SolverParam::Float(self.step_size)),
            ("tolerance".to_owned(), SolverParam::Float(self.newton_tolerance)),
            ("max_iterations".to_owned(), SolverParam::Int(100000)),
            ("rtol".to_owned(), SolverParam::Float(self.rtol)),
            ("atol".to_owned(), SolverParam::Float(self.atol)),
            (
                "max_step".to_owned(),
                SolverParam::Float(self.max_step_fraction * t_end),
            ),
            ("first_step".to_owned(), SolverParam::OptionalFloat(self.first_step)),
            ("vectorized".to_owned(), SolverParam::Bool(false)),
            ("jac_sparsity".to_owned(), SolverParam::OptionalMatrix(None)),
            // candidates are already evaluated in parallel by the searches
            ("parallel".to_owned(), SolverParam::Bool(false)),
        ])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IvpStats {
    pub method: StiffMethod,
    /// nodes of the solver mesh, t = 0 included
    pub mesh_points: usize,
    pub smallest_step: f64,
    pub largest_step: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IvpError {
    #[error("invalid solver settings: {0}")]
    InvalidSettings(String),
    #[error("{method} solver returned no solution")]
    NoSolution { method: StiffMethod },
    #[error("solution has shape {rows}x{cols}, expected {points} mesh points of {unknowns} unknowns")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        points: usize,
        unknowns: usize,
    },
    #[error("integration stopped at t = {reached} before t = {t_end}")]
    Incomplete { reached: f64, t_end: f64 },
    #[error("non-finite state at t = {t}")]
    NonFiniteState { t: f64 },
}

/// Solution on the solver mesh
#[derive(Debug, Clone, PartialEq)]
pub struct IvpSolution {
    pub t: Vec<f64>,
    pub y: Vec<DVector<f64>>,
    pub stats: IvpStats,
}

/// Integrates `d(unknowns)/d(argument) = equations` from 0 to `t_end`.
pub fn integrate(
    equations: Vec<Expr>,
    unknowns: Vec<String>,
    argument: &str,
    y0: &DVector<f64>,
    t_end: f64,
    settings: &IvpSettings,
) -> Result<IvpSolution, IvpError> {
    settings.validate()?;
    let n = unknowns.len();
    let mut ode = UniversalODESolver::new(
        equations,
        unknowns,
        argument.to_owned(),
        settings.method.solver_type(),
        0.0,
        y0.clone(),
        t_end,
    );
    ode.set_parameters(settings.solver_params(t_end));
    ode.initialize();
    ode.solve();
    let (t, y) = match ode.get_result() {
        (Some(t), Some(y)) => (t, y),
        _ => {
            return Err(IvpError::NoSolution {
                method: settings.method,
            });
        }
    };
    let t: Vec<f64> = t.iter().copied().collect();
    let y = mesh_states(&y, t.len(), n)?;
    let reached = t.last().copied().unwrap_or(0.0);
    if reached < t_end * (1.0 - 1e-9) - 1e-12 {
        return Err(IvpError::Incomplete { reached, t_end });
    }
    for (ti, yi) in t.iter().zip(&y) {
        if yi.iter().any(|v| !v.is_finite()) {
            return Err(IvpError::NonFiniteState { t: *ti });
        }
    }
    let steps = t.windows(2).map(|w| w[1] - w[0]);
    let (smallest_step, largest_step) = steps.fold((f64::INFINITY, 0.0_f64), |(lo, hi), h| {
        (lo.min(h), hi.max(h))
    });
    let stats = IvpStats {
        method: settings.method,
        mesh_points: t.len(),
        smallest_step,
        largest_step,
    };
    debug!(
        "{} reached t = {} on {} mesh points, steps in [{:e}, {:e}]",
        settings.method, reached, stats.mesh_points, smallest_step, largest_step
    );
    Ok(IvpSolution { t, y, stats })
}

/// one state vector per mesh point, whichever way the solver orients its result matrix
fn mesh_states(
    y: &DMatrix<f64>,
    points: usize,
    unknowns: usize,
) -> Result<Vec<DVector<f64>>, IvpError> {
    if y.nrows() == points && y.ncols() == unknowns {
        Ok((0..points).map(|i| y.row(i).transpose()).collect())
    } else if y.ncols() == points && y.nrows() == unknowns {
        Ok((0..points).map(|i| y.column(i).into_owned()).collect())
    } else {
        Err(IvpError::ShapeMismatch {
            rows: y.nrows(),
            cols: y.ncols(),
            points,
            unknowns,
        })
    }
}

/// Cubic Hermite interpolation of `solution` at non-decreasing `times` inside the mesh span,
/// `slope(y)` being the right-hand side.
pub fn sample_hermite<F>(solution: &IvpSolution, times: &[f64], slope: F) -> Vec<DVector<f64>>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mesh = &solution.t;
    if mesh.is_empty() {
        return Vec::new();
    }
    let last = mesh.len() - 1;
    let slopes: Vec<DVector<f64>> = solution.y.iter().map(|y| slope(y)).collect();
    let mut k = 0;
    times
        .iter()
        .map(|&t| {
            if t <= mesh[0] {
                return solution.y[0].clone();
            }
            if t >= mesh[last] {
                return solution.y[last].clone();
            }
            while k + 1 < last && mesh[k + 1] < t {
                k += 1;
            }
            let h = mesh[k + 1] - mesh[k];
            if h <= 0.0 {
                return solution.y[k + 1].clone();
            }
            let s = (t - mesh[k]) / h;
            let s2 = s * s;
            let s3 = s2 * s;
            let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
            let h10 = s3 - 2.0 * s2 + s;
            let h01 = -2.0 * s3 + 3.0 * s2;
            let h11 = s3 - s2;
            &solution.y[k] * h00
                + &slopes[k] * (h * h10)
                + &solution.y[k + 1] * h01
                + &slopes[k + 1] * (h * h11)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decay_solution() -> IvpSolution {
        // exact samples of y = exp(−t) on a coarse mesh
        let t = vec![0.0, 0.5, 1.5, 3.0];
        let y = t
            .iter()
            .map(|ti: &f64| DVector::from_vec(vec![(-ti).exp()]))
            .collect();
        IvpSolution {
            t,
            y,
            stats: IvpStats::default(),
        }
    }

    #[test]
    fn test_hermite_reproduces_mesh_nodes() {
        let solution = decay_solution();
        let out = sample_hermite(&solution, &[0.0, 0.5, 1.5, 3.0], |y| -y);
        for (sampled, exact) in out.iter().zip(&solution.y) {
            assert_eq!(sampled[0], exact[0]);
        }
    }

    #[test]
    fn test_hermite_between_nodes() {
        let solution = decay_solution();
        let times = [0.1, 0.25, 0.9, 1.2, 2.0, 2.9];
        let out = sample_hermite(&solution, &times, |y| -y);
        for (t, y) in times.iter().zip(&out) {
            // fourth-order interpolation error on steps up to 1.5
            assert_relative_eq!(y[0], (-t).exp(), max_relative = 2e-2);
        }
        let fine = sample_hermite(&solution, &[0.25], |y| -y);
        assert_relative_eq!(fine[0][0], (-0.25f64).exp(), max_relative = 1e-3);
    }

    #[test]
    fn test_mesh_orientation() {
        // 3 mesh points of 2 unknowns, rows are time points
        let by_rows = DMatrix::from_row_slice(3, 2, &[1.0, 10.0, 2.0, 20.0, 3.0, 30.0]);
        let states = mesh_states(&by_rows, 3, 2).unwrap();
        assert_eq!(states[1].as_slice(), &[2.0, 20.0]);
        let by_columns = by_rows.transpose();
        assert_eq!(mesh_states(&by_columns, 3, 2).unwrap(), states);
        assert!(matches!(
            mesh_states(&by_rows, 4, 2),
            Err(IvpError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_settings_validation() {
        assert!(IvpSettings::default().validate().is_ok());
        let bad = IvpSettings {
            rtol: 0.0,
            ..IvpSettings::default()
        };
        assert!(matches!(bad.validate(), Err(IvpError::InvalidSettings(_))));
        let bad = IvpSettings {
            max_step_fraction: 2.0,
            ..IvpSettings::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_bdf_exponential_decay() {
        let y = Expr::Var("y".to_owned());
        let rhs = vec![-Expr::Const(2.0) * y];
        let y0 = DVector::from_vec(vec![1.0]);
        let settings = IvpSettings::default();
        let solution = integrate(rhs, vec!["y".to_owned()], "t", &y0, 2.0, &settings).unwrap();
        assert!(solution.stats.mesh_points > 2);
        assert!(solution.stats.largest_step <= 0.1 + 1e-12);
        let out = sample_hermite(&solution, &[0.5, 1.0, 2.0], |y| -2.0 * y);
        for (t, y) in [0.5, 1.0, 2.0].iter().zip(&out) {
            assert_relative_eq!(y[0], (-2.0_f64 * t).exp(), max_relative = 1e-3);
        }
    }
}
