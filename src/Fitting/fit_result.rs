//! Outcome of a parameter fit.
use crate::Kinetics::arrhenius::KineticParameters;
use log::warn;
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Conditions under which the fit is returned but deserves caution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitWarning {
    /// fewer experiments than free parameters
    UnderDetermined {
        experiments: usize,
        free_parameters: usize,
    },
    /// every experiment at one temperature while both A and Ea of a pair are free
    SingleTemperature { temperature: f64 },
    /// the global search stopped at its generation limit
    GlobalSearchNotConverged { generations: usize },
    /// the local polish after the global search did not converge, the global optimum is kept
    PolishNotConverged { iterations: usize },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::UnderDetermined {
                experiments,
                free_parameters,
            } => write!(
                f,
                "{} experiments for {} free parameters: the problem is under-determined",
                experiments, free_parameters
            ),
            FitWarning::SingleTemperature { temperature } => write!(
                f,
                "all experiments at {} °C: A and Ea cannot be separated",
                temperature
            ),
            FitWarning::GlobalSearchNotConverged { generations } => write!(
                f,
                "global search stopped after {} generations without convergence",
                generations
            ),
            FitWarning::PolishNotConverged { iterations } => write!(
                f,
                "local polish did not converge in {} iterations",
                iterations
            ),
        }
    }
}

impl FitWarning {
    pub(crate) fn emit(self, warnings: &mut Vec<FitWarning>) {
        warn!("{}", self);
        warnings.push(self);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub id: String,
    pub temperature: f64,
    pub points: usize,
    pub rmse: f64,
    pub r_squared: f64,
    pub max_abs_residual: f64,
    /// %, `None` when every observation is zero
    pub mape: Option<f64>,
    pub mean_residual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub parameters: KineticParameters,
    /// flat parameter names, `A_<step>`/`Ea_<step>`
    pub parameter_names: Vec<String>,
    pub parameter_values: Vec<f64>,
    /// names of the parameters that were locked during the fit
    pub locked: Vec<String>,
    pub r_squared: f64,
    /// in the units of the observations
    pub rmse: f64,
    pub mae: f64,
    /// mean absolute percentage error over the non-zero observations
    pub mape: Option<f64>,
    /// weighted sum of squared residuals
    pub cost: f64,
    pub method: String,
    pub iterations: usize,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    pub experiments: Vec<ExperimentSummary>,
    pub warnings: Vec<FitWarning>,
}

impl FitResult {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.parameter_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.parameter_values[i])
    }

    /// scalar fields for export; per-experiment statistics are keyed `<id>.rmse` etc.
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        for (name, value) in self.parameter_names.iter().zip(&self.parameter_values) {
            map.insert(name.clone(), *value);
        }
        map.insert("r_squared".to_string(), self.r_squared);
        map.insert("rmse".to_string(), self.rmse);
        map.insert("mae".to_string(), self.mae);
        if let Some(mape) = self.mape {
            map.insert("mape".to_string(), mape);
        }
        map.insert("cost".to_string(), self.cost);
        map.insert("iterations".to_string(), self.iterations as f64);
        map.insert("evaluations".to_string(), self.evaluations as f64);
        map.insert(
            "failed_evaluations".to_string(),
            self.failed_evaluations as f64,
        );
        for summary in &self.experiments {
            map.insert(format!("{}.rmse", summary.id), summary.rmse);
            map.insert(format!("{}.r_squared", summary.id), summary.r_squared);
            map.insert(
                format!("{}.max_abs_residual", summary.id),
                summary.max_abs_residual,
            );
            if let Some(mape) = summary.mape {
                map.insert(format!("{}.mape", summary.id), mape);
            }
        }
        map
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn pretty_print(&self) {
        println!(
            "Fit by {}: {} iterations, {} evaluations ({} failed)",
            self.method, self.iterations, self.evaluations, self.failed_evaluations
        );
        let mut table = Table::new();
        table.add_row(row!["Parameter", "Value", "Status"]);
        for (name, value) in self.parameter_names.iter().zip(&self.parameter_values) {
            let status = if self.locked.contains(name) {
                "locked"
            } else {
                "fitted"
            };
            table.add_row(row![name, format!("{:.6e}", value), status]);
        }
        table.printstd();

        let mut stats = Table::new();
        let percent = |m: Option<f64>| m.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
        stats.add_row(row!["Experiment", "T, °C", "n", "RMSE", "R²", "MAPE, %", "max |res|"]);
        for s in &self.experiments {
            stats.add_row(row![
                s.id,
                format!("{:.1}", s.temperature),
                s.points,
                format!("{:.4}", s.rmse),
                format!("{:.5}", s.r_squared),
                percent(s.mape),
                format!("{:.4}", s.max_abs_residual)
            ]);
        }
        stats.add_row(row![
            "all",
            "",
            self.experiments.iter().map(|s| s.points).sum::<usize>(),
            format!("{:.4}", self.rmse),
            format!("{:.5}", self.r_squared),
            percent(self.mape),
            ""
        ]);
        stats.printstd();
        for w in &self.warnings {
            println!("warning: {}", w);
        }
    }
}
