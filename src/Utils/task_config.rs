//! JSON task documents: a model description, experiments and fit options under `"fit"`, operating
//! bounds and weights under `"optimize"`. Either section may be absent; when both are present the
//! optimization runs on the fitted model.
//!
//! ```json
//! {
//!   "fit": {
//!     "model": { "mechanism": { "type": "one_step_conversion" },
//!                "parameters": { "forward": [ { "A": 1e6, "Ea": 45.0 } ] } },
//!     "experiments": [
//!       { "id": "run-50", "temperature": 50.0,
//!         "initial_conditions": { "C_TG_0": 0.5, "C_MeOH_0": 3.0 },
//!         "time": [0, 10, 20], "observed": [0.0, 62.1, 85.3] }
//!     ],
//!     "method": "LevenbergMarquardt",
//!     "parameters": [ { "name": "Ea_forward", "min": 20.0, "max": 90.0 } ]
//!   },
//!   "optimize": {
//!     "initial_conditions": { "TG": 0.5, "MeOH": 3.0 },
//!     "reaction_time": 60.0,
//!     "max_iterations": 50
//!   }
//! }
//! ```
use crate::Fitting::experiment::{Experiment, Observable};
use crate::Fitting::fit_result::FitResult;
use crate::Fitting::parameter_fitter::{FitError, FitMethod, FitSettings, ParameterFitter};
use crate::Kinetics::arrhenius::KineticParameters;
use crate::Kinetics::kinetic_errors::ConfigurationError;
use crate::Kinetics::kinetic_model::{KineticModel, ModelSettings, Reversibility};
use crate::Kinetics::mechanisms::Mechanism;
use crate::Kinetics::species::InitialConditions;
use crate::Optimization::operating_conditions::{ObjectiveWeights, OperatingBounds};
use crate::Optimization::operational_optimizer::{
    OperationalOptimizer, OptimizationError, OptimizationMethod, OptimizationResult,
    OptimizerSettings,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("cannot read task file '{path}': {message}")]
    Io { path: String, message: String },
    #[error("{origin}: line {line}, column {column}: {message}")]
    Parse {
        origin: String,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("the task has neither a 'fit' nor an 'optimize' section")]
    Empty,
    #[error("the 'optimize' section has no model and there is no 'fit' section to provide one")]
    MissingModel,
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error(transparent)]
    Optimization(#[from] OptimizationError),
}

fn first_order() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MechanismConfig {
    OneStepConversion,
    OneStep {
        #[serde(default = "first_order")]
        methanol_order: f64,
        #[serde(default = "first_order")]
        fame_order: f64,
        #[serde(default = "first_order")]
        glycerol_order: f64,
    },
    ThreeStep,
}

impl MechanismConfig {
    pub fn build(&self) -> Result<Mechanism, ConfigurationError> {
        match self {
            MechanismConfig::OneStepConversion => Ok(Mechanism::one_step_conversion()),
            MechanismConfig::OneStep {
                methanol_order,
                fame_order,
                glycerol_order,
            } => Mechanism::one_step_with_orders(*methanol_order, *fame_order, *glycerol_order),
            MechanismConfig::ThreeStep => Ok(Mechanism::three_step()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub mechanism: MechanismConfig,
    #[serde(default)]
    pub reversible: bool,
    pub parameters: KineticParameters,
    #[serde(default)]
    pub settings: ModelSettings,
}

impl ModelConfig {
    pub fn build(&self) -> Result<KineticModel, ConfigurationError> {
        let reversibility = if self.reversible {
            Reversibility::Reversible
        } else {
            Reversibility::Irreversible
        };
        KineticModel::new(
            self.mechanism.build()?,
            reversibility,
            self.parameters.clone(),
        )?
        .with_settings(self.settings.clone())
    }
}

fn unit_weight() -> f64 {
    1.0
}

/// Experiment as written in a task file; species keys like `TG`, `C_TG_0` or `C_MeOH0` are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: String,
    pub temperature: f64,
    pub initial_conditions: HashMap<String, f64>,
    pub time: Vec<f64>,
    pub observed: Vec<f64>,
    #[serde(default)]
    pub observable: Observable,
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

impl ExperimentRecord {
    pub fn build(&self) -> Result<Experiment, ConfigurationError> {
        let ic = InitialConditions::from_named(&self.initial_conditions)?;
        Ok(Experiment::new(
            self.id.clone(),
            self.time.clone(),
            self.observed.clone(),
            self.temperature,
            ic,
        )
        .with_observable(self.observable)
        .with_weight(self.weight))
    }
}

/// Bounds, starting value and lock of one fit parameter (`A_forward`, `Ea_2r`, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSetting {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub locked: bool,
}

fn default_fit_method() -> FitMethod {
    FitMethod::LevenbergMarquardt
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitTask {
    pub model: ModelConfig,
    pub experiments: Vec<ExperimentRecord>,
    #[serde(default = "default_fit_method")]
    pub method: FitMethod,
    #[serde(default)]
    pub parameters: Vec<ParameterSetting>,
    #[serde(default)]
    pub settings: FitSettings,
}

impl FitTask {
    pub fn build_fitter(&self) -> Result<ParameterFitter, TaskError> {
        let mut fitter = ParameterFitter::new(self.model.build()?).with_settings(self.settings.clone());
        for record in &self.experiments {
            fitter.add(record.build()?)?;
        }
        for setting in &self.parameters {
            let index = fitter
                .parameters()
                .iter()
                .position(|p| p.name == setting.name)
                .ok_or_else(|| FitError::UnknownParameter(setting.name.clone()))?;
            let (min, max) = {
                let current = &fitter.parameters()[index];
                (current.min, current.max)
            };
            fitter.set_bounds(
                &setting.name,
                setting.min.unwrap_or(min),
                setting.max.unwrap_or(max),
            )?;
            match (setting.locked, setting.value) {
                (true, Some(v)) => fitter.lock_at(&setting.name, v)?,
                (true, None) => fitter.lock(&setting.name)?,
                (false, Some(v)) => {
                    let mut flat: Vec<f64> = fitter.parameters().iter().map(|p| p.value).collect();
                    flat[index] = v;
                    let guess = fitter.model().parameters().with_flat(&flat)?;
                    fitter.set_initial_guess(&guess)?;
                }
                (false, None) => {}
            }
        }
        Ok(fitter)
    }
}

fn default_max_iterations() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationTask {
    /// defaults to the fitted model of the `fit` section
    #[serde(default)]
    pub model: Option<ModelConfig>,
    pub initial_conditions: HashMap<String, f64>,
    /// min
    pub reaction_time: f64,
    #[serde(default)]
    pub bounds: OperatingBounds,
    #[serde(default)]
    pub weights: ObjectiveWeights,
    #[serde(default)]
    pub method: OptimizationMethod,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub settings: OptimizerSettings,
}

impl OptimizationTask {
    pub fn run(&self, model: KineticModel) -> Result<OptimizationResult, TaskError> {
        let ic = InitialConditions::from_named(&self.initial_conditions)?;
        let optimizer = OperationalOptimizer::new(model).with_settings(self.settings.clone());
        Ok(optimizer.optimize(
            &ic,
            self.reaction_time,
            &self.bounds,
            &self.weights,
            self.method,
            self.max_iterations,
        )?)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskDocument {
    #[serde(default)]
    pub fit: Option<FitTask>,
    #[serde(default)]
    pub optimize: Option<OptimizationTask>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskOutcome {
    pub fit: Option<FitResult>,
    pub optimization: Option<OptimizationResult>,
}

/// Parses a task document; `origin` names the source in error messages.
pub fn parse_task(text: &str, origin: &str) -> Result<TaskDocument, TaskError> {
    serde_json::from_str(text).map_err(|e| {
        let (line, column) = (e.line(), e.column());
        error!("error parsing {} at line {}, column {}: {}", origin, line, column, e);
        if let Some(problem) = text.lines().nth(line.saturating_sub(1)) {
            error!("problematic line: {}", problem);
            if column >= 1 && column <= problem.chars().count() + 1 {
                error!("{}^", " ".repeat(column - 1));
            }
        }
        TaskError::Parse {
            origin: origin.to_string(),
            line,
            column,
            message: e.to_string(),
        }
    })
}

pub fn load_task(path: &Path) -> Result<TaskDocument, TaskError> {
    let text = fs::read_to_string(path).map_err(|e| TaskError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let document = parse_task(&text, &path.display().to_string())?;
    info!(
        "task '{}' loaded: fit section {}, optimize section {}",
        path.display(),
        if document.fit.is_some() { "present" } else { "absent" },
        if document.optimize.is_some() { "present" } else { "absent" }
    );
    Ok(document)
}

/// Runs the fit, then the optimization on the fitted model (or on the optimization's own model).
pub fn run_task(document: &TaskDocument) -> Result<TaskOutcome, TaskError> {
    if document.fit.is_none() && document.optimize.is_none() {
        return Err(TaskError::Empty);
    }
    let mut outcome = TaskOutcome::default();
    let mut fitted_model = None;
    if let Some(fit) = &document.fit {
        let mut fitter = fit.build_fitter()?;
        outcome.fit = Some(fitter.fit(fit.method)?);
        fitted_model = Some(fitter.into_model());
    }
    if let Some(optimize) = &document.optimize {
        let model = match (&optimize.model, fitted_model) {
            (Some(config), _) => config.build()?,
            (None, Some(model)) => model,
            (None, None) => return Err(TaskError::MissingModel),
        };
        outcome.optimization = Some(optimize.run(model)?);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kinetics::species::Species;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// conversion series of A = 1e7, Ea = 50 in the conversion form, ratio 6
    fn observed(temperature: f64, times: &[f64]) -> Vec<f64> {
        let model = KineticModel::new(
            Mechanism::one_step_conversion(),
            Reversibility::Irreversible,
            KineticParameters::single(1e7, 50.0),
        )
        .unwrap();
        model
            .simulate(&InitialConditions::from_molar_ratio(0.5, 6.0), times, temperature)
            .unwrap()
            .conversion
    }

    fn task_text() -> String {
        let times = [0.0, 5.0, 10.0, 20.0, 30.0, 45.0];
        let series = |t: f64| {
            serde_json::to_string(&observed(t, &times)).unwrap()
        };
        format!(
            r#"{{
  "fit": {{
    "model": {{
      "mechanism": {{ "type": "one_step_conversion" }},
      "parameters": {{ "forward": [ {{ "A": 1e6, "Ea": 45.0 }} ] }}
    }},
    "experiments": [
      {{ "id": "run-40", "temperature": 40.0,
         "initial_conditions": {{ "C_TG_0": 0.5, "C_MeOH_0": 3.0 }},
         "time": {times}, "observed": {x40} }},
      {{ "id": "run-55", "temperature": 55.0,
         "initial_conditions": {{ "TG": 0.5, "MeOH": 3.0 }},
         "time": {times}, "observed": {x55} }}
    ],
    "parameters": [ {{ "name": "Ea_forward", "min": 20.0, "max": 90.0 }} ]
  }},
  "optimize": {{
    "initial_conditions": {{ "TG": 0.5, "MeOH": 3.0 }},
    "reaction_time": 30.0,
    "max_iterations": 10
  }}
}}"#,
            times = serde_json::to_string(&times).unwrap(),
            x40 = series(40.0),
            x55 = series(55.0),
        )
    }

    #[test]
    fn test_load_and_run_task() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(task_text().as_bytes()).unwrap();
        let document = load_task(file.path()).unwrap();
        let fit = document.fit.as_ref().unwrap();
        assert_eq!(fit.experiments.len(), 2);
        assert_eq!(fit.method, FitMethod::LevenbergMarquardt);
        let fitter = fit.build_fitter().unwrap();
        let ea = &fitter.parameters()[1];
        assert_eq!((ea.min, ea.max), (20.0, 90.0));
        assert_eq!(
            fitter.experiments()[0].initial_conditions.get(Species::MeOH),
            3.0
        );

        let outcome = run_task(&document).unwrap();
        let fit = outcome.fit.unwrap();
        assert!((fit.value("Ea_forward").unwrap() - 50.0).abs() < 0.5);
        let optimization = outcome.optimization.unwrap();
        assert!(optimization.feasible);
        assert!(OperatingBounds::default().contains(&optimization.point));
    }

    #[test]
    fn test_parse_error_position() {
        let text = "{\n  \"optimize\": {\n    \"reaction_time\": 30.0,,\n  }\n}";
        match parse_task(text, "inline") {
            Err(TaskError::Parse { line, column, .. }) => {
                assert_eq!(line, 3);
                assert!(column > 20);
            }
            other => panic!("expected a parse error, got {:?}", other),
        }
        assert!(matches!(
            load_task(Path::new("/nonexistent/task.json")),
            Err(TaskError::Io { .. })
        ));
    }

    #[test]
    fn test_sections() {
        assert!(matches!(
            run_task(&TaskDocument::default()),
            Err(TaskError::Empty)
        ));
        let document = parse_task(
            r#"{ "optimize": { "initial_conditions": { "TG": 0.5, "MeOH": 3.0 }, "reaction_time": 30.0 } }"#,
            "inline",
        )
        .unwrap();
        assert!(matches!(run_task(&document), Err(TaskError::MissingModel)));
        let mechanism: MechanismConfig =
            serde_json::from_str(r#"{ "type": "one_step", "methanol_order": 2.0 }"#).unwrap();
        assert_eq!(
            mechanism,
            MechanismConfig::OneStep {
                methanol_order: 2.0,
                fame_order: 1.0,
                glycerol_order: 1.0
            }
        );
        assert!(mechanism.build().is_ok());
    }
}
