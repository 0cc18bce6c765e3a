//! # Multi-experiment estimation of Arrhenius parameters
//!
//! All experiments share one set of Arrhenius pairs; every candidate re-simulates every experiment at its
//! own temperature and the residuals `observed − simulated` (scaled by `sqrt(weight)`) are concatenated.
//!
//! ## Parameters
//! One [`FitParameter`] per `A_<step>` and `Ea_<step>`, each with bounds and a `vary` flag (locked
//! parameters keep their value).
//!
//! ## Local search coordinates
//! A and Ea are strongly correlated when fitted directly. When both members of a pair are free the
//! Levenberg–Marquardt search runs on
//! ```text
//! u = ln k(T_ref) = ln A − Ea/(R·T_ref),   v = Ea
//! ```
//! with `T_ref` the mean experiment temperature (K), and maps back with `A = exp(u + v/(R·T_ref))`.
//! A lone free A is searched as `ln A`, a lone free Ea as is. Bounds are enforced by projection: Ea is
//! clamped first, then ln A, then `u` is recomputed.
//!
//! ## Global search
//! Differential evolution over `(ln A, Ea)` inside the (finite) bounds, optionally polished by
//! Levenberg–Marquardt.
use crate::Fitting::experiment::Experiment;
use crate::Fitting::fit_metrics::{mae, mape, max_abs_residual, r_squared, rmse};
use crate::Fitting::fit_result::{ExperimentSummary, FitResult, FitWarning};
use crate::Kinetics::arrhenius::{KineticParameters, ZERO_CELSIUS};
use crate::Kinetics::kinetic_errors::{ConfigurationError, KineticsError};
use crate::Kinetics::kinetic_model::KineticModel;
use crate::Kinetics::species::InitialConditions;
use crate::Numerical::differential_evolution::{DEError, DESettings, DifferentialEvolution};
use crate::Numerical::least_squares::{LMError, LMSettings, Termination, minimize_projected};
use log::{debug, info};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParameter {
    pub name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    /// `false` locks the parameter at `value`
    pub vary: bool,
}

impl FitParameter {
    fn is_pre_exponential(&self) -> bool {
        self.name.starts_with("A_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FitMethod {
    LevenbergMarquardt,
    DifferentialEvolution { polish: bool },
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitMethod::LevenbergMarquardt => write!(f, "Levenberg-Marquardt"),
            FitMethod::DifferentialEvolution { polish: true } => {
                write!(f, "differential evolution + Levenberg-Marquardt polish")
            }
            FitMethod::DifferentialEvolution { polish: false } => {
                write!(f, "differential evolution")
            }
        }
    }
}

/// Scaling of each experiment's squared residuals, on top of `Experiment::weight`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Weighting {
    #[default]
    Uniform,
    /// 1/variance of the experiment's observations
    InverseVariance,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    pub weighting: Weighting,
    pub lm: LMSettings,
    pub de: DESettings,
}

#[derive(Debug, Error)]
pub enum FitError {
    #[error("no experiments were added")]
    NoExperiments,
    #[error("experiment '{id}' has no samples")]
    EmptyExperiment { id: String },
    #[error("experiment id '{id}' is already used")]
    DuplicateExperiment { id: String },
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("every parameter is locked, nothing to fit")]
    NothingToFit,
    #[error("experiment '{id}' cannot be simulated: {source}")]
    Simulation {
        id: String,
        #[source]
        source: KineticsError,
    },
    #[error("{method}: all {evaluations} candidate evaluations failed to integrate")]
    AllCandidatesFailed { method: String, evaluations: usize },
    #[error("{method} did not converge within {iterations} iterations ({evaluations} evaluations)")]
    NotConverged {
        method: String,
        iterations: usize,
        evaluations: usize,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    GlobalSearch(#[from] DEError),
    #[error(transparent)]
    LocalSearch(#[from] LMError),
}

pub struct ParameterFitter {
    model: KineticModel,
    experiments: Vec<Experiment>,
    parameters: Vec<FitParameter>,
    pub settings: FitSettings,
}

/// parameters resulting from one search stage
struct SearchOutcome {
    physical: Vec<f64>,
    iterations: usize,
    evaluations: usize,
    failed: usize,
}

impl ParameterFitter {
    /// Fitter seeded with the model's current parameters as initial guess.
    /// Default bounds: A in [A·10⁻⁶, A·10⁶], Ea in [0, 400] kJ/mol, all parameters free.
    pub fn new(model: KineticModel) -> Self {
        let parameters = model
            .parameter_names()
            .into_iter()
            .zip(model.parameters().to_flat())
            .map(|(name, value)| {
                let (min, max) = if name.starts_with("A_") {
                    if value > 0.0 {
                        (value * 1e-6, value * 1e6)
                    } else {
                        (1e-10, 1e20)
                    }
                } else {
                    (0.0, value.max(400.0))
                };
                FitParameter {
                    name,
                    value,
                    min,
                    max,
                    vary: true,
                }
            })
            .collect();
        ParameterFitter {
            model,
            experiments: Vec::new(),
            parameters,
            settings: FitSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: FitSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn model(&self) -> &KineticModel {
        &self.model
    }

    pub fn into_model(self) -> KineticModel {
        self.model
    }

    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    pub fn parameters(&self) -> &[FitParameter] {
        &self.parameters
    }

    pub fn free_parameter_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.vary).count()
    }

    pub fn add_experiment(
        &mut self,
        time: Vec<f64>,
        observed: Vec<f64>,
        temperature: f64,
        initial_conditions: InitialConditions,
        id: &str,
    ) -> Result<(), FitError> {
        self.add(Experiment::new(
            id,
            time,
            observed,
            temperature,
            initial_conditions,
        ))
    }

    pub fn add(&mut self, experiment: Experiment) -> Result<(), FitError> {
        if self.experiments.iter().any(|e| e.id == experiment.id) {
            return Err(FitError::DuplicateExperiment { id: experiment.id });
        }
        experiment.validate()?;
        info!(
            "experiment '{}' added: {} samples at {} °C",
            experiment.id,
            experiment.len(),
            experiment.temperature
        );
        self.experiments.push(experiment);
        Ok(())
    }

    fn parameter_mut(&mut self, name: &str) -> Result<&mut FitParameter, FitError> {
        self.parameters
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| FitError::UnknownParameter(name.to_string()))
    }

    pub fn set_initial_guess(&mut self, guess: &KineticParameters) -> Result<(), FitError> {
        self.model.set_parameters(guess.clone())?;
        for (p, value) in self.parameters.iter_mut().zip(guess.to_flat()) {
            p.value = value;
        }
        Ok(())
    }

    pub fn set_bounds(&mut self, name: &str, min: f64, max: f64) -> Result<(), FitError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(ConfigurationError::InvalidBounds {
                name: name.to_string(),
                lower: min,
                upper: max,
            }
            .into());
        }
        let p = self.parameter_mut(name)?;
        p.min = min;
        p.max = max;
        Ok(())
    }

    /// locks a parameter at its current value
    pub fn lock(&mut self, name: &str) -> Result<(), FitError> {
        self.parameter_mut(name)?.vary = false;
        Ok(())
    }

    pub fn lock_at(&mut self, name: &str, value: f64) -> Result<(), FitError> {
        let p = self.parameter_mut(name)?;
        p.value = value;
        p.vary = false;
        Ok(())
    }

    pub fn unlock(&mut self, name: &str) -> Result<(), FitError> {
        self.parameter_mut(name)?.vary = true;
        Ok(())
    }

    /// Fits the free parameters against every experiment. On success the fitted parameters are
    /// written back into the model and the parameter list.
    pub fn fit(&mut self, method: FitMethod) -> Result<FitResult, FitError> {
        let mut warnings = self.check_problem()?;
        info!(
            "fitting {} free parameters against {} experiments by {}",
            self.free_parameter_count(),
            self.experiments.len(),
            method
        );
        let map = ParameterMap::new(
            &self.parameters,
            self.reference_temperature(),
            self.model.gas_constant(),
        );
        let weights = self.experiment_weights();
        let initial: Vec<f64> = self.parameters.iter().map(|p| p.value).collect();

        let outcome = match method {
            FitMethod::LevenbergMarquardt => {
                self.run_levenberg_marquardt(&map, &weights, &initial, &method)?
            }
            FitMethod::DifferentialEvolution { polish } => {
                let global = self.run_differential_evolution(&map, &weights, &mut warnings, &method)?;
                if polish {
                    match self.run_levenberg_marquardt(&map, &weights, &global.physical, &method) {
                        Ok(local) => SearchOutcome {
                            physical: local.physical,
                            iterations: global.iterations + local.iterations,
                            evaluations: global.evaluations + local.evaluations,
                            failed: global.failed + local.failed,
                        },
                        Err(FitError::NotConverged { iterations, .. }) => {
                            FitWarning::PolishNotConverged { iterations }.emit(&mut warnings);
                            global
                        }
                        Err(e) => return Err(e),
                    }
                } else {
                    global
                }
            }
        };

        let fitted = self.model.parameters().with_flat(&outcome.physical)?;
        let fitted_model = self.model.with_parameters(fitted)?;
        let result = self.summarize(&fitted_model, &weights, &outcome, &method, warnings)?;
        self.model = fitted_model;
        for (p, value) in self.parameters.iter_mut().zip(&outcome.physical) {
            p.value = *value;
        }
        info!(
            "fit finished: R² = {:.6}, RMSE = {:.5}, cost = {:e}",
            result.r_squared, result.rmse, result.cost
        );
        Ok(result)
    }

    fn check_problem(&self) -> Result<Vec<FitWarning>, FitError> {
        if self.experiments.is_empty() {
            return Err(FitError::NoExperiments);
        }
        if let Some(e) = self.experiments.iter().find(|e| e.is_empty()) {
            return Err(FitError::EmptyExperiment { id: e.id.clone() });
        }
        let free = self.free_parameter_count();
        if free == 0 {
            return Err(FitError::NothingToFit);
        }
        for p in &self.parameters {
            let positive_a = !p.is_pre_exponential() || !p.vary || p.min > 0.0;
            if p.min.is_nan() || p.max.is_nan() || p.min > p.max || !positive_a {
                return Err(ConfigurationError::InvalidBounds {
                    name: p.name.clone(),
                    lower: p.min,
                    upper: p.max,
                }
                .into());
            }
            if p.vary && !(p.value >= p.min && p.value <= p.max) {
                return Err(ConfigurationError::InvalidBounds {
                    name: format!("{} (initial value {} outside)", p.name, p.value),
                    lower: p.min,
                    upper: p.max,
                }
                .into());
            }
        }
        let mut warnings = Vec::new();
        if self.experiments.len() < free {
            FitWarning::UnderDetermined {
                experiments: self.experiments.len(),
                free_parameters: free,
            }
            .emit(&mut warnings);
        }
        let first_t = self.experiments[0].temperature;
        let isothermal = self.experiments.iter().all(|e| e.temperature == first_t);
        let coupled_pair = self
            .parameters
            .chunks(2)
            .any(|pair| pair.iter().all(|p| p.vary));
        if isothermal && coupled_pair {
            FitWarning::SingleTemperature {
                temperature: first_t,
            }
            .emit(&mut warnings);
        }
        Ok(warnings)
    }

    /// mean experiment temperature, K
    fn reference_temperature(&self) -> f64 {
        let n = self.experiments.len() as f64;
        self.experiments.iter().map(|e| e.temperature).sum::<f64>() / n + ZERO_CELSIUS
    }

    fn experiment_weights(&self) -> Vec<f64> {
        self.experiments
            .iter()
            .map(|e| match self.settings.weighting {
                Weighting::Uniform => e.weight,
                Weighting::InverseVariance => {
                    let variance = e.observed_variance();
                    if variance > 0.0 {
                        e.weight / variance
                    } else {
                        debug!(
                            "experiment '{}' has no variance, inverse-variance weight falls back to 1",
                            e.id
                        );
                        e.weight
                    }
                }
            })
            .collect()
    }

    /// concatenated weighted residuals for the flat physical parameter vector
    fn residuals(&self, physical: &[f64], weights: &[f64]) -> Result<DVector<f64>, FitError> {
        let params = self.model.parameters().with_flat(physical)?;
        let model = self.model.with_parameters(params)?;
        let mut out = Vec::new();
        for (experiment, w) in self.experiments.iter().zip(weights) {
            let predicted = experiment
                .predict(&model)
                .map_err(|source| FitError::Simulation {
                    id: experiment.id.clone(),
                    source,
                })?;
            let scale = w.sqrt();
            out.extend(
                experiment
                    .observed
                    .iter()
                    .zip(&predicted)
                    .map(|(o, p)| scale * (o - p)),
            );
        }
        Ok(DVector::from_vec(out))
    }

    fn run_levenberg_marquardt(
        &self,
        map: &ParameterMap,
        weights: &[f64],
        start: &[f64],
        method: &FitMethod,
    ) -> Result<SearchOutcome, FitError> {
        let residual_fn = |z: &DVector<f64>| match self.residuals(&map.to_physical(z), weights) {
            Ok(r) => Some(r),
            Err(e) => {
                debug!("candidate rejected: {}", e);
                None
            }
        };
        let z0 = map.to_internal(start);
        let project = |z: &mut DVector<f64>| map.project(z);
        let report = match minimize_projected(residual_fn, project, z0, &self.settings.lm) {
            Ok(report) => report,
            Err(LMError::InitialEvaluationFailed) => {
                // surface the experiment that broke the starting point
                let mut z = map.to_internal(start);
                map.project(&mut z);
                return match self.residuals(&map.to_physical(&z), weights) {
                    Err(e) => Err(e),
                    Ok(_) => Err(FitError::AllCandidatesFailed {
                        method: method.to_string(),
                        evaluations: 1,
                    }),
                };
            }
            Err(e) => return Err(e.into()),
        };
        if report.termination == Termination::BudgetExhausted {
            return Err(FitError::NotConverged {
                method: method.to_string(),
                iterations: report.iterations,
                evaluations: report.evaluations,
            });
        }
        Ok(SearchOutcome {
            physical: map.to_physical(&report.parameters),
            iterations: report.iterations,
            evaluations: report.evaluations,
            failed: report.failed_evaluations,
        })
    }

    fn run_differential_evolution(
        &self,
        map: &ParameterMap,
        weights: &[f64],
        warnings: &mut Vec<FitWarning>,
        method: &FitMethod,
    ) -> Result<SearchOutcome, FitError> {
        let bounds = map.global_bounds()?;
        let de = DifferentialEvolution::new(bounds, self.settings.de.clone())?;
        let failed = AtomicUsize::new(0);
        let report = de.minimize(|x| match self.residuals(&map.global_to_physical(x), weights) {
            Ok(r) => r.norm_squared(),
            Err(e) => {
                failed.fetch_add(1, Ordering::Relaxed);
                debug!("candidate rejected: {}", e);
                f64::INFINITY
            }
        });
        let failed = failed.into_inner();
        if failed >= report.evaluations || !report.best_energy.is_finite() {
            return Err(FitError::AllCandidatesFailed {
                method: method.to_string(),
                evaluations: report.evaluations,
            });
        }
        if !report.converged {
            FitWarning::GlobalSearchNotConverged {
                generations: report.generations,
            }
            .emit(warnings);
        }
        Ok(SearchOutcome {
            physical: map.global_to_physical(&report.best),
            iterations: report.generations,
            evaluations: report.evaluations,
            failed,
        })
    }

    fn summarize(
        &self,
        model: &KineticModel,
        weights: &[f64],
        outcome: &SearchOutcome,
        method: &FitMethod,
        warnings: Vec<FitWarning>,
    ) -> Result<FitResult, FitError> {
        let mut all_observed = Vec::new();
        let mut all_predicted = Vec::new();
        let mut summaries = Vec::with_capacity(self.experiments.len());
        let mut cost = 0.0;
        for (experiment, w) in self.experiments.iter().zip(weights) {
            let predicted = experiment
                .predict(model)
                .map_err(|source| FitError::Simulation {
                    id: experiment.id.clone(),
                    source,
                })?;
            let observed = &experiment.observed;
            let residual_sum: f64 = observed.iter().zip(&predicted).map(|(o, p)| o - p).sum();
            cost += w * observed
                .iter()
                .zip(&predicted)
                .map(|(o, p)| (o - p).powi(2))
                .sum::<f64>();
            summaries.push(ExperimentSummary {
                id: experiment.id.clone(),
                temperature: experiment.temperature,
                points: observed.len(),
                rmse: rmse(observed, &predicted),
                r_squared: r_squared(observed, &predicted),
                max_abs_residual: max_abs_residual(observed, &predicted),
                mape: mape(observed, &predicted),
                mean_residual: residual_sum / observed.len() as f64,
            });
            all_observed.extend_from_slice(observed);
            all_predicted.extend(predicted);
        }
        Ok(FitResult {
            parameters: model.parameters().clone(),
            parameter_names: self.parameters.iter().map(|p| p.name.clone()).collect(),
            parameter_values: outcome.physical.clone(),
            locked: self
                .parameters
                .iter()
                .filter(|p| !p.vary)
                .map(|p| p.name.clone())
                .collect(),
            r_squared: r_squared(&all_observed, &all_predicted),
            rmse: rmse(&all_observed, &all_predicted),
            mae: mae(&all_observed, &all_predicted),
            mape: mape(&all_observed, &all_predicted),
            cost,
            method: method.to_string(),
            iterations: outcome.iterations,
            evaluations: outcome.evaluations,
            failed_evaluations: outcome.failed,
            experiments: summaries,
            warnings,
        })
    }
}

/// free coordinate of the search vector
#[derive(Debug, Clone, Copy)]
enum Coordinate {
    /// ln A − Ea/(R·T_ref) of a pair whose Ea is the next coordinate
    LogRateAtReference { pair: usize },
    CoupledActivation { pair: usize },
    LogPreExponential { pair: usize },
    Activation { pair: usize },
}

/// Maps between the flat physical vector `[A_0, Ea_0, A_1, Ea_1, ...]` and the search coordinates.
struct ParameterMap {
    coordinates: Vec<Coordinate>,
    /// physical values, locked entries are taken from here
    base: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    /// 1/(R·T_ref)
    inv_rt: f64,
}

impl ParameterMap {
    fn new(parameters: &[FitParameter], t_ref_kelvin: f64, gas_constant: f64) -> Self {
        let mut coordinates = Vec::new();
        for (pair, chunk) in parameters.chunks(2).enumerate() {
            match (chunk[0].vary, chunk[1].vary) {
                (true, true) => {
                    coordinates.push(Coordinate::LogRateAtReference { pair });
                    coordinates.push(Coordinate::CoupledActivation { pair });
                }
                (true, false) => coordinates.push(Coordinate::LogPreExponential { pair }),
                (false, true) => coordinates.push(Coordinate::Activation { pair }),
                (false, false) => {}
            }
        }
        ParameterMap {
            coordinates,
            base: parameters.iter().map(|p| p.value).collect(),
            lower: parameters.iter().map(|p| p.min).collect(),
            upper: parameters.iter().map(|p| p.max).collect(),
            inv_rt: 1.0 / (gas_constant * t_ref_kelvin),
        }
    }

    fn to_internal(&self, physical: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            self.coordinates.len(),
            self.coordinates.iter().map(|c| match *c {
                Coordinate::LogRateAtReference { pair } => {
                    physical[2 * pair].ln() - physical[2 * pair + 1] * self.inv_rt
                }
                Coordinate::CoupledActivation { pair } | Coordinate::Activation { pair } => {
                    physical[2 * pair + 1]
                }
                Coordinate::LogPreExponential { pair } => physical[2 * pair].ln(),
            }),
        )
    }

    fn to_physical(&self, z: &DVector<f64>) -> Vec<f64> {
        let mut physical = self.base.clone();
        for (i, c) in self.coordinates.iter().enumerate() {
            match *c {
                Coordinate::LogRateAtReference { pair } => {
                    let ea = z[i + 1];
                    physical[2 * pair] = (z[i] + ea * self.inv_rt).exp();
                }
                Coordinate::CoupledActivation { pair } | Coordinate::Activation { pair } => {
                    physical[2 * pair + 1] = z[i];
                }
                Coordinate::LogPreExponential { pair } => physical[2 * pair] = z[i].exp(),
            }
        }
        physical
    }

    /// clamps Ea, then ln A, into their bounds
    fn project(&self, z: &mut DVector<f64>) {
        for i in 0..self.coordinates.len() {
            match self.coordinates[i] {
                Coordinate::LogRateAtReference { pair } => {
                    let ea = z[i + 1].clamp(self.lower[2 * pair + 1], self.upper[2 * pair + 1]);
                    let ln_a = (z[i] + ea * self.inv_rt)
                        .clamp(self.lower[2 * pair].ln(), self.upper[2 * pair].ln());
                    z[i] = ln_a - ea * self.inv_rt;
                    z[i + 1] = ea;
                }
                Coordinate::CoupledActivation { .. } => {}
                Coordinate::Activation { pair } => {
                    z[i] = z[i].clamp(self.lower[2 * pair + 1], self.upper[2 * pair + 1]);
                }
                Coordinate::LogPreExponential { pair } => {
                    z[i] = z[i].clamp(self.lower[2 * pair].ln(), self.upper[2 * pair].ln());
                }
            }
        }
    }

    /// free physical indices, in flat order
    fn free_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        for c in &self.coordinates {
            match *c {
                Coordinate::LogRateAtReference { pair } | Coordinate::LogPreExponential { pair } => {
                    indices.push(2 * pair)
                }
                Coordinate::CoupledActivation { pair } | Coordinate::Activation { pair } => {
                    indices.push(2 * pair + 1)
                }
            }
        }
        indices
    }

    /// `(ln A, Ea)` box of the global search
    fn global_bounds(&self) -> Result<Vec<(f64, f64)>, ConfigurationError> {
        self.free_indices()
            .into_iter()
            .map(|k| {
                let (lo, hi) = if k % 2 == 0 {
                    (self.lower[k].ln(), self.upper[k].ln())
                } else {
                    (self.lower[k], self.upper[k])
                };
                if lo.is_finite() && hi.is_finite() {
                    Ok((lo, hi))
                } else {
                    Err(ConfigurationError::InvalidBounds {
                        name: format!("parameter #{} (global search needs finite bounds)", k),
                        lower: self.lower[k],
                        upper: self.upper[k],
                    })
                }
            })
            .collect()
    }

    fn global_to_physical(&self, x: &[f64]) -> Vec<f64> {
        let mut physical = self.base.clone();
        for (value, k) in x.iter().zip(self.free_indices()) {
            physical[k] = if k % 2 == 0 { value.exp() } else { *value };
        }
        physical
    }
}
