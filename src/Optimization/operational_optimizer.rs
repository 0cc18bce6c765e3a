//! Search of the operating space (temperature, agitation, catalyst loading, molar ratio) for the best
//! composite score, with the kinetic model as the forward oracle.
use crate::Kinetics::kinetic_errors::ConfigurationError;
use crate::Kinetics::kinetic_model::KineticModel;
use crate::Kinetics::mechanisms::ReactionScheme;
use crate::Kinetics::species::InitialConditions;
use crate::Numerical::differential_evolution::{DEError, DESettings, DifferentialEvolution};
use crate::Optimization::objective::{Evaluation, OperationalObjective, PENALTY_SENTINEL};
use crate::Optimization::operating_conditions::{
    CostBaseline, ObjectiveWeights, OperatingBounds, OperatingPoint, ProcessScaling,
};
use log::{info, warn};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizationMethod {
    #[default]
    DifferentialEvolution,
}

impl fmt::Display for OptimizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationMethod::DifferentialEvolution => write!(f, "differential evolution"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// `max_generations` is overridden by the `max_iterations` argument of `optimize`
    pub de: DESettings,
    pub scaling: ProcessScaling,
    pub baseline: CostBaseline,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Search(#[from] DEError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub point: OperatingPoint,
    /// %
    pub conversion: f64,
    pub score: f64,
    pub weights: ObjectiveWeights,
    /// false when no candidate could be simulated; the score is then `−PENALTY_SENTINEL`
    pub feasible: bool,
    pub method: String,
    pub generations: usize,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    pub converged: bool,
}

impl OptimizationResult {
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("temperature".to_string(), self.point.temperature);
        map.insert("agitation".to_string(), self.point.agitation);
        map.insert("catalyst".to_string(), self.point.catalyst);
        map.insert("molar_ratio".to_string(), self.point.molar_ratio);
        map.insert("conversion".to_string(), self.conversion);
        map.insert("score".to_string(), self.score);
        map.insert("w_conversion".to_string(), self.weights.conversion);
        map.insert("w_temperature".to_string(), self.weights.temperature);
        map.insert("w_methanol".to_string(), self.weights.methanol);
        map.insert("w_catalyst".to_string(), self.weights.catalyst);
        map.insert("feasible".to_string(), if self.feasible { 1.0 } else { 0.0 });
        map.insert("generations".to_string(), self.generations as f64);
        map.insert("evaluations".to_string(), self.evaluations as f64);
        map.insert(
            "failed_evaluations".to_string(),
            self.failed_evaluations as f64,
        );
        map
    }

    pub fn pretty_print(&self) {
        println!(
            "Optimization by {}: {} generations, {} evaluations ({} failed), converged: {}",
            self.method, self.generations, self.evaluations, self.failed_evaluations, self.converged
        );
        let mut table = Table::new();
        table.add_row(row!["Variable", "Optimum"]);
        table.add_row(row!["T, °C", format!("{:.2}", self.point.temperature)]);
        table.add_row(row!["agitation, rpm", format!("{:.0}", self.point.agitation)]);
        table.add_row(row!["catalyst, wt%", format!("{:.3}", self.point.catalyst)]);
        table.add_row(row!["MeOH:TG", format!("{:.2}", self.point.molar_ratio)]);
        table.add_row(row!["conversion, %", format!("{:.2}", self.conversion)]);
        table.add_row(row!["score", format!("{:.5}", self.score)]);
        table.printstd();
        if !self.feasible {
            println!("warning: no feasible operating point was found");
        }
    }
}

/// Optimum found for each named weight set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSensitivity {
    pub cases: Vec<(String, OptimizationResult)>,
}

impl WeightSensitivity {
    pub fn get(&self, name: &str) -> Option<&OptimizationResult> {
        self.cases.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(row![
            "Weights", "w_X", "w_T", "w_MeOH", "w_cat", "T, °C", "rpm", "cat, wt%", "MeOH:TG", "X, %", "score"
        ]);
        for (name, r) in &self.cases {
            let w = &r.weights;
            table.add_row(row![
                name,
                w.conversion,
                w.temperature,
                w.methanol,
                w.catalyst,
                format!("{:.2}", r.point.temperature),
                format!("{:.0}", r.point.agitation),
                format!("{:.3}", r.point.catalyst),
                format!("{:.2}", r.point.molar_ratio),
                format!("{:.2}", r.conversion),
                format!("{:.5}", r.score)
            ]);
        }
        table.printstd();
    }
}

pub struct OperationalOptimizer {
    model: KineticModel,
    pub settings: OptimizerSettings,
}

impl OperationalOptimizer {
    pub fn new(model: KineticModel) -> Self {
        OperationalOptimizer {
            model,
            settings: OptimizerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: OptimizerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn model(&self) -> &KineticModel {
        &self.model
    }

    fn objective<'a>(
        &'a self,
        initial_conditions: &'a InitialConditions,
        reaction_time: f64,
        bounds: &'a OperatingBounds,
        weights: &ObjectiveWeights,
    ) -> OperationalObjective<'a> {
        OperationalObjective {
            model: &self.model,
            initial_conditions,
            reaction_time,
            bounds,
            weights: *weights,
            baseline: self.settings.baseline,
            scaling: self.settings.scaling,
        }
    }

    fn check_inputs(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        bounds: &OperatingBounds,
        weights: &ObjectiveWeights,
    ) -> Result<(), ConfigurationError> {
        bounds.validate()?;
        weights.validate()?;
        self.settings.scaling.validate()?;
        initial_conditions.validate()?;
        if !(reaction_time.is_finite() && reaction_time > 0.0) {
            return Err(ConfigurationError::InvalidTimeGrid(format!(
                "reaction time = {}",
                reaction_time
            )));
        }
        Ok(())
    }

    /// Score of a single operating point.
    pub fn evaluate_point(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        bounds: &OperatingBounds,
        weights: &ObjectiveWeights,
        point: &OperatingPoint,
    ) -> Result<Evaluation, OptimizationError> {
        self.check_inputs(initial_conditions, reaction_time, bounds, weights)?;
        Ok(self
            .objective(initial_conditions, reaction_time, bounds, weights)
            .evaluate(point))
    }

    /// Maximizes the composite score inside `bounds` within `max_iterations` generations.
    /// Candidates that cannot be simulated get the penalty sentinel and the search goes on;
    /// only invalid inputs are errors.
    pub fn optimize(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        bounds: &OperatingBounds,
        weights: &ObjectiveWeights,
        method: OptimizationMethod,
        max_iterations: usize,
    ) -> Result<OptimizationResult, OptimizationError> {
        self.check_inputs(initial_conditions, reaction_time, bounds, weights)?;
        let objective = self.objective(initial_conditions, reaction_time, bounds, weights);
        info!(
            "optimizing {} operating point by {}, reaction time {} min, at most {} generations",
            self.model.mechanism().name(),
            method,
            reaction_time,
            max_iterations
        );
        let (report, failed_evaluations) = match method {
            OptimizationMethod::DifferentialEvolution => {
                let settings = DESettings {
                    max_generations: max_iterations,
                    ..self.settings.de.clone()
                };
                let de = DifferentialEvolution::new(bounds.to_vec(), settings)?;
                let failed = AtomicUsize::new(0);
                let report = de.minimize(|x| {
                    let evaluation = objective.evaluate(&OperatingPoint::from_slice(x));
                    if !evaluation.is_feasible() {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                    evaluation.minimization_value()
                });
                (report, failed.into_inner())
            }
        };
        let point = OperatingPoint::from_slice(&report.best);
        let (conversion, score, feasible) = match objective.evaluate(&point) {
            Evaluation::Feasible { conversion, score } => (conversion, score, true),
            Evaluation::Infeasible { reason } => {
                warn!(
                    "no feasible operating point among {} candidates, last failure: {}",
                    report.evaluations, reason
                );
                (0.0, -PENALTY_SENTINEL, false)
            }
        };
        let result = OptimizationResult {
            point,
            conversion,
            score,
            weights: *weights,
            feasible,
            method: method.to_string(),
            generations: report.generations,
            evaluations: report.evaluations,
            failed_evaluations,
            converged: report.converged,
        };
        info!(
            "best point: T = {:.2} °C, {:.0} rpm, {:.3} wt% catalyst, ratio {:.2}: X = {:.2} %, score = {:.5}",
            point.temperature,
            point.agitation,
            point.catalyst,
            point.molar_ratio,
            conversion,
            score
        );
        Ok(result)
    }

    /// Re-optimizes the operating point for every `(name, weights)` case, e.g. [`ObjectiveWeights::presets`].
    pub fn weight_sensitivity(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        bounds: &OperatingBounds,
        cases: &[(String, ObjectiveWeights)],
        max_iterations: usize,
    ) -> Result<WeightSensitivity, OptimizationError> {
        let mut results = Vec::with_capacity(cases.len());
        for (name, weights) in cases {
            info!("weight case '{}': {:?}", name, weights);
            let result = self.optimize(
                initial_conditions,
                reaction_time,
                bounds,
                weights,
                OptimizationMethod::DifferentialEvolution,
                max_iterations,
            )?;
            results.push((name.clone(), result));
        }
        Ok(WeightSensitivity { cases: results })
    }
}
