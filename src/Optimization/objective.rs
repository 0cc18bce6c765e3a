//! Composite score of an operating point
//! ```text
//! score = w_X·X/100 − w_T·c_T − w_MeOH·c_MeOH − w_cat·c_cat,
//! c_v   = max(0, (v − baseline_v)/(upper_v − baseline_v))
//! ```
//! with the conversion X obtained by simulating the batch at the point.
use crate::Kinetics::kinetic_errors::KineticsError;
use crate::Kinetics::kinetic_model::KineticModel;
use crate::Kinetics::species::InitialConditions;
use crate::Optimization::operating_conditions::{
    CostBaseline, ObjectiveWeights, OperatingBounds, OperatingPoint, ProcessScaling,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// minimization value of a candidate that could not be evaluated
pub const PENALTY_SENTINEL: f64 = 1e10;

/// `(value − baseline)/(upper − baseline)` clamped below at 0; zero when `upper ≤ baseline`
pub fn normalized_cost(value: f64, baseline: f64, upper: f64) -> f64 {
    if upper <= baseline {
        return 0.0;
    }
    ((value - baseline) / (upper - baseline)).max(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Evaluation {
    Feasible { conversion: f64, score: f64 },
    Infeasible { reason: String },
}

impl Evaluation {
    /// `−score`, or [`PENALTY_SENTINEL`]
    pub fn minimization_value(&self) -> f64 {
        match self {
            Evaluation::Feasible { score, .. } => -score,
            Evaluation::Infeasible { .. } => PENALTY_SENTINEL,
        }
    }

    pub fn is_feasible(&self) -> bool {
        matches!(self, Evaluation::Feasible { .. })
    }
}

/// final conversion (%) of the batch run at `point`: MeOH rescaled to the point's molar ratio and
/// rate constants multiplied by the process enhancement
pub fn conversion_at(
    model: &KineticModel,
    initial_conditions: &InitialConditions,
    reaction_time: f64,
    scaling: &ProcessScaling,
    point: &OperatingPoint,
) -> Result<f64, KineticsError> {
    let ic = initial_conditions.with_molar_ratio(point.molar_ratio);
    model.final_conversion(
        &ic,
        reaction_time,
        point.temperature,
        scaling.enhancement(point),
    )
}

pub struct OperationalObjective<'a> {
    pub model: &'a KineticModel,
    pub initial_conditions: &'a InitialConditions,
    /// min
    pub reaction_time: f64,
    pub bounds: &'a OperatingBounds,
    pub weights: ObjectiveWeights,
    pub baseline: CostBaseline,
    pub scaling: ProcessScaling,
}

impl OperationalObjective<'_> {
    pub fn score(&self, point: &OperatingPoint, conversion: f64) -> f64 {
        let w = &self.weights;
        let b = &self.baseline;
        let cost_t = normalized_cost(point.temperature, b.temperature, self.bounds.temperature.upper);
        let cost_meoh =
            normalized_cost(point.molar_ratio, b.molar_ratio, self.bounds.molar_ratio.upper);
        let cost_cat = normalized_cost(point.catalyst, b.catalyst, self.bounds.catalyst.upper);
        w.conversion * conversion / 100.0
            - w.temperature * cost_t
            - w.methanol * cost_meoh
            - w.catalyst * cost_cat
    }

    pub fn evaluate(&self, point: &OperatingPoint) -> Evaluation {
        let conversion = match conversion_at(
            self.model,
            self.initial_conditions,
            self.reaction_time,
            &self.scaling,
            point,
        ) {
            Ok(x) => x,
            Err(e) => {
                debug!("candidate {:?} is infeasible: {}", point, e);
                return Evaluation::Infeasible {
                    reason: e.to_string(),
                };
            }
        };
        let score = self.score(point, conversion);
        if !conversion.is_finite() || !score.is_finite() {
            debug!("candidate {:?} gave a non-finite score", point);
            return Evaluation::Infeasible {
                reason: format!("conversion = {}, score = {}", conversion, score),
            };
        }
        Evaluation::Feasible { conversion, score }
    }
}
