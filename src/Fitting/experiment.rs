//! Experimental time series used for calibration.
use crate::Kinetics::kinetic_errors::{ConfigurationError, KineticsError};
use crate::Kinetics::kinetic_model::KineticModel;
use crate::Kinetics::species::{InitialConditions, Species};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the observed values measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Observable {
    /// TG conversion in %
    #[default]
    ConversionPercent,
    /// concentration of one species in mol/L
    Concentration(Species),
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observable::ConversionPercent => write!(f, "X, %"),
            Observable::Concentration(s) => write!(f, "C_{}, mol/L", s),
        }
    }
}

fn unit_weight() -> f64 {
    1.0
}

/// One isothermal batch run: id, temperature (°C), initial charge and the sampled observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub temperature: f64,
    pub initial_conditions: InitialConditions,
    pub time: Vec<f64>,
    pub observed: Vec<f64>,
    #[serde(default)]
    pub observable: Observable,
    /// multiplies the squared residuals of this experiment
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

impl Experiment {
    pub fn new(
        id: impl Into<String>,
        time: Vec<f64>,
        observed: Vec<f64>,
        temperature: f64,
        initial_conditions: InitialConditions,
    ) -> Self {
        Experiment {
            id: id.into(),
            temperature,
            initial_conditions,
            time,
            observed,
            observable: Observable::ConversionPercent,
            weight: 1.0,
        }
    }

    pub fn with_observable(mut self, observable: Observable) -> Self {
        self.observable = observable;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Structural checks of the record. Emptiness is left to the fitter, which reports it separately.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidExperiment {
            id: self.id.clone(),
            reason,
        };
        if self.time.len() != self.observed.len() {
            return Err(invalid(format!(
                "{} time samples but {} observations",
                self.time.len(),
                self.observed.len()
            )));
        }
        if !self.temperature.is_finite() {
            return Err(invalid(format!("temperature = {}", self.temperature)));
        }
        if !(self.weight > 0.0 && self.weight.is_finite()) {
            return Err(invalid(format!("weight = {}", self.weight)));
        }
        if let Some(v) = self.observed.iter().find(|v| !v.is_finite()) {
            return Err(invalid(format!("observation {} is not finite", v)));
        }
        for (i, t) in self.time.iter().enumerate() {
            if !t.is_finite() || *t < 0.0 {
                return Err(invalid(format!("time sample {} = {}", i, t)));
            }
            if i > 0 && *t <= self.time[i - 1] {
                return Err(invalid(format!(
                    "time samples must be strictly increasing ({} after {})",
                    t,
                    self.time[i - 1]
                )));
            }
        }
        self.initial_conditions
            .validate()
            .map_err(|e| invalid(e.to_string()))
    }

    /// sample variance of the observations, zero for fewer than two samples
    pub fn observed_variance(&self) -> f64 {
        let n = self.observed.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.observed.iter().sum::<f64>() / n as f64;
        self.observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    }

    /// simulated observable at the sample times
    pub fn predict(&self, model: &KineticModel) -> Result<Vec<f64>, KineticsError> {
        let trajectory = model.simulate(&self.initial_conditions, &self.time, self.temperature)?;
        match self.observable {
            Observable::ConversionPercent => Ok(trajectory.conversion),
            Observable::Concentration(species) => trajectory.species_profile(species).ok_or_else(|| {
                ConfigurationError::InvalidExperiment {
                    id: self.id.clone(),
                    reason: format!("species {} is not tracked by the model", species),
                }
                .into()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kinetics::arrhenius::KineticParameters;
    use crate::Kinetics::kinetic_model::Reversibility;
    use crate::Kinetics::mechanisms::Mechanism;

    fn experiment() -> Experiment {
        Experiment::new(
            "run-1",
            vec![0.0, 10.0, 20.0],
            vec![0.0, 40.0, 60.0],
            50.0,
            InitialConditions::from_molar_ratio(0.5, 6.0),
        )
    }

    #[test]
    fn test_validation() {
        assert!(experiment().validate().is_ok());
        let mut e = experiment();
        e.observed.pop();
        assert!(matches!(
            e.validate(),
            Err(ConfigurationError::InvalidExperiment { .. })
        ));
        let mut e = experiment();
        e.time = vec![0.0, 10.0, 10.0];
        assert!(e.validate().is_err());
        let mut e = experiment();
        e.observed[1] = f64::NAN;
        assert!(e.validate().is_err());
        assert!(experiment().with_weight(0.0).validate().is_err());
    }

    #[test]
    fn test_variance() {
        let e = experiment();
        // mean 100/3
        let mean: f64 = 100.0 / 3.0;
        let expected = ((0.0 - mean).powi(2) + (40.0 - mean).powi(2) + (60.0 - mean).powi(2)) / 2.0;
        assert!((e.observed_variance() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_predict_observables() {
        let model = KineticModel::new(
            Mechanism::one_step_conversion(),
            Reversibility::Irreversible,
            KineticParameters::single(1e7, 50.0),
        )
        .unwrap();
        let conversion = experiment().predict(&model).unwrap();
        assert_eq!(conversion.len(), 3);
        assert_eq!(conversion[0], 0.0);
        let fame = experiment()
            .with_observable(Observable::Concentration(Species::FAME))
            .predict(&model)
            .unwrap();
        assert!((fame[2] - 3.0 * 0.5 * conversion[2] / 100.0).abs() < 1e-10);
        let dg = experiment()
            .with_observable(Observable::Concentration(Species::DG))
            .predict(&model);
        assert!(dg.is_err());
    }
}
