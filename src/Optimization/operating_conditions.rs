//! Process variables of the batch reactor and the constants of the operating-cost model.
use crate::Kinetics::kinetic_errors::ConfigurationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableBounds {
    pub lower: f64,
    pub upper: f64,
}

impl VariableBounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        VariableBounds { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    fn validate(&self, name: &str) -> Result<(), ConfigurationError> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower > self.upper {
            return Err(ConfigurationError::InvalidBounds {
                name: name.to_string(),
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }
}

/// A point of the operating space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    /// °C
    pub temperature: f64,
    /// stirrer speed, rpm
    pub agitation: f64,
    /// catalyst loading, wt%
    pub catalyst: f64,
    /// MeOH:TG
    pub molar_ratio: f64,
}

impl Default for OperatingPoint {
    fn default() -> Self {
        OperatingPoint {
            temperature: 60.0,
            agitation: 600.0,
            catalyst: 1.0,
            molar_ratio: 6.0,
        }
    }
}

impl OperatingPoint {
    /// from the search vector `[T, rpm, catalyst, ratio]`
    pub fn from_slice(x: &[f64]) -> Self {
        OperatingPoint {
            temperature: x[0],
            agitation: x[1],
            catalyst: x[2],
            molar_ratio: x[3],
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.temperature,
            self.agitation,
            self.catalyst,
            self.molar_ratio,
        ]
    }
}

/// Box of the operational search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingBounds {
    pub temperature: VariableBounds,
    pub agitation: VariableBounds,
    pub catalyst: VariableBounds,
    pub molar_ratio: VariableBounds,
}

impl Default for OperatingBounds {
    fn default() -> Self {
        OperatingBounds {
            temperature: VariableBounds::new(50.0, 70.0),
            agitation: VariableBounds::new(200.0, 800.0),
            catalyst: VariableBounds::new(0.5, 2.0),
            molar_ratio: VariableBounds::new(3.0, 12.0),
        }
    }
}

impl OperatingBounds {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.temperature.validate("temperature")?;
        self.agitation.validate("agitation")?;
        self.catalyst.validate("catalyst")?;
        self.molar_ratio.validate("molar_ratio")
    }

    /// `(lower, upper)` in search-vector order
    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        [
            self.temperature,
            self.agitation,
            self.catalyst,
            self.molar_ratio,
        ]
        .iter()
        .map(|b| (b.lower, b.upper))
        .collect()
    }

    pub fn contains(&self, point: &OperatingPoint) -> bool {
        self.temperature.contains(point.temperature)
            && self.agitation.contains(point.agitation)
            && self.catalyst.contains(point.catalyst)
            && self.molar_ratio.contains(point.molar_ratio)
    }
}

/// Weights of the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    pub conversion: f64,
    pub temperature: f64,
    pub methanol: f64,
    pub catalyst: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        ObjectiveWeights {
            conversion: 1.0,
            temperature: 0.3,
            methanol: 0.2,
            catalyst: 0.1,
        }
    }
}

impl ObjectiveWeights {
    pub fn new(conversion: f64, temperature: f64, methanol: f64, catalyst: f64) -> Self {
        ObjectiveWeights {
            conversion,
            temperature,
            methanol,
            catalyst,
        }
    }

    /// Named weight sets compared by the weight sensitivity study
    pub fn presets() -> Vec<(String, ObjectiveWeights)> {
        vec![
            ("base case".to_string(), ObjectiveWeights::default()),
            ("max conversion".to_string(), ObjectiveWeights::new(2.0, 0.1, 0.1, 0.1)),
            ("min costs".to_string(), ObjectiveWeights::new(1.0, 0.5, 0.4, 0.3)),
            ("balanced".to_string(), ObjectiveWeights::new(1.0, 1.0, 1.0, 1.0)),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let all = [self.conversion, self.temperature, self.methanol, self.catalyst];
        if all.iter().any(|w| !w.is_finite()) {
            return Err(ConfigurationError::InvalidSettings(format!(
                "objective weights must be finite: {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Operating levels that carry no extra cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostBaseline {
    pub temperature: f64,
    pub molar_ratio: f64,
    pub catalyst: f64,
}

impl Default for CostBaseline {
    fn default() -> Self {
        CostBaseline {
            temperature: 60.0,
            molar_ratio: 6.0,
            catalyst: 1.0,
        }
    }
}

/// Effect of mixing and catalyst loading on the rate constants:
/// `(rpm/rpm_ref)^exponent · (catalyst/catalyst_ref)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessScaling {
    pub reference_agitation: f64,
    pub agitation_exponent: f64,
    pub reference_catalyst: f64,
}

impl Default for ProcessScaling {
    fn default() -> Self {
        ProcessScaling {
            reference_agitation: 600.0,
            agitation_exponent: 0.5,
            reference_catalyst: 1.0,
        }
    }
}

impl ProcessScaling {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.reference_agitation > 0.0
            && self.reference_catalyst > 0.0
            && self.agitation_exponent.is_finite())
        {
            return Err(ConfigurationError::InvalidSettings(format!(
                "process scaling: {:?}",
                self
            )));
        }
        Ok(())
    }

    pub fn enhancement(&self, point: &OperatingPoint) -> f64 {
        (point.agitation / self.reference_agitation).powf(self.agitation_exponent)
            * (point.catalyst / self.reference_catalyst)
    }
}
