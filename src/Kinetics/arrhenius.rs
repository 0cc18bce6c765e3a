//! Arrhenius rate law and the kinetic parameter sets of the mechanisms.
//!
//! k = A·exp(−Ea/(R·T_K)),   T_K = T_C + 273.15,   R = 8.314·10⁻³ kJ/(mol·K)
//!
//! Temperatures enter in °C, activation energies in kJ/mol. The time unit of `A`
//! (min⁻¹ for the usual laboratory data) is the time unit of every simulation.
use crate::Kinetics::kinetic_errors::ConfigurationError;
use serde::{Deserialize, Serialize};

/// universal gas constant, kJ/(mol·K)
pub const R_G: f64 = 8.314e-3;
pub const ZERO_CELSIUS: f64 = 273.15;

/// Rate constant at `T_C` °C with the default gas constant.
/// Returns a non-finite value when the absolute temperature is not positive.
#[allow(non_snake_case)]
pub fn arrhenius(T_C: f64, A: f64, Ea: f64) -> f64 {
    arrhenius_with_gas_constant(T_C, A, Ea, R_G)
}

#[allow(non_snake_case)]
pub fn arrhenius_with_gas_constant(T_C: f64, A: f64, Ea: f64, R: f64) -> f64 {
    let T_K = T_C + ZERO_CELSIUS;
    if !(T_K > 0.0) {
        return f64::NAN;
    }
    A * (-Ea / (R * T_K)).exp()
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrheniusPair {
    /// pre-exponential factor, same units as the rate constant
    pub A: f64,
    /// activation energy, kJ/mol
    pub Ea: f64,
}

#[allow(non_snake_case)]
impl ArrheniusPair {
    pub fn new(A: f64, Ea: f64) -> Self {
        ArrheniusPair { A, Ea }
    }
    /// pair reproducing the rate constant `k` at `T_C` with activation energy `Ea`
    pub fn from_rate_at(k: f64, Ea: f64, T_C: f64, R: f64) -> Self {
        let T_K = T_C + ZERO_CELSIUS;
        ArrheniusPair {
            A: k * (Ea / (R * T_K)).exp(),
            Ea,
        }
    }
    pub fn rate_constant(&self, T_C: f64, R: f64) -> f64 {
        arrhenius_with_gas_constant(T_C, self.A, self.Ea, R)
    }
    fn is_valid(&self) -> bool {
        self.A.is_finite() && self.A >= 0.0 && self.Ea.is_finite()
    }
}

/// One Arrhenius pair per rate constant: forward steps first, reverse steps (if any) second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KineticParameters {
    pub forward: Vec<ArrheniusPair>,
    #[serde(default)]
    pub reverse: Vec<ArrheniusPair>,
}

impl KineticParameters {
    pub fn irreversible(forward: Vec<ArrheniusPair>) -> Self {
        KineticParameters {
            forward,
            reverse: Vec::new(),
        }
    }
    pub fn reversible(forward: Vec<ArrheniusPair>, reverse: Vec<ArrheniusPair>) -> Self {
        KineticParameters { forward, reverse }
    }
    /// 1-step irreversible shortcut
    #[allow(non_snake_case)]
    pub fn single(A: f64, Ea: f64) -> Self {
        KineticParameters::irreversible(vec![ArrheniusPair::new(A, Ea)])
    }
    pub fn pair_count(&self) -> usize {
        self.forward.len() + self.reverse.len()
    }
    pub fn is_reversible(&self) -> bool {
        !self.reverse.is_empty()
    }
    /// all pairs, forward first
    pub fn pairs(&self) -> impl Iterator<Item = &ArrheniusPair> {
        self.forward.iter().chain(self.reverse.iter())
    }
    /// flat `[A_1, Ea_1, A_2, Ea_2, ...]` in pair order
    pub fn to_flat(&self) -> Vec<f64> {
        self.pairs().flat_map(|p| [p.A, p.Ea]).collect()
    }
    /// inverse of [`to_flat`](Self::to_flat) keeping this set's forward/reverse layout
    pub fn with_flat(&self, flat: &[f64]) -> Result<Self, ConfigurationError> {
        if flat.len() != 2 * self.pair_count() {
            return Err(ConfigurationError::ParameterCount {
                mechanism: "flat parameter vector".to_string(),
                expected: format!("{}", self.pair_count()),
                found: flat.len() / 2,
            });
        }
        let mut pairs = flat
            .chunks(2)
            .map(|c| ArrheniusPair::new(c[0], c[1]))
            .collect::<Vec<_>>();
        let reverse = pairs.split_off(self.forward.len());
        Ok(KineticParameters {
            forward: pairs,
            reverse,
        })
    }
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (index, pair) in self.pairs().enumerate() {
            if !pair.is_valid() {
                return Err(ConfigurationError::InvalidArrheniusPair {
                    index,
                    A: pair.A,
                    Ea: pair.Ea,
                });
            }
        }
        Ok(())
    }
}

/// Rate constants of up to three elementary steps at one temperature.
/// Reverse constants are zero for irreversible models. `methanol_excess` is the
/// MeOH:TG ratio divided by 3 and is used only by the scalar conversion form.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateContext {
    pub forward: [f64; 3],
    pub reverse: [f64; 3],
    pub methanol_excess: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_arrhenius_reference_value() {
        // 65 °C, A = 2.98e10 1/min, Ea = 51.9 kJ/mol
        let k = arrhenius(65.0, 2.98e10, 51.9);
        let expected = 2.98e10 * (-51.9 / (8.314e-3 * 338.15_f64)).exp();
        assert_relative_eq!(k, expected, max_relative = 1e-12);
        assert!(k > 280.0 && k < 295.0);
    }

    #[test]
    fn test_arrhenius_invalid_temperature() {
        assert!(!arrhenius(-273.15, 1e5, 40.0).is_finite());
        assert!(!arrhenius(-300.0, 1e5, 40.0).is_finite());
        assert!(arrhenius(-273.0, 1e5, 40.0).is_finite());
    }

    #[test]
    fn test_arrhenius_monotone_in_temperature() {
        let k1 = arrhenius(40.0, 1e7, 50.0);
        let k2 = arrhenius(60.0, 1e7, 50.0);
        assert!(k2 > k1);
        // zero activation energy gives a temperature independent constant
        assert_relative_eq!(arrhenius(10.0, 3.0, 0.0), 3.0);
    }

    #[test]
    fn test_from_rate_at_roundtrip() {
        let pair = ArrheniusPair::from_rate_at(0.05, 55.0, 50.0, R_G);
        assert_relative_eq!(pair.rate_constant(50.0, R_G), 0.05, max_relative = 1e-12);
    }

    #[test]
    fn test_flat_layout() {
        let p = KineticParameters::reversible(
            vec![ArrheniusPair::new(1.0, 10.0)],
            vec![ArrheniusPair::new(2.0, 20.0)],
        );
        assert_eq!(p.to_flat(), vec![1.0, 10.0, 2.0, 20.0]);
        let q = p.with_flat(&[3.0, 30.0, 4.0, 40.0]).unwrap();
        assert_eq!(q.forward[0], ArrheniusPair::new(3.0, 30.0));
        assert_eq!(q.reverse[0], ArrheniusPair::new(4.0, 40.0));
        assert!(p.with_flat(&[1.0, 2.0]).is_err());
        let bad = KineticParameters::single(-1.0, 10.0);
        assert!(bad.validate().is_err());
    }
}
