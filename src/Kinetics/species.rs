//! Species of the transesterification system and initial-condition vectors.
//!
//! TG + 3 MeOH ⇌ 3 FAME + GL overall, or stepwise TG ⇌ DG ⇌ MG ⇌ GL, each step consuming
//! one methanol and releasing one methyl ester.
use crate::Kinetics::kinetic_errors::ConfigurationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
pub enum Species {
    /// triglyceride
    TG,
    /// diglyceride
    DG,
    /// monoglyceride
    MG,
    /// glycerol
    GL,
    /// methanol
    MeOH,
    /// fatty-acid methyl ester (biodiesel)
    FAME,
}

impl Species {
    pub fn name(&self) -> &'static str {
        match self {
            Species::TG => "TG",
            Species::DG => "DG",
            Species::MG => "MG",
            Species::GL => "GL",
            Species::MeOH => "MeOH",
            Species::FAME => "FAME",
        }
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            Species::TG => "triglyceride",
            Species::DG => "diglyceride",
            Species::MG => "monoglyceride",
            Species::GL => "glycerol",
            Species::MeOH => "methanol",
            Species::FAME => "methyl ester",
        }
    }

    /// glyceride-chain species: their sum is conserved by every mechanism
    pub fn is_glyceride(&self) -> bool {
        matches!(self, Species::TG | Species::DG | Species::MG | Species::GL)
    }

    /// Parses a species key as it appears in data files and task documents.
    /// Accepts the bare name ("TG", "meoh") and initial-concentration spellings
    /// such as "C_TG_0", "C_MeOH0" or "c_fame".
    pub fn parse_key(key: &str) -> Result<Species, ConfigurationError> {
        let re = Regex::new(r"(?i)^\s*(?:c_?)?(tg|dg|mg|gl|meoh|fame)(?:_?0)?\s*$")
            .map_err(|e| ConfigurationError::InvalidSettings(e.to_string()))?;
        let caps = re
            .captures(key)
            .ok_or_else(|| ConfigurationError::UnknownSpecies(key.to_string()))?;
        let bare = caps[1].to_lowercase();
        Species::iter()
            .find(|s| s.name().to_lowercase() == bare)
            .ok_or_else(|| ConfigurationError::UnknownSpecies(key.to_string()))
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Initial molar concentrations (mol/L) keyed by species. Species that are not listed are zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InitialConditions {
    concentrations: BTreeMap<Species, f64>,
}

impl InitialConditions {
    pub fn new() -> Self {
        InitialConditions {
            concentrations: BTreeMap::new(),
        }
    }

    /// TG and MeOH charged at the given molar ratio, no products
    pub fn from_molar_ratio(c_tg0: f64, molar_ratio: f64) -> Self {
        InitialConditions::new()
            .with(Species::TG, c_tg0)
            .with(Species::MeOH, molar_ratio * c_tg0)
    }

    /// builds the map from ingestion-style keys, see [`Species::parse_key`]
    pub fn from_named(values: &HashMap<String, f64>) -> Result<Self, ConfigurationError> {
        let mut ic = InitialConditions::new();
        for (key, value) in values {
            let species = Species::parse_key(key)?;
            ic.set(species, *value);
        }
        Ok(ic)
    }

    pub fn with(mut self, species: Species, concentration: f64) -> Self {
        self.set(species, concentration);
        self
    }

    pub fn set(&mut self, species: Species, concentration: f64) {
        self.concentrations.insert(species, concentration);
    }

    pub fn get(&self, species: Species) -> f64 {
        self.concentrations.get(&species).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Species, f64)> + '_ {
        self.concentrations.iter().map(|(s, c)| (*s, *c))
    }

    /// MeOH:TG molar ratio, `None` without triglyceride
    pub fn molar_ratio(&self) -> Option<f64> {
        let tg = self.get(Species::TG);
        if tg > 0.0 {
            Some(self.get(Species::MeOH) / tg)
        } else {
            None
        }
    }

    /// copy with methanol rescaled to `ratio · C_TG,0`
    pub fn with_molar_ratio(&self, ratio: f64) -> Self {
        let tg = self.get(Species::TG);
        self.clone().with(Species::MeOH, ratio * tg)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (species, value) in self.iter() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidConcentration { species, value });
            }
        }
        let tg = self.get(Species::TG);
        if tg <= 0.0 {
            return Err(ConfigurationError::MissingTriglyceride(tg));
        }
        Ok(())
    }

    /// largest initial concentration, used to scale absolute tolerances
    pub fn max_concentration(&self) -> f64 {
        self.concentrations.values().cloned().fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_species_keys() {
        assert_eq!(Species::parse_key("TG").unwrap(), Species::TG);
        assert_eq!(Species::parse_key("C_TG_0").unwrap(), Species::TG);
        assert_eq!(Species::parse_key("C_MeOH0").unwrap(), Species::MeOH);
        assert_eq!(Species::parse_key("fame").unwrap(), Species::FAME);
        assert_eq!(Species::parse_key(" c_gl ").unwrap(), Species::GL);
        assert!(matches!(
            Species::parse_key("ethanol"),
            Err(ConfigurationError::UnknownSpecies(_))
        ));
    }

    #[test]
    fn test_molar_ratio_rescaling() {
        let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
        assert_eq!(ic.molar_ratio(), Some(6.0));
        let ic9 = ic.with_molar_ratio(9.0);
        assert!((ic9.get(Species::MeOH) - 4.5).abs() < 1e-12);
        assert_eq!(ic9.get(Species::TG), 0.5);
        assert_eq!(ic9.get(Species::FAME), 0.0);
    }

    #[test]
    fn test_validation() {
        let ic = InitialConditions::new().with(Species::MeOH, 3.0);
        assert!(matches!(
            ic.validate(),
            Err(ConfigurationError::MissingTriglyceride(_))
        ));
        let ic = InitialConditions::from_molar_ratio(1.0, 6.0).with(Species::GL, -0.1);
        assert!(matches!(
            ic.validate(),
            Err(ConfigurationError::InvalidConcentration { .. })
        ));
        let mut named = HashMap::new();
        named.insert("C_TG_0".to_string(), 0.5);
        named.insert("C_MeOH_0".to_string(), 4.5);
        let ic = InitialConditions::from_named(&named).unwrap();
        assert!(ic.validate().is_ok());
        assert_eq!(ic.molar_ratio(), Some(9.0));
    }
}
