//! Error types of the kinetic layer.
//!
//! Two families are kept apart:
//! - [`ConfigurationError`] is raised eagerly, before any integration work starts
//!   (wrong number of Arrhenius pairs, bad time grid, species the mechanism does not track, invalid bounds).
//! - [`IntegrationError`] is raised while (or right after) the ODE system is integrated.
//!
//! [`KineticsError`] wraps both and is what `KineticModel::simulate` returns.
use crate::Kinetics::species::Species;
use crate::Numerical::stiff_ivp::IvpError;
use thiserror::Error;

#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("mechanism '{mechanism}' expects {expected} Arrhenius pairs, got {found}")]
    ParameterCount {
        mechanism: String,
        expected: String,
        found: usize,
    },
    #[error("Arrhenius pair {index} is invalid: A = {A}, Ea = {Ea}")]
    InvalidArrheniusPair { index: usize, A: f64, Ea: f64 },
    #[error("mechanism '{mechanism}' cannot be used in reversible mode")]
    ReversibilityNotSupported { mechanism: String },
    #[error("mechanism '{mechanism}' does not track species {species}, but its initial concentration is {value}")]
    UntrackedSpecies {
        mechanism: String,
        species: Species,
        value: f64,
    },
    #[error("initial concentration of {species} is invalid: {value}")]
    InvalidConcentration { species: Species, value: f64 },
    #[error("initial TG concentration must be positive to define conversion, got {0}")]
    MissingTriglyceride(f64),
    #[error("unknown species name '{0}'")]
    UnknownSpecies(String),
    #[error("invalid time grid: {0}")]
    InvalidTimeGrid(String),
    #[error("invalid temperature: {0} °C")]
    InvalidTemperature(f64),
    #[error("invalid rate enhancement factor: {0}")]
    InvalidEnhancement(f64),
    #[error("invalid bounds for '{name}': [{lower}, {upper}]")]
    InvalidBounds { name: String, lower: f64, upper: f64 },
    #[error("invalid reaction order '{name}': {value}")]
    InvalidReactionOrder { name: String, value: f64 },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("experiment '{id}': {reason}")]
    InvalidExperiment { id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("{method} solver returned no solution")]
    NoSolution { method: String },
    #[error("integration stopped at t = {reached} before t = {t_end}")]
    Incomplete { reached: f64, t_end: f64 },
    #[error("non-finite state at t = {t}")]
    NonFiniteState { t: f64 },
    #[error("rate constant of step '{step}' is not finite at {temperature} °C")]
    NonFiniteRateConstant { step: String, temperature: f64 },
    #[error("concentration of {species} became negative ({value:e}) at t = {t}")]
    NegativeConcentration { species: Species, t: f64, value: f64 },
    #[error("solver failure: {0}")]
    Solver(String),
}

impl From<IvpError> for IntegrationError {
    fn from(err: IvpError) -> Self {
        match err {
            IvpError::NoSolution { method } => IntegrationError::NoSolution {
                method: method.to_string(),
            },
            IvpError::Incomplete { reached, t_end } => IntegrationError::Incomplete { reached, t_end },
            IvpError::NonFiniteState { t } => IntegrationError::NonFiniteState { t },
            other => IntegrationError::Solver(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KineticsError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
}
