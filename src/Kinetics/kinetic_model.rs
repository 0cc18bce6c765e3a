//! # Kinetic model of the transesterification
//!
//! [`KineticModel`] binds a [`Mechanism`], a [`Reversibility`] and one Arrhenius pair per rate constant.
//! The mechanism and reversibility are chosen once, in [`KineticModel::new`]; the stoichiometric matrix and
//! state layout are fixed at that point. Parameters may be replaced between runs with
//! [`KineticModel::set_parameters`], previously returned trajectories are never touched.
//!
//! ## Simulation
//! `simulate(initial_conditions, times, temperature)`:
//! 1. checks inputs eagerly (time grid, temperature, species tracked by the mechanism, TG > 0)
//! 2. evaluates every rate constant at the temperature (°C) with the model's gas constant
//! 3. integrates `dy/dt = S·r(y)` from t = 0 to the last requested time with RustedSciThe's stiff solver,
//!    the right-hand side given symbolically with the rate constants substituted
//! 4. samples the state at every requested time (cubic Hermite on the solver mesh) and reports
//!    concentrations and conversion
//!    `X = (C_TG,0 − C_TG)/C_TG,0 · 100 %`
//!
//! A concentration below `−negativity_tolerance·max(1, max C0)` is an [`IntegrationError`]; smaller
//! negative round-off is clipped to zero.
//!
//! ## Example
//! ```
//! use TransEsterKin::Kinetics::arrhenius::KineticParameters;
//! use TransEsterKin::Kinetics::kinetic_model::{KineticModel, Reversibility};
//! use TransEsterKin::Kinetics::mechanisms::Mechanism;
//! use TransEsterKin::Kinetics::species::InitialConditions;
//! let model = KineticModel::new(
//!     Mechanism::one_step_conversion(),
//!     Reversibility::Irreversible,
//!     KineticParameters::single(2.98e10, 51.9),
//! ).unwrap();
//! let ic = InitialConditions::from_molar_ratio(0.5, 9.0);
//! let trajectory = model.simulate(&ic, &[0.0, 30.0, 60.0, 120.0], 65.0).unwrap();
//! assert!(trajectory.final_conversion() > 95.0);
//! ```
use crate::Kinetics::arrhenius::{KineticParameters, R_G, RateContext};
use crate::Kinetics::kinetic_errors::{ConfigurationError, IntegrationError, KineticsError};
use crate::Kinetics::mechanisms::{Mechanism, ReactionScheme};
use crate::Kinetics::species::{InitialConditions, Species};
use crate::Kinetics::symbolic_rates::rhs_with_constants;
use crate::Numerical::stiff_ivp::{IvpSettings, IvpStats, integrate, sample_hermite};
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reversibility {
    Irreversible,
    Reversible,
}

impl Reversibility {
    pub fn is_reversible(&self) -> bool {
        matches!(self, Reversibility::Reversible)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// kJ/(mol·K)
    pub gas_constant: f64,
    pub solver: IvpSettings,
    /// relative to max(1, largest initial concentration)
    pub negativity_tolerance: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            gas_constant: R_G,
            solver: IvpSettings::default(),
            negativity_tolerance: 1e-8,
        }
    }
}

impl ModelSettings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.gas_constant > 0.0 && self.gas_constant.is_finite()) {
            return Err(ConfigurationError::InvalidSettings(format!(
                "gas constant = {}",
                self.gas_constant
            )));
        }
        if !(self.negativity_tolerance >= 0.0) {
            return Err(ConfigurationError::InvalidSettings(format!(
                "negativity tolerance = {}",
                self.negativity_tolerance
            )));
        }
        self.solver
            .validate()
            .map_err(|e| ConfigurationError::InvalidSettings(e.to_string()))
    }
}

/// Concentration/conversion history sampled at the requested times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    /// °C
    pub temperature: f64,
    pub time: Vec<f64>,
    /// column order of `concentrations`
    pub species: Vec<Species>,
    /// one row per time point, mol/L
    pub concentrations: Vec<Vec<f64>>,
    /// TG conversion, %
    pub conversion: Vec<f64>,
    pub stats: IvpStats,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn final_conversion(&self) -> f64 {
        self.conversion.last().copied().unwrap_or(0.0)
    }
    /// concentration history of one species, `None` when the mechanism does not track it
    pub fn species_profile(&self, species: Species) -> Option<Vec<f64>> {
        let column = self.species.iter().position(|s| *s == species)?;
        Some(self.concentrations.iter().map(|row| row[column]).collect())
    }
    pub fn concentration_at(&self, index: usize, species: Species) -> Option<f64> {
        let column = self.species.iter().position(|s| *s == species)?;
        self.concentrations.get(index).map(|row| row[column])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KineticModel {
    mechanism: Mechanism,
    reversibility: Reversibility,
    parameters: KineticParameters,
    settings: ModelSettings,
    stoichiometry: DMatrix<f64>,
}

impl KineticModel {
    pub fn new(
        mechanism: Mechanism,
        reversibility: Reversibility,
        parameters: KineticParameters,
    ) -> Result<Self, ConfigurationError> {
        if reversibility.is_reversible() && !mechanism.supports_reversible() {
            return Err(ConfigurationError::ReversibilityNotSupported {
                mechanism: mechanism.name(),
            });
        }
        let stoichiometry = mechanism.stoichiometry();
        let model = KineticModel {
            mechanism,
            reversibility,
            parameters,
            settings: ModelSettings::default(),
            stoichiometry,
        };
        model.check_parameters(&model.parameters)?;
        info!(
            "kinetic model created: {} ({:?}), {} Arrhenius pairs",
            model.mechanism.name(),
            model.reversibility,
            model.parameters.pair_count()
        );
        Ok(model)
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        self.settings = settings;
        Ok(self)
    }

    pub fn mechanism(&self) -> &Mechanism {
        &self.mechanism
    }
    pub fn reversibility(&self) -> Reversibility {
        self.reversibility
    }
    pub fn parameters(&self) -> &KineticParameters {
        &self.parameters
    }
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }
    pub fn gas_constant(&self) -> f64 {
        self.settings.gas_constant
    }

    /// Replaces the Arrhenius pairs used by subsequent simulations.
    pub fn set_parameters(&mut self, parameters: KineticParameters) -> Result<(), ConfigurationError> {
        self.check_parameters(&parameters)?;
        self.parameters = parameters;
        Ok(())
    }

    /// copy of the model with other parameters
    pub fn with_parameters(&self, parameters: KineticParameters) -> Result<Self, ConfigurationError> {
        let mut model = self.clone();
        model.set_parameters(parameters)?;
        Ok(model)
    }

    fn check_parameters(&self, parameters: &KineticParameters) -> Result<(), ConfigurationError> {
        let steps = self.mechanism.step_count();
        let expected_reverse = if self.reversibility.is_reversible() {
            steps
        } else {
            0
        };
        if parameters.forward.len() != steps || parameters.reverse.len() != expected_reverse {
            return Err(ConfigurationError::ParameterCount {
                mechanism: format!("{} ({:?})", self.mechanism.name(), self.reversibility),
                expected: format!("{} forward + {} reverse", steps, expected_reverse),
                found: parameters.pair_count(),
            });
        }
        parameters.validate()
    }

    /// labels of the rate constants in parameter order
    pub fn step_labels(&self) -> Vec<String> {
        self.mechanism
            .step_labels(self.reversibility.is_reversible())
    }

    /// `A_<step>` and `Ea_<step>` for every Arrhenius pair, in flat parameter order
    pub fn parameter_names(&self) -> Vec<String> {
        self.step_labels()
            .iter()
            .flat_map(|label| [format!("A_{}", label), format!("Ea_{}", label)])
            .collect()
    }

    /// Rate constants at `temperature` °C multiplied by `enhancement`.
    pub fn rate_context(
        &self,
        temperature: f64,
        enhancement: f64,
        initial_conditions: &InitialConditions,
    ) -> Result<RateContext, IntegrationError> {
        let labels = self.step_labels();
        let r = self.settings.gas_constant;
        let mut ctx = RateContext::default();
        for (i, pair) in self.parameters.forward.iter().enumerate() {
            ctx.forward[i] = pair.rate_constant(temperature, r) * enhancement;
        }
        for (i, pair) in self.parameters.reverse.iter().enumerate() {
            ctx.reverse[i] = pair.rate_constant(temperature, r) * enhancement;
        }
        let all = ctx.forward[..self.parameters.forward.len()]
            .iter()
            .chain(ctx.reverse[..self.parameters.reverse.len()].iter());
        for (label, k) in labels.iter().zip(all) {
            if !k.is_finite() {
                return Err(IntegrationError::NonFiniteRateConstant {
                    step: label.clone(),
                    temperature,
                });
            }
        }
        ctx.methanol_excess = initial_conditions.molar_ratio().unwrap_or(0.0) / 3.0;
        Ok(ctx)
    }

    pub fn simulate(
        &self,
        initial_conditions: &InitialConditions,
        times: &[f64],
        temperature: f64,
    ) -> Result<Trajectory, KineticsError> {
        self.simulate_enhanced(initial_conditions, times, temperature, 1.0)
    }

    /// Like [`simulate`](Self::simulate) with every rate constant multiplied by `enhancement`
    /// (catalyst loading and mixing effects).
    pub fn simulate_enhanced(
        &self,
        initial_conditions: &InitialConditions,
        times: &[f64],
        temperature: f64,
        enhancement: f64,
    ) -> Result<Trajectory, KineticsError> {
        self.check_inputs(initial_conditions, times, temperature, enhancement)?;
        let species = self.mechanism.tracked_species();
        let c0: Vec<f64> = species.iter().map(|s| initial_conditions.get(*s)).collect();
        let ctx = self.rate_context(temperature, enhancement, initial_conditions)?;
        debug!(
            "simulating {} at {} °C, k_forward = {:?}, k_reverse = {:?}",
            self.mechanism.name(),
            temperature,
            ctx.forward,
            ctx.reverse
        );

        let system = KineticSystem {
            mechanism: &self.mechanism,
            stoichiometry: &self.stoichiometry,
            ctx,
        };
        let y0 = DVector::from_vec(self.mechanism.initial_state(&c0));
        let t_end = times.last().copied().unwrap_or(0.0);
        let (states, stats) = if t_end > 0.0 {
            let (unknowns, equations): (Vec<String>, Vec<_>) =
                rhs_with_constants(&self.mechanism, self.reversibility.is_reversible(), &system.ctx)
                    .into_iter()
                    .unzip();
            let solution = integrate(equations, unknowns, "t", &y0, t_end, &self.settings.solver)
                .map_err(IntegrationError::from)?;
            let states = sample_hermite(&solution, times, |y| system.rhs(y));
            (states, solution.stats)
        } else {
            let stats = IvpStats {
                method: self.settings.solver.method,
                mesh_points: 1,
                ..IvpStats::default()
            };
            (vec![y0; times.len()], stats)
        };

        let tolerance =
            self.settings.negativity_tolerance * initial_conditions.max_concentration().max(1.0);
        let tg_column = species.iter().position(|s| *s == Species::TG).unwrap_or(0);
        let c_tg0 = c0[tg_column];
        let mut concentrations = Vec::with_capacity(states.len());
        let mut conversion = Vec::with_capacity(states.len());
        for (t, state) in times.iter().zip(states.iter()) {
            let mut row = vec![0.0; species.len()];
            self.mechanism
                .concentrations(state.as_slice(), &c0, &mut row);
            for (s, value) in species.iter().zip(row.iter_mut()) {
                if !value.is_finite() {
                    return Err(IntegrationError::NonFiniteState { t: *t }.into());
                }
                if *value < -tolerance {
                    return Err(IntegrationError::NegativeConcentration {
                        species: *s,
                        t: *t,
                        value: *value,
                    }
                    .into());
                }
                *value = value.max(0.0);
            }
            conversion.push((c_tg0 - row[tg_column]) / c_tg0 * 100.0);
            concentrations.push(row);
        }
        Ok(Trajectory {
            temperature,
            time: times.to_vec(),
            species: species.to_vec(),
            concentrations,
            conversion,
            stats,
        })
    }

    /// conversion (%) reached after `reaction_time`
    pub fn final_conversion(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        temperature: f64,
        enhancement: f64,
    ) -> Result<f64, KineticsError> {
        let trajectory = self.simulate_enhanced(
            initial_conditions,
            &[0.0, reaction_time],
            temperature,
            enhancement,
        )?;
        Ok(trajectory.final_conversion())
    }

    fn check_inputs(
        &self,
        initial_conditions: &InitialConditions,
        times: &[f64],
        temperature: f64,
        enhancement: f64,
    ) -> Result<(), ConfigurationError> {
        if times.is_empty() {
            return Err(ConfigurationError::InvalidTimeGrid(
                "no output times".to_string(),
            ));
        }
        let mut previous = 0.0;
        for &t in times {
            if !t.is_finite() || t < previous {
                return Err(ConfigurationError::InvalidTimeGrid(format!(
                    "times must be finite, non-negative and non-decreasing, found {} after {}",
                    t, previous
                )));
            }
            previous = t;
        }
        if !temperature.is_finite() {
            return Err(ConfigurationError::InvalidTemperature(temperature));
        }
        if !(enhancement.is_finite() && enhancement >= 0.0) {
            return Err(ConfigurationError::InvalidEnhancement(enhancement));
        }
        initial_conditions.validate()?;
        let tracked = self.mechanism.tracked_species();
        for (species, value) in initial_conditions.iter() {
            if value != 0.0 && !tracked.contains(&species) {
                return Err(ConfigurationError::UntrackedSpecies {
                    mechanism: self.mechanism.name(),
                    species,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// `dy/dt = S·r(y)` at fixed rate constants
struct KineticSystem<'a> {
    mechanism: &'a Mechanism,
    stoichiometry: &'a DMatrix<f64>,
    ctx: RateContext,
}

impl KineticSystem<'_> {
    fn rhs(&self, y: &DVector<f64>) -> DVector<f64> {
        let steps = self.stoichiometry.ncols();
        let mut r = [0.0; 3];
        self.mechanism.rates(y.as_slice(), &self.ctx, &mut r[..steps]);
        DVector::from_fn(self.stoichiometry.nrows(), |i, _| {
            (0..steps).map(|j| self.stoichiometry[(i, j)] * r[j]).sum()
        })
    }
}
