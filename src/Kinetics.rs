/// Arrhenius rate law k = A·exp(−Ea/(R·T_K)) with T in °C and Ea in kJ/mol, the Arrhenius pairs of a
/// mechanism ([`arrhenius::KineticParameters`], forward steps first, reverse steps second) and the rate
/// constants evaluated at one temperature.
///
/// # Examples
/// ```
/// use TransEsterKin::Kinetics::arrhenius::{arrhenius, ArrheniusPair, R_G};
/// let k = arrhenius(65.0, 2.98e10, 51.9);
/// assert!(k > 280.0 && k < 295.0);
/// // pair reproducing a rate constant measured at 50 °C
/// let pair = ArrheniusPair::from_rate_at(0.05, 55.0, 50.0, R_G);
/// assert!((pair.rate_constant(50.0, R_G) - 0.05).abs() < 1e-12);
/// ```
pub mod arrhenius;
/// Species of the transesterification (TG, DG, MG, GL, MeOH, FAME) and initial-condition maps.
/// Keys coming from data files ("C_TG_0", "C_MeOH0", "fame") are recognized by [`species::Species::parse_key`].
pub mod species;
/// Configuration and integration errors of the kinetic layer
pub mod kinetic_errors;
/// Reaction schemes as a tagged sum type dispatched with enum_dispatch:
/// - 1-step scalar conversion form dX/dt = k·(1−X)·ratio/3 (irreversible)
/// - 1-step mass-action form r = kf·TG·MeOH^n − kr·FAME^m·GL^p
/// - 3-step TG ⇌ DG ⇌ MG ⇌ GL
///
/// Each scheme provides its stoichiometric matrix, step rates and their analytical gradients.
pub mod mechanisms;
/// The kinetic model: mechanism + reversibility + Arrhenius pairs, simulated with the stiff solvers of RustedSciThe.
/// ```
/// use TransEsterKin::Kinetics::arrhenius::{ArrheniusPair, KineticParameters};
/// use TransEsterKin::Kinetics::kinetic_model::{KineticModel, Reversibility};
/// use TransEsterKin::Kinetics::mechanisms::Mechanism;
/// use TransEsterKin::Kinetics::species::{InitialConditions, Species};
/// let pairs = |k: [f64; 3], ea: [f64; 3]| -> Vec<ArrheniusPair> {
///     (0..3).map(|i| ArrheniusPair::from_rate_at(k[i], ea[i], 50.0, 8.314e-3)).collect()
/// };
/// let params = KineticParameters::reversible(
///     pairs([0.050, 0.215, 0.242], [55.0, 83.1, 26.9]),
///     pairs([0.110, 1.228, 0.007], [41.6, 61.3, 40.1]),
/// );
/// let model = KineticModel::new(Mechanism::three_step(), Reversibility::Reversible, params).unwrap();
/// let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
/// let trajectory = model.simulate(&ic, &[0.0, 30.0, 60.0], 50.0).unwrap();
/// let fame = trajectory.species_profile(Species::FAME).unwrap();
/// assert!(fame[1] > fame[0]);
/// ```
pub mod kinetic_model;
/// Symbolic right-hand sides and Arrhenius expressions (RustedSciThe `Expr`)
pub mod symbolic_rates;
/// prettytable output of models and trajectories
pub mod kinetic_tables;
