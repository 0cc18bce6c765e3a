/// Operating variables, their bounds, objective weights, cost baselines and the rate enhancement
/// of mixing and catalyst loading
pub mod operating_conditions;
/// Composite score of an operating point and the explicit feasible/infeasible evaluation result.
/// Infeasible candidates map to the finite penalty sentinel `1e10` in the minimized objective.
pub mod objective;
/// Differential-evolution search of the operating space.
/// ```
/// use TransEsterKin::Kinetics::arrhenius::KineticParameters;
/// use TransEsterKin::Kinetics::kinetic_model::{KineticModel, Reversibility};
/// use TransEsterKin::Kinetics::mechanisms::Mechanism;
/// use TransEsterKin::Kinetics::species::InitialConditions;
/// use TransEsterKin::Optimization::operating_conditions::{ObjectiveWeights, OperatingBounds};
/// use TransEsterKin::Optimization::operational_optimizer::{OperationalOptimizer, OptimizationMethod};
/// let model = KineticModel::new(
///     Mechanism::one_step_conversion(),
///     Reversibility::Irreversible,
///     KineticParameters::single(1e7, 50.0),
/// )
/// .unwrap();
/// let bounds = OperatingBounds::default();
/// let result = OperationalOptimizer::new(model)
///     .optimize(
///         &InitialConditions::from_molar_ratio(0.5, 6.0),
///         30.0,
///         &bounds,
///         &ObjectiveWeights::default(),
///         OptimizationMethod::DifferentialEvolution,
///         10,
///     )
///     .unwrap();
/// assert!(bounds.contains(&result.point));
/// ```
pub mod operational_optimizer;
/// One-variable sweeps with ΔX/Δvalue sensitivity coefficients and two-variable response surfaces
pub mod sensitivity;
mod optimizer_tests;
