/// Isothermal batch experiments: sampling times, observed conversion (%) or species concentration,
/// temperature and initial charge.
pub mod experiment;
/// R², RMSE, MAE, MAPE and the largest absolute residual
pub mod fit_metrics;
/// Fitted parameters, goodness of fit per experiment and overall, warnings; JSON and table output.
pub mod fit_result;
/// Estimation of the Arrhenius pairs of a kinetic model from several experiments at once.
/// Levenberg–Marquardt runs in `(ln k(T_ref), Ea)` coordinates, differential evolution in `(ln A, Ea)`
/// with an optional local polish.
/// ```
/// use TransEsterKin::Fitting::parameter_fitter::{FitMethod, ParameterFitter};
/// use TransEsterKin::Kinetics::arrhenius::KineticParameters;
/// use TransEsterKin::Kinetics::kinetic_model::{KineticModel, Reversibility};
/// use TransEsterKin::Kinetics::mechanisms::Mechanism;
/// use TransEsterKin::Kinetics::species::InitialConditions;
/// let model = |a: f64, ea: f64| {
///     KineticModel::new(
///         Mechanism::one_step_conversion(),
///         Reversibility::Irreversible,
///         KineticParameters::single(a, ea),
///     )
///     .unwrap()
/// };
/// let truth = model(1e7, 50.0);
/// let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
/// let times: Vec<f64> = (0..=10).map(|i| 5.0 * i as f64).collect();
/// let mut fitter = ParameterFitter::new(model(1e6, 45.0));
/// for t in [35.0, 50.0] {
///     let x = truth.simulate(&ic, &times, t).unwrap().conversion;
///     fitter.add_experiment(times.clone(), x, t, ic.clone(), &format!("run {}", t)).unwrap();
/// }
/// let result = fitter.fit(FitMethod::LevenbergMarquardt).unwrap();
/// assert!((result.value("Ea_forward").unwrap() - 50.0).abs() < 0.5);
/// ```
pub mod parameter_fitter;
mod parameter_fitter_tests;
