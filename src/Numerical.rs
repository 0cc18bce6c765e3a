/// Stiff initial value problems through RustedSciThe's `UniversalODESolver` (BDF, Radau, backward Euler).
/// Equations are symbolic; the mesh returned by the solver is sampled at arbitrary times by cubic Hermite interpolation.
pub mod stiff_ivp;
/// Bounded nonlinear least squares on the `levenberg-marquardt` crate: projection into the box,
/// forward-difference Jacobian, failed candidates rejected.
pub mod least_squares;
/// Seeded differential evolution (best1bin) with identical sequential and parallel generations.
pub mod differential_evolution;
