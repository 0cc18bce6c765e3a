/// Runnable walkthroughs: reference batch, 3-step profiles with symbolic equations, multi-temperature fit,
/// operating-point optimization with sensitivity analysis, and the fit → optimize workflow.
pub mod workflow_examples;
