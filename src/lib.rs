#[allow(non_snake_case)]
pub mod Examples;
#[allow(non_snake_case)]
pub mod Fitting;
#[allow(non_snake_case)]
pub mod Kinetics;
#[allow(non_snake_case)]
pub mod Numerical;
#[allow(non_snake_case)]
pub mod Optimization;
#[allow(non_snake_case)]
pub mod Utils;
