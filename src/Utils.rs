/// `simplelog` terminal/file logger
pub mod logger;
/// JSON task documents for fitting and optimization runs
pub mod task_config;
