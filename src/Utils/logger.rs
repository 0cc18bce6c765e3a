//! Logging setup: terminal output plus an optional log file, both through the `log` facade.
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::path::Path;

/// Installs the global logger. The terminal shows records up to `level`, the file (when given)
/// receives everything down to `Debug`. Returns false if a logger was already installed or the file
/// could not be created; the program can go on without logging in both cases.
pub fn init_logger(level: LevelFilter, log_file: Option<&Path>) -> bool {
    let term_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        term_config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        match File::create(path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file)),
            Err(e) => {
                eprintln!("cannot create log file {}: {}", path.display(), e);
                return false;
            }
        }
    }
    CombinedLogger::init(loggers).is_ok()
}
