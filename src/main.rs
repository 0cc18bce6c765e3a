use TransEsterKin::Examples::workflow_examples::transesterification_examples;
use TransEsterKin::Utils::logger::init_logger;
use TransEsterKin::Utils::task_config::{load_task, run_task};
use log::{LevelFilter, error};
use std::path::Path;
use std::process::ExitCode;

/// `TransEsterKin [task.json | example number]`
pub fn main() -> ExitCode {
    init_logger(LevelFilter::Info, None);
    let arg = std::env::args().nth(1);
    match arg {
        Some(path) if path.ends_with(".json") => {
            let outcome = load_task(Path::new(&path)).and_then(|document| run_task(&document));
            match outcome {
                Ok(outcome) => {
                    if let Some(fit) = &outcome.fit {
                        fit.pretty_print();
                    }
                    if let Some(optimization) = &outcome.optimization {
                        optimization.pretty_print();
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Some(other) => match other.parse::<usize>() {
            Ok(task) => {
                transesterification_examples(task);
                ExitCode::SUCCESS
            }
            Err(_) => {
                error!("expected a task file (*.json) or an example number, got '{}'", other);
                ExitCode::FAILURE
            }
        },
        None => {
            transesterification_examples(4);
            ExitCode::SUCCESS
        }
    }
}
