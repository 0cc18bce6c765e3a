use crate::Kinetics::arrhenius::{ArrheniusPair, KineticParameters, R_G};
use crate::Kinetics::kinetic_model::{KineticModel, Reversibility};
use crate::Kinetics::mechanisms::Mechanism;
use crate::Kinetics::species::InitialConditions;

/// 1-step conversion-form model with A = 2.98e10 1/min, Ea = 51.9 kJ/mol
fn reference_model() -> KineticModel {
    KineticModel::new(
        Mechanism::one_step_conversion(),
        Reversibility::Irreversible,
        KineticParameters::single(2.98e10, 51.9),
    )
    .unwrap()
}

/// synthetic conversion data (%) of A = 1e7, Ea = 50 at several temperatures, ratio 6:1
fn synthetic_runs(temperatures: &[f64], times: &[f64]) -> Vec<(f64, Vec<f64>)> {
    let truth = KineticModel::new(
        Mechanism::one_step_conversion(),
        Reversibility::Irreversible,
        KineticParameters::single(1e7, 50.0),
    )
    .unwrap();
    let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
    temperatures
        .iter()
        .map(|t| {
            let x = truth.simulate(&ic, times, *t).unwrap().conversion;
            // deterministic ±0.3 % scatter
            let scattered = x
                .iter()
                .enumerate()
                .map(|(i, v)| if i == 0 { *v } else { v + 0.3 * (i as f64 * 1.7).sin() })
                .collect();
            (*t, scattered)
        })
        .collect()
}

pub fn transesterification_examples(task: usize) {
    match task {
        0 => {
            // REFERENCE BATCH: 65 °C, MeOH:TG = 9, 2 h
            let model = reference_model();
            model.pretty_print(Some(65.0));
            let ic = InitialConditions::from_molar_ratio(0.5, 9.0);
            let times: Vec<f64> = (0..=12).map(|i| 10.0 * i as f64).collect();
            let trajectory = model.simulate(&ic, &times, 65.0).unwrap();
            trajectory.pretty_print();
            println!("final conversion: {:.3} %", trajectory.final_conversion());
            assert!(trajectory.final_conversion() > 95.0);
        }
        1 => {
            // 3-STEP REVERSIBLE MECHANISM TG ⇌ DG ⇌ MG ⇌ GL, rate constants given at 50 °C
            let pairs = |k: [f64; 3], ea: [f64; 3]| -> Vec<ArrheniusPair> {
                (0..3)
                    .map(|i| ArrheniusPair::from_rate_at(k[i], ea[i], 50.0, R_G))
                    .collect()
            };
            let params = KineticParameters::reversible(
                pairs([0.050, 0.215, 0.242], [55.0, 83.1, 26.9]),
                pairs([0.110, 1.228, 0.007], [41.6, 61.3, 40.1]),
            );
            let model =
                KineticModel::new(Mechanism::three_step(), Reversibility::Reversible, params)
                    .unwrap();
            model.pretty_print(Some(60.0));
            model.pretty_print_equations();
            let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
            let times: Vec<f64> = (0..=10).map(|i| 12.0 * i as f64).collect();
            let trajectory = model.simulate(&ic, &times, 60.0).unwrap();
            trajectory.pretty_print();
        }
        2 => {
            // MULTI-TEMPERATURE FIT of A and Ea
            use crate::Fitting::parameter_fitter::{FitMethod, ParameterFitter};
            let times: Vec<f64> = (0..=12).map(|i| 5.0 * i as f64).collect();
            let start = KineticModel::new(
                Mechanism::one_step_conversion(),
                Reversibility::Irreversible,
                KineticParameters::single(1e6, 45.0),
            )
            .unwrap();
            let mut fitter = ParameterFitter::new(start);
            let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
            for (t, x) in synthetic_runs(&[40.0, 50.0, 60.0], &times) {
                fitter
                    .add_experiment(times.clone(), x, t, ic.clone(), &format!("{} °C", t))
                    .unwrap();
            }
            let result = fitter.fit(FitMethod::LevenbergMarquardt).unwrap();
            result.pretty_print();
            println!("{}", result.to_json().unwrap());
        }
        3 => {
            // OPERATING-POINT OPTIMIZATION and sensitivity of the reference model
            use crate::Optimization::operating_conditions::{
                ObjectiveWeights, OperatingBounds, OperatingPoint,
            };
            use crate::Optimization::operational_optimizer::{
                OperationalOptimizer, OptimizationMethod,
            };
            use crate::Optimization::sensitivity::{OperatingVariable, linspace};
            let optimizer = OperationalOptimizer::new(reference_model());
            let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
            let bounds = OperatingBounds::default();
            let result = optimizer
                .optimize(
                    &ic,
                    60.0,
                    &bounds,
                    &ObjectiveWeights::default(),
                    OptimizationMethod::DifferentialEvolution,
                    50,
                )
                .unwrap();
            result.pretty_print();
            println!("{:?}", result.to_flat_map());

            let base = OperatingPoint::default();
            for sweep in optimizer
                .sensitivity_analysis(&ic, 5.0, &base, &bounds, 5)
                .unwrap()
            {
                sweep.pretty_print();
            }
            let surface = optimizer
                .response_surface(
                    &ic,
                    5.0,
                    &base,
                    (OperatingVariable::Temperature, &linspace(50.0, 70.0, 5)),
                    (OperatingVariable::Catalyst, &linspace(0.5, 2.0, 4)),
                )
                .unwrap();
            surface.pretty_print();

            // full factorial sweep over temperature, catalyst and molar ratio
            let grid = vec![
                (OperatingVariable::Temperature, linspace(50.0, 70.0, 3)),
                (OperatingVariable::Catalyst, vec![0.5, 1.0, 2.0]),
                (OperatingVariable::MolarRatio, vec![4.5, 6.0, 9.0]),
            ];
            optimizer
                .parametric_sweep(&ic, 5.0, &base, &grid)
                .unwrap()
                .pretty_print();

            // how the optimum moves with the objective weights
            let study = optimizer
                .weight_sensitivity(&ic, 60.0, &bounds, &ObjectiveWeights::presets(), 50)
                .unwrap();
            study.pretty_print();
        }
        4 => {
            // COMPLETE WORKFLOW: fit the kinetics, then optimize the process with the fitted model
            use crate::Fitting::parameter_fitter::{FitMethod, ParameterFitter};
            use crate::Optimization::operating_conditions::{ObjectiveWeights, OperatingBounds};
            use crate::Optimization::operational_optimizer::{
                OperationalOptimizer, OptimizationMethod,
            };
            let times: Vec<f64> = (0..=12).map(|i| 5.0 * i as f64).collect();
            let start = KineticModel::new(
                Mechanism::one_step_conversion(),
                Reversibility::Irreversible,
                KineticParameters::single(1e6, 45.0),
            )
            .unwrap();
            let mut fitter = ParameterFitter::new(start);
            fitter.set_bounds("A_forward", 1e4, 1e10).unwrap();
            fitter.set_bounds("Ea_forward", 20.0, 90.0).unwrap();
            let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
            for (t, x) in synthetic_runs(&[45.0, 55.0, 65.0], &times) {
                fitter
                    .add_experiment(times.clone(), x, t, ic.clone(), &format!("{} °C", t))
                    .unwrap();
            }
            let fit = fitter
                .fit(FitMethod::DifferentialEvolution { polish: true })
                .unwrap();
            fit.pretty_print();

            let optimizer = OperationalOptimizer::new(fitter.into_model());
            let result = optimizer
                .optimize(
                    &ic,
                    45.0,
                    &OperatingBounds::default(),
                    &ObjectiveWeights::default(),
                    OptimizationMethod::DifferentialEvolution,
                    50,
                )
                .unwrap();
            result.pretty_print();
        }
        _ => println!("unknown task {}, choose 0..=4", task),
    }
}
