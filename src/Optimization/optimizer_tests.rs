#[cfg(test)]
mod tests {
    use crate::Kinetics::arrhenius::KineticParameters;
    use crate::Kinetics::kinetic_errors::ConfigurationError;
    use crate::Kinetics::kinetic_model::{KineticModel, Reversibility};
    use crate::Kinetics::mechanisms::Mechanism;
    use crate::Kinetics::species::InitialConditions;
    use crate::Numerical::differential_evolution::{DESettings, EvaluationMode};
    use crate::Optimization::objective::{Evaluation, PENALTY_SENTINEL};
    use crate::Optimization::operating_conditions::{
        ObjectiveWeights, OperatingBounds, OperatingPoint, VariableBounds,
    };
    use crate::Optimization::operational_optimizer::{
        OperationalOptimizer, OptimizationError, OptimizationMethod, OptimizerSettings,
    };
    use crate::Optimization::sensitivity::{OperatingVariable, linspace};
    use approx::assert_relative_eq;

    fn optimizer() -> OperationalOptimizer {
        let model = KineticModel::new(
            Mechanism::one_step_conversion(),
            Reversibility::Irreversible,
            KineticParameters::single(1e7, 50.0),
        )
        .unwrap();
        OperationalOptimizer::new(model)
    }

    fn charge() -> InitialConditions {
        InitialConditions::from_molar_ratio(0.5, 6.0)
    }

    #[test]
    fn test_optimum_lies_inside_bounds() {
        let opt = optimizer();
        let bounds = OperatingBounds::default();
        let weights = ObjectiveWeights::default();
        let result = opt
            .optimize(
                &charge(),
                30.0,
                &bounds,
                &weights,
                OptimizationMethod::DifferentialEvolution,
                30,
            )
            .unwrap();
        assert!(result.feasible);
        assert!(bounds.contains(&result.point), "{:?}", result.point);
        assert!(result.conversion > 0.0 && result.conversion <= 100.0);
        assert!(result.generations <= 30);
        assert_eq!(result.failed_evaluations, 0);
        assert_eq!(result.weights, weights);
        // the reported score is the score of the reported point
        match opt
            .evaluate_point(&charge(), 30.0, &bounds, &weights, &result.point)
            .unwrap()
        {
            Evaluation::Feasible { conversion, score } => {
                assert_relative_eq!(conversion, result.conversion, epsilon = 1e-12);
                assert_relative_eq!(score, result.score, epsilon = 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_every_candidate_failing() {
        let opt = optimizer();
        let bounds = OperatingBounds {
            temperature: VariableBounds::new(-400.0, -300.0),
            ..OperatingBounds::default()
        };
        let result = opt
            .optimize(
                &charge(),
                30.0,
                &bounds,
                &ObjectiveWeights::default(),
                OptimizationMethod::DifferentialEvolution,
                5,
            )
            .unwrap();
        assert!(!result.feasible);
        assert_eq!(result.score, -PENALTY_SENTINEL);
        assert_eq!(result.failed_evaluations, result.evaluations);
        assert!(bounds.contains(&result.point));
    }

    #[test]
    fn test_partially_failing_region() {
        let opt = optimizer();
        let bounds = OperatingBounds {
            temperature: VariableBounds::new(-300.0, 70.0),
            ..OperatingBounds::default()
        };
        let result = opt
            .optimize(
                &charge(),
                30.0,
                &bounds,
                &ObjectiveWeights::default(),
                OptimizationMethod::DifferentialEvolution,
                20,
            )
            .unwrap();
        assert!(result.feasible);
        assert!(result.failed_evaluations > 0);
        assert!(result.point.temperature > -273.15);
        assert!(result.score > -PENALTY_SENTINEL);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let run = |evaluation: EvaluationMode| {
            optimizer()
                .with_settings(OptimizerSettings {
                    de: DESettings {
                        evaluation,
                        ..DESettings::default()
                    },
                    ..OptimizerSettings::default()
                })
                .optimize(
                    &charge(),
                    30.0,
                    &OperatingBounds::default(),
                    &ObjectiveWeights::default(),
                    OptimizationMethod::DifferentialEvolution,
                    15,
                )
                .unwrap()
        };
        let sequential = run(EvaluationMode::Sequential);
        let parallel = run(EvaluationMode::Parallel);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_configuration_errors() {
        let opt = optimizer();
        let bounds = OperatingBounds {
            catalyst: VariableBounds::new(2.0, 0.5),
            ..OperatingBounds::default()
        };
        let err = opt
            .optimize(
                &charge(),
                30.0,
                &bounds,
                &ObjectiveWeights::default(),
                OptimizationMethod::DifferentialEvolution,
                10,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            OptimizationError::Configuration(ConfigurationError::InvalidBounds { .. })
        ));
        let err = opt
            .optimize(
                &charge(),
                0.0,
                &OperatingBounds::default(),
                &ObjectiveWeights::default(),
                OptimizationMethod::DifferentialEvolution,
                10,
            )
            .unwrap_err();
        assert!(matches!(err, OptimizationError::Configuration(_)));
        let no_tg = InitialConditions::new();
        assert!(
            opt.optimize(
                &no_tg,
                30.0,
                &OperatingBounds::default(),
                &ObjectiveWeights::default(),
                OptimizationMethod::DifferentialEvolution,
                10,
            )
            .is_err()
        );
    }

    #[test]
    fn test_temperature_sweep() {
        let opt = optimizer();
        let mut values = linspace(40.0, 70.0, 7);
        values.push(-300.0);
        let sweep = opt
            .sweep(
                &charge(),
                10.0,
                &OperatingPoint::default(),
                OperatingVariable::Temperature,
                &values,
            )
            .unwrap();
        assert_eq!(sweep.conversions.len(), 8);
        assert!(sweep.conversions[7].is_none());
        let ok: Vec<f64> = sweep.conversions[..7].iter().map(|x| x.unwrap()).collect();
        for w in ok.windows(2) {
            assert!(w[1] > w[0]);
        }
        let s = sweep.sensitivity().unwrap();
        assert_relative_eq!(s, (ok[6] - ok[0]) / 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sensitivity_analysis_and_surface() {
        let opt = optimizer();
        let base = OperatingPoint::default();
        let sweeps = opt
            .sensitivity_analysis(&charge(), 20.0, &base, &OperatingBounds::default(), 4)
            .unwrap();
        assert_eq!(sweeps.len(), 4);
        assert!(sweeps.iter().all(|s| s.conversions.iter().all(|x| x.is_some())));

        let temperatures = linspace(50.0, 70.0, 3);
        let catalyst = linspace(0.5, 2.0, 4);
        let surface = opt
            .response_surface(
                &charge(),
                5.0,
                &base,
                (OperatingVariable::Temperature, &temperatures),
                (OperatingVariable::Catalyst, &catalyst),
            )
            .unwrap();
        assert_eq!(surface.conversions.len(), 4);
        assert_eq!(surface.conversions[0].len(), 3);
        let (t, cat, _) = surface.best().unwrap();
        assert_eq!((t, cat), (70.0, 2.0));
        assert!(
            opt.response_surface(
                &charge(),
                20.0,
                &base,
                (OperatingVariable::Catalyst, &catalyst),
                (OperatingVariable::Catalyst, &catalyst),
            )
            .is_err()
        );
    }

    #[test]
    fn test_flat_export() {
        let result = optimizer()
            .optimize(
                &charge(),
                30.0,
                &OperatingBounds::default(),
                &ObjectiveWeights::default(),
                OptimizationMethod::DifferentialEvolution,
                5,
            )
            .unwrap();
        let map = result.to_flat_map();
        for key in ["temperature", "agitation", "catalyst", "molar_ratio", "conversion", "score"] {
            assert!(map.contains_key(key));
        }
        assert_eq!(map["feasible"], 1.0);
    }

    #[test]
    fn test_weight_presets_are_reoptimized() {
        let mut opt = optimizer();
        opt.settings.de = DESettings {
            popsize: 6,
            ..DESettings::default()
        };
        let bounds = OperatingBounds::default();
        let presets = ObjectiveWeights::presets();
        assert_eq!(presets.len(), 4);
        let study = opt
            .weight_sensitivity(&charge(), 30.0, &bounds, &presets, 10)
            .unwrap();
        assert_eq!(study.cases.len(), 4);
        for ((name, weights), (case_name, result)) in presets.iter().zip(&study.cases) {
            assert_eq!(name, case_name);
            assert_eq!(&result.weights, weights);
            assert!(result.feasible);
            assert!(bounds.contains(&result.point));
        }
        let base = study.get("base case").unwrap();
        assert_eq!(base.weights, ObjectiveWeights::default());
        assert_eq!(study.get("balanced").unwrap().weights, ObjectiveWeights::new(1.0, 1.0, 1.0, 1.0));
        assert!(study.get("unknown").is_none());
        // an invalid weight set stops the study
        let bad = vec![("nan".to_string(), ObjectiveWeights::new(f64::NAN, 0.0, 0.0, 0.0))];
        assert!(matches!(
            opt.weight_sensitivity(&charge(), 30.0, &bounds, &bad, 5),
            Err(OptimizationError::Configuration(_))
        ));
    }

    #[test]
    fn test_factorial_sweep() {
        let opt = optimizer();
        let base = OperatingPoint::default();
        let grid = vec![
            (OperatingVariable::Temperature, vec![50.0, 60.0, 70.0]),
            (OperatingVariable::MolarRatio, vec![3.0, 6.0, 9.0]),
        ];
        let sweep = opt.parametric_sweep(&charge(), 5.0, &base, &grid).unwrap();
        assert_eq!(sweep.len(), 9);
        assert_eq!(sweep.failed(), 0);
        // first variable varies slowest, the others stay at the base point
        assert_eq!(sweep.cases[1].point.temperature, 50.0);
        assert_eq!(sweep.cases[1].point.molar_ratio, 6.0);
        assert_eq!(sweep.cases[3].point.temperature, 60.0);
        assert!(sweep.cases.iter().all(|c| c.point.agitation == base.agitation));
        let best = sweep.best().unwrap();
        assert_eq!((best.point.temperature, best.point.molar_ratio), (70.0, 9.0));
        // one failing variable value leaves the rest of the grid intact
        let with_failure = vec![
            (OperatingVariable::Temperature, vec![-300.0, 60.0]),
            (OperatingVariable::Catalyst, vec![1.0, 2.0]),
        ];
        let sweep = opt
            .parametric_sweep(&charge(), 5.0, &base, &with_failure)
            .unwrap();
        assert_eq!(sweep.failed(), 2);
        assert_eq!(sweep.best().unwrap().point.catalyst, 2.0);

        let duplicated = vec![
            (OperatingVariable::Catalyst, vec![1.0]),
            (OperatingVariable::Catalyst, vec![2.0]),
        ];
        assert!(matches!(
            opt.parametric_sweep(&charge(), 5.0, &base, &duplicated),
            Err(ConfigurationError::InvalidSettings(_))
        ));
        assert!(opt.parametric_sweep(&charge(), 5.0, &base, &[]).is_err());
        let empty_values = vec![(OperatingVariable::Agitation, Vec::new())];
        assert!(opt.parametric_sweep(&charge(), 5.0, &base, &empty_values).is_err());
    }
}
