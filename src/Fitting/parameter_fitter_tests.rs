#[cfg(test)]
mod tests {
    use crate::Fitting::experiment::{Experiment, Observable};
    use crate::Fitting::fit_result::FitWarning;
    use crate::Fitting::parameter_fitter::{
        FitError, FitMethod, FitSettings, ParameterFitter, Weighting,
    };
    use crate::Kinetics::arrhenius::KineticParameters;
    use crate::Kinetics::kinetic_model::{KineticModel, Reversibility};
    use crate::Kinetics::mechanisms::Mechanism;
    use crate::Kinetics::species::{InitialConditions, Species};
    use crate::Numerical::differential_evolution::DESettings;
    use crate::Numerical::least_squares::LMSettings;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TRUE_A: f64 = 1e7;
    const TRUE_EA: f64 = 50.0;
    const TEMPERATURES: [f64; 4] = [30.0, 40.0, 50.0, 60.0];

    fn conversion_model(a: f64, ea: f64) -> KineticModel {
        KineticModel::new(
            Mechanism::one_step_conversion(),
            Reversibility::Irreversible,
            KineticParameters::single(a, ea),
        )
        .unwrap()
    }

    fn sampling_times() -> Vec<f64> {
        (0..=20).map(|i| 3.0 * i as f64).collect()
    }

    /// standard normal samples by Box–Muller
    fn gaussian(rng: &mut StdRng) -> f64 {
        let u1: f64 = rng.random::<f64>().max(1e-300);
        let u2: f64 = rng.random();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// conversion series of the true model with additive noise
    fn synthetic_fitter(sigma: f64) -> ParameterFitter {
        let truth = conversion_model(TRUE_A, TRUE_EA);
        let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
        let times = sampling_times();
        let mut rng = StdRng::seed_from_u64(7);
        let mut fitter = ParameterFitter::new(conversion_model(1e6, 45.0));
        for t in TEMPERATURES {
            let clean = truth.simulate(&ic, &times, t).unwrap().conversion;
            let noisy = clean.iter().map(|x| x + sigma * gaussian(&mut rng)).collect();
            fitter
                .add_experiment(times.clone(), noisy, t, ic.clone(), &format!("T{}", t))
                .unwrap();
        }
        fitter
    }

    fn relative_error(found: f64, expected: f64) -> f64 {
        ((found - expected) / expected).abs()
    }

    #[test]
    fn test_recovers_arrhenius_parameters_with_lm() {
        let mut fitter = synthetic_fitter(0.05);
        let result = fitter.fit(FitMethod::LevenbergMarquardt).unwrap();
        let a = result.value("A_forward").unwrap();
        let ea = result.value("Ea_forward").unwrap();
        assert!(relative_error(a, TRUE_A) < 0.05, "A = {}", a);
        assert!(relative_error(ea, TRUE_EA) < 0.05, "Ea = {}", ea);
        assert!(result.r_squared > 0.999);
        assert!(result.rmse < 0.2);
        assert!(result.warnings.is_empty());
        assert_eq!(result.experiments.len(), 4);
        // fitted values are written back
        assert_eq!(fitter.model().parameters(), &result.parameters);
        assert_eq!(fitter.parameters()[0].value, a);
    }

    #[test]
    fn test_global_search_with_polish() {
        let mut fitter = synthetic_fitter(0.05);
        fitter.set_bounds("A_forward", 1e5, 1e9).unwrap();
        fitter.set_bounds("Ea_forward", 30.0, 70.0).unwrap();
        fitter.settings.de = DESettings {
            max_generations: 200,
            ..DESettings::default()
        };
        let result = fitter
            .fit(FitMethod::DifferentialEvolution { polish: true })
            .unwrap();
        assert!(relative_error(result.value("A_forward").unwrap(), TRUE_A) < 0.05);
        assert!(relative_error(result.value("Ea_forward").unwrap(), TRUE_EA) < 0.05);
        assert!(result.method.starts_with("differential evolution"));
        assert!(result.evaluations > 0);
    }

    #[test]
    fn test_locked_activation_energy() {
        let mut fitter = synthetic_fitter(0.0);
        fitter.lock_at("Ea_forward", TRUE_EA).unwrap();
        assert_eq!(fitter.free_parameter_count(), 1);
        let result = fitter.fit(FitMethod::LevenbergMarquardt).unwrap();
        assert_eq!(result.value("Ea_forward"), Some(TRUE_EA));
        assert!(relative_error(result.value("A_forward").unwrap(), TRUE_A) < 0.01);
        assert_eq!(result.locked, vec!["Ea_forward".to_string()]);
    }

    #[test]
    fn test_fame_concentration_observable() {
        let truth = KineticModel::new(
            Mechanism::one_step(),
            Reversibility::Irreversible,
            KineticParameters::single(TRUE_A, TRUE_EA),
        )
        .unwrap();
        let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
        let times: Vec<f64> = (0..=15).map(|i| 2.0 * i as f64).collect();
        let start = truth
            .with_parameters(KineticParameters::single(3e6, 47.0))
            .unwrap();
        let mut fitter = ParameterFitter::new(start);
        for t in [40.0, 55.0] {
            let fame = truth
                .simulate(&ic, &times, t)
                .unwrap()
                .species_profile(Species::FAME)
                .unwrap();
            let experiment = Experiment::new(format!("fame-{}", t), times.clone(), fame, t, ic.clone())
                .with_observable(Observable::Concentration(Species::FAME));
            fitter.add(experiment).unwrap();
        }
        let result = fitter.fit(FitMethod::LevenbergMarquardt).unwrap();
        assert!(relative_error(result.value("A_forward").unwrap(), TRUE_A) < 0.05);
        assert!(relative_error(result.value("Ea_forward").unwrap(), TRUE_EA) < 0.05);
    }

    #[test]
    fn test_problem_errors() {
        let mut fitter = ParameterFitter::new(conversion_model(1e6, 45.0));
        assert!(matches!(
            fitter.fit(FitMethod::LevenbergMarquardt),
            Err(FitError::NoExperiments)
        ));

        let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
        fitter
            .add_experiment(vec![], vec![], 50.0, ic.clone(), "empty")
            .unwrap();
        assert!(matches!(
            fitter.fit(FitMethod::LevenbergMarquardt),
            Err(FitError::EmptyExperiment { id }) if id == "empty"
        ));
        assert!(matches!(
            fitter.add_experiment(vec![1.0], vec![5.0], 50.0, ic.clone(), "empty"),
            Err(FitError::DuplicateExperiment { .. })
        ));
        assert!(matches!(
            fitter.add_experiment(vec![1.0, 2.0], vec![5.0], 50.0, ic, "mismatch"),
            Err(FitError::Configuration(_))
        ));
        assert!(matches!(
            fitter.lock("k_forward"),
            Err(FitError::UnknownParameter(name)) if name == "k_forward"
        ));
        assert!(fitter.set_bounds("A_forward", 10.0, 1.0).is_err());
    }

    #[test]
    fn test_everything_locked() {
        let mut fitter = synthetic_fitter(0.0);
        fitter.lock("A_forward").unwrap();
        fitter.lock("Ea_forward").unwrap();
        assert!(matches!(
            fitter.fit(FitMethod::LevenbergMarquardt),
            Err(FitError::NothingToFit)
        ));
        fitter.unlock("A_forward").unwrap();
        assert_eq!(fitter.free_parameter_count(), 1);
    }

    #[test]
    fn test_single_experiment_warnings() {
        let truth = conversion_model(TRUE_A, TRUE_EA);
        let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
        let times = sampling_times();
        let observed = truth.simulate(&ic, &times, 50.0).unwrap().conversion;
        let mut fitter = ParameterFitter::new(conversion_model(1e6, 45.0)).with_settings(
            FitSettings {
                de: DESettings {
                    max_generations: 30,
                    ..DESettings::default()
                },
                ..FitSettings::default()
            },
        );
        fitter
            .add_experiment(times, observed, 50.0, ic, "only")
            .unwrap();
        let result = fitter
            .fit(FitMethod::DifferentialEvolution { polish: false })
            .unwrap();
        assert!(result.warnings.contains(&FitWarning::UnderDetermined {
            experiments: 1,
            free_parameters: 2
        }));
        assert!(
            result
                .warnings
                .contains(&FitWarning::SingleTemperature { temperature: 50.0 })
        );
    }

    #[test]
    fn test_unintegrable_experiment() {
        let ic = InitialConditions::from_molar_ratio(0.5, 6.0);
        let build = || {
            let mut fitter = ParameterFitter::new(conversion_model(1e6, 45.0));
            fitter
                .add_experiment(vec![0.0, 10.0], vec![0.0, 50.0], -300.0, ic.clone(), "frozen")
                .unwrap();
            fitter
        };
        assert!(matches!(
            build().fit(FitMethod::LevenbergMarquardt),
            Err(FitError::Simulation { id, .. }) if id == "frozen"
        ));
        let mut fitter = build();
        fitter.settings.de.max_generations = 3;
        assert!(matches!(
            fitter.fit(FitMethod::DifferentialEvolution { polish: false }),
            Err(FitError::AllCandidatesFailed { .. })
        ));
    }

    #[test]
    fn test_inverse_variance_weighting() {
        let mut uniform = synthetic_fitter(0.5);
        let uniform_result = uniform.fit(FitMethod::LevenbergMarquardt).unwrap();

        let mut weighted = synthetic_fitter(0.5).with_settings(FitSettings {
            weighting: Weighting::InverseVariance,
            ..FitSettings::default()
        });
        let weighted_result = weighted.fit(FitMethod::LevenbergMarquardt).unwrap();
        // conversion series vary by hundreds of %², so the weighted cost is much smaller
        assert!(weighted_result.cost < uniform_result.cost);
        assert!(relative_error(weighted_result.value("Ea_forward").unwrap(), TRUE_EA) < 0.05);
    }

    #[test]
    fn test_budget_exhausted() {
        let mut fitter = synthetic_fitter(0.05).with_settings(FitSettings {
            lm: LMSettings {
                max_evaluations: 5,
                ..LMSettings::default()
            },
            ..FitSettings::default()
        });
        match fitter.fit(FitMethod::LevenbergMarquardt) {
            Err(FitError::NotConverged {
                method,
                evaluations,
                ..
            }) => {
                assert_eq!(method, "Levenberg-Marquardt");
                assert!(evaluations >= 3);
            }
            other => panic!("expected NotConverged, got {:?}", other.map(|r| r.cost)),
        }
        // the model keeps its initial guess
        assert_eq!(
            fitter.model().parameters(),
            &KineticParameters::single(1e6, 45.0)
        );
    }

    #[test]
    fn test_result_export() {
        let mut fitter = synthetic_fitter(0.05);
        let result = fitter.fit(FitMethod::LevenbergMarquardt).unwrap();
        let map = result.to_flat_map();
        for key in ["A_forward", "Ea_forward", "r_squared", "rmse", "cost", "T30.rmse"] {
            assert!(map.contains_key(key), "missing {}", key);
        }
        let json = result.to_json().unwrap();
        assert!(json.contains("\"Ea_forward\""));
    }

    #[test]
    fn test_percentage_error_skips_zero_observations() {
        // noise-free series start at exactly 0 % conversion
        let mut fitter = synthetic_fitter(0.0);
        let result = fitter.fit(FitMethod::LevenbergMarquardt).unwrap();
        let global = result.mape.unwrap();
        assert!(global.is_finite() && global < 0.1, "MAPE = {}", global);
        for summary in &result.experiments {
            assert!(summary.mape.unwrap() < 0.1);
        }
        let map = result.to_flat_map();
        assert_eq!(map["mape"], global);
        assert!(map.contains_key("T30.mape"));
    }
}
