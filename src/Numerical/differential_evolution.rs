//! # Differential evolution (best1bin)
//!
//! Seeded, bounded, derivative-free global minimizer:
//! - Latin-hypercube initial population of `popsize · n` members (at least 5)
//! - mutation `b' = x_best + F·(x_r1 − x_r2)` with `F` dithered per generation in `mutation`
//! - binomial crossover with probability `recombination`, one component always taken from the mutant
//! - components that leave the box are redrawn uniformly inside it
//! - stop when `std(E) ≤ atol + tol·|mean(E)|` or after `max_generations`
//!
//! Every trial vector of a generation is built from the population of the previous generation before
//! any of them is evaluated. The random stream is consumed only while building trials, so evaluating the
//! generation sequentially or in parallel (rayon, feature `parallel`) yields identical results for the
//! same seed.
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvaluationMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DESettings {
    pub max_generations: usize,
    /// population size multiplier per dimension
    pub popsize: usize,
    /// dither range of the differential weight
    pub mutation: (f64, f64),
    pub recombination: f64,
    /// relative convergence tolerance
    pub tol: f64,
    /// absolute convergence tolerance
    pub atol: f64,
    pub seed: u64,
    pub evaluation: EvaluationMode,
}

impl Default for DESettings {
    fn default() -> Self {
        DESettings {
            max_generations: 1000,
            popsize: 15,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            seed: 42,
            evaluation: EvaluationMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DEError {
    #[error("no search dimensions")]
    NoDimensions,
    #[error("invalid bounds for dimension {index}: [{lower}, {upper}]")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

#[derive(Debug, Clone)]
pub struct DEReport {
    pub best: Vec<f64>,
    pub best_energy: f64,
    pub generations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

pub struct DifferentialEvolution {
    bounds: Vec<(f64, f64)>,
    pub settings: DESettings,
}

impl DifferentialEvolution {
    pub fn new(bounds: Vec<(f64, f64)>, settings: DESettings) -> Result<Self, DEError> {
        if bounds.is_empty() {
            return Err(DEError::NoDimensions);
        }
        for (index, &(lower, upper)) in bounds.iter().enumerate() {
            if !lower.is_finite() || !upper.is_finite() || lower > upper {
                return Err(DEError::InvalidBounds {
                    index,
                    lower,
                    upper,
                });
            }
        }
        let (m0, m1) = settings.mutation;
        if !(m0 >= 0.0 && m1 >= m0 && m1 <= 2.0) {
            return Err(DEError::InvalidSettings(format!(
                "mutation = ({}, {})",
                m0, m1
            )));
        }
        if !(0.0..=1.0).contains(&settings.recombination) {
            return Err(DEError::InvalidSettings(format!(
                "recombination = {}",
                settings.recombination
            )));
        }
        if settings.popsize == 0 {
            return Err(DEError::InvalidSettings("popsize = 0".to_string()));
        }
        Ok(DifferentialEvolution { bounds, settings })
    }

    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    /// Minimizes `objective` inside the bounds. Non-finite energies are treated as `+∞`.
    pub fn minimize<F>(&self, objective: F) -> DEReport
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        let n = self.bounds.len();
        let np = (self.settings.popsize * n).max(5);
        let mut rng = StdRng::seed_from_u64(self.settings.seed);

        let mut population = self.latin_hypercube(np, &mut rng);
        let mut energies = self.evaluate(&objective, &population);
        let mut evaluations = np;
        let mut best = argmin(&energies);
        let mut converged = self.has_converged(&energies);
        let mut generations = 0;

        while !converged && generations < self.settings.max_generations {
            generations += 1;
            let scale = self.dithered_scale(&mut rng);
            let trials: Vec<Vec<f64>> = (0..np)
                .map(|i| self.build_trial(i, best, scale, &population, &mut rng))
                .collect();
            let trial_energies = self.evaluate(&objective, &trials);
            evaluations += np;
            for (i, (trial, energy)) in trials.into_iter().zip(trial_energies).enumerate() {
                if energy <= energies[i] {
                    population[i] = trial;
                    energies[i] = energy;
                }
            }
            best = argmin(&energies);
            converged = self.has_converged(&energies);
            debug!(
                "DE generation {}: best energy = {:e}",
                generations, energies[best]
            );
        }
        if converged {
            info!(
                "DE converged after {} generations ({} evaluations), best energy = {:e}",
                generations, evaluations, energies[best]
            );
        } else {
            warn!(
                "DE stopped at the generation limit {} without convergence, best energy = {:e}",
                self.settings.max_generations, energies[best]
            );
        }
        DEReport {
            best: population[best].clone(),
            best_energy: energies[best],
            generations,
            evaluations,
            converged,
        }
    }

    fn evaluate<F>(&self, objective: &F, members: &[Vec<f64>]) -> Vec<f64>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        let finite = |e: f64| if e.is_finite() { e } else { f64::INFINITY };
        match self.settings.evaluation {
            EvaluationMode::Sequential => members.iter().map(|m| finite(objective(m.as_slice()))).collect(),
            #[cfg(feature = "parallel")]
            EvaluationMode::Parallel => members
                .par_iter()
                .map(|m| finite(objective(m.as_slice())))
                .collect(),
            #[cfg(not(feature = "parallel"))]
            EvaluationMode::Parallel => {
                debug!("built without the `parallel` feature, evaluating sequentially");
                members.iter().map(|m| finite(objective(m.as_slice()))).collect()
            }
        }
    }

    fn latin_hypercube(&self, np: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
        let mut population = vec![vec![0.0; self.bounds.len()]; np];
        for (j, &(lower, upper)) in self.bounds.iter().enumerate() {
            let mut segments: Vec<usize> = (0..np).collect();
            segments.shuffle(rng);
            for (i, segment) in segments.into_iter().enumerate() {
                let u: f64 = rng.random::<f64>();
                population[i][j] = lower + (upper - lower) * (segment as f64 + u) / np as f64;
            }
        }
        population
    }

    fn dithered_scale(&self, rng: &mut StdRng) -> f64 {
        let (m0, m1) = self.settings.mutation;
        if m1 > m0 {
            rng.random_range(m0..m1)
        } else {
            m0
        }
    }

    fn build_trial(
        &self,
        i: usize,
        best: usize,
        scale: f64,
        population: &[Vec<f64>],
        rng: &mut StdRng,
    ) -> Vec<f64> {
        let np = population.len();
        let n = self.bounds.len();
        let r1 = pick_distinct(rng, np, &[i]);
        let r2 = pick_distinct(rng, np, &[i, r1]);
        let j_rand = rng.random_range(0..n);
        let mut trial = population[i].clone();
        for j in 0..n {
            let crossover = rng.random::<f64>() < self.settings.recombination;
            if crossover || j == j_rand {
                trial[j] = population[best][j] + scale * (population[r1][j] - population[r2][j]);
            }
        }
        for (j, &(lower, upper)) in self.bounds.iter().enumerate() {
            if trial[j] < lower || trial[j] > upper {
                trial[j] = lower + (upper - lower) * rng.random::<f64>();
            }
        }
        trial
    }

    fn has_converged(&self, energies: &[f64]) -> bool {
        if energies.iter().any(|e| !e.is_finite()) {
            return false;
        }
        let np = energies.len() as f64;
        let mean = energies.iter().sum::<f64>() / np;
        let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / np;
        variance.sqrt() <= self.settings.atol + self.settings.tol * mean.abs()
    }
}

fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v < values[best] {
            best = i;
        }
    }
    best
}

/// index in `0..np` not contained in `exclude`
fn pick_distinct(rng: &mut StdRng, np: usize, exclude: &[usize]) -> usize {
    loop {
        let candidate = rng.random_range(0..np);
        if !exclude.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| (v - 1.0).powi(2)).sum()
    }

    #[test]
    fn test_sphere_minimum() {
        let settings = DESettings {
            max_generations: 300,
            tol: 0.0,
            ..DESettings::default()
        };
        let de = DifferentialEvolution::new(vec![(-5.0, 5.0); 3], settings).unwrap();
        let report = de.minimize(sphere);
        for v in &report.best {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-2);
        }
        assert!(report.best_energy < 1e-3);
    }

    #[test]
    fn test_same_seed_same_result() {
        let settings = DESettings {
            max_generations: 30,
            ..DESettings::default()
        };
        let a = DifferentialEvolution::new(vec![(-3.0, 3.0); 2], settings.clone())
            .unwrap()
            .minimize(sphere);
        let b = DifferentialEvolution::new(vec![(-3.0, 3.0); 2], settings)
            .unwrap()
            .minimize(sphere);
        assert_eq!(a.best, b.best);
        assert_eq!(a.best_energy, b.best_energy);
        assert_eq!(a.generations, b.generations);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = DESettings {
            max_generations: 40,
            seed: 7,
            ..DESettings::default()
        };
        let parallel = DESettings {
            evaluation: EvaluationMode::Parallel,
            ..sequential.clone()
        };
        let a = DifferentialEvolution::new(vec![(-3.0, 3.0), (0.0, 2.0)], sequential)
            .unwrap()
            .minimize(sphere);
        let b = DifferentialEvolution::new(vec![(-3.0, 3.0), (0.0, 2.0)], parallel)
            .unwrap()
            .minimize(sphere);
        assert_eq!(a.best, b.best);
        assert_eq!(a.evaluations, b.evaluations);
    }

    #[test]
    fn test_members_stay_in_bounds_and_failures_are_tolerated() {
        let bounds = vec![(2.0, 4.0), (-1.0, -0.5)];
        let de = DifferentialEvolution::new(
            bounds.clone(),
            DESettings {
                max_generations: 20,
                ..DESettings::default()
            },
        )
        .unwrap();
        // NaN on half of the box
        let report = de.minimize(|x| if x[0] > 3.0 { f64::NAN } else { sphere(x) });
        assert!(report.best[0] >= 2.0 && report.best[0] <= 3.0);
        assert!(report.best[1] >= -1.0 && report.best[1] <= -0.5);
        assert!(report.best_energy.is_finite());
    }

    #[test]
    fn test_degenerate_dimension() {
        let settings = DESettings {
            max_generations: 300,
            tol: 0.0,
            ..DESettings::default()
        };
        let de = DifferentialEvolution::new(vec![(1.5, 1.5), (-2.0, 2.0)], settings).unwrap();
        let report = de.minimize(|x| (x[1] - 1.0).powi(2));
        assert_eq!(report.best[0], 1.5);
        assert_relative_eq!(report.best[1], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(matches!(
            DifferentialEvolution::new(vec![(1.0, 0.0)], DESettings::default()),
            Err(DEError::InvalidBounds { index: 0, .. })
        ));
        assert!(matches!(
            DifferentialEvolution::new(vec![(0.0, f64::INFINITY)], DESettings::default()),
            Err(DEError::InvalidBounds { .. })
        ));
        assert!(matches!(
            DifferentialEvolution::new(vec![], DESettings::default()),
            Err(DEError::NoDimensions)
        ));
    }
}
