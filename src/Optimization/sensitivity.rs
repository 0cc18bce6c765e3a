//! One-variable sweeps, two-variable response surfaces and full factorial (Cartesian) sweeps of the
//! final conversion around a base operating point.
use crate::Kinetics::kinetic_errors::ConfigurationError;
use crate::Kinetics::species::InitialConditions;
use crate::Optimization::objective::conversion_at;
use crate::Optimization::operating_conditions::{OperatingBounds, OperatingPoint, VariableBounds};
use crate::Optimization::operational_optimizer::OperationalOptimizer;
use log::{debug, info};
use prettytable::{Cell, Row, Table, row};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum OperatingVariable {
    Temperature,
    Agitation,
    Catalyst,
    MolarRatio,
}

impl OperatingVariable {
    pub fn label(&self) -> &'static str {
        match self {
            OperatingVariable::Temperature => "T, °C",
            OperatingVariable::Agitation => "agitation, rpm",
            OperatingVariable::Catalyst => "catalyst, wt%",
            OperatingVariable::MolarRatio => "MeOH:TG",
        }
    }

    pub fn get(&self, point: &OperatingPoint) -> f64 {
        match self {
            OperatingVariable::Temperature => point.temperature,
            OperatingVariable::Agitation => point.agitation,
            OperatingVariable::Catalyst => point.catalyst,
            OperatingVariable::MolarRatio => point.molar_ratio,
        }
    }

    pub fn set(&self, point: &mut OperatingPoint, value: f64) {
        match self {
            OperatingVariable::Temperature => point.temperature = value,
            OperatingVariable::Agitation => point.agitation = value,
            OperatingVariable::Catalyst => point.catalyst = value,
            OperatingVariable::MolarRatio => point.molar_ratio = value,
        }
    }

    pub fn bounds(&self, bounds: &OperatingBounds) -> VariableBounds {
        match self {
            OperatingVariable::Temperature => bounds.temperature,
            OperatingVariable::Agitation => bounds.agitation,
            OperatingVariable::Catalyst => bounds.catalyst,
            OperatingVariable::MolarRatio => bounds.molar_ratio,
        }
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivitySweep {
    pub variable: OperatingVariable,
    pub values: Vec<f64>,
    /// final conversion, %; `None` where the simulation failed
    pub conversions: Vec<Option<f64>>,
}

impl SensitivitySweep {
    /// `(max X − min X)/(max value − min value)` over the successful points
    pub fn sensitivity(&self) -> Option<f64> {
        let ok: Vec<(f64, f64)> = self
            .values
            .iter()
            .zip(&self.conversions)
            .filter_map(|(v, x)| x.map(|x| (*v, x)))
            .collect();
        if ok.len() < 2 {
            return None;
        }
        let (v_min, v_max) = min_max(ok.iter().map(|p| p.0));
        let (x_min, x_max) = min_max(ok.iter().map(|p| p.1));
        if v_max == v_min {
            return None;
        }
        Some((x_max - x_min) / (v_max - v_min))
    }

    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(row![self.variable.label(), "X, %"]);
        for (v, x) in self.values.iter().zip(&self.conversions) {
            let x = x.map_or("failed".to_string(), |x| format!("{:.3}", x));
            table.add_row(row![format!("{:.3}", v), x]);
        }
        table.printstd();
        match self.sensitivity() {
            Some(s) => println!("ΔX/Δ({}) = {:.4}", self.variable.label(), s),
            None => println!("ΔX/Δ({}) undefined", self.variable.label()),
        }
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Final conversion on the grid `x_values × y_values`; `conversions[i][j]` is at `(x_values[j], y_values[i])`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSurface {
    pub x_variable: OperatingVariable,
    pub y_variable: OperatingVariable,
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub conversions: Vec<Vec<Option<f64>>>,
}

impl ResponseSurface {
    /// grid point of the highest conversion
    pub fn best(&self) -> Option<(f64, f64, f64)> {
        let mut best: Option<(f64, f64, f64)> = None;
        for (i, row) in self.conversions.iter().enumerate() {
            for (j, x) in row.iter().enumerate() {
                if let Some(x) = x {
                    if best.is_none_or(|b| *x > b.2) {
                        best = Some((self.x_values[j], self.y_values[i], *x));
                    }
                }
            }
        }
        best
    }

    pub fn pretty_print(&self) {
        let mut table = Table::new();
        let mut header = vec![format!("{} \\ {}", self.y_variable.label(), self.x_variable.label())];
        header.extend(self.x_values.iter().map(|x| format!("{:.2}", x)));
        table.add_row(Row::new(header.iter().map(|h| Cell::new(h)).collect()));
        for (y, row) in self.y_values.iter().zip(&self.conversions) {
            let mut cells = vec![format!("{:.2}", y)];
            cells.extend(
                row.iter()
                    .map(|x| x.map_or("-".to_string(), |x| format!("{:.2}", x))),
            );
            table.add_row(Row::new(cells.iter().map(|c| Cell::new(c)).collect()));
        }
        table.printstd();
    }
}

/// One combination of a factorial sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepCase {
    pub point: OperatingPoint,
    /// final conversion, %; `None` where the simulation failed
    pub conversion: Option<f64>,
}

/// Final conversion at every combination of the swept values, first variable varying slowest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametricSweep {
    pub variables: Vec<OperatingVariable>,
    pub cases: Vec<SweepCase>,
}

impl ParametricSweep {
    pub fn len(&self) -> usize {
        self.cases.len()
    }
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
    pub fn failed(&self) -> usize {
        self.cases.iter().filter(|c| c.conversion.is_none()).count()
    }

    pub fn best(&self) -> Option<&SweepCase> {
        self.cases
            .iter()
            .filter(|c| c.conversion.is_some())
            .max_by(|a, b| a.conversion.partial_cmp(&b.conversion).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn pretty_print(&self) {
        let mut table = Table::new();
        let mut header: Vec<String> = self.variables.iter().map(|v| v.label().to_string()).collect();
        header.push("X, %".to_string());
        table.add_row(Row::new(header.iter().map(|h| Cell::new(h)).collect()));
        for case in &self.cases {
            let mut cells: Vec<String> = self
                .variables
                .iter()
                .map(|v| format!("{:.3}", v.get(&case.point)))
                .collect();
            cells.push(case.conversion.map_or("failed".to_string(), |x| format!("{:.3}", x)));
            table.add_row(Row::new(cells.iter().map(|c| Cell::new(c)).collect()));
        }
        table.printstd();
        if let Some(best) = self.best() {
            println!(
                "best of {} combinations ({} failed): X = {:.3} %",
                self.len(),
                self.failed(),
                best.conversion.unwrap_or(0.0)
            );
        }
    }
}

impl OperationalOptimizer {
    fn conversion_or_none(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        point: &OperatingPoint,
    ) -> Option<f64> {
        match conversion_at(
            self.model(),
            initial_conditions,
            reaction_time,
            &self.settings.scaling,
            point,
        ) {
            Ok(x) if x.is_finite() => Some(x),
            Ok(x) => {
                debug!("non-finite conversion {} at {:?}", x, point);
                None
            }
            Err(e) => {
                debug!("sweep point {:?} failed: {}", point, e);
                None
            }
        }
    }

    /// Final conversion with `variable` set to each of `values`, other variables at `base`.
    pub fn sweep(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        base: &OperatingPoint,
        variable: OperatingVariable,
        values: &[f64],
    ) -> Result<SensitivitySweep, ConfigurationError> {
        initial_conditions.validate()?;
        let conversions = values
            .iter()
            .map(|v| {
                let mut point = *base;
                variable.set(&mut point, *v);
                self.conversion_or_none(initial_conditions, reaction_time, &point)
            })
            .collect();
        Ok(SensitivitySweep {
            variable,
            values: values.to_vec(),
            conversions,
        })
    }

    /// Sweeps of every operating variable across its bounds with `points` samples each.
    pub fn sensitivity_analysis(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        base: &OperatingPoint,
        bounds: &OperatingBounds,
        points: usize,
    ) -> Result<Vec<SensitivitySweep>, ConfigurationError> {
        bounds.validate()?;
        let mut sweeps = Vec::new();
        for variable in OperatingVariable::iter() {
            let b = variable.bounds(bounds);
            let sweep = self.sweep(
                initial_conditions,
                reaction_time,
                base,
                variable,
                &linspace(b.lower, b.upper, points),
            )?;
            info!(
                "sensitivity to {}: {:?}",
                variable.label(),
                sweep.sensitivity()
            );
            sweeps.push(sweep);
        }
        Ok(sweeps)
    }

    pub fn response_surface(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        base: &OperatingPoint,
        (x_variable, x_values): (OperatingVariable, &[f64]),
        (y_variable, y_values): (OperatingVariable, &[f64]),
    ) -> Result<ResponseSurface, ConfigurationError> {
        if x_variable == y_variable {
            return Err(ConfigurationError::InvalidSettings(format!(
                "response surface needs two different variables, got {:?} twice",
                x_variable
            )));
        }
        initial_conditions.validate()?;
        let conversions = y_values
            .iter()
            .map(|y| {
                x_values
                    .iter()
                    .map(|x| {
                        let mut point = *base;
                        x_variable.set(&mut point, *x);
                        y_variable.set(&mut point, *y);
                        self.conversion_or_none(initial_conditions, reaction_time, &point)
                    })
                    .collect()
            })
            .collect();
        Ok(ResponseSurface {
            x_variable,
            y_variable,
            x_values: x_values.to_vec(),
            y_values: y_values.to_vec(),
            conversions,
        })
    }

    /// Final conversion at every combination of `grid` values (Cartesian product), the variables
    /// not in `grid` staying at `base`.
    pub fn parametric_sweep(
        &self,
        initial_conditions: &InitialConditions,
        reaction_time: f64,
        base: &OperatingPoint,
        grid: &[(OperatingVariable, Vec<f64>)],
    ) -> Result<ParametricSweep, ConfigurationError> {
        if grid.is_empty() {
            return Err(ConfigurationError::InvalidSettings(
                "parametric sweep needs at least one variable".to_string(),
            ));
        }
        for (i, (variable, values)) in grid.iter().enumerate() {
            if values.is_empty() {
                return Err(ConfigurationError::InvalidSettings(format!(
                    "no values given for {:?}",
                    variable
                )));
            }
            if grid[..i].iter().any(|(other, _)| other == variable) {
                return Err(ConfigurationError::InvalidSettings(format!(
                    "{:?} appears twice in the parametric sweep",
                    variable
                )));
            }
        }
        initial_conditions.validate()?;
        let mut points = vec![*base];
        for (variable, values) in grid {
            points = points
                .iter()
                .flat_map(|point| {
                    values.iter().map(move |v| {
                        let mut next = *point;
                        variable.set(&mut next, *v);
                        next
                    })
                })
                .collect();
        }
        info!(
            "parametric sweep over {:?}: {} combinations",
            grid.iter().map(|(v, _)| *v).collect::<Vec<_>>(),
            points.len()
        );
        let cases = points
            .into_iter()
            .map(|point| SweepCase {
                point,
                conversion: self.conversion_or_none(initial_conditions, reaction_time, &point),
            })
            .collect();
        Ok(ParametricSweep {
            variables: grid.iter().map(|(v, _)| *v).collect(),
            cases,
        })
    }
}
