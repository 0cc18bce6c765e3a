//! Reaction schemes of the transesterification.
//!
//! Every scheme is written as `dy/dt = S·r(y)`: a stoichiometric matrix `S` (state components × steps)
//! and a vector of step rates `r`. Each scheme also gives `r` as symbolic expressions, which the stiff
//! solver differentiates for its Newton iterations. Linear invariants of `S` (glyceride balance,
//! ester + methanol balance) are therefore exact properties of the right-hand side.
//!
//! | variant | state | steps |
//! |---|---|---|
//! | [`ConversionScheme`] | `[X]` | `dX/dt = k·(1−X)·ratio/3` |
//! | [`OneStepScheme`] | `[TG, MeOH, FAME, GL]` | `r = kf·TG·MeOH^n − kr·FAME^m·GL^p` |
//! | [`ThreeStepScheme`] | `[TG, DG, MG, GL, MeOH, FAME]` | TG⇌DG⇌MG⇌GL |
//!
//! The scalar conversion form and the mass-action form describe the same overall reaction.
//! Under a large methanol excess (MeOH ≈ const) they coincide when
//! `k_conversion = 3·k_mass_action·C_MeOH,0^n / ratio`, see [`conversion_rate_constant`].
use crate::Kinetics::arrhenius::RateContext;
use crate::Kinetics::kinetic_errors::ConfigurationError;
use crate::Kinetics::species::Species;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use enum_dispatch::enum_dispatch;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

#[enum_dispatch]
pub trait ReactionScheme {
    fn name(&self) -> String;
    /// number of elementary steps (forward rate constants)
    fn step_count(&self) -> usize;
    fn supports_reversible(&self) -> bool {
        true
    }
    /// species whose concentrations are reported, in reporting order
    fn tracked_species(&self) -> &'static [Species];
    /// symbol of each state component
    fn state_labels(&self) -> Vec<String>;
    fn state_len(&self) -> usize {
        self.state_labels().len()
    }
    fn stoichiometry(&self) -> DMatrix<f64>;
    /// state at t = 0 from initial concentrations given in `tracked_species` order
    fn initial_state(&self, c0: &[f64]) -> Vec<f64>;
    fn rates(&self, y: &[f64], ctx: &RateContext, r: &mut [f64]);
    /// concentrations in `tracked_species` order
    fn concentrations(&self, y: &[f64], c0: &[f64], out: &mut [f64]);
    /// step rates with rate constants as symbols `k1`, `k1r`, ...
    fn symbolic_rates(&self, reversible: bool) -> Vec<Expr>;
}

/// Tagged mechanism, chosen once when the model is built.
#[enum_dispatch(ReactionScheme)]
#[derive(Debug, Clone, PartialEq)]
pub enum Mechanism {
    OneStepConversion(ConversionScheme),
    OneStep(OneStepScheme),
    ThreeStep(ThreeStepScheme),
}

impl Mechanism {
    pub fn one_step_conversion() -> Self {
        Mechanism::OneStepConversion(ConversionScheme)
    }
    /// first order in every species
    pub fn one_step() -> Self {
        Mechanism::OneStep(OneStepScheme::default())
    }
    pub fn one_step_with_orders(
        methanol_order: f64,
        fame_order: f64,
        glycerol_order: f64,
    ) -> Result<Self, ConfigurationError> {
        let scheme = OneStepScheme {
            methanol_order,
            fame_order,
            glycerol_order,
        };
        scheme.validate()?;
        Ok(Mechanism::OneStep(scheme))
    }
    pub fn three_step() -> Self {
        Mechanism::ThreeStep(ThreeStepScheme)
    }
    /// labels of the rate constants: "forward"/"reverse" for one step, "1".."3" and "1r".."3r" otherwise
    pub fn step_labels(&self, reversible: bool) -> Vec<String> {
        let n = self.step_count();
        let mut labels: Vec<String> = if n == 1 {
            vec!["forward".to_string()]
        } else {
            (1..=n).map(|i| i.to_string()).collect()
        };
        if reversible {
            if n == 1 {
                labels.push("reverse".to_string());
            } else {
                labels.extend((1..=n).map(|i| format!("{}r", i)));
            }
        }
        labels
    }
}

/// Rate-constant conversion from the mass-action 1-step form to the scalar conversion form,
/// exact in the limit of a constant methanol concentration.
pub fn conversion_rate_constant(
    k_mass_action: f64,
    c_tg0: f64,
    molar_ratio: f64,
    methanol_order: f64,
) -> f64 {
    let c_meoh0 = molar_ratio * c_tg0;
    3.0 * k_mass_action * c_meoh0.powf(methanol_order) / molar_ratio
}

/// c^n, clipped at zero concentration for fractional orders
fn power(c: f64, n: f64) -> f64 {
    if n == 1.0 {
        c
    } else if n == 0.0 {
        1.0
    } else {
        c.max(0.0).powf(n)
    }
}

fn symbolic_power(name: &str, n: f64) -> Expr {
    let base = Expr::Var(name.to_owned());
    if n == 1.0 {
        base
    } else {
        base.pow(Expr::Const(n))
    }
}

/// symbol of a rate constant: `k1` forward, `k1r` reverse
pub fn rate_constant_symbol(step: usize, reverse: bool) -> String {
    if reverse {
        format!("k{}r", step + 1)
    } else {
        format!("k{}", step + 1)
    }
}

fn k_sym(step: usize, reverse: bool) -> Expr {
    Expr::Var(rate_constant_symbol(step, reverse))
}

//////////////////////////////////////////////////////////////////////////////////
/// Pseudo-first-order scalar form, irreversible: dX/dt = k·(1−X)·excess
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConversionScheme;

const ONE_STEP_SPECIES: [Species; 4] = [Species::TG, Species::MeOH, Species::FAME, Species::GL];

impl ReactionScheme for ConversionScheme {
    fn name(&self) -> String {
        "1-step (conversion form)".to_string()
    }
    fn step_count(&self) -> usize {
        1
    }
    fn supports_reversible(&self) -> bool {
        false
    }
    fn tracked_species(&self) -> &'static [Species] {
        &ONE_STEP_SPECIES
    }
    fn state_labels(&self) -> Vec<String> {
        vec!["X".to_string()]
    }
    fn stoichiometry(&self) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, 1.0)
    }
    fn initial_state(&self, _c0: &[f64]) -> Vec<f64> {
        vec![0.0]
    }
    fn rates(&self, y: &[f64], ctx: &RateContext, r: &mut [f64]) {
        r[0] = ctx.forward[0] * (1.0 - y[0]) * ctx.methanol_excess;
    }
    fn concentrations(&self, y: &[f64], c0: &[f64], out: &mut [f64]) {
        let x = y[0];
        let tg0 = c0[0];
        out[0] = tg0 * (1.0 - x);
        // the scalar form ignores methanol depletion; below a 3:1 ratio MeOH runs out first
        out[1] = (c0[1] - 3.0 * tg0 * x).max(0.0);
        out[2] = c0[2] + 3.0 * tg0 * x;
        out[3] = c0[3] + tg0 * x;
    }
    fn symbolic_rates(&self, _reversible: bool) -> Vec<Expr> {
        let x = Expr::Var("X".to_owned());
        let excess = Expr::Var("excess".to_owned());
        vec![k_sym(0, false) * (Expr::Const(1.0) - x) * excess]
    }
}

//////////////////////////////////////////////////////////////////////////////////
/// Overall mass-action step TG + 3 MeOH ⇌ 3 FAME + GL
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OneStepScheme {
    /// order in methanol of the forward rate
    pub methanol_order: f64,
    /// order in methyl ester of the reverse rate
    pub fame_order: f64,
    /// order in glycerol of the reverse rate
    pub glycerol_order: f64,
}

impl Default for OneStepScheme {
    fn default() -> Self {
        OneStepScheme {
            methanol_order: 1.0,
            fame_order: 1.0,
            glycerol_order: 1.0,
        }
    }
}

impl OneStepScheme {
    fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, value) in [
            ("methanol_order", self.methanol_order),
            ("fame_order", self.fame_order),
            ("glycerol_order", self.glycerol_order),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidReactionOrder {
                    name: name.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

impl ReactionScheme for OneStepScheme {
    fn name(&self) -> String {
        "1-step (mass action)".to_string()
    }
    fn step_count(&self) -> usize {
        1
    }
    fn tracked_species(&self) -> &'static [Species] {
        &ONE_STEP_SPECIES
    }
    fn state_labels(&self) -> Vec<String> {
        ONE_STEP_SPECIES.iter().map(|s| s.name().to_string()).collect()
    }
    fn stoichiometry(&self) -> DMatrix<f64> {
        DMatrix::from_column_slice(4, 1, &[-1.0, -3.0, 3.0, 1.0])
    }
    fn initial_state(&self, c0: &[f64]) -> Vec<f64> {
        c0.to_vec()
    }
    fn rates(&self, y: &[f64], ctx: &RateContext, r: &mut [f64]) {
        r[0] = ctx.forward[0] * y[0] * power(y[1], self.methanol_order)
            - ctx.reverse[0] * power(y[2], self.fame_order) * power(y[3], self.glycerol_order);
    }
    fn concentrations(&self, y: &[f64], _c0: &[f64], out: &mut [f64]) {
        out.copy_from_slice(&y[..4]);
    }
    fn symbolic_rates(&self, reversible: bool) -> Vec<Expr> {
        let forward = k_sym(0, false)
            * Expr::Var("TG".to_owned())
            * symbolic_power("MeOH", self.methanol_order);
        if reversible {
            let reverse = k_sym(0, true)
                * symbolic_power("FAME", self.fame_order)
                * symbolic_power("GL", self.glycerol_order);
            vec![forward - reverse]
        } else {
            vec![forward]
        }
    }
}

//////////////////////////////////////////////////////////////////////////////////
/// Stepwise TG ⇌ DG ⇌ MG ⇌ GL, each step consuming one MeOH and releasing one FAME
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThreeStepScheme;

const THREE_STEP_SPECIES: [Species; 6] = [
    Species::TG,
    Species::DG,
    Species::MG,
    Species::GL,
    Species::MeOH,
    Species::FAME,
];

// state indices
const TG: usize = 0;
const DG: usize = 1;
const MG: usize = 2;
const GL: usize = 3;
const MEOH: usize = 4;
const FAME: usize = 5;

impl ReactionScheme for ThreeStepScheme {
    fn name(&self) -> String {
        "3-step".to_string()
    }
    fn step_count(&self) -> usize {
        3
    }
    fn tracked_species(&self) -> &'static [Species] {
        &THREE_STEP_SPECIES
    }
    fn state_labels(&self) -> Vec<String> {
        THREE_STEP_SPECIES
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }
    fn stoichiometry(&self) -> DMatrix<f64> {
        #[rustfmt::skip]
        let s = DMatrix::from_row_slice(6, 3, &[
            -1.0,  0.0,  0.0, // TG
             1.0, -1.0,  0.0, // DG
             0.0,  1.0, -1.0, // MG
             0.0,  0.0,  1.0, // GL
            -1.0, -1.0, -1.0, // MeOH
             1.0,  1.0,  1.0, // FAME
        ]);
        s
    }
    fn initial_state(&self, c0: &[f64]) -> Vec<f64> {
        c0.to_vec()
    }
    fn rates(&self, y: &[f64], ctx: &RateContext, r: &mut [f64]) {
        let (k, kr) = (&ctx.forward, &ctx.reverse);
        r[0] = k[0] * y[TG] * y[MEOH] - kr[0] * y[DG] * y[FAME];
        r[1] = k[1] * y[DG] * y[MEOH] - kr[1] * y[MG] * y[FAME];
        r[2] = k[2] * y[MG] * y[MEOH] - kr[2] * y[GL] * y[FAME];
    }
    fn concentrations(&self, y: &[f64], _c0: &[f64], out: &mut [f64]) {
        out.copy_from_slice(&y[..6]);
    }
    fn symbolic_rates(&self, reversible: bool) -> Vec<Expr> {
        let v = |s: &str| Expr::Var(s.to_owned());
        let pairs = [("TG", "DG"), ("DG", "MG"), ("MG", "GL")];
        pairs
            .iter()
            .enumerate()
            .map(|(i, (reactant, product))| {
                let forward = k_sym(i, false) * v(reactant) * v("MeOH");
                if reversible {
                    forward - k_sym(i, true) * v(product) * v("FAME")
                } else {
                    forward
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn context() -> RateContext {
        RateContext {
            forward: [0.05, 0.215, 0.242],
            reverse: [0.11, 1.228, 0.007],
            methanol_excess: 2.0,
        }
    }

    #[test]
    fn test_fractional_orders_clip_negative_concentrations() {
        let mech = Mechanism::one_step_with_orders(1.5, 0.5, 2.0).unwrap();
        let ctx = context();
        let mut r = [0.0];
        mech.rates(&[0.4, -1e-12, 0.3, 0.1], &ctx, &mut r);
        assert!(r[0].is_finite());
        assert_relative_eq!(r[0], -0.11 * 0.3f64.sqrt() * 0.01, epsilon = 1e-14);
        mech.rates(&[0.4, 3.0, 0.0, 0.1], &ctx, &mut r);
        assert_relative_eq!(r[0], 0.05 * 0.4 * 3.0f64.powf(1.5), epsilon = 1e-14);
    }

    #[test]
    fn test_conversion_scheme_methanol_exhausted_below_stoichiometric_ratio() {
        // ratio 2:1, full conversion would need 3:1
        let mech = Mechanism::one_step_conversion();
        let c0 = [0.5, 1.0, 0.0, 0.0];
        let mut out = [0.0; 4];
        mech.concentrations(&[0.9], &c0, &mut out);
        assert_eq!(out[1], 0.0);
        assert_relative_eq!(out[2], 1.35, epsilon = 1e-14);
        mech.concentrations(&[0.5], &c0, &mut out);
        assert_relative_eq!(out[1], 0.25, epsilon = 1e-14);
    }

    #[test]
    fn test_stoichiometry_conserves_glycerides() {
        let s = Mechanism::three_step().stoichiometry();
        for step in 0..3 {
            let glycerides: f64 = (0..4).map(|i| s[(i, step)]).sum();
            assert_eq!(glycerides, 0.0);
            // one methanol consumed per ester released
            assert_eq!(s[(MEOH, step)] + s[(FAME, step)], 0.0);
        }
        let s1 = Mechanism::one_step().stoichiometry();
        assert_eq!(s1[(0, 0)] + s1[(3, 0)], 0.0);
        assert_eq!(s1[(1, 0)] + s1[(2, 0)], 0.0);
    }

    #[test]
    fn test_conversion_scheme_reports_stoichiometric_products() {
        let mech = Mechanism::one_step_conversion();
        let c0 = [0.5, 4.5, 0.0, 0.0];
        let mut out = [0.0; 4];
        mech.concentrations(&[0.4], &c0, &mut out);
        assert_relative_eq!(out[0], 0.3, epsilon = 1e-14);
        assert_relative_eq!(out[1], 4.5 - 0.6, epsilon = 1e-14);
        assert_relative_eq!(out[2], 0.6, epsilon = 1e-14);
        assert_relative_eq!(out[3], 0.2, epsilon = 1e-14);
        assert!(!mech.supports_reversible());
    }

    #[test]
    fn test_invalid_orders_rejected() {
        assert!(Mechanism::one_step_with_orders(-1.0, 1.0, 1.0).is_err());
        assert!(Mechanism::one_step_with_orders(1.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(
            Mechanism::one_step().step_labels(true),
            vec!["forward".to_string(), "reverse".to_string()]
        );
        assert_eq!(
            Mechanism::three_step().step_labels(true),
            vec!["1", "2", "3", "1r", "2r", "3r"]
        );
        assert_eq!(Mechanism::three_step().step_labels(false).len(), 3);
    }

    #[test]
    fn test_conversion_rate_constant_first_order() {
        // n = 1: k_conv = 3·k·C_TG0
        assert_relative_eq!(conversion_rate_constant(0.2, 0.5, 30.0, 1.0), 0.3);
    }
}
