//! Symbolic form of the kinetic equations.
//!
//! The right-hand side `S·r(y)` is rebuilt as RustedSciThe [`Expr`] values with species and rate
//! constants as symbols, so that a mechanism can be printed, differentiated or turned into a closure
//! with `lambdify_owned` and compared against the numeric right-hand side. With the rate constants
//! replaced by numbers ([`rhs_with_constants`]) the same expressions drive the stiff solver.
use crate::Kinetics::arrhenius::{RateContext, ZERO_CELSIUS};
use crate::Kinetics::kinetic_model::KineticModel;
use crate::Kinetics::mechanisms::{Mechanism, ReactionScheme, rate_constant_symbol};
use RustedSciThe::symbolic::symbolic_engine::Expr;

/// `(state symbol, d(state)/dt)` for every state component
pub fn symbolic_rhs(mechanism: &Mechanism, reversible: bool) -> Vec<(String, Expr)> {
    let rates = mechanism.symbolic_rates(reversible);
    let s = mechanism.stoichiometry();
    mechanism
        .state_labels()
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let mut acc: Option<Expr> = None;
            for (j, rate) in rates.iter().enumerate() {
                let c = s[(i, j)];
                if c == 0.0 {
                    continue;
                }
                let term = if c.abs() == 1.0 {
                    rate.clone()
                } else {
                    Expr::Const(c.abs()) * rate.clone()
                };
                acc = Some(match (acc, c > 0.0) {
                    (None, true) => term,
                    (None, false) => -term,
                    (Some(a), true) => a + term,
                    (Some(a), false) => a - term,
                });
            }
            (label, acc.unwrap_or(Expr::Const(0.0)))
        })
        .collect()
}

/// [`symbolic_rhs`] at fixed rate constants and methanol excess, ready for the ODE solver
pub fn rhs_with_constants(
    mechanism: &Mechanism,
    reversible: bool,
    ctx: &RateContext,
) -> Vec<(String, Expr)> {
    let steps = mechanism.step_count();
    symbolic_rhs(mechanism, reversible)
        .into_iter()
        .map(|(label, mut rhs)| {
            for i in 0..steps {
                rhs = rhs.set_variable(&rate_constant_symbol(i, false), ctx.forward[i]);
                if reversible {
                    rhs = rhs.set_variable(&rate_constant_symbol(i, true), ctx.reverse[i]);
                }
            }
            (label, rhs.set_variable("excess", ctx.methanol_excess).symplify())
        })
        .collect()
}

/// `A·exp(−Ea/(R·(T + 273.15)))` with temperature symbol `T` in °C
#[allow(non_snake_case)]
pub fn symbolic_arrhenius(A: f64, Ea: f64, R: f64) -> Expr {
    let T = Expr::Var("T".to_owned());
    Expr::Const(A) * (-Expr::Const(Ea) / (Expr::Const(R) * (T + Expr::Const(ZERO_CELSIUS)))).exp()
}

impl KineticModel {
    /// right-hand side of the model with rate constants as symbols `k1`, `k1r`, ...
    pub fn symbolic_equations(&self) -> Vec<(String, Expr)> {
        symbolic_rhs(self.mechanism(), self.reversibility().is_reversible())
    }

    /// `(k symbol, Arrhenius expression in T)` for every rate constant
    pub fn symbolic_rate_constants(&self) -> Vec<(String, Expr)> {
        let params = self.parameters();
        let r = self.gas_constant();
        let forward = params
            .forward
            .iter()
            .enumerate()
            .map(|(i, p)| (rate_constant_symbol(i, false), symbolic_arrhenius(p.A, p.Ea, r)));
        let reverse = params
            .reverse
            .iter()
            .enumerate()
            .map(|(i, p)| (rate_constant_symbol(i, true), symbolic_arrhenius(p.A, p.Ea, r)));
        forward.chain(reverse).collect()
    }
}
