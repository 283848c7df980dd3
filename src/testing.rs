//! Model problems and utilities useful for testing and debugging.
//!
//! The problems are small optimal control formulations with known structure:
//! a rocket flight with a single control, a catalyst mixing problem with two
//! competing objectives and a static two-parameter NLP. [`StubBackend`]
//! stands in for the external solver and records the payload that crosses
//! the boundary.

#![allow(unused)]

use nalgebra::DVector;

use crate::algorithm::{NlpBackend, NlpSolution, OptionKey, OptionSet, OptionValue, SolverStatus};
use crate::core::{
    dot, ConstraintPoint, DifferentialEquation, Error, Expression, Ocp, VariableRegistry,
};

/// Rocket flight over a fixed horizon: three states (position, velocity,
/// mass), one control, a quadratic running cost and boundary constraints.
pub fn rocket_flight(vars: &mut VariableRegistry) -> Result<Ocp, Error> {
    let s = vars.differential_state();
    let v = vars.differential_state();
    let m = vars.differential_state();
    let u = vars.control();

    let mut f = DifferentialEquation::with_horizon(0.0, 10.0);
    f.push(dot(&s).equals(&v)?)?;
    f.push(dot(&v).equals(u.sub(v.mul(&v)?.mul(0.2)?)?.div(&m)?)?)?;
    f.push(dot(&m).equals(u.mul(&u)?.mul(-0.01)?)?)?;

    let mut ocp = Ocp::new(0.0, 10.0, 20);
    ocp.minimize_lagrange_term(u.mul(&u)?)?;
    ocp.subject_to_equation(f);

    ocp.subject_to_at(ConstraintPoint::AtStart, s.equals(0.0)?);
    ocp.subject_to_at(ConstraintPoint::AtStart, v.equals(0.0)?);
    ocp.subject_to_at(ConstraintPoint::AtStart, m.equals(1.0)?);

    ocp.subject_to_at(ConstraintPoint::AtEnd, s.equals(10.0)?);
    ocp.subject_to_at(ConstraintPoint::AtEnd, v.equals(0.0)?);

    ocp.subject_to(v.geq(-0.01)?.leq(1.3)?);

    Ok(ocp)
}

/// Catalyst mixing over a unit horizon: three states, one control and two
/// Mayer terms forming a bi-objective problem.
pub fn catalyst_mixing(vars: &mut VariableRegistry) -> Result<Ocp, Error> {
    let x1 = vars.differential_state();
    let x2 = vars.differential_state();
    let x3 = vars.differential_state();
    let u = vars.control();

    let mut f = DifferentialEquation::with_horizon(0.0, 1.0);
    f.push(dot(&x1).equals(u.mul(x2.mul(10.0)?.sub(&x1)?)?)?)?;
    f.push(
        dot(&x2).equals(
            u.mul(x1.sub(x2.mul(10.0)?)?)?
                .sub(Expression::constant(1.0).sub(&u)?.mul(&x2)?)?,
        )?,
    )?;
    f.push(dot(&x3).equals(u.div(10.0)?)?)?;

    let mut ocp = Ocp::new(0.0, 1.0, 25);
    ocp.minimize_mayer_term_indexed(0, x1.add(&x2)?.sub(1.0)?);
    ocp.minimize_mayer_term_indexed(1, &x3);
    ocp.subject_to_equation(f);

    ocp.subject_to_at(ConstraintPoint::AtStart, x1.equals(1.0)?);
    ocp.subject_to_at(ConstraintPoint::AtStart, x2.equals(0.0)?);
    ocp.subject_to_at(ConstraintPoint::AtStart, x3.equals(0.0)?);

    ocp.subject_to(x1.geq(0.0)?.leq(1.0)?);
    ocp.subject_to(x2.geq(0.0)?.leq(1.0)?);
    ocp.subject_to(x3.geq(0.0)?.leq(1.0)?);
    ocp.subject_to(u.geq(0.0)?.leq(1.0)?);

    Ok(ocp)
}

/// Static two-parameter NLP with no discretization (zero stages).
pub fn static_nlp(vars: &mut VariableRegistry) -> Result<Ocp, Error> {
    let a = vars.parameter();
    let b = vars.parameter();

    let mut nlp = Ocp::new(0.0, 0.0, 0);
    nlp.minimize_mayer_term(a.mul(&a)?.add(b.mul(&b)?)?);
    nlp.subject_to(a.geq(0.08)?);
    nlp.subject_to(a.add(&b)?.add(a.mul(&a)?.mul(0.3)?)?.geq(0.1)?);

    Ok(nlp)
}

/// Backend stub recording the payload that crosses the solver boundary and
/// returning a canned solution.
#[derive(Debug, Default)]
pub struct StubBackend {
    /// Number of solve calls received.
    pub solved: usize,
    /// The validated options received on the last call.
    pub received_options: Vec<(OptionKey, OptionValue)>,
    /// Parameter values to return.
    pub parameters: Option<DVector<f64>>,
}

impl StubBackend {
    /// Creates a stub returning the given parameter values.
    pub fn with_parameters(parameters: DVector<f64>) -> Self {
        Self {
            parameters: Some(parameters),
            ..Self::default()
        }
    }
}

impl NlpBackend for StubBackend {
    const NAME: &'static str = "stub";

    fn solve(&mut self, _ocp: &Ocp, options: &OptionSet) -> NlpSolution {
        self.solved += 1;
        self.received_options = options.iter().collect();

        NlpSolution::new(
            SolverStatus::Successful,
            0.0,
            self.parameters.clone().unwrap_or_else(|| DVector::zeros(0)),
            DVector::zeros(0),
            DVector::zeros(0),
        )
    }
}
