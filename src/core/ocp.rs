//! The optimal control problem container.

use super::base::Error;
use super::constraint::{ConstraintComponent, ConstraintPoint};
use super::expr::Expression;
use super::function::{DifferentialEquation, HorizonBound};

/// A terminal objective term, optionally tagged with an objective index for
/// multi-objective formulations.
#[derive(Debug, Clone)]
pub struct MayerTerm {
    index: Option<usize>,
    term: Expression,
}

impl MayerTerm {
    /// Gets the objective index, if one was supplied.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Gets the objective expression.
    pub fn term(&self) -> &Expression {
        &self.term
    }
}

/// An optimal control problem: time horizon, discretization stage count,
/// dynamics, objective terms and constraints.
///
/// The container is created once per problem and mutated only through the
/// explicit builder calls below; the solver backend receives it by shared
/// reference and never mutates it. A stage count of zero signals a static
/// (parameter-only) problem with no discretization.
#[derive(Debug, Clone)]
pub struct Ocp {
    start: HorizonBound,
    end: HorizonBound,
    stages: usize,
    dynamics: Vec<DifferentialEquation>,
    mayer_terms: Vec<MayerTerm>,
    lagrange_terms: Vec<Expression>,
    constraints: Vec<(ConstraintPoint, ConstraintComponent)>,
}

impl Ocp {
    /// Creates a problem over the horizon `[start, end]` with the given
    /// number of discretization stages.
    pub fn new(
        start: impl Into<HorizonBound>,
        end: impl Into<HorizonBound>,
        stages: usize,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            stages,
            dynamics: Vec::new(),
            mayer_terms: Vec::new(),
            lagrange_terms: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Appends a terminal objective term without an objective index.
    pub fn minimize_mayer_term(&mut self, term: impl Into<Expression>) {
        self.mayer_terms.push(MayerTerm {
            index: None,
            term: term.into(),
        });
    }

    /// Appends a terminal objective term tagged with an objective index,
    /// distinguishing objectives in a multi-objective formulation.
    pub fn minimize_mayer_term_indexed(&mut self, index: usize, term: impl Into<Expression>) {
        self.mayer_terms.push(MayerTerm {
            index: Some(index),
            term: term.into(),
        });
    }

    /// Gets the number of appended Mayer terms, regardless of whether
    /// indices were supplied or reused.
    pub fn number_of_mayer_terms(&self) -> usize {
        self.mayer_terms.len()
    }

    /// Appends a running-cost objective term.
    ///
    /// The term must be scalar.
    pub fn minimize_lagrange_term(&mut self, term: impl Into<Expression>) -> Result<(), Error> {
        let term = term.into();

        if term.dim() != 1 {
            return Err(Error::DimensionMismatch {
                lhs: term.shape(),
                rhs: super::base::Shape::scalar(),
            });
        }

        self.lagrange_terms.push(term);
        Ok(())
    }

    /// Attaches a constraint applying throughout the horizon.
    pub fn subject_to(&mut self, constraint: ConstraintComponent) {
        self.subject_to_at(ConstraintPoint::Throughout, constraint);
    }

    /// Attaches a constraint applying at the given point of the horizon.
    pub fn subject_to_at(&mut self, point: ConstraintPoint, constraint: ConstraintComponent) {
        self.constraints.push((point, constraint));
    }

    /// Registers a differential equation system as the problem dynamics.
    pub fn subject_to_equation(&mut self, equation: DifferentialEquation) {
        self.dynamics.push(equation);
    }

    /// Gets the start of the horizon.
    pub fn start(&self) -> &HorizonBound {
        &self.start
    }

    /// Gets the end of the horizon.
    pub fn end(&self) -> &HorizonBound {
        &self.end
    }

    /// Gets the discretization stage count.
    pub fn stages(&self) -> usize {
        self.stages
    }

    /// Determines whether the problem is a static (parameter-only) problem
    /// with no discretization.
    pub fn is_static(&self) -> bool {
        self.stages == 0
    }

    /// Gets the registered dynamics.
    pub fn dynamics(&self) -> &[DifferentialEquation] {
        &self.dynamics
    }

    /// Gets the appended Mayer terms in order.
    pub fn mayer_terms(&self) -> &[MayerTerm] {
        &self.mayer_terms
    }

    /// Gets the appended Lagrange terms in order.
    pub fn lagrange_terms(&self) -> &[Expression] {
        &self.lagrange_terms
    }

    /// Gets the attached `(applicability point, constraint)` pairs in order.
    pub fn constraints(&self) -> &[(ConstraintPoint, ConstraintComponent)] {
        &self.constraints
    }
}
