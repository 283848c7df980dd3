//! Vector-valued functions and differential equation systems built by
//! ordered accumulation of expression components.

use nalgebra::DVector;

use super::base::{Error, Shape};
use super::constraint::ConstraintComponent;
use super::expr::Expression;
use super::variable::{VariableKind, VariableSet};
use crate::eval::{self, EvaluationPoint};

/// A vector-valued function: an ordered sequence of column-vector expression
/// components.
///
/// The function exclusively owns its component trees; appending an
/// expression copies the (immutable) tree, so the caller cannot mutate it
/// afterwards. Distinct-variable counts are maintained over the whole
/// accumulated tree set, deduplicated by `(kind, ordinal)`.
#[derive(Debug, Clone, Default)]
pub struct Function {
    components: Vec<Expression>,
    dim: usize,
    variables: VariableSet,
}

impl Function {
    /// Creates an empty function with `dim == 0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an output component.
    ///
    /// The component must be a column vector; its row count extends the
    /// function dimension. Returns `&mut Self` so appends can be chained.
    pub fn push(&mut self, expr: impl Into<Expression>) -> Result<&mut Self, Error> {
        let expr = expr.into();

        if expr.cols() != 1 {
            return Err(Error::DimensionMismatch {
                lhs: expr.shape(),
                rhs: Shape::new(expr.rows(), 1),
            });
        }

        self.dim += expr.rows();
        expr.collect_variables(&mut self.variables);
        self.components.push(expr);

        Ok(self)
    }

    /// Gets the output dimension (sum of component row counts).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Gets the appended components in order.
    pub fn components(&self) -> &[Expression] {
        &self.components
    }

    /// Gets the distinct variable slots referenced by all components.
    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    /// Gets the number of distinct differential states referenced.
    pub fn nx(&self) -> usize {
        self.variables.count(VariableKind::DifferentialState)
    }

    /// Gets the number of distinct controls referenced.
    pub fn nu(&self) -> usize {
        self.variables.count(VariableKind::Control)
    }

    /// Gets the number of distinct parameters referenced.
    pub fn np(&self) -> usize {
        self.variables.count(VariableKind::Parameter)
    }

    /// Gets the number of distinct intermediate states referenced.
    pub fn n(&self) -> usize {
        self.variables.count(VariableKind::IntermediateState)
    }

    /// Evaluates all components at the given point, producing a vector of
    /// length [`dim`](Function::dim).
    ///
    /// Evaluation is pure; repeated evaluation at the same point returns
    /// bit-identical results.
    pub fn evaluate(&self, point: &EvaluationPoint) -> Result<DVector<f64>, Error> {
        eval::evaluate_components(
            self.components.iter().map(|expr| (expr, expr.rows())),
            self.dim,
            &self.variables,
            point,
        )
    }
}

/// One bound of a time horizon: a numeric constant or a free (optimized)
/// scalar parameter.
#[derive(Debug, Clone)]
pub enum HorizonBound {
    /// Fixed numeric bound.
    Fixed(f64),
    /// Bound given by a parameter variable, optimized by the solver.
    Free(Expression),
}

impl HorizonBound {
    /// Creates a free bound from a scalar parameter variable.
    ///
    /// Fails with [`InvalidHorizon`](Error::InvalidHorizon) when the
    /// expression is not a bare scalar parameter leaf.
    pub fn parameter(expr: &Expression) -> Result<Self, Error> {
        let is_parameter = expr
            .as_variable()
            .map(|var| var.kind() == VariableKind::Parameter)
            .unwrap_or(false);

        if is_parameter && expr.shape().is_scalar() {
            Ok(HorizonBound::Free(expr.clone()))
        } else {
            Err(Error::InvalidHorizon)
        }
    }

    /// Gets the numeric value of a fixed bound.
    pub fn fixed(&self) -> Option<f64> {
        match self {
            HorizonBound::Fixed(value) => Some(*value),
            HorizonBound::Free(_) => None,
        }
    }
}

impl From<f64> for HorizonBound {
    fn from(value: f64) -> Self {
        HorizonBound::Fixed(value)
    }
}

/// An ODE system: an ordered sequence of `dot(state) == expression`
/// components over a time horizon.
#[derive(Debug, Clone, Default)]
pub struct DifferentialEquation {
    start: Option<HorizonBound>,
    end: Option<HorizonBound>,
    equations: Vec<(Expression, Expression)>,
    dim: usize,
    variables: VariableSet,
}

impl DifferentialEquation {
    /// Creates an empty system with an unspecified horizon.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty system over the horizon `[start, end]`.
    pub fn with_horizon(start: impl Into<HorizonBound>, end: impl Into<HorizonBound>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            ..Self::default()
        }
    }

    /// Appends an equation component.
    ///
    /// Only equality components of the form `dot(state) == expression` are
    /// accepted; any other shape fails with
    /// [`InvalidEquationForm`](Error::InvalidEquationForm). The right-hand
    /// side must match the state's shape or be scalar, in which case it
    /// applies to every row of the state. Distinct-variable counts
    /// accumulate over both sides of every appended equation.
    pub fn push(&mut self, component: ConstraintComponent) -> Result<&mut Self, Error> {
        let (lhs, rhs) = component.equality().ok_or(Error::InvalidEquationForm)?;

        if lhs.derivative_of().is_none() || lhs.cols() != 1 {
            return Err(Error::InvalidEquationForm);
        }

        if rhs.shape() != lhs.shape() && !rhs.shape().is_scalar() {
            return Err(Error::DimensionMismatch {
                lhs: lhs.shape(),
                rhs: rhs.shape(),
            });
        }

        self.dim += lhs.rows();
        lhs.collect_variables(&mut self.variables);
        rhs.collect_variables(&mut self.variables);
        self.equations.push((lhs.clone(), rhs.clone()));

        Ok(self)
    }

    /// Gets the start of the horizon, if specified.
    pub fn start(&self) -> Option<&HorizonBound> {
        self.start.as_ref()
    }

    /// Gets the end of the horizon, if specified.
    pub fn end(&self) -> Option<&HorizonBound> {
        self.end.as_ref()
    }

    /// Gets the collected `(dot(state), right-hand side)` pairs in append
    /// order.
    pub fn equations(&self) -> &[(Expression, Expression)] {
        &self.equations
    }

    /// Gets the number of collected equations (sum of state row counts).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Gets the distinct variable slots referenced by all equations, both
    /// differentiated and right-hand side references.
    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    /// Gets the number of distinct differential states, differentiated or
    /// referenced.
    pub fn nx(&self) -> usize {
        self.variables.count(VariableKind::DifferentialState)
    }

    /// Gets the number of distinct controls referenced.
    pub fn nu(&self) -> usize {
        self.variables.count(VariableKind::Control)
    }

    /// Gets the number of distinct parameters referenced.
    pub fn np(&self) -> usize {
        self.variables.count(VariableKind::Parameter)
    }

    /// Evaluates the right-hand sides at the given point, stacked in append
    /// order. A scalar right-hand side of a vector state fills all of the
    /// state's rows.
    pub fn evaluate(&self, point: &EvaluationPoint) -> Result<DVector<f64>, Error> {
        eval::evaluate_components(
            self.equations.iter().map(|(lhs, rhs)| (rhs, lhs.rows())),
            self.dim,
            &self.variables,
            point,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::dot;
    use crate::core::variable::VariableRegistry;

    #[test]
    fn empty_function_has_zero_dim() {
        let f = Function::new();

        assert_eq!(f.dim(), 0);
        assert_eq!(f.nx(), 0);
    }

    #[test]
    fn push_extends_dim_and_counts() {
        let mut vars = VariableRegistry::new();
        let x = vars.differential_state();

        let mut f = Function::new();
        f.push(x.add(1.0).unwrap().exp()).unwrap();

        assert_eq!(f.dim(), 1);
        assert_eq!(f.nx(), 1);
        assert_eq!(f.nu(), 0);
    }

    #[test]
    fn push_requires_column_vector() {
        let mut vars = VariableRegistry::new();
        let x = vars.declare(VariableKind::DifferentialState, None, 1, 2);

        let mut f = Function::new();
        assert!(matches!(
            f.push(&x),
            Err(Error::DimensionMismatch { .. })
        ));
        assert_eq!(f.dim(), 0);
    }

    #[test]
    fn counts_deduplicate_across_components() {
        let mut vars = VariableRegistry::new();
        let x = vars.differential_state();
        let u = vars.control();

        let mut f = Function::new();
        f.push(x.mul(&x).unwrap())
            .unwrap()
            .push(x.add(&u).unwrap())
            .unwrap();

        assert_eq!(f.dim(), 2);
        assert_eq!(f.nx(), 1);
        assert_eq!(f.nu(), 1);
    }

    #[test]
    fn differential_equation_accepts_dot_equalities() {
        let mut vars = VariableRegistry::new();
        let s = vars.differential_state();
        let v = vars.differential_state();
        let m = vars.differential_state();
        let u = vars.control();

        let mut f = DifferentialEquation::with_horizon(0.0, 10.0);
        f.push(dot(&s).equals(&v).unwrap()).unwrap();
        f.push(
            dot(&v)
                .equals(
                    u.sub(v.mul(&v).unwrap().mul(0.2).unwrap())
                        .unwrap()
                        .div(&m)
                        .unwrap(),
                )
                .unwrap(),
        )
        .unwrap();
        f.push(
            dot(&m)
                .equals(u.mul(&u).unwrap().mul(-0.01).unwrap())
                .unwrap(),
        )
        .unwrap();

        assert_eq!(f.dim(), 3);
        assert_eq!(f.nx(), 3);
        assert_eq!(f.nu(), 1);
        assert_eq!(f.start().and_then(HorizonBound::fixed), Some(0.0));
        assert_eq!(f.end().and_then(HorizonBound::fixed), Some(10.0));
    }

    #[test]
    fn differential_equation_rejects_other_shapes() {
        let mut vars = VariableRegistry::new();
        let s = vars.differential_state();
        let v = vars.differential_state();
        let u = vars.control();

        let mut f = DifferentialEquation::new();

        // Not an equality at all.
        assert!(matches!(
            f.push(v.geq(0.0).unwrap()),
            Err(Error::InvalidEquationForm)
        ));

        // Equality whose left side is not a derivative marker.
        assert!(matches!(
            f.push(s.equals(&v).unwrap()),
            Err(Error::InvalidEquationForm)
        ));

        // Derivative marker of a non-state.
        assert!(matches!(
            f.push(dot(&u).equals(&v).unwrap()),
            Err(Error::InvalidEquationForm)
        ));

        assert_eq!(f.dim(), 0);
    }

    #[test]
    fn right_hand_side_must_match_the_state_or_be_scalar() {
        let mut vars = VariableRegistry::new();
        let s = vars.differential_state();
        let x = vars.declare(VariableKind::DifferentialState, None, 3, 1);

        let mut f = DifferentialEquation::new();
        assert!(matches!(
            f.push(dot(&s).equals(&x).unwrap()),
            Err(Error::DimensionMismatch { .. })
        ));
        assert_eq!(f.dim(), 0);

        f.push(dot(&x).equals(2.0).unwrap()).unwrap();
        assert_eq!(f.dim(), 3);
    }

    #[test]
    fn free_horizon_requires_a_parameter() {
        let mut vars = VariableRegistry::new();
        let t1 = vars.parameter();
        let u = vars.control();

        let end = HorizonBound::parameter(&t1).unwrap();
        let f = DifferentialEquation::with_horizon(0.0, end);
        assert!(f.end().unwrap().fixed().is_none());

        assert!(matches!(
            HorizonBound::parameter(&u),
            Err(Error::InvalidHorizon)
        ));
        assert!(matches!(
            HorizonBound::parameter(&t1.add(1.0).unwrap()),
            Err(Error::InvalidHorizon)
        ));
    }
}
