//! Numeric evaluation of functions at a concrete point.
//!
//! An [`EvaluationPoint`] binds a time value and ordinal-indexed numeric
//! vectors to the variable kinds. Evaluation walks each component tree in
//! post order, substituting bound values at the leaves and combining child
//! results per the node's operator. It is pure; repeated evaluation at the
//! same point returns bit-identical results.

use nalgebra::{DMatrix, DVector};
use num_traits::Zero;

use crate::core::{
    BinaryOp, Error, ExprKind, Expression, Shape, UnaryOp, Variable, VariableKind, VariableSet,
};

/// A mutable binding environment for evaluation: a time value and numeric
/// vectors for the ordinal-indexed variable slots.
///
/// The point is owned by the caller and passed by reference into
/// evaluation; it is never retained by a function.
#[derive(Debug, Clone)]
pub struct EvaluationPoint {
    t: f64,
    x: DVector<f64>,
    u: DVector<f64>,
    p: DVector<f64>,
}

impl Default for EvaluationPoint {
    fn default() -> Self {
        Self {
            t: 0.0,
            x: DVector::zeros(0),
            u: DVector::zeros(0),
            p: DVector::zeros(0),
        }
    }
}

impl EvaluationPoint {
    /// Creates a point at time zero with no bound variable slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time value.
    pub fn set_time(&mut self, t: f64) -> &mut Self {
        self.t = t;
        self
    }

    /// Binds the differential state slots.
    pub fn set_states(&mut self, x: DVector<f64>) -> &mut Self {
        self.x = x;
        self
    }

    /// Binds the control slots.
    pub fn set_controls(&mut self, u: DVector<f64>) -> &mut Self {
        self.u = u;
        self
    }

    /// Binds the parameter slots.
    pub fn set_parameters(&mut self, p: DVector<f64>) -> &mut Self {
        self.p = p;
        self
    }

    /// Gets the time value.
    pub fn time(&self) -> f64 {
        self.t
    }

    /// Gets the bound differential state slots.
    pub fn states(&self) -> &DVector<f64> {
        &self.x
    }

    /// Gets the bound control slots.
    pub fn controls(&self) -> &DVector<f64> {
        &self.u
    }

    /// Gets the bound parameter slots.
    pub fn parameters(&self) -> &DVector<f64> {
        &self.p
    }
}

pub(crate) fn evaluate_components<'a>(
    components: impl Iterator<Item = (&'a Expression, usize)>,
    dim: usize,
    variables: &VariableSet,
    point: &EvaluationPoint,
) -> Result<DVector<f64>, Error> {
    let span = variables.span(VariableKind::DifferentialState);
    if point.states().len() < span {
        return Err(Error::DimensionMismatch {
            lhs: Shape::new(span, 1),
            rhs: Shape::new(point.states().len(), 1),
        });
    }

    let mut out = DVector::from_element(dim, f64::zero());
    let mut row = 0;

    // Each component occupies a declared number of output rows; a scalar
    // value fills every row it occupies.
    for (component, rows) in components {
        let value = value_of(component, point)?;
        if is_scalar(&value) {
            for i in 0..rows {
                out[row + i] = value[(0, 0)];
            }
        } else {
            for i in 0..rows {
                out[row + i] = value[(i, 0)];
            }
        }
        row += rows;
    }

    Ok(out)
}

fn value_of(expr: &Expression, point: &EvaluationPoint) -> Result<DMatrix<f64>, Error> {
    match expr.kind() {
        ExprKind::Constant(value) => Ok(DMatrix::from_element(1, 1, *value)),
        ExprKind::Matrix(values) => Ok((**values).clone()),
        ExprKind::Variable(var) => match var.kind() {
            VariableKind::Time => Ok(DMatrix::from_element(1, 1, point.time())),
            VariableKind::DifferentialState => gather(point.states(), var, expr.shape()),
            VariableKind::Control => gather(point.controls(), var, expr.shape()),
            VariableKind::Parameter => gather(point.parameters(), var, expr.shape()),
            // Intermediate states have no binding slots.
            VariableKind::IntermediateState => Err(Error::UnboundVariable {
                kind: var.kind(),
                ordinal: var.ordinal(),
            }),
        },
        ExprKind::Unary(op, inner) => {
            let value = value_of(inner, point)?;
            match op {
                UnaryOp::Neg => Ok(-value),
                UnaryOp::Exp => Ok(value.map(f64::exp)),
                UnaryOp::Ln => Ok(value.map(f64::ln)),
                UnaryOp::Sqrt => Ok(value.map(f64::sqrt)),
                UnaryOp::Sin => Ok(value.map(f64::sin)),
                UnaryOp::Cos => Ok(value.map(f64::cos)),
                // Derivative markers carry no value outside a differential
                // equation.
                UnaryOp::Dot => Err(Error::InvalidEquationForm),
            }
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let left = value_of(lhs, point)?;
            let right = value_of(rhs, point)?;
            combine(*op, left, right)
        }
    }
}

fn combine(op: BinaryOp, lhs: DMatrix<f64>, rhs: DMatrix<f64>) -> Result<DMatrix<f64>, Error> {
    match op {
        BinaryOp::Add => {
            let (lhs, rhs) = broadcast(lhs, rhs);
            Ok(lhs + rhs)
        }
        BinaryOp::Sub => {
            let (lhs, rhs) = broadcast(lhs, rhs);
            Ok(lhs - rhs)
        }
        BinaryOp::Mul => {
            if is_scalar(&lhs) {
                Ok(rhs * lhs[(0, 0)])
            } else if is_scalar(&rhs) {
                Ok(lhs * rhs[(0, 0)])
            } else {
                Ok(lhs * rhs)
            }
        }
        BinaryOp::Div => {
            if is_scalar(&rhs) {
                Ok(lhs / rhs[(0, 0)])
            } else {
                Ok(lhs.zip_map(&rhs, |a, b| a / b))
            }
        }
        BinaryOp::Equal => Err(Error::InvalidEquationForm),
    }
}

fn is_scalar(value: &DMatrix<f64>) -> bool {
    value.nrows() == 1 && value.ncols() == 1
}

fn broadcast(lhs: DMatrix<f64>, rhs: DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    if is_scalar(&lhs) && !is_scalar(&rhs) {
        let expanded = DMatrix::from_element(rhs.nrows(), rhs.ncols(), lhs[(0, 0)]);
        (expanded, rhs)
    } else if is_scalar(&rhs) && !is_scalar(&lhs) {
        let expanded = DMatrix::from_element(lhs.nrows(), lhs.ncols(), rhs[(0, 0)]);
        (lhs, expanded)
    } else {
        (lhs, rhs)
    }
}

fn gather(values: &DVector<f64>, var: &Variable, shape: Shape) -> Result<DMatrix<f64>, Error> {
    let mut out = DMatrix::from_element(shape.rows(), shape.cols(), f64::zero());

    for i in 0..shape.dim() {
        let slot = var.ordinal() + i;
        match values.get(slot) {
            Some(value) => out[i] = *value,
            None => {
                return Err(Error::UnboundVariable {
                    kind: var.kind(),
                    ordinal: slot,
                })
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    use super::*;
    use crate::core::{Function, VariableRegistry};

    #[test]
    fn evaluates_a_scalar_component() {
        let mut vars = VariableRegistry::new();
        let x = vars.differential_state();
        let t = vars.time();

        let mut f = Function::new();
        f.push(x.mul(&x).unwrap().add(&t).unwrap()).unwrap();

        let mut point = EvaluationPoint::new();
        point.set_time(1.0).set_states(dvector![2.0]);

        let result = f.evaluate(&point).unwrap();
        assert_eq!(result.len(), 1);
        assert_relative_eq!(result[0], 5.0);
    }

    #[test]
    fn addition_commutes() {
        let mut vars = VariableRegistry::new();
        let x = vars.differential_state();
        let t = vars.time();

        let a = x.exp();
        let b = t.mul(3.0).unwrap();

        let mut ab = Function::new();
        ab.push(a.add(&b).unwrap()).unwrap();
        let mut ba = Function::new();
        ba.push(b.add(&a).unwrap()).unwrap();

        let mut point = EvaluationPoint::new();
        point.set_time(0.7).set_states(dvector![1.3]);

        assert_eq!(ab.evaluate(&point).unwrap(), ba.evaluate(&point).unwrap());
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let mut vars = VariableRegistry::new();
        let x = vars.differential_state();

        let mut f = Function::new();
        f.push(x.mul(&x).unwrap().sub(x.sqrt()).unwrap()).unwrap();

        let mut point = EvaluationPoint::new();
        point.set_states(dvector![0.37]);

        assert_eq!(f.evaluate(&point).unwrap(), f.evaluate(&point).unwrap());
    }

    #[test]
    fn matrix_components_stack_into_the_output() {
        use nalgebra::dmatrix;

        let mut vars = VariableRegistry::new();
        let x = vars.declare(VariableKind::DifferentialState, None, 3, 1);

        let a = Expression::matrix(dmatrix![
            1.0, 0.0, 0.0;
            0.0, 2.0, 0.0;
            0.0, 0.0, 3.0
        ]);
        let b = Expression::matrix(DMatrix::from_element(3, 1, 1.0));

        let mut f = Function::new();
        f.push(a.mul(&x).unwrap().add(&b).unwrap()).unwrap();

        let mut point = EvaluationPoint::new();
        point.set_states(dvector![1.0, 1.0, 1.0]);

        let result = f.evaluate(&point).unwrap();
        assert_eq!(result, dvector![2.0, 3.0, 4.0]);
    }

    #[test]
    fn short_state_vector_is_a_dimension_mismatch() {
        let mut vars = VariableRegistry::new();
        let x = vars.differential_state();
        let y = vars.differential_state();

        let mut f = Function::new();
        f.push(x.add(&y).unwrap()).unwrap();

        let mut point = EvaluationPoint::new();
        point.set_states(dvector![1.0]);

        assert!(matches!(
            f.evaluate(&point),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn missing_control_binding_is_unbound() {
        let mut vars = VariableRegistry::new();
        let x = vars.differential_state();
        let u = vars.control();

        let mut f = Function::new();
        f.push(x.add(&u).unwrap()).unwrap();

        let mut point = EvaluationPoint::new();
        point.set_states(dvector![1.0]);

        assert!(matches!(
            f.evaluate(&point),
            Err(Error::UnboundVariable {
                kind: VariableKind::Control,
                ordinal: 0,
            })
        ));

        point.set_controls(dvector![0.5]);
        let result = f.evaluate(&point).unwrap();
        assert_relative_eq!(result[0], 1.5);
    }

    #[test]
    fn differential_equation_evaluates_right_hand_sides() {
        use crate::core::{dot, DifferentialEquation};

        let mut vars = VariableRegistry::new();
        let s = vars.differential_state();
        let v = vars.differential_state();

        let mut f = DifferentialEquation::with_horizon(0.0, 10.0);
        f.push(dot(&s).equals(&v).unwrap()).unwrap();
        f.push(dot(&v).equals(v.mul(-0.5).unwrap()).unwrap())
            .unwrap();

        let mut point = EvaluationPoint::new();
        point.set_states(dvector![0.0, 2.0]);

        let result = f.evaluate(&point).unwrap();
        assert_eq!(result, dvector![2.0, -1.0]);
    }

    #[test]
    fn scalar_right_hand_side_fills_a_vector_state() {
        use crate::core::{dot, DifferentialEquation};

        let mut vars = VariableRegistry::new();
        let x = vars.declare(VariableKind::DifferentialState, None, 3, 1);

        let mut f = DifferentialEquation::new();
        f.push(dot(&x).equals(5.0).unwrap()).unwrap();
        assert_eq!(f.dim(), 3);

        let mut point = EvaluationPoint::new();
        point.set_states(dvector![0.0, 0.0, 0.0]);

        let result = f.evaluate(&point).unwrap();
        assert_eq!(result, dvector![5.0, 5.0, 5.0]);
    }
}
