//! Immutable expression trees and their dimension bookkeeping.
//!
//! An [`Expression`] is a tree of constants, matrix literals, variable leaves
//! and operator nodes. Every combinator validates operand shapes and produces
//! a new node; no combinator mutates an operand. Subtrees are shared behind
//! [`Rc`], which is safe because trees are immutable after construction.

use std::fmt;
use std::rc::Rc;

use nalgebra::DMatrix;

use super::base::{Error, Shape};
use super::variable::{Variable, VariableKind, VariableSet};

/// Unary operator of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Elementwise negation.
    Neg,
    /// Elementwise exponential.
    Exp,
    /// Elementwise natural logarithm.
    Ln,
    /// Elementwise square root.
    Sqrt,
    /// Elementwise sine.
    Sin,
    /// Elementwise cosine.
    Cos,
    /// Derivative-of-state marker used on the left side of differential
    /// equation components. Not evaluable.
    Dot,
}

impl UnaryOp {
    fn name(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Exp => "exp",
            UnaryOp::Ln => "ln",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Dot => "dot",
        }
    }
}

/// Binary operator of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Elementwise addition.
    Add,
    /// Elementwise subtraction.
    Sub,
    /// Multiplication, elementwise when one operand is scalar, matrix product
    /// otherwise.
    Mul,
    /// Division by a scalar or elementwise between equal shapes.
    Div,
    /// Equality between two subtrees. Not evaluable; consumed by constraint
    /// and differential equation builders.
    Equal,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Equal => " == ",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ExprKind {
    Constant(f64),
    Matrix(Rc<DMatrix<f64>>),
    Variable(Variable),
    Unary(UnaryOp, Rc<Expression>),
    Binary(BinaryOp, Rc<Expression>, Rc<Expression>),
}

/// An immutable symbolic expression, scalar or matrix valued.
#[derive(Debug, Clone)]
pub struct Expression {
    kind: ExprKind,
    shape: Shape,
}

impl Expression {
    /// Creates a constant scalar expression.
    pub fn constant(value: f64) -> Self {
        Self {
            kind: ExprKind::Constant(value),
            shape: Shape::scalar(),
        }
    }

    /// Creates a constant matrix literal.
    pub fn matrix(values: DMatrix<f64>) -> Self {
        let shape = Shape::new(values.nrows(), values.ncols());
        Self {
            kind: ExprKind::Matrix(Rc::new(values)),
            shape,
        }
    }

    pub(crate) fn variable(var: Variable, shape: Shape) -> Self {
        Self {
            kind: ExprKind::Variable(var),
            shape,
        }
    }

    pub(crate) fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Gets the shape of the expression value.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Gets the number of rows of the expression value.
    pub fn rows(&self) -> usize {
        self.shape.rows()
    }

    /// Gets the number of columns of the expression value.
    pub fn cols(&self) -> usize {
        self.shape.cols()
    }

    /// Gets the dimension (`rows * cols`) of the expression value.
    pub fn dim(&self) -> usize {
        self.shape.dim()
    }

    /// Determines whether the expression is a bare, unmodified variable
    /// reference. Any combinator output reports `false`.
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, ExprKind::Variable(_))
    }

    pub(crate) fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            ExprKind::Variable(var) => Some(var),
            _ => None,
        }
    }

    /// For a `dot(state)` marker, gets the differentiated state leaf.
    pub(crate) fn derivative_of(&self) -> Option<&Variable> {
        match &self.kind {
            ExprKind::Unary(UnaryOp::Dot, inner) => inner
                .as_variable()
                .filter(|var| var.kind() == VariableKind::DifferentialState),
            _ => None,
        }
    }

    /// Elementwise addition.
    pub fn add(&self, rhs: impl Into<Expression>) -> Result<Expression, Error> {
        elementwise(BinaryOp::Add, self, &rhs.into())
    }

    /// Elementwise subtraction.
    pub fn sub(&self, rhs: impl Into<Expression>) -> Result<Expression, Error> {
        elementwise(BinaryOp::Sub, self, &rhs.into())
    }

    /// Multiplication.
    ///
    /// When either operand is scalar the product is elementwise and takes the
    /// shape of the other operand. Otherwise it is a matrix product requiring
    /// inner-dimension agreement.
    pub fn mul(&self, rhs: impl Into<Expression>) -> Result<Expression, Error> {
        let rhs = rhs.into();

        if self.shape.is_scalar() || rhs.shape.is_scalar() {
            return elementwise(BinaryOp::Mul, self, &rhs);
        }

        if self.cols() != rhs.rows() {
            return Err(Error::DimensionMismatch {
                lhs: self.shape,
                rhs: rhs.shape,
            });
        }

        Ok(Expression {
            shape: Shape::new(self.rows(), rhs.cols()),
            kind: ExprKind::Binary(BinaryOp::Mul, Rc::new(self.clone()), Rc::new(rhs)),
        })
    }

    /// Division by a scalar, or elementwise division between equal shapes.
    pub fn div(&self, rhs: impl Into<Expression>) -> Result<Expression, Error> {
        let rhs = rhs.into();

        if rhs.shape.is_scalar() || rhs.shape == self.shape {
            return elementwise(BinaryOp::Div, self, &rhs);
        }

        Err(Error::DimensionMismatch {
            lhs: self.shape,
            rhs: rhs.shape,
        })
    }

    /// Elementwise negation.
    pub fn neg(&self) -> Expression {
        self.unary(UnaryOp::Neg)
    }

    /// Elementwise exponential.
    pub fn exp(&self) -> Expression {
        self.unary(UnaryOp::Exp)
    }

    /// Elementwise natural logarithm.
    pub fn ln(&self) -> Expression {
        self.unary(UnaryOp::Ln)
    }

    /// Elementwise square root.
    pub fn sqrt(&self) -> Expression {
        self.unary(UnaryOp::Sqrt)
    }

    /// Elementwise sine.
    pub fn sin(&self) -> Expression {
        self.unary(UnaryOp::Sin)
    }

    /// Elementwise cosine.
    pub fn cos(&self) -> Expression {
        self.unary(UnaryOp::Cos)
    }

    fn unary(&self, op: UnaryOp) -> Expression {
        Expression {
            shape: self.shape,
            kind: ExprKind::Unary(op, Rc::new(self.clone())),
        }
    }

    pub(crate) fn equal(&self, rhs: &Expression) -> Result<Expression, Error> {
        elementwise(BinaryOp::Equal, self, rhs)
    }

    /// Collects the distinct variable slots referenced by the tree.
    pub fn variables(&self) -> VariableSet {
        let mut set = VariableSet::new();
        self.collect_variables(&mut set);
        set
    }

    pub(crate) fn collect_variables(&self, set: &mut VariableSet) {
        match &self.kind {
            ExprKind::Constant(_) | ExprKind::Matrix(_) => {}
            ExprKind::Variable(var) => {
                for slot in 0..self.shape.dim() {
                    set.insert(var.kind(), var.ordinal() + slot);
                }
            }
            ExprKind::Unary(_, inner) => inner.collect_variables(set),
            ExprKind::Binary(_, lhs, rhs) => {
                lhs.collect_variables(set);
                rhs.collect_variables(set);
            }
        }
    }
}

/// Marks a differential state as differentiated, for the left side of a
/// differential equation component.
///
/// The marker itself is not evaluable; appending a component whose left side
/// is not `dot` of a differential state fails with
/// [`InvalidEquationForm`](Error::InvalidEquationForm).
pub fn dot(state: &Expression) -> Expression {
    Expression {
        shape: state.shape(),
        kind: ExprKind::Unary(UnaryOp::Dot, Rc::new(state.clone())),
    }
}

fn elementwise(op: BinaryOp, lhs: &Expression, rhs: &Expression) -> Result<Expression, Error> {
    let shape = if lhs.shape == rhs.shape {
        lhs.shape
    } else if lhs.shape.is_scalar() {
        rhs.shape
    } else if rhs.shape.is_scalar() {
        lhs.shape
    } else {
        return Err(Error::DimensionMismatch {
            lhs: lhs.shape,
            rhs: rhs.shape,
        });
    };

    Ok(Expression {
        shape,
        kind: ExprKind::Binary(op, Rc::new(lhs.clone()), Rc::new(rhs.clone())),
    })
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::constant(value)
    }
}

impl From<&Expression> for Expression {
    fn from(expr: &Expression) -> Self {
        expr.clone()
    }
}

impl From<DMatrix<f64>> for Expression {
    fn from(values: DMatrix<f64>) -> Self {
        Expression::matrix(values)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Constant(value) => write!(f, "{}", value),
            ExprKind::Matrix(values) => {
                write!(f, "[")?;
                for (i, row) in values.row_iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    for (j, value) in row.iter().enumerate() {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", value)?;
                    }
                }
                write!(f, "]")
            }
            ExprKind::Variable(var) => f.write_str(var.name()),
            ExprKind::Unary(UnaryOp::Neg, inner) => write!(f, "(-{})", inner),
            ExprKind::Unary(op, inner) => write!(f, "{}({})", op.name(), inner),
            ExprKind::Binary(op, lhs, rhs) => write!(f, "({}{}{})", lhs, op.symbol(), rhs),
        }
    }
}
