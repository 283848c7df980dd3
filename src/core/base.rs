use std::fmt;

use getset::CopyGetters;
use thiserror::Error;

use super::variable::VariableKind;

/// Row/column shape of an expression value.
///
/// The dimension of a value is `rows * cols`. Scalars are `1x1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Shape {
    /// Number of rows.
    rows: usize,
    /// Number of columns.
    cols: usize,
}

impl Shape {
    /// Creates a shape with given number of rows and columns.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Creates the scalar shape (`1x1`).
    pub fn scalar() -> Self {
        Self { rows: 1, cols: 1 }
    }

    /// Gets the dimension (`rows * cols`).
    pub fn dim(&self) -> usize {
        self.rows * self.cols
    }

    /// Determines whether the shape is scalar.
    pub fn is_scalar(&self) -> bool {
        self.rows == 1 && self.cols == 1
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Error encountered while building or evaluating a model.
///
/// All errors are detected synchronously at the offending call and are
/// considered programming errors on the modeling side, not transient
/// conditions. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// Operand or value shapes violate the rule of the attempted operation.
    /// Elementwise operands must have equal shapes or one must be scalar,
    /// matrix products need inner-dimension agreement and appended function
    /// components must be column vectors.
    #[error("dimension mismatch: {lhs} is not compatible with {rhs}")]
    DimensionMismatch {
        /// Shape of the left-hand operand, or the expected shape.
        lhs: Shape,
        /// Shape of the right-hand operand, or the provided shape.
        rhs: Shape,
    },
    /// A component appended to a differential equation is not of the form
    /// `dot(state) == expression`, or a derivative marker was evaluated
    /// outside a differential equation.
    #[error("expected a component of the form dot(state) == expression")]
    InvalidEquationForm,
    /// A chained comparison tried to add a bound to a constraint component
    /// whose bound on that side is already set.
    #[error("constraint component is already bound")]
    AlreadyBound,
    /// Evaluation referenced a variable slot with no bound value in the
    /// evaluation point.
    #[error("no value bound for {kind} variable at slot {ordinal}")]
    UnboundVariable {
        /// Kind of the referenced variable.
        kind: VariableKind,
        /// Ordinal slot of the referenced variable.
        ordinal: usize,
    },
    /// A time horizon bound is neither a numeric constant nor a scalar
    /// parameter variable.
    #[error("horizon bounds must be numeric constants or scalar parameters")]
    InvalidHorizon,
}
