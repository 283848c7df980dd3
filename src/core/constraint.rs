//! Bound and equality constraints built from chained comparisons.
//!
//! All surface forms reduce to the same internal representation: a range
//! `lower <= expr <= upper` with one or both sides set, or an equality
//! between two subtrees. A three-term chain such as `0.1 <= t1 <= 50.0` is
//! written as `t1.geq(0.1)?.leq(50.0)?` and folds into a *single* component;
//! the second comparison completes the half-bound value produced by the
//! first one rather than creating an independent object.

use std::fmt;

use super::base::{Error, Shape};
use super::expr::Expression;
use super::variable::{VariableKind, VariableSet};

/// Point of the horizon a constraint applies at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintPoint {
    /// Start of the time horizon.
    AtStart,
    /// End of the time horizon.
    AtEnd,
    /// Every point of the horizon.
    Throughout,
}

impl fmt::Display for ConstraintPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintPoint::AtStart => "at start",
            ConstraintPoint::AtEnd => "at end",
            ConstraintPoint::Throughout => "throughout",
        };
        f.write_str(name)
    }
}

/// Which sides of a range constraint are set.
///
/// A freshly built comparison is half-bound; the complementary comparison
/// completes it. There is no unbound state, a component cannot be
/// constructed without at least one comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
enum BoundState {
    LowerOnly(f64),
    UpperOnly(f64),
    Range { lower: f64, upper: f64 },
}

#[derive(Debug, Clone)]
enum Relation {
    Bound {
        expr: Expression,
        bounds: BoundState,
    },
    Equality {
        lhs: Expression,
        rhs: Expression,
    },
}

/// A bound or equality relation on an expression.
#[derive(Debug, Clone)]
pub struct ConstraintComponent {
    relation: Relation,
}

impl Expression {
    /// Builds the constraint `self <= upper`.
    ///
    /// The expression must be scalar.
    pub fn leq(&self, upper: f64) -> Result<ConstraintComponent, Error> {
        scalar_comparand(self)?;
        Ok(ConstraintComponent {
            relation: Relation::Bound {
                expr: self.clone(),
                bounds: BoundState::UpperOnly(upper),
            },
        })
    }

    /// Builds the constraint `lower <= self`.
    ///
    /// The expression must be scalar.
    pub fn geq(&self, lower: f64) -> Result<ConstraintComponent, Error> {
        scalar_comparand(self)?;
        Ok(ConstraintComponent {
            relation: Relation::Bound {
                expr: self.clone(),
                bounds: BoundState::LowerOnly(lower),
            },
        })
    }

    /// Builds the equality `self == rhs`.
    ///
    /// The resulting component carries its own localized `dim`/`nx`/`nu`
    /// counts computed only over the two operand subtrees, regardless of any
    /// container it is later appended into.
    pub fn equals(&self, rhs: impl Into<Expression>) -> Result<ConstraintComponent, Error> {
        let rhs = rhs.into();
        // Shape agreement is checked the same way as for the equality node.
        self.equal(&rhs)?;

        Ok(ConstraintComponent {
            relation: Relation::Equality {
                lhs: self.clone(),
                rhs,
            },
        })
    }
}

impl ConstraintComponent {
    /// Adds an upper bound, completing a lower-only component into a range.
    ///
    /// Fails with [`AlreadyBound`](Error::AlreadyBound) when the upper bound
    /// is already set or the component is an equality.
    pub fn leq(self, upper: f64) -> Result<Self, Error> {
        match self.relation {
            Relation::Bound {
                expr,
                bounds: BoundState::LowerOnly(lower),
            } => Ok(Self {
                relation: Relation::Bound {
                    expr,
                    bounds: BoundState::Range { lower, upper },
                },
            }),
            _ => Err(Error::AlreadyBound),
        }
    }

    /// Adds a lower bound, completing an upper-only component into a range.
    ///
    /// Fails with [`AlreadyBound`](Error::AlreadyBound) when the lower bound
    /// is already set or the component is an equality.
    pub fn geq(self, lower: f64) -> Result<Self, Error> {
        match self.relation {
            Relation::Bound {
                expr,
                bounds: BoundState::UpperOnly(upper),
            } => Ok(Self {
                relation: Relation::Bound {
                    expr,
                    bounds: BoundState::Range { lower, upper },
                },
            }),
            _ => Err(Error::AlreadyBound),
        }
    }

    /// Gets the constrained expression. For an equality this is the left
    /// side.
    pub fn expression(&self) -> &Expression {
        match &self.relation {
            Relation::Bound { expr, .. } => expr,
            Relation::Equality { lhs, .. } => lhs,
        }
    }

    /// Gets the lower bound, negative infinity when not set.
    pub fn lower_bound(&self) -> f64 {
        match &self.relation {
            Relation::Bound { bounds, .. } => match bounds {
                BoundState::LowerOnly(lower) | BoundState::Range { lower, .. } => *lower,
                BoundState::UpperOnly(_) => f64::NEG_INFINITY,
            },
            Relation::Equality { .. } => f64::NEG_INFINITY,
        }
    }

    /// Gets the upper bound, positive infinity when not set.
    pub fn upper_bound(&self) -> f64 {
        match &self.relation {
            Relation::Bound { bounds, .. } => match bounds {
                BoundState::UpperOnly(upper) | BoundState::Range { upper, .. } => *upper,
                BoundState::LowerOnly(_) => f64::INFINITY,
            },
            Relation::Equality { .. } => f64::INFINITY,
        }
    }

    /// For an equality, gets both operand subtrees.
    pub fn equality(&self) -> Option<(&Expression, &Expression)> {
        match &self.relation {
            Relation::Equality { lhs, rhs } => Some((lhs, rhs)),
            Relation::Bound { .. } => None,
        }
    }

    /// Gets the dimension of the relation (rows of the constrained
    /// expression).
    pub fn dim(&self) -> usize {
        self.expression().rows()
    }

    /// Collects the distinct variable slots over the operand subtrees of
    /// this component only.
    pub fn variables(&self) -> VariableSet {
        let mut set = VariableSet::new();
        match &self.relation {
            Relation::Bound { expr, .. } => expr.collect_variables(&mut set),
            Relation::Equality { lhs, rhs } => {
                lhs.collect_variables(&mut set);
                rhs.collect_variables(&mut set);
            }
        }
        set
    }

    /// Gets the number of distinct differential states referenced by this
    /// component.
    pub fn nx(&self) -> usize {
        self.variables().count(VariableKind::DifferentialState)
    }

    /// Gets the number of distinct controls referenced by this component.
    pub fn nu(&self) -> usize {
        self.variables().count(VariableKind::Control)
    }

    /// Gets the number of distinct parameters referenced by this component.
    pub fn np(&self) -> usize {
        self.variables().count(VariableKind::Parameter)
    }

    /// Gets the number of distinct intermediate states referenced by this
    /// component.
    pub fn n(&self) -> usize {
        self.variables().count(VariableKind::IntermediateState)
    }
}

impl fmt::Display for ConstraintComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Relation::Bound { expr, bounds } => match bounds {
                BoundState::LowerOnly(lower) => write!(f, "{} <= {}", lower, expr),
                BoundState::UpperOnly(upper) => write!(f, "{} <= {}", expr, upper),
                BoundState::Range { lower, upper } => {
                    write!(f, "{} <= {} <= {}", lower, expr, upper)
                }
            },
            Relation::Equality { lhs, rhs } => write!(f, "{} == {}", lhs, rhs),
        }
    }
}

fn scalar_comparand(expr: &Expression) -> Result<(), Error> {
    if expr.shape().is_scalar() {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            lhs: expr.shape(),
            rhs: Shape::scalar(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::dot;
    use crate::core::variable::VariableRegistry;

    #[test]
    fn chained_bounds_fold_into_one_component() {
        let mut vars = VariableRegistry::new();
        let t1 = vars.parameter();

        let constraint = t1.geq(0.1).unwrap().leq(50.0).unwrap();

        assert_eq!(constraint.lower_bound(), 0.1);
        assert_eq!(constraint.upper_bound(), 50.0);
        assert_eq!(constraint.to_string(), "0.1 <= p0 <= 50");
    }

    #[test]
    fn half_bound_components_report_infinite_sides() {
        let mut vars = VariableRegistry::new();
        let v = vars.differential_state();

        let lower = v.geq(-0.01).unwrap();
        assert_eq!(lower.lower_bound(), -0.01);
        assert_eq!(lower.upper_bound(), f64::INFINITY);

        let upper = v.leq(1.3).unwrap();
        assert_eq!(upper.lower_bound(), f64::NEG_INFINITY);
        assert_eq!(upper.upper_bound(), 1.3);
    }

    #[test]
    fn rechaining_a_bound_side_fails() {
        let mut vars = VariableRegistry::new();
        let v = vars.differential_state();

        let full = v.geq(0.0).unwrap().leq(1.0).unwrap();
        assert!(matches!(full.clone().leq(2.0), Err(Error::AlreadyBound)));
        assert!(matches!(full.geq(-1.0), Err(Error::AlreadyBound)));

        // A set side is never overwritten either.
        let upper = v.leq(1.0).unwrap();
        assert!(matches!(upper.leq(2.0), Err(Error::AlreadyBound)));
    }

    #[test]
    fn equality_reports_node_local_counts() {
        let mut vars = VariableRegistry::new();
        let s = vars.differential_state();
        let v = vars.differential_state();

        let eq = s.equals(&v).unwrap();

        assert_eq!(eq.dim(), 1);
        assert_eq!(eq.nx(), 2);
        assert_eq!(eq.nu(), 0);
    }

    #[test]
    fn equality_over_a_derivative_marker_counts_both_sides() {
        let mut vars = VariableRegistry::new();
        let s = vars.differential_state();
        let v = vars.differential_state();

        let eq = dot(&s).equals(&v).unwrap();

        assert_eq!(eq.dim(), 1);
        assert_eq!(eq.nx(), 2);
    }

    #[test]
    fn comparing_a_non_scalar_fails() {
        let mut vars = VariableRegistry::new();
        let x = vars.declare(VariableKind::DifferentialState, None, 3, 1);

        assert!(matches!(x.leq(1.0), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn equality_shape_mismatch_fails() {
        let mut vars = VariableRegistry::new();
        let x = vars.declare(VariableKind::DifferentialState, None, 3, 1);
        let y = vars.declare(VariableKind::DifferentialState, None, 2, 1);

        assert!(matches!(
            x.equals(&y),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(x.equals(0.0).is_ok());
    }
}
