//! Core abstractions and types for building problems.
//!
//! Variables are declared through a [`VariableRegistry`], combined into
//! [`Expression`] trees, accumulated into [`Function`] and
//! [`DifferentialEquation`] values, constrained via [`ConstraintComponent`]
//! and assembled into an [`Ocp`].

mod base;
mod constraint;
mod expr;
mod function;
mod ocp;
mod variable;

pub use base::*;
pub use constraint::*;
pub use expr::*;
pub use function::*;
pub use ocp::*;
pub use variable::*;
