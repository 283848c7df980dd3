#![allow(clippy::should_implement_trait)]
#![warn(missing_docs)]

//! # ocpkit
//!
//! A symbolic modeling layer for formulating constrained, time-indexed
//! optimization problems: optimal control problems and nonlinear programs.
//!
//! The crate lets a caller declare variables, combine them into immutable
//! expression trees, accumulate the trees into vector-valued functions and
//! differential equation systems, attach bound and equality constraints,
//! package everything into a problem container and evaluate functions at a
//! concrete point. The numerical solve itself is delegated to an external
//! backend behind the [`NlpBackend`](algorithm::NlpBackend) trait; this
//! crate validates the solver configuration at that boundary but contains
//! no solver.
//!
//! ## Expressions and evaluation
//!
//! Variables are declared through a [`VariableRegistry`], which assigns a
//! stable ordinal per kind. Expressions are built with fallible
//! combinators that validate operand shapes at construction time.
//!
//! ```rust
//! use ocpkit::nalgebra::dvector;
//! use ocpkit::{EvaluationPoint, Function, VariableRegistry};
//!
//! let mut vars = VariableRegistry::new();
//! let x = vars.differential_state();
//! let t = vars.time();
//!
//! let mut f = Function::new();
//! f.push(x.mul(&x)?.add(&t)?)?;
//!
//! let mut point = EvaluationPoint::new();
//! point.set_time(1.0).set_states(dvector![2.0]);
//!
//! assert_eq!(f.evaluate(&point)?, dvector![5.0]);
//! # Ok::<(), ocpkit::Error>(())
//! ```
//!
//! ## Optimal control problems
//!
//! A differential equation system collects components of the form
//! `dot(state) == expression`; the problem container aggregates dynamics,
//! objective terms and constraints. Chained comparisons fold into a single
//! range constraint.
//!
//! ```rust
//! use ocpkit::{dot, ConstraintPoint, DifferentialEquation, Ocp, VariableRegistry};
//! use ocpkit::algorithm::{HessianApproximation, OptionKey, OptionValue};
//!
//! let mut vars = VariableRegistry::new();
//! let s = vars.differential_state();
//! let v = vars.differential_state();
//! let m = vars.differential_state();
//! let u = vars.control();
//!
//! let mut f = DifferentialEquation::with_horizon(0.0, 10.0);
//! f.push(dot(&s).equals(&v)?)?;
//! f.push(dot(&v).equals(u.sub(v.mul(&v)?.mul(0.2)?)?.div(&m)?)?)?;
//! f.push(dot(&m).equals(u.mul(&u)?.mul(-0.01)?)?)?;
//!
//! let mut ocp = Ocp::new(0.0, 10.0, 20);
//! ocp.minimize_lagrange_term(u.mul(&u)?)?;
//! ocp.subject_to_equation(f);
//! ocp.subject_to_at(ConstraintPoint::AtStart, s.equals(0.0)?);
//! ocp.subject_to_at(ConstraintPoint::AtEnd, s.equals(10.0)?);
//! ocp.subject_to(v.geq(-0.01)?.leq(1.3)?);
//!
//! let mut algorithm = ocpkit::OptimizationAlgorithm::new(ocp);
//! algorithm.set(
//!     OptionKey::HessianApproximation,
//!     OptionValue::Hessian(HessianApproximation::ExactHessian),
//! )?;
//! algorithm.set(OptionKey::MaxNumIterations, OptionValue::Integer(20))?;
//! algorithm.set(OptionKey::KktTolerance, OptionValue::Real(1e-10))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Option values are validated against their declared domains before the
//! hand-off to the backend; invalid values are rejected at `set` and never
//! forwarded.
//!
//! ## Threading
//!
//! The core is single-threaded and synchronous. The only mutable resource
//! is the per-kind ordinal counter inside [`VariableRegistry`]; it provides
//! no locking, so concurrent declaration requires external serialization.
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algorithm;
mod core;
pub mod eval;

pub use core::*;
pub use eval::EvaluationPoint;

pub use algorithm::{MultiObjectiveAlgorithm, OptimizationAlgorithm};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
