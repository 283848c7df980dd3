//! Solver configuration and the boundary to the external NLP solver.
//!
//! The assembled [`Ocp`], plus a mapping of validated option key/value
//! pairs, is the sole payload crossing into the external solver. Option
//! values are checked against their declared domain *before* the hand-off;
//! an invalid value never reaches the backend. The backend reports its own
//! failure or non-convergence outcomes as a [`SolverStatus`] value, not as
//! an error.

use std::collections::BTreeMap;
use std::fmt;

use getset::{CopyGetters, Getters};
use log::debug;
use nalgebra::DVector;
use thiserror::Error;

use crate::core::Ocp;

/// Identifier of a solver configuration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionKey {
    /// Hessian approximation strategy.
    HessianApproximation,
    /// Iteration limit of the NLP solver.
    MaxNumIterations,
    /// KKT optimality tolerance.
    KktTolerance,
    /// Local error tolerance of the integrator.
    IntegratorTolerance,
    /// Pareto-front construction strategy for multi-objective problems.
    ParetoFrontGeneration,
    /// Number of points generated along the Pareto front.
    ParetoFrontDiscretization,
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionKey::HessianApproximation => "hessian approximation",
            OptionKey::MaxNumIterations => "max num iterations",
            OptionKey::KktTolerance => "kkt tolerance",
            OptionKey::IntegratorTolerance => "integrator tolerance",
            OptionKey::ParetoFrontGeneration => "pareto front generation",
            OptionKey::ParetoFrontDiscretization => "pareto front discretization",
        };
        f.write_str(name)
    }
}

/// Value assigned to a solver configuration option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionValue {
    /// Integer-valued option.
    Integer(i64),
    /// Real-valued option.
    Real(f64),
    /// Hessian approximation strategy.
    Hessian(HessianApproximation),
    /// Pareto-front construction strategy.
    FrontGeneration(FrontGeneration),
}

/// Hessian approximation strategies of the external solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HessianApproximation {
    /// Constant Hessian approximation.
    ConstantHessian,
    /// Gauss-Newton approximation (least-squares objectives).
    GaussNewton,
    /// Full BFGS update.
    FullBfgsUpdate,
    /// Block BFGS update.
    BlockBfgsUpdate,
    /// Exact Hessian computation.
    ExactHessian,
}

/// Pareto-front construction strategies for multi-objective problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontGeneration {
    /// Scalarization by weighted sums of the objectives.
    WeightedSum,
    /// Normalized normal constraint method.
    NormalizedNormalConstraint,
    /// Normal boundary intersection method.
    NormalBoundaryIntersection,
    /// Epsilon-constraint method.
    EpsilonConstraint,
}

/// Error encountered while configuring the solver.
#[derive(Debug, Error)]
pub enum OptionError {
    /// The option identifier is not declared by this algorithm.
    #[error("unknown option: {0}")]
    UnknownOption(OptionKey),
    /// The value lies outside the declared domain of the option.
    #[error("invalid value {value:?} for option {key}: {reason}")]
    InvalidOptionValue {
        /// The option being set.
        key: OptionKey,
        /// The rejected value.
        value: OptionValue,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// The set of options declared by an algorithm, with the validated values
/// assigned so far.
#[derive(Debug, Clone)]
pub struct OptionSet {
    declared: &'static [OptionKey],
    values: BTreeMap<OptionKey, OptionValue>,
}

impl OptionSet {
    fn new(declared: &'static [OptionKey]) -> Self {
        Self {
            declared,
            values: BTreeMap::new(),
        }
    }

    /// Validates and stores an option value.
    ///
    /// Fails with [`OptionError::UnknownOption`] when the key is not
    /// declared by the owning algorithm and with
    /// [`OptionError::InvalidOptionValue`] when the value lies outside the
    /// key's domain. A rejected value is not stored and is never forwarded
    /// to the backend.
    pub fn set(&mut self, key: OptionKey, value: OptionValue) -> Result<(), OptionError> {
        if !self.declared.contains(&key) {
            return Err(OptionError::UnknownOption(key));
        }

        validate(key, value)?;
        debug!("option {} set to {:?}", key, value);
        self.values.insert(key, value);
        Ok(())
    }

    /// Gets the value assigned to a key, if any.
    pub fn get(&self, key: OptionKey) -> Option<OptionValue> {
        self.values.get(&key).copied()
    }

    /// Iterates over the assigned `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, OptionValue)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }

    /// Gets the number of assigned options.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Determines whether no option has been assigned.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn validate(key: OptionKey, value: OptionValue) -> Result<(), OptionError> {
    let reason = match (key, value) {
        (OptionKey::HessianApproximation, OptionValue::Hessian(_)) => return Ok(()),
        (OptionKey::ParetoFrontGeneration, OptionValue::FrontGeneration(_)) => return Ok(()),
        (OptionKey::MaxNumIterations, OptionValue::Integer(n)) if n >= 0 => return Ok(()),
        (OptionKey::MaxNumIterations, OptionValue::Integer(_)) => "must be non-negative",
        (OptionKey::KktTolerance, OptionValue::Real(v)) if v > 0.0 && v < 1e-1 => return Ok(()),
        (OptionKey::KktTolerance, OptionValue::Real(_)) => "must lie in (0, 1e-1)",
        (OptionKey::IntegratorTolerance, OptionValue::Real(v)) if v > 0.0 && v < 1.0 => {
            return Ok(())
        }
        (OptionKey::IntegratorTolerance, OptionValue::Real(_)) => "must lie in (0, 1)",
        (OptionKey::ParetoFrontDiscretization, OptionValue::Integer(n)) if n >= 2 => {
            return Ok(())
        }
        (OptionKey::ParetoFrontDiscretization, OptionValue::Integer(_)) => {
            "needs at least two front points"
        }
        _ => "value is not in the declared domain of the option",
    };

    Err(OptionError::InvalidOptionValue { key, value, reason })
}

/// Result status reported by the external solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// The solver converged to a solution.
    Successful,
    /// The iteration limit was reached before convergence.
    MaxIterationsReached,
    /// The solver detected an infeasible problem.
    Infeasible,
    /// The solver failed for a numerical reason.
    NumericalFailure,
}

/// The values returned by the external solver.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct NlpSolution {
    /// Result status of the solve.
    #[getset(get_copy = "pub")]
    status: SolverStatus,
    /// Objective value at the returned point.
    #[getset(get_copy = "pub")]
    objective: f64,
    /// Optimized parameter values, ordinal-indexed.
    #[getset(get = "pub")]
    parameters: DVector<f64>,
    /// Optimized differential state values at the end of the horizon.
    #[getset(get = "pub")]
    differential_states: DVector<f64>,
    /// Optimized control values at the end of the horizon.
    #[getset(get = "pub")]
    controls: DVector<f64>,
}

impl NlpSolution {
    /// Creates a solution record.
    pub fn new(
        status: SolverStatus,
        objective: f64,
        parameters: DVector<f64>,
        differential_states: DVector<f64>,
        controls: DVector<f64>,
    ) -> Self {
        Self {
            status,
            objective,
            parameters,
            differential_states,
            controls,
        }
    }
}

/// Interface of an external NLP solver backend.
///
/// The backend receives the assembled problem and the validated options by
/// shared reference and must not retain or mutate them. Non-convergence is
/// reported through [`NlpSolution::status`], never as an error.
pub trait NlpBackend {
    /// Name of the backend.
    const NAME: &'static str;

    /// Solves the problem and returns the outcome.
    fn solve(&mut self, ocp: &Ocp, options: &OptionSet) -> NlpSolution;
}

const OPTIMIZATION_OPTIONS: &[OptionKey] = &[
    OptionKey::HessianApproximation,
    OptionKey::MaxNumIterations,
    OptionKey::KktTolerance,
    OptionKey::IntegratorTolerance,
];

const MULTI_OBJECTIVE_OPTIONS: &[OptionKey] = &[
    OptionKey::HessianApproximation,
    OptionKey::MaxNumIterations,
    OptionKey::KktTolerance,
    OptionKey::IntegratorTolerance,
    OptionKey::ParetoFrontGeneration,
    OptionKey::ParetoFrontDiscretization,
];

/// Front-end for solving a single-objective problem with an external
/// backend.
#[derive(Debug)]
pub struct OptimizationAlgorithm {
    ocp: Ocp,
    options: OptionSet,
    solution: Option<NlpSolution>,
}

impl OptimizationAlgorithm {
    /// Creates an algorithm for the given problem.
    pub fn new(ocp: Ocp) -> Self {
        Self::with_options(ocp, OptionSet::new(OPTIMIZATION_OPTIONS))
    }

    fn with_options(ocp: Ocp, options: OptionSet) -> Self {
        Self {
            ocp,
            options,
            solution: None,
        }
    }

    /// Validates and stores a solver option. See [`OptionSet::set`].
    pub fn set(&mut self, key: OptionKey, value: OptionValue) -> Result<(), OptionError> {
        self.options.set(key, value)
    }

    /// Gets the problem.
    pub fn ocp(&self) -> &Ocp {
        &self.ocp
    }

    /// Gets the assigned options.
    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    /// Hands the problem and the validated options to the backend and
    /// stores the returned solution.
    pub fn solve_with<B: NlpBackend>(&mut self, backend: &mut B) -> SolverStatus {
        debug!(
            "handing problem to {} ({} mayer terms, {} lagrange terms, {} constraints)",
            B::NAME,
            self.ocp.number_of_mayer_terms(),
            self.ocp.lagrange_terms().len(),
            self.ocp.constraints().len(),
        );

        let solution = backend.solve(&self.ocp, &self.options);
        let status = solution.status();
        self.solution = Some(solution);
        status
    }

    /// Gets the stored solution of the last solve.
    pub fn solution(&self) -> Option<&NlpSolution> {
        self.solution.as_ref()
    }

    /// Gets the optimized parameter values of the last solve.
    pub fn parameters(&self) -> Option<&DVector<f64>> {
        self.solution.as_ref().map(NlpSolution::parameters)
    }

    /// Gets the optimized differential state values of the last solve.
    pub fn differential_states(&self) -> Option<&DVector<f64>> {
        self.solution.as_ref().map(NlpSolution::differential_states)
    }

    /// Gets the optimized control values of the last solve.
    pub fn controls(&self) -> Option<&DVector<f64>> {
        self.solution.as_ref().map(NlpSolution::controls)
    }

    /// Gets the objective value of the last solve.
    pub fn objective_value(&self) -> Option<f64> {
        self.solution.as_ref().map(NlpSolution::objective)
    }
}

/// Front-end for solving a multi-objective problem with an external
/// backend.
///
/// Declares the Pareto-front options in addition to the single-objective
/// ones.
#[derive(Debug)]
pub struct MultiObjectiveAlgorithm {
    inner: OptimizationAlgorithm,
}

impl MultiObjectiveAlgorithm {
    /// Creates an algorithm for the given problem.
    pub fn new(ocp: Ocp) -> Self {
        Self {
            inner: OptimizationAlgorithm::with_options(
                ocp,
                OptionSet::new(MULTI_OBJECTIVE_OPTIONS),
            ),
        }
    }

    /// Validates and stores a solver option. See [`OptionSet::set`].
    pub fn set(&mut self, key: OptionKey, value: OptionValue) -> Result<(), OptionError> {
        self.inner.set(key, value)
    }

    /// Gets the problem.
    pub fn ocp(&self) -> &Ocp {
        self.inner.ocp()
    }

    /// Gets the assigned options.
    pub fn options(&self) -> &OptionSet {
        self.inner.options()
    }

    /// Hands the problem and the validated options to the backend and
    /// stores the returned solution.
    pub fn solve_with<B: NlpBackend>(&mut self, backend: &mut B) -> SolverStatus {
        self.inner.solve_with(backend)
    }

    /// Gets the stored solution of the last solve.
    pub fn solution(&self) -> Option<&NlpSolution> {
        self.inner.solution()
    }

    /// Gets the optimized parameter values of the last solve.
    pub fn parameters(&self) -> Option<&DVector<f64>> {
        self.inner.parameters()
    }

    /// Gets the optimized differential state values of the last solve.
    pub fn differential_states(&self) -> Option<&DVector<f64>> {
        self.inner.differential_states()
    }

    /// Gets the optimized control values of the last solve.
    pub fn controls(&self) -> Option<&DVector<f64>> {
        self.inner.controls()
    }

    /// Gets the objective value of the last solve.
    pub fn objective_value(&self) -> Option<f64> {
        self.inner.objective_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn enumerated_option_rejects_out_of_domain_values() {
        let mut vars = crate::core::VariableRegistry::new();
        let ocp = catalyst_mixing(&mut vars).unwrap();
        let mut algorithm = MultiObjectiveAlgorithm::new(ocp);

        assert!(matches!(
            algorithm.set(OptionKey::ParetoFrontGeneration, OptionValue::Integer(1000)),
            Err(OptionError::InvalidOptionValue { .. })
        ));

        algorithm
            .set(
                OptionKey::ParetoFrontGeneration,
                OptionValue::FrontGeneration(FrontGeneration::NormalBoundaryIntersection),
            )
            .unwrap();
        algorithm
            .set(OptionKey::ParetoFrontDiscretization, OptionValue::Integer(11))
            .unwrap();
    }

    #[test]
    fn tolerance_option_must_lie_in_its_open_range() {
        let mut vars = crate::core::VariableRegistry::new();
        let ocp = rocket_flight(&mut vars).unwrap();
        let mut algorithm = OptimizationAlgorithm::new(ocp);

        assert!(matches!(
            algorithm.set(OptionKey::KktTolerance, OptionValue::Real(0.3)),
            Err(OptionError::InvalidOptionValue { .. })
        ));
        assert!(matches!(
            algorithm.set(OptionKey::KktTolerance, OptionValue::Real(0.0)),
            Err(OptionError::InvalidOptionValue { .. })
        ));

        algorithm
            .set(OptionKey::KktTolerance, OptionValue::Real(1e-10))
            .unwrap();
        algorithm
            .set(OptionKey::MaxNumIterations, OptionValue::Integer(20))
            .unwrap();
        assert!(matches!(
            algorithm.set(OptionKey::MaxNumIterations, OptionValue::Integer(-1)),
            Err(OptionError::InvalidOptionValue { .. })
        ));
    }

    #[test]
    fn integrator_tolerance_must_lie_in_its_open_range() {
        let mut vars = crate::core::VariableRegistry::new();
        let ocp = rocket_flight(&mut vars).unwrap();
        let mut algorithm = OptimizationAlgorithm::new(ocp);

        assert!(matches!(
            algorithm.set(OptionKey::IntegratorTolerance, OptionValue::Real(0.0)),
            Err(OptionError::InvalidOptionValue { .. })
        ));
        assert!(matches!(
            algorithm.set(OptionKey::IntegratorTolerance, OptionValue::Real(1.0)),
            Err(OptionError::InvalidOptionValue { .. })
        ));

        algorithm
            .set(OptionKey::IntegratorTolerance, OptionValue::Real(1e-6))
            .unwrap();
    }

    #[test]
    fn front_discretization_needs_at_least_two_points() {
        let mut vars = crate::core::VariableRegistry::new();
        let ocp = catalyst_mixing(&mut vars).unwrap();
        let mut algorithm = MultiObjectiveAlgorithm::new(ocp);

        assert!(matches!(
            algorithm.set(OptionKey::ParetoFrontDiscretization, OptionValue::Integer(1)),
            Err(OptionError::InvalidOptionValue { .. })
        ));
        assert!(matches!(
            algorithm.set(
                OptionKey::ParetoFrontDiscretization,
                OptionValue::Integer(-1)
            ),
            Err(OptionError::InvalidOptionValue { .. })
        ));

        algorithm
            .set(OptionKey::ParetoFrontDiscretization, OptionValue::Integer(2))
            .unwrap();
    }

    #[test]
    fn pareto_options_are_unknown_to_the_single_objective_algorithm() {
        let mut vars = crate::core::VariableRegistry::new();
        let ocp = rocket_flight(&mut vars).unwrap();
        let mut algorithm = OptimizationAlgorithm::new(ocp);

        assert!(matches!(
            algorithm.set(
                OptionKey::ParetoFrontGeneration,
                OptionValue::FrontGeneration(FrontGeneration::WeightedSum),
            ),
            Err(OptionError::UnknownOption(OptionKey::ParetoFrontGeneration))
        ));
    }

    #[test]
    fn rejected_values_are_not_forwarded_to_the_backend() {
        let mut vars = crate::core::VariableRegistry::new();
        let ocp = rocket_flight(&mut vars).unwrap();
        let mut algorithm = OptimizationAlgorithm::new(ocp);

        algorithm
            .set(OptionKey::KktTolerance, OptionValue::Real(1e-8))
            .unwrap();
        let _ = algorithm.set(OptionKey::KktTolerance, OptionValue::Real(5.0));
        let _ = algorithm.set(OptionKey::MaxNumIterations, OptionValue::Integer(-3));

        let mut backend = StubBackend::default();
        let status = algorithm.solve_with(&mut backend);

        assert_eq!(status, SolverStatus::Successful);
        assert_eq!(backend.solved, 1);
        assert_eq!(
            backend.received_options,
            vec![(OptionKey::KktTolerance, OptionValue::Real(1e-8))]
        );
    }

    #[test]
    fn solution_accessors_expose_the_backend_result() {
        use nalgebra::dvector;

        let mut vars = crate::core::VariableRegistry::new();
        let nlp = static_nlp(&mut vars).unwrap();
        let mut algorithm = OptimizationAlgorithm::new(nlp);

        let mut backend = StubBackend::with_parameters(dvector![1.0, 1.0]);
        algorithm.solve_with(&mut backend);

        assert_eq!(algorithm.parameters().unwrap(), &dvector![1.0, 1.0]);
        assert_eq!(algorithm.objective_value(), Some(0.0));
        assert!(algorithm.solution().is_some());
    }

    #[test]
    fn multi_objective_solution_accessors_delegate() {
        use nalgebra::dvector;

        let mut vars = crate::core::VariableRegistry::new();
        let ocp = catalyst_mixing(&mut vars).unwrap();
        let mut algorithm = MultiObjectiveAlgorithm::new(ocp);

        assert!(algorithm.solution().is_none());
        assert!(algorithm.differential_states().is_none());

        let mut backend = StubBackend::with_parameters(dvector![0.5]);
        algorithm.solve_with(&mut backend);

        assert_eq!(algorithm.parameters().unwrap(), &dvector![0.5]);
        assert_eq!(algorithm.differential_states().unwrap().len(), 0);
        assert_eq!(algorithm.controls().unwrap().len(), 0);
        assert_eq!(algorithm.objective_value(), Some(0.0));
    }
}
