//! Variable kinds, the declaration registry and distinct-variable
//! bookkeeping.

use std::collections::BTreeSet;
use std::fmt;

use super::base::Shape;
use super::expr::Expression;

/// Kind of a declared variable.
///
/// The evaluator and all counters match exhaustively on this, so the set is
/// closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariableKind {
    /// State governed by a differential equation.
    DifferentialState,
    /// Control input.
    Control,
    /// Time-constant parameter, possibly optimized.
    Parameter,
    /// Intermediate (algebraic) state.
    IntermediateState,
    /// The independent time variable.
    Time,
}

impl VariableKind {
    pub(crate) fn prefix(&self) -> &'static str {
        match self {
            VariableKind::DifferentialState => "x",
            VariableKind::Control => "u",
            VariableKind::Parameter => "p",
            VariableKind::IntermediateState => "w",
            VariableKind::Time => "t",
        }
    }

    fn index(&self) -> usize {
        match self {
            VariableKind::DifferentialState => 0,
            VariableKind::Control => 1,
            VariableKind::Parameter => 2,
            VariableKind::IntermediateState => 3,
            VariableKind::Time => 4,
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableKind::DifferentialState => "differential state",
            VariableKind::Control => "control",
            VariableKind::Parameter => "parameter",
            VariableKind::IntermediateState => "intermediate state",
            VariableKind::Time => "time",
        };
        f.write_str(name)
    }
}

/// A declared variable: kind, ordinal and display name.
///
/// The ordinal identifies the first scalar slot the variable occupies. A
/// variable of dimension *d* occupies slots `ordinal..ordinal + d`, and those
/// slots index the numeric bindings during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    kind: VariableKind,
    ordinal: usize,
    name: String,
}

impl Variable {
    /// Gets the kind of the variable.
    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Gets the first ordinal slot of the variable.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Gets the display name of the variable.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Registry assigning stable ordinals to newly declared variables.
///
/// The registry holds one monotonically increasing counter per variable kind.
/// It is an explicit value rather than ambient process state; independent
/// problem constructions should either use separate registries or call
/// [`reset`](VariableRegistry::reset) in between so that ordinal-based
/// identity does not leak across episodes. The registry does not enforce
/// this, the caller is responsible. It also provides no locking; declaring
/// variables from multiple threads requires external serialization.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    counters: [usize; 5],
}

impl VariableRegistry {
    /// Creates a registry with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable of the given kind and shape.
    ///
    /// The variable receives the next `rows * cols` ordinal slots of its
    /// kind. When `name` is `None`, a label is generated from the kind prefix
    /// and the first ordinal (`x0`, `u1`, ...).
    pub fn declare(
        &mut self,
        kind: VariableKind,
        name: Option<&str>,
        rows: usize,
        cols: usize,
    ) -> Expression {
        assert!(rows * cols > 0, "empty variable");

        let ordinal = self.counters[kind.index()];
        self.counters[kind.index()] += rows * cols;

        let name = name
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{}{}", kind.prefix(), ordinal));

        Expression::variable(
            Variable {
                kind,
                ordinal,
                name,
            },
            Shape::new(rows, cols),
        )
    }

    /// Declares a scalar differential state.
    pub fn differential_state(&mut self) -> Expression {
        self.declare(VariableKind::DifferentialState, None, 1, 1)
    }

    /// Declares a scalar control.
    pub fn control(&mut self) -> Expression {
        self.declare(VariableKind::Control, None, 1, 1)
    }

    /// Declares a scalar parameter.
    pub fn parameter(&mut self) -> Expression {
        self.declare(VariableKind::Parameter, None, 1, 1)
    }

    /// Declares a scalar intermediate state.
    pub fn intermediate_state(&mut self) -> Expression {
        self.declare(VariableKind::IntermediateState, None, 1, 1)
    }

    /// Declares the time variable.
    pub fn time(&mut self) -> Expression {
        self.declare(VariableKind::Time, None, 1, 1)
    }

    /// Gets the number of ordinal slots assigned so far for a kind.
    pub fn count(&self, kind: VariableKind) -> usize {
        self.counters[kind.index()]
    }

    /// Zeroes all per-kind counters.
    ///
    /// Must be called between independent problem-construction episodes
    /// (notably in test fixtures) to guarantee a fresh ordinal sequence. Has
    /// no side effect beyond zeroing the counters.
    pub fn reset(&mut self) {
        self.counters = [0; 5];
    }
}

/// Set of distinct variable slots referenced by a tree or a set of trees.
///
/// Slots are deduplicated by `(kind, ordinal)`, so a vector variable of
/// dimension *d* contributes *d* entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSet {
    slots: BTreeSet<(VariableKind, usize)>,
}

impl VariableSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, kind: VariableKind, slot: usize) {
        self.slots.insert((kind, slot));
    }

    /// Gets the number of distinct slots of the given kind.
    pub fn count(&self, kind: VariableKind) -> usize {
        self.slots.iter().filter(|(k, _)| *k == kind).count()
    }

    /// Gets one past the highest referenced slot of the given kind, i.e. the
    /// minimum length of a binding vector covering all references.
    pub fn span(&self, kind: VariableKind) -> usize {
        self.slots
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, slot)| slot + 1)
            .max()
            .unwrap_or(0)
    }

    /// Determines whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
