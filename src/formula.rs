//! Formula syntax trees.
//!
//! A [`Formula`] is the abstract syntax tree produced by the parser or assembled directly with
//! the builder methods. Trees are plain values: the canonicalizer consumes and rewrites them, and
//! the monitor flattens them into an indexed arena before evaluation. The set of variants is
//! matched exhaustively everywhere, so adding an operator is a compile-time checked change.
//!
//! Implication is not a variant. `Formula::implies` rewrites `a -> c` into `!a \/ c` during
//! construction, which keeps the evaluation rules limited to the operators below.

use std::fmt::{Display, Formatter};

use crate::metric::HybridDistance;

/// Comparison operator of a timing constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    Greater,
}

impl Comparison {
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Less => lhs < rhs,
            Comparison::LessOrEqual => lhs <= rhs,
            Comparison::Equal => lhs == rhs,
            Comparison::GreaterOrEqual => lhs >= rhs,
            Comparison::Greater => lhs > rhs,
        }
    }

    /// The comparison holding exactly when self does not. Equality has no single-comparison
    /// complement, so negations of equality constraints are left as explicit Not nodes.
    pub fn negated(self) -> Option<Self> {
        match self {
            Comparison::Less => Some(Comparison::GreaterOrEqual),
            Comparison::LessOrEqual => Some(Comparison::Greater),
            Comparison::GreaterOrEqual => Some(Comparison::Less),
            Comparison::Greater => Some(Comparison::LessOrEqual),
            Comparison::Equal => None,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "==",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Greater => ">",
        }
    }
}

/// A node of the formula syntax tree.
///
/// Temporal operators are future-time only and unbounded; timing bounds are expressed with the
/// [`FreezeAt`](Formula::FreezeAt)/[`Constraint`](Formula::Constraint) pair, which binds the
/// timestamp of the sample at which the binder is reached and compares elapsed time against a
/// numeric bound deeper in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    True,
    False,
    /// Reference to a named predicate in the predicate map.
    Predicate(String),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Next(Box<Formula>),
    WeakNext(Box<Formula>),
    Always(Box<Formula>),
    Eventually(Box<Formula>),
    Until(Box<Formula>, Box<Formula>),
    Release(Box<Formula>, Box<Formula>),
    /// Bind the current timestamp to a time variable for the subformula.
    FreezeAt(String, Box<Formula>),
    /// Compare elapsed time since the binding of a time variable against a bound.
    Constraint {
        variable: String,
        comparison: Comparison,
        bound: f64,
    },
    /// Constant robustness value produced by constant folding.
    Value(HybridDistance),
}

impl Formula {
    pub fn predicate<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        Formula::Predicate(name.into())
    }

    pub fn constraint<N>(variable: N, comparison: Comparison, bound: f64) -> Self
    where
        N: Into<String>,
    {
        Formula::Constraint {
            variable: variable.into(),
            comparison,
            bound,
        }
    }

    pub fn freeze<N>(variable: N, subformula: Formula) -> Self
    where
        N: Into<String>,
    {
        Formula::FreezeAt(variable.into(), Box::new(subformula))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Formula::Not(Box::new(self))
    }

    pub fn and(self, other: Formula) -> Self {
        Formula::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Formula) -> Self {
        Formula::Or(Box::new(self), Box::new(other))
    }

    /// `a -> c` as `!a \/ c`.
    pub fn implies(self, consequent: Formula) -> Self {
        self.not().or(consequent)
    }

    pub fn next(self) -> Self {
        Formula::Next(Box::new(self))
    }

    pub fn weak_next(self) -> Self {
        Formula::WeakNext(Box::new(self))
    }

    pub fn always(self) -> Self {
        Formula::Always(Box::new(self))
    }

    pub fn eventually(self) -> Self {
        Formula::Eventually(Box::new(self))
    }

    pub fn until(self, other: Formula) -> Self {
        Formula::Until(Box::new(self), Box::new(other))
    }

    pub fn release(self, other: Formula) -> Self {
        Formula::Release(Box::new(self), Box::new(other))
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Formula::True => write!(f, "true"),
            Formula::False => write!(f, "false"),
            Formula::Predicate(name) => write!(f, "{}", name),
            Formula::Not(sub) => write!(f, "! ({})", sub),
            Formula::And(left, right) => write!(f, "({} /\\ {})", left, right),
            Formula::Or(left, right) => write!(f, "({} \\/ {})", left, right),
            Formula::Next(sub) => write!(f, "X ({})", sub),
            Formula::WeakNext(sub) => write!(f, "W ({})", sub),
            Formula::Always(sub) => write!(f, "[] ({})", sub),
            Formula::Eventually(sub) => write!(f, "<> ({})", sub),
            Formula::Until(left, right) => write!(f, "({} U {})", left, right),
            Formula::Release(left, right) => write!(f, "({} R {})", left, right),
            Formula::FreezeAt(variable, sub) => write!(f, "@ {} ({})", variable, sub),
            Formula::Constraint {
                variable,
                comparison,
                bound,
            } => write!(f, "{{ {} {} {} }}", variable, comparison.symbol(), bound),
            Formula::Value(value) => write!(f, "value({}, {})", value.location, value.spatial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Comparison, Formula};

    #[test]
    fn implies_desugars() {
        let formula = Formula::predicate("p").implies(Formula::predicate("q"));
        let expected = Formula::predicate("p").not().or(Formula::predicate("q"));

        assert_eq!(formula, expected);
    }

    #[test]
    fn display_round_trip_shapes() {
        let formula = Formula::freeze(
            "t",
            Formula::constraint("t", Comparison::LessOrEqual, 2.0)
                .and(Formula::predicate("p"))
                .eventually(),
        );

        assert_eq!(formula.to_string(), "@ t (<> (({ t <= 2 } /\\ p)))");
    }

    #[test]
    fn comparisons() {
        assert!(Comparison::Less.holds(1.0, 2.0));
        assert!(Comparison::GreaterOrEqual.holds(2.0, 2.0));
        assert!(!Comparison::Greater.holds(2.0, 2.0));
        assert_eq!(Comparison::Less.negated(), Some(Comparison::GreaterOrEqual));
        assert_eq!(Comparison::Equal.negated(), None);
    }
}
