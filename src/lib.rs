#![deny(clippy::all)]

//! An offline robustness monitor for TPTL formulas over hybrid system traces.
//!
//! Given a temporal logic formula, a set of named predicates and a finite trace of system
//! states, the monitor answers by how much margin the trace satisfies or violates the formula:
//! a signed [`HybridDistance`] instead of a boolean. Traces may optionally carry hybrid
//! automaton locations, in which case predicates restricted to a subset of locations are
//! measured through the automaton's transition structure.
//!
//! Evaluation is a batch computation over the complete trace. The formula is rewritten into a
//! canonical form, flattened into an indexed arena, and evaluated with a backward
//! dynamic-programming pass over the samples; see the [`monitor`] module for the details.

pub mod automaton;
pub mod canonical;
pub mod expressions;
pub mod formula;
pub mod metric;
pub mod monitor;
#[cfg(feature = "parser")]
pub mod parser;
pub mod trace;

pub use crate::formula::Formula;
pub use crate::metric::HybridDistance;
pub use crate::trace::Trace;

#[cfg(feature = "parser")]
use thiserror::Error;

#[cfg(feature = "parser")]
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Parse(#[from] crate::parser::ParseError),

    #[error(transparent)]
    Monitor(#[from] crate::monitor::MonitorError),
}

/// Parse a formula and evaluate its robustness over a continuous trace.
#[cfg(feature = "parser")]
pub fn evaluate(
    formula: &str,
    predicates: &crate::expressions::PredicateMap,
    trace: &Trace<Vec<f64>>,
) -> Result<HybridDistance, EvaluationError> {
    let formula = crate::parser::parse_formula(formula)?;
    let distance = crate::monitor::eval_robustness(&formula, predicates, trace)?;

    Ok(distance)
}

/// Parse a formula and evaluate its hybrid distance over a trace with automaton locations.
#[cfg(feature = "parser")]
pub fn evaluate_hybrid(
    formula: &str,
    predicates: &crate::expressions::PredicateMap,
    trace: &Trace<(Vec<f64>, usize)>,
    automaton: &crate::automaton::Automaton,
) -> Result<HybridDistance, EvaluationError> {
    let formula = crate::parser::parse_formula(formula)?;
    let distance = crate::monitor::eval_hybrid_distance(&formula, predicates, trace, automaton)?;

    Ok(distance)
}
