//! Dynamic-programming robustness evaluation.
//!
//! The monitor flattens a canonical formula into an arena of subformula slots, addressed by the
//! index assigned during a root-first breadth-first walk, and fills a table of one
//! [`HybridDistance`] per (slot, sample) cell. Samples are processed backward, from the final
//! sample to the first, because every temporal operator at sample `i` depends only on values at
//! `i` and `i + 1`; within one sample column, slots are processed in descending index order so
//! children are ready before their parents. The value of the whole formula is the root slot at
//! sample zero.
//!
//! Formulas with freeze binders additionally run one resolution pass per binder group: for every
//! freeze sample, the group's timing constraints collapse to the true/false sentinels by
//! comparing elapsed time against their bounds, and the group's rows are re-evaluated over the
//! suffix starting at the freeze sample. Each pass leaves the freeze-sample column final, so an
//! enclosing group reads the binder row as "the subformula frozen here". Groups are processed
//! innermost first. Formulas without binders take exactly one backward pass.

use std::collections::{HashMap, VecDeque};

use either::Either;
use thiserror::Error;

use crate::automaton::{Automaton, ShortestPaths};
use crate::canonical::Canonicalizer;
use crate::expressions::{Predicate, PredicateMap, SetError};
use crate::formula::{Comparison, Formula};
use crate::metric::{Bottom, HybridDistance, Join, Meet, Top};
use crate::trace::Trace;

/// Largest number of subformula slots a formula may occupy.
pub const MAX_SUBFORMULAS: usize = 200;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    #[error("formula references undefined predicate {name}")]
    UndefinedPredicate { name: String },

    #[error("time variable {variable} is used outside of any freeze binder")]
    UnboundTimeVariable { variable: String },

    #[error("time variable {variable} does not match the innermost enclosing binder {binder}")]
    ForeignTimeVariable { variable: String, binder: String },

    #[error("formula has more than {MAX_SUBFORMULAS} subformulas")]
    FormulaTooLarge,

    #[error("trace contains no samples")]
    EmptyTrace,

    #[error("timestamp at sample {sample} is smaller than its predecessor")]
    DecreasingTimestamps { sample: usize },

    #[error("state at sample {sample} has {dimensions} dimensions, expected {expected}")]
    DimensionMismatch {
        sample: usize,
        dimensions: usize,
        expected: usize,
    },

    #[error("predicate {name} reads {required} trace dimensions but the trace provides {dimensions}")]
    PredicateDimensions {
        name: String,
        required: usize,
        dimensions: usize,
    },

    #[error("predicate {name} is active in location {location}, which is outside of the automaton")]
    PredicateLocation { name: String, location: usize },

    #[error("location {location} at sample {sample} is outside of the automaton")]
    LocationOutOfRange { sample: usize, location: usize },

    #[error(transparent)]
    Set(#[from] SetError),
}

/// Flattened subformula operator. Child formulas are referenced through slot indices.
#[derive(Debug, Clone, Copy)]
enum Op {
    True,
    False,
    Value(HybridDistance),
    Predicate(usize),
    Constraint(Comparison, f64),
    Not,
    And,
    Or,
    Next,
    WeakNext,
    Always,
    Eventually,
    Until,
    Release,
    Freeze,
}

/// One subformula. Slot zero is the absent-child sentinel; live slots occupy `1..=count` in
/// breadth-first order with the root at slot one.
#[derive(Debug, Clone, Copy)]
struct Slot {
    op: Op,
    left: usize,
    right: usize,
    group: usize,
}

struct Arena<'a> {
    slots: Vec<Slot>,
    predicates: Vec<&'a Predicate>,
    groups: usize,
}

struct WorkItem<'a> {
    formula: &'a Formula,
    index: usize,
    group: usize,
    binder: Option<&'a str>,
}

/// Assign breadth-first indices and freeze groups, resolving predicate names along the way.
fn index_formula<'a>(
    formula: &'a Formula,
    predicates: &'a PredicateMap,
) -> Result<Arena<'a>, MonitorError> {
    let sentinel = Slot {
        op: Op::True,
        left: 0,
        right: 0,
        group: 0,
    };

    let mut slots = vec![sentinel, sentinel];
    let mut resolved: Vec<&'a Predicate> = Vec::new();
    let mut names: HashMap<&'a str, usize> = HashMap::new();
    let mut groups = 0;

    let mut queue = VecDeque::new();

    queue.push_back(WorkItem {
        formula,
        index: 1,
        group: 0,
        binder: None,
    });

    while let Some(item) = queue.pop_front() {
        let mut group = item.group;
        let mut child_group = item.group;
        let mut child_binder = item.binder;

        let (op, left, right) = match item.formula {
            Formula::True => (Op::True, None, None),
            Formula::False => (Op::False, None, None),
            Formula::Value(value) => (Op::Value(*value), None, None),
            Formula::Predicate(name) => {
                let index = match names.get(name.as_str()) {
                    Some(&index) => index,
                    None => {
                        let predicate = predicates.get(name).ok_or_else(|| {
                            MonitorError::UndefinedPredicate { name: name.clone() }
                        })?;

                        resolved.push(predicate);
                        names.insert(name.as_str(), resolved.len() - 1);
                        resolved.len() - 1
                    }
                };

                (Op::Predicate(index), None, None)
            }
            Formula::Constraint {
                variable,
                comparison,
                bound,
            } => {
                match item.binder {
                    None => {
                        return Err(MonitorError::UnboundTimeVariable {
                            variable: variable.clone(),
                        })
                    }
                    Some(binder) if binder != variable => {
                        return Err(MonitorError::ForeignTimeVariable {
                            variable: variable.clone(),
                            binder: binder.to_string(),
                        })
                    }
                    Some(_) => {}
                }

                (Op::Constraint(*comparison, *bound), None, None)
            }
            Formula::Not(sub) => (Op::Not, Some(sub.as_ref()), None),
            Formula::Next(sub) => (Op::Next, Some(sub.as_ref()), None),
            Formula::WeakNext(sub) => (Op::WeakNext, Some(sub.as_ref()), None),
            Formula::Always(sub) => (Op::Always, Some(sub.as_ref()), None),
            Formula::Eventually(sub) => (Op::Eventually, Some(sub.as_ref()), None),
            Formula::And(l, r) => (Op::And, Some(l.as_ref()), Some(r.as_ref())),
            Formula::Or(l, r) => (Op::Or, Some(l.as_ref()), Some(r.as_ref())),
            Formula::Until(l, r) => (Op::Until, Some(l.as_ref()), Some(r.as_ref())),
            Formula::Release(l, r) => (Op::Release, Some(l.as_ref()), Some(r.as_ref())),
            Formula::FreezeAt(variable, sub) => {
                groups += 1;
                group = groups;
                child_group = groups;
                child_binder = Some(variable.as_str());

                (Op::Freeze, Some(sub.as_ref()), None)
            }
        };

        let mut allocate = |child: &'a Formula,
                            slots: &mut Vec<Slot>,
                            queue: &mut VecDeque<WorkItem<'a>>|
         -> Result<usize, MonitorError> {
            if slots.len() > MAX_SUBFORMULAS {
                return Err(MonitorError::FormulaTooLarge);
            }

            let index = slots.len();
            slots.push(sentinel);

            queue.push_back(WorkItem {
                formula: child,
                index,
                group: child_group,
                binder: child_binder,
            });

            Ok(index)
        };

        let left = match left {
            Some(child) => allocate(child, &mut slots, &mut queue)?,
            None => 0,
        };

        let right = match right {
            Some(child) => allocate(child, &mut slots, &mut queue)?,
            None => 0,
        };

        slots[item.index] = Slot {
            op,
            left,
            right,
            group,
        };
    }

    Ok(Arena {
        slots,
        predicates: resolved,
        groups,
    })
}

/// A continuous trace or a trace paired with automaton locations.
type TraceRef<'a> = Either<&'a Trace<Vec<f64>>, &'a Trace<(Vec<f64>, usize)>>;

struct Evaluation<'a> {
    arena: Arena<'a>,
    times: &'a [f64],
    trace: TraceRef<'a>,
    hybrid: Option<(&'a Automaton, ShortestPaths)>,
    table: Vec<Vec<HybridDistance>>,
}

impl<'a> Evaluation<'a> {
    fn new(
        arena: Arena<'a>,
        times: &'a [f64],
        trace: TraceRef<'a>,
        hybrid: Option<(&'a Automaton, ShortestPaths)>,
    ) -> Self {
        let table = vec![vec![HybridDistance::bottom(); times.len()]; arena.slots.len()];

        Self {
            arena,
            times,
            trace,
            hybrid,
            table,
        }
    }

    fn samples(&self) -> usize {
        self.times.len()
    }

    fn state(&self, sample: usize) -> &'a [f64] {
        match self.trace {
            Either::Left(trace) => &trace[sample],
            Either::Right(trace) => &trace[sample].0,
        }
    }

    fn location(&self, sample: usize) -> Option<usize> {
        match self.trace {
            Either::Left(_) => None,
            Either::Right(trace) => Some(trace[sample].1),
        }
    }

    fn run(&mut self) -> Result<HybridDistance, MonitorError> {
        self.fill_leaves()?;

        for group in (1..=self.arena.groups).rev() {
            for freeze in 0..self.samples() {
                let frozen = self.times[freeze];

                for sample in (freeze..self.samples()).rev() {
                    self.resolve_constraints(group, sample, frozen);
                    self.dp_step(group, sample);
                }
            }
        }

        for sample in (0..self.samples()).rev() {
            self.dp_step(0, sample);
        }

        Ok(self.table[1][0])
    }

    /// Fill the rows of all constant and predicate leaves for every sample.
    fn fill_leaves(&mut self) -> Result<(), MonitorError> {
        for slot in 1..self.arena.slots.len() {
            match self.arena.slots[slot].op {
                Op::True => self.table[slot].fill(HybridDistance::top()),
                Op::False => self.table[slot].fill(HybridDistance::bottom()),
                Op::Value(value) => self.table[slot].fill(value),
                Op::Predicate(index) => {
                    let predicate = self.arena.predicates[index];

                    for sample in 0..self.samples() {
                        let value = self.predicate_distance(predicate, sample)?;
                        self.table[slot][sample] = value;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn predicate_distance(
        &self,
        predicate: &Predicate,
        sample: usize,
    ) -> Result<HybridDistance, MonitorError> {
        let state = self.state(sample);

        let value = match (&self.hybrid, self.location(sample)) {
            (Some((automaton, paths)), Some(location)) => {
                automaton.hybrid_distance(paths, predicate, state, location)?
            }
            _ => HybridDistance::robustness(predicate.distance(state)?),
        };

        Ok(value)
    }

    /// Collapse the timing constraints of one group at one sample to sentinels, given the
    /// timestamp bound by the group's binder.
    fn resolve_constraints(&mut self, group: usize, sample: usize, frozen: f64) {
        for slot in (1..self.arena.slots.len()).rev() {
            let current = self.arena.slots[slot];

            if current.group != group {
                continue;
            }

            if let Op::Constraint(comparison, bound) = current.op {
                let elapsed = self.times[sample] - frozen;

                self.table[slot][sample] = if comparison.holds(elapsed, bound) {
                    HybridDistance::top()
                } else {
                    HybridDistance::bottom()
                };
            }
        }
    }

    /// One backward DP step: compute every non-leaf slot of the group at one sample column.
    fn dp_step(&mut self, group: usize, sample: usize) {
        let last = self.samples() - 1;

        for slot in (1..self.arena.slots.len()).rev() {
            let current = self.arena.slots[slot];

            if current.group != group {
                continue;
            }

            let value = match current.op {
                Op::True
                | Op::False
                | Op::Value(_)
                | Op::Predicate(_)
                | Op::Constraint(..) => continue,
                Op::And => self.table[current.left][sample].meet(self.table[current.right][sample]),
                Op::Or => self.table[current.left][sample].join(self.table[current.right][sample]),
                Op::Not => -self.table[current.left][sample],
                Op::Next => {
                    if sample < last {
                        self.table[current.left][sample + 1]
                    } else {
                        HybridDistance::bottom()
                    }
                }
                Op::WeakNext => {
                    if sample < last {
                        self.table[current.left][sample + 1]
                    } else {
                        HybridDistance::top()
                    }
                }
                Op::Always => {
                    let sub = self.table[current.left][sample];

                    if sample < last {
                        self.table[slot][sample + 1].meet(sub)
                    } else {
                        sub
                    }
                }
                Op::Eventually => {
                    let sub = self.table[current.left][sample];

                    if sample < last {
                        self.table[slot][sample + 1].join(sub)
                    } else {
                        sub
                    }
                }
                Op::Until => {
                    let right = self.table[current.right][sample];

                    if sample < last {
                        let left = self.table[current.left][sample];
                        right.join(self.table[slot][sample + 1].meet(left))
                    } else {
                        right
                    }
                }
                Op::Release => {
                    let right = self.table[current.right][sample];

                    if sample < last {
                        let left = self.table[current.left][sample];
                        right.meet(self.table[slot][sample + 1].join(left))
                    } else {
                        right
                    }
                }
                Op::Freeze => self.table[current.left][sample],
            };

            self.table[slot][sample] = value;
        }
    }
}

fn validate_times(times: &[f64]) -> Result<(), MonitorError> {
    if times.is_empty() {
        return Err(MonitorError::EmptyTrace);
    }

    for (sample, pair) in times.windows(2).enumerate() {
        if pair[1] < pair[0] {
            return Err(MonitorError::DecreasingTimestamps { sample: sample + 1 });
        }
    }

    Ok(())
}

fn validate_states<'a, I>(states: I) -> Result<usize, MonitorError>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut dimensions = None;

    for (sample, state) in states.into_iter().enumerate() {
        match dimensions {
            None => dimensions = Some(state.len()),
            Some(expected) if expected != state.len() => {
                return Err(MonitorError::DimensionMismatch {
                    sample,
                    dimensions: state.len(),
                    expected,
                })
            }
            Some(_) => {}
        }
    }

    Ok(dimensions.unwrap_or(0))
}

fn validate_predicates(predicates: &PredicateMap, dimensions: usize) -> Result<(), MonitorError> {
    for (name, predicate) in predicates {
        let required = predicate.set().required_dimensions();

        if required > dimensions {
            return Err(MonitorError::PredicateDimensions {
                name: name.clone(),
                required,
                dimensions,
            });
        }
    }

    Ok(())
}

/// Offline robustness monitor.
///
/// A monitor owns the canonicalization cache, so evaluating several structurally related
/// formulas through the same monitor reuses their canonical forms. Monitors are cheap to create
/// and independent of each other; concurrent evaluation is a matter of giving each thread its
/// own monitor.
#[derive(Default)]
pub struct Monitor {
    canonicalizer: Canonicalizer,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Robustness of a formula over a continuous trace. The location component of the result is
    /// zero unless the formula degenerates to a sentinel.
    pub fn robustness(
        &mut self,
        formula: &Formula,
        predicates: &PredicateMap,
        trace: &Trace<Vec<f64>>,
    ) -> Result<HybridDistance, MonitorError> {
        validate_times(trace.times())?;

        let dimensions = validate_states(trace.states().map(Vec::as_slice))?;
        validate_predicates(predicates, dimensions)?;

        let canonical = self.canonicalizer.canonicalize(formula.clone());
        let arena = index_formula(&canonical, predicates)?;

        Evaluation::new(arena, trace.times(), Either::Left(trace), None).run()
    }

    /// Hybrid distance of a formula over a trace paired with automaton locations.
    pub fn hybrid_distance(
        &mut self,
        formula: &Formula,
        predicates: &PredicateMap,
        trace: &Trace<(Vec<f64>, usize)>,
        automaton: &Automaton,
    ) -> Result<HybridDistance, MonitorError> {
        validate_times(trace.times())?;

        let dimensions = validate_states(trace.states().map(|(state, _)| state.as_slice()))?;
        validate_predicates(predicates, dimensions)?;

        for (sample, (_, location)) in trace.states().enumerate() {
            if *location >= automaton.locations() {
                return Err(MonitorError::LocationOutOfRange {
                    sample,
                    location: *location,
                });
            }
        }

        for (name, predicate) in predicates {
            for &location in predicate.locations().unwrap_or(&[]) {
                if location >= automaton.locations() {
                    return Err(MonitorError::PredicateLocation {
                        name: name.clone(),
                        location,
                    });
                }
            }
        }

        let paths = automaton.shortest_paths();
        let canonical = self.canonicalizer.canonicalize(formula.clone());
        let arena = index_formula(&canonical, predicates)?;

        Evaluation::new(
            arena,
            trace.times(),
            Either::Right(trace),
            Some((automaton, paths)),
        )
        .run()
    }
}

/// Evaluate a formula over a continuous trace with a fresh monitor.
pub fn eval_robustness(
    formula: &Formula,
    predicates: &PredicateMap,
    trace: &Trace<Vec<f64>>,
) -> Result<HybridDistance, MonitorError> {
    Monitor::new().robustness(formula, predicates, trace)
}

/// Evaluate a formula over a hybrid trace with a fresh monitor.
pub fn eval_hybrid_distance(
    formula: &Formula,
    predicates: &PredicateMap,
    trace: &Trace<(Vec<f64>, usize)>,
    automaton: &Automaton,
) -> Result<HybridDistance, MonitorError> {
    Monitor::new().hybrid_distance(formula, predicates, trace, automaton)
}
