//! Formula normalization and the structural rewrite cache.
//!
//! The monitor evaluates formulas in a canonical form: negations pushed down to the predicate and
//! constraint leaves, And/Or chains linked to the right, and constant leaves folded into their
//! boolean parents. A [`Canonicalizer`] performs the rewrite and remembers every shape it has
//! seen, so repeated canonicalization of structurally equivalent formulas (including reorderings
//! of And/Or operands) returns the recorded result instead of rewriting again.
//!
//! The cache is owned by the canonicalizer value. Callers that want sharing across evaluations
//! hold one canonicalizer and pass it around; there is no process-wide state.

use either::Either;

use crate::formula::Formula;
use crate::metric::{Bottom, HybridDistance, Join, Meet, Top};

/// Recursive equality of two formula trees, ignoring nothing but chain padding: a conjunction
/// with a `true` tail is equal to its other operand, which makes right-linked chains of
/// different lengths comparable.
pub fn structurally_equal(a: &Formula, b: &Formula) -> bool {
    match (a, b) {
        (Formula::And(left, right), other) if **right == Formula::True => {
            structurally_equal(left, other)
        }
        (other, Formula::And(left, right)) if **right == Formula::True => {
            structurally_equal(other, left)
        }
        (Formula::True, Formula::True) => true,
        (Formula::False, Formula::False) => true,
        (Formula::Predicate(x), Formula::Predicate(y)) => x == y,
        (Formula::Not(x), Formula::Not(y)) => structurally_equal(x, y),
        (Formula::Next(x), Formula::Next(y)) => structurally_equal(x, y),
        (Formula::WeakNext(x), Formula::WeakNext(y)) => structurally_equal(x, y),
        (Formula::Always(x), Formula::Always(y)) => structurally_equal(x, y),
        (Formula::Eventually(x), Formula::Eventually(y)) => structurally_equal(x, y),
        (Formula::And(l1, r1), Formula::And(l2, r2))
        | (Formula::Or(l1, r1), Formula::Or(l2, r2))
        | (Formula::Until(l1, r1), Formula::Until(l2, r2))
        | (Formula::Release(l1, r1), Formula::Release(l2, r2)) => {
            structurally_equal(l1, l2) && structurally_equal(r1, r2)
        }
        (Formula::FreezeAt(v1, x), Formula::FreezeAt(v2, y)) => v1 == v2 && structurally_equal(x, y),
        (
            Formula::Constraint {
                variable: v1,
                comparison: c1,
                bound: b1,
            },
            Formula::Constraint {
                variable: v2,
                comparison: c2,
                bound: b2,
            },
        ) => v1 == v2 && c1 == c2 && b1 == b2,
        (Formula::Value(x), Formula::Value(y)) => x == y,
        _ => false,
    }
}

/// Structural match that treats And/Or chains as multisets of operands, so two chains over the
/// same operands match regardless of how the operands are ordered or linked.
pub fn same_form(a: &Formula, b: &Formula) -> bool {
    match (a, b) {
        (Formula::And(..), Formula::And(..)) => {
            chain_match(flatten(a, is_and), flatten(b, is_and))
        }
        (Formula::Or(..), Formula::Or(..)) => chain_match(flatten(a, is_or), flatten(b, is_or)),
        (Formula::Not(x), Formula::Not(y)) => same_form(x, y),
        (Formula::Next(x), Formula::Next(y)) => same_form(x, y),
        (Formula::WeakNext(x), Formula::WeakNext(y)) => same_form(x, y),
        (Formula::Always(x), Formula::Always(y)) => same_form(x, y),
        (Formula::Eventually(x), Formula::Eventually(y)) => same_form(x, y),
        (Formula::Until(l1, r1), Formula::Until(l2, r2))
        | (Formula::Release(l1, r1), Formula::Release(l2, r2)) => {
            same_form(l1, l2) && same_form(r1, r2)
        }
        (Formula::FreezeAt(v1, x), Formula::FreezeAt(v2, y)) => v1 == v2 && same_form(x, y),
        _ => structurally_equal(a, b),
    }
}

fn is_and(formula: &Formula) -> Option<(&Formula, &Formula)> {
    match formula {
        Formula::And(left, right) => Some((left.as_ref(), right.as_ref())),
        _ => None,
    }
}

fn is_or(formula: &Formula) -> Option<(&Formula, &Formula)> {
    match formula {
        Formula::Or(left, right) => Some((left.as_ref(), right.as_ref())),
        _ => None,
    }
}

/// Collect the operands of a chain of one connective, dropping `true` units.
fn flatten<'a>(
    formula: &'a Formula,
    connective: fn(&Formula) -> Option<(&Formula, &Formula)>,
) -> Vec<&'a Formula> {
    fn walk<'a>(
        formula: &'a Formula,
        connective: fn(&Formula) -> Option<(&Formula, &Formula)>,
        leaves: &mut Vec<&'a Formula>,
    ) {
        if let Some((left, right)) = connective(formula) {
            walk(left, connective, leaves);
            walk(right, connective, leaves);
        } else if *formula != Formula::True {
            leaves.push(formula);
        }
    }

    let mut leaves = Vec::new();
    walk(formula, connective, &mut leaves);
    leaves
}

fn chain_match(left: Vec<&Formula>, right: Vec<&Formula>) -> bool {
    if left.len() != right.len() {
        return false;
    }

    let mut used = vec![false; right.len()];

    left.iter().all(|leaf| {
        let slot = right
            .iter()
            .enumerate()
            .position(|(index, candidate)| !used[index] && same_form(leaf, candidate));

        match slot {
            Some(index) => {
                used[index] = true;
                true
            }
            None => false,
        }
    })
}

struct CacheEntry {
    before: Formula,
    after: Formula,
    /// The rewrite was a no-op for this shape.
    unchanged: bool,
}

/// Rewrites formulas into canonical form, memoizing by structural shape.
#[derive(Default)]
pub struct Canonicalizer {
    entries: Vec<CacheEntry>,
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct shapes seen so far.
    pub fn entries(&self) -> usize {
        self.entries.len()
    }

    pub fn canonicalize(&mut self, formula: Formula) -> Formula {
        let hit = self
            .entries
            .iter()
            .find(|entry| same_form(&formula, &entry.before));

        if let Some(entry) = hit {
            log::debug!("canonicalization cache hit for {}", formula);
            return entry.after.clone();
        }

        let after = render(fold(right_link(push_negations(formula.clone()))));
        let unchanged = after == formula;

        self.entries.push(CacheEntry {
            before: formula,
            after: after.clone(),
            unchanged,
        });

        after
    }

    /// The recorded rewrite for this shape was a no-op.
    pub fn is_normal(&self, formula: &Formula) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.unchanged && same_form(formula, &entry.before))
    }
}

/// Move every negation down to a predicate or constraint leaf using the boolean and temporal
/// dualities.
fn push_negations(formula: Formula) -> Formula {
    match formula {
        Formula::Not(inner) => negate(*inner),
        Formula::And(left, right) => push_negations(*left).and(push_negations(*right)),
        Formula::Or(left, right) => push_negations(*left).or(push_negations(*right)),
        Formula::Next(sub) => push_negations(*sub).next(),
        Formula::WeakNext(sub) => push_negations(*sub).weak_next(),
        Formula::Always(sub) => push_negations(*sub).always(),
        Formula::Eventually(sub) => push_negations(*sub).eventually(),
        Formula::Until(left, right) => push_negations(*left).until(push_negations(*right)),
        Formula::Release(left, right) => push_negations(*left).release(push_negations(*right)),
        Formula::FreezeAt(variable, sub) => Formula::FreezeAt(variable, Box::new(push_negations(*sub))),
        leaf => leaf,
    }
}

fn negate(formula: Formula) -> Formula {
    match formula {
        Formula::True => Formula::False,
        Formula::False => Formula::True,
        Formula::Value(value) => Formula::Value(-value),
        Formula::Predicate(name) => Formula::Predicate(name).not(),
        Formula::Not(inner) => push_negations(*inner),
        Formula::And(left, right) => negate(*left).or(negate(*right)),
        Formula::Or(left, right) => negate(*left).and(negate(*right)),
        Formula::Next(sub) => negate(*sub).weak_next(),
        Formula::WeakNext(sub) => negate(*sub).next(),
        Formula::Always(sub) => negate(*sub).eventually(),
        Formula::Eventually(sub) => negate(*sub).always(),
        Formula::Until(left, right) => negate(*left).release(negate(*right)),
        Formula::Release(left, right) => negate(*left).until(negate(*right)),
        Formula::FreezeAt(variable, sub) => Formula::FreezeAt(variable, Box::new(negate(*sub))),
        Formula::Constraint {
            variable,
            comparison,
            bound,
        } => match comparison.negated() {
            Some(flipped) => Formula::constraint(variable, flipped, bound),
            None => Formula::constraint(variable, comparison, bound).not(),
        },
    }
}

/// Rotate And/Or chains so the tree is right-recursive.
fn right_link(formula: Formula) -> Formula {
    match formula {
        Formula::And(left, right) => {
            let left = right_link(*left);
            let right = right_link(*right);

            match left {
                Formula::And(inner_left, inner_right) => {
                    right_link(Formula::And(inner_left, Box::new(inner_right.and(right))))
                }
                other => other.and(right),
            }
        }
        Formula::Or(left, right) => {
            let left = right_link(*left);
            let right = right_link(*right);

            match left {
                Formula::Or(inner_left, inner_right) => {
                    right_link(Formula::Or(inner_left, Box::new(inner_right.or(right))))
                }
                other => other.or(right),
            }
        }
        Formula::Not(sub) => right_link(*sub).not(),
        Formula::Next(sub) => right_link(*sub).next(),
        Formula::WeakNext(sub) => right_link(*sub).weak_next(),
        Formula::Always(sub) => right_link(*sub).always(),
        Formula::Eventually(sub) => right_link(*sub).eventually(),
        Formula::Until(left, right) => right_link(*left).until(right_link(*right)),
        Formula::Release(left, right) => right_link(*left).release(right_link(*right)),
        Formula::FreezeAt(variable, sub) => Formula::FreezeAt(variable, Box::new(right_link(*sub))),
        leaf => leaf,
    }
}

/// Fold constant leaves into their And/Or parents. Temporal operators never fold: `X true` is
/// still falsified at the final sample, so constants cannot move through them.
fn fold(formula: Formula) -> Either<HybridDistance, Formula> {
    match formula {
        Formula::True => Either::Left(HybridDistance::top()),
        Formula::False => Either::Left(HybridDistance::bottom()),
        Formula::Value(value) => Either::Left(value),
        Formula::And(left, right) => match (fold(*left), fold(*right)) {
            (Either::Left(a), Either::Left(b)) => Either::Left(a.meet(b)),
            (Either::Left(a), Either::Right(f)) => fold_into_and(a, f, true),
            (Either::Right(f), Either::Left(a)) => fold_into_and(a, f, false),
            (Either::Right(a), Either::Right(b)) => Either::Right(a.and(b)),
        },
        Formula::Or(left, right) => match (fold(*left), fold(*right)) {
            (Either::Left(a), Either::Left(b)) => Either::Left(a.join(b)),
            (Either::Left(a), Either::Right(f)) => fold_into_or(a, f, true),
            (Either::Right(f), Either::Left(a)) => fold_into_or(a, f, false),
            (Either::Right(a), Either::Right(b)) => Either::Right(a.or(b)),
        },
        Formula::Not(sub) => match fold(*sub) {
            Either::Left(value) => Either::Left(-value),
            Either::Right(f) => Either::Right(f.not()),
        },
        Formula::Next(sub) => Either::Right(render(fold(*sub)).next()),
        Formula::WeakNext(sub) => Either::Right(render(fold(*sub)).weak_next()),
        Formula::Always(sub) => Either::Right(render(fold(*sub)).always()),
        Formula::Eventually(sub) => Either::Right(render(fold(*sub)).eventually()),
        Formula::Until(left, right) => {
            Either::Right(render(fold(*left)).until(render(fold(*right))))
        }
        Formula::Release(left, right) => {
            Either::Right(render(fold(*left)).release(render(fold(*right))))
        }
        Formula::FreezeAt(variable, sub) => {
            Either::Right(Formula::FreezeAt(variable, Box::new(render(fold(*sub)))))
        }
        leaf => Either::Right(leaf),
    }
}

fn fold_into_and(
    constant: HybridDistance,
    formula: Formula,
    constant_on_left: bool,
) -> Either<HybridDistance, Formula> {
    if constant == HybridDistance::top() {
        Either::Right(formula)
    } else if constant == HybridDistance::bottom() {
        Either::Left(HybridDistance::bottom())
    } else if constant_on_left {
        Either::Right(Formula::Value(constant).and(formula))
    } else {
        Either::Right(formula.and(Formula::Value(constant)))
    }
}

fn fold_into_or(
    constant: HybridDistance,
    formula: Formula,
    constant_on_left: bool,
) -> Either<HybridDistance, Formula> {
    if constant == HybridDistance::bottom() {
        Either::Right(formula)
    } else if constant == HybridDistance::top() {
        Either::Left(HybridDistance::top())
    } else if constant_on_left {
        Either::Right(Formula::Value(constant).or(formula))
    } else {
        Either::Right(formula.or(Formula::Value(constant)))
    }
}

fn render(folded: Either<HybridDistance, Formula>) -> Formula {
    match folded {
        Either::Left(value) => {
            if value == HybridDistance::top() {
                Formula::True
            } else if value == HybridDistance::bottom() {
                Formula::False
            } else {
                Formula::Value(value)
            }
        }
        Either::Right(formula) => formula,
    }
}

#[cfg(test)]
mod tests {
    use super::{same_form, structurally_equal, Canonicalizer};
    use crate::formula::Formula;

    fn p() -> Formula {
        Formula::predicate("p")
    }

    fn q() -> Formula {
        Formula::predicate("q")
    }

    fn r() -> Formula {
        Formula::predicate("r")
    }

    #[test]
    fn negations_move_to_leaves() {
        let mut canonicalizer = Canonicalizer::new();

        let formula = p().always().not();
        let expected = p().not().eventually();

        assert_eq!(canonicalizer.canonicalize(formula), expected);

        let formula = p().and(q()).not();
        let expected = p().not().or(q().not());

        assert_eq!(canonicalizer.canonicalize(formula), expected);

        let formula = p().until(q()).not();
        let expected = p().not().release(q().not());

        assert_eq!(canonicalizer.canonicalize(formula), expected);
    }

    #[test]
    fn double_negation_cancels() {
        let mut canonicalizer = Canonicalizer::new();
        let formula = p().not().not().always();

        assert_eq!(canonicalizer.canonicalize(formula), p().always());
    }

    #[test]
    fn chains_link_to_the_right() {
        let mut canonicalizer = Canonicalizer::new();
        let formula = p().and(q()).and(r());
        let expected = p().and(q().and(r()));

        assert_eq!(canonicalizer.canonicalize(formula), expected);
    }

    #[test]
    fn constants_fold_into_connectives() {
        let mut canonicalizer = Canonicalizer::new();

        assert_eq!(canonicalizer.canonicalize(p().and(Formula::True)), p());
        assert_eq!(canonicalizer.canonicalize(p().or(Formula::False)), p());
        assert_eq!(
            canonicalizer.canonicalize(p().and(Formula::False)),
            Formula::False
        );
        assert_eq!(
            canonicalizer.canonicalize(p().or(Formula::True)),
            Formula::True
        );
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let mut canonicalizer = Canonicalizer::new();
        let formula = p().and(q()).not().or(r().always().not().not());

        let once = canonicalizer.canonicalize(formula);
        let twice = canonicalizer.canonicalize(once.clone());

        assert_eq!(once, twice);
    }

    #[test]
    fn reordered_chains_share_cache_entries() {
        let mut canonicalizer = Canonicalizer::new();

        let first = canonicalizer.canonicalize(p().and(q()).and(r()));
        let entries = canonicalizer.entries();
        let second = canonicalizer.canonicalize(r().and(p()).and(q()));

        assert_eq!(first, second);
        assert_eq!(canonicalizer.entries(), entries);
    }

    #[test]
    fn chain_padding_matches_true() {
        assert!(structurally_equal(&p().and(Formula::True), &p()));
        assert!(same_form(&p().and(q()), &q().and(p()).and(Formula::True)));
        assert!(!same_form(&p().and(q()), &p().and(r())));
    }
}
