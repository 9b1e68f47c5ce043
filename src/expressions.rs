use std::collections::HashMap;

mod convex_set;
mod predicate;

pub use convex_set::{ConvexSet, SetError};
pub use predicate::Predicate;

/// Mapping from the predicate names used in a formula to their definitions.
pub type PredicateMap = HashMap<String, Predicate>;
