use super::convex_set::{ConvexSet, SetError};

/// A named requirement over the system state: a convex satisfaction region, optionally limited
/// to a subset of automaton locations.
///
/// Without a location list the predicate is active everywhere and evaluates to the signed
/// distance of the state to its region. With a location list the predicate only holds its
/// region semantics in those locations; elsewhere the monitor measures how far the automaton is
/// from reaching one of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    set: ConvexSet,
    locations: Option<Vec<usize>>,
}

impl Predicate {
    pub fn new(set: ConvexSet) -> Self {
        Self { set, locations: None }
    }

    /// Restrict the predicate to the given automaton locations.
    pub fn active_at<I>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        self.locations = Some(locations.into_iter().collect());
        self
    }

    pub fn set(&self) -> &ConvexSet {
        &self.set
    }

    pub fn locations(&self) -> Option<&[usize]> {
        self.locations.as_deref()
    }

    pub fn distance(&self, state: &[f64]) -> Result<f64, SetError> {
        self.set.signed_distance(state)
    }
}

impl From<ConvexSet> for Predicate {
    fn from(set: ConvexSet) -> Self {
        Self::new(set)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConvexSet, Predicate, SetError};

    #[test]
    fn distance_delegates_to_set() -> Result<(), SetError> {
        let predicate = Predicate::new(ConvexSet::half_space(vec![1.0], 5.0)?);

        assert_eq!(predicate.distance(&[3.0])?, 2.0);
        assert_eq!(predicate.locations(), None);
        Ok(())
    }

    #[test]
    fn location_restriction() -> Result<(), SetError> {
        let predicate = Predicate::new(ConvexSet::unconstrained()).active_at([1, 2]);

        assert_eq!(predicate.locations(), Some([1, 2].as_slice()));
        Ok(())
    }
}
