//! Hybrid automaton location graphs.
//!
//! An [`Automaton`] augments a continuous trace with discrete mode information. It is built from
//! a square adjacency matrix over locations, where a positive entry is a directed transition with
//! that weight. Every transition carries a [`GuardSet`], the convex region the state must reach
//! for the transition to be taken; transitions start with an unconstrained guard until one is
//! attached.
//!
//! Distances between locations are measured once per evaluation with the all-pairs triple-loop
//! relaxation and kept in a [`ShortestPaths`] matrix, with unreachable pairs at `+inf`.

use nonempty::NonEmpty;
use ordered_float::OrderedFloat;
use petgraph::graphmap::DiGraphMap;
use thiserror::Error;

use crate::expressions::{ConvexSet, Predicate, SetError};
use crate::metric::{Bottom, HybridDistance};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutomatonError {
    #[error("adjacency matrix row {row} has {columns} columns, expected {expected}")]
    NotSquare {
        row: usize,
        columns: usize,
        expected: usize,
    },

    #[error("no transition from location {from} to location {to}")]
    UnknownTransition { from: usize, to: usize },
}

/// One or more convex sets whose union forms the guard of a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardSet(NonEmpty<ConvexSet>);

impl GuardSet {
    /// A guard that is satisfied everywhere.
    pub fn unconstrained() -> Self {
        Self(NonEmpty::new(ConvexSet::unconstrained()))
    }

    pub fn new(sets: NonEmpty<ConvexSet>) -> Self {
        Self(sets)
    }

    /// Signed distance of a state to the guard region. For a union of sets this is the distance
    /// to the nearest member, which is the maximum of the member distances.
    pub fn distance(&self, state: &[f64]) -> Result<f64, SetError> {
        let mut best = f64::NEG_INFINITY;

        for set in self.0.iter() {
            best = f64::max(best, set.signed_distance(state)?);
        }

        Ok(best)
    }
}

impl From<ConvexSet> for GuardSet {
    fn from(set: ConvexSet) -> Self {
        Self(NonEmpty::new(set))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Transition {
    weight: f64,
    guard: GuardSet,
}

/// Directed graph of automaton locations with guarded transitions.
#[derive(Debug, Clone)]
pub struct Automaton {
    graph: DiGraphMap<usize, Transition>,
    locations: usize,
}

impl Automaton {
    /// Build the location graph from a square adjacency matrix. Entries greater than zero are
    /// transitions weighted by the entry; diagonal entries are ignored.
    pub fn from_adjacency(adjacency: &[Vec<f64>]) -> Result<Self, AutomatonError> {
        let locations = adjacency.len();
        let mut graph = DiGraphMap::new();

        for location in 0..locations {
            graph.add_node(location);
        }

        for (from, row) in adjacency.iter().enumerate() {
            if row.len() != locations {
                return Err(AutomatonError::NotSquare {
                    row: from,
                    columns: row.len(),
                    expected: locations,
                });
            }

            for (to, &weight) in row.iter().enumerate() {
                if from != to && weight > 0.0 {
                    let transition = Transition {
                        weight,
                        guard: GuardSet::unconstrained(),
                    };

                    graph.add_edge(from, to, transition);
                }
            }
        }

        Ok(Self { graph, locations })
    }

    /// Attach a guard to an existing transition, replacing the unconstrained default.
    pub fn set_guard(&mut self, from: usize, to: usize, guard: GuardSet) -> Result<(), AutomatonError> {
        match self.graph.edge_weight_mut(from, to) {
            Some(transition) => {
                transition.guard = guard;
                Ok(())
            }
            None => Err(AutomatonError::UnknownTransition { from, to }),
        }
    }

    pub fn locations(&self) -> usize {
        self.locations
    }

    /// All-pairs shortest path distances over the transition weights.
    pub fn shortest_paths(&self) -> ShortestPaths {
        let n = self.locations;
        let mut distances = vec![f64::INFINITY; n * n];

        for location in 0..n {
            distances[location * n + location] = 0.0;
        }

        for (from, to, transition) in self.graph.all_edges() {
            distances[from * n + to] = transition.weight;
        }

        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    let relaxed = distances[i * n + k] + distances[k * n + j];

                    if relaxed < distances[i * n + j] {
                        distances[i * n + j] = relaxed;
                    }
                }
            }
        }

        ShortestPaths { distances, locations: n }
    }

    /// Distance of a state to a location-restricted predicate.
    ///
    /// In a location where the predicate is active this is the plain signed distance to the
    /// predicate region. Anywhere else the location component is the negated number of
    /// transitions to the nearest active location, and the spatial component is the best guard
    /// distance among transitions that lead strictly closer, capped at zero so that a satisfied
    /// guard never outweighs actually reaching an active location.
    pub fn hybrid_distance(
        &self,
        paths: &ShortestPaths,
        predicate: &Predicate,
        state: &[f64],
        location: usize,
    ) -> Result<HybridDistance, SetError> {
        let active = match predicate.locations() {
            Some(active) => active,
            None => return predicate.distance(state).map(HybridDistance::robustness),
        };

        if active.contains(&location) {
            return predicate.distance(state).map(HybridDistance::robustness);
        }

        let path_distance = paths.to_any(location, active);

        if path_distance.is_infinite() {
            return Ok(HybridDistance::bottom());
        }

        let mut spatial = f64::NEG_INFINITY;

        for next in self.graph.neighbors(location) {
            if paths.to_any(next, active) < path_distance {
                if let Some(transition) = self.graph.edge_weight(location, next) {
                    let guard_distance = transition.guard.distance(state)?;
                    spatial = f64::max(spatial, f64::min(guard_distance, 0.0));
                }
            }
        }

        Ok(HybridDistance::new(-path_distance, spatial))
    }
}

/// Dense all-pairs distance matrix over automaton locations.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPaths {
    distances: Vec<f64>,
    locations: usize,
}

impl ShortestPaths {
    pub fn between(&self, from: usize, to: usize) -> f64 {
        self.distances[from * self.locations + to]
    }

    /// Minimum distance from a location to any of the target locations, `+inf` if none is
    /// reachable or the target list is empty.
    pub fn to_any(&self, from: usize, targets: &[usize]) -> f64 {
        targets
            .iter()
            .map(|&target| OrderedFloat(self.between(from, target)))
            .min()
            .map(OrderedFloat::into_inner)
            .unwrap_or(f64::INFINITY)
    }
}
