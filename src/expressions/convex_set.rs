//! Predicate satisfaction regions and their signed distances.
//!
//! A [`ConvexSet`] describes the region of the state space in which a predicate holds, either as
//! all of `R^n` or as a conjunction of linear inequalities `A·x <= b`. The signed distance of a
//! state to the region is positive when the state is inside the region and negative outside, with
//! the magnitude equal to the euclidean distance to the nearest boundary. An optional projection
//! restricts the comparison to a subset of the trace dimensions.

use ordered_float::OrderedFloat;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetError {
    #[error("constraint matrix has {rows} rows but the bound vector has {bounds} entries")]
    BoundCount { rows: usize, bounds: usize },

    #[error("constraint row {row} has {columns} columns, expected {expected}")]
    RaggedMatrix {
        row: usize,
        columns: usize,
        expected: usize,
    },

    #[error("constraint row {row} of a one-dimensional set has a zero coefficient")]
    ZeroCoefficient { row: usize },

    #[error("one-dimensional sets support at most two constraints, found {count}")]
    TooManyConstraints { count: usize },

    #[error("the two constraints of a one-dimensional set bound the same direction")]
    RedundantConstraints,

    #[error("the constraints describe an empty set")]
    EmptySet,

    #[error("projection indices must be strictly increasing")]
    InvalidProjection,

    #[error("state has {dimensions} dimensions but the set constrains {expected}")]
    DimensionMismatch { dimensions: usize, expected: usize },
}

/// A convex region of the state space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConvexSet {
    rows: Vec<Vec<f64>>,
    bounds: Vec<f64>,
    projection: Option<Vec<usize>>,
}

impl ConvexSet {
    /// The region covering all of `R^n`. Every state satisfies it with infinite margin.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build a region from constraint rows and their bounds, validating the shape.
    pub fn new(rows: Vec<Vec<f64>>, bounds: Vec<f64>) -> Result<Self, SetError> {
        if rows.len() != bounds.len() {
            return Err(SetError::BoundCount {
                rows: rows.len(),
                bounds: bounds.len(),
            });
        }

        let width = rows.first().map(Vec::len).unwrap_or(0);

        if !rows.is_empty() && width == 0 {
            return Err(SetError::RaggedMatrix {
                row: 0,
                columns: 0,
                expected: 1,
            });
        }

        for (row, coefficients) in rows.iter().enumerate() {
            if coefficients.len() != width {
                return Err(SetError::RaggedMatrix {
                    row,
                    columns: coefficients.len(),
                    expected: width,
                });
            }
        }

        if width == 1 {
            validate_interval(&rows, &bounds)?;
        }

        Ok(Self {
            rows,
            bounds,
            projection: None,
        })
    }

    /// Like [`ConvexSet::new`], but comparing the constraint columns against the given subset of
    /// trace dimensions instead of all of them.
    pub fn with_projection(
        rows: Vec<Vec<f64>>,
        bounds: Vec<f64>,
        projection: Vec<usize>,
    ) -> Result<Self, SetError> {
        let mut set = Self::new(rows, bounds)?;

        if set.width() != projection.len() {
            return Err(SetError::DimensionMismatch {
                dimensions: projection.len(),
                expected: set.width(),
            });
        }

        let increasing = projection.windows(2).all(|pair| pair[0] < pair[1]);

        if !increasing {
            return Err(SetError::InvalidProjection);
        }

        set.projection = Some(projection);
        Ok(set)
    }

    /// Single half-space `a·x <= b`.
    pub fn half_space(coefficients: Vec<f64>, bound: f64) -> Result<Self, SetError> {
        Self::new(vec![coefficients], vec![bound])
    }

    /// One-dimensional interval `lower <= x <= upper`.
    pub fn interval(lower: f64, upper: f64) -> Result<Self, SetError> {
        Self::new(vec![vec![-1.0], vec![1.0]], vec![-lower, upper])
    }

    /// Number of constraint columns, zero for the unconstrained region.
    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn constraints(&self) -> usize {
        self.rows.len()
    }

    /// Trace dimensions the set reads: either the largest projected index or the full width.
    pub fn required_dimensions(&self) -> usize {
        match &self.projection {
            Some(indices) => indices.last().map(|last| last + 1).unwrap_or(0),
            None => self.width(),
        }
    }

    /// Signed euclidean distance from a state to the region boundary.
    ///
    /// Positive inside the region, negative outside. For a polytope of more than one constraint
    /// in more than one dimension no distance is computed; the state is reported as maximally
    /// violating with a diagnostic, since callers cannot distinguish the degraded value from a
    /// genuine violation.
    pub fn signed_distance(&self, state: &[f64]) -> Result<f64, SetError> {
        if self.is_unconstrained() {
            return Ok(f64::INFINITY);
        }

        let point = self.project(state)?;

        if point.len() == 1 {
            Ok(self.interval_distance(point[0]))
        } else if self.rows.len() == 1 {
            Ok(self.half_space_distance(&point))
        } else {
            log::warn!(
                "no distance for a polytope of {} constraints in {} dimensions, reporting the state as maximally violating",
                self.rows.len(),
                point.len(),
            );

            Ok(f64::NEG_INFINITY)
        }
    }

    fn project(&self, state: &[f64]) -> Result<Vec<f64>, SetError> {
        match &self.projection {
            Some(indices) => indices
                .iter()
                .map(|&index| {
                    state.get(index).copied().ok_or(SetError::DimensionMismatch {
                        dimensions: state.len(),
                        expected: index + 1,
                    })
                })
                .collect(),
            None => {
                if state.len() != self.width() {
                    return Err(SetError::DimensionMismatch {
                        dimensions: state.len(),
                        expected: self.width(),
                    });
                }

                Ok(state.to_vec())
            }
        }
    }

    fn interval_distance(&self, x: f64) -> f64 {
        let satisfied = self
            .rows
            .iter()
            .zip(&self.bounds)
            .all(|(row, &bound)| row[0] * x <= bound);

        let boundary = self
            .rows
            .iter()
            .zip(&self.bounds)
            .map(|(row, &bound)| OrderedFloat((bound / row[0] - x).abs()))
            .min()
            .map(|distance| distance.into_inner())
            .unwrap_or(f64::INFINITY);

        if satisfied {
            boundary
        } else {
            -boundary
        }
    }

    fn half_space_distance(&self, point: &[f64]) -> f64 {
        let row = &self.rows[0];
        let bound = self.bounds[0];
        let dot: f64 = row.iter().zip(point).map(|(a, x)| a * x).sum();
        let norm = row.iter().map(|a| a * a).sum::<f64>().sqrt();

        if norm == 0.0 {
            if bound >= 0.0 {
                f64::INFINITY
            } else {
                f64::NEG_INFINITY
            }
        } else {
            (bound - dot) / norm
        }
    }
}

fn validate_interval(rows: &[Vec<f64>], bounds: &[f64]) -> Result<(), SetError> {
    if rows.len() > 2 {
        return Err(SetError::TooManyConstraints { count: rows.len() });
    }

    for (row, coefficients) in rows.iter().enumerate() {
        if coefficients[0] == 0.0 {
            return Err(SetError::ZeroCoefficient { row });
        }
    }

    if rows.len() == 2 {
        let a0 = rows[0][0];
        let a1 = rows[1][0];

        if a0.signum() == a1.signum() {
            return Err(SetError::RedundantConstraints);
        }

        let nonempty = (a0 < 0.0 && bounds[0] / a0 <= bounds[1] / a1)
            || (a1 < 0.0 && bounds[1] / a1 <= bounds[0] / a0);

        if !nonempty {
            return Err(SetError::EmptySet);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{ConvexSet, SetError};

    #[test]
    fn unconstrained_has_infinite_margin() -> Result<(), SetError> {
        let set = ConvexSet::unconstrained();

        assert_eq!(set.signed_distance(&[1.0, -20.0])?, f64::INFINITY);
        Ok(())
    }

    #[test]
    fn single_bound_distances() -> Result<(), SetError> {
        let set = ConvexSet::half_space(vec![1.0], 5.0)?;

        assert_relative_eq!(set.signed_distance(&[1.0])?, 4.0);
        assert_relative_eq!(set.signed_distance(&[3.0])?, 2.0);
        assert_relative_eq!(set.signed_distance(&[6.0])?, -1.0);
        Ok(())
    }

    #[test]
    fn interval_distances() -> Result<(), SetError> {
        let set = ConvexSet::interval(0.0, 4.0)?;

        assert_relative_eq!(set.signed_distance(&[1.0])?, 1.0);
        assert_relative_eq!(set.signed_distance(&[3.5])?, 0.5);
        assert_relative_eq!(set.signed_distance(&[6.0])?, -2.0);
        assert_relative_eq!(set.signed_distance(&[-3.0])?, -3.0);
        Ok(())
    }

    #[test]
    fn half_space_uses_perpendicular_distance() -> Result<(), SetError> {
        let set = ConvexSet::half_space(vec![3.0, 4.0], 0.0)?;

        // |3x + 4y| / 5
        assert_relative_eq!(set.signed_distance(&[-1.0, -0.5])?, 1.0);
        assert_relative_eq!(set.signed_distance(&[3.0, 4.0])?, -5.0);
        Ok(())
    }

    #[test]
    fn projection_selects_trace_columns() -> Result<(), SetError> {
        let set = ConvexSet::with_projection(vec![vec![1.0]], vec![5.0], vec![2])?;

        assert_relative_eq!(set.signed_distance(&[100.0, 100.0, 3.0])?, 2.0);
        Ok(())
    }

    #[test]
    fn polytope_degrades_to_violation() -> Result<(), SetError> {
        let set = ConvexSet::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![1.0, 1.0])?;

        assert_eq!(set.signed_distance(&[0.0, 0.0])?, f64::NEG_INFINITY);
        Ok(())
    }

    #[test]
    fn shape_validation() {
        assert_eq!(
            ConvexSet::new(vec![vec![1.0]], vec![1.0, 2.0]),
            Err(SetError::BoundCount { rows: 1, bounds: 2 })
        );

        assert_eq!(
            ConvexSet::new(vec![vec![1.0, 2.0], vec![1.0]], vec![1.0, 2.0]),
            Err(SetError::RaggedMatrix {
                row: 1,
                columns: 1,
                expected: 2
            })
        );

        assert_eq!(
            ConvexSet::new(vec![vec![1.0], vec![2.0]], vec![1.0, 2.0]),
            Err(SetError::RedundantConstraints)
        );

        assert_eq!(ConvexSet::interval(4.0, 0.0), Err(SetError::EmptySet));

        let mismatch = ConvexSet::half_space(vec![1.0, 1.0], 0.0)
            .unwrap()
            .signed_distance(&[1.0]);

        assert_eq!(
            mismatch,
            Err(SetError::DimensionMismatch {
                dimensions: 1,
                expected: 2
            })
        );
    }
}
