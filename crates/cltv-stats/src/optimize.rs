//! Derivative-free minimization with the Nelder-Mead simplex method.
//!
//! The likelihood surfaces of the count and value models are smooth but their
//! gradients involve digamma functions of every customer's frequency; a
//! simplex search over log-transformed parameters only needs objective values
//! and is robust to the flat regions those surfaces have far from the optimum.
//!
//! # Algorithm
//!
//! Each iteration replaces the worst vertex of an `n + 1` vertex simplex by
//! reflecting it through the centroid of the others, expanding or contracting
//! the step depending on how the reflected point ranks. When no contraction
//! improves on the worst vertex, the whole simplex shrinks toward the best one.
//!
//! The search stops once both the simplex diameter and the spread of objective
//! values across its vertices fall below the configured tolerances.
//!
//! Objective values that are NaN are treated as `+inf`, so a vertex that lands
//! in an undefined region is always replaced first.
//!
//! # Examples
//!
//! ```
//! use cltv_stats::optimize::NelderMead;
//!
//! // Rosenbrock function, minimum at (1, 1)
//! let rosenbrock = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
//!
//! let minimum = NelderMead::default().minimize(rosenbrock, &[-1.2, 1.0]).unwrap();
//! assert!((minimum.point[0] - 1.0).abs() < 1e-3);
//! assert!((minimum.point[1] - 1.0).abs() < 1e-3);
//! ```

use std::cell::Cell;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Errors reported by [`NelderMead::minimize`].
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum OptimizeError {
    #[display("cannot minimize over an empty parameter vector")]
    EmptyStart,
    #[display("objective is not finite at the starting point")]
    NonFiniteStart,
    #[display("simplex did not converge within {iterations} iterations (best value {best_value})")]
    NotConverged { iterations: usize, best_value: f64 },
}

/// The result of a successful minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Location of the best vertex.
    pub point: Vec<f64>,
    /// Objective value at [`Minimum::point`].
    pub value: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Number of objective evaluations performed.
    pub evaluations: usize,
}

/// Nelder-Mead simplex minimizer settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    /// Iteration budget; exceeding it is an error.
    pub max_iterations: usize,
    /// Convergence threshold on the largest coordinate distance from the best vertex.
    pub x_tolerance: f64,
    /// Convergence threshold on the largest objective gap from the best vertex.
    pub f_tolerance: f64,
    /// Edge length of the initial simplex along each axis.
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            x_tolerance: 1e-7,
            f_tolerance: 1e-9,
            initial_step: 0.5,
        }
    }
}

impl NelderMead {
    /// Minimizes `objective` starting from `start`.
    ///
    /// # Errors
    ///
    /// - [`OptimizeError::EmptyStart`] if `start` is empty
    /// - [`OptimizeError::NonFiniteStart`] if the objective is not finite at `start`
    /// - [`OptimizeError::NotConverged`] if the tolerances are not met within
    ///   [`NelderMead::max_iterations`]
    pub fn minimize<F>(&self, mut objective: F, start: &[f64]) -> Result<Minimum, OptimizeError>
    where
        F: FnMut(&[f64]) -> f64,
    {
        let dim = start.len();
        if dim == 0 {
            return Err(OptimizeError::EmptyStart);
        }

        let evaluations = Cell::new(0);
        let mut evaluate = |x: &[f64]| {
            evaluations.set(evaluations.get() + 1);
            let value = objective(x);
            if value.is_nan() { f64::INFINITY } else { value }
        };

        let start_value = evaluate(start);
        if !start_value.is_finite() {
            return Err(OptimizeError::NonFiniteStart);
        }

        let mut simplex = Vec::with_capacity(dim + 1);
        simplex.push((start.to_vec(), start_value));
        for i in 0..dim {
            let mut vertex = start.to_vec();
            vertex[i] += self.initial_step;
            let value = evaluate(&vertex);
            simplex.push((vertex, value));
        }

        for iteration in 0..self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

            if self.has_converged(&simplex) {
                let (point, value) = simplex.swap_remove(0);
                return Ok(Minimum {
                    point,
                    value,
                    iterations: iteration,
                    evaluations: evaluations.get(),
                });
            }

            let centroid = centroid(&simplex[..dim]);
            let (worst, worst_value) = simplex[dim].clone();
            let best_value = simplex[0].1;
            let second_worst_value = simplex[dim - 1].1;

            let reflected = affine(&centroid, &worst, -REFLECTION);
            let reflected_value = evaluate(&reflected);

            if reflected_value < best_value {
                let expanded = affine(&centroid, &worst, -EXPANSION);
                let expanded_value = evaluate(&expanded);
                simplex[dim] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
                continue;
            }

            if reflected_value < second_worst_value {
                simplex[dim] = (reflected, reflected_value);
                continue;
            }

            // Outside contraction when the reflected point beats the worst vertex,
            // inside contraction otherwise.
            let (contracted, threshold) = if reflected_value < worst_value {
                (affine(&centroid, &worst, -REFLECTION * CONTRACTION), reflected_value)
            } else {
                (affine(&centroid, &worst, CONTRACTION), worst_value)
            };
            let contracted_value = evaluate(&contracted);
            if contracted_value <= threshold {
                simplex[dim] = (contracted, contracted_value);
                continue;
            }

            let best = simplex[0].0.clone();
            for (vertex, value) in &mut simplex[1..] {
                *vertex = affine(&best, vertex, SHRINK);
                *value = evaluate(vertex);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        Err(OptimizeError::NotConverged {
            iterations: self.max_iterations,
            best_value: simplex[0].1,
        })
    }

    fn has_converged(&self, sorted_simplex: &[(Vec<f64>, f64)]) -> bool {
        let (best, best_value) = &sorted_simplex[0];
        sorted_simplex[1..].iter().all(|(vertex, value)| {
            (value - best_value).abs() <= self.f_tolerance
                && vertex
                    .iter()
                    .zip(best)
                    .all(|(v, b)| (v - b).abs() <= self.x_tolerance)
        })
    }
}

#[expect(clippy::cast_precision_loss)]
fn centroid(vertices: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let dim = vertices[0].0.len();
    let n = vertices.len() as f64;
    (0..dim)
        .map(|i| vertices.iter().map(|(v, _)| v[i]).sum::<f64>() / n)
        .collect()
}

/// Returns `origin + t * (point - origin)`.
fn affine(origin: &[f64], point: &[f64], t: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(point)
        .map(|(o, p)| t.mul_add(p - o, *o))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_bowl() {
        let minimum = NelderMead::default()
            .minimize(
                |x| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2) + (x[2] - 0.5).powi(2),
                &[0.0, 0.0, 0.0],
            )
            .unwrap();
        assert!((minimum.point[0] - 3.0).abs() < 1e-4);
        assert!((minimum.point[1] + 1.0).abs() < 1e-4);
        assert!((minimum.point[2] - 0.5).abs() < 1e-4);
        assert!(minimum.value < 1e-8);
    }

    #[test]
    fn test_nan_region_is_avoided() {
        // ln is undefined for x <= 0; minimum of x - ln x is at x = 1.
        let minimum = NelderMead::default()
            .minimize(|x| x[0] - x[0].ln(), &[0.2])
            .unwrap();
        assert!((minimum.point[0] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_finite_start() {
        let result = NelderMead::default().minimize(|x| x[0].ln(), &[-1.0]);
        assert_eq!(result, Err(OptimizeError::NonFiniteStart));
    }

    #[test]
    fn test_empty_start() {
        let result = NelderMead::default().minimize(|_| 0.0, &[]);
        assert_eq!(result, Err(OptimizeError::EmptyStart));
    }

    #[test]
    fn test_iteration_budget_exhausted() {
        let optimizer = NelderMead {
            max_iterations: 3,
            ..NelderMead::default()
        };
        let result = optimizer.minimize(|x| (x[0] - 100.0).powi(2), &[0.0]);
        assert!(matches!(
            result,
            Err(OptimizeError::NotConverged { iterations: 3, .. })
        ));
    }
}
