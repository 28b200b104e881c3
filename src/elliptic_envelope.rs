use nalgebra::DMatrix;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::error::Error;

use crate::parse::FEATURE_DIMENSIONS;
use crate::stats::{calc_median, calc_percentile};

const INITIAL_SUBSET_COUNT: usize = 30;
const MAX_REFINEMENT_STEPS: usize = 30;
const SINGULARITY_EPSILON: f64 = 1e-9;

pub struct EllipticEnvelope {
    contamination: f64,
    seed: u64,
    location: Option<[f64; FEATURE_DIMENSIONS]>,
    precision: Option<DMatrix<f64>>,
    offset: f64,
}

impl EllipticEnvelope {
    pub fn new(contamination: f64, seed: u64) -> Self {
        assert!(
            contamination > 0.0 && contamination <= 0.5,
            "contamination must be in (0, 0.5], got {contamination}"
        );

        Self {
            contamination,
            seed,
            location: None,
            precision: None,
            offset: 0.0,
        }
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Fit a minimum-covariance-determinant estimate of the data's location
    /// and covariance, then place the inlier/outlier cutoff at the
    /// contamination percentile of the resulting scores.
    pub fn fit(&mut self, features: &Array2<f64>) -> Result<(), Box<dyn Error>> {
        let sample_count = features.nrows();
        if sample_count <= FEATURE_DIMENSIONS {
            return Err(
                format!("cannot fit an envelope to only {sample_count} rows of data").into(),
            );
        }

        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        let support_size = (0.5 * (sample_count + FEATURE_DIMENSIONS + 1) as f64).ceil() as usize;

        let (location, covariance) = if support_size >= sample_count {
            let all_rows: Vec<usize> = (0..sample_count).collect();
            estimate_from_rows(features, &all_rows)
        } else {
            self.smallest_determinant_estimate(features, support_size)?
        };

        // Rescale the raw estimate so its distances are chi-square
        // distributed for normally distributed inliers.
        let precision = invert_covariance(&covariance)?;
        let raw_distances = mahalanobis_squared(features, &location, &precision);
        let correction = calc_median(&raw_distances) / chi_squared_quantile(0.5);

        // Re-estimate from every point within the corrected 97.5% quantile.
        let cutoff = chi_squared_quantile(0.975) * correction;
        let supported: Vec<usize> = (0..sample_count)
            .filter(|&row| raw_distances[row] < cutoff)
            .collect();
        let (location, covariance) = if supported.len() > FEATURE_DIMENSIONS {
            estimate_from_rows(features, &supported)
        } else {
            (location, covariance)
        };

        self.location = Some(location);
        self.precision = Some(invert_covariance(&covariance)?);

        let scores = self.score_samples(features);
        self.offset = calc_percentile(&scores, 100.0 * self.contamination);

        Ok(())
    }

    /// Negated squared Mahalanobis distance; higher values are more
    /// inlier-like.
    pub fn score_samples(&self, features: &Array2<f64>) -> Vec<f64> {
        let location = self.location.as_ref().expect("Envelope is not fitted");
        let precision = self.precision.as_ref().expect("Envelope is not fitted");

        mahalanobis_squared(features, location, precision)
            .iter()
            .map(|&distance| -distance)
            .collect()
    }

    pub fn decision_function(&self, features: &Array2<f64>) -> Vec<f64> {
        self.score_samples(features)
            .iter()
            .map(|&score| score - self.offset)
            .collect()
    }

    pub fn predict(&self, features: &Array2<f64>) -> Vec<f64> {
        self.decision_function(features)
            .iter()
            .map(|&decision| if decision > 0.0 { 1.0 } else { -1.0 })
            .collect()
    }

    /// Run the refinement from several random starting subsets and keep the
    /// support whose covariance has the smallest determinant.
    fn smallest_determinant_estimate(
        &self,
        features: &Array2<f64>,
        support_size: usize,
    ) -> Result<([f64; FEATURE_DIMENSIONS], DMatrix<f64>), Box<dyn Error>> {
        let sample_count = features.nrows();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut indices: Vec<usize> = (0..sample_count).collect();

        let mut best: Option<(f64, [f64; FEATURE_DIMENSIONS], DMatrix<f64>)> = None;

        for _ in 0..INITIAL_SUBSET_COUNT {
            indices.shuffle(&mut rng);
            let mut support = indices[..FEATURE_DIMENSIONS + 1].to_vec();
            support.sort_unstable();

            let (mut location, mut covariance) = estimate_from_rows(features, &support);

            // C-steps: re-estimate from the rows closest to the current
            // estimate until the support stops changing.
            for _ in 0..MAX_REFINEMENT_STEPS {
                let precision = invert_covariance(&covariance)?;
                let distances = mahalanobis_squared(features, &location, &precision);

                let mut order: Vec<usize> = (0..sample_count).collect();
                order.sort_by(|&a, &b| {
                    distances[a]
                        .partial_cmp(&distances[b])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                let mut refined = order[..support_size].to_vec();
                refined.sort_unstable();

                let (refined_location, refined_covariance) =
                    estimate_from_rows(features, &refined);
                let converged = refined == support;
                support = refined;
                location = refined_location;
                covariance = refined_covariance;

                if converged {
                    break;
                }
            }

            let determinant = covariance.determinant().abs();
            let improved = match &best {
                Some((best_determinant, _, _)) => determinant < *best_determinant,
                None => true,
            };
            if improved {
                best = Some((determinant, location, covariance));
            }
        }

        let (_, location, covariance) =
            best.ok_or("no candidate covariance estimate was produced")?;
        Ok((location, covariance))
    }
}

// chi-square inverse CDF with FEATURE_DIMENSIONS (= 2) degrees of freedom
fn chi_squared_quantile(probability: f64) -> f64 {
    -2.0 * (1.0 - probability).ln()
}

fn estimate_from_rows(
    features: &Array2<f64>,
    rows: &[usize],
) -> ([f64; FEATURE_DIMENSIONS], DMatrix<f64>) {
    let count = rows.len() as f64;

    let mut location = [0.0; FEATURE_DIMENSIONS];
    for &row in rows {
        for column in 0..FEATURE_DIMENSIONS {
            location[column] += features[(row, column)];
        }
    }
    for value in &mut location {
        *value /= count;
    }

    let mut covariance = DMatrix::zeros(FEATURE_DIMENSIONS, FEATURE_DIMENSIONS);
    for &row in rows {
        for i in 0..FEATURE_DIMENSIONS {
            for j in 0..FEATURE_DIMENSIONS {
                covariance[(i, j)] +=
                    (features[(row, i)] - location[i]) * (features[(row, j)] - location[j]);
            }
        }
    }
    covariance /= count;

    (location, covariance)
}

/// Invert a covariance matrix, falling back to the SVD pseudo-inverse when
/// the matrix is singular (collinear or duplicated points).
fn invert_covariance(covariance: &DMatrix<f64>) -> Result<DMatrix<f64>, Box<dyn Error>> {
    let scale = (covariance.trace() / FEATURE_DIMENSIONS as f64).max(f64::MIN_POSITIVE);
    let determinant = covariance.determinant();

    if determinant.abs() > SINGULARITY_EPSILON * scale * scale {
        return covariance
            .clone()
            .try_inverse()
            .ok_or_else(|| "covariance matrix is not invertible".into());
    }

    covariance
        .clone()
        .pseudo_inverse(SINGULARITY_EPSILON * scale)
        .map_err(Into::into)
}

// d^2 = (x - mu)^T * P * (x - mu)
fn mahalanobis_squared(
    features: &Array2<f64>,
    location: &[f64; FEATURE_DIMENSIONS],
    precision: &DMatrix<f64>,
) -> Vec<f64> {
    let mut distances = Vec::with_capacity(features.nrows());

    for row in 0..features.nrows() {
        let mut deviation = [0.0; FEATURE_DIMENSIONS];
        for column in 0..FEATURE_DIMENSIONS {
            deviation[column] = features[(row, column)] - location[column];
        }

        let mut distance = 0.0;
        for i in 0..FEATURE_DIMENSIONS {
            for j in 0..FEATURE_DIMENSIONS {
                distance += deviation[i] * precision[(i, j)] * deviation[j];
            }
        }
        distances.push(distance);
    }

    distances
}
