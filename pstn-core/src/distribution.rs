//! Contingent-duration distributions.
//!
//! Every duration is stored already scaled to milliseconds, matching the
//! internal resolution the propagation and LP stages operate on.

use rand::Rng;
use rand_distr::Distribution as _;
use statrs::distribution::{ContinuousCDF, Normal, Uniform as StatrsUniform};
use thiserror::Error;

/// Lower tail clamp applied before any inverse-CDF lookup, matching the
/// reference SREA implementation's numerical-stability guard.
const LOWER_TAIL_CLAMP: f64 = 0.003;
/// Upper tail clamp applied before any inverse-CDF lookup.
const UPPER_TAIL_CLAMP: f64 = 0.997;

/// A contingent edge's duration distribution, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// A Gaussian distribution with the given mean and standard deviation.
    Gaussian {
        /// Mean duration, in milliseconds.
        mean_ms: f64,
        /// Standard deviation, in milliseconds.
        std_dev_ms: f64,
    },
    /// A uniform distribution over `[lower_ms, upper_ms]`.
    Uniform {
        /// Lower bound, in milliseconds.
        lower_ms: f64,
        /// Upper bound, in milliseconds.
        upper_ms: f64,
    },
}

/// Errors raised while constructing or evaluating a [`Distribution`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[non_exhaustive]
pub enum DistributionError {
    /// A Gaussian's standard deviation must be strictly positive.
    #[error("gaussian standard deviation must be positive (got {got})")]
    NonPositiveStdDev {
        /// The offending value.
        got: f64,
    },
    /// A uniform distribution's lower bound must not exceed its upper bound.
    #[error("uniform lower bound {lower} exceeds upper bound {upper}")]
    InvertedBounds {
        /// The offending lower bound.
        lower: f64,
        /// The offending upper bound.
        upper: f64,
    },
}

impl Distribution {
    /// Constructs a Gaussian distribution.
    ///
    /// # Errors
    /// Returns [`DistributionError::NonPositiveStdDev`] when `std_dev_ms` is
    /// not strictly positive.
    pub fn gaussian(mean_ms: f64, std_dev_ms: f64) -> Result<Self, DistributionError> {
        if std_dev_ms <= 0.0 {
            return Err(DistributionError::NonPositiveStdDev { got: std_dev_ms });
        }
        Ok(Self::Gaussian {
            mean_ms,
            std_dev_ms,
        })
    }

    /// Constructs a uniform distribution over `[lower_ms, upper_ms]`.
    ///
    /// # Errors
    /// Returns [`DistributionError::InvertedBounds`] when `lower_ms` exceeds
    /// `upper_ms`.
    pub fn uniform(lower_ms: f64, upper_ms: f64) -> Result<Self, DistributionError> {
        if lower_ms > upper_ms {
            return Err(DistributionError::InvertedBounds {
                lower: lower_ms,
                upper: upper_ms,
            });
        }
        Ok(Self::Uniform {
            lower_ms,
            upper_ms,
        })
    }

    /// Draws a sample, rounded to the nearest millisecond.
    ///
    /// Gaussian samples are clamped at zero: negative durations have no
    /// physical meaning for a contingent edge.
    ///
    /// # Errors
    /// Returns [`DistributionError`] if the underlying distribution cannot be
    /// constructed, which can only happen if `self` was built by bypassing
    /// the fallible constructors above.
    pub fn sample(&self, rng: &mut impl Rng) -> Result<f64, DistributionError> {
        match *self {
            Self::Gaussian {
                mean_ms,
                std_dev_ms,
            } => {
                let normal = Normal::new(mean_ms, std_dev_ms)
                    .map_err(|_| DistributionError::NonPositiveStdDev { got: std_dev_ms })?;
                let drawn = normal.sample(rng);
                Ok(drawn.max(0.0).round())
            }
            Self::Uniform {
                lower_ms,
                upper_ms,
            } => {
                let uniform = rand_distr::Uniform::new_inclusive(lower_ms, upper_ms);
                Ok(uniform.sample(rng).round())
            }
        }
    }

    /// Evaluates the inverse CDF (quantile function) at `p`.
    ///
    /// `p` is clamped to `[0.003, 0.997]` before lookup, matching the
    /// reference SREA implementation's tail-clamping for numerical
    /// stability when `p` approaches 0 or 1.
    ///
    /// # Errors
    /// Returns [`DistributionError`] if the underlying distribution cannot be
    /// constructed.
    pub fn inverse_cdf(&self, p: f64) -> Result<f64, DistributionError> {
        let p = p.clamp(LOWER_TAIL_CLAMP, UPPER_TAIL_CLAMP);
        match *self {
            Self::Gaussian {
                mean_ms,
                std_dev_ms,
            } => {
                let normal = Normal::new(mean_ms, std_dev_ms)
                    .map_err(|_| DistributionError::NonPositiveStdDev { got: std_dev_ms })?;
                Ok(normal.inverse_cdf(p))
            }
            Self::Uniform {
                lower_ms,
                upper_ms,
            } => {
                let uniform = StatrsUniform::new(lower_ms, upper_ms).map_err(|_| {
                    DistributionError::InvertedBounds {
                        lower: lower_ms,
                        upper: upper_ms,
                    }
                })?;
                Ok(uniform.inverse_cdf(p))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn gaussian_sample_never_goes_negative() {
        let dist = Distribution::gaussian(0.0, 1.0).expect("valid distribution");
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..256 {
            let sample = dist.sample(&mut rng).expect("sample succeeds");
            assert!(sample >= 0.0);
        }
    }

    #[test]
    fn uniform_sample_stays_within_bounds() {
        let dist = Distribution::uniform(10.0, 20.0).expect("valid distribution");
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..256 {
            let sample = dist.sample(&mut rng).expect("sample succeeds");
            assert!((10.0..=20.0).contains(&sample));
        }
    }

    #[test]
    fn uniform_rejects_inverted_bounds() {
        let err = Distribution::uniform(5.0, 1.0).expect_err("bounds are inverted");
        assert!(matches!(err, DistributionError::InvertedBounds { .. }));
    }

    #[test]
    fn gaussian_rejects_non_positive_std_dev() {
        let err = Distribution::gaussian(0.0, 0.0).expect_err("std dev is zero");
        assert!(matches!(err, DistributionError::NonPositiveStdDev { .. }));
    }

    #[test]
    fn inverse_cdf_clamps_extreme_quantiles() {
        let dist = Distribution::gaussian(100.0, 10.0).expect("valid distribution");
        let low = dist.inverse_cdf(0.0).expect("quantile succeeds");
        let clamped_low = dist.inverse_cdf(0.003).expect("quantile succeeds");
        assert!((low - clamped_low).abs() < f64::EPSILON);
    }
}
