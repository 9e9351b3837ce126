//! Probability expressions of basic events and their uncertainty
//! distributions.

use rand::Rng;
use rand_distr::{Beta, Distribution, Gamma, LogNormal, Normal};

use crate::error::ExpressionError;

/// Quantile of the standard normal distribution at 95%, which relates the
/// error factor of a log-normal deviate to its sigma.
const Z_95: f64 = 1.645;

/// How a basic event's probability is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expression {
    /// A fixed probability in `[0, 1]`.
    Constant(f64),
    /// Exponential failure law: `1 - exp(-rate * t)` at mission time `t`.
    Exponential { rate: f64 },
    /// Pass-through; always evaluates to 1.
    Null,
}

impl Expression {
    /// Evaluate the probability at `mission_time`, checking its domain.
    /// `event` names the owner in the error.
    pub fn probability(&self, event: &str, mission_time: f64) -> Result<f64, ExpressionError> {
        match *self {
            Expression::Constant(p) => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(ExpressionError::ProbabilityOutOfRange {
                        event: event.to_string(),
                        value: p,
                    });
                }
                Ok(p)
            }
            Expression::Exponential { rate } => {
                if !(rate >= 0.0) {
                    return Err(ExpressionError::NegativeRate {
                        event: event.to_string(),
                        rate,
                    });
                }
                if !(mission_time >= 0.0) {
                    return Err(ExpressionError::NegativeMissionTime {
                        event: event.to_string(),
                        time: mission_time,
                    });
                }
                Ok(exponential(rate, mission_time))
            }
            Expression::Null => Ok(1.0),
        }
    }
}

fn exponential(rate: f64, t: f64) -> f64 {
    -(-rate * t).exp_m1()
}

/// Uncertainty distribution of a basic event's parameter.
///
/// For a [`Expression::Constant`] the deviate samples the probability
/// itself; for an [`Expression::Exponential`] it samples the failure rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deviate {
    Uniform { min: f64, max: f64 },
    Normal { mean: f64, sigma: f64 },
    /// Log-normal given by its mean and the error factor at 95%.
    LogNormal { mean: f64, error_factor: f64 },
    Gamma { k: f64, theta: f64 },
    Beta { alpha: f64, beta: f64 },
}

impl Deviate {
    pub fn validate(&self, event: &str) -> Result<(), ExpressionError> {
        let invalid = |parameter: &'static str, value: f64| ExpressionError::InvalidDeviate {
            event: event.to_string(),
            parameter,
            value,
        };
        match *self {
            Deviate::Uniform { min, max } => {
                if !(min < max) {
                    return Err(invalid("max", max));
                }
            }
            Deviate::Normal { sigma, .. } => {
                if !(sigma > 0.0) {
                    return Err(invalid("sigma", sigma));
                }
            }
            Deviate::LogNormal { mean, error_factor } => {
                if !(mean > 0.0) {
                    return Err(invalid("mean", mean));
                }
                if !(error_factor > 1.0) {
                    return Err(invalid("error factor", error_factor));
                }
            }
            Deviate::Gamma { k, theta } => {
                if !(k > 0.0) {
                    return Err(invalid("k", k));
                }
                if !(theta > 0.0) {
                    return Err(invalid("theta", theta));
                }
            }
            Deviate::Beta { alpha, beta } => {
                if !(alpha > 0.0) {
                    return Err(invalid("alpha", alpha));
                }
                if !(beta > 0.0) {
                    return Err(invalid("beta", beta));
                }
            }
        }
        Ok(())
    }

    /// Expected value of the distribution.
    pub fn mean(&self) -> f64 {
        match *self {
            Deviate::Uniform { min, max } => (min + max) / 2.0,
            Deviate::Normal { mean, .. } => mean,
            Deviate::LogNormal { mean, .. } => mean,
            Deviate::Gamma { k, theta } => k * theta,
            Deviate::Beta { alpha, beta } => alpha / (alpha + beta),
        }
    }

    /// Draw one value. Parameters are assumed valid (see [`Deviate::validate`]);
    /// a distribution that cannot be built falls back to its mean.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Deviate::Uniform { min, max } => rng.gen_range(min..max),
            Deviate::Normal { mean, sigma } => match Normal::new(mean, sigma) {
                Ok(dist) => dist.sample(rng),
                Err(_) => mean,
            },
            Deviate::LogNormal { mean, error_factor } => {
                let sigma = error_factor.ln() / Z_95;
                let mu = mean.ln() - sigma * sigma / 2.0;
                match LogNormal::new(mu, sigma) {
                    Ok(dist) => dist.sample(rng),
                    Err(_) => mean,
                }
            }
            Deviate::Gamma { k, theta } => match Gamma::new(k, theta) {
                Ok(dist) => dist.sample(rng),
                Err(_) => self.mean(),
            },
            Deviate::Beta { alpha, beta } => match Beta::new(alpha, beta) {
                Ok(dist) => dist.sample(rng),
                Err(_) => self.mean(),
            },
        }
    }
}

/// Sampling recipe for one decision-diagram variable in a Monte Carlo trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampler {
    Fixed(f64),
    Probability(Deviate),
    Rate { deviate: Deviate, mission_time: f64 },
}

impl Sampler {
    pub fn new(expression: &Expression, deviate: Option<Deviate>, nominal: f64, mission_time: f64) -> Self {
        match (expression, deviate) {
            (Expression::Constant(_), Some(deviate)) => Sampler::Probability(deviate),
            (Expression::Exponential { .. }, Some(deviate)) => Sampler::Rate { deviate, mission_time },
            _ => Sampler::Fixed(nominal),
        }
    }

    /// Sampled probability, clamped to `[0, 1]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Sampler::Fixed(p) => p,
            Sampler::Probability(deviate) => deviate.sample(rng).clamp(0.0, 1.0),
            Sampler::Rate { deviate, mission_time } => {
                let rate = deviate.sample(rng).max(0.0);
                exponential(rate, mission_time)
            }
        }
    }
}
