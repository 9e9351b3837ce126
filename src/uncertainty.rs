//! Monte Carlo propagation of parameter uncertainty to the top event.

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::budget::{Interrupt, Watchdog};
use crate::expression::Sampler;
use crate::probability::Quantify;

/// Trials run by one worker with one generator.
pub const CHUNK_SIZE: usize = 64;

/// Two-sided 95% quantile of the standard normal distribution.
const Z_975: f64 = 1.96;

/// One histogram bin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    /// Fraction of trials per unit of probability. A degenerate histogram
    /// (all trials equal) has a single bin of zero width with density 1.
    pub density: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UncertaintyResult {
    pub num_trials: usize,
    pub mean: f64,
    pub sigma: f64,
    /// 95% confidence interval of the mean.
    pub confidence_interval: (f64, f64),
    pub histogram: Vec<Bin>,
}

pub struct UncertaintyAnalysis<'a> {
    quantify: &'a dyn Quantify,
    samplers: &'a [Sampler],
    watchdog: Watchdog,
}

impl<'a> UncertaintyAnalysis<'a> {
    /// `samplers[i]` draws the probability of variable `i + 1`.
    pub fn new(quantify: &'a dyn Quantify, samplers: &'a [Sampler]) -> Self {
        Self {
            quantify,
            samplers,
            watchdog: Watchdog::default(),
        }
    }

    /// Poll `watchdog` before every chunk of trials.
    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Run `num_trials` trials. Chunk `c` uses a generator seeded with
    /// `seed + c`, so the outcome only depends on the arguments.
    pub fn run(&self, num_trials: usize, num_bins: usize, seed: u64) -> Result<UncertaintyResult, Interrupt> {
        let num_chunks = num_trials.div_ceil(CHUNK_SIZE);
        debug!("running {} trials in {} chunks", num_trials, num_chunks);

        let chunks: Vec<Vec<f64>> = (0..num_chunks)
            .into_par_iter()
            .map(|chunk| -> Result<Vec<f64>, Interrupt> {
                self.watchdog.check()?;
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(chunk as u64));
                let trials = CHUNK_SIZE.min(num_trials - chunk * CHUNK_SIZE);
                let mut p = vec![0.0; self.samplers.len()];
                Ok((0..trials)
                    .map(|_| {
                        for (value, sampler) in p.iter_mut().zip(self.samplers) {
                            *value = sampler.sample(&mut rng);
                        }
                        self.quantify.probability(&p).clamp(0.0, 1.0)
                    })
                    .collect())
            })
            .collect::<Result<_, Interrupt>>()?;
        let samples: Vec<f64> = chunks.into_iter().flatten().collect();

        let result = summarize(&samples, num_bins);
        info!(
            "uncertainty: mean = {:.6e}, sigma = {:.6e} over {} trials",
            result.mean, result.sigma, result.num_trials
        );
        Ok(result)
    }
}

fn summarize(samples: &[f64], num_bins: usize) -> UncertaintyResult {
    let n = samples.len();
    let mean = samples.iter().sum::<f64>() / n as f64;
    let sigma = if n > 1 {
        let sum_sq: f64 = samples.iter().map(|x| (x - mean) * (x - mean)).sum();
        (sum_sq / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    let half_width = Z_975 * sigma / (n as f64).sqrt();

    UncertaintyResult {
        num_trials: n,
        mean,
        sigma,
        confidence_interval: (mean - half_width, mean + half_width),
        histogram: histogram(samples, num_bins),
    }
}

fn histogram(samples: &[f64], num_bins: usize) -> Vec<Bin> {
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / num_bins as f64;
    if width.is_nan() || width <= 0.0 {
        return vec![Bin {
            lower: min,
            upper: max,
            density: 1.0,
        }];
    }

    let mut counts = vec![0usize; num_bins];
    for &x in samples {
        let bin = (((x - min) / width) as usize).min(num_bins - 1);
        counts[bin] += 1;
    }
    let n = samples.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            lower: min + i as f64 * width,
            upper: min + (i + 1) as f64 * width,
            density: count as f64 / (n * width),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::budget::CancelToken;
    use crate::expression::Deviate;
    use crate::probability::RareEvent;
    use crate::types::Var;

    fn setup() -> (RareEvent, Vec<Sampler>) {
        let rare = RareEvent::new(vec![vec![Var::new(1).pos()], vec![Var::new(2).pos()]]);
        let samplers = vec![
            Sampler::Probability(Deviate::Uniform { min: 0.1, max: 0.3 }),
            Sampler::Fixed(0.05),
        ];
        (rare, samplers)
    }

    #[test]
    fn test_mean_and_interval() {
        let (rare, samplers) = setup();
        let result = UncertaintyAnalysis::new(&rare, &samplers).run(5000, 10, 372).unwrap();

        assert_eq!(result.num_trials, 5000);
        assert!((result.mean - 0.25).abs() < 0.005, "mean = {}", result.mean);
        // Uniform on a width of 0.2.
        let expected_sigma = 0.2 / 12f64.sqrt();
        assert!((result.sigma - expected_sigma).abs() < 0.005);
        let (lo, hi) = result.confidence_interval;
        assert!(lo < result.mean && result.mean < hi);
    }

    #[test]
    fn test_histogram_integrates_to_one() {
        let (rare, samplers) = setup();
        let result = UncertaintyAnalysis::new(&rare, &samplers).run(1000, 20, 7).unwrap();

        assert_eq!(result.histogram.len(), 20);
        let mass: f64 = result.histogram.iter().map(|b| b.density * (b.upper - b.lower)).sum();
        assert!((mass - 1.0).abs() < 1e-9);
        assert!(result.histogram[0].lower >= 0.15 - 1e-12);
    }

    #[test]
    fn test_reproducible() {
        let (rare, samplers) = setup();
        let analysis = UncertaintyAnalysis::new(&rare, &samplers);
        assert_eq!(analysis.run(300, 5, 42).unwrap(), analysis.run(300, 5, 42).unwrap());
        assert_ne!(analysis.run(300, 5, 42).unwrap().mean, analysis.run(300, 5, 43).unwrap().mean);
    }

    #[test]
    fn test_cancelled_between_chunks() {
        let (rare, samplers) = setup();
        let token = CancelToken::new();
        token.cancel();
        let analysis = UncertaintyAnalysis::new(&rare, &samplers).with_watchdog(Watchdog::new(token, None));
        assert_eq!(analysis.run(1000, 10, 1), Err(Interrupt::Cancelled));
    }

    #[test]
    fn test_fixed_parameters_are_degenerate() {
        let rare = RareEvent::new(vec![vec![Var::new(1).pos()]]);
        let samplers = vec![Sampler::Fixed(0.2)];
        let result = UncertaintyAnalysis::new(&rare, &samplers).run(10, 4, 1).unwrap();
        assert!((result.mean - 0.2).abs() < 1e-12);
        assert!(result.sigma < 1e-12);
        assert_eq!(result.histogram, vec![Bin { lower: 0.2, upper: 0.2, density: 1.0 }]);
    }
}
