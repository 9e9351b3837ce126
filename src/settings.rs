//! Analysis settings.
//!
//! [`Settings`] is an immutable value built with `with_*` setters, which
//! reject invalid values up front:
//!
//! ```
//! use fta_rs::probability::Approximation;
//! use fta_rs::settings::Settings;
//!
//! let settings = Settings::default()
//!     .with_approximation(Approximation::RareEvent)?
//!     .with_importance_analysis(true)
//!     .with_limit_order(4)?;
//! assert!(settings.probability_analysis());
//! assert!(Settings::default().with_cut_off(1.5).is_err());
//! # Ok::<(), fta_rs::error::SettingsError>(())
//! ```

use std::time::Duration;

use crate::error::SettingsError;
use crate::probability::Approximation;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    approximation: Approximation,
    prime_implicants: bool,
    probability_analysis: bool,
    importance_analysis: bool,
    uncertainty_analysis: bool,
    limit_order: usize,
    mission_time: f64,
    cut_off: f64,
    num_trials: usize,
    num_bins: usize,
    seed: u64,
    time_limit: Option<Duration>,
    node_limit: usize,
    product_limit: Option<usize>,
    rare_event_divergence: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            approximation: Approximation::Exact,
            prime_implicants: false,
            probability_analysis: false,
            importance_analysis: false,
            uncertainty_analysis: false,
            limit_order: 20,
            mission_time: 8760.0,
            cut_off: 0.0,
            num_trials: 1000,
            num_bins: 20,
            seed: 372,
            time_limit: None,
            node_limit: 1 << 22,
            product_limit: None,
            rare_event_divergence: Some(0.1),
        }
    }
}

impl Settings {
    pub fn approximation(&self) -> Approximation {
        self.approximation
    }
    pub fn prime_implicants(&self) -> bool {
        self.prime_implicants
    }
    pub fn probability_analysis(&self) -> bool {
        self.probability_analysis
    }
    pub fn importance_analysis(&self) -> bool {
        self.importance_analysis
    }
    pub fn uncertainty_analysis(&self) -> bool {
        self.uncertainty_analysis
    }
    pub fn limit_order(&self) -> usize {
        self.limit_order
    }
    pub fn mission_time(&self) -> f64 {
        self.mission_time
    }
    pub fn cut_off(&self) -> f64 {
        self.cut_off
    }
    pub fn num_trials(&self) -> usize {
        self.num_trials
    }
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }
    pub fn seed(&self) -> u64 {
        self.seed
    }
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }
    pub fn node_limit(&self) -> usize {
        self.node_limit
    }
    pub fn product_limit(&self) -> Option<usize> {
        self.product_limit
    }
    pub fn rare_event_divergence(&self) -> Option<f64> {
        self.rare_event_divergence
    }

    /// Prime implicants are only quantified exactly.
    pub fn with_approximation(mut self, approximation: Approximation) -> Result<Self, SettingsError> {
        if self.prime_implicants && approximation != Approximation::Exact {
            return Err(SettingsError::PrimeImplicantsApproximation);
        }
        self.approximation = approximation;
        Ok(self)
    }

    pub fn with_prime_implicants(mut self, prime_implicants: bool) -> Result<Self, SettingsError> {
        if prime_implicants && self.approximation != Approximation::Exact {
            return Err(SettingsError::PrimeImplicantsApproximation);
        }
        self.prime_implicants = prime_implicants;
        Ok(self)
    }

    /// Disabling probability analysis also disables importance and
    /// uncertainty analysis.
    pub fn with_probability_analysis(mut self, enabled: bool) -> Self {
        self.probability_analysis = enabled;
        if !enabled {
            self.importance_analysis = false;
            self.uncertainty_analysis = false;
        }
        self
    }

    pub fn with_importance_analysis(mut self, enabled: bool) -> Self {
        self.importance_analysis = enabled;
        self.probability_analysis |= enabled;
        self
    }

    pub fn with_uncertainty_analysis(mut self, enabled: bool) -> Self {
        self.uncertainty_analysis = enabled;
        self.probability_analysis |= enabled;
        self
    }

    pub fn with_limit_order(mut self, limit_order: usize) -> Result<Self, SettingsError> {
        if limit_order < 1 {
            return Err(SettingsError::LimitOrder);
        }
        self.limit_order = limit_order;
        Ok(self)
    }

    pub fn with_mission_time(mut self, mission_time: f64) -> Result<Self, SettingsError> {
        if !mission_time.is_finite() || mission_time < 0.0 {
            return Err(SettingsError::MissionTime(mission_time));
        }
        self.mission_time = mission_time;
        Ok(self)
    }

    pub fn with_cut_off(mut self, cut_off: f64) -> Result<Self, SettingsError> {
        if !(0.0..=1.0).contains(&cut_off) {
            return Err(SettingsError::CutOff(cut_off));
        }
        self.cut_off = cut_off;
        Ok(self)
    }

    pub fn with_num_trials(mut self, num_trials: usize) -> Result<Self, SettingsError> {
        if num_trials < 1 {
            return Err(SettingsError::NumTrials);
        }
        self.num_trials = num_trials;
        Ok(self)
    }

    pub fn with_num_bins(mut self, num_bins: usize) -> Result<Self, SettingsError> {
        if num_bins < 1 {
            return Err(SettingsError::NumBins);
        }
        self.num_bins = num_bins;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_time_limit(mut self, time_limit: Option<Duration>) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_node_limit(mut self, node_limit: usize) -> Result<Self, SettingsError> {
        if node_limit < 2 {
            return Err(SettingsError::NodeLimit);
        }
        self.node_limit = node_limit;
        Ok(self)
    }

    pub fn with_product_limit(mut self, product_limit: Option<usize>) -> Result<Self, SettingsError> {
        if product_limit == Some(0) {
            return Err(SettingsError::ProductLimit);
        }
        self.product_limit = product_limit;
        Ok(self)
    }

    pub fn with_rare_event_divergence(mut self, threshold: Option<f64>) -> Result<Self, SettingsError> {
        if let Some(t) = threshold {
            if t.is_nan() || t <= 0.0 {
                return Err(SettingsError::DivergenceThreshold(t));
            }
        }
        self.rare_event_divergence = threshold;
        Ok(self)
    }
}
