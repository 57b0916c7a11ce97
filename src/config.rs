//! Subplanner configuration
//!
//! Loaded once from a JSON file, validated, then treated as immutable.
//! Every field has a default so an empty object `{}` is a valid file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{Event, Logger, Severity};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Budget of the multi-candidate ranking trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialConfig {
    /// Lower bound on the number of work rounds
    #[serde(default = "default_min_works")]
    pub min_works: u64,

    /// Fraction of the collection size used as the work bound
    #[serde(default = "default_collection_fraction")]
    pub collection_fraction: f64,

    /// A candidate producing this many results ends the trial
    #[serde(default = "default_num_results")]
    pub num_results: u64,

    /// Work rounds between yields
    #[serde(default = "default_yield_iterations")]
    pub yield_iterations: u64,
}

impl TrialConfig {
    /// Maximum work rounds for a collection of `num_records` documents.
    pub fn max_works(&self, num_records: usize) -> u64 {
        let fraction = (self.collection_fraction * num_records as f64) as u64;
        self.min_works.max(fraction)
    }
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            min_works: default_min_works(),
            collection_fraction: default_collection_fraction(),
            num_results: default_num_results(),
            yield_iterations: default_yield_iterations(),
        }
    }
}

/// Limits of the enumeration planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationConfig {
    #[serde(default = "default_max_indexed_solutions")]
    pub max_indexed_solutions: usize,

    #[serde(default = "default_true")]
    pub enable_index_intersection: bool,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            max_indexed_solutions: default_max_indexed_solutions(),
            enable_index_intersection: true,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubplannerConfig {
    /// When false, every query goes through whole-query planning
    #[serde(default = "default_true")]
    pub enable_subplanning: bool,

    #[serde(default)]
    pub trial: TrialConfig,

    #[serde(default)]
    pub enumeration: EnumerationConfig,

    /// One of trace, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_min_works() -> u64 {
    10_000
}

fn default_collection_fraction() -> f64 {
    0.29
}

fn default_num_results() -> u64 {
    101
}

fn default_yield_iterations() -> u64 {
    128
}

fn default_max_indexed_solutions() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SubplannerConfig {
    fn default() -> Self {
        Self {
            enable_subplanning: true,
            trial: TrialConfig::default(),
            enumeration: EnumerationConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl SubplannerConfig {
    /// Load configuration from a JSON file, validate it and apply its
    /// log level to the process-wide logger
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_json(&content)?;
        config.apply_logging()?;

        Logger::info(
            Event::ConfigLoaded.as_str(),
            &[
                ("path", &path.display().to_string()),
                ("log_level", &config.log_level),
            ],
        );

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: SubplannerConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.trial.num_results == 0 {
            return Err(ConfigError::Invalid(
                "trial.num_results must be greater than 0".into(),
            ));
        }
        if self.trial.yield_iterations == 0 {
            return Err(ConfigError::Invalid(
                "trial.yield_iterations must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.trial.collection_fraction) {
            return Err(ConfigError::Invalid(format!(
                "trial.collection_fraction must be within [0, 1], got {}",
                self.trial.collection_fraction
            )));
        }
        if self.enumeration.max_indexed_solutions == 0 {
            return Err(ConfigError::Invalid(
                "enumeration.max_indexed_solutions must be greater than 0".into(),
            ));
        }
        self.severity()?;
        Ok(())
    }

    /// The configured minimum log severity
    pub fn severity(&self) -> ConfigResult<Severity> {
        Severity::parse(&self.log_level)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown log_level: {}", self.log_level)))
    }

    /// Applies the configured log level to the process-wide logger
    pub fn apply_logging(&self) -> ConfigResult<()> {
        Logger::set_min_severity(self.severity()?);
        Ok(())
    }
}
