use anyhow::Context;
use common::env_parse;
use std::env;
use std::path::PathBuf;

use crate::options::{DEFAULT_MAX_RESULTS, DEFAULT_NUM_THREADS, Tuning};
use preprocess::ResizeMode;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub environment: Environment,
    pub log_level: String,
    pub model_dir: PathBuf,
    pub num_threads: usize,
    pub max_results: usize,
    pub score_threshold: Option<f32>,
    pub resize: ResizeMode,
}

impl DetectorConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let model_dir = env::var("MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models"));

        let num_threads = env_parse("NUM_THREADS", DEFAULT_NUM_THREADS);
        let max_results = env_parse("MAX_RESULTS", DEFAULT_MAX_RESULTS);

        let score_threshold = match env::var("SCORE_THRESHOLD") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<f32>()
                    .with_context(|| format!("Invalid SCORE_THRESHOLD: {raw}"))?,
            ),
            Err(_) => None,
        };

        let resize = match env::var("RESIZE_MODE") {
            Ok(raw) => raw
                .parse::<ResizeMode>()
                .map_err(|e| anyhow::anyhow!("Invalid RESIZE_MODE: {e}"))?,
            Err(_) => ResizeMode::default(),
        };

        let config = Self {
            environment,
            log_level,
            model_dir,
            num_threads,
            max_results,
            score_threshold,
            resize,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(threshold) = self.score_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                anyhow::bail!("Score threshold must be within [0, 1], got {threshold}");
            }
        }
        Ok(())
    }

    pub fn tuning(&self) -> Tuning {
        Tuning {
            num_threads: self.num_threads,
            max_results: self.max_results,
            score_threshold: self.score_threshold,
            resize: self.resize,
        }
    }

    /// Create default configuration for testing
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            log_level: "debug".to_string(),
            model_dir: PathBuf::from("/models"),
            num_threads: DEFAULT_NUM_THREADS,
            max_results: DEFAULT_MAX_RESULTS,
            score_threshold: None,
            resize: ResizeMode::Stretch,
        }
    }
}
