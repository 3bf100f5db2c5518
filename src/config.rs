//! Outline extraction options.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Options controlling heading classification, fusion and batch execution.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineConfig {
    /// Whether the semantic heading filter runs at all
    pub semantic_enabled: bool,

    /// Local weights file for the semantic filter (bundled weights when `None`)
    pub model_path: Option<PathBuf>,

    /// Minimum rule confidence for a heading
    pub rule_threshold: f32,

    /// Minimum semantic probability for a heading
    pub semantic_threshold: f32,

    /// Font-size ratio difference under which two sizes form one tier
    pub tier_epsilon: f32,

    /// Largest horizontal gap (in em) between spans merged into one line
    pub line_merge_gap: f32,

    /// Soft wall-clock budget per document (`None` = unlimited)
    pub time_budget: Option<Duration>,

    /// Number of documents processed concurrently
    pub workers: usize,

    /// Pages a repeated text must appear on to count as a running header
    pub running_header_min_pages: usize,

    /// Relative vertical distance within which repeated texts are "at the same place"
    pub running_header_tolerance: f32,

    /// Raise levels that skip a tier below the previous heading
    pub normalize_hierarchy: bool,

    /// Use the source file stem when no title can be resolved
    pub filename_title_fallback: bool,
}

impl OutlineConfig {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the semantic filter.
    pub fn with_semantic(mut self, enabled: bool) -> Self {
        self.semantic_enabled = enabled;
        self
    }

    /// Run on rule decisions only.
    pub fn rules_only(mut self) -> Self {
        self.semantic_enabled = false;
        self
    }

    /// Load semantic weights from a local file.
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Set the rule confidence threshold.
    pub fn with_rule_threshold(mut self, threshold: f32) -> Self {
        self.rule_threshold = threshold;
        self
    }

    /// Set the semantic probability threshold.
    pub fn with_semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = threshold;
        self
    }

    /// Set the tier merge epsilon.
    pub fn with_tier_epsilon(mut self, epsilon: f32) -> Self {
        self.tier_epsilon = epsilon;
        self
    }

    /// Set the line merge gap in em.
    pub fn with_line_merge_gap(mut self, em: f32) -> Self {
        self.line_merge_gap = em;
        self
    }

    /// Set the per-document time budget.
    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget;
        self
    }

    /// Set the number of concurrent documents.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set running header detection parameters.
    pub fn with_running_headers(mut self, min_pages: usize, tolerance: f32) -> Self {
        self.running_header_min_pages = min_pages;
        self.running_header_tolerance = tolerance;
        self
    }

    /// Enable or disable hierarchy normalization.
    pub fn with_normalized_hierarchy(mut self, enabled: bool) -> Self {
        self.normalize_hierarchy = enabled;
        self
    }

    /// Enable or disable the file-name title fallback.
    pub fn with_filename_title_fallback(mut self, enabled: bool) -> Self {
        self.filename_title_fallback = enabled;
        self
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<()> {
        check_unit("rule_threshold", self.rule_threshold)?;
        check_unit("semantic_threshold", self.semantic_threshold)?;
        check_unit("running_header_tolerance", self.running_header_tolerance)?;

        if !(self.tier_epsilon.is_finite() && self.tier_epsilon > 0.0 && self.tier_epsilon < 1.0)
        {
            return Err(Error::InvalidConfig(format!(
                "tier_epsilon must be in (0, 1), got {}",
                self.tier_epsilon
            )));
        }
        if !(self.line_merge_gap.is_finite() && self.line_merge_gap >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "line_merge_gap must be non-negative, got {}",
                self.line_merge_gap
            )));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".into()));
        }
        if self.running_header_min_pages < 2 {
            return Err(Error::InvalidConfig(
                "running_header_min_pages must be at least 2".into(),
            ));
        }
        if self.time_budget == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig("time_budget must be positive".into()));
        }
        Ok(())
    }
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            semantic_enabled: true,
            model_path: None,
            rule_threshold: 0.5,
            semantic_threshold: 0.4,
            tier_epsilon: 0.02,
            line_merge_gap: 1.5,
            time_budget: Some(Duration::from_secs(10)),
            workers: num_cpus::get().max(1),
            running_header_min_pages: 2,
            running_header_tolerance: 0.02,
            normalize_hierarchy: false,
            filename_title_fallback: false,
        }
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{} must be in [0, 1], got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OutlineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.semantic_enabled);
        assert!(config.workers >= 1);
        assert_eq!(config.time_budget, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_config_builder() {
        let config = OutlineConfig::new()
            .rules_only()
            .with_rule_threshold(0.7)
            .with_workers(3)
            .with_time_budget(None)
            .with_filename_title_fallback(true);

        assert!(!config.semantic_enabled);
        assert_eq!(config.rule_threshold, 0.7);
        assert_eq!(config.workers, 3);
        assert_eq!(config.time_budget, None);
        assert!(config.filename_title_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(OutlineConfig::new()
            .with_rule_threshold(1.5)
            .validate()
            .is_err());
        assert!(OutlineConfig::new()
            .with_semantic_threshold(f32::NAN)
            .validate()
            .is_err());
        assert!(OutlineConfig::new().with_tier_epsilon(0.0).validate().is_err());
        assert!(OutlineConfig::new().with_workers(0).validate().is_err());
        assert!(OutlineConfig::new()
            .with_running_headers(1, 0.02)
            .validate()
            .is_err());
        assert!(OutlineConfig::new()
            .with_time_budget(Some(Duration::ZERO))
            .validate()
            .is_err());
    }
}
