use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use once_cell::sync::OnceCell;

use super::model::LinearHeadingModel;
use super::{HeadingFilter, SemanticScore};
use crate::analysis::NormalizedSpan;
use crate::budget::Budget;
use crate::config::OutlineConfig;
use crate::error::{Error, Result};

/// Probability assigned to every line when the filter is not available.
pub const NEUTRAL_SCORE: f32 = 0.5;

/// Where the semantic filter comes from.
#[derive(Clone)]
pub enum ModelSource {
    /// Weights compiled into the crate
    Bundled,
    /// Weights read from a local JSON file
    File(PathBuf),
    /// No semantic filtering; rule-only decisions
    Disabled,
    /// A caller-supplied classifier
    Custom(Arc<dyn HeadingFilter>),
}

impl fmt::Debug for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Bundled => f.write_str("Bundled"),
            ModelSource::File(path) => f.debug_tuple("File").field(path).finish(),
            ModelSource::Disabled => f.write_str("Disabled"),
            ModelSource::Custom(filter) => f.debug_tuple("Custom").field(&filter.name()).finish(),
        }
    }
}

/// What a [`SharedModel`] can offer right now.
pub enum ModelState<'a> {
    Ready(&'a dyn HeadingFilter),
    Disabled,
    Unavailable(&'a str),
}

type LoadOutcome = std::result::Result<Arc<dyn HeadingFilter>, String>;

/// Process-wide, lazily loaded, read-only semantic filter.
///
/// The first call to [`SharedModel::state`] loads the model; every later call
/// (from any thread) sees the same outcome. A load failure is logged once and
/// then reported as [`ModelState::Unavailable`].
pub struct SharedModel {
    source: ModelSource,
    cell: OnceCell<LoadOutcome>,
}

impl SharedModel {
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    pub fn bundled() -> Self {
        Self::new(ModelSource::Bundled)
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(ModelSource::File(path.into()))
    }

    pub fn disabled() -> Self {
        Self::new(ModelSource::Disabled)
    }

    pub fn custom<F: HeadingFilter + 'static>(filter: F) -> Self {
        Self::new(ModelSource::Custom(Arc::new(filter)))
    }

    /// Pick the source named by the configuration.
    pub fn from_config(config: &OutlineConfig) -> Self {
        if !config.semantic_enabled {
            Self::disabled()
        } else if let Some(path) = &config.model_path {
            Self::from_path(path.clone())
        } else {
            Self::bundled()
        }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    /// Load on first use and report the outcome.
    pub fn state(&self) -> ModelState<'_> {
        if matches!(self.source, ModelSource::Disabled) {
            return ModelState::Disabled;
        }
        match self.cell.get_or_init(|| self.load()) {
            Ok(filter) => ModelState::Ready(filter.as_ref()),
            Err(reason) => ModelState::Unavailable(reason),
        }
    }

    /// Force the load now; `Err` when the model cannot be used.
    pub fn preload(&self) -> Result<()> {
        match self.state() {
            ModelState::Ready(_) | ModelState::Disabled => Ok(()),
            ModelState::Unavailable(reason) => Err(Error::ModelUnavailable(reason.to_string())),
        }
    }

    fn load(&self) -> LoadOutcome {
        let loaded: Result<Arc<dyn HeadingFilter>> = match &self.source {
            ModelSource::Bundled => {
                LinearHeadingModel::bundled().map(|m| Arc::new(m) as Arc<dyn HeadingFilter>)
            }
            ModelSource::File(path) => {
                LinearHeadingModel::from_file(path).map(|m| Arc::new(m) as Arc<dyn HeadingFilter>)
            }
            ModelSource::Custom(filter) => Ok(Arc::clone(filter)),
            ModelSource::Disabled => Err(Error::ModelUnavailable("disabled".into())),
        };

        match loaded {
            Ok(filter) => {
                info!("Loaded semantic heading filter '{}'", filter.name());
                Ok(filter)
            }
            Err(e) => {
                warn!("{}; falling back to rule-only decisions", e);
                Err(e.to_string())
            }
        }
    }
}

impl Default for SharedModel {
    fn default() -> Self {
        Self::bundled()
    }
}

impl fmt::Debug for SharedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedModel")
            .field("source", &self.source)
            .field("loaded", &self.cell.get().map(|o| o.is_ok()))
            .finish()
    }
}

/// Score every line with the filter.
///
/// Returns `Ok(None)` when the budget runs out before all lines are scored;
/// the caller then discards the partial scores and decides on rules alone.
pub fn score_lines(
    filter: &dyn HeadingFilter,
    lines: &[NormalizedSpan],
    budget: &Budget,
) -> Result<Option<Vec<SemanticScore>>> {
    let mut scores = Vec::with_capacity(lines.len());
    for line in lines {
        budget.check_cancelled()?;
        if budget.expired() {
            debug!(
                "Semantic scoring stopped after {} of {} lines",
                scores.len(),
                lines.len()
            );
            return Ok(None);
        }

        let score = filter.score(&line.text);
        let probability = if score.probability.is_finite() {
            score.probability.clamp(0.0, 1.0)
        } else {
            NEUTRAL_SCORE
        };
        scores.push(SemanticScore {
            span: line.id,
            probability,
            level_hint: score.level_hint,
        });
    }
    Ok(Some(scores))
}
