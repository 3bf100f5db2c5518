//! Per-document orchestration: normalize, classify, score, fuse, title.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::analysis::{
    classify_lines, fuse, normalize, resolve_title, FusionReport, LevelCandidate, LineDecision,
    Normalized,
};
use crate::budget::Budget;
pub use crate::budget::CancelToken;
use crate::config::OutlineConfig;
use crate::error::Result;
use crate::model::{DocumentResult, HeadingEntry, HeadingLevel, SpanDocument};
use crate::parser::{ParseOptions, PdfParser};
use crate::semantic::{score_lines, ModelState, SemanticScore, SharedModel};

/// How the semantic filter took part in a document's decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticMode {
    /// Every line was scored
    Active,
    /// Turned off by configuration
    Disabled,
    /// The model could not be loaded
    Unavailable,
    /// The time budget ran out before scoring finished
    TimedOut,
}

impl SemanticMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticMode::Active => "active",
            SemanticMode::Disabled => "disabled",
            SemanticMode::Unavailable => "unavailable",
            SemanticMode::TimedOut => "timed out",
        }
    }
}

/// A non-fatal condition that lowered the quality of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// No extractable text
    EmptyDocument,
    /// The soft time budget was exceeded; the outline is best effort
    TimeoutExceeded,
    /// Rule-only decisions because the model failed to load
    ModelUnavailable,
}

/// What happened while processing one document.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub page_count: u32,
    pub span_count: usize,
    pub line_count: usize,
    pub body_size: f32,
    pub tier_count: usize,
    pub semantic: SemanticMode,
    pub degradations: Vec<Degradation>,
    pub running_headers: usize,
    pub level_conflicts: usize,
    pub severe_conflicts: usize,
    pub fallback_headings: usize,
    pub duplicates_removed: usize,
    pub elapsed: Duration,
}

impl Diagnostics {
    fn new(page_count: u32, span_count: usize) -> Self {
        Self {
            page_count,
            span_count,
            line_count: 0,
            body_size: 0.0,
            tier_count: 0,
            semantic: SemanticMode::Disabled,
            degradations: Vec::new(),
            running_headers: 0,
            level_conflicts: 0,
            severe_conflicts: 0,
            fallback_headings: 0,
            duplicates_removed: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn has(&self, degradation: Degradation) -> bool {
        self.degradations.contains(&degradation)
    }

    fn degrade(&mut self, degradation: Degradation) {
        if !self.has(degradation) {
            self.degradations.push(degradation);
        }
    }

    fn absorb(&mut self, report: &FusionReport) {
        self.running_headers = report.running_headers;
        self.level_conflicts = report.level_conflicts;
        self.severe_conflicts = report.severe_conflicts;
        self.fallback_headings = report.fallback_headings;
        self.duplicates_removed = report.duplicates_removed;
    }
}

/// Result plus diagnostics for one document.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub result: DocumentResult,
    pub diagnostics: Diagnostics,
}

/// Per-line trace used by `inspect`.
#[derive(Debug, Clone)]
pub struct LineReport {
    /// Page number (1-based)
    pub page: u32,
    pub text: String,
    pub ratio: f32,
    pub is_bold: bool,
    pub rule_level: Option<HeadingLevel>,
    pub rule_confidence: f32,
    /// `None` when no semantic score was used
    pub semantic_score: Option<f32>,
    pub level_hint: Option<HeadingLevel>,
    pub decision: LineDecision,
}

/// Full trace of one document.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub processed: ProcessedDocument,
    pub lines: Vec<LineReport>,
}

/// Intermediate state of one run, kept for [`OutlinePipeline::explain`].
struct Run {
    normalized: Normalized,
    candidates: Vec<LevelCandidate>,
    semantic: Option<Vec<SemanticScore>>,
    report: FusionReport,
    processed: ProcessedDocument,
}

/// Turns span documents into outlines.
///
/// Cheap to clone; clones share the semantic model, which is loaded at most
/// once.
#[derive(Debug, Clone)]
pub struct OutlinePipeline {
    config: OutlineConfig,
    model: Arc<SharedModel>,
}

impl OutlinePipeline {
    /// Build a pipeline whose model follows `config` (bundled weights, a
    /// weights file, or none).
    pub fn new(config: OutlineConfig) -> Result<Self> {
        let model = Arc::new(SharedModel::from_config(&config));
        Self::with_model(config, model)
    }

    /// Build a pipeline around an existing model handle.
    pub fn with_model(config: OutlineConfig, model: Arc<SharedModel>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, model })
    }

    pub fn config(&self) -> &OutlineConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<SharedModel> {
        &self.model
    }

    /// Process one document without external cancellation.
    pub fn process(&self, doc: &SpanDocument) -> Result<ProcessedDocument> {
        self.process_with_cancel(doc, &CancelToken::new())
    }

    /// Process one document; fails only with [`crate::Error::Cancelled`].
    pub fn process_with_cancel(
        &self,
        doc: &SpanDocument,
        cancel: &CancelToken,
    ) -> Result<ProcessedDocument> {
        Ok(self.run(doc, cancel)?.processed)
    }

    /// Read a PDF from disk and process it.
    pub fn process_file<P: AsRef<Path>>(
        &self,
        path: P,
        options: &ParseOptions,
    ) -> Result<ProcessedDocument> {
        self.process_file_with_cancel(path, options, &CancelToken::new())
    }

    pub fn process_file_with_cancel<P: AsRef<Path>>(
        &self,
        path: P,
        options: &ParseOptions,
        cancel: &CancelToken,
    ) -> Result<ProcessedDocument> {
        let parser = PdfParser::open_with_options(path, options.clone())?;
        cancel_point(cancel)?;
        let doc = parser.extract_spans()?;
        self.process_with_cancel(&doc, cancel)
    }

    /// Process one document and keep the per-line decisions.
    pub fn explain(&self, doc: &SpanDocument) -> Result<Explanation> {
        let run = self.run(doc, &CancelToken::new())?;

        let lines = run
            .normalized
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let candidate = run.candidates.get(i).copied();
                let score = run.semantic.as_ref().and_then(|s| s.get(i));
                LineReport {
                    page: line.page + 1,
                    text: line.text.clone(),
                    ratio: line.ratio,
                    is_bold: line.is_bold,
                    rule_level: candidate.and_then(|c| c.level),
                    rule_confidence: candidate.map_or(0.0, |c| c.confidence),
                    semantic_score: score.map(|s| s.probability),
                    level_hint: score.and_then(|s| s.level_hint),
                    decision: run
                        .report
                        .decisions
                        .get(i)
                        .copied()
                        .unwrap_or(LineDecision::NotHeading),
                }
            })
            .collect();

        Ok(Explanation {
            processed: run.processed,
            lines,
        })
    }

    fn run(&self, doc: &SpanDocument, cancel: &CancelToken) -> Result<Run> {
        let budget = Budget::new(self.config.time_budget, cancel.clone());
        let mut diagnostics = Diagnostics::new(doc.effective_page_count(), doc.spans.len());

        let normalized = normalize(doc, &self.config);
        budget.check_cancelled()?;
        diagnostics.line_count = normalized.lines.len();
        diagnostics.body_size = normalized.stats.body_size;
        diagnostics.tier_count = normalized.stats.tiers.len();

        if normalized.is_empty() {
            debug!("No extractable text; emitting an empty outline");
            diagnostics.degrade(Degradation::EmptyDocument);
            diagnostics.elapsed = budget.elapsed();
            let title = self.fallback_title(doc, String::new());
            return Ok(Run {
                normalized,
                candidates: Vec::new(),
                semantic: None,
                report: FusionReport::default(),
                processed: ProcessedDocument {
                    result: DocumentResult::empty(title),
                    diagnostics,
                },
            });
        }

        let (candidates, rules_timed_out) =
            classify_lines(&normalized.lines, &normalized.stats, &budget)?;
        if rules_timed_out {
            diagnostics.degrade(Degradation::TimeoutExceeded);
        }

        let semantic = self.score(&normalized, &budget, rules_timed_out, &mut diagnostics)?;
        budget.check_cancelled()?;

        let mut report = fuse(
            &normalized.lines,
            &candidates,
            semantic.as_deref(),
            &normalized.stats,
            &self.config,
        );
        diagnostics.absorb(&report);

        let claimed = report
            .headings
            .iter()
            .find(|h| h.level == HeadingLevel::H1)
            .map(|h| h.span);
        let title = resolve_title(&normalized.lines, &normalized.stats, claimed);
        if !title.absorbed.is_empty() {
            report.headings.retain(|h| !title.absorbed.contains(&h.span));
            for id in &title.absorbed {
                if let Some(decision) = report.decisions.get_mut(id.index()) {
                    *decision = LineDecision::Title;
                }
            }
        }
        let title = self.fallback_title(doc, title.text);

        let outline = report
            .headings
            .iter()
            .map(|h| HeadingEntry::new(h.level, h.text.clone(), h.page + 1))
            .collect();

        diagnostics.elapsed = budget.elapsed();
        if diagnostics.has(Degradation::TimeoutExceeded) {
            warn!(
                "Time budget exceeded after {:?}; outline is best effort",
                diagnostics.elapsed
            );
        }
        debug!(
            "{} lines, body {:.1}pt, {} tiers, {} headings, semantic {}",
            diagnostics.line_count,
            diagnostics.body_size,
            diagnostics.tier_count,
            report.headings.len(),
            diagnostics.semantic.as_str()
        );

        Ok(Run {
            normalized,
            candidates,
            semantic,
            report,
            processed: ProcessedDocument {
                result: DocumentResult::new(title, outline),
                diagnostics,
            },
        })
    }

    /// Semantic scores, or `None` for rule-only decisions.
    fn score(
        &self,
        normalized: &Normalized,
        budget: &Budget,
        rules_timed_out: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Vec<SemanticScore>>> {
        if !self.config.semantic_enabled {
            diagnostics.semantic = SemanticMode::Disabled;
            return Ok(None);
        }

        let filter = match self.model.state() {
            ModelState::Ready(filter) => filter,
            ModelState::Disabled => {
                diagnostics.semantic = SemanticMode::Disabled;
                return Ok(None);
            }
            ModelState::Unavailable(_) => {
                diagnostics.semantic = SemanticMode::Unavailable;
                diagnostics.degrade(Degradation::ModelUnavailable);
                return Ok(None);
            }
        };

        if rules_timed_out {
            diagnostics.semantic = SemanticMode::TimedOut;
            return Ok(None);
        }

        match score_lines(filter, &normalized.lines, budget)? {
            Some(scores) => {
                diagnostics.semantic = SemanticMode::Active;
                Ok(Some(scores))
            }
            None => {
                diagnostics.semantic = SemanticMode::TimedOut;
                diagnostics.degrade(Degradation::TimeoutExceeded);
                Ok(None)
            }
        }
    }

    fn fallback_title(&self, doc: &SpanDocument, title: String) -> String {
        if !title.is_empty() || !self.config.filename_title_fallback {
            return title;
        }
        doc.source_stem().unwrap_or_default()
    }
}

fn cancel_point(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(crate::error::Error::Cancelled)
    } else {
        Ok(())
    }
}
