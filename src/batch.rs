//! Document-parallel batch processing.
//!
//! Each document is one job on a dedicated rayon pool. Outcomes stream back
//! over a channel as jobs finish; a failing or panicking document never
//! affects the others.

use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use log::{debug, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::detect::has_pdf_extension;
use crate::error::{Error, Result};
use crate::parser::ParseOptions;
use crate::pipeline::{CancelToken, OutlinePipeline, ProcessedDocument};
use crate::render::{write_json, JsonFormat};

/// PDF files directly inside `dir`, sorted by path.
pub fn discover_pdfs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && has_pdf_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `<output_dir>/<stem>.json` for an input file.
pub fn output_path_for<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output_dir: Q) -> PathBuf {
    let stem = input
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output_dir.as_ref().join(format!("{}.json", stem))
}

/// One document to process.
#[derive(Debug, Clone)]
pub struct DocumentJob {
    pub input: PathBuf,
    /// Where to write the JSON result; `None` keeps it in memory only
    pub output: Option<PathBuf>,
    cancel: CancelToken,
}

impl DocumentJob {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Token that cancels this document only.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Jobs for every PDF in `input_dir`, writing next to each other in
/// `output_dir`.
pub fn jobs_for_dir<P: AsRef<Path>, Q: AsRef<Path>>(input_dir: P, output_dir: Q) -> Result<Vec<DocumentJob>> {
    let output_dir = output_dir.as_ref();
    Ok(discover_pdfs(input_dir)?
        .into_iter()
        .map(|input| {
            let output = output_path_for(&input, output_dir);
            DocumentJob::new(input).with_output(output)
        })
        .collect())
}

/// Result of one job.
#[derive(Debug)]
pub struct DocumentOutcome {
    /// Position of the job in the submitted list
    pub index: usize,
    pub input: PathBuf,
    /// Written file, only on success
    pub output: Option<PathBuf>,
    pub result: Result<ProcessedDocument>,
    pub elapsed: Duration,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Totals over a finished batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Succeeded with at least one degradation
    pub degraded: usize,
    pub total_time: Duration,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[DocumentOutcome]) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            summary.total_time += outcome.elapsed;
            match &outcome.result {
                Ok(processed) => {
                    summary.succeeded += 1;
                    if processed.diagnostics.is_degraded() {
                        summary.degraded += 1;
                    }
                }
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Mean time per document.
    pub fn average_time(&self) -> Duration {
        if self.total == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.total as u32
        }
    }
}

/// Batch-level options.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub parse: ParseOptions,
    pub format: JsonFormat,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parse_options(mut self, parse: ParseOptions) -> Self {
        self.parse = parse;
        self
    }

    pub fn with_format(mut self, format: JsonFormat) -> Self {
        self.format = format;
        self
    }
}

/// Runs jobs on a pool sized by the pipeline's worker count.
pub struct BatchRunner {
    pipeline: OutlinePipeline,
    options: BatchOptions,
    pool: Arc<ThreadPool>,
}

impl BatchRunner {
    pub fn new(pipeline: OutlinePipeline, options: BatchOptions) -> Result<Self> {
        let workers = pipeline.config().workers;
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pdf-outline-{}", i))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build worker pool: {}", e)))?;
        debug!("Batch pool with {} workers", workers);
        Ok(Self {
            pipeline,
            options,
            pool: Arc::new(pool),
        })
    }

    pub fn pipeline(&self) -> &OutlinePipeline {
        &self.pipeline
    }

    /// Start every job and return a receiver yielding outcomes in completion
    /// order. The channel closes once all jobs have reported.
    pub fn run(&self, jobs: Vec<DocumentJob>) -> Receiver<DocumentOutcome> {
        let (tx, rx) = unbounded();
        for (index, job) in jobs.into_iter().enumerate() {
            let tx = tx.clone();
            let pipeline = self.pipeline.clone();
            let options = self.options.clone();
            self.pool.spawn(move || {
                let outcome = run_job(index, job, &pipeline, &options);
                // The caller may stop listening; remaining outcomes are dropped.
                let _ = tx.send(outcome);
            });
        }
        rx
    }

    /// Run every job and return outcomes in submission order.
    pub fn run_collect(&self, jobs: Vec<DocumentJob>) -> Vec<DocumentOutcome> {
        let mut outcomes: Vec<DocumentOutcome> = self.run(jobs).iter().collect();
        outcomes.sort_by_key(|o| o.index);
        outcomes
    }
}

fn run_job(index: usize, job: DocumentJob, pipeline: &OutlinePipeline, options: &BatchOptions) -> DocumentOutcome {
    let started = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(|| process_job(&job, pipeline, options)))
        .unwrap_or_else(|payload| Err(Error::Internal(panic_message(payload.as_ref()))));
    let elapsed = started.elapsed();

    match &result {
        Ok(processed) => debug!(
            "{}: {} headings in {:?}",
            job.input.display(),
            processed.result.outline.len(),
            elapsed
        ),
        Err(e) => warn!("Skipping {}: {}", job.input.display(), e),
    }

    let output = if result.is_ok() { job.output } else { None };
    DocumentOutcome {
        index,
        input: job.input,
        output,
        result,
        elapsed,
    }
}

fn process_job(job: &DocumentJob, pipeline: &OutlinePipeline, options: &BatchOptions) -> Result<ProcessedDocument> {
    let processed = pipeline.process_file_with_cancel(&job.input, &options.parse, &job.cancel)?;
    if let Some(output) = &job.output {
        write_json(&processed.result, output, options.format)?;
    }
    Ok(processed)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic while processing document".to_string()
    }
}
