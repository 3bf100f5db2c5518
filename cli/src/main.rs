//! pdf-outline CLI - title and heading outline extraction

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdf_outline::analysis::LineDecision;
use pdf_outline::batch::jobs_for_dir;
use pdf_outline::{
    render, BatchOptions, BatchRunner, BatchSummary, Degradation, DocumentOutcome, Error,
    JsonFormat, OutlineConfig, OutlinePipeline, ParseOptions, PdfParser,
};

#[derive(Parser)]
#[command(name = "pdf-outline")]
#[command(version)]
#[command(about = "Extract a title and H1/H2/H3 outline from PDF files", long_about = None)]
struct Cli {
    /// Directory of PDF files
    #[arg(value_name = "INPUT_DIR")]
    input: Option<PathBuf>,

    /// Directory for the JSON results
    #[arg(value_name = "OUTPUT_DIR")]
    output: Option<PathBuf>,

    #[command(flatten)]
    analysis: AnalysisArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one JSON outline per PDF in a directory
    Batch {
        /// Directory of PDF files
        #[arg(value_name = "INPUT_DIR")]
        input: PathBuf,

        /// Output directory (default: ./output)
        #[arg(value_name = "OUTPUT_DIR")]
        output: Option<PathBuf>,
    },

    /// Extract the outline of a single PDF
    File {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show the decision taken for every line of a PDF
    Inspect {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the line reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

/// Analysis settings shared by every command.
#[derive(Args, Clone, Debug)]
struct AnalysisArgs {
    /// Decide on font rules alone
    #[arg(long, global = true, env = "PDF_OUTLINE_NO_SEMANTIC")]
    no_semantic: bool,

    /// Semantic model weights (JSON) instead of the bundled ones
    #[arg(long, global = true, value_name = "FILE", env = "PDF_OUTLINE_MODEL")]
    model: Option<PathBuf>,

    /// Minimum rule confidence for a heading [0-1]
    #[arg(long, global = true, env = "PDF_OUTLINE_RULE_THRESHOLD")]
    rule_threshold: Option<f32>,

    /// Minimum semantic score for a heading [0-1]
    #[arg(long, global = true, env = "PDF_OUTLINE_SEMANTIC_THRESHOLD")]
    semantic_threshold: Option<f32>,

    /// Size ratio difference under which two sizes share a tier
    #[arg(long, global = true, env = "PDF_OUTLINE_TIER_EPSILON")]
    tier_epsilon: Option<f32>,

    /// Maximum horizontal gap, in em, between runs merged into one line
    #[arg(long, global = true, value_name = "EM", env = "PDF_OUTLINE_LINE_MERGE_GAP")]
    line_merge_gap: Option<f32>,

    /// Pages a repeated line must appear on to count as a running header
    #[arg(long, global = true, value_name = "PAGES", env = "PDF_OUTLINE_HEADER_MIN_PAGES")]
    header_min_pages: Option<usize>,

    /// Vertical tolerance for running headers, as a share of page height
    #[arg(long, global = true, env = "PDF_OUTLINE_HEADER_TOLERANCE")]
    header_tolerance: Option<f32>,

    /// Per-document time budget in seconds (0 disables)
    #[arg(long, global = true, value_name = "SECS", env = "PDF_OUTLINE_TIMEOUT")]
    timeout: Option<f64>,

    /// Number of documents processed in parallel
    #[arg(short, long, global = true, env = "PDF_OUTLINE_WORKERS")]
    workers: Option<usize>,

    /// Raise headings that skip a level below their predecessor
    #[arg(long, global = true, env = "PDF_OUTLINE_NORMALIZE_HIERARCHY")]
    normalize_hierarchy: bool,

    /// Use the file name when page one has no title text
    #[arg(long, global = true, env = "PDF_OUTLINE_FILENAME_TITLE")]
    filename_title: bool,

    /// Fail a document on its first unreadable page
    #[arg(long, global = true, env = "PDF_OUTLINE_STRICT")]
    strict: bool,

    /// Output compact JSON
    #[arg(long, global = true, env = "PDF_OUTLINE_COMPACT")]
    compact: bool,
}

impl AnalysisArgs {
    fn config(&self) -> pdf_outline::Result<OutlineConfig> {
        let mut config = OutlineConfig::new()
            .with_semantic(!self.no_semantic)
            .with_normalized_hierarchy(self.normalize_hierarchy)
            .with_filename_title_fallback(self.filename_title);
        if let Some(path) = &self.model {
            config = config.with_model_path(path);
        }
        if let Some(threshold) = self.rule_threshold {
            config = config.with_rule_threshold(threshold);
        }
        if let Some(threshold) = self.semantic_threshold {
            config = config.with_semantic_threshold(threshold);
        }
        if let Some(epsilon) = self.tier_epsilon {
            config = config.with_tier_epsilon(epsilon);
        }
        if let Some(em) = self.line_merge_gap {
            config = config.with_line_merge_gap(em);
        }
        if self.header_min_pages.is_some() || self.header_tolerance.is_some() {
            let min_pages = self.header_min_pages.unwrap_or(config.running_header_min_pages);
            let tolerance = self.header_tolerance.unwrap_or(config.running_header_tolerance);
            config = config.with_running_headers(min_pages, tolerance);
        }
        if let Some(secs) = self.timeout {
            let budget = if secs == 0.0 {
                None
            } else {
                let budget = Duration::try_from_secs_f64(secs)
                    .map_err(|e| Error::InvalidConfig(format!("timeout {}s: {}", secs, e)))?;
                Some(budget)
            };
            config = config.with_time_budget(budget);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        Ok(config)
    }

    fn parse_options(&self) -> ParseOptions {
        if self.strict {
            ParseOptions::new()
        } else {
            ParseOptions::new().lenient()
        }
    }

    fn format(&self) -> JsonFormat {
        if self.compact {
            JsonFormat::Compact
        } else {
            JsonFormat::Pretty
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let args = cli.analysis;

    let result = match cli.command {
        Some(Commands::Batch { input, output }) => cmd_batch(&input, output.as_deref(), &args),
        Some(Commands::File { input, output }) => cmd_file(&input, output.as_deref(), &args),
        Some(Commands::Inspect { input, json }) => cmd_inspect(&input, json, &args),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: batch over the input directory
            if let Some(input) = cli.input {
                cmd_batch(&input, cli.output.as_deref(), &args)
            } else {
                println!("{}", "Usage: pdf-outline <INPUT_DIR> [OUTPUT_DIR]".yellow());
                println!("       pdf-outline --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_batch(
    input: &Path,
    output: Option<&Path>,
    args: &AnalysisArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("output"));
    fs::create_dir_all(&output_dir)?;

    let jobs = jobs_for_dir(input, &output_dir)?;
    if jobs.is_empty() {
        println!("{} {}", "No PDF files found in".yellow(), input.display());
        return Ok(());
    }

    let pipeline = OutlinePipeline::new(args.config()?)?;
    let options = BatchOptions::new()
        .with_parse_options(args.parse_options())
        .with_format(args.format());
    let runner = BatchRunner::new(pipeline, options)?;
    log::debug!("Semantic model source: {:?}", runner.pipeline().model().source());

    println!(
        "{} {} files with {} workers",
        "Processing".cyan(),
        jobs.len().to_string().bold(),
        runner.pipeline().config().workers
    );

    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let started = Instant::now();
    let mut outcomes: Vec<DocumentOutcome> = Vec::with_capacity(jobs.len());
    for outcome in runner.run(jobs).iter() {
        let name = file_name(&outcome.input);
        match &outcome.result {
            Ok(processed) if processed.diagnostics.is_degraded() => {
                pb.println(format!(
                    "{} {} ({})",
                    "Degraded".yellow(),
                    name,
                    describe_degradations(&processed.diagnostics.degradations)
                ));
            }
            Ok(_) => {}
            Err(e) => pb.println(format!("{} {}: {}", "Failed".red(), name, e)),
        }
        pb.set_message(name);
        pb.inc(1);
        outcomes.push(outcome);
    }
    pb.finish_with_message("Done!");

    let summary = BatchSummary::from_outcomes(&outcomes);
    println!();
    println!("{}", "Summary".green().bold());
    println!("  {} {}/{} succeeded", "├─".dimmed(), summary.succeeded, summary.total);
    if summary.failed > 0 {
        println!("  {} {} failed", "├─".dimmed(), summary.failed.to_string().red());
    }
    if summary.degraded > 0 {
        println!("  {} {} degraded", "├─".dimmed(), summary.degraded.to_string().yellow());
    }
    println!(
        "  {} {:.2}s total, {:.3}s per document",
        "└─".dimmed(),
        started.elapsed().as_secs_f64(),
        summary.average_time().as_secs_f64()
    );
    println!("{} {}", "Output:".green(), output_dir.display());

    Ok(())
}

fn cmd_file(
    input: &Path,
    output: Option<&Path>,
    args: &AnalysisArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = OutlinePipeline::new(args.config()?)?;
    let processed = pipeline.process_file(input, &args.parse_options())?;

    for degradation in &processed.diagnostics.degradations {
        eprintln!("{} {}", "Warning:".yellow(), describe_degradation(*degradation));
    }

    if let Some(path) = output {
        render::write_json(&processed.result, path, args.format())?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", render::to_json(&processed.result, args.format())?);
    }

    Ok(())
}

fn cmd_inspect(input: &Path, json: bool, args: &AnalysisArgs) -> Result<(), Box<dyn std::error::Error>> {
    let parser = PdfParser::open_with_options(input, args.parse_options())?;
    let doc = parser.extract_spans()?;
    let pipeline = OutlinePipeline::new(args.config()?)?;
    let explanation = pipeline.explain(&doc)?;
    let diagnostics = &explanation.processed.diagnostics;

    if json {
        let lines: Vec<serde_json::Value> = explanation
            .lines
            .iter()
            .map(|line| {
                serde_json::json!({
                    "page": line.page,
                    "text": line.text,
                    "ratio": line.ratio,
                    "bold": line.is_bold,
                    "rule_level": line.rule_level,
                    "rule_confidence": line.rule_confidence,
                    "semantic_score": line.semantic_score,
                    "level_hint": line.level_hint,
                    "decision": format!("{:?}", line.decision),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }

    println!("{}", "Document".cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), parser.version());
    println!("{}: {}", "Pages".bold(), diagnostics.page_count);
    println!(
        "{}: {:.1}pt ({} spans, {} lines)",
        "Body size".bold(),
        diagnostics.body_size,
        diagnostics.span_count,
        diagnostics.line_count
    );
    println!("{}: {}", "Size tiers".bold(), diagnostics.tier_count);
    println!("{}: {}", "Semantic filter".bold(), diagnostics.semantic.as_str());
    println!("{}: {:?}", "Title".bold(), explanation.processed.result.title);
    if !diagnostics.degradations.is_empty() {
        println!(
            "{}: {}",
            "Degraded".bold(),
            describe_degradations(&diagnostics.degradations)
        );
    }

    println!();
    println!(
        "{}",
        format!(
            "{:>4} {:>5} {:>4} {:>4} {:>5} {:>5}  {:<10} {}",
            "page", "ratio", "bold", "rule", "conf", "sem", "decision", "text"
        )
        .bold()
    );
    println!("{}", "─".repeat(60).dimmed());
    for line in &explanation.lines {
        let decision = match line.decision {
            LineDecision::Heading(level) => level.as_str().green().bold(),
            LineDecision::NotHeading => "-".dimmed(),
            LineDecision::BelowRuleThreshold => "low-conf".yellow(),
            LineDecision::RejectedBySemantic => "rejected".yellow(),
            LineDecision::RunningHeader => "running".magenta(),
            LineDecision::Duplicate => "duplicate".magenta(),
            LineDecision::Title => "title".cyan(),
        };
        println!(
            "{:>4} {:>5.2} {:>4} {:>4} {:>5.2} {:>5}  {:<10} {}",
            line.page,
            line.ratio,
            if line.is_bold { "B" } else { "" },
            line.rule_level.map_or("-", |l| l.as_str()),
            line.rule_confidence,
            line.semantic_score
                .map_or_else(|| "-".to_string(), |s| format!("{:.2}", s)),
            decision,
            truncate(&line.text, 60)
        );
    }

    println!();
    println!(
        "{} {} headings, {} running header lines, {} level conflicts",
        "Result:".green().bold(),
        explanation.processed.result.outline.len(),
        diagnostics.running_headers,
        diagnostics.level_conflicts
    );

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdf-outline".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF title and outline extraction tool");
    println!();
    println!("License: MIT");
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn describe_degradation(degradation: Degradation) -> &'static str {
    match degradation {
        Degradation::EmptyDocument => "no extractable text",
        Degradation::TimeoutExceeded => "time budget exceeded, outline is best effort",
        Degradation::ModelUnavailable => "semantic model unavailable, rule-only decisions",
    }
}

fn describe_degradations(degradations: &[Degradation]) -> String {
    degradations
        .iter()
        .map(|d| describe_degradation(*d))
        .collect::<Vec<_>>()
        .join("; ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
