//! CLI binary for edgequake-convert.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `EngineConfig`, runs one engine operation and prints the result.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_convert::{
    ConversionEngine, ConversionRequest, EngineConfig, FormatId, NormalizationAction,
    NormalizeOptions, Phase, ProgressSink, QualityTier,
};
use edgequake_convert::progress::SharedProgressSink;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress sink using indicatif ────────────────────────────────────────

/// Terminal progress sink: one bar over the whole batch, one log line per
/// finished request.
struct CliProgressSink {
    bar: ProgressBar,
}

impl CliProgressSink {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ProgressSink for CliProgressSink {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting batch of {total} conversions…"))
        ));
    }

    fn emit_progress(&self, request_id: &str, phase: Phase, percent: u8) {
        self.bar
            .set_message(format!("{request_id} {} {percent:>3}%", dim(&phase.to_string())));
    }

    fn on_request_complete(&self, request_id: &str, success: bool) {
        if success {
            self.bar.println(format!("  {} {request_id}", green("✓")));
        } else {
            self.bar.println(format!("  {} {request_id}", red("✗")));
        }
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(succeeded);
        if failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

/// Prints nothing; used with `--quiet`, `--json` or `--no-progress`.
struct SilentSink;

impl ProgressSink for SilentSink {}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert using extensions to infer formats
  eqconvert convert data.tsv data.json

  # Explicit formats
  eqconvert convert export.dat report.html --from csv --to html

  # Batch from a JSON file: [{"input": "a.csv", "output": "a.json"}, ...]
  eqconvert batch requests.json

  # Show the route the engine would take
  eqconvert path tsv json

  # Price a 5 MB conversion at high quality
  eqconvert cost csv pdf --size 5000000 --quality high

  # Compare direct and optimized strategies
  eqconvert options csv pdf

  # Verify a file before converting it
  eqconvert check report.docx --to pdf

  # Re-encode a text file to UTF-8, then restore it
  eqconvert normalize legacy.txt --audit-log normalize.jsonl
  eqconvert undo legacy.txt --audit-log normalize.jsonl

ENVIRONMENT VARIABLES:
  RUST_LOG                      Override log filter (e.g. edgequake_convert=debug)
  EQCONVERT_MAX_FILE_SIZE       Integrity size ceiling in bytes
  EQCONVERT_MAX_HOPS            Maximum capability hops (1–3)
  EQCONVERT_AUDIT_LOG           JSON Lines normalization audit file
  EQCONVERT_TEMP_DIR            Directory for intermediate files
"#;

/// Convert files between formats through registered capabilities.
#[derive(Parser, Debug)]
#[command(
    name = "eqconvert",
    version,
    about = "Convert files between formats through registered capabilities",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Integrity size ceiling in bytes.
    #[arg(long, global = true, env = "EQCONVERT_MAX_FILE_SIZE")]
    max_file_size: Option<u64>,

    /// Maximum capability hops when no direct capability exists (1–3).
    #[arg(long, global = true, env = "EQCONVERT_MAX_HOPS",
          value_parser = clap::value_parser!(u8).range(1..=3))]
    max_hops: Option<u8>,

    /// Skip the integrity check on inputs.
    #[arg(long, global = true, env = "EQCONVERT_NO_VERIFY")]
    no_verify: bool,

    /// Also verify every intermediate artifact.
    #[arg(long, global = true, env = "EQCONVERT_VERIFY_INTERMEDIATES")]
    verify_intermediates: bool,

    /// Do not normalize text inputs to UTF-8 before conversion.
    #[arg(long, global = true, env = "EQCONVERT_NO_NORMALIZE")]
    no_normalize: bool,

    /// Normalize the input file itself rather than a working copy.
    #[arg(long, global = true, env = "EQCONVERT_NORMALIZE_IN_PLACE")]
    normalize_in_place: bool,

    /// Do not attempt mojibake repair during normalization.
    #[arg(long, global = true, env = "EQCONVERT_NO_MOJIBAKE_REPAIR")]
    no_mojibake_repair: bool,

    /// JSON Lines file receiving normalization audit records.
    #[arg(long, global = true, env = "EQCONVERT_AUDIT_LOG")]
    audit_log: Option<PathBuf>,

    /// Directory for intermediate files.
    #[arg(long, global = true, env = "EQCONVERT_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true, env = "EQCONVERT_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "EQCONVERT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "EQCONVERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "EQCONVERT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one file.
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Source format (default: input extension).
        #[arg(long)]
        from: Option<String>,
        /// Target format (default: output extension).
        #[arg(long)]
        to: Option<String>,
    },
    /// Convert every request listed in a JSON file, in order.
    Batch {
        /// JSON array of {"id"?, "input", "output", "source"?, "target"?}.
        requests: PathBuf,
    },
    /// Show the route between two formats.
    Path { from: String, to: String },
    /// Price a conversion in credits.
    Cost {
        from: String,
        to: String,
        /// File size in bytes.
        #[arg(long, conflicts_with = "file")]
        size: Option<u64>,
        /// Take the size from this file.
        #[arg(long)]
        file: Option<PathBuf>,
        /// draft, standard, high or premium.
        #[arg(long, default_value = "standard")]
        quality: QualityTier,
    },
    /// Compare direct and optimized strategies.
    Options { from: String, to: String },
    /// Run the integrity checker on a file.
    Check {
        file: PathBuf,
        /// Declared format (default: extension).
        #[arg(long)]
        from: Option<String>,
        /// Intended target format (default: same as source).
        #[arg(long)]
        to: Option<String>,
    },
    /// Re-encode a text file to UTF-8 in place, keeping a .bak backup.
    Normalize {
        file: PathBuf,
        /// Write a UTF-8 byte-order mark.
        #[arg(long)]
        bom: bool,
    },
    /// Restore a file from its normalization backup.
    Undo { file: PathBuf },
    /// List registered capabilities.
    Formats,
}

/// One entry of a batch file.
#[derive(Debug, Deserialize)]
struct BatchEntry {
    id: Option<String>,
    input: PathBuf,
    output: PathBuf,
    source: Option<FormatId>,
    target: Option<FormatId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !g.quiet && !g.no_progress && !g.json;
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(g)?;
    let engine = Arc::new(
        ConversionEngine::with_builtin(config).context("Failed to register capabilities")?,
    );

    match cli.command {
        Command::Convert {
            ref input,
            ref output,
            ref from,
            ref to,
        } => {
            let source = resolve_format(from.as_deref(), input, "--from")?;
            let target = resolve_format(to.as_deref(), output, "--to")?;
            let outcome = Arc::clone(&engine)
                .convert_file_async(input.clone(), output.clone(), source, target)
                .await?;

            if g.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if !g.quiet {
                eprintln!("{}", dim(&outcome.log.to_string()));
            }
            if !outcome.success {
                bail!("Conversion failed: {}", outcome_reason(&outcome.log));
            }
            if !g.quiet && !g.json {
                eprintln!("{}  →  {}", green("✔"), bold(&output.display().to_string()));
            }
        }

        Command::Batch { ref requests } => {
            let requests = load_batch(requests)?;
            let sink: SharedProgressSink = if show_progress {
                CliProgressSink::new()
            } else {
                Arc::new(SilentSink)
            };

            // Ctrl-C stops the batch before the next request starts.
            let cancel = Arc::new(AtomicBool::new(false));
            {
                let cancel = Arc::clone(&cancel);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.store(true, Ordering::SeqCst);
                    }
                });
            }

            let worker = Arc::clone(&engine);
            let results = tokio::task::spawn_blocking(move || {
                worker.convert_batch_until(&requests, sink.as_ref(), &cancel)
            })
            .await
            .context("Batch task failed")?;

            if g.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if !show_progress && !g.quiet {
                for r in &results {
                    eprintln!(
                        "{} {}  {}ms",
                        if r.success { green("✓") } else { red("✗") },
                        r.request_id,
                        r.duration_ms
                    );
                }
            }
            let failed = results.iter().filter(|r| !r.success).count();
            if failed > 0 {
                bail!("{failed} of {} conversions failed", results.len());
            }
        }

        Command::Path { ref from, ref to } => {
            let (source, target) = (parse_format(from)?, parse_format(to)?);
            match engine.find_conversion_path(&source, &target) {
                Some(path) if g.json => println!("{}", serde_json::to_string(&path)?),
                Some(path) => println!("{path}  ({} hops)", path.hops()),
                None => bail!(
                    "No route from {source} to {target} within {} hops",
                    engine.config().max_hops
                ),
            }
        }

        Command::Cost {
            ref from,
            ref to,
            size,
            ref file,
            quality,
        } => {
            let (source, target) = (parse_format(from)?, parse_format(to)?);
            let size = match (size, file) {
                (Some(s), _) => s,
                (None, Some(f)) => std::fs::metadata(f)
                    .with_context(|| format!("Cannot stat {}", f.display()))?
                    .len(),
                (None, None) => 0,
            };
            let (credits, breakdown) = engine.conversion_cost(&source, &target, size, quality);
            if g.json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
            } else {
                println!("{source} → {target}: {} credits", bold(&credits.to_string()));
                println!("  category         {}", breakdown.category);
                println!("  base             {:.2}", breakdown.base_credits);
                println!("  weighted factors {:.3}", breakdown.weighted_factor_score);
                println!(
                    "  size             {} bytes × {:.2}",
                    breakdown.size_bytes, breakdown.size_multiplier
                );
                println!(
                    "  quality          {} × {:.2}",
                    breakdown.quality_tier, breakdown.quality_multiplier
                );
                println!("  raw              {:.3}", breakdown.raw_credits);
            }
        }

        Command::Options { ref from, ref to } => {
            let (source, target) = (parse_format(from)?, parse_format(to)?);
            let options = engine.analyze_conversion_options(&source, &target);
            if g.json {
                println!("{}", serde_json::to_string_pretty(&options)?);
            } else {
                let show = |label: &str, o: &edgequake_convert::Offer| {
                    let steps: Vec<&str> = o.steps.iter().map(FormatId::as_str).collect();
                    println!(
                        "{label:<10} {:<28} {:>3} credits  quality {:.2}  {}",
                        steps.join(" → "),
                        o.credits,
                        o.quality,
                        if o.executable {
                            green("executable")
                        } else {
                            dim("not executable")
                        }
                    );
                };
                show("direct", &options.direct);
                if let Some(ref opt) = options.optimized {
                    show("optimized", opt);
                }
                println!(
                    "{} {}: {}",
                    cyan("◆"),
                    bold(&options.recommendation.strategy.to_string()),
                    options.recommendation.justification
                );
            }
        }

        Command::Check {
            ref file,
            ref from,
            ref to,
        } => {
            let source = resolve_format(from.as_deref(), file, "--from")?;
            let target = match to {
                Some(t) => parse_format(t)?,
                None => source.clone(),
            };
            let report = engine.pre_conversion_check(file, &source, &target);
            if g.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let c = &report.checks;
                for (name, ok) in [
                    ("exists", c.exists),
                    ("non-empty", c.non_empty),
                    ("size limit", c.within_size_limit),
                    ("readable", c.readable),
                    ("structure", c.format_valid),
                    ("integrity", c.integrity),
                    ("encoding", c.encoding_safe),
                ] {
                    println!("  {} {name}", if ok { green("✓") } else { red("✗") });
                }
                for w in &report.warnings {
                    println!("  {} {w}", cyan("⚠"));
                }
                for r in &report.recommendations {
                    println!("  {} {r}", dim("→"));
                }
                if let Some(ref sums) = report.checksums {
                    println!("  sha256 {}", dim(&sums.sha256));
                    println!("  md5    {}", dim(&sums.md5));
                }
            }
            if let Some(failure) = report.failure {
                bail!("Integrity check failed ({}): {failure}", failure.code());
            }
        }

        Command::Normalize { ref file, bom } => {
            let record = engine
                .normalize_to_canonical(file, Some(bom))
                .with_context(|| format!("Failed to normalize {}", file.display()))?;
            if g.json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                let from = record
                    .from_encoding
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "binary".into());
                match record.action {
                    NormalizationAction::Normalized => println!(
                        "{} {}: {from} → {}{}  (backup {})",
                        green("✔"),
                        file.display(),
                        record.to_encoding,
                        if record.mojibake_repaired {
                            ", mojibake repaired"
                        } else {
                            ""
                        },
                        record
                            .backup
                            .as_deref()
                            .map(|b| b.display().to_string())
                            .unwrap_or_default()
                    ),
                    NormalizationAction::Noop => {
                        println!("{} {}: already {from}", dim("="), file.display())
                    }
                    NormalizationAction::SkippedBinary => {
                        println!("{} {}: binary, left untouched", cyan("⚠"), file.display())
                    }
                }
            }
        }

        Command::Undo { ref file } => {
            if !engine.undo_normalization(file) {
                bail!(
                    "No backup recorded for {}; undo needs the --audit-log used when it was normalized",
                    file.display()
                );
            }
            if !g.quiet {
                println!("{} restored {}", green("✔"), file.display());
            }
        }

        Command::Formats => {
            let pairs = engine.registry().pairs();
            if g.json {
                let list: Vec<_> = pairs
                    .iter()
                    .map(|(s, t, name)| serde_json::json!({"source": s, "target": t, "capability": name}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                for (s, t, name) in pairs {
                    println!("{:<6} → {:<6} {}", s.as_str(), t.as_str(), dim(&name));
                }
            }
        }
    }

    Ok(())
}

/// Map global flags to `EngineConfig`.
fn build_config(g: &GlobalOpts) -> Result<EngineConfig> {
    let defaults = EngineConfig::default();
    let mut builder = EngineConfig::builder()
        .verify_input(!g.no_verify)
        .verify_intermediates(g.verify_intermediates)
        .normalize_text(!g.no_normalize)
        .normalize_in_place(g.normalize_in_place)
        .normalization(NormalizeOptions {
            bom: false,
            repair_mojibake: !g.no_mojibake_repair,
        });

    if let Some(max) = g.max_file_size {
        builder = builder
            .max_file_size(max)
            .large_file_warning(defaults.large_file_warning.min(max));
    }
    if let Some(hops) = g.max_hops {
        builder = builder.max_hops(hops as usize);
    }
    if let Some(ref path) = g.audit_log {
        builder = builder.audit_log(path);
    }
    if let Some(ref dir) = g.temp_dir {
        builder = builder.temp_dir(dir);
    }

    builder.build().context("Invalid configuration")
}

fn parse_format(s: &str) -> Result<FormatId> {
    FormatId::parse(s).with_context(|| format!("Invalid format '{s}'"))
}

/// Explicit format if given, else the file extension.
fn resolve_format(explicit: Option<&str>, path: &Path, flag: &str) -> Result<FormatId> {
    match explicit {
        Some(s) => parse_format(s),
        None => FormatId::from_path(path).with_context(|| {
            format!(
                "Cannot infer a format from '{}'; pass {flag}",
                path.display()
            )
        }),
    }
}

fn load_batch(path: &Path) -> Result<Vec<ConversionRequest>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;
    let entries: Vec<BatchEntry> =
        serde_json::from_str(&text).context("Batch file must be a JSON array of requests")?;

    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| -> Result<ConversionRequest> {
            let source = match e.source {
                Some(s) => s,
                None => resolve_format(None, &e.input, "\"source\"")?,
            };
            let target = match e.target {
                Some(t) => t,
                None => resolve_format(None, &e.output, "\"target\"")?,
            };
            let request = ConversionRequest::new(e.input, e.output, source, target);
            Ok(match e.id {
                Some(id) => request.with_id(id),
                None => request.with_id(format!("#{}", i + 1)),
            })
        })
        .collect()
}

/// Last log line, which names the failing step or the rejection reason.
fn outcome_reason(log: &edgequake_convert::ConversionLog) -> String {
    log.to_string()
        .lines()
        .last()
        .unwrap_or("unknown error")
        .to_string()
}
