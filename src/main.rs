//! CLI entry point for `policymail`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use policymail::aggregate::{self, CategoryCounts, ReclassifyReport, StoreStats};
use policymail::classify::{Category, Classifier, PatternConfig};
use policymail::config::{self, Config};
use policymail::error::PolicyMailError;
use policymail::extract::{ExtractEvent, ExtractSummary, Extractor, MessageOutcome};
use policymail::i18n;
use policymail::store::StoreReader;

#[derive(Parser)]
#[command(name = "policymail", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Language (en, es). Defaults to system locale.
    #[arg(long, global = true, value_name = "LANG")]
    lang: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract an archive into the store
    Extract {
        /// Archive to extract: an .mbox file or a directory tree
        archive: PathBuf,
        /// Store directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Persisted messages between progress checkpoints
        #[arg(long, value_name = "N")]
        checkpoint: Option<usize>,
    },
    /// Classify every extracted message
    Classify {
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Classify again and compare with the previous results
    Reclassify {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show store statistics
    Stats {
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Detect language early from --lang arg or system env, before clap processes --help.
fn detect_lang_early() -> i18n::Lang {
    let args: Vec<String> = std::env::args().collect();
    for (i, arg) in args.iter().enumerate() {
        if arg == "--lang" {
            if let Some(lang) = args.get(i + 1).and_then(|code| i18n::Lang::from_code(code)) {
                return lang;
            }
        }
        if let Some(lang) = arg.strip_prefix("--lang=").and_then(i18n::Lang::from_code) {
            return lang;
        }
    }
    i18n::detect_system_lang()
}

/// Build a localized clap Command using i18n strings.
fn build_localized_command() -> clap::Command {
    let mut cmd = Cli::command()
        .about(i18n::app_about())
        .long_about(i18n::app_long_about())
        .after_help(i18n::app_after_help());

    let subcommands: Vec<clap::Command> = cmd
        .get_subcommands()
        .map(|sub| {
            let about = match sub.get_name() {
                "extract" => i18n::help_cmd_extract(),
                "classify" => i18n::help_cmd_classify(),
                "reclassify" => i18n::help_cmd_reclassify(),
                "stats" => i18n::help_cmd_stats(),
                "completions" => i18n::help_cmd_completions(),
                "manpage" => i18n::help_cmd_manpage(),
                _ => return sub.clone(),
            };
            sub.clone().about(about)
        })
        .collect();

    for sub in subcommands {
        cmd = cmd.mut_subcommand(sub.get_name(), |_| sub.clone());
    }
    cmd
}

fn main() -> anyhow::Result<()> {
    // Language is needed before clap renders --help.
    i18n::set_lang(detect_lang_early());

    let matches = build_localized_command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let store_dir = |output: Option<PathBuf>| output.unwrap_or_else(|| config.general.output_dir.clone());

    match cli.command {
        Commands::Extract {
            archive,
            output,
            checkpoint,
        } => cmd_extract(&archive, &store_dir(output), checkpoint, &config),
        Commands::Classify { output, json } => cmd_classify(&store_dir(output), json, &config),
        Commands::Reclassify { output } => cmd_reclassify(&store_dir(output), &config),
        Commands::Stats { output, json } => cmd_stats(&store_dir(output), json, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "policymail.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "policymail", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let man = clap_mangen::Man::new(Cli::command());
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Spinner shown while a command runs.
fn spinner(label: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template(&format!(
        "{{spinner:.green}} {label} {{pos}} {{msg}} ({{elapsed}})"
    ))?);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

/// Extract an archive into the store. Ctrl-C stops after the current
/// message and saves progress.
fn cmd_extract(
    archive: &Path,
    output: &Path,
    checkpoint: Option<usize>,
    config: &Config,
) -> anyhow::Result<()> {
    let mut options = config.extract_options();
    if let Some(n) = checkpoint {
        options.checkpoint_interval = n.max(1);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            if !cancel.swap(true, Ordering::SeqCst) {
                eprintln!("\n{}", i18n::msg_interrupting());
            }
        })?;
    }

    let pb = spinner(i18n::msg_extracting())?;
    let start = Instant::now();
    let summary = Extractor::new(output, options)?
        .with_cancel_flag(&cancel)
        .with_progress(&|event| match event {
            ExtractEvent::Folder { path } => pb.set_message(path.to_string()),
            ExtractEvent::Message { outcome, .. } => {
                if !matches!(outcome, MessageOutcome::AlreadyProcessed) {
                    pb.inc(1);
                }
            }
        })
        .extract_path(archive);
    pb.finish_and_clear();
    let summary = summary?;

    print_extract_summary(archive, output, &summary, start.elapsed());
    if summary.interrupted {
        eprintln!("  {}", i18n::msg_resume_hint());
    }
    Ok(())
}

fn print_extract_summary(archive: &Path, output: &Path, summary: &ExtractSummary, elapsed: Duration) {
    println!();
    println!("  {:<20} {}", i18n::msg_archive(), archive.display());
    println!("  {:<20} {}", i18n::msg_store(), output.display());
    println!("  {:<20} {}", i18n::msg_folders(), summary.folders);
    println!("  {:<20} {}", i18n::msg_discovered(), summary.discovered);
    println!("  {:<20} {}", i18n::msg_extracted(), summary.extracted);
    println!("  {:<20} {}", i18n::msg_already_processed(), summary.skipped);
    println!("  {:<20} {}", i18n::msg_failed(), summary.failed);
    println!("  {:<20} {}", i18n::msg_attachments_written(), summary.attachments_written);
    if summary.attachments_skipped > 0 {
        println!(
            "  {:<20} {}",
            i18n::msg_attachments_skipped(),
            summary.attachments_skipped
        );
    }
    println!("  {:<20} {:.2?}", i18n::msg_elapsed(), elapsed);
    println!();
}

fn open_store(output: &Path, config: &Config) -> anyhow::Result<(Classifier, StoreReader)> {
    let patterns = PatternConfig::new(config.classification)?;
    let store = StoreReader::open(output, config.performance.lru_cache_size)?;
    Ok((Classifier::new(patterns), store))
}

/// Classify the store, write the results and the report.
fn cmd_classify(output: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let (classifier, mut store) = open_store(output, config)?;

    let pb = spinner(i18n::msg_classifying())?;
    let results = aggregate::classify_all(&classifier, &mut store);
    pb.finish_and_clear();
    let results = results?;
    let report = aggregate::write_report(&store, &results)?;

    if json {
        let summary = serde_json::json!({
            "results_file": store.layout().results_path(),
            "report_file": store.layout().report_path(),
            "counts": results.counts,
            "errors": results.errors,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{report}");
        if results.errors > 0 {
            println!("  {:<20} {}", i18n::msg_skipped_errors(), results.errors);
        }
    }
    Ok(())
}

/// Re-run classification and print what changed.
fn cmd_reclassify(output: &Path, config: &Config) -> anyhow::Result<()> {
    let (classifier, mut store) = open_store(output, config)?;

    let pb = spinner(i18n::msg_classifying())?;
    let report = aggregate::reclassify(&classifier, &mut store);
    pb.finish_and_clear();
    let report = match report {
        Ok(report) => report,
        Err(e @ PolicyMailError::NoPreviousResults(_)) => {
            anyhow::bail!("{e}. {}", i18n::err_run_classify_first())
        }
        Err(e) => return Err(e.into()),
    };
    aggregate::write_report(&store, &report.results)?;

    print_reclassify_report(&report);
    Ok(())
}

fn print_reclassify_report(report: &ReclassifyReport) {
    println!();
    println!("  {:<20} {}", i18n::msg_backup(), report.backup_path.display());
    println!();
    println!(
        "  {:<20} {:>8} {:>8}",
        "",
        i18n::msg_before(),
        i18n::msg_after()
    );
    println!(
        "  {:<20} {:>8} {:>8}",
        i18n::report_total(),
        report.before.total_emails,
        report.after.total_emails
    );
    for category in Category::ALL {
        println!(
            "  {:<20} {:>8} {:>8}",
            aggregate::category_label(category),
            report.before.get(category),
            report.after.get(category)
        );
    }

    println!();
    println!("  {:<20} {}", i18n::msg_changes(), report.changes.len());
    println!("  {:<20} {}", i18n::msg_improved(), report.improved);
    for change in &report.changes {
        let subject: String = change.subject.chars().take(50).collect();
        println!(
            "    {}  {:>14} -> {:<14} {subject}",
            change.email_id,
            change.before.as_deref().unwrap_or(i18n::msg_new()),
            change.after.key(),
        );
    }
    println!();
}

/// Show statistics of the store.
fn cmd_stats(output: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let store = StoreReader::open(output, config.performance.lru_cache_size)?;
    let stats = aggregate::stats(&store);

    if json {
        let value = serde_json::json!({
            "store": output.to_string_lossy(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_stats_table(output, &stats);
    }
    Ok(())
}

fn print_stats_table(output: &Path, stats: &StoreStats) {
    println!();
    println!("  {:<20} {}", i18n::msg_store(), output.display());
    println!("  {:<20} {}", i18n::msg_message_count(), stats.messages);
    println!("  {:<20} {}", i18n::msg_attachments_written(), stats.attachments);
    println!(
        "  {:<20} {}",
        i18n::msg_attachment_size(),
        format_size(stats.attachment_bytes, BINARY)
    );
    println!("  {:<20} {}", i18n::msg_folders(), stats.folders.len());
    if stats.unreadable > 0 {
        println!("  {:<20} {}", i18n::msg_unreadable(), stats.unreadable);
    }

    println!();
    match &stats.classification {
        Some(counts) => {
            println!("  {}:", i18n::msg_classification());
            print_category_counts(counts);
        }
        None => println!(
            "  {:<20} {}",
            i18n::msg_classification(),
            i18n::msg_not_classified_yet()
        ),
    }
    println!();
}

fn print_category_counts(counts: &CategoryCounts) {
    for category in Category::ALL {
        println!(
            "    {:<18} {:>6} ({:.1}%)",
            aggregate::category_label(category),
            counts.get(category),
            counts.percent(category)
        );
    }
}
