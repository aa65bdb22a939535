use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, unbounded};
use lineproto_core::{
    IngestConfig, IngestRequest, IngestSummary, Ingestor, Metric, ParseError, ReaderPool,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(
    name = "lineproto",
    version,
    about = "Line-protocol ingestion CLI",
    long_about = "Parse line-protocol files into metrics and report per-line outcomes."
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. info, lineproto=debug).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one or more line-protocol files.
    Ingest {
        /// Input files; names ending in .gz are decompressed.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Namespace (database) attached to every metric.
        #[arg(long, default_value = "default")]
        db: String,

        /// Timestamp precision of the input (ns, us, ms, s, m, h).
        #[arg(long)]
        precision: Option<String>,

        /// Treat every input as gzip-compressed.
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Number of worker threads (defaults to CPU count).
        #[arg(long, default_value_t = num_cpus::get())]
        workers: usize,

        /// Lines with this many tags or more are rejected.
        #[arg(long, default_value_t = lineproto_core::config::DEFAULT_MAX_TAGS)]
        max_tags: usize,

        /// Initial reader buffer size (supports suffixes K/M/G).
        #[arg(long, default_value = "64K", value_parser = parse_size)]
        buffer_capacity: usize,

        /// Longest accepted line (supports suffixes K/M/G).
        #[arg(long, default_value = "16M", value_parser = parse_size)]
        max_line: usize,

        /// Maximum number of idle readers retained by the pool.
        #[arg(long, default_value_t = lineproto_core::config::DEFAULT_MAX_POOLED_READERS)]
        pool_readers: usize,

        /// Keep raw field pairs on parsed metrics.
        #[arg(long, default_value_t = false)]
        capture_fields: bool,

        /// Print every parsed metric.
        #[arg(long, default_value_t = false)]
        print: bool,
    },
}

struct IngestArgs {
    files: Vec<PathBuf>,
    db: String,
    precision: Option<String>,
    gzip: bool,
    workers: usize,
    config: IngestConfig,
    print: bool,
}

struct FileReport {
    path: PathBuf,
    elapsed: Duration,
    bytes: u64,
    summary: IngestSummary,
    metrics: Vec<Metric>,
    error: Option<String>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Ingest {
            files,
            db,
            precision,
            gzip,
            workers,
            max_tags,
            buffer_capacity,
            max_line,
            pool_readers,
            capture_fields,
            print,
        } => {
            let config = IngestConfig {
                max_tags,
                initial_buffer_capacity: buffer_capacity.max(1),
                max_line_bytes: max_line.max(1),
                max_pooled_readers: pool_readers,
                capture_fields,
                ..IngestConfig::default()
            };
            ingest_command(IngestArgs {
                files,
                db,
                precision,
                gzip,
                workers,
                config,
                print,
            })?
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|error| format!("invalid log level '{level}': {error}"))?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn ingest_command(args: IngestArgs) -> Result<(), Box<dyn std::error::Error>> {
    let started_at = Instant::now();
    let ingestor = Ingestor::new(&args.config);
    let workers = args.workers.clamp(1, args.files.len().max(1));

    tracing::info!(
        files = args.files.len(),
        workers,
        db = %args.db,
        precision = args.precision.as_deref().unwrap_or("ms"),
        "starting ingestion"
    );

    let (task_tx, task_rx) = bounded::<(usize, PathBuf)>(workers * 2);
    let (report_tx, report_rx) = unbounded::<(usize, FileReport)>();
    let mut handles = Vec::with_capacity(workers);

    for worker_id in 0..workers {
        let task_rx = task_rx.clone();
        let report_tx = report_tx.clone();
        let ingestor = ingestor.clone();
        let db = args.db.clone();
        let precision = args.precision.clone();
        let force_gzip = args.gzip;
        let keep_metrics = args.print;

        handles.push(thread::spawn(move || {
            for (index, path) in task_rx.iter() {
                tracing::debug!(worker_id, path = %path.display(), "ingesting file");
                let report = ingest_file(
                    &ingestor,
                    &path,
                    &db,
                    precision.as_deref(),
                    force_gzip,
                    keep_metrics,
                );
                if report_tx.send((index, report)).is_err() {
                    break;
                }
            }
        }));
    }
    drop(task_rx);
    drop(report_tx);

    for (index, path) in args.files.iter().cloned().enumerate() {
        task_tx.send((index, path))?;
    }
    drop(task_tx);

    let mut reports: Vec<(usize, FileReport)> = report_rx.iter().collect();
    for handle in handles {
        handle
            .join()
            .map_err(|_| "ingest worker thread panicked")?;
    }
    reports.sort_by_key(|(index, _)| *index);

    let max_failures = args.config.max_reported_failures;
    let mut total = IngestSummary::default();
    let mut total_bytes = 0u64;
    let mut failed_files = 0usize;

    for (_, report) in &reports {
        if args.print {
            for metric in &report.metrics {
                println!("{}", format_metric(metric));
            }
        }
        print_file_report(report);
        total.merge(&report.summary, max_failures);
        total_bytes += report.bytes;
        if report.error.is_some() {
            failed_files += 1;
        }
    }

    print_totals(
        &total,
        total_bytes,
        started_at.elapsed(),
        reports.len(),
        ingestor.pool(),
    );

    if failed_files > 0 {
        return Err(format!("{failed_files} of {} files could not be read completely", reports.len()).into());
    }
    Ok(())
}

fn ingest_file(
    ingestor: &Ingestor,
    path: &Path,
    db: &str,
    precision: Option<&str>,
    force_gzip: bool,
    keep_metrics: bool,
) -> FileReport {
    let started_at = Instant::now();
    let mut report = FileReport {
        path: path.to_path_buf(),
        elapsed: Duration::ZERO,
        bytes: 0,
        summary: IngestSummary::default(),
        metrics: Vec::new(),
        error: None,
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) => {
            report.error = Some(format!("failed to open: {error}"));
            return report;
        }
    };
    report.bytes = file.metadata().map(|meta| meta.len()).unwrap_or(0);

    let mut request = IngestRequest::new(db);
    if let Some(precision) = precision {
        request = request.with_precision(precision);
    }
    if force_gzip || has_gz_extension(path) {
        request = request.with_content_encoding("gzip");
    }

    let batch = ingestor.ingest(file, &request);
    report.elapsed = started_at.elapsed();
    report.summary = batch.summary;
    report.error = batch.error.map(|error| error.to_string());
    if keep_metrics {
        report.metrics = batch.metrics;
    }
    report
}

fn has_gz_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn format_metric(metric: &Metric) -> String {
    let mut out = format!("{}/{}", metric.namespace, metric.name);
    for (key, value) in &metric.tags {
        out.push(',');
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    for field in &metric.fields {
        out.push(' ');
        out.push_str(&field.key);
        out.push('=');
        out.push_str(&String::from_utf8_lossy(&field.value));
    }
    out.push_str(&format!(" @{}", metric.timestamp));
    out
}

fn print_file_report(report: &FileReport) {
    let summary = &report.summary;
    println!("{}", report.path.display());
    println!(
        "  lines {} | parsed {} | skipped {} | failed {} | {} in {}",
        summary.lines,
        summary.parsed,
        summary.skipped,
        summary.failed,
        format_bytes(report.bytes),
        format_duration(report.elapsed),
    );
    for failure in &summary.failures {
        println!("    line {:>8}: {}", failure.line, failure.error);
    }
    if summary.unreported_failures() > 0 {
        println!("    ... {} more", summary.unreported_failures());
    }
    if let Some(error) = &report.error {
        println!("  error: {error}");
    }
}

fn print_totals(
    total: &IngestSummary,
    bytes: u64,
    elapsed: Duration,
    files: usize,
    pool: &ReaderPool,
) {
    let elapsed_secs = elapsed.as_secs_f64().max(1e-6);

    println!("ingest complete");
    println!("  files: {files}");
    println!("  elapsed: {}", format_duration(elapsed));
    println!("  input bytes: {}", format_bytes(bytes));
    println!(
        "  throughput: {}/s | {:.0} lines/s",
        format_rate(bytes as f64 / elapsed_secs),
        total.lines as f64 / elapsed_secs,
    );
    println!(
        "  lines: {} | parsed {} | skipped {} | failed {}",
        total.lines, total.parsed, total.skipped, total.failed
    );
    for kind in ParseError::ALL {
        if let Some(count) = total.failures_by_kind.get(&kind) {
            println!("    {:<20} {count}", kind.as_str());
        }
    }

    let metrics = pool.metrics();
    println!(
        "  reader pool: created {} | recycled {} | dropped {} | shrunk {}",
        metrics.created, metrics.recycled, metrics.dropped, metrics.shrunk
    );
}

/// Parses a byte size such as `512`, `64K`, `16MiB` or `1g`.
fn parse_size(value: &str) -> Result<usize, String> {
    const SUFFIXES: [(&str, u32); 9] = [
        ("kib", 10),
        ("mib", 20),
        ("gib", 30),
        ("kb", 10),
        ("mb", 20),
        ("gb", 30),
        ("k", 10),
        ("m", 20),
        ("g", 30),
    ];

    let lowered = value.trim().to_ascii_lowercase();
    let (digits, shift) = SUFFIXES
        .iter()
        .find_map(|(suffix, shift)| lowered.strip_suffix(suffix).map(|rest| (rest, *shift)))
        .unwrap_or_else(|| (lowered.strip_suffix('b').unwrap_or(&lowered), 0));

    let digits = digits.trim_end();
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(format!("invalid size '{value}', expected e.g. 512, 64K or 16M"));
    }
    let count: usize = digits
        .parse()
        .map_err(|_| format!("size out of range: {value}"))?;

    count
        .checked_mul(1usize << shift)
        .ok_or_else(|| format!("size out of range: {value}"))
}

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

fn scale(mut value: f64) -> (f64, usize) {
    let mut unit = 0usize;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    (value, unit)
}

fn format_bytes(bytes: u64) -> String {
    match scale(bytes as f64) {
        (_, 0) => format!("{bytes} B"),
        (value, unit) => format!("{value:.2} {}", UNITS[unit]),
    }
}

fn format_rate(bytes_per_second: f64) -> String {
    if !bytes_per_second.is_finite() || bytes_per_second <= 0.0 {
        return "0 B".to_string();
    }
    match scale(bytes_per_second) {
        (value, 0) => format!("{value:.0} B"),
        (value, unit) => format!("{value:.2} {}", UNITS[unit]),
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let millis = duration.subsec_millis();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;

    if minutes > 0 {
        format!("{minutes:02}:{seconds:02}")
    } else {
        format!("{seconds}.{millis:03}s")
    }
}
