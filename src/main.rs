//! SegmentLiftover CLI entry point
//!
//! Batch liftover of segment and probe tables through UCSC liftOver.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use segment_liftover::core::config::{DEFAULT_CHAIN_DIR, DEFAULT_ENGINE, DEFAULT_LOG_DIR};
use segment_liftover::core::remap::{DEFAULT_RANGE_KB, DEFAULT_STEP_SIZE};
use segment_liftover::core::{resolve_chain, LiftoverConfig, RemapCache, ResumeFiles};
use segment_liftover::pipeline::{
    clean_log_dir, format_summary, index_files, read_file_list, resume_set, write_file_list,
    BatchOrchestrator, ExcludedLog, FileClassifier, LogPaths, ProgressLog, RunContext, RunReport,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "segment-liftover")]
#[command(about = "Liftover of segment and probe tables with remapping of unmappable positions")]
#[command(version)]
#[command(author = "SegmentLiftover Contributors")]
struct Cli {
    /// Directory for run logs
    #[arg(long = "log-dir", global = true, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Send log records to stderr instead of the run log file
    #[arg(long = "log-stderr", global = true)]
    log_stderr: bool,

    #[command(subcommand)]
    command: Commands,
}

/// File selection shared by `lift` and `index`
#[derive(Args)]
struct InputArgs {
    /// Input directory
    #[arg(short = 'i', long = "input-dir")]
    input_dir: PathBuf,

    /// Segment file name pattern (regex matched at the start of the basename)
    #[arg(long = "si")]
    segment_input: Option<String>,

    /// Probe file name pattern (regex matched at the start of the basename)
    #[arg(long = "pi")]
    probe_input: Option<String>,

    /// Process at most N files
    #[arg(long = "limit", value_name = "N")]
    limit: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Lift every matching file under the input directory
    Lift {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory
        #[arg(short = 'o', long = "output-dir")]
        output_dir: PathBuf,

        /// Chain file, or one of hg18ToHg19, hg18ToHg38, hg19ToHg38, hg38ToHg19, hg19ToHg18
        #[arg(short = 'c', long)]
        chain: String,

        /// Directory holding the known chain files
        #[arg(long = "chain-dir", default_value = DEFAULT_CHAIN_DIR)]
        chain_dir: PathBuf,

        /// liftOver executable
        #[arg(short = 'l', long = "liftover", default_value = DEFAULT_ENGINE)]
        liftover: PathBuf,

        /// Output file name for segment files (default: matched input name)
        #[arg(long = "so")]
        segment_output: Option<String>,

        /// Output file name for probe files (default: matched input name)
        #[arg(long = "po")]
        probe_output: Option<String>,

        /// Step size of the remapping search in bases
        #[arg(long = "step-size", default_value_t = DEFAULT_STEP_SIZE, allow_negative_numbers = true)]
        step_size: i64,

        /// Remapping search range in kilobases
        #[arg(long = "range", default_value_t = DEFAULT_RANGE_KB, allow_negative_numbers = true)]
        range: i64,

        /// Do not search for mappable neighbours of unmappable positions
        #[arg(long = "no-remapping")]
        no_remapping: bool,

        /// New header for the first four columns of segment outputs
        #[arg(long = "new-segment-header", num_args = 4, value_names = ["ID", "CHR", "START", "STOP"])]
        new_segment_header: Option<Vec<String>>,

        /// New header for the first three columns of probe outputs
        #[arg(long = "new-probe-header", num_args = 3, value_names = ["ID", "CHR", "POS"])]
        new_probe_header: Option<Vec<String>>,

        /// Resume an interrupted run from its index and progress files
        #[arg(long = "resume", num_args = 2, value_names = ["INDEX", "PROGRESS"])]
        resume: Option<Vec<PathBuf>>,

        /// Take the file list from an index file instead of walking the input directory
        #[arg(long = "index-file")]
        index_file: Option<PathBuf>,

        /// Seed the remapping cache from an earlier run's remapped log
        #[arg(long = "remap-file")]
        remap_file: Option<PathBuf>,

        /// Number of files processed in parallel
        #[arg(short = 't', long, default_value = "1")]
        threads: usize,

        /// Timeout for each liftOver invocation in seconds
        #[arg(long = "timeout", value_name = "SECS")]
        timeout: Option<u64>,

        /// Write a JSON run report
        #[arg(long = "report")]
        report: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(long = "no-progress")]
        no_progress: bool,
    },
    /// Build the file index only
    Index {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Delete the files in the log directory
    Clean,
}

/// Route log records to the run log file, or stderr
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false);
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn header<const N: usize>(values: Option<Vec<String>>) -> anyhow::Result<Option<[String; N]>> {
    values
        .map(|v| {
            <[String; N]>::try_from(v)
                .map_err(|v| anyhow::anyhow!("Expected {} header names, got {}", N, v.len()))
        })
        .transpose()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Clean => {
            let removed = clean_log_dir(&cli.log_dir)
                .with_context(|| format!("Failed to clean {}", cli.log_dir.display()))?;
            eprintln!("Removed {} files from {}", removed, cli.log_dir.display());
        }

        Commands::Index { input } => {
            let paths = LogPaths::allocate(&cli.log_dir)?;
            init_logging((!cli.log_stderr).then(|| paths.liftover_log()).as_deref())?;

            let classifier =
                FileClassifier::new(input.segment_input.as_deref(), input.probe_input.as_deref())?;
            let (files, counts) = index_files(&input.input_dir, &classifier, input.limit);
            write_file_list(paths.file_list(), &files)?;

            eprintln!("Found {} segment files.", counts.segments);
            eprintln!("Found {} probe files.", counts.probes);
            eprintln!("File index saved to {}", paths.file_list().display());
        }

        Commands::Lift {
            input,
            output_dir,
            chain,
            chain_dir,
            liftover,
            segment_output,
            probe_output,
            step_size,
            range,
            no_remapping,
            new_segment_header,
            new_probe_header,
            resume,
            index_file,
            remap_file,
            threads,
            timeout,
            report,
            no_progress,
        } => {
            let resume = resume.map(|mut v| {
                let progress = v.pop().unwrap_or_default();
                let index = v.pop().unwrap_or_default();
                ResumeFiles { index, progress }
            });

            let config = LiftoverConfig {
                input_dir: input.input_dir,
                output_dir,
                engine: liftover,
                chain: resolve_chain(&chain, &chain_dir),
                segment_pattern: input.segment_input,
                probe_pattern: input.probe_input,
                segment_output,
                probe_output,
                step_size,
                range_kb: range,
                fallback: !no_remapping,
                segment_header: header(new_segment_header)?,
                probe_header: header(new_probe_header)?,
                engine_timeout: timeout.map(Duration::from_secs),
                threads,
                remap_seed: remap_file,
                resume,
                index_file,
                limit: input.limit,
                log_dir: cli.log_dir,
            };
            run_lift(config, report, !no_progress, cli.log_stderr, start)?;
        }
    }

    Ok(())
}

fn run_lift(
    config: LiftoverConfig,
    report: Option<PathBuf>,
    show_progress: bool,
    log_stderr: bool,
    start: Instant,
) -> anyhow::Result<()> {
    let settings = config.validate()?;
    let classifier = FileClassifier::from_config(&config)?;

    let paths = LogPaths::allocate(&config.log_dir)
        .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;
    init_logging((!log_stderr).then(|| paths.liftover_log()).as_deref())?;
    log::info!("{}", config);
    eprintln!("{}", config);

    let files = if let Some(resume) = &config.resume {
        let index = read_file_list(&resume.index)
            .with_context(|| format!("Failed to read index {}", resume.index.display()))?;
        let done = read_file_list(&resume.progress)
            .with_context(|| format!("Failed to read progress {}", resume.progress.display()))?;
        let remaining = resume_set(&index, &done);
        eprintln!(
            "Resuming: {} of {} files left to process.",
            remaining.len(),
            index.len()
        );
        remaining
    } else if let Some(index_file) = &config.index_file {
        let mut files = read_file_list(index_file)
            .with_context(|| format!("Failed to read index {}", index_file.display()))?;
        if let Some(n) = config.limit {
            files.truncate(n);
        }
        files
    } else {
        let (files, counts) = index_files(&config.input_dir, &classifier, config.limit);
        write_file_list(paths.file_list(), &files)?;
        eprintln!("Found {} segment files.", counts.segments);
        eprintln!("Found {} probe files.", counts.probes);
        files
    };

    let cache = RemapCache::new();
    if let Some(seed) = &config.remap_seed {
        let added = cache
            .seed_from_path(seed)
            .with_context(|| format!("Wrong remap file {}", seed.display()))?;
        eprintln!("Loaded {} remapped positions from {}", added, seed.display());
    }

    let ctx = RunContext::new(Arc::new(config.engine_command()), settings, config.fallback)
        .with_cache(cache);

    let progress_path = match &config.resume {
        Some(resume) => resume.progress.clone(),
        None => paths.progress_log(),
    };
    let orchestrator = BatchOrchestrator::new(&ctx, &classifier, &config.input_dir, &config.output_dir)
        .with_headers(config.segment_header.clone(), config.probe_header.clone())
        .with_progress_log(ProgressLog::open(&progress_path)?)
        .with_excluded_log(ExcludedLog::create(paths.unmapped_log())?)
        .with_threads(config.threads)
        .with_progress_bar(show_progress);
    orchestrator.run(&files)?;

    ctx.cache()
        .save_to_path(paths.remapped_log())
        .with_context(|| format!("Failed to save {}", paths.remapped_log().display()))?;

    let summary = ctx.stats().summary();
    eprint!("{}", format_summary(&summary));
    eprintln!("Done! Finished in {:.2}s", start.elapsed().as_secs_f64());

    if let Some(report_path) = report {
        RunReport::new(
            files.len(),
            settings,
            config.fallback,
            summary,
            ctx.cache().stats(),
            start.elapsed(),
        )
        .with_remap_log(&paths.remapped_log())
        .write_json(&report_path)?;
    }

    Ok(())
}
