// 🏞️ MBRCI CLI
// run: config -> join -> classify -> CSV/SQLite/histogram
// classify: re-run the record stages over an exported CSV
// summary: class histogram stored for a run

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mbrci::{
    fingerprint_files, get_class_counts, get_run, insert_records, latest_run, load_csv,
    run_pipeline, setup_database, verify_count, write_csv, CellSizes, ClassHistogram,
    MissingPolicy, Pipeline, PipelineConfig, RunRecord,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Mainstem Big River Condition Index for HUC12 sub-watersheds
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MBRCI_LOG", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, join and classify every unit named in a config file
    Run {
        #[arg(long)]
        config: PathBuf,

        /// Record table CSV (overrides config)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// SQLite database (overrides config)
        #[arg(long)]
        sqlite: Option<PathBuf>,

        /// Class histogram CSV (overrides config)
        #[arg(long)]
        histogram: Option<PathBuf>,

        /// Abort on the first unit that cannot be classified
        #[arg(long)]
        reject_missing: bool,
    },

    /// Re-normalize, re-derive and re-classify an exported record CSV
    Classify {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Cell sizes and missing policy are taken from here when given
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        reject_missing: bool,
    },

    /// Print the class histogram stored for a run (latest by default)
    Summary {
        #[arg(long)]
        sqlite: PathBuf,

        #[arg(long)]
        run: Option<String>,
    },
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!(version = mbrci::VERSION, "mbrci starting");

    match args.command {
        Command::Run {
            config,
            csv,
            sqlite,
            histogram,
            reject_missing,
        } => {
            let mut config = PipelineConfig::from_file(&config)
                .with_context(|| format!("loading config {}", config.display()))?;

            if csv.is_some() {
                config.output.csv = csv;
            }
            if sqlite.is_some() {
                config.output.sqlite = sqlite;
            }
            if histogram.is_some() {
                config.output.histogram = histogram;
            }
            if reject_missing {
                config.missing_policy = MissingPolicy::Reject;
            }

            run(&config)
        }
        Command::Classify {
            input,
            output,
            config,
            reject_missing,
        } => classify(&input, &output, config.as_deref(), reject_missing),
        Command::Summary { sqlite, run } => summary(&sqlite, run.as_deref()),
    }
}

fn run(config: &PipelineConfig) -> Result<()> {
    println!("🏞️  MBRCI run");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let output = run_pipeline(config).context("pipeline failed")?;

    println!("\n📊 {}", output.quality.summary());
    println!("✓ {}", output.histogram.summary());

    if let Some(path) = &config.output.csv {
        write_csv(path, &output.records)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("💾 Records -> {}", path.display());
    }

    if let Some(path) = &config.output.histogram {
        output
            .histogram
            .write_csv(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("💾 Histogram -> {}", path.display());
    }

    if let Some(path) = &config.output.sqlite {
        let sources = config.table_sources()?;
        let inputs: Vec<&Path> = sources.iter().map(|s| s.path()).collect();
        let fingerprint = fingerprint_files(&inputs).context("fingerprinting inputs")?;
        let run = RunRecord::new(fingerprint, &output.records);

        let conn = Connection::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        setup_database(&conn)?;
        insert_records(&conn, &run, &output.records)?;

        let stored = verify_count(&conn, &run.run_id)?;
        if stored != output.records.len() as i64 {
            return Err(anyhow!(
                "stored {} rows for run {}, expected {}",
                stored,
                run.run_id,
                output.records.len()
            ));
        }
        println!("💾 Run {} -> {} ({} rows)", run.run_id, path.display(), stored);
    }

    Ok(())
}

fn classify(input: &Path, output: &Path, config: Option<&Path>, reject_missing: bool) -> Result<()> {
    let (cell_sizes, mut policy) = match config {
        Some(path) => {
            let config = PipelineConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            (config.cell_sizes, config.missing_policy)
        }
        None => (CellSizes::default(), MissingPolicy::default()),
    };
    if reject_missing {
        policy = MissingPolicy::Reject;
    }

    let records = load_csv(input).with_context(|| format!("reading {}", input.display()))?;
    let result = Pipeline::new(cell_sizes, policy).process(records)?;

    write_csv(output, &result.records).with_context(|| format!("writing {}", output.display()))?;
    println!("✓ {}", result.histogram.summary());
    Ok(())
}

fn summary(sqlite: &Path, run_id: Option<&str>) -> Result<()> {
    let conn = Connection::open(sqlite).with_context(|| format!("opening {}", sqlite.display()))?;

    let run = match run_id {
        Some(id) => get_run(&conn, id)?,
        None => latest_run(&conn)?,
    }
    .ok_or_else(|| anyhow!("no run found in {}", sqlite.display()))?;

    let histogram = ClassHistogram::from_counts(&get_class_counts(&conn, &run.run_id)?)?;

    println!("📊 Run {} ({})", run.run_id, run.started_at.to_rfc3339());
    println!("   Inputs: {}", run.input_fingerprint);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (class, count) in histogram.iter().filter(|(_, n)| *n > 0) {
        let nodes = class.split_nodes();
        println!(
            "  MBRCI {:>2}  (SN2={} SN3={} SN4={} SN5={})  {:>6}",
            class,
            nodes.sn2(),
            nodes.sn3(),
            nodes.sn4(),
            nodes.sn5(),
            count
        );
    }
    println!("  unclassified{:>27}", histogram.unclassified());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ {}", histogram.summary());
    Ok(())
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries the report
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
