#![deny(warnings)]

//! `roster` command line: generate players into the save database, run
//! calibration simulations, and seed the name tables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calibration::{simulate, ReportSections};
use clap::{Args, Parser, Subcommand};
use persistence::{load_name_file, MemoryStore, NamePoolProvider, RecordStore, SqliteStore};
use roster_core::NamePool;
use roster_gen::seeded_rng;
use roster_runtime::{Engine, GenerationRequest, GenerationSummary, RuntimeConfig};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("ROSTER_GIT_SHA"),
    ", ",
    env!("ROSTER_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Generate roster players and calibrate the generator")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// YAML runtime config; ROSTER_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate players and write them to the database
    Generate(GenerateArgs),
    /// Generate many players without saving and report distributions
    Simulate(SimulateArgs),
    /// Load a YAML name pool into the database name tables
    SeedNames {
        #[arg(long)]
        names: PathBuf,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Owner (user) id stamped on every player
    #[arg(long, default_value = "1")]
    owner_id: i64,

    #[arg(long, default_value = "1")]
    count: usize,

    /// Bulk mode: multi-row inserts of --batch-size players
    #[arg(long)]
    insert: bool,

    /// Rows per flush in bulk mode (defaults to the config value)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// YAML name pool instead of the database name tables
    #[arg(long)]
    names: Option<PathBuf>,

    /// Keep rows in memory and never open the database; needs --names or
    /// names_file in the config
    #[arg(long)]
    dry_run: bool,

    /// Print the preview players
    #[arg(long)]
    echo: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SimulateArgs {
    #[arg(long, default_value = "100000")]
    sim_count: u64,

    /// Only report height and position distributions
    #[arg(long)]
    only_height_position: bool,

    /// Only report overall grade distribution
    #[arg(long)]
    only_overall: bool,

    /// Only report total-stat buckets
    #[arg(long)]
    only_total: bool,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    names: Option<PathBuf>,

    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // Logging setup; stdout is reserved for results.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = RuntimeConfig::load(cli.config.as_deref())
        .with_context(|| "loading runtime config")?;
    info!(database = %cfg.database_url, batch_size = cfg.batch_size, "starting roster");

    match cli.command {
        Commands::Generate(args) => generate(&cfg, args),
        Commands::Simulate(args) => run_simulation(&cfg, args),
        Commands::SeedNames { names } => seed_names(&cfg, &names),
    }
}

fn generate(cfg: &RuntimeConfig, args: GenerateArgs) -> Result<()> {
    let request = if args.insert {
        GenerationRequest::bulk(
            args.count,
            args.owner_id,
            args.batch_size.unwrap_or(cfg.batch_size),
        )
    } else {
        GenerationRequest::single(args.count, args.owner_id)
    };
    let names_file = args.names.as_deref().or(cfg.names_file.as_deref());

    let summary = if args.dry_run {
        let pool = load_name_file(dry_run_names(names_file)?)?;
        let store = MemoryStore::new(cfg.identity_return);
        run_engine(store, pool, args.seed, &request)?
    } else {
        let mut store = connect(cfg)?;
        let pool = match names_file {
            Some(path) => load_name_file(path)?,
            None => store.load()?,
        };
        let summary = run_engine(&mut store, pool, args.seed, &request)?;
        store.close();
        summary
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    if args.echo {
        for entry in &summary.preview {
            match entry.identity {
                Some(id) => println!("player_id: {id}"),
                None => println!("player_id: (not reported)"),
            }
            println!("{}\n", entry.record);
        }
    }
    println!(
        "{} {} of {} players for owner {}{}",
        if args.dry_run { "Generated" } else { "Inserted" },
        summary.total_inserted,
        summary.total_generated,
        args.owner_id,
        if args.insert { " (bulk)" } else { " (single)" }
    );
    Ok(())
}

/// Dry runs must not touch the database, so the names come from a file.
fn dry_run_names(names_file: Option<&Path>) -> Result<&Path> {
    names_file.context("--dry-run needs --names or names_file in the config")
}

fn run_engine<S: RecordStore>(
    store: S,
    pool: NamePool,
    seed: Option<u64>,
    request: &GenerationRequest,
) -> Result<GenerationSummary> {
    let mut engine = Engine::new(store, pool, seeded_rng(seed));
    match engine.generate_and_persist(request) {
        Ok(summary) => Ok(summary),
        Err(err) => {
            if let Some(partial) = err.partial() {
                eprintln!(
                    "{} players were saved before the failure; {} still missing",
                    partial.total_inserted,
                    partial.shortfall(request.count)
                );
            }
            Err(err.into())
        }
    }
}

fn run_simulation(cfg: &RuntimeConfig, args: SimulateArgs) -> Result<()> {
    let pool = match args.names.as_deref().or(cfg.names_file.as_deref()) {
        Some(path) => load_name_file(path)?,
        None => {
            let store = connect(cfg)?;
            let pool = store.load()?;
            store.close();
            pool
        }
    };
    let sections = ReportSections::from_only_flags(
        args.only_height_position,
        args.only_overall,
        args.only_total,
    );
    let report = simulate(args.sim_count, &pool, &mut seeded_rng(args.seed), sections)?;
    if args.json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn seed_names(cfg: &RuntimeConfig, names: &Path) -> Result<()> {
    let pool = load_name_file(names)?;
    let store = connect(cfg)?;
    let written = store.seed_names(&pool)?;
    store.close();
    println!("Seeded {} names into {}", written, cfg.database_url);
    Ok(())
}

fn connect(cfg: &RuntimeConfig) -> Result<SqliteStore> {
    SqliteStore::connect(&cfg.database_url, cfg.identity_return)
        .with_context(|| format!("opening {}", cfg.database_url))
}
