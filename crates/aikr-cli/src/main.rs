use std::path::{Path, PathBuf};
use std::sync::Arc;

use aikr_core::{
    AtomStore, Budget, Deliberation, DeliberationOutcome, Memory, MemoryConfig, ReflexiveCycle,
    RuleRegistry, Sentence, Stamp, TermOverlap, parse_lines, parse_statement, parse_term,
};
use aikr_store::{Store, load_config_or_default};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aikr", about = "Attention-bounded non-axiomatic reasoner")]
struct Cli {
    /// TOML file with memory configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse statement files and submit every statement
    Ingest {
        /// File path(s) to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run reflexive cycles over the stored memory
    Run {
        #[arg(long, default_value_t = 100)]
        cycles: u32,

        /// Override the configured RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Deliberate on a statement and print the solution
    Ask {
        /// Statement, e.g. "<cat --> animal>?"
        statement: String,

        /// Override the configured deliberation budget
        #[arg(long)]
        budget: Option<u32>,
    },

    /// List beliefs, optionally only those held by one term's concept
    Beliefs {
        #[arg(long)]
        term: Option<String>,
    },

    /// Show memory statistics
    Stats,

    /// Export state to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Import state from a JSON file
    Import {
        /// Input file path
        path: PathBuf,
    },
}

fn data_dir() -> PathBuf {
    std::env::var("AIKR_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".aikr")))
        .unwrap_or_else(|| PathBuf::from(".aikr"))
}

fn open_store() -> Result<Store> {
    let dir = data_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data dir {}", dir.display()))?;
    Store::open(&dir.join("memory.db")).context("failed to open memory store")
}

fn load_config(cli: &Cli) -> Result<MemoryConfig> {
    load_config_or_default(cli.config.as_deref()).context("failed to load config")
}

fn load_memory(store: &Store, config: MemoryConfig) -> Result<Memory> {
    let mut memory =
        Memory::new(config, Arc::new(AtomStore::new())).context("invalid memory configuration")?;
    store
        .load_into(&mut memory)
        .context("failed to load memory")?;
    Ok(memory)
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Ingest { files } => cmd_ingest(&cli, files),
        Commands::Run { cycles, seed } => cmd_run(&cli, *cycles, *seed),
        Commands::Ask { statement, budget } => cmd_ask(&cli, statement, *budget),
        Commands::Beliefs { term } => cmd_beliefs(&cli, term.as_deref()),
        Commands::Stats => cmd_stats(&cli),
        Commands::Export { path } => cmd_export(path),
        Commands::Import { path } => cmd_import(path),
    }
}

fn cmd_ingest(cli: &Cli, files: &[PathBuf]) -> Result<()> {
    let store = open_store()?;
    let mut memory = load_memory(&store, load_config(cli)?)?;

    let mut total = 0usize;
    for path in files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut accepted = 0usize;
        let mut rejected = 0usize;
        for (line, parsed) in parse_lines(&text) {
            let result = parsed.map_err(anyhow::Error::from).and_then(|s| {
                memory
                    .submit_term(&s.term, s.punctuation, s.truth, None)
                    .map_err(anyhow::Error::from)
            });
            match result {
                Ok(_) => accepted += 1,
                Err(e) => {
                    rejected += 1;
                    eprintln!("{}:{line}: {e}", path.display());
                }
            }
        }
        println!(
            "ingested {} → {} statements, {} rejected",
            path.display(),
            accepted,
            rejected
        );
        total += accepted;
    }

    store.save_memory(&memory).context("failed to save memory")?;
    println!("done. statements={}, concepts={}", total, memory.concept_count());
    Ok(())
}

fn cmd_run(cli: &Cli, cycles: u32, seed: Option<u64>) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(seed) = seed {
        config.seed = seed;
    }
    let store = open_store()?;
    let mut memory = load_memory(&store, config)?;

    let registry = RuleRegistry::with_syllogisms(memory.store());
    let summary = ReflexiveCycle::new(&registry).run(&mut memory, cycles);
    store.save_memory(&memory).context("failed to save memory")?;

    let metrics = memory.metrics();
    println!("completed:  {}", summary.completed);
    println!("aborted:    {}", summary.aborted);
    println!("derived:    {}", summary.derived);
    println!("redundant:  {}", metrics.redundant_derivations_avoided);
    println!("faults:     {}", metrics.evaluator_faults);
    println!("forgotten:  {}", metrics.concepts_forgotten);
    println!("tick:       {}", memory.tick());
    Ok(())
}

fn cmd_ask(cli: &Cli, statement: &str, budget: Option<u32>) -> Result<()> {
    let store = open_store()?;
    let mut memory = load_memory(&store, load_config(cli)?)?;

    let parsed = parse_statement(statement).context("failed to parse statement")?;
    let mut goal = Sentence {
        atom: memory.store().intern_term(&parsed.term),
        punctuation: parsed.punctuation,
        truth: parsed.truth,
        budget: Budget::clamped(0.0, 0.0, 0.0),
        stamp: Stamp::fresh(memory.tick()),
    };
    goal.budget = memory.strategy().initial_budget(&goal);

    let registry = RuleRegistry::with_syllogisms(memory.store());
    let relevance = TermOverlap::default();
    let budget = budget.unwrap_or(memory.config().deliberation_budget);
    let outcome = Deliberation::new(&registry, &relevance, budget).run(&mut memory, &goal);
    store.save_memory(&memory).context("failed to save memory")?;

    match outcome {
        DeliberationOutcome::Resolved { solution, cycles } => {
            let truth = solution
                .truth
                .map(|t| t.to_string())
                .unwrap_or_default();
            println!(
                "{} {truth} (after {cycles} cycles)",
                memory.store().display(solution.atom)
            );
        }
        DeliberationOutcome::Abandoned { cycles } => {
            println!("no solution (after {cycles} cycles)");
        }
    }
    Ok(())
}

fn cmd_beliefs(cli: &Cli, term: Option<&str>) -> Result<()> {
    let store = open_store()?;
    let memory = load_memory(&store, load_config(cli)?)?;

    let beliefs = match term {
        Some(text) => {
            let term = parse_term(text).context("failed to parse term")?;
            let atom = memory.store().intern_term(&term);
            memory.beliefs_about(atom)
        }
        None => memory.beliefs(),
    };

    if beliefs.is_empty() {
        println!("(no beliefs)");
        return Ok(());
    }
    for belief in beliefs {
        let Some(truth) = belief.truth else {
            bail!("belief without truth value in stored memory");
        };
        println!("{}. {truth}", memory.store().display(belief.atom));
    }
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let store = open_store()?;
    let memory = load_memory(&store, load_config(cli)?)?;
    let stats = memory.stats();

    println!("tick:       {}", stats.tick);
    println!("concepts:   {}", stats.concepts);
    println!("tasks:      {}", stats.tasks);
    println!("beliefs:    {}", stats.beliefs);
    println!("atoms:      {}", stats.atoms);
    Ok(())
}

fn cmd_export(path: &Path) -> Result<()> {
    let store = open_store()?;
    store
        .export_json_file(path)
        .context("failed to export JSON")?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(path: &Path) -> Result<()> {
    let store = open_store()?;
    store
        .import_json_file(path)
        .context("failed to import JSON")?;
    println!(
        "imported from {}. concepts={}",
        path.display(),
        store.concept_count().context("failed to count concepts")?
    );
    Ok(())
}
