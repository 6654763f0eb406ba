//! `engram` — command-line facade over the episodic memory store.
//!
//! Thin: every subcommand builds an `EngramConfig`, opens an
//! `AgentMemory` over `LocalStorage`, calls one method, and prints.
//! Exit codes follow spec: 0 success, 1 hard error, 2 not-found.

use clap::{Parser, Subcommand};
use engram::{AgentMemory, EngramConfig, EpisodeType, RememberOptions, SearchOptions};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "engram", version, about = "Episodic memory store for autonomous agents")]
struct Cli {
    /// Base directory for the store.
    #[arg(long, global = true, default_value = "./engram-store")]
    store: String,

    /// Agent id new episodes are written under.
    #[arg(long, global = true, default_value = "cli")]
    agent: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a new episode (chunked if long).
    Remember {
        text: String,
        #[arg(long, default_value = "fact")]
        r#type: String,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, default_value_t = 0.5)]
        importance: f32,
        #[arg(long, value_delimiter = ',')]
        supersedes: Vec<String>,
    },
    /// BM25 + recency/importance search.
    Recall {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        r#type: Option<String>,
        #[arg(long)]
        include_superseded: bool,
    },
    /// Most recently created episodes.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Natural-language temporal query, optionally with remaining search text.
    Temporal { query: String },
    /// Build a context block for the given query under a token budget.
    Context {
        query: String,
        #[arg(long, default_value_t = 500)]
        max_tokens: usize,
    },
    /// Fast relevant+recent context injection (no per-hit hydration bookkeeping).
    Inject {
        query: String,
        #[arg(long, default_value_t = 500)]
        max_tokens: usize,
        #[arg(long, value_delimiter = ',')]
        exclude_tags: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        priority_tags: Vec<String>,
    },
    /// Store-wide counters.
    Stats,
    /// Forget low-value/stale episodes per the configured retention policy.
    Prune,
    /// Delete one episode by id.
    Forget { id: String },
    /// Walk a supersession chain back to its root.
    Chain { id: String },
    /// Emit one summary episode covering the last N hours.
    HourlySummary {
        #[arg(long, default_value_t = 24.0)]
        hours: f64,
        #[arg(long)]
        supersede_sources: bool,
    },
    /// Take a Merkle snapshot of the whole store.
    Snapshot,
    /// Verify the store's current Merkle root matches an expected value.
    Verify {
        #[arg(long)]
        root: String,
    },
}

fn build_config(store: &str, agent: &str) -> EngramConfig {
    let mut config = EngramConfig::new(store, agent);
    if let Ok(path) = std::env::var("ENGRAM_SYNONYMS") {
        config = config.with_synonym_file(path);
    }
    if std::env::var("ENGRAM_KEY").is_ok() {
        config = config.with_env_key("ENGRAM_KEY");
    }
    config
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli.store, &cli.agent);
    let mut memory = AgentMemory::with_local_storage(config);

    match run(&mut memory, cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(memory: &mut AgentMemory, command: Command) -> engram::Result<ExitCode> {
    match command {
        Command::Remember { text, r#type, tags, importance, supersedes } => {
            let mut opts = RememberOptions::new()
                .episode_type(EpisodeType::from(r#type.as_str()))
                .tags(tags)
                .importance(importance);
            if !supersedes.is_empty() {
                opts = opts.supersedes(supersedes);
            }
            let saved = memory.remember(&text, opts)?;
            for ep in &saved {
                println!("{}", ep.id);
            }
            Ok(ExitCode::from(0))
        }
        Command::Recall { query, limit, tags, r#type, include_superseded } => {
            let opts = SearchOptions { tags, episode_type: r#type, include_superseded, limit, ..SearchOptions::default() };
            let hits = memory.recall(&query, &opts)?;
            print_hits(&hits);
            Ok(ExitCode::from(0))
        }
        Command::Recent { limit } => {
            let hits = memory.recent(limit)?;
            print_hits(&hits);
            Ok(ExitCode::from(0))
        }
        Command::Temporal { query } => {
            let hits = memory.temporal(&query)?;
            print_hits(&hits);
            Ok(ExitCode::from(0))
        }
        Command::Context { query, max_tokens } => {
            let text = memory.build_context(&query, max_tokens)?;
            println!("{text}");
            Ok(ExitCode::from(0))
        }
        Command::Inject { query, max_tokens, exclude_tags, priority_tags } => {
            let opts = engram::InjectOptions { max_tokens, exclude_tags, priority_tags };
            let text = memory.inject_context(&query, &opts)?;
            println!("{text}");
            Ok(ExitCode::from(0))
        }
        Command::Stats => {
            let stats = memory.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
            Ok(ExitCode::from(0))
        }
        Command::Prune => {
            let pruned = memory.prune()?;
            println!("pruned {pruned} episode(s)");
            Ok(ExitCode::from(0))
        }
        Command::Forget { id } => {
            if memory.forget(&id)? {
                println!("forgot {id}");
                Ok(ExitCode::from(0))
            } else {
                eprintln!("not found: {id}");
                Ok(ExitCode::from(2))
            }
        }
        Command::Chain { id } => {
            let chain = memory.chain(&id)?;
            if chain.is_empty() {
                eprintln!("not found: {id}");
                return Ok(ExitCode::from(2));
            }
            for link in chain {
                println!("{link}");
            }
            Ok(ExitCode::from(0))
        }
        Command::HourlySummary { hours, supersede_sources } => {
            let summary = memory.hourly_summary(hours, supersede_sources)?;
            println!("{}", summary.id);
            Ok(ExitCode::from(0))
        }
        Command::Snapshot => {
            let snapshot = memory.snapshot()?;
            println!("{}", serde_json::to_string_pretty(&snapshot).unwrap_or_default());
            Ok(ExitCode::from(0))
        }
        Command::Verify { root } => {
            if memory.verify_root(&root)? {
                println!("ok");
                Ok(ExitCode::from(0))
            } else {
                eprintln!("root mismatch");
                Ok(ExitCode::from(1))
            }
        }
    }
}

fn print_hits(hits: &[engram::RecalledEpisode]) {
    for hit in hits {
        println!(
            "[{:.3}] {} ({}) {}",
            hit.score,
            hit.episode.id,
            hit.episode.episode_type,
            hit.episode.text
        );
    }
}
