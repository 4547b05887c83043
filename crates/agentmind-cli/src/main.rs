//! AgentMind CLI entry point.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use agentmind::{InstinctFilter, InstinctStatus, LocalStorage};
use agentmind_cli::commands;
use agentmind_cli::config::{options_from_env, resolve_root};

#[derive(Parser)]
#[command(
    name = "agentmind",
    about = "AgentMind: learn instincts from observed agent behavior",
    version
)]
struct Cli {
    /// Store root directory (defaults to AGENTMIND_ROOT, then CLAUDE_PLUGIN_ROOT, then cwd).
    #[arg(short, long, global = true)]
    root: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect patterns in a day of observations and merge them into the store.
    Analyze {
        /// Observation day (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Only analyze observations from this session.
        #[arg(long)]
        session: Option<String>,

        /// Mark the run as the final analysis of the session.
        #[arg(long = "final")]
        is_final: bool,
    },

    /// Append observation JSON lines read from stdin.
    Observe,

    /// Print store statistics.
    Stats,

    /// List instincts, highest confidence first.
    List {
        #[arg(long)]
        status: Option<InstinctStatus>,

        #[arg(long)]
        domain: Option<String>,

        #[arg(long)]
        min_confidence: Option<f64>,
    },

    /// Show recent analysis sessions, most recent first.
    Sessions {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Approve or reject an instinct.
    #[command(group(ArgGroup::new("verdict").required(true).args(["approve", "reject"])))]
    Feedback {
        id: String,

        #[arg(long)]
        approve: bool,

        #[arg(long)]
        reject: bool,

        /// Size of the adjustment (0.1 to 0.5).
        #[arg(long)]
        strength: Option<f64>,
    },

    /// Record that an instinct was applied.
    #[command(group(ArgGroup::new("outcome").required(true).args(["success", "failure"])))]
    Apply {
        id: String,

        #[arg(long)]
        success: bool,

        #[arg(long)]
        failure: bool,
    },

    /// Decay instincts that have not been seen recently.
    Decay {
        /// Weekly decay rate for the frequency dimension.
        #[arg(long)]
        rate: Option<f64>,
    },

    /// Select the instincts worth surfacing at session start.
    Context,

    /// Show instincts ready to be grouped into patterns.
    Evolve,

    /// Export instincts, patterns, and strategies.
    Export {
        /// Write the bundle to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a bundle produced by `export`.
    Import { file: PathBuf },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   agentmind completions bash > ~/.local/share/bash-completion/completions/agentmind
    ///   agentmind completions zsh > ~/.zfunc/_agentmind
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "agentmind", &mut std::io::stdout());
        return Ok(());
    }

    let root = resolve_root(cli.root.as_deref());
    let storage = LocalStorage::open(&root)
        .with_context(|| format!("failed to open store at {}", root.display()))?;
    let options = options_from_env();
    tracing::debug!("Store root: {}", root.display());

    let output = match cli.command {
        Commands::Analyze {
            date,
            session,
            is_final,
        } => commands::analyze(&storage, date, session.as_deref(), is_final, &options)?,
        Commands::Observe => commands::observe(&storage, std::io::stdin().lock())?,
        Commands::Stats => commands::stats(&storage)?,
        Commands::List {
            status,
            domain,
            min_confidence,
        } => {
            let filter = InstinctFilter {
                status,
                domain,
                min_confidence,
            };
            commands::list(&storage, &filter)?
        }
        Commands::Sessions { limit } => commands::sessions(&storage, limit)?,
        Commands::Feedback {
            id,
            approve,
            reject: _,
            strength,
        } => commands::feedback(
            &storage,
            &id,
            approve,
            strength.unwrap_or(options.feedback_strength),
        )?,
        Commands::Apply {
            id,
            success,
            failure: _,
        } => commands::apply(&storage, &id, success)?,
        Commands::Decay { rate } => commands::decay(&storage, rate.unwrap_or(options.decay_rate))?,
        Commands::Context => commands::context(&storage)?,
        Commands::Evolve => commands::evolve(&storage)?,
        Commands::Export { output } => commands::export(&storage, output.as_deref())?,
        Commands::Import { file } => commands::import(&storage, &file)?,
        Commands::Completions { .. } => return Ok(()),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
