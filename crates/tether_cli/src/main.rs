//! tether CLI - link agent sessions to change-graph nodes.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::process::ExitCode;
use tether_core::TetherError;

mod commands;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Session and change-graph linkage for coding agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new tether workspace
    Init,
    /// Start a session on a new change
    Start {
        /// Task description
        task: String,
    },
    /// Resume the session linked from a change
    Resume {
        /// Change id
        node: String,
    },
    /// Checkpoint the active session onto a new child change
    Continue {
        /// Description for the new change (defaults to the session task)
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Append a turn to the active session
    Turn {
        /// Speaker (user, assistant, system, tool)
        #[arg(short, long, default_value = "user")]
        role: String,
        /// Turn content, or '-' to read stdin
        content: String,
    },
    /// Print a session transcript
    Log {
        /// First turn index to show
        #[arg(long)]
        from: Option<u64>,
        /// Stop before this turn index
        #[arg(long)]
        to: Option<u64>,
        /// Session id (defaults to the active session)
        #[arg(long)]
        session: Option<String>,
    },
    /// Search a session transcript
    Search {
        /// Text to look for
        query: String,
        /// Only match turns from this role
        #[arg(long)]
        role: Option<String>,
        /// Session id (defaults to the active session)
        #[arg(long)]
        session: Option<String>,
    },
    /// Show context from ancestor changes
    Ancestor {
        /// Change to start from (defaults to the active change)
        #[arg(long)]
        node: Option<String>,
        /// Hops to walk (defaults to resolver.default_depth)
        #[arg(long)]
        depth: Option<usize>,
        /// Slices to fetch (comma-separated: description, diff, transcript, all)
        #[arg(long, default_value = "description")]
        include: String,
        /// Only include transcript turns containing this text
        #[arg(long)]
        grep: Option<String>,
        /// Only include transcript turns from this role
        #[arg(long)]
        role: Option<String>,
        /// Only include the last N matching turns per change
        #[arg(long)]
        last: Option<usize>,
        /// Output format (json, text)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Replace a change's summary, keeping its session link
    Describe {
        /// New summary
        summary: String,
        /// Change to describe (defaults to the active change)
        #[arg(long)]
        node: Option<String>,
    },
    /// Show the active session and all known sessions
    Status,
    /// Mark a session non-resumable
    Retire {
        /// Session id
        session: String,
    },
}

fn main() -> ExitCode {
    // Respects RUST_LOG (e.g. RUST_LOG=tether_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Init => commands::init::run(),
        Commands::Start { task } => commands::session::start(&task),
        Commands::Resume { node } => commands::session::resume(&node),
        Commands::Continue { message } => commands::session::continue_session(message.as_deref()),
        Commands::Turn { role, content } => commands::transcript::turn(&role, &content),
        Commands::Log { from, to, session } => {
            commands::transcript::log(session.as_deref(), from, to)
        }
        Commands::Search {
            query,
            role,
            session,
        } => commands::transcript::search(&query, role.as_deref(), session.as_deref()),
        Commands::Ancestor {
            node,
            depth,
            include,
            grep,
            role,
            last,
            format,
        } => commands::ancestor::run(commands::ancestor::AncestorArgs {
            node: node.as_deref(),
            depth,
            include: &include,
            grep: grep.as_deref(),
            role: role.as_deref(),
            last,
            format: &format,
        }),
        Commands::Describe { summary, node } => commands::describe::run(&summary, node.as_deref()),
        Commands::Status => commands::session::status(),
        Commands::Retire { session } => commands::session::retire(&session),
    }
}

fn report(err: &anyhow::Error) {
    eprintln!("{} {:#}", style("error:").red().bold(), err);
    if let Some(hint) = err
        .downcast_ref::<TetherError>()
        .and_then(TetherError::recovery_suggestion)
    {
        eprintln!("  {} {}", style("hint:").cyan(), hint);
    }
}
