//! Promptsmith CLI: the main entry point.
//!
//! Commands:
//! - `init`: Write the default config file
//! - `refine`: Run one refinement session in the terminal
//! - `serve`: Start the HTTP gateway
//! - `sessions`: List stored sessions
//! - `report`: Print the final report of a stored session
//! - `doctor`: Diagnose configuration, backends and storage

use clap::{Parser, Subcommand};
use promptsmith_core::session::{BackendKind, EnhancerKind, EvaluationMode, SessionStatus};

mod commands;

#[derive(Parser)]
#[command(
    name = "promptsmith",
    about = "Promptsmith — iterative prompt refinement",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Refine a prompt and print the session as it runs
    Refine {
        /// The prompt to refine
        prompt: String,

        /// Maximum refinement iterations (1-10)
        #[arg(short = 'n', long, default_value_t = 3)]
        max_iterations: u32,

        /// Enhancer: rule_based, llm_assisted or architect
        #[arg(short, long, default_value = "rule_based")]
        enhancer: EnhancerKind,

        /// Model backend: gemini, openai or offline (defaults to the configured backend)
        #[arg(short, long)]
        backend: Option<BackendKind>,

        /// Evaluation mode: basic or llm_assisted
        #[arg(long, default_value = "basic")]
        evaluation: EvaluationMode,

        /// Validate architect output with the self-correction loop
        #[arg(long)]
        self_correct: bool,

        /// Print every event as one JSON line
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List stored sessions, newest first
    Sessions {
        /// Only sessions with this status
        #[arg(short, long)]
        status: Option<SessionStatus>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the final report of a stored session
    Report {
        session_id: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration, backends and storage
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Refine {
            prompt,
            max_iterations,
            enhancer,
            backend,
            evaluation,
            self_correct,
            json,
        } => {
            let options = commands::refine::RefineOptions {
                max_iterations,
                enhancer,
                backend,
                evaluation,
                self_correct,
                json,
            };
            commands::refine::run(prompt, options).await?
        }
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Sessions { status, limit } => commands::sessions::run(status, limit).await?,
        Commands::Report { session_id, json } => commands::report::run(session_id, json).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refine_flags_parse_into_kinds() {
        let cli = Cli::try_parse_from([
            "promptsmith",
            "refine",
            "Explain monads simply",
            "-n",
            "5",
            "--enhancer",
            "architect",
            "--backend",
            "mock",
            "--self-correct",
        ])
        .unwrap();

        match cli.command {
            Commands::Refine {
                max_iterations,
                enhancer,
                backend,
                self_correct,
                evaluation,
                ..
            } => {
                assert_eq!(max_iterations, 5);
                assert_eq!(enhancer, EnhancerKind::Architect);
                assert_eq!(backend, Some(BackendKind::Offline));
                assert_eq!(evaluation, EvaluationMode::Basic);
                assert!(self_correct);
            }
            _ => panic!("expected refine"),
        }
    }

    #[test]
    fn unknown_enhancer_is_rejected() {
        let result = Cli::try_parse_from(["promptsmith", "refine", "Explain monads", "-e", "magic"]);
        assert!(result.is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["promptsmith", "sessions", "--status", "failed", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Sessions {
                status: Some(SessionStatus::Failed),
                limit: 20
            }
        ));
    }
}
