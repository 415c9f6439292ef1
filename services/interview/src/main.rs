use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use interview_core::InterviewStep;
use interview_core::dedup::{DedupStore, InMemoryDedupStore, JsonFileDedupStore};
use interview_core::engine::InterviewEngine;
use interview_core::evaluation::ChannelEvaluationSink;
use interview_core::topic::{CandidateProfile, InMemoryProfileStore};
use interview_service::config::Config;
use interview_service::{app, evaluation_log, prompt_loader};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Runs technical interviews against an LLM question generator")]
struct Cli {
    /// Directory holding prompt overrides
    #[arg(long, default_value = "prompts")]
    prompts: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a candidate through their topic structure on stdin/stdout
    Interview {
        #[arg(long)]
        candidate_id: String,
        /// Profile JSON as written by resume extraction
        #[arg(long)]
        profile: PathBuf,
        /// Persist asked questions here instead of in memory
        #[arg(long)]
        dedup_file: Option<PathBuf>,
        /// Append answered questions here as JSON lines
        #[arg(long)]
        evaluation_log: Option<PathBuf>,
    },
    /// Free-form mock interview chat
    Chat {
        #[arg(long)]
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let cli = Cli::parse();

    // --- 2. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 3. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting interview service...");

    // --- 4. Load Prompts ---
    let prompts = prompt_loader::load_prompt_overrides(&cli.prompts)
        .context("Failed to load prompt overrides")?;

    match cli.command {
        Command::Interview {
            candidate_id,
            profile,
            dedup_file,
            evaluation_log,
        } => {
            let profiles = Arc::new(InMemoryProfileStore::new());
            profiles.insert(candidate_id.clone(), read_profile(&profile)?);

            let dedup: Arc<dyn DedupStore> = match dedup_file {
                Some(path) => Arc::new(JsonFileDedupStore::open(&path, config.dedup_ttl).await?),
                None => Arc::new(InMemoryDedupStore::new(config.dedup_ttl)),
            };

            let (evaluator, evaluation_rx) = ChannelEvaluationSink::channel(64);
            let drain = tokio::spawn(evaluation_log::drain_evaluations(
                evaluation_rx,
                evaluation_log,
            ));

            let engine = app::build_engine(&config, &prompts, profiles, dedup, Arc::new(evaluator));
            run_interview(&engine, &candidate_id).await?;

            // dropping the engine closes the evaluation channel
            drop(engine);
            let evaluated = drain.await.context("Evaluation task panicked")??;
            tracing::info!(evaluated, "Interview finished");
        }
        Command::Chat { session_id } => {
            let chat = app::build_chat(&config, &prompts);
            run_chat(&chat, &session_id).await?;
        }
    }

    Ok(())
}

fn read_profile(path: &Path) -> Result<CandidateProfile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid profile: {}", path.display()))
}

fn prompt_user() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

async fn run_interview(engine: &InterviewEngine, candidate_id: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut answer = String::new();

    loop {
        match app::next_step_with_retry(engine, candidate_id, &answer).await? {
            InterviewStep::Question(q) => {
                println!("\n[{} / {} / {}]\n{}", q.domain, q.topic, q.pattern, q.question);
            }
            InterviewStep::Completed => {
                engine.submit_final_answer(candidate_id, &answer).await?;
                println!("\nInterview completed!");
                return Ok(());
            }
        }

        prompt_user()?;
        match lines.next_line().await? {
            Some(line) => answer = line,
            None => {
                // stdin closed mid-interview
                return Ok(());
            }
        }
    }
}

async fn run_chat(chat: &interview_core::chat::InterviewChat, session_id: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt_user()?;
        let Some(message) = lines.next_line().await? else {
            return Ok(());
        };
        if message.trim().is_empty() {
            continue;
        }
        match chat.process_message(session_id, &message).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => tracing::error!("Chat failed: {e}"),
        }
    }
}
