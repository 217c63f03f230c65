//! # Agentic RAG Research Assistant
//!
//! Answers questions about your own documents with a local LLM (via Ollama).
//!
//! For every question the assistant:
//! 1. Plans a few focused search subtasks
//! 2. Runs hybrid (embedding + keyword) search over the ingested corpus
//! 3. Summarizes what it found and judges whether that is enough
//! 4. Loops back with follow-up searches, or streams the final answer
//!
//! ## Quick Start
//! ```bash
//! cargo run -- ingest ./docs
//! cargo run -- ask "How does the retry policy work?"
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Configuration management
mod config;

/// Ollama wiring, corpus persistence and engine construction
mod agent;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rig_agentic_rag::{event_channel, EventReceiver, NodeContext, RagState, WorkflowEvent};

use crate::agent::RagAssistant;
use crate::config::AppConfig;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "rag-research-agent",
    version,
    about = "An agentic RAG assistant that plans, searches your documents, judges sufficiency and answers",
    long_about = r#"
Agentic RAG Research Assistant

Index your notes and documents once, then ask questions about them. Each
question is broken into search subtasks, answered from the retrieved text,
and checked for sufficiency before the final answer is streamed.

PREREQUISITES:
  1. Install Ollama: https://ollama.ai
  2. Pull a chat and an embedding model:
       ollama pull gpt-oss:20b
       ollama pull nomic-embed-text
  3. Start Ollama: ollama serve

EXAMPLES:
  # Index a directory of .md / .txt files
  rag-research-agent ingest ./docs

  # Ask a question (prints a thread id you can continue)
  rag-research-agent ask "What does the loop bound guarantee?"

  # Continue a conversation
  rag-research-agent ask --thread 6f1c... "And what happens after it is reached?"
"#
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// The Ollama chat model to use (overrides OLLAMA_MODEL env var)
    #[arg(short = 'm', long = "model", global = true, help = "Ollama model to use")]
    model: Option<String>,

    /// Verbose output (debug logging)
    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        help = "Enable verbose/debug logging",
        default_value = "false"
    )]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index files or directories into the corpus
    Ingest {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Ask a question about the ingested documents
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Conversation thread to continue (a new one is created if omitted)
        #[arg(short = 't', long = "thread")]
        thread: Option<String>,

        /// Hide the thinking log
        #[arg(short = 'q', long = "quiet", default_value = "false")]
        quiet: bool,
    },

    /// Finish an interrupted run on a thread
    Resume {
        #[arg(value_name = "THREAD")]
        thread: String,
    },
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = AppConfig::from_env()?;
    if let Some(model) = args.model {
        info!(model = %model, "Using model from command line");
        config.model = model;
    }
    config.validate()?;

    info!(
        model = %config.model,
        embedding_model = %config.embedding_model,
        data_dir = %config.data_dir.display(),
        "Configuration loaded"
    );

    let assistant = RagAssistant::new(config);

    let result = match args.command {
        Command::Ingest { paths } => run_ingest(&assistant, &paths).await,
        Command::Ask {
            question,
            thread,
            quiet,
        } => {
            let thread = thread.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            run_ask(&assistant, &thread, &question, quiet).await
        }
        Command::Resume { thread } => run_resume(&assistant, &thread).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
        eprintln!("\n❌ {:#}", e);

        let message = e.to_string();
        if message.contains("connection refused") || message.contains("error sending request") {
            eprintln!("\n💡 Tip: Make sure Ollama is running:");
            eprintln!("   ollama serve");
        } else if message.contains("model") {
            eprintln!("\n💡 Tip: Make sure the models are installed:");
            eprintln!("   ollama pull {}", assistant.config().model);
            eprintln!("   ollama pull {}", assistant.config().embedding_model);
        }
    }

    result
}

// =============================================================================
// COMMANDS
// =============================================================================
async fn run_ingest(assistant: &RagAssistant, paths: &[PathBuf]) -> Result<()> {
    let indexed = assistant.ingest(paths).await?;
    println!(
        "Indexed {} chunk(s) into {}",
        indexed,
        assistant.config().corpus_path().display()
    );
    Ok(())
}

async fn run_ask(assistant: &RagAssistant, thread: &str, question: &str, quiet: bool) -> Result<()> {
    let engine = assistant.engine().await?;

    let (tx, rx) = event_channel();
    let printer = tokio::spawn(print_events(rx, quiet));

    let state = engine
        .ask_with_context(thread, question, &NodeContext::with_events(tx))
        .await
        .context("Failed to run the workflow")?;

    let streamed = printer.await.unwrap_or_default();
    finish(&state, &streamed);
    eprintln!("\n(thread: {})", thread);
    Ok(())
}

async fn run_resume(assistant: &RagAssistant, thread: &str) -> Result<()> {
    let engine = assistant.engine().await?;

    let (tx, rx) = event_channel();
    let printer = tokio::spawn(print_events(rx, false));

    let state = engine
        .resume_with_context(thread, &NodeContext::with_events(tx))
        .await
        .with_context(|| format!("Failed to resume thread {}", thread))?;

    let streamed = printer.await.unwrap_or_default();
    finish(&state, &streamed);
    Ok(())
}

/// Print the answer unless it was already streamed verbatim
fn finish(state: &RagState, streamed: &str) {
    if streamed != state.answer {
        if !streamed.is_empty() {
            println!("\n");
        }
        println!("{}", state.answer);
    } else {
        println!();
    }
}

/// Show the thinking log on stderr and stream answer fragments to stdout.
///
/// Returns the streamed answer text once the engine drops its sender.
async fn print_events(mut rx: EventReceiver, quiet: bool) -> String {
    let mut streamed = String::new();
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            WorkflowEvent::AnswerDelta { text } => {
                if streamed.is_empty() && !quiet {
                    eprintln!();
                }
                print!("{}", text);
                let _ = stdout.flush();
                streamed.push_str(&text);
            }
            WorkflowEvent::Finished { .. } => {}
            other if !quiet => eprintln!("💭 {}", other),
            _ => {}
        }
    }

    streamed
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug for the
/// assistant and the workflow library, and warnings only by default so the
/// thinking log stays readable.
fn init_logging(verbose: bool) -> Result<()> {
    let default_directives = if verbose {
        "rag_research_agent=debug,rig_agentic_rag=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
