//! Imprint CLI: ingest images, run the training simulation and chat.
//!
//! Set IMPRINT_API_URL (or API_URL) to upload batches to an ingestion
//! endpoint; without it the session runs in preview-only mode.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use imprint_cli::{format_record_line, init_tracing, load_candidates};
use imprint_core::models::{FileId, Role};
use imprint_core::{SendOutcome, SendRejection, SessionConfig, StartOutcome};
use imprint_session::{IngestReport, Session};

#[derive(Parser)]
#[command(name = "imprint", about = "Train a chat session on your images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, preview and upload images, then print the resulting records
    Ingest {
        /// Image files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ingest images, train on them and start an interactive chat
    Chat {
        /// Image files to train on
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn ingest(session: &Session, files: &[PathBuf]) -> anyhow::Result<IngestReport> {
    let candidates = load_candidates(files).await?;
    Ok(session.add_files(candidates).await)
}

/// Print messages appended since `shown`, returning the new count.
async fn print_new_messages(session: &Session, shown: usize) -> usize {
    let messages = session.messages().await;
    for message in messages.iter().skip(shown) {
        match message.role {
            Role::System => println!("[system] {}", message.content),
            Role::User => {}
            Role::Assistant => println!("assistant> {}", message.content),
        }
    }
    messages.len()
}

async fn train(session: &Session) -> anyhow::Result<()> {
    let run = match session.start_training().await {
        StartOutcome::Started(run) => run,
        StartOutcome::NothingToTrain => anyhow::bail!("No usable images to train on"),
        StartOutcome::AlreadyRunning | StartOutcome::AlreadyDone => return Ok(()),
    };

    let mut progress = session.subscribe_progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = *progress.borrow_and_update();
            print!("\rTraining... {:>3}%", snapshot.percent);
            let _ = std::io::stdout().flush();
            if snapshot.is_ready {
                break;
            }
        }
        println!();
    });

    run.completed().await.context("Training run aborted")?;
    let _ = printer.await;
    Ok(())
}

async fn chat(session: &Session, files: &[PathBuf]) -> anyhow::Result<()> {
    let report = ingest(session, files).await?;
    for rejection in report.rejection_messages() {
        eprintln!("skipped {}", rejection);
    }
    for failure in &report.decode_failures {
        eprintln!("failed {}: {}", failure.name, failure.reason);
    }
    let mut shown = print_new_messages(session, 0).await;

    train(session).await?;
    shown = print_new_messages(session, shown).await;
    println!("Type a message, /files, /remove <id> or /quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" => break,
            "/files" => {
                for record in session.records().await {
                    println!("{}", format_record_line(&record));
                }
                continue;
            }
            command if command.starts_with("/remove") => {
                let arg = command.trim_start_matches("/remove").trim();
                match arg.parse::<FileId>() {
                    Ok(id) => match session.remove_file(id).await {
                        Some(record) => println!("removed {}", record.name),
                        None => println!("no file with id {}", id),
                    },
                    Err(_) => println!("usage: /remove <id>"),
                }
                continue;
            }
            _ => {}
        }

        match session.send(line).await {
            SendOutcome::Accepted(pending) => {
                println!("assistant is typing...");
                pending.wait().await;
                // user messages are echoed by the terminal already
                shown = print_new_messages(session, shown).await;
            }
            SendOutcome::Rejected(SendRejection::EmptyInput) => {}
            SendOutcome::Rejected(SendRejection::GateClosed) => {
                println!("The model is not ready yet.");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = SessionConfig::from_env().context("Invalid configuration")?;
    let session = Session::from_config(config).context("Failed to create session")?;

    match cli.command {
        Commands::Ingest { files } => {
            let report = ingest(&session, &files).await?;
            tracing::info!(
                accepted = report.accepted.len(),
                rejected = report.rejected.len(),
                "Ingestion finished"
            );
            print_json(&json!({
                "outcome": report.outcome,
                "records": session.records().await,
                "rejected": report.rejection_messages(),
                "decode_failures": report.decode_failures,
                "messages": session.messages().await,
            }))?;
        }
        Commands::Chat { files } => chat(&session, &files).await?,
    }

    Ok(())
}
