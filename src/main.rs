use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use medcollate::analysis::ProviderChain;
use medcollate::config::{self, Config};
use medcollate::db::sqlite::open_database;
use medcollate::extraction::LopdfExtractor;
use medcollate::mail::DirectoryMailSource;
use medcollate::pipeline::processor::EmailProcessor;

#[derive(Parser)]
#[command(name = "medcollate", version, about = "Medical report email collation service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch recent inbox messages and process their PDF reports
    Process {
        /// Maximum number of messages to pull this run
        #[arg(long)]
        max_emails: Option<usize>,
        /// Inbox drop folder with message manifests
        #[arg(long)]
        inbox: Option<PathBuf>,
    },
    /// Retry analysis for records still flagged as pending
    AnalyzePending,
    /// Create the database and run migrations, then exit
    InitDb,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cli = Cli::parse();
    let cfg = Config::from_env();

    match run(cli.command, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = cfg.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match command {
        Command::Process { max_emails, inbox } => {
            let conn = open_database(&cfg.database_path)?;
            let chain = warn_if_empty(cfg.build_provider_chain());
            let mut processor = EmailProcessor::new(
                conn,
                Box::new(LopdfExtractor::new(cfg.max_pdf_size_mb)),
                chain,
            );

            let inbox_dir = inbox.unwrap_or_else(|| cfg.inbox_dir.clone());
            std::fs::create_dir_all(&inbox_dir)?;
            let mut source = DirectoryMailSource::new(inbox_dir);

            processor.process_batch(&mut source, max_emails.unwrap_or(cfg.max_emails))?;
            let swept = processor.process_pending_analyses()?;
            if swept > 0 {
                tracing::info!(swept, "Completed pending analyses");
            }
        }
        Command::AnalyzePending => {
            let conn = open_database(&cfg.database_path)?;
            let chain = warn_if_empty(cfg.build_provider_chain());
            let mut processor = EmailProcessor::new(
                conn,
                Box::new(LopdfExtractor::new(cfg.max_pdf_size_mb)),
                chain,
            );
            let swept = processor.process_pending_analyses()?;
            tracing::info!(swept, "Pending-analysis sweep finished");
        }
        Command::InitDb => {
            open_database(&cfg.database_path)?;
            tracing::info!(path = %cfg.database_path.display(), "Database initialized");
        }
    }
    Ok(())
}

fn warn_if_empty(chain: ProviderChain) -> ProviderChain {
    if chain.is_empty() {
        tracing::warn!("No LLM provider configured; complete records will stay pending");
    }
    chain
}
