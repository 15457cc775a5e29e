use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use haro_assist::channels::{EmailConfig, ImapMailbox};
use haro_assist::config::AppConfig;
use haro_assist::llm::create_provider;
use haro_assist::logging;
use haro_assist::pipeline::{
    DigestFilter, DigestProcessor, KeywordTables, OutcomeStatus, extract_queries,
};
use haro_assist::pitch::{Persona, PitchGenerator};
use haro_assist::store::{FanoutLog, LibSqlOutcomeLog, SheetsConfig, SheetsOutcomeLog};

/// Answers journalist-query digest emails with LLM-drafted pitches.
#[derive(Parser, Debug)]
#[command(name = "haro-assist", version, about)]
#[command(long_about = r#"
Fetches the newest unread digest email, keeps the queries that match the
configured topics, drafts a pitch for each and sends it to that query's
own reply-to address. Outcomes are logged to Google Sheets and/or libSQL.

Configuration comes from environment variables (a .env file is loaded
first). Without a subcommand, `run` is assumed.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one digest, then exit
    Run {
        /// Ignore HARO_RUN_WINDOWS
        #[arg(long)]
        force: bool,
    },
    /// Run on the HARO_WATCH_CRON schedule inside the configured windows
    Watch,
    /// Parse a digest body from a file ("-" for stdin) and print queries as JSON
    Parse {
        path: PathBuf,
        /// Print every extracted query, not only the relevant ones
        #[arg(long)]
        all: bool,
    },
    /// Print recent outcomes from the HARO_DB_PATH pitch log as JSON
    History {
        /// Number of rows to show, newest first
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    // Install rustls crypto provider before any TLS usage. Err means one is
    // already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Run { force: false }) {
        Command::Parse { path, all } => {
            logging::init_cli();
            parse_command(&config, &path, all)
        }
        Command::History { limit } => {
            logging::init_cli();
            history_command(&config, limit).await
        }
        Command::Run { force } => {
            logging::init_cli();
            if !force && !config.run_windows.is_open(Utc::now()) {
                info!("Outside configured run windows, nothing to do");
                return Ok(());
            }
            let processor = build_processor(&config).await?;
            let report = processor.run_once(Utc::now()).await?;
            info!(outcome = report.label(), ?report, "Run complete");
            Ok(())
        }
        Command::Watch => {
            let _guard = match &config.log_dir {
                Some(dir) => Some(logging::init_production(dir)?),
                None => {
                    logging::init_cli();
                    None
                }
            };
            let processor = build_processor(&config).await?;
            watch(&config, &processor).await;
            Ok(())
        }
    }
}

fn parse_command(config: &AppConfig, path: &Path, all: bool) -> Result<()> {
    let body = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read digest from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read digest {}", path.display()))?
    };

    let queries = if all {
        extract_queries(&body)
    } else {
        let tables = KeywordTables::load(config.keywords_path.as_deref())?;
        DigestFilter::with_tables(tables).parse(&body)
    };

    println!("{}", serde_json::to_string_pretty(&queries)?);
    Ok(())
}

async fn history_command(config: &AppConfig, limit: u32) -> Result<()> {
    let path = config
        .db_path
        .as_deref()
        .context("HARO_DB_PATH is not set; there is no pitch log to read")?;
    let db = LibSqlOutcomeLog::new_local(path).await?;

    let mut counts = serde_json::Map::new();
    for status in [OutcomeStatus::Sent, OutcomeStatus::Skipped, OutcomeStatus::Failed] {
        counts.insert(
            status.label().to_string(),
            db.count_by_status(status).await?.into(),
        );
    }
    let entries = db.recent(limit).await?;

    let out = serde_json::json!({ "counts": counts, "recent": entries });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn build_processor(config: &AppConfig) -> Result<DigestProcessor> {
    let email = EmailConfig::from_env().context("EMAIL_IMAP_HOST is not set")?;
    info!(imap = %email.imap_host, smtp = %email.smtp_host, "Mailbox configured");
    let mailbox = Arc::new(ImapMailbox::new(email));

    let llm = create_provider(&config.llm_config()?)?;
    let persona = Persona::load(&config.persona_path)
        .with_context(|| format!("failed to load persona {}", config.persona_path.display()))?;
    let generator = Arc::new(PitchGenerator::new(
        llm,
        persona,
        config.generator_config(),
    ));

    let mut outcome_log = FanoutLog::default();
    if let Some(sheets) = SheetsConfig::from_env() {
        info!(sheet = %sheets.sheet, "Google Sheets logging enabled");
        outcome_log.push(Arc::new(SheetsOutcomeLog::new(sheets)));
    }
    if let Some(path) = &config.db_path {
        let db = LibSqlOutcomeLog::new_local(path).await?;
        outcome_log.push(Arc::new(db));
    }
    if outcome_log.is_empty() {
        warn!("No outcome sink configured; outcomes are only logged");
    }

    let tables = KeywordTables::load(config.keywords_path.as_deref())?;
    let filter = DigestFilter::with_tables(tables);
    let (inclusion, exclusion) = filter.classifier().table_sizes();
    info!(inclusion, exclusion, "Keyword tables loaded");

    Ok(DigestProcessor::new(
        mailbox,
        generator,
        Arc::new(outcome_log),
        filter,
        config.processor_config(),
    ))
}

/// Tick on the cron schedule until Ctrl-C. Run failures are logged and the
/// loop keeps going.
async fn watch(config: &AppConfig, processor: &DigestProcessor) {
    info!("Watching for digests");

    loop {
        let now = Utc::now();
        let Some(next) = config.watch_schedule.next_after(now) else {
            warn!("Watch schedule has no upcoming ticks, stopping");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next, "Sleeping until next tick");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return;
            }
        }

        let tick = Utc::now();
        if !config.run_windows.is_open(tick) {
            info!("Outside configured run windows, skipping tick");
            continue;
        }

        match processor.run_once(tick).await {
            Ok(report) => info!(outcome = report.label(), ?report, "Run complete"),
            Err(e) => error!(error = %e, "Run failed"),
        }
    }
}
