//! `lexiland` command line front end.
//!
//! # Responsibility
//! - Expose tokenization, backup and annotation flows for local use and
//!   scripting.
//! - Keep output plain text or JSON on stdout; diagnostics go to stderr and
//!   the optional log directory.

use clap::{Args, Parser, Subcommand};
use lexiland_core::config::{DEFAULT_BATCH_CONCURRENCY, DEFAULT_BATCH_PACING_MS};
use lexiland_core::model::document::title_from_file_name;
use lexiland_core::service::backup_service::seed_known_words;
use lexiland_core::tokenize::unique_words;
use lexiland_core::{
    export_all, import_all, init_logging, open_db, tokenize, Action, BatchOptions, CancelToken,
    ClientConfig, HttpAnnotationClient, Level, ReaderSession, SqliteStore,
};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "lexiland", version, about = "LexiLand reader core tools")]
struct Cli {
    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the core library is linked
    Ping,
    /// Print paragraph, sentence and token counts for a text file
    Tokenize {
        file: PathBuf,
    },
    /// Write the vocabulary backup as JSON
    Export {
        #[command(flatten)]
        db: DbArgs,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Merge a backup file into the store without overwriting
    Import {
        #[command(flatten)]
        db: DbArgs,
        file: PathBuf,
    },
    /// Upsert known words from a JSON array or `{"words": [...]}` file
    Seed {
        #[command(flatten)]
        db: DbArgs,
        file: PathBuf,
    },
    /// Resolve one word through memory, cache and the annotation service
    Annotate {
        #[command(flatten)]
        db: DbArgs,
        word: String,
        /// Target level; defaults to LEXILAND_LEVEL or B2
        #[arg(long)]
        level: Option<Level>,
    },
    /// Open a text file as a document and annotate its unfamiliar words
    Read(ReadArgs),
}

#[derive(Args, Debug)]
struct DbArgs {
    /// SQLite database path
    #[arg(long)]
    db: PathBuf,
}

#[derive(Args, Debug)]
struct ReadArgs {
    #[command(flatten)]
    db: DbArgs,
    file: PathBuf,
    /// Requests in flight at once (1-8)
    #[arg(long, default_value_t = DEFAULT_BATCH_CONCURRENCY)]
    concurrency: usize,
    /// Delay between requests of one worker, in milliseconds
    #[arg(long, default_value_t = DEFAULT_BATCH_PACING_MS)]
    pacing_ms: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(dir) = &cli.log_dir {
        if let Err(err) = init_logging(&cli.log_level, dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Ping => {
            println!("lexiland_core ping={}", lexiland_core::ping());
            println!("lexiland_core version={}", lexiland_core::core_version());
        }
        Command::Tokenize { file } => {
            let content = std::fs::read_to_string(&file)?;
            let paragraphs = tokenize(&content);
            let sentences: usize = paragraphs.iter().map(|p| p.sentences.len()).sum();
            let tokens: usize = paragraphs.iter().map(|p| p.tokens().count()).sum();
            let words = unique_words(&paragraphs);
            println!("paragraphs={}", paragraphs.len());
            println!("sentences={sentences}");
            println!("tokens={tokens}");
            println!("unique_words={}", words.len());
            for word in words {
                println!("{word}");
            }
        }
        Command::Export { db, out } => {
            let conn = open_db(&db.db)?;
            let store = SqliteStore::try_new(&conn)?;
            let json = export_all(&store)?;
            match out {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
        Command::Import { db, file } => {
            let json = std::fs::read_to_string(&file)?;
            let conn = open_db(&db.db)?;
            let store = SqliteStore::try_new(&conn)?;
            let report = import_all(&store, &json)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Seed { db, file } => {
            let json = std::fs::read_to_string(&file)?;
            let conn = open_db(&db.db)?;
            let store = SqliteStore::try_new(&conn)?;
            let words = seed_known_words(&store, &json)?;
            println!("seeded={}", words.len());
        }
        Command::Annotate { db, word, level } => {
            let conn = open_db(&db.db)?;
            let mut session = open_session(&conn, level)?;
            let resolved = session.annotate_word(&word)?;
            println!("source={}", resolved.source.as_str());
            println!("{}", serde_json::to_string_pretty(&resolved.annotation)?);
        }
        Command::Read(args) => read(args)?,
    }
    Ok(())
}

fn open_session<'conn>(
    conn: &'conn Connection,
    level: Option<Level>,
) -> Result<ReaderSession<SqliteStore<'conn>, HttpAnnotationClient>, Box<dyn Error>> {
    let config = ClientConfig::from_env()?;
    let level = level.unwrap_or(config.default_level);
    let client = HttpAnnotationClient::new(config)?;
    let mut session = ReaderSession::new(SqliteStore::try_new(conn)?, client);
    session.load()?;
    session.dispatch(Action::SetLevel(level));
    Ok(session)
}

fn read(args: ReadArgs) -> Result<(), Box<dyn Error>> {
    let content = std::fs::read_to_string(&args.file)?;
    let conn = open_db(&args.db.db)?;
    let mut session = open_session(&conn, None)?;
    session.open_document(file_title(&args.file), content);

    let options = BatchOptions::new(args.concurrency, Duration::from_millis(args.pacing_ms));
    let report = session.annotate_pending(&options, &CancelToken::new());
    info!(
        "event=cli_read module=cli status=done completed={} failed={}",
        report.completed.len(),
        report.failed.len()
    );

    println!("completed={}", report.completed.len());
    println!("from_cache={}", report.from_cache.len());
    println!("failed={}", report.failed.len());
    for (word, error) in &report.failed {
        println!("  {word}: {error}");
    }
    Ok(())
}

fn file_title(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(title_from_file_name)
        .unwrap_or_else(|| "Untitled".to_string())
}
