mod console;
mod telemetry;

use std::fmt;
use std::path::PathBuf;

use jlpt_core::DEFAULT_BATCH_SIZE;
use jlpt_core::model::{Category, Level};
use services::{AppServices, BatchOutcome, QuestionBank, QuizOptions};
use tracing::info;

use crate::console::{Console, default_target, describe_start_error, review_target};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidBatchSize { raw: String },
    InvalidSeed { raw: String },
    InvalidLevel { raw: String },
    InvalidCategory { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidBatchSize { raw } => {
                write!(f, "invalid --batch-size value: {raw}")
            }
            ArgsError::InvalidSeed { raw } => write!(f, "invalid --seed value: {raw}"),
            ArgsError::InvalidLevel { raw } => write!(f, "invalid --level value: {raw}"),
            ArgsError::InvalidCategory { raw } => write!(f, "invalid --category value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- quiz   [options] [--level <level>] [--category <category>]");
    eprintln!("  cargo run -p app -- review [options] [--level <level>] [--category <category>]");
    eprintln!("  cargo run -p app -- status [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>      default sqlite://jlpt.sqlite3");
    eprintln!("  --bank <path>          extra JSON question bank");
    eprintln!("  --batch-size <n>       default {DEFAULT_BATCH_SIZE}");
    eprintln!("  --seed <u64>           reproducible question order");
    eprintln!();
    eprintln!("Levels: FIFTY_ON (50音), N5, N4, N3, N2");
    eprintln!("Categories: KANA, VOCABULARY, GRAMMAR, LISTENING");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  JLPT_DB_URL, JLPT_BANK_PATH, JLPT_BATCH_SIZE, JLPT_LOG, JLPT_LOG_FORMAT");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quiz,
    Review,
    Status,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "review" => Some(Self::Review),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    bank_path: Option<PathBuf>,
    batch_size: usize,
    seed: Option<u64>,
    level: Option<Level>,
    category: Option<Category>,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("JLPT_DB_URL")
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| "sqlite://jlpt.sqlite3".into(), normalize_sqlite_url);
        let mut bank_path = env("JLPT_BANK_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let mut batch_size = env("JLPT_BATCH_SIZE")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        let mut seed = None;
        let mut level = None;
        let mut category = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--bank" => {
                    bank_path = Some(PathBuf::from(require_value(args, "--bank")?));
                }
                "--batch-size" => {
                    let value = require_value(args, "--batch-size")?;
                    batch_size = value
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidBatchSize { raw: value })?;
                }
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    seed = Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| ArgsError::InvalidSeed { raw: value.clone() })?,
                    );
                }
                "--level" => {
                    let value = require_value(args, "--level")?;
                    level = Some(
                        value
                            .parse::<Level>()
                            .map_err(|_| ArgsError::InvalidLevel { raw: value.clone() })?,
                    );
                }
                "--category" => {
                    let value = require_value(args, "--category")?;
                    category = Some(
                        value
                            .parse::<Category>()
                            .map_err(|_| ArgsError::InvalidCategory { raw: value.clone() })?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            bank_path,
            batch_size,
            seed,
            level,
            category,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn load_bank(path: Option<&PathBuf>) -> Result<QuestionBank, Box<dyn std::error::Error>> {
    let mut bank = QuestionBank::builtin();
    if let Some(path) = path {
        let extra = QuestionBank::load(path)?;
        info!(path = %path.display(), questions = extra.len(), "loaded question bank");
        bank.extend(extra.into_questions());
    }
    Ok(bank)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means quiz.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Quiz,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Quiz,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if argv.first().is_some_and(|first| !first.starts_with("--")) {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter(), |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup; core/services stay storage-agnostic.
    prepare_sqlite_file(&parsed.db_url)?;
    let bank = load_bank(parsed.bank_path.as_ref())?;
    let services = AppServices::new_sqlite(
        &parsed.db_url,
        bank,
        QuizOptions {
            batch_size: Some(parsed.batch_size),
            seed: parsed.seed,
        },
    )
    .await?;
    info!(db = %parsed.db_url, ?cmd, "starting");

    let quiz = services.quiz_loop();
    let mut state = services.progress().load_state().await;
    let mut session = services.new_session();
    let mut console = Console::new(
        tokio::io::BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );

    match cmd {
        Command::Status => console.print_status(&state)?,
        Command::Quiz => {
            let level = parsed.level.unwrap_or_else(|| default_target(&state).0);
            let category = parsed
                .category
                .unwrap_or_else(|| level.categories()[0]);
            match quiz
                .start_session(&mut session, &state, level, category)
                .await
            {
                Ok(BatchOutcome::Aborted) => println!("Could not load questions."),
                Ok(_) => console.run_session(&quiz, &mut session, &mut state).await?,
                Err(err) => println!("{}", describe_start_error(&err)),
            }
        }
        Command::Review => {
            let target = match (parsed.level, parsed.category) {
                (Some(level), Some(category)) => Some((level, category)),
                _ => review_target(&state),
            };
            let Some((level, category)) = target else {
                println!("Nothing to review.");
                return Ok(());
            };
            match quiz.start_review_all(&mut session, &state, level, category) {
                Ok(()) => console.run_session(&quiz, &mut session, &mut state).await?,
                Err(err) => println!("{}", describe_start_error(&err)),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    telemetry::init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
