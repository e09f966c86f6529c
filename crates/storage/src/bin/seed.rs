use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;
use vocab_core::model::{CategoryDescriptor, WordEntry};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    words: Option<PathBuf>,
    reset: bool,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("VOCAB_DB_URL").unwrap_or_else(|_| "sqlite:vocab.sqlite3?mode=rwc".into());
        let mut words = std::env::var("VOCAB_WORDS").ok().map(PathBuf::from);
        let mut reset = false;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--words" => {
                    words = Some(PathBuf::from(require_value(&mut args, "--words")?));
                }
                "--reset" => reset = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            words,
            reset,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:vocab.sqlite3?mode=rwc)");
    eprintln!("  --words <file.json>       Catalog file with `categories` and `words` arrays");
    eprintln!("  --reset                   Remove the existing global catalog first");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  VOCAB_DB_URL, VOCAB_WORDS, RUST_LOG");
}

/// Shape of a catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    categories: Vec<CategoryDescriptor>,
    #[serde(default)]
    words: Vec<WordEntry>,
}

fn sample_catalog() -> CatalogFile {
    let descriptor = CategoryDescriptor {
        category: "cet4".into(),
        category_name: "CET-4".into(),
        subcategory: "cet4-core".into(),
        subcategory_name: "Core words".into(),
    };
    let samples = [
        ("abandon", "to leave behind", "They abandon the plan.", "他们放弃了计划。"),
        ("ability", "capacity to do something", "She has the ability to lead.", "她有领导能力。"),
        ("absorb", "to take in", "Plants absorb water.", "植物吸收水分。"),
        ("accept", "to receive willingly", "I accept your offer.", "我接受你的提议。"),
        ("accurate", "free from error", "The data is accurate.", "数据是准确的。"),
    ];
    let words = samples
        .iter()
        .zip(1_u32..)
        .map(|(&(word, meaning, example, example_cn), id)| WordEntry {
            local_id: id,
            category: descriptor.category.clone(),
            subcategory: descriptor.subcategory.clone(),
            word: word.into(),
            meaning: meaning.into(),
            example: example.into(),
            example_cn: example_cn.into(),
            phonetic: None,
            audio: None,
            part_of_speech: Vec::new(),
            example_audio: None,
        })
        .collect();
    CatalogFile {
        categories: vec![descriptor],
        words,
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog = match &args.words {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<CatalogFile>(&raw)?
        }
        None => sample_catalog(),
    };

    let storage = Storage::sqlite(&args.db_url).await?;
    if args.reset {
        storage.catalog.clear_global_catalog().await?;
    }
    let categories = storage.catalog.import_categories(&catalog.categories).await?;
    let words = storage.catalog.import_words(&catalog.words).await?;

    tracing::info!(categories, words, db = %args.db_url, "seeded global catalog");
    println!(
        "Seeded {categories} categories and {words} words into {}",
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
