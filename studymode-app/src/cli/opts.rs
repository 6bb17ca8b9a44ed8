use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Overrides, StoreKind};

#[derive(Debug, Parser, Clone)]
#[command(name = "studymode", version, about = "Study Mode spaced-repetition CLI/API")]
pub struct Cli {
    /// Config file (defaults to $STUDYMODE_CONFIG, then the app data dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Storage backend
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// JSON store file when --store json
    #[arg(long)]
    pub json_path: Option<PathBuf>,

    /// SQLite DB path when --store sqlite
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            store: self.store,
            json_path: self.json_path.clone(),
            db_path: self.db_path.clone(),
        }
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Add a single card
    Add(CardAdd),
    /// Add cards parsed from generator output (file path, or - for stdin)
    Ingest { path: PathBuf },
    /// List due cards
    Due {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Review loop
    Review(ReviewCmd),
    /// Deck size and progress
    Stats,
    /// Export data
    #[command(subcommand)]
    Export(ExportCmd),
    /// Import data
    #[command(subcommand)]
    Import(ImportCmd),
    /// Remove every card
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Launch Axum HTTP API
    Serve(ServeCmd),
}

#[derive(Debug, Args, Clone)]
pub struct CardAdd {
    #[arg(long, short)]
    pub question: String,
    #[arg(long, short)]
    pub answer: String,
}

#[derive(Debug, Args, Clone)]
pub struct ReviewCmd {
    #[arg(long, default_value_t = 50)]
    pub max: usize,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ExportCmd {
    Json { path: PathBuf },
    Csv { path: PathBuf },
}

#[derive(Debug, Subcommand, Clone)]
pub enum ImportCmd {
    Json { path: PathBuf },
    Csv { path: PathBuf },
}

#[derive(Debug, Args, Clone)]
pub struct ServeCmd {
    /// Bind address (host:port); overrides api_addr from the config file
    #[arg(long)]
    pub addr: Option<String>,
}
