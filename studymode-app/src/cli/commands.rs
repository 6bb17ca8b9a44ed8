use crate::api::server as api_server;
use crate::cli::opts::*;
use crate::config::{Settings, StoreKind};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::io::{stdin, stdout, Read, Write};
use std::path::Path;
use std::sync::Arc;
use studymode_core::{
    export_records, import_records, stats, CardStore, ExportRecord, Quality, ReviewSession, EF_DEFAULT,
};
use studymode_ingest::parse_generated;
use studymode_json::JsonStore;
use studymode_sqlite::SqliteStore;
use tracing::{info, warn};

pub async fn run_cli(args: Cli) -> Result<()> {
    let settings = Settings::load(args.config.as_deref(), args.overrides())?;
    let store = open_store(&settings).await?;
    match args.cmd {
        Command::Add(a) => add_cmd(&*store, a).await,
        Command::Ingest { path } => ingest_cmd(&*store, &path).await,
        Command::Due { limit } => due_cmd(&*store, limit).await,
        Command::Review(cmd) => review_cmd(store, cmd).await,
        Command::Stats => stats_cmd(&*store).await,
        Command::Export(cmd) => export_cmd(&*store, cmd).await,
        Command::Import(cmd) => import_cmd(&*store, cmd).await,
        Command::Clear { yes } => clear_cmd(&*store, yes).await,
        Command::Serve(cmd) => {
            let addr = cmd.addr.unwrap_or_else(|| settings.api_addr.clone());
            let addr: std::net::SocketAddr = addr.parse().with_context(|| format!("bad address {addr}"))?;
            api_server::run(store, addr).await
        }
    }
}

pub async fn open_store(settings: &Settings) -> Result<Arc<dyn CardStore>> {
    match settings.store {
        StoreKind::Json => {
            let s = JsonStore::open_with(
                settings.json_path.clone(),
                settings.backups_dir.clone(),
                settings.max_backups,
            )
            .await?;
            Ok(Arc::new(s))
        }
        StoreKind::Sqlite => {
            if let Some(parent) = settings.db_path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let s = SqliteStore::open_file(&settings.db_path).await?;
            Ok(Arc::new(s))
        }
    }
}

async fn add_cmd(store: &dyn CardStore, a: CardAdd) -> Result<()> {
    let c = store.add_card(&a.question, &a.answer, Utc::now()).await?;
    println!("{}", c.id);
    Ok(())
}

async fn ingest_cmd(store: &dyn CardStore, path: &Path) -> Result<()> {
    let text = if path.as_os_str() == "-" {
        let mut s = String::new();
        stdin().read_to_string(&mut s)?;
        s
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };

    let parsed = match parse_generated(&text) {
        Ok(p) => p,
        Err(e) => {
            if let Some(raw) = e.raw() {
                warn!(chars = raw.len(), "unparseable generator output");
            }
            return Err(e.into());
        }
    };
    let added = store.bulk_add(&parsed.pairs, Utc::now()).await?;
    println!(
        "added {} of {} parsed card(s) ({} incomplete dropped)",
        added,
        parsed.pairs.len(),
        parsed.dropped
    );
    Ok(())
}

async fn due_cmd(store: &dyn CardStore, limit: Option<usize>) -> Result<()> {
    let cards = store.due_cards(Utc::now(), limit).await?;
    if cards.is_empty() {
        println!("no cards due");
        return Ok(());
    }
    for c in cards {
        println!("{}\t{}\t{}", c.id, c.next_review.format("%Y-%m-%d %H:%M"), c.question);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ReviewInput {
    Quality(i32),
    Skip,
    Quit,
}

fn parse_review_input(line: &str) -> Option<ReviewInput> {
    match line.trim().to_lowercase().as_str() {
        "s" | "skip" => Some(ReviewInput::Skip),
        "q" | "quit" => Some(ReviewInput::Quit),
        other => other
            .parse::<i32>()
            .ok()
            .and_then(|n| Quality::new(n).ok())
            .map(|q| ReviewInput::Quality(q.value())),
    }
}

async fn review_cmd(store: Arc<dyn CardStore>, cmd: ReviewCmd) -> Result<()> {
    let mut session = ReviewSession::start(store, Utc::now(), Some(cmd.max)).await?;
    let total = session.remaining();
    if total == 0 {
        println!("no cards due");
        return Ok(());
    }

    let mut shown = 0usize;
    while let Some(card) = session.current().cloned() {
        shown += 1;
        println!("\n[{}/{}] card {}", shown, total, card.id);
        println!("Q: {}", card.question);
        prompt_enter("[enter=show]")?;
        println!("A: {}", card.answer);
        println!("[0-5 = recall quality (5 perfect, 0 blackout), s=skip, q=quit]");
        let input = loop {
            let line = read_line("quality> ")?;
            match parse_review_input(&line) {
                Some(i) => break i,
                None => println!("enter 0-5, s, or q"),
            }
        };
        match input {
            ReviewInput::Quality(q) => {
                let updated = session.answer(q, Utc::now()).await?;
                println!("→ next due in {} day(s)", updated.interval);
            }
            ReviewInput::Skip => session.skip(),
            ReviewInput::Quit => break,
        }
    }

    let s = session.summary();
    println!("\nreviewed {} (lapses {}, skipped {})", s.reviewed, s.lapses, s.skipped);
    Ok(())
}

async fn stats_cmd(store: &dyn CardStore) -> Result<()> {
    let cards = store.list_cards().await?;
    let s = stats::summarize(&cards, Utc::now());
    println!("total\t{}", s.total);
    println!("due\t{}", s.due);
    println!("new\t{}", s.new);
    println!("avg_repetitions\t{:.2}", s.average_repetitions);
    println!("avg_ef\t{:.2}", s.average_ef);
    println!("quiz_difficulty\t{}", s.quiz_difficulty().label());
    Ok(())
}

async fn export_cmd(store: &dyn CardStore, cmd: ExportCmd) -> Result<()> {
    let records = export_records(store).await?;
    let path = match cmd {
        ExportCmd::Json { path } => {
            std::fs::write(&path, serde_json::to_string_pretty(&records)?)?;
            path
        }
        ExportCmd::Csv { path } => {
            write_csv(&records, &path)?;
            path
        }
    };
    info!(cards = records.len(), path = %path.display(), "exported");
    println!("wrote {} card(s) to {}", records.len(), path.display());
    Ok(())
}

async fn import_cmd(store: &dyn CardStore, cmd: ImportCmd) -> Result<()> {
    let records = match &cmd {
        ImportCmd::Json { path } => {
            let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<Vec<ExportRecord>>(&data)?
        }
        ImportCmd::Csv { path } => read_csv(path)?,
    };
    let summary = import_records(store, &records, Utc::now()).await?;
    println!("imported {} (skipped {})", summary.imported, summary.skipped);
    Ok(())
}

async fn clear_cmd(store: &dyn CardStore, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to clear {} card(s) without --yes", store.count().await?);
    }
    store.clear().await?;
    println!("ok");
    Ok(())
}

// ===== Helpers =====

const CSV_HEADER: [&str; 6] = ["q", "a", "interval", "next_review", "repetitions", "ef"];

fn write_csv(records: &[ExportRecord], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(CSV_HEADER)?;
    for r in records {
        wtr.write_record([
            r.q.clone(),
            r.a.clone(),
            r.interval.to_string(),
            r.next_review.map(|d| d.to_rfc3339()).unwrap_or_default(),
            r.repetitions.to_string(),
            r.ef.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn read_csv(path: &Path) -> Result<Vec<ExportRecord>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut out = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let line = i + 2;
        let field = |n: usize| rec.get(n).unwrap_or("").trim();
        out.push(ExportRecord {
            q: field(0).to_string(),
            a: field(1).to_string(),
            interval: parse_or(field(2), 0, line, "interval")?,
            next_review: match field(3) {
                "" => None,
                s => Some(
                    DateTime::parse_from_rfc3339(s)
                        .with_context(|| format!("line {line}: bad next_review {s:?}"))?
                        .with_timezone(&Utc),
                ),
            },
            repetitions: parse_or(field(4), 0, line, "repetitions")?,
            ef: parse_or(field(5), EF_DEFAULT, line, "ef")?,
        });
    }
    Ok(out)
}

fn parse_or<T: std::str::FromStr>(s: &str, default: T, line: usize, name: &str) -> Result<T> {
    if s.is_empty() {
        return Ok(default);
    }
    match s.parse() {
        Ok(v) => Ok(v),
        Err(_) => bail!("line {line}: bad {name} {s:?}"),
    }
}

fn prompt_enter(label: &str) -> Result<()> { print!("{label}"); stdout().flush().ok(); let mut s = String::new(); stdin().read_line(&mut s)?; Ok(()) }
fn read_line(prompt: &str) -> Result<String> { print!("{prompt}"); stdout().flush().ok(); let mut s = String::new(); stdin().read_line(&mut s)?; Ok(s) }
