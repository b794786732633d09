//!
//! src/main.rs
//!
//! Operator shell: collects artist, author id and credentials, lists the
//! master releases found, reads a selection and prints one line per
//! ingested release
//!
//!

use std::io::{self, BufRead, Write};

use release_fetcher::{config, logging, IngestError};
use release_fetcher::pipeline::{Clients, Ingestor};
use release_fetcher::types::{ItemStatus, Record, Session};

#[tokio::main]
async fn main() -> Result<(), IngestError> {
    let cfgs = config::load_config()?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service="release-fetcher",
        version=%env!("CARGO_PKG_VERSION"),
        "starting"
    );

    std::fs::create_dir_all(&cfgs.storage.image_dir)?;

    let artist = prompt_or_env("ARTIST", "Type the name of the artist you want to search")?;
    let raw_author = prompt_or_env("AUTHOR_ID", "Type the id of the author")?;
    let author_id = raw_author.trim().parse::<u64>()
        .map_err(|e| IngestError::Config(format!("author id {raw_author}: {e}")))?;
    let media_token = prompt_or_env("MEDIA_TOKEN", "Type your token")?;
    let catalog_token = match cfgs.catalog.token.clone() {
        Some(token) => token,
        None => prompt_or_env("DISCOGS_TOKEN", "Type your discogs token")?
    };

    let ingestor = Ingestor::new(Clients::from_config(&cfgs)?, cfgs.concurrency.max_inflight);

    println!("Searching...");
    let records = ingestor.search(&artist, &catalog_token).await?;
    if records.is_empty() {
        println!("No master releases found for {artist}");
        return Ok(());
    }
    for (i, record) in records.iter().enumerate() {
        println!("{:>3}. {}\n     {}", i + 1, record, record.description());
    }

    let line = prompt("Select releases (e.g. 1,3-5, empty for all)")?;
    let selected = select(&records, &line)?;

    let shutdown = ingestor.shutdown();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(msg = "finishing in-flight releases", "shell.signal");
            shutdown.cancel();
        }
    });

    println!("Fetching {} releases...", selected.len());
    let session = Session { media_token, author_id, catalog_token: Some(catalog_token) };
    let mut outcomes = ingestor.ingest_stream(selected, session);

    let (mut uploaded, mut failed, mut skipped) = (0_usize, 0_usize, 0_usize);
    while let Some(outcome) = outcomes.recv().await {
        println!("{outcome}");
        match outcome.status {
            ItemStatus::Uploaded { .. } => uploaded += 1,
            ItemStatus::Failed(IngestError::Auth { .. }) => {
                failed += 1;
                println!("     the media service rejected the token, run again with a new one");
            }
            ItemStatus::Failed(_) => failed += 1,
            ItemStatus::Skipped => skipped += 1
        }
    }

    println!("All done! {uploaded} uploaded, {failed} failed, {skipped} skipped");
    Ok(())
}

fn prompt(question: &str) -> Result<String, IngestError> {
    let mut stdout = io::stdout();
    write!(stdout, "{question}\n> ")?;
    stdout.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(IngestError::Config(format!("no input for: {question}")));
    }
    Ok(line.trim().to_string())
}

fn prompt_or_env(var: &str, question: &str) -> Result<String, IngestError> {
    match config::prefilled(var) {
        Some(value) => Ok(value),
        None => {
            let value = prompt(question)?;
            if value.is_empty() {
                return Err(IngestError::Config(format!("{var} was not set")));
            }
            Ok(value)
        }
    }
}

/// 1-based indices and ranges, `1,3-5`. Empty selects everything
fn parse_selection(line: &str, len: usize) -> Result<Vec<usize>, IngestError> {
    let invalid = |part: &str| IngestError::Config(format!("invalid selection: {part}"));
    if line.trim().is_empty() {
        return Ok((0..len).collect());
    }

    let mut picked = Vec::new();
    for part in line.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (lo, hi) = match part.split_once('-') {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => (part, part)
        };
        let lo: usize = lo.parse().map_err(|_| invalid(part))?;
        let hi: usize = hi.parse().map_err(|_| invalid(part))?;
        if lo == 0 || hi < lo || hi > len {
            return Err(invalid(part));
        }
        for i in lo - 1..hi {
            if !picked.contains(&i) {
                picked.push(i);
            }
        }
    }
    Ok(picked)
}

fn select(records: &[Record], line: &str) -> Result<Vec<Record>, IngestError> {
    Ok(parse_selection(line, records.len())?
        .into_iter()
        .map(|i| records[i].clone())
        .collect())
}
