//! Channel-scan job runner.
//!
//! Seeds an in-process store from a JSON fixture of tracked channels and
//! bot accounts, then drives the import pipeline against the real metadata
//! API. Useful for exercising the pipeline and its rate limiting without a
//! hosted database.

use std::fs::read_to_string;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use clipnow::store::{set, DocPath, Write};
use clipnow::{App, Config, HttpMetadataApi, MemoryStore, Store, SystemClock};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON file with the channels and bot accounts to scan for
    seed: PathBuf,

    /// Also refresh channel statistics after the scan
    #[arg(long)]
    stats: bool,
}

#[derive(Deserialize)]
struct Seed {
    channels: Vec<SeedChannel>,
    #[serde(default)]
    bots: Vec<SeedBot>,
}

#[derive(Deserialize)]
struct SeedChannel {
    id: String,
    channel_id: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct SeedBot {
    id: String,
    name: String,
    channel_id: String,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let seed: Seed = serde_json::from_str(
        &read_to_string(&args.seed)
            .with_context(|| format!("reading seed file {}", args.seed.display()))?,
    )
    .context("parsing seed file")?;

    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new(clock.clone()));
    seed_store(&store, &seed).await?;

    println!("Seeded channels: {}", seed.channels.len());
    println!("Seeded bots: {}\n", seed.bots.len());

    let app = App::new(
        Config::load(),
        store,
        Arc::new(HttpMetadataApi::new()),
        clock,
    );

    let channels = app
        .youtube()
        .due_channels()
        .await
        .context("listing channels")?;

    let pb = ProgressBar::new(channels.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap()
        .progress_chars("=> "),
    );

    let mut imported = 0;
    for channel in &channels {
        pb.set_message(format!("Scanning {}", channel.channel_id));

        match app.youtube().check_channel(channel).await {
            Ok(count) => imported += count,
            Err(err) => warn!(channel = %channel.channel_id, error = %err, "scan failed"),
        }

        pb.inc(1);
    }
    pb.finish_with_message("Done");

    println!("\nImported {} new videos", imported);

    if args.stats {
        let updated = app.update_channel_statistics().await;
        println!("Updated statistics for {} channels", updated);
    }

    Ok(())
}

async fn seed_store(store: &MemoryStore, seed: &Seed) -> Result<()> {
    let mut writes = Vec::new();

    for channel in &seed.channels {
        writes.push(Write::Create {
            path: DocPath::new("youtube_channels", &channel.id),
            fields: vec![
                set("channel_id", json!(channel.channel_id)),
                set("is_active", json!(true)),
                set("last_checked", json!(0)),
                set(
                    "category",
                    json!(channel.category.as_deref().unwrap_or("General")),
                ),
            ],
        });
    }

    for bot in &seed.bots {
        writes.push(Write::Create {
            path: DocPath::new("users", &bot.id),
            fields: vec![
                set("display_name", json!(bot.name)),
                set("youtube_channel_id", json!(bot.channel_id)),
                set("avatar_url", json!(bot.avatar_url)),
                set("total_imported", json!(0)),
            ],
        });
    }

    store.commit(writes).await.context("seeding store")?;
    Ok(())
}
