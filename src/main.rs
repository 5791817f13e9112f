use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use feedlist::adapter::{AdapterEvent, EntryListAdapter, RowView};
use feedlist::config::Config;
use feedlist::notify::{Change, ChangeBus};
use feedlist::source::RowSource;
use feedlist::storage::{Database, DatabaseError, Feed, NewEntry};

/// How long a mutating command waits for its background write
const RESULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Get the config directory path (~/.config/feedlist/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedlist"))
}

#[derive(Parser, Debug)]
#[command(name = "feedlist", about = "Feed entry list with read and favorite tracking")]
struct Args {
    /// Config file (default: ~/.config/feedlist/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file (overrides the config file)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Entries to operate on: all, favorites, feed:<id> or group:<id>
    #[arg(long, default_value = "all")]
    source: RowSource,

    /// Print rows as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List entries of the source
    List,
    /// List feeds with their unread counts
    Feeds,
    /// Toggle the favorite flag of an entry
    Star { id: i64 },
    /// Mark an entry read
    Read { id: i64 },
    /// Mark an entry unread
    Unread { id: i64 },
    /// Mark every unread entry of the source read
    ReadAll,
    /// Create a feed group
    AddGroup { name: String },
    /// Create or update a feed
    AddFeed {
        name: String,
        url: String,
        #[arg(long)]
        group: Option<i64>,
    },
    /// Add an entry to a feed
    AddEntry {
        feed_id: i64,
        title: String,
        #[arg(long)]
        link: Option<String>,
        /// Milliseconds since the Unix epoch (default: now)
        #[arg(long)]
        date: Option<i64>,
    },
}

fn print_rows(rows: &[RowView<'_>], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No entries.");
        return Ok(());
    }
    for row in rows {
        println!(
            "{} {} {:>6}  {}",
            if row.read { " " } else { "●" },
            if row.favorite { "★" } else { "☆" },
            row.id,
            row.title
        );
        println!("           {}", row.subtitle);
    }
    Ok(())
}

fn print_feeds(feeds: &[Feed], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(feeds)?);
        return Ok(());
    }

    if feeds.is_empty() {
        println!("No feeds.");
        return Ok(());
    }
    for feed in feeds {
        let group = feed
            .group_id
            .map(|id| format!(" [group {}]", id))
            .unwrap_or_default();
        println!(
            "{:>6}  {} ({} unread){}",
            feed.id, feed.name, feed.unread_count, group
        );
        println!("        {}", feed.url);
    }
    Ok(())
}

/// Wait for the background result of the edit just dispatched and apply it.
async fn await_result(
    adapter: &mut EntryListAdapter,
    events: &mut mpsc::Receiver<AdapterEvent>,
    changes: &mut broadcast::Receiver<Change>,
) -> Result<AdapterEvent> {
    let event = tokio::time::timeout(RESULT_TIMEOUT, events.recv())
        .await
        .context("Timed out waiting for the store")?
        .context("Background task ended without reporting")?;
    adapter.handle_event(event.clone());

    while let Ok(change) = changes.try_recv() {
        tracing::info!(change = %change, "collection changed");
    }
    Ok(event)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;

    let db_path = match args.db.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
            config_dir.join("entries.db")
        }
    };
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    match &args.command {
        Command::Feeds => {
            let feeds = db
                .get_feeds_with_unread_counts()
                .await
                .context("Failed to load feeds")?;
            return print_feeds(&feeds, args.json);
        }
        Command::AddGroup { name } => {
            let id = db.insert_group(name).await.context("Failed to add group")?;
            println!("Added group {} ({})", name, id);
            return Ok(());
        }
        Command::AddFeed { name, url, group } => {
            let id = db
                .insert_feed(name, url, *group, None)
                .await
                .context("Failed to add feed")?;
            println!("Added feed {} ({})", name, id);
            return Ok(());
        }
        Command::AddEntry {
            feed_id,
            title,
            link,
            date,
        } => {
            let entry = NewEntry {
                title: title.clone(),
                link: link.clone(),
                date: date.unwrap_or_else(|| Utc::now().timestamp_millis()),
            };
            let id = db
                .insert_entry(*feed_id, &entry)
                .await
                .context("Failed to add entry")?;
            println!("Added entry {}", id);
            return Ok(());
        }
        _ => {}
    }

    let bus = ChangeBus::new(config.change_channel_capacity);
    let mut changes = bus.subscribe();
    let (event_tx, mut event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
    let mut adapter = EntryListAdapter::new(
        db,
        bus,
        args.source,
        config.adapter_options(),
        event_tx,
    );
    adapter.refresh().await.context("Failed to load entries")?;

    match args.command {
        Command::Star { id } => {
            let favorite = adapter.toggle_favorite(id);
            match await_result(&mut adapter, &mut event_rx, &mut changes).await? {
                AdapterEvent::FavoriteSaved { affected: 0, .. } => {
                    println!("Entry {} is not in {}", id, args.source)
                }
                AdapterEvent::FavoriteFailed { error, .. } => anyhow::bail!(error),
                _ if favorite => println!("Starred entry {}", id),
                _ => println!("Unstarred entry {}", id),
            }
        }
        Command::Read { id } | Command::Unread { id } => {
            let read = matches!(args.command, Command::Read { .. });
            adapter.set_read(id, read);
            match await_result(&mut adapter, &mut event_rx, &mut changes).await? {
                AdapterEvent::ReadSaved { affected: 0, .. } => {
                    println!("Entry {} is not in {}", id, args.source)
                }
                AdapterEvent::ReadFailed { error, .. } => anyhow::bail!(error),
                _ if read => println!("Marked entry {} read", id),
                _ => println!("Marked entry {} unread", id),
            }
        }
        Command::ReadAll => {
            adapter.mark_all_read();
            match await_result(&mut adapter, &mut event_rx, &mut changes).await? {
                AdapterEvent::AllReadSaved { affected } => {
                    println!("Marked {} entries read", affected)
                }
                AdapterEvent::AllReadFailed { error } => anyhow::bail!(error),
                _ => {}
            }
        }
        // List, and the store-only commands which returned above
        _ => {}
    }

    if !matches!(args.command, Command::List) {
        // Show what the store now holds rather than the optimistic overlay
        adapter.refresh().await.context("Failed to reload entries")?;
    }

    let rows: Vec<RowView<'_>> = adapter.rows().collect();
    print_rows(&rows, args.json)?;
    Ok(())
}
