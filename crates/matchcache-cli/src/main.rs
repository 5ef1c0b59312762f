//! matchcache - sync a remote profile feed and work with it offline.
//!
//! A thin driver around `matchcache-core`: it wires the HTTP client, the
//! on-disk store, queue and avatar cache into a `SyncEngine` and runs one
//! command against it.

mod format;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use matchcache_core::cache::age_display;
use matchcache_core::config::{IMAGES_DIR, LOGS_DIR, PENDING_ACTIONS_FILE, PROFILES_FILE};
use matchcache_core::{
    ActionQueue, ApiClient, AssetCache, Config, Decision, ProfileId, ProfileStore, SyncEngine,
};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable that forces offline mode
const OFFLINE_ENV: &str = "MATCHCACHE_OFFLINE";

/// Log file name prefix inside the logs directory
const LOG_FILE_PREFIX: &str = "matchcache.log";

const USAGE: &str = "\
Usage: matchcache [--offline] <command>

Commands:
  sync [--pages N]   Fetch up to N pages (default 1) and print the feed
  list [--json]      Print the cached profiles
  accept <id>        Accept a profile
  decline <id>       Decline a profile
  replay             Deliver decisions queued while offline";

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Sync { pages: u32 },
    List { json: bool },
    Decide { id: ProfileId, decision: Decision },
    Replay,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    offline: bool,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut offline = false;
    let mut rest = Vec::new();
    for arg in args {
        if arg == "--offline" {
            offline = true;
        } else {
            rest.push(arg.as_str());
        }
    }

    let command = match rest.as_slice() {
        ["sync"] => Command::Sync { pages: 1 },
        ["sync", "--pages", n] => {
            let pages: u32 = n
                .parse()
                .with_context(|| format!("Invalid page count: {}", n))?;
            if pages == 0 {
                bail!("Page count must be at least 1");
            }
            Command::Sync { pages }
        }
        ["list"] => Command::List { json: false },
        ["list", "--json"] => Command::List { json: true },
        ["accept", id] => Command::Decide {
            id: parse_id(id)?,
            decision: Decision::Accepted,
        },
        ["decline", id] => Command::Decide {
            id: parse_id(id)?,
            decision: Decision::Declined,
        },
        ["replay"] => Command::Replay,
        _ => bail!("{}", USAGE),
    };

    Ok(Args { offline, command })
}

fn parse_id(s: &str) -> Result<ProfileId> {
    s.parse()
        .with_context(|| format!("Invalid profile id: {}", s))
}

fn offline_from_env() -> bool {
    std::env::var(OFFLINE_ENV)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

// ============================================================================
// Setup
// ============================================================================

/// Initialize the tracing subscriber for logging.
///
/// Stderr gets `RUST_LOG` (default warn); the same events go to a daily log
/// file under the cache directory. The returned guard flushes the file writer
/// and must be held until exit.
fn init_tracing(logs_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file = std::fs::create_dir_all(logs_dir).ok().map(|_| {
        let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
        tracing_appender::non_blocking(appender)
    });

    match file {
        Some((writer, guard)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

fn build_engine(
    config: &Config,
    cache_dir: &Path,
    store: Arc<ProfileStore>,
    online: bool,
) -> Result<SyncEngine> {
    let client = Arc::new(ApiClient::from_config(config).context("Failed to build HTTP client")?);

    let queue = ActionQueue::open(cache_dir.join(PENDING_ACTIONS_FILE))
        .context("Failed to open pending action queue")?;
    let assets = AssetCache::new(cache_dir.join(IMAGES_DIR), client.clone())
        .context("Failed to create image cache")?;

    let engine = SyncEngine::new(
        store,
        Arc::new(queue),
        Arc::new(assets),
        client.clone(),
        client,
    )
    .with_page_size(config.page_size)
    .with_online(online);

    Ok(engine)
}

// ============================================================================
// Commands
// ============================================================================

fn print_feed(engine: &SyncEngine) {
    if let Some(notice) = format::format_notice(engine.notice()) {
        println!("{}", notice);
    }
    println!("{}", format::format_table(engine.records()));
    println!("{}", format::format_summary(engine.records()));
    println!("{}", format::format_pending(&engine.pending_actions()));
}

async fn run_sync(engine: &mut SyncEngine, pages: u32) {
    engine.load_from_cache();
    for _ in 0..pages {
        if !engine.cursor().has_more() {
            break;
        }
        engine.load_more_and_settle().await;
        if engine.notice().is_some() {
            break;
        }
    }
    print_feed(engine);
}

fn run_list(engine: &mut SyncEngine, store: &ProfileStore, json: bool) -> Result<()> {
    engine.load_from_cache();
    if json {
        let out = serde_json::to_string_pretty(engine.records())
            .context("Failed to serialize profiles")?;
        println!("{}", out);
        return Ok(());
    }

    match store.last_saved() {
        Some(saved_at) => println!("Cached {}", age_display(saved_at)),
        None => println!("Nothing cached yet"),
    }
    print_feed(engine);
    Ok(())
}

async fn run_decide(engine: &mut SyncEngine, id: ProfileId, decision: Decision) {
    engine.load_from_cache();
    if !engine.records().iter().any(|p| p.id == id) {
        eprintln!("Note: {} is not in the local cache", id);
    }
    engine.decide(id, decision);
    engine.settle().await;

    if engine.is_online() {
        println!("{} {}", decision, id);
    } else {
        println!("{} {} (queued until online)", decision, id);
    }
}

async fn run_replay(engine: &mut SyncEngine) {
    let pending = engine.pending_actions().len();
    engine.on_connectivity_restored();
    engine.settle().await;
    println!("Replayed {} pending decision(s).", pending);
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let config = Config::load().context("Failed to load config")?;
    let cache_dir: PathBuf = config.cache_dir()?;
    let _log_guard = init_tracing(&cache_dir.join(LOGS_DIR));

    let offline = args.offline || config.offline || offline_from_env();
    info!(offline, cache_dir = %cache_dir.display(), "matchcache starting");

    let store = Arc::new(
        ProfileStore::open(cache_dir.join(PROFILES_FILE)).context("Failed to open profile store")?,
    );
    let mut engine = build_engine(&config, &cache_dir, Arc::clone(&store), !offline)?;

    match args.command {
        Command::Sync { pages } => run_sync(&mut engine, pages).await,
        Command::List { json } => run_list(&mut engine, &store, json)?,
        Command::Decide { id, decision } => run_decide(&mut engine, id, decision).await,
        Command::Replay => {
            if offline {
                bail!("Cannot replay while offline");
            }
            run_replay(&mut engine).await
        }
    }

    Ok(())
}
