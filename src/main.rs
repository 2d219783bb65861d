//! Groups Relay CLI
//!
//! Operates the storage backend directly, without the protocol server.
//!
//! ## Usage
//!
//! ```bash
//! # Validate config and list hosted groups
//! groups-relay --config relay.toml check
//!
//! # Sign a message with the relay key and publish it
//! groups-relay sign --content "hello" --group /lobby | groups-relay publish
//!
//! # Publish to a closed group as an authenticated member
//! groups-relay publish --auth <pubkey> < event.json
//!
//! # Read a group's messages, newest first
//! groups-relay query '{"kinds":[9],"#g":["/lobby"],"limit":20}'
//! ```

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use groups_relay::event::{unix_now, GROUP_TAG, KIND_CHAT_MESSAGE};
use groups_relay::{Config, Event, Filter, Relay, RequestContext};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "groups-relay")]
#[command(about = "Storage backend for relay-hosted chat groups")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "GROUPS_RELAY_CONFIG", default_value = "groups-relay.toml")]
    config: PathBuf,

    /// Database directory (overrides config)
    #[arg(long, env = "GROUPS_RELAY_DB_PATH")]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate config and list hosted groups
    Check,

    /// Read one event as JSON from stdin and publish it
    Publish {
        /// Treat the request as authenticated with this pubkey
        #[arg(long)]
        auth: Option<String>,
    },

    /// Run a filter and print matching events as JSON lines
    Query {
        /// Treat the request as authenticated with this pubkey
        #[arg(long)]
        auth: Option<String>,

        /// Filter JSON, e.g. '{"kinds":[9],"#g":["/lobby"]}'
        filter: String,
    },

    /// Print a chat message signed with the relay key
    Sign {
        #[arg(long)]
        content: String,

        /// Group path to post to
        #[arg(long)]
        group: String,
    },
}

fn request(auth: Option<String>) -> RequestContext {
    match auth {
        Some(pubkey) => RequestContext::authenticated(pubkey),
        None => RequestContext::anonymous(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("groups_relay=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }

    info!(
        config = %args.config.display(),
        db_path = %config.db_path.display(),
        "Starting groups-relay"
    );

    match args.command {
        Command::Check => {
            let relay = Relay::temporary(&config)?;
            let ctx = relay.context();
            println!("{} {}", relay.name(), ctx.service_url());
            println!("relay pubkey {}", ctx.relay_pubkey());
            if !ctx.description().is_empty() {
                println!("{}", ctx.description());
            }
            for id in ctx.registry().ids() {
                let group = ctx.registry().get(id)?;
                println!(
                    "{id}\tprivate={}\tclosed={}\tmembers={}",
                    group.private,
                    group.closed,
                    group.members().count()
                );
            }
        }

        Command::Publish { auth } => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            let event: Event = serde_json::from_str(&input)?;

            let relay = Relay::open(&config)?;
            let result = relay.publish(&request(auth), &event).await;
            relay.shutdown().await?;

            match result {
                Ok(()) => println!("OK {}", event.id),
                Err(e) if e.is_rejection() => {
                    println!("REJECTED {e}");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Query { auth, filter } => {
            let filter: Filter = serde_json::from_str(&filter)?;

            let relay = Relay::open(&config)?;
            let mut stream = relay.query_events(&request(auth), &filter).await?;
            while let Some(event) = stream.next().await {
                println!("{}", serde_json::to_string(&event)?);
            }
        }

        Command::Sign { content, group } => {
            let relay = Relay::temporary(&config)?;
            let ctx = relay.context();
            let tags = vec![vec![
                GROUP_TAG.to_string(),
                group,
                ctx.service_url().to_string(),
            ]];
            let event =
                Event::new(KIND_CHAT_MESSAGE, unix_now(), tags, content).signed(ctx.relay_key());
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    Ok(())
}
