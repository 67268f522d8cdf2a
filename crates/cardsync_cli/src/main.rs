//! CardSync CLI
//!
//! Command-line tools for the CardSync contact synchronizer.
//!
//! # Commands
//!
//! - `serve` - Run the card server over a data directory
//! - `list` - Enumerate resources on a server
//! - `sync` - Reconcile a local cache against a server resource
//! - `publish` - Push a local card file to a server, seeding the caches

use cardsync_codec::TextCodec;
use cardsync_engine::{RemoteStore, RetryConfig, SyncConfig, SyncEngine, WireRemote};
use cardsync_model::{Card, Codec};
use cardsync_protocol::DEFAULT_PORT;
use cardsync_server::{Server, ServerConfig};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CardSync command-line contact synchronization tools.
#[derive(Parser)]
#[command(name = "cardsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the card server
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:2626")]
        addr: SocketAddr,

        /// Directory holding one card file per resource
        #[arg(short, long, default_value = "cards")]
        data_dir: PathBuf,
    },

    /// Enumerate resources on a server
    List {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Only names containing this substring
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Reconcile a local cache against a server resource
    Sync {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Resource name on the server
        resource: String,

        /// Root of the client cache directories
        #[arg(short, long, default_value = ".cardsync")]
        cache_dir: PathBuf,

        /// Sync even when auto-sync is disabled
        #[arg(short, long)]
        force: bool,

        /// Maximum attempts when another writer races the sync
        #[arg(long, default_value_t = 3)]
        max_attempts: u32,
    },

    /// Push a local card file to a server, seeding the caches
    Publish {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Resource name on the server
        resource: String,

        /// The card file to publish
        file: PathBuf,

        /// Root of the client cache directories
        #[arg(short, long, default_value = ".cardsync")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve { addr, data_dir } => {
            let server = Server::bind(ServerConfig::new(addr, data_dir))?;
            println!("serving on {}", server.local_addr()?);
            server.run()?;
        }
        Commands::List { host, port, filter } => {
            let mut remote = WireRemote::connect(&host, port)?;
            for (ts, name) in remote.list(filter.as_deref())? {
                println!("{ts} {name}");
            }
            remote.stop()?;
        }
        Commands::Sync {
            host,
            port,
            resource,
            cache_dir,
            force,
            max_attempts,
        } => {
            let remote = WireRemote::connect(&host, port)?;
            let config = SyncConfig::new(host, port, &resource, cache_dir)
                .with_retry(RetryConfig::new(max_attempts));
            let mut engine = SyncEngine::new(config, remote)?;

            let current_path = engine.cache().current_path(&resource);
            let mut card = if current_path.is_file() {
                Card::load(&current_path, &TextCodec)?
            } else {
                Card::from_contacts(vec![])
            };

            let outcome = engine.sync(&mut card, force)?;
            println!("{resource}: {outcome:?}");
            engine.finish()?;
        }
        Commands::Publish {
            host,
            port,
            resource,
            file,
            cache_dir,
        } => {
            let contacts = TextCodec.parse(&std::fs::read_to_string(&file)?)?;
            let mut card = Card::from_contacts(contacts);

            let remote = WireRemote::connect(&host, port)?;
            let config = SyncConfig::new(host, port, &resource, cache_dir);
            let mut engine = SyncEngine::new(config, remote)?;
            let ts = engine.publish(&mut card)?;
            println!("{resource}: published at {ts}");
            engine.finish()?;
        }
    }

    Ok(())
}
