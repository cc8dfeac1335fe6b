//! msgmirror CLI
//!
//! Command-line tools for the msgmirror push channel.
//!
//! # Commands
//!
//! - `watch` - Mirror a feed and render it on every change
//! - `serve` - Run the reference feed server
//! - `decode` - Decode a single frame for debugging

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// msgmirror command-line tools.
#[derive(Parser)]
#[command(name = "msgmirror")]
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
    /// Mirror a feed and render it on every change
    Watch {
        /// Page URL the feed is served from (the endpoint is derived from it)
        #[arg(short, long, default_value = "http://127.0.0.1:8080/")]
        url: String,

        /// Seconds between reconnect attempts
        #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
        retry: u64,

        /// Give up on a connection attempt after this many seconds
        #[arg(long)]
        connect_timeout: Option<u64>,
    },

    /// Run the reference feed server
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Seconds between keep-alive pings
        #[arg(long, default_value = "5")]
        ping_interval: u64,
    },

    /// Decode a single frame for debugging
    Decode {
        /// The raw frame text
        frame: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so rendered output stays clean.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Watch {
            url,
            retry,
            connect_timeout,
        } => {
            commands::watch::run(&url, retry, connect_timeout).await?;
        }
        Commands::Serve {
            bind,
            ping_interval,
        } => {
            commands::serve::run(bind, ping_interval).await?;
        }
        Commands::Decode { frame, format } => {
            commands::decode::run(&frame, &format)?;
        }
        Commands::Version => {
            println!("msgmirror CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
