//! Serve command implementation.

use msgmirror_server::{FeedServer, NewMessage, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// One stdin line of the serve console.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Publish a new message.
    Publish(NewMessage),
    /// Remove a message by id.
    Remove(String),
}

/// Runs the serve command until stdin closes or Ctrl-C.
pub async fn run(bind: SocketAddr, ping_secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::new(bind).with_ping_interval(Duration::from_secs(ping_secs.max(1)));
    let server = Arc::new(FeedServer::new(config));
    let running = server.listen().await?;
    println!("serving {} (page {})", running.ws_url(), running.page_url());
    println!("type `<from> <to> <body...>` to publish, `rm <id>` to remove");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(ConsoleCommand::Publish(new))) => {
                        let message = server.publish(new)?;
                        println!("published {}", message.sid);
                    }
                    Ok(Some(ConsoleCommand::Remove(sid))) => {
                        if server.remove(&sid)? {
                            println!("removed {sid}");
                        } else {
                            println!("no message {sid}");
                        }
                    }
                    Ok(None) => {}
                    Err(usage) => eprintln!("{usage}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!(clients = server.client_count(), "shutting down");
    running.shutdown();
    Ok(())
}

/// Parses one console line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut parts = line.splitn(3, char::is_whitespace);
    match (parts.next(), parts.next(), parts.next()) {
        (Some("rm"), Some(sid), None) => Ok(Some(ConsoleCommand::Remove(sid.to_string()))),
        (Some("rm"), _, _) => Err("usage: rm <id>".into()),
        (Some(from), Some(to), Some(body)) if !body.trim().is_empty() => Ok(Some(
            ConsoleCommand::Publish(NewMessage::new(from, to, body.trim())),
        )),
        _ => Err("usage: <from> <to> <body...>".into()),
    }
}
