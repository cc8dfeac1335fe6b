//! Watch command implementation.

use msgmirror_engine::{
    endpoint_from_origin, EngineConfig, ReconnectPolicy, Replica, ReplicaStore, SendOutcome,
    SyncEngine, WsConnector,
};
use msgmirror_protocol::Intent;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

/// Text shown for an empty replica.
pub const EMPTY: &str = "No messages";

/// Runs the watch command until stdin closes or Ctrl-C.
pub async fn run(
    url: &str,
    retry_secs: u64,
    connect_timeout: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let page = Url::parse(url)?;
    let endpoint = endpoint_from_origin(&page)?;

    let mut config = EngineConfig::new(endpoint).with_reconnect(retry_policy(retry_secs));
    if let Some(secs) = connect_timeout {
        config = config.with_connect_timeout(Duration::from_secs(secs));
    }

    let replica = Arc::new(ReplicaStore::new());
    let mut changes = replica.subscribe();
    let engine = SyncEngine::start(config, WsConnector::new(), Arc::clone(&replica));
    let mut status = engine.watch_status();

    println!("{}", render(&replica.snapshot()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            change = changes.recv() => {
                if change.is_none() {
                    break;
                }
                println!("{}", render(&replica.snapshot()));
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                eprintln!("[{current:?}]");
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_command(&line) {
                    Some(intent) => {
                        if engine.sink().send(intent) == SendOutcome::Dropped {
                            eprintln!("not connected, command dropped");
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => eprintln!("usage: remove <id>"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    engine.abort();
    Ok(())
}

/// Fixed retry policy for `--retry`; zero is raised to one second.
pub fn retry_policy(retry_secs: u64) -> ReconnectPolicy {
    ReconnectPolicy::fixed(Duration::from_secs(retry_secs.max(1)))
}

/// Parses one stdin line into an intent.
pub fn parse_command(line: &str) -> Option<Intent> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some("remove"), Some(id), None) => Some(Intent::remove(id)),
        _ => None,
    }
}

/// Renders the replica as a table, one row per record.
pub fn render(replica: &Replica) -> String {
    if replica.is_empty() {
        return EMPTY.to_string();
    }

    let header = ["ID", "From", "To", "Body"];
    let rows: Vec<[&str; 4]> = replica
        .iter()
        .map(|(id, record)| {
            [
                id.as_str(),
                record.field_str("From").unwrap_or(""),
                record.field_str("To").unwrap_or(""),
                record.field_str("Body").unwrap_or(""),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[&str; 4]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        padded.join(" | ").trim_end().to_string()
    };

    let mut out = vec![line(&header)];
    out.extend(rows.iter().map(line));
    out.join("\n")
}
