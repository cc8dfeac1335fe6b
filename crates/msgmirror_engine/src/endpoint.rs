//! Derives the channel endpoint from the hosting page's location.

use crate::error::{EngineError, EngineResult};
use url::Url;

/// Path of the push channel on the serving host.
pub const CHANNEL_PATH: &str = "/ws";

/// Maps a page URL to its WebSocket endpoint.
///
/// `http` becomes `ws` and `https` becomes `wss`; `ws`/`wss` pass through.
/// Host and port are kept, the path is replaced by [`CHANNEL_PATH`] and any
/// query or fragment is dropped.
pub fn endpoint_from_origin(page: &Url) -> EngineResult<Url> {
    let scheme = match page.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(EngineError::InvalidEndpoint(format!(
                "unsupported scheme {other:?} in {page}"
            )))
        }
    };

    let host = page
        .host_str()
        .ok_or_else(|| EngineError::InvalidEndpoint(format!("no host in {page}")))?;

    let authority = match page.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Url::parse(&format!("{scheme}://{authority}{CHANNEL_PATH}"))
        .map_err(|e| EngineError::InvalidEndpoint(e.to_string()))
}
