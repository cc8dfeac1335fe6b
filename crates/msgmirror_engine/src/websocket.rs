//! WebSocket transport implementation.
//!
//! Dials the feed with `tokio-tungstenite` and splits the stream into a
//! reader and writer half. Only text and binary frames reach the engine;
//! ping/pong is handled by the WebSocket layer. `wss` endpoints need the
//! `tls` feature of this crate.

use crate::error::{EngineError, EngineResult};
use crate::transport::{Connector, Inbound, Link};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector dialing the feed over WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a WebSocket connector.
    pub fn new() -> Self {
        Self
    }
}

/// A live WebSocket link.
pub struct WsLink {
    writer: SplitSink<WsStream, Message>,
    reader: SplitStream<WsStream>,
}

impl Connector for WsConnector {
    type Link = WsLink;

    fn connect(&self, endpoint: &Url) -> impl Future<Output = EngineResult<WsLink>> + Send {
        let endpoint = endpoint.clone();
        async move {
            debug!(%endpoint, "dialing feed by websocket");
            let (stream, response) = tokio_tungstenite::connect_async(endpoint.as_str())
                .await
                .map_err(ws_error)?;
            debug!(status = %response.status(), "websocket handshake complete");

            let (writer, reader) = stream.split();
            Ok(WsLink { writer, reader })
        }
    }
}

impl Link for WsLink {
    fn recv(&mut self) -> impl Future<Output = Option<EngineResult<Inbound>>> + Send {
        async move {
            loop {
                match self.reader.next().await? {
                    Ok(Message::Text(text)) => return Some(Ok(Inbound::Text(text))),
                    Ok(Message::Binary(bytes)) => return Some(Ok(Inbound::Binary(bytes))),
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "websocket closed by peer");
                        return None;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {
                        trace!("websocket keep-alive");
                    }
                    Ok(msg @ Message::Frame(_)) => {
                        warn!(?msg, "got websocket message of unsupported type, skipping");
                    }
                    Err(
                        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                    ) => return None,
                    Err(e) => return Some(Err(ws_error(e))),
                }
            }
        }
    }

    fn send(&mut self, frame: String) -> impl Future<Output = EngineResult<()>> + Send {
        async move { self.writer.send(Message::Text(frame)).await.map_err(ws_error) }
    }
}

fn ws_error(err: tungstenite::Error) -> EngineError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            EngineError::Closed
        }
        tungstenite::Error::Url(e) => EngineError::transport_fatal(e.to_string()),
        e => EngineError::transport_retryable(e.to_string()),
    }
}
