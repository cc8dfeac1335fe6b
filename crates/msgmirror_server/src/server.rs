//! The feed server: accepts WebSocket clients and pushes deltas to them.

use crate::book::{Message, MessageBook, NewMessage};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::hub::{ClientHub, ClientId};
use futures_util::{SinkExt, StreamExt};
use msgmirror_protocol::{Delta, Intent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, trace, warn};

/// Pushes the message book to every connected client.
///
/// A new client receives one `sync` frame with the whole book, then an
/// `add` or `del` frame for every later change. Clients may ask for a
/// message to be removed with a `remove` intent.
///
/// # Example
///
/// ```no_run
/// use msgmirror_server::{FeedServer, NewMessage, ServerConfig};
/// use std::sync::Arc;
///
/// # async fn run() -> msgmirror_server::ServerResult<()> {
/// let server = Arc::new(FeedServer::new(ServerConfig::default()));
/// let running = server.listen().await?;
/// println!("listening on {}", running.local_addr());
///
/// server.publish(NewMessage::new("+15550100", "+15550101", "hello"))?;
/// # Ok(())
/// # }
/// ```
pub struct FeedServer {
    config: ServerConfig,
    book: MessageBook,
    hub: ClientHub,
}

/// Handle to a listening [`FeedServer`].
///
/// Dropping the handle stops accepting new clients but leaves open
/// connections alone; call [`RunningServer::shutdown`] to close them too.
pub struct RunningServer {
    server: Arc<FeedServer>,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl FeedServer {
    /// Creates a server with an empty book.
    pub fn new(config: ServerConfig) -> Self {
        let hub = ClientHub::new(config.client_buffer);
        Self {
            config,
            book: MessageBook::new(),
            hub,
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the message book.
    pub fn book(&self) -> &MessageBook {
        &self.book
    }

    /// Returns the number of connected clients.
    pub fn client_count(&self) -> usize {
        self.hub.len()
    }

    /// Stores a new message and announces it to every client.
    pub fn publish(&self, new: NewMessage) -> ServerResult<Message> {
        let message = self.book.insert(new);
        let frame = Delta::Add {
            id: message.sid.clone(),
            record: message.to_record()?,
        }
        .encode()?;

        let delivered = self.hub.broadcast(&frame);
        debug!(sid = %message.sid, delivered, "message published");
        Ok(message)
    }

    /// Deletes a message and announces the deletion.
    ///
    /// The `del` frame goes out even if the message was already gone.
    /// Returns true if the message existed.
    pub fn remove(&self, sid: &str) -> ServerResult<bool> {
        let existed = self.book.remove(sid).is_some();
        let frame = Delta::Delete { id: sid.to_owned() }.encode()?;

        let delivered = self.hub.broadcast(&frame);
        debug!(sid, existed, delivered, "message removed");
        Ok(existed)
    }

    /// Encodes the whole book as a `sync` frame.
    pub fn sync_frame(&self) -> ServerResult<String> {
        Ok(Delta::Sync(self.book.snapshot()?).encode()?)
    }

    /// Binds the configured address and starts accepting clients.
    pub async fn listen(self: &Arc<Self>) -> ServerResult<RunningServer> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, path = %self.config.path, "feed server listening");

        let server = Arc::clone(self);
        let task = tokio::spawn(server.accept_loop(listener));
        Ok(RunningServer {
            server: Arc::clone(self),
            local_addr,
            task,
        })
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.serve_client(stream).await {
                            debug!(%peer, error = %e, "client connection failed");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn serve_client(&self, stream: TcpStream) -> ServerResult<()> {
        let path = self.config.path.clone();
        let ws = tokio_tungstenite::accept_hdr_async(
            stream,
            move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                if req.uri().path() == path {
                    return Ok(resp);
                }
                let mut err = ErrorResponse::new(Some("not found".into()));
                *err.status_mut() = StatusCode::NOT_FOUND;
                Err(err)
            },
        )
        .await?;

        let (client, mut frames) = self.hub.register(|| match self.sync_frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "failed to encode sync frame");
                None
            }
        });
        let (mut writer, mut reader) = ws.split();

        let period = self.config.ping_interval;
        let mut ping = time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = writer.send(WsMessage::Text(frame)).await {
                            debug!(client, error = %e, "write failed");
                            break;
                        }
                    }
                    None => {
                        let _ = writer.send(WsMessage::Close(None)).await;
                        break;
                    }
                },
                _ = ping.tick() => {
                    if let Err(e) = writer.send(WsMessage::Ping(Vec::new())).await {
                        debug!(client, error = %e, "ping failed");
                        break;
                    }
                }
                msg = reader.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => self.handle_client_frame(client, text.as_bytes()),
                    Some(Ok(WsMessage::Binary(bytes))) => self.handle_client_frame(client, &bytes),
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => trace!(client, "control frame"),
                    Some(Err(e)) => {
                        debug!(client, error = %e, "read failed");
                        break;
                    }
                },
            }
        }

        self.hub.unregister(client);
        Ok(())
    }

    fn handle_client_frame(&self, client: ClientId, raw: &[u8]) {
        let intent = match Intent::decode(raw) {
            Ok(intent) => intent,
            Err(e) => {
                warn!(client, error = %e, "skipping malformed client frame");
                return;
            }
        };
        if !intent.is_remove() {
            debug!(client, action = %intent.action, "ignoring unknown client action");
            return;
        }
        if let Err(e) = self.remove(&intent.id) {
            warn!(client, id = %intent.id, error = %e, "remove failed");
        }
    }
}

impl RunningServer {
    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL clients should dial.
    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.server.config.path)
    }

    /// Returns the HTTP origin clients derive the endpoint from.
    pub fn page_url(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    /// Stops accepting clients and closes every open connection.
    pub fn shutdown(self) {
        self.task.abort();
        self.server.hub.close_all();
        info!(local_addr = %self.local_addr, "feed server stopped");
    }
}
