use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::{
    domain::UserId,
    protocol::{ClientRequest, ServerEvent},
};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub enum PushSignal {
    Connected,
    Disconnected { reason: String },
    Event(ServerEvent),
}

#[async_trait]
pub trait PushConnection: Send {
    async fn send(&mut self, request: &ClientRequest) -> Result<()>;
    /// Next server event, or `Ok(None)` once the server closed the channel.
    async fn recv(&mut self) -> Result<Option<ServerEvent>>;
}

#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn PushConnection>>;
}

/// Derives the push endpoint from the REST base URL.
pub fn push_url(server_url: &str, user_id: UserId) -> Result<Url> {
    let mut url = Url::parse(server_url)
        .with_context(|| format!("invalid server url '{server_url}'"))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(anyhow!("server_url must be http or https, got '{other}'")),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot derive websocket url from '{server_url}'"))?;
    url.set_path("/ws");
    url.query_pairs_mut()
        .clear()
        .append_pair("user_id", &user_id.0.to_string());
    Ok(url)
}

pub struct WsConnector {
    url: Url,
}

impl WsConnector {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn for_server(server_url: &str, user_id: UserId) -> Result<Self> {
        Ok(Self::new(push_url(server_url, user_id)?))
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn PushConnection>> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {}", self.url))?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushConnection for WsConnection {
    async fn send(&mut self, request: &ClientRequest) -> Result<()> {
        let text = serde_json::to_string(request)?;
        self.stream
            .send(WsMessage::Text(text))
            .await
            .context("websocket send failed")
    }

    async fn recv(&mut self) -> Result<Option<ServerEvent>> {
        while let Some(frame) = self.stream.next().await {
            match frame.context("websocket receive failed")? {
                WsMessage::Text(text) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => return Ok(Some(event)),
                    Err(err) => warn!("push: skipping invalid server event: {err}"),
                },
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Keeps the push channel up for the lifetime of a session.
///
/// Outbound requests are forwarded while connected. Signals about the
/// connection and inbound events go to `signals`. Returns when `outbound` is
/// closed (logout) or nobody listens to `signals` any more.
pub async fn run_push_channel(
    connector: std::sync::Arc<dyn PushConnector>,
    mut outbound: mpsc::Receiver<ClientRequest>,
    signals: mpsc::Sender<PushSignal>,
    mut backoff: Backoff,
) {
    loop {
        let reason = match connector.connect().await {
            Ok(mut connection) => {
                backoff.reset();
                info!("push: connected");
                if signals.send(PushSignal::Connected).await.is_err() {
                    return;
                }
                loop {
                    tokio::select! {
                        request = outbound.recv() => {
                            let Some(request) = request else {
                                info!("push: session closed, tearing down channel");
                                return;
                            };
                            if let Err(err) = connection.send(&request).await {
                                break format!("{err:#}");
                            }
                        }
                        incoming = connection.recv() => match incoming {
                            Ok(Some(event)) => {
                                if signals.send(PushSignal::Event(event)).await.is_err() {
                                    return;
                                }
                            }
                            Ok(None) => break "closed by server".to_string(),
                            Err(err) => break format!("{err:#}"),
                        }
                    }
                }
            }
            Err(err) => format!("{err:#}"),
        };

        let delay = backoff.next_delay();
        warn!(retry_in_ms = delay.as_millis() as u64, "push: disconnected: {reason}");
        if signals
            .send(PushSignal::Disconnected { reason })
            .await
            .is_err()
        {
            return;
        }

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                request = outbound.recv() => match request {
                    Some(request) => debug!(?request, "push: dropping request while disconnected"),
                    None => return,
                },
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/push_tests.rs"]
mod tests;
