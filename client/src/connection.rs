use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;

use combate_protocol::{parse_event, ClientIntent, ServerEvent};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub struct ReconnectPolicy {
    pub max_attempts: Option<usize>,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// The trainer this connection represents, replayed after a reconnect.
#[derive(Clone)]
pub(crate) struct Identity {
    pub trainer_name: String,
    pub player_number: u8,
}

pub struct Connection {
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
    reconnect_policy: ReconnectPolicy,
    identity: Option<Identity>,
}

impl Connection {
    pub async fn connect(url: String, policy: ReconnectPolicy) -> Result<Self> {
        let ws_stream = Self::establish_connection(&url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        Ok(Self {
            ws_stream,
            url,
            reconnect_policy: policy,
            identity: None,
        })
    }

    /// Remember who we joined as; a later reconnect re-enters the battle
    /// with `rejoinBattle` instead of starting over.
    pub(crate) fn set_identity(&mut self, trainer_name: String, player_number: u8) {
        self.identity = Some(Identity {
            trainer_name,
            player_number,
        });
    }

    async fn establish_connection(url: &str) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| "WebSocket handshake failed")?;
        Ok(ws_stream)
    }

    async fn reconnect(&mut self) -> Result<()> {
        let mut delay = self.reconnect_policy.initial_delay;
        let mut attempt = 1;

        loop {
            if let Some(max) = self.reconnect_policy.max_attempts
                && attempt > max {
                    anyhow::bail!("Failed to reconnect after {} attempts to {}", max, self.url);
                }

            tokio::time::sleep(delay).await;

            match Self::establish_connection(&self.url).await {
                Ok(ws_stream) => {
                    self.ws_stream = ws_stream;
                    if let Some(identity) = self.identity.clone() {
                        tracing::info!(trainer = %identity.trainer_name, "rejoining battle after reconnect");
                        let rejoin = ClientIntent::RejoinBattle {
                            trainer_name: identity.trainer_name,
                            player_number: identity.player_number,
                        };
                        self.send(rejoin.to_wire_format()).await?;
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = ?self.reconnect_policy.max_attempts,
                        error = %e,
                        "Reconnection attempt failed"
                    );
                    attempt += 1;
                    delay = Duration::from_secs_f64(
                        delay.as_secs_f64() * self.reconnect_policy.backoff_multiplier,
                    )
                    .min(self.reconnect_policy.max_delay);
                }
            }
        }
    }

    pub async fn recv(&mut self) -> Result<ServerEvent> {
        loop {
            match self.ws_stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return parse_event(&text).context("Failed to parse server event");
                }
                Some(Ok(Message::Ping(data))) => {
                    self.ws_stream
                        .send(Message::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    self.reconnect()
                        .await
                        .context("Connection lost and reconnection failed")?;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "WebSocket error, attempting reconnect");
                    self.reconnect()
                        .await
                        .context("WebSocket error and reconnection failed")?;
                }
            }
        }
    }

    pub async fn send(&mut self, message: String) -> Result<()> {
        self.ws_stream
            .send(Message::Text(message))
            .await
            .context("Failed to send message")?;
        Ok(())
    }
}
