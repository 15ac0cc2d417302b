//! Async websocket client for the Combate battle service.
//!
//! [`BattleClient`] owns the socket. Intents go in through a cloneable
//! [`Sender`]; events come out through a [`Handler`] you implement. The
//! connection reconnects with exponential backoff and re-enters the battle
//! with a rejoin once it is back.
//!
//! ```ignore
//! let mut client = BattleClient::connect("ws://localhost:3001").await?;
//! let sender = client.sender();
//! sender.join("Ash", 1, team, 1)?;
//! client.run(&mut MyBot { sender }).await?;
//! ```

mod connection;
mod handler;
mod sender;

use anyhow::Result;
use tokio::sync::mpsc;

pub use async_trait::async_trait;
pub use connection::{Connection, ReconnectPolicy};
pub use handler::Handler;
pub use sender::Sender;

pub use combate_protocol::{
    BattleSnapshot, ClientIntent, Pokemon, PokemonMove, PokemonStat, RejectReason, ServerEvent,
};

/// Main battle service client.
pub struct BattleClient {
    connection: Connection,
    outgoing: mpsc::UnboundedReceiver<ClientIntent>,
    sender: Sender,
}

impl BattleClient {
    /// Connect with the default reconnect policy.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_policy(url, ReconnectPolicy::default()).await
    }

    pub async fn connect_with_policy(url: &str, policy: ReconnectPolicy) -> Result<Self> {
        let connection = Connection::connect(url.to_string(), policy).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            connection,
            outgoing: rx,
            sender: Sender::new(tx),
        })
    }

    /// A cloneable handle for queueing intents from handlers or other tasks.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    /// Wait for the next server event. Queued intents are flushed while
    /// waiting.
    pub async fn next_event(&mut self) -> Result<ServerEvent> {
        loop {
            tokio::select! {
                intent = self.outgoing.recv() => {
                    // The client holds its own Sender, so recv never yields None.
                    if let Some(intent) = intent {
                        self.send_intent(intent).await?;
                    }
                }
                event = self.connection.recv() => return event,
            }
        }
    }

    /// Run the event loop, dispatching events to the handler until the
    /// connection is lost for good.
    pub async fn run<H: Handler>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            let event = self.next_event().await?;
            dispatch(handler, event).await;
        }
    }

    async fn send_intent(&mut self, intent: ClientIntent) -> Result<()> {
        match &intent {
            ClientIntent::JoinBattle {
                trainer_name,
                player_number,
                ..
            }
            | ClientIntent::RejoinBattle {
                trainer_name,
                player_number,
            } => {
                self.connection
                    .set_identity(trainer_name.clone(), *player_number);
            }
            _ => {}
        }
        self.connection.send(intent.to_wire_format()).await
    }
}

async fn dispatch<H: Handler>(handler: &mut H, event: ServerEvent) {
    match event {
        ServerEvent::WaitingForOpponent => handler.on_waiting().await,
        ServerEvent::BattleStart(snapshot) => handler.on_battle_start(&snapshot).await,
        ServerEvent::BattleUpdate(snapshot) => handler.on_battle_update(&snapshot).await,
        ServerEvent::BattleEnd(snapshot) => handler.on_battle_end(&snapshot).await,
        ServerEvent::OpponentDisconnected => handler.on_opponent_disconnected().await,
        ServerEvent::Rejected { reason } => handler.on_rejected(reason).await,
    }
}
