//! Websocket gateway between sockets and the battle coordinator.
//!
//! Each accepted socket gets a reader task and a writer task. Readers parse
//! text frames into intents and funnel them over a single channel into the
//! coordinator task, which owns all battle state and runs one command at a
//! time. Outbound events travel back through per-connection channels, so a
//! slow or dead socket never blocks the coordinator.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};

use combate_battle::{ConnectionId, Coordinator, EventSink, SessionId};
use combate_protocol::{parse_intent, ClientIntent, RejectReason, ServerEvent};

/// How often the coordinator checks turn deadlines.
const TIMER_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Inbound gateway traffic, funneled into the coordinator task.
enum GatewayCommand {
    Connected(ConnectionId, UnboundedSender<Message>),
    Intent(ConnectionId, ClientIntent),
    Malformed(ConnectionId),
    Disconnected(ConnectionId),
}

/// Accept connections forever, routing them into one coordinator task.
pub async fn run(listener: TcpListener, turn_timeout: Option<Duration>) -> Result<()> {
    let (commands, inbox) = mpsc::unbounded_channel();
    tokio::spawn(coordinator_task(inbox, turn_timeout));

    let mut next_conn = 0u64;
    loop {
        let (stream, peer) = listener.accept().await?;
        next_conn += 1;
        let conn = ConnectionId(next_conn);
        tracing::debug!(conn = conn.0, %peer, "connection accepted");
        tokio::spawn(serve_connection(stream, conn, commands.clone()));
    }
}

/// Websocket handshake plus the reader loop for one socket.
async fn serve_connection(
    stream: TcpStream,
    conn: ConnectionId,
    commands: UnboundedSender<GatewayCommand>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(conn = conn.0, error = %e, "websocket handshake failed");
            return;
        }
    };
    let (mut ws_tx, mut ws_rx) = ws.split();

    // The writer task owns the sink; everyone else sends through the channel.
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<Message>();
    tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    if commands
        .send(GatewayCommand::Connected(conn, outbox.clone()))
        .is_err()
    {
        return;
    }

    while let Some(frame) = ws_rx.next().await {
        let command = match frame {
            Ok(Message::Text(text)) => match parse_intent(&text) {
                Ok(intent) => GatewayCommand::Intent(conn, intent),
                Err(e) => {
                    tracing::warn!(conn = conn.0, error = %e, "unparseable frame");
                    GatewayCommand::Malformed(conn)
                }
            },
            Ok(Message::Ping(data)) => {
                let _ = outbox.send(Message::Pong(data));
                continue;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(conn = conn.0, error = %e, "websocket read error");
                break;
            }
        };
        if commands.send(command).is_err() {
            return;
        }
    }

    let _ = commands.send(GatewayCommand::Disconnected(conn));
    tracing::debug!(conn = conn.0, "connection closed");
}

/// Routes coordinator events into per-connection outboxes. Sends to sockets
/// that already hung up are dropped silently; the disconnect command that
/// follows cleans up the battle.
struct ChannelSink {
    writers: HashMap<ConnectionId, UnboundedSender<Message>>,
}

impl EventSink for ChannelSink {
    fn send(&mut self, to: ConnectionId, event: ServerEvent) {
        let Some(writer) = self.writers.get(&to) else {
            tracing::debug!(conn = to.0, "no writer for event, dropping");
            return;
        };
        let _ = writer.send(Message::Text(event.to_wire_format()));
    }
}

/// The single task that owns the coordinator and all battle state.
async fn coordinator_task(
    mut inbox: UnboundedReceiver<GatewayCommand>,
    turn_timeout: Option<Duration>,
) {
    let mut coordinator = Coordinator::new();
    let mut sink = ChannelSink {
        writers: HashMap::new(),
    };
    let mut deadlines: HashMap<SessionId, (u8, Instant)> = HashMap::new();
    let mut sweep = tokio::time::interval(TIMER_SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = inbox.recv() => {
                let Some(command) = command else { break };
                match command {
                    GatewayCommand::Connected(conn, writer) => {
                        sink.writers.insert(conn, writer);
                    }
                    GatewayCommand::Intent(conn, intent) => {
                        coordinator.handle_intent(conn, intent, &mut sink);
                    }
                    GatewayCommand::Malformed(conn) => {
                        sink.send(conn, ServerEvent::Rejected {
                            reason: RejectReason::MalformedIntent,
                        });
                    }
                    GatewayCommand::Disconnected(conn) => {
                        coordinator.handle_disconnect(conn, &mut sink);
                        sink.writers.remove(&conn);
                    }
                }
            }
            _ = sweep.tick(), if turn_timeout.is_some() => {
                let budget = turn_timeout.unwrap_or_default();
                sweep_turn_deadlines(&mut coordinator, &mut deadlines, budget, &mut sink);
            }
        }
    }
}

/// Arm a deadline whenever a session's turn changes; fire a forfeit when one
/// holds past the budget.
fn sweep_turn_deadlines(
    coordinator: &mut Coordinator,
    deadlines: &mut HashMap<SessionId, (u8, Instant)>,
    budget: Duration,
    sink: &mut ChannelSink,
) {
    let now = Instant::now();
    let live: Vec<(SessionId, u8)> = coordinator
        .store()
        .live_sessions()
        .map(|s| (s.id, s.turn))
        .collect();
    deadlines.retain(|id, _| live.iter().any(|(live_id, _)| live_id == id));

    let mut expired = Vec::new();
    for (id, turn) in live {
        match deadlines.get(&id) {
            Some(&(armed_turn, deadline)) if armed_turn == turn => {
                if now >= deadline {
                    expired.push((id, turn));
                }
            }
            _ => {
                deadlines.insert(id, (turn, now + budget));
            }
        }
    }

    for (id, turn) in expired {
        coordinator.handle_turn_timeout(id, turn, sink);
        deadlines.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combate_protocol::parse_event;
    use tokio::time::timeout;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_server(turn_timeout: Option<Duration>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(run(listener, turn_timeout));
        format!("ws://{addr}")
    }

    async fn connect(url: &str) -> ClientWs {
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    async fn send(ws: &mut ClientWs, intent: &ClientIntent) {
        ws.send(Message::Text(intent.to_wire_format()))
            .await
            .unwrap();
    }

    async fn next_event(ws: &mut ClientWs) -> ServerEvent {
        loop {
            let frame = timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for an event")
                .expect("socket closed")
                .unwrap();
            if let Message::Text(text) = frame {
                return parse_event(&text).unwrap();
            }
        }
    }

    fn join(name: &str, number: u8) -> ClientIntent {
        ClientIntent::JoinBattle {
            trainer_name: name.into(),
            player_number: number,
            team: vec![],
            battle_mode: 1,
        }
    }

    #[tokio::test]
    async fn first_join_waits_for_an_opponent() {
        let url = start_server(None).await;
        let mut ws = connect(&url).await;
        send(&mut ws, &join("Ash", 1)).await;
        assert_eq!(next_event(&mut ws).await, ServerEvent::WaitingForOpponent);
    }

    #[tokio::test]
    async fn unparseable_frames_draw_a_rejection() {
        let url = start_server(None).await;
        let mut ws = connect(&url).await;
        ws.send(Message::Text("not json".into())).await.unwrap();
        assert_eq!(
            next_event(&mut ws).await,
            ServerEvent::Rejected {
                reason: RejectReason::MalformedIntent
            }
        );
    }

    #[tokio::test]
    async fn pairing_reaches_both_sockets() {
        let url = start_server(None).await;
        let mut p1 = connect(&url).await;
        let mut p2 = connect(&url).await;

        send(&mut p1, &join("Ash", 1)).await;
        assert_eq!(next_event(&mut p1).await, ServerEvent::WaitingForOpponent);

        send(&mut p2, &join("Gary", 2)).await;
        for ws in [&mut p1, &mut p2] {
            let event = next_event(ws).await;
            let snapshot = event.snapshot().expect("pairing broadcasts a snapshot");
            assert_eq!(snapshot.player1.name, "Ash");
            assert_eq!(snapshot.player2.name, "Gary");
        }
    }

    #[tokio::test]
    async fn disconnect_notifies_the_partner() {
        let url = start_server(None).await;
        let mut p1 = connect(&url).await;
        let mut p2 = connect(&url).await;

        send(&mut p1, &join("Ash", 1)).await;
        assert_eq!(next_event(&mut p1).await, ServerEvent::WaitingForOpponent);
        send(&mut p2, &join("Gary", 2)).await;
        next_event(&mut p1).await;
        next_event(&mut p2).await;

        drop(p2);
        assert_eq!(next_event(&mut p1).await, ServerEvent::OpponentDisconnected);
    }
}
