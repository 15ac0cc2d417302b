//! The battle coordinator: a single-threaded state machine over the
//! session store.
//!
//! Every inbound gateway event runs to completion before the next one is
//! handled, so the store needs no locking. Outbound events go through the
//! [`EventSink`] seam, which the server implements with per-connection
//! channels and tests implement with a plain Vec.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use combate_protocol::{ClientIntent, Pokemon, RejectReason, ServerEvent};

use crate::session::{AttackOutcome, ConnectionId, SessionId, Slot, FREE_MODE};
use crate::store::{QueuedJoin, Selection, SessionStore};

/// Delivery seam for outbound events. Sends are fire-and-forget: the
/// coordinator never waits on delivery.
pub trait EventSink {
    fn send(&mut self, to: ConnectionId, event: ServerEvent);
}

pub struct Coordinator<R: Rng = StdRng> {
    store: SessionStore,
    rng: R,
}

impl Coordinator<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for Coordinator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Coordinator<R> {
    /// Build a coordinator with an injected RNG (seedable for tests).
    pub fn with_rng(rng: R) -> Self {
        Self {
            store: SessionStore::new(),
            rng,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Handle one inbound intent from a connection.
    pub fn handle_intent(
        &mut self,
        conn: ConnectionId,
        intent: ClientIntent,
        sink: &mut impl EventSink,
    ) {
        match intent {
            ClientIntent::JoinBattle {
                trainer_name,
                player_number,
                team,
                battle_mode,
            } => self.handle_join(conn, trainer_name, player_number, team, battle_mode, sink),
            ClientIntent::RejoinBattle {
                trainer_name,
                player_number,
            } => self.handle_rejoin(conn, trainer_name, player_number, sink),
            ClientIntent::SelectPokemon {
                player_number,
                pokemon,
            } => self.handle_select(conn, player_number, pokemon, sink),
            ClientIntent::Attack {
                player_number,
                move_name,
            } => self.handle_attack(conn, player_number, &move_name, sink),
        }
    }

    fn handle_join(
        &mut self,
        conn: ConnectionId,
        trainer_name: String,
        player_number: u8,
        team: Vec<Pokemon>,
        battle_mode: u8,
        sink: &mut impl EventSink,
    ) {
        let Some(requested_slot) = Slot::from_number(player_number) else {
            self.reject(conn, RejectReason::MalformedIntent, sink);
            return;
        };
        if self.store.is_queued(conn) || self.store.session_of_conn(conn).is_some() {
            tracing::debug!(conn = conn.0, "join from a connection already queued or in a battle, dropped");
            return;
        }

        tracing::info!(trainer = %trainer_name, slot = player_number, "trainer joined matchmaking");
        let paired = self.store.enqueue(QueuedJoin {
            conn,
            trainer_name,
            team,
            requested_slot,
            requested_mode: battle_mode,
        });

        match paired {
            None => sink.send(conn, ServerEvent::WaitingForOpponent),
            Some(id) => {
                let pending = self.store.pending(id).expect("freshly paired");
                let snapshot = pending.snapshot();
                let conns = [pending.slots[0].conn, pending.slots[1].conn];
                tracing::info!(
                    session = id.0,
                    p1 = %pending.slots[0].trainer_name,
                    p2 = %pending.slots[1].trainer_name,
                    mode = pending.battle_mode,
                    "trainers paired"
                );
                for c in conns {
                    sink.send(c, ServerEvent::BattleUpdate(snapshot.clone()));
                }
            }
        }
    }

    fn handle_rejoin(
        &mut self,
        conn: ConnectionId,
        trainer_name: String,
        player_number: u8,
        sink: &mut impl EventSink,
    ) {
        let Some(slot) = Slot::from_number(player_number) else {
            self.reject(conn, RejectReason::MalformedIntent, sink);
            return;
        };

        if let Some(id) = self.store.rejoinable_session(slot, &trainer_name) {
            // The battle is still live: rebind the slot to the new
            // connection and replay the last persisted snapshot. Turn
            // and HP are untouched.
            self.store.rebind_conn(id, slot, conn);
            let snapshot = self
                .store
                .reconnect_snapshot(slot, &trainer_name)
                .expect("persisted at battle start")
                .clone();
            tracing::info!(session = id.0, trainer = %trainer_name, "trainer rejoined live battle");
            sink.send(conn, ServerEvent::BattleUpdate(snapshot));
            return;
        }

        // Nothing to rejoin: treat as a fresh join with an empty team.
        self.handle_join(conn, trainer_name, player_number, Vec::new(), 1, sink);
    }

    fn handle_select(
        &mut self,
        conn: ConnectionId,
        player_number: u8,
        pokemon: Pokemon,
        sink: &mut impl EventSink,
    ) {
        let Some(id) = self.store.session_of_conn(conn) else {
            self.reject(conn, RejectReason::NoBattle, sink);
            return;
        };
        if self.store.session(id).is_some() {
            // Battle already started; the active Pokemon is locked in.
            self.reject(conn, RejectReason::AlreadySelected, sink);
            return;
        }
        let Some(pending) = self.store.pending_mut(id) else {
            self.reject(conn, RejectReason::NoBattle, sink);
            return;
        };
        let Some(slot) = pending.slot_of_conn(conn) else {
            self.reject(conn, RejectReason::NoBattle, sink);
            return;
        };
        if slot.number() != player_number {
            self.reject(conn, RejectReason::WrongSlot, sink);
            return;
        }
        if pending.slot(slot).selected.is_some() {
            self.reject(conn, RejectReason::AlreadySelected, sink);
            return;
        }

        let side = pending.slot_mut(slot);
        let adopted = side.team.is_empty();
        if adopted {
            // The original client sends the full Pokemon object; a trainer
            // who joined without a roster adopts it as a team of one.
            side.team.push(pokemon.clone());
        }
        let active_index = side
            .team
            .iter()
            .position(|p| p.id == pokemon.id && p.nickname == pokemon.nickname)
            .or_else(|| side.team.iter().position(|p| p.id == pokemon.id))
            .unwrap_or(0);
        let hp = side.team[active_index].hp_total();
        side.selected = Some(Selection { active_index, hp });
        if adopted && pending.battle_mode != FREE_MODE {
            // An adopted roster has one member, so the mode can no
            // longer exceed one on either side.
            pending.battle_mode = 1;
        }
        tracing::debug!(session = id.0, slot = player_number, "pokemon selected");

        if !pending.both_selected() {
            return;
        }

        let session = self
            .store
            .start_battle(id)
            .expect("both slots selected");
        tracing::info!(session = id.0, "battle started");
        let snapshot = session.snapshot();
        let conns = [session.slots[0].conn, session.slots[1].conn];
        self.store.persist_snapshots(id);
        for c in conns {
            sink.send(c, ServerEvent::BattleStart(snapshot.clone()));
        }
    }

    fn handle_attack(
        &mut self,
        conn: ConnectionId,
        player_number: u8,
        move_name: &str,
        sink: &mut impl EventSink,
    ) {
        let Some(id) = self.store.session_of_conn(conn) else {
            self.reject(conn, RejectReason::NoBattle, sink);
            return;
        };
        let Some(session) = self.store.session_mut(id) else {
            // Still selecting Pokemon.
            self.reject(conn, RejectReason::NoBattle, sink);
            return;
        };
        let Some(slot) = session.slot_of_conn(conn) else {
            self.reject(conn, RejectReason::NoBattle, sink);
            return;
        };
        if slot.number() != player_number {
            self.reject(conn, RejectReason::WrongSlot, sink);
            return;
        }
        if session.is_finished() || session.turn != slot.number() {
            self.reject(conn, RejectReason::NotYourTurn, sink);
            return;
        }

        let outcome = session.apply_attack(slot, move_name, &mut self.rng);
        let snapshot = session.snapshot();
        let conns = [session.slots[0].conn, session.slots[1].conn];

        match outcome {
            AttackOutcome::Hit | AttackOutcome::Fainted => {
                self.store.persist_snapshots(id);
                for c in conns {
                    sink.send(c, ServerEvent::BattleUpdate(snapshot.clone()));
                }
            }
            AttackOutcome::Won => {
                tracing::info!(
                    session = id.0,
                    winner = snapshot.winner.as_deref().unwrap_or(""),
                    "battle finished"
                );
                for c in conns {
                    sink.send(c, ServerEvent::BattleEnd(snapshot.clone()));
                }
                self.store.clear_reconnect(id);
                self.store.remove_battle(id);
            }
        }
    }

    /// Handle a transport-level disconnect.
    pub fn handle_disconnect(&mut self, conn: ConnectionId, sink: &mut impl EventSink) {
        if let Some(removed) = self.store.dequeue_conn(conn) {
            tracing::info!(trainer = %removed.trainer_name, "queued trainer disconnected");
            self.store
                .clear_reconnect_for(removed.requested_slot, &removed.trainer_name);
            return;
        }

        let Some(id) = self.store.session_of_conn(conn) else {
            tracing::debug!(conn = conn.0, "disconnect from unknown connection");
            return;
        };

        // Work out who to notify before tearing the battle down. No win
        // is awarded server-side; the survivor only learns the opponent
        // left.
        let partner = if let Some(session) = self.store.session(id) {
            session
                .slot_of_conn(conn)
                .map(|slot| session.slot(slot.other()).conn)
        } else {
            self.store
                .pending(id)
                .and_then(|p| p.slot_of_conn(conn).map(|slot| p.slot(slot.other()).conn))
        };

        tracing::info!(session = id.0, conn = conn.0, "participant disconnected, battle dropped");
        self.store.clear_reconnect(id);
        self.store.remove_battle(id);
        if let Some(partner) = partner {
            sink.send(partner, ServerEvent::OpponentDisconnected);
        }
    }

    /// End a battle whose current player stalled past the turn deadline.
    ///
    /// `expected_turn` is the turn number observed when the timer was
    /// armed; a stale timer (the turn has since advanced) is a no-op.
    pub fn handle_turn_timeout(
        &mut self,
        id: SessionId,
        expected_turn: u8,
        sink: &mut impl EventSink,
    ) {
        let Some(session) = self.store.session_mut(id) else {
            return;
        };
        if session.is_finished() || session.turn != expected_turn {
            return;
        }
        let Some(stalled) = Slot::from_number(session.turn) else {
            return;
        };

        let stalled_name = session.slot(stalled).trainer_name.clone();
        let winner = session.slot(stalled.other()).trainer_name.clone();
        session.log.push(format!("{} ran out of time!", stalled_name));
        session.log.push(format!("{} wins the battle!", winner));
        session.winner = Some(winner);

        let snapshot = session.snapshot();
        let conns = [session.slots[0].conn, session.slots[1].conn];
        tracing::info!(session = id.0, stalled = %stalled_name, "turn timer expired");
        for c in conns {
            sink.send(c, ServerEvent::BattleEnd(snapshot.clone()));
        }
        self.store.clear_reconnect(id);
        self.store.remove_battle(id);
    }

    fn reject(&self, conn: ConnectionId, reason: RejectReason, sink: &mut impl EventSink) {
        tracing::debug!(conn = conn.0, ?reason, "intent rejected");
        sink.send(conn, ServerEvent::Rejected { reason });
    }
}
