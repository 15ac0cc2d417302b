//! In-memory store for matchmaking, sessions, and reconnection snapshots.
//!
//! The store has no concurrency of its own: every operation is synchronous
//! and is only ever called from the coordinator's single-threaded event
//! loop. Sessions are keyed by id, so any number of battles can run at
//! once; pairing goes through an explicit FIFO queue rather than a fixed
//! room of two.

use std::collections::{HashMap, VecDeque};

use combate_protocol::{BattleSnapshot, PlayerSnapshot, Pokemon};

use crate::session::{
    BattleSession, ConnectionId, FREE_MODE, PlayerSlot, SessionId, Slot, negotiate_mode,
};

/// A trainer waiting in the matchmaking queue.
#[derive(Debug, Clone)]
pub struct QueuedJoin {
    pub conn: ConnectionId,
    pub trainer_name: String,
    pub team: Vec<Pokemon>,
    pub requested_slot: Slot,
    pub requested_mode: u8,
}

/// The Pokemon a pending slot has committed to the battle.
#[derive(Debug, Clone)]
pub struct Selection {
    pub active_index: usize,
    pub hp: u32,
}

/// One side of a paired battle that has not started yet.
#[derive(Debug, Clone)]
pub struct PendingSlot {
    pub conn: ConnectionId,
    pub trainer_name: String,
    pub team: Vec<Pokemon>,
    pub selected: Option<Selection>,
}

/// A matched pair whose players are still selecting their Pokemon.
#[derive(Debug, Clone)]
pub struct PendingBattle {
    pub id: SessionId,
    pub slots: [PendingSlot; 2],
    pub battle_mode: u8,
    pub log: Vec<String>,
}

impl PendingBattle {
    pub fn slot(&self, slot: Slot) -> &PendingSlot {
        &self.slots[slot.index()]
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut PendingSlot {
        &mut self.slots[slot.index()]
    }

    pub fn slot_of_conn(&self, conn: ConnectionId) -> Option<Slot> {
        if self.slots[0].conn == conn {
            Some(Slot::P1)
        } else if self.slots[1].conn == conn {
            Some(Slot::P2)
        } else {
            None
        }
    }

    pub fn both_selected(&self) -> bool {
        self.slots.iter().all(|s| s.selected.is_some())
    }

    /// Pre-battle snapshot: no active Pokemon revealed yet, turn fixed at 1.
    pub fn snapshot(&self) -> BattleSnapshot {
        let player = |slot: &PendingSlot| PlayerSnapshot {
            name: slot.trainer_name.clone(),
            pokemon: None,
            hp: slot.selected.as_ref().map(|s| s.hp).unwrap_or(0),
            max_hp: slot.selected.as_ref().map(|s| s.hp).unwrap_or(0),
            remaining_pokemon: battle_len(self.battle_mode, slot.team.len()) as u32,
            defeated_count: 0,
        };
        BattleSnapshot {
            player1: player(&self.slots[0]),
            player2: player(&self.slots[1]),
            battle_mode: self.battle_mode,
            turn: 1,
            log: self.log.clone(),
            winner: None,
        }
    }

    /// Convert into a live session. Callers must have checked
    /// `both_selected` first.
    fn into_session(self) -> BattleSession {
        let battle_mode = self.battle_mode;
        let make = |pending: PendingSlot| {
            let selection = pending.selected.expect("both slots selected");
            let battle_len = battle_len(battle_mode, pending.team.len());
            PlayerSlot {
                conn: pending.conn,
                trainer_name: pending.trainer_name,
                team: pending.team,
                battle_len,
                active_index: selection.active_index,
                current_hp: selection.hp,
                max_hp: selection.hp,
                remaining: battle_len as u32,
                defeated: 0,
            }
        };
        let [p1, p2] = self.slots;
        BattleSession {
            id: self.id,
            slots: [make(p1), make(p2)],
            battle_mode,
            turn: 1,
            log: self.log,
            winner: None,
        }
    }
}

/// How many of a team's Pokemon are in play for a given mode.
fn battle_len(mode: u8, team_size: usize) -> usize {
    if mode == FREE_MODE {
        team_size
    } else {
        (mode as usize).min(team_size)
    }
}

/// Everything the coordinator holds between events.
#[derive(Debug, Default)]
pub struct SessionStore {
    next_session_id: u64,
    /// FIFO of trainers waiting to be paired.
    queue: VecDeque<QueuedJoin>,
    /// Paired battles still in Pokemon selection.
    pending: HashMap<SessionId, PendingBattle>,
    /// Battles in progress.
    sessions: HashMap<SessionId, BattleSession>,
    /// Routing: which pending or active battle a connection belongs to.
    by_conn: HashMap<ConnectionId, SessionId>,
    /// Last known snapshot per participant, for reconnection.
    reconnect: HashMap<(SessionId, Slot), BattleSnapshot>,
    /// Lookup from a rejoin intent (which carries no session id) to the
    /// session the trainer last occupied.
    trainer_index: HashMap<(u8, String), SessionId>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Matchmaking queue ===

    /// Enqueue a join. Returns the paired battle id once two trainers are
    /// waiting, or None while the joiner is alone.
    pub fn enqueue(&mut self, join: QueuedJoin) -> Option<SessionId> {
        self.queue.push_back(join);
        if self.queue.len() < 2 {
            return None;
        }

        let first = self.queue.pop_front().expect("queue has two entries");
        let second = self.queue.pop_front().expect("queue has two entries");
        Some(self.pair(first, second))
    }

    /// Remove a queued joiner by connection, returning the removed entry.
    pub fn dequeue_conn(&mut self, conn: ConnectionId) -> Option<QueuedJoin> {
        let pos = self.queue.iter().position(|j| j.conn == conn)?;
        self.queue.remove(pos)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, conn: ConnectionId) -> bool {
        self.queue.iter().any(|j| j.conn == conn)
    }

    /// Pair two queued joins into a pending battle. Slot assignment honors
    /// the requested player numbers; when both asked for the same one, the
    /// earlier joiner keeps it and the later one takes the other.
    fn pair(&mut self, first: QueuedJoin, second: QueuedJoin) -> SessionId {
        self.next_session_id += 1;
        let id = SessionId(self.next_session_id);

        // The earlier joiner always gets the slot it asked for; the later
        // one takes whatever is left, which also settles conflicts.
        let (p1, p2) = match first.requested_slot {
            Slot::P1 => (first, second),
            Slot::P2 => (second, first),
        };

        let battle_mode = negotiate_mode(
            [p1.requested_mode, p2.requested_mode],
            [p1.team.len(), p2.team.len()],
        );

        let mode_label = if battle_mode == FREE_MODE {
            "free mode".to_string()
        } else {
            format!("{battle_mode} vs {battle_mode}")
        };
        let log = vec![
            "A battle is about to begin!".to_string(),
            format!(
                "{} vs {}! ({})",
                p1.trainer_name, p2.trainer_name, mode_label
            ),
        ];

        let pending = PendingBattle {
            id,
            slots: [p1, p2].map(|j| PendingSlot {
                conn: j.conn,
                trainer_name: j.trainer_name,
                team: j.team,
                selected: None,
            }),
            battle_mode,
            log,
        };

        self.by_conn.insert(pending.slots[0].conn, id);
        self.by_conn.insert(pending.slots[1].conn, id);
        self.pending.insert(id, pending);
        id
    }

    // === Pending battles ===

    pub fn pending(&self, id: SessionId) -> Option<&PendingBattle> {
        self.pending.get(&id)
    }

    pub fn pending_mut(&mut self, id: SessionId) -> Option<&mut PendingBattle> {
        self.pending.get_mut(&id)
    }

    /// Promote a fully-selected pending battle into a live session.
    pub fn start_battle(&mut self, id: SessionId) -> Option<&BattleSession> {
        let pending = self.pending.get(&id)?;
        if !pending.both_selected() {
            return None;
        }
        let pending = self.pending.remove(&id).expect("checked above");
        let session = pending.into_session();
        self.sessions.insert(id, session);
        self.sessions.get(&id)
    }

    // === Active sessions ===

    pub fn session(&self, id: SessionId) -> Option<&BattleSession> {
        self.sessions.get(&id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut BattleSession> {
        self.sessions.get_mut(&id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Iterate over every live session, e.g. for turn-timer sweeps.
    pub fn live_sessions(&self) -> impl Iterator<Item = &BattleSession> {
        self.sessions.values()
    }

    /// The pending or active battle a connection belongs to.
    pub fn session_of_conn(&self, conn: ConnectionId) -> Option<SessionId> {
        self.by_conn.get(&conn).copied()
    }

    /// Rebind a slot's connection after a rejoin. Keeps routing in sync.
    pub fn rebind_conn(&mut self, id: SessionId, slot: Slot, new_conn: ConnectionId) {
        if let Some(session) = self.sessions.get_mut(&id) {
            let old = session.slot(slot).conn;
            self.by_conn.remove(&old);
            session.slot_mut(slot).conn = new_conn;
            self.by_conn.insert(new_conn, id);
        }
    }

    /// Drop a pending or active battle and its routing entries. Returns
    /// the removed session, if it was live.
    pub fn remove_battle(&mut self, id: SessionId) -> Option<BattleSession> {
        if let Some(pending) = self.pending.remove(&id) {
            for slot in &pending.slots {
                self.by_conn.remove(&slot.conn);
            }
            return None;
        }
        let session = self.sessions.remove(&id);
        if let Some(session) = &session {
            for slot in &session.slots {
                self.by_conn.remove(&slot.conn);
            }
        }
        session
    }

    // === Reconnection index ===

    /// Persist a session's snapshot for both participants. Called after
    /// every state mutation.
    pub fn persist_snapshots(&mut self, id: SessionId) {
        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        let snapshot = session.snapshot();
        for slot in [Slot::P1, Slot::P2] {
            self.reconnect.insert((id, slot), snapshot.clone());
            self.trainer_index.insert(
                (slot.number(), session.slot(slot).trainer_name.clone()),
                id,
            );
        }
    }

    /// Look up the last snapshot stored for a trainer in a given slot.
    pub fn reconnect_snapshot(&self, slot: Slot, trainer_name: &str) -> Option<&BattleSnapshot> {
        let id = self
            .trainer_index
            .get(&(slot.number(), trainer_name.to_string()))?;
        self.reconnect.get(&(*id, slot))
    }

    /// The live session a trainer can rejoin, if one still exists.
    pub fn rejoinable_session(&self, slot: Slot, trainer_name: &str) -> Option<SessionId> {
        let id = self
            .trainer_index
            .get(&(slot.number(), trainer_name.to_string()))?;
        let session = self.sessions.get(id)?;
        (session.slot(slot).trainer_name == trainer_name).then_some(*id)
    }

    /// Remove every reconnection entry tied to a session.
    pub fn clear_reconnect(&mut self, id: SessionId) {
        for slot in [Slot::P1, Slot::P2] {
            if let Some(snapshot) = self.reconnect.remove(&(id, slot)) {
                let name = match slot {
                    Slot::P1 => snapshot.player1.name,
                    Slot::P2 => snapshot.player2.name,
                };
                self.trainer_index.remove(&(slot.number(), name));
            }
        }
    }

    /// Remove the reconnection entries of a single trainer.
    pub fn clear_reconnect_for(&mut self, slot: Slot, trainer_name: &str) {
        if let Some(id) = self
            .trainer_index
            .remove(&(slot.number(), trainer_name.to_string()))
        {
            self.reconnect.remove(&(id, slot));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(conn: u64, name: &str, slot: u8, mode: u8) -> QueuedJoin {
        QueuedJoin {
            conn: ConnectionId(conn),
            trainer_name: name.into(),
            team: Vec::new(),
            requested_slot: Slot::from_number(slot).unwrap(),
            requested_mode: mode,
        }
    }

    #[test]
    fn lone_joiner_waits() {
        let mut store = SessionStore::new();
        assert_eq!(store.enqueue(join(1, "Ash", 1, 1)), None);
        assert_eq!(store.queue_len(), 1);
    }

    #[test]
    fn two_joiners_are_paired_fifo() {
        let mut store = SessionStore::new();
        store.enqueue(join(1, "Ash", 1, 1));
        let id = store.enqueue(join(2, "Gary", 2, 1)).unwrap();

        let pending = store.pending(id).unwrap();
        assert_eq!(pending.slots[0].trainer_name, "Ash");
        assert_eq!(pending.slots[1].trainer_name, "Gary");
        assert_eq!(store.session_of_conn(ConnectionId(1)), Some(id));
        assert_eq!(store.session_of_conn(ConnectionId(2)), Some(id));
        assert_eq!(store.queue_len(), 0);
    }

    #[test]
    fn slot_conflict_favors_earlier_joiner() {
        let mut store = SessionStore::new();
        store.enqueue(join(1, "Ash", 2, 1));
        let id = store.enqueue(join(2, "Gary", 2, 1)).unwrap();

        let pending = store.pending(id).unwrap();
        assert_eq!(pending.slots[1].trainer_name, "Ash");
        assert_eq!(pending.slots[0].trainer_name, "Gary");
    }

    #[test]
    fn dequeue_removes_waiting_conn() {
        let mut store = SessionStore::new();
        store.enqueue(join(1, "Ash", 1, 1));
        let removed = store.dequeue_conn(ConnectionId(1)).unwrap();
        assert_eq!(removed.trainer_name, "Ash");
        assert!(store.dequeue_conn(ConnectionId(1)).is_none());
        assert_eq!(store.queue_len(), 0);
    }

    #[test]
    fn start_battle_requires_both_selections() {
        let mut store = SessionStore::new();
        store.enqueue(join(1, "Ash", 1, 1));
        let id = store.enqueue(join(2, "Gary", 2, 1)).unwrap();

        assert!(store.start_battle(id).is_none());

        {
            let pending = store.pending_mut(id).unwrap();
            pending.slots[0].selected = Some(Selection {
                active_index: 0,
                hp: 100,
            });
            pending.slots[1].selected = Some(Selection {
                active_index: 0,
                hp: 90,
            });
        }
        let session = store.start_battle(id).unwrap();
        assert_eq!(session.turn, 1);
        assert_eq!(session.slots[1].max_hp, 90);
        assert!(store.pending(id).is_none());
    }

    #[test]
    fn sessions_are_independent() {
        let mut store = SessionStore::new();
        store.enqueue(join(1, "Ash", 1, 1));
        let a = store.enqueue(join(2, "Gary", 2, 1)).unwrap();
        store.enqueue(join(3, "Misty", 1, 1));
        let b = store.enqueue(join(4, "Brock", 2, 1)).unwrap();

        assert_ne!(a, b);
        assert_eq!(store.session_of_conn(ConnectionId(3)), Some(b));
        store.remove_battle(a);
        assert!(store.session_of_conn(ConnectionId(1)).is_none());
        assert_eq!(store.session_of_conn(ConnectionId(4)), Some(b));
    }

    #[test]
    fn reconnect_round_trip() {
        let mut store = SessionStore::new();
        store.enqueue(join(1, "Ash", 1, 1));
        let id = store.enqueue(join(2, "Gary", 2, 1)).unwrap();
        {
            let pending = store.pending_mut(id).unwrap();
            for slot in &mut pending.slots {
                slot.selected = Some(Selection {
                    active_index: 0,
                    hp: 100,
                });
            }
        }
        store.start_battle(id).unwrap();
        store.persist_snapshots(id);

        let snap = store.reconnect_snapshot(Slot::P1, "Ash").unwrap();
        assert_eq!(snap.player1.name, "Ash");
        assert_eq!(store.rejoinable_session(Slot::P1, "Ash"), Some(id));
        assert!(store.reconnect_snapshot(Slot::P1, "Gary").is_none());

        store.clear_reconnect(id);
        assert!(store.reconnect_snapshot(Slot::P1, "Ash").is_none());
        assert!(store.rejoinable_session(Slot::P2, "Gary").is_none());
    }

    #[test]
    fn clear_reconnect_for_single_trainer() {
        let mut store = SessionStore::new();
        store.enqueue(join(1, "Ash", 1, 1));
        let id = store.enqueue(join(2, "Gary", 2, 1)).unwrap();
        {
            let pending = store.pending_mut(id).unwrap();
            for slot in &mut pending.slots {
                slot.selected = Some(Selection {
                    active_index: 0,
                    hp: 100,
                });
            }
        }
        store.start_battle(id).unwrap();
        store.persist_snapshots(id);

        store.clear_reconnect_for(Slot::P1, "Ash");
        assert!(store.reconnect_snapshot(Slot::P1, "Ash").is_none());
        assert!(store.reconnect_snapshot(Slot::P2, "Gary").is_some());
    }
}
