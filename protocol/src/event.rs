//! Events the battle service pushes to clients, and the battle snapshot
//! they carry.

use serde::{Deserialize, Serialize};

use crate::pokemon::Pokemon;

/// One player's visible state inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub name: String,
    /// The active Pokemon, absent while the player is still selecting.
    pub pokemon: Option<Pokemon>,
    pub hp: u32,
    pub max_hp: u32,
    pub remaining_pokemon: u32,
    pub defeated_count: u32,
}

/// The full serializable battle state sent to clients after any mutation.
///
/// The log is append-only and never truncated here; clients may display
/// only a tail of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleSnapshot {
    pub player1: PlayerSnapshot,
    pub player2: PlayerSnapshot,
    pub battle_mode: u8,
    pub turn: u8,
    pub log: Vec<String>,
    pub winner: Option<String>,
}

/// Why an intent was rejected instead of applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// Attack sent while it is the opponent's turn.
    NotYourTurn,
    /// No battle exists for this connection.
    NoBattle,
    /// The player number in the payload does not match the slot the
    /// connection occupies.
    WrongSlot,
    /// A Pokemon was already selected for this battle.
    AlreadySelected,
    /// The frame could not be parsed.
    MalformedIntent,
}

/// An outbound server event, tagged with the original socket event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    WaitingForOpponent,
    BattleStart(BattleSnapshot),
    BattleUpdate(BattleSnapshot),
    BattleEnd(BattleSnapshot),
    OpponentDisconnected,
    #[serde(rename_all = "camelCase")]
    Rejected { reason: RejectReason },
}

impl ServerEvent {
    /// Serialize to a websocket text frame.
    pub fn to_wire_format(&self) -> String {
        serde_json::to_string(self).expect("event serialization cannot fail")
    }

    /// The snapshot carried by this event, if any.
    pub fn snapshot(&self) -> Option<&BattleSnapshot> {
        match self {
            ServerEvent::BattleStart(s)
            | ServerEvent::BattleUpdate(s)
            | ServerEvent::BattleEnd(s) => Some(s),
            _ => None,
        }
    }
}
