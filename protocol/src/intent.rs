//! Intents a client can send to the battle service.

use serde::{Deserialize, Serialize};

use crate::pokemon::Pokemon;

fn default_battle_mode() -> u8 {
    1
}

/// An inbound player intent, tagged with the original socket event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientIntent {
    /// Enter matchmaking with a team and a requested battle mode.
    ///
    /// `battle_mode` 0 means free mode (full roster); 1..6 means N vs N.
    #[serde(rename_all = "camelCase")]
    JoinBattle {
        trainer_name: String,
        player_number: u8,
        #[serde(default)]
        team: Vec<Pokemon>,
        #[serde(default = "default_battle_mode")]
        battle_mode: u8,
    },

    /// Re-enter a battle after a dropped connection.
    #[serde(rename_all = "camelCase")]
    RejoinBattle {
        trainer_name: String,
        player_number: u8,
    },

    /// Choose the active Pokemon for the battle.
    #[serde(rename_all = "camelCase")]
    SelectPokemon { player_number: u8, pokemon: Pokemon },

    /// Use a move against the opposing active Pokemon.
    #[serde(rename_all = "camelCase")]
    Attack { player_number: u8, move_name: String },
}

impl ClientIntent {
    /// Serialize to a websocket text frame.
    pub fn to_wire_format(&self) -> String {
        serde_json::to_string(self).expect("intent serialization cannot fail")
    }
}
