use thiserror::Error;

pub mod event;
pub mod intent;
pub mod pokemon;

pub use event::{BattleSnapshot, PlayerSnapshot, RejectReason, ServerEvent};
pub use intent::ClientIntent;
pub use pokemon::{Pokemon, PokemonMove, PokemonStat, TeamPokemon};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Empty message")]
    EmptyMessage,
}

/// Parse a websocket text frame into a client intent.
///
/// Frames are JSON objects of the form `{"type": EVENT, "data": PAYLOAD}`,
/// matching the event names the original browser client emits.
pub fn parse_intent(frame: &str) -> anyhow::Result<ClientIntent> {
    if frame.trim().is_empty() {
        return Err(ParseError::EmptyMessage.into());
    }
    serde_json::from_str(frame).map_err(|e| ParseError::InvalidFormat(e.to_string()).into())
}

/// Parse a websocket text frame into a server event (client side).
pub fn parse_event(frame: &str) -> anyhow::Result<ServerEvent> {
    if frame.trim().is_empty() {
        return Err(ParseError::EmptyMessage.into());
    }
    serde_json::from_str(frame).map_err(|e| ParseError::InvalidFormat(e.to_string()).into())
}
