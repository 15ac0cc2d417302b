//! Authoritative battle engine for Combate.
//!
//! This crate owns every rule of a battle: damage math, turn order, fainting,
//! matchmaking and reconnection. The network layer feeds it parsed intents and
//! carries its events back out; nothing in here touches a socket.
//!
//! # Overview
//!
//! `combate-battle` sits between `combate-protocol` (wire format) and the
//! transport layers:
//!
//! ```text
//! combate-protocol (wire format)
//!        │
//!        ▼
//! combate-battle (rules + sessions) ← THIS CRATE
//!        │
//!        ├─> combate-server (websocket gateway)
//!        └─> combate-client (bots / scripted players)
//! ```
//!
//! # Main Types
//!
//! - [`Coordinator`] - single entry point: feed it intents, it emits events
//! - [`EventSink`] - how the coordinator hands events back to the transport
//! - [`SessionStore`] - matchmaking queue, pending and live sessions
//! - [`BattleSession`] - one running battle between two slots
//! - [`compute_damage`] - the damage formula
//!
//! # Example Usage
//!
//! ```ignore
//! use combate_battle::{ConnectionId, Coordinator, EventSink};
//! use combate_protocol::{ClientIntent, ServerEvent};
//!
//! let mut coordinator = Coordinator::new();
//! coordinator.handle_intent(ConnectionId(1), intent, &mut sink);
//! ```

pub mod coordinator;
pub mod damage;
pub mod moves;
pub mod session;
pub mod store;

// Re-export main types at crate root for convenience
pub use coordinator::{Coordinator, EventSink};
pub use damage::compute_damage;
pub use moves::{default_move, resolve_move, MoveDef};
pub use session::{
    negotiate_mode, AttackOutcome, BattleSession, ConnectionId, PlayerSlot, SessionId, Slot,
    FREE_MODE,
};
pub use store::{QueuedJoin, SessionStore};
