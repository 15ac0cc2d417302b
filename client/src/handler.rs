use async_trait::async_trait;

use combate_protocol::{BattleSnapshot, RejectReason};

/// Trait for handling battle service events.
///
/// Implement this trait to create an event handler. All methods have
/// default no-op implementations, so you only need to implement the
/// events you care about.
///
/// # Example
///
/// ```ignore
/// struct MyBot {
///     sender: Sender,
/// }
///
/// #[async_trait]
/// impl Handler for MyBot {
///     async fn on_battle_update(&mut self, snapshot: &BattleSnapshot) {
///         if snapshot.turn == 1 {
///             self.sender.attack(1, "Placaje").ok();
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send {
    /// Called when we are alone in the matchmaking queue.
    async fn on_waiting(&mut self) {}

    /// Called when both players have selected and the battle begins.
    async fn on_battle_start(&mut self, snapshot: &BattleSnapshot) {
        let _ = snapshot;
    }

    /// Called on every state change before the battle ends: pairing,
    /// attack resolution, fainting, reconnection replays.
    async fn on_battle_update(&mut self, snapshot: &BattleSnapshot) {
        let _ = snapshot;
    }

    /// Called when the battle ends; `snapshot.winner` names the victor.
    async fn on_battle_end(&mut self, snapshot: &BattleSnapshot) {
        let _ = snapshot;
    }

    /// Called when the opponent's connection dropped and the battle was
    /// torn down.
    async fn on_opponent_disconnected(&mut self) {}

    /// Called when the server refused one of our intents.
    async fn on_rejected(&mut self, reason: RejectReason) {
        let _ = reason;
    }
}
