use anyhow::Result;
use tokio::sync::mpsc;

use combate_protocol::{ClientIntent, Pokemon};

/// Cloneable handle for sending intents to the server.
///
/// This can be passed to handlers and cloned freely. Intents queue onto
/// the client's run loop, which owns the socket.
#[derive(Clone)]
pub struct Sender {
    outgoing: mpsc::UnboundedSender<ClientIntent>,
}

impl Sender {
    pub(crate) fn new(outgoing: mpsc::UnboundedSender<ClientIntent>) -> Self {
        Self { outgoing }
    }

    fn send(&self, intent: ClientIntent) -> Result<()> {
        self.outgoing
            .send(intent)
            .map_err(|_| anyhow::anyhow!("Connection closed"))
    }

    /// Enter matchmaking as the given trainer and slot.
    pub fn join(
        &self,
        trainer_name: &str,
        player_number: u8,
        team: Vec<Pokemon>,
        battle_mode: u8,
    ) -> Result<()> {
        self.send(ClientIntent::JoinBattle {
            trainer_name: trainer_name.to_string(),
            player_number,
            team,
            battle_mode,
        })
    }

    /// Re-enter a battle after an earlier session dropped.
    pub fn rejoin(&self, trainer_name: &str, player_number: u8) -> Result<()> {
        self.send(ClientIntent::RejoinBattle {
            trainer_name: trainer_name.to_string(),
            player_number,
        })
    }

    /// Choose the active Pokemon.
    pub fn select_pokemon(&self, player_number: u8, pokemon: Pokemon) -> Result<()> {
        self.send(ClientIntent::SelectPokemon {
            player_number,
            pokemon,
        })
    }

    /// Use a move against the opponent's active Pokemon.
    pub fn attack(&self, player_number: u8, move_name: &str) -> Result<()> {
        self.send(ClientIntent::Attack {
            player_number,
            move_name: move_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_queue_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = Sender::new(tx);

        sender.join("Ash", 1, vec![], 3).unwrap();
        sender.attack(1, "Rayo").unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientIntent::JoinBattle { battle_mode: 3, .. }
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientIntent::Attack {
                player_number: 1,
                move_name: "Rayo".into(),
            }
        );
    }

    #[test]
    fn send_fails_once_the_client_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = Sender::new(tx);
        drop(rx);
        assert!(sender.rejoin("Ash", 1).is_err());
    }
}
