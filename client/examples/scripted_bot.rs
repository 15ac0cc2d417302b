//! Scripted Battle Bot Example
//!
//! Joins matchmaking, selects its first Pokemon, and attacks with a fixed
//! move every time it holds the turn. Run two of these against a local
//! server to watch a full battle:
//!
//! ```text
//! cargo run --example scripted_bot -- ws://localhost:3001 Ash 1
//! cargo run --example scripted_bot -- ws://localhost:3001 Gary 2
//! ```

use anyhow::Result;
use combate_client::{
    async_trait, BattleClient, BattleSnapshot, Handler, Pokemon, PokemonStat, RejectReason, Sender,
};

struct ScriptedBot {
    sender: Sender,
    player_number: u8,
    team: Vec<Pokemon>,
    selected: bool,
}

#[async_trait]
impl Handler for ScriptedBot {
    async fn on_waiting(&mut self) {
        println!("Waiting for an opponent...");
    }

    async fn on_battle_update(&mut self, snapshot: &BattleSnapshot) {
        if !self.selected {
            let pick = self.team[0].clone();
            println!("Selecting {}...", pick.nickname);
            self.sender
                .select_pokemon(self.player_number, pick)
                .expect("Failed to select");
            self.selected = true;
            return;
        }

        if let Some(line) = snapshot.log.last() {
            println!("{}", line);
        }
        if snapshot.winner.is_none() && snapshot.turn == self.player_number {
            self.sender
                .attack(self.player_number, "Placaje")
                .expect("Failed to attack");
        }
    }

    async fn on_battle_start(&mut self, snapshot: &BattleSnapshot) {
        println!("The battle has begun!");
        if snapshot.turn == self.player_number {
            self.sender
                .attack(self.player_number, "Placaje")
                .expect("Failed to attack");
        }
    }

    async fn on_battle_end(&mut self, snapshot: &BattleSnapshot) {
        match &snapshot.winner {
            Some(winner) => println!("{} won the battle!", winner),
            None => println!("The battle ended."),
        }
        std::process::exit(0);
    }

    async fn on_opponent_disconnected(&mut self) {
        println!("Opponent disconnected.");
        std::process::exit(0);
    }

    async fn on_rejected(&mut self, reason: RejectReason) {
        println!("Intent rejected: {:?}", reason);
    }
}

fn starter(id: u32, name: &str, hp: u32, attack: u32, defense: u32) -> Pokemon {
    Pokemon {
        id,
        name: name.to_lowercase(),
        nickname: name.to_string(),
        front_image: String::new(),
        back_image: String::new(),
        types: vec!["normal".into()],
        stats: vec![
            PokemonStat::new("hp", hp, 31, 0),
            PokemonStat::new("attack", attack, 31, 0),
            PokemonStat::new("defense", defense, 31, 0),
        ],
        moves: vec![],
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "ws://localhost:3001".into());
    let name = args.next().unwrap_or_else(|| "Ash".into());
    let player_number: u8 = args.next().and_then(|n| n.parse().ok()).unwrap_or(1);

    println!("Scripted Battle Bot");
    println!("===================");
    println!("Connecting to {url} as {name} (player {player_number})...");

    let mut client = BattleClient::connect(&url).await?;
    println!("Connected!");

    let team = vec![
        starter(25, "Pikachu", 35, 55, 40),
        starter(4, "Charmander", 39, 52, 43),
    ];

    let sender = client.sender();
    sender.join(&name, player_number, team.clone(), 1)?;

    let mut bot = ScriptedBot {
        sender,
        player_number,
        team,
        selected: false,
    };
    client.run(&mut bot).await
}
