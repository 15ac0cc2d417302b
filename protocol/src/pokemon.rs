//! The Pokemon data model shared between the Pokedex collaborator and the
//! battle service.
//!
//! Field names serialize in camelCase so payloads line up with what the
//! browser client stores and sends.

use serde::{Deserialize, Serialize};

pub const MAX_IV: u32 = 31;
pub const MAX_EV: u32 = 252;
pub const MAX_MOVES: usize = 4;

/// A single stat entry (hp, attack, defense, ...).
///
/// `total` is the level-50 effective value: `base + iv + ev/4` (integer
/// division), computed by the data provider when the Pokemon is caught.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonStat {
    pub name: String,
    pub base_stat: u32,
    #[serde(default)]
    pub iv: u32,
    #[serde(default)]
    pub ev: u32,
    pub total: u32,
}

impl PokemonStat {
    pub fn new(name: impl Into<String>, base_stat: u32, iv: u32, ev: u32) -> Self {
        let iv = iv.min(MAX_IV);
        let ev = ev.min(MAX_EV);
        Self {
            name: name.into(),
            base_stat,
            iv,
            ev,
            total: base_stat + iv + ev / 4,
        }
    }
}

/// A learned move with its battle-relevant attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonMove {
    pub name: String,
    #[serde(default)]
    pub power: u32,
    #[serde(default = "default_accuracy")]
    pub accuracy: u32,
    #[serde(rename = "type", default)]
    pub move_type: String,
}

fn default_accuracy() -> u32 {
    100
}

/// A Pokemon as supplied by the Pokedex data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pokemon {
    pub id: u32,
    pub name: String,
    pub nickname: String,
    #[serde(default)]
    pub front_image: String,
    #[serde(default)]
    pub back_image: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub stats: Vec<PokemonStat>,
    #[serde(default)]
    pub moves: Vec<PokemonMove>,
}

impl Pokemon {
    /// Look up a stat total by name (e.g. "attack", "defense", "hp").
    pub fn stat_total(&self, name: &str) -> Option<u32> {
        self.stats.iter().find(|s| s.name == name).map(|s| s.total)
    }

    /// HP stat total, defaulting to 100 when the entry is missing.
    pub fn hp_total(&self) -> u32 {
        self.stat_total("hp").unwrap_or(100)
    }

    /// Find a learned move by display name.
    pub fn find_move(&self, name: &str) -> Option<&PokemonMove> {
        self.moves.iter().find(|m| m.name == name)
    }
}

/// A roster entry: a Pokemon plus the unix timestamp it was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPokemon {
    pub pokemon: Pokemon,
    pub timestamp: u64,
}
