//! Move resolution.
//!
//! Resolution is total: any string resolves to a usable move. The builtin
//! table carries the four moves the original client offers as fallbacks;
//! anything else is looked up on the attacker's own move list, and unknown
//! names degrade to the Placaje default.

use combate_protocol::Pokemon;

/// A concrete move definition used by the damage calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveDef {
    pub name: String,
    pub power: u32,
    pub move_type: String,
}

const BUILTIN_MOVES: &[(&str, u32, &str)] = &[
    ("Placaje", 40, "normal"),
    ("Rayo", 90, "electric"),
    ("Ascuas", 40, "fire"),
    ("Pistola Agua", 40, "water"),
];

/// The default move used when nothing else matches.
pub fn default_move() -> MoveDef {
    let (name, power, move_type) = BUILTIN_MOVES[0];
    MoveDef {
        name: name.to_string(),
        power,
        move_type: move_type.to_string(),
    }
}

/// Resolve a move name against the builtin table, then the attacker's
/// learned moves, then the Placaje default. Never fails.
pub fn resolve_move(attacker: &Pokemon, move_name: &str) -> MoveDef {
    if let Some((name, power, move_type)) =
        BUILTIN_MOVES.iter().find(|(name, _, _)| *name == move_name)
    {
        return MoveDef {
            name: (*name).to_string(),
            power: *power,
            move_type: (*move_type).to_string(),
        };
    }

    if let Some(known) = attacker.find_move(move_name) {
        return MoveDef {
            name: known.name.clone(),
            power: known.power,
            move_type: known.move_type.clone(),
        };
    }

    default_move()
}
