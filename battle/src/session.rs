//! Battle session state: slots, turn order, attack resolution.

use rand::Rng;

use combate_protocol::{BattleSnapshot, PlayerSnapshot, Pokemon};

use crate::damage::compute_damage;
use crate::moves::resolve_move;

/// Free mode: the whole roster is in play until one side is exhausted.
pub const FREE_MODE: u8 = 0;

/// Identifier for one websocket connection, assigned by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// Identifier for one battle session (pending or in progress).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// One of the two fixed participant positions in a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    P1,
    P2,
}

impl Slot {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Slot::P1),
            2 => Some(Slot::P2),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Slot::P1 => 1,
            Slot::P2 => 2,
        }
    }

    pub fn other(&self) -> Slot {
        match self {
            Slot::P1 => Slot::P2,
            Slot::P2 => Slot::P1,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Slot::P1 => 0,
            Slot::P2 => 1,
        }
    }
}

/// Compute the effective battle mode from the two requested modes.
///
/// Free mode wins if either side asked for it; otherwise the smaller
/// request, clamped so it never exceeds a known team size. An empty team
/// does not clamp here: it becomes a one-member roster when its owner
/// selects, and the mode is capped at that point.
pub fn negotiate_mode(requested: [u8; 2], team_sizes: [usize; 2]) -> u8 {
    if requested[0] == FREE_MODE || requested[1] == FREE_MODE {
        return FREE_MODE;
    }
    let mut mode = requested[0].min(requested[1]);
    for size in team_sizes {
        if size > 0 {
            mode = mode.min(size as u8);
        }
    }
    mode.max(1)
}

/// One participant in an active battle.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub conn: ConnectionId,
    pub trainer_name: String,
    /// Full team in party order; only the first `battle_len` entries are
    /// in play.
    pub team: Vec<Pokemon>,
    pub battle_len: usize,
    pub active_index: usize,
    pub current_hp: u32,
    pub max_hp: u32,
    pub remaining: u32,
    pub defeated: u32,
}

impl PlayerSlot {
    pub fn active_pokemon(&self) -> Option<&Pokemon> {
        self.team.get(self.active_index)
    }

    /// Whether a benched team member can still be promoted. Forward-only:
    /// the replacement must sit after the fainted one, and the side must
    /// still have Pokemon left in play for this mode.
    pub fn has_replacement(&self) -> bool {
        self.remaining > 0 && self.active_index + 1 < self.team.len()
    }

    /// Promote the next team member, resetting HP from its hp stat.
    /// Fainted Pokemon are never revisited: the index only moves forward.
    fn promote_next(&mut self) {
        self.active_index += 1;
        let hp = self
            .active_pokemon()
            .map(|p| p.hp_total())
            .unwrap_or(100);
        self.current_hp = hp;
        self.max_hp = hp;
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            name: self.trainer_name.clone(),
            pokemon: self.active_pokemon().cloned(),
            hp: self.current_hp,
            max_hp: self.max_hp,
            remaining_pokemon: self.remaining,
            defeated_count: self.defeated,
        }
    }
}

/// Result of applying an attack to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    /// Damage dealt, turn passed to the defender.
    Hit,
    /// The defender's active Pokemon fainted and a replacement was sent
    /// out; the turn still passes.
    Fainted,
    /// The defender's last Pokemon fainted; `winner` is now set and the
    /// session is terminal.
    Won,
}

/// An active battle between two slots.
#[derive(Debug, Clone)]
pub struct BattleSession {
    pub id: SessionId,
    pub slots: [PlayerSlot; 2],
    pub battle_mode: u8,
    /// Slot number whose turn it is (1 or 2).
    pub turn: u8,
    /// Append-only battle log; never truncated server-side.
    pub log: Vec<String>,
    pub winner: Option<String>,
}

impl BattleSession {
    pub fn slot(&self, slot: Slot) -> &PlayerSlot {
        &self.slots[slot.index()]
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut PlayerSlot {
        &mut self.slots[slot.index()]
    }

    /// Find which slot a connection occupies, if any.
    pub fn slot_of_conn(&self, conn: ConnectionId) -> Option<Slot> {
        if self.slots[0].conn == conn {
            Some(Slot::P1)
        } else if self.slots[1].conn == conn {
            Some(Slot::P2)
        } else {
            None
        }
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    /// Apply one attack. The caller has already verified that the session
    /// is not finished and that it is `attacker`'s turn.
    pub fn apply_attack<R: Rng>(
        &mut self,
        attacker: Slot,
        move_name: &str,
        rng: &mut R,
    ) -> AttackOutcome {
        let defender = attacker.other();

        let Some(attacking_pokemon) = self.slot(attacker).active_pokemon().cloned() else {
            return AttackOutcome::Hit;
        };
        let Some(defending_pokemon) = self.slot(defender).active_pokemon().cloned() else {
            return AttackOutcome::Hit;
        };

        let mv = resolve_move(&attacking_pokemon, move_name);
        let damage = compute_damage(&attacking_pokemon, &defending_pokemon, &mv, rng);

        let attacker_name = self.slot(attacker).trainer_name.clone();
        self.log
            .push(format!("{} used {}!", attacker_name, mv.name));

        let defender_slot = self.slot_mut(defender);
        defender_slot.current_hp = defender_slot.current_hp.saturating_sub(damage);
        self.log.push(format!(
            "{} took {} damage!",
            defending_pokemon.nickname, damage
        ));

        if self.slot(defender).current_hp > 0 {
            self.pass_turn(defender);
            return AttackOutcome::Hit;
        }

        // Faint handling.
        self.log
            .push(format!("{} fainted!", defending_pokemon.nickname));
        let defender_slot = self.slot_mut(defender);
        defender_slot.remaining = defender_slot.remaining.saturating_sub(1);
        defender_slot.defeated += 1;

        if defender_slot.has_replacement() {
            defender_slot.promote_next();
            let trainer = defender_slot.trainer_name.clone();
            let sent_out = defender_slot
                .active_pokemon()
                .map(|p| p.nickname.clone())
                .unwrap_or_default();
            let remaining = defender_slot.remaining;
            self.log.push(format!("{} sends out {}!", trainer, sent_out));
            self.log
                .push(format!("{} has {} Pokemon remaining!", trainer, remaining));
            self.pass_turn(defender);
            return AttackOutcome::Fainted;
        }

        let winner = self.slot(attacker).trainer_name.clone();
        self.log.push(format!("{} wins the battle!", winner));
        self.winner = Some(winner);
        AttackOutcome::Won
    }

    /// Pass the turn to `next` and log whose turn it is.
    fn pass_turn(&mut self, next: Slot) {
        self.turn = next.number();
        self.log
            .push(format!("It's {}'s turn", self.slot(next).trainer_name));
    }

    /// Build the wire snapshot of the full session state.
    pub fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot {
            player1: self.slots[0].snapshot(),
            player2: self.slots[1].snapshot(),
            battle_mode: self.battle_mode,
            turn: self.turn,
            log: self.log.clone(),
            winner: self.winner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combate_protocol::PokemonStat;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pokemon(nickname: &str, hp: u32, attack: u32, defense: u32) -> Pokemon {
        Pokemon {
            id: 1,
            name: nickname.to_lowercase(),
            nickname: nickname.into(),
            front_image: String::new(),
            back_image: String::new(),
            types: vec![],
            stats: vec![
                PokemonStat::new("hp", hp, 0, 0),
                PokemonStat::new("attack", attack, 0, 0),
                PokemonStat::new("defense", defense, 0, 0),
            ],
            moves: vec![],
        }
    }

    fn player(conn: u64, name: &str, team: Vec<Pokemon>) -> PlayerSlot {
        let battle_len = team.len();
        let hp = team.first().map(|p| p.hp_total()).unwrap_or(100);
        PlayerSlot {
            conn: ConnectionId(conn),
            trainer_name: name.into(),
            team,
            battle_len,
            active_index: 0,
            current_hp: hp,
            max_hp: hp,
            remaining: battle_len as u32,
            defeated: 0,
        }
    }

    fn session(team1: Vec<Pokemon>, team2: Vec<Pokemon>) -> BattleSession {
        BattleSession {
            id: SessionId(1),
            slots: [player(10, "Ash", team1), player(20, "Gary", team2)],
            battle_mode: FREE_MODE,
            turn: 1,
            log: vec!["The battle has begun!".into()],
            winner: None,
        }
    }

    #[test]
    fn slot_helpers() {
        assert_eq!(Slot::from_number(1), Some(Slot::P1));
        assert_eq!(Slot::from_number(2), Some(Slot::P2));
        assert_eq!(Slot::from_number(3), None);
        assert_eq!(Slot::P1.other(), Slot::P2);
        assert_eq!(Slot::P2.other(), Slot::P1);
        assert_eq!(Slot::P2.number(), 2);
    }

    #[test]
    fn mode_negotiation() {
        // Free mode wins when either side requests it.
        assert_eq!(negotiate_mode([0, 3], [6, 6]), 0);
        assert_eq!(negotiate_mode([2, 0], [6, 6]), 0);
        // Otherwise the minimum of the two requests.
        assert_eq!(negotiate_mode([3, 5], [6, 6]), 3);
        // Never exceeds a known team size.
        assert_eq!(negotiate_mode([4, 4], [2, 6]), 2);
        // Empty teams do not clamp (they adopt a Pokemon on selection).
        assert_eq!(negotiate_mode([3, 3], [0, 6]), 3);
    }

    #[test]
    fn non_fainting_attack_passes_turn() {
        let mut s = session(
            vec![pokemon("Sparky", 200, 100, 50)],
            vec![pokemon("Chari", 200, 80, 50)],
        );
        let mut rng = StdRng::seed_from_u64(3);

        let outcome = s.apply_attack(Slot::P1, "Rayo", &mut rng);
        assert_eq!(outcome, AttackOutcome::Hit);
        assert_eq!(s.turn, 2);
        assert!(s.slot(Slot::P2).current_hp < 200);
        assert!(s.log.iter().any(|l| l == "Ash used Rayo!"));
        assert!(s.log.iter().any(|l| l == "It's Gary's turn"));
    }

    #[test]
    fn faint_promotes_replacement_and_passes_turn() {
        let mut s = session(
            vec![pokemon("Sparky", 300, 400, 50)],
            vec![pokemon("Weedle", 1, 10, 10), pokemon("Chari", 150, 80, 60)],
        );
        let mut rng = StdRng::seed_from_u64(5);

        let outcome = s.apply_attack(Slot::P1, "Rayo", &mut rng);
        assert_eq!(outcome, AttackOutcome::Fainted);
        assert_eq!(s.turn, 2);

        let defender = s.slot(Slot::P2);
        assert_eq!(defender.active_index, 1);
        assert_eq!(defender.remaining, 1);
        assert_eq!(defender.defeated, 1);
        assert_eq!(defender.current_hp, defender.max_hp);
        assert_eq!(defender.active_pokemon().unwrap().nickname, "Chari");
        assert!(s.log.iter().any(|l| l == "Weedle fainted!"));
        assert!(s.log.iter().any(|l| l == "Gary sends out Chari!"));
        assert!(s.log.iter().any(|l| l == "Gary has 1 Pokemon remaining!"));
    }

    #[test]
    fn last_faint_sets_winner() {
        let mut s = session(
            vec![pokemon("Sparky", 300, 400, 50)],
            vec![pokemon("Weedle", 1, 10, 10)],
        );
        let mut rng = StdRng::seed_from_u64(5);

        let outcome = s.apply_attack(Slot::P1, "Rayo", &mut rng);
        assert_eq!(outcome, AttackOutcome::Won);
        assert_eq!(s.winner.as_deref(), Some("Ash"));
        assert!(s.is_finished());
        assert_eq!(s.slot(Slot::P2).remaining, 0);
        assert!(s.log.iter().any(|l| l == "Ash wins the battle!"));
    }

    #[test]
    fn battle_mode_limits_promotion() {
        // 1 vs 1 mode with a larger roster: the bench is not in play.
        let team2 = vec![pokemon("Weedle", 1, 10, 10), pokemon("Chari", 150, 80, 60)];
        let mut s = session(vec![pokemon("Sparky", 300, 400, 50)], team2);
        s.battle_mode = 1;
        s.slots[1].battle_len = 1;
        s.slots[1].remaining = 1;
        let mut rng = StdRng::seed_from_u64(5);

        assert_eq!(s.apply_attack(Slot::P1, "Rayo", &mut rng), AttackOutcome::Won);
    }

    #[test]
    fn hp_never_underflows() {
        let mut s = session(
            vec![pokemon("Sparky", 300, 400, 50)],
            vec![pokemon("Weedle", 1, 10, 10)],
        );
        let mut rng = StdRng::seed_from_u64(9);
        s.apply_attack(Slot::P1, "Rayo", &mut rng);
        assert_eq!(s.slot(Slot::P2).current_hp, 0);
    }

    #[test]
    fn snapshot_reflects_state() {
        let s = session(
            vec![pokemon("Sparky", 120, 100, 50)],
            vec![pokemon("Chari", 140, 80, 50)],
        );
        let snap = s.snapshot();
        assert_eq!(snap.player1.name, "Ash");
        assert_eq!(snap.player1.hp, 120);
        assert_eq!(snap.player2.max_hp, 140);
        assert_eq!(snap.turn, 1);
        assert!(snap.winner.is_none());
        assert_eq!(
            snap.player1.pokemon.as_ref().unwrap().nickname,
            "Sparky"
        );
    }
}
