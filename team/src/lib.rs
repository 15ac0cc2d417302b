//! Roster persistence and import/export for Combate teams.
//!
//! A trainer's roster lives in a single JSON file. Every save first copies the
//! previous file to a `.backup` sibling, so a crash mid-write or a corrupted
//! primary never loses more than the last edit. Loading walks primary, then
//! backup, then falls back to an empty roster.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use combate_protocol::{Pokemon, TeamPokemon};

/// Errors raised by roster persistence and import.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed roster json: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("imported data has no team array")]
    NotATeam,
    #[error("team is full ({0} slots)")]
    TeamFull(u32),
}

/// Per-roster preferences, stored alongside the team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterSettings {
    #[serde(default = "default_max_team_size")]
    pub max_team_size: u32,
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
}

fn default_max_team_size() -> u32 {
    6
}

fn default_auto_save() -> bool {
    true
}

impl Default for RosterSettings {
    fn default() -> Self {
        Self {
            max_team_size: default_max_team_size(),
            auto_save: default_auto_save(),
        }
    }
}

/// The on-disk roster document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterFile {
    #[serde(default)]
    pub team: Vec<TeamPokemon>,
    /// Unix millis of the last save, set by the caller.
    #[serde(default)]
    pub last_updated: u64,
    #[serde(default)]
    pub settings: RosterSettings,
}

impl RosterFile {
    /// Appends a Pokemon to the team, refusing once every slot is taken.
    pub fn add(&mut self, pokemon: Pokemon, timestamp: u64) -> Result<(), RosterError> {
        if self.team.len() >= self.settings.max_team_size as usize {
            return Err(RosterError::TeamFull(self.settings.max_team_size));
        }
        self.team.push(TeamPokemon { pokemon, timestamp });
        Ok(())
    }

    /// Removes the team member at `index`, if present.
    pub fn remove(&mut self, index: usize) -> Option<TeamPokemon> {
        if index < self.team.len() {
            Some(self.team.remove(index))
        } else {
            None
        }
    }

    /// Serializes the roster for export or download.
    pub fn to_json_pretty(&self) -> Result<String, RosterError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses an imported roster, rejecting payloads whose `team` field is
    /// missing or not an array before deserializing the rest.
    pub fn from_json(raw: &str) -> Result<Self, RosterError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        match value.get("team") {
            Some(team) if team.is_array() => {}
            _ => return Err(RosterError::NotATeam),
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// File-backed roster storage with backup-on-write.
#[derive(Debug, Clone)]
pub struct RosterStore {
    path: PathBuf,
}

impl RosterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sibling file that holds the previous save.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".backup");
        PathBuf::from(name)
    }

    /// Loads the roster, trying the primary file, then the backup, then an
    /// empty default. Unreadable or corrupt files are skipped, not fatal.
    pub fn load(&self) -> RosterFile {
        if let Some(roster) = read_roster(&self.path) {
            return roster;
        }
        if self.path.exists() {
            tracing::warn!(path = %self.path.display(), "roster file unreadable, trying backup");
        }
        if let Some(roster) = read_roster(&self.backup_path()) {
            return roster;
        }
        RosterFile::default()
    }

    /// Writes the roster, preserving the previous save as the backup first.
    pub fn save(&self, roster: &RosterFile) -> Result<(), RosterError> {
        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(roster)?)?;
        Ok(())
    }

    /// Deletes the primary file and its backup.
    pub fn clear(&self) -> Result<(), RosterError> {
        for path in [self.path.clone(), self.backup_path()] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn read_roster(path: &Path) -> Option<RosterFile> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}
