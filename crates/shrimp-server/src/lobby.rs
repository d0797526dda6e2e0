//! Lobby management for pre-game player coordination.
//!
//! A lobby collects players until it reaches capacity; the coordinator then
//! turns it into a session and retires it.

use shrimp_protocol::{GameSettings, LobbySummary};

use crate::player::ClientId;

/// Named waiting room with a fixed capacity
#[derive(Debug, Clone)]
pub struct Lobby {
    name: String,
    /// Settings the spawned session will copy
    settings: GameSettings,
    /// Members in join order
    members: Vec<ClientId>,
}

impl Lobby {
    /// Create an empty lobby sized by `settings.num_players`
    pub fn new(name: String, settings: GameSettings) -> Self {
        Self {
            name,
            settings,
            members: Vec::new(),
        }
    }

    /// Add a player. Returns true when this join filled the lobby.
    pub fn join(&mut self, client: ClientId) -> Result<bool, LobbyError> {
        if self.members.contains(&client) {
            return Err(LobbyError::AlreadyInLobby(self.name.clone()));
        }

        if self.is_full() {
            return Err(LobbyError::LobbyFull);
        }

        self.members.push(client);
        Ok(self.is_full())
    }

    /// Remove a player
    pub fn leave(&mut self, client: ClientId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != client);
        self.members.len() != before
    }

    pub fn contains(&self, client: ClientId) -> bool {
        self.members.contains(&client)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.settings.num_players as usize
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn members(&self) -> &[ClientId] {
        &self.members
    }

    pub fn player_count(&self) -> usize {
        self.members.len()
    }

    /// Lobby state for sending to clients
    pub fn summary(&self) -> LobbySummary {
        LobbySummary {
            name: self.name.clone(),
            players: self.members.len(),
            capacity: self.settings.num_players,
        }
    }
}

/// Lobby errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby is full")]
    LobbyFull,
    #[error("Player already in lobby {0:?}")]
    AlreadyInLobby(String),
}
