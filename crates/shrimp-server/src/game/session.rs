//! Sessions: the tables spawned together from one full lobby.

use std::fmt;

use shrimp_protocol::GameSettings;

use super::table::{Table, TableSeat, TABLE_SIZE};
use crate::player::ClientId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Non-owning pointer from a player to its table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub session: SessionId,
    pub number: u32,
}

/// Lobby members cut into consecutive triples
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    pub groups: Vec<Vec<ClientId>>,
    /// Trailing members that did not make a full table
    pub leftover: Vec<ClientId>,
}

/// Split `members` into groups of [`TABLE_SIZE`] in join order.
pub fn partition(members: &[ClientId]) -> Partition {
    let mut partition = Partition::default();
    for chunk in members.chunks(TABLE_SIZE) {
        if chunk.len() == TABLE_SIZE {
            partition.groups.push(chunk.to_vec());
        } else {
            partition.leftover.extend_from_slice(chunk);
        }
    }
    partition
}

/// Tables spawned from a single lobby
#[derive(Clone, Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    settings: GameSettings,
    /// Live tables; finished ones are moved out
    tables: Vec<Table>,
}

impl Session {
    /// Build one table per group of seats, numbered from 1 in order.
    pub fn spawn(
        id: SessionId,
        name: String,
        settings: GameSettings,
        groups: Vec<Vec<TableSeat>>,
    ) -> Self {
        let tables = groups
            .into_iter()
            .zip(1u32..)
            .map(|(seats, number)| Table::new(name.clone(), number, settings.clone(), seats))
            .collect();

        Self {
            id,
            name,
            settings,
            tables,
        }
    }

    pub fn table(&self, number: u32) -> Option<&Table> {
        self.tables.iter().find(|t| t.number() == number)
    }

    pub fn table_mut(&mut self, number: u32) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.number() == number)
    }

    /// Take a table out of the session (it has finished)
    pub fn remove_table(&mut self, number: u32) -> Option<Table> {
        let index = self.tables.iter().position(|t| t.number() == number)?;
        Some(self.tables.remove(index))
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// No live tables remain
    pub fn is_finished(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(range: std::ops::Range<u64>) -> Vec<ClientId> {
        range.map(ClientId).collect()
    }

    fn settings() -> GameSettings {
        GameSettings {
            num_players: 6,
            num_rounds: 2,
            round_time_secs: 60,
            communication_rounds: "1".into(),
            communication_round_time_secs: 30,
            min_catch: 0,
            max_catch: 40,
        }
    }

    #[test]
    fn exact_multiple_has_no_leftover() {
        let partition = partition(&ids(0..6));
        assert_eq!(partition.groups, vec![ids(0..3), ids(3..6)]);
        assert!(partition.leftover.is_empty());
    }

    #[test]
    fn remainder_is_reported() {
        let partition = partition(&ids(0..5));
        assert_eq!(partition.groups, vec![ids(0..3)]);
        assert_eq!(partition.leftover, ids(3..5));

        let partition = super::partition(&ids(0..2));
        assert!(partition.groups.is_empty());
        assert_eq!(partition.leftover, ids(0..2));
    }

    #[test]
    fn tables_are_numbered_in_partition_order() {
        let groups = partition(&ids(0..6))
            .groups
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|id| TableSeat::new(id, format!("P{}", id.0), 5, 0))
                    .collect()
            })
            .collect();
        let mut session = Session::spawn(SessionId(1), "Reef".into(), settings(), groups);

        assert_eq!(session.tables().len(), 2);
        let second = session.table(2).unwrap();
        assert!(second.has_player(ClientId(3)));
        assert!(!second.has_player(ClientId(0)));
        assert_eq!(second.session_name(), "Reef");

        assert!(session.remove_table(1).is_some());
        assert!(!session.is_finished());
        assert!(session.remove_table(2).is_some());
        assert!(session.is_finished());
    }
}
