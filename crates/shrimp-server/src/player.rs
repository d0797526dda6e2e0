//! Connected participants.

use std::fmt;
use std::net::IpAddr;

use crate::game::TableRef;

/// Per-connection handle, unique for the lifetime of the process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a player currently is. Never owns the lobby or table it names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Seat {
    #[default]
    Idle,
    Lobby(String),
    Table(TableRef),
}

/// Game-facing identity of an identified client
#[derive(Clone, Debug)]
pub struct Player {
    pub client: ClientId,
    pub name: String,
    /// Cumulative earnings; starts at 0
    pub money: i64,
    /// Per-kilogram cost, fixed at creation
    pub expenses: i64,
    pub seat: Seat,
}

impl Player {
    pub fn new(client: ClientId, name: String, expenses: i64) -> Self {
        Self {
            client,
            name,
            money: 0,
            expenses,
            seat: Seat::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.seat == Seat::Idle
    }
}

/// A live connection as the coordinator sees it
#[derive(Clone, Debug)]
pub struct Client {
    pub id: ClientId,
    pub address: IpAddr,
    /// Set once the client has asked for a username
    pub player: Option<Player>,
}
