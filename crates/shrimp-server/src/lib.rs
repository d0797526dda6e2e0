//! Shrimp market game server
//!
//! Line-oriented TCP server running a three-player fishing market: players
//! gather in lobbies, get seated at tables of three, and submit catches each
//! round while the shared price falls with the total landed.

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod game;
pub mod identity;
pub mod lobby;
pub mod player;
pub mod shared;
pub mod transport;

pub use config::{MatchmakingConfig, RemainderPolicy, ServerConfig};
pub use connection::handle_connection;
pub use coordinator::{Coordinator, CoordinatorError, Outbox};
pub use identity::{Identity, IdentityRegistry, NamePool};
pub use lobby::{Lobby, LobbyError};
pub use player::{Client, ClientId, Player, Seat};
pub use shared::SharedCoordinator;
pub use transport::{Server, TransportError};
