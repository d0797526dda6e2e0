use std::fmt;

/// Settings chosen when a lobby is created.
///
/// A session keeps its own copy, so nothing done to a lobby after the game
/// starts can reach a running table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSettings {
    /// Lobby capacity
    pub num_players: u32,
    /// Rounds per table before it finishes
    pub num_rounds: u32,
    /// Client-side round timer (seconds); the server never enforces it
    pub round_time_secs: u32,
    /// Opaque description of which rounds allow chat, forwarded to clients
    pub communication_rounds: String,
    /// Client-side chat timer (seconds)
    pub communication_round_time_secs: u32,
    pub min_catch: i64,
    pub max_catch: i64,
}

impl GameSettings {
    /// Whether `amount` lies within the configured catch range (inclusive).
    pub fn catch_in_range(&self, amount: i64) -> bool {
        (self.min_catch..=self.max_catch).contains(&amount)
    }
}

/// Dotted form used inside `FINISHED_GAME`.
impl fmt::Display for GameSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}.{}",
            self.num_players,
            self.num_rounds,
            self.round_time_secs,
            self.communication_rounds,
            self.communication_round_time_secs,
            self.min_catch,
            self.max_catch
        )
    }
}
