//! Server-to-client lines.
//!
//! Direct replies answer the request that caused them. Pushes use the
//! `UPDATE <TAG>` envelope and may arrive at any time.

use std::fmt;

use crate::GameSettings;

/// Separator between the fields of one chat entry in `FINISHED_GAME`
pub const CHAT_FIELD_SEPARATOR: char = '☐';
/// Terminator after each chat entry in `FINISHED_GAME`
pub const CHAT_ENTRY_TERMINATOR: char = '◊';
/// Placeholder for a table that never chatted
pub const NO_CHAT: &str = "NO_CHAT";

/// Server-to-client message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerMessage {
    Username { name: String, is_admin: bool },
    BecomeAdminSuccessful,
    BecomeAdminFailed,
    CreateLobbySuccess,
    CreateLobbyFailed,
    LobbyList { lobbies: Vec<LobbySummary> },
    LobbyJoined,
    LobbyNotExist,
    LobbyFull,
    /// Join refused for a reason other than missing/full lobby
    JoinLobbyFailed,
    LobbyLeft,
    CaughtSuccessfully,
    CatchShrimpFailed,
    MessageReceived,
    ChatMessageFailed,
    /// Generic refusal for malformed or out-of-order requests
    RequestFailed,
    /// Client speaks a different protocol version; connection is closed
    VersionMismatch { server_version: String },
    Update(Update),
}

/// `UPDATE` pushes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Update {
    /// Active lobbies changed
    Lobby { lobbies: Vec<LobbySummary> },
    /// Receiver has been seated at a table
    GameStarted {
        peers: [String; 2],
        settings: GameSettings,
        table_number: u32,
        session_name: String,
    },
    /// Round resolved; `results[0]` is the receiver
    RoundFinished { price: i64, results: Vec<RoundResult> },
    MessageSent(ChatLine),
    /// Full ledger of a finished table (admins only)
    FinishedGame(FinishedGameReport),
}

/// `name.count.capacity`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LobbySummary {
    pub name: String,
    pub players: usize,
    pub capacity: u32,
}

/// One player's line in `ROUND_FINISHED`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundResult {
    pub name: String,
    pub caught: i64,
    pub profit: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatLine {
    pub sender: String,
    pub text: String,
    /// `HH:MM:SS`
    pub timestamp: String,
}

/// Everything an admin sees about a finished table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinishedGameReport {
    pub session_name: String,
    pub table_number: u32,
    /// Seat order; every ledger lists its columns in this order
    pub players: Vec<String>,
    pub rounds: Vec<RoundLedger>,
    pub settings: GameSettings,
    pub chat: Vec<ChatLine>,
}

/// One resolved round as it appears in `FINISHED_GAME`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundLedger {
    pub number: u32,
    /// Per seat, in the report's player order
    pub caught: Vec<i64>,
    pub total: i64,
    pub price: i64,
    /// Price minus per-kilogram expenses
    pub margin: i64,
    /// Per seat: (round profit, cumulative money)
    pub earnings: Vec<(i64, i64)>,
}

fn write_lobbies(f: &mut fmt::Formatter<'_>, lobbies: &[LobbySummary]) -> fmt::Result {
    for lobby in lobbies {
        write!(f, " {}.{}.{}", lobby.name, lobby.players, lobby.capacity)?;
    }
    Ok(())
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Username { name, is_admin } => write!(f, "USERNAME {name} {is_admin}"),
            ServerMessage::BecomeAdminSuccessful => f.write_str("BECOME_ADMIN_SUCCESSFUL"),
            ServerMessage::BecomeAdminFailed => f.write_str("BECOME_ADMIN_FAILED"),
            ServerMessage::CreateLobbySuccess => f.write_str("CREATE_LOBBY_SUCCESS"),
            ServerMessage::CreateLobbyFailed => f.write_str("CREATE_LOBBY_FAILED"),
            ServerMessage::LobbyList { lobbies } => {
                f.write_str("LOBBY_LIST")?;
                write_lobbies(f, lobbies)
            }
            ServerMessage::LobbyJoined => f.write_str("LOBBY_JOINED"),
            ServerMessage::LobbyNotExist => f.write_str("LOBBY_NOT_EXIST"),
            ServerMessage::LobbyFull => f.write_str("LOBBY_FULL"),
            ServerMessage::JoinLobbyFailed => f.write_str("JOIN_LOBBY_FAILED"),
            ServerMessage::LobbyLeft => f.write_str("LOBBY_LEFT"),
            ServerMessage::CaughtSuccessfully => f.write_str("CAUGHT_SUCCESSFULLY"),
            ServerMessage::CatchShrimpFailed => f.write_str("CATCH_SHRIMP_FAILED"),
            ServerMessage::MessageReceived => f.write_str("MESSAGE_RECEIVED"),
            ServerMessage::ChatMessageFailed => f.write_str("CHAT_MESSAGE_FAILED"),
            ServerMessage::RequestFailed => f.write_str("REQUEST_FAILED"),
            ServerMessage::VersionMismatch { server_version } => {
                write!(f, "VERSION_MISMATCH {server_version}")
            }
            ServerMessage::Update(update) => write!(f, "UPDATE {update}"),
        }
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Lobby { lobbies } => {
                f.write_str("LOBBY")?;
                write_lobbies(f, lobbies)
            }
            Update::GameStarted {
                peers,
                settings,
                table_number,
                session_name,
            } => write!(
                f,
                "GAME_STARTED {} {} {} {} {} {} {} {} {} {}",
                peers[0],
                peers[1],
                settings.num_rounds,
                settings.round_time_secs,
                settings.communication_rounds,
                settings.communication_round_time_secs,
                settings.min_catch,
                settings.max_catch,
                table_number,
                session_name
            ),
            Update::RoundFinished { price, results } => {
                write!(f, "ROUND_FINISHED {price}")?;
                for result in results {
                    write!(f, " {} {} {}", result.name, result.caught, result.profit)?;
                }
                Ok(())
            }
            Update::MessageSent(line) => write!(
                f,
                "MESSAGE_SENT {} {} {}",
                line.sender, line.text, line.timestamp
            ),
            Update::FinishedGame(report) => write!(f, "FINISHED_GAME {report}"),
        }
    }
}

impl fmt::Display for FinishedGameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ",
            self.session_name,
            self.table_number,
            self.players.join(".")
        )?;

        for (i, round) in self.rounds.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", round.number)?;
            for caught in &round.caught {
                write!(f, ".{caught}")?;
            }
            write!(f, ".{}.{}.{}", round.total, round.price, round.margin)?;
            for (profit, money) in &round.earnings {
                write!(f, ".{profit}.{money}")?;
            }
        }

        write!(f, " {} ", self.settings)?;

        if self.chat.is_empty() {
            return f.write_str(NO_CHAT);
        }
        for line in &self.chat {
            write!(
                f,
                "{}{sep}{}{sep}{}{CHAT_ENTRY_TERMINATOR}",
                line.sender,
                line.text,
                line.timestamp,
                sep = CHAT_FIELD_SEPARATOR
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GameSettings {
        GameSettings {
            num_players: 3,
            num_rounds: 2,
            round_time_secs: 60,
            communication_rounds: "1".into(),
            communication_round_time_secs: 20,
            min_catch: 0,
            max_catch: 40,
        }
    }

    #[test]
    fn direct_replies() {
        assert_eq!(
            ServerMessage::Username {
                name: "Kelp".into(),
                is_admin: false
            }
            .to_string(),
            "USERNAME Kelp false"
        );
        assert_eq!(ServerMessage::LobbyNotExist.to_string(), "LOBBY_NOT_EXIST");
        assert_eq!(
            ServerMessage::LobbyList { lobbies: vec![] }.to_string(),
            "LOBBY_LIST"
        );
    }

    #[test]
    fn lobby_update_lists_every_lobby() {
        let update = ServerMessage::Update(Update::Lobby {
            lobbies: vec![
                LobbySummary {
                    name: "Reef".into(),
                    players: 1,
                    capacity: 3,
                },
                LobbySummary {
                    name: "Cove".into(),
                    players: 0,
                    capacity: 6,
                },
            ],
        });
        assert_eq!(update.to_string(), "UPDATE LOBBY Reef.1.3 Cove.0.6");
    }

    #[test]
    fn game_started_line() {
        let update = Update::GameStarted {
            peers: ["Bay".into(), "Cove".into()],
            settings: settings(),
            table_number: 1,
            session_name: "Reef".into(),
        };
        assert_eq!(
            update.to_string(),
            "GAME_STARTED Bay Cove 2 60 1 20 0 40 1 Reef"
        );
    }

    #[test]
    fn round_finished_line() {
        let update = Update::RoundFinished {
            price: 42,
            results: vec![
                RoundResult {
                    name: "Aqua".into(),
                    caught: 5,
                    profit: 185,
                },
                RoundResult {
                    name: "Bay".into(),
                    caught: 5,
                    profit: 185,
                },
            ],
        };
        assert_eq!(update.to_string(), "ROUND_FINISHED 42 Aqua 5 185 Bay 5 185");
    }

    #[test]
    fn finished_game_ledger() {
        let report = FinishedGameReport {
            session_name: "Reef".into(),
            table_number: 1,
            players: vec!["Aqua".into(), "Bay".into(), "Cove".into()],
            rounds: vec![
                RoundLedger {
                    number: 1,
                    caught: vec![10, 10, 10],
                    total: 30,
                    price: 39,
                    margin: 34,
                    earnings: vec![(340, 340), (340, 340), (340, 340)],
                },
                RoundLedger {
                    number: 2,
                    caught: vec![0, 5, 0],
                    total: 5,
                    price: 44,
                    margin: 39,
                    earnings: vec![(0, 340), (195, 535), (0, 340)],
                },
            ],
            settings: settings(),
            chat: vec![],
        };
        assert_eq!(
            report.to_string(),
            "Reef 1 Aqua.Bay.Cove \
             1.10.10.10.30.39.34.340.340.340.340.340.340,\
             2.0.5.0.5.44.39.0.340.195.535.0.340 \
             3.2.60.1.20.0.40 NO_CHAT"
        );
    }

    #[test]
    fn finished_game_chat_entries() {
        let report = FinishedGameReport {
            session_name: "Reef".into(),
            table_number: 2,
            players: vec!["Aqua".into(), "Bay".into(), "Cove".into()],
            rounds: vec![],
            settings: settings(),
            chat: vec![
                ChatLine {
                    sender: "Aqua".into(),
                    text: "hi".into(),
                    timestamp: "12:00:01".into(),
                },
                ChatLine {
                    sender: "Bay".into(),
                    text: "low".into(),
                    timestamp: "12:00:09".into(),
                },
            ],
        };
        assert!(report
            .to_string()
            .ends_with(" Aqua☐hi☐12:00:01◊Bay☐low☐12:00:09◊"));
    }
}
