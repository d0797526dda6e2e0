//! Client-to-server requests.
//!
//! One request per line: space-separated tokens, the first being the
//! command keyword.

use std::str::FromStr;

use thiserror::Error;

use crate::GameSettings;

pub const REQUEST_USERNAME: &str = "REQUEST_USERNAME";
pub const BECOME_ADMIN: &str = "BECOME_ADMIN";
pub const CREATE_LOBBY: &str = "CREATE_LOBBY";
pub const REQUEST_LOBBY_LIST: &str = "REQUEST_LOBBY_LIST";
pub const JOIN_LOBBY: &str = "JOIN_LOBBY";
pub const LEAVE_LOBBY: &str = "LEAVE_LOBBY";
pub const CATCH_SHRIMP: &str = "CATCH_SHRIMP";
pub const CHAT_MESSAGE: &str = "CHAT_MESSAGE";
pub const DISCONNECT: &str = "DISCONNECT";

/// Parsed client request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientRequest {
    /// Ask for a display name; carries the client's protocol version
    RequestUsername { version: String },
    /// Try the admin password
    BecomeAdmin { password: String },
    /// Open a new lobby
    CreateLobby { name: String, settings: GameSettings },
    /// Snapshot of the active lobbies
    RequestLobbyList,
    JoinLobby { name: String },
    LeaveLobby,
    /// Submit this round's catch
    CatchShrimp { amount: i64 },
    /// Chat to the rest of the table; text is the rest of the line
    ChatMessage { text: String },
    /// Client is closing the connection
    Disconnect,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("{command}: missing argument <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("{command}: <{argument}> is not a number: {value:?}")]
    InvalidNumber {
        command: &'static str,
        argument: &'static str,
        value: String,
    },
    #[error("{command}: unexpected trailing arguments")]
    UnexpectedArgument { command: &'static str },
}

impl ParseError {
    /// Keyword of the command that failed to parse, if it was recognized.
    pub fn command(&self) -> Option<&'static str> {
        match self {
            ParseError::Empty | ParseError::UnknownCommand(_) => None,
            ParseError::MissingArgument { command, .. }
            | ParseError::InvalidNumber { command, .. }
            | ParseError::UnexpectedArgument { command } => Some(command),
        }
    }
}

/// Parse one request line (without its terminator).
pub fn parse_request(line: &str) -> Result<ClientRequest, ParseError> {
    line.parse()
}

impl FromStr for ClientRequest {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (keyword, rest) = match line.split_once(' ') {
            Some((keyword, rest)) => (keyword, rest),
            None => (line, ""),
        };
        if keyword.is_empty() {
            return Err(ParseError::Empty);
        }

        match keyword {
            REQUEST_USERNAME => {
                let mut args = Args::new(REQUEST_USERNAME, rest);
                let version = args.word("version")?;
                args.finish()?;
                Ok(ClientRequest::RequestUsername { version })
            }
            BECOME_ADMIN => {
                let mut args = Args::new(BECOME_ADMIN, rest);
                let password = args.word("password")?;
                args.finish()?;
                Ok(ClientRequest::BecomeAdmin { password })
            }
            CREATE_LOBBY => {
                let mut args = Args::new(CREATE_LOBBY, rest);
                let name = args.word("name")?;
                let settings = GameSettings {
                    num_players: args.number("numPlayers")?,
                    num_rounds: args.number("numRounds")?,
                    round_time_secs: args.number("roundTime")?,
                    communication_rounds: args.word("communicationRounds")?,
                    communication_round_time_secs: args.number("communicationRoundTime")?,
                    min_catch: args.number("minCatch")?,
                    max_catch: args.number("maxCatch")?,
                };
                args.finish()?;
                Ok(ClientRequest::CreateLobby { name, settings })
            }
            REQUEST_LOBBY_LIST => {
                Args::new(REQUEST_LOBBY_LIST, rest).finish()?;
                Ok(ClientRequest::RequestLobbyList)
            }
            JOIN_LOBBY => {
                let mut args = Args::new(JOIN_LOBBY, rest);
                let name = args.word("lobbyName")?;
                args.finish()?;
                Ok(ClientRequest::JoinLobby { name })
            }
            LEAVE_LOBBY => {
                Args::new(LEAVE_LOBBY, rest).finish()?;
                Ok(ClientRequest::LeaveLobby)
            }
            CATCH_SHRIMP => {
                let mut args = Args::new(CATCH_SHRIMP, rest);
                let amount = args.number("amount")?;
                args.finish()?;
                Ok(ClientRequest::CatchShrimp { amount })
            }
            CHAT_MESSAGE => {
                if rest.is_empty() {
                    return Err(ParseError::MissingArgument {
                        command: CHAT_MESSAGE,
                        argument: "text",
                    });
                }
                Ok(ClientRequest::ChatMessage {
                    text: rest.to_string(),
                })
            }
            DISCONNECT => Ok(ClientRequest::Disconnect),
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

/// Positional argument cursor for a single command.
struct Args<'a> {
    command: &'static str,
    tokens: std::str::Split<'a, char>,
}

impl<'a> Args<'a> {
    fn new(command: &'static str, rest: &'a str) -> Self {
        Self {
            command,
            tokens: rest.split(' '),
        }
    }

    fn word(&mut self, argument: &'static str) -> Result<String, ParseError> {
        match self.tokens.next() {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(ParseError::MissingArgument {
                command: self.command,
                argument,
            }),
        }
    }

    fn number<T: FromStr>(&mut self, argument: &'static str) -> Result<T, ParseError> {
        let token = self.word(argument)?;
        token.parse().map_err(|_| ParseError::InvalidNumber {
            command: self.command,
            argument,
            value: token,
        })
    }

    fn finish(mut self) -> Result<(), ParseError> {
        match self.tokens.next() {
            None | Some("") => Ok(()),
            Some(_) => Err(ParseError::UnexpectedArgument {
                command: self.command,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_lobby() {
        let request = parse_request("CREATE_LOBBY Reef 3 5 60 2,4 30 0 40").unwrap();
        let ClientRequest::CreateLobby { name, settings } = request else {
            panic!("Wrong request type");
        };
        assert_eq!(name, "Reef");
        assert_eq!(settings.num_players, 3);
        assert_eq!(settings.num_rounds, 5);
        assert_eq!(settings.communication_rounds, "2,4");
        assert_eq!(settings.max_catch, 40);
    }

    #[test]
    fn create_lobby_with_bad_number_names_the_argument() {
        let err = parse_request("CREATE_LOBBY Reef three 5 60 2,4 30 0 40").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidNumber {
                command: CREATE_LOBBY,
                argument: "numPlayers",
                value: "three".into(),
            }
        );
        assert_eq!(err.command(), Some(CREATE_LOBBY));
    }

    #[test]
    fn chat_keeps_the_rest_of_the_line() {
        let request = parse_request("CHAT_MESSAGE keep catches low\r").unwrap();
        assert_eq!(
            request,
            ClientRequest::ChatMessage {
                text: "keep catches low".into()
            }
        );
    }

    #[test]
    fn catch_accepts_zero_and_rejects_text() {
        assert_eq!(
            parse_request("CATCH_SHRIMP 0").unwrap(),
            ClientRequest::CatchShrimp { amount: 0 }
        );
        assert!(matches!(
            parse_request("CATCH_SHRIMP lots"),
            Err(ParseError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn unknown_and_empty_lines() {
        assert_eq!(parse_request(""), Err(ParseError::Empty));
        assert_eq!(
            parse_request("READY"),
            Err(ParseError::UnknownCommand("READY".into()))
        );
        assert_eq!(parse_request("READY").unwrap_err().command(), None);
    }

    #[test]
    fn trailing_arguments_are_rejected() {
        assert_eq!(
            parse_request("JOIN_LOBBY Reef Cove"),
            Err(ParseError::UnexpectedArgument {
                command: JOIN_LOBBY
            })
        );
        assert_eq!(
            parse_request("LEAVE_LOBBY").unwrap(),
            ClientRequest::LeaveLobby
        );
    }
}
