//! Wire vocabulary for the shrimp market server.
//!
//! Newline-terminated text lines in both directions. Names never contain
//! spaces; composite fields are joined with `.`.

pub mod message;
pub mod request;
pub mod settings;

pub use message::{
    ChatLine, FinishedGameReport, LobbySummary, RoundLedger, RoundResult, ServerMessage, Update,
};
pub use request::{parse_request, ClientRequest, ParseError};
pub use settings::GameSettings;
