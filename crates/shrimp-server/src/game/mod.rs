//! Game state: sessions, tables and resolved rounds.

pub mod round;
pub mod session;
pub mod table;

pub use round::{clearing_price, round_profit, Round, RoundEntry};
pub use session::{partition, Partition, Session, SessionId, TableRef};
pub use table::{CatchOutcome, ChatEntry, Table, TableError, TableSeat, TableState, TABLE_SIZE};
