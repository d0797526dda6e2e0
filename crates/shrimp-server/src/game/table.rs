//! Three-seat table and its round state machine.
//!
//! `AwaitingCatches(n)` -> (all three seats submitted) -> round `n` resolved
//! -> `AwaitingCatches(n + 1)` or `Terminated` after the last round.
//!
//! Resolution needs all three seats. A table that lost a seat can still take
//! catches but never resolves again; there is no forfeit or timeout.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use shrimp_protocol::{ChatLine, FinishedGameReport, GameSettings, RoundLedger, RoundResult};

use super::round::{clearing_price, round_profit, Round, RoundEntry};
use crate::player::ClientId;

/// Players per table, independent of lobby capacity
pub const TABLE_SIZE: usize = 3;

/// One seated player
#[derive(Clone, Debug)]
pub struct TableSeat {
    pub player: ClientId,
    pub name: String,
    pub expenses: i64,
    pub money: i64,
    /// This round's catch; `None` until the player submits
    pub pending_catch: Option<i64>,
}

impl TableSeat {
    pub fn new(player: ClientId, name: String, expenses: i64, money: i64) -> Self {
        Self {
            player,
            name,
            expenses,
            money,
            pending_catch: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatEntry {
    pub sender: String,
    pub text: String,
    pub sent_at: DateTime<FixedOffset>,
}

impl ChatEntry {
    pub fn to_line(&self) -> ChatLine {
        ChatLine {
            sender: self.sender.clone(),
            text: self.text.clone(),
            timestamp: self.sent_at.format("%H:%M:%S").to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableState {
    AwaitingCatches(u32),
    Terminated,
}

/// Result of a successful submission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatchOutcome {
    /// Recorded; other seats still owe a catch
    Recorded,
    /// This catch completed the round
    Resolved { round: u32, terminated: bool },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("Player is not seated at this table")]
    NotInTable,
    #[error("Catch already submitted this round")]
    AlreadySubmitted,
    #[error("Game has finished")]
    Finished,
    #[error("Round total does not fit in 64 bits")]
    TotalOverflow,
}

/// One game instance: three seats, a round counter, resolved rounds, chat
#[derive(Clone, Debug)]
pub struct Table {
    session_name: String,
    number: u32,
    settings: GameSettings,
    seats: Vec<TableSeat>,
    rounds: BTreeMap<u32, Round>,
    /// Starts at 1, advances only after a round resolves
    current_round: u32,
    chat: Vec<ChatEntry>,
}

impl Table {
    pub fn new(
        session_name: String,
        number: u32,
        settings: GameSettings,
        seats: Vec<TableSeat>,
    ) -> Self {
        Self {
            session_name,
            number,
            settings,
            seats,
            rounds: BTreeMap::new(),
            current_round: 1,
            chat: Vec::new(),
        }
    }

    pub fn state(&self) -> TableState {
        if self.is_terminated() {
            TableState::Terminated
        } else {
            TableState::AwaitingCatches(self.current_round)
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.current_round > self.settings.num_rounds
    }

    /// Record `player`'s catch and resolve the round if it was the last one
    /// missing.
    pub fn submit_catch(
        &mut self,
        player: ClientId,
        amount: i64,
    ) -> Result<CatchOutcome, TableError> {
        if self.is_terminated() {
            return Err(TableError::Finished);
        }

        let index = self
            .seats
            .iter()
            .position(|s| s.player == player)
            .ok_or(TableError::NotInTable)?;

        if self.seats[index].pending_catch.is_some() {
            return Err(TableError::AlreadySubmitted);
        }

        // Nothing is recorded unless the round total fits.
        let completes = self.seats.len() == TABLE_SIZE
            && self
                .seats
                .iter()
                .enumerate()
                .all(|(i, s)| i == index || s.pending_catch.is_some());
        let total_caught = if completes {
            Some(self.total_with(amount).ok_or(TableError::TotalOverflow)?)
        } else {
            None
        };

        self.seats[index].pending_catch = Some(amount);

        let Some(total_caught) = total_caught else {
            return Ok(CatchOutcome::Recorded);
        };
        let round = self.resolve_round(total_caught);
        Ok(CatchOutcome::Resolved {
            round,
            terminated: self.is_terminated(),
        })
    }

    /// Pending catches plus `amount`, or `None` when the sum leaves `i64`
    fn total_with(&self, amount: i64) -> Option<i64> {
        let total: i128 = self
            .seats
            .iter()
            .filter_map(|s| s.pending_catch)
            .map(i128::from)
            .sum::<i128>()
            + i128::from(amount);
        i64::try_from(total).ok()
    }

    /// Resolve the current round. Caller guarantees every seat submitted
    /// and that `total_caught` is their sum.
    fn resolve_round(&mut self, total_caught: i64) -> u32 {
        let catches: Vec<i64> = self
            .seats
            .iter_mut()
            .map(|s| s.pending_catch.take().unwrap_or_default())
            .collect();

        let price = clearing_price(total_caught);

        let entries = self
            .seats
            .iter_mut()
            .zip(catches)
            .map(|(seat, caught)| {
                let profit = round_profit(price, seat.expenses, caught);
                seat.money = seat.money.saturating_add(profit);
                RoundEntry {
                    player: seat.player,
                    name: seat.name.clone(),
                    caught,
                    profit,
                    money: seat.money,
                    expenses: seat.expenses,
                }
            })
            .collect();

        let number = self.current_round;
        self.rounds.insert(
            number,
            Round {
                number,
                entries,
                total_caught,
                price,
            },
        );
        self.current_round += 1;
        number
    }

    /// Append a chat entry and return the line to broadcast
    pub fn post_chat(
        &mut self,
        player: ClientId,
        text: String,
        sent_at: DateTime<FixedOffset>,
    ) -> Result<ChatLine, TableError> {
        let sender = self
            .seat(player)
            .ok_or(TableError::NotInTable)?
            .name
            .clone();
        let entry = ChatEntry {
            sender,
            text,
            sent_at,
        };
        let line = entry.to_line();
        self.chat.push(entry);
        Ok(line)
    }

    /// Drop a seat (disconnect). The table keeps running without it.
    pub fn remove_player(&mut self, player: ClientId) -> bool {
        let before = self.seats.len();
        self.seats.retain(|s| s.player != player);
        self.seats.len() != before
    }

    /// `ROUND_FINISHED` entries for `receiver`: own result first, then the
    /// other seats in seat order.
    pub fn round_results_for(&self, round: u32, receiver: ClientId) -> Option<Vec<RoundResult>> {
        let round = self.rounds.get(&round)?;
        let to_result = |e: &RoundEntry| RoundResult {
            name: e.name.clone(),
            caught: e.caught,
            profit: e.profit,
        };

        let mut results: Vec<RoundResult> = round
            .entries
            .iter()
            .filter(|e| e.player == receiver)
            .map(to_result)
            .collect();
        results.extend(
            round
                .entries
                .iter()
                .filter(|e| e.player != receiver)
                .map(to_result),
        );
        Some(results)
    }

    /// Admin ledger for this table
    pub fn report(&self) -> FinishedGameReport {
        let players = match self.rounds.values().next() {
            Some(first) => first.entries.iter().map(|e| e.name.clone()).collect(),
            None => self.seats.iter().map(|s| s.name.clone()).collect(),
        };

        let rounds = self
            .rounds
            .values()
            .map(|round| RoundLedger {
                number: round.number,
                caught: round.entries.iter().map(|e| e.caught).collect(),
                total: round.total_caught,
                price: round.price,
                margin: round.margin(),
                earnings: round.entries.iter().map(|e| (e.profit, e.money)).collect(),
            })
            .collect();

        FinishedGameReport {
            session_name: self.session_name.clone(),
            table_number: self.number,
            players,
            rounds,
            settings: self.settings.clone(),
            chat: self.chat.iter().map(ChatEntry::to_line).collect(),
        }
    }

    pub fn has_player(&self, player: ClientId) -> bool {
        self.seat(player).is_some()
    }

    pub fn seat(&self, player: ClientId) -> Option<&TableSeat> {
        self.seats.iter().find(|s| s.player == player)
    }

    pub fn seats(&self) -> &[TableSeat] {
        &self.seats
    }

    pub fn players(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.seats.iter().map(|s| s.player)
    }

    pub fn round(&self, number: u32) -> Option<&Round> {
        self.rounds.get(&number)
    }

    pub fn rounds(&self) -> impl Iterator<Item = &Round> {
        self.rounds.values()
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn chat(&self) -> &[ChatEntry] {
        &self.chat
    }
}
