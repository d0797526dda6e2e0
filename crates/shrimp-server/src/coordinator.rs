//! Process-wide coordinator.
//!
//! Owns every registry (identities, clients, lobbies, sessions, finished
//! tables) and implements each protocol operation as one `&mut self` call.
//! Operations never perform I/O: they return an [`Outbox`] holding the
//! caller's reply first and then any broadcasts, in delivery order.
//! Callers serialize access (see [`crate::shared::SharedCoordinator`]), so
//! a lobby filling up, the session it spawns, and a round resolving are
//! each indivisible with respect to every other operation.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use shrimp_protocol::{FinishedGameReport, GameSettings, LobbySummary, ServerMessage, Update};
use tracing::{debug, info, warn};

use crate::config::{RemainderPolicy, ServerConfig};
use crate::game::{
    partition, CatchOutcome, Partition, Session, SessionId, Table, TableError, TableRef,
    TableSeat, TABLE_SIZE,
};
use crate::identity::{IdentityRegistry, NamePool};
use crate::lobby::{Lobby, LobbyError};
use crate::player::{Client, ClientId, Player, Seat};

/// Messages produced by one operation, in the order they must be sent
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outbox {
    messages: Vec<(ClientId, ServerMessage)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, to: ClientId, message: ServerMessage) {
        self.messages.push((to, message));
    }

    pub fn messages(&self) -> &[(ClientId, ServerMessage)] {
        &self.messages
    }

    /// Everything addressed to `client`, in order
    pub fn for_client(&self, client: ClientId) -> Vec<&ServerMessage> {
        self.messages
            .iter()
            .filter(|(to, _)| *to == client)
            .map(|(_, message)| message)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl IntoIterator for Outbox {
    type Item = (ClientId, ServerMessage);
    type IntoIter = std::vec::IntoIter<(ClientId, ServerMessage)>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

/// Business-rule failures, reported to the offending client only
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Unknown client {0}")]
    UnknownClient(ClientId),
    #[error("Client has not requested a username")]
    NotIdentified,
    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch { client: String, server: String },
    #[error("No lobby named {0:?}")]
    NotFound(String),
    #[error("Lobby name {0:?} is already in use")]
    DuplicateName(String),
    #[error("Lobby is full")]
    LobbyFull,
    #[error("Player is already in lobby {0:?}")]
    AlreadyInLobby(String),
    #[error("Player is already seated at a table")]
    AlreadySeated,
    #[error("Invalid lobby settings: {0}")]
    InvalidSettings(String),
    #[error("Catch {amount} outside [{min}, {max}]")]
    CatchOutOfRange { amount: i64, min: i64, max: i64 },
    #[error("Catch already submitted this round")]
    AlreadySubmitted,
    #[error("Player is not seated at a table")]
    NotInTable,
    #[error("Round total would overflow")]
    TotalOverflow,
}

impl From<TableError> for CoordinatorError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::AlreadySubmitted => CoordinatorError::AlreadySubmitted,
            TableError::NotInTable | TableError::Finished => CoordinatorError::NotInTable,
            TableError::TotalOverflow => CoordinatorError::TotalOverflow,
        }
    }
}

impl From<LobbyError> for CoordinatorError {
    fn from(err: LobbyError) -> Self {
        match err {
            LobbyError::LobbyFull => CoordinatorError::LobbyFull,
            LobbyError::AlreadyInLobby(name) => CoordinatorError::AlreadyInLobby(name),
        }
    }
}

/// Registries shared by every connection
pub struct Coordinator {
    config: ServerConfig,
    identities: IdentityRegistry,
    clients: BTreeMap<ClientId, Client>,
    /// Active lobbies in creation order
    lobbies: Vec<Lobby>,
    sessions: HashMap<SessionId, Session>,
    /// Finished tables; a table's index is its append position
    finished: Vec<Table>,
    chat_offset: FixedOffset,
    next_client: u64,
    next_session: u64,
}

impl Coordinator {
    pub fn new(config: ServerConfig, names: NamePool) -> Self {
        let chat_offset = FixedOffset::east_opt(config.chat_utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());

        Self {
            config,
            identities: IdentityRegistry::new(names),
            clients: BTreeMap::new(),
            lobbies: Vec::new(),
            sessions: HashMap::new(),
            finished: Vec::new(),
            chat_offset,
            next_client: 0,
            next_session: 0,
        }
    }

    /// Register a new connection from `address`
    pub fn connect(&mut self, address: IpAddr) -> ClientId {
        let id = ClientId(self.next_client);
        self.next_client += 1;
        self.clients.insert(
            id,
            Client {
                id,
                address,
                player: None,
            },
        );
        debug!(client = %id, %address, "Client registered");
        id
    }

    /// `REQUEST_USERNAME`: look up or issue the address's name and create
    /// the connection's player. Repeating it returns the same name.
    pub fn identify(&mut self, client: ClientId, version: &str) -> Result<Outbox, CoordinatorError> {
        if version != self.config.protocol_version {
            return Err(CoordinatorError::VersionMismatch {
                client: version.to_string(),
                server: self.config.protocol_version.clone(),
            });
        }

        let expenses = self.config.player_expenses;
        let entry = self
            .clients
            .get_mut(&client)
            .ok_or(CoordinatorError::UnknownClient(client))?;
        let identity = self.identities.identify(entry.address);

        if entry.player.is_none() {
            entry.player = Some(Player::new(client, identity.name.clone(), expenses));
        }

        if identity.is_new {
            info!(client = %client, address = %entry.address, name = %identity.name, "Issued new username");
        } else {
            info!(client = %client, address = %entry.address, name = %identity.name, "Client reconnected");
        }

        let mut outbox = Outbox::new();
        outbox.push(
            client,
            ServerMessage::Username {
                name: identity.name,
                is_admin: identity.is_admin,
            },
        );
        Ok(outbox)
    }

    /// `BECOME_ADMIN`: on success the new admin also receives every
    /// finished game recorded so far.
    pub fn promote(&mut self, client: ClientId, password: &str) -> Result<Outbox, CoordinatorError> {
        let address = self.client(client)?.address;
        let mut outbox = Outbox::new();

        if self
            .identities
            .promote(address, password, &self.config.admin_password)
        {
            info!(client = %client, %address, "Client became admin");
            outbox.push(client, ServerMessage::BecomeAdminSuccessful);
            self.send_finished_games(client, &mut outbox);
        } else {
            warn!(client = %client, %address, "Wrong admin password");
            outbox.push(client, ServerMessage::BecomeAdminFailed);
        }

        Ok(outbox)
    }

    /// Queue every finished game for `client`, oldest first
    pub fn send_finished_games(&self, client: ClientId, outbox: &mut Outbox) {
        for table in &self.finished {
            outbox.push(
                client,
                ServerMessage::Update(Update::FinishedGame(table.report())),
            );
        }
    }

    /// `CREATE_LOBBY`
    pub fn create_lobby(
        &mut self,
        client: ClientId,
        name: &str,
        settings: GameSettings,
    ) -> Result<Outbox, CoordinatorError> {
        self.player(client)?;
        self.validate_lobby(name, &settings)?;

        if self.lobby_index(name).is_some() {
            return Err(CoordinatorError::DuplicateName(name.to_string()));
        }

        info!(
            client = %client,
            lobby = %name,
            capacity = settings.num_players,
            rounds = settings.num_rounds,
            "Created lobby"
        );
        self.lobbies.push(Lobby::new(name.to_string(), settings));

        let mut outbox = Outbox::new();
        outbox.push(client, ServerMessage::CreateLobbySuccess);
        self.broadcast_lobbies(&mut outbox);
        Ok(outbox)
    }

    /// `REQUEST_LOBBY_LIST`
    pub fn request_lobby_list(&self, client: ClientId) -> Result<Outbox, CoordinatorError> {
        self.client(client)?;
        let mut outbox = Outbox::new();
        outbox.push(
            client,
            ServerMessage::LobbyList {
                lobbies: self.list_lobbies(),
            },
        );
        Ok(outbox)
    }

    /// `JOIN_LOBBY`. The join that fills the lobby spawns its session
    /// before returning.
    pub fn join_lobby(&mut self, client: ClientId, name: &str) -> Result<Outbox, CoordinatorError> {
        let player = self.player(client)?;
        match &player.seat {
            Seat::Idle => {}
            Seat::Lobby(current) => return Err(CoordinatorError::AlreadyInLobby(current.clone())),
            Seat::Table(_) => return Err(CoordinatorError::AlreadySeated),
        }
        let player_name = player.name.clone();

        let index = self
            .lobby_index(name)
            .ok_or_else(|| CoordinatorError::NotFound(name.to_string()))?;
        let lobby = &mut self.lobbies[index];
        let filled = lobby.join(client)?;
        info!(
            player = %player_name,
            lobby = %name,
            players = lobby.player_count(),
            capacity = lobby.capacity(),
            "Player joined lobby"
        );
        self.player_mut(client)?.seat = Seat::Lobby(name.to_string());

        let mut outbox = Outbox::new();
        outbox.push(client, ServerMessage::LobbyJoined);
        if filled {
            self.spawn_session(index, &mut outbox);
        } else {
            self.broadcast_lobbies(&mut outbox);
        }
        Ok(outbox)
    }

    /// `LEAVE_LOBBY`. Idle players get a plain acknowledgement; seated
    /// players are left where they are.
    pub fn leave_lobby(&mut self, client: ClientId) -> Result<Outbox, CoordinatorError> {
        let player = self.player_mut(client)?;
        let mut outbox = Outbox::new();

        let name = match &player.seat {
            Seat::Idle => {
                outbox.push(client, ServerMessage::LobbyLeft);
                return Ok(outbox);
            }
            Seat::Table(_) => {
                debug!(client = %client, "Ignoring LEAVE_LOBBY from seated player");
                return Ok(outbox);
            }
            Seat::Lobby(name) => name.clone(),
        };
        player.seat = Seat::Idle;
        let player_name = player.name.clone();

        if let Some(index) = self.lobby_index(&name) {
            self.lobbies[index].leave(client);
        }
        info!(player = %player_name, lobby = %name, "Player left lobby");

        outbox.push(client, ServerMessage::LobbyLeft);
        self.broadcast_lobbies(&mut outbox);
        Ok(outbox)
    }

    /// `CATCH_SHRIMP`. The catch completing a round resolves it, and the
    /// final round finishes the table, inside this call.
    pub fn submit_catch(&mut self, client: ClientId, amount: i64) -> Result<Outbox, CoordinatorError> {
        let table_ref = self.table_ref_of(client)?;
        let enforce_range = self.config.enforce_catch_range;
        let table = self
            .table_mut(table_ref)
            .ok_or(CoordinatorError::NotInTable)?;

        if enforce_range && !table.settings().catch_in_range(amount) {
            return Err(CoordinatorError::CatchOutOfRange {
                amount,
                min: table.settings().min_catch,
                max: table.settings().max_catch,
            });
        }

        let outcome = table.submit_catch(client, amount)?;
        debug!(client = %client, amount, round = table.current_round(), "Catch recorded");

        let mut outbox = Outbox::new();
        outbox.push(client, ServerMessage::CaughtSuccessfully);
        if let CatchOutcome::Resolved { round, terminated } = outcome {
            self.publish_round(table_ref, round, &mut outbox);
            if terminated {
                self.finish_table(table_ref, &mut outbox);
            }
        }
        Ok(outbox)
    }

    /// `CHAT_MESSAGE`: relayed to every seat, sender included
    pub fn post_chat(&mut self, client: ClientId, text: &str) -> Result<Outbox, CoordinatorError> {
        let table_ref = self.table_ref_of(client)?;
        let sent_at = self.now();
        let table = self
            .table_mut(table_ref)
            .ok_or(CoordinatorError::NotInTable)?;
        let line = table.post_chat(client, text.to_string(), sent_at)?;
        info!(
            session = %table.session_name(),
            table = table.number(),
            sender = %line.sender,
            "Chat message"
        );

        let mut outbox = Outbox::new();
        outbox.push(client, ServerMessage::MessageReceived);
        for player in table.players() {
            outbox.push(player, ServerMessage::Update(Update::MessageSent(line.clone())));
        }
        Ok(outbox)
    }

    /// Connection closed. Idempotent.
    pub fn disconnect(&mut self, client: ClientId) -> Outbox {
        let mut outbox = Outbox::new();
        let Some(removed) = self.clients.remove(&client) else {
            return outbox;
        };
        let Some(player) = removed.player else {
            info!(client = %client, address = %removed.address, "Client disconnected");
            return outbox;
        };
        info!(client = %client, name = %player.name, "Player disconnected");

        match player.seat {
            Seat::Idle => {}
            Seat::Lobby(name) => {
                if let Some(index) = self.lobby_index(&name) {
                    self.lobbies[index].leave(client);
                }
                self.broadcast_lobbies(&mut outbox);
            }
            Seat::Table(table_ref) => {
                if let Some(table) = self.table_mut(table_ref) {
                    table.remove_player(client);
                    warn!(
                        session = %table.session_name(),
                        table = table.number(),
                        seats = table.seats().len(),
                        "Seat lost mid-game; table can no longer resolve rounds"
                    );
                }
                self.broadcast_lobbies(&mut outbox);
            }
        }
        outbox
    }

    /// Snapshot of the active lobbies, creation order
    pub fn list_lobbies(&self) -> Vec<LobbySummary> {
        self.lobbies.iter().map(Lobby::summary).collect()
    }

    /// Reports for every finished table, index order
    pub fn list_finished_games(&self) -> Vec<FinishedGameReport> {
        self.finished.iter().map(Table::report).collect()
    }

    pub fn finished_game(&self, index: usize) -> Option<FinishedGameReport> {
        self.finished.get(index).map(Table::report)
    }

    pub fn client_player(&self, client: ClientId) -> Option<&Player> {
        self.clients.get(&client)?.player.as_ref()
    }

    pub fn lobby(&self, name: &str) -> Option<&Lobby> {
        self.lobbies.iter().find(|l| l.name() == name)
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn table(&self, table_ref: TableRef) -> Option<&Table> {
        self.sessions.get(&table_ref.session)?.table(table_ref.number)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // --- internals ---

    fn client(&self, client: ClientId) -> Result<&Client, CoordinatorError> {
        self.clients
            .get(&client)
            .ok_or(CoordinatorError::UnknownClient(client))
    }

    fn player(&self, client: ClientId) -> Result<&Player, CoordinatorError> {
        self.client(client)?
            .player
            .as_ref()
            .ok_or(CoordinatorError::NotIdentified)
    }

    fn player_mut(&mut self, client: ClientId) -> Result<&mut Player, CoordinatorError> {
        self.clients
            .get_mut(&client)
            .ok_or(CoordinatorError::UnknownClient(client))?
            .player
            .as_mut()
            .ok_or(CoordinatorError::NotIdentified)
    }

    fn table_ref_of(&self, client: ClientId) -> Result<TableRef, CoordinatorError> {
        match self.player(client)?.seat {
            Seat::Table(table_ref) => Ok(table_ref),
            _ => Err(CoordinatorError::NotInTable),
        }
    }

    fn table_mut(&mut self, table_ref: TableRef) -> Option<&mut Table> {
        self.sessions
            .get_mut(&table_ref.session)?
            .table_mut(table_ref.number)
    }

    fn lobby_index(&self, name: &str) -> Option<usize> {
        self.lobbies.iter().position(|l| l.name() == name)
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.chat_offset)
    }

    fn validate_lobby(&self, name: &str, settings: &GameSettings) -> Result<(), CoordinatorError> {
        let invalid = |reason: String| -> Result<(), CoordinatorError> {
            Err(CoordinatorError::InvalidSettings(reason))
        };

        if name.is_empty() || name.contains(['.', ' ']) {
            return invalid(format!("lobby name {name:?} must be one token without '.'"));
        }
        if settings.num_players == 0 {
            return invalid("numPlayers must be positive".into());
        }
        if self.config.matchmaking.require_full_tables
            && settings.num_players % TABLE_SIZE as u32 != 0
        {
            return invalid(format!(
                "numPlayers {} is not a multiple of {TABLE_SIZE}",
                settings.num_players
            ));
        }
        if settings.num_rounds == 0 {
            return invalid("numRounds must be positive".into());
        }
        if settings.min_catch > settings.max_catch {
            return invalid(format!(
                "minCatch {} exceeds maxCatch {}",
                settings.min_catch, settings.max_catch
            ));
        }
        Ok(())
    }

    /// Retire the full lobby at `index` and seat its members.
    fn spawn_session(&mut self, index: usize, outbox: &mut Outbox) {
        let lobby = self.lobbies.remove(index);
        let settings = lobby.settings().clone();
        let Partition { groups, leftover } = partition(lobby.members());

        let id = SessionId(self.next_session);
        self.next_session += 1;

        let mut seat_groups = Vec::with_capacity(groups.len());
        for (group, number) in groups.iter().zip(1u32..) {
            let mut seats = Vec::with_capacity(TABLE_SIZE);
            for member in group {
                let Some(player) = self
                    .clients
                    .get_mut(member)
                    .and_then(|c| c.player.as_mut())
                else {
                    continue;
                };
                player.seat = Seat::Table(TableRef { session: id, number });
                seats.push(TableSeat::new(
                    player.client,
                    player.name.clone(),
                    player.expenses,
                    player.money,
                ));
            }
            seat_groups.push(seats);
        }

        let session = Session::spawn(id, lobby.name().to_string(), settings.clone(), seat_groups);

        for table in session.tables() {
            for seat in table.seats() {
                let mut peers = table
                    .seats()
                    .iter()
                    .filter(|other| other.player != seat.player)
                    .map(|other| other.name.clone());
                let (Some(first), Some(second)) = (peers.next(), peers.next()) else {
                    continue;
                };
                outbox.push(
                    seat.player,
                    ServerMessage::Update(Update::GameStarted {
                        peers: [first, second],
                        settings: settings.clone(),
                        table_number: table.number(),
                        session_name: session.name().to_string(),
                    }),
                );
            }
        }

        info!(
            session = %id,
            name = %session.name(),
            tables = session.tables().len(),
            leftover = leftover.len(),
            "Lobby full; session started"
        );

        if !leftover.is_empty() {
            self.place_leftover(index, lobby.name(), settings, &leftover);
        }

        if !session.is_finished() {
            self.sessions.insert(id, session);
        }
        self.broadcast_lobbies(outbox);
    }

    /// Apply the remainder policy to players that did not fill a table.
    fn place_leftover(
        &mut self,
        index: usize,
        name: &str,
        settings: GameSettings,
        leftover: &[ClientId],
    ) {
        let capacity = settings.num_players as usize;
        let requeue = self.config.matchmaking.remainder == RemainderPolicy::Requeue
            && leftover.len() < capacity;

        if requeue {
            let mut lobby = Lobby::new(name.to_string(), settings);
            for &member in leftover {
                let seat = match lobby.join(member) {
                    Ok(_) => Seat::Lobby(name.to_string()),
                    Err(_) => Seat::Idle,
                };
                if let Ok(player) = self.player_mut(member) {
                    player.seat = seat;
                }
            }
            info!(lobby = %name, players = leftover.len(), "Requeued leftover players");
            self.lobbies.insert(index.min(self.lobbies.len()), lobby);
        } else {
            for &member in leftover {
                if let Ok(player) = self.player_mut(member) {
                    player.seat = Seat::Idle;
                }
            }
            warn!(lobby = %name, players = leftover.len(), "Leftover players released");
        }
    }

    /// Push `ROUND_FINISHED` to every seat and copy the new totals onto
    /// the players.
    fn publish_round(&mut self, table_ref: TableRef, round: u32, outbox: &mut Outbox) {
        let Some(table) = self.table(table_ref) else {
            return;
        };
        let Some(resolved) = table.round(round) else {
            return;
        };

        for player in table.players() {
            if let Some(results) = table.round_results_for(round, player) {
                outbox.push(
                    player,
                    ServerMessage::Update(Update::RoundFinished {
                        price: resolved.price,
                        results,
                    }),
                );
            }
        }
        info!(
            session = %table.session_name(),
            table = table.number(),
            round,
            total = resolved.total_caught,
            price = resolved.price,
            "Round resolved"
        );

        let totals: Vec<(ClientId, i64)> = resolved
            .entries
            .iter()
            .map(|e| (e.player, e.money))
            .collect();
        for (client, money) in totals {
            if let Ok(player) = self.player_mut(client) {
                player.money = money;
            }
        }
    }

    /// Move a terminated table to the finished registry and tell the admins.
    fn finish_table(&mut self, table_ref: TableRef, outbox: &mut Outbox) {
        let Some(session) = self.sessions.get_mut(&table_ref.session) else {
            return;
        };
        let Some(table) = session.remove_table(table_ref.number) else {
            return;
        };
        if session.is_finished() {
            self.sessions.remove(&table_ref.session);
        }

        for client in table.players() {
            if let Ok(player) = self.player_mut(client) {
                if player.seat == Seat::Table(table_ref) {
                    player.seat = Seat::Idle;
                }
            }
        }

        let report = table.report();
        self.finished.push(table);
        info!(
            index = self.finished.len() - 1,
            session = %report.session_name,
            table = report.table_number,
            "Game finished"
        );

        for client in self.clients.values() {
            if client.player.is_some() && self.identities.is_admin(client.address) {
                outbox.push(
                    client.id,
                    ServerMessage::Update(Update::FinishedGame(report.clone())),
                );
            }
        }
    }

    fn broadcast_lobbies(&self, outbox: &mut Outbox) {
        let lobbies = self.list_lobbies();
        for client in self.clients.keys() {
            outbox.push(
                *client,
                ServerMessage::Update(Update::Lobby {
                    lobbies: lobbies.clone(),
                }),
            );
        }
    }
}
