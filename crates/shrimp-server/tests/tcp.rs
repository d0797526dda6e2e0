//! End-to-end tests over real TCP sockets.

use std::net::SocketAddr;
use std::time::Duration;

use shrimp_server::{NamePool, Server, ServerConfig, SharedCoordinator, TransportError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpSocket;
use tokio::time::timeout;
use tokio_test::assert_ok;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect from `127.0.0.<host>` so each client gets its own identity.
    async fn connect(server: SocketAddr, host: u8) -> Option<Self> {
        let socket = TcpSocket::new_v4().ok()?;
        socket.bind(SocketAddr::from(([127, 0, 0, host], 0))).ok()?;
        let stream = socket.connect(server).await.ok()?;
        let (read, writer) = stream.into_split();
        Some(Self {
            lines: BufReader::new(read).lines(),
            writer,
        })
    }

    async fn send(&mut self, line: &str) {
        assert_ok!(self.writer.write_all(format!("{line}\r\n").as_bytes()).await);
    }

    async fn recv(&mut self) -> Option<String> {
        let next = assert_ok!(timeout(RECV_TIMEOUT, self.lines.next_line()).await);
        assert_ok!(next)
    }

    /// Skip lines (mostly lobby broadcasts) until one starts with `prefix`.
    async fn recv_until(&mut self, prefix: &str) -> String {
        loop {
            match self.recv().await {
                Some(line) if line.starts_with(prefix) => return line,
                Some(_) => continue,
                None => panic!("connection closed while waiting for {prefix}"),
            }
        }
    }
}

async fn start() -> Option<(SocketAddr, SharedCoordinator)> {
    let coordinator = SharedCoordinator::new(
        ServerConfig::default(),
        NamePool::from_names(["Aqua", "Bay", "Cove", "Delta"]),
    );
    let server = match Server::bind_with(([127, 0, 0, 1], 0).into(), coordinator.clone()).await {
        Ok(server) => server,
        Err(TransportError::BindFailed(_, err))
            if err.kind() == std::io::ErrorKind::PermissionDenied =>
        {
            // Some sandboxed environments disallow socket binds.
            return None;
        }
        Err(err) => panic!("transport error: {err:?}"),
    };
    let address = assert_ok!(server.local_addr());
    tokio::spawn(server.run());
    Some((address, coordinator))
}

#[tokio::test]
async fn full_game_over_tcp() {
    let Some((address, coordinator)) = start().await else {
        return;
    };

    let mut clients = Vec::new();
    for host in 1..=4 {
        let Some(client) = TestClient::connect(address, host).await else {
            return;
        };
        clients.push(client);
    }
    let [a, b, c, admin] = &mut clients[..] else {
        unreachable!();
    };

    for (client, name) in [(&mut *a, "Aqua"), (&mut *b, "Bay"), (&mut *c, "Cove")] {
        client.send("REQUEST_USERNAME 1.7.6").await;
        assert_eq!(client.recv().await.unwrap(), format!("USERNAME {name} false"));
    }
    admin.send("REQUEST_USERNAME 1.7.6").await;
    assert_eq!(admin.recv().await.unwrap(), "USERNAME Delta false");
    admin.send("BECOME_ADMIN detteerbra").await;
    assert_eq!(admin.recv_until("BECOME_ADMIN").await, "BECOME_ADMIN_SUCCESSFUL");

    a.send("CREATE_LOBBY Reef 3 2 60 1 30 0 40").await;
    assert_eq!(a.recv().await.unwrap(), "CREATE_LOBBY_SUCCESS");
    assert_eq!(b.recv_until("UPDATE LOBBY").await, "UPDATE LOBBY Reef.0.3");

    a.send("REQUEST_LOBBY_LIST").await;
    assert_eq!(a.recv_until("LOBBY_LIST").await, "LOBBY_LIST Reef.0.3");

    for client in [&mut *a, &mut *b, &mut *c] {
        client.send("JOIN_LOBBY Reef").await;
        assert_eq!(client.recv_until("LOBBY_").await, "LOBBY_JOINED");
    }
    assert_eq!(
        a.recv_until("UPDATE GAME_STARTED").await,
        "UPDATE GAME_STARTED Bay Cove 2 60 1 30 0 40 1 Reef"
    );
    assert_eq!(
        b.recv_until("UPDATE GAME_STARTED").await,
        "UPDATE GAME_STARTED Aqua Cove 2 60 1 30 0 40 1 Reef"
    );
    assert_eq!(
        c.recv_until("UPDATE GAME_STARTED").await,
        "UPDATE GAME_STARTED Aqua Bay 2 60 1 30 0 40 1 Reef"
    );

    // Round 1: 5 + 5 + 5
    for client in [&mut *a, &mut *b, &mut *c] {
        client.send("CATCH_SHRIMP 5").await;
        assert_eq!(client.recv_until("CAUGHT").await, "CAUGHT_SUCCESSFULLY");
    }
    assert_eq!(
        a.recv_until("UPDATE ROUND_FINISHED").await,
        "UPDATE ROUND_FINISHED 42 Aqua 5 185 Bay 5 185 Cove 5 185"
    );
    assert_eq!(
        b.recv_until("UPDATE ROUND_FINISHED").await,
        "UPDATE ROUND_FINISHED 42 Bay 5 185 Aqua 5 185 Cove 5 185"
    );
    c.recv_until("UPDATE ROUND_FINISHED").await;

    b.send("CHAT_MESSAGE fair winds").await;
    assert_eq!(b.recv_until("MESSAGE_RECEIVED").await, "MESSAGE_RECEIVED");
    let relayed = a.recv_until("UPDATE MESSAGE_SENT").await;
    assert!(relayed.starts_with("UPDATE MESSAGE_SENT Bay fair winds "));

    // Round 2: 10 + 10 + 10 finishes the table
    for client in [&mut *a, &mut *b, &mut *c] {
        client.send("CATCH_SHRIMP 10").await;
        assert_eq!(client.recv_until("CAUGHT").await, "CAUGHT_SUCCESSFULLY");
    }
    assert_eq!(
        c.recv_until("UPDATE ROUND_FINISHED").await,
        "UPDATE ROUND_FINISHED 39 Cove 10 340 Aqua 10 340 Bay 10 340"
    );

    let report = admin.recv_until("UPDATE FINISHED_GAME").await;
    assert!(report.starts_with(
        "UPDATE FINISHED_GAME Reef 1 Aqua.Bay.Cove \
         1.5.5.5.15.42.37.185.185.185.185.185.185,\
         2.10.10.10.30.39.34.340.525.340.525.340.525 3.2.60.1.30.0.40 Bay☐fair winds☐"
    ));
    assert!(report.ends_with('◊'));

    a.send("CATCH_SHRIMP 10").await;
    assert_eq!(a.recv_until("CATCH").await, "CATCH_SHRIMP_FAILED");

    a.send("DISCONNECT").await;
    while a.recv().await.is_some() {}
    assert_eq!(coordinator.inspect(|c| c.client_count()), 3);
}

#[tokio::test]
async fn version_mismatch_is_refused() {
    let Some((address, coordinator)) = start().await else {
        return;
    };
    let Some(mut client) = TestClient::connect(address, 1).await else {
        return;
    };

    client.send("REQUEST_USERNAME 1.0.0").await;
    assert_eq!(client.recv().await.unwrap(), "VERSION_MISMATCH 1.7.6");
    assert!(client.recv().await.is_none());
    assert!(coordinator.inspect(|c| c.list_lobbies().is_empty()));
}
