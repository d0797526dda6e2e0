//! Per-connection handler.
//!
//! Reads newline-terminated requests (decoded lossily as UTF-8), hands each
//! to the coordinator, and turns business-rule failures into the matching
//! failure reply. Outbound
//! lines (replies and broadcasts alike) flow through an unbounded channel
//! drained by a dedicated writer task, terminated with `\r\n`.

use std::borrow::Cow;
use std::net::IpAddr;

use shrimp_protocol::{parse_request, ClientRequest, ParseError, ServerMessage};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::coordinator::CoordinatorError;
use crate::player::ClientId;
use crate::shared::SharedCoordinator;

/// Whether the read loop keeps going after a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Serve one client until it sends `DISCONNECT`, closes the stream, or
/// fails the version handshake.
pub async fn handle_connection<S>(stream: S, address: IpAddr, coordinator: SharedCoordinator)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (outlet, queue) = mpsc::unbounded_channel();
    let client = coordinator.connect(address, outlet.clone());
    info!(client = %client, %address, "Client connected");

    let writer = tokio::spawn(write_lines(writer, queue));
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!(client = %client, "Connection closed by peer");
                break;
            }
            Ok(_) => {
                let line = decode_line(&buf);
                if handle_line(&coordinator, client, &outlet, &line) == Flow::Close {
                    break;
                }
            }
            Err(err) => {
                warn!(client = %client, error = %err, "Read failed");
                break;
            }
        }
    }

    coordinator.disconnect(client);
    drop(outlet);
    // Let the writer flush whatever is still queued.
    if let Err(err) = writer.await {
        warn!(client = %client, error = %err, "Writer task failed");
    }
    info!(client = %client, %address, "Client disconnected");
}

/// Strip the line terminator. Bytes that are not UTF-8 become U+FFFD so a
/// client on another charset keeps its connection.
fn decode_line(buf: &[u8]) -> Cow<'_, str> {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line)
}

async fn write_lines<W>(mut writer: W, mut queue: UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = queue.recv().await {
        let framed = format!("{line}\r\n");
        if let Err(err) = writer.write_all(framed.as_bytes()).await {
            debug!(error = %err, "Write failed; dropping remaining output");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

fn handle_line(
    coordinator: &SharedCoordinator,
    client: ClientId,
    outlet: &UnboundedSender<String>,
    line: &str,
) -> Flow {
    let request = match parse_request(line) {
        Ok(request) => request,
        Err(err) => {
            reject_malformed(client, outlet, &err);
            return Flow::Continue;
        }
    };
    debug!(client = %client, ?request, "Request");

    match request {
        ClientRequest::RequestUsername { version } => {
            match coordinator.identify(client, &version) {
                Ok(()) => Flow::Continue,
                Err(CoordinatorError::VersionMismatch { client: theirs, server }) => {
                    warn!(client = %client, theirs = %theirs, ours = %server, "Protocol version mismatch");
                    reply(outlet, ServerMessage::VersionMismatch { server_version: server });
                    Flow::Close
                }
                Err(err) => fail(client, outlet, &err, ServerMessage::RequestFailed),
            }
        }
        ClientRequest::BecomeAdmin { password } => {
            respond(client, outlet, coordinator.promote(client, &password), |_| {
                ServerMessage::BecomeAdminFailed
            })
        }
        ClientRequest::CreateLobby { name, settings } => respond(
            client,
            outlet,
            coordinator.create_lobby(client, &name, settings),
            |_| ServerMessage::CreateLobbyFailed,
        ),
        ClientRequest::RequestLobbyList => respond(
            client,
            outlet,
            coordinator.request_lobby_list(client),
            |_| ServerMessage::RequestFailed,
        ),
        ClientRequest::JoinLobby { name } => respond(
            client,
            outlet,
            coordinator.join_lobby(client, &name),
            |err| match err {
                CoordinatorError::NotFound(_) => ServerMessage::LobbyNotExist,
                CoordinatorError::LobbyFull => ServerMessage::LobbyFull,
                _ => ServerMessage::JoinLobbyFailed,
            },
        ),
        ClientRequest::LeaveLobby => respond(
            client,
            outlet,
            coordinator.leave_lobby(client),
            |_| ServerMessage::RequestFailed,
        ),
        ClientRequest::CatchShrimp { amount } => respond(
            client,
            outlet,
            coordinator.submit_catch(client, amount),
            |_| ServerMessage::CatchShrimpFailed,
        ),
        ClientRequest::ChatMessage { text } => respond(
            client,
            outlet,
            coordinator.post_chat(client, &text),
            |_| ServerMessage::ChatMessageFailed,
        ),
        ClientRequest::Disconnect => Flow::Close,
    }
}

fn respond(
    client: ClientId,
    outlet: &UnboundedSender<String>,
    result: Result<(), CoordinatorError>,
    failure: impl FnOnce(&CoordinatorError) -> ServerMessage,
) -> Flow {
    match result {
        Ok(()) => Flow::Continue,
        Err(err) => {
            let message = failure(&err);
            fail(client, outlet, &err, message)
        }
    }
}

fn fail(
    client: ClientId,
    outlet: &UnboundedSender<String>,
    err: &CoordinatorError,
    message: ServerMessage,
) -> Flow {
    info!(client = %client, error = %err, reply = %message, "Request refused");
    reply(outlet, message);
    Flow::Continue
}

fn reject_malformed(client: ClientId, outlet: &UnboundedSender<String>, err: &ParseError) {
    match err.command() {
        Some(shrimp_protocol::request::CREATE_LOBBY) => {
            warn!(client = %client, error = %err, "Malformed request");
            reply(outlet, ServerMessage::CreateLobbyFailed);
        }
        Some(_) => {
            warn!(client = %client, error = %err, "Malformed request");
            reply(outlet, ServerMessage::RequestFailed);
        }
        None if matches!(err, ParseError::Empty) => {}
        None => warn!(client = %client, error = %err, "Ignoring unknown request"),
    }
}

fn reply(outlet: &UnboundedSender<String>, message: ServerMessage) {
    // The writer only goes away after this handler drops its sender.
    let _ = outlet.send(message.to_string());
}
