use std::sync::Arc;

use chrono::Local;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::broadcast::{BroadcastFabric, DeliveryOutcome};
use crate::chatlog::ChatLog;
use crate::commands::{self, Command};
use crate::config::Config;
use crate::credentials::{CredentialStore, VerifyOutcome};
use crate::error::AdmissionError;
use crate::mailbox::Mailbox;
use crate::recent::RecentRing;
use crate::registry::{Registry, ReserveOutcome};
use crate::shutdown::ShutdownCoordinator;

/// Everything a session needs that is shared across the whole server. One
/// instance is built at bootstrap and an `Arc` clone handed to every
/// connection task.
pub struct SessionContext {
    pub config: Arc<Config>,
    pub credentials: Arc<CredentialStore>,
    pub registry: Arc<Registry>,
    pub mailbox: Arc<Mailbox>,
    pub recent: Arc<RecentRing>,
    pub fabric: Arc<BroadcastFabric>,
    pub chat_log: Arc<ChatLog>,
    pub shutdown: Arc<ShutdownCoordinator>,
}

/// Drive one accepted connection from handshake through teardown. `_permit`
/// is held for the whole function and released on return; `completion_guard`
/// likewise, so the shutdown coordinator can tell when this session has
/// actually finished, not just when it was told to stop.
pub async fn run(
    stream: TcpStream,
    peer: std::net::SocketAddr,
    ctx: Arc<SessionContext>,
    _permit: OwnedSemaphorePermit,
    completion_guard: Option<mpsc::Sender<()>>,
) {
    let _completion_guard = completion_guard;
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(run_writer(write_half, outgoing_rx));

    let buffer_size = ctx.config.buffer_size;

    let id = match ctx.registry.reserve(outgoing_tx.clone()) {
        ReserveOutcome::Reserved(id) => id,
        ReserveOutcome::Full => {
            log::warn!("rejecting connection from {peer}: {}", AdmissionError::Full);
            let _ = outgoing_tx.send("[Server]: Server full. Try again later.\n".to_string());
            drop(outgoing_tx);
            let _ = writer.await;
            return;
        }
    };

    let Some((username, password)) = read_handshake_pair(&mut reader, buffer_size).await else {
        log::info!("{peer} disconnected before completing the handshake");
        ctx.registry.release(id);
        drop(outgoing_tx);
        let _ = writer.await;
        return;
    };

    let username = strip_cr(&username).to_string();
    let password = strip_cr(&password).to_string();
    if username.trim().is_empty() || password.trim().is_empty() {
        let _ = outgoing_tx.send("ERROR: Invalid username or password. Disconnecting...\n".to_string());
        ctx.registry.release(id);
        drop(outgoing_tx);
        let _ = writer.await;
        return;
    }

    match ctx.credentials.verify(&username, &password).await {
        VerifyOutcome::WrongPassword => {
            let _ = outgoing_tx.send("ERROR: Wrong password. Disconnecting...\n".to_string());
            ctx.registry.release(id);
            drop(outgoing_tx);
            let _ = writer.await;
            return;
        }
        VerifyOutcome::Ok => {}
    }

    log::info!("{peer} authenticated as {username}");
    let default_room = ctx.config.default_room.clone();
    ctx.registry.bind(id, username.clone(), default_room.clone());

    for entry in ctx.mailbox.drain_for(&username) {
        let _ = outgoing_tx.send(format!(
            "[Offline Message]: From {}: {}\n",
            entry.sender, entry.body
        ));
    }

    let join_message = format!("[Server]: {username} has joined #{default_room}\n");
    ctx.fabric.to_room(&join_message, Some(id), &default_room);
    ctx.chat_log.append(&join_message).await;

    let mut room = default_room;
    let mut shutdown = ctx.shutdown.subscribe();

    loop {
        let outcome = tokio::select! {
            outcome = read_capped_line(&mut reader, buffer_size) => outcome,
            _ = shutdown.recv() => break,
        };

        match outcome {
            ReadOutcome::Eof => break,
            ReadOutcome::TooLong => {
                let _ = outgoing_tx.send(format!(
                    "[Server]: Line too long (max {buffer_size} bytes), discarded.\n"
                ));
            }
            ReadOutcome::Line(line) => {
                dispatch(&line, &mut room, id, &username, &outgoing_tx, &ctx).await;
            }
        }
    }

    ctx.registry.release(id);
    let leave_message = format!("[Server]: {username} has left #{room}\n");
    ctx.fabric.to_all(&leave_message, None);
    ctx.chat_log.append(&leave_message).await;

    drop(outgoing_tx);
    let _ = writer.await;
    log::info!("{peer} ({username}) disconnected");
}

async fn dispatch(
    line: &str,
    room: &mut String,
    id: crate::registry::SessionId,
    username: &str,
    outgoing_tx: &UnboundedSender<String>,
    ctx: &SessionContext,
) {
    let send = |line: String| {
        let _ = outgoing_tx.send(line);
    };

    match commands::classify(line) {
        Command::Chat { text } => {
            let chat_line = format!(
                "[{}] [#{room}] {username}: {text}\n",
                Local::now().format("%H:%M:%S")
            );
            ctx.fabric.to_room(&chat_line, Some(id), room);
            ctx.recent.append(chat_line.clone());
            ctx.chat_log.append(&chat_line).await;
        }
        Command::PrivateMessage { target, body } => match ctx.fabric.to_user(&body, &target, username) {
            DeliveryOutcome::Delivered => send(format!("[PM to {target}]: {body}\n")),
            DeliveryOutcome::Queued => {
                send("[Server]: User offline. Message queued for delivery.\n".to_string())
            }
            DeliveryOutcome::MailboxFull => {
                send("[Server]: User offline and mailbox full. Message dropped.\n".to_string())
            }
        },
        Command::Help => send(
            "[Server]: Commands: /pm <user> <msg>, /join <room>, /room, /rooms, /users, /recent, /help\n"
                .to_string(),
        ),
        Command::Recent => {
            for line in ctx.recent.snapshot() {
                send(line);
            }
        }
        Command::Join { room: target_room } => {
            if target_room.is_empty() {
                send("[Server]: Room name required.\n".to_string());
            } else if target_room == *room {
                // Same room: no-op, no re-announcement.
            } else {
                let old_room = ctx
                    .registry
                    .set_room(id, target_room.clone())
                    .unwrap_or_else(|| room.clone());
                let leave_message = format!("[Server]: {username} has left #{old_room}\n");
                ctx.fabric.to_room(&leave_message, Some(id), &old_room);
                ctx.chat_log.append(&leave_message).await;

                let join_message = format!("[Server]: {username} has joined #{target_room}\n");
                ctx.fabric.to_room(&join_message, Some(id), &target_room);
                ctx.chat_log.append(&join_message).await;

                send(format!("[Server]: You joined #{target_room}\n"));
                *room = target_room;
            }
        }
        Command::Room => send(format!("[Server]: You are in #{room}\n")),
        Command::RoomList => {
            let mut rooms: Vec<(String, usize)> = ctx.registry.room_census().into_iter().collect();
            rooms.sort();
            let listing = rooms
                .iter()
                .map(|(room, count)| format!("{room} ({count})"))
                .collect::<Vec<_>>()
                .join(", ");
            send(format!("[Server]: Rooms: {listing}\n"));
        }
        Command::UserList => {
            let mut users = ctx.registry.list_in_room(room);
            users.sort();
            send(format!("[Server]: Users in #{room}: {}\n", users.join(", ")));
        }
    }
}

enum ReadOutcome {
    Line(String),
    TooLong,
    Eof,
}

/// Read one LF-delimited line, capped at `max_len` bytes. A line exceeding
/// the cap is discarded in full (including the bytes past the cap, up to and
/// including the terminating LF) and reported as `TooLong` rather than being
/// split into a second line.
async fn read_capped_line(reader: &mut BufReader<OwnedReadHalf>, max_len: usize) -> ReadOutcome {
    let mut buf = Vec::with_capacity(max_len.min(256));
    loop {
        let mut byte = [0u8; 1];
        match reader.read_exact(&mut byte).await {
            Ok(()) => {}
            // Disconnected mid-line: treat like any other EOF, not a length
            // violation.
            Err(_) => return ReadOutcome::Eof,
        }
        if byte[0] == b'\n' {
            return ReadOutcome::Line(String::from_utf8_lossy(&buf).into_owned());
        }
        if buf.len() >= max_len {
            discard_until_newline(reader).await;
            return ReadOutcome::TooLong;
        }
        buf.push(byte[0]);
    }
}

async fn discard_until_newline(reader: &mut BufReader<OwnedReadHalf>) {
    let mut byte = [0u8; 1];
    loop {
        match reader.read_exact(&mut byte).await {
            Ok(()) if byte[0] == b'\n' => return,
            Ok(()) => continue,
            Err(_) => return,
        }
    }
}

/// Read the two handshake lines (username, then password). `None` means the
/// peer closed before completing the handshake.
async fn read_handshake_pair(
    reader: &mut BufReader<OwnedReadHalf>,
    max_len: usize,
) -> Option<(String, String)> {
    let username = match read_capped_line(reader, max_len).await {
        ReadOutcome::Line(line) => line,
        _ => return None,
    };
    let password = match read_capped_line(reader, max_len).await {
        ReadOutcome::Line(line) => line,
        _ => return None,
    };
    Some((username, password))
}

fn strip_cr(s: &str) -> &str {
    s.strip_suffix('\r').unwrap_or(s)
}

async fn run_writer(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut outgoing_rx: UnboundedReceiver<String>,
) {
    while let Some(line) = outgoing_rx.recv().await {
        if write_half.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if write_half.flush().await.is_err() {
            break;
        }
    }
}
