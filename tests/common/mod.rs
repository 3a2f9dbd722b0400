use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use netchat::config::Config;
use netchat::session::SessionContext;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// A running server bound to an ephemeral port, with a handle to its shared
/// context so tests can trigger shutdown directly instead of sending a
/// process signal.
pub struct TestServer {
    pub addr: std::net::SocketAddr,
    pub ctx: Arc<SessionContext>,
    serve_task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start(config_override: impl FnOnce(&mut Config)) -> Self {
        let mut config = Config::parse_from(["netchatd"]);
        config.bind_addr = "127.0.0.1".to_string();
        config.port = 0;

        let dir = unique_temp_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        config.credential_path = dir.join("users.txt").to_string_lossy().into_owned();
        config.log_path = dir.join("chat.log").to_string_lossy().into_owned();

        config_override(&mut config);

        let listener = TcpListener::bind((config.bind_addr.as_str(), config.port))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let ctx = netchat::build_context(config).await;
        let serve_ctx = ctx.clone();
        let serve_task = tokio::spawn(async move {
            netchat::serve(serve_ctx, listener).await;
        });

        Self {
            addr,
            ctx,
            serve_task,
        }
    }

    pub async fn shutdown(self) {
        self.ctx
            .shutdown
            .shutdown(&self.ctx.fabric, &self.ctx.chat_log)
            .await;
        let _ = timeout(Duration::from_secs(5), self.serve_task).await;
    }
}

fn unique_temp_dir() -> std::path::PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "netchat-it-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    dir
}

/// A scripted client: connects, writes a handshake, and exposes line-level
/// read/write helpers for driving a conversation with the server.
pub struct TestClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: std::net::SocketAddr, username: &str, password: &str) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(format!("{username}\n{password}\n").as_bytes())
            .await
            .unwrap();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n").await.unwrap();
        }
    }

    pub async fn recv_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match timeout(Duration::from_secs(2), self.reader.read_line(&mut line)).await {
            Ok(Ok(0)) => None,
            Ok(Ok(_)) => Some(line),
            Ok(Err(_)) => None,
            Err(_) => None,
        }
    }

    /// Read lines until one matches `predicate`, or time out and return
    /// `None`. Used when unrelated server chatter might arrive first.
    pub async fn recv_matching(&mut self, predicate: impl Fn(&str) -> bool) -> Option<String> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
        loop {
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            let mut line = String::new();
            match timeout(Duration::from_millis(150), self.reader.read_line(&mut line)).await {
                Ok(Ok(0)) => return None,
                Ok(Ok(_)) => {
                    if predicate(&line) {
                        return Some(line);
                    }
                }
                _ => continue,
            }
        }
    }
}
