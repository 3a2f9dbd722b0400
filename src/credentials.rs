use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::error::CredentialError;

/// Outcome of checking a username/password pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Ok,
    WrongPassword,
}

/// Outcome of an explicit registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Ok,
    Rejected,
}

/// A line-oriented `username:password` credential file. Reads happen fresh on
/// every `verify` call (no in-memory cache, per spec); writes are serialized by
/// `guard` so two concurrent registrations never interleave appended records.
pub struct CredentialStore {
    path: PathBuf,
    guard: Mutex<()>,
}

/// Trims the first CR, LF, or `:` found in `s`, and everything after it.
fn sanitize(s: &str) -> &str {
    s.find(['\r', '\n', ':']).map_or(s, |i| &s[..i])
}

fn is_valid_field(s: &str) -> bool {
    !s.is_empty() && s.len() <= 49 && !s.contains([':', '\r', '\n'])
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Look up `username`. Missing username auto-registers `(username, password)`
    /// and returns `Ok`. An unreadable credential file is treated as an empty
    /// store, so the first connection to use any username wins it.
    pub async fn verify(&self, username: &str, password: &str) -> VerifyOutcome {
        let username = sanitize(username);
        let password = sanitize(password);

        let _lock = self.guard.lock().await;
        match lookup(&self.path, username).await {
            Some(stored) => {
                if stored == password {
                    VerifyOutcome::Ok
                } else {
                    VerifyOutcome::WrongPassword
                }
            }
            None => {
                // First use: auto-register under the same lock that serializes writers.
                let _ = append_record(&self.path, username, password).await;
                VerifyOutcome::Ok
            }
        }
    }

    /// Explicitly register a new credential pair, rejecting invalid input.
    /// Does not check for an existing username; callers that need "first use
    /// wins" semantics should go through `verify`.
    pub async fn register(&self, username: &str, password: &str) -> RegisterOutcome {
        let username = sanitize(username);
        let password = sanitize(password);
        if !is_valid_field(username) || !is_valid_field(password) {
            return RegisterOutcome::Rejected;
        }

        let _lock = self.guard.lock().await;
        match append_record(&self.path, username, password).await {
            Ok(()) => RegisterOutcome::Ok,
            Err(_) => RegisterOutcome::Rejected,
        }
    }
}

async fn lookup(path: &Path, username: &str) -> Option<String> {
    let file = tokio::fs::File::open(path).await.ok()?;
    let mut lines = BufReader::new(file).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some((u, p)) = line.split_once(':')
            && u == username
        {
            return Some(p.to_string());
        }
    }
    None
}

async fn append_record(path: &Path, username: &str, password: &str) -> Result<(), CredentialError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{username}:{password}\n").as_bytes())
        .await?;
    file.flush().await?;
    Ok(())
}
