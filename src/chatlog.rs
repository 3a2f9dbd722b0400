use chrono::Local;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only chat transcript: `[HH:MM:SS] <message>`, one line per entry.
/// A failure to open the file is non-fatal — the server just runs without a
/// transcript (reported once via the diagnostic logger by the caller).
pub struct ChatLog {
    file: Option<Mutex<tokio::fs::File>>,
}

impl ChatLog {
    pub async fn open(path: &str) -> Self {
        match OpenOptions::new().create(true).append(true).open(path).await {
            Ok(file) => Self {
                file: Some(Mutex::new(file)),
            },
            Err(err) => {
                log::warn!("could not open chat log {path}: {err}, continuing without a transcript");
                Self { file: None }
            }
        }
    }

    /// Append one already-newline-terminated message, stamped with the
    /// current local time.
    pub async fn append(&self, message: &str) {
        let Some(file) = &self.file else { return };
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        let line = if line.ends_with('\n') {
            line
        } else {
            format!("{line}\n")
        };

        let mut file = file.lock().await;
        if let Err(err) = file.write_all(line.as_bytes()).await {
            log::warn!("chat log write failed: {err}");
            return;
        }
        let _ = file.flush().await;
    }
}
