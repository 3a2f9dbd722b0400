use clap::Parser;

use crate::error::BootstrapError;

/// Runtime limits and paths. Every field has a compiled-in default matching the
/// reference implementation's constants; each can be overridden by an environment
/// variable, and in turn by a CLI flag.
#[derive(Debug, Clone, Parser)]
#[command(name = "netchatd", about = "Line-oriented multi-room chat server")]
pub struct Config {
    /// Address to bind the listener to.
    #[arg(long, env = "NETCHAT_BIND", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Port to listen on.
    #[arg(long, env = "NETCHAT_PORT", default_value_t = 5555)]
    pub port: u16,

    /// Maximum number of concurrently connected sessions.
    #[arg(long, env = "NETCHAT_MAX_CLIENTS", default_value_t = 10)]
    pub max_clients: usize,

    /// Capacity of the recent-message ring buffer (`/recent`).
    #[arg(long, env = "NETCHAT_RECENT_CAPACITY", default_value_t = 20)]
    pub recent_capacity: usize,

    /// Capacity of the offline (private message) mailbox, across all recipients.
    #[arg(long, env = "NETCHAT_MAILBOX_CAPACITY", default_value_t = 10)]
    pub mailbox_capacity: usize,

    /// Maximum line length accepted from a client, in bytes.
    #[arg(long, env = "NETCHAT_BUFFER_SIZE", default_value_t = 1024)]
    pub buffer_size: usize,

    /// Path to the line-oriented `username:password` credential file.
    #[arg(long, env = "NETCHAT_USERS_FILE", default_value = "users.txt")]
    pub credential_path: String,

    /// Path to the append-only chat transcript log.
    #[arg(long, env = "NETCHAT_LOG_FILE", default_value = "chat.log")]
    pub log_path: String,

    /// Default room new sessions join after authenticating.
    #[arg(long, env = "NETCHAT_DEFAULT_ROOM", default_value = "general")]
    pub default_room: String,
}

impl Config {
    /// Parse configuration from CLI args (with environment variable and default
    /// fallback), then validate it. Malformed or nonsensical overrides are a
    /// bootstrap error, not silently ignored.
    pub fn load() -> Result<Self, BootstrapError> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BootstrapError> {
        if self.max_clients == 0 {
            return Err(BootstrapError::Config(
                "max_clients must be at least 1".into(),
            ));
        }
        if self.recent_capacity == 0 {
            return Err(BootstrapError::Config(
                "recent_capacity must be at least 1".into(),
            ));
        }
        if self.buffer_size < 16 {
            return Err(BootstrapError::Config(
                "buffer_size must be at least 16 bytes".into(),
            ));
        }
        if self.default_room.trim().is_empty() || self.default_room.len() > 30 {
            return Err(BootstrapError::Config(
                "default_room must be non-empty and at most 30 bytes".into(),
            ));
        }
        Ok(())
    }
}
