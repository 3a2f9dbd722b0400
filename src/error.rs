use thiserror::Error;

/// Errors that can surface while bootstrapping the server. These are always fatal.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors from the credential store. A failure to read is handled by the caller
/// (treated as an empty store), not propagated as fatal.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of admission at accept time.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("server full")]
    Full,
}
