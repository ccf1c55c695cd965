/// Error Kinds
///
/// A small closed set of error kinds, generalized from the spec's §7 error
/// design rather than one error-per-library. Transport/Decode are retriable
/// or skippable at the block boundary; Config/Startup are fatal.
use std::fmt;

#[derive(Debug, Clone)]
pub enum AppError {
    /// RPC or publisher I/O failure. Callers treat this as retriable.
    Transport(String),
    /// Malformed block/receipt/JSON payload. The offending item is skipped.
    Decode(String),
    /// Reorg ancestor not found within the configured window.
    ReorgTooDeep { head_number: u64 },
    /// Checkpoint file could not be read or written.
    CheckpointIo(String),
    /// Missing or invalid configuration.
    Config(String),
    /// Fatal startup failure.
    Startup(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Transport(msg) => write!(f, "transport error: {msg}"),
            AppError::Decode(msg) => write!(f, "decode error: {msg}"),
            AppError::ReorgTooDeep { head_number } => {
                write!(f, "reorg deeper than window at head {head_number}")
            }
            AppError::CheckpointIo(msg) => write!(f, "checkpoint io error: {msg}"),
            AppError::Config(msg) => write!(f, "config error: {msg}"),
            AppError::Startup(msg) => write!(f, "startup error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::CheckpointIo(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        let e = AppError::ReorgTooDeep { head_number: 42 };
        assert_eq!(e.to_string(), "reorg deeper than window at head 42");
    }
}
