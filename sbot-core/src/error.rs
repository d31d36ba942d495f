use thiserror::Error;

/// Errors surfaced by a [`Transport`](crate::Transport) implementation.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Fetching updates failed. Recovered by the dispatcher's poll backoff.
    #[error("Poll error: {0}")]
    Poll(String),

    /// An outbound call failed. Fatal for the turn, never for the process.
    #[error("Send error: {0}")]
    Send(String),
}
