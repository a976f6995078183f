use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Rejected locally or by the server; nothing was persisted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("chat service unavailable: {0}")]
    Unavailable(String),

    /// The live subscription ended; subscribe again to recover.
    #[error("subscription terminated: {0}")]
    SubscriptionTerminated(String),
}

impl From<chat_core::ValidationError> for ClientError {
    fn from(e: chat_core::ValidationError) -> Self {
        ClientError::InvalidArgument(e.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Unavailable(e.to_string())
    }
}
