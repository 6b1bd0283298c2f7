/// Failures of a call to the todo server. The controller treats every
/// variant the same way: its message becomes the visible error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The request never got an answer.
    #[error("{0}")]
    Transport(String),

    /// A success status with a body that isn't the expected JSON.
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}
