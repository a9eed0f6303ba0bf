/// Core error type for the remote-command engine.
///
/// Adapter crates map their platform errors into this type so the poller can
/// tell a failed handshake from a transient fetch error or a failed reply.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
