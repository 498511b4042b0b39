#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("api error (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("api key not configured")]
    MissingApiKey,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encode error: {0}")]
    Encode(String),

    #[error("no data directory available")]
    NoDataDir,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("session is busy with another request")]
    Busy,

    #[error("{0}")]
    Other(String),
}
