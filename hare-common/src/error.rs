use thiserror::Error;

pub type Result<T> = std::result::Result<T, HareError>;

#[derive(Debug, Error)]
pub enum HareError {
    #[error("instance already started")]
    AlreadyStarted,

    #[error("broker is closed")]
    BrokerClosed,

    #[error("inbox capacity must be greater than zero")]
    InvalidCapacity,

    #[error("codec error: {0}")]
    Codec(String),

    #[error("malfeasance sink is full")]
    MalfeasanceSinkFull,

    #[error("malfeasance sink is closed")]
    MalfeasanceSinkClosed,

    #[error("invalid malfeasance proof: {0}")]
    InvalidProof(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for HareError {
    fn from(err: bincode::Error) -> Self {
        HareError::Codec(err.to_string())
    }
}
