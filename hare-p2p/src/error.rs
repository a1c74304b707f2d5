use thiserror::Error;

#[derive(Debug, Error)]
pub enum P2pError {
    #[error("Network is shut down")]
    Closed,
}
