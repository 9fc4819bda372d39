use uuid::Uuid;

/// Error taxonomy surfaced to the API layer. Every failure maps to one of
/// these three kinds so the caller can pick a status without inspecting
/// internals.
#[derive(Debug, thiserror::Error)]
pub enum GamificationError {
    #[error("no student profile found for {0}")]
    ProfileNotFound(Uuid),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("data store failure")]
    DataStore(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, GamificationError>;
