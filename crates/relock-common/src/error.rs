//! Error types for relock locks and backing stores

/// Error type for backing-store capability calls.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("empty key or value")]
    EmptyKeyOrValue,

    #[error("invalid script arguments: {0}")]
    InvalidArguments(String),

    #[error("store transport failure: {0}")]
    Transport(String),
}

/// Error type for lock acquire/renew/release operations.
#[derive(Debug)]
pub enum LockError {
    /// Another token currently holds the key. The only retryable condition.
    AcquiredByOther,

    /// A blocking acquire exhausted its wait budget. The source is always
    /// [`LockError::AcquiredByOther`].
    Timeout(Box<LockError>),

    /// The caller cancelled the wait before the budget elapsed.
    Cancelled,

    /// Release or renew attempted without holding the current lease.
    NotOwner,

    Transport(StoreError),

    Config(String),

    /// Fewer nodes locked in time than a majority requires.
    QuorumNotReached { acquired: usize, needed: usize },
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::AcquiredByOther => write!(f, "lock is held by another owner"),
            LockError::Timeout(_) => write!(f, "blocking wait for lock timed out"),
            LockError::Cancelled => write!(f, "lock acquisition cancelled by caller"),
            LockError::NotOwner => write!(f, "not the current owner of the lease"),
            LockError::Transport(err) => write!(f, "store error: {err}"),
            LockError::Config(msg) => write!(f, "invalid configuration: {msg}"),
            LockError::QuorumNotReached { acquired, needed } => write!(
                f,
                "quorum not reached: {acquired} of {needed} required nodes locked"
            ),
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            // Deref the box so the source downcasts as a `LockError`, not a
            // `Box<LockError>`.
            LockError::Timeout(inner) => Some(inner.as_ref()),
            LockError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for LockError {
    fn from(err: StoreError) -> Self {
        LockError::Transport(err)
    }
}

impl LockError {
    /// Build the timeout error a blocking acquire returns when its wait
    /// budget elapses while the key is still held elsewhere.
    pub fn block_wait_timeout() -> Self {
        LockError::Timeout(Box::new(LockError::AcquiredByOther))
    }

    /// Whether retrying the acquisition can possibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::AcquiredByOther)
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
