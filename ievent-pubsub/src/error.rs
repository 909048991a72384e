use ievent_domain::error::EventError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum PubsubError {
    #[error("event: {0}")]
    Event(#[from] EventError),

    #[error("transport: {reason}")]
    Transport { reason: String },
}

/// 统一 Result 类型别名
pub type PubsubResult<T> = Result<T, PubsubError>;
