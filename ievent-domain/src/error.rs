//! 集成事件层统一错误定义
//!
//! 区分三类语义：配置类错误（警告级，快速失败）、乐观并发冲突（本地恢复，
//! 不向调用方暴露）与其余持久化故障（记录后返回已知状态，不阻塞主链路）。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    /// 配置类错误：发布方/消费方缺少可解析的应用标识
    #[error("missing app id: {reason}")]
    MissingAppId { reason: String },

    /// 乐观并发冲突：写入时 etag 已过期
    #[error("concurrency conflict: key={key}")]
    Concurrency { key: String },

    #[error("state store error: {reason}")]
    StateStore { reason: String },

    #[error("not found: {reason}")]
    NotFound { reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

/// 统一 Result 类型别名
pub type EventResult<T> = Result<T, EventError>;
