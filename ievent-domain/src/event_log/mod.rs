//! 事件日志数据模型（event_log）
//!
//! 每个已发布事件对应一条 `IntegrationEventLog`，其下按消费方维护
//! `SubscriptionLog` 与只追加的 `SubscriptionRetryLog`：
//! - 聚合状态恒可由订阅日志纯函数推导，创建之后不直接赋值；
//! - 同一消费方在单条事件日志内至多一条订阅日志；
//! - 重试日志编号单调递增；
//! - `IntegrationEventCount` 为共享计数记录，仅用于运维可见性。
//!
mod event_count;
mod integration_event_log;
mod subscription_log;

pub use event_count::{COUNT_DATA_TYPE, IntegrationEventCount};
pub use integration_event_log::{EventState, IntegrationEventLog, LOG_DATA_TYPE};
pub use subscription_log::{SubscriptionLog, SubscriptionRetryLog, SubscriptionState};
