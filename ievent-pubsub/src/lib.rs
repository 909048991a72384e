//! 集成事件发布/订阅层（ievent-pubsub）
//!
//! 面向传输的外层：构造出站信封、驱动发布/订阅钩子、承接入站投递：
//! - `transport`：发布/订阅传输协议与内存实现；
//! - `publish_bus`：出站发布与按原始事件 id 的重发布；
//! - `callback`：发布/订阅钩子策略（空实现与日志写入实现可互换）；
//! - `subscriber`：入站投递处理与 broker 三态响应契约；
//! - `headers`：入站上下文头部的白名单导入。
//!
//! 持久化细节由 `ievent-domain` 的管理器承担，总线只认钩子协议。
//!
pub mod callback;
pub mod error;
pub mod headers;
pub mod publish_bus;
pub mod subscriber;
pub mod transport;
pub mod transport_inmemory;

pub use publish_bus::PublishBus;
pub use subscriber::{SubscriptionProcessor, SubscriptionStatus};
pub use transport_inmemory::InMemoryPubsub;
