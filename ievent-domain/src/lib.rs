//! 集成事件领域层（ievent-domain）
//!
//! 提供跨应用事件投递的数据模型与状态机，用于在不可靠的发布/订阅传输之上
//! 实现至少一次、可去重、可审计的事件管道：
//! - 事件日志（`event_log`）：发布日志、订阅日志与重试簿记
//! - 出站信封（`envelope`）：云事件形态的线上格式
//! - 持久化契约（`store`）：键值状态存储与事件日志网关，乐观并发写入
//! - 管理器（`manager`）：发布/订阅不变式与重试策略的唯一执行者
//!
//! 本 crate 不绑定具体传输与存储实现，仅定义协议与最小必要的错误类型，
//! 由上层在不同基础设施（消息中间件、状态存储等）上进行适配。
//!
pub mod envelope;
pub mod error;
pub mod event_log;
pub mod integration_event;
pub mod manager;
pub mod store;
