//! 集成事件契约（IntegrationEvent）
//!
//! 面向跨应用投递的领域事件：声明默认主题，并携带由调用方生成的
//! 全局唯一事件标识，供日志主键与消费端幂等判定复用。
//!
use serde::Serialize;
use uuid::Uuid;

/// 集成事件：可被发布总线包装为出站信封的事件类型
pub trait IntegrationEvent: Serialize + Send + Sync {
    /// 事件声明的默认投递主题
    const TOPIC: &'static str;

    /// 事件全局唯一标识（调用方生成，贯穿日志与重发布）
    fn event_id(&self) -> Uuid;

    /// 事件声明的 pubsub 组件名；返回 None 时由总线配置决定
    fn pubsub_name(&self) -> Option<&str> {
        None
    }

    /// 实际投递主题，默认取类型声明
    fn topic(&self) -> &str {
        Self::TOPIC
    }
}
