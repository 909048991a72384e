//! 入站投递处理（subscriber）
//!
//! 接收 broker 送达的信封，先经钩子裁决准入，再执行处理器，
//! 最终换算为 broker 投递回调的三态响应。准入闸门保证：
//! 已成功的事件不会被重复处理，处理中的事件不会被并发处理，
//! 预算耗尽的事件停止重试。
//!
use crate::callback::{Admission, PublishCallback};
use async_trait::async_trait;
use ievent_domain::envelope::EventEnvelope;
use ievent_domain::error::EventError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// broker 投递回调的三态响应契约，broker 的传输级重试依赖该语义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// 确认：broker 停止重投
    Success,
    /// 否定确认：broker 继续重投
    Retry,
    /// 否定确认：broker 放弃
    Drop,
}

/// 订阅处理器：消费一条入站信封
#[async_trait]
pub trait SubscriptionHandler: Send + Sync {
    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()>;
}

/// 入站投递处理器：钩子裁决 + 处理执行 + 响应换算
pub struct SubscriptionProcessor {
    callback: Arc<dyn PublishCallback>,
    /// 消费方路由地址，记入订阅日志
    route_url: String,
}

impl SubscriptionProcessor {
    pub fn new(callback: Arc<dyn PublishCallback>, route_url: impl Into<String>) -> Self {
        Self {
            callback,
            route_url: route_url.into(),
        }
    }

    pub async fn process(
        &self,
        envelope: &EventEnvelope,
        handler: &dyn SubscriptionHandler,
    ) -> SubscriptionStatus {
        let admission = match self
            .callback
            .on_subscription_before(envelope, &self.route_url)
            .await
        {
            Ok(admission) => admission,
            Err(err @ EventError::MissingAppId { .. }) => {
                tracing::warn!(event_id = %envelope.id(), error = %err, "subscription rejected by configuration");
                return SubscriptionStatus::Retry;
            }
            Err(err) => {
                // 审计路径故障不阻塞主数据路径
                tracing::error!(event_id = %envelope.id(), error = %err, "subscription bookkeeping failed, processing without it");
                Admission::Admitted
            }
        };

        match admission {
            Admission::AlreadySucceeded => return SubscriptionStatus::Success,
            Admission::InFlight => return SubscriptionStatus::Retry,
            Admission::Exhausted => return SubscriptionStatus::Drop,
            Admission::Admitted => {}
        }

        let outcome = handler.handle(envelope).await;
        let error = outcome.err().map(|e| format!("{e:#}"));

        match self
            .callback
            .on_subscription_after(envelope, error.as_deref())
            .await
        {
            Ok(status) => status,
            Err(err) => {
                tracing::error!(event_id = %envelope.id(), error = %err, "subscription bookkeeping failed after handling");
                match error {
                    None => SubscriptionStatus::Success,
                    Some(_) => SubscriptionStatus::Retry,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 三态响应的线上取值是对 broker 的契约，不可改动
    #[test]
    fn test_status_wire_values() {
        assert_eq!(serde_json::to_value(SubscriptionStatus::Success).unwrap(), json!("SUCCESS"));
        assert_eq!(serde_json::to_value(SubscriptionStatus::Retry).unwrap(), json!("RETRY"));
        assert_eq!(serde_json::to_value(SubscriptionStatus::Drop).unwrap(), json!("DROP"));

        let status: SubscriptionStatus = serde_json::from_value(json!("RETRY")).unwrap();
        assert_eq!(status, SubscriptionStatus::Retry);
    }
}
