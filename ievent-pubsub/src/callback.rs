//! 发布/订阅钩子策略（PublishCallback）
//!
//! 围绕发布、订阅处理与重发布的六个钩子。trait 默认实现即空策略；
//! `EventLogPublishCallback` 为日志写入策略，驱动管理器的全部调用。
//! 两种策略可互换，总线与入站处理器只认协议，不触达持久化细节。
//!
use crate::subscriber::SubscriptionStatus;
use async_trait::async_trait;
use ievent_domain::envelope::EventEnvelope;
use ievent_domain::error::{EventError, EventResult};
use ievent_domain::event_log::{IntegrationEventLog, SubscriptionLog, SubscriptionState};
use ievent_domain::manager::{IntegrationEventManager, ManagedLog, SubscriptionOutcome};
use std::sync::Arc;
use uuid::Uuid;

/// 订阅准入决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 允许处理（订阅日志已创建或复活）
    Admitted,
    /// 此前已成功处理：幂等确认即可
    AlreadySucceeded,
    /// 另一次投递正在处理中
    InFlight,
    /// 重试预算耗尽
    Exhausted,
}

/// 重发布素材：存储中还原的原始信封与目的地坐标
#[derive(Debug, Clone)]
pub struct RepublishSource {
    pub pubsub_name: String,
    pub topic: String,
    pub envelope: EventEnvelope,
}

#[async_trait]
pub trait PublishCallback: Send + Sync {
    /// 发布前置钩子；返回 false 时否决本次发布
    async fn on_publish_before(
        &self,
        _envelope: &EventEnvelope,
        _pubsub_name: &str,
        _topic: &str,
    ) -> EventResult<bool> {
        Ok(true)
    }

    /// 发布后置钩子；日志创建与计数递增在此接入
    async fn on_publish_after(
        &self,
        _envelope: &EventEnvelope,
        _pubsub_name: &str,
        _topic: &str,
    ) -> EventResult<()> {
        Ok(())
    }

    /// 订阅前置钩子：裁决本次投递的准入
    async fn on_subscription_before(
        &self,
        _envelope: &EventEnvelope,
        _route_url: &str,
    ) -> EventResult<Admission> {
        Ok(Admission::Admitted)
    }

    /// 订阅后置钩子：按处理结果落账，并换算 broker 响应
    async fn on_subscription_after(
        &self,
        _envelope: &EventEnvelope,
        error: Option<&str>,
    ) -> EventResult<SubscriptionStatus> {
        Ok(match error {
            None => SubscriptionStatus::Success,
            Some(_) => SubscriptionStatus::Retry,
        })
    }

    /// 重发布前置钩子：返回待重发的信封与目的地；None 表示无可重发
    async fn on_republish_before(&self, _event_id: Uuid) -> EventResult<Option<RepublishSource>> {
        Ok(None)
    }

    async fn on_republish_after(&self, _event_id: Uuid) -> EventResult<()> {
        Ok(())
    }
}

/// 空策略：全部走 trait 默认实现
pub struct NoopPublishCallback;

#[async_trait]
impl PublishCallback for NoopPublishCallback {}

/// 日志写入策略：发布建账、订阅准入与成败落账、重发布恢复预算
pub struct EventLogPublishCallback {
    manager: Arc<IntegrationEventManager>,
}

impl EventLogPublishCallback {
    pub fn new(manager: Arc<IntegrationEventManager>) -> Self {
        Self { manager }
    }

    /// 将被拒绝的准入按当前消费方的订阅状态归类
    fn classify_denial(&self, log: &IntegrationEventLog) -> Admission {
        let Some(app_id) = self.manager.app_id() else {
            return Admission::Exhausted;
        };
        match log.subscription(&app_id).map(SubscriptionLog::state) {
            Some(SubscriptionState::Success) => Admission::AlreadySucceeded,
            Some(SubscriptionState::Processing) => Admission::InFlight,
            Some(SubscriptionState::Fail) | None => Admission::Exhausted,
        }
    }
}

#[async_trait]
impl PublishCallback for EventLogPublishCallback {
    async fn on_publish_after(
        &self,
        envelope: &EventEnvelope,
        pubsub_name: &str,
        topic: &str,
    ) -> EventResult<()> {
        self.manager
            .create_publish_log(envelope, pubsub_name, topic)
            .await?;
        Ok(())
    }

    async fn on_subscription_before(
        &self,
        envelope: &EventEnvelope,
        route_url: &str,
    ) -> EventResult<Admission> {
        match self
            .manager
            .create_subscription_log(envelope.id(), route_url)
            .await
        {
            Ok(SubscriptionOutcome::Disabled | SubscriptionOutcome::Admitted(_)) => {
                Ok(Admission::Admitted)
            }
            Ok(SubscriptionOutcome::Denied(log)) => Ok(self.classify_denial(&log)),
            // 没有对应的发布日志（发布方可能关闭了日志）：放行但不做簿记
            Err(EventError::NotFound { .. }) => Ok(Admission::Admitted),
            Err(err) => Err(err),
        }
    }

    async fn on_subscription_after(
        &self,
        envelope: &EventEnvelope,
        error: Option<&str>,
    ) -> EventResult<SubscriptionStatus> {
        match error {
            None => {
                self.manager.subscription_success(envelope.id()).await?;
                Ok(SubscriptionStatus::Success)
            }
            Some(message) => {
                let log = self.manager.subscription_fail(envelope.id(), message).await?;
                // 预算未尽交由 broker 重投，否则放弃
                Ok(if self.manager.can_subscription(&log) {
                    SubscriptionStatus::Retry
                } else {
                    SubscriptionStatus::Drop
                })
            }
        }
    }

    async fn on_republish_before(&self, event_id: Uuid) -> EventResult<Option<RepublishSource>> {
        match self.manager.republish_reset(event_id).await? {
            ManagedLog::Disabled => Ok(None),
            ManagedLog::Tracked(log) => {
                let envelope = EventEnvelope::from_value(log.value())?;
                Ok(Some(RepublishSource {
                    pubsub_name: log.pubsub_name().to_string(),
                    topic: log.topic().to_string(),
                    envelope,
                }))
            }
        }
    }

    async fn on_republish_after(&self, event_id: Uuid) -> EventResult<()> {
        tracing::info!(%event_id, "integration event republished");
        Ok(())
    }
}
