//! 集成事件管理器（IntegrationEventManager）
//!
//! 事件/订阅状态机的唯一执行者：创建发布日志、裁决再投递准入、
//! 记录成功/失败、维护重试簿记与共享计数。
//!
//! 一致性完全依赖持久化日志上的乐观并发：写入冲突时重读规范状态，
//! 在有界循环内基于最新状态重推导意图后重试；冲突从不暴露给调用方。
//! 日志功能关闭时所有操作返回 `Disabled` 哨兵且不触达存储，
//! 调用方无需分支判空。
//!
use crate::envelope::EventEnvelope;
use crate::error::{EventError, EventResult};
use crate::event_log::IntegrationEventLog;
use crate::store::EventLogStore;
use bon::Builder;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 单个逻辑操作允许的 CAS 重试上限。正常争用下冲突在微秒级化解，
/// 达到上限视为异常持久化故障处理。
const MAX_SAVE_ATTEMPTS: usize = 10;

/// 事件日志选项
#[derive(Clone, Copy, Debug)]
pub struct EventLogOptions {
    /// 是否启用事件日志
    pub enabled: bool,
    /// 单个消费方的最大重试预算
    pub max_retry: u32,
}

impl Default for EventLogOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retry: 3,
        }
    }
}

/// 应用标识解析器：发布方与消费方身份的来源
pub trait AppIdResolver: Send + Sync {
    /// 无法解析时返回 None
    fn resolve(&self) -> Option<String>;
}

/// 固定应用标识
pub struct FixedAppId(String);

impl FixedAppId {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self(app_id.into())
    }
}

impl AppIdResolver for FixedAppId {
    fn resolve(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// 管理器操作返回的日志。日志功能关闭时为 `Disabled` 哨兵，
/// 按值判别而非引用比较。
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedLog {
    Disabled,
    Tracked(IntegrationEventLog),
}

impl ManagedLog {
    pub fn is_disabled(&self) -> bool {
        matches!(self, ManagedLog::Disabled)
    }

    pub fn as_tracked(&self) -> Option<&IntegrationEventLog> {
        match self {
            ManagedLog::Disabled => None,
            ManagedLog::Tracked(log) => Some(log),
        }
    }

    pub fn into_tracked(self) -> Option<IntegrationEventLog> {
        match self {
            ManagedLog::Disabled => None,
            ManagedLog::Tracked(log) => Some(log),
        }
    }
}

/// 订阅日志创建结果：准入与拒绝在类型上显式区分，
/// 拒绝时日志原样返回，调用方不得继续处理
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionOutcome {
    Disabled,
    Admitted(IntegrationEventLog),
    Denied(IntegrationEventLog),
}

#[derive(Builder)]
pub struct IntegrationEventManager {
    store: Arc<dyn EventLogStore>,
    app_id_resolver: Arc<dyn AppIdResolver>,
    #[builder(default)]
    options: EventLogOptions,
    #[builder(default)]
    cancellation: CancellationToken,
}

impl IntegrationEventManager {
    pub fn enabled(&self) -> bool {
        self.options.enabled
    }

    pub fn max_retry(&self) -> u32 {
        self.options.max_retry
    }

    /// 当前解析到的应用标识
    pub fn app_id(&self) -> Option<String> {
        self.app_id_resolver.resolve()
    }

    fn resolve_app_id(&self) -> EventResult<String> {
        self.app_id_resolver.resolve().ok_or_else(|| EventError::MissingAppId {
            reason: "no resolvable application id".to_string(),
        })
    }

    /// 为出站事件创建发布日志并递增共享计数。
    /// 缺少可解析应用标识时快速失败，不做静默兜底。
    pub async fn create_publish_log(
        &self,
        envelope: &EventEnvelope,
        pubsub_name: &str,
        topic: &str,
    ) -> EventResult<ManagedLog> {
        if !self.options.enabled {
            return Ok(ManagedLog::Disabled);
        }
        let app_id = self.resolve_app_id()?;

        let mut log = IntegrationEventLog::new(
            envelope.id(),
            app_id,
            pubsub_name.to_string(),
            topic.to_string(),
            envelope.to_value()?,
        );
        self.store.save(&mut log).await?;
        self.increment().await;

        Ok(ManagedLog::Tracked(log))
    }

    /// 按事件 id 读取日志
    pub async fn get_log(&self, event_id: Uuid) -> EventResult<ManagedLog> {
        if !self.options.enabled {
            return Ok(ManagedLog::Disabled);
        }
        let log = self
            .store
            .get(event_id)
            .await?
            .ok_or_else(|| EventError::NotFound {
                reason: format!("integration event log {event_id}"),
            })?;
        Ok(ManagedLog::Tracked(log))
    }

    /// 再投递准入闸门：
    /// - 日志功能关闭，或当前消费方尚无订阅日志时允许；
    /// - 订阅处于 Fail 且重试预算未尽时允许；
    /// - Processing、Success 与预算耗尽的 Fail 一律拒绝。
    pub fn can_subscription(&self, log: &ManagedLog) -> bool {
        match log {
            ManagedLog::Disabled => true,
            ManagedLog::Tracked(log) => {
                let Some(app_id) = self.app_id_resolver.resolve() else {
                    tracing::warn!("cannot identify consumer, subscription denied");
                    return false;
                };
                log.subscription_allowed(&app_id, self.options.max_retry)
            }
        }
    }

    /// 为当前消费方创建或复活订阅日志。内部重新校验准入；
    /// 拒绝时日志原样返回。
    pub async fn create_subscription_log(
        &self,
        event_id: Uuid,
        route_url: &str,
    ) -> EventResult<SubscriptionOutcome> {
        if !self.options.enabled {
            return Ok(SubscriptionOutcome::Disabled);
        }
        let app_id = self.resolve_app_id()?;
        let max_retry = self.options.max_retry;
        let route_url = route_url.to_string();

        let (log, admitted) = self
            .save_with_retry(event_id, move |log| {
                log.admit_subscription(&app_id, &route_url, max_retry)
            })
            .await?;

        Ok(if admitted {
            SubscriptionOutcome::Admitted(log)
        } else {
            SubscriptionOutcome::Denied(log)
        })
    }

    /// 记录当前消费方处理成功并重推导聚合状态
    pub async fn subscription_success(&self, event_id: Uuid) -> EventResult<ManagedLog> {
        if !self.options.enabled {
            return Ok(ManagedLog::Disabled);
        }
        let app_id = self.resolve_app_id()?;

        let (log, changed) = self
            .save_with_retry(event_id, move |log| log.mark_subscription_success(&app_id))
            .await?;
        if !changed {
            tracing::warn!(%event_id, "no subscription log for consumer, success not recorded");
        }
        Ok(ManagedLog::Tracked(log))
    }

    /// 记录当前消费方处理失败，追加重试明细并重推导聚合状态
    pub async fn subscription_fail(
        &self,
        event_id: Uuid,
        message: &str,
    ) -> EventResult<ManagedLog> {
        if !self.options.enabled {
            return Ok(ManagedLog::Disabled);
        }
        let app_id = self.resolve_app_id()?;
        let message = message.to_string();

        let (log, changed) = self
            .save_with_retry(event_id, move |log| {
                log.mark_subscription_fail(&app_id, &message)
            })
            .await?;
        if !changed {
            tracing::warn!(%event_id, "no subscription log for consumer, failure not recorded");
        }
        Ok(ManagedLog::Tracked(log))
    }

    /// 重发布前置：为所有失败订阅恢复重试预算，返回含原始信封的日志
    pub async fn republish_reset(&self, event_id: Uuid) -> EventResult<ManagedLog> {
        if !self.options.enabled {
            return Ok(ManagedLog::Disabled);
        }
        let (log, _changed) = self
            .save_with_retry(event_id, |log| log.reset_failed_retries() > 0)
            .await?;
        Ok(ManagedLog::Tracked(log))
    }

    /// 共享计数 +1。计数只是运维参考：冲突廉价且可无限重试（协作取消），
    /// 其余错误记录后吞掉，不影响主链路。
    pub async fn increment(&self) {
        if !self.options.enabled {
            return;
        }
        loop {
            if self.cancellation.is_cancelled() {
                return;
            }
            match self.store.increment().await {
                Ok(()) => return,
                Err(EventError::Concurrency { .. }) => continue,
                Err(err) => {
                    tracing::error!(error = %err, "event count increment failed");
                    return;
                }
            }
        }
    }

    pub async fn count(&self) -> EventResult<u64> {
        if !self.options.enabled {
            return Ok(0);
        }
        self.store.count().await
    }

    pub async fn clear_count(&self) -> EventResult<()> {
        if !self.options.enabled {
            return Ok(());
        }
        self.store.clear_count().await
    }

    /// 读取-变更-保存的有界 CAS 循环。每轮从存储重读规范日志，
    /// 由 `mutate` 基于最新状态重推导意图；返回日志与是否发生写入。
    /// 冲突之外的保存失败记录后返回已知状态，不阻塞调用方。
    async fn save_with_retry<F>(
        &self,
        event_id: Uuid,
        mut mutate: F,
    ) -> EventResult<(IntegrationEventLog, bool)>
    where
        F: FnMut(&mut IntegrationEventLog) -> bool + Send,
    {
        let mut last_known: Option<IntegrationEventLog> = None;

        for _attempt in 0..MAX_SAVE_ATTEMPTS {
            if self.cancellation.is_cancelled() {
                return Err(EventError::Cancelled);
            }

            let mut log = self
                .store
                .get(event_id)
                .await?
                .ok_or_else(|| EventError::NotFound {
                    reason: format!("integration event log {event_id}"),
                })?;

            if !mutate(&mut log) {
                return Ok((log, false));
            }

            match self.store.save(&mut log).await {
                Ok(()) => return Ok((log, true)),
                Err(EventError::Concurrency { .. }) => {
                    last_known = Some(log);
                }
                Err(err) => {
                    tracing::error!(%event_id, error = %err, "event log save failed, returning best-known state");
                    return Ok((log, false));
                }
            }
        }

        tracing::error!(%event_id, attempts = MAX_SAVE_ATTEMPTS, "optimistic save attempts exhausted");
        match last_known {
            Some(log) => Ok((log, false)),
            None => Err(EventError::Concurrency {
                key: IntegrationEventLog::key_of(event_id),
            }),
        }
    }
}
