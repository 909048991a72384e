//! 发布总线（PublishBus）
//!
//! 出站发布的编排者：合并头部、解析目的地、构造信封、驱动钩子并发送。
//! 主数据路径（发送）的失败正常向上传播；簿记路径的失败只记录日志，
//! 不影响发布方（缺少应用标识的配置错误除外，其快速失败）。
//! `republish` 依赖钩子策略还原存储中的原始信封，保持事件 id 不变，
//! 消费端幂等检查因此依旧生效。
//!
use crate::callback::{NoopPublishCallback, PublishCallback};
use crate::error::{PubsubError, PubsubResult};
use crate::headers::HeaderSource;
use crate::transport::PubsubTransport;
use bon::Builder;
use ievent_domain::envelope::EventEnvelope;
use ievent_domain::error::EventError;
use ievent_domain::integration_event::IntegrationEvent;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// 默认 pubsub 组件名
pub const DEFAULT_PUBSUB_NAME: &str = "pubsub";

/// 发布完成后的调用方动作
pub type AfterPublishAction = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

#[derive(Builder)]
pub struct PublishBus {
    transport: Arc<dyn PubsubTransport>,
    #[builder(default = Arc::new(NoopPublishCallback))]
    callback: Arc<dyn PublishCallback>,
    /// 显式 pubsub 组件名；未设置时先取事件声明，再回落默认值
    pubsub_name: Option<String>,
    /// 显式主题覆盖；未设置时取事件声明
    topic: Option<String>,
    /// 静态配置头部，优先于导入值
    #[builder(default)]
    headers: BTreeMap<String, String>,
    /// 随发布透传给传输层的附加参数
    #[builder(default)]
    metadata: BTreeMap<String, String>,
    /// 从入站上下文导入的头部键白名单
    #[builder(default)]
    import_header_keys: Vec<String>,
    /// 发送前移除的头部键
    #[builder(default)]
    remove_header_keys: Vec<String>,
    header_source: Option<Arc<dyn HeaderSource>>,
    after_action: Option<AfterPublishAction>,
}

impl PublishBus {
    pub async fn publish<E>(&self, event: &E) -> PubsubResult<()>
    where
        E: IntegrationEvent,
    {
        let pubsub_name = self
            .pubsub_name
            .as_deref()
            .or_else(|| event.pubsub_name())
            .unwrap_or(DEFAULT_PUBSUB_NAME);
        let topic = self.topic.as_deref().unwrap_or_else(|| event.topic());

        let envelope = EventEnvelope::builder()
            .id(event.event_id())
            .data(serde_json::to_value(event).map_err(EventError::from)?)
            .maybe_headers(self.merged_headers())
            .build();

        if !self
            .callback
            .on_publish_before(&envelope, pubsub_name, topic)
            .await?
        {
            tracing::debug!(event_id = %envelope.id(), topic, "publish vetoed by callback");
            return Ok(());
        }

        self.transport
            .send(pubsub_name, topic, &envelope, &self.metadata)
            .await?;

        match self
            .callback
            .on_publish_after(&envelope, pubsub_name, topic)
            .await
        {
            Ok(()) => {}
            Err(err @ EventError::MissingAppId { .. }) => return Err(err.into()),
            Err(err) => {
                // 簿记失败不阻塞主数据路径
                tracing::error!(event_id = %envelope.id(), error = %err, "publish bookkeeping failed");
            }
        }

        if let Some(action) = &self.after_action {
            action(&envelope);
        }
        Ok(())
    }

    /// 按原始事件 id 重发存储中的信封：失败订阅的重试预算先被恢复，
    /// 再按日志记录的目的地原样重发
    pub async fn republish(&self, event_id: Uuid) -> PubsubResult<()> {
        let Some(source) = self.callback.on_republish_before(event_id).await? else {
            return Err(PubsubError::Event(EventError::NotFound {
                reason: format!("no republish source for event {event_id}"),
            }));
        };

        self.transport
            .send(
                &source.pubsub_name,
                &source.topic,
                &source.envelope,
                &self.metadata,
            )
            .await?;

        if let Err(err) = self.callback.on_republish_after(event_id).await {
            tracing::error!(%event_id, error = %err, "republish bookkeeping failed");
        }
        Ok(())
    }

    /// 头部合并：配置值优先；导入值只填充白名单中尚未设置的键；
    /// 移除名单最后生效。空集合时信封省略 headers 字段。
    fn merged_headers(&self) -> Option<BTreeMap<String, String>> {
        let mut headers = self.headers.clone();

        if let Some(source) = &self.header_source {
            for key in &self.import_header_keys {
                if headers.contains_key(key) {
                    continue;
                }
                if let Some(value) = source.header(key) {
                    headers.insert(key.clone(), value);
                }
            }
        }

        for key in &self.remove_header_keys {
            headers.remove(key);
        }

        if headers.is_empty() { None } else { Some(headers) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::StaticHeaders;
    use async_trait::async_trait;

    struct DummyTransport;

    #[async_trait]
    impl PubsubTransport for DummyTransport {
        async fn send(
            &self,
            _pubsub_name: &str,
            _topic: &str,
            _envelope: &EventEnvelope,
            _metadata: &BTreeMap<String, String>,
        ) -> PubsubResult<()> {
            Ok(())
        }
    }

    fn mk_source() -> Arc<StaticHeaders> {
        let mut source = StaticHeaders::new();
        source.insert("authorization", "Bearer imported");
        source.insert("x-correlation-id", "cor-1");
        source.insert("x-ignored", "nope");
        Arc::new(source)
    }

    // 配置值优先；导入只取白名单内的键；移除名单最后生效
    #[test]
    fn test_header_merge_precedence() {
        let mut configured = BTreeMap::new();
        configured.insert("authorization".to_string(), "Bearer configured".to_string());
        configured.insert("x-secret".to_string(), "s".to_string());

        let bus = PublishBus::builder()
            .transport(Arc::new(DummyTransport))
            .headers(configured)
            .import_header_keys(vec![
                "authorization".to_string(),
                "x-correlation-id".to_string(),
            ])
            .remove_header_keys(vec!["x-secret".to_string()])
            .header_source(mk_source())
            .build();

        let merged = bus.merged_headers().unwrap();
        assert_eq!(merged.get("authorization").unwrap(), "Bearer configured");
        assert_eq!(merged.get("x-correlation-id").unwrap(), "cor-1");
        assert!(!merged.contains_key("x-ignored"));
        assert!(!merged.contains_key("x-secret"));
    }

    #[test]
    fn test_empty_headers_elided() {
        let bus = PublishBus::builder()
            .transport(Arc::new(DummyTransport))
            .build();
        assert!(bus.merged_headers().is_none());
    }

    // 没有头部来源时白名单不生效
    #[test]
    fn test_import_without_source() {
        let bus = PublishBus::builder()
            .transport(Arc::new(DummyTransport))
            .import_header_keys(vec!["authorization".to_string()])
            .build();
        assert!(bus.merged_headers().is_none());
    }
}
