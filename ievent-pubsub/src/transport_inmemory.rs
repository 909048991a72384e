//! 内存版传输（InMemoryPubsub）
//!
//! 基于 `tokio::sync::broadcast` 的轻量实现，满足 `PubsubTransport` 协议：
//! - `send`：克隆并广播完整的主题消息；
//! - `subscribe`：返回 `'static` 生命周期消息流，便于在 `tokio::spawn` 中消费；
//! - 典型用途：测试环境、示例与本地开发。
//!
//! 注意：无订阅者时发送被忽略，语义与真实 broker 的"发后即忘"一致。
//!
use crate::error::{PubsubError, PubsubResult};
use crate::transport::PubsubTransport;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use ievent_domain::envelope::EventEnvelope;
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// 在内存传输中流转的完整消息：目的地坐标、信封与传输层元数据
#[derive(Debug, Clone)]
pub struct TopicMessage {
    pub pubsub_name: String,
    pub topic: String,
    pub envelope: EventEnvelope,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct InMemoryPubsub {
    tx: broadcast::Sender<TopicMessage>,
}

impl InMemoryPubsub {
    /// 创建内存传输，`capacity` 为广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 返回一个 'static 生命周期的消息流
    pub fn subscribe(&self) -> BoxStream<'static, PubsubResult<TopicMessage>> {
        let rx = self.tx.subscribe();
        let stream = BroadcastStream::new(rx).map(|r| {
            r.map_err(|e| PubsubError::Transport {
                reason: e.to_string(),
            })
        });
        Box::pin(stream)
    }
}

#[async_trait]
impl PubsubTransport for InMemoryPubsub {
    async fn send(
        &self,
        pubsub_name: &str,
        topic: &str,
        envelope: &EventEnvelope,
        metadata: &BTreeMap<String, String>,
    ) -> PubsubResult<()> {
        // 无订阅者时 broadcast 的 send 返回错误，这里视为非致命并忽略
        let _ = self.tx.send(TopicMessage {
            pubsub_name: pubsub_name.to_string(),
            topic: topic.to_string(),
            envelope: envelope.clone(),
            metadata: metadata.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn mk_envelope() -> EventEnvelope {
        EventEnvelope::builder()
            .id(Uuid::new_v4())
            .data(json!({"k": 1}))
            .build()
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let pubsub = InMemoryPubsub::new(16);
        let mut stream = pubsub.subscribe();

        let envelope = mk_envelope();
        pubsub
            .send("pubsub", "order.placed", &envelope, &BTreeMap::new())
            .await
            .unwrap();

        let message = stream.next().await.unwrap().unwrap();
        assert_eq!(message.pubsub_name, "pubsub");
        assert_eq!(message.topic, "order.placed");
        assert_eq!(message.envelope, envelope);
    }

    #[tokio::test]
    async fn test_send_without_subscribers_is_ignored() {
        let pubsub = InMemoryPubsub::new(16);
        pubsub
            .send("pubsub", "t", &mk_envelope(), &BTreeMap::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_clone() {
        let pubsub = InMemoryPubsub::new(16);
        let mut s1 = pubsub.subscribe();
        let mut s2 = pubsub.subscribe();

        let envelope = mk_envelope();
        pubsub
            .send("pubsub", "t", &envelope, &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(s1.next().await.unwrap().unwrap().envelope, envelope);
        assert_eq!(s2.next().await.unwrap().unwrap().envelope, envelope);
    }
}
