//! 发布/订阅传输协议（PubsubTransport）
//!
//! 真正在进程间搬运字节的外部协作方的最小抽象。
//! 本层不做超时控制，由具体传输实现决定。
//!
use crate::error::PubsubResult;
use async_trait::async_trait;
use ievent_domain::envelope::EventEnvelope;
use std::collections::BTreeMap;

#[async_trait]
pub trait PubsubTransport: Send + Sync {
    /// 将出站信封发送到指定 pubsub 组件与主题；
    /// `metadata` 为随发布透传给传输层的附加参数
    async fn send(
        &self,
        pubsub_name: &str,
        topic: &str,
        envelope: &EventEnvelope,
        metadata: &BTreeMap<String, String>,
    ) -> PubsubResult<()>;
}
