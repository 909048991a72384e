//! 事件日志网关（EventLogStore）
//!
//! 将事件日志与共享计数映射到键值状态存储：确定性键读写、etag 回填、
//! 按判别类型的列表查询。每个写操作只做单次 CAS 尝试，
//! 冲突原样上抛，由管理器决定如何重试。
//!
use super::state_store::StateStore;
use crate::error::{EventError, EventResult};
use crate::event_log::{COUNT_DATA_TYPE, IntegrationEventCount, IntegrationEventLog, LOG_DATA_TYPE};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait EventLogStore: Send + Sync {
    /// 按事件 id 读取日志，etag 随之回填
    async fn get(&self, event_id: Uuid) -> EventResult<Option<IntegrationEventLog>>;

    /// 乐观并发保存，成功后将新 etag 写回 `log`
    async fn save(&self, log: &mut IntegrationEventLog) -> EventResult<()>;

    /// 按判别类型列出全部事件日志（确定性键未知时的初始查找路径）
    async fn query_logs(&self) -> EventResult<Vec<IntegrationEventLog>>;

    /// 共享计数 +1，单次 CAS 尝试
    async fn increment(&self) -> EventResult<()>;

    async fn count(&self) -> EventResult<u64>;

    async fn clear_count(&self) -> EventResult<()>;
}

/// 基于 `StateStore` 的事件日志网关实现
pub struct StateEventLogStore<S> {
    store: Arc<S>,
}

impl<S> StateEventLogStore<S>
where
    S: StateStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn load_count(&self) -> EventResult<IntegrationEventCount> {
        match self.store.get(&IntegrationEventCount::storage_key()).await? {
            Some(entry) => {
                let mut count: IntegrationEventCount = serde_json::from_value(entry.value)?;
                count.set_etag(Some(entry.etag));
                Ok(count)
            }
            None => Ok(IntegrationEventCount::new()),
        }
    }
}

#[async_trait]
impl<S> EventLogStore for StateEventLogStore<S>
where
    S: StateStore,
{
    async fn get(&self, event_id: Uuid) -> EventResult<Option<IntegrationEventLog>> {
        let key = IntegrationEventLog::key_of(event_id);
        match self.store.get(&key).await? {
            Some(entry) => {
                let mut log: IntegrationEventLog = serde_json::from_value(entry.value)?;
                log.set_etag(Some(entry.etag));
                Ok(Some(log))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, log: &mut IntegrationEventLog) -> EventResult<()> {
        let key = log.storage_key();
        let value = serde_json::to_value(&*log)?;
        let etag = self
            .store
            .save(&key, &value, LOG_DATA_TYPE, log.etag())
            .await?;
        log.set_etag(Some(etag));
        Ok(())
    }

    async fn query_logs(&self) -> EventResult<Vec<IntegrationEventLog>> {
        let entries = self.store.query_by_data_type(LOG_DATA_TYPE).await?;
        entries
            .into_iter()
            .map(|entry| {
                let mut log: IntegrationEventLog = serde_json::from_value(entry.value)
                    .map_err(EventError::from)?;
                log.set_etag(Some(entry.etag));
                Ok(log)
            })
            .collect()
    }

    async fn increment(&self) -> EventResult<()> {
        let mut count = self.load_count().await?;
        count.increment();
        let value = serde_json::to_value(&count)?;
        self.store
            .save(
                &IntegrationEventCount::storage_key(),
                &value,
                COUNT_DATA_TYPE,
                count.etag(),
            )
            .await?;
        Ok(())
    }

    async fn count(&self) -> EventResult<u64> {
        Ok(self.load_count().await?.count())
    }

    async fn clear_count(&self) -> EventResult<()> {
        self.store.delete(&IntegrationEventCount::storage_key()).await
    }
}
