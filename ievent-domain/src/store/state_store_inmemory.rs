//! 内存版状态存储（InMemoryStateStore）
//!
//! 基于 `DashMap` 的轻量实现，满足 `StateStore` 协议：
//! 单调递增的 etag，检查与写入在同一键级锁内完成，过期写入被原子拒绝。
//! 典型用途：测试环境、示例与本地开发。
//!
use super::state_store::{StateEntry, StateStore};
use crate::error::{EventError, EventResult};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
struct StoredRecord {
    value: Value,
    etag: String,
    data_type: String,
}

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    records: DashMap<String, StoredRecord>,
    seq: AtomicU64,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_etag(&self) -> String {
        (self.seq.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> EventResult<Option<StateEntry>> {
        Ok(self.records.get(key).map(|record| StateEntry {
            value: record.value.clone(),
            etag: record.etag.clone(),
        }))
    }

    async fn save(
        &self,
        key: &str,
        value: &Value,
        data_type: &str,
        expected_etag: Option<&str>,
    ) -> EventResult<String> {
        let etag = self.next_etag();
        let record = StoredRecord {
            value: value.clone(),
            etag: etag.clone(),
            data_type: data_type.to_string(),
        };

        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if expected_etag != Some(occupied.get().etag.as_str()) {
                    return Err(EventError::Concurrency { key: key.to_string() });
                }
                occupied.insert(record);
            }
            Entry::Vacant(vacant) => {
                if expected_etag.is_some() {
                    return Err(EventError::Concurrency { key: key.to_string() });
                }
                vacant.insert(record);
            }
        }

        Ok(etag)
    }

    async fn query_by_data_type(&self, data_type: &str) -> EventResult<Vec<StateEntry>> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.data_type == data_type)
            .map(|record| StateEntry {
                value: record.value.clone(),
                etag: record.etag.clone(),
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> EventResult<()> {
        self.records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryStateStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let store = InMemoryStateStore::new();
        let etag = store
            .save("k1", &json!({"v": 1}), "T", None)
            .await
            .unwrap();

        let entry = store.get("k1").await.unwrap().unwrap();
        assert_eq!(entry.etag, etag);
        assert_eq!(entry.value, json!({"v": 1}));
    }

    // 新建语义：键已存在时带 etag 的新建与不带 etag 的覆盖都被拒绝
    #[tokio::test]
    async fn test_create_conflicts() {
        let store = InMemoryStateStore::new();
        store.save("k1", &json!(1), "T", None).await.unwrap();

        let err = store.save("k1", &json!(2), "T", None).await.unwrap_err();
        assert!(matches!(err, EventError::Concurrency { .. }));

        let err = store
            .save("missing", &json!(2), "T", Some("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Concurrency { .. }));
    }

    // 过期 etag 的写入被原子拒绝，存量值不变
    #[tokio::test]
    async fn test_stale_etag_rejected() {
        let store = InMemoryStateStore::new();
        let stale = store.save("k1", &json!(1), "T", None).await.unwrap();
        let fresh = store
            .save("k1", &json!(2), "T", Some(&stale))
            .await
            .unwrap();

        let err = store
            .save("k1", &json!(3), "T", Some(&stale))
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Concurrency { .. }));

        let entry = store.get("k1").await.unwrap().unwrap();
        assert_eq!(entry.etag, fresh);
        assert_eq!(entry.value, json!(2));
    }

    #[tokio::test]
    async fn test_query_by_data_type() {
        let store = InMemoryStateStore::new();
        store.save("a", &json!(1), "Log", None).await.unwrap();
        store.save("b", &json!(2), "Log", None).await.unwrap();
        store.save("c", &json!(3), "Count", None).await.unwrap();

        let logs = store.query_by_data_type("Log").await.unwrap();
        assert_eq!(logs.len(), 2);
        let counts = store.query_by_data_type("Count").await.unwrap();
        assert_eq!(counts.len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStateStore::new();
        store.save("k1", &json!(1), "T", None).await.unwrap();
        store.delete("k1").await.unwrap();
        assert!(store.get("k1").await.unwrap().is_none());
        // 删除不存在的键不报错
        store.delete("k1").await.unwrap();
    }
}
