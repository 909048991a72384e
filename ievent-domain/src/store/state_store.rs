//! 键值状态存储协议（StateStore）
//!
//! 外部状态存储的最小抽象：值与 etag 成对读取，写入时校验 etag，
//! 不匹配的写入被原子拒绝。另提供按 `data_type` 判别字段的辅助查询，
//! 用于确定性键未知时的初始查找。
//!
use crate::error::EventResult;
use async_trait::async_trait;
use serde_json::Value;

/// 读取结果：值与乐观并发令牌
#[derive(Debug, Clone)]
pub struct StateEntry {
    pub value: Value,
    pub etag: String,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// 按确定性键读取
    async fn get(&self, key: &str) -> EventResult<Option<StateEntry>>;

    /// 乐观并发保存，返回新的 etag：
    /// - `expected_etag` 为 None 表示新建，键已存在视为冲突；
    /// - etag 不匹配时返回 `EventError::Concurrency`，写入不发生。
    async fn save(
        &self,
        key: &str,
        value: &Value,
        data_type: &str,
        expected_etag: Option<&str>,
    ) -> EventResult<String>;

    /// 按判别类型列出全部记录
    async fn query_by_data_type(&self, data_type: &str) -> EventResult<Vec<StateEntry>>;

    async fn delete(&self, key: &str) -> EventResult<()>;
}
