//! 发布计数（IntegrationEventCount）
//!
//! 单条共享计数记录：每次成功发布递增一次，仅用于运维可见性，
//! 不参与正确性判定。与事件日志共用同一乐观并发写入路径。
//!
use crate::store::storage_key;
use serde::{Deserialize, Serialize};

/// 计数记录在状态存储中的判别类型名
pub const COUNT_DATA_TYPE: &str = "IntegrationEventCount";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEventCount {
    count: u64,
    #[serde(skip)]
    etag: Option<String>,
}

impl IntegrationEventCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// 共享记录的确定性存储键
    pub fn storage_key() -> String {
        storage_key(COUNT_DATA_TYPE, "total")
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn increment(&mut self) {
        self.count += 1;
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment() {
        let mut count = IntegrationEventCount::new();
        assert_eq!(count.count(), 0);
        count.increment();
        count.increment();
        assert_eq!(count.count(), 2);
    }

    #[test]
    fn test_storage_key_shape() {
        assert_eq!(IntegrationEventCount::storage_key(), "IntegrationEventCount_total");
    }
}
