//! 持久化契约（store）
//!
//! 定义事件日志所依赖的键值状态存储协议与事件日志网关：
//! - `StateStore`：get/save（乐观并发）/按判别类型查询/删除；
//! - `EventLogStore`：事件日志与共享计数的读写，单次 CAS 尝试，
//!   冲突上抛由管理器决定重试；
//! - `InMemoryStateStore`：测试与本地开发用的内存实现。
//!
//! 该模块不含任何重试逻辑，也不产生存储之外的副作用。
//!
mod event_log_store;
mod state_store;
mod state_store_inmemory;

pub use event_log_store::{EventLogStore, StateEventLogStore};
pub use state_store::{StateEntry, StateStore};
pub use state_store_inmemory::InMemoryStateStore;

/// 确定性存储键："{类型名}_{id}"，事件日志与任意存储值共用该形态，
/// 无需二级索引即可按主键定位
pub fn storage_key(type_name: &str, id: &str) -> String {
    format!("{type_name}_{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_shape() {
        assert_eq!(storage_key("IntegrationEventLog", "e-1"), "IntegrationEventLog_e-1");
    }
}
