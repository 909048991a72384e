//! 集成事件日志（IntegrationEventLog）
//!
//! 每个已发布事件一条记录：目的地坐标、原始信封与按消费方划分的订阅日志。
//! 聚合状态由订阅日志完整推导；etag 为读取时携带、写入时必需的
//! 乐观并发令牌，不参与序列化。
//!
use super::subscription_log::{SubscriptionLog, SubscriptionState};
use crate::store::storage_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 事件日志记录在状态存储中的判别类型名
pub const LOG_DATA_TYPE: &str = "IntegrationEventLog";

/// 事件聚合生命周期：Published → Processing → {Success | Fail}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventState {
    Published,
    Processing,
    Success,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEventLog {
    /// 事件唯一标识（调用方生成），即主键
    id: Uuid,
    /// 发布方应用标识
    app_id: String,
    /// 目的地坐标
    pubsub_name: String,
    topic: String,
    /// 发布时的原始信封，重发布时按原样还原
    value: Value,
    state: EventState,
    /// 每个消费方至多一条
    subscription_logs: Vec<SubscriptionLog>,
    /// 乐观并发令牌，随读取回填、随写入校验
    #[serde(skip)]
    etag: Option<String>,
    last_modification_time: DateTime<Utc>,
    publish_time: DateTime<Utc>,
}

impl IntegrationEventLog {
    pub fn new(id: Uuid, app_id: String, pubsub_name: String, topic: String, value: Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            app_id,
            pubsub_name,
            topic,
            value,
            state: EventState::Published,
            subscription_logs: Vec::new(),
            etag: None,
            last_modification_time: now,
            publish_time: now,
        }
    }

    /// 确定性存储键："{类型名}_{事件 id}"
    pub fn key_of(id: Uuid) -> String {
        storage_key(LOG_DATA_TYPE, &id.to_string())
    }

    pub fn storage_key(&self) -> String {
        Self::key_of(self.id)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn pubsub_name(&self) -> &str {
        &self.pubsub_name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn subscription_logs(&self) -> &[SubscriptionLog] {
        &self.subscription_logs
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }

    pub fn last_modification_time(&self) -> DateTime<Utc> {
        self.last_modification_time
    }

    pub fn publish_time(&self) -> DateTime<Utc> {
        self.publish_time
    }

    /// 指定消费方的订阅日志
    pub fn subscription(&self, app_id: &str) -> Option<&SubscriptionLog> {
        self.subscription_logs.iter().find(|s| s.app_id() == app_id)
    }

    /// 指定消费方当前是否允许（再）投递
    pub fn subscription_allowed(&self, app_id: &str, max_retry: u32) -> bool {
        match self.subscription(app_id) {
            None => true,
            Some(sub) => sub.can_retry(max_retry),
        }
    }

    /// 准入并落账：不存在则创建 Processing 订阅日志，存在且预算未尽的
    /// 失败订阅则复活；其余情形拒绝。返回是否发生变更。
    pub fn admit_subscription(&mut self, app_id: &str, route_url: &str, max_retry: u32) -> bool {
        match self.subscription_logs.iter().position(|s| s.app_id() == app_id) {
            Some(idx) => {
                let sub = &mut self.subscription_logs[idx];
                if !sub.can_retry(max_retry) {
                    return false;
                }
                sub.begin_retry();
            }
            None => {
                self.subscription_logs
                    .push(SubscriptionLog::new(app_id.to_string(), route_url.to_string()));
            }
        }
        self.recompute_state();
        true
    }

    /// 指定消费方处理成功。订阅日志缺失时返回 false。
    pub fn mark_subscription_success(&mut self, app_id: &str) -> bool {
        let Some(idx) = self.subscription_logs.iter().position(|s| s.app_id() == app_id) else {
            return false;
        };
        self.subscription_logs[idx].mark_success();
        self.recompute_state();
        true
    }

    /// 指定消费方处理失败，追加重试明细。订阅日志缺失时返回 false。
    pub fn mark_subscription_fail(&mut self, app_id: &str, message: &str) -> bool {
        let Some(idx) = self.subscription_logs.iter().position(|s| s.app_id() == app_id) else {
            return false;
        };
        self.subscription_logs[idx].mark_fail(message.to_string());
        self.recompute_state();
        true
    }

    /// 重发布：为所有失败订阅恢复重试预算，返回受影响数量
    pub fn reset_failed_retries(&mut self) -> usize {
        let mut reset = 0;
        for sub in &mut self.subscription_logs {
            if sub.state() == SubscriptionState::Fail && sub.retry_count() > 0 {
                sub.reset_retry_budget();
                reset += 1;
            }
        }
        if reset > 0 {
            self.touch();
        }
        reset
    }

    /// 聚合状态重推导：全部成功为 Success；任一处理中为 Processing；
    /// 否则 Fail。订阅日志为空时保持创建时的 Published。
    fn recompute_state(&mut self) {
        if let Some(state) = Self::derive_state(&self.subscription_logs) {
            self.state = state;
        }
        self.touch();
    }

    fn derive_state(subs: &[SubscriptionLog]) -> Option<EventState> {
        if subs.is_empty() {
            return None;
        }
        if subs.iter().all(|s| s.state() == SubscriptionState::Success) {
            return Some(EventState::Success);
        }
        if subs.iter().any(|s| s.state() == SubscriptionState::Processing) {
            return Some(EventState::Processing);
        }
        Some(EventState::Fail)
    }

    fn touch(&mut self) {
        self.last_modification_time = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mk_log() -> IntegrationEventLog {
        IntegrationEventLog::new(
            Uuid::new_v4(),
            "order-api".to_string(),
            "pubsub".to_string(),
            "order.placed".to_string(),
            json!({"id": "e-1"}),
        )
    }

    #[test]
    fn test_new_log_is_published() {
        let log = mk_log();
        assert_eq!(log.state(), EventState::Published);
        assert!(log.subscription_logs().is_empty());
        assert!(log.etag().is_none());
    }

    #[test]
    fn test_storage_key_shape() {
        let log = mk_log();
        assert_eq!(log.storage_key(), format!("IntegrationEventLog_{}", log.id()));
    }

    // 状态推导真值表
    #[test]
    fn test_state_truth_table() {
        let mut log = mk_log();

        assert!(log.admit_subscription("a", "/a", 3));
        assert_eq!(log.state(), EventState::Processing);

        assert!(log.mark_subscription_success("a"));
        assert_eq!(log.state(), EventState::Success);

        // 第二个消费方进入后，单个在途订阅让整条事件回到 Processing
        assert!(log.admit_subscription("b", "/b", 3));
        assert_eq!(log.state(), EventState::Processing);

        // 无在途且存在失败时为 Fail，即使其他消费方已成功
        assert!(log.mark_subscription_fail("b", "boom"));
        assert_eq!(log.state(), EventState::Fail);

        // 全部成功后收敛为 Success
        assert!(log.admit_subscription("b", "/b", 3));
        assert!(log.mark_subscription_success("b"));
        assert_eq!(log.state(), EventState::Success);
    }

    // 同一消费方至多一条订阅日志
    #[test]
    fn test_at_most_one_subscription_per_consumer() {
        let mut log = mk_log();
        assert!(log.admit_subscription("a", "/a", 3));
        // 处理中的订阅不允许并发再投递，也不会新增记录
        assert!(!log.admit_subscription("a", "/a", 3));
        assert_eq!(log.subscription_logs().len(), 1);
    }

    // 已成功的订阅再投递是空操作：不新增重试明细
    #[test]
    fn test_redelivery_after_success_is_noop() {
        let mut log = mk_log();
        assert!(log.admit_subscription("a", "/a", 3));
        assert!(log.mark_subscription_success("a"));

        assert!(!log.admit_subscription("a", "/a", 3));
        let sub = log.subscription("a").unwrap();
        assert_eq!(sub.state(), SubscriptionState::Success);
        assert!(sub.retry_logs().is_empty());
    }

    // 预算耗尽后拒绝且不再改变状态
    #[test]
    fn test_admission_denied_after_budget_exhausted() {
        let mut log = mk_log();
        assert!(log.admit_subscription("a", "/a", 2));
        assert!(log.mark_subscription_fail("a", "boom"));
        assert!(log.admit_subscription("a", "/a", 2));
        assert!(log.mark_subscription_fail("a", "boom"));

        let before = log.clone();
        assert!(!log.admit_subscription("a", "/a", 2));
        assert_eq!(log.subscription("a"), before.subscription("a"));
    }

    #[test]
    fn test_reset_failed_retries_only_touches_failed() {
        let mut log = mk_log();
        log.admit_subscription("a", "/a", 1);
        log.mark_subscription_fail("a", "boom");
        log.admit_subscription("b", "/b", 1);
        log.mark_subscription_success("b");

        assert_eq!(log.reset_failed_retries(), 1);
        assert_eq!(log.subscription("a").unwrap().retry_count(), 0);
        assert!(log.subscription_allowed("a", 1));
        // 已清零后再次调用无事发生
        assert_eq!(log.reset_failed_retries(), 0);
    }

    // etag 不参与序列化，反序列化后为空
    #[test]
    fn test_etag_not_serialized() {
        let mut log = mk_log();
        log.set_etag(Some("7".to_string()));

        let value = serde_json::to_value(&log).unwrap();
        assert!(value.get("etag").is_none());

        let restored: IntegrationEventLog = serde_json::from_value(value).unwrap();
        assert!(restored.etag().is_none());
    }
}
