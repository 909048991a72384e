//! 订阅日志（SubscriptionLog）
//!
//! 单个消费方对单条事件的投递/处理记录：状态、重试预算与只追加的重试明细。
//!
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 订阅处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    Processing,
    Success,
    Fail,
}

/// 订阅重试明细：每次失败追加一条，编号单调递增
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRetryLog {
    number: u32,
    message: String,
    retry_time: DateTime<Utc>,
}

impl SubscriptionRetryLog {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn retry_time(&self) -> DateTime<Utc> {
        self.retry_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionLog {
    /// 消费方应用标识
    app_id: String,
    /// 消费方路由地址
    route_url: String,
    state: SubscriptionState,
    /// 已消耗的重试预算（每次失败 +1）
    retry_count: u32,
    retry_logs: Vec<SubscriptionRetryLog>,
    subscription_time: DateTime<Utc>,
    last_modification_time: DateTime<Utc>,
}

impl SubscriptionLog {
    /// 首次投递：进入 Processing，预算未消耗
    pub fn new(app_id: String, route_url: String) -> Self {
        let now = Utc::now();
        Self {
            app_id,
            route_url,
            state: SubscriptionState::Processing,
            retry_count: 0,
            retry_logs: Vec::new(),
            subscription_time: now,
            last_modification_time: now,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn route_url(&self) -> &str {
        &self.route_url
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_logs(&self) -> &[SubscriptionRetryLog] {
        &self.retry_logs
    }

    pub fn subscription_time(&self) -> DateTime<Utc> {
        self.subscription_time
    }

    pub fn last_modification_time(&self) -> DateTime<Utc> {
        self.last_modification_time
    }

    /// 是否还允许一次失败后的再投递
    pub fn can_retry(&self, max_retry: u32) -> bool {
        self.state == SubscriptionState::Fail && self.retry_count < max_retry
    }

    /// 失败订阅复活：回到 Processing，并将最近一条重试明细的时间
    /// 刷新为本次重试的开始时刻
    pub fn begin_retry(&mut self) {
        let now = Utc::now();
        self.state = SubscriptionState::Processing;
        if let Some(last) = self.retry_logs.last_mut() {
            last.retry_time = now;
        }
        self.last_modification_time = now;
    }

    pub fn mark_success(&mut self) {
        self.state = SubscriptionState::Success;
        self.last_modification_time = Utc::now();
    }

    /// 标记失败：消耗一次重试预算，并追加编号为当前最大值 +1 的重试明细
    pub fn mark_fail(&mut self, message: String) {
        let now = Utc::now();
        self.state = SubscriptionState::Fail;
        self.retry_count += 1;
        self.retry_logs.push(SubscriptionRetryLog {
            number: self.next_retry_number(),
            message,
            retry_time: now,
        });
        self.last_modification_time = now;
    }

    fn next_retry_number(&self) -> u32 {
        self.retry_logs
            .iter()
            .map(SubscriptionRetryLog::number)
            .max()
            .map_or(1, |n| n + 1)
    }

    /// 重发布：清零已消耗的预算，保留历史重试明细
    pub fn reset_retry_budget(&mut self) {
        self.retry_count = 0;
        self.last_modification_time = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_log() -> SubscriptionLog {
        SubscriptionLog::new("consumer-a".to_string(), "/orders".to_string())
    }

    #[test]
    fn test_new_subscription_is_processing() {
        let log = mk_log();
        assert_eq!(log.state(), SubscriptionState::Processing);
        assert_eq!(log.retry_count(), 0);
        assert!(log.retry_logs().is_empty());
    }

    // 每次失败消耗一次预算并追加一条明细，编号严格递增
    #[test]
    fn test_mark_fail_numbering() {
        let mut log = mk_log();

        log.mark_fail("boom-1".to_string());
        log.begin_retry();
        log.mark_fail("boom-2".to_string());
        log.begin_retry();
        log.mark_fail("boom-3".to_string());

        assert_eq!(log.state(), SubscriptionState::Fail);
        assert_eq!(log.retry_count(), 3);

        let numbers: Vec<u32> = log.retry_logs().iter().map(|r| r.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(log.retry_logs()[1].message(), "boom-2");
    }

    // 复活只刷新最近一条明细的时间，不新增明细
    #[test]
    fn test_begin_retry_stamps_latest_entry() {
        let mut log = mk_log();
        log.mark_fail("boom".to_string());
        let stamped_before = log.retry_logs()[0].retry_time();

        log.begin_retry();
        assert_eq!(log.state(), SubscriptionState::Processing);
        assert_eq!(log.retry_logs().len(), 1);
        assert!(log.retry_logs()[0].retry_time() >= stamped_before);
    }

    // 准入矩阵：Processing/Success 永不可重试，Fail 受预算约束
    #[test]
    fn test_can_retry_matrix() {
        let mut log = mk_log();
        assert!(!log.can_retry(3));

        log.mark_success();
        assert!(!log.can_retry(3));

        log.mark_fail("boom".to_string());
        assert!(log.can_retry(3));
        assert!(!log.can_retry(1));

        log.begin_retry();
        log.mark_fail("boom".to_string());
        log.begin_retry();
        log.mark_fail("boom".to_string());
        assert_eq!(log.retry_count(), 3);
        assert!(!log.can_retry(3));
    }

    #[test]
    fn test_reset_retry_budget() {
        let mut log = mk_log();
        log.mark_fail("boom".to_string());
        log.begin_retry();
        log.mark_fail("boom".to_string());
        assert!(!log.can_retry(2));

        log.reset_retry_budget();
        assert_eq!(log.retry_count(), 0);
        assert!(log.can_retry(2));
        // 历史明细保留
        assert_eq!(log.retry_logs().len(), 2);
    }
}
