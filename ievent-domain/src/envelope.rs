//! 出站信封（EventEnvelope）
//!
//! 云事件形态的线上格式：`{id, data, headers, datacontenttype}`。
//! `headers` 承载传输层不透传的应用级头部（鉴权、链路标识等）；
//! 信封整体可与 `serde_json::Value` 互转，日志中存储的原始信封
//! 在重发布时按原样还原。
//!
use crate::error::EventResult;
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// 默认负载内容类型
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// 事件唯一标识（与日志记录主键一致）
    id: Uuid,
    /// 事件负载
    data: Value,
    /// 应用级头部（可选；缺省时不出现在线上格式中）
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<BTreeMap<String, String>>,
    /// 负载内容类型
    #[serde(default = "default_content_type")]
    #[builder(default = DEFAULT_CONTENT_TYPE.to_string())]
    datacontenttype: String,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl EventEnvelope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn headers(&self) -> Option<&BTreeMap<String, String>> {
        self.headers.as_ref()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.get(key))
            .map(String::as_str)
    }

    pub fn datacontenttype(&self) -> &str {
        &self.datacontenttype
    }

    /// 序列化为持久化值（日志中的 `value` 字段）
    pub fn to_value(&self) -> EventResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// 从持久化值还原信封（重发布路径）
    pub fn from_value(value: &Value) -> EventResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}
