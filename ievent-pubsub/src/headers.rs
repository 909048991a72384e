//! 入站头部来源（HeaderSource）
//!
//! 抽象入站请求上下文中的头部读取，发布总线只按白名单键导入，
//! 且已配置的值优先于导入值。
//!
use std::collections::BTreeMap;

pub trait HeaderSource: Send + Sync {
    /// 按键读取入站上下文头部
    fn header(&self, key: &str) -> Option<String>;
}

/// 静态头部来源：测试与非请求上下文下的实现
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders(BTreeMap<String, String>);

impl StaticHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl From<BTreeMap<String, String>> for StaticHeaders {
    fn from(headers: BTreeMap<String, String>) -> Self {
        Self(headers)
    }
}

impl HeaderSource for StaticHeaders {
    fn header(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_headers_lookup() {
        let mut headers = StaticHeaders::new();
        headers.insert("authorization", "Bearer t");

        assert_eq!(headers.header("authorization"), Some("Bearer t".to_string()));
        assert_eq!(headers.header("x-correlation-id"), None);
    }
}
