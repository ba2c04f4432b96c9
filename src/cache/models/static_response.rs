use serde::{Deserialize, Serialize};

/// A response body captured for replay.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StaticResponse {
    pub content_type: String,
    pub body: String,
    pub status_code: u16,
}

/// 静态响应缓存数据模型
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StaticResponseEntry {
    pub content_type: String,
    pub body: String,
    pub status_code: u16,
    pub captured_at: i64, // unix millis
}

impl StaticResponseEntry {
    pub fn capture(response: StaticResponse, now_ms: i64) -> Self {
        Self {
            content_type: response.content_type,
            body: response.body,
            status_code: response.status_code,
            captured_at: now_ms,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.captured_at
    }
}
