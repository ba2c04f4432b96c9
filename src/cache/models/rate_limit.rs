use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 速率限制缓存数据模型
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct RateCounter {
    pub count: f64,
    pub updated_at: i64, // unix millis
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitVerdict {
    Allowed,
    Blocked { retry_in: Duration },
}

impl LimitVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, LimitVerdict::Blocked { .. })
    }

    pub fn retry_in(&self) -> Option<Duration> {
        match self {
            LimitVerdict::Allowed => None,
            LimitVerdict::Blocked { retry_in } => Some(*retry_in),
        }
    }
}
