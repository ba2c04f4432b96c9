use std::time::Duration;

use crate::cache::backend::CacheBackend;
use crate::cache::models::{LimitVerdict, RateCounter};
use crate::clock::Clock;
use crate::error::{CacheError, CacheResult};

const MS_PER_MINUTE: f64 = 60_000.0;
const MAX_CAS_ATTEMPTS: usize = 16;
// Idle time a fully decayed counter is kept before the store may drop it.
const IDLE_GRACE_MS: f64 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterOp {
    /// Decay only, never adds cost.
    Peek,
    /// Decay, then add the cost if it stays under the threshold.
    Charge(f64),
}

/// Counter value after linear decay at `threshold` units per minute.
pub fn decay(counter: &RateCounter, threshold: f64, now_ms: i64) -> f64 {
    // a clock that steps backwards must not refill the counter
    let elapsed_ms = (now_ms - counter.updated_at).max(0) as f64;
    (counter.count - elapsed_ms / MS_PER_MINUTE * threshold).max(0.0)
}

/// Milliseconds until a counter at `decayed` drops below the block line.
pub fn retry_in(decayed: f64, threshold: f64) -> Duration {
    let ms = (decayed - (threshold - 1.0)) / threshold * MS_PER_MINUTE;
    Duration::from_millis(ms.round().max(0.0) as u64)
}

/// Decides a single check. Returns the counter to persist (if any) and the
/// verdict. Rejected cost is never added to the stored count.
pub fn evaluate(
    current: Option<&RateCounter>,
    op: CounterOp,
    threshold: f64,
    now_ms: i64,
) -> (Option<RateCounter>, LimitVerdict) {
    let Some(current) = current else {
        return match op {
            CounterOp::Peek => (None, LimitVerdict::Allowed),
            CounterOp::Charge(cost) => (
                Some(RateCounter {
                    count: cost,
                    updated_at: now_ms,
                }),
                LimitVerdict::Allowed,
            ),
        };
    };

    let decayed = decay(current, threshold, now_ms);
    let blocked = LimitVerdict::Blocked {
        retry_in: retry_in(decayed, threshold),
    };
    let settle = |count| {
        Some(RateCounter {
            count,
            updated_at: now_ms,
        })
    };

    match op {
        CounterOp::Charge(cost) => {
            let candidate = decayed + cost;
            if candidate < threshold {
                (settle(candidate), LimitVerdict::Allowed)
            } else {
                (settle(decayed), blocked)
            }
        }
        CounterOp::Peek => {
            if decayed >= threshold - 1.0 {
                (settle(decayed), blocked)
            } else {
                (settle(decayed), LimitVerdict::Allowed)
            }
        }
    }
}

/// How long the store should keep `counter`: until it has fully decayed,
/// plus a grace minute.
pub fn counter_ttl(counter: &RateCounter, threshold: f64) -> Duration {
    let decay_ms = counter.count.max(0.0) / threshold * MS_PER_MINUTE;
    Duration::from_millis((decay_ms + IDLE_GRACE_MS).ceil() as u64)
}

fn validate(op: CounterOp, threshold: f64) -> CacheResult<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(CacheError::invalid(format!(
            "threshold must be a positive number, got {}",
            threshold
        )));
    }
    if let CounterOp::Charge(cost) = op {
        if !cost.is_finite() || cost < 0.0 {
            return Err(CacheError::invalid(format!(
                "cost must be a non-negative number, got {}",
                cost
            )));
        }
    }
    Ok(())
}

/// 速率限制缓存操作
pub struct RateLimitCacheOperations;

impl RateLimitCacheOperations {
    /// 扣减并检查计数器
    pub async fn charge(
        backend: &dyn CacheBackend,
        clock: &dyn Clock,
        key: &str,
        cost: f64,
        threshold: f64,
    ) -> CacheResult<LimitVerdict> {
        Self::apply(backend, clock, key, CounterOp::Charge(cost), threshold).await
    }

    /// 只衰减不计费的检查
    pub async fn peek(
        backend: &dyn CacheBackend,
        clock: &dyn Clock,
        key: &str,
        threshold: f64,
    ) -> CacheResult<LimitVerdict> {
        Self::apply(backend, clock, key, CounterOp::Peek, threshold).await
    }

    /// Reads the counter and writes the decided state back with
    /// compare-and-set, deciding again whenever another writer got there
    /// first.
    pub async fn apply(
        backend: &dyn CacheBackend,
        clock: &dyn Clock,
        key: &str,
        op: CounterOp,
        threshold: f64,
    ) -> CacheResult<LimitVerdict> {
        validate(op, threshold)?;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let raw = backend.get(key).await?;
            let current: Option<RateCounter> = raw.as_deref().map(serde_json::from_str).transpose()?;

            let (next, verdict) = evaluate(current.as_ref(), op, threshold, clock.now_ms());
            let Some(next) = next else {
                return Ok(verdict);
            };

            let json = serde_json::to_string(&next)?;
            let ttl = counter_ttl(&next, threshold);
            if backend.compare_and_set(key, raw.as_deref(), json, Some(ttl)).await? {
                if verdict.is_blocked() {
                    tracing::debug!("Limiter blocked {} at {:.2}", key, next.count);
                }
                return Ok(verdict);
            }
            tracing::debug!("Counter {} changed underneath us (attempt {})", key, attempt);
        }

        Err(CacheError::Contention {
            key: key.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    pub async fn get_counter(backend: &dyn CacheBackend, key: &str) -> CacheResult<Option<RateCounter>> {
        match backend.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
