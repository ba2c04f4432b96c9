// 缓存模块
// 包含缓存后端、数据结构和操作逻辑

pub mod backend;
pub mod facade;
pub mod keys;
pub mod models;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
pub use backend::{CacheBackend, LocalBackend, RedisBackend};
pub use facade::{Cache, CacheSettings};
pub use models::{LimitVerdict, RateCounter, SessionRecord, StaticResponse, StaticResponseEntry};
