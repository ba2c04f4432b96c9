/// 缓存操作
/// 提供缓存操作的功能实现
pub mod rate_limit;
pub mod session;
pub mod static_response;

// 重新导出常用操作
pub use rate_limit::RateLimitCacheOperations;
pub use session::SessionCacheOperations;
pub use static_response::StaticResponseCacheOperations;
