/// 缓存数据模型
/// 定义缓存数据的结构体
pub mod rate_limit;
pub mod session;
pub mod static_response;

// 重新导出常用类型
pub use rate_limit::{LimitVerdict, RateCounter};
pub use session::SessionRecord;
pub use static_response::{StaticResponse, StaticResponseEntry};
