//! Resource bounding for tool providers: pagination windows over large result
//! sets and token-bucket rate limiting of tool invocations.

pub mod paginate;
pub mod rate;

pub use paginate::{paginate, validate, PageLimits, Paginated, PaginationInfo};
pub use rate::RateLimiter;
