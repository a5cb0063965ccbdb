pub mod market;
pub mod rate_limiter;
pub mod types;

pub use market::{MarketClient, MarketSource};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use types::*;
