//! Rate limiting logic and state management.

mod clock;
mod limiter;
mod policy;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use limiter::{RateLimitConfig, RateLimitStatus, RateLimiter, DEFAULT_KEY, MAX_WINDOW};
pub use policy::{RateLimitPolicies, RateLimitRule};
