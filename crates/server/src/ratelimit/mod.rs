//! Fixed-window admission rate limiting backed by the state store.

mod limiter;

pub use limiter::{RateLimitExceeded, RateLimitResult, RateLimiter, ANONYMOUS_BUCKET};
