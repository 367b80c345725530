//! Application services - Leaf utilities consumed by plugins

pub mod error_reporter;
pub mod rate_limiter;

pub use error_reporter::ErrorReporter;
pub use rate_limiter::RateLimiter;
