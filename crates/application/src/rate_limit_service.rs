//! Rate limiting ports and application service.
//!
//! Role changes are throttled per actor over a sliding window: a call is
//! allowed while fewer than `max_attempts` allowed calls happened in the
//! trailing `window_seconds`.

mod config;
mod ports;
mod service;


pub use config::RateLimitRule;
pub use ports::{AttemptInfo, RateLimitRepository};
pub use service::RateLimitService;
