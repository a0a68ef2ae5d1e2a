//! The orchestration core: pipeline controller, result cache, rate limiter,
//! and metrics.
//!
//! Shared mutable state (cache, limiter window, metrics) is guarded by
//! internal mutexes so multiple queries may be in flight concurrently under
//! one orchestrator instance. Partial pipeline results are never committed
//! to the cache or history until the full pipeline, including any mitigation
//! loop, has completed.

mod cache;
mod limiter;
mod metrics;
mod orchestrator;

pub use cache::ResultCache;
pub use limiter::RateLimiter;
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use orchestrator::Orchestrator;
