//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ResiliencePipeline / CircuitBreaker produce:
//!     → events.rs (ResilienceEvent handed to an EventSink)
//!
//! TracingEventSink (default sink) fans out to:
//!     → tracing (structured log lines, see logging.rs)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The sink is injected into each pipeline, never a process-wide logger
//! - Emitting is synchronous, infallible and must not block the call
//! - Every call runs in a span carrying a call ID so attempts correlate

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{AttemptRecord, EventSink, ResilienceEvent, TracingEventSink};
