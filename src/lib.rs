//! Resilience pipeline for outbound calls.
//!
//! Wraps fallible async work in a fixed composition of policies:
//!
//! ```text
//! caller
//!   → circuit breaker (per target, shared across calls)
//!     → retry with exponential backoff + jitter
//!       → per-attempt timeout
//!         → action
//! ```
//!
//! Targets are declared in configuration; each one is bound to exactly one
//! [`ResiliencePipeline`] through the [`PipelineRegistry`].

// Core subsystems
pub mod config;
pub mod resilience;

// Callers
pub mod client;
pub mod registry;

// Cross-cutting concerns
pub mod observability;

pub use client::{CallError, ServiceClient};
pub use config::ServicesConfig;
pub use registry::PipelineRegistry;
pub use resilience::{ResilienceError, ResiliencePipeline};
