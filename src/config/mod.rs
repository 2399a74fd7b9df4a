//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServicesConfig (validated, immutable)
//!     → TargetConfig::policy() per target
//!     → one ResiliencePipeline per target
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - Optional knobs have defaults, connection fields are required
//! - Validation separates syntactic (serde) from semantic checks
//! - Any loading or validation failure is fatal at startup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::ObservabilityConfig;
pub use schema::ServicesConfig;
pub use schema::TargetConfig;
pub use validation::ValidationError;
