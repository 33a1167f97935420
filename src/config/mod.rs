//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BlackholeConfig (validated, immutable)
//!     → split into per-subsystem sections at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a workflow run never reloads it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BlackholeConfig, FeeConfig, LedgerConfig, LogFormat, ObservabilityConfig, SignerConfig,
    ValidationConfig,
};
