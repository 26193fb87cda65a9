//! Configuration management for shopvault.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! shopvault uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SHOPVAULT_<SECTION>_<KEY>` overrides
//! - Default values for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use shopvault::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("shopvault.toml")?;
//!
//! println!("Store: {}", config.store.data_dir);
//! println!("Max batch size: {}", config.batching.max_batch_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run mode
//! - [`StoreConfig`] - Location of the shop database
//! - [`ExportConfig`] - Output directory, default data type, cooperative pause
//! - [`ImportConfig`] - Checksum verification on import
//! - [`BatchingConfig`] - Adaptive batch sizing bounds and memory heuristic
//! - [`RecoveryConfig`] - Retry budget, backoff, checkpoint ring size
//! - [`SanitizerConfig`] - Numeric coercion policy
//! - [`VerificationConfig`] - Checksum algorithm
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [store]
//! data_dir = "${SHOP_DATA_DIR}"
//!
//! [export]
//! output_dir = "./exports"
//! default_data_type = "complete"
//!
//! [recovery]
//! max_retries = 3
//! retry_delay_ms = 1000
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApplicationConfig, BatchingConfig, ExportConfig, ImportConfig, LoggingConfig, RecoveryConfig,
    SanitizerConfig, StoreConfig, VaultConfig, VerificationConfig,
};
