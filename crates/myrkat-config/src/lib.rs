//! # Myrkat Configuration Library
//!
//! Type-safe configuration for the Myrkat document store and its shell.
//!
//! ## Features
//!
//! - TOML configuration files with per-section defaults
//! - Environment overrides (`MYRKAT_DATA_DIR`, `MYRKAT_LOG_LEVEL`)
//! - Validation before the store is opened
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use myrkat_config::ConfigLoader;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load_from_file("config.toml")?;
//!     println!("data lives in {}", config.storage.data_dir.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod loader;

pub use config::*;
pub use loader::*;
