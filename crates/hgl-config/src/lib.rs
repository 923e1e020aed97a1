//! Configuration and file handling for the HGL compiler
//!
//! This crate provides:
//!
//! - [`CompilerConfig`] - compiler settings with defaults, optionally
//!   loaded from a YAML file
//! - source loading and output writing with errors that carry the
//!   offending path
//! - output path derivation and the guard that rejects inputs which
//!   already look like emitted output
//!
//! # Example
//!
//! ```ignore
//! use hgl_config::{load_source, output_path_for, CompilerConfig};
//!
//! let config = CompilerConfig::load("hgl.yaml")?;
//! let source = load_source("home.hgl")?;
//! let out = output_path_for("home.hgl".as_ref())?;
//! ```

mod config;
mod error;
mod loader;

pub use config::CompilerConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::{check_input_extension, load_source, output_path_for, write_output, OUTPUT_EXTENSION};
