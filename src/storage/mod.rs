//! # Storage Layer
//!
//! File access for the resolver: invoices, recorded choices and
//! configuration, all TOML.
//!
//! | Data | Location |
//! |------|----------|
//! | Invoice | any path given on the command line |
//! | Choices | `--choices <file>`, a table of `group = "parcel"` |
//! | Project config | `.parcel/config.toml`, found by walking up |
//! | Global config | platform config dir, `config.toml` |

mod config;
mod invoice_file;

pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig, ResolveConfig};
pub use invoice_file::{load_choices, load_invoice, load_raw_invoice, parse_choices, parse_invoice, parse_raw_invoice};
