//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `check` | Validate an invoice and its group graph |
//! | `groups` | List groups, policies and members |
//! | `graph` | List membership and requirement edges |
//! | `resolve` | Compute the parcels to install |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output, including the resolver's
//! per-iteration trace:
//! ```bash
//! parcel --verbose resolve invoice.toml --with server
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod check;
mod inspect;
mod resolve;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
pub use resolve::ResolveArgs;
