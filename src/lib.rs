//! Parcel resolver - picks the parcels to install from a bindle invoice
//!
//! An invoice declares groups of parcels, each with a `satisfiedBy` policy
//! (`allOf`, `oneOf`, `anyOf`), and parcels that may require further groups.
//! Resolution turns the invoice, the groups a caller opts into and the
//! caller's `oneOf` choices into a deterministic [`ResolvedManifest`].
//!
//! ```no_run
//! use parcel_resolver::{resolve_invoice, ChoiceMap, ResolveOptions, ResolvePolicy};
//!
//! # fn main() -> anyhow::Result<()> {
//! let invoice = parcel_resolver::storage::load_invoice("invoice.toml".as_ref())?;
//! let mut choices = ChoiceMap::new().with("cli", "first");
//! let manifest = resolve_invoice(
//!     &invoice,
//!     ResolvePolicy::new().opt_in("server"),
//!     &mut choices,
//!     ResolveOptions::default(),
//! )?;
//! println!("{:?}", manifest.parcel_names());
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod storage;
pub mod cli;

use thiserror::Error;

pub use domain::{
    AnyOfReading, ChoiceMap, Chooser, DependencyGraph, GraphError, Invoice, ResolutionFailure,
    ResolvePolicy, ResolvedManifest, SchemaError,
};

/// Any failure between a raw invoice and a manifest
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    #[error("Invoice '{0}' is yanked")]
    Yanked(String),
}

/// Preconditions checked before resolving
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Resolve even if the invoice is marked yanked
    pub allow_yanked: bool,
}

/// Builds the dependency graph for a validated invoice and resolves it
///
/// Yanked invoices are refused unless [`ResolveOptions::allow_yanked`] is set.
pub fn resolve_invoice<C: Chooser + ?Sized>(
    invoice: &Invoice,
    policy: ResolvePolicy,
    chooser: &mut C,
    options: ResolveOptions,
) -> Result<ResolvedManifest, Error> {
    if invoice.is_yanked() {
        if !options.allow_yanked {
            return Err(Error::Yanked(invoice.name()));
        }
        tracing::warn!(invoice = %invoice.name(), "resolving a yanked invoice");
    }

    let graph = DependencyGraph::build(invoice)?;
    Ok(domain::resolve(&graph, policy, chooser)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{RawInvoice, SkipAll};

    const YANKED: &str = r#"
bindleVersion = "1.0.0"
yanked = true

[bindle]
name = "old"
version = "0.9.0"

[[parcel]]
[parcel.label]
sha256 = "aa"
name = "payload"
"#;

    fn invoice(toml: &str) -> Invoice {
        let raw: RawInvoice = toml::from_str(toml).unwrap();
        Invoice::build(raw).unwrap()
    }

    #[test]
    fn yanked_invoice_refused() {
        let invoice = invoice(YANKED);
        let err = resolve_invoice(&invoice, ResolvePolicy::new(), &mut SkipAll, ResolveOptions::default())
            .unwrap_err();
        assert_eq!(err, Error::Yanked("old/0.9.0".to_string()));
        assert_eq!(err.to_string(), "Invoice 'old/0.9.0' is yanked");
    }

    #[test]
    fn yanked_invoice_allowed_on_request() {
        let invoice = invoice(YANKED);
        let manifest = resolve_invoice(
            &invoice,
            ResolvePolicy::new(),
            &mut SkipAll,
            ResolveOptions { allow_yanked: true },
        )
        .unwrap();
        assert_eq!(manifest.parcel_names(), vec!["payload"]);
    }

    #[test]
    fn graph_errors_pass_through() {
        let invoice = invoice(
            r#"
bindleVersion = "1.0.0"
[bindle]
name = "loop"
version = "1.0.0"

[[group]]
name = "A"

[[parcel]]
[parcel.label]
sha256 = "aa"
name = "p"
[parcel.conditions]
memberOf = ["A"]
requires = ["A"]
"#,
        );
        let err = resolve_invoice(&invoice, ResolvePolicy::new(), &mut SkipAll, ResolveOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::CycleDetected { .. })));
    }

    #[test]
    fn resolution_errors_pass_through() {
        let invoice = invoice(YANKED);
        let err = resolve_invoice(
            &invoice,
            ResolvePolicy::new().opt_in("ghost"),
            &mut SkipAll,
            ResolveOptions { allow_yanked: true },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }
}
