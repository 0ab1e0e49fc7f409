//! `parcel check`

use std::path::Path;

use anyhow::{bail, Result};

use super::output::Output;
use crate::domain::{DependencyGraph, Invoice, ValidationMode};
use crate::storage;

/// Validates an invoice, reporting every schema violation at once
pub fn run(output: &Output, path: &Path) -> Result<()> {
    let raw = storage::load_raw_invoice(path)?;
    output.verbose_ctx("check", &format!("Decoded {}", path.display()));

    let invoice = match Invoice::build_with(&raw, ValidationMode::CollectAll) {
        Ok(invoice) => invoice,
        Err(errors) => {
            if !output.is_json() {
                eprintln!("Invalid invoice: {}", path.display());
            }
            output.errors(&errors);
            bail!("{} schema error(s) in {}", errors.len(), path.display());
        }
    };

    let graph = match DependencyGraph::build(&invoice) {
        Ok(graph) => graph,
        Err(e) => {
            output.errors(&[&e]);
            bail!("Invalid group graph in {}", path.display());
        }
    };

    if output.is_json() {
        output.data(&serde_json::json!({
            "success": true,
            "invoice": invoice.name(),
            "canonical_name": invoice.canonical_name(),
            "groups": invoice.groups().len(),
            "parcels": invoice.parcels().len(),
            "yanked": invoice.is_yanked(),
        }));
    } else {
        output.success(&format!(
            "OK: {} ({} groups, {} parcels)",
            invoice.name(),
            invoice.groups().len(),
            graph.parcel_count(),
        ));
        if invoice.is_yanked() {
            println!("Warning: this invoice is yanked");
        }
    }

    Ok(())
}
