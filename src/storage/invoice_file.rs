//! Invoice and choice files
//!
//! Both are TOML. Decoding errors are reported with the file path; schema
//! violations keep their `SchemaError` so callers can downcast.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::{ChoiceMap, Invoice, RawInvoice};

/// Decodes invoice TOML without validating it
pub fn parse_raw_invoice(content: &str) -> Result<RawInvoice> {
    toml::from_str(content).context("Failed to parse invoice TOML")
}

/// Decodes and validates invoice TOML
pub fn parse_invoice(content: &str) -> Result<Invoice> {
    let raw = parse_raw_invoice(content)?;
    Ok(Invoice::build(raw)?)
}

/// Reads and decodes an invoice file without validating it
pub fn load_raw_invoice(path: &Path) -> Result<RawInvoice> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read invoice: {}", path.display()))?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "read invoice");

    parse_raw_invoice(&content).with_context(|| format!("Invalid invoice: {}", path.display()))
}

/// Reads, decodes and validates an invoice file
pub fn load_invoice(path: &Path) -> Result<Invoice> {
    let raw = load_raw_invoice(path)?;
    Invoice::build(raw).with_context(|| format!("Invalid invoice: {}", path.display()))
}

/// Decodes a choice table: `group = "parcel"` per line
pub fn parse_choices(content: &str) -> Result<ChoiceMap> {
    toml::from_str(content).context("Failed to parse choices TOML")
}

/// Reads a choice file
pub fn load_choices(path: &Path) -> Result<ChoiceMap> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read choices: {}", path.display()))?;

    parse_choices(&content).with_context(|| format!("Invalid choices file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SchemaError;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
bindleVersion = "1.0.0"

[bindle]
name = "mybindle"
version = "0.1.0"

[[parcel]]
[parcel.label]
sha256 = "abcdef0123"
name = "readme.txt"
mediaType = "text/plain"
"#;

    #[test]
    fn parse_minimal_invoice() {
        let invoice = parse_invoice(MINIMAL).unwrap();
        assert_eq!(invoice.name(), "mybindle/0.1.0");
        assert_eq!(invoice.parcels().len(), 1);
    }

    #[test]
    fn parse_rejects_bad_toml() {
        let err = parse_invoice("bindleVersion = ").unwrap_err();
        assert!(err.to_string().contains("Failed to parse invoice TOML"));
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let err = parse_raw_invoice("bindleVersion = \"1.0.0\"\nsurprise = 1\n").unwrap_err();
        assert!(format!("{:#}", err).contains("surprise"));
    }

    #[test]
    fn schema_error_is_downcastable() {
        let err = parse_invoice("bindleVersion = \"1.0.0\"\n[bindle]\nname = \"x\"\n").unwrap_err();
        assert!(err.downcast_ref::<SchemaError>().is_some());
    }

    #[test]
    fn load_invoice_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invoice.toml");
        fs::write(&path, MINIMAL).unwrap();

        let invoice = load_invoice(&path).unwrap();
        assert_eq!(invoice.bindle().name, "mybindle");
    }

    #[test]
    fn load_missing_invoice_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.toml");

        let err = load_invoice(&path).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn load_choices_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("choices.toml");
        fs::write(&path, "cli = \"first\"\n").unwrap();

        let choices = load_choices(&path).unwrap();
        assert_eq!(choices.get("cli"), Some("first"));
    }

    #[test]
    fn choices_must_be_strings() {
        assert!(parse_choices("cli = 3\n").is_err());
    }
}
