//! `parcel resolve`

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use super::output::Output;
use crate::domain::{AnyOfReading, ChoiceMap, RequiredReason, ResolvedManifest};
use crate::storage::{self, Config};
use crate::{resolve_invoice, Error, ResolveOptions};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Path to the invoice TOML
    pub invoice: PathBuf,

    /// Opt into a group (repeatable)
    #[arg(long = "with", value_name = "GROUP")]
    pub with: Vec<String>,

    /// Pick a parcel for a oneOf group (repeatable)
    #[arg(long = "choose", value_name = "GROUP=PARCEL", value_parser = parse_choice)]
    pub choose: Vec<(String, String)>,

    /// TOML file of recorded choices (`group = "parcel"`)
    #[arg(long, value_name = "FILE")]
    pub choices: Option<PathBuf>,

    /// How required anyOf groups are judged: at-least-one or optional
    #[arg(long, value_name = "READING")]
    pub any_of: Option<AnyOfReading>,

    /// Resolve even if the invoice is yanked
    #[arg(long)]
    pub allow_yanked: bool,
}

fn parse_choice(s: &str) -> Result<(String, String), String> {
    let (group, parcel) = s
        .split_once('=')
        .ok_or_else(|| format!("expected GROUP=PARCEL, got '{}'", s))?;
    let (group, parcel) = (group.trim(), parcel.trim());
    if group.is_empty() || parcel.is_empty() {
        return Err(format!("expected GROUP=PARCEL, got '{}'", s));
    }
    Ok((group.to_string(), parcel.to_string()))
}

/// Resolve an invoice and print the manifest or every error
pub fn run(output: &Output, config: &Config, args: ResolveArgs) -> Result<()> {
    let invoice = storage::load_invoice(&args.invoice)?;

    let mut policy = config.resolve().policy();
    if let Some(reading) = args.any_of {
        policy = policy.with_any_of(reading);
    }
    for group in args.with {
        policy = policy.opt_in(group);
    }

    let mut choices = match &args.choices {
        Some(path) => storage::load_choices(path)?,
        None => ChoiceMap::new(),
    };
    choices.extend(args.choose.into_iter().collect());

    let options = ResolveOptions {
        allow_yanked: args.allow_yanked || config.resolve().allow_yanked,
    };

    output.verbose_ctx(
        "resolve",
        &format!(
            "Resolving {} with opt-ins {:?}, {} choice(s), anyOf={}",
            invoice.name(),
            policy.opted_in,
            choices.len(),
            policy.any_of
        ),
    );

    match resolve_invoice(&invoice, policy, &mut choices, options) {
        Ok(manifest) => {
            print_manifest(output, &manifest);
            Ok(())
        }
        Err(Error::Resolution(failure)) => {
            if output.is_json() {
                output.data(&serde_json::json!({
                    "success": false,
                    "invoice": invoice.name(),
                    "errors": failure.errors,
                }));
            } else {
                eprintln!("Could not resolve {}:", invoice.name());
                output.errors(&failure.errors);
            }
            bail!("Resolution failed with {} error(s)", failure.errors.len())
        }
        Err(e @ Error::Yanked(_)) => bail!("{} (pass --allow-yanked to resolve it anyway)", e),
        Err(e) => Err(e.into()),
    }
}

fn print_manifest(output: &Output, manifest: &ResolvedManifest) {
    if output.is_json() {
        output.data(manifest);
        return;
    }

    println!(
        "Resolved {}: {} parcel(s)",
        manifest.invoice,
        manifest.parcels.len()
    );
    for label in &manifest.parcels {
        let (algorithm, digest) = label.primary_hash();
        println!(
            "  {:<24} {}:{}  {}",
            label.name(),
            algorithm.as_str(),
            digest,
            label.media_type()
        );
    }

    output.blank();
    println!("Groups:");
    for report in &manifest.report {
        let selected = if report.selected.is_empty() {
            "-".to_string()
        } else {
            report.selected.join(", ")
        };
        println!(
            "  {:<20} {:<6} {:<28} {}",
            report.group.to_string(),
            report.policy.as_str(),
            reason_text(&report.reason),
            selected
        );
    }
}

fn reason_text(reason: &RequiredReason) -> String {
    match reason {
        RequiredReason::Global => "required (global)".to_string(),
        RequiredReason::Declared => "required (declared)".to_string(),
        RequiredReason::OptedIn => "required (opted in)".to_string(),
        RequiredReason::RequiredBy(parcels) => format!("required by {}", parcels.join(", ")),
        RequiredReason::NotRequired => "optional".to_string(),
    }
}
