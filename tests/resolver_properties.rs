//! Property tests for the resolver over generated acyclic invoices
//!
//! Groups are `g0..gN`; a parcel only requires groups with a higher index
//! than any group it belongs to, so every generated invoice is acyclic.

use std::collections::BTreeSet;

use parcel_resolver::domain::{
    from_fn, AnyOfReading, Choice, DependencyGraph, Invoice, RawCondition, RawGroup, RawInvoice,
    RawLabel, RawParcel, ResolutionFailure, ResolvePolicy, ResolvedManifest, SatisfiedBy,
};
use proptest::prelude::*;

type GroupSpec = (&'static str, bool);
type ParcelSpec = (Option<BTreeSet<usize>>, BTreeSet<usize>);

fn policy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("allOf"), Just("oneOf"), Just("anyOf")]
}

fn arb_invoice() -> impl Strategy<Value = RawInvoice> {
    (prop::collection::vec((policy(), any::<bool>()), 0..5), 1..8usize)
        .prop_flat_map(|(groups, parcel_count)| {
            let n = groups.len();
            let index = 0..n.max(1);
            let parcel = (
                prop::option::of(prop::collection::btree_set(index.clone(), 0..=n)),
                prop::collection::btree_set(index, 0..=n),
            );
            (Just(groups), prop::collection::vec(parcel, parcel_count))
        })
        .prop_map(|(groups, parcels)| build_raw(&groups, &parcels))
}

fn build_raw(groups: &[GroupSpec], parcels: &[ParcelSpec]) -> RawInvoice {
    let n = groups.len();
    let group = groups
        .iter()
        .enumerate()
        .map(|(i, (policy, required))| RawGroup {
            name: format!("g{}", i),
            required: Some(*required),
            satisfied_by: Some(policy.to_string()),
        })
        .collect();

    let parcel = parcels
        .iter()
        .enumerate()
        .map(|(j, (member_of, requires))| {
            let member_of: Option<Vec<usize>> =
                member_of.as_ref().map(|set| set.iter().copied().filter(|i| *i < n).collect());
            let floor = member_of.as_ref().and_then(|m| m.iter().max().copied());
            let requires: Vec<String> = requires
                .iter()
                .copied()
                .filter(|i| *i < n && floor.map_or(true, |f| *i > f))
                .map(|i| format!("g{}", i))
                .collect();

            RawParcel {
                label: RawLabel {
                    name: format!("p{}", j),
                    sha256: Some(format!("{:04x}", j)),
                    ..RawLabel::default()
                },
                conditions: Some(RawCondition {
                    member_of: member_of.map(|m| m.iter().map(|i| format!("g{}", i)).collect()),
                    requires: Some(requires),
                }),
            }
        })
        .collect();

    let mut raw = RawInvoice {
        bindle_version: "1.0.0".to_string(),
        group: Some(group),
        parcel: Some(parcel),
        ..RawInvoice::default()
    };
    raw.bindle.name = "generated".to_string();
    raw.bindle.version = "1.0.0".to_string();
    raw
}

/// Resolves with every required group opted in and first-candidate choices
fn resolve_all(
    invoice: &Invoice,
    any_of: AnyOfReading,
) -> Result<ResolvedManifest, ResolutionFailure> {
    let graph = DependencyGraph::build(invoice).expect("generated invoices are acyclic");
    let mut chooser = from_fn(|_group, candidates| {
        Choice::Select(candidates[0].name().to_string())
    });
    let policy = invoice
        .groups()
        .iter()
        .step_by(2)
        .fold(ResolvePolicy::new().with_any_of(any_of), |p, g| {
            p.opt_in(g.name.as_str())
        });
    parcel_resolver::domain::resolve(&graph, policy, &mut chooser)
}

proptest! {
    #[test]
    fn resolution_is_deterministic(raw in arb_invoice()) {
        let invoice = Invoice::build(raw).unwrap();

        let first = resolve_all(&invoice, AnyOfReading::default());
        let second = resolve_all(&invoice, AnyOfReading::default());

        prop_assert_eq!(&first, &second);
        if let (Ok(a), Ok(b)) = (&first, &second) {
            prop_assert_eq!(
                serde_json::to_string(a).unwrap(),
                serde_json::to_string(b).unwrap()
            );
        }
    }

    #[test]
    fn global_members_are_always_selected(raw in arb_invoice()) {
        let invoice = Invoice::build(raw).unwrap();

        if let Ok(manifest) = resolve_all(&invoice, AnyOfReading::default()) {
            for parcel in invoice.global_members() {
                prop_assert!(manifest.contains(parcel.name()), "missing {}", parcel.name());
            }
            for parcel in invoice.parcels().iter().filter(|p| p.is_excluded()) {
                prop_assert!(!manifest.contains(parcel.name()), "excluded {} selected", parcel.name());
            }
        }
    }

    #[test]
    fn required_groups_are_satisfied(raw in arb_invoice()) {
        let invoice = Invoice::build(raw).unwrap();

        if let Ok(manifest) = resolve_all(&invoice, AnyOfReading::AtLeastOneWhenRequired) {
            for report in manifest.report.iter().filter(|r| r.required) {
                prop_assert!(report.satisfied);
                let Some(name) = report.group.name() else { continue };

                match report.policy {
                    SatisfiedBy::AllOf => {
                        for member in invoice.group_members(name.as_str()) {
                            prop_assert!(manifest.contains(member.name()));
                        }
                    }
                    SatisfiedBy::OneOf => prop_assert_eq!(report.selected.len(), 1),
                    SatisfiedBy::AnyOf => prop_assert!(!report.selected.is_empty()),
                }
            }
        }
    }

    #[test]
    fn requirements_of_selected_parcels_are_required(raw in arb_invoice()) {
        let invoice = Invoice::build(raw).unwrap();

        if let Ok(manifest) = resolve_all(&invoice, AnyOfReading::default()) {
            for parcel in invoice.parcels().iter().filter(|p| manifest.contains(p.name())) {
                for group in &parcel.condition.requires {
                    let Some(name) = group.name() else { continue };
                    let report = manifest.group(name.as_str()).unwrap();
                    prop_assert!(report.required, "{} requires {}", parcel.name(), name);
                }
            }
        }
    }

    #[test]
    fn optional_any_of_accepts_every_strict_success(raw in arb_invoice()) {
        let invoice = Invoice::build(raw).unwrap();

        if let Ok(strict) = resolve_all(&invoice, AnyOfReading::AtLeastOneWhenRequired) {
            let lenient = resolve_all(&invoice, AnyOfReading::Optional).unwrap();
            prop_assert_eq!(strict.parcel_names(), lenient.parcel_names());
        }
    }
}
