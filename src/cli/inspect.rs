//! Read-only views of an invoice (groups, graph)

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::output::Output;
use crate::domain::{DependencyGraph, Edge, SatisfiedBy};
use crate::storage;

#[derive(Serialize)]
struct GroupRow {
    name: String,
    global: bool,
    policy: SatisfiedBy,
    required: bool,
    members: Vec<String>,
    required_by: Vec<String>,
}

#[derive(Serialize)]
struct EdgeRow {
    from: String,
    kind: Edge,
    to: String,
}

/// List groups with policy, required flag and members
pub fn groups(output: &Output, path: &Path) -> Result<()> {
    let invoice = storage::load_invoice(path)?;
    let graph = DependencyGraph::build(&invoice)
        .with_context(|| format!("Invalid group graph in {}", path.display()))?;

    let rows: Vec<GroupRow> = graph
        .group_ids()
        .map(|group| GroupRow {
            name: graph.group_ref(group).to_string(),
            global: group.is_global(),
            policy: graph.policy(group),
            required: graph.is_root_required(group),
            members: graph
                .members(group)
                .iter()
                .map(|p| graph.parcel(*p).name().to_string())
                .collect(),
            required_by: graph
                .required_by(group)
                .iter()
                .map(|p| graph.parcel(*p).name().to_string())
                .collect(),
        })
        .collect();

    output.verbose_ctx("groups", &format!("{} groups including global", rows.len()));

    if output.is_json() {
        output.data(&rows);
        return Ok(());
    }

    println!("Groups in {} ({}):", invoice.name(), rows.len());
    println!("{:<20} {:<8} {:<9} MEMBERS", "NAME", "POLICY", "REQUIRED");
    println!("{}", "-".repeat(60));
    for row in rows {
        println!(
            "{:<20} {:<8} {:<9} {}",
            row.name,
            row.policy.as_str(),
            if row.required { "yes" } else { "no" },
            row.members.join(", ")
        );
        if !row.required_by.is_empty() {
            println!("{:<20} required by: {}", "", row.required_by.join(", "));
        }
    }

    Ok(())
}

/// List membership and requirement edges
pub fn graph(output: &Output, path: &Path) -> Result<()> {
    let invoice = storage::load_invoice(path)?;
    let graph = DependencyGraph::build(&invoice)
        .with_context(|| format!("Invalid group graph in {}", path.display()))?;

    let edges: Vec<EdgeRow> = graph
        .edges()
        .into_iter()
        .map(|(from, kind, to)| EdgeRow { from, kind, to })
        .collect();

    output.verbose_ctx("graph", &format!("{} edges", edges.len()));

    if output.is_json() {
        output.data(&edges);
    } else if edges.is_empty() {
        println!("No edges.");
    } else {
        for edge in edges {
            output.row(&[&edge.from, &edge.kind.to_string(), &edge.to]);
        }
    }

    Ok(())
}
