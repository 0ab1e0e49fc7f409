//! Dependency graph for groups and parcels
//!
//! Derives two relations from an [`Invoice`]: which parcels each group holds
//! (membership) and which groups each parcel forces (requirement). Both are
//! kept as typed edges in a petgraph `DiGraph` for traversal, and as
//! index-addressed sets for the resolver's lookups.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

use super::cycle;
use super::id::{GroupId, GroupRef, ParcelId};
use super::invoice::{Invoice, Parcel, SatisfiedBy};
use super::label::Label;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Parcel '{parcel}' references undeclared group '{group}'")]
    UnknownGroupReference { group: String, parcel: String },

    #[error("Dependency cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },
}

/// A node of the combined group/parcel graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Group(GroupId),
    Parcel(ParcelId),
}

/// Edge kind: group -> parcel is membership, parcel -> group is requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Membership,
    Requirement,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Membership => f.write_str("contains"),
            Edge::Requirement => f.write_str("requires"),
        }
    }
}

/// Static group/parcel relations of one invoice
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    invoice: &'a Invoice,

    /// The underlying directed graph
    graph: DiGraph<Node, Edge>,

    /// Node index per group, by `GroupId`
    group_nodes: Vec<NodeIndex>,

    /// Node index per parcel, by `ParcelId`
    parcel_nodes: Vec<NodeIndex>,

    group_index: HashMap<&'a str, GroupId>,
    parcel_index: HashMap<&'a str, ParcelId>,

    members: Vec<BTreeSet<ParcelId>>,
    member_of: Vec<BTreeSet<GroupId>>,
    requires: Vec<BTreeSet<GroupId>>,
    required_by: Vec<BTreeSet<ParcelId>>,
    root_required: BTreeSet<GroupId>,
}

impl<'a> DependencyGraph<'a> {
    /// Derives the graph and verifies it is acyclic
    pub fn build(invoice: &'a Invoice) -> Result<Self, GraphError> {
        let graph = Self::build_unchecked(invoice)?;
        cycle::check(&graph)?;

        tracing::debug!(
            invoice = %invoice.name(),
            groups = graph.group_count(),
            parcels = graph.parcel_count(),
            edges = graph.graph.edge_count(),
            "built dependency graph"
        );
        Ok(graph)
    }

    /// Derives the graph without running cycle detection
    pub(crate) fn build_unchecked(invoice: &'a Invoice) -> Result<Self, GraphError> {
        let group_count = invoice.groups().len() + 1;
        let parcel_count = invoice.parcels().len();

        let mut graph = DiGraph::with_capacity(group_count + parcel_count, parcel_count * 2);

        // First pass: add all nodes, groups before parcels, in declaration order
        let group_nodes: Vec<_> = (0..group_count)
            .map(|i| graph.add_node(Node::Group(GroupId(i))))
            .collect();
        let parcel_nodes: Vec<_> = (0..parcel_count)
            .map(|i| graph.add_node(Node::Parcel(ParcelId(i))))
            .collect();

        let group_index: HashMap<&str, GroupId> = invoice
            .groups()
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.as_str(), GroupId(i + 1)))
            .collect();
        let parcel_index: HashMap<&str, ParcelId> = invoice
            .parcels()
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name(), ParcelId(i)))
            .collect();

        let mut members = vec![BTreeSet::new(); group_count];
        let mut member_of = vec![BTreeSet::new(); parcel_count];
        let mut requires = vec![BTreeSet::new(); parcel_count];
        let mut required_by = vec![BTreeSet::new(); group_count];

        let resolve = |group: &GroupRef, parcel: &Parcel| -> Result<GroupId, GraphError> {
            match group {
                GroupRef::Global => Ok(GroupId::GLOBAL),
                GroupRef::Named(name) => group_index.get(name.as_str()).copied().ok_or_else(|| {
                    GraphError::UnknownGroupReference {
                        group: name.to_string(),
                        parcel: parcel.name().to_string(),
                    }
                }),
            }
        };

        // Second pass: membership and requirement edges
        for (i, parcel) in invoice.parcels().iter().enumerate() {
            let pid = ParcelId(i);

            let groups: Vec<GroupId> = match &parcel.condition.member_of {
                None => vec![GroupId::GLOBAL],
                Some(names) => names
                    .iter()
                    .map(|name| resolve(&GroupRef::Named(name.clone()), parcel))
                    .collect::<Result<_, _>>()?,
            };
            for gid in groups {
                if members[gid.0].insert(pid) {
                    member_of[i].insert(gid);
                    graph.add_edge(group_nodes[gid.0], parcel_nodes[i], Edge::Membership);
                }
            }

            for group in &parcel.condition.requires {
                let gid = resolve(group, parcel)?;
                // The global group is required unconditionally
                if gid.is_global() {
                    continue;
                }
                if requires[i].insert(gid) {
                    required_by[gid.0].insert(pid);
                    graph.add_edge(parcel_nodes[i], group_nodes[gid.0], Edge::Requirement);
                }
            }
        }

        let mut root_required = BTreeSet::from([GroupId::GLOBAL]);
        root_required.extend(
            invoice
                .groups()
                .iter()
                .enumerate()
                .filter(|(_, g)| g.required)
                .map(|(i, _)| GroupId(i + 1)),
        );

        Ok(Self {
            invoice,
            graph,
            group_nodes,
            parcel_nodes,
            group_index,
            parcel_index,
            members,
            member_of,
            requires,
            required_by,
            root_required,
        })
    }

    /// The invoice this graph was derived from
    pub fn invoice(&self) -> &'a Invoice {
        self.invoice
    }

    /// Number of groups, including the global group
    pub fn group_count(&self) -> usize {
        self.group_nodes.len()
    }

    pub fn parcel_count(&self) -> usize {
        self.parcel_nodes.len()
    }

    /// All groups in declaration order, global first
    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> {
        (0..self.group_count()).map(GroupId)
    }

    /// All parcels in declaration order
    pub fn parcel_ids(&self) -> impl Iterator<Item = ParcelId> {
        (0..self.parcel_count()).map(ParcelId)
    }

    /// Looks up a declared group by name
    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.group_index.get(name).copied()
    }

    /// Looks up a parcel by label name
    pub fn parcel_id(&self, name: &str) -> Option<ParcelId> {
        self.parcel_index.get(name).copied()
    }

    pub fn group_ref(&self, group: GroupId) -> GroupRef {
        match group.0 {
            0 => GroupRef::Global,
            i => GroupRef::Named(self.invoice.groups()[i - 1].name.clone()),
        }
    }

    /// Satisfaction policy; the global group is always `AllOf`
    pub fn policy(&self, group: GroupId) -> SatisfiedBy {
        match group.0 {
            0 => SatisfiedBy::AllOf,
            i => self.invoice.groups()[i - 1].satisfied_by,
        }
    }

    pub fn parcel(&self, parcel: ParcelId) -> &'a Parcel {
        &self.invoice.parcels()[parcel.0]
    }

    pub fn label(&self, parcel: ParcelId) -> &'a Label {
        &self.parcel(parcel).label
    }

    /// Parcels in a group
    pub fn members(&self, group: GroupId) -> &BTreeSet<ParcelId> {
        &self.members[group.0]
    }

    /// Groups a parcel belongs to
    pub fn groups_of(&self, parcel: ParcelId) -> &BTreeSet<GroupId> {
        &self.member_of[parcel.0]
    }

    /// Groups that become required once the parcel is selected
    pub fn requires_groups(&self, parcel: ParcelId) -> &BTreeSet<GroupId> {
        &self.requires[parcel.0]
    }

    /// Parcels whose selection forces the group into the required state
    pub fn required_by(&self, group: GroupId) -> &BTreeSet<ParcelId> {
        &self.required_by[group.0]
    }

    /// Groups required regardless of selection: global plus `required = true`
    pub fn root_required(&self) -> &BTreeSet<GroupId> {
        &self.root_required
    }

    /// Returns true if the group is declared `required = true` or is global
    pub fn is_root_required(&self, group: GroupId) -> bool {
        self.root_required.contains(&group)
    }

    /// Human-readable name of a node
    pub fn node_name(&self, node: Node) -> String {
        match node {
            Node::Group(g) => self.group_ref(g).to_string(),
            Node::Parcel(p) => self.parcel(p).name().to_string(),
        }
    }

    /// Every edge as `(from, kind, to)` names, in declaration order
    pub fn edges(&self) -> Vec<(String, Edge, String)> {
        let mut edges = Vec::new();
        for group in self.group_ids() {
            for parcel in self.members(group) {
                edges.push((
                    self.node_name(Node::Group(group)),
                    Edge::Membership,
                    self.node_name(Node::Parcel(*parcel)),
                ));
            }
        }
        for parcel in self.parcel_ids() {
            for group in self.requires_groups(parcel) {
                edges.push((
                    self.node_name(Node::Parcel(parcel)),
                    Edge::Requirement,
                    self.node_name(Node::Group(*group)),
                ));
            }
        }
        edges
    }

    pub(crate) fn petgraph(&self) -> &DiGraph<Node, Edge> {
        &self.graph
    }

    /// Outgoing neighbours of a node, sorted into declaration order
    pub(crate) fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut next: Vec<_> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        next.sort();
        next
    }
}
