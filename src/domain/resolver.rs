//! Parcel resolution
//!
//! Computes which parcels to install from a [`DependencyGraph`], the caller's
//! opted-in groups and a [`Chooser`] for `oneOf` alternatives.
//!
//! ## Algorithm
//!
//! Starting from the root-required groups (global, `required = true`, opted
//! in) and an empty selection, iterate until nothing changes:
//!
//! 1. Every required `allOf` group pulls in all of its members.
//! 2. Once step 1 is quiet, every required `oneOf` group without a selected
//!    member is decided: a single viable candidate is taken automatically,
//!    otherwise the chooser is asked once.
//! 3. `anyOf` groups never pull anything in; they are only checked at the end.
//! 4. Newly selected parcels add the groups they require.
//!
//! A graph containing a cycle is refused before the first iteration. The loop
//! is bounded by `groups + parcels + 1` iterations. Afterwards every required
//! group is evaluated; a skipped or unviable `oneOf` decision is forgiven when
//! a later pick satisfies that group anyway. Errors are collected over the whole run and returned
//! together; a manifest is only produced when there are none.

use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

use super::choice::{Candidate, Choice, Chooser};
use super::cycle;
use super::graph::DependencyGraph;
use super::id::{GroupId, GroupRef, ParcelId};
use super::invoice::SatisfiedBy;
use super::label::Label;
use super::satisfaction::{AnyOfReading, Satisfaction, SatisfactionEvaluator};

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionError {
    #[error("Group '{group}' cannot be satisfied")]
    UnsatisfiableGroup { group: String },

    #[error("Group '{group}' accepts one parcel but {} are selected: {}", .selected.len(), .selected.join(", "))]
    OverSatisfied { group: String, selected: Vec<String> },

    #[error("Group '{group}' needs a choice between: {}", .candidates.join(", "))]
    AmbiguousSelection {
        group: String,
        candidates: Vec<String>,
    },

    #[error("'{parcel}' is not a viable choice for group '{group}'")]
    InvalidChoice { group: String, parcel: String },

    #[error("Unknown group '{group}'")]
    UnknownGroupReference { group: String },

    #[error("Dependency cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },
}

/// Every error collected during one resolution run
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("Resolution failed: {}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct ResolutionFailure {
    pub errors: Vec<ResolutionError>,
}

/// Caller-supplied resolution settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvePolicy {
    /// Groups to require beyond the root-required set
    pub opted_in: BTreeSet<String>,

    /// How required `anyOf` groups are judged
    pub any_of: AnyOfReading,
}

impl ResolvePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opt_in(mut self, group: impl Into<String>) -> Self {
        self.opted_in.insert(group.into());
        self
    }

    pub fn with_any_of(mut self, reading: AnyOfReading) -> Self {
        self.any_of = reading;
        self
    }
}

/// Why a group ended up required (or not)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "parcels", rename_all = "kebab-case")]
pub enum RequiredReason {
    /// The implicit global group
    Global,
    /// Declared `required = true`
    Declared,
    /// Named by the caller
    OptedIn,
    /// Forced by these selected parcels
    RequiredBy(Vec<String>),
    NotRequired,
}

/// Final status of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub group: GroupRef,
    pub policy: SatisfiedBy,
    pub required: bool,
    pub reason: RequiredReason,
    /// Whether the selection satisfies the group's policy
    ///
    /// Only binding when `required` is true. A group nobody requires is
    /// judged by its policy alone, so an untouched `allOf` or `oneOf` group
    /// reports `false` while an `anyOf` group reports `true`.
    pub satisfied: bool,
    pub selected: Vec<String>,
}

/// Successful resolution result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedManifest {
    /// `name/version` of the resolved invoice
    pub invoice: String,

    /// Selected parcels, in invoice declaration order
    pub parcels: Vec<Label>,

    /// One entry per group, global first, then declaration order
    pub report: Vec<GroupReport>,
}

impl ResolvedManifest {
    pub fn parcel_names(&self) -> Vec<&str> {
        self.parcels.iter().map(Label::name).collect()
    }

    pub fn contains(&self, parcel: &str) -> bool {
        self.parcels.iter().any(|l| l.name() == parcel)
    }

    /// Report entry for a named group
    pub fn group(&self, name: &str) -> Option<&GroupReport> {
        self.report
            .iter()
            .find(|r| r.group.name().is_some_and(|n| n.as_str() == name))
    }

    /// Report entry for the global group
    pub fn global(&self) -> Option<&GroupReport> {
        self.report.iter().find(|r| r.group.is_global())
    }
}

/// Resolves one graph under one policy
#[derive(Debug, Clone)]
pub struct Resolver<'g, 'a> {
    graph: &'g DependencyGraph<'a>,
    policy: ResolvePolicy,
}

impl<'g, 'a> Resolver<'g, 'a> {
    pub fn new(graph: &'g DependencyGraph<'a>, policy: ResolvePolicy) -> Self {
        Self { graph, policy }
    }

    pub fn policy(&self) -> &ResolvePolicy {
        &self.policy
    }

    /// Runs the fixpoint and returns the manifest or every collected error
    pub fn resolve<C: Chooser + ?Sized>(
        &self,
        chooser: &mut C,
    ) -> Result<ResolvedManifest, ResolutionFailure> {
        let mut run = Run::start(self.graph, &self.policy, chooser)?;
        run.fixpoint()?;
        run.check_required();

        if run.errors.is_empty() {
            Ok(run.manifest())
        } else {
            tracing::debug!(errors = run.errors.len(), "resolution failed");
            Err(run.failure())
        }
    }
}

/// Convenience wrapper around [`Resolver`]
pub fn resolve<C: Chooser + ?Sized>(
    graph: &DependencyGraph<'_>,
    policy: ResolvePolicy,
    chooser: &mut C,
) -> Result<ResolvedManifest, ResolutionFailure> {
    Resolver::new(graph, policy).resolve(chooser)
}

/// Scratch state of a single resolution run
struct Run<'r, 'g, 'a, C: ?Sized> {
    graph: &'g DependencyGraph<'a>,
    evaluator: SatisfactionEvaluator<'g, 'a>,
    chooser: &'r mut C,
    opted_in: BTreeSet<GroupId>,
    required: BTreeSet<GroupId>,
    selection: BTreeSet<ParcelId>,
    /// `oneOf` groups already decided this run
    decided: BTreeSet<GroupId>,
    /// Groups with an error already recorded
    failed: BTreeSet<GroupId>,
    /// Errors with the group they were recorded against
    errors: Vec<(Option<GroupId>, ResolutionError)>,
}

impl<'r, 'g, 'a, C: Chooser + ?Sized> Run<'r, 'g, 'a, C> {
    fn start(
        graph: &'g DependencyGraph<'a>,
        policy: &ResolvePolicy,
        chooser: &'r mut C,
    ) -> Result<Self, ResolutionFailure> {
        if let Some(path) = cycle::find_cycle(graph) {
            return Err(ResolutionFailure {
                errors: vec![ResolutionError::CycleDetected { path }],
            });
        }

        let mut opted_in = BTreeSet::new();
        let mut errors = Vec::new();
        for name in &policy.opted_in {
            match graph.group_id(name) {
                Some(group) => {
                    opted_in.insert(group);
                }
                None => errors.push(ResolutionError::UnknownGroupReference {
                    group: name.clone(),
                }),
            }
        }
        if !errors.is_empty() {
            return Err(ResolutionFailure { errors });
        }

        let mut required = graph.root_required().clone();
        required.extend(opted_in.iter().copied());

        Ok(Self {
            graph,
            evaluator: SatisfactionEvaluator::new(graph, policy.any_of),
            chooser,
            opted_in,
            required,
            selection: BTreeSet::new(),
            decided: BTreeSet::new(),
            failed: BTreeSet::new(),
            errors: Vec::new(),
        })
    }

    fn fixpoint(&mut self) -> Result<(), ResolutionFailure> {
        let bound = self.graph.group_count() + self.graph.parcel_count() + 1;
        let mut iteration = 0;

        loop {
            iteration += 1;
            if iteration > bound {
                // Unreachable for an acyclic graph; the sets only ever grow
                let path = self.required.iter().map(|g| self.group_name(*g)).collect();
                self.errors.push((None, ResolutionError::CycleDetected { path }));
                return Err(self.failure());
            }

            let graph = self.graph;
            let before = (self.required.len(), self.selection.len());
            let mut added = self.expand_all_of();

            if added.is_empty() {
                added = self.decide_one_of();
            }

            for parcel in &added {
                for group in graph.requires_groups(*parcel) {
                    if self.required.insert(*group) {
                        tracing::trace!(
                            group = %self.group_name(*group),
                            by = graph.parcel(*parcel).name(),
                            "group became required"
                        );
                    }
                }
            }

            tracing::debug!(
                iteration,
                required = self.required.len(),
                selected = self.selection.len(),
                "resolution iteration"
            );

            if (self.required.len(), self.selection.len()) == before {
                return Ok(());
            }
        }
    }

    /// Step 1: required `allOf` groups take every member
    fn expand_all_of(&mut self) -> Vec<ParcelId> {
        let mut added = Vec::new();
        for group in &self.required {
            if self.graph.policy(*group) != SatisfiedBy::AllOf {
                continue;
            }
            for parcel in self.graph.members(*group) {
                if self.selection.insert(*parcel) {
                    added.push(*parcel);
                }
            }
        }
        added
    }

    /// Step 2: required `oneOf` groups with nothing selected get decided
    fn decide_one_of(&mut self) -> Vec<ParcelId> {
        let pending: Vec<GroupId> = self
            .required
            .iter()
            .copied()
            .filter(|g| self.graph.policy(*g) == SatisfiedBy::OneOf && !self.decided.contains(g))
            .collect();

        let mut added = Vec::new();
        for group in pending {
            if let Some(parcel) = self.decide(group) {
                self.selection.insert(parcel);
                added.push(parcel);
            }
        }
        added
    }

    fn decide(&mut self, group: GroupId) -> Option<ParcelId> {
        let graph = self.graph;
        let members = graph.members(group);

        if members.is_empty() {
            self.decided.insert(group);
            self.fail(group, ResolutionError::UnsatisfiableGroup {
                group: self.group_name(group),
            });
            return None;
        }

        // Already satisfied (or over-satisfied, caught at the end)
        if members.iter().any(|p| self.selection.contains(p)) {
            return None;
        }

        self.decided.insert(group);
        let viable: Vec<ParcelId> = members
            .iter()
            .copied()
            .filter(|p| !self.conflicts(*p, group))
            .collect();

        match viable.as_slice() {
            [] => {
                self.fail(group, ResolutionError::UnsatisfiableGroup {
                    group: self.group_name(group),
                });
                None
            }
            [only] => {
                tracing::debug!(
                    group = %self.group_name(group),
                    parcel = self.graph.parcel(*only).name(),
                    "selected sole viable candidate"
                );
                Some(*only)
            }
            _ => self.ask(group, &viable),
        }
    }

    fn ask(&mut self, group: GroupId, viable: &[ParcelId]) -> Option<ParcelId> {
        let GroupRef::Named(name) = self.graph.group_ref(group) else {
            // The global group is always allOf
            return None;
        };

        let candidates: Vec<Candidate<'_>> = viable
            .iter()
            .map(|p| Candidate {
                id: *p,
                label: self.graph.label(*p),
            })
            .collect();

        let choice = self.chooser.choose(&name, &candidates);
        tracing::debug!(group = %name, ?choice, candidates = candidates.len(), "asked chooser");

        match choice {
            Choice::Skip => {
                let candidates = candidates.iter().map(|c| c.name().to_string()).collect();
                self.fail(group, ResolutionError::AmbiguousSelection {
                    group: name.to_string(),
                    candidates,
                });
                None
            }
            Choice::Select(parcel) => match candidates.iter().find(|c| c.name() == parcel) {
                Some(candidate) => Some(candidate.id),
                None => {
                    self.fail(group, ResolutionError::InvalidChoice {
                        group: name.to_string(),
                        parcel,
                    });
                    None
                }
            },
        }
    }

    /// Selecting `parcel` would over-satisfy another required `oneOf` group
    fn conflicts(&self, parcel: ParcelId, group: GroupId) -> bool {
        self.graph.groups_of(parcel).iter().any(|other| {
            *other != group
                && self.required.contains(other)
                && self.graph.policy(*other) == SatisfiedBy::OneOf
                && self
                    .graph
                    .members(*other)
                    .iter()
                    .any(|p| self.selection.contains(p))
        })
    }

    /// Termination check over every required group
    fn check_required(&mut self) {
        let required: Vec<GroupId> = self.required.iter().copied().collect();
        for group in required {
            match self.evaluator.evaluate(group, true, &self.selection) {
                Satisfaction::Satisfied => self.drop_stale(group),
                Satisfaction::Unsatisfied => {
                    if !self.failed.contains(&group) {
                        self.fail(group, ResolutionError::UnsatisfiableGroup {
                            group: self.group_name(group),
                        });
                    }
                }
                Satisfaction::OverSatisfied => {
                    let selected = self.names(&self.evaluator.selected_members(group, &self.selection));
                    self.fail(group, ResolutionError::OverSatisfied {
                        group: self.group_name(group),
                        selected,
                    });
                }
            }
        }
    }

    fn manifest(&self) -> ResolvedManifest {
        let parcels = self
            .selection
            .iter()
            .map(|p| self.graph.label(*p).clone())
            .collect();

        let report = self
            .graph
            .group_ids()
            .map(|group| {
                let required = self.required.contains(&group);
                GroupReport {
                    group: self.graph.group_ref(group),
                    policy: self.graph.policy(group),
                    required,
                    reason: self.reason(group, required),
                    satisfied: self.evaluator.satisfied(group, required, &self.selection),
                    selected: self.names(&self.evaluator.selected_members(group, &self.selection)),
                }
            })
            .collect();

        ResolvedManifest {
            invoice: self.graph.invoice().name(),
            parcels,
            report,
        }
    }

    fn reason(&self, group: GroupId, required: bool) -> RequiredReason {
        if group.is_global() {
            RequiredReason::Global
        } else if self.graph.is_root_required(group) {
            RequiredReason::Declared
        } else if self.opted_in.contains(&group) {
            RequiredReason::OptedIn
        } else if required {
            let by: Vec<ParcelId> = self
                .graph
                .required_by(group)
                .intersection(&self.selection)
                .copied()
                .collect();
            RequiredReason::RequiredBy(self.names(&by))
        } else {
            RequiredReason::NotRequired
        }
    }

    fn fail(&mut self, group: GroupId, error: ResolutionError) {
        tracing::debug!(%error, "resolution error recorded");
        self.failed.insert(group);
        self.errors.push((Some(group), error));
    }

    /// Forgets a skipped or unviable decision for a group a later pick satisfied
    fn drop_stale(&mut self, group: GroupId) {
        let before = self.errors.len();
        self.errors.retain(|(g, e)| {
            *g != Some(group)
                || !matches!(
                    e,
                    ResolutionError::AmbiguousSelection { .. }
                        | ResolutionError::UnsatisfiableGroup { .. }
                )
        });
        if self.errors.len() != before {
            tracing::debug!(group = %self.group_name(group), "dropped stale decision error");
        }
    }

    fn failure(&mut self) -> ResolutionFailure {
        ResolutionFailure {
            errors: std::mem::take(&mut self.errors)
                .into_iter()
                .map(|(_, e)| e)
                .collect(),
        }
    }

    fn group_name(&self, group: GroupId) -> String {
        self.graph.group_ref(group).to_string()
    }

    fn names(&self, parcels: &[ParcelId]) -> Vec<String> {
        parcels
            .iter()
            .map(|p| self.graph.parcel(*p).name().to_string())
            .collect()
    }
}
