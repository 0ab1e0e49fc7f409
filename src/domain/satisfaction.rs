//! Group satisfaction
//!
//! Pure evaluation of whether a candidate selection satisfies a group's
//! `satisfiedBy` policy.
//!
//! `anyOf` has two readings in the invoice format's own documentation. One
//! passage lets a required `anyOf` group be satisfied with nothing selected;
//! a worked example demands at least one member once another parcel requires
//! the group. Both are available through [`AnyOfReading`] so integrators pick
//! one explicitly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::graph::DependencyGraph;
use super::id::{GroupId, ParcelId};
use super::invoice::SatisfiedBy;

/// Interpretation of `anyOf` for groups in the required state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnyOfReading {
    /// A required `anyOf` group needs at least one selected member
    #[default]
    #[serde(rename = "at-least-one", alias = "at-least-one-when-required")]
    AtLeastOneWhenRequired,
    /// An `anyOf` group is satisfied even with nothing selected
    Optional,
}

impl AnyOfReading {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnyOfReading::AtLeastOneWhenRequired => "at-least-one",
            AnyOfReading::Optional => "optional",
        }
    }
}

impl fmt::Display for AnyOfReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnyOfReading {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "at-least-one" | "at-least-one-when-required" => {
                Ok(AnyOfReading::AtLeastOneWhenRequired)
            }
            "optional" => Ok(AnyOfReading::Optional),
            other => Err(format!(
                "unknown anyOf reading '{}' (expected at-least-one or optional)",
                other
            )),
        }
    }
}

/// Outcome of evaluating one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Satisfaction {
    Satisfied,
    Unsatisfied,
    /// More than one member of a `oneOf` group is selected
    OverSatisfied,
}

impl Satisfaction {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Satisfaction::Satisfied)
    }
}

/// Evaluates groups of one graph against candidate selections
#[derive(Debug, Clone, Copy)]
pub struct SatisfactionEvaluator<'g, 'a> {
    graph: &'g DependencyGraph<'a>,
    any_of: AnyOfReading,
}

impl<'g, 'a> SatisfactionEvaluator<'g, 'a> {
    pub fn new(graph: &'g DependencyGraph<'a>, any_of: AnyOfReading) -> Self {
        Self { graph, any_of }
    }

    pub fn any_of_reading(&self) -> AnyOfReading {
        self.any_of
    }

    /// Returns true iff the group is satisfied by the selection
    pub fn satisfied(&self, group: GroupId, required: bool, selection: &BTreeSet<ParcelId>) -> bool {
        self.evaluate(group, required, selection).is_satisfied()
    }

    /// Classifies the group against the selection
    pub fn evaluate(
        &self,
        group: GroupId,
        required: bool,
        selection: &BTreeSet<ParcelId>,
    ) -> Satisfaction {
        let members = self.graph.members(group);

        match self.graph.policy(group) {
            SatisfiedBy::AllOf => {
                if members.is_subset(selection) {
                    Satisfaction::Satisfied
                } else {
                    Satisfaction::Unsatisfied
                }
            }
            SatisfiedBy::OneOf => match members.intersection(selection).count() {
                1 => Satisfaction::Satisfied,
                0 => Satisfaction::Unsatisfied,
                _ => Satisfaction::OverSatisfied,
            },
            SatisfiedBy::AnyOf => {
                if !required || self.any_of == AnyOfReading::Optional {
                    return Satisfaction::Satisfied;
                }
                if members.intersection(selection).next().is_some() {
                    Satisfaction::Satisfied
                } else {
                    Satisfaction::Unsatisfied
                }
            }
        }
    }

    /// Members of the group that are in the selection
    pub fn selected_members(&self, group: GroupId, selection: &BTreeSet<ParcelId>) -> Vec<ParcelId> {
        self.graph
            .members(group)
            .intersection(selection)
            .copied()
            .collect()
    }
}
