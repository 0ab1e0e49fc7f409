//! Caller decisions for `oneOf` groups
//!
//! The resolver never guesses between alternatives. When a required `oneOf`
//! group has more than one viable member it asks a [`Chooser`] once per run.
//! Interactive front ends collect the reported ambiguities, ask the user, and
//! resolve again with a filled-in [`ChoiceMap`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::id::{GroupName, ParcelId};
use super::label::Label;

/// Answer to a chooser query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Select the candidate with this label name
    Select(String),
    /// Leave the group unresolved; reported as an ambiguity
    Skip,
}

/// A viable member offered to a chooser
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub id: ParcelId,
    pub label: &'a Label,
}

impl Candidate<'_> {
    pub fn name(&self) -> &str {
        self.label.name()
    }
}

/// Decides between alternatives in a `oneOf` group
pub trait Chooser {
    fn choose(&mut self, group: &GroupName, candidates: &[Candidate<'_>]) -> Choice;
}

impl<C: Chooser + ?Sized> Chooser for &mut C {
    fn choose(&mut self, group: &GroupName, candidates: &[Candidate<'_>]) -> Choice {
        (**self).choose(group, candidates)
    }
}

/// Chooser that never decides
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipAll;

impl Chooser for SkipAll {
    fn choose(&mut self, _group: &GroupName, _candidates: &[Candidate<'_>]) -> Choice {
        Choice::Skip
    }
}

/// Chooser backed by a closure
pub struct FnChooser<F>(F);

/// Wraps a closure as a [`Chooser`]
pub fn from_fn<F>(f: F) -> FnChooser<F>
where
    F: FnMut(&GroupName, &[Candidate<'_>]) -> Choice,
{
    FnChooser(f)
}

impl<F> Chooser for FnChooser<F>
where
    F: FnMut(&GroupName, &[Candidate<'_>]) -> Choice,
{
    fn choose(&mut self, group: &GroupName, candidates: &[Candidate<'_>]) -> Choice {
        (self.0)(group, candidates)
    }
}

/// Pre-recorded decisions: group name to parcel label name
///
/// Groups without an entry are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceMap(BTreeMap<String, String>);

impl ChoiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decision, replacing any earlier one for the group
    pub fn insert(&mut self, group: impl Into<String>, parcel: impl Into<String>) -> Option<String> {
        self.0.insert(group.into(), parcel.into())
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, group: impl Into<String>, parcel: impl Into<String>) -> Self {
        self.insert(group, parcel);
        self
    }

    pub fn get(&self, group: &str) -> Option<&str> {
        self.0.get(group).map(String::as_str)
    }

    /// Merges another map in; its entries win
    pub fn extend(&mut self, other: ChoiceMap) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(g, p)| (g.as_str(), p.as_str()))
    }
}

impl Chooser for ChoiceMap {
    fn choose(&mut self, group: &GroupName, _candidates: &[Candidate<'_>]) -> Choice {
        match self.get(group.as_str()) {
            Some(parcel) => Choice::Select(parcel.to_string()),
            None => Choice::Skip,
        }
    }
}

impl<G: Into<String>, P: Into<String>> FromIterator<(G, P)> for ChoiceMap {
    fn from_iter<T: IntoIterator<Item = (G, P)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(g, p)| (g.into(), p.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::label::HashAlgorithm;

    fn candidates(labels: &[Label]) -> Vec<Candidate<'_>> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| Candidate {
                id: ParcelId(i),
                label,
            })
            .collect()
    }

    fn labels() -> Vec<Label> {
        vec![
            Label::new("first", HashAlgorithm::Sha256, "aa").unwrap(),
            Label::new("second", HashAlgorithm::Sha256, "bb").unwrap(),
        ]
    }

    #[test]
    fn choice_map_selects_recorded_parcel() {
        let labels = labels();
        let mut map = ChoiceMap::new().with("cli", "second");
        let group: GroupName = "cli".parse().unwrap();

        assert_eq!(
            map.choose(&group, &candidates(&labels)),
            Choice::Select("second".to_string())
        );
    }

    #[test]
    fn choice_map_skips_unknown_group() {
        let labels = labels();
        let mut map = ChoiceMap::new().with("cli", "second");
        let group: GroupName = "tools".parse().unwrap();

        assert_eq!(map.choose(&group, &candidates(&labels)), Choice::Skip);
    }

    #[test]
    fn closure_chooser_picks_first_candidate() {
        let labels = labels();
        let mut calls = 0;
        let mut chooser = from_fn(|_group, candidates| {
            calls += 1;
            Choice::Select(candidates[0].name().to_string())
        });
        let group: GroupName = "cli".parse().unwrap();

        assert_eq!(
            chooser.choose(&group, &candidates(&labels)),
            Choice::Select("first".to_string())
        );
        drop(chooser);
        assert_eq!(calls, 1);
    }

    #[test]
    fn skip_all_skips() {
        let labels = labels();
        let group: GroupName = "cli".parse().unwrap();
        assert_eq!(SkipAll.choose(&group, &candidates(&labels)), Choice::Skip);
    }

    #[test]
    fn choice_map_from_toml() {
        let map: ChoiceMap = toml::from_str("cli = \"first\"\ntools = \"hammer\"\n").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("tools"), Some("hammer"));
    }

    #[test]
    fn extend_overrides() {
        let mut base: ChoiceMap = [("cli", "first")].into_iter().collect();
        base.extend(ChoiceMap::new().with("cli", "second"));
        assert_eq!(base.get("cli"), Some("second"));
    }
}
