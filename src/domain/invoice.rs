//! Invoice domain model
//!
//! An invoice describes one version of a bindle: its metadata, the groups it
//! declares and the parcels it ships. [`RawInvoice`] mirrors the decoded
//! manifest field for field; [`Invoice::build`] validates it into the
//! immutable model every later stage works from.

use semver::{Version, VersionReq};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::id::{GroupName, GroupRef, IdError};
use super::label::{AnnotationMap, Label, LabelError, RawLabel};

/// Manifest version token of the v1 invoice layout
pub const BINDLE_VERSION_1: &str = "1.0.0";

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid bindle version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Group #{position} has an empty name")]
    EmptyGroupName { position: usize },

    #[error("Invalid group name '{name}': {source}")]
    InvalidGroupName { name: String, source: IdError },

    #[error("Group '{0}' is declared more than once")]
    DuplicateGroup(String),

    #[error("Group '{group}' has unknown satisfiedBy value '{value}' (expected allOf, oneOf or anyOf)")]
    UnknownSatisfiedBy { group: String, value: String },

    #[error("Parcel '{parcel}' references undeclared group '{group}'")]
    UnknownGroupReference { group: String, parcel: String },

    #[error("Parcel '{0}' lists the global group in memberOf; global membership is derived")]
    GlobalMembershipNotSettable(String),

    #[error("Parcel name '{0}' is used more than once")]
    DuplicateParcel(String),

    #[error("Parcel '{parcel}' has an invalid label: {source}")]
    InvalidLabel { parcel: String, source: LabelError },
}

/// How many schema violations to gather before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Stop at the first violation
    #[default]
    FailFast,
    /// Report every violation
    CollectAll,
}

/// Satisfaction policy of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SatisfiedBy {
    /// Every member must be selected
    #[default]
    AllOf,
    /// Exactly one member must be selected
    OneOf,
    /// At least one member, when the group is required
    AnyOf,
}

impl SatisfiedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SatisfiedBy::AllOf => "allOf",
            SatisfiedBy::OneOf => "oneOf",
            SatisfiedBy::AnyOf => "anyOf",
        }
    }
}

impl fmt::Display for SatisfiedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SatisfiedBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allOf" => Ok(SatisfiedBy::AllOf),
            "oneOf" => Ok(SatisfiedBy::OneOf),
            "anyOf" => Ok(SatisfiedBy::AnyOf),
            other => Err(other.to_string()),
        }
    }
}

// =============================================================================
// Raw (decoded) input
// =============================================================================

/// Invoice fields as produced by a manifest decoder
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RawInvoice {
    #[serde(default)]
    pub bindle_version: String,
    pub yanked: Option<bool>,
    #[serde(default)]
    pub bindle: RawBindle,
    pub annotations: Option<AnnotationMap>,
    pub group: Option<Vec<RawGroup>>,
    pub parcel: Option<Vec<RawParcel>>,
    /// Signature blocks are checked by the trust layer, not here
    pub signature: Option<IgnoredAny>,
    pub yanked_signature: Option<IgnoredAny>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RawBindle {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub description: Option<String>,
    pub authors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RawGroup {
    #[serde(default)]
    pub name: String,
    pub required: Option<bool>,
    pub satisfied_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RawParcel {
    #[serde(default)]
    pub label: RawLabel,
    pub conditions: Option<RawCondition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RawCondition {
    pub member_of: Option<Vec<String>>,
    pub requires: Option<Vec<String>>,
}

// =============================================================================
// Validated model
// =============================================================================

/// Bindle metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindleSpec {
    pub name: String,
    pub version: Version,
    pub authors: Vec<String>,
    pub description: Option<String>,
}

/// A declared group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: GroupName,
    pub satisfied_by: SatisfiedBy,
    pub required: bool,
}

/// Group membership and requirements of one parcel in this invoice
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Condition {
    /// `None` means "global group only"; `Some(vec![])` means no group at all
    pub member_of: Option<Vec<GroupName>>,
    pub requires: Vec<GroupRef>,
}

/// An invoice entry: a label and its conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parcel {
    pub label: Label,
    pub condition: Condition,
}

impl Parcel {
    /// Returns true if the parcel is explicitly a member of the named group
    pub fn member_of(&self, group: &str) -> bool {
        self.condition
            .member_of
            .as_ref()
            .map(|groups| groups.iter().any(|g| g == group))
            .unwrap_or(false)
    }

    /// Returns true if this parcel belongs to the implicit global group
    pub fn is_global_member(&self) -> bool {
        self.condition.member_of.is_none()
    }

    /// Returns true if `memberOf = []` removed the parcel from every group
    pub fn is_excluded(&self) -> bool {
        matches!(&self.condition.member_of, Some(groups) if groups.is_empty())
    }

    pub fn name(&self) -> &str {
        self.label.name()
    }
}

/// A validated, immutable invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    bindle_version: String,
    bindle: BindleSpec,
    annotations: AnnotationMap,
    groups: Vec<Group>,
    parcels: Vec<Parcel>,
    yanked: bool,
}

impl Invoice {
    /// Validates raw fields, failing on the first violation
    pub fn build(raw: RawInvoice) -> Result<Self, SchemaError> {
        Self::build_with(&raw, ValidationMode::FailFast).map_err(|mut errors| errors.remove(0))
    }

    /// Returns every schema violation in the raw fields
    pub fn validate(raw: &RawInvoice) -> Vec<SchemaError> {
        Self::build_with(raw, ValidationMode::CollectAll)
            .err()
            .unwrap_or_default()
    }

    /// Validates raw fields with an explicit reporting mode
    ///
    /// On failure the returned list is never empty.
    pub fn build_with(raw: &RawInvoice, mode: ValidationMode) -> Result<Self, Vec<SchemaError>> {
        let mut collector = Collector {
            mode,
            errors: Vec::new(),
        };
        match assemble(raw, &mut collector) {
            Ok(invoice) if collector.errors.is_empty() => Ok(invoice),
            _ => Err(collector.errors),
        }
    }

    /// Slash-delimited invoice name, e.g. `hello/1.2.3`
    pub fn name(&self) -> String {
        format!("{}/{}", self.bindle.name, self.bindle.version)
    }

    /// Stable opaque name derived from the bindle name and version
    ///
    /// Only `[0-9a-f]` characters, so it is safe to use as a storage key.
    pub fn canonical_name(&self) -> String {
        blake3::hash(self.name().as_bytes()).to_hex().to_string()
    }

    /// Compares a version requirement against this bindle's version
    ///
    /// An empty requirement matches anything and an unparsable one matches
    /// nothing. A bare version such as `1.2.3` means exactly that version.
    pub fn version_in_range(&self, requirement: &str) -> bool {
        version_compare(&self.bindle.version, requirement)
    }

    pub fn bindle_version(&self) -> &str {
        &self.bindle_version
    }

    pub fn bindle(&self) -> &BindleSpec {
        &self.bindle
    }

    pub fn annotations(&self) -> &AnnotationMap {
        &self.annotations
    }

    /// Declared groups, in declaration order (the global group is implicit)
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Parcels, in declaration order
    pub fn parcels(&self) -> &[Parcel] {
        &self.parcels
    }

    pub fn is_yanked(&self) -> bool {
        self.yanked
    }

    /// Looks up a declared group by name
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Checks whether a group by this name is declared
    pub fn has_group(&self, name: &str) -> bool {
        self.group(name).is_some()
    }

    /// Parcels that are explicit members of the named group
    pub fn group_members(&self, name: &str) -> Vec<&Parcel> {
        if !self.has_group(name) {
            tracing::debug!(group = name, "no such group");
            return vec![];
        }
        self.parcels.iter().filter(|p| p.member_of(name)).collect()
    }

    /// Parcels belonging to the implicit global group
    pub fn global_members(&self) -> Vec<&Parcel> {
        self.parcels.iter().filter(|p| p.is_global_member()).collect()
    }
}

fn version_compare(version: &Version, requirement: &str) -> bool {
    let requirement = requirement.trim();
    if requirement.is_empty() {
        return true;
    }

    // A leading digit means an exact pin, not the caret default of semver
    let normalized = if requirement.starts_with(|c: char| c.is_ascii_digit()) {
        format!("={}", requirement)
    } else {
        requirement.to_string()
    };

    match VersionReq::parse(&normalized) {
        Ok(req) => req.matches(version),
        Err(e) => {
            tracing::warn!(requirement, error = %e, "version requirement could not be parsed");
            false
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

struct Abort;

struct Collector {
    mode: ValidationMode,
    errors: Vec<SchemaError>,
}

impl Collector {
    fn report(&mut self, error: SchemaError) -> Result<(), Abort> {
        self.errors.push(error);
        match self.mode {
            ValidationMode::FailFast => Err(Abort),
            ValidationMode::CollectAll => Ok(()),
        }
    }
}

fn assemble(raw: &RawInvoice, collector: &mut Collector) -> Result<Invoice, Abort> {
    if raw.bindle_version.trim().is_empty() {
        collector.report(SchemaError::MissingField("bindleVersion"))?;
    }
    let bindle = assemble_bindle(&raw.bindle, collector)?;
    let groups = assemble_groups(raw.group.as_deref().unwrap_or_default(), collector)?;

    let declared: HashSet<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    let mut seen_parcels = HashSet::new();
    let mut parcels = Vec::new();

    for (position, raw_parcel) in raw.parcel.iter().flatten().enumerate() {
        let display = if raw_parcel.label.name.trim().is_empty() {
            format!("#{}", position)
        } else {
            raw_parcel.label.name.clone()
        };

        let label = match Label::from_raw(raw_parcel.label.clone()) {
            Ok(label) => Some(label),
            Err(source) => {
                collector.report(SchemaError::InvalidLabel {
                    parcel: display.clone(),
                    source,
                })?;
                None
            }
        };

        if !seen_parcels.insert(display.clone()) {
            collector.report(SchemaError::DuplicateParcel(display.clone()))?;
        }

        let condition = assemble_condition(
            raw_parcel.conditions.as_ref(),
            &display,
            &declared,
            collector,
        )?;

        if let Some(label) = label {
            parcels.push(Parcel { label, condition });
        }
    }

    Ok(Invoice {
        bindle_version: raw.bindle_version.clone(),
        bindle,
        annotations: raw.annotations.clone().unwrap_or_default(),
        groups,
        parcels,
        yanked: raw.yanked.unwrap_or(false),
    })
}

fn assemble_bindle(raw: &RawBindle, collector: &mut Collector) -> Result<BindleSpec, Abort> {
    if raw.name.trim().is_empty() {
        collector.report(SchemaError::MissingField("bindle.name"))?;
    }

    let version = if raw.version.trim().is_empty() {
        collector.report(SchemaError::MissingField("bindle.version"))?;
        Version::new(0, 0, 0)
    } else {
        match Version::parse(raw.version.trim()) {
            Ok(v) => v,
            Err(e) => {
                collector.report(SchemaError::InvalidVersion {
                    version: raw.version.clone(),
                    reason: e.to_string(),
                })?;
                Version::new(0, 0, 0)
            }
        }
    };

    Ok(BindleSpec {
        name: raw.name.clone(),
        version,
        authors: raw.authors.clone().unwrap_or_default(),
        description: raw.description.clone(),
    })
}

fn assemble_groups(raw: &[RawGroup], collector: &mut Collector) -> Result<Vec<Group>, Abort> {
    let mut groups: Vec<Group> = Vec::with_capacity(raw.len());

    for (position, raw_group) in raw.iter().enumerate() {
        let name = match raw_group.name.parse::<GroupName>() {
            Ok(name) => name,
            Err(IdError::EmptyGroupName) => {
                collector.report(SchemaError::EmptyGroupName { position })?;
                continue;
            }
            Err(source) => {
                collector.report(SchemaError::InvalidGroupName {
                    name: raw_group.name.clone(),
                    source,
                })?;
                continue;
            }
        };

        let satisfied_by = match raw_group.satisfied_by.as_deref() {
            None => SatisfiedBy::default(),
            Some(value) => match value.parse() {
                Ok(policy) => policy,
                Err(value) => {
                    collector.report(SchemaError::UnknownSatisfiedBy {
                        group: name.to_string(),
                        value,
                    })?;
                    SatisfiedBy::default()
                }
            },
        };

        if groups.iter().any(|g| g.name == name) {
            collector.report(SchemaError::DuplicateGroup(name.to_string()))?;
            continue;
        }

        groups.push(Group {
            name,
            satisfied_by,
            required: raw_group.required.unwrap_or(false),
        });
    }

    Ok(groups)
}

fn assemble_condition(
    raw: Option<&RawCondition>,
    parcel: &str,
    declared: &HashSet<&str>,
    collector: &mut Collector,
) -> Result<Condition, Abort> {
    let Some(raw) = raw else {
        return Ok(Condition::default());
    };

    let member_of = match &raw.member_of {
        None => None,
        Some(names) => {
            let mut groups = Vec::with_capacity(names.len());
            for name in names {
                if name.is_empty() {
                    collector.report(SchemaError::GlobalMembershipNotSettable(parcel.to_string()))?;
                    continue;
                }
                match lookup(name, declared) {
                    Some(group) => {
                        if !groups.contains(&group) {
                            groups.push(group);
                        }
                    }
                    None => collector.report(SchemaError::UnknownGroupReference {
                        group: name.clone(),
                        parcel: parcel.to_string(),
                    })?,
                }
            }
            Some(groups)
        }
    };

    let mut requires = Vec::new();
    for name in raw.requires.iter().flatten() {
        let group = if name.is_empty() {
            GroupRef::Global
        } else {
            match lookup(name, declared) {
                Some(group) => GroupRef::Named(group),
                None => {
                    collector.report(SchemaError::UnknownGroupReference {
                        group: name.clone(),
                        parcel: parcel.to_string(),
                    })?;
                    continue;
                }
            }
        };
        if !requires.contains(&group) {
            requires.push(group);
        }
    }

    Ok(Condition {
        member_of,
        requires,
    })
}

fn lookup(name: &str, declared: &HashSet<&str>) -> Option<GroupName> {
    if declared.contains(name) {
        name.parse().ok()
    } else {
        None
    }
}

impl Serialize for Parcel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let requires: Vec<String> = self.condition.requires.iter().map(|g| g.to_string()).collect();
        let mut state = serializer.serialize_struct("Parcel", 3)?;
        state.serialize_field("label", &self.label)?;
        state.serialize_field("memberOf", &self.condition.member_of)?;
        state.serialize_field("requires", &requires)?;
        state.end()
    }
}
