//! Identity types for groups and parcels
//!
//! Groups are referenced by name in an invoice. The implicit global group has
//! no name, so it is represented by a sentinel ([`GroupRef::Global`]) that no
//! user-supplied string can produce.
//!
//! Inside a built graph, groups and parcels are addressed by dense arena
//! indices ([`GroupId`], [`ParcelId`]) in invoice declaration order. The global
//! group always sits at index 0.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Display form of the implicit global group
pub const GLOBAL_GROUP_DISPLAY: &str = "<global>";

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Group name must not be empty")]
    EmptyGroupName,

    #[error("Group name must not have surrounding whitespace: '{0}'")]
    UntrimmedGroupName(String),

    #[error("Group name '{GLOBAL_GROUP_DISPLAY}' is reserved for the global group")]
    ReservedGroupName,
}

/// Name of a declared group
///
/// Never empty and never [`GLOBAL_GROUP_DISPLAY`], so it can never collide
/// with the global group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupName(String);

impl GroupName {
    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GroupName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdError::EmptyGroupName);
        }
        if s.trim() != s {
            return Err(IdError::UntrimmedGroupName(s.to_string()));
        }
        if s == GLOBAL_GROUP_DISPLAY {
            return Err(IdError::ReservedGroupName);
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for GroupName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupName> for String {
    fn from(name: GroupName) -> Self {
        name.0
    }
}

impl PartialEq<str> for GroupName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for GroupName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Reference to either the implicit global group or a named group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupRef {
    Global,
    Named(GroupName),
}

impl GroupRef {
    /// Interprets a name found in a condition list
    ///
    /// The empty string denotes the global group.
    pub fn from_reference(name: &str) -> Result<Self, IdError> {
        if name.is_empty() {
            Ok(GroupRef::Global)
        } else {
            name.parse().map(GroupRef::Named)
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, GroupRef::Global)
    }

    /// Returns the user-facing name, or `None` for the global group
    pub fn name(&self) -> Option<&GroupName> {
        match self {
            GroupRef::Global => None,
            GroupRef::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRef::Global => f.write_str(GLOBAL_GROUP_DISPLAY),
            GroupRef::Named(name) => write!(f, "{}", name),
        }
    }
}

impl Serialize for GroupRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Arena index of a group inside a dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub(crate) usize);

impl GroupId {
    /// The implicit global group
    pub const GLOBAL: GroupId = GroupId(0);

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_global(self) -> bool {
        self == Self::GLOBAL
    }
}

/// Arena index of a parcel, equal to its position in the invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParcelId(pub(crate) usize);

impl ParcelId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_name_parses() {
        let name: GroupName = "server".parse().unwrap();
        assert_eq!(name.as_str(), "server");
        assert_eq!(name.to_string(), "server");
        assert!(name == "server");
    }

    #[test]
    fn empty_group_name_rejected() {
        assert_eq!("".parse::<GroupName>(), Err(IdError::EmptyGroupName));
    }

    #[test]
    fn padded_group_name_rejected() {
        assert!(matches!(
            " cli".parse::<GroupName>(),
            Err(IdError::UntrimmedGroupName(_))
        ));
    }

    #[test]
    fn empty_reference_is_global() {
        assert_eq!(GroupRef::from_reference("").unwrap(), GroupRef::Global);
        assert!(GroupRef::from_reference("").unwrap().is_global());
    }

    #[test]
    fn named_reference() {
        let group = GroupRef::from_reference("utility").unwrap();
        assert_eq!(group.name().map(|n| n.as_str()), Some("utility"));
        assert_eq!(group.to_string(), "utility");
    }

    #[test]
    fn global_display_name_is_reserved() {
        assert_eq!(
            GLOBAL_GROUP_DISPLAY.parse::<GroupName>(),
            Err(IdError::ReservedGroupName)
        );
        assert_eq!(
            GroupRef::from_reference(GLOBAL_GROUP_DISPLAY),
            Err(IdError::ReservedGroupName)
        );
    }

    #[test]
    fn group_name_serde_roundtrip_rejects_empty() {
        let parsed: Result<GroupName, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());

        let name: GroupName = serde_json::from_str("\"cli\"").unwrap();
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"cli\"");
    }

    #[test]
    fn global_id_is_zero() {
        assert!(GroupId::GLOBAL.is_global());
        assert_eq!(GroupId::GLOBAL.index(), 0);
        assert!(!GroupId(3).is_global());
    }
}
