//! Parcel labels
//!
//! A label is the content identity of a parcel: one or more digests of its
//! bytes plus descriptive metadata. Labels are immutable once built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Media type used when a label does not declare one
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Free-form string annotations
pub type AnnotationMap = BTreeMap<String, String>;

/// Feature flags keyed by feature namespace
pub type FeatureMap = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("Label name must not be empty")]
    EmptyName,

    #[error("Label has no content hash")]
    MissingContentHash,

    #[error("Invalid {algorithm} digest '{digest}': expected hexadecimal characters")]
    InvalidContentHash {
        algorithm: HashAlgorithm,
        digest: String,
    },
}

/// Digest algorithm of a content hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label as it appears in a decoded invoice, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RawLabel {
    #[serde(default)]
    pub name: String,
    pub sha256: Option<String>,
    pub sha512: Option<String>,
    pub blake3: Option<String>,
    pub media_type: Option<String>,
    pub size: Option<u64>,
    pub annotations: Option<AnnotationMap>,
    pub feature: Option<FeatureMap>,
}

/// Validated content identity of a parcel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    name: String,
    #[serde(flatten)]
    hashes: BTreeMap<HashAlgorithm, String>,
    media_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotations: Option<AnnotationMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feature: Option<FeatureMap>,
}

impl Label {
    /// Creates a label with a single hash and the default media type
    pub fn new(
        name: impl Into<String>,
        algorithm: HashAlgorithm,
        digest: impl Into<String>,
    ) -> Result<Self, LabelError> {
        let raw = RawLabel {
            name: name.into(),
            ..RawLabel::default()
        }
        .with_hash(algorithm, digest.into());
        Self::from_raw(raw)
    }

    /// Validates a raw label
    pub fn from_raw(raw: RawLabel) -> Result<Self, LabelError> {
        if raw.name.trim().is_empty() {
            return Err(LabelError::EmptyName);
        }

        let mut hashes = BTreeMap::new();
        for (algorithm, digest) in [
            (HashAlgorithm::Sha256, raw.sha256),
            (HashAlgorithm::Sha512, raw.sha512),
            (HashAlgorithm::Blake3, raw.blake3),
        ] {
            if let Some(digest) = digest {
                if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(LabelError::InvalidContentHash { algorithm, digest });
                }
                hashes.insert(algorithm, digest);
            }
        }
        if hashes.is_empty() {
            return Err(LabelError::MissingContentHash);
        }

        Ok(Self {
            name: raw.name,
            hashes,
            media_type: raw
                .media_type
                .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
            size: raw.size,
            annotations: raw.annotations,
            feature: raw.feature,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn annotations(&self) -> Option<&AnnotationMap> {
        self.annotations.as_ref()
    }

    pub fn feature(&self) -> Option<&FeatureMap> {
        self.feature.as_ref()
    }

    /// Returns the digest for an algorithm, if the label carries one
    pub fn hash(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.hashes.get(&algorithm).map(String::as_str)
    }

    /// All digests, ordered by algorithm
    pub fn hashes(&self) -> impl Iterator<Item = (HashAlgorithm, &str)> {
        self.hashes.iter().map(|(alg, digest)| (*alg, digest.as_str()))
    }

    /// The strongest available digest, used when a single key is needed
    pub fn primary_hash(&self) -> (HashAlgorithm, &str) {
        // from_raw guarantees at least one entry
        self.hashes
            .iter()
            .next()
            .map(|(alg, digest)| (*alg, digest.as_str()))
            .unwrap_or((HashAlgorithm::Sha256, ""))
    }
}

impl RawLabel {
    /// Sets the digest for an algorithm
    pub fn with_hash(mut self, algorithm: HashAlgorithm, digest: String) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => self.sha256 = Some(digest),
            HashAlgorithm::Sha512 => self.sha512 = Some(digest),
            HashAlgorithm::Blake3 => self.blake3 = Some(digest),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str) -> RawLabel {
        RawLabel {
            name: name.to_string(),
            ..RawLabel::default()
        }
    }

    #[test]
    fn default_media_type() {
        let label = Label::new("telescope.gif", HashAlgorithm::Sha256, "aaabbbccc").unwrap();
        assert_eq!(label.media_type(), DEFAULT_MEDIA_TYPE);
        assert_eq!(label.hash(HashAlgorithm::Sha256), Some("aaabbbccc"));
        assert_eq!(label.size(), None);
    }

    #[test]
    fn multiple_algorithms() {
        let label = Label::from_raw(
            raw("daemon")
                .with_hash(HashAlgorithm::Blake3, "ff00".to_string())
                .with_hash(HashAlgorithm::Sha256, "00ff".to_string()),
        )
        .unwrap();

        let algs: Vec<_> = label.hashes().map(|(alg, _)| alg).collect();
        assert_eq!(algs, vec![HashAlgorithm::Sha256, HashAlgorithm::Blake3]);
        assert_eq!(label.primary_hash(), (HashAlgorithm::Sha256, "00ff"));
    }

    #[test]
    fn missing_hash_rejected() {
        assert_eq!(
            Label::from_raw(raw("lonely")),
            Err(LabelError::MissingContentHash)
        );
    }

    #[test]
    fn non_hex_hash_rejected() {
        let result = Label::from_raw(raw("bad").with_hash(HashAlgorithm::Sha512, "xyz".into()));
        assert!(matches!(
            result,
            Err(LabelError::InvalidContentHash {
                algorithm: HashAlgorithm::Sha512,
                ..
            })
        ));
    }

    #[test]
    fn empty_name_rejected() {
        let result = Label::from_raw(raw("  ").with_hash(HashAlgorithm::Sha256, "ab".into()));
        assert_eq!(result, Err(LabelError::EmptyName));
    }

    #[test]
    fn parses_camel_case_toml() {
        let toml = r#"
sha256 = "aaabbbcccdddeeefff"
name = "telescope.gif"
mediaType = "image/gif"
size = 123_456
[annotations]
origin = "arecibo"
"#;
        let raw: RawLabel = toml::from_str(toml).unwrap();
        let label = Label::from_raw(raw).unwrap();
        assert_eq!(label.media_type(), "image/gif");
        assert_eq!(label.size(), Some(123_456));
        assert_eq!(
            label.annotations().and_then(|a| a.get("origin")).map(String::as_str),
            Some("arecibo")
        );
    }

    #[test]
    fn serializes_hashes_inline() {
        let label = Label::new("a.txt", HashAlgorithm::Sha256, "abcd").unwrap();
        let json = serde_json::to_value(&label).unwrap();
        assert_eq!(json["sha256"], "abcd");
        assert_eq!(json["mediaType"], DEFAULT_MEDIA_TYPE);
        assert!(json.get("size").is_none());
    }
}
