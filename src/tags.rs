//! # Tags
//!
//! Key/value tag sets and the set arithmetic used to compute minimal tag
//! mutations against Parameter Store.
//!
//! All operations are pure: they borrow `self` and return a new set.
//! Filtering helpers (`ignore_aws`, `ignore_config`) are only ever applied
//! to tags presented back to the caller, never to what gets written.

use crate::constants::AWS_TAG_KEY_PREFIX;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Data associated with a single tag key.
///
/// For Parameter Store this is just a tag value, but some services attach
/// additional per-tag data. Each service is responsible for interpreting the
/// additional fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagData {
    /// Additional boolean field names and values associated with this tag
    pub additional_bool_fields: BTreeMap<String, Option<bool>>,
    /// Additional string field names and values associated with this tag
    pub additional_string_fields: BTreeMap<String, Option<String>>,
    /// Tag value
    pub value: Option<String>,
}

impl TagData {
    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }
}

/// Set of tags keyed by tag key.
///
/// Ordering carries no meaning; a `BTreeMap` keeps output deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueTags(BTreeMap<String, TagData>);

impl KeyValueTags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from plain key/value pairs
    pub fn from_string_map<I, K, V>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            tags.into_iter()
                .map(|(k, v)| (k.into(), TagData::with_value(v)))
                .collect(),
        )
    }

    /// Build from key/value pairs where the value may be absent
    pub fn from_optional_string_map<I, K>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        Self(
            tags.into_iter()
                .map(|(k, v)| {
                    (
                        k.into(),
                        TagData {
                            value: v,
                            ..TagData::default()
                        },
                    )
                })
                .collect(),
        )
    }

    /// Build a key-only set, used for ignore lists and removal
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self(
            keys.into_iter()
                .map(|k| (k.into(), TagData::default()))
                .collect(),
        )
    }

    pub fn from_tag_data<I, K>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, TagData)>,
        K: Into<String>,
    {
        Self(tags.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Tags whose keys do not carry the reserved `aws:` prefix
    #[must_use]
    pub fn ignore_aws(&self) -> Self {
        self.filtered(|k| !k.starts_with(AWS_TAG_KEY_PREFIX))
    }

    /// Tags not removed by the given ignore configuration
    #[must_use]
    pub fn ignore_config(&self, config: Option<&IgnoreConfig>) -> Self {
        match config {
            Some(config) => self
                .ignore_prefixes(&config.key_prefixes)
                .ignore(&config.keys),
            None => self.clone(),
        }
    }

    /// Tags whose keys match none of the given prefixes
    #[must_use]
    pub fn ignore_prefixes(&self, prefixes: &KeyValueTags) -> Self {
        self.filtered(|k| !prefixes.0.keys().any(|prefix| k.starts_with(prefix.as_str())))
    }

    /// Tags whose keys are not in the given set
    #[must_use]
    pub fn ignore(&self, ignored: &KeyValueTags) -> Self {
        self.filtered(|k| !ignored.contains_key(k))
    }

    /// Tags present in `self` but absent from `new_tags`
    #[must_use]
    pub fn removed(&self, new_tags: &KeyValueTags) -> Self {
        self.filtered(|k| !new_tags.contains_key(k))
    }

    /// Tags in `new_tags` that are absent from `self` or whose data differs
    #[must_use]
    pub fn updated(&self, new_tags: &KeyValueTags) -> Self {
        Self(
            new_tags
                .0
                .iter()
                .filter(|(k, new_data)| self.0.get(*k) != Some(*new_data))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Tag keys mapped to their values; a missing value maps to `""`
    #[must_use]
    pub fn map(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone().unwrap_or_default()))
            .collect()
    }

    fn filtered(&self, keep: impl Fn(&str) -> bool) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| keep(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl From<&BTreeMap<String, String>> for KeyValueTags {
    fn from(tags: &BTreeMap<String, String>) -> Self {
        Self::from_string_map(tags.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

/// Options for removing resource tags from what is shown to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreConfig {
    pub keys: KeyValueTags,
    pub key_prefixes: KeyValueTags,
}

impl IgnoreConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.key_prefixes.is_empty()
    }
}

/// `ignore_tags` block as it appears in the provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct IgnoreTagsSettings {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub key_prefixes: Vec<String>,
}

impl From<&IgnoreTagsSettings> for IgnoreConfig {
    fn from(settings: &IgnoreTagsSettings) -> Self {
        Self {
            keys: KeyValueTags::from_keys(settings.keys.iter().cloned()),
            key_prefixes: KeyValueTags::from_keys(settings.key_prefixes.iter().cloned()),
        }
    }
}
