//! Attribute sets extracted from manifest annotations.
//!
//! The `uor.attributes` annotation is a JSON object whose top-level keys are
//! attribute schemas and whose values are nested objects of attribute
//! key/value pairs. Ingest unions the sets found on the manifest, its links,
//! and its layers; a digest can therefore carry several values for the same
//! key.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Error, Result};

/// Placeholder for empty schema or attribute-key names, which cannot be
/// represented as index path segments.
pub const UNKNOWN_KEY: &str = "unknown";

/// Attribute triples grouped by schema, with multiplicity preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    entries: BTreeMap<String, Vec<(String, Value)>>,
}

impl AttributeSet {
    /// Parses the wire form of an attribute annotation:
    /// `{"schema": {"key": value, …}, …}`.
    ///
    /// Empty schema or key names are rewritten to [`UNKNOWN_KEY`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] when the annotation is not a JSON
    /// object of objects. Callers treat this as dropping the offending
    /// source's attribute group, not the whole manifest.
    pub fn from_annotation(raw: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(raw)?;
        let Value::Object(schemas) = parsed else {
            return Err(Error::Serialization {
                message: "attribute annotation must be a JSON object".to_string(),
            });
        };

        let mut set = Self::default();
        for (schema, pairs) in schemas {
            let Value::Object(pairs) = pairs else {
                return Err(Error::Serialization {
                    message: format!("attributes for schema {schema:?} must be a JSON object"),
                });
            };
            let schema = non_empty(schema);
            for (key, value) in pairs {
                set.entries
                    .entry(schema.clone())
                    .or_default()
                    .push((non_empty(key), value));
            }
        }
        Ok(set)
    }

    /// Unions another set into this one, appending values per schema.
    pub fn merge(&mut self, other: Self) {
        for (schema, mut pairs) in other.entries {
            self.entries.entry(schema).or_default().append(&mut pairs);
        }
    }

    /// Returns true when no triples are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates schemas and their key/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(String, Value)])> {
        self.entries
            .iter()
            .map(|(schema, pairs)| (schema.as_str(), pairs.as_slice()))
    }
}

fn non_empty(name: String) -> String {
    if name.is_empty() {
        UNKNOWN_KEY.to_string()
    } else {
        name
    }
}
