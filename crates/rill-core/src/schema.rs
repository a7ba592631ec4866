//! Schema documents describing a stream's entry type.
//!
//! Computed once at stream construction and served by the HTTP `schema`
//! endpoint in two shapes: the full descriptor and the compact subscribable
//! form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::log::StreamNamespace;

/// Full description of a stream's entry type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Per-language schema renderings, keyed by language tag.
    pub language: BTreeMap<String, String>,
    /// Entry type name.
    pub type_name: String,
    /// Stable 64-bit entry type identifier.
    pub type_id: u64,
    /// Structural schema of the entry type.
    pub type_schema: serde_json::Value,
}

impl SchemaDescriptor {
    /// Builds the descriptor for entry type `E`.
    #[must_use]
    pub fn for_entry<E: Entry>() -> Self {
        Self {
            language: E::language_schemas(),
            type_name: E::type_name().to_string(),
            type_id: E::type_id(),
            type_schema: E::type_schema(),
        }
    }

    /// The compact subscribable form of this descriptor.
    #[must_use]
    pub fn simple(&self, namespace: &StreamNamespace) -> SimpleSchema {
        SimpleSchema {
            type_id: self.type_id,
            entry_name: namespace.entry_name.clone(),
            namespace_name: namespace.namespace.clone(),
        }
    }
}

/// Compact schema form: just enough to subscribe with the right type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleSchema {
    /// Stable 64-bit entry type identifier.
    pub type_id: u64,
    /// Exposed entry name.
    pub entry_name: String,
    /// Exposed namespace name.
    pub namespace_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Sample {
        n: u8,
    }

    impl Entry for Sample {
        fn language_schemas() -> BTreeMap<String, String> {
            BTreeMap::from([("rust".to_string(), "struct Sample { n: u8 }".to_string())])
        }
    }

    #[test]
    fn test_descriptor_reflects_entry_hooks() {
        let descriptor = SchemaDescriptor::for_entry::<Sample>();
        assert_eq!(descriptor.type_name, "Sample");
        assert_eq!(descriptor.type_id, Sample::type_id());
        assert_eq!(
            descriptor.language.get("rust").map(String::as_str),
            Some("struct Sample { n: u8 }")
        );
    }

    #[test]
    fn test_simple_uses_namespace_not_type_name() {
        let descriptor = SchemaDescriptor::for_entry::<Sample>();
        let ns = StreamNamespace::default();
        let simple = descriptor.simple(&ns);
        assert_eq!(simple.namespace_name, "RillSchema");
        assert_eq!(simple.entry_name, "TopLevelEntry");
        assert_eq!(simple.type_id, Sample::type_id());
    }

    #[test]
    fn test_descriptor_serializes_with_expected_fields() {
        let descriptor = SchemaDescriptor::for_entry::<Sample>();
        let json = serde_json::to_value(&descriptor).unwrap();
        for key in ["language", "type_name", "type_id", "type_schema"] {
            assert!(json.get(key).is_some(), "missing field {key}");
        }
    }
}
