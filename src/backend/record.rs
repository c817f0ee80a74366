//! Wire representation of a catalog project in the hub backend

use serde::{Deserialize, Serialize};

use crate::crd::ProjectSpec;

/// A project as stored by the hub backend API
///
/// `id` is the Project resource name. The namespace is not part of the
/// backend key, so same-named Projects in different namespaces share one
/// record.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
}

impl BackendRecord {
    /// Build the desired backend record for a Project
    pub fn from_spec(id: &str, spec: &ProjectSpec) -> Self {
        Self {
            id: id.to_string(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            url: spec.url.clone(),
            icon: spec.icon.clone(),
            category: spec.category.clone(),
            status: spec.status.clone(),
        }
    }

    /// Names of the catalog fields that differ from `desired`
    ///
    /// `id` is not compared; both sides are addressed by the same key.
    pub fn changed_fields(&self, desired: &BackendRecord) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.name != desired.name {
            changed.push("name");
        }
        if self.description != desired.description {
            changed.push("description");
        }
        if self.url != desired.url {
            changed.push("url");
        }
        if self.icon != desired.icon {
            changed.push("icon");
        }
        if self.category != desired.category {
            changed.push("category");
        }
        if self.status != desired.status {
            changed.push("status");
        }
        changed
    }

    /// True when any catalog field differs from `desired`
    pub fn needs_update(&self, desired: &BackendRecord) -> bool {
        !self.changed_fields(desired).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ProjectSpec {
        ProjectSpec {
            name: "Demo".to_string(),
            description: "A demo".to_string(),
            url: "https://demo.io".to_string(),
            icon: String::new(),
            category: "tooling".to_string(),
            status: "active".to_string(),
        }
    }

    #[test]
    fn test_from_spec_uses_resource_name_as_id() {
        let record = BackendRecord::from_spec("demo", &spec());
        assert_eq!(record.id, "demo");
        assert_eq!(record.name, "Demo");
        assert_eq!(record.category, "tooling");
    }

    #[test]
    fn test_identical_records_need_no_update() {
        let desired = BackendRecord::from_spec("demo", &spec());
        let existing = desired.clone();
        assert!(!existing.needs_update(&desired));
        assert!(existing.changed_fields(&desired).is_empty());
    }

    #[test]
    fn test_each_field_is_compared() {
        let desired = BackendRecord::from_spec("demo", &spec());

        let mut existing = desired.clone();
        existing.url = "https://old.io".to_string();
        existing.status = "archived".to_string();
        assert_eq!(existing.changed_fields(&desired), vec!["url", "status"]);

        let mut existing = desired.clone();
        existing.icon = "star".to_string();
        assert!(existing.needs_update(&desired));
    }

    #[test]
    fn test_id_mismatch_alone_is_not_a_change() {
        let desired = BackendRecord::from_spec("demo", &spec());
        let mut existing = desired.clone();
        existing.id = "other".to_string();
        assert!(!existing.needs_update(&desired));
    }

    #[test]
    fn test_missing_optional_fields_decode_as_empty() {
        let json = r#"{"id":"demo","name":"Demo","description":"","url":"https://demo.io"}"#;
        let record: BackendRecord = serde_json::from_str(json).unwrap();
        assert!(record.icon.is_empty());
        assert!(record.category.is_empty());

        let encoded = serde_json::to_value(&record).unwrap();
        assert!(encoded.get("icon").is_none());
        assert_eq!(encoded["id"], "demo");
    }
}
