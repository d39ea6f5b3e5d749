use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user-created geographic point.
///
/// `id` and `created_at` are assigned by the store on insert and never change
/// afterwards. The attribute bag carries whatever the caller supplied
/// (coordinates, notes, styling) and is opaque to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Caller payload for `add_point`. A missing name defaults to the empty
/// string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl PointDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            attributes: Map::new(),
        }
    }

    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Partial fields for `update_point`. Supplied fields win; every field not
/// named here is retained unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl PointPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            attributes: Map::new(),
        }
    }

    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

impl Point {
    /// Merge a patch over this point. `id` and `created_at` are untouchable.
    pub(crate) fn apply(&mut self, patch: PointPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        for (key, value) in patch.attributes {
            self.attributes.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Point {
        Point {
            id: 7,
            name: "camp".to_string(),
            created_at: Utc::now(),
            attributes: Map::from_iter([
                ("lat".to_string(), json!(40.1)),
                ("lon".to_string(), json!(-3.6)),
            ]),
        }
    }

    #[test]
    fn test_patch_replaces_only_supplied_fields() {
        let mut point = sample();
        let created = point.created_at;

        point.apply(PointPatch::rename("summit"));

        assert_eq!(point.id, 7);
        assert_eq!(point.name, "summit");
        assert_eq!(point.created_at, created);
        assert_eq!(point.attributes["lat"], json!(40.1));
        assert_eq!(point.attributes["lon"], json!(-3.6));
    }

    #[test]
    fn test_patch_merges_attributes() {
        let mut point = sample();

        point.apply(PointPatch::default().attribute("lat", json!(41.0)));

        assert_eq!(point.name, "camp");
        assert_eq!(point.attributes["lat"], json!(41.0));
        assert_eq!(point.attributes["lon"], json!(-3.6));
    }

    #[test]
    fn test_draft_roundtrips_opaque_payload() {
        let raw = json!({"name": "spring", "lat": 1.0, "notes": "shade"});
        let draft: PointDraft = serde_json::from_value(raw).unwrap();

        assert_eq!(draft.name.as_deref(), Some("spring"));
        assert_eq!(draft.attributes["lat"], json!(1.0));
        assert_eq!(draft.attributes["notes"], json!("shade"));
    }
}
