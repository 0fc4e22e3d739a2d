use serde::Serialize;

/// Collection definition sent to `POST /collections`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub facet: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_dim: Option<usize>,
}

impl FieldSchema {
    fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            facet: false,
            num_dim: None,
        }
    }

    fn faceted(name: &str) -> Self {
        Self {
            facet: true,
            ..Self::new(name, "string")
        }
    }
}

impl CollectionSchema {
    /// Field set of the chunk collection. `id` is implicit in the backend.
    pub fn for_chunks(name: &str, embedding_dim: usize) -> Self {
        Self {
            name: name.to_string(),
            fields: vec![
                FieldSchema::faceted("path"),
                FieldSchema::faceted("project_root"),
                FieldSchema::faceted("project_type"),
                FieldSchema::faceted("language"),
                FieldSchema::faceted("chunk_type"),
                FieldSchema::new("content", "string"),
                FieldSchema {
                    num_dim: Some(embedding_dim),
                    ..FieldSchema::new("embedding", "float[]")
                },
                FieldSchema::new("start_line", "int32"),
                FieldSchema::new("end_line", "int32"),
                FieldSchema::new("indexed_at", "int64"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chunk_schema_serializes_backend_field_types() {
        let schema = CollectionSchema::for_chunks("swarm-index", 768);
        let json = serde_json::to_value(&schema).expect("serialize");
        assert_eq!(json["name"], "swarm-index");

        let fields = json["fields"].as_array().expect("fields");
        let find = |name: &str| {
            fields
                .iter()
                .find(|field| field["name"] == name)
                .cloned()
                .unwrap_or_else(|| panic!("missing field {name}"))
        };

        assert_eq!(
            find("path"),
            serde_json::json!({ "name": "path", "type": "string", "facet": true })
        );
        assert_eq!(
            find("content"),
            serde_json::json!({ "name": "content", "type": "string" })
        );
        assert_eq!(
            find("embedding"),
            serde_json::json!({ "name": "embedding", "type": "float[]", "num_dim": 768 })
        );
        assert_eq!(find("indexed_at")["type"], "int64");
        assert_eq!(fields.len(), 10);
    }
}
