use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::collection_store::{Collection, DocumentId, Fields, Revision, StoredDocument};

pub const END_SUFFIX: &str = "\u{ffff}";

/// Every collection shares one database; document ids carry the collection as a prefix.
pub fn doc_prefix(collection: Collection) -> String {
    format!("{}::", collection.name())
}

pub fn couch_doc_id(collection: Collection, id: &DocumentId) -> String {
    format!("{}{}", doc_prefix(collection), id)
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseInfo {
    pub update_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct PutResponse {
    pub rev: String,
}

/// Raw document as exchanged with CouchDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default)]
    pub created_at_ms: u64,
    #[serde(flatten)]
    pub fields: Fields,
}

impl CouchDocument {
    /// Convert into the store-neutral representation, stripping the collection prefix.
    pub fn into_stored(mut self, collection: Collection) -> StoredDocument {
        self.fields.retain(|key, _| !key.starts_with('_'));
        let prefix = doc_prefix(collection);
        let id = self
            .id
            .strip_prefix(&prefix)
            .map(str::to_owned)
            .unwrap_or(self.id);
        StoredDocument {
            id: DocumentId(id),
            revision: Revision(self.rev.unwrap_or_default()),
            fields: self.fields,
        }
    }
}

/// Serialize a CouchDB `since` value for use as a query parameter.
pub fn seq_param(seq: &Value) -> String {
    match seq {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_document_drops_prefix_and_meta_fields() {
        let raw: CouchDocument = serde_json::from_value(json!({
            "_id": "members::abc",
            "_rev": "2-xyz",
            "created_at_ms": 10,
            "name": "Jin"
        }))
        .unwrap();

        let stored = raw.into_stored(Collection::Members);
        assert_eq!(stored.id, DocumentId::from("abc"));
        assert_eq!(stored.revision, Revision("2-xyz".into()));
        assert_eq!(stored.fields.len(), 1);
        assert_eq!(stored.fields["name"], json!("Jin"));
    }

    #[test]
    fn seq_param_keeps_opaque_strings_verbatim() {
        assert_eq!(seq_param(&json!("12-g1AAAA")), "12-g1AAAA");
        assert_eq!(seq_param(&json!(42)), "42");
    }
}
