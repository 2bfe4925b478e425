use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Field every digest document carries its block height in.
pub const HEIGHT_FIELD: &str = "height";

/// A store-native document: a JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Encode a typed value into a document. The value must serialize to a
    /// JSON object.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> StoreResult<Self> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(StoreError::InvalidDocument(format!(
                "expected an object, got {}",
                kind_of(&other)
            ))),
            Err(e) => Err(StoreError::Serialization(e.to_string())),
        }
    }

    /// Decode the document back into a typed value.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The document's `height` field, if present and numeric.
    pub fn height(&self) -> Option<u64> {
        self.get(HEIGHT_FIELD).and_then(Value::as_u64)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Object(doc.0)
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One pending write against a collection.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteModel {
    InsertOne(Document),
}

impl WriteModel {
    pub fn insert(document: Document) -> Self {
        Self::InsertOne(document)
    }
}

/// Matches documents whose `field` equals `value` and whose height is
/// strictly below `height_below`.
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteFilter {
    pub field: String,
    pub value: Value,
    pub height_below: u64,
}

impl DeleteFilter {
    pub fn new(field: impl Into<String>, value: impl Into<Value>, height_below: u64) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            height_below,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field) == Some(&self.value)
            && doc.height().is_some_and(|h| h < self.height_below)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Row {
        name: String,
        height: u64,
    }

    #[test]
    fn encode_requires_object() {
        let err = Document::encode(&42).unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidDocument("expected an object, got number".into())
        );
    }

    #[test]
    fn encode_and_read_fields() {
        let doc = Document::encode(&Row {
            name: "a".into(),
            height: 9,
        })
        .unwrap();
        assert_eq!(doc.get("name"), Some(&json!("a")));
        assert_eq!(doc.height(), Some(9));
        assert_eq!(
            doc.decode::<Row>().unwrap(),
            Row {
                name: "a".into(),
                height: 9
            }
        );
    }

    #[test]
    fn delete_filter_is_strictly_below() {
        let filter = DeleteFilter::new("nft_id", "c:col:1", 10);
        let at = |h: u64| Document::encode(&json!({"nft_id": "c:col:1", "height": h})).unwrap();
        assert!(filter.matches(&at(9)));
        assert!(!filter.matches(&at(10)));
        assert!(!filter.matches(&at(11)));

        let other = Document::encode(&json!({"nft_id": "c:col:2", "height": 1})).unwrap();
        assert!(!filter.matches(&other));

        let no_height = Document::encode(&json!({"nft_id": "c:col:1"})).unwrap();
        assert!(!filter.matches(&no_height));
    }
}
