use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

pub const STUDIO_ID: &str = "studio_id";
pub const USER_ID: &str = "user_id";
pub const EVENT: &str = "event";
pub const TIMESTAMP: &str = "timestamp";

/// Fields persisted for every event, in hash order.
pub const RECORD_FIELDS: [&str; 4] = [STUDIO_ID, USER_ID, EVENT, TIMESTAMP];

/// Text stored for a field the caller did not send.
pub const MISSING_FIELD: &str = "undefined";

/// A studio lifecycle event as posted by a client.
///
/// Kept as the caller's JSON object so that unknown fields and field
/// order round-trip into the write response untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    pub fn new(studio_id: &str, user_id: &str, event: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(STUDIO_ID.into(), Value::String(studio_id.into()));
        fields.insert(USER_ID.into(), Value::String(user_id.into()));
        fields.insert(EVENT.into(), Value::String(event.into()));
        Self(fields)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Text written to the store for `name`.
    ///
    /// Strings verbatim, scalars by their JSON text, arrays and objects
    /// as compact JSON, absent fields as [`MISSING_FIELD`].
    pub fn field_text(&self, name: &str) -> String {
        match self.0.get(name) {
            None => MISSING_FIELD.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Required fields (all but `timestamp`) absent from the payload.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [STUDIO_ID, USER_ID, EVENT]
            .into_iter()
            .filter(|name| !self.0.contains_key(*name))
            .collect()
    }

    /// Set `timestamp`, replacing any caller-supplied value in place.
    pub fn stamp(&mut self, ts_ms: i64) {
        self.0.insert(TIMESTAMP.into(), Value::from(ts_ms));
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.0.get(TIMESTAMP).and_then(Value::as_i64)
    }
}

/// All fields of one stored hash, in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredRecord {
    fields: Vec<(String, String)>,
}

impl StoredRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl From<Vec<(String, String)>> for StoredRecord {
    fn from(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }
}

impl Serialize for StoredRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Result of a write: the generated key and the stamped event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteReceipt {
    pub id: String,
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_from(v: Value) -> Event {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn field_text_renders_like_the_store_sees_it() {
        let ev = event_from(json!({
            "studio_id": "s1",
            "user_id": 42,
            "event": null,
            "flag": true,
            "tags": ["a", "b"],
        }));
        assert_eq!(ev.field_text(STUDIO_ID), "s1");
        assert_eq!(ev.field_text(USER_ID), "42");
        assert_eq!(ev.field_text(EVENT), "null");
        assert_eq!(ev.field_text("flag"), "true");
        assert_eq!(ev.field_text("tags"), r#"["a","b"]"#);
        assert_eq!(ev.field_text("nope"), MISSING_FIELD);
    }

    #[test]
    fn missing_fields_ignores_timestamp() {
        let ev = event_from(json!({ "studio_id": "s1" }));
        assert_eq!(ev.missing_fields(), vec![USER_ID, EVENT]);
        assert!(Event::new("s", "u", "e").missing_fields().is_empty());
    }

    #[test]
    fn stamp_keeps_field_order_and_extra_fields() {
        let mut ev = event_from(json!({
            "timestamp": "client",
            "studio_id": "s1",
            "extra": 1,
        }));
        ev.stamp(123);
        assert_eq!(
            serde_json::to_string(&ev).unwrap(),
            r#"{"timestamp":123,"studio_id":"s1","extra":1}"#
        );
        assert_eq!(ev.timestamp(), Some(123));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(serde_json::from_value::<Event>(json!(["s1"])).is_err());
        assert!(serde_json::from_value::<Event>(json!("s1")).is_err());
    }

    #[test]
    fn stored_record_serializes_as_ordered_map() {
        let rec = StoredRecord::from(vec![
            ("studio_id".to_string(), "s1".to_string()),
            ("timestamp".to_string(), "7".to_string()),
        ]);
        assert_eq!(
            serde_json::to_string(&rec).unwrap(),
            r#"{"studio_id":"s1","timestamp":"7"}"#
        );
        assert_eq!(rec.get("timestamp"), Some("7"));
        assert_eq!(serde_json::to_string(&StoredRecord::new()).unwrap(), "{}");
    }

    #[test]
    fn receipt_shape() {
        let mut ev = Event::new("s1", "u1", "created");
        ev.stamp(99);
        let receipt = WriteReceipt {
            id: "ibm:watson-studio:s1:99".into(),
            event: ev,
        };
        assert_eq!(
            serde_json::to_value(&receipt).unwrap(),
            json!({
                "id": "ibm:watson-studio:s1:99",
                "event": { "studio_id": "s1", "user_id": "u1", "event": "created", "timestamp": 99 }
            })
        );
    }
}
