use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A stored document: a JSON object keyed by `id`, with an optional vector
/// embedding kept out of the JSON body (so callers never accidentally
/// serialize 1024 floats into a log line) and an optional TTL.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub fields: Map<String, Value>,
    pub embedding: Option<Vec<f32>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            fields: Map::new(),
            embedding: None,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }
}
