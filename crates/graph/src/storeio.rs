use anyhow::{Context, Result};
use memoria_store::Document;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Serialize `value` into a [`Document`] keyed by `id`, optionally attaching
/// a vector embedding for the store's vector-search index to use.
pub fn to_document<T: Serialize>(id: Uuid, value: &T, embedding: Option<Vec<f32>>) -> Result<Document> {
    let json = serde_json::to_value(value).context("serializing registry record")?;
    let fields = json
        .as_object()
        .context("registry record did not serialize to a JSON object")?
        .clone();
    Ok(Document {
        id,
        fields,
        embedding,
        expires_at: None,
    })
}

pub fn from_document<T: DeserializeOwned>(document: &Document) -> Result<T> {
    let value = serde_json::Value::Object(document.fields.clone());
    Ok(serde_json::from_value(value)?)
}
