use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Record as emitted by the extraction run inside a `data` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    pub tags: Vec<String>,
}

/// Validated domain record handed to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub source_url: String,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("invalid payload: field `{field}` is missing or not a non-empty string")]
    InvalidPayload { field: &'static str },
    #[error("invalid payload: expected an object")]
    NotAnObject,
}

/// Translates an untrusted `data` payload into a [`NoteRecord`].
///
/// `id`, `title` and `url` must be non-empty strings. Optional fields of the
/// wrong type are treated as absent, non-string tags are skipped.
pub fn parse_record(payload: &Value) -> Result<NoteRecord, RecordError> {
    let object = payload.as_object().ok_or(RecordError::NotAnObject)?;

    let required = |field: &'static str| -> Result<String, RecordError> {
        object
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .ok_or(RecordError::InvalidPayload { field })
    };
    let optional = |field: &str| -> Option<String> {
        object
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    };

    let id = required("id")?;
    let title = required("title")?;
    let source_url = required("url")?;

    let tags = object
        .get("tags")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Ok(NoteRecord {
        id,
        title,
        content: optional("content"),
        image_url: optional("imageURL"),
        source_url,
        author_name: optional("authorName"),
        author_avatar: optional("authorAvatar"),
        tags,
    })
}
