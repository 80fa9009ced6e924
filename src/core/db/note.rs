use std::future::Future;

use base64::Engine;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::db::util;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    /// `data:image/<type>;base64,<payload>` strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(with = "util::timestamp", default = "util::now")]
    pub created_at: OffsetDateTime,
    #[serde(with = "util::timestamp", default = "util::now")]
    pub updated_at: OffsetDateTime,
}

impl Note {
    /// Fields a free-text reference to an entity name may appear in.
    pub(crate) fn text_fields(&self) -> impl Iterator<Item = &str> {
        [
            self.title.as_deref(),
            Some(self.content.as_str()),
            self.location.as_deref(),
            self.tags.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: Option<String>,
    pub content: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub tags: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Partial update. For `images`, `None` keeps the stored list,
/// `Some(None)` clears it and `Some(Some(list))` replaces it with the
/// well-formed entries of `list`.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<Option<String>>,
    pub content: Option<String>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub tags: Option<Option<String>>,
    pub images: Option<Option<Vec<String>>>,
}

impl NoteUpdate {
    pub(crate) fn apply(self, note: &mut Note) {
        if let Some(title) = self.title {
            note.title = title;
        }
        if let Some(content) = self.content {
            note.content = content;
        }
        if let Some(description) = self.description {
            note.description = description;
        }
        if let Some(location) = self.location {
            note.location = location;
        }
        if let Some(tags) = self.tags {
            note.tags = tags;
        }
        if let Some(images) = self.images {
            note.images = images.map(retain_valid_images);
        }
    }
}

/// Checks for a `data:image/<subtype>;base64,<payload>` URI whose payload
/// decodes as standard base64.
pub fn is_valid_image_data_uri(uri: &str) -> bool {
    let Some(rest) = uri.strip_prefix("data:image/") else {
        return false;
    };
    let Some((subtype, payload)) = rest.split_once(";base64,") else {
        return false;
    };
    let subtype_ok = !subtype.is_empty()
        && subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    subtype_ok
        && !payload.is_empty()
        && base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .is_ok()
}

pub(crate) fn retain_valid_images(images: Vec<String>) -> Vec<String> {
    let before = images.len();
    let kept: Vec<String> = images
        .into_iter()
        .filter(|uri| is_valid_image_data_uri(uri))
        .collect();
    if kept.len() < before {
        tracing::warn!(dropped = before - kept.len(), "Dropped malformed note images");
    }
    kept
}

pub trait NoteRepository {
    fn notes(&self) -> Vec<Note>;
    fn note(&self, id: &str) -> Option<Note>;
    fn create_note(&self, note: NewNote) -> impl Future<Output = anyhow::Result<Note>>;
    fn update_note(
        &self,
        id: &str,
        update: NoteUpdate,
    ) -> impl Future<Output = anyhow::Result<Option<Note>>>;
    fn delete_note(&self, id: &str) -> impl Future<Output = anyhow::Result<bool>>;
}
