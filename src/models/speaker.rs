use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infrastructure::document_store::{Collection, Document};
use crate::models::fields::FieldReader;

/// Keynote speaker shown on the mobile app's speakers page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeynoteSpeaker {
    pub id: String,
    pub name: String,
    pub title: String,
    pub institution: String,
    pub biography: String,
    /// `data:image/...;base64,...`
    pub image_data: String,
    pub order: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl KeynoteSpeaker {
    pub fn from_document(doc: &Document) -> Self {
        let r = FieldReader::new(Collection::KeynoteSpeakers, doc);
        Self {
            id: doc.id.clone(),
            name: r.string("name"),
            title: r.string("title"),
            institution: r.string("institution"),
            biography: r.string("biography"),
            image_data: r.string("imageData"),
            order: r.i64("order"),
            created_at: r.timestamp("createdAt"),
            updated_at: r.timestamp("updatedAt"),
        }
    }
}
