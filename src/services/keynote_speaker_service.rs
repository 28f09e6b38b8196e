// KeynoteSpeakerService - speakers shown on the mobile app's keynote page

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::core::now_rfc3339;
use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{Collection, DocumentData, DocumentStore};
use crate::models::KeynoteSpeaker;

/// Largest decoded image accepted, in bytes.
pub const MAX_IMAGE_BYTES: usize = 1024 * 1024;

pub const ALLOWED_IMAGE_TYPES: [&str; 8] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/svg+xml",
    "image/tiff",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeakerSort {
    #[default]
    Order,
    Name,
    Institution,
}

impl FromStr for SpeakerSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "order" => Ok(SpeakerSort::Order),
            "name" => Ok(SpeakerSort::Name),
            "institution" => Ok(SpeakerSort::Institution),
            other => Err(AppError::BadRequest(format!("Unknown sort key '{}'", other))),
        }
    }
}

/// Create/update payload. A missing `imageData` keeps the stored image.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeakerInput {
    pub name: String,
    pub title: String,
    pub institution: String,
    pub biography: String,
    pub image_data: Option<String>,
    pub order: i64,
}

impl SpeakerInput {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() || self.institution.trim().is_empty() {
            return Err(AppError::Validation(
                "Please fill in at least the name and institution fields.".to_string(),
            ));
        }
        match self.image_data.as_deref() {
            Some(image) if !image.is_empty() => validate_image_data(image),
            _ => Ok(()),
        }
    }

    fn to_document_data(&self) -> DocumentData {
        let mut data = DocumentData::new();
        data.insert("name".into(), Value::String(self.name.trim().to_string()));
        data.insert("title".into(), Value::String(self.title.trim().to_string()));
        data.insert("institution".into(), Value::String(self.institution.trim().to_string()));
        data.insert("biography".into(), Value::String(self.biography.clone()));
        data.insert("order".into(), Value::from(self.order));
        if let Some(image) = &self.image_data {
            data.insert("imageData".into(), Value::String(image.clone()));
        }
        data
    }
}

/// Check a `data:<mime>;base64,<payload>` image.
pub fn validate_image_data(image: &str) -> AppResult<()> {
    let invalid = || AppError::Validation("Image data must be a base64 data URL".to_string());

    let rest = image.strip_prefix("data:").ok_or_else(invalid)?;
    let (mime, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;

    if !ALLOWED_IMAGE_TYPES.contains(&mime.to_ascii_lowercase().as_str()) {
        return Err(AppError::Validation(
            "Please select a valid image file (JPEG, PNG, GIF, WebP, BMP, SVG, or TIFF)".to_string(),
        ));
    }

    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::Validation(
            "Image too large. Please use an image smaller than 1MB.".to_string(),
        ));
    }
    Ok(())
}

pub fn sort_speakers(speakers: &mut [KeynoteSpeaker], sort: SpeakerSort) {
    match sort {
        SpeakerSort::Order => speakers.sort_by_key(|s| s.order),
        SpeakerSort::Name => speakers.sort_by_key(|s| s.name.to_lowercase()),
        SpeakerSort::Institution => speakers.sort_by_key(|s| s.institution.to_lowercase()),
    }
}

pub fn matches_search(speaker: &KeynoteSpeaker, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    needle.is_empty()
        || [&speaker.name, &speaker.institution, &speaker.title]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
}

#[derive(Clone)]
pub struct KeynoteSpeakerService {
    store: Arc<dyn DocumentStore>,
}

impl KeynoteSpeakerService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, search: Option<&str>, sort: SpeakerSort) -> AppResult<Vec<KeynoteSpeaker>> {
        let mut speakers: Vec<KeynoteSpeaker> = self
            .store
            .list(Collection::KeynoteSpeakers)
            .await?
            .iter()
            .map(KeynoteSpeaker::from_document)
            .filter(|s| search.map(|term| matches_search(s, term)).unwrap_or(true))
            .collect();
        sort_speakers(&mut speakers, sort);
        Ok(speakers)
    }

    pub async fn get(&self, id: &str) -> AppResult<KeynoteSpeaker> {
        self.store
            .get(Collection::KeynoteSpeakers, id)
            .await?
            .map(|doc| KeynoteSpeaker::from_document(&doc))
            .ok_or_else(|| AppError::NotFound(format!("Keynote speaker {} not found", id)))
    }

    pub async fn create(&self, input: &SpeakerInput) -> AppResult<KeynoteSpeaker> {
        input.validate()?;
        let now = now_rfc3339();
        let mut data = input.to_document_data();
        data.entry("imageData").or_insert_with(|| Value::String(String::new()));
        data.insert("createdAt".into(), Value::String(now.clone()));
        data.insert("updatedAt".into(), Value::String(now));

        let doc = self.store.add(Collection::KeynoteSpeakers, data).await?;
        info!("Keynote speaker added with ID: {}", doc.id);
        Ok(KeynoteSpeaker::from_document(&doc))
    }

    /// Update in place; `createdAt` is left as stored.
    pub async fn update(&self, id: &str, input: &SpeakerInput) -> AppResult<KeynoteSpeaker> {
        input.validate()?;
        let mut data = input.to_document_data();
        data.insert("updatedAt".into(), Value::String(now_rfc3339()));

        self.store.update(Collection::KeynoteSpeakers, id, data).await?;
        info!("Keynote speaker updated: {}", id);
        self.get(id).await
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if !self.store.delete(Collection::KeynoteSpeakers, id).await? {
            return Err(AppError::NotFound(format!("Keynote speaker {} not found", id)));
        }
        info!("Keynote speaker deleted: {}", id);
        Ok(())
    }
}
