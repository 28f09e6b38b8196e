// Program models - sessions of the conference schedule and their talks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{legacy_conference_id, PresentationKey};
use crate::error::AppResult;
use crate::infrastructure::document_store::{Collection, Document, DocumentData};
use crate::models::fields::FieldReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramType {
    #[default]
    Session,
    Keynote,
    Break,
    Ceremony,
}

impl ProgramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramType::Session => "session",
            ProgramType::Keynote => "keynote",
            ProgramType::Break => "break",
            ProgramType::Ceremony => "ceremony",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "session" => Some(ProgramType::Session),
            "keynote" => Some(ProgramType::Keynote),
            "break" => Some(ProgramType::Break),
            "ceremony" => Some(ProgramType::Ceremony),
            _ => None,
        }
    }
}

/// Keynote speaker block embedded in a program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeynoteInfo {
    pub name: String,
    pub affiliation: String,
    pub bio: String,
    /// URL or data URL
    pub image: String,
}

impl KeynoteInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.affiliation.is_empty() && self.bio.is_empty()
    }

    fn from_reader(r: &FieldReader<'_>) -> Self {
        Self {
            name: r.string("name"),
            affiliation: r.string("affiliation"),
            bio: r.string("bio"),
            image: r.string("image"),
        }
    }
}

/// One talk inside a program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Conference {
    /// Stable key assigned on first save
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub presenter: String,
    pub affiliation: String,
    pub start: String,
    pub end: String,
    pub resume: String,
    pub is_keynote: bool,
    /// Index in the stored array, counting malformed elements
    #[serde(skip)]
    pub position: Option<usize>,
}

impl Conference {
    fn from_reader(r: &FieldReader<'_>, position: usize) -> Self {
        Self {
            id: r.opt_string("id").filter(|id| !id.trim().is_empty()),
            title: r.string("title"),
            presenter: r.string("presenter"),
            affiliation: r.string("affiliation"),
            start: r.string("start"),
            end: r.string("end"),
            resume: r.string("resume"),
            is_keynote: r.bool("isKeynote"),
            position: Some(position),
        }
    }

    pub fn stable_key(&self) -> Option<PresentationKey> {
        self.id.as_deref().map(PresentationKey::new)
    }

    /// Key the mobile client computes for this talk.
    pub fn derived_key(&self, program_date: &str) -> PresentationKey {
        PresentationKey::derive(&self.title, &self.presenter, &self.start, program_date)
    }
}

/// A program entry (session, keynote, break or ceremony).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    #[serde(rename = "type")]
    pub program_type: ProgramType,
    pub title: String,
    pub date: String,
    pub end_date: String,
    pub start: String,
    pub end: String,
    pub room: String,
    pub chairs: Vec<String>,
    pub keynote: KeynoteInfo,
    pub keynote_description: String,
    pub conferences: Vec<Conference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Program {
    pub fn from_document(doc: &Document) -> Self {
        let r = FieldReader::new(Collection::Programs, doc);

        let program_type = match r.opt_string("type") {
            None => ProgramType::default(),
            Some(raw) => ProgramType::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown program type '{}' on programs/{}, treating as session", raw, doc.id);
                ProgramType::default()
            }),
        };

        Self {
            id: doc.id.clone(),
            program_type,
            title: r.string("title"),
            date: r.string("date"),
            end_date: r.string("endDate"),
            start: r.string("start"),
            end: r.string("end"),
            room: r.string("room"),
            chairs: r.string_list("chairs"),
            keynote: r
                .nested("keynote")
                .map(|k| KeynoteInfo::from_reader(&k))
                .unwrap_or_default(),
            keynote_description: r.string("keynoteDescription"),
            conferences: r
                .nested_list("conferences")
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.as_ref().map(|c| Conference::from_reader(c, i)))
                .collect(),
            created_at: r.timestamp("createdAt"),
            updated_at: r.timestamp("updatedAt"),
        }
    }

    /// Stored fields of this program: everything but the id and timestamps.
    pub fn to_document_data(&self) -> AppResult<DocumentData> {
        let mut data = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => DocumentData::new(),
        };
        for field in ["id", "createdAt", "updatedAt"] {
            data.remove(field);
        }
        Ok(data)
    }

    /// Iterate conferences with their legacy positional id. Stored talks keep
    /// the index they had in the array, including skipped elements.
    pub fn conferences_with_legacy_ids(&self) -> impl Iterator<Item = (String, &Conference)> {
        self.conferences.iter().enumerate().map(move |(index, conf)| {
            let position = conf.position.unwrap_or(index);
            (legacy_conference_id(&self.id, position), conf)
        })
    }

    /// Give every conference without a stable key a fresh one.
    pub fn assign_conference_keys(&mut self) {
        for conference in &mut self.conferences {
            if conference.id.is_none() {
                conference.id = Some(PresentationKey::generate().to_string());
            }
        }
    }
}
