// ProgramService - CRUD over the conference program and the program form model

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::to_rfc3339;
use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{Collection, DocumentStore};
use crate::models::{Conference, KeynoteInfo, Program, ProgramType};

/// Talk slot attached to the program's keynote speaker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeynoteConferenceInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub start: String,
    pub end: String,
}

/// Editable state of one program, including its nested talk list.
///
/// The keynote talk is edited through `keynote_conference` and only becomes
/// the first entry of `conferences` when the form is turned into a program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgramForm {
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
    pub keynote_has_conference: bool,
    pub keynote_conference: KeynoteConferenceInput,
    pub conferences: Vec<Conference>,
}

impl ProgramForm {
    /// Load a stored program for editing; a leading keynote talk moves into
    /// `keynote_conference`.
    pub fn from_program(program: &Program) -> Self {
        let leading_keynote = program.conferences.first().filter(|c| c.is_keynote);
        let (keynote_conference, conferences) = match leading_keynote {
            Some(first) => (
                KeynoteConferenceInput {
                    id: first.id.clone(),
                    title: first.title.clone(),
                    start: first.start.clone(),
                    end: first.end.clone(),
                },
                program.conferences[1..].to_vec(),
            ),
            None => (KeynoteConferenceInput::default(), program.conferences.clone()),
        };

        Self {
            program_type: program.program_type,
            title: program.title.clone(),
            date: program.date.clone(),
            end_date: program.end_date.clone(),
            start: program.start.clone(),
            end: program.end.clone(),
            room: program.room.clone(),
            chairs: program.chairs.clone(),
            keynote: program.keynote.clone(),
            keynote_description: program.keynote_description.clone(),
            keynote_has_conference: leading_keynote.is_some(),
            keynote_conference,
            conferences,
        }
    }

    /// Blank input is ignored.
    pub fn add_chair(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.chairs.push(name.to_string());
        }
    }

    pub fn remove_chair(&mut self, index: usize) -> Option<String> {
        (index < self.chairs.len()).then(|| self.chairs.remove(index))
    }

    pub fn add_conference(&mut self, conference: Conference) {
        self.conferences.push(conference);
    }

    /// Replace the talk at `index`, keeping its stable key when the
    /// replacement carries none.
    pub fn update_conference(&mut self, index: usize, mut conference: Conference) -> AppResult<()> {
        let slot = self
            .conferences
            .get_mut(index)
            .ok_or_else(|| AppError::BadRequest(format!("No conference at position {}", index)))?;
        if conference.id.is_none() {
            conference.id = slot.id.clone();
        }
        *slot = conference;
        Ok(())
    }

    pub fn remove_conference(&mut self, index: usize) -> Option<Conference> {
        (index < self.conferences.len()).then(|| self.conferences.remove(index))
    }

    /// Required fields, checked in form order; the first miss is reported.
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Please enter a session title".to_string()));
        }
        if self.date.is_empty() {
            return Err(AppError::Validation("Please select a date".to_string()));
        }
        if self.start.is_empty() {
            return Err(AppError::Validation("Please enter start time".to_string()));
        }
        if self.room.trim().is_empty() {
            return Err(AppError::Validation(
                "Please specify the room for this session".to_string(),
            ));
        }
        Ok(())
    }

    /// The talk built from the keynote block.
    fn keynote_talk(&self) -> Conference {
        let title = if self.keynote_conference.title.is_empty() {
            format!("{} (Keynote)", self.keynote.name)
        } else {
            self.keynote_conference.title.clone()
        };
        Conference {
            id: self.keynote_conference.id.clone(),
            title,
            presenter: self.keynote.name.clone(),
            affiliation: self.keynote.affiliation.clone(),
            start: self.keynote_conference.start.clone(),
            end: self.keynote_conference.end.clone(),
            resume: self.keynote_description.clone(),
            is_keynote: true,
            position: None,
        }
    }

    /// Program payload with the keynote talk promoted to (or removed from)
    /// the head of the talk list.
    pub fn to_program(&self) -> Program {
        let mut conferences = self.conferences.clone();
        let leads_with_keynote = conferences.first().map(|c| c.is_keynote).unwrap_or(false);

        if self.keynote_has_conference {
            let mut talk = self.keynote_talk();
            if leads_with_keynote {
                if talk.id.is_none() {
                    talk.id = conferences[0].id.clone();
                }
                conferences[0] = talk;
            } else {
                conferences.insert(0, talk);
            }
        } else if leads_with_keynote {
            conferences.remove(0);
        }

        Program {
            id: String::new(),
            program_type: self.program_type,
            title: self.title.clone(),
            date: self.date.clone(),
            end_date: self.end_date.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            room: self.room.clone(),
            chairs: self.chairs.clone(),
            keynote: self.keynote.clone(),
            keynote_description: self.keynote_description.clone(),
            conferences,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Clone)]
pub struct ProgramService {
    store: Arc<dyn DocumentStore>,
}

impl ProgramService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// All programs by `date` ascending; undated programs last, ties in store order.
    pub async fn list_programs(&self) -> AppResult<Vec<Program>> {
        let docs = self.store.list(Collection::Programs).await?;
        let mut programs: Vec<Program> = docs.iter().map(Program::from_document).collect();
        programs.sort_by(|a, b| match (a.date.is_empty(), b.date.is_empty()) {
            (false, false) => a.date.cmp(&b.date),
            (a_empty, b_empty) => a_empty.cmp(&b_empty),
        });
        info!("Fetched {} programs", programs.len());
        Ok(programs)
    }

    pub async fn get_program(&self, id: &str) -> AppResult<Program> {
        self.store
            .get(Collection::Programs, id)
            .await?
            .map(|doc| Program::from_document(&doc))
            .ok_or_else(|| AppError::NotFound(format!("Program {} not found", id)))
    }

    pub async fn create_program(&self, form: &ProgramForm) -> AppResult<Program> {
        form.validate()?;

        let mut program = form.to_program();
        program.assign_conference_keys();
        let now = Utc::now();
        let mut data = program.to_document_data()?;
        data.insert("createdAt".to_string(), Value::String(to_rfc3339(&now)));
        data.insert("updatedAt".to_string(), Value::String(to_rfc3339(&now)));

        let doc = self.store.add(Collection::Programs, data).await.map_err(|e| {
            warn!("Error adding program '{}': {}", program.title, e);
            e
        })?;

        info!("Program added with ID: {}", doc.id);
        program.id = doc.id;
        program.created_at = Some(now);
        program.updated_at = Some(now);
        Ok(program)
    }

    /// Replace the stored program with the form's content. Only `createdAt`
    /// carries over, so fields cleared in the form are cleared in the store.
    pub async fn update_program(&self, id: &str, form: &ProgramForm) -> AppResult<Program> {
        form.validate()?;

        let existing = self
            .store
            .get(Collection::Programs, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Program {} not found", id)))?;

        let mut program = form.to_program();
        program.assign_conference_keys();
        let now = Utc::now();
        let mut data = program.to_document_data()?;
        if let Some(created_at) = existing.data.get("createdAt") {
            data.insert("createdAt".to_string(), created_at.clone());
        }
        data.insert("updatedAt".to_string(), Value::String(to_rfc3339(&now)));

        self.store.set(Collection::Programs, id, data).await.map_err(|e| {
            warn!("Error updating program {}: {}", id, e);
            e
        })?;

        info!("Program updated successfully: {}", id);
        program.id = id.to_string();
        program.created_at = Program::from_document(&existing).created_at;
        program.updated_at = Some(now);
        Ok(program)
    }

    pub async fn delete_program(&self, id: &str) -> AppResult<()> {
        if !self.store.delete(Collection::Programs, id).await? {
            return Err(AppError::NotFound(format!("Program {} not found", id)));
        }
        info!("Program deleted successfully: {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryDocumentStore;

    fn valid_form() -> ProgramForm {
        ProgramForm {
            title: "Artificial Intelligence and Healthcare".into(),
            date: "2025-12-08".into(),
            start: "10:15".into(),
            room: "Hall A".into(),
            ..Default::default()
        }
    }

    fn talk(title: &str) -> Conference {
        Conference {
            title: title.into(),
            presenter: "Someone".into(),
            start: "10:00".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validation_order() {
        let mut form = ProgramForm::default();
        assert_eq!(form.validate().unwrap_err().user_message(), "Please enter a session title");
        form.title = "  ".into();
        assert_eq!(form.validate().unwrap_err().user_message(), "Please enter a session title");
        form.title = "T".into();
        assert_eq!(form.validate().unwrap_err().user_message(), "Please select a date");
        form.date = "2025-12-08".into();
        assert_eq!(form.validate().unwrap_err().user_message(), "Please enter start time");
        form.start = "09:00".into();
        assert_eq!(
            form.validate().unwrap_err().user_message(),
            "Please specify the room for this session"
        );
        form.room = "A".into();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_keynote_promoted_to_first_conference() {
        let mut form = valid_form();
        form.keynote = KeynoteInfo {
            name: "Pr Nawres Khlifa".into(),
            affiliation: "El Manar University".into(),
            ..Default::default()
        };
        form.keynote_description = "AI in hospitals".into();
        form.keynote_has_conference = true;
        form.keynote_conference.start = "09:00".into();
        form.add_conference(talk("CoMediC"));

        let program = form.to_program();
        assert_eq!(program.conferences.len(), 2);
        let keynote = &program.conferences[0];
        assert!(keynote.is_keynote);
        assert_eq!(keynote.title, "Pr Nawres Khlifa (Keynote)");
        assert_eq!(keynote.affiliation, "El Manar University");
        assert_eq!(keynote.resume, "AI in hospitals");
        assert_eq!(program.conferences[1].title, "CoMediC");
    }

    #[test]
    fn test_existing_keynote_replaced_not_duplicated() {
        let mut form = valid_form();
        form.keynote.name = "K".into();
        form.keynote_has_conference = true;
        form.keynote_conference.title = "New title".into();
        form.conferences = vec![
            Conference {
                id: Some("stable".into()),
                is_keynote: true,
                title: "Old".into(),
                ..Default::default()
            },
            talk("Other"),
        ];

        let program = form.to_program();
        assert_eq!(program.conferences.len(), 2);
        assert_eq!(program.conferences[0].title, "New title");
        assert_eq!(program.conferences[0].id.as_deref(), Some("stable"));
    }

    #[test]
    fn test_unchecked_keynote_is_removed() {
        let mut form = valid_form();
        form.conferences = vec![
            Conference {
                is_keynote: true,
                ..Default::default()
            },
            talk("Kept"),
        ];
        let program = form.to_program();
        assert_eq!(program.conferences.len(), 1);
        assert_eq!(program.conferences[0].title, "Kept");
    }

    #[test]
    fn test_from_program_round_trips_keynote() {
        let mut form = valid_form();
        form.keynote.name = "K".into();
        form.keynote_has_conference = true;
        form.keynote_conference.title = "Opening".into();
        form.add_conference(talk("Other"));

        let reloaded = ProgramForm::from_program(&form.to_program());
        assert!(reloaded.keynote_has_conference);
        assert_eq!(reloaded.keynote_conference.title, "Opening");
        assert_eq!(reloaded.conferences.len(), 1);
    }

    #[test]
    fn test_chair_and_conference_editing() {
        let mut form = valid_form();
        form.add_chair("  ");
        form.add_chair(" Pr Faiza Belala ");
        assert_eq!(form.chairs, vec!["Pr Faiza Belala"]);
        assert!(form.remove_chair(3).is_none());
        assert_eq!(form.remove_chair(0).as_deref(), Some("Pr Faiza Belala"));

        form.add_conference(Conference {
            id: Some("k1".into()),
            ..talk("A")
        });
        form.update_conference(0, talk("B")).unwrap();
        assert_eq!(form.conferences[0].title, "B");
        assert_eq!(form.conferences[0].id.as_deref(), Some("k1"));
        assert!(form.update_conference(5, talk("C")).is_err());
        assert!(form.remove_conference(0).is_some());
        assert!(form.conferences.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_form_makes_no_store_call() {
        let store = Arc::new(MemoryDocumentStore::new());
        let service = ProgramService::new(store.clone());
        let err = service.create_program(&ProgramForm::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.write_calls(), 0);
        assert_eq!(store.read_calls(), 0);
    }

    #[tokio::test]
    async fn test_crud_and_ordering() {
        let store = Arc::new(MemoryDocumentStore::new());
        let service = ProgramService::new(store);

        let mut later = valid_form();
        later.date = "2025-12-09".into();
        service.create_program(&later).await.unwrap();
        let created = service.create_program(&valid_form()).await.unwrap();

        let programs = service.list_programs().await.unwrap();
        assert_eq!(programs[0].id, created.id);
        assert_eq!(programs[1].date, "2025-12-09");

        let mut edit = ProgramForm::from_program(&created);
        edit.room = "Hall B".into();
        service.update_program(&created.id, &edit).await.unwrap();
        let fetched = service.get_program(&created.id).await.unwrap();
        assert_eq!(fetched.room, "Hall B");
        assert!(fetched.created_at.is_some());

        service.delete_program(&created.id).await.unwrap();
        assert!(matches!(
            service.delete_program(&created.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_update_clears_end_date() {
        let store = Arc::new(MemoryDocumentStore::new());
        let service = ProgramService::new(store.clone());

        let mut form = valid_form();
        form.end_date = "2025-12-10".into();
        let created = service.create_program(&form).await.unwrap();

        let mut edit = ProgramForm::from_program(&created);
        edit.end_date = String::new();
        let returned = service.update_program(&created.id, &edit).await.unwrap();
        assert_eq!(returned.end_date, "");
        assert!(returned.created_at.is_some());

        let fetched = service.get_program(&created.id).await.unwrap();
        assert_eq!(fetched.end_date, "");
        assert_eq!(fetched.created_at, returned.created_at);
        let doc = store.get(Collection::Programs, &created.id).await.unwrap().unwrap();
        assert_eq!(doc.data.get("endDate"), Some(&Value::String(String::new())));
    }

    #[tokio::test]
    async fn test_update_missing_program() {
        let store = Arc::new(MemoryDocumentStore::new());
        let service = ProgramService::new(store.clone());
        let err = service.update_program("nope", &valid_form()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_stable_keys_survive_edits() {
        let store = Arc::new(MemoryDocumentStore::new());
        let service = ProgramService::new(store);

        let mut form = valid_form();
        form.add_conference(talk("Original title"));
        let created = service.create_program(&form).await.unwrap();
        let key = created.conferences[0].id.clone().unwrap();

        let mut edit = ProgramForm::from_program(&created);
        edit.conferences[0].title = "Renamed".into();
        service.update_program(&created.id, &edit).await.unwrap();

        let fetched = service.get_program(&created.id).await.unwrap();
        assert_eq!(fetched.conferences[0].id.as_deref(), Some(key.as_str()));
    }
}
