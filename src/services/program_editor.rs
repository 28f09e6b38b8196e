// ProgramEditor - stateful model of the program page
// Holds the local program list, the form being edited and the last status line

use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::Program;
use crate::services::program_service::{ProgramForm, ProgramService};

pub struct ProgramEditor {
    service: ProgramService,
    programs: Vec<Program>,
    form: ProgramForm,
    editing_id: Option<String>,
    status: Option<String>,
}

impl ProgramEditor {
    pub fn new(service: ProgramService) -> Self {
        Self {
            service,
            programs: Vec::new(),
            form: ProgramForm::default(),
            editing_id: None,
            status: None,
        }
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn form(&self) -> &ProgramForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ProgramForm {
        &mut self.form
    }

    pub fn editing_id(&self) -> Option<&str> {
        self.editing_id.as_deref()
    }

    /// Message of the last failed action, or a confirmation of the last success.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub async fn load(&mut self) -> AppResult<()> {
        match self.service.list_programs().await {
            Ok(programs) => {
                self.programs = programs;
                Ok(())
            }
            Err(e) => {
                self.status = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Put a loaded program into the form.
    pub fn edit(&mut self, id: &str) -> AppResult<()> {
        let program = self
            .programs
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Program {} not found", id)))?;
        self.form = ProgramForm::from_program(program);
        self.editing_id = Some(id.to_string());
        self.status = None;
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.form = ProgramForm::default();
        self.editing_id = None;
    }

    /// Validate and save the form.
    ///
    /// On success the saved program is mirrored into the local list at once,
    /// the form is reset, and the list is re-read from the store; a failed
    /// re-read keeps the mirrored list. On failure the form is left as typed.
    pub async fn submit(&mut self) -> AppResult<Program> {
        let result = match &self.editing_id {
            Some(id) => self.service.update_program(id, &self.form).await,
            None => self.service.create_program(&self.form).await,
        };

        let saved = match result {
            Ok(saved) => saved,
            Err(e) => {
                self.status = Some(e.to_string());
                return Err(e);
            }
        };

        match self.programs.iter_mut().find(|p| p.id == saved.id) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = saved.clone();
                existing.created_at = created_at;
            }
            None => self.programs.push(saved.clone()),
        }
        self.cancel_edit();
        self.status = Some(format!("Program '{}' saved", saved.title));
        info!("Program {} saved from editor", saved.id);

        match self.service.list_programs().await {
            Ok(programs) => self.programs = programs,
            Err(e) => warn!("Re-reading programs after save failed, keeping local copy: {}", e),
        }

        Ok(saved)
    }

    pub async fn delete(&mut self, id: &str) -> AppResult<()> {
        if let Err(e) = self.service.delete_program(id).await {
            self.status = Some(e.to_string());
            return Err(e);
        }
        self.programs.retain(|p| p.id != id);
        if self.editing_id.as_deref() == Some(id) {
            self.cancel_edit();
        }
        self.status = Some("Program deleted".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::document_store::DocumentStore;
    use crate::infrastructure::memory_store::MemoryDocumentStore;
    use std::sync::Arc;

    fn fill(form: &mut ProgramForm, title: &str) {
        form.title = title.into();
        form.date = "2025-12-08".into();
        form.start = "10:00".into();
        form.room = "Hall A".into();
    }

    #[tokio::test]
    async fn test_submit_create_then_edit() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut editor = ProgramEditor::new(ProgramService::new(store));
        editor.load().await.unwrap();

        fill(editor.form_mut(), "Opening");
        let created = editor.submit().await.unwrap();
        assert_eq!(editor.programs().len(), 1);
        assert_eq!(editor.form(), &ProgramForm::default());

        editor.edit(&created.id).unwrap();
        editor.form_mut().room = "Hall B".into();
        editor.submit().await.unwrap();
        assert_eq!(editor.programs().len(), 1);
        assert_eq!(editor.programs()[0].room, "Hall B");
        assert!(editor.editing_id().is_none());
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_form() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut editor = ProgramEditor::new(ProgramService::new(store.clone()));

        fill(editor.form_mut(), "Opening");
        store.set_deny_writes(true);
        let err = editor.submit().await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
        assert_eq!(editor.form().title, "Opening");
        assert!(editor.status().unwrap().contains("Permission denied"));
        assert!(editor.programs().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_reported_in_status() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut editor = ProgramEditor::new(ProgramService::new(store.clone()));
        editor.form_mut().title = "Only a title".into();

        assert!(editor.submit().await.is_err());
        assert_eq!(editor.status(), Some("Validation error: Please select a date"));
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_reread_keeps_mirror() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut editor = ProgramEditor::new(ProgramService::new(store.clone()));

        fill(editor.form_mut(), "Opening");
        // the write succeeds, the follow-up list does not
        store.fail_next_reads(1);
        editor.submit().await.unwrap();
        assert_eq!(editor.programs().len(), 1);
        assert_eq!(editor.programs()[0].title, "Opening");
    }

    #[tokio::test]
    async fn test_delete_removes_locally() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut editor = ProgramEditor::new(ProgramService::new(store.clone()));
        fill(editor.form_mut(), "Opening");
        let created = editor.submit().await.unwrap();

        editor.delete(&created.id).await.unwrap();
        assert!(editor.programs().is_empty());
        assert_eq!(store.count(crate::infrastructure::Collection::Programs).await.unwrap(), 0);
    }
}
